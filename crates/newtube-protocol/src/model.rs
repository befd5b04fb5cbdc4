//! Shared data-model types referenced by op bodies: writer roles, video
//! categories, and the video/channel/invite/comment records themselves.

use newtube_core::{ChannelKey, VideoId, WriterKey};
use serde::{Deserialize, Serialize};

/// A writer's role within a channel, ordered by privilege.
///
/// `Ord` follows declaration order, so `Role::Owner` outranks
/// `Role::Moderator` outranks `Role::Device`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A paired device of the owner; can author videos and moderate.
    Device,
    /// Can hide/remove comments and reactions but not manage writers.
    Moderator,
    /// Full control: writer management, channel metadata, schema migration.
    Owner,
}

impl Role {
    /// Parses a role from its wire string, accepting the canonical
    /// lowercase spelling only (unlike `Permission::from_str`, roles are
    /// never taken from free-form user input).
    #[must_use]
    pub fn from_str_strict(s: &str) -> Option<Self> {
        match s {
            "device" => Some(Self::Device),
            "moderator" => Some(Self::Moderator),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Device => "device",
            Self::Moderator => "moderator",
            Self::Owner => "owner",
        };
        write!(f, "{s}")
    }
}

/// A video's category, supplementing spec.md's unconstrained `category`
/// field (named but not value-spaced in the distilled spec).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Entertainment,
    Education,
    Music,
    Gaming,
    News,
    Other,
}

/// A channel writer entry, as materialized in the KV view under
/// `writers/<writer-key-hex>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterRecord {
    pub writer_key: WriterKey,
    pub role: Role,
    pub added_at: u64,
    pub added_by: WriterKey,
}

/// A video record, materialized under `videos/<video-id-hex>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: VideoId,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub duration_seconds: u32,
    /// Opaque blob pointer string, e.g. `"bo:bl:yo:yl"`.
    pub blob_pointer: String,
    pub thumbnail_blob_pointer: Option<String>,
    pub author: WriterKey,
    pub created_at: u64,
    pub updated_at: u64,
    /// The writer whose `update-video` most recently won the merge below
    /// (or the video's author, until the first update). Used to look up
    /// that writer's role for the next `(role, logical_clock, updated_at)`
    /// comparison, the same way `ChannelMetadata::updated_by` does.
    pub updated_by: WriterKey,
    /// The logical clock of the op that most recently won the merge
    /// below (see `newtube_channel::conflict::merge_video_meta`).
    pub logical_clock: u64,
}

/// Channel metadata, materialized under `channel-meta/meta`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMetadata {
    pub title: String,
    pub description: String,
    pub avatar_blob_pointer: Option<String>,
    /// Sticky-first-write field: the public mirror's Hyperbee key.
    /// Once set by any writer it is never overwritten (see
    /// `newtube_channel::conflict::merge_channel_meta`).
    pub public_bee_key: Option<String>,
    /// Sticky-first-write field: the comments ring's Autobase key.
    pub comments_autobase_key: Option<String>,
    pub updated_at: u64,
    pub updated_by: WriterKey,
    pub logical_clock: u64,
    pub schema_version: u32,
}

/// A pending invite, materialized under `invites/<invite-id>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteRecord {
    pub invite_id: String,
    pub role: Role,
    pub created_by: WriterKey,
    pub created_at: u64,
    pub expires_at: u64,
    pub used_at: Option<u64>,
    pub used_by: Option<WriterKey>,
}

impl InviteRecord {
    /// An invite is usable if it has not expired and has not already
    /// been consumed.
    #[must_use]
    pub fn is_usable(&self, now_millis: u64) -> bool {
        self.used_at.is_none() && now_millis < self.expires_at
    }
}

/// A single playback sample, materialized under
/// `watch-events/<video-id-hex>/<event-id>`. `event_id` is the
/// linearizer's `node_index` at apply time (zero-padded), which is
/// already a unique, deterministic per-entry position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEventRecord {
    pub video_id: VideoId,
    pub event_id: String,
    pub watcher: WriterKey,
    pub watched_at: u64,
    pub duration_seconds: u32,
}

/// A video's embedding vector, materialized under
/// `vectors/<video-id-hex>`. `vector_base64` decodes to exactly 1536
/// bytes (384 × f32).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexRecord {
    pub video_id: VideoId,
    pub vector_base64: String,
    pub updated_at: u64,
}

/// Identifies the channel a wire message concerns.
pub type ChannelScope = ChannelKey;
