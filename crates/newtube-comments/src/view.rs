//! The comments ring's materialized view: comments, reactions, and the
//! set of writers admitted into the ring (as distinct from the parent
//! channel's writer set).
//!
//! Comments are keyed by `comment_id` alone (`comments/<comment-id>`)
//! rather than `comments/<video-id>/<comment-id>`: `OpBody::HideComment`
//! and `OpBody::RemoveComment` carry only a `comment_id`, so the primary
//! key must be resolvable from that alone. A secondary
//! `comments-by-video/<video-id-hex>/<comment-id>` index supports
//! per-video listing without a full scan.

use newtube_core::{Result, VideoId, WriterKey};
use newtube_protocol::Role;
use newtube_storage::KvBackend;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One comment, materialized under `comments/<comment-id>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRecord {
    pub comment_id: String,
    pub video_id: VideoId,
    pub author: WriterKey,
    pub text: String,
    pub created_at: u64,
    /// Soft-hidden by a moderator; the record is kept (so
    /// `remove_comment` can still act on it) but excluded from normal
    /// listings.
    pub hidden: bool,
}

/// One author's reaction, materialized under
/// `reactions/<video-id-hex>/<author-key-hex>`: one reaction per author
/// per video, overwritten on re-add.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionRecord {
    pub comment_id: String,
    pub video_id: VideoId,
    pub author: WriterKey,
    pub emoji: String,
    pub created_at: u64,
}

/// A writer admitted into the ring, materialized under
/// `writers/<writer-key-hex>`. Distinct from the parent channel's
/// writer set: most entries here are auto-admitted commenters at
/// [`Role::Device`], with `Role::Moderator`/`Role::Owner` reserved for
/// writers the channel owner explicitly upgrades.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingWriterRecord {
    pub writer_key: WriterKey,
    pub role: Role,
    pub admitted_at: u64,
}

fn comment_key(comment_id: &str) -> Vec<u8> {
    format!("comments/{comment_id}").into_bytes()
}

fn video_index_key(video_id: &VideoId, comment_id: &str) -> Vec<u8> {
    format!("comments-by-video/{}/{comment_id}", video_id.to_hex()).into_bytes()
}

fn video_index_prefix(video_id: &VideoId) -> Vec<u8> {
    format!("comments-by-video/{}/", video_id.to_hex()).into_bytes()
}

fn reaction_key(video_id: &VideoId, author: &WriterKey) -> Vec<u8> {
    format!("reactions/{}/{}", video_id.to_hex(), author.to_hex()).into_bytes()
}

fn reactions_prefix(video_id: &VideoId) -> Vec<u8> {
    format!("reactions/{}/", video_id.to_hex()).into_bytes()
}

fn writer_key(key: &WriterKey) -> Vec<u8> {
    format!("writers/{}", key.to_hex()).into_bytes()
}

/// Read/write access to one comments ring's materialized view.
pub struct RingView<B: KvBackend> {
    store: Arc<B>,
}

impl<B: KvBackend> RingView<B> {
    #[must_use]
    pub fn new(store: Arc<B>) -> Self {
        Self { store }
    }

    pub fn comment(&self, comment_id: &str) -> Result<Option<CommentRecord>> {
        get_json(&self.store, &comment_key(comment_id))
    }

    pub fn put_comment(&self, record: &CommentRecord) -> Result<()> {
        put_json(&self.store, &comment_key(&record.comment_id), record)?;
        put_json(
            &self.store,
            &video_index_key(&record.video_id, &record.comment_id),
            &(),
        )
    }

    pub fn delete_comment(&self, comment_id: &str) -> Result<bool> {
        if let Some(record) = self.comment(comment_id)? {
            self.store.delete(&video_index_key(&record.video_id, comment_id))?;
        }
        self.store.delete(&comment_key(comment_id))
    }

    pub fn list_comments(&self, video_id: &VideoId) -> Result<Vec<CommentRecord>> {
        self.store
            .scan_prefix(&video_index_prefix(video_id))?
            .into_iter()
            .filter_map(|(key, _)| {
                let comment_id = String::from_utf8_lossy(&key).rsplit('/').next()?.to_string();
                self.comment(&comment_id).transpose()
            })
            .collect()
    }

    pub fn put_reaction(&self, record: &ReactionRecord) -> Result<()> {
        put_json(&self.store, &reaction_key(&record.video_id, &record.author), record)
    }

    pub fn delete_reaction(&self, video_id: &VideoId, author: &WriterKey) -> Result<bool> {
        self.store.delete(&reaction_key(video_id, author))
    }

    pub fn list_reactions(&self, video_id: &VideoId) -> Result<Vec<ReactionRecord>> {
        scan_json(&self.store, &reactions_prefix(video_id))
    }

    pub fn admitted_writer(&self, key: &WriterKey) -> Result<Option<RingWriterRecord>> {
        get_json(&self.store, &writer_key(key))
    }

    pub fn admit_writer(&self, record: &RingWriterRecord) -> Result<()> {
        put_json(&self.store, &writer_key(&record.writer_key), record)
    }

    pub fn is_admitted(&self, key: &WriterKey) -> Result<bool> {
        Ok(self.admitted_writer(key)?.is_some())
    }

    pub fn role_of(&self, key: &WriterKey) -> Result<Option<Role>> {
        Ok(self.admitted_writer(key)?.map(|w| w.role))
    }

    pub fn upsert_writer_role(&self, key: WriterKey, role: Role, now_millis: u64) -> Result<()> {
        let admitted_at = self.admitted_writer(&key)?.map_or(now_millis, |w| w.admitted_at);
        self.admit_writer(&RingWriterRecord {
            writer_key: key,
            role,
            admitted_at,
        })
    }
}

fn get_json<B: KvBackend, T: serde::de::DeserializeOwned>(
    store: &Arc<B>,
    key: &[u8],
) -> Result<Option<T>> {
    match store.get(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn put_json<B: KvBackend, T: serde::Serialize>(store: &Arc<B>, key: &[u8], value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    store.put(key, &bytes)
}

fn scan_json<B: KvBackend, T: serde::de::DeserializeOwned>(
    store: &Arc<B>,
    prefix: &[u8],
) -> Result<Vec<T>> {
    store
        .scan_prefix(prefix)?
        .into_iter()
        .map(|(_, v)| serde_json::from_slice(&v).map_err(newtube_core::Error::from))
        .collect()
}
