//! Conflict resolution for concurrent `UpdateChannel` ops.
//!
//! Two writers can update channel metadata between linearizer passes
//! without seeing each other's write. `merge_channel_meta` picks a
//! winner deterministically so every node that applies the same set of
//! ops converges on the same metadata, independent of apply order.

use newtube_protocol::{ChannelMetadata, Role, VideoRecord};

/// One op's precedence for the `(role, logical_clock, updated_at)` merge
/// rule below.
pub struct Candidate<'a> {
    pub role: Role,
    pub logical_clock: u64,
    pub meta: &'a ChannelMetadata,
}

/// Returns `true` if `candidate` should replace `current` as the
/// channel's metadata.
///
/// Precedence, highest first: writer role, then logical clock, then
/// wall-clock `updated_at`. Role is primary because a later op from a
/// lower-privileged writer must never override an owner's edit even if
/// it happens to carry a larger logical clock (a paired device's clock
/// can run ahead of the owner's own).
#[must_use]
pub fn should_use_new(current: &Candidate<'_>, new: &Candidate<'_>) -> bool {
    (new.role, new.logical_clock, new.meta.updated_at)
        > (current.role, current.logical_clock, current.meta.updated_at)
}

/// Same precedence as [`Candidate`]/[`should_use_new`], applied to an
/// `update-video` op instead of `update-channel`. Spec ties both ops to
/// the same `(role, logical_clock, updated_at)` tuple.
pub struct VideoCandidate<'a> {
    pub role: Role,
    pub logical_clock: u64,
    pub record: &'a VideoRecord,
}

#[must_use]
pub fn should_use_new_video(current: &VideoCandidate<'_>, new: &VideoCandidate<'_>) -> bool {
    (new.role, new.logical_clock, new.record.updated_at)
        > (current.role, current.logical_clock, current.record.updated_at)
}

/// Merges `new` into `current`, applying the same field-level precedence
/// as [`merge_channel_meta`]. `video_id`, `author`, and `created_at` are
/// immutable once set and always carried over from `current`.
#[must_use]
pub fn merge_video_meta(current: VideoCandidate<'_>, new: VideoCandidate<'_>) -> VideoRecord {
    let winner = if should_use_new_video(&current, &new) {
        new.record
    } else {
        current.record
    };

    VideoRecord {
        video_id: current.record.video_id,
        title: winner.title.clone(),
        description: winner.description.clone(),
        category: winner.category,
        duration_seconds: winner.duration_seconds,
        blob_pointer: winner.blob_pointer.clone(),
        thumbnail_blob_pointer: winner.thumbnail_blob_pointer.clone(),
        author: current.record.author,
        created_at: current.record.created_at,
        updated_at: current.record.updated_at.max(new.record.updated_at),
        updated_by: winner.updated_by,
        logical_clock: current.record.logical_clock.max(new.record.logical_clock),
    }
}

/// Merges `new` into `current`, applying field-level precedence.
///
/// `public_bee_key` and `comments_autobase_key` are sticky-first-write:
/// once any writer has set one, later `UpdateChannel` ops can never
/// clear or replace it, regardless of role or clock precedence. These
/// keys identify the channel's public mirror and comments ring; letting
/// a later op silently repoint them would strand readers already
/// following the original key.
#[must_use]
pub fn merge_channel_meta(
    current: Candidate<'_>,
    new: Candidate<'_>,
) -> ChannelMetadata {
    let winner = if should_use_new(&current, &new) {
        new.meta
    } else {
        current.meta
    };

    ChannelMetadata {
        title: winner.title.clone(),
        description: winner.description.clone(),
        avatar_blob_pointer: winner.avatar_blob_pointer.clone(),
        public_bee_key: current
            .meta
            .public_bee_key
            .clone()
            .or_else(|| new.meta.public_bee_key.clone()),
        comments_autobase_key: current
            .meta
            .comments_autobase_key
            .clone()
            .or_else(|| new.meta.comments_autobase_key.clone()),
        updated_at: current.meta.updated_at.max(new.meta.updated_at),
        updated_by: winner.updated_by,
        logical_clock: current.meta.logical_clock.max(new.meta.logical_clock),
        schema_version: winner.schema_version,
    }
}
