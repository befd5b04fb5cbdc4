//! Owner-driven incremental sync: after every mutating update on a
//! channel, diff its `channel-meta/meta` and `videos/*` prefixes
//! against the last-seen snapshot and push only what changed into the
//! public mirror.

use crate::diff::{diff_snapshots, snapshot_prefix, KvDiff};
use crate::view::{MirrorMetadataPatch, VideoChange};
use crate::PublicMirror;
use newtube_core::{Error, Result, VideoId};
use newtube_protocol::{ChannelMetadata, VideoRecord};
use newtube_storage::KvBackend;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

const META_KEY: &[u8] = b"channel-meta/meta";
const VIDEOS_PREFIX: &[u8] = b"videos/";

struct Snapshot {
    meta: Vec<(Vec<u8>, Vec<u8>)>,
    videos: Vec<(Vec<u8>, Vec<u8>)>,
}

/// Watches one channel's store and mirrors only the keys that changed
/// since the last call to [`Self::sync`].
pub struct MirrorSyncer<CB: KvBackend, MB: KvBackend> {
    channel_store: Arc<CB>,
    mirror: Arc<PublicMirror<MB>>,
    last: Mutex<Snapshot>,
}

impl<CB: KvBackend, MB: KvBackend> MirrorSyncer<CB, MB> {
    /// Starts tracking `channel_store` with an empty baseline: the
    /// first `sync()` call will push everything present as an initial
    /// full diff.
    #[must_use]
    pub fn new(channel_store: Arc<CB>, mirror: Arc<PublicMirror<MB>>) -> Self {
        Self {
            channel_store,
            mirror,
            last: Mutex::new(Snapshot {
                meta: Vec::new(),
                videos: Vec::new(),
            }),
        }
    }

    /// Diffs the channel's current state against the last snapshot this
    /// syncer observed, applies the diff to the mirror, and returns
    /// `true` if anything changed.
    pub fn sync(&self) -> Result<bool> {
        let meta_now = snapshot_prefix(&*self.channel_store, META_KEY)?;
        let videos_now = snapshot_prefix(&*self.channel_store, VIDEOS_PREFIX)?;

        let mut last = self.last.lock();
        let meta_diff = diff_snapshots(&last.meta, &meta_now);
        let video_diff = diff_snapshots(&last.videos, &videos_now);
        let changed = !meta_diff.is_empty() || !video_diff.is_empty();

        for entry in meta_diff {
            if let KvDiff::Put(_, value) = entry {
                let meta: ChannelMetadata = serde_json::from_slice(&value)?;
                self.mirror.set_metadata(MirrorMetadataPatch {
                    title: Some(meta.title),
                    description: Some(meta.description),
                    avatar_blob_pointer: Some(meta.avatar_blob_pointer),
                    updated_at: Some(meta.updated_at),
                })?;
            }
        }

        let mut changes = Vec::with_capacity(video_diff.len());
        for entry in video_diff {
            match entry {
                KvDiff::Put(_, value) => {
                    let record: VideoRecord = serde_json::from_slice(&value)?;
                    changes.push(VideoChange::Put(record));
                }
                KvDiff::Delete(key) => match video_id_from_key(&key) {
                    Ok(id) => changes.push(VideoChange::Delete(id)),
                    Err(err) => warn!(%err, "skipping malformed video key in diff"),
                },
            }
        }
        if !changes.is_empty() {
            self.mirror.apply_video_changes(changes)?;
        }

        last.meta = meta_now;
        last.videos = videos_now;
        Ok(changed)
    }
}

fn video_id_from_key(key: &[u8]) -> Result<VideoId> {
    let key = std::str::from_utf8(key).map_err(|e| Error::invalid_input("video_key", e.to_string()))?;
    let hex = key
        .strip_prefix("videos/")
        .ok_or_else(|| Error::invalid_input("video_key", "missing videos/ prefix"))?;
    hex.parse()
}
