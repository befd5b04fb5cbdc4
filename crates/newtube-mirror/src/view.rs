//! The mirror's own storage: a single-writer, append-only projection of
//! one channel's public metadata and video list.

use newtube_core::Result;
use newtube_protocol::VideoRecord;
use newtube_storage::KvBackend;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const META_KEY: &[u8] = b"channel-meta/meta";
const VIDEOS_PREFIX: &[u8] = b"videos/";

fn video_key(id: &newtube_core::VideoId) -> Vec<u8> {
    format!("videos/{}", id.to_hex()).into_bytes()
}

/// The public projection of channel metadata: `type`, `schema_version`,
/// and `logical_clock` are internal-only and never published.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorMetadata {
    pub title: String,
    pub description: String,
    pub avatar_blob_pointer: Option<String>,
    pub updated_at: u64,
}

/// A partial update to [`MirrorMetadata`]; unset fields preserve
/// whatever the mirror already has published.
#[derive(Debug, Clone, Default)]
pub struct MirrorMetadataPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub avatar_blob_pointer: Option<Option<String>>,
    pub updated_at: Option<u64>,
}

/// One change to apply via [`MirrorView::apply_video_changes`].
#[derive(Debug, Clone)]
pub enum VideoChange {
    Put(VideoRecord),
    Delete(newtube_core::VideoId),
}

/// Read/write access to the mirror's own `KvBackend`.
pub struct MirrorView<B: KvBackend> {
    store: Arc<B>,
}

impl<B: KvBackend> MirrorView<B> {
    #[must_use]
    pub fn new(store: Arc<B>) -> Self {
        Self { store }
    }

    pub fn get_metadata(&self) -> Result<Option<MirrorMetadata>> {
        match self.store.get(META_KEY)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Merges `patch` into whatever metadata is already published;
    /// previously published keys are never lost by omission.
    pub fn set_metadata(&self, patch: MirrorMetadataPatch) -> Result<()> {
        let mut current = self.get_metadata()?.unwrap_or_default();
        if let Some(title) = patch.title {
            current.title = title;
        }
        if let Some(description) = patch.description {
            current.description = description;
        }
        if let Some(avatar) = patch.avatar_blob_pointer {
            current.avatar_blob_pointer = avatar;
        }
        if let Some(updated_at) = patch.updated_at {
            current.updated_at = updated_at;
        }
        let bytes = serde_json::to_vec(&current)?;
        self.store.put(META_KEY, &bytes)
    }

    pub fn put_video(&self, record: &VideoRecord) -> Result<()> {
        let bytes = serde_json::to_vec(record)?;
        self.store.put(&video_key(&record.video_id), &bytes)
    }

    pub fn delete_video(&self, id: &newtube_core::VideoId) -> Result<bool> {
        self.store.delete(&video_key(id))
    }

    pub fn apply_video_changes(&self, changes: Vec<VideoChange>) -> Result<()> {
        for change in changes {
            match change {
                VideoChange::Put(record) => self.put_video(&record)?,
                VideoChange::Delete(id) => {
                    self.delete_video(&id)?;
                }
            }
        }
        Ok(())
    }

    /// Scans `videos/*`, sorted newest-first.
    pub fn list_videos(&self) -> Result<Vec<VideoRecord>> {
        let mut videos: Vec<VideoRecord> = self
            .store
            .scan_prefix(VIDEOS_PREFIX)?
            .into_iter()
            .map(|(_, v)| serde_json::from_slice(&v).map_err(newtube_core::Error::from))
            .collect::<Result<_>>()?;
        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(videos)
    }
}
