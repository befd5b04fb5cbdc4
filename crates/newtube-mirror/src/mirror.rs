//! The public mirror: a read-only, single-writer projection of one
//! channel, kept in sync by the channel's owner for discovery by
//! readers who never open the channel's own log.

use crate::view::{MirrorMetadataPatch, MirrorView, VideoChange};
use newtube_channel::ChannelView;
use newtube_core::Result;
use newtube_protocol::VideoRecord;
use newtube_storage::KvBackend;
use std::sync::Arc;
use std::time::Duration;

const LIST_VIDEOS_POLL_INTERVAL: Duration = Duration::from_millis(200);
const LIST_VIDEOS_MAX_WAIT: Duration = Duration::from_secs(4);

/// The public mirror's mutator surface. Only the channel owner's
/// sync path (see [`crate::syncer::MirrorSyncer`]) is expected to call
/// the write methods; non-owner callers never write to the mirror.
pub struct PublicMirror<B: KvBackend> {
    view: MirrorView<B>,
}

impl<B: KvBackend> PublicMirror<B> {
    #[must_use]
    pub fn new(store: Arc<B>) -> Self {
        Self {
            view: MirrorView::new(store),
        }
    }

    pub fn get_metadata(&self) -> Result<Option<crate::view::MirrorMetadata>> {
        self.view.get_metadata()
    }

    pub fn set_metadata(&self, patch: MirrorMetadataPatch) -> Result<()> {
        self.view.set_metadata(patch)
    }

    pub fn put_video(&self, record: &VideoRecord) -> Result<()> {
        self.view.put_video(record)
    }

    pub fn delete_video(&self, id: &newtube_core::VideoId) -> Result<bool> {
        self.view.delete_video(id)
    }

    pub fn apply_video_changes(&self, changes: Vec<VideoChange>) -> Result<()> {
        self.view.apply_video_changes(changes)
    }

    pub fn list_videos(&self) -> Result<Vec<VideoRecord>> {
        self.view.list_videos()
    }

    /// Like [`Self::list_videos`], but if the mirror is locally empty
    /// this waits up to 4s, re-polling every 200ms, for the owner-driven
    /// sync to populate it before giving up and returning whatever is
    /// (still) there.
    pub async fn list_videos_with_wait(&self) -> Result<Vec<VideoRecord>> {
        let deadline = tokio::time::Instant::now() + LIST_VIDEOS_MAX_WAIT;
        loop {
            let videos = self.view.list_videos()?;
            if !videos.is_empty() || tokio::time::Instant::now() >= deadline {
                return Ok(videos);
            }
            tokio::time::sleep(LIST_VIDEOS_POLL_INTERVAL).await;
        }
    }

    /// One-shot full copy of a channel's metadata and videos, used to
    /// bootstrap a freshly created mirror (as opposed to the ongoing
    /// incremental sync in [`crate::syncer::MirrorSyncer`]).
    pub fn sync_from_channel<CB: KvBackend>(&self, channel_view: &ChannelView<CB>) -> Result<()> {
        if let Some(meta) = channel_view.metadata()? {
            self.view.set_metadata(MirrorMetadataPatch {
                title: Some(meta.title),
                description: Some(meta.description),
                avatar_blob_pointer: Some(meta.avatar_blob_pointer),
                updated_at: Some(meta.updated_at),
            })?;
        }
        for video in channel_view.list_videos()? {
            self.view.put_video(&video)?;
        }
        Ok(())
    }
}
