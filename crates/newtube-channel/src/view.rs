//! The materialized KV view: channel metadata, videos, writers, and
//! invites, each under their own key prefix in a channel's `KvBackend`.

use newtube_core::{Error, Result, VideoId, WriterKey};
use newtube_protocol::{ChannelMetadata, InviteRecord, VectorIndexRecord, VideoRecord, WatchEventRecord, WriterRecord};
use newtube_storage::KvBackend;
use std::sync::Arc;

const META_KEY: &[u8] = b"channel-meta/meta";
/// Pointer to the channel's one currently-active invite, spec §3/§4.1
/// step 6/§6. Lives in the same `invites/` key prefix as invite records
/// themselves (`invites/current`); `list_invites`/`scan_json` must skip
/// it explicitly rather than trying to parse it as an `InviteRecord`.
const CURRENT_INVITE_KEY: &[u8] = b"invites/current";

fn video_key(id: &VideoId) -> Vec<u8> {
    format!("videos/{}", id.to_hex()).into_bytes()
}

fn writer_key(key: &WriterKey) -> Vec<u8> {
    format!("writers/{}", key.to_hex()).into_bytes()
}

fn invite_key(invite_id: &str) -> Vec<u8> {
    format!("invites/{invite_id}").into_bytes()
}

fn watch_event_key(video_id: &VideoId, event_id: &str) -> Vec<u8> {
    format!("watch-events/{}/{event_id}", video_id.to_hex()).into_bytes()
}

fn watch_events_prefix(video_id: &VideoId) -> Vec<u8> {
    format!("watch-events/{}/", video_id.to_hex()).into_bytes()
}

fn vector_key(video_id: &VideoId) -> Vec<u8> {
    format!("vectors/{}", video_id.to_hex()).into_bytes()
}

const VIDEOS_PREFIX: &[u8] = b"videos/";
const WRITERS_PREFIX: &[u8] = b"writers/";
const INVITES_PREFIX: &[u8] = b"invites/";

/// Read/write access to one channel's materialized view, generic over
/// the backing [`KvBackend`].
pub struct ChannelView<B: KvBackend> {
    store: Arc<B>,
}

impl<B: KvBackend> ChannelView<B> {
    #[must_use]
    pub fn new(store: Arc<B>) -> Self {
        Self { store }
    }

    pub fn metadata(&self) -> Result<Option<ChannelMetadata>> {
        get_json(&self.store, META_KEY)
    }

    pub fn put_metadata(&self, meta: &ChannelMetadata) -> Result<()> {
        put_json(&self.store, META_KEY, meta)
    }

    pub fn video(&self, id: &VideoId) -> Result<Option<VideoRecord>> {
        get_json(&self.store, &video_key(id))
    }

    pub fn put_video(&self, record: &VideoRecord) -> Result<()> {
        put_json(&self.store, &video_key(&record.video_id), record)
    }

    pub fn delete_video(&self, id: &VideoId) -> Result<bool> {
        self.store.delete(&video_key(id))
    }

    pub fn list_videos(&self) -> Result<Vec<VideoRecord>> {
        scan_json(&self.store, VIDEOS_PREFIX)
    }

    pub fn writer(&self, key: &WriterKey) -> Result<Option<WriterRecord>> {
        get_json(&self.store, &writer_key(key))
    }

    pub fn put_writer(&self, record: &WriterRecord) -> Result<()> {
        put_json(&self.store, &writer_key(&record.writer_key), record)
    }

    pub fn delete_writer(&self, key: &WriterKey) -> Result<bool> {
        self.store.delete(&writer_key(key))
    }

    pub fn list_writers(&self) -> Result<Vec<WriterRecord>> {
        scan_json(&self.store, WRITERS_PREFIX)
    }

    pub fn invite(&self, invite_id: &str) -> Result<Option<InviteRecord>> {
        get_json(&self.store, &invite_key(invite_id))
    }

    pub fn put_invite(&self, record: &InviteRecord) -> Result<()> {
        put_json(&self.store, &invite_key(&record.invite_id), record)
    }

    pub fn delete_invite(&self, invite_id: &str) -> Result<bool> {
        self.store.delete(&invite_key(invite_id))
    }

    pub fn list_invites(&self) -> Result<Vec<InviteRecord>> {
        self.store
            .scan_prefix(INVITES_PREFIX)?
            .into_iter()
            .filter(|(key, _)| key.as_slice() != CURRENT_INVITE_KEY)
            .map(|(_, v)| serde_json::from_slice(&v).map_err(Error::from))
            .collect()
    }

    /// The currently-active invite's id, if any. At most one invite is
    /// active at a time (invariant #3); `add-invite` sets this pointer
    /// and `delete-invite` clears it when it points at the deleted id.
    pub fn current_invite_id(&self) -> Result<Option<String>> {
        match self.store.get(CURRENT_INVITE_KEY)? {
            Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            None => Ok(None),
        }
    }

    pub fn set_current_invite(&self, invite_id: &str) -> Result<()> {
        self.store.put(CURRENT_INVITE_KEY, invite_id.as_bytes())
    }

    pub fn clear_current_invite(&self) -> Result<()> {
        self.store.delete(CURRENT_INVITE_KEY)?;
        Ok(())
    }

    pub fn watch_event(&self, video_id: &VideoId, event_id: &str) -> Result<Option<WatchEventRecord>> {
        get_json(&self.store, &watch_event_key(video_id, event_id))
    }

    pub fn put_watch_event(&self, record: &WatchEventRecord) -> Result<()> {
        put_json(
            &self.store,
            &watch_event_key(&record.video_id, &record.event_id),
            record,
        )
    }

    pub fn list_watch_events(&self, video_id: &VideoId) -> Result<Vec<WatchEventRecord>> {
        scan_json(&self.store, &watch_events_prefix(video_id))
    }

    pub fn vector_index(&self, video_id: &VideoId) -> Result<Option<VectorIndexRecord>> {
        get_json(&self.store, &vector_key(video_id))
    }

    pub fn put_vector_index(&self, record: &VectorIndexRecord) -> Result<()> {
        put_json(&self.store, &vector_key(&record.video_id), record)
    }

    /// Looks up the role a writer currently holds, re-derived from the
    /// view rather than cached at mutation time, since a writer may be
    /// removed between when an op was authored and when it is applied.
    pub fn role_of(&self, key: &WriterKey) -> Result<Option<newtube_protocol::Role>> {
        Ok(self.writer(key)?.map(|w| w.role))
    }

    pub fn channel_not_found(&self) -> Error {
        Error::not_found("channel-metadata", "unset")
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
        .map(|(_, v)| serde_json::from_slice(&v).map_err(Error::from))
        .collect()
}
