//! A channel's full set of per-writer logs.

use crate::writer_log::WriterLog;
use newtube_core::{Result, WriterKey};
use newtube_storage::KvBackend;
use std::sync::Arc;

use dashmap::DashMap;

/// All of a channel's writer logs, opened lazily and cached by writer
/// key in a concurrent map, since multiple async tasks may touch
/// different writers' logs at once.
pub struct AppendLog<B: KvBackend> {
    store: Arc<B>,
    writer_logs: DashMap<WriterKey, Arc<WriterLog<B>>>,
}

impl<B: KvBackend> AppendLog<B> {
    /// Wraps `store`, which must already be scoped to one channel (e.g.
    /// a handle from `newtube_storage::CoreStore`).
    #[must_use]
    pub fn new(store: Arc<B>) -> Self {
        Self {
            store,
            writer_logs: DashMap::new(),
        }
    }

    /// Returns (opening if needed) the log for `writer`.
    pub fn writer_log(&self, writer: WriterKey) -> Result<Arc<WriterLog<B>>> {
        if let Some(existing) = self.writer_logs.get(&writer) {
            return Ok(existing.clone());
        }
        let log = Arc::new(WriterLog::open(writer, self.store.clone())?);
        self.writer_logs.insert(writer, log.clone());
        Ok(log)
    }

    /// The writers this process has opened a log for. Does not include
    /// writers with entries on disk that have not yet been accessed in
    /// this process — callers that need the full writer set should
    /// consult the channel's materialized `writers/*` view instead.
    #[must_use]
    pub fn open_writers(&self) -> Vec<WriterKey> {
        self.writer_logs.iter().map(|e| *e.key()).collect()
    }

    /// Current length of every opened writer's log, for building an
    /// `Announce` replication message.
    pub fn lengths(&self) -> Vec<(WriterKey, u64)> {
        self.writer_logs
            .iter()
            .map(|e| (*e.key(), e.value().length()))
            .collect()
    }
}
