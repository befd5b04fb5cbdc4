//! A registry of per-channel stores, opened lazily and keyed by
//! [`ChannelKey`]. This is the storage-layer analogue of a Hypercore
//! Corestore: one node process holds many independent channels, each
//! backed by its own durable store under a shared base directory.

use crate::traits::StorageBackend;
use newtube_core::{ChannelKey, Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Opens and caches one `B` per channel under `base_path/<channel-key-hex>`.
pub struct CoreStore<B: StorageBackend> {
    base_path: PathBuf,
    stores: RwLock<HashMap<ChannelKey, Arc<B>>>,
}

impl<B: StorageBackend> CoreStore<B> {
    /// Creates a registry rooted at `base_path`. The directory is created
    /// lazily, on first `get_or_create`.
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the store for `channel`, opening it if this is the first
    /// access in this process. Idempotent: repeated calls for the same
    /// channel return the same handle.
    pub fn get_or_create(&self, channel: ChannelKey) -> Result<Arc<B>> {
        if let Some(existing) = self.stores.read().get(&channel) {
            return Ok(existing.clone());
        }

        let mut stores = self.stores.write();
        if let Some(existing) = stores.get(&channel) {
            return Ok(existing.clone());
        }

        let path = self.base_path.join(channel.to_hex());
        std::fs::create_dir_all(&path)?;
        let backend = Arc::new(B::open(&path)?);
        stores.insert(channel, backend.clone());
        Ok(backend)
    }

    /// Returns the store for `channel` only if it has already been opened
    /// in this process.
    #[must_use]
    pub fn get(&self, channel: &ChannelKey) -> Option<Arc<B>> {
        self.stores.read().get(channel).cloned()
    }

    /// Lists the channels currently open in this process.
    #[must_use]
    pub fn open_channels(&self) -> Vec<ChannelKey> {
        self.stores.read().keys().copied().collect()
    }

    /// Closes and drops the handle for `channel`. Subsequent access
    /// reopens it from disk.
    pub fn close(&self, channel: &ChannelKey) -> Result<()> {
        let removed = self.stores.write().remove(channel);
        if let Some(backend) = removed {
            backend.flush()?;
        }
        Ok(())
    }
}

impl<B: StorageBackend> std::fmt::Debug for CoreStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreStore")
            .field("base_path", &self.base_path)
            .field("open_channels", &self.stores.read().len())
            .finish()
    }
}

/// Error raised when a channel scope cannot be resolved.
pub fn channel_not_found(channel: &ChannelKey) -> Error {
    Error::not_found("channel", channel.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rocks::RocksBackend;
    use crate::traits::KvBackend;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn get_or_create_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = CoreStore::<RocksBackend>::new(dir.path());
        let channel = ChannelKey::random();

        let a = store.get_or_create(channel).unwrap();
        let b = store.get_or_create(channel).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn distinct_channels_get_distinct_stores() {
        let dir = tempdir().unwrap();
        let store = CoreStore::<RocksBackend>::new(dir.path());
        let c1 = ChannelKey::random();
        let c2 = ChannelKey::random();

        let s1 = store.get_or_create(c1).unwrap();
        let s2 = store.get_or_create(c2).unwrap();

        s1.put(b"k", b"1").unwrap();
        s2.put(b"k", b"2").unwrap();
        assert_eq!(s1.get(b"k").unwrap(), Some(b"1".to_vec()));
        assert_eq!(s2.get(b"k").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn get_without_create_returns_none_until_opened() {
        let dir = tempdir().unwrap();
        let store = CoreStore::<RocksBackend>::new(dir.path());
        let channel = ChannelKey::random();
        assert!(store.get(&channel).is_none());
        store.get_or_create(channel).unwrap();
        assert!(store.get(&channel).is_some());
    }
}
