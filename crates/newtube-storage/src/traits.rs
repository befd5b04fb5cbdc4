//! Key-value backend trait.
//!
//! This is the storage substrate for the content-addressed KV view (B): a
//! channel's materialized state, the public mirror's single-writer store,
//! and the blob store's block index are all, at bottom, an ordered
//! key-value map. Implementations include an in-memory map (used by the
//! channel engine's tests and by ephemeral nodes) and RocksDB.

use newtube_core::Result;
use std::sync::Arc;

/// Trait for ordered key-value storage backends.
pub trait KvBackend: Send + Sync {
    /// Stores a value under `key`, overwriting any existing value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Retrieves the value stored under `key`, if any.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Checks whether `key` is present.
    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Deletes `key`, returning true if it was present.
    fn delete(&self, key: &[u8]) -> Result<bool>;

    /// Returns the number of entries in the store.
    fn len(&self) -> Result<usize>;

    /// Returns true if the store has no entries.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Lists all `(key, value)` pairs whose key starts with `prefix`, in
    /// ascending key order. Used by the public mirror's incremental diff
    /// sync to enumerate `videos/*` and by the channel engine to list
    /// writers/videos.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Batch put for improved throughput during replay/replication catch-up.
    fn batch_put(&self, entries: Vec<(Vec<u8>, Vec<u8>)>) -> Result<()> {
        for (k, v) in entries {
            self.put(&k, &v)?;
        }
        Ok(())
    }

    /// Flushes any pending writes to durable storage.
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Compacts the storage to reclaim space.
    fn compact(&self) -> Result<()> {
        Ok(())
    }
}

impl<T: KvBackend> KvBackend for Arc<T> {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).put(key, value)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        (**self).contains(key)
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        (**self).delete(key)
    }

    fn len(&self) -> Result<usize> {
        (**self).len()
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        (**self).scan_prefix(prefix)
    }

    fn batch_put(&self, entries: Vec<(Vec<u8>, Vec<u8>)>) -> Result<()> {
        (**self).batch_put(entries)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn compact(&self) -> Result<()> {
        (**self).compact()
    }
}

/// High-level storage backend trait with lifecycle management.
pub trait StorageBackend: KvBackend {
    /// Opens or creates the storage at the given path.
    fn open(path: &std::path::Path) -> Result<Self>
    where
        Self: Sized;

    /// Closes the storage, flushing any pending data.
    fn close(&self) -> Result<()> {
        self.flush()
    }

    /// Returns storage statistics.
    fn stats(&self) -> StorageStats {
        StorageStats::default()
    }
}

/// Storage statistics, surfaced for operator diagnostics.
#[derive(Debug, Clone, Default)]
pub struct StorageStats {
    /// Total number of entries.
    pub entry_count: u64,
    /// Total size of all values in bytes.
    pub total_size_bytes: u64,
    /// Size of storage on disk (if applicable).
    pub disk_size_bytes: Option<u64>,
    /// Number of read operations served.
    pub reads: u64,
    /// Number of write operations served.
    pub writes: u64,
    /// Cache hit ratio, if caching is enabled.
    pub cache_hit_ratio: Option<f64>,
}
