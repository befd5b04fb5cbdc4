//! RocksDB-backed `KvBackend`, the durable store behind a channel's
//! materialized view and the public mirror.

use crate::traits::{KvBackend, StorageBackend, StorageStats};
use newtube_core::{Error, Result};
use rocksdb::{IteratorMode, Options, DB};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// A RocksDB-backed key-value store.
pub struct RocksBackend {
    db: DB,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl RocksBackend {
    fn db_options() -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }
}

impl KvBackend for RocksBackend {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.db
            .put(key, value)
            .map_err(|e| Error::Internal(format!("rocksdb put failed: {e}")))
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.db
            .get(key)
            .map_err(|e| Error::Internal(format!("rocksdb get failed: {e}")))
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        let existed = self.contains(key)?;
        self.db
            .delete(key)
            .map_err(|e| Error::Internal(format!("rocksdb delete failed: {e}")))?;
        Ok(existed)
    }

    fn len(&self) -> Result<usize> {
        Ok(self
            .db
            .iterator(IteratorMode::Start)
            .filter_map(std::result::Result::ok)
            .count())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mode = IteratorMode::From(prefix, rocksdb::Direction::Forward);
        let iter = self.db.iterator(mode);
        let mut out = Vec::new();
        for item in iter {
            let (k, v) = item.map_err(|e| Error::Internal(format!("rocksdb scan failed: {e}")))?;
            if !k.starts_with(prefix) {
                break;
            }
            out.push((k.to_vec(), v.to_vec()));
        }
        Ok(out)
    }

    fn batch_put(&self, entries: Vec<(Vec<u8>, Vec<u8>)>) -> Result<()> {
        let mut batch = rocksdb::WriteBatch::default();
        for (k, v) in &entries {
            batch.put(k, v);
        }
        self.writes.fetch_add(entries.len() as u64, Ordering::Relaxed);
        self.db
            .write(batch)
            .map_err(|e| Error::Internal(format!("rocksdb batch write failed: {e}")))
    }

    fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| Error::Internal(format!("rocksdb flush failed: {e}")))
    }

    fn compact(&self) -> Result<()> {
        self.db.compact_range::<&[u8], &[u8]>(None, None);
        Ok(())
    }
}

impl StorageBackend for RocksBackend {
    fn open(path: &Path) -> Result<Self> {
        let db = DB::open(&Self::db_options(), path)
            .map_err(|e| Error::Internal(format!("failed to open rocksdb at {path:?}: {e}")))?;
        Ok(Self {
            db,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        })
    }

    fn stats(&self) -> StorageStats {
        let entry_count = self.len().unwrap_or(0) as u64;
        StorageStats {
            entry_count,
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            ..Default::default()
        }
    }
}
