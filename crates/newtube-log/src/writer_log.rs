//! A single writer's append-only, hash-chained log.

use crate::entry::{genesis_hash, LogEntry};
use newtube_core::{Error, Result, WriterKey};
use newtube_protocol::OpEnvelope;
use newtube_storage::KvBackend;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn entry_key(writer: &WriterKey, seq: u64) -> Vec<u8> {
    format!("log/{}/{seq:020}", writer.to_hex()).into_bytes()
}

fn prefix_key(writer: &WriterKey) -> Vec<u8> {
    format!("log/{}/", writer.to_hex()).into_bytes()
}

/// An append-only, hash-chained sequence of one writer's signed
/// operations, backed by a channel's `KvBackend`.
///
/// A single `parking_lot::RwLock`-guarded append point per writer,
/// backed by durable storage rather than an in-memory vec.
pub struct WriterLog<B: KvBackend> {
    writer: WriterKey,
    store: Arc<B>,
    length: AtomicU64,
}

impl<B: KvBackend> WriterLog<B> {
    /// Opens the log for `writer` against `store`, counting existing
    /// entries to establish the current length.
    pub fn open(writer: WriterKey, store: Arc<B>) -> Result<Self> {
        let existing = store.scan_prefix(&prefix_key(&writer))?;
        Ok(Self {
            writer,
            store,
            length: AtomicU64::new(existing.len() as u64),
        })
    }

    /// The writer this log belongs to.
    #[must_use]
    pub fn writer(&self) -> WriterKey {
        self.writer
    }

    /// The number of entries appended so far.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.length.load(Ordering::Acquire)
    }

    /// Appends `envelope`, which must already be signed by this log's
    /// writer (checked by the caller — the channel engine — via
    /// `OpEnvelope::verify` before this is reached).
    pub fn append(&self, envelope: OpEnvelope) -> Result<LogEntry> {
        if envelope.writer != self.writer {
            return Err(Error::invalid_input(
                "writer",
                "envelope writer does not match this log",
            ));
        }
        let seq = self.length();
        let prev_hash = if seq == 0 {
            genesis_hash()
        } else {
            self.get(seq - 1)?
                .ok_or_else(|| Error::Internal("missing predecessor entry".into()))?
                .entry_hash
        };
        let entry = LogEntry::new(seq, prev_hash, envelope);
        let bytes = serde_json::to_vec(&entry)?;
        self.store.put(&entry_key(&self.writer, seq), &bytes)?;
        self.length.fetch_add(1, Ordering::AcqRel);
        Ok(entry)
    }

    /// Reads the entry at `seq`, if present.
    pub fn get(&self, seq: u64) -> Result<Option<LogEntry>> {
        match self.store.get(&entry_key(&self.writer, seq))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Reads all entries from `from_seq` (inclusive) to the current end,
    /// in ascending order. Used to answer a peer's replication request.
    pub fn entries_from(&self, from_seq: u64) -> Result<Vec<LogEntry>> {
        let len = self.length();
        let mut out = Vec::with_capacity(len.saturating_sub(from_seq) as usize);
        for seq in from_seq..len {
            if let Some(entry) = self.get(seq)? {
                out.push(entry);
            }
        }
        Ok(out)
    }

    /// Appends entries received from a peer during replication. Each
    /// entry's chain linkage and signature must already have been
    /// verified by the caller; this only enforces that sequence numbers
    /// are contiguous with the current length (no gaps, no rewrites).
    pub fn append_replicated(&self, entries: Vec<LogEntry>) -> Result<()> {
        for entry in entries {
            let expected_seq = self.length();
            if entry.seq != expected_seq {
                return Err(Error::conflict(format!(
                    "expected seq {expected_seq}, got {}",
                    entry.seq
                )));
            }
            let bytes = serde_json::to_vec(&entry)?;
            self.store.put(&entry_key(&self.writer, entry.seq), &bytes)?;
            self.length.fetch_add(1, Ordering::AcqRel);
        }
        Ok(())
    }

    /// Verifies the hash chain from `seq = 0` to the current length,
    /// detecting storage corruption or an out-of-band rewrite.
    pub fn verify_chain(&self) -> Result<()> {
        let mut prev_hash = genesis_hash();
        for seq in 0..self.length() {
            let entry = self
                .get(seq)?
                .ok_or_else(|| Error::Internal(format!("gap at seq {seq}")))?;
            if entry.prev_hash != prev_hash || !entry.verify() {
                return Err(Error::conflict(format!("hash chain broken at seq {seq}")));
            }
            prev_hash = entry.entry_hash;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newtube_core::VideoId;
    use newtube_identity::Keypair;
    use newtube_protocol::OpBody;
    use newtube_storage::MemoryBackend;
    use pretty_assertions::assert_eq;

    fn envelope(kp: &Keypair, clock: u64) -> OpEnvelope {
        OpEnvelope::sign(
            kp,
            clock,
            1_000 + clock,
            OpBody::DeleteVideo {
                video_id: VideoId::random(),
            },
        )
    }

    #[test]
    fn append_and_read_back() {
        let kp = Keypair::generate();
        let store = Arc::new(MemoryBackend::new());
        let log = WriterLog::open(kp.public_key().writer_key(), store).unwrap();

        log.append(envelope(&kp, 1)).unwrap();
        log.append(envelope(&kp, 2)).unwrap();

        assert_eq!(log.length(), 2);
        assert_eq!(log.get(0).unwrap().unwrap().seq, 0);
        assert_eq!(log.get(1).unwrap().unwrap().seq, 1);
    }

    #[test]
    fn rejects_entry_from_wrong_writer() {
        let kp = Keypair::generate();
        let other = Keypair::generate();
        let store = Arc::new(MemoryBackend::new());
        let log = WriterLog::open(kp.public_key().writer_key(), store).unwrap();
        let err = log.append(envelope(&other, 1)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[test]
    fn reopen_recovers_length_from_storage() {
        let kp = Keypair::generate();
        let store = Arc::new(MemoryBackend::new());
        {
            let log = WriterLog::open(kp.public_key().writer_key(), store.clone()).unwrap();
            log.append(envelope(&kp, 1)).unwrap();
            log.append(envelope(&kp, 2)).unwrap();
        }
        let reopened = WriterLog::open(kp.public_key().writer_key(), store).unwrap();
        assert_eq!(reopened.length(), 2);
    }

    #[test]
    fn verify_chain_detects_tamper() {
        let kp = Keypair::generate();
        let store = Arc::new(MemoryBackend::new());
        let log = WriterLog::open(kp.public_key().writer_key(), store.clone()).unwrap();
        log.append(envelope(&kp, 1)).unwrap();
        log.verify_chain().unwrap();

        let mut entry = log.get(0).unwrap().unwrap();
        entry.envelope.logical_clock = 999;
        let bytes = serde_json::to_vec(&entry).unwrap();
        store
            .put(&entry_key(&kp.public_key().writer_key(), 0), &bytes)
            .unwrap();

        assert!(log.verify_chain().is_err());
    }

    #[test]
    fn append_replicated_rejects_gap() {
        let kp = Keypair::generate();
        let store = Arc::new(MemoryBackend::new());
        let log = WriterLog::open(kp.public_key().writer_key(), store).unwrap();
        let e1 = LogEntry::new(1, genesis_hash(), envelope(&kp, 1));
        assert!(log.append_replicated(vec![e1]).is_err());
    }

    #[test]
    fn entries_from_returns_suffix() {
        let kp = Keypair::generate();
        let store = Arc::new(MemoryBackend::new());
        let log = WriterLog::open(kp.public_key().writer_key(), store).unwrap();
        for i in 0..5 {
            log.append(envelope(&kp, i)).unwrap();
        }
        let suffix = log.entries_from(3).unwrap();
        assert_eq!(suffix.len(), 2);
        assert_eq!(suffix[0].seq, 3);
    }
}
