//! Merges every writer's append log into one deterministic, causally
//! consistent stream and folds it into the materialized view via an
//! [`Applier`].

use crate::applier::Applier;
use crate::migrate::MigrationRegistry;
use crate::state::LinearizerState;
use newtube_core::{Error, Result, WriterKey};
use newtube_log::{AppendLog, LogEntry};
use newtube_storage::KvBackend;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

const CHECKPOINT_KEY: &[u8] = b"linearizer/checkpoint";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Checkpoint {
    node_index: u64,
    /// Next unapplied sequence number per writer, keyed by hex-encoded
    /// writer key (`serde_json` maps require string keys).
    applied: HashMap<String, u64>,
}

impl Checkpoint {
    fn applied_seq(&self, writer: &WriterKey) -> u64 {
        self.applied.get(&writer.to_hex()).copied().unwrap_or(0)
    }

    fn set_applied_seq(&mut self, writer: &WriterKey, next_seq: u64) {
        self.applied.insert(writer.to_hex(), next_seq);
    }
}

/// Orders and applies entries from every writer log attached to one
/// channel.
///
/// Determinism contract: two nodes that have replicated the same set of
/// log entries compute the same `node_index` assignment and the same
/// resulting view, regardless of the order replication happened to
/// deliver entries in. This is achieved by sorting the *unapplied*
/// entries collected in one `update()` pass by
/// `(created_at, writer, seq)` before applying them — a total order
/// since `(writer, seq)` is unique per entry.
///
/// An event loop that drains pending work, advances state, and
/// notifies, with no BFT voting or view-change machinery: the writer
/// set is signature-authenticated and ACL-gated (see
/// `newtube_channel`), so ordering is just a deterministic sort, not a
/// vote.
pub struct Linearizer<B: KvBackend> {
    store: Arc<B>,
    migrations: MigrationRegistry,
    state: LinearizerState,
    checkpoint: Checkpoint,
}

impl<B: KvBackend> Linearizer<B> {
    /// Opens the linearizer against `store` (the same channel-scoped
    /// store the `AppendLog` and view use), restoring its checkpoint if
    /// one was persisted by a previous run.
    pub fn open(store: Arc<B>) -> Result<Self> {
        let checkpoint = match store.get(CHECKPOINT_KEY)? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => Checkpoint::default(),
        };
        Ok(Self {
            store,
            migrations: MigrationRegistry::new(),
            state: LinearizerState::Idle,
            checkpoint,
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LinearizerState {
        self.state
    }

    /// The next global position that will be assigned.
    #[must_use]
    pub fn node_index(&self) -> u64 {
        self.checkpoint.node_index
    }

    /// Folds every unapplied entry across `append_log`'s opened writers
    /// into `applier`, in deterministic order. Returns the number of
    /// entries applied.
    pub fn update(&mut self, append_log: &AppendLog<B>, applier: &mut dyn Applier) -> Result<u64> {
        self.state = LinearizerState::Updating;

        let mut pending: Vec<LogEntry> = Vec::new();
        for writer in append_log.open_writers() {
            let writer_log = append_log.writer_log(writer)?;
            let from_seq = self.checkpoint.applied_seq(&writer);
            for entry in writer_log.entries_from(from_seq)? {
                if !entry.verify() {
                    self.state = LinearizerState::Failed;
                    return Err(Error::conflict(format!(
                        "hash chain broken for writer {writer} at seq {}",
                        entry.seq
                    )));
                }
                pending.push(entry);
            }
        }

        pending.sort_by(|a, b| {
            a.envelope
                .created_at
                .cmp(&b.envelope.created_at)
                .then_with(|| a.envelope.writer.cmp(&b.envelope.writer))
                .then_with(|| a.seq.cmp(&b.seq))
        });

        let applied_count = pending.len() as u64;
        for mut entry in pending {
            entry.envelope = self.migrations.migrate(entry.envelope);
            let node_index = self.checkpoint.node_index;
            debug!(
                node_index,
                writer = %entry.envelope.writer,
                seq = entry.seq,
                op = entry.envelope.body.kind(),
                "applying linearized entry"
            );
            if let Err(err) = applier.apply(node_index, &entry) {
                warn!(%err, writer = %entry.envelope.writer, seq = entry.seq, "applier rejected entry, skipping");
            }
            self.checkpoint.node_index += 1;
            self.checkpoint
                .set_applied_seq(&entry.envelope.writer, entry.seq + 1);
        }

        self.persist_checkpoint()?;
        self.state = LinearizerState::Idle;
        Ok(applied_count)
    }

    fn persist_checkpoint(&self) -> Result<()> {
        let bytes = serde_json::to_vec(&self.checkpoint)?;
        self.store.put(CHECKPOINT_KEY, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applier::RecordingApplier;
    use newtube_core::VideoId;
    use newtube_identity::Keypair;
    use newtube_protocol::OpBody;
    use newtube_storage::MemoryBackend;
    use pretty_assertions::assert_eq;

    fn envelope(kp: &Keypair, clock: u64, created_at: u64) -> newtube_protocol::OpEnvelope {
        newtube_protocol::OpEnvelope::sign(
            kp,
            clock,
            created_at,
            OpBody::DeleteVideo {
                video_id: VideoId::random(),
            },
        )
    }

    #[test]
    fn applies_entries_in_created_at_order_regardless_of_append_order() {
        let store = Arc::new(MemoryBackend::new());
        let append_log = AppendLog::new(store.clone());
        let kp_a = Keypair::generate();
        let kp_b = Keypair::generate();

        // b's entry has an earlier created_at but is appended after a's.
        append_log
            .writer_log(kp_a.public_key().writer_key())
            .unwrap()
            .append(envelope(&kp_a, 1, 2_000))
            .unwrap();
        append_log
            .writer_log(kp_b.public_key().writer_key())
            .unwrap()
            .append(envelope(&kp_b, 1, 1_000))
            .unwrap();

        let mut linearizer = Linearizer::open(store).unwrap();
        let mut applier = RecordingApplier::default();
        let applied = linearizer.update(&append_log, &mut applier).unwrap();

        assert_eq!(applied, 2);
        assert_eq!(applier.applied[0].1, kp_b.public_key().writer_key());
        assert_eq!(applier.applied[1].1, kp_a.public_key().writer_key());
    }

    #[test]
    fn second_update_only_applies_new_entries() {
        let store = Arc::new(MemoryBackend::new());
        let append_log = AppendLog::new(store.clone());
        let kp = Keypair::generate();
        let writer_log = append_log.writer_log(kp.public_key().writer_key()).unwrap();
        writer_log.append(envelope(&kp, 1, 1_000)).unwrap();

        let mut linearizer = Linearizer::open(store.clone()).unwrap();
        let mut applier = RecordingApplier::default();
        assert_eq!(linearizer.update(&append_log, &mut applier).unwrap(), 1);
        assert_eq!(linearizer.update(&append_log, &mut applier).unwrap(), 0);

        writer_log.append(envelope(&kp, 2, 2_000)).unwrap();
        assert_eq!(linearizer.update(&append_log, &mut applier).unwrap(), 1);
        assert_eq!(applier.applied.len(), 2);
    }

    #[test]
    fn checkpoint_survives_reopen() {
        let store = Arc::new(MemoryBackend::new());
        let append_log = AppendLog::new(store.clone());
        let kp = Keypair::generate();
        append_log
            .writer_log(kp.public_key().writer_key())
            .unwrap()
            .append(envelope(&kp, 1, 1_000))
            .unwrap();

        {
            let mut linearizer = Linearizer::open(store.clone()).unwrap();
            let mut applier = RecordingApplier::default();
            linearizer.update(&append_log, &mut applier).unwrap();
        }

        let reopened = Linearizer::open(store).unwrap();
        assert_eq!(reopened.node_index(), 1);
    }

    #[test]
    fn idempotent_reexecution_yields_same_node_index_assignment() {
        // Running update() twice on an unchanged log must not re-apply
        // or re-number anything.
        let store = Arc::new(MemoryBackend::new());
        let append_log = AppendLog::new(store.clone());
        let kp = Keypair::generate();
        append_log
            .writer_log(kp.public_key().writer_key())
            .unwrap()
            .append(envelope(&kp, 1, 1_000))
            .unwrap();

        let mut linearizer = Linearizer::open(store).unwrap();
        let mut applier = RecordingApplier::default();
        linearizer.update(&append_log, &mut applier).unwrap();
        let first_index = linearizer.node_index();
        linearizer.update(&append_log, &mut applier).unwrap();
        assert_eq!(linearizer.node_index(), first_index);
    }
}
