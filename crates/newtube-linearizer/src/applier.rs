//! The pure function that turns ordered log entries into view mutations.

use newtube_core::Result;
use newtube_log::LogEntry;

/// Applies one linearized entry to a channel's materialized view.
///
/// Narrowed to a single op entry at a time since the ordering unit
/// here is one log entry, not a batch.
///
/// Implementations must be deterministic and side-effect-free beyond
/// the view they mutate: applying the same entry twice (idempotent
/// re-execution after a crash) or applying entries from two different
/// nodes that received them via different peers must produce identical
/// view state.
pub trait Applier: Send {
    /// Applies `entry` at its position `node_index` in the global
    /// linearized stream.
    fn apply(&mut self, node_index: u64, entry: &LogEntry) -> Result<()>;
}

/// An `Applier` that only records which entries it was asked to apply,
/// for tests that exercise ordering without a real channel view.
#[derive(Default)]
pub struct RecordingApplier {
    pub applied: Vec<(u64, newtube_core::WriterKey, u64)>,
}

impl Applier for RecordingApplier {
    fn apply(&mut self, node_index: u64, entry: &LogEntry) -> Result<()> {
        self.applied
            .push((node_index, entry.envelope.writer, entry.seq));
        Ok(())
    }
}
