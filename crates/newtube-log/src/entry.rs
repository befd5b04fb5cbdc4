//! A single hash-chained append-log entry.

use newtube_protocol::OpEnvelope;
use serde::{Deserialize, Serialize};

/// One entry in a writer's append log: the signed op, its position, and
/// the hash chaining it to its predecessor.
///
/// A chained-block shape, but keyed by a per-writer sequence number
/// rather than a global block height, since each writer's log is
/// independent — there is no cross-writer total order until the
/// linearizer runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position in this writer's log, starting at 0.
    pub seq: u64,
    /// Hash of the preceding entry, or `[0; 32]` for `seq == 0`.
    pub prev_hash: [u8; 32],
    /// `blake3(prev_hash || canonical_json(envelope))`.
    pub entry_hash: [u8; 32],
    pub envelope: OpEnvelope,
}

impl LogEntry {
    /// Computes the hash chaining `envelope` onto `prev_hash`.
    #[must_use]
    pub fn compute_hash(prev_hash: &[u8; 32], envelope: &OpEnvelope) -> [u8; 32] {
        let body = serde_json::to_vec(envelope).expect("OpEnvelope always serializes");
        let mut hasher = blake3::Hasher::new();
        hasher.update(prev_hash);
        hasher.update(&body);
        *hasher.finalize().as_bytes()
    }

    /// Builds the entry at `seq`, chaining onto `prev_hash`.
    #[must_use]
    pub fn new(seq: u64, prev_hash: [u8; 32], envelope: OpEnvelope) -> Self {
        let entry_hash = Self::compute_hash(&prev_hash, &envelope);
        Self {
            seq,
            prev_hash,
            entry_hash,
            envelope,
        }
    }

    /// Returns true if `entry_hash` is actually the hash of
    /// `prev_hash || envelope`, i.e. this entry was not corrupted or
    /// rewritten on disk.
    #[must_use]
    pub fn verify(&self) -> bool {
        Self::compute_hash(&self.prev_hash, &self.envelope) == self.entry_hash
    }
}

/// The hash chain's genesis value, used as `prev_hash` for `seq == 0`.
#[must_use]
pub const fn genesis_hash() -> [u8; 32] {
    [0u8; 32]
}
