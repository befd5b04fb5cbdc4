//! Deterministic ordering of per-writer append-log entries into one
//! causally consistent stream (LZ), and schema migration of entries as
//! they cross that boundary.

mod applier;
mod linearizer;
mod migrate;
mod state;

pub use applier::{Applier, RecordingApplier};
pub use linearizer::Linearizer;
pub use migrate::MigrationRegistry;
pub use state::LinearizerState;
