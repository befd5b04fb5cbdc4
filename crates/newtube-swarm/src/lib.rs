//! Discovery, replication, and sync orchestration wiring.
//!
//! This crate owns the bookkeeping that sits between the network
//! transport (an external collaborator, out of scope here) and the
//! channel engine: idempotent per-connection attach tracking, discovery
//! topic fan-out, bounded-wait defaults, and the initial-sync state
//! machine.

mod discovery;
mod scope;
mod sync;
mod timeouts;

pub use discovery::{DiscoverySwarm, PeerEndpoint};
pub use scope::{AttachRegistry, ConnectionId, ConnectionIdAllocator, ScopeKind};
pub use sync::{wait_for_initial_sync, InitialSyncProbe, SyncState};
pub use timeouts::Timeouts;
