//! Ordered key-value storage for newtube's content-addressed view (B),
//! the public mirror, and the per-channel Corestore-style registry.

mod corestore;
mod memory;
mod rocks;
mod traits;

pub use corestore::CoreStore;
pub use memory::MemoryBackend;
pub use rocks::RocksBackend;
pub use traits::{KvBackend, StorageBackend, StorageStats};
