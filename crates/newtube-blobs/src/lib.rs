//! Content-addressed bulk blob storage.
//!
//! A blob (video bytes, a thumbnail) is split into fixed-size blocks
//! and referenced by an opaque [`BlobPointer`] string stored inline in
//! a video record. The store is multi-writer at the process level but
//! each underlying `KvBackend` scope is single-writer, mirroring
//! `newtube_storage::CoreStore`'s per-channel scoping.

mod pointer;
mod store;

pub use pointer::BlobPointer;
pub use store::{BlobReadStream, BlobStore, BLOCK_SIZE};
