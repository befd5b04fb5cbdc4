//! The single-writer public mirror.
//!
//! A read-only discovery projection of one channel's metadata and
//! video list, kept current by the owner via [`syncer::MirrorSyncer`]
//! rather than by replicating the channel's own causal log. Readers
//! who only want to browse a channel's videos never need to open its
//! Linearizer.

mod diff;
mod mirror;
mod syncer;
mod view;

pub use diff::{diff_snapshots, snapshot_prefix, KvDiff};
pub use mirror::PublicMirror;
pub use syncer::MirrorSyncer;
pub use view::{MirrorMetadata, MirrorMetadataPatch, MirrorView, VideoChange};
