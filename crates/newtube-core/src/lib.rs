//! Core identifiers, error types, and time utilities shared across the
//! newtube crates.

mod error;
mod key;
mod time;

pub use error::{Error, Result};
pub use key::{BlobsCoreKey, BootstrapKey, ChannelKey, DiscoveryTopic, VideoId, WriterKey};
pub use time::now_millis;

/// Current on-disk/on-wire schema version. Bump when `Op` gains a variant
/// or an existing record's field semantics change, and add a migration in
/// `newtube_linearizer::migrate`.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;
