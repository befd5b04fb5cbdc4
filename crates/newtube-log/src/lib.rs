//! The per-writer hash-chained Append Log (L).

mod append_log;
mod entry;
mod writer_log;

pub use append_log::AppendLog;
pub use entry::{genesis_hash, LogEntry};
pub use writer_log::WriterLog;
