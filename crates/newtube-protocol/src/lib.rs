//! Op envelope data model, schema versions, and wire framing shared by
//! the log, linearizer, channel, comments, mirror, and swarm crates.

mod framing;
mod message;
mod model;
mod op;

pub use framing::{decode, encode};
pub use message::{ReplicationMessage, WriterLength};
pub use model::{
    Category, ChannelMetadata, ChannelScope, InviteRecord, Role, VectorIndexRecord,
    VideoRecord, WatchEventRecord, WriterRecord,
};
pub use op::{OpBody, OpEnvelope};
