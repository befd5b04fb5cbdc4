//! Per-connection replication messages exchanged once a swarm peer has
//! attached to a channel scope.
//!
//! A sync-handshake message dispatch (announce → diff → request →
//! data → ack), generalized from git objects/refs to append-log
//! entries keyed by writer and sequence number.

use newtube_core::{ChannelKey, WriterKey};
use serde::{Deserialize, Serialize};

use crate::op::OpEnvelope;

/// A `(writer, length)` pair, i.e. "this writer's log has this many
/// entries", used by both sides of a connection to diff their append
/// logs without transferring entries they already share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterLength {
    pub writer: WriterKey,
    pub length: u64,
}

/// Messages exchanged between two peers replicating the same channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ReplicationMessage {
    /// Announces this channel is of interest and advertises the sender's
    /// current per-writer log lengths.
    Announce {
        channel: ChannelKey,
        lengths: Vec<WriterLength>,
    },
    /// Requests missing entries for one writer, starting at `from_seq`
    /// (the requester's current length for that writer).
    Request {
        channel: ChannelKey,
        writer: WriterKey,
        from_seq: u64,
    },
    /// The requested range of signed entries, in ascending sequence
    /// order. Empty when the requester was already caught up.
    Entries {
        channel: ChannelKey,
        writer: WriterKey,
        entries: Vec<OpEnvelope>,
    },
    /// Sent whenever a writer's log length increases, so idle peers
    /// learn about new entries without polling.
    LengthUpdate { channel: ChannelKey, length: WriterLength },
}

impl ReplicationMessage {
    /// The channel this message concerns, for routing to the right
    /// per-channel linearizer attach point.
    #[must_use]
    pub fn channel(&self) -> ChannelKey {
        match self {
            Self::Announce { channel, .. }
            | Self::Request { channel, .. }
            | Self::Entries { channel, .. }
            | Self::LengthUpdate { channel, .. } => *channel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing;
    use pretty_assertions::assert_eq;

    #[test]
    fn announce_roundtrips_through_framing() {
        let msg = ReplicationMessage::Announce {
            channel: ChannelKey::random(),
            lengths: vec![WriterLength {
                writer: WriterKey::random(),
                length: 7,
            }],
        };
        let frame = framing::encode(&msg).unwrap();
        let (decoded, _): (ReplicationMessage, usize) = framing::decode(&frame).unwrap();
        assert_eq!(decoded.channel(), msg.channel());
    }

    #[test]
    fn channel_accessor_covers_every_variant() {
        let channel = ChannelKey::random();
        let writer = WriterKey::random();
        let variants = vec![
            ReplicationMessage::Announce {
                channel,
                lengths: vec![],
            },
            ReplicationMessage::Request {
                channel,
                writer,
                from_seq: 0,
            },
            ReplicationMessage::Entries {
                channel,
                writer,
                entries: vec![],
            },
            ReplicationMessage::LengthUpdate {
                channel,
                length: WriterLength { writer, length: 1 },
            },
        ];
        for v in variants {
            assert_eq!(v.channel(), channel);
        }
    }
}
