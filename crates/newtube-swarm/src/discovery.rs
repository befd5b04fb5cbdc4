//! Per-topic peer discovery.
//!
//! Trimmed to the one field a discovery announcement actually needs;
//! dial-in addresses and connection state are transport concerns this
//! layer doesn't own — it only tracks which peers are known on which
//! topic.

use dashmap::DashMap;
use newtube_core::{DiscoveryTopic, WriterKey};
use tokio::sync::broadcast;

const ANNOUNCE_CHANNEL_CAPACITY: usize = 128;

/// A peer seen on a discovery topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerEndpoint {
    pub peer_key: WriterKey,
}

/// Tracks joined discovery topics and fans out peer announcements to
/// subscribers. Joining the same topic twice is idempotent and returns
/// a receiver on the same broadcast channel.
#[derive(Default)]
pub struct DiscoverySwarm {
    topics: DashMap<DiscoveryTopic, broadcast::Sender<PeerEndpoint>>,
}

impl DiscoverySwarm {
    #[must_use]
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
        }
    }

    /// Joins `topic`, returning a receiver that yields every peer
    /// subsequently announced on it (including by this call if it is
    /// the first join and a self-announcement is made separately via
    /// [`Self::announce`]).
    pub fn join_topic(&self, topic: DiscoveryTopic) -> broadcast::Receiver<PeerEndpoint> {
        self.topics
            .entry(topic)
            .or_insert_with(|| broadcast::channel(ANNOUNCE_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Announces `peer` to everyone currently subscribed to `topic`.
    /// A no-op (not an error) if nobody has joined the topic yet.
    pub fn announce(&self, topic: DiscoveryTopic, peer: PeerEndpoint) {
        if let Some(sender) = self.topics.get(&topic) {
            let _ = sender.send(peer);
        }
    }

    /// Leaves `topic`, dropping its broadcast channel. Existing
    /// receivers continue to observe already-queued announcements but
    /// receive no new ones.
    pub fn leave_topic(&self, topic: &DiscoveryTopic) {
        self.topics.remove(topic);
    }

    #[must_use]
    pub fn is_joined(&self, topic: &DiscoveryTopic) -> bool {
        self.topics.contains_key(topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn joining_twice_shares_the_same_channel() {
        let swarm = DiscoverySwarm::new();
        let topic = DiscoveryTopic::random();
        let mut a = swarm.join_topic(topic);
        let mut b = swarm.join_topic(topic);

        let peer = PeerEndpoint {
            peer_key: WriterKey::random(),
        };
        swarm.announce(topic, peer);

        assert_eq!(a.recv().await.unwrap(), peer);
        assert_eq!(b.recv().await.unwrap(), peer);
    }

    #[test]
    fn announce_on_unjoined_topic_is_a_no_op() {
        let swarm = DiscoverySwarm::new();
        swarm.announce(
            DiscoveryTopic::random(),
            PeerEndpoint {
                peer_key: WriterKey::random(),
            },
        );
    }

    #[test]
    fn leave_topic_clears_joined_state() {
        let swarm = DiscoverySwarm::new();
        let topic = DiscoveryTopic::random();
        swarm.join_topic(topic);
        assert!(swarm.is_joined(&topic));
        swarm.leave_topic(&topic);
        assert!(!swarm.is_joined(&topic));
    }
}
