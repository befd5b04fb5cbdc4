//! Invite-based device pairing: an owner mints a bearer invite over a
//! channel's bootstrap key; a joiner redeems it for a `Device` writer
//! grant without the owner ever learning the joiner's identity in
//! advance.
//!
//! The actual candidate exchange travels over `newtube_swarm`'s
//! discovery topics (an external collaborator here, same as the rest
//! of the transport layer); this crate owns the parts that don't need
//! a live connection to test: invite encoding, candidate signing and
//! verification, and the owner/joiner state transitions around them.

mod candidate;
mod invite;
mod joiner;
mod owner;

pub use candidate::PairingCandidate;
pub use invite::{decode_invite, encode_invite, InviteId};
pub use joiner::{build_candidate, verify_owner_key, wait_until_admitted};
pub use owner::{accept_candidate, create_invite};

#[cfg(test)]
mod tests {
    use super::*;
    use newtube_channel::Channel;
    use newtube_core::{ChannelKey, WriterKey};
    use newtube_identity::Keypair;
    use newtube_storage::MemoryBackend;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    /// End-to-end pairing over a store shared between two `Channel`
    /// handles, standing in for two peers replicating the same channel.
    #[tokio::test]
    async fn full_invite_accept_and_admission_flow() {
        let store = Arc::new(MemoryBackend::new());
        let channel_key = ChannelKey::random();

        let owner_channel = Channel::open(channel_key, Keypair::generate(), store.clone()).unwrap();
        let z32 = create_invite(&owner_channel, Duration::from_secs(600)).await.unwrap();

        let joiner_keypair = Keypair::generate();
        let joiner_writer_key = joiner_keypair.public_key().writer_key();
        let (_id, _owner_key, candidate) = build_candidate(&z32, joiner_writer_key).unwrap();

        let bootstrap_key = accept_candidate(&owner_channel, &candidate).await.unwrap();
        assert_eq!(bootstrap_key, channel_key);

        let joiner_channel = Channel::open(channel_key, joiner_keypair, store).unwrap();
        let admitted = wait_until_admitted(&joiner_channel, &joiner_writer_key, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(admitted);
    }

    #[tokio::test]
    async fn a_candidate_for_an_invalid_invite_never_gets_admitted() {
        let store = Arc::new(MemoryBackend::new());
        let channel_key = ChannelKey::random();
        let owner_channel = Channel::open(channel_key, Keypair::generate(), store).unwrap();

        let bogus_invite_id = InviteId::random();
        let candidate = PairingCandidate::new(bogus_invite_id, WriterKey::random());

        assert!(accept_candidate(&owner_channel, &candidate).await.is_err());
    }
}
