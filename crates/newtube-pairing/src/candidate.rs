//! The pairing candidate: what a joiner publishes on the invite's
//! discovery topic, and what the owner verifies before granting
//! membership.

use crate::invite::InviteId;
use newtube_core::{Error, Result, WriterKey};
use newtube_identity::Signature;

/// A joiner's request to be admitted as a writer, signed under the
/// invite's transient pairing keypair so the owner can verify it came
/// from someone who actually holds the invite string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingCandidate {
    pub invite_id: InviteId,
    pub joiner_writer_key: WriterKey,
    signature: Signature,
}

impl PairingCandidate {
    /// Builds and signs a candidate for `invite_id`, proposing
    /// `joiner_writer_key` as the key to admit.
    #[must_use]
    pub fn new(invite_id: InviteId, joiner_writer_key: WriterKey) -> Self {
        let payload = payload(invite_id, joiner_writer_key);
        let signature = invite_id.pairing_keypair().sign(&payload);
        Self {
            invite_id,
            joiner_writer_key,
            signature,
        }
    }

    /// Verifies this candidate's signature against the pairing keypair
    /// derived from its own `invite_id`. Doesn't by itself prove the
    /// invite is still open; callers must also check the invite record.
    pub fn verify(&self) -> Result<()> {
        let payload = payload(self.invite_id, self.joiner_writer_key);
        self.invite_id
            .pairing_keypair()
            .public_key()
            .verify(&payload, &self.signature)
            .map_err(|_| Error::permission_denied("pairing candidate signature invalid"))
    }
}

fn payload(invite_id: InviteId, joiner_writer_key: WriterKey) -> Vec<u8> {
    let mut payload = Vec::with_capacity(64);
    payload.extend_from_slice(invite_id.as_bytes());
    payload.extend_from_slice(joiner_writer_key.as_bytes());
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use newtube_core::WriterKey;

    #[test]
    fn candidate_verifies_against_its_own_invite() {
        let invite_id = InviteId::random();
        let candidate = PairingCandidate::new(invite_id, WriterKey::random());
        candidate.verify().unwrap();
    }

    #[test]
    fn candidate_signed_for_a_different_invite_fails_verification() {
        let invite_id = InviteId::random();
        let mut candidate = PairingCandidate::new(invite_id, WriterKey::random());
        candidate.invite_id = InviteId::random();
        assert!(candidate.verify().is_err());
    }

    #[test]
    fn tampering_with_the_proposed_writer_key_fails_verification() {
        let invite_id = InviteId::random();
        let mut candidate = PairingCandidate::new(invite_id, WriterKey::random());
        candidate.joiner_writer_key = WriterKey::random();
        assert!(candidate.verify().is_err());
    }
}
