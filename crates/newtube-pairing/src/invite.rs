//! The invite's wire shape: a `{id, public_key}` pair opaque-encoded as
//! one z32 string, plus the transient keypair used to sign the pairing
//! candidate that travels back to the owner.
//!
//! A self-contained bearer token that also carries the key the owner
//! needs to verify the joiner's candidate.

use newtube_core::{Error, Result};
use newtube_identity::{Keypair, PublicKey};
use rand::RngCore;
use std::fmt;

const INVITE_ID_LEN: usize = 32;
const BLOB_LEN: usize = INVITE_ID_LEN + 32;

/// A random, process-unrelated identifier for one invite. Distinct from
/// the channel's own key types: invites are not append-log writers and
/// don't need the genesis/hash-chain machinery `newtube_core::key`
/// reserves for those.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InviteId([u8; INVITE_ID_LEN]);

impl InviteId {
    #[must_use]
    pub fn random() -> Self {
        let mut bytes = [0u8; INVITE_ID_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; INVITE_ID_LEN] {
        &self.0
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; INVITE_ID_LEN]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Derives the transient pairing keypair bound to this invite. Both
    /// sides compute the same keypair from the id alone, so it never
    /// has to be carried in the invite blob.
    #[must_use]
    pub fn pairing_keypair(&self) -> Keypair {
        Keypair::from_seed(*blake3::hash(&self.0).as_bytes())
    }
}

impl fmt::Display for InviteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Encodes `{id, owner_public_key}` as the z32 string a joiner types or
/// scans in. The blob is the two 32-byte arrays back to back with no
/// framing, matching the fixed-size "opaque blob" the spec describes.
#[must_use]
pub fn encode_invite(id: InviteId, owner_public_key: &PublicKey) -> String {
    let mut blob = [0u8; BLOB_LEN];
    blob[..INVITE_ID_LEN].copy_from_slice(&id.0);
    blob[INVITE_ID_LEN..].copy_from_slice(&owner_public_key.as_bytes());
    z32::encode(&blob)
}

/// Decodes an invite string back into its id and the owner's public
/// key. Any malformed input (bad z32 alphabet, wrong length, or a
/// public key that isn't a valid curve point) is a single invalid-input
/// error: the spec treats all of these as "invalid encoding".
pub fn decode_invite(invite_z32: &str) -> Result<(InviteId, PublicKey)> {
    let blob = z32::decode(invite_z32.as_bytes())
        .map_err(|_| Error::invalid_input("invite", "not valid z32"))?;
    if blob.len() != BLOB_LEN {
        return Err(Error::invalid_input(
            "invite",
            format!("expected {BLOB_LEN} decoded bytes, got {}", blob.len()),
        ));
    }

    let mut id_bytes = [0u8; INVITE_ID_LEN];
    id_bytes.copy_from_slice(&blob[..INVITE_ID_LEN]);

    let public_key = PublicKey::try_from(hex::encode(&blob[INVITE_ID_LEN..]))?;
    Ok((InviteId(id_bytes), public_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encode_decode_roundtrip() {
        let id = InviteId::random();
        let owner = Keypair::generate();
        let z32 = encode_invite(id, &owner.public_key());

        let (decoded_id, decoded_key) = decode_invite(&z32).unwrap();
        assert_eq!(decoded_id, id);
        assert_eq!(decoded_key, owner.public_key());
    }

    #[test]
    fn garbage_input_is_rejected() {
        assert!(decode_invite("not a z32 string at all!!").is_err());
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let short = z32::encode(&[0u8; 16]);
        assert!(decode_invite(&short).is_err());
    }

    #[test]
    fn both_sides_derive_the_same_pairing_keypair() {
        let id = InviteId::random();
        assert_eq!(
            id.pairing_keypair().public_key(),
            id.pairing_keypair().public_key()
        );
    }

    #[test]
    fn distinct_invites_derive_distinct_pairing_keypairs() {
        let a = InviteId::random();
        let b = InviteId::random();
        assert_ne!(a.pairing_keypair().public_key(), b.pairing_keypair().public_key());
    }
}
