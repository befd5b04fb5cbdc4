//! Writer identity: Ed25519 keypairs, public keys, and signatures used to
//! author and verify operations in a channel's append log.

use ed25519_consensus::{Signature as InnerSignature, SigningKey, VerificationKey};
use newtube_core::{Error, Result, WriterKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// The namespace prefix mixed into every signature to keep newtube
/// signatures from being replayable against any other ed25519 signing
/// context the same keypair might be used for.
pub const NAMESPACE: &[u8] = b"newtube-op-v1";

/// An Ed25519 public key identifying a writer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey(VerificationKey);

impl PublicKey {
    /// Returns the raw 32 public key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Derives this public key's `WriterKey` identifier (the two are the
    /// same 32 bytes; `WriterKey` is the domain-typed alias used by the
    /// channel engine).
    #[must_use]
    pub fn writer_key(&self) -> WriterKey {
        WriterKey::from_bytes(self.as_bytes())
    }

    /// Verifies a signature over `message`, mixed with [`NAMESPACE`].
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        let payload = namespaced(message);
        self.0
            .verify(&signature.0, &payload)
            .map_err(|_| Error::permission_denied("signature verification failed"))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.as_bytes()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.as_bytes()))
    }
}

impl TryFrom<String> for PublicKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        let bytes = hex::decode(&value)
            .map_err(|e| Error::invalid_input("public_key", format!("not valid hex: {e}")))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::invalid_input("public_key", "expected 32 bytes"))?;
        let inner = VerificationKey::try_from(arr)
            .map_err(|_| Error::invalid_input("public_key", "not a valid Ed25519 point"))?;
        Ok(Self(inner))
    }
}

impl From<PublicKey> for String {
    fn from(value: PublicKey) -> Self {
        hex::encode(value.as_bytes())
    }
}

impl From<[u8; 32]> for PublicKey {
    fn from(bytes: [u8; 32]) -> Self {
        // VerificationKey::try_from validates the point is canonical; callers
        // that already hold a key from a trusted signing key never hit the
        // malformed-point branch, so this is only reachable for attacker-
        // controlled bytes and those come in through `TryFrom<String>` above.
        Self(VerificationKey::try_from(bytes).expect("caller-provided malformed public key bytes"))
    }
}

/// An Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Signature(InnerSignature);

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0.to_bytes()))
    }
}

impl TryFrom<String> for Signature {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        let bytes = hex::decode(&value)
            .map_err(|e| Error::invalid_input("signature", format!("not valid hex: {e}")))?;
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| Error::invalid_input("signature", "expected 64 bytes"))?;
        Ok(Self(InnerSignature::from(arr)))
    }
}

impl From<Signature> for String {
    fn from(value: Signature) -> Self {
        hex::encode(value.0.to_bytes())
    }
}

fn namespaced(message: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(NAMESPACE.len() + message.len());
    payload.extend_from_slice(NAMESPACE);
    payload.extend_from_slice(message);
    payload
}

/// A writer's signing keypair. Held only by the party that owns the
/// corresponding append-log writer core; never transmitted.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generates a fresh random keypair.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::new(rand::thread_rng()),
        }
    }

    /// Reconstructs a keypair from a 32-byte seed, e.g. loaded from disk.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from(seed),
        }
    }

    /// Returns the 32-byte seed backing this keypair, for persistence.
    #[must_use]
    pub fn to_seed_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Returns this keypair's public key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verification_key())
    }

    /// Signs `message`, mixed with [`NAMESPACE`].
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        let payload = namespaced(message);
        Signature(self.signing_key.sign(&payload))
    }
}

impl Drop for Keypair {
    fn drop(&mut self) {
        let mut seed = self.signing_key.to_bytes();
        seed.zeroize();
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({})", self.public_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sign_and_verify_roundtrip() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"hello world");
        kp.public_key().verify(b"hello world", &sig).unwrap();
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"hello world");
        let err = kp.public_key().verify(b"goodbye world", &sig).unwrap_err();
        assert!(matches!(err, Error::PermissionDenied { .. }));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let kp1 = Keypair::generate();
        let kp2 = Keypair::generate();
        let sig = kp1.sign(b"hello world");
        assert!(kp2.public_key().verify(b"hello world", &sig).is_err());
    }

    #[test]
    fn seed_roundtrip_preserves_identity() {
        let kp1 = Keypair::generate();
        let seed = kp1.to_seed_bytes();
        let kp2 = Keypair::from_seed(seed);
        assert_eq!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn public_key_hex_serde_roundtrip() {
        let kp = Keypair::generate();
        let pk = kp.public_key();
        let json = serde_json::to_string(&pk).unwrap();
        let parsed: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(pk, parsed);
    }

    #[test]
    fn writer_key_matches_public_key_bytes() {
        let kp = Keypair::generate();
        let pk = kp.public_key();
        assert_eq!(pk.writer_key().as_bytes(), &pk.as_bytes());
    }
}
