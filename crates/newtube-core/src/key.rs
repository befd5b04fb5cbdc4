//! 32-byte content-addressed / public-key identifiers.
//!
//! Every scope the system names (a channel's discovery key, a writer's
//! public key, a video id, a bootstrap topic) is a distinct 32-byte value.
//! They are kept as separate types so that, say, a `VideoId` can never be
//! passed where a `WriterKey` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Defines a newtype wrapper around a 32-byte array with hex `Display`,
/// `Debug`, and `FromStr`, plus a `random` constructor for tests.
macro_rules! define_key32 {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name([u8; 32]);

        impl $name {
            /// Length of this key in bytes.
            pub const LEN: usize = 32;

            /// Wraps raw bytes into a key.
            #[must_use]
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Returns the raw bytes of this key.
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// The all-zero key, used as a sentinel for "unset".
            #[must_use]
            pub const fn null() -> Self {
                Self([0u8; 32])
            }

            /// Returns true if this is the null key.
            #[must_use]
            pub fn is_null(&self) -> bool {
                self.0 == [0u8; 32]
            }

            /// Generates a random key. Only meaningful for locally-minted
            /// identifiers (e.g. a fresh `VideoId`), never for keys derived
            /// from a signature or hash.
            #[must_use]
            pub fn random() -> Self {
                use rand::RngCore;
                let mut bytes = [0u8; 32];
                rand::thread_rng().fill_bytes(&mut bytes);
                Self(bytes)
            }

            /// Returns the lowercase hex encoding of this key.
            #[must_use]
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = hex::decode(s).map_err(|e| {
                    Error::invalid_input(stringify!($name), format!("not valid hex: {e}"))
                })?;
                Self::try_from(bytes.as_slice())
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = Error;

            fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
                if bytes.len() != Self::LEN {
                    return Err(Error::invalid_input(
                        stringify!($name),
                        format!("expected {} bytes, got {}", Self::LEN, bytes.len()),
                    ));
                }
                let mut arr = [0u8; 32];
                arr.copy_from_slice(bytes);
                Ok(Self(arr))
            }
        }
    };
}

define_key32!(ChannelKey);
define_key32!(WriterKey);
define_key32!(VideoId);
define_key32!(BootstrapKey);
define_key32!(DiscoveryTopic);
define_key32!(BlobsCoreKey);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hex_roundtrip() {
        let key = ChannelKey::random();
        let hex = key.to_hex();
        assert_eq!(hex.len(), 64);
        let parsed: ChannelKey = hex.parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn rejects_wrong_length() {
        let err = WriterKey::try_from(&[0u8; 31][..]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[test]
    fn rejects_non_hex() {
        let err = "not-hex".parse::<VideoId>().unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[test]
    fn null_is_distinct_from_random() {
        assert!(BootstrapKey::null().is_null());
        assert!(!BootstrapKey::random().is_null());
    }

    #[test]
    fn distinct_key_types_do_not_compare() {
        // This test exists to document intent: the following line would not
        // compile if uncommented, since ChannelKey and VideoId are distinct
        // types despite sharing a representation.
        // assert_eq!(ChannelKey::random(), VideoId::random());
        let a = ChannelKey::random();
        let b = ChannelKey::from_bytes(*a.as_bytes());
        assert_eq!(a, b);
    }
}
