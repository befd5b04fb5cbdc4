//! Length-prefixed JSON wire framing.
//!
//! Prefixes a JSON payload with a `u32` length. No separate type
//! discriminator byte: payloads are self-describing (`OpBody`'s
//! internal `type` tag, or `ReplicationMessage`'s own tag) — one less
//! thing to keep in sync with the enum.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use newtube_core::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};

/// Encodes `value` as `[u32 length][json bytes]`.
pub fn encode<T: Serialize>(value: &T) -> Result<Bytes> {
    let json = serde_json::to_vec(value)?;
    let mut buf = BytesMut::with_capacity(4 + json.len());
    buf.put_u32(json.len() as u32);
    buf.put_slice(&json);
    Ok(buf.freeze())
}

/// Decodes a single `[u32 length][json bytes]` frame from the front of
/// `data`, returning the value and the number of bytes consumed.
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<(T, usize)> {
    if data.len() < 4 {
        return Err(Error::invalid_input("frame", "too short for length prefix"));
    }
    let mut len_bytes = &data[..4];
    let len = len_bytes.get_u32() as usize;
    let total = 4 + len;
    if data.len() < total {
        return Err(Error::invalid_input(
            "frame",
            format!("expected {total} bytes, have {}", data.len()),
        ));
    }
    let value = serde_json::from_slice(&data[4..total])?;
    Ok((value, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::{OpBody, OpEnvelope};
    use newtube_core::VideoId;
    use newtube_identity::Keypair;
    use pretty_assertions::assert_eq;

    #[test]
    fn encode_decode_roundtrip() {
        let kp = Keypair::generate();
        let op = OpEnvelope::sign(
            &kp,
            1,
            1_000,
            OpBody::DeleteVideo {
                video_id: VideoId::random(),
            },
        );
        let frame = encode(&op).unwrap();
        let (decoded, consumed): (OpEnvelope, usize) = decode(&frame).unwrap();
        assert_eq!(consumed, frame.len());
        assert_eq!(decoded.writer, op.writer);
    }

    #[test]
    fn decode_rejects_truncated_frame() {
        let err = decode::<OpEnvelope>(&[0, 0, 0, 10, 1, 2]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[test]
    fn decode_consumes_only_one_frame_worth() {
        let kp = Keypair::generate();
        let op = OpEnvelope::sign(&kp, 1, 1_000, OpBody::DeleteInvite { invite_id: "a".into() });
        let mut two_frames = encode(&op).unwrap().to_vec();
        two_frames.extend_from_slice(&encode(&op).unwrap());
        let (_decoded, consumed): (OpEnvelope, usize) = decode(&two_frames).unwrap();
        assert!(consumed < two_frames.len());
    }
}
