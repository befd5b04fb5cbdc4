//! Owner-side invite lifecycle: create-or-reuse, and admit a verified
//! candidate.
//!
//! Grants the writer key named in a verified pairing candidate the
//! `Device` role.

use crate::candidate::PairingCandidate;
use crate::invite::{encode_invite, InviteId};
use newtube_channel::Channel;
use newtube_core::{now_millis, ChannelKey, Error, Result};
use newtube_protocol::Role;
use newtube_storage::KvBackend;
use std::time::Duration;
use tracing::info;

/// Creates a fresh invite, or returns the z32 string of one already
/// open and unexpired. The invite's keypair is derived deterministically
/// from its id ([`InviteId::pairing_keypair`]), so reusing an existing
/// invite reproduces the exact same z32 string without needing to
/// persist the keypair itself.
pub async fn create_invite<B: KvBackend>(channel: &Channel<B>, ttl: Duration) -> Result<String> {
    let now = now_millis();

    if let Some(current) = channel.current_invite()?.filter(|invite| invite.is_usable(now)) {
        let id = parse_invite_id(&current.invite_id)?;
        return Ok(encode_invite(id, &id.pairing_keypair().public_key()));
    }

    let id = InviteId::random();
    let expires_at = now + u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    channel
        .create_invite(id.to_hex(), Role::Device, expires_at)
        .await?;

    info!(invite_id = %id, expires_at, "created pairing invite");
    Ok(encode_invite(id, &id.pairing_keypair().public_key()))
}

/// Admits a verified candidate: grants `Device` and consumes the
/// invite. Returns the channel's bootstrap key so the caller can hand
/// it back to the joiner.
pub async fn accept_candidate<B: KvBackend>(
    channel: &Channel<B>,
    candidate: &PairingCandidate,
) -> Result<ChannelKey> {
    candidate.verify()?;

    let invite_id_hex = candidate.invite_id.to_hex();
    let invite = channel
        .get_invite(&invite_id_hex)?
        .ok_or_else(|| Error::not_found("invite", &invite_id_hex))?;

    if !invite.is_usable(now_millis()) {
        return Err(Error::invalid_input("invite", "expired or already used"));
    }

    channel
        .add_writer(candidate.joiner_writer_key, Role::Device)
        .await?;
    channel.clear_invite(invite_id_hex).await?;

    info!(joiner = %candidate.joiner_writer_key, "admitted pairing candidate");
    Ok(channel.key())
}

fn parse_invite_id(hex_id: &str) -> Result<InviteId> {
    let bytes = hex::decode(hex_id)
        .map_err(|e| Error::invalid_input("invite_id", format!("not valid hex: {e}")))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::invalid_input("invite_id", "expected 32 bytes"))?;
    Ok(InviteId::from_bytes(arr))
}
