//! Joiner-side acceptance: decode an invite string, build the signed
//! candidate to publish on the invite's topic, and poll local admission
//! once the owner has granted the writer role.

use crate::candidate::PairingCandidate;
use crate::invite::{decode_invite, InviteId};
use newtube_channel::Channel;
use newtube_core::{Error, Result, WriterKey};
use newtube_identity::PublicKey;
use newtube_storage::KvBackend;
use std::time::Duration;
use tokio::time::Instant;

const ADMISSION_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Decodes `invite_z32` and builds the candidate the joiner publishes
/// on the invite's discovery topic. Returns the owner's public key too,
/// so the caller can address the topic/connection correctly.
pub fn build_candidate(
    invite_z32: &str,
    joiner_writer_key: WriterKey,
) -> Result<(InviteId, PublicKey, PairingCandidate)> {
    let (id, owner_public_key) = decode_invite(invite_z32)?;
    let candidate = PairingCandidate::new(id, joiner_writer_key);
    Ok((id, owner_public_key, candidate))
}

/// Polls the opened channel's writer set until `writer_key` is admitted
/// (spec: "waits until its local log is admitted"), or `timeout`
/// elapses, in which case the caller should report `offline` rather
/// than treating this as a hard failure.
pub async fn wait_until_admitted<B: KvBackend>(
    channel: &Channel<B>,
    writer_key: &WriterKey,
    timeout: Duration,
) -> Result<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        channel.sync_view().await?;
        if channel
            .list_writers()?
            .iter()
            .any(|w| &w.writer_key == writer_key)
        {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(ADMISSION_POLL_INTERVAL).await;
    }
}

/// Validates that a decoded invite's owner key matches the key the
/// caller expected to pair with (e.g. scanned from a QR code alongside
/// an out-of-band fingerprint). Purely defensive; the candidate's
/// signature is what the owner actually checks.
pub fn verify_owner_key(expected: &PublicKey, actual: &PublicKey) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::permission_denied("invite owner key does not match expected key"))
    }
}
