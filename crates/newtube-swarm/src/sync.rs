//! The initial-sync state machine: `connecting → syncing → synced |
//! offline | failed`, with cancellation yielding a distinct terminal
//! state rather than an error.
//!
//! A `tokio::select!` loop races each poll interval against
//! cancellation rather than against new work arriving.

use newtube_core::Result;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const FOLD_INTERNAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Progress states emitted during [`wait_for_initial_sync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Connecting,
    Syncing,
    Synced,
    Offline,
    Failed,
    Cancelled,
}

/// What `wait_for_initial_sync` polls: one fold of replicated log
/// entries into the view, plus a way to check whether the view now has
/// enough data to call the channel synced.
#[async_trait::async_trait]
pub trait InitialSyncProbe: Send + Sync {
    /// Runs one `linearizer.update(wait=true)`-equivalent fold.
    async fn fold(&self) -> Result<()>;

    /// `true` once `list_videos()` (or the analogous readiness check)
    /// returns non-empty.
    fn has_data(&self) -> Result<bool>;
}

/// Waits for a channel to reach its first usable view, polling `probe`
/// every 2s. `peer_timeout` and `data_timeout` are taken as one
/// combined outer deadline (their max), after which one final data
/// check decides `Synced` vs `Offline` — a last-moment sync that lands
/// exactly at the deadline still counts.
pub async fn wait_for_initial_sync<P: InitialSyncProbe>(
    probe: &P,
    peer_timeout: Duration,
    data_timeout: Duration,
    cancel: &CancellationToken,
    mut on_progress: impl FnMut(SyncState),
) -> SyncState {
    on_progress(SyncState::Connecting);
    if cancel.is_cancelled() {
        return SyncState::Cancelled;
    }

    let outer_deadline = Instant::now() + peer_timeout.max(data_timeout);
    on_progress(SyncState::Syncing);

    loop {
        let fold = tokio::time::timeout(FOLD_INTERNAL_TIMEOUT, probe.fold());
        tokio::select! {
            () = cancel.cancelled() => return SyncState::Cancelled,
            result = fold => {
                if let Ok(Err(_)) = result {
                    return SyncState::Failed;
                }
                // An internal fold timeout is treated as a transient
                // miss, not a hard failure: the next poll tries again.
            }
        }

        match probe.has_data() {
            Ok(true) => return SyncState::Synced,
            Ok(false) => {}
            Err(_) => return SyncState::Failed,
        }

        if Instant::now() >= outer_deadline {
            return match probe.has_data() {
                Ok(true) => SyncState::Synced,
                _ => SyncState::Offline,
            };
        }

        tokio::select! {
            () = cancel.cancelled() => return SyncState::Cancelled,
            () = tokio::time::sleep(POLL_INTERVAL) => {}
        }
    }
}
