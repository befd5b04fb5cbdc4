//! Channel lifecycle state.
//!
//! Covers the open-sequence states a channel walks through before it
//! can serve reads: opening its log, opening its view, running the
//! first linearizer pass against whatever was already on disk.

/// The channel's current lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Constructed but not yet opened.
    Initializing,
    /// Opening the per-writer append logs.
    OpeningLog,
    /// Opening the materialized KV view.
    OpeningView,
    /// Running the linearizer over whatever is already on disk.
    FirstApply,
    /// Open and serving reads/writes.
    Ready,
    /// Shutting down; no new mutations are accepted.
    Closing,
    /// Fully shut down.
    Closed,
    /// A non-recoverable error occurred (e.g. the linearizer detected a
    /// broken hash chain); the channel must be reopened to retry.
    Failed,
}

impl ChannelState {
    /// Whether the channel accepts new mutating ops in this state.
    #[must_use]
    pub fn accepts_writes(self) -> bool {
        matches!(self, Self::Ready)
    }
}
