//! Linearizer lifecycle state.
//!
//! A small enum driving what `update()` is allowed to do, narrowed to
//! what a deterministic, non-BFT ordering pass needs: it is either
//! caught up and idle, actively folding new entries into the view, or
//! has hit an unrecoverable error.

/// The linearizer's current lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearizerState {
    /// No entries have been applied yet in this process.
    Idle,
    /// An `update()` pass is folding newly-appended entries into the view.
    Updating,
    /// A non-recoverable error occurred (e.g. a broken hash chain); the
    /// channel must be closed and reopened to retry.
    Failed,
}
