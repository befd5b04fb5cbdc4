//! Per-writer rate limiting for mutating ops.
//!
//! Brought in from the `governor` crate directly, the way a production
//! P2P service bounds how fast one untrusted peer can make it do work.

use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedRateLimiter;
use governor::Quota;
use newtube_core::WriterKey;
use std::num::NonZeroU32;

const OPS_PER_WINDOW: u32 = 100;
const WINDOW_SECONDS: u64 = 60;

/// Limits each writer to [`OPS_PER_WINDOW`] mutating ops per
/// [`WINDOW_SECONDS`]-second window.
pub struct WriterRateLimiter {
    limiter: DefaultKeyedRateLimiter<WriterKey>,
}

impl WriterRateLimiter {
    #[must_use]
    pub fn new() -> Self {
        let quota = Quota::with_period(std::time::Duration::from_secs(WINDOW_SECONDS))
            .expect("window duration is nonzero")
            .allow_burst(NonZeroU32::new(OPS_PER_WINDOW).expect("burst size is nonzero"));
        Self {
            limiter: DefaultKeyedRateLimiter::keyed(quota),
        }
    }

    /// Checks whether `writer` may author another op right now,
    /// consuming one unit of its quota if so. On denial, returns the
    /// number of seconds until capacity is next available.
    pub fn check(&self, writer: WriterKey) -> Result<(), u64> {
        self.limiter
            .check_key(&writer)
            .map_err(|not_until| not_until.wait_time_from(DefaultClock::default().now()).as_secs().max(1))
    }
}

impl Default for WriterRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
