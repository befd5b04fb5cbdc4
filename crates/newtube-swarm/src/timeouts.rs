//! Bounded-wait defaults for every blocking call that crosses the
//! network boundary.
//!
//! One named constant per wait instead of one flat timeout value,
//! since each blocking call has its own tolerance.

use std::time::Duration;

/// Default timeouts, in milliseconds, per the operation table: log
/// bootstrap ready, channel ready (joiner), swarm topic flush,
/// discovery flush on joiner, view update with wait, blob entry lookup
/// (remote), and public mirror ready.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub log_bootstrap_ready: Duration,
    pub channel_ready_joiner: Duration,
    pub swarm_topic_flush: Duration,
    pub discovery_flush_joiner: Duration,
    pub view_update_wait_min: Duration,
    pub view_update_wait_max: Duration,
    pub blob_entry_lookup_remote: Duration,
    pub public_mirror_ready: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            log_bootstrap_ready: Duration::from_secs(10),
            channel_ready_joiner: Duration::from_secs(10),
            swarm_topic_flush: Duration::from_secs(5),
            discovery_flush_joiner: Duration::from_secs(3),
            view_update_wait_min: Duration::from_millis(1500),
            view_update_wait_max: Duration::from_secs(10),
            blob_entry_lookup_remote: Duration::from_secs(15),
            public_mirror_ready: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_operation_table() {
        let t = Timeouts::default();
        assert_eq!(t.log_bootstrap_ready, Duration::from_secs(10));
        assert_eq!(t.swarm_topic_flush, Duration::from_secs(5));
        assert_eq!(t.discovery_flush_joiner, Duration::from_secs(3));
        assert_eq!(t.blob_entry_lookup_remote, Duration::from_secs(15));
    }
}
