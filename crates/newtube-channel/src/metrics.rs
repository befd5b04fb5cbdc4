//! Channel-scoped metrics.
//!
//! A `prometheus-client` registry narrowed to the counters a single
//! channel's apply loop needs.

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct OpLabels {
    op: String,
}

/// Counters for one channel's engine.
pub struct ChannelMetrics {
    applied: Family<OpLabels, Counter>,
    skipped: Family<OpLabels, Counter>,
    rate_limited: Family<OpLabels, Counter>,
}

impl ChannelMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            applied: Family::default(),
            skipped: Family::default(),
            rate_limited: Family::default(),
        }
    }

    /// Registers this channel's metric families under `registry`.
    pub fn register(&self, registry: &mut Registry) {
        registry.register(
            "newtube_channel_ops_applied",
            "Ops successfully applied to a channel view",
            self.applied.clone(),
        );
        registry.register(
            "newtube_channel_ops_skipped",
            "Ops the applier rejected after passing ACL and signature checks",
            self.skipped.clone(),
        );
        registry.register(
            "newtube_channel_ops_rate_limited",
            "Ops rejected for exceeding a writer's rate quota",
            self.rate_limited.clone(),
        );
    }

    pub fn record_applied(&self, op_kind: &str) {
        self.applied
            .get_or_create(&OpLabels { op: op_kind.into() })
            .inc();
    }

    pub fn record_skipped(&self, op_kind: &str) {
        self.skipped
            .get_or_create(&OpLabels { op: op_kind.into() })
            .inc();
    }

    pub fn record_rate_limited(&self, op_kind: &str) {
        self.rate_limited
            .get_or_create(&OpLabels { op: op_kind.into() })
            .inc();
    }
}

impl Default for ChannelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ChannelMetrics {
    fn clone(&self) -> Self {
        Self {
            applied: self.applied.clone(),
            skipped: self.skipped.clone(),
            rate_limited: self.rate_limited.clone(),
        }
    }
}
