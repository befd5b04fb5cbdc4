//! The channel engine: the central per-channel runtime tying together a
//! writer's append log, the deterministic linearizer, and the
//! materialized KV view, plus the ACL, conflict resolution, rate
//! limiting, and metrics that gate writes into it.

mod acl;
mod applier;
mod channel;
mod conflict;
mod metrics;
mod rate_limit;
mod state;
mod view;

pub use acl::{required_role, satisfies};
pub use applier::ChannelApplier;
pub use channel::Channel;
pub use conflict::{merge_channel_meta, should_use_new, Candidate};
pub use metrics::ChannelMetrics;
pub use rate_limit::WriterRateLimiter;
pub use state::ChannelState;
pub use view::ChannelView;
