//! Idempotent per-(scope, connection) attach bookkeeping.
//!
//! Generalized from "is this peer connected" to "has this (scope,
//! connection) pair already been attached", since a connection can
//! carry more than one subsystem (Corestore replication,
//! plus one Linearizer attach per open channel).

use dashmap::DashSet;
use newtube_core::ChannelKey;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque per-connection identifier, assigned locally when a transport
/// connection is accepted or established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Hands out process-unique [`ConnectionId`]s.
#[derive(Default)]
pub struct ConnectionIdAllocator {
    next: AtomicU64,
}

impl ConnectionIdAllocator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    pub fn allocate(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// A subsystem that can be attached to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Shared blob/bulk replication, attached once per connection
    /// regardless of how many channels are open.
    Corestore,
    /// One channel's Linearizer, attached once per (channel, connection)
    /// pair.
    ChannelLinearizer(ChannelKey),
}

/// The idempotent attach set: `(scope, connection)` pairs already
/// wired up. Attaching twice is a no-op, matching the spec's "every
/// attach-to-connection path checks a per-scope set and no-ops on
/// repeat."
#[derive(Default)]
pub struct AttachRegistry {
    attached: DashSet<(ScopeKind, ConnectionId)>,
}

impl AttachRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            attached: DashSet::new(),
        }
    }

    /// Attaches `scope` to `conn`. Returns `true` if this attach is new
    /// (the caller should actually wire up the subsystem), `false` if
    /// it was already attached (no-op).
    pub fn attach(&self, scope: ScopeKind, conn: ConnectionId) -> bool {
        self.attached.insert((scope, conn))
    }

    #[must_use]
    pub fn is_attached(&self, scope: ScopeKind, conn: ConnectionId) -> bool {
        self.attached.contains(&(scope, conn))
    }

    /// Drops every attach record for `conn`, called when a connection
    /// closes.
    pub fn forget_connection(&self, conn: ConnectionId) {
        self.attached.retain(|(_, c)| *c != conn);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.attached.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn attaching_twice_is_a_no_op() {
        let registry = AttachRegistry::new();
        let alloc = ConnectionIdAllocator::new();
        let conn = alloc.allocate();

        assert!(registry.attach(ScopeKind::Corestore, conn));
        assert!(!registry.attach(ScopeKind::Corestore, conn));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_channels_attach_independently_on_the_same_connection() {
        let registry = AttachRegistry::new();
        let alloc = ConnectionIdAllocator::new();
        let conn = alloc.allocate();
        let c1 = ChannelKey::random();
        let c2 = ChannelKey::random();

        assert!(registry.attach(ScopeKind::ChannelLinearizer(c1), conn));
        assert!(registry.attach(ScopeKind::ChannelLinearizer(c2), conn));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn forgetting_a_connection_clears_only_its_own_attaches() {
        let registry = AttachRegistry::new();
        let alloc = ConnectionIdAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();

        registry.attach(ScopeKind::Corestore, a);
        registry.attach(ScopeKind::Corestore, b);
        registry.forget_connection(a);

        assert!(!registry.is_attached(ScopeKind::Corestore, a));
        assert!(registry.is_attached(ScopeKind::Corestore, b));
    }
}
