//! Shared rendezvous node
//!
//! The engine itself is single-threaded; this wrapper serializes
//! concurrent callers behind one mutex. Every request, its outbound
//! notifications and the counter updates happen inside a single critical
//! section, so observers never see a half-applied operation.

use parking_lot::Mutex;
use tracing::error;
use tryst_core::{LocalNotification, NodeLabel, RvRequest, RvResult, RvStatus, TopologyRequest};
use tryst_engine::RendezvousDomain;

/// Node-level configuration.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Label of this node in the overlay.
    pub label: NodeLabel,
    /// Depth of the async service's request queue.
    pub request_queue_depth: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            label: NodeLabel::default(),
            request_queue_depth: 64,
        }
    }
}

impl NodeConfig {
    pub fn with_label(label: NodeLabel) -> Self {
        NodeConfig {
            label,
            ..NodeConfig::default()
        }
    }
}

/// Counters observed over the node's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub requests: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub faults: u64,
    pub notifications: u64,
    pub delegations: u64,
}

struct Inner {
    domain: RendezvousDomain,
    stats: NodeStats,
}

/// A lock-protected rendezvous domain plus counters.
pub struct RendezvousNode {
    inner: Mutex<Inner>,
}

impl RendezvousNode {
    pub fn new(config: &NodeConfig) -> Self {
        RendezvousNode {
            inner: Mutex::new(Inner {
                domain: RendezvousDomain::new(config.label),
                stats: NodeStats::default(),
            }),
        }
    }

    /// Handle one request, counting the outcome.
    pub fn handle(&self, request: &RvRequest) -> RvResult<RvStatus> {
        let mut inner = self.inner.lock();
        inner.stats.requests += 1;
        match inner.domain.handle(request) {
            Ok(status) => {
                if status.is_success() {
                    inner.stats.accepted += 1;
                } else {
                    inner.stats.rejected += 1;
                }
                Ok(status)
            }
            Err(err) => {
                inner.stats.faults += 1;
                error!(%err, kind = ?request.kind, "rendezvous fault");
                Err(err)
            }
        }
    }

    /// Take every pending notification for the local delivery layer.
    pub fn drain_local_notifications(&self) -> Vec<LocalNotification> {
        let mut inner = self.inner.lock();
        let drained = inner.domain.drain_local_notifications();
        inner.stats.notifications += drained.len() as u64;
        drained
    }

    /// Take every pending request for the Topology Authority.
    pub fn drain_topology_requests(&self) -> Vec<TopologyRequest> {
        let mut inner = self.inner.lock();
        let drained = inner.domain.drain_topology_requests();
        inner.stats.delegations += drained.len() as u64;
        drained
    }

    pub fn stats(&self) -> NodeStats {
        self.inner.lock().stats
    }

    pub fn label(&self) -> NodeLabel {
        self.inner.lock().domain.local_label()
    }

    /// Current graph size as (scopes, items).
    pub fn graph_size(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (
            inner.domain.graph().scope_count(),
            inner.domain.graph().item_count(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tryst_core::{FragmentId, FullId, RequestKind, Strategy};

    fn publish_scope(name: &str) -> RvRequest {
        RvRequest::new(
            NodeLabel::named("P1"),
            RequestKind::PublishScope,
            FullId::root(FragmentId::named(name)),
            FullId::empty(),
            Strategy::Domain,
        )
    }

    #[test]
    fn test_counters_track_outcomes() {
        let node = RendezvousNode::new(&NodeConfig::with_label(NodeLabel::named("RV")));

        assert_eq!(node.handle(&publish_scope("A")).unwrap(), RvStatus::Success);
        let rejected = RvRequest::new(
            NodeLabel::named("P2"),
            RequestKind::PublishScope,
            FullId::root(FragmentId::named("A")),
            FullId::empty(),
            Strategy::NodeLocal,
        );
        assert_eq!(node.handle(&rejected).unwrap(), RvStatus::StrategyMismatch);

        let stats = node.stats();
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.faults, 0);
        assert_eq!(node.graph_size(), (1, 0));
    }

    #[test]
    fn test_drains_count_outbound_events() {
        let node = RendezvousNode::new(&NodeConfig::with_label(NodeLabel::named("RV")));
        node.handle(&publish_scope("A")).unwrap();
        let advertise = RvRequest::new(
            NodeLabel::named("P1"),
            RequestKind::PublishInfo,
            FullId::root(FragmentId::named("i")),
            FullId::root(FragmentId::named("A")),
            Strategy::Domain,
        );
        node.handle(&advertise).unwrap();

        assert_eq!(node.drain_topology_requests().len(), 1);
        assert_eq!(node.stats().delegations, 1);
        assert!(node.drain_local_notifications().is_empty());
    }
}
