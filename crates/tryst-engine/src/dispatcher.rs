//! Notification fan-out
//!
//! The engine never touches a socket. Everything it wants delivered is
//! queued here: local notifications for this node's delivery layer and
//! one-way requests for the Topology Authority. The runtime drains both
//! queues after each handled request.

use std::collections::{HashSet, VecDeque};

use tracing::warn;
use tryst_core::{
    ForwardingId, FullId, LocalNotification, NodeLabel, NotifyKind, Strategy, TopologyRequest,
};

/// Outbound queues of one rendezvous domain.
#[derive(Debug)]
pub struct NotificationDispatcher {
    local: NodeLabel,
    local_queue: VecDeque<LocalNotification>,
    topology_queue: VecDeque<TopologyRequest>,
}

impl NotificationDispatcher {
    pub fn new(local: NodeLabel) -> Self {
        NotificationDispatcher {
            local,
            local_queue: VecDeque::new(),
            topology_queue: VecDeque::new(),
        }
    }

    /// Label of the node this domain runs on.
    pub fn local_label(&self) -> NodeLabel {
        self.local
    }

    /// Deliver a structural notification to a set of subscribers.
    ///
    /// The local node is served through the local queue; every remote
    /// subscriber is batched into one delegation request. Remote
    /// subscribers under a local-only strategy cannot be reached and are
    /// dropped with a warning.
    pub fn notify_subscribers(
        &mut self,
        kind: NotifyKind,
        ids: Vec<FullId>,
        subscribers: &HashSet<NodeLabel>,
        strategy: Strategy,
    ) {
        if ids.is_empty() || subscribers.is_empty() {
            return;
        }
        let mut remote: Vec<NodeLabel> = Vec::new();
        let mut local = false;
        for &label in subscribers {
            if label == self.local {
                local = true;
            } else {
                remote.push(label);
            }
        }
        if local {
            self.local_queue.push_back(LocalNotification::StructuralChange {
                kind,
                ids: ids.clone(),
            });
        }
        if !remote.is_empty() {
            if strategy.is_local() {
                warn!(
                    count = remote.len(),
                    ?strategy,
                    "dropping notification for remote subscribers under a local strategy"
                );
                return;
            }
            remote.sort();
            self.topology_queue.push_back(TopologyRequest::NotifySubscribers {
                kind,
                ids,
                subscribers: remote,
                strategy,
            });
        }
    }

    /// Tell the local publishers to start publishing under `fid`.
    pub fn start_publication(&mut self, ids: Vec<FullId>, fid: ForwardingId) {
        self.local_queue
            .push_back(LocalNotification::StartPublication { ids, fid });
    }

    /// Tell the local publishers to stop publishing.
    pub fn stop_publication(&mut self, ids: Vec<FullId>) {
        self.local_queue
            .push_back(LocalNotification::StopPublication { ids });
    }

    /// Delegate one match decision to the Topology Authority.
    pub fn request_match(
        &mut self,
        ids: Vec<FullId>,
        publishers: Vec<NodeLabel>,
        subscribers: Vec<NodeLabel>,
        strategy: Strategy,
    ) {
        self.topology_queue.push_back(TopologyRequest::MatchPubSubs {
            ids,
            publishers,
            subscribers,
            strategy,
        });
    }

    pub fn pop_local(&mut self) -> Option<LocalNotification> {
        self.local_queue.pop_front()
    }

    pub fn pop_topology(&mut self) -> Option<TopologyRequest> {
        self.topology_queue.pop_front()
    }

    pub fn drain_local(&mut self) -> Vec<LocalNotification> {
        self.local_queue.drain(..).collect()
    }

    pub fn drain_topology(&mut self) -> Vec<TopologyRequest> {
        self.topology_queue.drain(..).collect()
    }

    pub fn pending_local(&self) -> usize {
        self.local_queue.len()
    }

    pub fn pending_topology(&self) -> usize {
        self.topology_queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tryst_core::FragmentId;

    fn ids() -> Vec<FullId> {
        vec![FullId::root(FragmentId::named("A"))]
    }

    #[test]
    fn test_local_and_remote_subscribers_split() {
        let mut dispatcher = NotificationDispatcher::new(NodeLabel::named("RV"));
        let subscribers: HashSet<NodeLabel> = [NodeLabel::named("RV"), NodeLabel::named("S1")]
            .into_iter()
            .collect();

        dispatcher.notify_subscribers(
            NotifyKind::ScopePublished,
            ids(),
            &subscribers,
            Strategy::Domain,
        );

        assert!(matches!(
            dispatcher.pop_local(),
            Some(LocalNotification::StructuralChange {
                kind: NotifyKind::ScopePublished,
                ..
            })
        ));
        assert!(matches!(
            dispatcher.pop_topology(),
            Some(TopologyRequest::NotifySubscribers { subscribers, .. })
                if subscribers == vec![NodeLabel::named("S1")]
        ));
    }

    #[test]
    fn test_remote_subscribers_dropped_under_local_strategy() {
        let mut dispatcher = NotificationDispatcher::new(NodeLabel::named("RV"));
        let subscribers: HashSet<NodeLabel> = [NodeLabel::named("S1")].into_iter().collect();

        dispatcher.notify_subscribers(
            NotifyKind::ScopePublished,
            ids(),
            &subscribers,
            Strategy::NodeLocal,
        );

        assert_eq!(dispatcher.pending_local(), 0);
        assert_eq!(dispatcher.pending_topology(), 0);
    }

    #[test]
    fn test_empty_fanout_queues_nothing() {
        let mut dispatcher = NotificationDispatcher::new(NodeLabel::named("RV"));
        dispatcher.notify_subscribers(
            NotifyKind::ScopePublished,
            ids(),
            &HashSet::new(),
            Strategy::Domain,
        );
        dispatcher.notify_subscribers(
            NotifyKind::ScopePublished,
            Vec::new(),
            &[NodeLabel::named("S1")].into_iter().collect(),
            Strategy::Domain,
        );

        assert_eq!(dispatcher.pending_local(), 0);
        assert_eq!(dispatcher.pending_topology(), 0);
    }
}
