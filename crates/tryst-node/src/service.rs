//! Async service front
//!
//! One task owns the node and serves requests sent over a bounded
//! channel; replies travel back over oneshot channels. Outbound
//! notifications and delegation requests are forwarded to unbounded
//! channels after every handled request, preserving the per-request
//! ordering the engine produced. The task exits when every handle is
//! gone.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use tryst_core::{LocalNotification, RvError, RvRequest, RvResult, RvStatus, TopologyRequest};

use crate::node::{NodeConfig, NodeStats, RendezvousNode};

enum Command {
    Request {
        request: RvRequest,
        reply: oneshot::Sender<RvResult<RvStatus>>,
    },
    Stats {
        reply: oneshot::Sender<NodeStats>,
    },
}

/// Cloneable client side of a running rendezvous service.
#[derive(Clone)]
pub struct ServiceHandle {
    commands: mpsc::Sender<Command>,
}

impl ServiceHandle {
    /// Submit one pub/sub request and wait for its outcome.
    pub async fn request(&self, request: RvRequest) -> RvResult<RvStatus> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Request { request, reply })
            .await
            .map_err(|_| RvError::ServiceStopped)?;
        response.await.map_err(|_| RvError::ServiceStopped)?
    }

    pub async fn stats(&self) -> RvResult<NodeStats> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Stats { reply })
            .await
            .map_err(|_| RvError::ServiceStopped)?;
        response.await.map_err(|_| RvError::ServiceStopped)
    }
}

/// Receiving side of the service's outbound streams.
pub struct ServiceChannels {
    /// Notifications for this node's delivery layer.
    pub local_notifications: mpsc::UnboundedReceiver<LocalNotification>,
    /// One-way requests for the Topology Authority.
    pub topology_requests: mpsc::UnboundedReceiver<TopologyRequest>,
}

/// Start a rendezvous service on the current runtime.
pub fn spawn(config: NodeConfig) -> (ServiceHandle, ServiceChannels) {
    let (commands, mut command_rx) = mpsc::channel(config.request_queue_depth.max(1));
    let (local_tx, local_notifications) = mpsc::unbounded_channel();
    let (topology_tx, topology_requests) = mpsc::unbounded_channel();

    let label = config.label;
    tokio::spawn(async move {
        let node = RendezvousNode::new(&config);
        info!(node = %label, "rendezvous service started");
        while let Some(command) = command_rx.recv().await {
            match command {
                Command::Request { request, reply } => {
                    let outcome = node.handle(&request);
                    for notification in node.drain_local_notifications() {
                        // a closed receiver only means nobody listens
                        let _ = local_tx.send(notification);
                    }
                    for delegation in node.drain_topology_requests() {
                        let _ = topology_tx.send(delegation);
                    }
                    let _ = reply.send(outcome);
                }
                Command::Stats { reply } => {
                    let _ = reply.send(node.stats());
                }
            }
        }
        debug!(node = %label, "rendezvous service stopped");
    });

    (ServiceHandle { commands }, ServiceChannels {
        local_notifications,
        topology_requests,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tryst_core::{FragmentId, FullId, NodeLabel, RequestKind, Strategy};

    fn request(kind: RequestKind, source: &str, id: FullId, prefix: FullId) -> RvRequest {
        RvRequest::new(NodeLabel::named(source), kind, id, prefix, Strategy::Domain)
    }

    #[tokio::test]
    async fn test_service_round_trip() {
        let (handle, mut channels) = spawn(NodeConfig::with_label(NodeLabel::named("RV")));

        let scope = FullId::root(FragmentId::named("A"));
        let status = handle
            .request(request(
                RequestKind::PublishScope,
                "P1",
                scope.clone(),
                FullId::empty(),
            ))
            .await
            .unwrap();
        assert_eq!(status, RvStatus::Success);

        let status = handle
            .request(request(
                RequestKind::PublishInfo,
                "P1",
                FullId::root(FragmentId::named("i")),
                scope,
            ))
            .await
            .unwrap();
        assert_eq!(status, RvStatus::Success);

        let delegation = channels.topology_requests.recv().await.unwrap();
        assert!(matches!(delegation, TopologyRequest::MatchPubSubs { .. }));

        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.accepted, 2);
    }

    #[tokio::test]
    async fn test_streams_close_when_handles_drop() {
        let (handle, mut channels) = spawn(NodeConfig::with_label(NodeLabel::named("RV")));
        drop(handle);

        assert!(channels.local_notifications.recv().await.is_none());
        assert!(channels.topology_requests.recv().await.is_none());
    }
}
