//! Outbound events of the rendezvous core
//!
//! The core emits two event families: local notifications handed to the
//! delivery layer of this node, and one-way delegation requests published
//! towards the Topology Authority. Delegation is fire-and-forget; the
//! authority answers publishers directly through its own channel.

use bytes::{BufMut, BytesMut};

use crate::{ForwardingId, FullId, NodeLabel, Strategy};

/// Structural notification kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NotifyKind {
    /// A scope became visible under the identifiers carried by the event.
    ScopePublished = 0x10,
    /// A scope branch was removed together with the carried identifiers.
    ScopeUnpublished = 0x11,
}

impl NotifyKind {
    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Notification delivered to the local delivery layer, which fans it out
/// to the interested applications on this node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LocalNotification {
    /// A scope appeared or disappeared under the carried identifiers.
    StructuralChange { kind: NotifyKind, ids: Vec<FullId> },
    /// Start publishing the item known under `ids` using `fid`.
    StartPublication {
        ids: Vec<FullId>,
        fid: ForwardingId,
    },
    /// Stop publishing the item known under `ids`.
    StopPublication { ids: Vec<FullId> },
}

/// One-way request published towards the Topology Authority.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TopologyRequest {
    /// Compute forwarding state for one item; the authority notifies the
    /// publishers directly with the resulting forwarding identifier.
    MatchPubSubs {
        ids: Vec<FullId>,
        publishers: Vec<NodeLabel>,
        subscribers: Vec<NodeLabel>,
        strategy: Strategy,
    },
    /// Deliver a structural notification to remote subscribers on the
    /// core's behalf.
    NotifySubscribers {
        kind: NotifyKind,
        ids: Vec<FullId>,
        subscribers: Vec<NodeLabel>,
        strategy: Strategy,
    },
}

/// Request type byte for [`TopologyRequest::MatchPubSubs`].
pub const TA_MATCH_PUB_SUBS: u8 = 0x01;
/// Request type byte for [`TopologyRequest::NotifySubscribers`].
pub const TA_NOTIFY_SUBSCRIBERS: u8 = 0x02;

impl TopologyRequest {
    /// Format the request for the authority's control channel.
    ///
    /// Layout: type, strategy, then length-prefixed label lists and the
    /// identifier set (u16 counts, u16 per-identifier byte length).
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        match self {
            TopologyRequest::MatchPubSubs {
                ids,
                publishers,
                subscribers,
                strategy,
            } => {
                buf.put_u8(TA_MATCH_PUB_SUBS);
                buf.put_u8(strategy.to_byte());
                put_labels(&mut buf, publishers);
                put_labels(&mut buf, subscribers);
                put_ids(&mut buf, ids);
            }
            TopologyRequest::NotifySubscribers {
                kind,
                ids,
                subscribers,
                strategy,
            } => {
                buf.put_u8(TA_NOTIFY_SUBSCRIBERS);
                buf.put_u8(strategy.to_byte());
                buf.put_u8(kind.to_byte());
                put_labels(&mut buf, subscribers);
                put_ids(&mut buf, ids);
            }
        }
        buf
    }
}

fn put_labels(buf: &mut BytesMut, labels: &[NodeLabel]) {
    buf.put_u16(labels.len() as u16);
    for label in labels {
        buf.put_slice(&label.0);
    }
}

fn put_ids(buf: &mut BytesMut, ids: &[FullId]) {
    buf.put_u16(ids.len() as u16);
    for id in ids {
        buf.put_u16(id.encoded_len() as u16);
        id.encode(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FragmentId, FRAGMENT_LEN};

    #[test]
    fn test_match_request_layout() {
        let id = FullId::root(FragmentId::named("A")).child(FragmentId::named("B"));
        let request = TopologyRequest::MatchPubSubs {
            ids: vec![id],
            publishers: vec![NodeLabel::named("P1"), NodeLabel::named("P2")],
            subscribers: vec![NodeLabel::named("S1")],
            strategy: Strategy::Domain,
        };

        let buf = request.encode();
        assert_eq!(buf[0], TA_MATCH_PUB_SUBS);
        assert_eq!(buf[1], Strategy::Domain.to_byte());
        // 2 publishers, 1 subscriber, 1 identifier of 2 fragments
        let expected = 2 + (2 + 2 * FRAGMENT_LEN) + (2 + FRAGMENT_LEN) + (2 + 2 + 2 * FRAGMENT_LEN);
        assert_eq!(buf.len(), expected);
    }

    #[test]
    fn test_notify_request_carries_kind() {
        let request = TopologyRequest::NotifySubscribers {
            kind: NotifyKind::ScopePublished,
            ids: vec![FullId::root(FragmentId::named("A"))],
            subscribers: vec![NodeLabel::named("S1")],
            strategy: Strategy::Domain,
        };

        let buf = request.encode();
        assert_eq!(buf[0], TA_NOTIFY_SUBSCRIBERS);
        assert_eq!(buf[2], NotifyKind::ScopePublished.to_byte());
    }
}
