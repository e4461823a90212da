//! Rendezvous matching
//!
//! One item, its publishers, and the subscribers aggregated from the item
//! itself plus father scopes. Local strategies are resolved on the spot
//! with a degenerate forwarding identifier; the Domain strategy is
//! delegated to the Topology Authority, fire-and-forget.

use std::collections::HashSet;

use tryst_core::{ForwardingId, ItemRef, NodeLabel, RvResult, ScopeRef, Strategy};

use crate::lifecycle::RendezvousDomain;

/// Which father scopes contribute their subscribers to a match.
#[derive(Clone, Copy, Debug)]
pub(crate) enum FatherScopes {
    /// Only the scope the triggering request went through.
    Single(ScopeRef),
    /// Every father of the item.
    All,
}

impl RendezvousDomain {
    /// Re-run the match for one item after its relevant sets changed.
    ///
    /// A subscription to an item or to one of its father scopes counts
    /// the same. With no publisher there is nobody to instruct and
    /// nothing to delegate, so the match is skipped entirely.
    pub(crate) fn rendezvous(&mut self, iref: ItemRef, fathers: FatherScopes) -> RvResult<()> {
        let item = self.graph.item(iref)?;
        if item.publishers.is_empty() {
            return Ok(());
        }

        let mut subscribers: HashSet<NodeLabel> = item.subscribers.clone();
        match fathers {
            FatherScopes::Single(sref) => {
                subscribers.extend(self.graph.scope(sref)?.subscribers.iter().copied());
            }
            FatherScopes::All => {
                for &sref in &item.parents {
                    subscribers.extend(self.graph.scope(sref)?.subscribers.iter().copied());
                }
            }
        }

        let ids = item.sorted_ids();
        match item.strategy {
            Strategy::NodeLocal | Strategy::LinkLocal => {
                let fid = if item.strategy == Strategy::NodeLocal {
                    ForwardingId::INTERNAL_LINK
                } else {
                    ForwardingId::BROADCAST
                };
                if subscribers.is_empty() {
                    self.dispatcher.stop_publication(ids);
                } else {
                    self.dispatcher.start_publication(ids, fid);
                }
            }
            Strategy::Domain => {
                let mut publishers: Vec<NodeLabel> = item.publishers.iter().copied().collect();
                publishers.sort();
                let mut subscribers: Vec<NodeLabel> = subscribers.into_iter().collect();
                subscribers.sort();
                self.dispatcher
                    .request_match(ids, publishers, subscribers, Strategy::Domain);
            }
        }
        Ok(())
    }
}
