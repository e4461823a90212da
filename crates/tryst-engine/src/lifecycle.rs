//! Lifecycle engine
//!
//! One `RendezvousDomain` owns the naming graph, the host registry and
//! the outbound queues of a single node. Every pub/sub request is
//! dispatched here by kind and identifier shape:
//! - single fragment, empty prefix: root scope forms
//! - single fragment, non-empty prefix: inner scope / item forms
//! - several fragments: republish forms attaching an existing node under
//!   an additional father
//!
//! Rejections are ordinary [`RvStatus`] outcomes and leave the graph
//! untouched. An `Err` means a broken internal invariant; the operation
//! aborts without repair.

use std::collections::HashSet;

use tracing::debug;
use tryst_core::{
    FullId, ItemRef, LocalNotification, NodeLabel, NotifyKind, RequestKind, RvRequest, RvResult,
    RvStatus, ScopeRef, TopologyRequest,
};
use tryst_graph::{extend_ids, GraphIndex, HostRegistry, InformationItem, Scope};

use crate::dispatcher::NotificationDispatcher;
use crate::rendezvous::FatherScopes;

/// The rendezvous state of one node.
pub struct RendezvousDomain {
    pub(crate) graph: GraphIndex,
    pub(crate) hosts: HostRegistry,
    pub(crate) dispatcher: NotificationDispatcher,
}

impl RendezvousDomain {
    pub fn new(local: NodeLabel) -> Self {
        RendezvousDomain {
            graph: GraphIndex::new(),
            hosts: HostRegistry::new(),
            dispatcher: NotificationDispatcher::new(local),
        }
    }

    pub fn graph(&self) -> &GraphIndex {
        &self.graph
    }

    pub fn hosts(&self) -> &HostRegistry {
        &self.hosts
    }

    pub fn local_label(&self) -> NodeLabel {
        self.dispatcher.local_label()
    }

    pub fn pop_local_notification(&mut self) -> Option<LocalNotification> {
        self.dispatcher.pop_local()
    }

    pub fn pop_topology_request(&mut self) -> Option<TopologyRequest> {
        self.dispatcher.pop_topology()
    }

    pub fn drain_local_notifications(&mut self) -> Vec<LocalNotification> {
        self.dispatcher.drain_local()
    }

    pub fn drain_topology_requests(&mut self) -> Vec<TopologyRequest> {
        self.dispatcher.drain_topology()
    }

    /// Handle one pub/sub request and return its outcome.
    pub fn handle(&mut self, request: &RvRequest) -> RvResult<RvStatus> {
        debug!(
            kind = ?request.kind,
            source = %request.source,
            id = %request.id,
            prefix = %request.prefix,
            "pub/sub request"
        );
        let status = match request.kind {
            RequestKind::PublishScope => match request.id.len() {
                0 => RvStatus::MalformedIdentifier,
                1 if request.prefix.is_empty() => self.publish_root_scope(request)?,
                1 => self.publish_inner_scope(request)?,
                _ => self.republish_scope(request)?,
            },
            RequestKind::PublishInfo => match request.id.len() {
                0 => RvStatus::MalformedIdentifier,
                _ if request.prefix.is_empty() => RvStatus::MalformedIdentifier,
                1 => self.advertise_info(request)?,
                _ => self.readvertise_info(request)?,
            },
            RequestKind::SubscribeScope => match request.id.len() {
                1 => self.subscribe_scope(request)?,
                _ => RvStatus::MalformedIdentifier,
            },
            RequestKind::SubscribeInfo => {
                if request.id.len() == 1 && !request.prefix.is_empty() {
                    self.subscribe_info(request)?
                } else {
                    RvStatus::MalformedIdentifier
                }
            }
            RequestKind::UnpublishScope => match request.id.len() {
                1 => self.unpublish_scope(request)?,
                _ => RvStatus::MalformedIdentifier,
            },
            RequestKind::UnpublishInfo => {
                if request.id.len() == 1 && !request.prefix.is_empty() {
                    self.unpublish_info(request)?
                } else {
                    RvStatus::MalformedIdentifier
                }
            }
            RequestKind::UnsubscribeScope => match request.id.len() {
                1 => self.unsubscribe_scope(request)?,
                _ => RvStatus::MalformedIdentifier,
            },
            RequestKind::UnsubscribeInfo => {
                if request.id.len() == 1 && !request.prefix.is_empty() {
                    self.unsubscribe_info(request)?
                } else {
                    RvStatus::MalformedIdentifier
                }
            }
        };
        Ok(status)
    }

    fn publish_root_scope(&mut self, req: &RvRequest) -> RvResult<RvStatus> {
        let Some(fragment) = req.id.last() else {
            return Ok(RvStatus::MalformedIdentifier);
        };
        let full = FullId::root(fragment);
        if let Some(sref) = self.graph.scope_ref(&full) {
            if self.graph.scope(sref)?.strategy != req.strategy {
                return Ok(RvStatus::StrategyMismatch);
            }
            self.graph.scope_mut(sref)?.publishers.insert(req.source);
            self.hosts
                .get_or_create(req.source)
                .published_scopes
                .insert(full);
            return Ok(RvStatus::Success);
        }
        if self.graph.item_ref(&full).is_some() {
            return Ok(RvStatus::IdExistsAsItem);
        }

        let sref = self
            .graph
            .insert_scope(Scope::root(req.strategy, fragment))?;
        self.graph.scope_mut(sref)?.publishers.insert(req.source);
        self.hosts
            .get_or_create(req.source)
            .published_scopes
            .insert(full.clone());
        debug!(id = %full, "root scope published");
        Ok(RvStatus::Success)
    }

    fn publish_inner_scope(&mut self, req: &RvRequest) -> RvResult<RvStatus> {
        let Some(fragment) = req.id.last() else {
            return Ok(RvStatus::MalformedIdentifier);
        };
        let Some(father_ref) = self.graph.scope_ref(&req.prefix) else {
            return Ok(RvStatus::ScopeNotFound);
        };

        // classify the name before any strategy consideration
        let full = req.prefix.child(fragment);
        if let Some(sref) = self.graph.scope_ref(&full) {
            if self.graph.scope(sref)?.strategy != req.strategy {
                return Ok(RvStatus::StrategyMismatch);
            }
            self.graph.scope_mut(sref)?.publishers.insert(req.source);
            self.hosts
                .get_or_create(req.source)
                .published_scopes
                .insert(full);
            return Ok(RvStatus::Success);
        }
        if self.graph.item_ref(&full).is_some() {
            return Ok(RvStatus::IdExistsAsItem);
        }

        let (father_strategy, father_ids, father_subs) = {
            let father = self.graph.scope(father_ref)?;
            (
                father.strategy,
                father.ids.clone(),
                father.subscribers.clone(),
            )
        };
        if father_strategy != req.strategy {
            return Ok(RvStatus::StrategyMismatch);
        }

        let ids = extend_ids(&father_ids, fragment);
        let sref = self
            .graph
            .insert_scope(Scope::inner(req.strategy, fragment, father_ref, ids))?;
        self.graph.scope_mut(father_ref)?.child_scopes.insert(sref);
        let announce = {
            let scope = self.graph.scope_mut(sref)?;
            scope.publishers.insert(req.source);
            scope.sorted_ids()
        };
        self.hosts
            .get_or_create(req.source)
            .published_scopes
            .insert(full);
        self.dispatcher.notify_subscribers(
            NotifyKind::ScopePublished,
            announce,
            &father_subs,
            req.strategy,
        );
        Ok(RvStatus::Success)
    }

    /// Attach an already published scope under one more father.
    fn republish_scope(&mut self, req: &RvRequest) -> RvResult<RvStatus> {
        let Some(target_ref) = self.graph.scope_ref(&req.id) else {
            if self.graph.item_ref(&req.id).is_some() {
                return Ok(RvStatus::IdExistsAsItem);
            }
            return Ok(RvStatus::TargetNotFound);
        };
        let Some(father_ref) = self.graph.scope_ref(&req.prefix) else {
            return Ok(RvStatus::ScopeNotFound);
        };
        if father_ref == target_ref {
            return Ok(RvStatus::MalformedIdentifier);
        }

        let (target_strategy, target_fragment, target_ids, already_child) = {
            let target = self.graph.scope(target_ref)?;
            let father = self.graph.scope(father_ref)?;
            (
                target.strategy,
                target.fragment,
                target.ids.clone(),
                father.child_scopes.contains(&target_ref),
            )
        };
        // classify the name before any strategy consideration
        let new_full = req.prefix.child(target_fragment);
        if already_child {
            if target_strategy != req.strategy {
                return Ok(RvStatus::StrategyMismatch);
            }
            self.graph
                .scope_mut(target_ref)?
                .publishers
                .insert(req.source);
            self.hosts
                .get_or_create(req.source)
                .published_scopes
                .insert(new_full);
            return Ok(RvStatus::Success);
        }
        if self.graph.item_ref(&new_full).is_some() {
            return Ok(RvStatus::IdExistsAsItem);
        }
        if self.graph.scope_ref(&new_full).is_some() {
            return Ok(RvStatus::IdExistsAsScope);
        }

        let (father_strategy, father_ids, father_subs) = {
            let father = self.graph.scope(father_ref)?;
            (
                father.strategy,
                father.ids.clone(),
                father.subscribers.clone(),
            )
        };
        if target_strategy != req.strategy || father_strategy != req.strategy {
            return Ok(RvStatus::StrategyMismatch);
        }
        // attaching under a descendant would close a cycle
        if self.is_scope_descendant(father_ref, target_ref)? {
            return Ok(RvStatus::MalformedIdentifier);
        }

        let gained: HashSet<FullId> = extend_ids(&father_ids, target_fragment)
            .into_iter()
            .filter(|id| !target_ids.contains(id))
            .collect();
        self.graph
            .scope_mut(father_ref)?
            .child_scopes
            .insert(target_ref);
        self.graph
            .scope_mut(target_ref)?
            .parents
            .insert(father_ref);
        self.adopt_scope_ids(target_ref, &gained)?;
        self.graph
            .scope_mut(target_ref)?
            .publishers
            .insert(req.source);
        self.hosts
            .get_or_create(req.source)
            .published_scopes
            .insert(new_full);

        let mut announce: Vec<FullId> = gained.into_iter().collect();
        announce.sort();
        self.dispatcher.notify_subscribers(
            NotifyKind::ScopePublished,
            announce,
            &father_subs,
            req.strategy,
        );
        Ok(RvStatus::Success)
    }

    fn advertise_info(&mut self, req: &RvRequest) -> RvResult<RvStatus> {
        let Some(fragment) = req.id.last() else {
            return Ok(RvStatus::MalformedIdentifier);
        };
        let Some(father_ref) = self.graph.scope_ref(&req.prefix) else {
            return Ok(RvStatus::ScopeNotFound);
        };

        // classify the name before any strategy consideration
        let full = req.prefix.child(fragment);
        if let Some(iref) = self.graph.item_ref(&full) {
            if self.graph.item(iref)?.strategy != req.strategy {
                return Ok(RvStatus::StrategyMismatch);
            }
            self.graph.item_mut(iref)?.publishers.insert(req.source);
            self.hosts
                .get_or_create(req.source)
                .published_items
                .insert(full);
            self.rendezvous(iref, FatherScopes::Single(father_ref))?;
            return Ok(RvStatus::Success);
        }
        if self.graph.scope_ref(&full).is_some() {
            return Ok(RvStatus::IdExistsAsScope);
        }

        let (father_strategy, father_ids) = {
            let father = self.graph.scope(father_ref)?;
            (father.strategy, father.ids.clone())
        };
        if father_strategy != req.strategy {
            return Ok(RvStatus::StrategyMismatch);
        }

        let ids = extend_ids(&father_ids, fragment);
        let iref = self
            .graph
            .insert_item(InformationItem::new(req.strategy, fragment, father_ref, ids))?;
        self.graph.scope_mut(father_ref)?.child_items.insert(iref);
        self.graph.item_mut(iref)?.publishers.insert(req.source);
        self.hosts
            .get_or_create(req.source)
            .published_items
            .insert(full);
        self.rendezvous(iref, FatherScopes::Single(father_ref))?;
        Ok(RvStatus::Success)
    }

    /// Attach an already advertised item under one more father.
    fn readvertise_info(&mut self, req: &RvRequest) -> RvResult<RvStatus> {
        let Some(iref) = self.graph.item_ref(&req.id) else {
            if self.graph.scope_ref(&req.id).is_some() {
                return Ok(RvStatus::IdExistsAsScope);
            }
            return Ok(RvStatus::TargetNotFound);
        };
        let Some(father_ref) = self.graph.scope_ref(&req.prefix) else {
            return Ok(RvStatus::ScopeNotFound);
        };

        let (item_strategy, item_fragment, item_ids) = {
            let item = self.graph.item(iref)?;
            (item.strategy, item.fragment, item.ids.clone())
        };
        let already_child = self.graph.scope(father_ref)?.child_items.contains(&iref);

        // classify the name before any strategy consideration
        let new_full = req.prefix.child(item_fragment);
        if already_child {
            if item_strategy != req.strategy {
                return Ok(RvStatus::StrategyMismatch);
            }
            self.graph.item_mut(iref)?.publishers.insert(req.source);
            self.hosts
                .get_or_create(req.source)
                .published_items
                .insert(new_full);
            self.rendezvous(iref, FatherScopes::All)?;
            return Ok(RvStatus::Success);
        }
        if self.graph.scope_ref(&new_full).is_some() {
            return Ok(RvStatus::IdExistsAsScope);
        }
        if self.graph.item_ref(&new_full).is_some() {
            return Ok(RvStatus::IdExistsAsItem);
        }

        let (father_strategy, father_ids) = {
            let father = self.graph.scope(father_ref)?;
            (father.strategy, father.ids.clone())
        };
        if item_strategy != req.strategy || father_strategy != req.strategy {
            return Ok(RvStatus::StrategyMismatch);
        }

        let gained: HashSet<FullId> = extend_ids(&father_ids, item_fragment)
            .into_iter()
            .filter(|id| !item_ids.contains(id))
            .collect();
        for id in &gained {
            self.graph.bind_item_id(id.clone(), iref)?;
        }
        {
            let item = self.graph.item_mut(iref)?;
            item.ids.extend(gained);
            item.parents.insert(father_ref);
            item.publishers.insert(req.source);
        }
        self.graph.scope_mut(father_ref)?.child_items.insert(iref);
        self.hosts
            .get_or_create(req.source)
            .published_items
            .insert(new_full);
        self.rendezvous(iref, FatherScopes::All)?;
        Ok(RvStatus::Success)
    }

    fn subscribe_scope(&mut self, req: &RvRequest) -> RvResult<RvStatus> {
        let Some(fragment) = req.id.last() else {
            return Ok(RvStatus::MalformedIdentifier);
        };

        if req.prefix.is_empty() {
            let full = FullId::root(fragment);
            if let Some(sref) = self.graph.scope_ref(&full) {
                if self.graph.scope(sref)?.strategy != req.strategy {
                    return Ok(RvStatus::StrategyMismatch);
                }
                self.attach_scope_subscriber(sref, full, req.source)?;
                return Ok(RvStatus::Success);
            }
            if self.graph.item_ref(&full).is_some() {
                return Ok(RvStatus::IdExistsAsItem);
            }
            let sref = self
                .graph
                .insert_scope(Scope::root(req.strategy, fragment))?;
            self.graph.scope_mut(sref)?.subscribers.insert(req.source);
            self.hosts
                .get_or_create(req.source)
                .subscribed_scopes
                .insert(full);
            return Ok(RvStatus::Success);
        }

        let Some(father_ref) = self.graph.scope_ref(&req.prefix) else {
            return Ok(RvStatus::ScopeNotFound);
        };

        // classify the name before any strategy consideration
        let full = req.prefix.child(fragment);
        if let Some(sref) = self.graph.scope_ref(&full) {
            if self.graph.scope(sref)?.strategy != req.strategy {
                return Ok(RvStatus::StrategyMismatch);
            }
            self.attach_scope_subscriber(sref, full, req.source)?;
            return Ok(RvStatus::Success);
        }
        if self.graph.item_ref(&full).is_some() {
            return Ok(RvStatus::IdExistsAsItem);
        }

        let (father_strategy, father_ids, father_subs) = {
            let father = self.graph.scope(father_ref)?;
            (
                father.strategy,
                father.ids.clone(),
                father.subscribers.clone(),
            )
        };
        if father_strategy != req.strategy {
            return Ok(RvStatus::StrategyMismatch);
        }

        let ids = extend_ids(&father_ids, fragment);
        let sref = self
            .graph
            .insert_scope(Scope::inner(req.strategy, fragment, father_ref, ids))?;
        self.graph.scope_mut(father_ref)?.child_scopes.insert(sref);
        let announce = {
            let scope = self.graph.scope_mut(sref)?;
            scope.subscribers.insert(req.source);
            scope.sorted_ids()
        };
        self.hosts
            .get_or_create(req.source)
            .subscribed_scopes
            .insert(full);
        self.dispatcher.notify_subscribers(
            NotifyKind::ScopePublished,
            announce,
            &father_subs,
            req.strategy,
        );
        Ok(RvStatus::Success)
    }

    /// Add a subscriber to an existing scope and bring it up to date:
    /// announce the direct child scopes to it and re-run the match for
    /// every direct child item.
    fn attach_scope_subscriber(
        &mut self,
        sref: ScopeRef,
        full: FullId,
        source: NodeLabel,
    ) -> RvResult<()> {
        self.graph.scope_mut(sref)?.subscribers.insert(source);
        self.hosts
            .get_or_create(source)
            .subscribed_scopes
            .insert(full);

        let (child_scopes, child_items) = {
            let scope = self.graph.scope(sref)?;
            (
                scope.child_scopes.iter().copied().collect::<Vec<ScopeRef>>(),
                scope.child_items.iter().copied().collect::<Vec<ItemRef>>(),
            )
        };
        let only_new: HashSet<NodeLabel> = [source].into_iter().collect();
        for child in child_scopes {
            let (ids, strategy) = {
                let scope = self.graph.scope(child)?;
                (scope.sorted_ids(), scope.strategy)
            };
            self.dispatcher
                .notify_subscribers(NotifyKind::ScopePublished, ids, &only_new, strategy);
        }
        for iref in child_items {
            self.rendezvous(iref, FatherScopes::Single(sref))?;
        }
        Ok(())
    }

    fn subscribe_info(&mut self, req: &RvRequest) -> RvResult<RvStatus> {
        let Some(fragment) = req.id.last() else {
            return Ok(RvStatus::MalformedIdentifier);
        };
        let Some(father_ref) = self.graph.scope_ref(&req.prefix) else {
            return Ok(RvStatus::ScopeNotFound);
        };

        // classify the name before any strategy consideration
        let full = req.prefix.child(fragment);
        if let Some(iref) = self.graph.item_ref(&full) {
            if self.graph.item(iref)?.strategy != req.strategy {
                return Ok(RvStatus::StrategyMismatch);
            }
            self.graph.item_mut(iref)?.subscribers.insert(req.source);
            self.hosts
                .get_or_create(req.source)
                .subscribed_items
                .insert(full);
            self.rendezvous(iref, FatherScopes::All)?;
            return Ok(RvStatus::Success);
        }
        if self.graph.scope_ref(&full).is_some() {
            return Ok(RvStatus::IdExistsAsScope);
        }

        let (father_strategy, father_ids) = {
            let father = self.graph.scope(father_ref)?;
            (father.strategy, father.ids.clone())
        };
        if father_strategy != req.strategy {
            return Ok(RvStatus::StrategyMismatch);
        }

        // a fresh item has no publisher, so there is no match to run yet
        let ids = extend_ids(&father_ids, fragment);
        let iref = self
            .graph
            .insert_item(InformationItem::new(req.strategy, fragment, father_ref, ids))?;
        self.graph.scope_mut(father_ref)?.child_items.insert(iref);
        self.graph.item_mut(iref)?.subscribers.insert(req.source);
        self.hosts
            .get_or_create(req.source)
            .subscribed_items
            .insert(full);
        Ok(RvStatus::Success)
    }

    fn unpublish_scope(&mut self, req: &RvRequest) -> RvResult<RvStatus> {
        let Some(fragment) = req.id.last() else {
            return Ok(RvStatus::MalformedIdentifier);
        };
        let father_ref = if req.prefix.is_empty() {
            None
        } else {
            match self.graph.scope_ref(&req.prefix) {
                Some(sref) => Some(sref),
                None => return Ok(RvStatus::ScopeNotFound),
            }
        };
        let full = if req.prefix.is_empty() {
            FullId::root(fragment)
        } else {
            req.prefix.child(fragment)
        };
        let Some(sref) = self.graph.scope_ref(&full) else {
            if self.graph.item_ref(&full).is_some() {
                return Ok(RvStatus::IdExistsAsItem);
            }
            return Ok(RvStatus::TargetNotFound);
        };
        if self.graph.scope(sref)?.strategy != req.strategy {
            return Ok(RvStatus::StrategyMismatch);
        }

        // the publisher leaves every descendant item before any
        // structural deletion
        self.cascade_unpublish_items(sref, req.source)?;

        self.graph.scope_mut(sref)?.publishers.remove(&req.source);
        if let Some(host) = self.hosts.get_mut(req.source) {
            host.published_scopes.remove(&full);
        }
        self.hosts.prune_idle(req.source);

        self.try_delete_scope_branch(sref, father_ref, &full)?;
        Ok(RvStatus::Success)
    }

    fn unsubscribe_scope(&mut self, req: &RvRequest) -> RvResult<RvStatus> {
        let Some(fragment) = req.id.last() else {
            return Ok(RvStatus::MalformedIdentifier);
        };
        let father_ref = if req.prefix.is_empty() {
            None
        } else {
            match self.graph.scope_ref(&req.prefix) {
                Some(sref) => Some(sref),
                None => return Ok(RvStatus::ScopeNotFound),
            }
        };
        let full = if req.prefix.is_empty() {
            FullId::root(fragment)
        } else {
            req.prefix.child(fragment)
        };
        let Some(sref) = self.graph.scope_ref(&full) else {
            if self.graph.item_ref(&full).is_some() {
                return Ok(RvStatus::IdExistsAsItem);
            }
            return Ok(RvStatus::TargetNotFound);
        };
        if self.graph.scope(sref)?.strategy != req.strategy {
            return Ok(RvStatus::StrategyMismatch);
        }

        // detach first so every re-run sees the reduced subscriber set
        self.graph.scope_mut(sref)?.subscribers.remove(&req.source);
        if let Some(host) = self.hosts.get_mut(req.source) {
            host.subscribed_scopes.remove(&full);
        }
        self.hosts.prune_idle(req.source);

        let handled = self.cascade_unsubscribe_items(sref, req.source)?;
        // the aggregated subscriber set of every direct child item shrank
        // through this scope even when the item was not subscribed to
        // directly
        if self.graph.contains_scope(sref) {
            let direct: Vec<ItemRef> = self
                .graph
                .scope(sref)?
                .child_items
                .iter()
                .copied()
                .collect();
            for iref in direct {
                if !handled.contains(&iref) {
                    self.rendezvous(iref, FatherScopes::All)?;
                }
            }
        }

        self.try_delete_scope_branch(sref, father_ref, &full)?;
        Ok(RvStatus::Success)
    }

    fn unpublish_info(&mut self, req: &RvRequest) -> RvResult<RvStatus> {
        let Some(fragment) = req.id.last() else {
            return Ok(RvStatus::MalformedIdentifier);
        };
        let Some(father_ref) = self.graph.scope_ref(&req.prefix) else {
            return Ok(RvStatus::ScopeNotFound);
        };
        let full = req.prefix.child(fragment);
        let Some(iref) = self.graph.item_ref(&full) else {
            if self.graph.scope_ref(&full).is_some() {
                return Ok(RvStatus::IdExistsAsScope);
            }
            return Ok(RvStatus::TargetNotFound);
        };
        if self.graph.item(iref)?.strategy != req.strategy {
            return Ok(RvStatus::StrategyMismatch);
        }

        self.graph.item_mut(iref)?.publishers.remove(&req.source);
        if let Some(host) = self.hosts.get_mut(req.source) {
            host.published_items.remove(&full);
        }
        self.hosts.prune_idle(req.source);

        if self.graph.item(iref)?.is_abandoned() {
            self.delete_item_branch(iref, father_ref)?;
        } else {
            self.rendezvous(iref, FatherScopes::All)?;
        }
        Ok(RvStatus::Success)
    }

    fn unsubscribe_info(&mut self, req: &RvRequest) -> RvResult<RvStatus> {
        let Some(fragment) = req.id.last() else {
            return Ok(RvStatus::MalformedIdentifier);
        };
        let Some(father_ref) = self.graph.scope_ref(&req.prefix) else {
            return Ok(RvStatus::ScopeNotFound);
        };
        let full = req.prefix.child(fragment);
        let Some(iref) = self.graph.item_ref(&full) else {
            if self.graph.scope_ref(&full).is_some() {
                return Ok(RvStatus::IdExistsAsScope);
            }
            return Ok(RvStatus::TargetNotFound);
        };
        if self.graph.item(iref)?.strategy != req.strategy {
            return Ok(RvStatus::StrategyMismatch);
        }

        self.graph.item_mut(iref)?.subscribers.remove(&req.source);
        if let Some(host) = self.hosts.get_mut(req.source) {
            host.subscribed_items.remove(&full);
        }
        self.hosts.prune_idle(req.source);

        if self.graph.item(iref)?.is_abandoned() {
            self.delete_item_branch(iref, father_ref)?;
        } else {
            self.rendezvous(iref, FatherScopes::All)?;
        }
        Ok(RvStatus::Success)
    }

    /// Remove `source` as publisher from every item in the subtree rooted
    /// at `root`. Abandoned items are deleted; survivors whose publisher
    /// set actually shrank are re-matched.
    fn cascade_unpublish_items(&mut self, root: ScopeRef, source: NodeLabel) -> RvResult<()> {
        let mut stack = vec![root];
        let mut seen_scopes: HashSet<ScopeRef> = HashSet::new();
        let mut seen_items: HashSet<ItemRef> = HashSet::new();
        while let Some(sref) = stack.pop() {
            if !seen_scopes.insert(sref) {
                continue;
            }
            let (child_scopes, child_items) = {
                let scope = self.graph.scope(sref)?;
                (
                    scope.child_scopes.iter().copied().collect::<Vec<ScopeRef>>(),
                    scope.child_items.iter().copied().collect::<Vec<ItemRef>>(),
                )
            };
            stack.extend(child_scopes);
            for iref in child_items {
                if !seen_items.insert(iref) {
                    continue;
                }
                if !self.graph.item_mut(iref)?.publishers.remove(&source) {
                    continue;
                }
                if let Some(host) = self.hosts.get_mut(source) {
                    for id in &self.graph.item(iref)?.ids {
                        host.published_items.remove(id);
                    }
                }
                if self.graph.item(iref)?.is_abandoned() {
                    self.delete_item_completely(iref)?;
                } else {
                    self.rendezvous(iref, FatherScopes::All)?;
                }
            }
        }
        self.hosts.prune_idle(source);
        Ok(())
    }

    /// Mirror of [`cascade_unpublish_items`] for subscribers. Returns the
    /// items that were touched, deleted or re-matched here.
    fn cascade_unsubscribe_items(
        &mut self,
        root: ScopeRef,
        source: NodeLabel,
    ) -> RvResult<HashSet<ItemRef>> {
        let mut stack = vec![root];
        let mut seen_scopes: HashSet<ScopeRef> = HashSet::new();
        let mut handled: HashSet<ItemRef> = HashSet::new();
        let mut seen_items: HashSet<ItemRef> = HashSet::new();
        while let Some(sref) = stack.pop() {
            if !seen_scopes.insert(sref) {
                continue;
            }
            let (child_scopes, child_items) = {
                let scope = self.graph.scope(sref)?;
                (
                    scope.child_scopes.iter().copied().collect::<Vec<ScopeRef>>(),
                    scope.child_items.iter().copied().collect::<Vec<ItemRef>>(),
                )
            };
            stack.extend(child_scopes);
            for iref in child_items {
                if !seen_items.insert(iref) {
                    continue;
                }
                if !self.graph.item_mut(iref)?.subscribers.remove(&source) {
                    continue;
                }
                if let Some(host) = self.hosts.get_mut(source) {
                    for id in &self.graph.item(iref)?.ids {
                        host.subscribed_items.remove(id);
                    }
                }
                handled.insert(iref);
                if self.graph.item(iref)?.is_abandoned() {
                    self.delete_item_completely(iref)?;
                } else {
                    self.rendezvous(iref, FatherScopes::All)?;
                }
            }
        }
        self.hosts.prune_idle(source);
        Ok(handled)
    }

    /// Delete an abandoned scope once its last publisher or subscriber
    /// left. The root form drops the single-fragment identifier; the
    /// inner form removes only the branch through `father`, so a node
    /// shared by other fathers survives under its remaining identifiers.
    fn try_delete_scope_branch(
        &mut self,
        sref: ScopeRef,
        father_ref: Option<ScopeRef>,
        full: &FullId,
    ) -> RvResult<()> {
        if !self.graph.contains_scope(sref) || !self.graph.scope(sref)?.is_abandoned() {
            return Ok(());
        }
        match father_ref {
            None => {
                self.graph.unbind_scope_id(full);
                let remove_node = {
                    let scope = self.graph.scope_mut(sref)?;
                    scope.ids.remove(full);
                    scope.parents.is_empty() && scope.ids.is_empty()
                };
                if remove_node {
                    self.graph.remove_scope(sref)?;
                    debug!(id = %full, "root scope deleted");
                }
            }
            Some(father) => {
                let (father_ids, father_subs) = {
                    let scope = self.graph.scope(father)?;
                    (scope.ids.clone(), scope.subscribers.clone())
                };
                let (fragment, strategy) = {
                    let scope = self.graph.scope(sref)?;
                    (scope.fragment, scope.strategy)
                };
                let branch_ids: Vec<FullId> =
                    extend_ids(&father_ids, fragment).into_iter().collect();

                self.graph.scope_mut(father)?.child_scopes.remove(&sref);
                let remove_node = {
                    let scope = self.graph.scope_mut(sref)?;
                    scope.parents.remove(&father);
                    for id in &branch_ids {
                        scope.ids.remove(id);
                    }
                    scope.parents.is_empty() && scope.ids.is_empty()
                };
                for id in &branch_ids {
                    self.graph.unbind_scope_id(id);
                }
                if remove_node {
                    self.graph.remove_scope(sref)?;
                }

                let mut announce = branch_ids;
                announce.sort();
                self.dispatcher.notify_subscribers(
                    NotifyKind::ScopeUnpublished,
                    announce,
                    &father_subs,
                    strategy,
                );
                self.collect_abandoned_root(father)?;
            }
        }
        Ok(())
    }

    /// Delete an abandoned item from every father at once, then give each
    /// former father a chance to be collected.
    fn delete_item_completely(&mut self, iref: ItemRef) -> RvResult<()> {
        let item = self.graph.remove_item(iref)?;
        for &parent in &item.parents {
            if self.graph.contains_scope(parent) {
                self.graph.scope_mut(parent)?.child_items.remove(&iref);
            }
        }
        for &parent in &item.parents {
            self.collect_abandoned_root(parent)?;
        }
        Ok(())
    }

    /// Remove an abandoned item's branch through one father; the node
    /// itself goes once no father remains.
    fn delete_item_branch(&mut self, iref: ItemRef, father: ScopeRef) -> RvResult<()> {
        let father_ids = self.graph.scope(father)?.ids.clone();
        let fragment = self.graph.item(iref)?.fragment;
        let branch_ids: Vec<FullId> = extend_ids(&father_ids, fragment).into_iter().collect();

        self.graph.scope_mut(father)?.child_items.remove(&iref);
        let remove_node = {
            let item = self.graph.item_mut(iref)?;
            item.parents.remove(&father);
            for id in &branch_ids {
                item.ids.remove(id);
            }
            item.parents.is_empty()
        };
        for id in &branch_ids {
            self.graph.unbind_item_id(id);
        }
        if remove_node {
            self.graph.remove_item(iref)?;
        }
        self.collect_abandoned_root(father)?;
        Ok(())
    }

    /// Upward collection: a former father disappears only when it is a
    /// root (no father of its own) with nothing left underneath and
    /// nobody attached.
    fn collect_abandoned_root(&mut self, sref: ScopeRef) -> RvResult<()> {
        if !self.graph.contains_scope(sref) {
            return Ok(());
        }
        let collectable = {
            let scope = self.graph.scope(sref)?;
            scope.is_abandoned() && scope.parents.is_empty()
        };
        if collectable {
            self.graph.remove_scope(sref)?;
            debug!(?sref, "empty root scope collected");
        }
        Ok(())
    }

    /// Propagate freshly gained identifiers down a republished branch.
    fn adopt_scope_ids(&mut self, sref: ScopeRef, gained: &HashSet<FullId>) -> RvResult<()> {
        if gained.is_empty() {
            return Ok(());
        }
        for id in gained {
            self.graph.bind_scope_id(id.clone(), sref)?;
        }
        let (child_scopes, child_items) = {
            let scope = self.graph.scope_mut(sref)?;
            scope.ids.extend(gained.iter().cloned());
            (
                scope.child_scopes.iter().copied().collect::<Vec<ScopeRef>>(),
                scope.child_items.iter().copied().collect::<Vec<ItemRef>>(),
            )
        };
        for iref in child_items {
            let item_gained: HashSet<FullId> = {
                let item = self.graph.item(iref)?;
                extend_ids(gained, item.fragment)
                    .into_iter()
                    .filter(|id| !item.ids.contains(id))
                    .collect()
            };
            for id in &item_gained {
                self.graph.bind_item_id(id.clone(), iref)?;
            }
            self.graph.item_mut(iref)?.ids.extend(item_gained);
        }
        for child in child_scopes {
            let child_gained: HashSet<FullId> = {
                let scope = self.graph.scope(child)?;
                extend_ids(gained, scope.fragment)
                    .into_iter()
                    .filter(|id| !scope.ids.contains(id))
                    .collect()
            };
            self.adopt_scope_ids(child, &child_gained)?;
        }
        Ok(())
    }

    fn is_scope_descendant(&self, candidate: ScopeRef, ancestor: ScopeRef) -> RvResult<bool> {
        let mut stack = vec![ancestor];
        let mut seen: HashSet<ScopeRef> = HashSet::new();
        while let Some(sref) = stack.pop() {
            if !seen.insert(sref) {
                continue;
            }
            for &child in &self.graph.scope(sref)?.child_scopes {
                if child == candidate {
                    return Ok(true);
                }
                stack.push(child);
            }
        }
        Ok(false)
    }
}
