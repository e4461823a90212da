//! Scope - hierarchical naming container
//!
//! A scope may be reachable through several parents without duplication:
//! one shared node, multiple incoming edges, one full identifier per path.

use std::collections::HashSet;

use tryst_core::{FragmentId, FullId, ItemRef, NodeLabel, ScopeRef, Strategy};

/// One naming container in the information graph.
#[derive(Clone, Debug)]
pub struct Scope {
    /// Dissemination strategy, immutable after creation.
    pub strategy: Strategy,
    /// The node's own fragment; every full identifier of this scope ends
    /// with it.
    pub fragment: FragmentId,
    pub publishers: HashSet<NodeLabel>,
    pub subscribers: HashSet<NodeLabel>,
    /// Parent scopes; empty only for roots.
    pub parents: HashSet<ScopeRef>,
    pub child_scopes: HashSet<ScopeRef>,
    pub child_items: HashSet<ItemRef>,
    /// Every full identifier under which this scope is known.
    pub ids: HashSet<FullId>,
}

impl Scope {
    /// A root scope, known under its single-fragment identifier.
    pub fn root(strategy: Strategy, fragment: FragmentId) -> Self {
        let mut ids = HashSet::new();
        ids.insert(FullId::root(fragment));
        Scope {
            strategy,
            fragment,
            publishers: HashSet::new(),
            subscribers: HashSet::new(),
            parents: HashSet::new(),
            child_scopes: HashSet::new(),
            child_items: HashSet::new(),
            ids,
        }
    }

    /// An inner scope under one parent, known under the given identifiers.
    pub fn inner(
        strategy: Strategy,
        fragment: FragmentId,
        parent: ScopeRef,
        ids: HashSet<FullId>,
    ) -> Self {
        let mut parents = HashSet::new();
        parents.insert(parent);
        Scope {
            strategy,
            fragment,
            publishers: HashSet::new(),
            subscribers: HashSet::new(),
            parents,
            child_scopes: HashSet::new(),
            child_items: HashSet::new(),
            ids,
        }
    }

    /// True when publishers, subscribers and children are all empty - the
    /// precondition for removing this scope (or one of its branches).
    pub fn is_abandoned(&self) -> bool {
        self.publishers.is_empty()
            && self.subscribers.is_empty()
            && self.child_scopes.is_empty()
            && self.child_items.is_empty()
    }

    /// Identifier set in a stable order, for notifications and tests.
    pub fn sorted_ids(&self) -> Vec<FullId> {
        let mut ids: Vec<FullId> = self.ids.iter().cloned().collect();
        ids.sort();
        ids
    }
}

/// Derive the identifiers of a child node with `fragment` from its
/// parent's identifier set.
pub fn extend_ids(parent_ids: &HashSet<FullId>, fragment: FragmentId) -> HashSet<FullId> {
    parent_ids.iter().map(|id| id.child(fragment)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_scope_single_id() {
        let scope = Scope::root(Strategy::Domain, FragmentId::named("A"));
        assert_eq!(scope.ids.len(), 1);
        assert!(scope.ids.contains(&FullId::root(FragmentId::named("A"))));
        assert!(scope.parents.is_empty());
        assert!(scope.is_abandoned());
    }

    #[test]
    fn test_abandoned_tracks_membership() {
        let mut scope = Scope::root(Strategy::Domain, FragmentId::named("A"));
        scope.subscribers.insert(NodeLabel::named("S1"));
        assert!(!scope.is_abandoned());

        scope.subscribers.clear();
        scope.child_items.insert(tryst_core::ItemRef(7));
        assert!(!scope.is_abandoned());
    }

    #[test]
    fn test_extend_ids_covers_every_parent_path() {
        let mut parent_ids = HashSet::new();
        parent_ids.insert(FullId::root(FragmentId::named("A")));
        parent_ids.insert(FullId::root(FragmentId::named("C")));

        let ids = extend_ids(&parent_ids, FragmentId::named("B"));
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&FullId::root(FragmentId::named("A")).child(FragmentId::named("B"))));
        assert!(ids.contains(&FullId::root(FragmentId::named("C")).child(FragmentId::named("B"))));
    }
}
