//! InformationItem - leaf naming unit

use std::collections::HashSet;

use tryst_core::{FragmentId, FullId, NodeLabel, ScopeRef, Strategy};

/// One named unit of publishable content, always living under at least
/// one scope.
#[derive(Clone, Debug)]
pub struct InformationItem {
    /// Dissemination strategy, immutable after creation.
    pub strategy: Strategy,
    /// The item's own fragment; every full identifier ends with it.
    pub fragment: FragmentId,
    pub publishers: HashSet<NodeLabel>,
    pub subscribers: HashSet<NodeLabel>,
    /// Parent scopes; an item advertised under several scopes is one
    /// shared node.
    pub parents: HashSet<ScopeRef>,
    /// Every full identifier under which this item is known.
    pub ids: HashSet<FullId>,
}

impl InformationItem {
    pub fn new(
        strategy: Strategy,
        fragment: FragmentId,
        parent: ScopeRef,
        ids: HashSet<FullId>,
    ) -> Self {
        let mut parents = HashSet::new();
        parents.insert(parent);
        InformationItem {
            strategy,
            fragment,
            publishers: HashSet::new(),
            subscribers: HashSet::new(),
            parents,
            ids,
        }
    }

    /// True when no publisher and no subscriber remains - the
    /// precondition for removing the item (or one of its branches).
    pub fn is_abandoned(&self) -> bool {
        self.publishers.is_empty() && self.subscribers.is_empty()
    }

    /// Identifier set in a stable order, for match requests and tests.
    pub fn sorted_ids(&self) -> Vec<FullId> {
        let mut ids: Vec<FullId> = self.ids.iter().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_under(parent: ScopeRef) -> InformationItem {
        let fragment = FragmentId::named("B");
        let mut ids = HashSet::new();
        ids.insert(FullId::root(FragmentId::named("A")).child(fragment));
        InformationItem::new(Strategy::Domain, fragment, parent, ids)
    }

    #[test]
    fn test_new_item_has_one_parent() {
        let item = item_under(ScopeRef(1));
        assert_eq!(item.parents.len(), 1);
        assert!(item.parents.contains(&ScopeRef(1)));
        assert!(item.is_abandoned());
    }

    #[test]
    fn test_abandoned_needs_both_sets_empty() {
        let mut item = item_under(ScopeRef(1));
        item.publishers.insert(NodeLabel::named("P1"));
        assert!(!item.is_abandoned());

        item.publishers.clear();
        item.subscribers.insert(NodeLabel::named("S1"));
        assert!(!item.is_abandoned());
    }
}
