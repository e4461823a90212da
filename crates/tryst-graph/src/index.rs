//! GraphIndex - node arena plus dual identifier index
//!
//! Nodes live in an arena addressed by stable handles; deletion is driven
//! by explicit edge bookkeeping, not by any single owner's lifetime. The
//! two identifier indexes map full identifiers onto handles; several
//! identifiers may alias one node. An identifier must never resolve to
//! both a scope and an item - a detected violation is an internal defect
//! reported as an error, never repaired silently.

use std::collections::HashMap;

use tracing::trace;
use tryst_core::{FullId, ItemRef, RvError, RvResult, ScopeRef};

use crate::{InformationItem, Scope};

/// Which kind of node an identifier resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameKind {
    Scope,
    Item,
}

/// The naming graph of one rendezvous domain.
#[derive(Clone, Debug, Default)]
pub struct GraphIndex {
    scopes: HashMap<ScopeRef, Scope>,
    items: HashMap<ItemRef, InformationItem>,
    scope_ids: HashMap<FullId, ScopeRef>,
    item_ids: HashMap<FullId, ItemRef>,
    next_node: u64,
}

impl GraphIndex {
    pub fn new() -> Self {
        GraphIndex::default()
    }

    /// Insert a scope and bind every identifier it carries.
    pub fn insert_scope(&mut self, scope: Scope) -> RvResult<ScopeRef> {
        let ids: Vec<FullId> = scope.ids.iter().cloned().collect();
        for id in &ids {
            self.check_scope_bindable(id)?;
        }

        let sref = ScopeRef(self.next_node);
        self.next_node += 1;
        for id in ids {
            self.scope_ids.insert(id, sref);
        }
        trace!(?sref, ids = scope.ids.len(), "scope inserted");
        self.scopes.insert(sref, scope);
        Ok(sref)
    }

    /// Insert an item and bind every identifier it carries.
    pub fn insert_item(&mut self, item: InformationItem) -> RvResult<ItemRef> {
        let ids: Vec<FullId> = item.ids.iter().cloned().collect();
        for id in &ids {
            self.check_item_bindable(id)?;
        }

        let iref = ItemRef(self.next_node);
        self.next_node += 1;
        for id in ids {
            self.item_ids.insert(id, iref);
        }
        trace!(?iref, ids = item.ids.len(), "item inserted");
        self.items.insert(iref, item);
        Ok(iref)
    }

    /// Bind an additional identifier to an existing scope.
    pub fn bind_scope_id(&mut self, id: FullId, sref: ScopeRef) -> RvResult<()> {
        self.check_scope_bindable(&id)?;
        self.scope_ids.insert(id, sref);
        Ok(())
    }

    /// Bind an additional identifier to an existing item.
    pub fn bind_item_id(&mut self, id: FullId, iref: ItemRef) -> RvResult<()> {
        self.check_item_bindable(&id)?;
        self.item_ids.insert(id, iref);
        Ok(())
    }

    pub fn unbind_scope_id(&mut self, id: &FullId) {
        self.scope_ids.remove(id);
    }

    pub fn unbind_item_id(&mut self, id: &FullId) {
        self.item_ids.remove(id);
    }

    pub fn scope_ref(&self, id: &FullId) -> Option<ScopeRef> {
        self.scope_ids.get(id).copied()
    }

    pub fn item_ref(&self, id: &FullId) -> Option<ItemRef> {
        self.item_ids.get(id).copied()
    }

    /// Resolve an identifier to the kind of node it names, if any.
    pub fn kind_of(&self, id: &FullId) -> Option<NameKind> {
        if self.scope_ids.contains_key(id) {
            Some(NameKind::Scope)
        } else if self.item_ids.contains_key(id) {
            Some(NameKind::Item)
        } else {
            None
        }
    }

    pub fn contains_scope(&self, sref: ScopeRef) -> bool {
        self.scopes.contains_key(&sref)
    }

    pub fn contains_item(&self, iref: ItemRef) -> bool {
        self.items.contains_key(&iref)
    }

    pub fn scope(&self, sref: ScopeRef) -> RvResult<&Scope> {
        self.scopes.get(&sref).ok_or(RvError::DanglingScope(sref))
    }

    pub fn scope_mut(&mut self, sref: ScopeRef) -> RvResult<&mut Scope> {
        self.scopes
            .get_mut(&sref)
            .ok_or(RvError::DanglingScope(sref))
    }

    pub fn item(&self, iref: ItemRef) -> RvResult<&InformationItem> {
        self.items.get(&iref).ok_or(RvError::DanglingItem(iref))
    }

    pub fn item_mut(&mut self, iref: ItemRef) -> RvResult<&mut InformationItem> {
        self.items.get_mut(&iref).ok_or(RvError::DanglingItem(iref))
    }

    /// Remove a scope from the arena, unbinding all its identifiers.
    /// Edge bookkeeping on neighbors is the caller's responsibility.
    pub fn remove_scope(&mut self, sref: ScopeRef) -> RvResult<Scope> {
        let scope = self
            .scopes
            .remove(&sref)
            .ok_or(RvError::DanglingScope(sref))?;
        for id in &scope.ids {
            self.scope_ids.remove(id);
        }
        trace!(?sref, "scope removed");
        Ok(scope)
    }

    /// Remove an item from the arena, unbinding all its identifiers.
    pub fn remove_item(&mut self, iref: ItemRef) -> RvResult<InformationItem> {
        let item = self.items.remove(&iref).ok_or(RvError::DanglingItem(iref))?;
        for id in &item.ids {
            self.item_ids.remove(id);
        }
        trace!(?iref, "item removed");
        Ok(item)
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty() && self.items.is_empty()
    }

    fn check_scope_bindable(&self, id: &FullId) -> RvResult<()> {
        if self.item_ids.contains_key(id) {
            return Err(RvError::KindCollision { id: id.clone() });
        }
        Ok(())
    }

    fn check_item_bindable(&self, id: &FullId) -> RvResult<()> {
        if self.scope_ids.contains_key(id) {
            return Err(RvError::KindCollision { id: id.clone() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tryst_core::{FragmentId, Strategy};

    fn root_id(name: &str) -> FullId {
        FullId::root(FragmentId::named(name))
    }

    #[test]
    fn test_insert_and_resolve_scope() {
        let mut graph = GraphIndex::new();
        let sref = graph
            .insert_scope(Scope::root(Strategy::Domain, FragmentId::named("A")))
            .unwrap();

        assert_eq!(graph.scope_ref(&root_id("A")), Some(sref));
        assert_eq!(graph.kind_of(&root_id("A")), Some(NameKind::Scope));
        assert_eq!(graph.scope_count(), 1);
    }

    #[test]
    fn test_aliased_ids_resolve_to_one_node() {
        let mut graph = GraphIndex::new();
        let sref = graph
            .insert_scope(Scope::root(Strategy::Domain, FragmentId::named("B")))
            .unwrap();

        let alias = root_id("C").child(FragmentId::named("B"));
        graph.bind_scope_id(alias.clone(), sref).unwrap();

        assert_eq!(graph.scope_ref(&root_id("B")), Some(sref));
        assert_eq!(graph.scope_ref(&alias), Some(sref));
    }

    #[test]
    fn test_kind_collision_is_an_error() {
        let mut graph = GraphIndex::new();
        let sref = graph
            .insert_scope(Scope::root(Strategy::Domain, FragmentId::named("A")))
            .unwrap();

        let id = root_id("A").child(FragmentId::named("B"));
        graph.bind_scope_id(id.clone(), sref).unwrap();

        let mut ids = HashSet::new();
        ids.insert(id);
        let item = InformationItem::new(Strategy::Domain, FragmentId::named("B"), sref, ids);
        assert!(matches!(
            graph.insert_item(item),
            Err(RvError::KindCollision { .. })
        ));
        assert_eq!(graph.item_count(), 0);
    }

    #[test]
    fn test_remove_scope_unbinds_every_alias() {
        let mut graph = GraphIndex::new();
        let sref = graph
            .insert_scope(Scope::root(Strategy::Domain, FragmentId::named("B")))
            .unwrap();
        let alias = root_id("C").child(FragmentId::named("B"));
        graph.bind_scope_id(alias.clone(), sref).unwrap();
        graph.scope_mut(sref).unwrap().ids.insert(alias.clone());

        graph.remove_scope(sref).unwrap();
        assert_eq!(graph.scope_ref(&root_id("B")), None);
        assert_eq!(graph.scope_ref(&alias), None);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_stale_handle_fails_loudly() {
        let mut graph = GraphIndex::new();
        let sref = graph
            .insert_scope(Scope::root(Strategy::Domain, FragmentId::named("A")))
            .unwrap();
        graph.remove_scope(sref).unwrap();

        assert!(matches!(graph.scope(sref), Err(RvError::DanglingScope(_))));
    }
}
