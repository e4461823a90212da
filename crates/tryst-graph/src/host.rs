//! Host registry - one record per overlay node seen by this domain

use std::collections::{HashMap, HashSet};

use tryst_core::{FullId, NodeLabel};

/// One overlay node (possibly the local node itself) and everything it
/// currently publishes or subscribes to, keyed by full identifier.
#[derive(Clone, Debug)]
pub struct RemoteHost {
    pub label: NodeLabel,
    pub published_scopes: HashSet<FullId>,
    pub published_items: HashSet<FullId>,
    pub subscribed_scopes: HashSet<FullId>,
    pub subscribed_items: HashSet<FullId>,
}

impl RemoteHost {
    pub fn new(label: NodeLabel) -> Self {
        RemoteHost {
            label,
            published_scopes: HashSet::new(),
            published_items: HashSet::new(),
            subscribed_scopes: HashSet::new(),
            subscribed_items: HashSet::new(),
        }
    }

    /// True when the host references nothing in the graph any more.
    pub fn is_idle(&self) -> bool {
        self.published_scopes.is_empty()
            && self.published_items.is_empty()
            && self.subscribed_scopes.is_empty()
            && self.subscribed_items.is_empty()
    }
}

/// Label-keyed host records, created lazily on first reference.
#[derive(Clone, Debug, Default)]
pub struct HostRegistry {
    hosts: HashMap<NodeLabel, RemoteHost>,
}

impl HostRegistry {
    pub fn new() -> Self {
        HostRegistry::default()
    }

    /// The only creating operation of the registry.
    pub fn get_or_create(&mut self, label: NodeLabel) -> &mut RemoteHost {
        self.hosts
            .entry(label)
            .or_insert_with(|| RemoteHost::new(label))
    }

    pub fn get(&self, label: NodeLabel) -> Option<&RemoteHost> {
        self.hosts.get(&label)
    }

    pub fn get_mut(&mut self, label: NodeLabel) -> Option<&mut RemoteHost> {
        self.hosts.get_mut(&label)
    }

    /// Drop the record when it no longer references any graph node.
    pub fn prune_idle(&mut self, label: NodeLabel) {
        if self.hosts.get(&label).is_some_and(|h| h.is_idle()) {
            self.hosts.remove(&label);
        }
    }

    pub fn contains(&self, label: NodeLabel) -> bool {
        self.hosts.contains_key(&label)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tryst_core::FragmentId;

    #[test]
    fn test_get_or_create_is_lazy() {
        let mut registry = HostRegistry::new();
        assert!(registry.is_empty());

        let label = NodeLabel::named("P1");
        registry.get_or_create(label);
        assert_eq!(registry.len(), 1);

        registry.get_or_create(label);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_prune_removes_only_idle_records() {
        let mut registry = HostRegistry::new();
        let label = NodeLabel::named("P1");

        registry
            .get_or_create(label)
            .published_scopes
            .insert(FullId::root(FragmentId::named("A")));
        registry.prune_idle(label);
        assert!(registry.contains(label));

        registry.get_mut(label).unwrap().published_scopes.clear();
        registry.prune_idle(label);
        assert!(!registry.contains(label));
    }
}
