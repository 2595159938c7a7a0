//! Node Cache
//!
//! Identity map from node id to the canonical `Arc<GraphNode>`. At most one handle is
//! live per id: registering a second handle for a known id is a no-op and the cached
//! handle wins.
//!
//! The cache also owns the graph-wide add/remove listener registries. Add listeners
//! fire exactly once per newly registered id, after the node is visible through
//! `lookup`. Entries are never evicted except through `unregister`.
//!
//! # Locking
//!
//! Every access takes the map lock for the duration of one map operation only.
//! Listeners are cloned out and invoked with no lock held, so they may call back into
//! the cache.

use crate::models::GraphNode;
use crate::services::listeners::{self, ListenerToken};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Graph-wide listener, invoked with the affected node id
pub type NodeListener = Arc<dyn Fn(&str) + Send + Sync>;

pub struct NodeCache {
    nodes: RwLock<HashMap<String, Arc<GraphNode>>>,
    added_listeners: Mutex<Vec<(ListenerToken, NodeListener)>>,
    removed_listeners: Mutex<Vec<(ListenerToken, NodeListener)>>,
    isolate_panics: bool,
}

/// Outcome of `NodeCache::register`
pub struct Registration {
    /// Canonical handle for the id
    pub node: Arc<GraphNode>,
    /// True if this call inserted the id
    pub inserted: bool,
}

impl NodeCache {
    pub fn new(isolate_panics: bool) -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            added_listeners: Mutex::new(Vec::new()),
            removed_listeners: Mutex::new(Vec::new()),
            isolate_panics,
        }
    }

    /// Register `node` under its id
    ///
    /// Idempotent: a known id keeps its cached handle and fires nothing. A new id is
    /// inserted, then every add listener is invoked with it.
    pub fn register(&self, node: Arc<GraphNode>) -> Registration {
        let registration = {
            let mut nodes = self.nodes.write();
            match nodes.get(node.id()) {
                Some(existing) => Registration {
                    node: existing.clone(),
                    inserted: false,
                },
                None => {
                    nodes.insert(node.id().to_string(), node.clone());
                    Registration {
                        node,
                        inserted: true,
                    }
                }
            }
        };

        if registration.inserted {
            tracing::debug!("Registered node {}", registration.node.id());
            self.fire(&self.added_listeners, "node-added", registration.node.id());
        }
        registration
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<GraphNode>> {
        self.nodes.read().get(id).cloned()
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.nodes.read().contains_key(id)
    }

    /// Drop `id` from the map, returning the handle it held
    pub fn unregister(&self, id: &str) -> Option<Arc<GraphNode>> {
        let removed = self.nodes.write().remove(id);
        if removed.is_some() {
            tracing::debug!("Unregistered node {}", id);
        }
        removed
    }

    /// Invoke every remove listener with `id`
    pub fn notify_removed(&self, id: &str) {
        self.fire(&self.removed_listeners, "node-removed", id);
    }

    /// Snapshot of every cached handle
    pub fn nodes(&self) -> Vec<Arc<GraphNode>> {
        self.nodes.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    pub fn listen_on_node_added(&self, caller: ListenerToken, listener: NodeListener) {
        listeners::upsert(&mut self.added_listeners.lock(), caller, listener);
    }

    pub fn stop_listening_on_node_added(&self, caller: ListenerToken) -> bool {
        listeners::remove(&mut self.added_listeners.lock(), caller)
    }

    pub fn listen_on_node_removed(&self, caller: ListenerToken, listener: NodeListener) {
        listeners::upsert(&mut self.removed_listeners.lock(), caller, listener);
    }

    pub fn stop_listening_on_node_removed(&self, caller: ListenerToken) -> bool {
        listeners::remove(&mut self.removed_listeners.lock(), caller)
    }

    /// (add listeners, remove listeners)
    pub fn listener_counts(&self) -> (usize, usize) {
        (
            self.added_listeners.lock().len(),
            self.removed_listeners.lock().len(),
        )
    }

    fn fire(&self, registry: &Mutex<Vec<(ListenerToken, NodeListener)>>, what: &str, id: &str) {
        let targets: Vec<(ListenerToken, NodeListener)> = registry.lock().clone();
        for (token, listener) in targets {
            listeners::invoke(self.isolate_panics, what, token, || listener(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attributes, NodeKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn node(id: &str) -> Arc<GraphNode> {
        Arc::new(GraphNode::new(id, NodeKind::Node, Attributes::new(), None))
    }

    #[test]
    fn test_register_is_idempotent_and_fires_once() {
        let cache = NodeCache::new(false);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        cache.listen_on_node_added(
            ListenerToken::new(),
            Arc::new(move |_: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let first = node("a");
        assert!(cache.register(first.clone()).inserted);
        assert!(!cache.register(first.clone()).inserted);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cached_handle_wins_over_impostor() {
        let cache = NodeCache::new(false);
        let original = node("a");
        cache.register(original.clone());

        let registration = cache.register(node("a"));
        assert!(!registration.inserted);
        assert!(Arc::ptr_eq(&registration.node, &original));
        assert!(Arc::ptr_eq(&cache.lookup("a").unwrap(), &original));
    }

    #[test]
    fn test_node_is_visible_inside_add_listener() {
        let cache = Arc::new(NodeCache::new(false));
        let seen = Arc::new(AtomicUsize::new(0));
        let (inner, counter) = (cache.clone(), seen.clone());
        cache.listen_on_node_added(
            ListenerToken::new(),
            Arc::new(move |id: &str| {
                if inner.is_loaded(id) {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }),
        );

        cache.register(node("a"));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_same_caller_replaces_listener() {
        let cache = NodeCache::new(false);
        let caller = ListenerToken::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = hits.clone();
            cache.listen_on_node_removed(
                caller,
                Arc::new(move |_: &str| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        cache.notify_removed("a");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(cache.stop_listening_on_node_removed(caller));
        cache.notify_removed("a");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister() {
        let cache = NodeCache::new(false);
        cache.register(node("a"));
        assert!(cache.unregister("a").is_some());
        assert!(!cache.is_loaded("a"));
        assert!(cache.unregister("a").is_none());
    }
}
