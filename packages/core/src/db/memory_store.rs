//! In-Memory Graph Store
//!
//! Arena-style reference implementation of `GraphStore`. Nodes live in an id-indexed
//! map; edges are the id-based records kept on each `GraphNode`. Used by tests, the
//! benches and the dev tools, and as the model for real backends.
//!
//! Nothing here is durable. Subscription creation and teardown are counted so tests
//! can assert that the directory multiplexes listeners correctly.

use crate::db::error::StoreError;
use crate::db::graph_store::{GraphStore, StoreResult};
use crate::models::{
    AttrValue, Attributes, ChangeHandler, ElementRef, GraphNode, NodeKind, SubscriptionId,
    NAME_KEY, TYPE_KEY,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Type given to created nodes without an explicit `type` attribute
pub const DEFAULT_NODE_TYPE: &str = "node";

/// Type given to graph roots
pub const GRAPH_TYPE: &str = "graph";

/// Type given to contexts without an explicit `type` attribute
pub const DEFAULT_CONTEXT_TYPE: &str = "context";

/// Relation type used to hang contexts under the graph root
pub const CONTEXT_RELATION_TYPE: &str = "Ref";

/// Counters exposed for tests and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreCounters {
    pub subscriptions_created: usize,
    pub subscriptions_destroyed: usize,
    pub children_fetches: usize,
}

/// Arena-backed, non-durable `GraphStore`
pub struct InMemoryGraphStore {
    nodes: RwLock<HashMap<String, Arc<GraphNode>>>,
    graph_id: RwLock<Option<String>>,
    default_type: String,
    subscriptions_created: AtomicUsize,
    subscriptions_destroyed: AtomicUsize,
    children_fetches: AtomicUsize,
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::with_default_type(DEFAULT_NODE_TYPE)
    }

    /// Create a store whose created nodes default to `default_type`
    pub fn with_default_type(default_type: impl Into<String>) -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            graph_id: RwLock::new(None),
            default_type: default_type.into(),
            subscriptions_created: AtomicUsize::new(0),
            subscriptions_destroyed: AtomicUsize::new(0),
            children_fetches: AtomicUsize::new(0),
        }
    }

    /// Create the graph root. A second call replaces the store's current graph.
    pub async fn create_graph(&self, name: &str) -> StoreResult<Arc<GraphNode>> {
        self.create_graph_with_id(&Uuid::new_v4().to_string(), name)
    }

    pub(crate) fn create_graph_with_id(&self, id: &str, name: &str) -> StoreResult<Arc<GraphNode>> {
        let mut attrs = Attributes::new();
        attrs.insert(NAME_KEY.to_string(), AttrValue::from(name));
        attrs.insert(TYPE_KEY.to_string(), AttrValue::from(GRAPH_TYPE));
        let graph = self.insert(GraphNode::new(id, NodeKind::Graph, attrs, None))?;
        *self.graph_id.write() = Some(id.to_string());
        tracing::info!("Created graph '{}' ({})", name, id);
        Ok(graph)
    }

    /// Insert a node with a caller-chosen id
    pub(crate) fn insert(&self, node: GraphNode) -> StoreResult<Arc<GraphNode>> {
        let mut nodes = self.nodes.write();
        if nodes.contains_key(node.id()) {
            return Err(StoreError::backend(format!(
                "Node id already in use: {}",
                node.id()
            )));
        }
        let node = Arc::new(node);
        nodes.insert(node.id().to_string(), node.clone());
        Ok(node)
    }

    /// Current graph root, if any
    pub fn graph(&self) -> Option<Arc<GraphNode>> {
        let id = self.graph_id.read().clone()?;
        self.get(&id)
    }

    /// Direct arena lookup, bypassing any cache
    pub fn get(&self, id: &str) -> Option<Arc<GraphNode>> {
        self.nodes.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    pub fn counters(&self) -> StoreCounters {
        StoreCounters {
            subscriptions_created: self.subscriptions_created.load(Ordering::SeqCst),
            subscriptions_destroyed: self.subscriptions_destroyed.load(Ordering::SeqCst),
            children_fetches: self.children_fetches.load(Ordering::SeqCst),
        }
    }

    fn require(&self, id: &str) -> StoreResult<Arc<GraphNode>> {
        self.get(id).ok_or_else(|| StoreError::node_not_found(id))
    }

    /// Resolve ids to handles, skipping dangling edges
    fn resolve_all(&self, ids: Vec<String>) -> Vec<Arc<GraphNode>> {
        let nodes = self.nodes.read();
        ids.into_iter()
            .filter_map(|id| {
                let found = nodes.get(&id).cloned();
                if found.is_none() {
                    tracing::warn!("Dangling edge to unknown node {}", id);
                }
                found
            })
            .collect()
    }

    fn link(
        &self,
        parent_id: &str,
        child_id: &str,
        context_id: Option<&str>,
        relation_name: &str,
        relation_type: &str,
    ) -> StoreResult<()> {
        let parent = self.require(parent_id)?;
        let child = self.require(child_id)?;
        // Record the back-link first so observers of the parent see a consistent child
        child.add_parent(relation_name, parent_id);
        if let Err(err) = parent.link_child(relation_name, relation_type, child_id, context_id) {
            child.remove_parent(relation_name, parent_id);
            return Err(err.into());
        }
        if let Some(ctx) = context_id {
            child.join_context(ctx);
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    fn default_node_type(&self) -> &str {
        &self.default_type
    }

    async fn create_node(
        &self,
        attributes: Attributes,
        element: Option<ElementRef>,
    ) -> StoreResult<Arc<GraphNode>> {
        let id = Uuid::new_v4().to_string();
        self.insert(GraphNode::new(id, NodeKind::Node, attributes, element))
    }

    async fn create_context(
        &self,
        graph_id: &str,
        relation_name: &str,
        mut attributes: Attributes,
        element: Option<ElementRef>,
    ) -> StoreResult<Arc<GraphNode>> {
        self.require(graph_id)?;
        attributes
            .entry(TYPE_KEY.to_string())
            .or_insert_with(|| AttrValue::from(DEFAULT_CONTEXT_TYPE));
        let id = Uuid::new_v4().to_string();
        let context = self.insert(GraphNode::new(id, NodeKind::Context, attributes, element))?;
        self.link(
            graph_id,
            context.id(),
            None,
            relation_name,
            CONTEXT_RELATION_TYPE,
        )?;
        Ok(context)
    }

    async fn get_children(
        &self,
        parent_id: &str,
        relation_names: &[String],
    ) -> StoreResult<Vec<Arc<GraphNode>>> {
        self.children_fetches.fetch_add(1, Ordering::SeqCst);
        let parent = self.require(parent_id)?;
        Ok(self.resolve_all(parent.children_ids_in(relation_names)))
    }

    async fn get_children_in_context(
        &self,
        parent_id: &str,
        context_id: &str,
    ) -> StoreResult<Vec<Arc<GraphNode>>> {
        self.children_fetches.fetch_add(1, Ordering::SeqCst);
        let parent = self.require(parent_id)?;
        Ok(self.resolve_all(parent.children_ids_in_context(context_id)))
    }

    async fn get_parents(
        &self,
        child_id: &str,
        relation_names: &[String],
    ) -> StoreResult<Vec<Arc<GraphNode>>> {
        let child = self.require(child_id)?;
        Ok(self.resolve_all(child.parent_ids(relation_names)))
    }

    async fn add_child(
        &self,
        parent_id: &str,
        child_id: &str,
        relation_name: &str,
        relation_type: &str,
    ) -> StoreResult<()> {
        self.link(parent_id, child_id, None, relation_name, relation_type)
    }

    async fn add_child_in_context(
        &self,
        parent_id: &str,
        child_id: &str,
        context_id: &str,
        relation_name: &str,
        relation_type: &str,
    ) -> StoreResult<()> {
        self.require(context_id)?;
        self.link(
            parent_id,
            child_id,
            Some(context_id),
            relation_name,
            relation_type,
        )
    }

    async fn remove_child(
        &self,
        parent_id: &str,
        child_id: &str,
        relation_name: &str,
        relation_type: &str,
    ) -> StoreResult<()> {
        let parent = self.require(parent_id)?;
        if let Some(relation) = parent.relation(relation_name) {
            if relation.relation_type != relation_type {
                return Err(StoreError::RelationTypeMismatch {
                    relation: relation_name.to_string(),
                    expected: relation.relation_type,
                    actual: relation_type.to_string(),
                });
            }
        }
        if !parent.unlink_child(relation_name, child_id) {
            return Err(StoreError::edge_not_found(parent_id, child_id, relation_name));
        }
        if let Some(child) = self.get(child_id) {
            child.remove_parent(relation_name, parent_id);
        }
        Ok(())
    }

    async fn remove_from_graph(&self, node_id: &str) -> StoreResult<()> {
        let node = self.require(node_id)?;
        for (relation_name, parent_id) in node.parent_links() {
            if let Some(parent) = self.get(&parent_id) {
                parent.unlink_child(&relation_name, node_id);
            }
            node.remove_parent(&relation_name, &parent_id);
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        node_id: &str,
        handler: ChangeHandler,
    ) -> StoreResult<SubscriptionId> {
        let node = self.require(node_id)?;
        let subscription = node.observe(handler);
        self.subscriptions_created.fetch_add(1, Ordering::SeqCst);
        Ok(subscription)
    }

    async fn unsubscribe(&self, node_id: &str, subscription: SubscriptionId) -> StoreResult<()> {
        let node = self.require(node_id)?;
        if node.unobserve(subscription) {
            self.subscriptions_destroyed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_and_remove_child_keep_back_links() {
        let store = InMemoryGraphStore::new();
        let parent = store.create_node(Attributes::new(), None).await.unwrap();
        let child = store.create_node(Attributes::new(), None).await.unwrap();

        store
            .add_child(parent.id(), child.id(), "hasPart", "Ref")
            .await
            .unwrap();
        let parents = store.get_parents(child.id(), &[]).await.unwrap();
        assert_eq!(parents.len(), 1);
        assert!(Arc::ptr_eq(&parents[0], &parent));

        store
            .remove_child(parent.id(), child.id(), "hasPart", "Ref")
            .await
            .unwrap();
        assert!(store.get_parents(child.id(), &[]).await.unwrap().is_empty());

        let err = store
            .remove_child(parent.id(), child.id(), "hasPart", "Ref")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::EdgeNotFound { .. }));
    }

    #[tokio::test]
    async fn test_empty_relation_list_fetches_nothing() {
        let store = InMemoryGraphStore::new();
        let parent = store.create_node(Attributes::new(), None).await.unwrap();
        let child = store.create_node(Attributes::new(), None).await.unwrap();
        store
            .add_child(parent.id(), child.id(), "hasPart", "Ref")
            .await
            .unwrap();

        assert!(store.get_children(parent.id(), &[]).await.unwrap().is_empty());
        let named = store
            .get_children(parent.id(), &["hasPart".to_string()])
            .await
            .unwrap();
        assert_eq!(named.len(), 1);
    }

    #[tokio::test]
    async fn test_create_context_hangs_under_graph() {
        let store = InMemoryGraphStore::new();
        let graph = store.create_graph("Site").await.unwrap();
        let context = store
            .create_context(graph.id(), "hasContext", Attributes::new(), None)
            .await
            .unwrap();

        assert_eq!(context.kind(), NodeKind::Context);
        assert_eq!(context.node_type(), DEFAULT_CONTEXT_TYPE);
        assert_eq!(graph.children_ids(), vec![context.id().to_string()]);
    }

    #[tokio::test]
    async fn test_remove_from_graph_detaches_every_parent() {
        let store = InMemoryGraphStore::new();
        let a = store.create_node(Attributes::new(), None).await.unwrap();
        let b = store.create_node(Attributes::new(), None).await.unwrap();
        let c = store.create_node(Attributes::new(), None).await.unwrap();
        store.add_child(a.id(), c.id(), "r1", "Ref").await.unwrap();
        store.add_child(b.id(), c.id(), "r2", "Ref").await.unwrap();

        store.remove_from_graph(c.id()).await.unwrap();
        assert!(!a.has_children());
        assert!(!b.has_children());
        assert!(c.parent_links().is_empty());
    }

    #[tokio::test]
    async fn test_subscription_counters() {
        let store = InMemoryGraphStore::new();
        let node = store.create_node(Attributes::new(), None).await.unwrap();
        let sub = store
            .subscribe(node.id(), Arc::new(|_: &str| {}))
            .await
            .unwrap();
        store.unsubscribe(node.id(), sub).await.unwrap();
        store.unsubscribe(node.id(), sub).await.unwrap();

        let counters = store.counters();
        assert_eq!(counters.subscriptions_created, 1);
        assert_eq!(counters.subscriptions_destroyed, 1);
    }
}
