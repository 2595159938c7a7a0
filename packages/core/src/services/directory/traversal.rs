//! Relation traversal: children, context-scoped children, parents.
//!
//! Every node a traversal yields is registered in the cache before it is projected.

use super::{DirectoryInner, GraphDirectory};
use crate::models::{GraphNode, NodeInfo, NodeKind};
use crate::services::error::{DirectoryError, NodeRole};
use std::sync::Arc;

impl DirectoryInner {
    /// Fetch and register the children of `node`
    ///
    /// An empty `relation_names` means every relation currently on the node. A node
    /// without relations yields nothing and costs no store call.
    pub(super) async fn fetch_children(
        &self,
        node: &GraphNode,
        relation_names: &[String],
    ) -> Result<Vec<Arc<GraphNode>>, DirectoryError> {
        let all_names;
        let names: &[String] = if relation_names.is_empty() {
            all_names = node.relation_names();
            &all_names
        } else {
            relation_names
        };
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let children = self.store.get_children(node.id(), names).await?;
        Ok(children.into_iter().map(|c| self.register(c)).collect())
    }

    /// Fetch and register the children of `node` whose edge carries `context_id`
    pub(super) async fn fetch_children_in_context(
        &self,
        node: &GraphNode,
        context_id: &str,
    ) -> Result<Vec<Arc<GraphNode>>, DirectoryError> {
        let children = self
            .store
            .get_children_in_context(node.id(), context_id)
            .await?;
        Ok(children.into_iter().map(|c| self.register(c)).collect())
    }

    pub(super) fn lookup_as(
        &self,
        id: &str,
        role: NodeRole,
    ) -> Result<Arc<GraphNode>, DirectoryError> {
        self.cache
            .lookup(id)
            .ok_or_else(|| DirectoryError::not_found(role, id))
    }

    pub(super) fn project(&self, nodes: &[Arc<GraphNode>]) -> Vec<Arc<NodeInfo>> {
        nodes.iter().map(|n| self.info_of(n)).collect()
    }
}

impl GraphDirectory {
    /// Children of `id` across `relation_names` (every relation on the node if empty)
    ///
    /// # Errors
    ///
    /// - `NotFound(Node)` if `id` is not cached
    pub async fn get_children(
        &self,
        id: &str,
        relation_names: &[String],
    ) -> Result<Vec<Arc<NodeInfo>>, DirectoryError> {
        let node = self.inner.lookup_as(id, NodeRole::Node)?;
        let children = self.inner.fetch_children(&node, relation_names).await?;
        tracing::debug!("Resolved {} children of {}", children.len(), id);
        Ok(self.inner.project(&children))
    }

    /// Children of `parent_id` whose edge is registered into `context_id`
    ///
    /// # Errors
    ///
    /// - `NotFound(Parent)` / `NotFound(Context)` for the id that is not cached
    pub async fn get_children_in_context(
        &self,
        parent_id: &str,
        context_id: &str,
    ) -> Result<Vec<Arc<NodeInfo>>, DirectoryError> {
        let parent = self.inner.lookup_as(parent_id, NodeRole::Parent)?;
        self.inner.lookup_as(context_id, NodeRole::Context)?;
        let children = self
            .inner
            .fetch_children_in_context(&parent, context_id)
            .await?;
        Ok(self.inner.project(&children))
    }

    /// Parents of `id` under `relation_names` (all relations if empty)
    ///
    /// Graph roots returned by the store are filtered out; every other parent is
    /// registered.
    pub async fn get_parents(
        &self,
        id: &str,
        relation_names: &[String],
    ) -> Result<Vec<Arc<NodeInfo>>, DirectoryError> {
        let node = self.inner.lookup_as(id, NodeRole::Node)?;
        let parents: Vec<Arc<GraphNode>> = self
            .inner
            .store
            .get_parents(node.id(), relation_names)
            .await?
            .into_iter()
            .filter(|p| p.kind() != NodeKind::Graph)
            .map(|p| self.inner.register(p))
            .collect();
        Ok(self.inner.project(&parents))
    }

    /// Ids of every outgoing edge of `id`, without a store round trip
    pub fn get_children_ids(&self, id: &str) -> Vec<String> {
        self.inner
            .cache
            .lookup(id)
            .map(|n| n.children_ids())
            .unwrap_or_default()
    }

    /// Relation names on `id`; empty if `id` is not cached
    pub fn get_relation_names(&self, id: &str) -> Vec<String> {
        self.inner
            .cache
            .lookup(id)
            .map(|n| n.relation_names())
            .unwrap_or_default()
    }

    /// Whether `node_id` has an outgoing edge registered into `context_id`
    ///
    /// Trivially true when both ids are equal; false if `node_id` is not cached.
    pub fn has_child_in_context(&self, node_id: &str, context_id: &str) -> bool {
        if node_id == context_id {
            return true;
        }
        self.inner
            .cache
            .lookup(node_id)
            .is_some_and(|n| n.has_child_in_context(context_id))
    }

    /// Whether `child_id` is a child of `parent_id` under `relation_names`
    ///
    /// False if `parent_id` is not cached. Resolves (and registers) the children.
    pub async fn is_child(
        &self,
        parent_id: &str,
        child_id: &str,
        relation_names: &[String],
    ) -> Result<bool, DirectoryError> {
        let Some(parent) = self.inner.cache.lookup(parent_id) else {
            return Ok(false);
        };
        let children = self.inner.fetch_children(&parent, relation_names).await?;
        Ok(children.iter().any(|c| c.id() == child_id))
    }

    /// Context hanging from the current graph whose name is `name`
    ///
    /// `Ok(None)` when no graph is set or no context matches.
    pub async fn get_context(&self, name: &str) -> Result<Option<Arc<NodeInfo>>, DirectoryError> {
        let contexts = self.graph_contexts().await?;
        Ok(contexts
            .iter()
            .find(|c| c.name().as_deref() == Some(name))
            .map(|c| self.inner.info_of(c)))
    }

    /// Contexts hanging from the current graph whose type is `context_type`
    pub async fn get_context_with_type(
        &self,
        context_type: &str,
    ) -> Result<Vec<Arc<NodeInfo>>, DirectoryError> {
        let contexts: Vec<Arc<GraphNode>> = self
            .graph_contexts()
            .await?
            .into_iter()
            .filter(|c| c.node_type() == context_type)
            .collect();
        Ok(self.inner.project(&contexts))
    }

    /// Cached nodes whose type is `node_type`, ordered by id
    pub fn get_node_by_type(&self, node_type: &str) -> Vec<Arc<NodeInfo>> {
        let mut nodes: Vec<Arc<GraphNode>> = self
            .inner
            .cache
            .nodes()
            .into_iter()
            .filter(|n| n.node_type() == node_type)
            .collect();
        nodes.sort_by(|a, b| a.id().cmp(b.id()));
        self.inner.project(&nodes)
    }

    async fn graph_contexts(&self) -> Result<Vec<Arc<GraphNode>>, DirectoryError> {
        let Some(graph) = self.get_graph() else {
            return Ok(Vec::new());
        };
        let relation = [self.inner.config.context_relation_name.clone()];
        let children = self.inner.fetch_children(&graph, &relation).await?;
        Ok(children
            .into_iter()
            .filter(|c| c.kind() == NodeKind::Context)
            .collect())
    }
}
