//! Predicate Search and Type Classification
//!
//! Searches walk the graph generation by generation from a start node. The children
//! of a whole generation are fetched concurrently; predicates are then evaluated one
//! node at a time, so visitation order is deterministic for a given store.
//!
//! # Registration Asymmetry
//!
//! - Relation searches (`find_nodes` and friends) register **every visited node**,
//!   matching or not, like any other traversal.
//! - Context searches (`find_in_context` and friends) register **only matching nodes**;
//!   nodes reached through context edges but rejected stay out of the cache.
//!
//! # Unresolved Start Nodes
//!
//! Relation searches fall back to the current graph root when the start id is not
//! cached, and return an empty result when there is no graph either. Context searches
//! have no fallback: `find_in_context` returns `Ok(None)`, the typed variants fail
//! with `NotFound`.

use super::{DirectoryInner, GraphDirectory};
use crate::models::{ClassifiedNodes, GraphNode, NodeInfo};
use crate::services::error::{DirectoryError, NodeRole};
use async_trait::async_trait;
use futures::future::try_join_all;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Search predicate; may suspend
#[async_trait]
pub trait NodePredicate: Send + Sync {
    async fn matches(&self, node: &Arc<GraphNode>) -> bool;
}

/// Adapter turning a synchronous closure into a `NodePredicate`
pub struct FnPredicate<F>(F);

#[async_trait]
impl<F> NodePredicate for FnPredicate<F>
where
    F: Fn(&GraphNode) -> bool + Send + Sync,
{
    async fn matches(&self, node: &Arc<GraphNode>) -> bool {
        (self.0)(&**node)
    }
}

/// Wrap a synchronous closure as a predicate
///
/// ```rust
/// use graph_directory::services::predicate;
///
/// let named = predicate(|node| node.name().is_some());
/// # let _ = named;
/// ```
pub fn predicate<F>(f: F) -> FnPredicate<F>
where
    F: Fn(&GraphNode) -> bool + Send + Sync,
{
    FnPredicate(f)
}

/// Matches nodes whose `type` attribute equals the given type
pub struct TypePredicate {
    node_type: String,
}

impl TypePredicate {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
        }
    }
}

#[async_trait]
impl NodePredicate for TypePredicate {
    async fn matches(&self, node: &Arc<GraphNode>) -> bool {
        node.node_type() == self.node_type
    }
}

/// Never matches; records every visited node's type and attributes
struct Classifier {
    classified: Mutex<ClassifiedNodes>,
}

impl Classifier {
    fn new() -> Self {
        Self {
            classified: Mutex::new(ClassifiedNodes::new()),
        }
    }

    fn into_result(self) -> ClassifiedNodes {
        self.classified.into_inner()
    }
}

#[async_trait]
impl NodePredicate for Classifier {
    async fn matches(&self, node: &Arc<GraphNode>) -> bool {
        self.classified
            .lock()
            .record(&node.node_type(), node.attributes());
        false
    }
}

impl DirectoryInner {
    /// Relation search from `start`; every visited node is registered
    async fn search(
        &self,
        start: Arc<GraphNode>,
        relation_names: &[String],
        predicate: &dyn NodePredicate,
        stop_after: Option<usize>,
    ) -> Result<Vec<Arc<GraphNode>>, DirectoryError> {
        let max_depth = self.config.max_search_depth;
        let mut seen: HashSet<String> = HashSet::from([start.id().to_string()]);
        let mut generation = vec![self.register(start)];
        let mut found = Vec::new();
        let mut depth = 0usize;

        while !generation.is_empty() {
            for node in &generation {
                if predicate.matches(node).await {
                    found.push(node.clone());
                    if stop_after.is_some_and(|limit| found.len() >= limit) {
                        return Ok(found);
                    }
                }
            }
            if max_depth.is_some_and(|max| depth >= max) {
                break;
            }

            let fetched = try_join_all(
                generation
                    .iter()
                    .map(|node| self.fetch_children(node, relation_names)),
            )
            .await?;
            generation = fetched
                .into_iter()
                .flatten()
                .filter(|child| seen.insert(child.id().to_string()))
                .collect();
            depth += 1;
        }

        Ok(found)
    }

    /// Context search from `start`; only matching nodes are registered
    async fn search_in_context(
        &self,
        start: Arc<GraphNode>,
        context_id: &str,
        predicate: &dyn NodePredicate,
    ) -> Result<Vec<Arc<GraphNode>>, DirectoryError> {
        let max_depth = self.config.max_search_depth;
        let mut seen: HashSet<String> = HashSet::from([start.id().to_string()]);
        let mut generation = vec![start];
        let mut found = Vec::new();
        let mut depth = 0usize;

        while !generation.is_empty() {
            for node in &generation {
                if predicate.matches(node).await {
                    found.push(self.register(node.clone()));
                }
            }
            if max_depth.is_some_and(|max| depth >= max) {
                break;
            }

            let fetched = try_join_all(
                generation
                    .iter()
                    .map(|node| self.store.get_children_in_context(node.id(), context_id)),
            )
            .await?;
            generation = fetched
                .into_iter()
                .flatten()
                .filter(|child| seen.insert(child.id().to_string()))
                .collect();
            depth += 1;
        }

        Ok(found)
    }
}

impl GraphDirectory {
    /// Start node for relation searches: `start_id` if cached, else the graph root
    fn search_root(&self, start_id: &str) -> Option<Arc<GraphNode>> {
        self.inner
            .cache
            .lookup(start_id)
            .or_else(|| self.get_graph())
    }

    /// Every node reachable from `start_id` through `relation_names` (all relations if
    /// empty) that satisfies `predicate`, the start node included
    ///
    /// Falls back to the graph root when `start_id` is not cached; empty when there is
    /// no graph either.
    pub async fn find_nodes(
        &self,
        start_id: &str,
        relation_names: &[String],
        predicate: &dyn NodePredicate,
    ) -> Result<Vec<Arc<GraphNode>>, DirectoryError> {
        let Some(start) = self.search_root(start_id) else {
            tracing::debug!("find_nodes: {} not cached and no graph set", start_id);
            return Ok(Vec::new());
        };
        let found = self
            .inner
            .search(start, relation_names, predicate, None)
            .await?;
        tracing::debug!("find_nodes from {} matched {} nodes", start_id, found.len());
        Ok(found)
    }

    /// First node `find_nodes` would return; stops searching at the first match
    pub async fn find_node(
        &self,
        start_id: &str,
        relation_names: &[String],
        predicate: &dyn NodePredicate,
    ) -> Result<Option<Arc<GraphNode>>, DirectoryError> {
        let Some(start) = self.search_root(start_id) else {
            return Ok(None);
        };
        let found = self
            .inner
            .search(start, relation_names, predicate, Some(1))
            .await?;
        Ok(found.into_iter().next())
    }

    /// `find_nodes` with a type-equality predicate
    pub async fn find_nodes_by_type(
        &self,
        start_id: &str,
        relation_names: &[String],
        node_type: &str,
    ) -> Result<Vec<Arc<GraphNode>>, DirectoryError> {
        self.find_nodes(start_id, relation_names, &TypePredicate::new(node_type))
            .await
    }

    /// Context-scoped search from `start_id` through edges registered into `context_id`
    ///
    /// `Ok(None)` if either id is not cached. Matching nodes are registered and returned
    /// as projections.
    pub async fn find_in_context(
        &self,
        start_id: &str,
        context_id: &str,
        predicate: &dyn NodePredicate,
    ) -> Result<Option<Vec<Arc<NodeInfo>>>, DirectoryError> {
        let (Some(start), Some(_)) = (
            self.inner.cache.lookup(start_id),
            self.inner.cache.lookup(context_id),
        ) else {
            return Ok(None);
        };
        let found = self
            .inner
            .search_in_context(start, context_id, predicate)
            .await?;
        Ok(Some(self.inner.project(&found)))
    }

    /// Context-scoped search for nodes of `node_type`
    ///
    /// # Errors
    ///
    /// - `NotFound(Start)` / `NotFound(Context)` for the id that is not cached
    pub async fn find_in_context_by_type(
        &self,
        start_id: &str,
        context_id: &str,
        node_type: &str,
    ) -> Result<Vec<Arc<NodeInfo>>, DirectoryError> {
        let start = self.inner.lookup_as(start_id, NodeRole::Start)?;
        self.inner.lookup_as(context_id, NodeRole::Context)?;
        let found = self
            .inner
            .search_in_context(start, context_id, &TypePredicate::new(node_type))
            .await?;
        Ok(self.inner.project(&found))
    }

    /// Classify every node reachable from `start_id` by type
    ///
    /// Types come out in first-seen order; each type lists the raw attribute snapshots
    /// of its nodes in visitation order. The start node is classified too.
    pub async fn browse_and_classify_by_type(
        &self,
        start_id: &str,
        relation_names: &[String],
    ) -> Result<ClassifiedNodes, DirectoryError> {
        let classifier = Classifier::new();
        self.find_nodes(start_id, relation_names, &classifier)
            .await?;
        Ok(classifier.into_result())
    }

    /// `browse_and_classify_by_type` restricted to edges registered into `context_id`
    ///
    /// # Errors
    ///
    /// - `NotFound(Start)` / `NotFound(Context)` for the id that is not cached
    pub async fn browse_and_classify_by_type_in_context(
        &self,
        start_id: &str,
        context_id: &str,
    ) -> Result<ClassifiedNodes, DirectoryError> {
        let start = self.inner.lookup_as(start_id, NodeRole::Start)?;
        self.inner.lookup_as(context_id, NodeRole::Context)?;
        let classifier = Classifier::new();
        self.inner
            .search_in_context(start, context_id, &classifier)
            .await?;
        Ok(classifier.into_result())
    }
}
