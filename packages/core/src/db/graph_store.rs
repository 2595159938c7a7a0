//! GraphStore Trait - Backing Store Abstraction
//!
//! This module defines the `GraphStore` trait: the narrow interface through which the
//! directory consumes the persisted graph. Durable storage, relation persistence,
//! attribute serialization and id generation all live behind it.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: Every call that may touch storage is async. These calls are the
//!    only suspension points of directory operations.
//! 2. **Shared Handles**: Fetches return `Arc<GraphNode>`. A store must hand out the same
//!    `Arc` for the same id for as long as the node lives, so that pointer identity
//!    matches id identity.
//! 3. **Id-Based Arguments**: Mutations take ids, never handles, mirroring the arena
//!    layout of edges.
//! 4. **Volatility**: A node created but never linked as a child is not guaranteed to be
//!    persisted. The directory relies on this guarantee, it does not enforce it.
//!
//! # Examples
//!
//! ```rust
//! use graph_directory::db::{GraphStore, InMemoryGraphStore};
//! use graph_directory::models::Attributes;
//!
//! # async fn example() -> Result<(), graph_directory::db::StoreError> {
//! let store = InMemoryGraphStore::new();
//! let graph = store.create_graph("Building").await?;
//! let floor = store.create_node(Attributes::new(), None).await?;
//! store
//!     .add_child(graph.id(), floor.id(), "hasFloor", "Ref")
//!     .await?;
//!
//! let children = store.get_children(graph.id(), &[]).await?;
//! assert_eq!(children.len(), 1);
//! # Ok(())
//! # }
//! ```

use crate::db::error::StoreError;
use crate::models::{Attributes, ChangeHandler, ElementRef, GraphNode, SubscriptionId};
use async_trait::async_trait;
use std::sync::Arc;

/// Result alias for store calls
pub type StoreResult<T> = Result<T, StoreError>;

/// Abstraction over the persisted, relation-typed graph
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the directory shares one store between
/// concurrently running operations.
///
/// # Method Categories
///
/// - **Construction**: create nodes and contexts
/// - **Fetching**: children (relation- or context-filtered), parents
/// - **Edges**: add, add in context, remove, detach from graph
/// - **Observation**: per-node change subscriptions
#[async_trait]
pub trait GraphStore: Send + Sync {
    //
    // CONSTRUCTION
    //

    /// Type assigned to created nodes whose attributes carry no `type`
    fn default_node_type(&self) -> &str;

    /// Create a new, unattached node
    ///
    /// The store generates the id. Attributes are written as given; callers that want
    /// a default type must add it before calling.
    async fn create_node(
        &self,
        attributes: Attributes,
        element: Option<ElementRef>,
    ) -> StoreResult<Arc<GraphNode>>;

    /// Create a context node and hang it under the graph root
    ///
    /// # Errors
    ///
    /// - `StoreError::NodeNotFound` if `graph_id` is unknown
    async fn create_context(
        &self,
        graph_id: &str,
        relation_name: &str,
        attributes: Attributes,
        element: Option<ElementRef>,
    ) -> StoreResult<Arc<GraphNode>>;

    //
    // FETCHING
    //

    /// Children of `parent_id` under `relation_names`
    ///
    /// An empty slice means no relation at all: callers wanting every relation must
    /// enumerate the names first. Order is relation order as given, then edge order.
    async fn get_children(
        &self,
        parent_id: &str,
        relation_names: &[String],
    ) -> StoreResult<Vec<Arc<GraphNode>>>;

    /// Children of `parent_id` whose edge is registered into `context_id`
    async fn get_children_in_context(
        &self,
        parent_id: &str,
        context_id: &str,
    ) -> StoreResult<Vec<Arc<GraphNode>>>;

    /// Parents of `child_id` under `relation_names` (all relations if empty)
    ///
    /// May include the graph root; the directory filters.
    async fn get_parents(
        &self,
        child_id: &str,
        relation_names: &[String],
    ) -> StoreResult<Vec<Arc<GraphNode>>>;

    //
    // EDGES
    //

    /// Link `child_id` under `parent_id`
    ///
    /// # Errors
    ///
    /// - `StoreError::NodeNotFound` if either id is unknown
    /// - `StoreError::RelationTypeMismatch` if the relation exists with another type
    async fn add_child(
        &self,
        parent_id: &str,
        child_id: &str,
        relation_name: &str,
        relation_type: &str,
    ) -> StoreResult<()>;

    /// Link `child_id` under `parent_id` and register the edge and the child into
    /// `context_id`
    async fn add_child_in_context(
        &self,
        parent_id: &str,
        child_id: &str,
        context_id: &str,
        relation_name: &str,
        relation_type: &str,
    ) -> StoreResult<()>;

    /// Remove the edge from `parent_id` to `child_id`
    ///
    /// # Errors
    ///
    /// - `StoreError::EdgeNotFound` if no such edge exists
    async fn remove_child(
        &self,
        parent_id: &str,
        child_id: &str,
        relation_name: &str,
        relation_type: &str,
    ) -> StoreResult<()>;

    /// Detach `node_id` from every parent
    async fn remove_from_graph(&self, node_id: &str) -> StoreResult<()>;

    //
    // OBSERVATION
    //

    /// Subscribe to low-level changes of one node
    async fn subscribe(&self, node_id: &str, handler: ChangeHandler)
        -> StoreResult<SubscriptionId>;

    /// Tear down a subscription created by `subscribe`
    async fn unsubscribe(&self, node_id: &str, subscription: SubscriptionId) -> StoreResult<()>;
}
