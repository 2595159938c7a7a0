//! Graph Directory - Cache, Traversal and Synchronization Engine
//!
//! `GraphDirectory` gives callers a fast, identity-consistent, partially materialized
//! view of a graph that is otherwise loaded lazily from a `GraphStore`:
//!
//! - **Node cache**: one canonical `Arc<GraphNode>` per id, populated by every
//!   traversal, search and mutation that observes a node
//! - **Info projections**: one in-place-updated `NodeInfo` per id
//! - **Traversal** (`traversal.rs`): children by relation or context, parents
//! - **Search** (`search.rs`): predicate search and type classification
//! - **Mutations** (`mutation.rs`): create / add / remove / move / modify
//! - **Binds** (`bind.rs`): per-node listeners multiplexed over one store subscription
//!
//! # Wiring
//!
//! The directory is constructed explicitly and passed around; clones share state.
//!
//! ```rust
//! use graph_directory::db::InMemoryGraphStore;
//! use graph_directory::GraphDirectory;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryGraphStore::new());
//! let graph = store.create_graph("Site").await?;
//!
//! let directory = GraphDirectory::new(store);
//! directory.set_graph(graph);
//! assert!(directory.get_graph().is_some());
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! Operations suspend only inside store calls. Shared maps are guarded by short-lived
//! `parking_lot` locks that are never held across an `.await` or while listeners run.

mod bind;
mod mutation;
mod search;
mod traversal;


pub use bind::BindHandle;
pub use mutation::NewNode;
pub use search::{predicate, FnPredicate, NodePredicate, TypePredicate};

use crate::config::DirectoryConfig;
use crate::db::GraphStore;
use crate::models::{GraphNode, NodeInfo, NodeKind};
use crate::services::bind_registry::BindRegistry;
use crate::services::error::DirectoryError;
use crate::services::events::DirectoryEvent;
use crate::services::info_projection::InfoProjections;
use crate::services::listeners::ListenerToken;
use crate::services::node_cache::{NodeCache, NodeListener};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Snapshot of directory sizes (for debugging/monitoring)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Cached node handles
    pub nodes: usize,
    /// Built info projections
    pub projections: usize,
    /// Node ids with at least one bind listener
    pub bound_nodes: usize,
    pub add_listeners: usize,
    pub remove_listeners: usize,
}

pub(crate) struct DirectoryInner {
    store: Arc<dyn GraphStore>,
    cache: NodeCache,
    infos: InfoProjections,
    binds: BindRegistry,
    graph: RwLock<Option<Arc<GraphNode>>>,
    config: DirectoryConfig,
    event_tx: broadcast::Sender<DirectoryEvent>,
}

impl DirectoryInner {
    /// Register `node` and return the canonical handle for its id
    fn register(&self, node: Arc<GraphNode>) -> Arc<GraphNode> {
        let registration = self.cache.register(node);
        if registration.inserted {
            self.emit(DirectoryEvent::NodeRegistered {
                id: registration.node.id().to_string(),
            });
        }
        registration.node
    }

    fn info_of(&self, node: &GraphNode) -> Arc<NodeInfo> {
        self.infos.get_or_build(node)
    }

    /// Re-sync projections of the given ids, if cached and built
    fn refresh_infos<'a>(&self, ids: impl IntoIterator<Item = &'a str>) {
        for id in ids {
            if let Some(node) = self.cache.lookup(id) {
                self.infos.refresh_if_built(&node);
            }
        }
    }

    fn emit(&self, event: DirectoryEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// Node cache and graph traversal/synchronization engine
#[derive(Clone)]
pub struct GraphDirectory {
    inner: Arc<DirectoryInner>,
}

impl GraphDirectory {
    /// Create a directory over `store` with the default configuration
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self::build(store, DirectoryConfig::default())
    }

    /// Create a directory with an explicit configuration
    ///
    /// # Errors
    ///
    /// - `DirectoryError::InvalidConfig` if `config.validate()` fails
    pub fn with_config(
        store: Arc<dyn GraphStore>,
        config: DirectoryConfig,
    ) -> Result<Self, DirectoryError> {
        config.validate().map_err(DirectoryError::InvalidConfig)?;
        Ok(Self::build(store, config))
    }

    fn build(store: Arc<dyn GraphStore>, config: DirectoryConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);
        Self {
            inner: Arc::new(DirectoryInner {
                store,
                cache: NodeCache::new(config.isolate_listener_panics),
                infos: InfoProjections::new(),
                binds: BindRegistry::new(),
                graph: RwLock::new(None),
                config,
                event_tx,
            }),
        }
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.inner.config
    }

    /// Get access to the underlying store
    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.inner.store
    }

    /// Subscribe to directory events
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<DirectoryEvent> {
        self.inner.event_tx.subscribe()
    }

    //
    // GRAPH
    //

    /// Register `graph` and make it the current traversal root
    ///
    /// Replaces any previous current graph. Returns the graph id.
    pub fn set_graph(&self, graph: Arc<GraphNode>) -> String {
        if graph.kind() != NodeKind::Graph {
            tracing::warn!(
                "Node {} set as graph has kind {:?}",
                graph.id(),
                graph.kind()
            );
        }
        let graph = self.inner.register(graph);
        tracing::info!("Current graph set to {}", graph.id());
        let id = graph.id().to_string();
        *self.inner.graph.write() = Some(graph);
        id
    }

    pub fn get_graph(&self) -> Option<Arc<GraphNode>> {
        self.inner.graph.read().clone()
    }

    pub(crate) fn require_graph(&self) -> Result<Arc<GraphNode>, DirectoryError> {
        self.get_graph().ok_or(DirectoryError::NoGraph)
    }

    //
    // NODE CACHE
    //

    /// Canonical handle for `id`, if cached
    pub fn get_real_node(&self, id: &str) -> Option<Arc<GraphNode>> {
        self.inner.cache.lookup(id)
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.inner.cache.is_loaded(id)
    }

    /// Register a node obtained outside the directory
    ///
    /// Returns the canonical handle, which is the already-cached one if `id` was known.
    pub fn register_node(&self, node: Arc<GraphNode>) -> Arc<GraphNode> {
        self.inner.register(node)
    }

    /// Evict `id` from the cache and projection store
    ///
    /// Nodes are otherwise never evicted. Returns `false` if `id` was not cached.
    pub fn forget_node(&self, id: &str) -> bool {
        self.inner.infos.remove(id);
        self.inner.cache.unregister(id).is_some()
    }

    pub fn cache_stats(&self) -> CacheStats {
        let (add_listeners, remove_listeners) = self.inner.cache.listener_counts();
        CacheStats {
            nodes: self.inner.cache.len(),
            projections: self.inner.infos.len(),
            bound_nodes: self.inner.binds.bound_count(),
            add_listeners,
            remove_listeners,
        }
    }

    //
    // INFO PROJECTION
    //

    /// Projection of `id`; `None` iff `id` is not cached
    ///
    /// Repeated calls return the same `Arc`.
    pub fn get_info(&self, id: &str) -> Option<Arc<NodeInfo>> {
        let node = self.inner.cache.lookup(id)?;
        Some(self.inner.info_of(&node))
    }

    /// Alias of `get_info`
    pub fn get_node(&self, id: &str) -> Option<Arc<NodeInfo>> {
        self.get_info(id)
    }

    /// Re-sync the projection of `id` in place
    pub fn refresh_info(&self, id: &str) -> Option<Arc<NodeInfo>> {
        let node = self.inner.cache.lookup(id)?;
        Some(self.inner.infos.refresh(&node))
    }

    //
    // GRAPH-WIDE LISTENERS
    //

    /// Call `listener` with every id newly registered in the cache
    pub fn listen_on_node_added(&self, caller: ListenerToken, listener: NodeListener) {
        self.inner.cache.listen_on_node_added(caller, listener);
    }

    pub fn stop_listening_on_node_added(&self, caller: ListenerToken) -> bool {
        self.inner.cache.stop_listening_on_node_added(caller)
    }

    /// Call `listener` with the id passed to every `remove_child` / `remove_from_graph`
    pub fn listen_on_node_removed(&self, caller: ListenerToken, listener: NodeListener) {
        self.inner.cache.listen_on_node_removed(caller, listener);
    }

    pub fn stop_listening_on_node_removed(&self, caller: ListenerToken) -> bool {
        self.inner.cache.stop_listening_on_node_removed(caller)
    }
}
