//! Directory Services
//!
//! This module contains the cache and synchronization services:
//!
//! - `GraphDirectory` - Query, mutation and notification surface over a `GraphStore`
//! - `NodeCache` - Identity map plus graph-wide add/remove listeners
//! - `InfoProjections` - One in-place-updated `NodeInfo` per node id
//! - `BindRegistry` - Per-node listener sets backed by one store subscription
//!
//! Services coordinate between the store layer and application code. They hold no
//! global state: a directory is constructed explicitly and shared by cloning.

pub mod bind_registry;
pub mod directory;
pub mod error;
pub mod events;
pub mod info_projection;
pub mod listeners;
pub mod node_cache;

pub use bind_registry::BindCallback;
pub use directory::{
    predicate, BindHandle, CacheStats, FnPredicate, GraphDirectory, NewNode, NodePredicate,
    TypePredicate,
};
pub use error::{DirectoryError, NodeRole};
pub use events::DirectoryEvent;
pub use listeners::ListenerToken;
pub use node_cache::NodeListener;
