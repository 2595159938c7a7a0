//! Graph Directory Core
//!
//! This crate provides an identity-mapped node cache and a traversal / synchronization
//! engine over a lazily loaded, relation-typed graph store.
//!
//! # Architecture
//!
//! - **Store Seam**: The persisted graph sits behind the async `GraphStore` trait
//! - **Identity Map**: One canonical `Arc<GraphNode>` per id, never evicted implicitly
//! - **Info Projections**: Flat per-node snapshots, updated in place so holders see changes
//! - **Binds**: Per-node listeners multiplexed over a single store subscription
//!
//! # Modules
//!
//! - [`models`] - Data structures (GraphNode, Attributes, NodeInfo, ClassifiedNodes)
//! - [`db`] - Store trait, in-memory reference store and JSON fixtures
//! - [`services`] - GraphDirectory and the cache components behind it
//! - [`config`] - Directory configuration

pub mod config;
pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::DirectoryConfig;
pub use models::*;
pub use services::*;
