//! Backing Store Layer
//!
//! This module holds the seam between the directory and the persisted graph:
//!
//! - `GraphStore` - async trait the directory consumes (fetch, link, observe)
//! - `StoreError` - store-level failures
//! - `InMemoryGraphStore` - arena-backed reference implementation
//! - `GraphFixture` - JSON graph descriptions loadable into the in-memory store
//!
//! Durable storage and attribute serialization are a store concern; nothing in the
//! directory depends on how a particular backend implements them.

mod error;
pub mod fixture;
mod graph_store;
mod memory_store;

pub use error::StoreError;
pub use fixture::{FixtureEdge, FixtureGraph, FixtureNode, GraphFixture};
pub use graph_store::{GraphStore, StoreResult};
pub use memory_store::{
    InMemoryGraphStore, StoreCounters, CONTEXT_RELATION_TYPE, DEFAULT_CONTEXT_TYPE,
    DEFAULT_NODE_TYPE, GRAPH_TYPE,
};
pub use crate::models::{ChangeHandler, SubscriptionId};
