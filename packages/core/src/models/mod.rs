//! Data Models
//!
//! This module contains the core data structures shared by the store seam and the
//! directory services:
//!
//! - `GraphNode` - Canonical node handle with id-based relation edges
//! - `Attributes` / `AttrValue` - Tagged attribute bag ("info")
//! - `NodeInfo` - Cached, in-place-updated info projection
//! - `ClassifiedNodes` - Result of type classification

mod attributes;
mod classification;
mod info;
mod node;

pub use attributes::{
    merge_attributes, AttrValue, Attributes, NodeRef, ID_KEY, NAME_KEY, TYPE_KEY,
};
pub use classification::ClassifiedNodes;
pub use info::{InfoSnapshot, NodeInfo};
pub use node::{
    ChangeHandler, ElementRef, GraphNode, NodeKind, Relation, RelationEdge, RelationError,
    SubscriptionId,
};
