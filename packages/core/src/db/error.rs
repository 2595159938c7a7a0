//! Store Error Types
//!
//! This module defines error types for backing store operations. Service-level
//! errors wrap these through `DirectoryError::Store`.

use crate::models::RelationError;
use thiserror::Error;

/// Backing store operation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No node with this id exists in the store
    #[error("Node not found in store: {id}")]
    NodeNotFound { id: String },

    /// Relation already exists with a different relation type
    #[error("Relation '{relation}' has type '{expected}', not '{actual}'")]
    RelationTypeMismatch {
        relation: String,
        expected: String,
        actual: String,
    },

    /// The edge to remove does not exist
    #[error("No '{relation}' edge from {parent_id} to {child_id}")]
    EdgeNotFound {
        parent_id: String,
        child_id: String,
        relation: String,
    },

    /// Backend-specific failure
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a node not found error
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    /// Create an edge not found error
    pub fn edge_not_found(
        parent_id: impl Into<String>,
        child_id: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self::EdgeNotFound {
            parent_id: parent_id.into(),
            child_id: child_id.into(),
            relation: relation.into(),
        }
    }

    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

impl From<RelationError> for StoreError {
    fn from(err: RelationError) -> Self {
        match err {
            RelationError::TypeMismatch {
                relation,
                expected,
                actual,
            } => Self::RelationTypeMismatch {
                relation,
                expected,
                actual,
            },
        }
    }
}
