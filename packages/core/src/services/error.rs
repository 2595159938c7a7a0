//! Service Layer Error Types
//!
//! This module defines error types for directory operations. Missing references are
//! reported per role (parent, child, context, ...) so callers can tell which of the
//! ids they passed failed to resolve.

use crate::db::StoreError;
use std::fmt;
use thiserror::Error;

/// Which argument of an operation an unresolved id was passed as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    Node,
    Parent,
    Child,
    Context,
    Start,
    /// `from` side of a move
    Source,
    /// `to` side of a move
    Destination,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeRole::Node => "node",
            NodeRole::Parent => "parent",
            NodeRole::Child => "child",
            NodeRole::Context => "context",
            NodeRole::Start => "start node",
            NodeRole::Source => "source parent",
            NodeRole::Destination => "destination parent",
        };
        f.write_str(name)
    }
}

/// Directory operation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DirectoryError {
    /// Referenced id is not in the node cache
    #[error("Unknown {role}: {id}")]
    NotFound { role: NodeRole, id: String },

    /// Operation needs a current graph and none is set
    #[error("No graph has been set")]
    NoGraph,

    /// Backing store failed
    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),

    /// Directory configuration rejected by `DirectoryConfig::validate`
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DirectoryError {
    pub fn not_found(role: NodeRole, id: impl Into<String>) -> Self {
        Self::NotFound {
            role,
            id: id.into(),
        }
    }

    /// True for every `NotFound`, whatever the role
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Role of the unresolved id, for `NotFound` errors
    pub fn role(&self) -> Option<NodeRole> {
        match self {
            Self::NotFound { role, .. } => Some(*role),
            _ => None,
        }
    }
}
