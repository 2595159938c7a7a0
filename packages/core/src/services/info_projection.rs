//! Info Projection Store
//!
//! Keeps one `NodeInfo` per node id. The first request builds it; later requests get
//! the same `Arc` back, and refreshes update it in place.

use crate::models::{GraphNode, NodeInfo};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct InfoProjections {
    infos: RwLock<HashMap<String, Arc<NodeInfo>>>,
}

impl InfoProjections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached projection for `node`, building it on first request
    pub fn get_or_build(&self, node: &GraphNode) -> Arc<NodeInfo> {
        if let Some(info) = self.infos.read().get(node.id()) {
            return info.clone();
        }
        self.infos
            .write()
            .entry(node.id().to_string())
            .or_insert_with(|| Arc::new(NodeInfo::build(node)))
            .clone()
    }

    /// Projection for `id` if one was built
    pub fn get(&self, id: &str) -> Option<Arc<NodeInfo>> {
        self.infos.read().get(id).cloned()
    }

    /// Re-sync the projection of `node` in place (building it if absent)
    pub fn refresh(&self, node: &GraphNode) -> Arc<NodeInfo> {
        let existing = self.get(node.id());
        match existing {
            Some(info) => {
                if info.refresh_from(node) {
                    tracing::trace!("Refreshed info of {}", node.id());
                }
                info
            }
            None => self.get_or_build(node),
        }
    }

    /// Refresh only if a projection was already built
    pub fn refresh_if_built(&self, node: &GraphNode) {
        if let Some(info) = self.get(node.id()) {
            info.refresh_from(node);
        }
    }

    pub fn remove(&self, id: &str) -> Option<Arc<NodeInfo>> {
        self.infos.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.infos.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.read().is_empty()
    }
}
