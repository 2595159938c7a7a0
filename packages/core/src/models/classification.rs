//! Type Classification Result
//!
//! Output of `browse_and_classify_by_type`: node types in first-seen order plus, per
//! type, the raw attribute snapshots of the visited nodes in visitation order.

use crate::models::attributes::Attributes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedNodes {
    /// Distinct types, first-seen order
    pub types: Vec<String>,
    /// type -> attribute snapshots, visitation order
    pub data: HashMap<String, Vec<Attributes>>,
}

impl ClassifiedNodes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one visited node under `node_type`
    pub fn record(&mut self, node_type: &str, attributes: Attributes) {
        match self.data.get_mut(node_type) {
            Some(bucket) => bucket.push(attributes),
            None => {
                self.types.push(node_type.to_string());
                self.data.insert(node_type.to_string(), vec![attributes]);
            }
        }
    }

    /// Number of nodes recorded under `node_type`
    pub fn count(&self, node_type: &str) -> usize {
        self.data.get(node_type).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
