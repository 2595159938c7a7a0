//! Info Projection
//!
//! A `NodeInfo` is the denormalized read view of one node: every attribute plus
//! derived fields (children ids, context ids, element reference, has-children).
//!
//! The directory keeps at most one `NodeInfo` per node id and hands out `Arc` clones
//! of it. Refreshes mutate the shared object in place, so every holder observes the
//! newest data without asking again.

use crate::models::attributes::{merge_attributes, AttrValue, Attributes, ID_KEY, TYPE_KEY};
use crate::models::node::{ElementRef, GraphNode};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Plain-data copy of a projection at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoSnapshot {
    pub id: String,
    pub attributes: Attributes,
    pub children_ids: Vec<String>,
    pub context_ids: Vec<String>,
    pub element: Option<ElementRef>,
    pub has_children: bool,
}

/// Shared, in-place-updated projection of a node
#[derive(Debug)]
pub struct NodeInfo {
    id: String,
    data: RwLock<InfoSnapshot>,
}

impl NodeInfo {
    /// Build a fresh projection by copying everything off `node`
    pub(crate) fn build(node: &GraphNode) -> Self {
        let mut attributes = node.attributes();
        attributes
            .entry(ID_KEY.to_string())
            .or_insert_with(|| AttrValue::from(node.id()));

        Self {
            id: node.id().to_string(),
            data: RwLock::new(InfoSnapshot {
                id: node.id().to_string(),
                attributes,
                children_ids: node.children_ids(),
                context_ids: node.context_ids().into_iter().collect(),
                element: node.element(),
                has_children: node.has_children(),
            }),
        }
    }

    /// Re-sync from `node` in place
    ///
    /// Attributes are added or updated, never removed. Derived fields are replaced.
    /// Returns `true` if anything changed.
    pub(crate) fn refresh_from(&self, node: &GraphNode) -> bool {
        let children_ids = node.children_ids();
        let context_ids: Vec<String> = node.context_ids().into_iter().collect();
        let element = node.element();
        let has_children = node.has_children();
        let attributes = node.attributes();

        let mut data = self.data.write();
        let mut changed = merge_attributes(&mut data.attributes, &attributes);
        if data.children_ids != children_ids {
            data.children_ids = children_ids;
            changed = true;
        }
        if data.context_ids != context_ids {
            data.context_ids = context_ids;
            changed = true;
        }
        if data.element != element {
            data.element = element;
            changed = true;
        }
        if data.has_children != has_children {
            data.has_children = has_children;
            changed = true;
        }
        changed
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn snapshot(&self) -> InfoSnapshot {
        self.data.read().clone()
    }

    pub fn attribute(&self, key: &str) -> Option<AttrValue> {
        self.data.read().attributes.get(key).cloned()
    }

    pub fn node_type(&self) -> Option<String> {
        self.attribute(TYPE_KEY).map(|v| v.to_string())
    }

    pub fn children_ids(&self) -> Vec<String> {
        self.data.read().children_ids.clone()
    }

    pub fn context_ids(&self) -> Vec<String> {
        self.data.read().context_ids.clone()
    }

    pub fn element(&self) -> Option<ElementRef> {
        self.data.read().element.clone()
    }

    pub fn has_children(&self) -> bool {
        self.data.read().has_children
    }
}
