//! Graph Node Handle
//!
//! `GraphNode` is the canonical in-process handle for a node of the backing store.
//! The store owns nodes; the directory cache only holds `Arc<GraphNode>` clones, so
//! identity is pointer identity (`Arc::ptr_eq`).
//!
//! # Arena-Style Edges
//!
//! Relations never hold references to other nodes. A relation is a list of
//! `RelationEdge` records carrying the *id* of the child plus the ids of the contexts
//! the edge has been registered into. Parent back-links are likewise stored as ids.
//! This keeps the node graph free of ownership cycles.
//!
//! # Change Observation
//!
//! Every mutation of a node (attribute write, edge link/unlink, context join) notifies
//! the node's observers after the state lock is released. Store implementations expose
//! this through `GraphStore::subscribe`; the directory never observes nodes directly.

use crate::models::attributes::{merge_attributes, AttrValue, Attributes, NAME_KEY, TYPE_KEY};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Callback invoked with the node id whenever an observed node changes
pub type ChangeHandler = Arc<dyn Fn(&str) + Send + Sync>;

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle identifying one store-level change subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        SubscriptionId(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// What a node is, structurally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[default]
    Node,
    /// Scopes a subgraph; edges can be registered into it
    Context,
    /// Traversal root
    Graph,
}

/// Opaque pointer to the element a node describes
///
/// Loading the element itself is the store's business.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementRef(pub String);

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One parent -> child edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationEdge {
    pub child_id: String,
    /// Contexts this edge has been registered into
    #[serde(default)]
    pub context_ids: BTreeSet<String>,
}

/// Named, typed category of outgoing edges (e.g. "hasFloor" of type "Ref")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub name: String,
    pub relation_type: String,
    pub edges: Vec<RelationEdge>,
}

impl Relation {
    fn new(name: &str, relation_type: &str) -> Self {
        Self {
            name: name.to_string(),
            relation_type: relation_type.to_string(),
            edges: Vec::new(),
        }
    }

    pub fn child_ids(&self) -> impl Iterator<Item = &str> {
        self.edges.iter().map(|e| e.child_id.as_str())
    }
}

/// Edge-level rule violations raised while linking nodes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelationError {
    #[error("Relation '{relation}' has type '{expected}', cannot link with type '{actual}'")]
    TypeMismatch {
        relation: String,
        expected: String,
        actual: String,
    },
}

#[derive(Debug, Default)]
struct NodeState {
    attributes: Attributes,
    relations: BTreeMap<String, Relation>,
    /// relation name -> parent ids
    parents: BTreeMap<String, Vec<String>>,
    contexts: BTreeSet<String>,
    element: Option<ElementRef>,
}

/// Canonical handle for one store node
pub struct GraphNode {
    id: String,
    kind: NodeKind,
    state: RwLock<NodeState>,
    observers: Mutex<Vec<(SubscriptionId, ChangeHandler)>>,
}

impl fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphNode")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("type", &self.node_type())
            .finish()
    }
}

impl GraphNode {
    /// Create a detached node. Only store implementations should call this.
    pub fn new(
        id: impl Into<String>,
        kind: NodeKind,
        attributes: Attributes,
        element: Option<ElementRef>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            state: RwLock::new(NodeState {
                attributes,
                element,
                ..Default::default()
            }),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Value of the `type` attribute, or an empty string when unset
    pub fn node_type(&self) -> String {
        self.state
            .read()
            .attributes
            .get(TYPE_KEY)
            .map(|v| v.to_string())
            .unwrap_or_default()
    }

    pub fn name(&self) -> Option<String> {
        self.state
            .read()
            .attributes
            .get(NAME_KEY)
            .map(|v| v.to_string())
    }

    /// Snapshot of all attributes
    pub fn attributes(&self) -> Attributes {
        self.state.read().attributes.clone()
    }

    pub fn attribute(&self, key: &str) -> Option<AttrValue> {
        self.state.read().attributes.get(key).cloned()
    }

    /// Merge `partial` into the attributes (add missing, update differing keys)
    ///
    /// Observers are notified only when something actually changed.
    pub fn update_attributes(&self, partial: &Attributes) -> bool {
        let changed = merge_attributes(&mut self.state.write().attributes, partial);
        if changed {
            self.notify_changed();
        }
        changed
    }

    pub fn element(&self) -> Option<ElementRef> {
        self.state.read().element.clone()
    }

    /// Relation names present on this node, in name order
    pub fn relation_names(&self) -> Vec<String> {
        self.state.read().relations.keys().cloned().collect()
    }

    pub fn relation(&self, name: &str) -> Option<Relation> {
        self.state.read().relations.get(name).cloned()
    }

    /// Child ids across every relation, relation-name order then edge order
    pub fn children_ids(&self) -> Vec<String> {
        self.state
            .read()
            .relations
            .values()
            .flat_map(|r| r.child_ids().map(str::to_string))
            .collect()
    }

    /// Child ids under the given relations only. Unknown names are skipped.
    pub fn children_ids_in(&self, relation_names: &[String]) -> Vec<String> {
        let state = self.state.read();
        relation_names
            .iter()
            .filter_map(|name| state.relations.get(name))
            .flat_map(|r| r.child_ids().map(str::to_string))
            .collect()
    }

    /// Child ids whose edge is registered into `context_id`
    pub fn children_ids_in_context(&self, context_id: &str) -> Vec<String> {
        self.state
            .read()
            .relations
            .values()
            .flat_map(|r| r.edges.iter())
            .filter(|e| e.context_ids.contains(context_id))
            .map(|e| e.child_id.clone())
            .collect()
    }

    pub fn has_children(&self) -> bool {
        self.state
            .read()
            .relations
            .values()
            .any(|r| !r.edges.is_empty())
    }

    /// True iff some outgoing edge, in any relation, carries `context_id`
    pub fn has_child_in_context(&self, context_id: &str) -> bool {
        self.state
            .read()
            .relations
            .values()
            .flat_map(|r| r.edges.iter())
            .any(|e| e.context_ids.contains(context_id))
    }

    /// Contexts this node participates in
    pub fn context_ids(&self) -> BTreeSet<String> {
        self.state.read().contexts.clone()
    }

    pub fn belongs_to_context(&self, context_id: &str) -> bool {
        self.state.read().contexts.contains(context_id)
    }

    /// Parent ids under the given relations (all relations if empty)
    pub fn parent_ids(&self, relation_names: &[String]) -> Vec<String> {
        let state = self.state.read();
        let mut ids: Vec<String> = if relation_names.is_empty() {
            state.parents.values().flatten().cloned().collect()
        } else {
            relation_names
                .iter()
                .filter_map(|name| state.parents.get(name))
                .flatten()
                .cloned()
                .collect()
        };
        let mut seen = BTreeSet::new();
        ids.retain(|id| seen.insert(id.clone()));
        ids
    }

    //
    // STORE-SIDE MUTATIONS
    //

    /// Add an outgoing edge to `child_id`
    ///
    /// Creates the relation on first use. When `context_id` is given the edge is tagged
    /// with it (an existing edge gains the tag). Returns `Ok(true)` if the node changed.
    pub fn link_child(
        &self,
        relation_name: &str,
        relation_type: &str,
        child_id: &str,
        context_id: Option<&str>,
    ) -> Result<bool, RelationError> {
        let changed = {
            let mut state = self.state.write();
            let relation = state
                .relations
                .entry(relation_name.to_string())
                .or_insert_with(|| Relation::new(relation_name, relation_type));

            if relation.relation_type != relation_type {
                return Err(RelationError::TypeMismatch {
                    relation: relation_name.to_string(),
                    expected: relation.relation_type.clone(),
                    actual: relation_type.to_string(),
                });
            }

            match relation.edges.iter_mut().find(|e| e.child_id == child_id) {
                Some(edge) => match context_id {
                    Some(ctx) => edge.context_ids.insert(ctx.to_string()),
                    None => false,
                },
                None => {
                    relation.edges.push(RelationEdge {
                        child_id: child_id.to_string(),
                        context_ids: context_id.map(str::to_string).into_iter().collect(),
                    });
                    true
                }
            }
        };
        if changed {
            self.notify_changed();
        }
        Ok(changed)
    }

    /// Remove the edge to `child_id` under `relation_name`
    ///
    /// An emptied relation is dropped so it no longer shows up in `relation_names`.
    pub fn unlink_child(&self, relation_name: &str, child_id: &str) -> bool {
        let removed = {
            let mut state = self.state.write();
            let Some(relation) = state.relations.get_mut(relation_name) else {
                return false;
            };
            let before = relation.edges.len();
            relation.edges.retain(|e| e.child_id != child_id);
            let removed = relation.edges.len() != before;
            if relation.edges.is_empty() {
                state.relations.remove(relation_name);
            }
            removed
        };
        if removed {
            self.notify_changed();
        }
        removed
    }

    /// Record that `parent_id` points at this node through `relation_name`
    pub fn add_parent(&self, relation_name: &str, parent_id: &str) {
        let mut state = self.state.write();
        let parents = state.parents.entry(relation_name.to_string()).or_default();
        if !parents.iter().any(|p| p == parent_id) {
            parents.push(parent_id.to_string());
        }
    }

    pub fn remove_parent(&self, relation_name: &str, parent_id: &str) {
        let mut state = self.state.write();
        if let Some(parents) = state.parents.get_mut(relation_name) {
            parents.retain(|p| p != parent_id);
            if parents.is_empty() {
                state.parents.remove(relation_name);
            }
        }
    }

    /// All (relation name, parent id) back-links
    pub fn parent_links(&self) -> Vec<(String, String)> {
        self.state
            .read()
            .parents
            .iter()
            .flat_map(|(rel, ids)| ids.iter().map(move |id| (rel.clone(), id.clone())))
            .collect()
    }

    /// Register this node into a context
    pub fn join_context(&self, context_id: &str) -> bool {
        let joined = self.state.write().contexts.insert(context_id.to_string());
        if joined {
            self.notify_changed();
        }
        joined
    }

    //
    // OBSERVERS
    //

    /// Register a change observer
    pub fn observe(&self, handler: ChangeHandler) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.observers.lock().push((id, handler));
        id
    }

    /// Remove a change observer. Returns `false` if it was not registered.
    pub fn unobserve(&self, subscription: SubscriptionId) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|(id, _)| *id != subscription);
        observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    /// Invoke every observer with this node's id
    ///
    /// Handlers are cloned out first so they may re-enter the node freely.
    pub fn notify_changed(&self) {
        let handlers: Vec<ChangeHandler> = self
            .observers
            .lock()
            .iter()
            .map(|(_, h)| h.clone())
            .collect();
        for handler in handlers {
            handler(&self.id);
        }
    }
}
