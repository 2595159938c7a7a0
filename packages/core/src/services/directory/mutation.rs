//! Mutation orchestration: create, link, unlink, move, modify, detach.
//!
//! Every mutation resolves its ids against the cache first and delegates the structural
//! change to the store. After the store confirms, the projections of the touched nodes
//! are re-synced and a `DirectoryEvent` is emitted.
//!
//! There is no compensation step: a move whose add half fails leaves the removal in
//! place, under whatever consistency the store itself guarantees.

use super::{DirectoryInner, GraphDirectory};
use crate::models::{AttrValue, Attributes, ElementRef, GraphNode, NodeInfo, NAME_KEY, TYPE_KEY};
use crate::services::error::{DirectoryError, NodeRole};
use crate::services::events::DirectoryEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Caller-supplied description of a node to create and attach
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewNode {
    /// Attributes of the new node; a `NewNode` without them is rejected
    #[serde(default)]
    pub info: Option<Attributes>,
    #[serde(default)]
    pub element: Option<ElementRef>,
}

impl NewNode {
    pub fn with_info(info: Attributes) -> Self {
        Self {
            info: Some(info),
            element: None,
        }
    }
}

impl DirectoryInner {
    /// Resolve the three ids of a move, each under its own role
    fn resolve_move(
        &self,
        from_id: &str,
        to_id: &str,
        child_id: &str,
    ) -> Result<(), DirectoryError> {
        self.lookup_as(from_id, NodeRole::Source)?;
        self.lookup_as(to_id, NodeRole::Destination)?;
        self.lookup_as(child_id, NodeRole::Child)?;
        Ok(())
    }

    fn edge_changed(&self, event: DirectoryEvent, parent_id: &str, child_id: &str) {
        self.refresh_infos([parent_id, child_id]);
        self.emit(event);
    }
}

impl GraphDirectory {
    /// Create an unattached node and register it
    ///
    /// A `type` attribute is added from the store's default type when `attributes`
    /// carries none. The node stays volatile until it is linked as a child.
    pub async fn create_node(
        &self,
        mut attributes: Attributes,
        element: Option<ElementRef>,
    ) -> Result<String, DirectoryError> {
        let store = &self.inner.store;
        attributes
            .entry(TYPE_KEY.to_string())
            .or_insert_with(|| AttrValue::from(store.default_node_type()));

        let node = store.create_node(attributes, element).await?;
        let node = self.inner.register(node);
        tracing::debug!("Created node {} ({})", node.id(), node.node_type());
        Ok(node.id().to_string())
    }

    /// Create a context named `name` under the current graph
    ///
    /// # Errors
    ///
    /// - `DirectoryError::NoGraph` if no graph is set
    pub async fn add_context(
        &self,
        name: &str,
        context_type: Option<&str>,
        element: Option<ElementRef>,
    ) -> Result<Arc<NodeInfo>, DirectoryError> {
        let graph = self.require_graph()?;
        let mut attributes = Attributes::new();
        attributes.insert(NAME_KEY.to_string(), AttrValue::from(name));
        if let Some(context_type) = context_type {
            attributes.insert(TYPE_KEY.to_string(), AttrValue::from(context_type));
        }

        let relation_name = &self.inner.config.context_relation_name;
        let context = self
            .inner
            .store
            .create_context(graph.id(), relation_name, attributes, element)
            .await?;
        let context = self.inner.register(context);
        tracing::info!(
            "Created context {} ({}) in graph {}",
            name,
            context.id(),
            graph.id()
        );

        self.inner.edge_changed(
            DirectoryEvent::ChildAdded {
                parent_id: graph.id().to_string(),
                child_id: context.id().to_string(),
                relation_name: relation_name.clone(),
            },
            graph.id(),
            context.id(),
        );
        Ok(self.inner.info_of(&context))
    }

    /// Link `child_id` under `parent_id`
    ///
    /// `Ok(false)` if either id is not cached; `Ok(true)` once the store confirms.
    pub async fn add_child(
        &self,
        parent_id: &str,
        child_id: &str,
        relation_name: &str,
        relation_type: &str,
    ) -> Result<bool, DirectoryError> {
        if !self.is_loaded(parent_id) || !self.is_loaded(child_id) {
            tracing::debug!("add_child: {} or {} not cached", parent_id, child_id);
            return Ok(false);
        }
        self.inner
            .store
            .add_child(parent_id, child_id, relation_name, relation_type)
            .await?;
        tracing::info!("Linked {} -[{}]-> {}", parent_id, relation_name, child_id);

        self.inner.edge_changed(
            DirectoryEvent::ChildAdded {
                parent_id: parent_id.to_string(),
                child_id: child_id.to_string(),
                relation_name: relation_name.to_string(),
            },
            parent_id,
            child_id,
        );
        Ok(true)
    }

    /// Create a node from `new_node` and link it under `parent_id`
    ///
    /// `Ok(false)` if `new_node` has no `info` or the parent is not cached; nothing is
    /// created in either case.
    pub async fn add_child_and_create_node(
        &self,
        parent_id: &str,
        new_node: NewNode,
        relation_name: &str,
        relation_type: &str,
    ) -> Result<bool, DirectoryError> {
        let Some(info) = new_node.info else {
            tracing::warn!(
                "add_child_and_create_node: no info given for child of {}",
                parent_id
            );
            return Ok(false);
        };
        if !self.is_loaded(parent_id) {
            return Ok(false);
        }
        let child_id = self.create_node(info, new_node.element).await?;
        self.add_child(parent_id, &child_id, relation_name, relation_type)
            .await
    }

    /// Link `child_id` under `parent_id` and register the edge into `context_id`
    ///
    /// # Errors
    ///
    /// - `NotFound(Parent)`, `NotFound(Child)` or `NotFound(Context)` for the id that is
    ///   not cached
    pub async fn add_child_in_context(
        &self,
        parent_id: &str,
        child_id: &str,
        context_id: &str,
        relation_name: &str,
        relation_type: &str,
    ) -> Result<Arc<GraphNode>, DirectoryError> {
        self.inner.lookup_as(parent_id, NodeRole::Parent)?;
        let child = self.inner.lookup_as(child_id, NodeRole::Child)?;
        self.inner.lookup_as(context_id, NodeRole::Context)?;

        self.inner
            .store
            .add_child_in_context(parent_id, child_id, context_id, relation_name, relation_type)
            .await?;
        tracing::info!(
            "Linked {} -[{}]-> {} in context {}",
            parent_id,
            relation_name,
            child_id,
            context_id
        );

        self.inner.edge_changed(
            DirectoryEvent::ChildAdded {
                parent_id: parent_id.to_string(),
                child_id: child_id.to_string(),
                relation_name: relation_name.to_string(),
            },
            parent_id,
            child_id,
        );
        Ok(child)
    }

    /// Unlink `child_id` from `node_id`
    ///
    /// An uncached child gets one chance to be discovered: the children of `node_id`
    /// are resolved once and the lookup retried. Remove listeners are invoked with
    /// `node_id` before the store removal is issued.
    ///
    /// # Errors
    ///
    /// - `NotFound(Parent)` if `node_id` is not cached
    /// - `NotFound(Child)` if `child_id` is still unknown after the reload
    /// - `Store(EdgeNotFound)` if the edge does not exist
    pub async fn remove_child(
        &self,
        node_id: &str,
        child_id: &str,
        relation_name: &str,
        relation_type: &str,
    ) -> Result<bool, DirectoryError> {
        let node = self.inner.lookup_as(node_id, NodeRole::Parent)?;
        if !self.is_loaded(child_id) {
            tracing::debug!("remove_child: reloading children of {} to find {}", node_id, child_id);
            self.inner.fetch_children(&node, &[]).await?;
            self.inner.lookup_as(child_id, NodeRole::Child)?;
        }

        self.inner.cache.notify_removed(node_id);
        self.inner
            .store
            .remove_child(node_id, child_id, relation_name, relation_type)
            .await?;
        tracing::info!("Unlinked {} -[{}]-> {}", node_id, relation_name, child_id);

        self.inner.edge_changed(
            DirectoryEvent::ChildRemoved {
                parent_id: node_id.to_string(),
                child_id: child_id.to_string(),
                relation_name: relation_name.to_string(),
            },
            node_id,
            child_id,
        );
        Ok(true)
    }

    /// Move `child_id` from `from_id` to `to_id` under the same relation
    ///
    /// Remove then add; remove listeners are not invoked.
    ///
    /// # Errors
    ///
    /// - `NotFound(Source)`, `NotFound(Destination)` or `NotFound(Child)` for the id
    ///   that is not cached
    pub async fn move_child(
        &self,
        from_id: &str,
        to_id: &str,
        child_id: &str,
        relation_name: &str,
        relation_type: &str,
    ) -> Result<bool, DirectoryError> {
        self.inner.resolve_move(from_id, to_id, child_id)?;
        self.unlink_for_move(from_id, child_id, relation_name, relation_type)
            .await?;

        self.inner
            .store
            .add_child(to_id, child_id, relation_name, relation_type)
            .await?;
        tracing::info!("Moved {} from {} to {}", child_id, from_id, to_id);

        self.inner.edge_changed(
            DirectoryEvent::ChildAdded {
                parent_id: to_id.to_string(),
                child_id: child_id.to_string(),
                relation_name: relation_name.to_string(),
            },
            to_id,
            child_id,
        );
        Ok(true)
    }

    /// `move_child` whose add half registers the new edge into `context_id`
    ///
    /// # Errors
    ///
    /// - as `move_child`, plus `NotFound(Context)`
    pub async fn move_child_in_context(
        &self,
        from_id: &str,
        to_id: &str,
        child_id: &str,
        context_id: &str,
        relation_name: &str,
        relation_type: &str,
    ) -> Result<bool, DirectoryError> {
        self.inner.resolve_move(from_id, to_id, child_id)?;
        self.inner.lookup_as(context_id, NodeRole::Context)?;
        self.unlink_for_move(from_id, child_id, relation_name, relation_type)
            .await?;

        self.inner
            .store
            .add_child_in_context(to_id, child_id, context_id, relation_name, relation_type)
            .await?;
        tracing::info!(
            "Moved {} from {} to {} in context {}",
            child_id,
            from_id,
            to_id,
            context_id
        );

        self.inner.edge_changed(
            DirectoryEvent::ChildAdded {
                parent_id: to_id.to_string(),
                child_id: child_id.to_string(),
                relation_name: relation_name.to_string(),
            },
            to_id,
            child_id,
        );
        Ok(true)
    }

    async fn unlink_for_move(
        &self,
        from_id: &str,
        child_id: &str,
        relation_name: &str,
        relation_type: &str,
    ) -> Result<(), DirectoryError> {
        self.inner
            .store
            .remove_child(from_id, child_id, relation_name, relation_type)
            .await?;
        self.inner.edge_changed(
            DirectoryEvent::ChildRemoved {
                parent_id: from_id.to_string(),
                child_id: child_id.to_string(),
                relation_name: relation_name.to_string(),
            },
            from_id,
            child_id,
        );
        Ok(())
    }

    /// Merge `partial` into the attributes of `id`
    ///
    /// Keys are added or updated, never deleted. Returns `false` if `id` is not cached.
    /// Bound listeners see the change through the store subscription when the node
    /// actually changed.
    pub fn modify_node(&self, id: &str, partial: &Attributes) -> bool {
        let Some(node) = self.inner.cache.lookup(id) else {
            return false;
        };
        if node.update_attributes(partial) {
            self.inner.infos.refresh_if_built(&node);
            self.inner.emit(DirectoryEvent::InfoModified { id: id.to_string() });
        }
        true
    }

    /// Alias of `modify_node`
    pub fn set_info(&self, id: &str, partial: &Attributes) -> bool {
        self.modify_node(id, partial)
    }

    /// Detach `id` from the graph entirely
    ///
    /// The id is evicted from the cache and the projection store first, then the remove
    /// listeners run, then the store detaches the node from every parent. `Ok(false)` if
    /// `id` is not cached.
    ///
    /// Binds on `id` stay registered along with their store subscription, but they go quiet
    /// while the id is evicted and fire again once it is registered anew.
    pub async fn remove_from_graph(&self, id: &str) -> Result<bool, DirectoryError> {
        let Some(node) = self.inner.cache.lookup(id) else {
            return Ok(false);
        };
        let former_parents = node.parent_ids(&[]);

        self.forget_node(id);
        self.inner.cache.notify_removed(id);
        self.inner.store.remove_from_graph(id).await?;
        tracing::info!(
            "Removed {} from graph ({} parents detached)",
            id,
            former_parents.len()
        );

        self.inner
            .refresh_infos(former_parents.iter().map(String::as_str));
        self.inner.emit(DirectoryEvent::NodeRemoved { id: id.to_string() });
        Ok(true)
    }
}
