//! Graph Fixtures
//!
//! JSON description of a whole graph (root, contexts, nodes, edges) that can be
//! loaded into an `InMemoryGraphStore`. Ids are taken verbatim from the fixture so
//! tests and tools can refer to nodes by name.
//!
//! ```json
//! {
//!   "graph": { "id": "site", "name": "Site" },
//!   "contexts": [{ "id": "spatial", "info": { "name": "Spatial", "type": "geographicContext" } }],
//!   "nodes": [{ "id": "b1", "info": { "name": "Building", "type": "building" } }],
//!   "edges": [{ "parent": "spatial", "child": "b1", "relation": "hasBuilding", "context": "spatial" }]
//! }
//! ```

use crate::db::error::StoreError;
use crate::db::graph_store::{GraphStore, StoreResult};
use crate::db::memory_store::{InMemoryGraphStore, CONTEXT_RELATION_TYPE, DEFAULT_CONTEXT_TYPE};
use crate::models::{AttrValue, Attributes, ElementRef, GraphNode, NodeKind, TYPE_KEY};
use serde::{Deserialize, Serialize};

fn default_relation_type() -> String {
    "Ref".to_string()
}

fn default_context_relation() -> String {
    "hasContext".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureGraph {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureNode {
    pub id: String,
    #[serde(default)]
    pub info: Attributes,
    #[serde(default)]
    pub element: Option<ElementRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureEdge {
    pub parent: String,
    pub child: String,
    pub relation: String,
    #[serde(default = "default_relation_type")]
    pub relation_type: String,
    /// Register the edge into this context
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphFixture {
    pub graph: FixtureGraph,
    /// Relation under which contexts hang from the graph root
    #[serde(default = "default_context_relation")]
    pub context_relation: String,
    #[serde(default)]
    pub contexts: Vec<FixtureNode>,
    #[serde(default)]
    pub nodes: Vec<FixtureNode>,
    #[serde(default)]
    pub edges: Vec<FixtureEdge>,
}

impl GraphFixture {
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        serde_json::from_str(json)
            .map_err(|e| StoreError::backend(format!("Invalid fixture: {}", e)))
    }
}

impl InMemoryGraphStore {
    /// Build a store holding everything described by `fixture`
    ///
    /// # Errors
    ///
    /// - duplicate ids
    /// - edges referencing unknown ids or mixing relation types
    pub async fn from_fixture(fixture: &GraphFixture) -> StoreResult<Self> {
        let store = InMemoryGraphStore::new();
        store.create_graph_with_id(&fixture.graph.id, &fixture.graph.name)?;

        for context in &fixture.contexts {
            let mut info = context.info.clone();
            info.entry(TYPE_KEY.to_string())
                .or_insert_with(|| AttrValue::from(DEFAULT_CONTEXT_TYPE));
            store.insert(GraphNode::new(
                context.id.clone(),
                NodeKind::Context,
                info,
                context.element.clone(),
            ))?;
            store
                .add_child(
                    &fixture.graph.id,
                    &context.id,
                    &fixture.context_relation,
                    CONTEXT_RELATION_TYPE,
                )
                .await?;
        }

        for node in &fixture.nodes {
            let mut info = node.info.clone();
            info.entry(TYPE_KEY.to_string())
                .or_insert_with(|| AttrValue::from(store.default_node_type()));
            store.insert(GraphNode::new(
                node.id.clone(),
                NodeKind::Node,
                info,
                node.element.clone(),
            ))?;
        }

        for edge in &fixture.edges {
            match &edge.context {
                Some(context) => {
                    store
                        .add_child_in_context(
                            &edge.parent,
                            &edge.child,
                            context,
                            &edge.relation,
                            &edge.relation_type,
                        )
                        .await?
                }
                None => {
                    store
                        .add_child(&edge.parent, &edge.child, &edge.relation, &edge.relation_type)
                        .await?
                }
            }
        }

        tracing::debug!(
            "Loaded fixture '{}' with {} nodes",
            fixture.graph.name,
            store.len()
        );
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fixture_loads_contexts_nodes_and_edges() {
        let fixture: GraphFixture = serde_json::from_value(json!({
            "graph": { "id": "g", "name": "Site" },
            "contexts": [{ "id": "ctx", "info": { "name": "Spatial" } }],
            "nodes": [
                { "id": "b", "info": { "name": "Building", "type": "building" } },
                { "id": "f", "info": { "name": "Floor" } }
            ],
            "edges": [
                { "parent": "ctx", "child": "b", "relation": "hasBuilding", "context": "ctx" },
                { "parent": "b", "child": "f", "relation": "hasFloor" }
            ]
        }))
        .unwrap();

        let store = InMemoryGraphStore::from_fixture(&fixture).await.unwrap();
        assert_eq!(store.len(), 4);

        let graph = store.graph().unwrap();
        assert_eq!(graph.children_ids(), vec!["ctx".to_string()]);

        let building = store.get("b").unwrap();
        assert!(building.belongs_to_context("ctx"));
        assert_eq!(store.get("f").unwrap().node_type(), "node");
        assert!(store.get("ctx").unwrap().has_child_in_context("ctx"));
    }

    #[tokio::test]
    async fn test_fixture_rejects_dangling_edge() {
        let fixture: GraphFixture = serde_json::from_value(json!({
            "graph": { "id": "g", "name": "Site" },
            "edges": [{ "parent": "g", "child": "missing", "relation": "hasPart" }]
        }))
        .unwrap();

        let err = InMemoryGraphStore::from_fixture(&fixture).await.err().unwrap();
        assert_eq!(err, StoreError::node_not_found("missing"));
    }

    #[test]
    fn test_from_json_reports_parse_errors() {
        assert!(matches!(
            GraphFixture::from_json("{ not json"),
            Err(StoreError::Backend(_))
        ));
    }
}
