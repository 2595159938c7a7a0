//! Shared fixture helpers for the integration tests

#![allow(dead_code)]

use anyhow::Result;
use graph_directory::db::{GraphFixture, InMemoryGraphStore};
use graph_directory::models::{AttrValue, Attributes, GraphNode, NodeInfo};
use graph_directory::GraphDirectory;
use std::sync::Arc;

pub const LINK: &str = "Link";
pub const REF: &str = "Ref";

/// Two branches of typed nodes hanging from a plain root node
///
/// ```text
/// g -hasRoot-> root(X) -Link-> a(X) -Link-> c(X)
///                      -Link-> b(Y) -Link-> d(Y)
/// ```
pub const CLASSIFICATION: &str = r#"{
    "graph": { "id": "g", "name": "Classification" },
    "nodes": [
        { "id": "root", "info": { "name": "Root", "type": "X" } },
        { "id": "a", "info": { "name": "A", "type": "X" } },
        { "id": "b", "info": { "name": "B", "type": "Y" } },
        { "id": "c", "info": { "name": "C", "type": "X" } },
        { "id": "d", "info": { "name": "D", "type": "Y" } }
    ],
    "edges": [
        { "parent": "g", "child": "root", "relation": "hasRoot" },
        { "parent": "root", "child": "a", "relation": "Link" },
        { "parent": "root", "child": "b", "relation": "Link" },
        { "parent": "a", "child": "c", "relation": "Link" },
        { "parent": "b", "child": "d", "relation": "Link" }
    ]
}"#;

/// A context `c1` tagging part of a small tree
///
/// ```text
/// g -hasContext-> c1
/// g -hasRoot-> p(X) -Link[c1]-> q(X) -Link[c1]-> r(Y)
///                   -Link-----> s(X)
///                   -Part-----> t(Z)
/// ```
pub const CONTEXTUAL: &str = r#"{
    "graph": { "id": "g", "name": "Contextual" },
    "contexts": [{ "id": "c1", "info": { "name": "Spatial", "type": "geographicContext" } }],
    "nodes": [
        { "id": "p", "info": { "name": "P", "type": "X" } },
        { "id": "q", "info": { "name": "Q", "type": "X" } },
        { "id": "r", "info": { "name": "R", "type": "Y" } },
        { "id": "s", "info": { "name": "S", "type": "X" } },
        { "id": "t", "info": { "name": "T", "type": "Z" } }
    ],
    "edges": [
        { "parent": "g", "child": "p", "relation": "hasRoot" },
        { "parent": "p", "child": "q", "relation": "Link", "context": "c1" },
        { "parent": "q", "child": "r", "relation": "Link", "context": "c1" },
        { "parent": "p", "child": "s", "relation": "Link" },
        { "parent": "p", "child": "t", "relation": "Part" }
    ]
}"#;

/// Directory over a fresh store holding only an empty graph, set as current
pub async fn empty_directory() -> Result<(GraphDirectory, Arc<InMemoryGraphStore>)> {
    let store = Arc::new(InMemoryGraphStore::new());
    let graph = store.create_graph("Test").await?;
    let directory = GraphDirectory::new(store.clone());
    directory.set_graph(graph);
    Ok((directory, store))
}

/// Directory over `fixture`, with the graph set and its direct children registered
pub async fn fixture_directory(fixture: &str) -> Result<(GraphDirectory, Arc<InMemoryGraphStore>)> {
    let fixture = GraphFixture::from_json(fixture)?;
    let store = Arc::new(InMemoryGraphStore::from_fixture(&fixture).await?);
    let directory = GraphDirectory::new(store.clone());
    let graph_id = directory.set_graph(
        store
            .graph()
            .ok_or_else(|| anyhow::anyhow!("fixture has no graph"))?,
    );
    directory.get_children(&graph_id, &[]).await?;
    Ok((directory, store))
}

pub fn attrs(pairs: &[(&str, &str)]) -> Attributes {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), AttrValue::from(*v)))
        .collect()
}

pub fn names(relations: &[&str]) -> Vec<String> {
    relations.iter().map(|r| r.to_string()).collect()
}

pub fn info_ids(infos: &[Arc<NodeInfo>]) -> Vec<String> {
    infos.iter().map(|i| i.id().to_string()).collect()
}

pub fn node_ids(nodes: &[Arc<GraphNode>]) -> Vec<String> {
    nodes.iter().map(|n| n.id().to_string()).collect()
}
