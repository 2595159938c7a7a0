//! Fixture Browser Binary
//!
//! Loads a JSON graph fixture into the in-memory store, wires a `GraphDirectory` over
//! it and prints the type classification of the graph as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Classify everything reachable from the graph root
//! cargo run --bin graph-browse -- fixtures/building.json
//!
//! # Start somewhere else, or stay inside one context
//! cargo run --bin graph-browse -- fixtures/building.json --start b1
//! cargo run --bin graph-browse -- fixtures/building.json --start b1 --context spatial
//!
//! # Only follow some relations
//! cargo run --bin graph-browse -- fixtures/building.json --relations hasFloor,hasRoom
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")
//! - `GRAPH_DIRECTORY_*`: directory configuration (see `DirectoryConfig::from_env`)

use std::env;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use graph_directory::db::{GraphFixture, InMemoryGraphStore};
use graph_directory::{predicate, DirectoryConfig, GraphDirectory};

#[derive(Debug, Default)]
struct Args {
    fixture: String,
    start: Option<String>,
    context: Option<String>,
    relations: Vec<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args::default();
    let mut raw = env::args().skip(1);

    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--start" => args.start = Some(raw.next().context("--start needs a node id")?),
            "--context" => args.context = Some(raw.next().context("--context needs a node id")?),
            "--relations" => {
                let list = raw.next().context("--relations needs a comma-separated list")?;
                args.relations = list
                    .split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            flag if flag.starts_with("--") => bail!("Unknown option {}", flag),
            path if args.fixture.is_empty() => args.fixture = path.to_string(),
            extra => bail!("Unexpected argument {}", extra),
        }
    }

    if args.fixture.is_empty() {
        bail!("Usage: graph-browse <fixture.json> [--start ID] [--context ID] [--relations A,B]");
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = parse_args()?;

    let json = tokio::fs::read_to_string(&args.fixture)
        .await
        .with_context(|| format!("Failed to read fixture {}", args.fixture))?;
    let fixture = GraphFixture::from_json(&json)?;
    let store = Arc::new(InMemoryGraphStore::from_fixture(&fixture).await?);
    tracing::info!("Loaded {} nodes from {}", store.len(), args.fixture);

    let directory = GraphDirectory::with_config(store.clone(), DirectoryConfig::from_env())?;
    let graph = store
        .graph()
        .ok_or_else(|| anyhow!("Fixture {} has no graph", args.fixture))?;
    let graph_id = directory.set_graph(graph);

    let start = args.start.unwrap_or_else(|| graph_id.clone());
    if start != graph_id {
        // Bring the start node into the cache the way a caller would reach it
        let is_start = predicate(|n| n.id() == start.as_str());
        directory
            .find_node(&graph_id, &[], &is_start)
            .await?
            .ok_or_else(|| anyhow!("Node {} is not reachable from the graph root", start))?;
    }

    let classified = match &args.context {
        Some(context) => {
            let is_context = predicate(|n| n.id() == context.as_str());
            directory
                .find_node(&graph_id, &[], &is_context)
                .await?
                .ok_or_else(|| {
                    anyhow!("Context {} is not reachable from the graph root", context)
                })?;
            directory
                .browse_and_classify_by_type_in_context(&start, context)
                .await?
        }
        None => {
            directory
                .browse_and_classify_by_type(&start, &args.relations)
                .await?
        }
    };

    let stats = directory.cache_stats();
    tracing::info!(
        "Classified {} types; {} nodes cached",
        classified.types.len(),
        stats.nodes
    );

    println!("{}", serde_json::to_string_pretty(&classified)?);
    Ok(())
}
