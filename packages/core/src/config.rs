//! Configuration for the graph directory

use serde::{Deserialize, Serialize};
use std::env;

/// Upper bound for the event channel; larger values only waste memory
const MAX_EVENT_CHANNEL_CAPACITY: usize = 65_536;

/// Runtime knobs of a `GraphDirectory`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Catch panics raised by listeners so the remaining listeners of a fan-out still run
    pub isolate_listener_panics: bool,

    /// Relation under which contexts hang from the graph root
    pub context_relation_name: String,

    /// Capacity of the `DirectoryEvent` broadcast channel
    pub event_channel_capacity: usize,

    /// Deepest level below the start node that searches descend to (None = unbounded)
    pub max_search_depth: Option<usize>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            isolate_listener_panics: false,
            context_relation_name: "hasContext".to_string(),
            event_channel_capacity: 128,
            max_search_depth: None,
        }
    }
}

impl DirectoryConfig {
    /// Defaults overlaid with `GRAPH_DIRECTORY_*` environment variables
    ///
    /// - `GRAPH_DIRECTORY_ISOLATE_LISTENER_PANICS` (`true`/`false`)
    /// - `GRAPH_DIRECTORY_CONTEXT_RELATION`
    /// - `GRAPH_DIRECTORY_EVENT_CAPACITY`
    /// - `GRAPH_DIRECTORY_MAX_SEARCH_DEPTH`
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = read_env("GRAPH_DIRECTORY_ISOLATE_LISTENER_PANICS") {
            config.isolate_listener_panics = v;
        }
        if let Ok(v) = env::var("GRAPH_DIRECTORY_CONTEXT_RELATION") {
            config.context_relation_name = v;
        }
        if let Some(v) = read_env("GRAPH_DIRECTORY_EVENT_CAPACITY") {
            config.event_channel_capacity = v;
        }
        if let Some(v) = read_env("GRAPH_DIRECTORY_MAX_SEARCH_DEPTH") {
            config.max_search_depth = Some(v);
        }

        config
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.context_relation_name.trim().is_empty() {
            return Err("context_relation_name cannot be empty".to_string());
        }

        if self.event_channel_capacity == 0 {
            return Err("event_channel_capacity must be greater than 0".to_string());
        }

        if self.event_channel_capacity > MAX_EVENT_CHANNEL_CAPACITY {
            return Err(format!(
                "event_channel_capacity cannot exceed {}",
                MAX_EVENT_CHANNEL_CAPACITY
            ));
        }

        Ok(())
    }
}

fn read_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {}={:?}", key, raw);
            None
        }
    }
}
