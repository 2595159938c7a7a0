//! Directory Events
//!
//! Broadcast events emitted by `GraphDirectory` after an operation completes. They
//! complement the per-caller listener registries: listeners are synchronous and keyed
//! by caller, events are asynchronous and fan out to any number of receivers.
//!
//! Sends with no receiver are ignored.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DirectoryEvent {
    /// A node entered the cache
    #[serde(rename_all = "camelCase")]
    NodeRegistered { id: String },

    /// A node was removed from the graph
    #[serde(rename_all = "camelCase")]
    NodeRemoved { id: String },

    /// An edge was added
    #[serde(rename_all = "camelCase")]
    ChildAdded {
        parent_id: String,
        child_id: String,
        relation_name: String,
    },

    /// An edge was removed
    #[serde(rename_all = "camelCase")]
    ChildRemoved {
        parent_id: String,
        child_id: String,
        relation_name: String,
    },

    /// Attributes changed through the directory
    #[serde(rename_all = "camelCase")]
    InfoModified { id: String },
}

impl DirectoryEvent {
    /// Stable string name of the event kind
    pub fn event_type(&self) -> &str {
        match self {
            DirectoryEvent::NodeRegistered { .. } => "node:registered",
            DirectoryEvent::NodeRemoved { .. } => "node:removed",
            DirectoryEvent::ChildAdded { .. } => "edge:added",
            DirectoryEvent::ChildRemoved { .. } => "edge:removed",
            DirectoryEvent::InfoModified { .. } => "info:modified",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Contract test: events serialize flat with a `type` discriminator
    #[test]
    fn test_event_serialization_contract() {
        let event = DirectoryEvent::ChildAdded {
            parent_id: "p".to_string(),
            child_id: "c".to_string(),
            relation_name: "hasPart".to_string(),
        };
        let parsed = serde_json::to_value(&event).unwrap();

        assert_eq!(parsed["type"], "childAdded");
        assert_eq!(parsed["parentId"], "p");
        assert_eq!(parsed["childId"], "c");
        assert_eq!(parsed["relationName"], "hasPart");
        assert_eq!(event.event_type(), "edge:added");
    }
}
