//! Attribute Bag
//!
//! Node attributes ("info") are a flat mapping from string key to a tagged value.
//! Keys can be added at runtime, so the bag is a map rather than a struct, but every
//! value is one of a small closed set of variants.
//!
//! # Wire Shape
//!
//! `AttrValue` serializes untagged so fixtures stay readable:
//!
//! ```rust
//! use graph_directory::models::{AttrValue, Attributes};
//! use serde_json::json;
//!
//! let attrs: Attributes = serde_json::from_value(json!({
//!     "name": "Floor 1",
//!     "level": 1,
//!     "active": true,
//!     "building": { "ref": "node-123" }
//! }))
//! .unwrap();
//!
//! assert_eq!(attrs["name"], AttrValue::from("Floor 1"));
//! assert_eq!(attrs["building"], AttrValue::reference("node-123"));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute key holding a node's type
pub const TYPE_KEY: &str = "type";

/// Attribute key holding a node's display name
pub const NAME_KEY: &str = "name";

/// Attribute key mirroring the node id inside its info
pub const ID_KEY: &str = "id";

/// Ordered attribute bag. Ordering keeps projections and snapshots deterministic.
pub type Attributes = BTreeMap<String, AttrValue>;

/// Reference to another node by id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    #[serde(rename = "ref")]
    pub id: String,
}

/// A single attribute value
///
/// Variant order matters for untagged deserialization: booleans and numbers are tried
/// before strings, and references are objects of the form `{"ref": "<id>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Reference(NodeRef),
}

impl AttrValue {
    /// Build a reference value pointing at `id`
    pub fn reference(id: impl Into<String>) -> Self {
        AttrValue::Reference(NodeRef { id: id.into() })
    }

    /// Borrow the string payload, if this is a text value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Id of the referenced node, if this is a reference value
    pub fn as_reference(&self) -> Option<&str> {
        match self {
            AttrValue::Reference(r) => Some(&r.id),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Number(n) => write!(f, "{}", n),
            AttrValue::Text(s) => f.write_str(s),
            AttrValue::Reference(r) => write!(f, "@{}", r.id),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Number(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Number(value as f64)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

/// Merge `partial` into `target` without ever deleting keys
///
/// Keys missing from `target` are added and keys whose value differs are overwritten.
/// Returns `true` if `target` changed.
pub fn merge_attributes(target: &mut Attributes, partial: &Attributes) -> bool {
    let mut changed = false;
    for (key, value) in partial {
        match target.get(key) {
            Some(existing) if existing == value => {}
            _ => {
                target.insert(key.clone(), value.clone());
                changed = true;
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_untagged_deserialization_picks_narrowest_variant() {
        let attrs: Attributes = serde_json::from_value(json!({
            "flag": false,
            "count": 3,
            "label": "three",
            "target": { "ref": "abc" }
        }))
        .unwrap();

        assert_eq!(attrs["flag"], AttrValue::Bool(false));
        assert_eq!(attrs["count"], AttrValue::Number(3.0));
        assert_eq!(attrs["label"], AttrValue::Text("three".to_string()));
        assert_eq!(attrs["target"].as_reference(), Some("abc"));
    }

    #[test]
    fn test_reference_serializes_as_ref_object() {
        let value = serde_json::to_value(AttrValue::reference("n-1")).unwrap();
        assert_eq!(value, json!({ "ref": "n-1" }));
    }

    #[test]
    fn test_merge_adds_and_updates_but_never_deletes() {
        let mut target = Attributes::new();
        target.insert("name".into(), "old".into());
        target.insert("kept".into(), true.into());

        let mut partial = Attributes::new();
        partial.insert("name".into(), "new".into());
        partial.insert("extra".into(), 2i64.into());

        assert!(merge_attributes(&mut target, &partial));
        assert_eq!(target["name"], AttrValue::from("new"));
        assert_eq!(target["extra"], AttrValue::Number(2.0));
        assert_eq!(target["kept"], AttrValue::Bool(true));

        // Same values again: nothing to do
        assert!(!merge_attributes(&mut target, &partial));
    }
}
