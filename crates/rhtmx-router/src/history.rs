//! The router's private namespace inside history entry state
//!
//! History entries carry caller state untouched; the engine only owns the
//! object stored under the configured state key.

use crate::scroll::RegionOffsets;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Engine bookkeeping stored with a history entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryState {
    /// Position of the entry in the history stack
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idx: Option<u64>,

    /// Entry was written without running loaders
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub shallow: bool,

    /// Navigation type that produced the entry
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Offsets captured when the entry was left
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll: Option<RegionOffsets>,
}

impl EntryState {
    /// Read the namespace from an entry's state; anything malformed reads as empty
    pub fn read(state: &Value, key: &str) -> Self {
        state
            .get(key)
            .and_then(|ns| serde_json::from_value(ns.clone()).ok())
            .unwrap_or_default()
    }

    /// Return `state` with the namespace set to `self`
    ///
    /// Other keys are kept. A non-object payload is replaced by an object.
    pub fn write_into(&self, state: &Value, key: &str) -> Value {
        let mut object = match state {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        let ns = serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()));
        object.insert(key.to_string(), ns);
        Value::Object(object)
    }
}
