use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::path::ResourcePath;

/// Metadata tree attached to an entity
///
/// Mirrors the shape of the entity's field tree: metadata for
/// `/attributes/color` lives at `/attributes/color` inside this tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Value);

impl Metadata {
    pub fn new() -> Self {
        Self(Value::Object(Map::new()))
    }

    /// Wrap a JSON value, treating non-objects as a single root value
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn get(&self, path: &ResourcePath) -> Option<&Value> {
        path.get_in(&self.0)
    }

    /// Merge `patch` into the tree at `path`
    ///
    /// The subtree at `path` is replaced and intermediate nodes are created;
    /// everything outside `path` is untouched. The root path replaces the
    /// whole tree.
    pub fn merge_at(&mut self, path: &ResourcePath, patch: Value) {
        path.set_in(&mut self.0, patch);
    }

    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Object(map) => map.is_empty(),
            Value::Null => true,
            _ => false,
        }
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Value> for Metadata {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}
