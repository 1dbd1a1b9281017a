use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::path::ResourcePath;
use super::{POLICY_ID_FIELD, REVISION_FIELD};
use crate::errors::Result;

/// Set of resource paths selecting a partial view of an entity
///
/// Paths are kept ordered so equal selections compare and hash equal
/// regardless of the order they were given in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldSelector {
    paths: BTreeSet<ResourcePath>,
}

impl FieldSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-separated list such as `attributes/color,features/f1`
    ///
    /// # Errors
    /// * `InvalidPath` - If any listed path is malformed
    pub fn parse(value: &str) -> Result<Self> {
        let mut selector = Self::new();
        for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            selector.paths.insert(ResourcePath::parse(part)?);
        }
        Ok(selector)
    }

    pub fn with(mut self, path: ResourcePath) -> Self {
        self.paths.insert(path);
        self
    }

    pub fn paths(&self) -> impl Iterator<Item = &ResourcePath> {
        self.paths.iter()
    }

    pub fn contains(&self, path: &ResourcePath) -> bool {
        self.paths.contains(path)
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Selector extended with the bookkeeping fields every cached projection carries
    pub fn augmented(&self) -> Self {
        self.clone()
            .with(ResourcePath::root().append(POLICY_ID_FIELD))
            .with(ResourcePath::root().append(REVISION_FIELD))
    }

    /// Copy only the selected paths of `source` into a new object
    ///
    /// Selected paths missing from `source` are left out.
    pub fn select(&self, source: &Value) -> Value {
        let mut selected = Value::Object(Map::new());
        for path in &self.paths {
            if let Some(value) = path.get_in(source) {
                path.set_in(&mut selected, value.clone());
            }
        }
        selected
    }
}

impl std::fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .paths
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&joined)
    }
}

impl FromIterator<ResourcePath> for FieldSelector {
    fn from_iter<T: IntoIterator<Item = ResourcePath>>(iter: T) -> Self {
        Self {
            paths: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_is_order_insensitive() {
        let a = FieldSelector::parse("attributes/color, features/f1").unwrap();
        let b = FieldSelector::parse("/features/f1,/attributes/color").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "/attributes/color,/features/f1");
    }

    #[test]
    fn test_augmented_adds_bookkeeping_fields() {
        let selector = FieldSelector::parse("attributes/color").unwrap().augmented();
        assert!(selector.contains(&ResourcePath::parse("/policyId").unwrap()));
        assert!(selector.contains(&ResourcePath::parse("/_revision").unwrap()));
        assert!(selector.contains(&ResourcePath::parse("/attributes/color").unwrap()));
    }

    #[test]
    fn test_select_copies_only_selected_paths() {
        let source = json!({
            "policyId": "ns:p",
            "_revision": 4,
            "attributes": {"color": "red", "size": 3},
            "features": {}
        });
        let selector = FieldSelector::parse("attributes/color,attributes/missing").unwrap();
        assert_eq!(
            selector.select(&source),
            json!({"attributes": {"color": "red"}})
        );
    }
}
