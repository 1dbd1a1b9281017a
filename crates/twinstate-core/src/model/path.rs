//! Resource paths addressing a location inside an entity's field tree
//!
//! A path is written like a JSON pointer (`/attributes/color`). The empty
//! path (`""` or `"/"`) addresses the whole entity.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, TwinError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourcePath {
    segments: Vec<String>,
}

impl ResourcePath {
    /// The empty path addressing the whole entity
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a slash-separated path
    ///
    /// A leading `/` is optional and a single trailing `/` is ignored.
    ///
    /// # Errors
    /// * `InvalidPath` - If the path contains an empty segment (`/a//b`)
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.strip_prefix('/').unwrap_or(value);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            if segment.is_empty() {
                return Err(TwinError::InvalidPath {
                    value: value.to_string(),
                    reason: "path contains an empty segment".to_string(),
                });
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Path without its last segment; `None` for the root path
    pub fn parent(&self) -> Option<ResourcePath> {
        let (_, parent) = self.segments.split_last()?;
        Some(Self {
            segments: parent.to_vec(),
        })
    }

    /// New path with `segment` appended
    ///
    /// A segment containing `/` is split so the result stays well formed.
    pub fn append(&self, segment: &str) -> ResourcePath {
        let mut segments = self.segments.clone();
        segments.extend(
            segment
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        Self { segments }
    }

    /// Value at this path inside `tree`, if every segment resolves to an object member
    pub fn get_in<'a>(&self, tree: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(tree, |node, segment| node.as_object()?.get(segment))
    }

    pub fn exists_in(&self, tree: &Value) -> bool {
        self.get_in(tree).is_some()
    }

    /// Write `value` at this path, creating intermediate objects as needed
    ///
    /// Intermediate nodes that are not objects are replaced by objects. The
    /// root path replaces the whole tree.
    pub fn set_in(&self, tree: &mut Value, value: Value) {
        write_at(tree, &self.segments, value);
    }

    /// Remove and return the value at this path
    ///
    /// Returns `None` if the path does not resolve or is the root path.
    pub fn remove_in(&self, tree: &mut Value) -> Option<Value> {
        remove_at(tree, &self.segments)
    }
}

fn write_at(node: &mut Value, segments: &[String], value: Value) {
    match segments.split_first() {
        None => *node = value,
        Some((head, rest)) => {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            if let Value::Object(map) = node {
                let child = map.entry(head.clone()).or_insert(Value::Null);
                write_at(child, rest, value);
            }
        }
    }
}

fn remove_at(node: &mut Value, segments: &[String]) -> Option<Value> {
    let (head, rest) = segments.split_first()?;
    let map = node.as_object_mut()?;
    if rest.is_empty() {
        map.remove(head)
    } else {
        remove_at(map.get_mut(head)?, rest)
    }
}

impl std::fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ResourcePath {
    type Err = TwinError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ResourcePath {
    type Error = TwinError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ResourcePath> for String {
    fn from(path: ResourcePath) -> Self {
        path.to_string()
    }
}
