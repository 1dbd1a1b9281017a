use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entity_id::{EntityId, EntityKind};
use super::metadata::Metadata;
use super::path::ResourcePath;
use super::{CREATED_FIELD, MODIFIED_FIELD, POLICY_ID_FIELD, REVISION_FIELD};

/// Lifecycle of a projected entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Active,
    Deleted,
}

/// Projected state of one entity at one revision
///
/// Produced only by the event application engine. `fields` is a JSON object
/// holding the entity's document without its id field and without the
/// underscore-prefixed bookkeeping fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub kind: EntityKind,
    pub revision: u64,
    pub lifecycle: Lifecycle,
    pub fields: Value,
    pub metadata: Option<Metadata>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

impl EntitySnapshot {
    /// Create an active snapshot from a document
    ///
    /// The id field and bookkeeping fields are stripped from `document`.
    pub fn new(id: EntityId, kind: EntityKind, revision: u64, document: &Value) -> Self {
        Self {
            id,
            kind,
            revision,
            lifecycle: Lifecycle::Active,
            fields: strip_reserved(kind, document),
            metadata: None,
            created: None,
            modified: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    pub fn is_deleted(&self) -> bool {
        self.lifecycle == Lifecycle::Deleted
    }

    /// Field at `path`; the root path yields the whole document
    pub fn field(&self, path: &ResourcePath) -> Option<Value> {
        if path.is_root() {
            return Some(self.to_json());
        }
        path.get_in(&self.to_json()).cloned()
    }

    /// Policy governing this entity
    ///
    /// A Thing names its policy in `policyId`; a Policy governs itself.
    pub fn policy_id(&self) -> Option<EntityId> {
        match self.kind {
            EntityKind::Policy => Some(self.id.clone()),
            EntityKind::Thing => self
                .fields
                .get(POLICY_ID_FIELD)
                .and_then(Value::as_str)
                .and_then(|s| EntityId::parse(s).ok()),
        }
    }

    /// Full document as seen by readers, including id and bookkeeping fields
    pub fn to_json(&self) -> Value {
        let mut document = Map::new();
        document.insert(
            self.kind.id_field().to_string(),
            Value::String(self.id.to_string()),
        );
        if let Value::Object(fields) = &self.fields {
            for (key, value) in fields {
                document.insert(key.clone(), value.clone());
            }
        }
        document.insert(REVISION_FIELD.to_string(), Value::from(self.revision));
        if let Some(created) = self.created {
            document.insert(CREATED_FIELD.to_string(), Value::String(created.to_rfc3339()));
        }
        if let Some(modified) = self.modified {
            document.insert(
                MODIFIED_FIELD.to_string(),
                Value::String(modified.to_rfc3339()),
            );
        }
        Value::Object(document)
    }
}

/// Copy `document` without the id field and reserved bookkeeping fields
///
/// Non-object documents yield an empty object.
pub fn strip_reserved(kind: EntityKind, document: &Value) -> Value {
    let Value::Object(map) = document else {
        return Value::Object(Map::new());
    };
    let fields = map
        .iter()
        .filter(|(key, _)| key.as_str() != kind.id_field() && !key.starts_with('_'))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Value::Object(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn thing() -> EntitySnapshot {
        EntitySnapshot::new(
            EntityId::parse("ns:1").unwrap(),
            EntityKind::Thing,
            3,
            &json!({
                "thingId": "ns:1",
                "policyId": "ns:policy",
                "attributes": {"color": "red"},
                "_revision": 99
            }),
        )
    }

    #[test]
    fn test_new_strips_reserved_fields() {
        let snapshot = thing();
        assert_eq!(
            snapshot.fields,
            json!({"policyId": "ns:policy", "attributes": {"color": "red"}})
        );
        assert!(snapshot.is_active());
    }

    #[test]
    fn test_to_json_adds_id_and_revision() {
        let document = thing().to_json();
        assert_eq!(document["thingId"], json!("ns:1"));
        assert_eq!(document["_revision"], json!(3));
        assert_eq!(document["attributes"]["color"], json!("red"));
        assert!(document.get("_modified").is_none());
    }

    #[test]
    fn test_policy_id() {
        assert_eq!(
            thing().policy_id(),
            Some(EntityId::parse("ns:policy").unwrap())
        );

        let policy = EntitySnapshot::new(
            EntityId::parse("ns:policy").unwrap(),
            EntityKind::Policy,
            1,
            &json!({"entries": {}}),
        );
        assert_eq!(policy.policy_id(), Some(policy.id.clone()));
    }

    #[test]
    fn test_field_lookup() {
        let snapshot = thing();
        let color = ResourcePath::parse("/attributes/color").unwrap();
        assert_eq!(snapshot.field(&color), Some(json!("red")));
        assert_eq!(
            snapshot.field(&ResourcePath::parse("/attributes/size").unwrap()),
            None
        );
        assert_eq!(snapshot.field(&ResourcePath::root()), Some(snapshot.to_json()));
    }
}
