use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use twinstate_core_types::CorrelationId;

use crate::model::{EntityId, EntityKind, ResourcePath};

/// Kind of change an event records
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Modified,
    Deleted,
    FieldCreated,
    FieldModified,
    FieldDeleted,
    /// Event kind this version does not know how to apply
    Other(String),
}

impl EventKind {
    /// Events replacing or removing the entity as a whole
    pub fn is_whole_entity(&self) -> bool {
        matches!(
            self,
            EventKind::Created | EventKind::Modified | EventKind::Deleted
        )
    }

    fn verb(&self) -> &'static str {
        match self {
            EventKind::Created | EventKind::FieldCreated => "Created",
            EventKind::Modified | EventKind::FieldModified => "Modified",
            EventKind::Deleted | EventKind::FieldDeleted => "Deleted",
            EventKind::Other(_) => "",
        }
    }
}

/// Immutable record of one accepted change to an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub entity_kind: EntityKind,
    pub entity_id: EntityId,
    /// Revision the entity is at after this event
    pub revision: u64,
    pub path: ResourcePath,
    pub payload: Option<Value>,
    pub timestamp: Option<DateTime<Utc>>,
    /// Metadata patch scoped to `path`
    pub metadata: Option<Value>,
    pub correlation_id: CorrelationId,
}

impl Event {
    pub fn new(
        kind: EventKind,
        entity_kind: EntityKind,
        entity_id: EntityId,
        revision: u64,
        path: ResourcePath,
    ) -> Self {
        Self {
            kind,
            entity_kind,
            entity_id,
            revision,
            path,
            payload: None,
            timestamp: None,
            metadata: None,
            correlation_id: CorrelationId::new(),
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_timestamp(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_metadata(mut self, metadata: Option<Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn is_whole_entity(&self) -> bool {
        self.kind.is_whole_entity()
    }

    /// Stable type tag such as `things.events:attributeModified`
    ///
    /// Unknown kinds report the tag they were received with.
    pub fn type_tag(&self) -> String {
        if let EventKind::Other(tag) = &self.kind {
            return tag.clone();
        }
        let noun = if self.kind.is_whole_entity() {
            self.entity_kind.resource_type()
        } else {
            field_noun(self.entity_kind, &self.path)
        };
        format!(
            "{}:{}{}",
            self.entity_kind.event_prefix(),
            noun,
            self.kind.verb()
        )
    }
}

/// Name of the resource a scoped event touches
fn field_noun(kind: EntityKind, path: &ResourcePath) -> &'static str {
    let segments: Vec<&str> = path.segments().iter().map(String::as_str).collect();
    match (kind, segments.as_slice()) {
        (_, []) => kind.resource_type(),
        (EntityKind::Thing, ["policyId"]) => "policyId",
        (EntityKind::Thing, ["definition"]) => "definition",
        (EntityKind::Thing, ["attributes"]) => "attributes",
        (EntityKind::Thing, ["attributes", ..]) => "attribute",
        (EntityKind::Thing, ["features"]) => "features",
        (EntityKind::Thing, ["features", _]) => "feature",
        (EntityKind::Thing, ["features", _, "definition"]) => "featureDefinition",
        (EntityKind::Thing, ["features", _, "properties"]) => "featureProperties",
        (EntityKind::Thing, ["features", _, "properties", ..]) => "featureProperty",
        (EntityKind::Thing, ["features", _, "desiredProperties"]) => "featureDesiredProperties",
        (EntityKind::Thing, ["features", _, "desiredProperties", ..]) => "featureDesiredProperty",
        (EntityKind::Policy, ["entries"]) => "policyEntries",
        (EntityKind::Policy, ["entries", _]) => "policyEntry",
        (EntityKind::Policy, ["entries", _, "subjects"]) => "subjects",
        (EntityKind::Policy, ["entries", _, "subjects", _]) => "subject",
        (EntityKind::Policy, ["entries", _, "resources"]) => "resources",
        (EntityKind::Policy, ["entries", _, "resources", ..]) => "resource",
        _ => "field",
    }
}
