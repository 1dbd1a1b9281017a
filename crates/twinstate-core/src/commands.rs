use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use twinstate_core_types::CorrelationId;

use crate::model::{EntityId, EntityKind, ResourcePath};

/// Kind of a command issued against an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Create,
    Modify,
    Delete,
    Retrieve,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Create => "create",
            CommandKind::Modify => "modify",
            CommandKind::Delete => "delete",
            CommandKind::Retrieve => "retrieve",
        }
    }

    /// Whether accepting this command produces an event
    pub fn is_mutating(&self) -> bool {
        !matches!(self, CommandKind::Retrieve)
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Headers travelling with a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandHeaders {
    pub correlation_id: CorrelationId,
    /// Metadata patch scoped to the command's path
    pub metadata: Option<Value>,
    /// Revision the caller expects the entity to be at
    pub expected_revision: Option<u64>,
    /// Time stamped onto produced events
    pub timestamp: Option<DateTime<Utc>>,
}

impl CommandHeaders {
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            metadata: None,
            expected_revision: None,
            timestamp: None,
        }
    }
}

impl Default for CommandHeaders {
    fn default() -> Self {
        Self::new(CorrelationId::new())
    }
}

/// Command issued against one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    pub entity_kind: EntityKind,
    pub entity_id: EntityId,
    pub path: ResourcePath,
    pub payload: Option<Value>,
    pub headers: CommandHeaders,
}

impl Command {
    fn build(
        kind: CommandKind,
        entity_kind: EntityKind,
        entity_id: EntityId,
        path: ResourcePath,
        payload: Option<Value>,
    ) -> Self {
        Self {
            kind,
            entity_kind,
            entity_id,
            path,
            payload,
            headers: CommandHeaders::default(),
        }
    }

    /// Create the entity with `document` as its full state
    pub fn create(entity_kind: EntityKind, entity_id: EntityId, document: Value) -> Self {
        Self::build(
            CommandKind::Create,
            entity_kind,
            entity_id,
            ResourcePath::root(),
            Some(document),
        )
    }

    /// Replace the value at `path`; the root path replaces the whole entity
    pub fn modify(
        entity_kind: EntityKind,
        entity_id: EntityId,
        path: ResourcePath,
        value: Value,
    ) -> Self {
        Self::build(CommandKind::Modify, entity_kind, entity_id, path, Some(value))
    }

    /// Delete the value at `path`; the root path deletes the whole entity
    pub fn delete(entity_kind: EntityKind, entity_id: EntityId, path: ResourcePath) -> Self {
        Self::build(CommandKind::Delete, entity_kind, entity_id, path, None)
    }

    /// Read the value at `path`; the root path reads the whole entity
    pub fn retrieve(entity_kind: EntityKind, entity_id: EntityId, path: ResourcePath) -> Self {
        Self::build(CommandKind::Retrieve, entity_kind, entity_id, path, None)
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.headers.correlation_id = correlation_id;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.headers.metadata = Some(metadata);
        self
    }

    pub fn with_expected_revision(mut self, revision: u64) -> Self {
        self.headers.expected_revision = Some(revision);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.headers.timestamp = Some(timestamp);
        self
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.headers.correlation_id
    }
}
