use serde::{Deserialize, Serialize};

use crate::errors::{Result, TwinError};

/// Namespaced identifier of a digital-twin entity, written `namespace:name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    namespace: String,
    name: String,
}

impl EntityId {
    /// Build an id from its two parts
    ///
    /// # Errors
    /// * `InvalidEntityId` - If either part is empty or the name contains `/`
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let name = name.into();

        if namespace.trim().is_empty() {
            return Err(TwinError::InvalidEntityId {
                value: format!("{}:{}", namespace, name),
                reason: "namespace cannot be empty".to_string(),
            });
        }
        if name.trim().is_empty() {
            return Err(TwinError::InvalidEntityId {
                value: format!("{}:{}", namespace, name),
                reason: "name cannot be empty".to_string(),
            });
        }
        if name.contains('/') {
            return Err(TwinError::InvalidEntityId {
                value: format!("{}:{}", namespace, name),
                reason: "name cannot contain '/'".to_string(),
            });
        }

        Ok(Self { namespace, name })
    }

    /// Parse an id of the form `namespace:name`
    ///
    /// The namespace ends at the first `:`; the name may contain further colons.
    ///
    /// # Errors
    /// * `InvalidEntityId` - If the separator is missing or a part is invalid
    pub fn parse(value: &str) -> Result<Self> {
        let (namespace, name) =
            value
                .split_once(':')
                .ok_or_else(|| TwinError::InvalidEntityId {
                    value: value.to_string(),
                    reason: "expected 'namespace:name'".to_string(),
                })?;
        Self::new(namespace, name)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

impl std::str::FromStr for EntityId {
    type Err = TwinError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EntityId {
    type Error = TwinError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}

/// Kind of digital-twin entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Thing,
    Policy,
}

impl EntityKind {
    /// Resource type used in cache keys and error context
    pub fn resource_type(&self) -> &'static str {
        match self {
            EntityKind::Thing => "thing",
            EntityKind::Policy => "policy",
        }
    }

    /// Prefix of the type tag of events emitted for this kind
    pub fn event_prefix(&self) -> &'static str {
        match self {
            EntityKind::Thing => "things.events",
            EntityKind::Policy => "policies.events",
        }
    }

    /// Name of the field carrying the entity's own id in its document
    pub fn id_field(&self) -> &'static str {
        match self {
            EntityKind::Thing => "thingId",
            EntityKind::Policy => "policyId",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.resource_type())
    }
}
