use serde_json::Value;

use crate::errors::{Result, TwinError};
use crate::model::{
    EntityId, EntityKind, ResourcePath, CREATED_FIELD, MODIFIED_FIELD, POLICY_ID_FIELD,
    REVISION_FIELD,
};

/// Require a command payload to be a JSON object
///
/// # Errors
/// * `InvalidPayload` - If the payload is missing or not an object
pub fn require_object<'a>(payload: Option<&'a Value>, what: &str) -> Result<&'a Value> {
    match payload {
        Some(value) if value.is_object() => Ok(value),
        Some(other) => Err(TwinError::InvalidPayload {
            reason: format!("{} must be a JSON object, got {}", what, json_type(other)),
        }),
        None => Err(TwinError::InvalidPayload {
            reason: format!("{} is required", what),
        }),
    }
}

/// Require a command payload to be present
///
/// # Errors
/// * `InvalidPayload` - If the payload is missing
pub fn require_value<'a>(payload: Option<&'a Value>, what: &str) -> Result<&'a Value> {
    payload.ok_or_else(|| TwinError::InvalidPayload {
        reason: format!("{} is required", what),
    })
}

/// Reject a payload whose id field names a different entity
///
/// # Errors
/// * `InvalidPayload` - If the payload carries a conflicting id
pub fn check_payload_id(kind: EntityKind, id: &EntityId, payload: &Value) -> Result<()> {
    match payload.get(kind.id_field()) {
        None => Ok(()),
        Some(Value::String(s)) if s == &id.to_string() => Ok(()),
        Some(other) => Err(TwinError::InvalidPayload {
            reason: format!(
                "{} {} does not match entity {}",
                kind.id_field(),
                other,
                id
            ),
        }),
    }
}

/// Reject modification of bookkeeping fields and the entity's own id
///
/// # Errors
/// * `NotModifiable` - If `path` addresses a reserved field
pub fn check_modifiable(kind: EntityKind, id: &EntityId, path: &ResourcePath) -> Result<()> {
    let Some(first) = path.first() else {
        return Ok(());
    };
    let reserved = [REVISION_FIELD, CREATED_FIELD, MODIFIED_FIELD, kind.id_field()];
    if reserved.contains(&first) {
        return Err(TwinError::NotModifiable {
            entity_id: id.to_string(),
            path: path.to_string(),
            reason: format!("'{}' is managed by the system", first),
        });
    }
    Ok(())
}

/// Reject deletions that would leave the entity ungoverned
///
/// # Errors
/// * `NotModifiable` - If `path` is a reserved field or a Thing's policy reference
pub fn check_deletable(kind: EntityKind, id: &EntityId, path: &ResourcePath) -> Result<()> {
    check_modifiable(kind, id, path)?;
    if kind == EntityKind::Thing && path.len() == 1 && path.first() == Some(POLICY_ID_FIELD) {
        return Err(TwinError::NotModifiable {
            entity_id: id.to_string(),
            path: path.to_string(),
            reason: "a thing's policy reference cannot be deleted".to_string(),
        });
    }
    Ok(())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
