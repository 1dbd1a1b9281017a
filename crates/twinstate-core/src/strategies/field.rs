//! Strategies acting on a single field of an active entity

use serde_json::Value;

use super::{CommandResponse, Outcome, StrategyContext};
use crate::errors::{Result, TwinError};
use crate::events::{Event, EventKind};
use crate::model::{EntityId, EntityKind, POLICY_ID_FIELD};
use crate::rules::validation;

fn field_event(ctx: &StrategyContext<'_>, kind: EventKind) -> Event {
    let command = ctx.command;
    Event::new(
        kind,
        command.entity_kind,
        command.entity_id.clone(),
        ctx.next_revision,
        command.path.clone(),
    )
    .with_timestamp(command.headers.timestamp)
    .with_correlation_id(command.headers.correlation_id.clone())
}

fn is_policy_reference(ctx: &StrategyContext<'_>) -> bool {
    let command = ctx.command;
    command.entity_kind == EntityKind::Thing
        && command.path.len() == 1
        && command.path.first() == Some(POLICY_ID_FIELD)
}

pub(super) fn modify(ctx: &StrategyContext<'_>) -> Result<Outcome> {
    let command = ctx.command;
    let state = ctx.active_state()?;
    validation::check_modifiable(command.entity_kind, &command.entity_id, &command.path)?;
    let value = validation::require_value(command.payload.as_ref(), "field value")?;

    if is_policy_reference(ctx) {
        let reference = value.as_str().ok_or_else(|| TwinError::InvalidPayload {
            reason: "policyId must be a string".to_string(),
        })?;
        EntityId::parse(reference)?;
    }

    let kind = if command.path.exists_in(&state.fields) {
        EventKind::FieldModified
    } else {
        EventKind::FieldCreated
    };
    let event = field_event(ctx, kind)
        .with_payload(value.clone())
        .with_metadata(command.headers.metadata.clone());
    let response = CommandResponse::for_command(command, ctx.next_revision, None);
    Ok(Outcome::Event(event, response))
}

/// Header metadata is not carried onto deletion events
pub(super) fn delete(ctx: &StrategyContext<'_>) -> Result<Outcome> {
    let command = ctx.command;
    let state = ctx.active_state()?;
    validation::check_deletable(command.entity_kind, &command.entity_id, &command.path)?;

    if !command.path.exists_in(&state.fields) {
        return Err(TwinError::FieldNotAccessible {
            entity_id: command.entity_id.to_string(),
            path: command.path.to_string(),
        });
    }

    let event = field_event(ctx, EventKind::FieldDeleted);
    let response = CommandResponse::for_command(command, ctx.next_revision, None);
    Ok(Outcome::Event(event, response))
}

pub(super) fn retrieve(ctx: &StrategyContext<'_>) -> Result<Outcome> {
    let command = ctx.command;
    let state = ctx.active_state()?;
    let value: Value = state
        .field(&command.path)
        .ok_or_else(|| TwinError::FieldNotAccessible {
            entity_id: command.entity_id.to_string(),
            path: command.path.to_string(),
        })?;
    let response = CommandResponse::for_command(command, state.revision, Some(value));
    Ok(Outcome::Query(response))
}
