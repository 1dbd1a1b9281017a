//! Strategies acting on an entity as a whole

use serde_json::Value;

use super::{CommandResponse, Outcome, StrategyContext};
use crate::errors::{Result, TwinError};
use crate::events::{Event, EventKind};
use crate::model::EntityKind;
use crate::rules::validation;

/// Document stored in a whole-entity event: the payload with the id field set
fn event_document(kind: EntityKind, ctx: &StrategyContext<'_>, payload: &Value) -> Value {
    let mut document = payload.clone();
    if let Value::Object(map) = &mut document {
        map.insert(
            kind.id_field().to_string(),
            Value::String(ctx.command.entity_id.to_string()),
        );
    }
    document
}

fn whole_entity_event(ctx: &StrategyContext<'_>, kind: EventKind) -> Event {
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

pub(super) fn create(ctx: &StrategyContext<'_>) -> Result<Outcome> {
    let command = ctx.command;
    let payload = validation::require_object(command.payload.as_ref(), "entity document")?;
    validation::check_payload_id(command.entity_kind, &command.entity_id, payload)?;

    let document = event_document(command.entity_kind, ctx, payload);
    let event = whole_entity_event(ctx, EventKind::Created)
        .with_payload(document.clone())
        .with_metadata(command.headers.metadata.clone());
    let response = CommandResponse::for_command(command, ctx.next_revision, Some(document));
    Ok(Outcome::Event(event, response))
}

/// Creation is never idempotent: an existing entity always conflicts
pub(super) fn conflict(ctx: &StrategyContext<'_>) -> Result<Outcome> {
    Err(TwinError::Conflict {
        entity_id: ctx.command.entity_id.to_string(),
    })
}

pub(super) fn modify(ctx: &StrategyContext<'_>) -> Result<Outcome> {
    let command = ctx.command;
    ctx.active_state()?;
    let payload = validation::require_object(command.payload.as_ref(), "entity document")?;
    validation::check_payload_id(command.entity_kind, &command.entity_id, payload)?;

    let document = event_document(command.entity_kind, ctx, payload);
    let event = whole_entity_event(ctx, EventKind::Modified)
        .with_payload(document)
        .with_metadata(command.headers.metadata.clone());
    let response = CommandResponse::for_command(command, ctx.next_revision, None);
    Ok(Outcome::Event(event, response))
}

/// Header metadata is not carried onto deletion events
pub(super) fn delete(ctx: &StrategyContext<'_>) -> Result<Outcome> {
    ctx.active_state()?;
    let event = whole_entity_event(ctx, EventKind::Deleted);
    let response = CommandResponse::for_command(ctx.command, ctx.next_revision, None);
    Ok(Outcome::Event(event, response))
}

pub(super) fn not_found(ctx: &StrategyContext<'_>) -> Result<Outcome> {
    Err(TwinError::EntityNotFound {
        entity_id: ctx.command.entity_id.to_string(),
    })
}
