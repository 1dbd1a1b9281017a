//! Event application engine
//!
//! Folds events into entity snapshots. Application is a pure function of the
//! event, the prior snapshot and the target revision; sequencing is the
//! caller's concern.
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use twinstate_core::events::{Event, EventKind};
//! use twinstate_core::model::{EntityId, EntityKind, ResourcePath};
//! use twinstate_core::apply_event;
//!
//! let id = EntityId::parse("ns:1").unwrap();
//! let created = Event::new(EventKind::Created, EntityKind::Thing, id.clone(), 1, ResourcePath::root())
//!     .with_payload(json!({"attributes": {"color": "red"}}));
//! let state = apply_event(&created, None).unwrap();
//! assert_eq!(state.revision, 1);
//! ```

use crate::events::{Event, EventKind};
use crate::model::{snapshot::strip_reserved, EntitySnapshot, Lifecycle, Metadata};

type EventHandler = fn(&Event, EntitySnapshot) -> EntitySnapshot;

/// Apply `event` to `current`, producing the snapshot at `revision`
///
/// Absent state stays absent: only [`apply_event`] can bring an entity into
/// existence. Unknown kinds, and anything but re-creation on a deleted
/// entity, still move the revision forward but leave the fields alone.
pub fn apply(event: &Event, current: Option<EntitySnapshot>, revision: u64) -> Option<EntitySnapshot> {
    let prior = current?;
    let handler = handler_for(&prior, &event.kind);

    let mut next = prior;
    next.revision = revision;
    next.modified = event.timestamp;
    next.metadata = merge_metadata(next.metadata.take(), event);
    Some(handler(event, next))
}

/// Entry point applying any event, including creation
///
/// A creation event builds a fresh snapshot from its own payload; every
/// other event goes through [`apply`] at the event's revision.
pub fn apply_event(event: &Event, current: Option<EntitySnapshot>) -> Option<EntitySnapshot> {
    match event.kind {
        EventKind::Created => Some(created(event)),
        _ => apply(event, current, event.revision),
    }
}

/// Fold a sequence of events starting from absent state
pub fn replay<'a, I>(events: I) -> Option<EntitySnapshot>
where
    I: IntoIterator<Item = &'a Event>,
{
    events
        .into_iter()
        .fold(None, |state, event| apply_event(event, state))
}

/// Merge the event's metadata patch into the prior metadata tree
///
/// A patch at the root path replaces the tree; a scoped patch is written at
/// the event's path; without a patch the prior tree is kept.
pub fn merge_metadata(prior: Option<Metadata>, event: &Event) -> Option<Metadata> {
    let Some(patch) = event.metadata.clone() else {
        return prior;
    };
    if event.path.is_root() {
        return Some(Metadata::from(patch));
    }
    let mut metadata = prior.unwrap_or_default();
    metadata.merge_at(&event.path, patch);
    Some(metadata)
}

fn created(event: &Event) -> EntitySnapshot {
    let document = event.payload.clone().unwrap_or_default();
    let mut snapshot = EntitySnapshot::new(
        event.entity_id.clone(),
        event.entity_kind,
        event.revision,
        &document,
    );
    snapshot.created = event.timestamp;
    snapshot.modified = event.timestamp;
    snapshot.metadata = event.metadata.clone().map(Metadata::from);
    snapshot
}

fn handler_for(state: &EntitySnapshot, kind: &EventKind) -> EventHandler {
    // A deleted entity only accepts re-creation
    if state.is_deleted() && !matches!(kind, EventKind::Created) {
        return unchanged;
    }
    match kind {
        EventKind::Created | EventKind::Modified => replace_fields,
        EventKind::Deleted => mark_deleted,
        EventKind::FieldCreated | EventKind::FieldModified => write_field,
        EventKind::FieldDeleted => remove_field,
        EventKind::Other(_) => unchanged,
    }
}

fn unchanged(event: &Event, state: EntitySnapshot) -> EntitySnapshot {
    tracing::debug!(
        entity_id = %state.id,
        event_type = %event.type_tag(),
        revision = state.revision,
        "event carries no field changes"
    );
    state
}

fn replace_fields(event: &Event, mut state: EntitySnapshot) -> EntitySnapshot {
    if let Some(document) = &event.payload {
        state.fields = strip_reserved(state.kind, document);
    }
    state.lifecycle = Lifecycle::Active;
    state
}

fn mark_deleted(_: &Event, mut state: EntitySnapshot) -> EntitySnapshot {
    state.lifecycle = Lifecycle::Deleted;
    state
}

fn write_field(event: &Event, mut state: EntitySnapshot) -> EntitySnapshot {
    let value = event.payload.clone().unwrap_or_default();
    event.path.set_in(&mut state.fields, value);
    state
}

fn remove_field(event: &Event, mut state: EntitySnapshot) -> EntitySnapshot {
    event.path.remove_in(&mut state.fields);
    state
}
