use serde_json::{json, Value};
use twinstate_core::rules::revision;
use twinstate_core::{
    apply_event, dispatch, Command, DispatchResult, EntityId, EntityKind, EntitySnapshot, Event,
    ResourcePath,
};

/// Id of the thing most tests operate on
#[allow(dead_code)]
pub fn thing_id() -> EntityId {
    EntityId::parse("ns:1").expect("valid id")
}

#[allow(dead_code)]
pub fn path(s: &str) -> ResourcePath {
    ResourcePath::parse(s).expect("valid path")
}

/// Document used to create the test thing
#[allow(dead_code)]
pub fn thing_document() -> Value {
    json!({
        "policyId": "ns:policy",
        "attributes": {"color": "red", "size": 3},
        "features": {
            "lamp": {"properties": {"on": false}}
        }
    })
}

/// Dispatch `command` against `state` and fold any produced event into it
///
/// Returns the dispatch result together with the resulting state.
#[allow(dead_code)]
pub fn commit(
    state: Option<EntitySnapshot>,
    command: &Command,
) -> (DispatchResult, Option<EntitySnapshot>) {
    let next_revision = revision::next_revision(state.as_ref());
    let result = dispatch(state.as_ref(), command, next_revision);
    let next = match result.event() {
        Some(event) => apply_event(event, state),
        None => state,
    };
    (result, next)
}

/// Create the test thing and return its snapshot and creation event
#[allow(dead_code)]
pub fn created_thing() -> (EntitySnapshot, Event) {
    let command = Command::create(EntityKind::Thing, thing_id(), thing_document());
    let (result, state) = commit(None, &command);
    let event = result.event().cloned().expect("creation accepted");
    (state.expect("thing exists"), event)
}
