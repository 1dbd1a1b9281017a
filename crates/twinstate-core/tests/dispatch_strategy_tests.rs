#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{commit, created_thing, path, thing_document, thing_id};
use serde_json::json;
use twinstate_core::strategies::{dispatch_with, Strategy, STRATEGIES};
use twinstate_core::{
    dispatch, Command, CommandKind, DispatchResult, EntityKind, EventKind, ExErrorKind,
    ResourcePath,
};
use twinstate_core_types::CorrelationId;

fn error_kind(result: &DispatchResult) -> ExErrorKind {
    match result {
        DispatchResult::Error(response) => response.kind(),
        other => panic!("expected error, got {:?}", other),
    }
}

#[test]
fn test_create_produces_created_event_at_next_revision() {
    // GIVEN no prior state
    let command = Command::create(EntityKind::Thing, thing_id(), thing_document());

    // WHEN dispatching a create command
    let result = dispatch(None, &command, 1);

    // THEN a Created event at revision 1 carries the document with its id
    let event = result.event().expect("event produced");
    assert_eq!(event.kind, EventKind::Created);
    assert_eq!(event.revision, 1);
    assert_eq!(event.payload.as_ref().unwrap()["thingId"], json!("ns:1"));
    assert_eq!(event.type_tag(), "things.events:thingCreated");
    assert_eq!(result.response().unwrap().revision, 1);
}

#[test]
fn test_create_rejects_non_object_payload() {
    let command = Command::create(EntityKind::Thing, thing_id(), json!("not an object"));
    let result = dispatch(None, &command, 1);
    assert_eq!(error_kind(&result), ExErrorKind::InvalidInput);
}

#[test]
fn test_create_against_existing_entity_conflicts_even_for_identical_payload() {
    // GIVEN an existing thing
    let (state, _) = created_thing();

    // WHEN creating it again with the very same document
    let command = Command::create(EntityKind::Thing, thing_id(), thing_document());
    let result = dispatch(Some(&state), &command, state.revision + 1);

    // THEN the command conflicts and no event is produced
    assert_eq!(error_kind(&result), ExErrorKind::Conflict);
    assert!(result.event().is_none());
}

#[test]
fn test_modify_field_distinguishes_created_and_modified() {
    let (state, _) = created_thing();

    let existing = Command::modify(EntityKind::Thing, thing_id(), path("/attributes/color"), json!("blue"));
    let result = dispatch(Some(&state), &existing, 2);
    let event = result.event().unwrap();
    assert_eq!(event.kind, EventKind::FieldModified);
    assert_eq!(event.type_tag(), "things.events:attributeModified");
    assert_eq!(event.payload, Some(json!("blue")));

    let fresh = Command::modify(EntityKind::Thing, thing_id(), path("/attributes/weight"), json!(7));
    let result = dispatch(Some(&state), &fresh, 2);
    assert_eq!(result.event().unwrap().kind, EventKind::FieldCreated);
}

#[test]
fn test_modify_whole_entity_requires_object() {
    let (state, _) = created_thing();

    let ok = Command::modify(EntityKind::Thing, thing_id(), ResourcePath::root(), json!({"attributes": {}}));
    let result = dispatch(Some(&state), &ok, 2);
    assert_eq!(result.event().unwrap().kind, EventKind::Modified);

    let bad = Command::modify(EntityKind::Thing, thing_id(), ResourcePath::root(), json!([1, 2]));
    assert_eq!(error_kind(&dispatch(Some(&state), &bad, 2)), ExErrorKind::InvalidInput);
}

#[test]
fn test_delete_field_present_and_absent() {
    let (state, _) = created_thing();

    let present = Command::delete(EntityKind::Thing, thing_id(), path("/features/lamp"));
    let result = dispatch(Some(&state), &present, 2);
    assert_eq!(result.event().unwrap().kind, EventKind::FieldDeleted);
    assert_eq!(result.event().unwrap().type_tag(), "things.events:featureDeleted");

    let absent = Command::delete(EntityKind::Thing, thing_id(), path("/features/fan"));
    let result = dispatch(Some(&state), &absent, 2);
    assert_eq!(error_kind(&result), ExErrorKind::NotAccessible);
}

#[test]
fn test_delete_ignores_header_metadata() {
    // GIVEN a thing and a delete command carrying a metadata patch
    let (state, _) = created_thing();
    let command = Command::delete(EntityKind::Thing, thing_id(), path("/features/lamp"))
        .with_metadata(json!({"issuedBy": "ops"}));

    // WHEN dispatching
    let result = dispatch(Some(&state), &command, 2);

    // THEN the event carries no metadata
    assert_eq!(result.event().unwrap().metadata, None);
}

#[test]
fn test_modify_carries_header_metadata() {
    let (state, _) = created_thing();
    let command = Command::modify(EntityKind::Thing, thing_id(), path("/attributes/color"), json!("green"))
        .with_metadata(json!({"source": "sensor"}));
    let result = dispatch(Some(&state), &command, 2);
    assert_eq!(result.event().unwrap().metadata, Some(json!({"source": "sensor"})));
}

#[test]
fn test_reserved_paths_are_not_modifiable() {
    let (state, _) = created_thing();
    for reserved in ["/_revision", "/_modified", "/_created", "/thingId"] {
        let command = Command::modify(EntityKind::Thing, thing_id(), path(reserved), json!(1));
        assert_eq!(
            error_kind(&dispatch(Some(&state), &command, 2)),
            ExErrorKind::NotModifiable,
            "modify {}",
            reserved
        );
    }

    let delete_policy = Command::delete(EntityKind::Thing, thing_id(), path("/policyId"));
    assert_eq!(
        error_kind(&dispatch(Some(&state), &delete_policy, 2)),
        ExErrorKind::NotModifiable
    );
}

#[test]
fn test_policy_reference_must_be_an_entity_id() {
    let (state, _) = created_thing();
    let command = Command::modify(EntityKind::Thing, thing_id(), path("/policyId"), json!(42));
    assert_eq!(error_kind(&dispatch(Some(&state), &command, 2)), ExErrorKind::InvalidInput);

    let command = Command::modify(EntityKind::Thing, thing_id(), path("/policyId"), json!("ns:other"));
    let event = dispatch(Some(&state), &command, 2).event().cloned().unwrap();
    assert_eq!(event.type_tag(), "things.events:policyIdModified");
}

#[test]
fn test_expected_revision_precondition() {
    let (state, _) = created_thing();

    let stale = Command::modify(EntityKind::Thing, thing_id(), path("/attributes/color"), json!("blue"))
        .with_expected_revision(7);
    assert_eq!(
        error_kind(&dispatch(Some(&state), &stale, 2)),
        ExErrorKind::PreconditionFailed
    );

    let matching = Command::modify(EntityKind::Thing, thing_id(), path("/attributes/color"), json!("blue"))
        .with_expected_revision(1);
    assert!(dispatch(Some(&state), &matching, 2).is_success());
}

#[test]
fn test_non_create_commands_on_absent_entity_are_not_found() {
    let commands = [
        Command::modify(EntityKind::Thing, thing_id(), path("/attributes/a"), json!(1)),
        Command::delete(EntityKind::Thing, thing_id(), ResourcePath::root()),
        Command::retrieve(EntityKind::Thing, thing_id(), ResourcePath::root()),
    ];
    for command in &commands {
        assert_eq!(error_kind(&dispatch(None, command, 1)), ExErrorKind::NotFound);
    }
}

#[test]
fn test_deleted_entity_is_absent_and_can_be_recreated() {
    // GIVEN a thing that has been deleted
    let (state, _) = created_thing();
    let (_, state) = commit(
        Some(state),
        &Command::delete(EntityKind::Thing, thing_id(), ResourcePath::root()),
    );
    let state = state.unwrap();
    assert!(state.is_deleted());

    // WHEN retrieving it
    let retrieve = Command::retrieve(EntityKind::Thing, thing_id(), ResourcePath::root());
    let (result, state) = commit(Some(state), &retrieve);

    // THEN it is not found
    assert_eq!(error_kind(&result), ExErrorKind::NotFound);

    // AND a re-create continues the revision sequence
    let (result, state) = commit(
        state,
        &Command::create(EntityKind::Thing, thing_id(), json!({"attributes": {}})),
    );
    assert_eq!(result.event().unwrap().revision, 3);
    assert!(state.unwrap().is_active());
}

#[test]
fn test_retrieve_returns_field_or_not_accessible() {
    let (state, _) = created_thing();

    let found = Command::retrieve(EntityKind::Thing, thing_id(), path("/attributes/color"));
    match dispatch(Some(&state), &found, 2) {
        DispatchResult::Query { response } => {
            assert_eq!(response.payload, Some(json!("red")));
            assert_eq!(response.revision, 1);
        }
        other => panic!("expected query, got {:?}", other),
    }

    let whole = Command::retrieve(EntityKind::Thing, thing_id(), ResourcePath::root());
    let response = dispatch(Some(&state), &whole, 2).response().cloned().unwrap();
    assert_eq!(response.payload.unwrap()["thingId"], json!("ns:1"));

    let missing = Command::retrieve(EntityKind::Thing, thing_id(), path("/attributes/none"));
    assert_eq!(
        error_kind(&dispatch(Some(&state), &missing, 2)),
        ExErrorKind::NotAccessible
    );
}

#[test]
fn test_error_response_carries_correlation_id() {
    let (state, _) = created_thing();
    let correlation_id = CorrelationId::from("corr-42");
    let command = Command::create(EntityKind::Thing, thing_id(), thing_document())
        .with_correlation_id(correlation_id.clone());

    match dispatch(Some(&state), &command, 2) {
        DispatchResult::Error(response) => {
            assert_eq!(response.correlation_id, correlation_id);
            assert_eq!(response.error.correlation_id(), Some(&correlation_id));
            assert_eq!(response.error.op(), Some("entity_conflict"));
        }
        other => panic!("expected error, got {:?}", other),
    }
}

#[test]
fn test_success_propagates_correlation_id_to_event() {
    let correlation_id = CorrelationId::from("corr-7");
    let command = Command::create(EntityKind::Thing, thing_id(), thing_document())
        .with_correlation_id(correlation_id.clone());
    let result = dispatch(None, &command, 1);
    assert_eq!(result.event().unwrap().correlation_id, correlation_id);
    assert_eq!(result.response().unwrap().correlation_id, correlation_id);
}

#[test]
fn test_partial_table_yields_unhandled() {
    // GIVEN a table without any retrieve strategy
    let table: Vec<Strategy> = STRATEGIES
        .iter()
        .copied()
        .filter(|s| !s.kinds.contains(&CommandKind::Retrieve))
        .collect();
    let (state, _) = created_thing();

    // WHEN dispatching a retrieve command
    let command = Command::retrieve(EntityKind::Thing, thing_id(), ResourcePath::root());
    let result = dispatch_with(&table, Some(&state), &command, 2);

    // THEN no strategy applies
    assert_eq!(
        result,
        DispatchResult::Unhandled {
            command_kind: CommandKind::Retrieve
        }
    );
    assert_eq!(result.error().unwrap().kind(), ExErrorKind::Unhandled);
}

#[test]
fn test_command_for_other_entity_kind_is_unhandled() {
    let (state, _) = created_thing();
    let command = Command::retrieve(EntityKind::Policy, thing_id(), ResourcePath::root());
    assert!(matches!(
        dispatch(Some(&state), &command, 2),
        DispatchResult::Unhandled { .. }
    ));
}

#[test]
fn test_timestamp_comes_from_headers() {
    let (state, _) = created_thing();
    let command = Command::modify(EntityKind::Thing, thing_id(), path("/attributes/color"), json!("x"));
    assert_eq!(dispatch(Some(&state), &command, 2).event().unwrap().timestamp, None);

    let now = chrono::Utc::now();
    let command = command.with_timestamp(now);
    assert_eq!(
        dispatch(Some(&state), &command, 2).event().unwrap().timestamp,
        Some(now)
    );
}
