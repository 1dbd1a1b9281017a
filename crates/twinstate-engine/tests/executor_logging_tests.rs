#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{thing_document, thing_id};
use twinstate_core::logging_facility::init_test_capture;
use twinstate_core::{Command, EntityKind};
use twinstate_core_types::schema::{
    EVENT_END, FIELD_CORRELATION_ID, FIELD_ENTITY_ID, FIELD_ERR_CODE, FIELD_REVISION,
};
use twinstate_engine::{EntityExecutor, InMemoryJournal};

#[tokio::test]
async fn test_execute_logs_boundaries_and_errors() {
    let capture = init_test_capture();
    let executor = EntityExecutor::new(InMemoryJournal::new());

    let create = Command::create(EntityKind::Thing, thing_id(), thing_document());
    let correlation_id = create.headers.correlation_id.to_string();
    executor.execute(create).await;
    capture.assert_event_exists("execute_command", "start");
    capture.assert_event_exists("execute_command", "end");

    executor
        .execute(Command::create(EntityKind::Thing, thing_id(), thing_document()))
        .await;
    capture.assert_event_exists("execute_command", "end_error");

    let conflicts = capture.count_events(|e| {
        e.op.as_deref() == Some("execute_command")
            && e.event.as_deref() == Some("end_error")
            && e.field(FIELD_ERR_CODE) == Some("ERR_CONFLICT")
    });
    assert_eq!(conflicts, 1);
    let events = capture.events_for_op("execute_command");
    let start = events
        .iter()
        .find(|e| e.field(FIELD_CORRELATION_ID) == Some(correlation_id.as_str()))
        .unwrap();
    assert_eq!(start.field(FIELD_ENTITY_ID), Some("ns:1"));
    assert_eq!(start.field("command"), Some("create"));
    assert!(start.component.as_deref().unwrap().starts_with("twinstate_engine"));
    assert!(events
        .iter()
        .any(|e| e.event.as_deref() == Some(EVENT_END) && e.field(FIELD_REVISION) == Some("1")));
}
