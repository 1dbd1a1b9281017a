//! In-memory command pipeline
//!
//! [`EntityExecutor`] runs one command at a time per entity id: it loads the
//! current snapshot, dispatches the command, journals the resulting event,
//! folds it into the snapshot and publishes it to subscribers. Commands for
//! distinct ids proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::Utc;
use tokio::sync::broadcast;
use twinstate_core::rules::revision;
use twinstate_core::{
    apply_event, dispatch, log_op_end, log_op_error, log_op_start, replay, Command, DispatchResult,
    EntityId, EntitySnapshot, ErrorResponse, Event, ExError,
};

use crate::journal::{EventJournal, JournalError};

const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Snapshot of one entity, loaded from the journal on first use
#[derive(Debug, Default)]
struct EntitySlot {
    loaded: bool,
    state: Option<EntitySnapshot>,
}

type SlotHandle = Arc<tokio::sync::Mutex<EntitySlot>>;

pub struct EntityExecutor<J> {
    journal: J,
    slots: Mutex<HashMap<EntityId, SlotHandle>>,
    events: broadcast::Sender<Event>,
}

impl<J: EventJournal> EntityExecutor<J> {
    pub fn new(journal: J) -> Self {
        Self::with_event_capacity(journal, DEFAULT_EVENT_CAPACITY)
    }

    /// Executor whose subscribers lag once `capacity` events are unread
    pub fn with_event_capacity(journal: J, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            journal,
            slots: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn journal(&self) -> &J {
        &self.journal
    }

    /// Receiver of every event committed after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Run `command` against the current state of its entity
    ///
    /// A command without a timestamp is stamped with the current time. A
    /// rejected command, or an event the journal refuses, leaves the state
    /// untouched.
    pub async fn execute(&self, mut command: Command) -> DispatchResult {
        let start = Instant::now();
        log_op_start!(
            "execute_command",
            entity_id = %command.entity_id,
            correlation_id = %command.headers.correlation_id,
            command = command.kind.as_str()
        );
        if command.headers.timestamp.is_none() {
            command.headers.timestamp = Some(Utc::now());
        }

        let handle = self.slot(&command.entity_id);
        let result = self.execute_locked(&handle, &command, start).await;
        self.release(&command.entity_id, handle);
        result
    }

    /// Current snapshot of `entity_id`, or `None` if it never existed
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the entity has to be rebuilt and the journal cannot be read.
    pub async fn snapshot(&self, entity_id: &EntityId) -> Result<Option<EntitySnapshot>, JournalError> {
        let handle = self.slot(entity_id);
        let mut slot = handle.lock().await;
        let state = self.load(&mut slot, entity_id).await.map(|()| slot.state.clone());
        drop(slot);
        self.release(entity_id, handle);
        state
    }

    /// Number of entity ids currently holding a slot
    pub fn tracked_entities(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    async fn execute_locked(&self, handle: &SlotHandle, command: &Command, start: Instant) -> DispatchResult {
        let mut slot = handle.lock().await;

        if let Err(err) = self.load(&mut slot, &command.entity_id).await {
            return self.fail(command, err, start);
        }

        let next_revision = revision::next_revision(slot.state.as_ref());
        let result = dispatch(slot.state.as_ref(), command, next_revision);
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            DispatchResult::Success { event, .. } => {
                if let Err(err) = self.journal.append(event).await {
                    return self.fail(command, err, start);
                }
                slot.state = apply_event(event, slot.state.take());
                // No subscribers is not an error
                self.events.send(event.clone()).ok();
                log_op_end!(
                    "execute_command",
                    duration_ms = duration_ms,
                    revision = event.revision,
                    event_type = %event.type_tag()
                );
            }
            DispatchResult::Query { response } => {
                log_op_end!(
                    "execute_command",
                    duration_ms = duration_ms,
                    revision = response.revision
                );
            }
            DispatchResult::Error(_) | DispatchResult::Unhandled { .. } => {
                if let Some(err) = result.error() {
                    log_op_error!(
                        "execute_command",
                        err,
                        duration_ms = duration_ms,
                        entity_id = %command.entity_id
                    );
                }
            }
        }
        result
    }

    fn slot(&self, entity_id: &EntityId) -> SlotHandle {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(entity_id.clone()).or_default())
    }

    /// Drop the slot of an id with no entity behind it once nobody else holds it
    fn release(&self, entity_id: &EntityId, handle: SlotHandle) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tracked) = slots.get(entity_id) else {
            return;
        };
        // Other holders clone out of the map under this lock, so the map and
        // `handle` being the only owners means no task is waiting on the slot
        if !Arc::ptr_eq(tracked, &handle) || Arc::strong_count(&handle) != 2 {
            return;
        }
        let vacant = handle
            .try_lock()
            .map(|slot| slot.state.is_none())
            .unwrap_or(false);
        if vacant {
            slots.remove(entity_id);
        }
    }

    async fn load(&self, slot: &mut EntitySlot, entity_id: &EntityId) -> Result<(), JournalError> {
        if slot.loaded {
            return Ok(());
        }
        let events = self.journal.events_for(entity_id).await?;
        slot.state = replay(&events);
        slot.loaded = true;
        tracing::debug!(
            entity_id = %entity_id,
            events = events.len(),
            revision = ?slot.state.as_ref().map(|s| s.revision),
            "entity rebuilt from journal"
        );
        Ok(())
    }

    fn fail(&self, command: &Command, err: JournalError, start: Instant) -> DispatchResult {
        let duration_ms = start.elapsed().as_millis() as u64;
        let correlation_id = command.headers.correlation_id.clone();
        let error = ExError::from(err)
            .with_op("execute_command")
            .with_entity_id(command.entity_id.to_string())
            .with_correlation_id(correlation_id.clone());
        log_op_error!(
            "execute_command",
            error.clone(),
            duration_ms = duration_ms,
            entity_id = %command.entity_id
        );
        DispatchResult::Error(ErrorResponse {
            error,
            correlation_id,
        })
    }
}
