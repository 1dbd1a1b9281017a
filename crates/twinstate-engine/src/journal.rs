//! Append-only event journal

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use twinstate_core::{EntityId, Event, ExError, ExErrorKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JournalError {
    /// The appended event does not directly follow the last journaled revision
    #[error("Journal for {entity_id} is at revision {last}, cannot append revision {revision}")]
    RevisionMismatch {
        entity_id: String,
        last: u64,
        revision: u64,
    },

    #[error("Journal unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Journal failures are the system's fault, never the caller's
impl From<JournalError> for ExError {
    fn from(err: JournalError) -> Self {
        let ex = ExError::new(ExErrorKind::Internal).with_message(err.to_string());
        match err {
            JournalError::RevisionMismatch { entity_id, .. } => ex.with_entity_id(entity_id),
            JournalError::Unavailable { .. } => ex,
        }
    }
}

/// Durable record of committed events, ordered per entity
#[async_trait]
pub trait EventJournal: Send + Sync {
    /// Record `event` after every event already journaled for its entity
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the event could not be recorded.
    async fn append(&self, event: &Event) -> Result<(), JournalError>;

    /// All events journaled for `entity_id`, oldest first
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Unavailable`] if the journal cannot be read.
    async fn events_for(&self, entity_id: &EntityId) -> Result<Vec<Event>, JournalError>;
}

#[async_trait]
impl<J: EventJournal + ?Sized> EventJournal for Arc<J> {
    async fn append(&self, event: &Event) -> Result<(), JournalError> {
        (**self).append(event).await
    }

    async fn events_for(&self, entity_id: &EntityId) -> Result<Vec<Event>, JournalError> {
        (**self).events_for(entity_id).await
    }
}

/// Journal kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryJournal {
    events: RwLock<HashMap<EntityId, Vec<Event>>>,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events journaled across all entities
    pub async fn len(&self) -> usize {
        self.events.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl EventJournal for InMemoryJournal {
    async fn append(&self, event: &Event) -> Result<(), JournalError> {
        let mut events = self.events.write().await;
        let stream = events.entry(event.entity_id.clone()).or_default();
        let last = stream.last().map(|e| e.revision).unwrap_or(0);
        if event.revision != last + 1 {
            return Err(JournalError::RevisionMismatch {
                entity_id: event.entity_id.to_string(),
                last,
                revision: event.revision,
            });
        }
        stream.push(event.clone());
        Ok(())
    }

    async fn events_for(&self, entity_id: &EntityId) -> Result<Vec<Event>, JournalError> {
        Ok(self
            .events
            .read()
            .await
            .get(entity_id)
            .cloned()
            .unwrap_or_default())
    }
}
