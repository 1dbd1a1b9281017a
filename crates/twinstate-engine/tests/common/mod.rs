use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use twinstate_core::{replay, EntityId, Event, FieldSelector, ResourcePath};
use twinstate_enrichment::{AuthContext, RetrievalError, SliceRetriever};
use twinstate_engine::{EventJournal, InMemoryJournal, JournalError};

#[allow(dead_code)]
pub fn thing_id() -> EntityId {
    EntityId::parse("ns:1").expect("valid id")
}

#[allow(dead_code)]
pub fn path(s: &str) -> ResourcePath {
    ResourcePath::parse(s).expect("valid path")
}

#[allow(dead_code)]
pub fn thing_document() -> Value {
    json!({
        "policyId": "ns:policy",
        "attributes": {"color": "red", "size": 3}
    })
}

/// Journal that reads fine but refuses every append
#[derive(Debug, Default)]
pub struct RefusingJournal;

#[async_trait]
impl EventJournal for RefusingJournal {
    async fn append(&self, _event: &Event) -> Result<(), JournalError> {
        Err(JournalError::Unavailable {
            reason: "read-only".to_string(),
        })
    }

    async fn events_for(&self, _entity_id: &EntityId) -> Result<Vec<Event>, JournalError> {
        Ok(Vec::new())
    }
}

/// Authoritative source that rebuilds entities from a journal and counts calls
pub struct JournalRetriever {
    journal: Arc<InMemoryJournal>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl JournalRetriever {
    pub fn new(journal: Arc<InMemoryJournal>) -> Arc<Self> {
        Arc::new(Self {
            journal,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SliceRetriever for JournalRetriever {
    async fn retrieve(
        &self,
        entity_id: &EntityId,
        selector: &FieldSelector,
        _auth: &AuthContext,
    ) -> Result<Value, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let events = self
            .journal
            .events_for(entity_id)
            .await
            .map_err(|err| RetrievalError::Failed(err.to_string()))?;
        match replay(&events) {
            Some(state) if state.is_active() => Ok(selector.select(&state.to_json())),
            _ => Err(RetrievalError::NotFound(entity_id.to_string())),
        }
    }
}
