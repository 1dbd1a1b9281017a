use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use twinstate_core::{EntityId, EntityKind, Event, EventKind, FieldSelector, ResourcePath};
use twinstate_enrichment::{
    AuthContext, CacheConfig, EnrichmentCache, RetrievalError, SliceRetriever,
};

/// In-memory authoritative source that counts round trips
#[derive(Default)]
pub struct CountingRetriever {
    documents: Mutex<HashMap<EntityId, Value>>,
    calls: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    failure: Mutex<Option<RetrievalError>>,
}

#[allow(dead_code)]
impl CountingRetriever {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, id: &EntityId, document: Value) {
        self.documents.lock().unwrap().insert(id.clone(), document);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn fail_with(&self, failure: Option<RetrievalError>) {
        *self.failure.lock().unwrap() = failure;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SliceRetriever for CountingRetriever {
    async fn retrieve(
        &self,
        entity_id: &EntityId,
        selector: &FieldSelector,
        _auth: &AuthContext,
    ) -> Result<Value, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = self.failure.lock().unwrap().clone() {
            return Err(failure);
        }
        self.documents
            .lock()
            .unwrap()
            .get(entity_id)
            .map(|document| selector.select(document))
            .ok_or_else(|| RetrievalError::NotFound(entity_id.to_string()))
    }
}

#[allow(dead_code)]
pub fn id(s: &str) -> EntityId {
    EntityId::parse(s).expect("valid id")
}

#[allow(dead_code)]
pub fn path(s: &str) -> ResourcePath {
    ResourcePath::parse(s).expect("valid path")
}

#[allow(dead_code)]
pub fn selector(s: &str) -> FieldSelector {
    FieldSelector::parse(s).expect("valid selector")
}

#[allow(dead_code)]
pub fn auth() -> AuthContext {
    AuthContext::new(["user:alice"])
}

/// Full thing document at `revision` governed by `policy`
#[allow(dead_code)]
pub fn thing_at(thing: &str, policy: &str, revision: u64, color: &str) -> Value {
    json!({
        "thingId": thing,
        "policyId": policy,
        "_revision": revision,
        "attributes": {"color": color, "size": 3},
        "features": {"lamp": {"properties": {"on": false}}}
    })
}

#[allow(dead_code)]
pub fn field_event(kind: EventKind, thing: &str, revision: u64, at: &str) -> Event {
    Event::new(kind, EntityKind::Thing, id(thing), revision, path(at))
}

#[allow(dead_code)]
pub fn cache_over(retriever: &Arc<CountingRetriever>, config: CacheConfig) -> EnrichmentCache {
    EnrichmentCache::new(Arc::clone(retriever), config).expect("valid config")
}
