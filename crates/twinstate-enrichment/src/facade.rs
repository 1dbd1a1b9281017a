//! Caching enrichment facade
//!
//! [`EnrichmentCache`] answers projection requests from a bounded, expiring
//! cache and keeps cached projections in step with the event stream. An
//! event whose revision directly follows the cached one is patched into the
//! cached projection without a round trip. Anything else that does not match
//! the cached revision discards the entry and reloads it from the
//! authoritative [`SliceRetriever`].
//!
//! At most one authoritative fetch is in flight per key. Concurrent callers
//! share it, and it runs on its own task so that it completes and populates
//! the cache even after every caller has timed out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::{Map, Value};
use tokio::time::Instant;
use twinstate_core::model::{MODIFIED_FIELD, POLICY_ID_FIELD, REVISION_FIELD};
use twinstate_core::rules::revision::{self, RevisionRelation};
use twinstate_core::{
    log_op_end, log_op_error, log_op_start, EntityId, EntityKind, Event, EventKind, ExErrorKind,
    FieldSelector, ResourcePath,
};

use crate::config::{CacheConfig, ConfigError};
use crate::error::EnrichmentError;
use crate::key::{AuthContext, CacheKey, LookupContext};
use crate::policy_index::PolicyIndex;
use crate::retriever::{RetrievalError, SliceRetriever};
use crate::store::{EntryStore, PutOutcome};

type FetchResult = Result<Value, RetrievalError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// What prompted a projection request
#[derive(Debug, Clone, Copy)]
pub enum Signal<'a> {
    /// Plain read with no accompanying change
    Query,
    /// An event committed for the requested entity
    Event(&'a Event),
}

impl<'a> From<&'a Event> for Signal<'a> {
    fn from(event: &'a Event) -> Self {
        Signal::Event(event)
    }
}

/// Point-in-time counters of cache activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Calls made to the authoritative retriever
    pub round_trips: u64,
    pub fetch_failures: u64,
    pub timeouts: u64,
    /// Events applied to a cached projection in place
    pub patches: u64,
    pub invalidations: u64,
    pub evictions: u64,
    /// Writes dropped by the revision guard or superseded by an invalidation
    pub stale_writes: u64,
    pub entries: usize,
    pub indexed_keys: usize,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    round_trips: AtomicU64,
    fetch_failures: AtomicU64,
    timeouts: AtomicU64,
    patches: AtomicU64,
    invalidations: AtomicU64,
    evictions: AtomicU64,
    stale_writes: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

struct InFlight {
    id: u64,
    fetch: SharedFetch,
}

struct CacheState {
    store: EntryStore,
    index: PolicyIndex,
    in_flight: HashMap<CacheKey, InFlight>,
    next_fetch_id: u64,
}

struct Inner {
    retriever: Arc<dyn SliceRetriever>,
    config: CacheConfig,
    kind: EntityKind,
    state: Mutex<CacheState>,
    counters: Counters,
}

/// Shared handle to a projection cache; clones refer to the same cache
#[derive(Clone)]
pub struct EnrichmentCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EnrichmentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichmentCache")
            .field("kind", &self.inner.kind)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl EnrichmentCache {
    /// Create a cache of thing projections
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the configuration does not validate.
    pub fn new<R>(retriever: R, config: CacheConfig) -> Result<Self, ConfigError>
    where
        R: SliceRetriever + 'static,
    {
        Self::with_kind(retriever, config, EntityKind::Thing)
    }

    /// Create a cache of projections of `kind` entities
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the configuration does not validate.
    pub fn with_kind<R>(retriever: R, config: CacheConfig, kind: EntityKind) -> Result<Self, ConfigError>
    where
        R: SliceRetriever + 'static,
    {
        config.validate()?;
        let state = CacheState {
            store: EntryStore::new(config.maximum_size, config.expire_after_write()),
            index: PolicyIndex::new(),
            in_flight: HashMap::new(),
            next_fetch_id: 0,
        };
        Ok(Self {
            inner: Arc::new(Inner {
                retriever: Arc::new(retriever),
                config,
                kind,
                state: Mutex::new(state),
                counters: Counters::default(),
            }),
        })
    }

    pub fn kind(&self) -> EntityKind {
        self.inner.kind
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Cache key for a request; the selector is augmented with the policy id and revision
    pub fn key_for(&self, entity_id: &EntityId, selector: &FieldSelector, auth: &AuthContext) -> CacheKey {
        CacheKey::new(
            self.inner.kind,
            entity_id.clone(),
            LookupContext::new(selector, auth.clone()),
        )
    }

    /// Projection of `entity_id` restricted to `selector`, waiting at most the configured ask timeout
    ///
    /// # Errors
    ///
    /// Returns [`EnrichmentError::Timeout`] if the authoritative retrieval does not answer in
    /// time and [`EnrichmentError::Retrieval`] if the fetch failed unexpectedly.
    pub async fn retrieve_projection(
        &self,
        entity_id: &EntityId,
        selector: &FieldSelector,
        auth: &AuthContext,
        signal: Signal<'_>,
    ) -> Result<Value, EnrichmentError> {
        let timeout = self.inner.config.ask_timeout();
        self.retrieve_projection_within(entity_id, selector, auth, signal, timeout)
            .await
    }

    /// Like [`retrieve_projection`](Self::retrieve_projection) with an explicit timeout
    ///
    /// # Errors
    ///
    /// See [`retrieve_projection`](Self::retrieve_projection).
    pub async fn retrieve_projection_within(
        &self,
        entity_id: &EntityId,
        selector: &FieldSelector,
        auth: &AuthContext,
        signal: Signal<'_>,
        timeout: Duration,
    ) -> Result<Value, EnrichmentError> {
        log_op_start!("retrieve_projection", entity_id = %entity_id);
        let start = std::time::Instant::now();

        let key = self.key_for(entity_id, selector, auth);
        let result = match signal {
            Signal::Event(event) if event.entity_id == *entity_id => {
                self.apply_signal(&key, event, timeout).await
            }
            _ => self.cache_lookup(&key, timeout).await,
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(full) => {
                log_op_end!("retrieve_projection", duration_ms = duration_ms);
                Ok(selector.select(&full))
            }
            Err(err) => {
                log_op_error!(
                    "retrieve_projection",
                    err.clone(),
                    duration_ms = duration_ms,
                    entity_id = %entity_id
                );
                Err(err)
            }
        }
    }

    /// Cached projection for `key`, fetched from the retriever on a miss
    ///
    /// A fetch that reports the entity as missing or inaccessible yields an
    /// empty projection, which is not cached.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichmentError::Timeout`] if the shared fetch has not finished within
    /// `timeout` and [`EnrichmentError::Retrieval`] if it failed unexpectedly.
    pub async fn cache_lookup(&self, key: &CacheKey, timeout: Duration) -> Result<Value, EnrichmentError> {
        let fetch = {
            let mut state = self.inner.lock();
            self.inner.expire(&mut state);
            if let Some(entry) = state.store.get(key) {
                bump(&self.inner.counters.hits);
                return Ok(entry.projection.clone());
            }
            bump(&self.inner.counters.misses);
            self.join_or_start_fetch(&mut state, key)
        };

        match tokio::time::timeout(timeout, fetch).await {
            Ok(Ok(projection)) => Ok(projection),
            Ok(Err(RetrievalError::Timeout)) => {
                bump(&self.inner.counters.timeouts);
                Err(EnrichmentError::Timeout {
                    entity_id: key.entity_id().to_string(),
                    timeout: self.inner.config.ask_timeout(),
                })
            }
            Ok(Err(RetrievalError::Failed(reason))) => Err(EnrichmentError::Retrieval {
                entity_id: key.entity_id().to_string(),
                source: RetrievalError::Failed(reason),
            }),
            Ok(Err(err)) => {
                tracing::debug!(key = %key, error = %err, "retrieval gave no projection");
                Ok(empty_projection())
            }
            Err(_elapsed) => {
                bump(&self.inner.counters.timeouts);
                Err(EnrichmentError::Timeout {
                    entity_id: key.entity_id().to_string(),
                    timeout,
                })
            }
        }
    }

    /// Invalidate every projection governed by `policy_id`, returning how many were dropped
    ///
    /// Reloading happens lazily on the next request for each key.
    pub fn dependency_changed(&self, policy_id: &EntityId) -> usize {
        let mut state = self.inner.lock();
        let dependents = state.index.take_dependents(policy_id);
        let mut invalidated = 0;
        for key in &dependents {
            state.in_flight.remove(key);
            if state.store.remove(key) {
                invalidated += 1;
                bump(&self.inner.counters.invalidations);
            }
        }
        tracing::debug!(
            policy_id = %policy_id,
            dependents = dependents.len(),
            invalidated,
            "dependency changed"
        );
        invalidated
    }

    /// Drop the projection for `key`; a fetch already in flight for it will not be stored
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let mut state = self.inner.lock();
        self.inner.invalidate_locked(&mut state, key)
    }

    /// Revision of the projection cached for `key`, if any
    pub fn cached_revision(&self, key: &CacheKey) -> Option<u64> {
        let state = self.inner.lock();
        state.store.get(key).map(|entry| entry.revision)
    }

    /// Number of keys indexed under `policy_id`
    pub fn dependents_of(&self, policy_id: &EntityId) -> usize {
        self.inner.lock().index.dependents(policy_id)
    }

    pub fn stats(&self) -> CacheStats {
        let (entries, indexed_keys) = {
            let state = self.inner.lock();
            (state.store.len(), state.index.len())
        };
        let c = &self.inner.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            round_trips: c.round_trips.load(Ordering::Relaxed),
            fetch_failures: c.fetch_failures.load(Ordering::Relaxed),
            timeouts: c.timeouts.load(Ordering::Relaxed),
            patches: c.patches.load(Ordering::Relaxed),
            invalidations: c.invalidations.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            stale_writes: c.stale_writes.load(Ordering::Relaxed),
            entries,
            indexed_keys,
        }
    }

    async fn apply_signal(&self, key: &CacheKey, event: &Event, timeout: Duration) -> Result<Value, EnrichmentError> {
        if event.path.is_root() {
            return self.apply_whole_entity_event(key, event, timeout).await;
        }

        let cached = self.cache_lookup(key, timeout).await?;
        let Some(cached_revision) = projection_revision(&cached) else {
            return self.reload(key, None, event, timeout).await;
        };

        match revision::classify(cached_revision, event.revision) {
            RevisionRelation::Current => Ok(cached),
            RevisionRelation::Next if is_patchable(event) => Ok(self.patch(key, cached, event)),
            _ => self.reload(key, Some(cached_revision), event, timeout).await,
        }
    }

    async fn apply_whole_entity_event(
        &self,
        key: &CacheKey,
        event: &Event,
        timeout: Duration,
    ) -> Result<Value, EnrichmentError> {
        match (&event.kind, &event.payload) {
            (EventKind::Created | EventKind::Modified, Some(payload)) if payload.is_object() => {
                let mut document = payload.clone();
                stamp_revision(&mut document, event);
                let projection = key.selector().select(&document);
                let mut state = self.inner.lock();
                self.inner.store(&mut state, key, projection.clone());
                Ok(projection)
            }
            // The entry is dropped and the caller gets what an authoritative NotFound yields
            (EventKind::Deleted, _) => {
                self.invalidate(key);
                Ok(empty_projection())
            }
            _ => self.cache_lookup(key, timeout).await,
        }
    }

    fn patch(&self, key: &CacheKey, cached: Value, event: &Event) -> Value {
        let mut document = cached;
        match (&event.kind, &event.payload) {
            (EventKind::FieldDeleted, _) => {
                event.path.remove_in(&mut document);
            }
            (_, Some(value)) => event.path.set_in(&mut document, value.clone()),
            (_, None) => {}
        }
        stamp_revision(&mut document, event);
        let projection = key.selector().select(&document);

        let mut state = self.inner.lock();
        if self.inner.store(&mut state, key, projection.clone()) {
            bump(&self.inner.counters.patches);
        }
        projection
    }

    async fn reload(
        &self,
        key: &CacheKey,
        cached_revision: Option<u64>,
        event: &Event,
        timeout: Duration,
    ) -> Result<Value, EnrichmentError> {
        tracing::debug!(
            err.code = ExErrorKind::Desynchronized.code(),
            key = %key,
            cached_revision = ?cached_revision,
            event_revision = event.revision,
            event_type = %event.type_tag(),
            "cached projection out of sync, reloading"
        );
        self.invalidate(key);
        self.cache_lookup(key, timeout).await
    }

    fn join_or_start_fetch(&self, state: &mut CacheState, key: &CacheKey) -> SharedFetch {
        if let Some(in_flight) = state.in_flight.get(key) {
            return in_flight.fetch.clone();
        }

        let id = state.next_fetch_id;
        state.next_fetch_id += 1;

        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let handle = tokio::spawn(async move { inner.fetch_and_store(task_key, id).await });
        let fetch = async move {
            handle
                .await
                .unwrap_or_else(|err| Err(RetrievalError::Failed(err.to_string())))
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            key.clone(),
            InFlight {
                id,
                fetch: fetch.clone(),
            },
        );
        fetch
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch_and_store(&self, key: CacheKey, id: u64) -> FetchResult {
        bump(&self.counters.round_trips);
        let retrieval = self
            .retriever
            .retrieve(key.entity_id(), key.selector(), key.context().auth());
        let result = match tokio::time::timeout(self.config.ask_timeout(), retrieval).await {
            Ok(result) => result,
            Err(_elapsed) => Err(RetrievalError::Timeout),
        };

        let mut state = self.lock();
        let registered = state.in_flight.get(&key).is_some_and(|f| f.id == id);
        if registered {
            state.in_flight.remove(&key);
        }

        match result {
            Ok(document) => {
                let projection = key.selector().select(&document);
                if registered {
                    self.store(&mut state, &key, projection.clone());
                } else {
                    bump(&self.counters.stale_writes);
                    tracing::debug!(key = %key, "discarding fetch superseded by invalidation");
                }
                Ok(projection)
            }
            Err(err) => {
                bump(&self.counters.fetch_failures);
                tracing::debug!(key = %key, error = %err, "authoritative retrieval failed");
                Err(err)
            }
        }
    }

    /// Guarded write that keeps the policy index in step; false if the write was stale
    fn store(&self, state: &mut CacheState, key: &CacheKey, projection: Value) -> bool {
        let revision = projection_revision(&projection).unwrap_or_default();
        let policy_id = policy_id_of(&projection);
        match state.store.put(key, projection, revision, Instant::now()) {
            PutOutcome::Stored { evicted } => {
                for evicted_key in &evicted {
                    state.index.remove_key(evicted_key);
                    bump(&self.counters.evictions);
                }
                state.index.record(policy_id.as_ref(), key);
                true
            }
            PutOutcome::Stale { existing } => {
                bump(&self.counters.stale_writes);
                tracing::debug!(key = %key, existing, revision, "dropping stale projection");
                false
            }
        }
    }

    fn invalidate_locked(&self, state: &mut CacheState, key: &CacheKey) -> bool {
        state.in_flight.remove(key);
        state.index.remove_key(key);
        let removed = state.store.remove(key);
        if removed {
            bump(&self.counters.invalidations);
        }
        removed
    }

    fn expire(&self, state: &mut CacheState) {
        for key in state.store.expire(Instant::now()) {
            state.index.remove_key(&key);
            bump(&self.counters.evictions);
        }
    }
}

fn empty_projection() -> Value {
    Value::Object(Map::new())
}

fn projection_revision(projection: &Value) -> Option<u64> {
    projection.get(REVISION_FIELD).and_then(Value::as_u64)
}

fn policy_id_of(projection: &Value) -> Option<EntityId> {
    projection
        .get(POLICY_ID_FIELD)
        .and_then(Value::as_str)
        .and_then(|raw| EntityId::parse(raw).ok())
}

/// Only field events that do not move the entity to another policy are patched
fn is_patchable(event: &Event) -> bool {
    let policy_reference = ResourcePath::root().append(POLICY_ID_FIELD);
    !matches!(event.kind, EventKind::Other(_)) && event.path != policy_reference
}

fn stamp_revision(document: &mut Value, event: &Event) {
    if let Value::Object(map) = document {
        map.insert(REVISION_FIELD.to_string(), Value::from(event.revision));
        if let Some(timestamp) = event.timestamp {
            map.insert(MODIFIED_FIELD.to_string(), Value::String(timestamp.to_rfc3339()));
        }
    }
}
