//! Background tasks that keep a cache in step with change streams

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use twinstate_core::{EntityId, EntityKind, Event, FieldSelector};

use crate::facade::{EnrichmentCache, Signal};
use crate::key::AuthContext;

/// Invalidate dependents for every policy id received until the sender is dropped
///
/// Notifications are at-least-once; a repeated id finds nothing left to invalidate.
pub fn spawn_dependency_listener(cache: EnrichmentCache, mut receiver: mpsc::Receiver<EntityId>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(policy_id) = receiver.recv().await {
            cache.dependency_changed(&policy_id);
        }
        tracing::debug!("dependency stream closed");
    })
}

/// A projection kept warm by [`forward_events_to_cache`]
#[derive(Debug, Clone)]
pub struct Subscription {
    pub entity_id: EntityId,
    pub selector: FieldSelector,
    pub auth: AuthContext,
}

impl Subscription {
    pub fn new(entity_id: EntityId, selector: FieldSelector, auth: AuthContext) -> Self {
        Self {
            entity_id,
            selector,
            auth,
        }
    }
}

/// Deliver committed events to the cache until the channel closes
///
/// Policy events become dependency changes. Events for the cache's own
/// entity kind are fed to
/// [`retrieve_projection`](EnrichmentCache::retrieve_projection) once per
/// matching subscription. When the receiver lags, skipped events surface as
/// a revision gap on the next event and the entry is reloaded.
pub fn forward_events_to_cache(
    mut receiver: broadcast::Receiver<Event>,
    cache: EnrichmentCache,
    subscriptions: Vec<Subscription>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event forwarder lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            if event.entity_kind == EntityKind::Policy {
                cache.dependency_changed(&event.entity_id);
            }
            if event.entity_kind != cache.kind() {
                continue;
            }

            for subscription in subscriptions.iter().filter(|s| s.entity_id == event.entity_id) {
                let result = cache
                    .retrieve_projection(
                        &subscription.entity_id,
                        &subscription.selector,
                        &subscription.auth,
                        Signal::Event(&event),
                    )
                    .await;
                if let Err(err) = result {
                    tracing::warn!(
                        entity_id = %event.entity_id,
                        revision = event.revision,
                        error = %err,
                        "failed to forward event to cache"
                    );
                }
            }
        }
        tracing::debug!("event stream closed");
    })
}
