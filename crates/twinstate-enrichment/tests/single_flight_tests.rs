#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Authoritative fetches are shared per key, bounded by a timeout and never
//! cache a failure.

mod common;

use std::time::Duration;

use common::{auth, cache_over, id, selector, thing_at, CountingRetriever};
use futures::future::join_all;
use serde_json::json;
use twinstate_core::{ExError, ExErrorKind};
use twinstate_enrichment::{CacheConfig, EnrichmentError, RetrievalError, Signal};

#[tokio::test(start_paused = true)]
async fn test_concurrent_misses_share_one_fetch() {
    let retriever = CountingRetriever::new();
    retriever.insert(&id("ns:1"), thing_at("ns:1", "ns:policy", 1, "red"));
    retriever.set_delay(Some(Duration::from_millis(50)));
    let cache = cache_over(&retriever, CacheConfig::default());
    let attributes = selector("attributes");
    let auth = auth();
    let ns1 = id("ns:1");

    let lookups = (0..10).map(|_| cache.retrieve_projection(&ns1, &attributes, &auth, Signal::Query));
    let results = join_all(lookups).await;

    assert_eq!(retriever.calls(), 1);
    for result in results {
        assert_eq!(result.unwrap(), json!({"attributes": {"color": "red", "size": 3}}));
    }
    assert_eq!(cache.stats().misses, 10);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_retryable_and_fetch_still_populates_cache() {
    // GIVEN a source slower than the caller is willing to wait
    let retriever = CountingRetriever::new();
    retriever.insert(&id("ns:1"), thing_at("ns:1", "ns:policy", 1, "red"));
    retriever.set_delay(Some(Duration::from_millis(500)));
    let cache = cache_over(&retriever, CacheConfig::default());
    let attributes = selector("attributes");

    // WHEN the caller gives up after 50ms
    let err = cache
        .retrieve_projection_within(
            &id("ns:1"),
            &attributes,
            &auth(),
            Signal::Query,
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();

    // THEN it sees a retryable timeout and nothing is cached yet
    assert!(matches!(err, EnrichmentError::Timeout { .. }));
    assert!(err.is_retryable());
    assert!(ExError::from(err).kind().is_retryable());
    assert_eq!(cache.stats().entries, 0);

    // AND the abandoned fetch completes and serves the retry without a new round trip
    tokio::time::sleep(Duration::from_millis(600)).await;
    let retried = cache
        .retrieve_projection(&id("ns:1"), &attributes, &auth(), Signal::Query)
        .await
        .unwrap();
    assert_eq!(retried["attributes"]["color"], json!("red"));
    assert_eq!(retriever.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_source_timeout_is_not_cached() {
    let retriever = CountingRetriever::new();
    retriever.insert(&id("ns:1"), thing_at("ns:1", "ns:policy", 1, "red"));
    retriever.fail_with(Some(RetrievalError::Timeout));
    let cache = cache_over(&retriever, CacheConfig::default());
    let attributes = selector("attributes");

    let err = cache
        .retrieve_projection(&id("ns:1"), &attributes, &auth(), Signal::Query)
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    retriever.fail_with(None);
    let recovered = cache
        .retrieve_projection(&id("ns:1"), &attributes, &auth(), Signal::Query)
        .await
        .unwrap();
    assert_eq!(recovered["attributes"]["color"], json!("red"));
    assert_eq!(retriever.calls(), 2);
    assert_eq!(cache.stats().fetch_failures, 1);
}

#[tokio::test]
async fn test_missing_entity_yields_empty_projection_that_is_not_cached() {
    let retriever = CountingRetriever::new();
    let cache = cache_over(&retriever, CacheConfig::default());
    let attributes = selector("attributes");

    for _ in 0..2 {
        let projection = cache
            .retrieve_projection(&id("ns:missing"), &attributes, &auth(), Signal::Query)
            .await
            .unwrap();
        assert_eq!(projection, json!({}));
    }

    assert_eq!(retriever.calls(), 2);
    assert_eq!(cache.stats().entries, 0);
}

#[tokio::test]
async fn test_unexpected_failure_surfaces_as_retrieval_error() {
    let retriever = CountingRetriever::new();
    retriever.fail_with(Some(RetrievalError::Failed("backend down".into())));
    let cache = cache_over(&retriever, CacheConfig::default());

    let err = cache
        .retrieve_projection(&id("ns:1"), &selector("attributes"), &auth(), Signal::Query)
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(ExError::from(err).kind(), ExErrorKind::ExternalService);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_started_before_invalidation_is_not_stored() {
    // GIVEN a slow fetch in flight for ns:1
    let retriever = CountingRetriever::new();
    retriever.insert(&id("ns:1"), thing_at("ns:1", "ns:policy", 1, "red"));
    retriever.set_delay(Some(Duration::from_millis(100)));
    let cache = cache_over(&retriever, CacheConfig::default());
    let attributes = selector("attributes");
    let key = cache.key_for(&id("ns:1"), &attributes, &auth());

    let pending = {
        let cache = cache.clone();
        let attributes = attributes.clone();
        tokio::spawn(async move {
            cache
                .retrieve_projection(&id("ns:1"), &attributes, &auth(), Signal::Query)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    // WHEN the key is invalidated before the fetch returns
    cache.invalidate(&key);
    let answered = pending.await.unwrap().unwrap();

    // THEN the waiting caller still gets an answer but the cache does not keep it
    assert_eq!(answered["attributes"]["color"], json!("red"));
    assert_eq!(cache.cached_revision(&key), None);
    assert_eq!(cache.stats().stale_writes, 1);
}
