//! Authoritative retrieval of partial entities

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use twinstate_core::{EntityId, FieldSelector};

use crate::key::AuthContext;

/// Why an authoritative retrieval produced no projection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("entity {0} not found")]
    NotFound(String),

    #[error("entity {0} not accessible")]
    NotAccessible(String),

    #[error("retrieval timed out")]
    Timeout,

    #[error("retrieval failed: {0}")]
    Failed(String),
}

/// Source of truth consulted on cache misses
///
/// Implementations return a JSON object holding at least the selected fields
/// that exist, including `policyId` and `_revision`.
#[async_trait]
pub trait SliceRetriever: Send + Sync {
    async fn retrieve(
        &self,
        entity_id: &EntityId,
        selector: &FieldSelector,
        auth: &AuthContext,
    ) -> Result<Value, RetrievalError>;
}

#[async_trait]
impl<R: SliceRetriever + ?Sized> SliceRetriever for Arc<R> {
    async fn retrieve(
        &self,
        entity_id: &EntityId,
        selector: &FieldSelector,
        auth: &AuthContext,
    ) -> Result<Value, RetrievalError> {
        (**self).retrieve(entity_id, selector, auth).await
    }
}
