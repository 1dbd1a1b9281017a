use std::time::Duration;

use thiserror::Error;
use twinstate_core::{ExError, ExErrorKind};

use crate::config::ConfigError;
use crate::retriever::RetrievalError;

/// Errors surfaced by the enrichment cache
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnrichmentError {
    /// Authoritative retrieval did not answer in time; callers may retry
    #[error("Retrieval of {entity_id} timed out after {timeout:?}")]
    Timeout { entity_id: String, timeout: Duration },

    /// The fetch ended without producing a projection
    #[error("Retrieval of {entity_id} failed: {source}")]
    Retrieval {
        entity_id: String,
        #[source]
        source: RetrievalError,
    },
}

impl EnrichmentError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, EnrichmentError::Timeout { .. })
    }
}

impl From<EnrichmentError> for ExError {
    fn from(err: EnrichmentError) -> Self {
        match err {
            EnrichmentError::Timeout { entity_id, timeout } => ExError::new(ExErrorKind::Timeout)
                .with_entity_id(entity_id)
                .with_op("retrieve_projection")
                .with_message(format!("Retrieval timed out after {:?}", timeout)),

            EnrichmentError::Retrieval { entity_id, source } => {
                ExError::new(ExErrorKind::ExternalService)
                    .with_entity_id(entity_id)
                    .with_op("retrieve_projection")
                    .with_message(source.to_string())
            }
        }
    }
}

impl From<ConfigError> for ExError {
    fn from(err: ConfigError) -> Self {
        ExError::new(ExErrorKind::Config).with_message(err.to_string())
    }
}
