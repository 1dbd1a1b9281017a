//! Correlation ids for matching replies to commands
//!
//! Every command carries a [`CorrelationId`] in its headers. The id is copied
//! onto the produced event, the command response and any error response so a
//! client can match replies to the request that caused them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier correlating a command with its event, response or error
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a new random CorrelationId using UUIDv7
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string (e.g. a client-supplied header)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
