//! twinstate enrichment - projection cache over an authoritative retriever
//!
//! This crate provides:
//! - `EnrichmentCache`, a bounded expiring cache of entity projections that
//!   applies committed events incrementally and reloads on revision gaps
//! - The policy-dependency index used to invalidate projections when a
//!   governing policy changes
//! - Background listeners feeding change streams into a cache
//! - TOML-backed cache configuration

pub mod config;
pub mod error;
pub mod facade;
pub mod key;
pub mod listener;
pub mod policy_index;
pub mod retriever;
mod store;

pub use config::{CacheConfig, ConfigError};
pub use error::EnrichmentError;
pub use facade::{CacheStats, EnrichmentCache, Signal};
pub use key::{AuthContext, CacheKey, LookupContext};
pub use listener::{forward_events_to_cache, spawn_dependency_listener, Subscription};
pub use policy_index::PolicyIndex;
pub use retriever::{RetrievalError, SliceRetriever};
