//! twinstate engine - orchestration layer
//!
//! Runs commands against entities held in memory: per-entity serialization,
//! dispatch, journaling, event application and publication of committed
//! events.

pub mod executor;
pub mod journal;

pub use executor::EntityExecutor;
pub use journal::{EventJournal, InMemoryJournal, JournalError};
