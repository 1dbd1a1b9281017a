//! twinstate core - event-sourced digital-twin kernel
//!
//! This crate provides:
//! - Entity models (ids, resource paths, snapshots, metadata, field selectors)
//! - Commands and the events they produce
//! - Command strategy dispatch (`dispatch`)
//! - The event application engine (`apply`, `apply_event`, `replay`)
//! - Revision predicates shared with the enrichment cache
//! - The structured error and logging facilities

pub mod apply;
pub mod commands;
pub mod errors;
pub mod events;
pub mod logging_facility;
pub mod model;
pub mod rules;
pub mod strategies;

// Re-export commonly used types
pub use apply::{apply, apply_event, replay};
pub use commands::{Command, CommandHeaders, CommandKind};
pub use errors::{ExError, ExErrorKind, Result, TwinError};
pub use events::{Event, EventKind};
pub use model::{EntityId, EntityKind, EntitySnapshot, FieldSelector, Lifecycle, Metadata, ResourcePath};
pub use strategies::{dispatch, CommandResponse, DispatchResult, ErrorResponse};
