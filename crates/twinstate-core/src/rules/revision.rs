//! Revision and conflict predicates
//!
//! Shared by strategy dispatch, event application and the enrichment cache
//! so every component agrees on what "next", "stale" and "out of sync" mean.

use crate::model::EntitySnapshot;

/// How an incoming revision relates to a known one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionRelation {
    /// Incoming revision is the one already known
    Current,
    /// Incoming revision directly follows the known one
    Next,
    /// Incoming revision is behind or skips ahead of the known one
    Desynchronized,
}

/// Classify `incoming` against `known`
pub fn classify(known: u64, incoming: u64) -> RevisionRelation {
    if incoming == known {
        RevisionRelation::Current
    } else if follows(known, incoming) {
        RevisionRelation::Next
    } else {
        RevisionRelation::Desynchronized
    }
}

/// Whether `incoming` is exactly one past `known`
pub fn follows(known: u64, incoming: u64) -> bool {
    known.checked_add(1) == Some(incoming)
}

/// Whether the entity exists and has not been deleted
pub fn is_active(state: Option<&EntitySnapshot>) -> bool {
    state.is_some_and(EntitySnapshot::is_active)
}

/// Revision the next accepted event for this entity carries
///
/// Deleted entities keep their revision sequence so a re-create continues it.
pub fn next_revision(state: Option<&EntitySnapshot>) -> u64 {
    state.map_or(1, |s| s.revision.saturating_add(1))
}

/// Whether an expected-revision precondition rejects the current state
pub fn violates_precondition(state: &EntitySnapshot, expected: Option<u64>) -> bool {
    expected.is_some_and(|expected| expected != state.revision)
}

/// Whether a write at `incoming` must be dropped because `existing` is as new or newer
pub fn is_stale_write(existing: Option<u64>, incoming: u64) -> bool {
    existing.is_some_and(|existing| incoming <= existing)
}
