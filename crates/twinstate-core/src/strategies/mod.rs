//! Command strategy dispatch
//!
//! Each command is matched against an ordered table of strategies. The first
//! strategy whose command kind matches and whose predicate holds for the
//! current state handles the command. Handlers are pure: they read the
//! current state and the command and either produce one event, answer a
//! query or reject the command.

mod entity;
mod field;
mod result;

pub use result::{CommandResponse, DispatchResult, ErrorResponse};

use crate::commands::{Command, CommandKind};
use crate::errors::{Result, TwinError};
use crate::events::Event;
use crate::model::EntitySnapshot;
use crate::rules::revision;

/// Applicability predicate over the current state and the command
pub type Predicate = fn(Option<&EntitySnapshot>, &Command) -> bool;

/// Strategy handler
pub type Handler = fn(&StrategyContext<'_>) -> Result<Outcome>;

/// Inputs handed to a strategy handler
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    pub state: Option<&'a EntitySnapshot>,
    pub command: &'a Command,
    pub next_revision: u64,
}

impl<'a> StrategyContext<'a> {
    /// Active state the command operates on, after checking its precondition
    ///
    /// # Errors
    /// * `EntityNotFound` - If the entity is absent or deleted
    /// * `PreconditionFailed` - If the expected revision header does not match
    pub fn active_state(&self) -> Result<&'a EntitySnapshot> {
        let state = self
            .state
            .filter(|s| s.is_active())
            .ok_or_else(|| TwinError::EntityNotFound {
                entity_id: self.command.entity_id.to_string(),
            })?;
        let expected = self.command.headers.expected_revision;
        if revision::violates_precondition(state, expected) {
            return Err(TwinError::PreconditionFailed {
                entity_id: state.id.to_string(),
                expected: expected.unwrap_or_default(),
                actual: state.revision,
            });
        }
        Ok(state)
    }
}

/// What a handler produced
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Event(Event, CommandResponse),
    Query(CommandResponse),
}

/// One row of the strategy table
#[derive(Clone, Copy)]
pub struct Strategy {
    pub name: &'static str,
    pub kinds: &'static [CommandKind],
    pub applies: Predicate,
    pub handle: Handler,
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategy")
            .field("name", &self.name)
            .field("kinds", &self.kinds)
            .finish()
    }
}

fn absent_or_deleted(state: Option<&EntitySnapshot>, _: &Command) -> bool {
    !revision::is_active(state)
}

fn active(state: Option<&EntitySnapshot>, _: &Command) -> bool {
    revision::is_active(state)
}

fn active_whole_entity(state: Option<&EntitySnapshot>, command: &Command) -> bool {
    revision::is_active(state) && command.path.is_root()
}

fn active_field(state: Option<&EntitySnapshot>, command: &Command) -> bool {
    revision::is_active(state) && !command.path.is_root()
}

/// Default strategy table, checked in order
pub static STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "create_entity",
        kinds: &[CommandKind::Create],
        applies: absent_or_deleted,
        handle: entity::create,
    },
    Strategy {
        name: "entity_conflict",
        kinds: &[CommandKind::Create],
        applies: active,
        handle: entity::conflict,
    },
    Strategy {
        name: "modify_entity",
        kinds: &[CommandKind::Modify],
        applies: active_whole_entity,
        handle: entity::modify,
    },
    Strategy {
        name: "modify_field",
        kinds: &[CommandKind::Modify],
        applies: active_field,
        handle: field::modify,
    },
    Strategy {
        name: "delete_entity",
        kinds: &[CommandKind::Delete],
        applies: active_whole_entity,
        handle: entity::delete,
    },
    Strategy {
        name: "delete_field",
        kinds: &[CommandKind::Delete],
        applies: active_field,
        handle: field::delete,
    },
    Strategy {
        name: "retrieve",
        kinds: &[CommandKind::Retrieve],
        applies: active,
        handle: field::retrieve,
    },
    Strategy {
        name: "entity_not_found",
        kinds: &[CommandKind::Modify, CommandKind::Delete, CommandKind::Retrieve],
        applies: absent_or_deleted,
        handle: entity::not_found,
    },
];

/// Dispatch `command` against `current` using the default strategy table
///
/// `next_revision` is the revision an accepted mutation will carry.
pub fn dispatch(
    current: Option<&EntitySnapshot>,
    command: &Command,
    next_revision: u64,
) -> DispatchResult {
    dispatch_with(STRATEGIES, current, command, next_revision)
}

/// Dispatch `command` against an explicit strategy table
///
/// A command addressed to a different entity kind than the current state
/// matches no strategy.
pub fn dispatch_with(
    strategies: &[Strategy],
    current: Option<&EntitySnapshot>,
    command: &Command,
    next_revision: u64,
) -> DispatchResult {
    let kind_matches = !current.is_some_and(|s| s.kind != command.entity_kind);
    let selected = strategies.iter().find(|strategy| {
        kind_matches && strategy.kinds.contains(&command.kind) && (strategy.applies)(current, command)
    });

    let Some(strategy) = selected else {
        tracing::debug!(
            entity_id = %command.entity_id,
            command_kind = %command.kind,
            "no strategy applies"
        );
        return DispatchResult::Unhandled {
            command_kind: command.kind,
        };
    };

    tracing::trace!(
        strategy = strategy.name,
        entity_id = %command.entity_id,
        path = %command.path,
        next_revision,
        "strategy selected"
    );

    let ctx = StrategyContext {
        state: current,
        command,
        next_revision,
    };
    match (strategy.handle)(&ctx) {
        Ok(Outcome::Event(event, response)) => DispatchResult::Success { event, response },
        Ok(Outcome::Query(response)) => DispatchResult::Query { response },
        Err(err) => DispatchResult::Error(ErrorResponse::new(err, strategy.name, command)),
    }
}
