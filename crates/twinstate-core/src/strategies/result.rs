use serde_json::Value;
use twinstate_core_types::CorrelationId;

use crate::commands::{Command, CommandKind};
use crate::errors::{ExError, ExErrorKind, TwinError};
use crate::events::Event;
use crate::model::{EntityId, ResourcePath};

/// Response returned to the issuer of an accepted command
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResponse {
    pub command_kind: CommandKind,
    pub entity_id: EntityId,
    /// Revision of the entity after the command
    pub revision: u64,
    pub path: ResourcePath,
    pub payload: Option<Value>,
    pub correlation_id: CorrelationId,
}

impl CommandResponse {
    pub(crate) fn for_command(command: &Command, revision: u64, payload: Option<Value>) -> Self {
        Self {
            command_kind: command.kind,
            entity_id: command.entity_id.clone(),
            revision,
            path: command.path.clone(),
            payload,
            correlation_id: command.headers.correlation_id.clone(),
        }
    }
}

/// Rejected command, carrying the structured error
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error: ExError,
    pub correlation_id: CorrelationId,
}

impl ErrorResponse {
    pub(crate) fn new(err: TwinError, strategy: &str, command: &Command) -> Self {
        let correlation_id = command.headers.correlation_id.clone();
        let error = ExError::from(err)
            .with_op(strategy)
            .with_correlation_id(correlation_id.clone());
        Self {
            error,
            correlation_id,
        }
    }

    pub fn kind(&self) -> ExErrorKind {
        self.error.kind()
    }
}

/// Outcome of dispatching one command
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResult {
    /// Command accepted; `event` must be applied and persisted
    Success {
        event: Event,
        response: CommandResponse,
    },
    /// Read-only command answered from the current state
    Query { response: CommandResponse },
    /// Command rejected
    Error(ErrorResponse),
    /// No strategy applies; a configuration fault, never retried
    Unhandled { command_kind: CommandKind },
}

impl DispatchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchResult::Success { .. })
    }

    pub fn event(&self) -> Option<&Event> {
        match self {
            DispatchResult::Success { event, .. } => Some(event),
            _ => None,
        }
    }

    pub fn response(&self) -> Option<&CommandResponse> {
        match self {
            DispatchResult::Success { response, .. } | DispatchResult::Query { response } => {
                Some(response)
            }
            _ => None,
        }
    }

    /// Structured error for rejected and unhandled commands
    pub fn error(&self) -> Option<ExError> {
        match self {
            DispatchResult::Error(response) => Some(response.error.clone()),
            DispatchResult::Unhandled { command_kind } => Some(
                ExError::new(ExErrorKind::Unhandled)
                    .with_op("dispatch")
                    .with_message(format!("No strategy handles {} command", command_kind)),
            ),
            _ => None,
        }
    }
}
