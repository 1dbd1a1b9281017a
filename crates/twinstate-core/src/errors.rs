use twinstate_core_types::CorrelationId;
use thiserror::Error;

/// Result type alias using TwinError
pub type Result<T> = std::result::Result<T, TwinError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// A stable classification of every error surfaced by twinstate. Each kind
/// maps to a stable code used by tests, logs and command responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Client errors
    InvalidInput,
    Conflict,
    NotFound,
    NotAccessible,
    NotModifiable,
    PreconditionFailed,

    // Configuration
    Unhandled,
    Config,

    // Cache
    Desynchronized,
    Timeout,
    ExternalService,

    // Integration
    Serialization,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::Conflict => "ERR_CONFLICT",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::NotAccessible => "ERR_NOT_ACCESSIBLE",
            ExErrorKind::NotModifiable => "ERR_NOT_MODIFIABLE",
            ExErrorKind::PreconditionFailed => "ERR_PRECONDITION_FAILED",
            ExErrorKind::Unhandled => "ERR_UNHANDLED",
            ExErrorKind::Config => "ERR_CONFIG",
            ExErrorKind::Desynchronized => "ERR_DESYNCHRONIZED",
            ExErrorKind::Timeout => "ERR_TIMEOUT",
            ExErrorKind::ExternalService => "ERR_EXTERNAL_SERVICE",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Whether a caller may retry the failed operation unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExErrorKind::Timeout)
    }

    /// Whether the error was caused by the request rather than the system
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ExErrorKind::InvalidInput
                | ExErrorKind::Conflict
                | ExErrorKind::NotFound
                | ExErrorKind::NotAccessible
                | ExErrorKind::NotModifiable
                | ExErrorKind::PreconditionFailed
        )
    }
}

/// Canonical structured error type
///
/// Carries a classification for programmatic handling plus optional context
/// (operation, entity, resource path, correlation) for debugging.
#[derive(Debug, Clone, PartialEq)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    path: Option<String>,
    correlation_id: Option<CorrelationId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            path: None,
            correlation_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity ID context
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add resource path context
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add correlation ID context
    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the entity ID context, if any
    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    /// Get the resource path context, if any
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Get the correlation ID context, if any
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.correlation_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path)?;
        }
        if let Some(correlation_id) = &self.correlation_id {
            write!(f, " (correlation_id: {})", correlation_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for command validation and event application
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TwinError {
    // ===== Command Errors =====
    /// Creation attempted against an entity that already exists
    #[error("Entity already exists: {entity_id}")]
    Conflict { entity_id: String },

    /// Entity is absent or logically deleted
    #[error("Entity not found: {entity_id}")]
    EntityNotFound { entity_id: String },

    /// Field addressed by the command does not exist
    #[error("Field {path} of entity {entity_id} is not accessible")]
    FieldNotAccessible { entity_id: String, path: String },

    /// Field is reserved or protected against modification
    #[error("Field {path} of entity {entity_id} cannot be modified: {reason}")]
    NotModifiable {
        entity_id: String,
        path: String,
        reason: String,
    },

    /// Expected revision header does not match the entity's revision
    #[error("Precondition failed for entity {entity_id}: expected revision {expected}, actual {actual}")]
    PreconditionFailed {
        entity_id: String,
        expected: u64,
        actual: u64,
    },

    /// No strategy applies to the command
    #[error("No strategy handles {command_kind} command for entity {entity_id}")]
    Unhandled {
        command_kind: String,
        entity_id: String,
    },

    // ===== Validation Errors =====
    /// Command payload has the wrong shape
    #[error("Invalid payload: {reason}")]
    InvalidPayload { reason: String },

    /// Entity id could not be parsed
    #[error("Invalid entity id '{value}': {reason}")]
    InvalidEntityId { value: String, reason: String },

    /// Resource path could not be parsed
    #[error("Invalid resource path '{value}': {reason}")]
    InvalidPath { value: String, reason: String },

    // ===== Generic Errors =====
    /// Serialization error (JSON encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<TwinError> for ExError {
    fn from(err: TwinError) -> Self {
        match err {
            TwinError::Conflict { entity_id } => ExError::new(ExErrorKind::Conflict)
                .with_entity_id(entity_id)
                .with_message("Entity already exists"),

            TwinError::EntityNotFound { entity_id } => ExError::new(ExErrorKind::NotFound)
                .with_entity_id(entity_id)
                .with_message("Entity not found"),

            TwinError::FieldNotAccessible { entity_id, path } => {
                ExError::new(ExErrorKind::NotAccessible)
                    .with_entity_id(entity_id)
                    .with_path(path)
                    .with_message("Field not accessible")
            }

            TwinError::NotModifiable {
                entity_id,
                path,
                reason,
            } => ExError::new(ExErrorKind::NotModifiable)
                .with_entity_id(entity_id)
                .with_path(path)
                .with_message(reason),

            TwinError::PreconditionFailed {
                entity_id,
                expected,
                actual,
            } => ExError::new(ExErrorKind::PreconditionFailed)
                .with_entity_id(entity_id)
                .with_message(format!(
                    "Expected revision {}, actual revision {}",
                    expected, actual
                )),

            TwinError::Unhandled {
                command_kind,
                entity_id,
            } => ExError::new(ExErrorKind::Unhandled)
                .with_entity_id(entity_id)
                .with_op("dispatch")
                .with_message(format!("No strategy handles {} command", command_kind)),

            TwinError::InvalidPayload { reason } => {
                ExError::new(ExErrorKind::InvalidInput).with_message(reason)
            }

            TwinError::InvalidEntityId { value, reason } => ExError::new(ExErrorKind::InvalidInput)
                .with_entity_id(value)
                .with_message(reason),

            TwinError::InvalidPath { value, reason } => ExError::new(ExErrorKind::InvalidInput)
                .with_path(value)
                .with_message(reason),

            TwinError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            TwinError::Internal { message } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}

/// Conversion from serde_json::Error to TwinError
impl From<serde_json::Error> for TwinError {
    fn from(err: serde_json::Error) -> Self {
        TwinError::Serialization {
            message: err.to_string(),
        }
    }
}
