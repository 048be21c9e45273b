//! Error and status types for event handling.

use thiserror::Error;

/// Outcome of a queue or dispatch operation.
///
/// Only `Success` and `WaitAbort` are expected to reach a handler's dispatch
/// loop; the other values mean a precondition was violated somewhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventStatus {
    /// The operation completed.
    Success,
    /// A blocking wait was aborted on request.
    WaitAbort,
    /// A blocking wait returned without data or abort; retry.
    WaitError,
    /// A worker or timer thread could not be started.
    NotStarted,
    /// The event names a type the handler never registered.
    UnknownType,
    /// A non-blocking dequeue found nothing.
    NonePending,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::Success => write!(f, "success"),
            EventStatus::WaitAbort => write!(f, "wait_abort"),
            EventStatus::WaitError => write!(f, "wait_error"),
            EventStatus::NotStarted => write!(f, "not_started"),
            EventStatus::UnknownType => write!(f, "unknown_type"),
            EventStatus::NonePending => write!(f, "none_pending"),
        }
    }
}

/// Errors raised by event queues and handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// The consumer was asked to stop waiting.
    #[error("Event wait aborted")]
    WaitAbort,

    /// The wait ended without an event or an abort request.
    #[error("Event wait failed: {0}")]
    WaitError(String),

    /// A thread could not be spawned.
    #[error("Thread not started: {0}")]
    NotStarted(String),

    /// No dispatcher is registered for the event's type.
    #[error("Unknown event type: {0}")]
    UnknownType(String),

    /// The queue is empty.
    #[error("No event pending")]
    NonePending,
}

impl EventError {
    /// The status value equivalent to this error.
    pub fn status(&self) -> EventStatus {
        match self {
            EventError::WaitAbort => EventStatus::WaitAbort,
            EventError::WaitError(_) => EventStatus::WaitError,
            EventError::NotStarted(_) => EventStatus::NotStarted,
            EventError::UnknownType(_) => EventStatus::UnknownType,
            EventError::NonePending => EventStatus::NonePending,
        }
    }
}

/// Result type for event operations.
pub type EventResult<T> = Result<T, EventError>;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}
