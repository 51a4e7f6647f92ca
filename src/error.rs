//! Error types for the message bus.
//!

use std::time::Duration;
use thiserror::Error;

use crate::messaging::MessageKind;

/// Every failure the bus can report to a caller.
///
/// Lookup failures (`WorkerNotFound`, `ChannelNotFound`) and handler outcomes
/// (`NoMatchingHandler`, `HandlerFailure`) are recoverable and travel back to
/// the caller inside a `RESPONSE`. Lifecycle variants describe misuse of the
/// facade itself.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Worker not found: {worker}")]
    WorkerNotFound { worker: String },

    #[error("Channel not found: {channel}")]
    ChannelNotFound { channel: String },

    #[error("No {kind} handler on worker '{worker}' matched the message")]
    NoMatchingHandler { worker: String, kind: MessageKind },

    #[error("Handler on worker '{worker}' failed: {reason}")]
    HandlerFailure { worker: String, reason: String },

    #[error("Worker '{worker}' is already registered")]
    DuplicateWorker { worker: String },

    #[error("Invalid handler declared on worker '{worker}': {reason}")]
    InvalidHandler { worker: String, reason: String },

    #[error("Message bus is already running")]
    AlreadyRunning,

    #[error("Message bus is not running")]
    NotRunning,

    #[error("Shutdown in progress")]
    ShutdownInProgress,

    #[error("No async runtime available: {0}")]
    RuntimeUnavailable(String),

    #[error("Reply handle dropped before a response was delivered")]
    ReplyDropped,

    #[error("Timeout error for operation {operation}: {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),
}

impl BusError {
    /// Whether this error was produced by a collaborator rather than the bus.
    pub fn is_handler_error(&self) -> bool {
        matches!(
            self,
            BusError::HandlerFailure { .. } | BusError::NoMatchingHandler { .. }
        )
    }

    /// Whether the addressed worker or channel was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BusError::WorkerNotFound { .. } | BusError::ChannelNotFound { .. }
        )
    }
}

pub type BusResult<T> = std::result::Result<T, BusError>;
