//! # Error Types
//!
//! Errors surfaced by the bus itself and errors raised by handlers.
//!
//! Handler errors never leave the bus: they are contained at the fan-out
//! and consumer-loop level and only show up in logs and dispatch reports.
//! `BusError` is what callers of `publish`/`send`/`dequeue` can observe.

use thiserror::Error;

/// Errors returned to callers of bus operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The cooperative cancellation signal fired before the work started.
    #[error("Operation cancelled")]
    Cancelled,

    /// The bus or queue was disposed; no further operations are accepted.
    #[error("Message bus has been disposed")]
    Disposed,

    /// A background consumer had to be spawned outside a tokio runtime.
    #[error("No tokio runtime available to spawn consumer for {message_type}")]
    RuntimeUnavailable { message_type: &'static str },

    /// A type-keyed table held an entry of the wrong type.
    #[error("Internal type mismatch for {message_type}")]
    TypeMismatch { message_type: &'static str },

    /// The serialization strategy failed to encode or decode a message.
    #[error("Serialization failed for {message_type}: {reason}")]
    Serialization {
        message_type: &'static str,
        reason: String,
    },
}

/// Result type used by bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Errors raised by a handler or a pipeline behavior.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler reported a failure.
    #[error("Handler failed: {0}")]
    Failed(String),

    /// The handler observed the cancellation signal and stopped.
    #[error("Handler cancelled")]
    Cancelled,

    /// The handler panicked while its future was being polled.
    #[error("Handler panicked: {0}")]
    Panicked(String),

    /// Any other error type a handler wants to propagate.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Convenience constructor for a plain failure message.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    /// Whether this error is the cancellation signal rather than a failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type returned by handlers and behaviors.
pub type HandlerResult = Result<(), HandlerError>;
