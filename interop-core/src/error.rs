//! Error types for the interop server

use thiserror::Error;

/// Top-level error type for the interop server
#[derive(Debug, Error)]
pub enum InteropError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors returned when scheduling work on a [`crate::DelayQueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Delay queue stalled: a scheduled task never signalled completion")]
    Stalled,

    #[error("Delay queue was cancelled")]
    Cancelled,

    #[error("Delay queue drain task is no longer running")]
    Closed,
}
