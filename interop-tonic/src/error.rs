use interop_core::InteropError;
use thiserror::Error;

/// Errors from writing to a call's response side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CallError {
    /// The call was already finished or failed.
    #[error("call already terminated")]
    AlreadyTerminated,
    /// Nobody is reading the response stream anymore.
    #[error("response stream closed by the peer")]
    Closed,
}

/// Errors that stop the server from serving.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("invalid listen address '{addr}': {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ServeError> for InteropError {
    fn from(err: ServeError) -> Self {
        match err {
            ServeError::InvalidAddress { .. } => InteropError::Configuration(err.to_string()),
            ServeError::Transport(_) | ServeError::Io(_) => InteropError::Internal(err.to_string()),
        }
    }
}
