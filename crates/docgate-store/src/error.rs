use std::time::Duration;

use docgate_protocol::ProtocolError;

/// Errors from backend command execution.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend answered with an error reply.
    #[error("backend rejected command: {0}")]
    Command(String),

    /// The reply could not be framed or had an unexpected shape.
    #[error("protocol error: {0}")]
    Protocol(ProtocolError),

    /// The connection carrying the command went away before it was answered.
    #[error("connection closed before reply")]
    ConnectionClosed,

    /// No live backend connection is available.
    #[error("no backend connection available")]
    Unavailable,

    /// The outstanding-command buffer stayed full for the whole wait.
    #[error("connection pool exhausted after waiting {waited:?}")]
    PoolExhausted { waited: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether the failure is about capacity rather than the command itself.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable | Self::PoolExhausted { .. })
    }
}

impl From<ProtocolError> for StoreError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::Server(message) => Self::Command(message),
            ProtocolError::Io(io) => Self::Io(io),
            other => Self::Protocol(other),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
