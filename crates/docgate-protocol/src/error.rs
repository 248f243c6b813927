use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid reply type byte: {0:#04x}")]
    InvalidType(u8),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("backend error: {0}")]
    Server(String),

    #[error("unexpected reply: expected {expected}, got {got}")]
    UnexpectedReply { expected: &'static str, got: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
