use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("backend unavailable at {addr}: {source}")]
    BackendUnavailable {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PoolResult<T> = Result<T, PoolError>;
