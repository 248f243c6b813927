use docgate_store::{HashStore, StoreResult};
use tracing::debug;

use crate::config::GatewayConfig;

/// Mirrors freshly written hash records onto an append-only stream.
///
/// The record is read back after the write so the stream entry carries the
/// full merged field set, not just the fields of the latest request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamPublisher {
    stream: Option<String>,
}

impl StreamPublisher {
    pub fn new(stream: impl Into<String>) -> Self {
        Self {
            stream: Some(stream.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { stream: None }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        if config.stream_out {
            Self::new(config.stream_name.clone())
        } else {
            Self::disabled()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.stream.is_some()
    }

    /// Append the record at `key` to the stream and return the entry id.
    ///
    /// Disabled publishers return `None` without touching the backend.
    pub async fn publish(&self, store: &HashStore, key: &str) -> StoreResult<Option<String>> {
        let Some(stream) = &self.stream else {
            return Ok(None);
        };
        let record = store.hgetall(key).await?;
        let id = store.xadd(stream, &record).await?;
        debug!(key, stream = %stream, id = %id, "record mirrored");
        Ok(Some(id))
    }
}
