use std::fmt;
use std::sync::Arc;

use docgate_protocol::Command;
use docgate_types::HashRecord;
use tracing::trace;

use crate::error::StoreResult;
use crate::traits::Executor;

/// Typed hash and stream operations over a shared [`Executor`].
#[derive(Clone)]
pub struct HashStore {
    executor: Arc<dyn Executor>,
}

impl HashStore {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    /// Set `fields` on the hash at `key`. Fields not named keep their
    /// previous values.
    pub async fn hmset(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
        trace!(key, fields = fields.len(), "HMSET");
        let pairs = fields.iter().map(|(f, v)| (f.as_str(), v.as_str()));
        let reply = self.executor.execute(Command::hmset(key, pairs)).await?;
        Ok(reply.expect_ok()?)
    }

    /// Read every field of the hash at `key`. A missing key reads as empty.
    pub async fn hgetall(&self, key: &str) -> StoreResult<HashRecord> {
        trace!(key, "HGETALL");
        let reply = self.executor.execute(Command::hgetall(key)).await?;
        Ok(reply.into_pairs()?.into_iter().collect())
    }

    /// Append `fields` to `stream` under a backend-assigned id, returning it.
    pub async fn xadd(&self, stream: &str, fields: &HashRecord) -> StoreResult<String> {
        trace!(stream, fields = fields.len(), "XADD");
        let reply = self.executor.execute(Command::xadd(stream, fields)).await?;
        Ok(reply.into_string()?)
    }

    pub async fn ping(&self) -> StoreResult<()> {
        let reply = self.executor.execute(Command::ping()).await?;
        reply.into_string()?;
        Ok(())
    }
}

impl fmt::Debug for HashStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashStore").finish_non_exhaustive()
    }
}
