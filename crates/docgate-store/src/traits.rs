use async_trait::async_trait;
use docgate_protocol::{Command, Reply};

use crate::error::StoreResult;

/// Executes backend commands.
///
/// Implementations must satisfy these invariants:
/// - `execute` is safe to call concurrently from any number of tasks.
/// - Each call resolves to the reply for exactly the command it was given,
///   even when the implementation batches commands on the wire.
/// - Error replies from the backend are returned as `Ok(Reply::Error(_))`;
///   `Err` is reserved for failures to obtain a reply at all.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, command: Command) -> StoreResult<Reply>;
}
