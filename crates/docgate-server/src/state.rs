use std::sync::Arc;

use docgate_store::{Executor, HashStore};
use docgate_types::Doc;
use tracing::debug;

use crate::config::GatewayConfig;
use crate::error::ServerResult;
use crate::publisher::StreamPublisher;

/// Shared per-process state handed to every handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub store: HashStore,
    pub publisher: StreamPublisher,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    pub fn new(executor: Arc<dyn Executor>, config: GatewayConfig) -> Self {
        Self {
            store: HashStore::new(executor),
            publisher: StreamPublisher::from_config(&config),
            config: Arc::new(config),
        }
    }

    /// Write `fields` to the hash at `doc.key`, then mirror it if enabled.
    pub(crate) async fn persist(&self, doc: &Doc, fields: &[(String, String)]) -> ServerResult<()> {
        self.store.hmset(&doc.key, fields).await?;
        let entry = self.publisher.publish(&self.store, &doc.key).await?;
        debug!(
            key = %doc.key,
            datatype = %doc.datatype,
            date = %doc.date,
            fields = fields.len(),
            entry = entry.as_deref().unwrap_or("-"),
            "document written"
        );
        Ok(())
    }
}
