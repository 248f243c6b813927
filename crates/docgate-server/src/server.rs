use std::sync::Arc;

use docgate_store::Executor;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// The document gateway HTTP server.
pub struct GatewayServer {
    state: AppState,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, executor: Arc<dyn Executor>) -> Self {
        Self {
            state: AppState::new(executor, config),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.state.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Bind the configured address and serve until the process exits.
    pub async fn serve(self) -> ServerResult<()> {
        let listener = TcpListener::bind(self.state.config.listen_addr).await?;
        self.serve_on(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve_on(self, listener: TcpListener) -> ServerResult<()> {
        tracing::info!(
            addr = %listener.local_addr()?,
            stream_out = self.state.publisher.is_enabled(),
            "docgate listening"
        );
        axum::serve(listener, self.router())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}
