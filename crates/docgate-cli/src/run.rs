use std::sync::Arc;

use anyhow::Context;
use docgate_pool::ConnectionPool;
use docgate_server::GatewayServer;
use tracing::info;

use crate::cli::Cli;

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let pool_config = cli.pool_config();
    let gateway_config = cli.gateway_config();
    info!(
        backend = %pool_config.addr,
        pool_size = pool_config.size,
        scale_factor = pool_config.scale_factor,
        flush_size = pool_config.flush_size,
        flush_interval = ?pool_config.flush_interval,
        ping_interval = ?pool_config.ping_interval,
        stream_out = gateway_config.stream_out,
        stream_name = %gateway_config.stream_name,
        "starting docgate"
    );

    let addr = pool_config.addr.clone();
    let pool = ConnectionPool::connect(pool_config)
        .await
        .with_context(|| format!("failed to connect to backend at {addr}"))?;
    let server = GatewayServer::new(gateway_config, Arc::new(pool));

    if cli.run_once {
        let _router = server.router();
        info!("run-once set, exiting after startup");
        return Ok(());
    }

    server.serve().await.context("HTTP server failed")
}
