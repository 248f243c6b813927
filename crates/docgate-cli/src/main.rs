use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod run;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose);
    run::run(cli).await
}

/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `--verbose`.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
