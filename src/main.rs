use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use quake_relay::{telemetry, ConnectionSupervisor, Settings, StdoutSink, TungsteniteConnector};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "quake-relay", version, about = "Relays JMA EEW and P2PQuake bulletins to stdout")]
struct Cli {
    /// Settings file (toml/yaml/json). Defaults to ./quake-relay.* if present.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// tracing filter, overrides telemetry.log_filter (RUST_LOG still wins)
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    let filter = cli.log_filter.as_deref().unwrap_or(&settings.telemetry.log_filter);
    telemetry::init_tracing(filter);
    telemetry::init_metrics(settings.telemetry.metrics_port)?;

    let supervisor = ConnectionSupervisor::start(
        &settings.feeds,
        Arc::new(TungsteniteConnector),
        Arc::new(StdoutSink),
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    supervisor.shutdown().await;
    Ok(())
}
