//! pagelift entry point.
//!
//! Configuration is read from the file given by `--config` (or
//! `PAGELIFT_CONFIG`), then `PAGELIFT__*` environment variables, then the
//! remaining command line flags. See [`pagelift_gateway::config`].

use anyhow::Context;
use clap::Parser;
use pagelift_gateway::cli::Cli;
use pagelift_gateway::config::GatewayConfig;
use pagelift_gateway::server::PageliftServer;
use pagelift_gateway::telemetry;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config =
        GatewayConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply(&mut config);
    config.validate()?;

    telemetry::init_tracing(config.log_format)?;
    info!(
        model = %config.load_config(),
        preload = config.model.preload,
        idle_threshold_secs = config.idle.threshold_secs,
        "starting pagelift"
    );

    PageliftServer::new(config)
        .start()
        .await
        .context("server error")?;
    Ok(())
}
