use anyhow::Result;
use clap::Parser;

use logkeep_daemon::app;
use logkeep_daemon::cli::DaemonCli;
use logkeep_daemon::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();
    let config = app::load_config(&cli).await?;

    if cli.validate {
        println!("configuration is valid");
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "logkeep starting");

    if let Err(e) = app::run(config).await {
        tracing::error!(error = ?e, "logkeep stopped with a fatal error");
        return Err(e);
    }
    Ok(())
}
