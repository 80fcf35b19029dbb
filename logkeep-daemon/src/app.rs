//! Daemon lifecycle -- configuration loading, startup checks, and shutdown.
//!
//! # Startup Order
//!
//! 1. Load configuration (file, environment, CLI overrides) and validate
//! 2. Create the log directory
//! 3. Connect to the Docker daemon and verify it responds
//! 4. Install the Prometheus recorder (when enabled)
//! 5. Run the supervisor until SIGINT/SIGTERM
//!
//! Any failure before step 5, and a failed initial container listing,
//! is fatal and makes the process exit with status 1.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal::unix::{Signal, SignalKind, signal};

use logkeep_collector::{
    BollardDockerClient, CollectorSettings, DockerClient, ShutdownReport, SupervisorBuilder,
};
use logkeep_core::config::LogkeepConfig;
use logkeep_core::error::LogkeepError;

use crate::cli::DaemonCli;
use crate::metrics_server;

/// Load configuration from the file given on the command line, or from the
/// environment when no file is given, then apply CLI overrides.
pub async fn load_config(cli: &DaemonCli) -> Result<LogkeepConfig> {
    let mut config = match &cli.config {
        Some(path) => LogkeepConfig::load(path)
            .await
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => LogkeepConfig::from_env().context("invalid configuration in environment")?,
    };

    apply_cli_overrides(&mut config, cli);
    config
        .validate()
        .context("invalid command-line override")?;
    Ok(config)
}

/// CLI flags take precedence over the file and the environment.
pub fn apply_cli_overrides(config: &mut LogkeepConfig, cli: &DaemonCli) {
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
}

/// Create the log directory if it does not exist.
pub async fn prepare_log_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    tracing::info!(path = %dir.display(), "log directory ready");
    Ok(())
}

/// Connect to Docker and run the collector until a shutdown signal arrives.
pub async fn run(config: LogkeepConfig) -> Result<ShutdownReport> {
    let signals = ShutdownSignals::install()?;

    prepare_log_dir(&config.collector.log_dir_path()).await?;

    let docker = BollardDockerClient::connect(&config.collector.docker_socket)
        .map_err(LogkeepError::from)
        .context("failed to create docker client")?;
    docker
        .ping()
        .await
        .map_err(LogkeepError::from)
        .context("docker daemon is not reachable")?;
    tracing::info!("connected to docker daemon");

    if config.metrics.enabled {
        metrics_server::install_metrics_recorder(&config.metrics)?;
    }

    let shutdown = async move {
        let signal = signals.recv().await;
        tracing::info!(signal, "shutdown signal received, stopping log collection");
    };

    run_with_client(&config, Arc::new(docker), shutdown).await
}

/// Run the supervisor with the given client until `shutdown` completes.
///
/// The log directory must already exist.
pub async fn run_with_client<D, F>(
    config: &LogkeepConfig,
    docker: Arc<D>,
    shutdown: F,
) -> Result<ShutdownReport>
where
    D: DockerClient,
    F: Future<Output = ()> + Send,
{
    let settings = CollectorSettings::from_core(&config.collector);
    tracing::info!(
        log_dir = %settings.log_dir.display(),
        targets = ?settings.filter.tokens(),
        max_size_bytes = settings.rotation.max_size_bytes,
        max_backups = settings.rotation.max_backups,
        "starting log collection"
    );

    let supervisor = SupervisorBuilder::new()
        .settings(settings)
        .docker_client(docker)
        .build()
        .map_err(LogkeepError::from)
        .context("failed to build collector")?;

    let report = supervisor
        .run(shutdown)
        .await
        .map_err(LogkeepError::from)
        .context("log collection failed")?;

    tracing::info!(
        drained = report.drained,
        aborted = report.aborted,
        "logkeep shut down"
    );
    Ok(report)
}

/// SIGTERM and SIGINT handlers, installed up front so a failure is a startup error.
pub struct ShutdownSignals {
    sigterm: Signal,
    sigint: Signal,
}

impl ShutdownSignals {
    /// Install both handlers.
    pub fn install() -> Result<Self> {
        let sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
        let sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;
        Ok(Self { sigterm, sigint })
    }

    /// Wait for the first signal and return its name.
    pub async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_replace_general_settings() {
        let mut config = LogkeepConfig::default();
        let cli = DaemonCli {
            log_level: Some("debug".to_owned()),
            log_format: Some("pretty".to_owned()),
            ..Default::default()
        };
        apply_cli_overrides(&mut config, &cli);
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "pretty");
    }

    #[test]
    fn absent_cli_flags_keep_config() {
        let mut config = LogkeepConfig::default();
        apply_cli_overrides(&mut config, &DaemonCli::default());
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
    }

    #[tokio::test]
    async fn prepare_log_dir_creates_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/logs");
        prepare_log_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn prepare_log_dir_fails_on_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        let err = prepare_log_dir(&file.join("logs")).await.unwrap_err();
        assert!(err.to_string().contains("failed to create log directory"));
    }
}
