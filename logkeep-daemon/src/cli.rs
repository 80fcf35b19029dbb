//! CLI argument definitions for logkeep-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Docker container log collector.
///
/// Attaches to running containers and writes each container's output to a
/// size-rotated file under the configured log directory.
#[derive(Parser, Debug, Default)]
#[command(name = "logkeep")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to a logkeep.toml configuration file.
    ///
    /// Without it, configuration comes from defaults and environment variables.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without starting collection.
    #[arg(long)]
    pub validate: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        DaemonCli::command().debug_assert();
    }

    #[test]
    fn no_arguments_means_env_only() {
        let cli = DaemonCli::try_parse_from(["logkeep"]).unwrap();
        assert!(cli.config.is_none());
        assert!(cli.log_level.is_none());
        assert!(!cli.validate);
    }

    #[test]
    fn all_flags_parse() {
        let cli = DaemonCli::try_parse_from([
            "logkeep",
            "-c",
            "/etc/logkeep/logkeep.toml",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
            "--validate",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/logkeep/logkeep.toml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.log_format.as_deref(), Some("pretty"));
        assert!(cli.validate);
    }
}
