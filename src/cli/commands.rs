//! CLI definition for verify-tasks.
//!
//! Verifies every changed task under a root directory and writes the
//! pass/fail matrix to a JSON store.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::docker::{DEFAULT_COMPOSE_BIN, DEFAULT_DOCKER_BIN};
use crate::pipeline::Orchestrator;
use crate::runner::RunConfig;
use crate::storage::STDOUT_PATH;
use crate::utils::parse_duration;

/// Default per-solution timeout.
const DEFAULT_TIMEOUT: &str = "10m";

/// CTF task solution verifier.
#[derive(Parser, Debug)]
#[command(name = "verify-tasks")]
#[command(about = "Verify CTF task solutions against their flags")]
#[command(version)]
#[command(
    long_about = "verify-tasks runs every solution of every changed task under a directory and records whether its output contains the task flag.\n\nTasks whose content digest matches the stored one are skipped.\n\nExample usage:\n  verify-tasks --dir ./tasks --json results.json --timeout 5m"
)]
pub struct Cli {
    /// Root directory to scan for tasks.
    #[arg(long)]
    pub dir: PathBuf,

    /// Store file to read and update (`-` prints to stdout, no prior state).
    #[arg(long, default_value = STDOUT_PATH)]
    pub json: PathBuf,

    /// Time budget of each solution (e.g. 30s, 10m, 1h30m).
    #[arg(long, default_value = DEFAULT_TIMEOUT, value_parser = parse_duration)]
    pub timeout: Duration,

    /// Isolated network name (defaults to a fresh per-run name).
    #[arg(long)]
    pub network: Option<String>,

    /// Re-verify tasks even when their digest is unchanged.
    #[arg(long)]
    pub force: bool,

    /// docker binary.
    #[arg(long, env = "VERIFY_DOCKER", default_value = DEFAULT_DOCKER_BIN)]
    pub docker: String,

    /// compose binary, may include arguments (e.g. "docker compose").
    #[arg(long, env = "VERIFY_COMPOSE", default_value = DEFAULT_COMPOSE_BIN)]
    pub compose: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

impl Cli {
    /// Turns the parsed flags into run settings.
    pub fn run_config(&self) -> RunConfig {
        let mut config = RunConfig::new(&self.dir)
            .with_store_path(&self.json)
            .with_timeout(self.timeout)
            .with_force(self.force)
            .with_docker_bin(&self.docker)
            .with_compose_bin(&self.compose);
        if let Some(ref network) = self.network {
            config = config.with_run_id(network);
        }
        config
    }
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the run.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let config = cli.run_config();
    info!(
        dir = %config.root.display(),
        store = %config.store_path.display(),
        timeout = ?config.timeout,
        network = %config.network(),
        "Starting verification"
    );

    let summary = Orchestrator::new(config)
        .run()
        .await
        .with_context(|| format!("Verification of {} failed", cli.dir.display()))?;

    if summary.failed > 0 {
        tracing::warn!(failed = summary.failed, "Some tasks could not be verified");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["verify-tasks", "--dir", "./tasks"]).expect("should parse");

        assert_eq!(cli.dir, PathBuf::from("./tasks"));
        assert_eq!(cli.json, PathBuf::from("-"));
        assert_eq!(cli.timeout, Duration::from_secs(600));
        assert!(cli.network.is_none());
        assert!(!cli.force);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_all_options() {
        let cli = Cli::try_parse_from([
            "verify-tasks",
            "--dir",
            "t",
            "--json",
            "out.json",
            "--timeout",
            "1m30s",
            "--network",
            "verify-ci",
            "--force",
            "--docker",
            "podman",
            "--compose",
            "podman compose",
            "-l",
            "debug",
        ])
        .expect("should parse");

        let config = cli.run_config();
        assert_eq!(config.store_path, PathBuf::from("out.json"));
        assert_eq!(config.timeout, Duration::from_secs(90));
        assert_eq!(config.network(), "verify-ci");
        assert!(config.force);
        assert_eq!(config.docker_bin, "podman");
        assert_eq!(config.compose_bin, "podman compose");
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn test_dir_required() {
        assert!(Cli::try_parse_from(["verify-tasks"]).is_err());
    }

    #[test]
    fn test_malformed_timeout_rejected() {
        let result = Cli::try_parse_from(["verify-tasks", "--dir", "t", "--timeout", "soon"]);
        assert!(result.is_err());
        let result = Cli::try_parse_from(["verify-tasks", "--dir", "t", "--timeout", "0s"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_generated_network_when_not_given() {
        let cli = Cli::try_parse_from(["verify-tasks", "--dir", "t"]).expect("should parse");
        assert!(cli.run_config().network().starts_with("verify-"));
    }
}
