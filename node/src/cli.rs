//! # Command-Line Interface
//!
//! Subcommand and flag definitions for the `consensus-node` binary, parsed
//! with `clap`'s derive API. Every flag has a matching `CONSENSUS_NODE_*`
//! environment variable fallback so the binary is equally comfortable run
//! by hand or from a container orchestrator's env-only config surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::LogFormat;

/// A single-process consensus validator node.
#[derive(Parser, Debug)]
#[command(name = "consensus-node", version, about, long_about = None)]
pub struct ConsensusNodeCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the node: bootstrap against the simulated quorum, then poll and
    /// finalize blocks on a fixed cadence until shut down.
    Run(RunArgs),
    /// Query a running node's `/status` endpoint and print a summary.
    /// Exits non-zero if the node is unreachable or reports unhealthy.
    Status(StatusArgs),
    /// Print the resolved consensus parameters for a config file/profile
    /// without starting the node.
    ShowConfig(ShowConfigArgs),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to a TOML config file. Unset fields fall back to the selected
    /// consensus profile's defaults.
    #[arg(long, env = "CONSENSUS_NODE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Consensus profile to start from when the config omits one.
    #[arg(long, env = "CONSENSUS_NODE_PROFILE", default_value = "local")]
    pub profile: String,

    /// HTTP port for the `/health`, `/status`, and `/metrics` endpoints.
    /// Overrides the config file's `network.api_port` when given.
    #[arg(long, env = "CONSENSUS_NODE_API_PORT")]
    pub api_port: Option<u16>,

    /// Number of simulated validators in the in-process quorum.
    #[arg(long, env = "CONSENSUS_NODE_VALIDATORS", default_value_t = 5)]
    pub validators: usize,

    /// Milliseconds between poll rounds.
    #[arg(long, env = "CONSENSUS_NODE_ROUND_INTERVAL_MS", default_value_t = 500)]
    pub round_interval_ms: u64,

    /// Log output format.
    #[arg(long, env = "CONSENSUS_NODE_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Default log level, overridden by `RUST_LOG` when set.
    #[arg(long, env = "CONSENSUS_NODE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl RunArgs {
    /// Parse `log_format` into a [`LogFormat`], defaulting to `Pretty` on
    /// an unrecognized value.
    pub fn log_format(&self) -> LogFormat {
        LogFormat::from_str_lossy(&self.log_format)
    }
}

#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Base URL of a running node's HTTP API.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    pub api_url: String,
}

#[derive(Parser, Debug)]
pub struct ShowConfigArgs {
    /// Path to a TOML config file. Unset fields fall back to the selected
    /// consensus profile's defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Consensus profile to start from when the config omits one.
    #[arg(long, default_value = "local")]
    pub profile: String,
}
