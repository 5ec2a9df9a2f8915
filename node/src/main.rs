// Copyright (c) 2026 Consensus Core Contributors. MIT License.
// See LICENSE for details.

//! # Consensus Node
//!
//! Entry point for the `consensus-node` binary. Wires the engine's five
//! capability traits to an in-process simulated quorum, drives bootstrap
//! and the steady-state poll loop, and serves an HTTP API for health,
//! status, and Prometheus metrics.
//!
//! The binary supports three subcommands:
//!
//! - `run`         — start the node
//! - `status`      — query a running node's `/status` endpoint
//! - `show-config` — print resolved consensus parameters without starting

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;

use consensus_core::consensus::engine::Engine;
use consensus_core::id::Id;

use consensus_node::api::{self, AppState};
use consensus_node::cli::{Commands, ConsensusNodeCli, RunArgs, ShowConfigArgs, StatusArgs};
use consensus_node::config::NodeConfig;
use consensus_node::logging;
use consensus_node::metrics::NodeMetrics;
use consensus_node::runtime::{Runtime, RuntimeConfig};
use consensus_node::sim::{DemoSender, DemoValidatorSet, DemoVm, SystemClock};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ConsensusNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Status(args) => query_status(args).await,
        Commands::ShowConfig(args) => show_config(args),
    }
}

// ---------------------------------------------------------------------------
// run — full node startup sequence
// ---------------------------------------------------------------------------

/// Starts the node: logging, engine, simulated quorum, round loop, and
/// HTTP API, then blocks until a shutdown signal arrives.
///
/// Startup sequence:
/// 1.  Parse CLI args (already done)
/// 2.  Initialize logging
/// 3.  Load config file and resolve consensus parameters
/// 4.  Construct the simulated quorum (VM, sender, validator set, clock)
/// 5.  Construct the engine and runtime
/// 6.  Bootstrap against the simulated quorum
/// 7.  Spawn the round loop
/// 8.  Start the HTTP API
/// 9.  Await shutdown
/// 10. Graceful shutdown
async fn run_node(args: RunArgs) -> Result<()> {
    logging::init_logging(&args.log_level, args.log_format());

    let mut node_config = NodeConfig::load(args.config.as_deref())
        .context("failed to load node configuration")?;
    if node_config.consensus.profile.is_none() {
        node_config.consensus.profile = Some(args.profile.clone());
    }
    let params = node_config
        .resolve_parameters()
        .context("failed to resolve consensus parameters")?;

    let validator_count = args.validators.max(node_config.simulation.validator_count);
    let round_interval = Duration::from_millis(args.round_interval_ms);
    let api_port = args.api_port.unwrap_or(node_config.network.api_port);

    tracing::info!(
        api_port,
        validators = args.validators,
        round_interval_ms = args.round_interval_ms,
        profile = %args.profile,
        "starting consensus-node"
    );

    let engine_id = Id::from_content(b"consensus-node/engine");
    let subnet_id = Id::from_content(b"consensus-node/subnet");

    let vm = Arc::new(DemoVm::new());
    let sender = Arc::new(DemoSender::new(vm.clone()));
    let validators = Arc::new(DemoValidatorSet::new(validator_count));
    let clock = Arc::new(SystemClock);
    let metrics = Arc::new(NodeMetrics::new());

    tracing::info!(
        k = params.k,
        alpha_pref = params.alpha_pref,
        alpha_conf = params.alpha_conf,
        beta = params.beta,
        validators = validator_count,
        "consensus engine configured"
    );

    let engine = Engine::new(
        params,
        engine_id,
        subnet_id,
        vm.clone(),
        sender.clone(),
        validators,
        clock,
        metrics.clone(),
    );

    let runtime = Arc::new(Runtime::new(
        engine,
        sender,
        vm,
        metrics.clone(),
        RuntimeConfig {
            round_interval,
            propose_every_n_rounds: node_config.simulation.propose_every_n_rounds,
        },
    ));

    runtime
        .bootstrap()
        .await
        .context("engine failed to bootstrap against the simulated quorum")?;
    tracing::info!("bootstrap complete, entering steady-state polling");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let loop_runtime = runtime.clone();
    let round_loop = tokio::spawn(async move { loop_runtime.run(shutdown_rx).await });

    let state = AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        runtime: runtime.clone(),
        metrics,
    };
    let router = api::build_router(state);

    let addr = format!("0.0.0.0:{}", api_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind API listener on {addr}"))?;

    print_startup_banner(&addr, validator_count, args.round_interval_ms);

    let server = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal());
    server.await.context("API server failed")?;

    tracing::info!("API server stopped, signalling round loop to stop");
    shutdown_tx.send(true).ok();
    round_loop.await.context("round loop task panicked")?;

    tracing::info!("consensus-node shut down cleanly");
    Ok(())
}

// ---------------------------------------------------------------------------
// status — query a running node
// ---------------------------------------------------------------------------

async fn query_status(args: StatusArgs) -> Result<()> {
    let url = format!("{}/status", args.api_url.trim_end_matches('/'));
    let body = reqwest_get_stub(&url).await?;

    let json: serde_json::Value = serde_json::from_str(&body)
        .with_context(|| format!("node at {} returned a non-JSON response", args.api_url))?;

    println!("Node Status");
    if let Some(version) = json.get("version").and_then(|v| v.as_str()) {
        println!("  Version              : {}", version);
    }
    if let Some(state) = json.get("state").and_then(|v| v.as_str()) {
        println!("  Engine State         : {}", state);
    }
    if let Some(bootstrapped) = json.get("bootstrapped").and_then(|v| v.as_bool()) {
        println!("  Bootstrapped         : {}", bootstrapped);
    }
    if let Some(last_accepted) = json.get("last_accepted").and_then(|v| v.as_str()) {
        println!("  Last Accepted        : {}", last_accepted);
    }
    let stalled = json.get("stalled_count").and_then(|v| v.as_u64()).unwrap_or(0);
    println!("  Stalled Blocks       : {}", stalled);

    let healthy = stalled == 0
        && json
            .get("state")
            .and_then(|v| v.as_str())
            .map(|s| s != "Stopped")
            .unwrap_or(false);

    if !healthy {
        anyhow::bail!("node at {} is unhealthy", args.api_url);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// show-config — resolve and print consensus parameters
// ---------------------------------------------------------------------------

fn show_config(args: ShowConfigArgs) -> Result<()> {
    let mut node_config =
        NodeConfig::load(args.config.as_deref()).context("failed to load node configuration")?;
    if node_config.consensus.profile.is_none() {
        node_config.consensus.profile = Some(args.profile);
    }
    let params = node_config
        .resolve_parameters()
        .context("failed to resolve consensus parameters")?;

    println!("Resolved consensus parameters:");
    println!("  k                       = {}", params.k);
    println!("  alpha_pref              = {}", params.alpha_pref);
    println!("  alpha_conf              = {}", params.alpha_conf);
    println!("  beta                    = {}", params.beta);
    println!("  concurrent_polls        = {}", params.concurrent_polls);
    println!("  optimal_processing      = {}", params.optimal_processing);
    println!("  max_outstanding         = {}", params.max_outstanding);
    println!(
        "  max_item_processing_time = {:?}",
        params.max_item_processing_time
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Startup banner
// ---------------------------------------------------------------------------

/// Prints the node startup banner with a configuration summary.
fn print_startup_banner(api_addr: &str, validator_count: usize, round_interval_ms: u64) {
    let lines = [
        format!("  API:          http://{}", api_addr),
        format!("  Validators:   {} (simulated)", validator_count),
        format!("  Round every:  {} ms", round_interval_ms),
    ];

    let title = format!(
        "  Consensus Node \u{2014} v{}",
        env!("CARGO_PKG_VERSION")
    );

    let max_width = lines
        .iter()
        .map(|l| l.len())
        .chain(std::iter::once(title.len()))
        .max()
        .unwrap_or(50)
        + 4;

    let border = "\u{2550}".repeat(max_width);

    println!();
    println!("\u{2554}{}\u{2557}", border);
    println!("\u{2551}  {:<width$}  \u{2551}", title.trim(), width = max_width - 4);
    println!("\u{2560}{}\u{2563}", border);
    for line in &lines {
        println!("\u{2551}  {:<width$}  \u{2551}", line.trim(), width = max_width - 4);
    }
    println!("\u{255A}{}\u{255D}", border);
    println!();
}

// ---------------------------------------------------------------------------
// Shutdown signal
// ---------------------------------------------------------------------------

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

// ---------------------------------------------------------------------------
// Minimal HTTP client
// ---------------------------------------------------------------------------

/// Minimal HTTP GET without pulling in `reqwest` as a dependency.
/// In a real deployment, swap this for a proper HTTP client.
async fn reqwest_get_stub(url: &str) -> Result<String> {
    let parsed: url::Url = url
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid URL: {}", e))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("missing host in URL"))?;
    let port = parsed.port().unwrap_or(80);
    let path = parsed.path();

    let addr = format!("{}:{}", host, port);
    let mut stream = tokio::net::TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, host,
    );

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    stream.write_all(request.as_bytes()).await?;
    stream.shutdown().await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let response = String::from_utf8_lossy(&buf);

    // Strip HTTP headers — everything after the first blank line is the body.
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_else(|| response.to_string());

    Ok(body)
}

/// Minimal URL parser — just enough to extract host/port/path.
/// Avoids pulling in the `url` crate for a single use.
mod url {
    pub struct Url {
        host: String,
        port: Option<u16>,
        path: String,
    }

    impl Url {
        pub fn host_str(&self) -> Option<&str> {
            Some(&self.host)
        }

        pub fn port(&self) -> Option<u16> {
            self.port
        }

        pub fn path(&self) -> &str {
            &self.path
        }
    }

    impl std::str::FromStr for Url {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            // Strip scheme.
            let rest = s
                .strip_prefix("http://")
                .or_else(|| s.strip_prefix("https://"))
                .unwrap_or(s);

            let (authority, path) = match rest.find('/') {
                Some(i) => (&rest[..i], &rest[i..]),
                None => (rest, "/"),
            };

            let (host, port) = match authority.rfind(':') {
                Some(i) => {
                    let p = authority[i + 1..]
                        .parse::<u16>()
                        .map_err(|e| format!("bad port: {}", e))?;
                    (authority[..i].to_string(), Some(p))
                }
                None => (authority.to_string(), None),
            };

            Ok(Url {
                host,
                port,
                path: path.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::url::Url;
    use std::str::FromStr;

    #[test]
    fn url_parses_host_port_and_path() {
        let parsed = Url::from_str("http://127.0.0.1:8080/status").unwrap();
        assert_eq!(parsed.host_str(), Some("127.0.0.1"));
        assert_eq!(parsed.port(), Some(8080));
        assert_eq!(parsed.path(), "/status");
    }

    #[test]
    fn url_defaults_path_to_root() {
        let parsed = Url::from_str("http://example.com").unwrap();
        assert_eq!(parsed.path(), "/");
        assert_eq!(parsed.port(), None);
    }
}
