//! Interactive CLI demo of the consensus engine's lifecycle.
//!
//! Walks a small in-process simulated quorum through bootstrap and several
//! rounds of linear-chain proposal and finalization, narrating each step.
//! The output uses ANSI escape codes for colored, storytelling-style
//! terminal rendering.
//!
//! Run with:
//!   cargo run --example demo -p consensus-node --release

use std::sync::Arc;
use std::time::Instant;

use consensus_core::consensus::engine::{Engine, EngineState};
use consensus_core::consensus::interfaces::Vm;
use consensus_core::consensus::params::Parameters;
use consensus_core::id::Id;

use consensus_node::metrics::NodeMetrics;
use consensus_node::runtime::{Runtime, RuntimeConfig};
use consensus_node::sim::{DemoSender, DemoValidatorSet, DemoVm, SystemClock};

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

const BG_BLUE: &str = "\x1b[44m";

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn banner() {
    println!();
    println!(
        "{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}    CONSENSUS CORE  --  Engine Lifecycle Demo                       {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}    Snow-family BFT voting over an in-process simulated quorum      {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}"
    );
    println!();
}

fn section(num: u32, title: &str) {
    println!();
    println!(
        "{BOLD}{CYAN}===[{YELLOW} Step {num} {CYAN}]=============================================================={RESET}"
    );
    println!("{BOLD}{WHITE}  {title}{RESET}");
    println!(
        "{CYAN}------------------------------------------------------------------------{RESET}"
    );
}

fn subsection(text: &str) {
    println!("{DIM}{CYAN}  >> {text}{RESET}");
}

fn success(text: &str) {
    println!("{GREEN}  [OK] {text}{RESET}");
}

fn info(label: &str, value: &str) {
    println!("{WHITE}  {BOLD}{label}:{RESET} {YELLOW}{value}{RESET}");
}

fn timing(label: &str, elapsed: std::time::Duration) {
    let ms = elapsed.as_secs_f64() * 1000.0;
    println!("{DIM}\x1b[35m  [{label}: {ms:.2} ms]{RESET}");
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    banner();

    section(1, "Configure a five-validator simulated quorum");
    let params = Parameters::new(
        4,
        3,
        3,
        4,
        2,
        10,
        100,
        std::time::Duration::from_secs(5),
    )
    .expect("demo parameters are valid");
    info("k (sample size)", &params.k.to_string());
    info("alpha_pref / alpha_conf", &format!("{} / {}", params.alpha_pref, params.alpha_conf));
    info("beta (finalization streak)", &params.beta.to_string());
    success("consensus parameters validated");

    let vm = Arc::new(DemoVm::new());
    let sender = Arc::new(DemoSender::new(vm.clone()));
    let validators = Arc::new(DemoValidatorSet::new(5));
    let clock = Arc::new(SystemClock);
    let metrics = Arc::new(NodeMetrics::new());

    let engine = Engine::new(
        params,
        Id::from_content(b"demo/engine"),
        Id::from_content(b"demo/subnet"),
        vm.clone(),
        sender.clone(),
        validators,
        clock,
        metrics.clone(),
    );
    let runtime = Runtime::new(engine, sender, vm.clone(), metrics, RuntimeConfig {
        round_interval: std::time::Duration::from_millis(0),
        propose_every_n_rounds: 1,
    });
    success("engine constructed in Initializing state");

    section(2, "Bootstrap: resolve the accepted frontier");
    subsection("sampling seed peers and requesting their accepted frontier");
    let start = Instant::now();
    runtime.bootstrap().await.expect("bootstrap should complete against an honest simulated quorum");
    timing("bootstrap", start.elapsed());
    {
        let engine = runtime.engine_handle();
        let state = engine.lock().await.state();
        info("engine state", &format!("{state:?}"));
    }
    success("bootstrap complete, chain primed from the VM's genesis");

    section(3, "Propose and finalize a linear chain");
    for round in 1..=6u64 {
        let start = Instant::now();
        let report = runtime.run_round().await.expect("round should apply cleanly");
        let elapsed = start.elapsed();
        let tip = vm.last_accepted();
        subsection(&format!(
            "round {round}: last accepted = {}",
            if tip.is_empty() { "<genesis>".to_string() } else { tip.to_hex()[..12].to_string() }
        ));
        timing(&format!("round {round}"), elapsed);
        if !report.stalled.is_empty() {
            println!("{DIM}{CYAN}     stalled blocks: {}{RESET}", report.stalled.len());
        }
    }
    success("finished six poll rounds");

    section(4, "Final health check");
    let engine = runtime.engine_handle();
    let report = engine.lock().await.health_check();
    info("state", &format!("{:?}", report.state));
    info("bootstrapped", &report.bootstrapped.to_string());
    info(
        "last accepted",
        &report.last_accepted.map(|id| id.to_hex()).unwrap_or_else(|| "<none>".to_string()),
    );
    info("stalled blocks", &report.stalled.len().to_string());
    if report.is_healthy() {
        success("engine reports healthy");
    } else {
        println!("{DIM}{CYAN}  engine reports unhealthy{RESET}");
    }

    assert_eq!(engine.lock().await.state(), EngineState::NormalOp);
    println!();
}
