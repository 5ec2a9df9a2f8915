//! # Consensus Runtime
//!
//! Drives the engine's bootstrap handshake and then its steady-state
//! poll/propose loop on a fixed cadence, the way a real deployment's
//! network receive loop would, except here the "network" is the in-process
//! simulated quorum in [`crate::sim`].
//!
//! A config struct with sane defaults, a hand-written error type (not
//! `thiserror` — this is binary-local plumbing, not a library error
//! surface), and a `run` method that races a shutdown signal against each
//! round's sleep.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};

use consensus_core::consensus::engine::{Engine, EngineError, EngineState, HealthReport};
use consensus_core::consensus::interfaces::Vm;

use crate::metrics::NodeMetrics;
use crate::sim::{DemoSender, DemoValidatorSet, DemoVm, SystemClock};

/// The concrete engine type this node runs: every capability traded in for
/// its in-process simulated counterpart.
pub type DemoEngine = Engine<DemoVm, DemoSender, DemoValidatorSet, SystemClock, NodeMetrics>;

/// Tuning knobs for the round loop.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Delay between successive poll rounds.
    pub round_interval: Duration,
    /// Propose a new block once every this many rounds. `1` means every
    /// round proposes, matching a chain that always has fresh work.
    pub propose_every_n_rounds: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            round_interval: Duration::from_millis(500),
            propose_every_n_rounds: 3,
        }
    }
}

/// Errors from driving the runtime loop. Hand-written rather than derived:
/// this type never crosses the library boundary, so it follows the
/// binary's own error-handling idiom instead of the core crate's.
#[derive(Debug)]
pub enum RuntimeError {
    /// The engine rejected an operation given its current lifecycle state.
    Engine(EngineError),
    /// `start()` never completed bootstrap within the configured attempts.
    BootstrapIncomplete,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Engine(e) => write!(f, "engine error: {e}"),
            RuntimeError::BootstrapIncomplete => {
                write!(f, "bootstrap did not complete")
            }
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Engine(e) => Some(e),
            RuntimeError::BootstrapIncomplete => None,
        }
    }
}

impl From<EngineError> for RuntimeError {
    fn from(e: EngineError) -> Self {
        RuntimeError::Engine(e)
    }
}

/// Owns the engine plus the simulated collaborators it was constructed
/// with, and runs the round loop that stands in for a real node's network
/// receive loop and block timer.
pub struct Runtime {
    engine: Arc<Mutex<DemoEngine>>,
    sender: Arc<DemoSender>,
    vm: Arc<DemoVm>,
    metrics: Arc<NodeMetrics>,
    config: RuntimeConfig,
    round_counter: AtomicU64,
}

impl Runtime {
    /// Wrap an already-constructed engine and its simulated collaborators.
    pub fn new(
        engine: DemoEngine,
        sender: Arc<DemoSender>,
        vm: Arc<DemoVm>,
        metrics: Arc<NodeMetrics>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            sender,
            vm,
            metrics,
            config,
            round_counter: AtomicU64::new(0),
        }
    }

    /// A cloneable handle to the engine, for the HTTP API's status/health
    /// endpoints to read without going through the round loop.
    pub fn engine_handle(&self) -> Arc<Mutex<DemoEngine>> {
        self.engine.clone()
    }

    /// Drive the bootstrap handshake to completion against the simulated
    /// quorum. The simulated sender answers every request synchronously,
    /// so this resolves in a handful of iterations rather than waiting on
    /// real network round trips.
    pub async fn bootstrap(&self) -> Result<(), RuntimeError> {
        {
            let mut engine = self.engine.lock().await;
            engine.start(0).await?;
            if engine.state() == EngineState::NormalOp {
                return Ok(());
            }
        }

        for request_id in 1..=64u64 {
            let mut engine = self.engine.lock().await;
            if engine.state() == EngineState::NormalOp {
                return Ok(());
            }
            for (node_id, ids) in self.sender.take_frontier_responses() {
                engine.on_frontier_response(request_id, node_id, ids).await?;
            }
            for (node_id, ids) in self.sender.take_accepted_responses() {
                engine.on_accepted_response(node_id, ids).await?;
            }
            if engine.state() == EngineState::NormalOp {
                return Ok(());
            }
        }

        Err(RuntimeError::BootstrapIncomplete)
    }

    /// Run one poll round: optionally propose a new block, issue a poll
    /// against the simulated quorum, and apply the resulting chits.
    pub async fn run_round(&self) -> Result<HealthReport, RuntimeError> {
        let request_id = self.round_counter.fetch_add(1, Ordering::SeqCst);
        let mut engine = self.engine.lock().await;

        if request_id % self.config.propose_every_n_rounds == 0 {
            if let Ok(block) = self.vm.build_block() {
                engine.propose_block(block).await?;
            }
        }

        engine.issue_poll(request_id).await?;
        let bag = self.sender.take_poll_bag();
        engine.apply_poll(&bag).await?;

        let report = engine.health_check();
        if let Some(last_accepted) = report.last_accepted {
            let height = self
                .vm
                .get_block(last_accepted)
                .map(|b| b.height)
                .unwrap_or(0);
            tracing::debug!(height, "round {} applied", request_id);
            self.metrics.last_accepted_height.set(height as i64);
        }
        self.metrics.processing_blocks.set(
            engine
                .chain()
                .map(|c| c.num_processing() as i64)
                .unwrap_or(0),
        );
        self.metrics.stalled_blocks.set(report.stalled.len() as i64);
        self.metrics
            .bootstrapped
            .set(if report.bootstrapped { 1 } else { 0 });

        Ok(report)
    }

    /// Run the round loop until `shutdown` is signalled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                tracing::info!("runtime shutdown requested, stopping round loop");
                return;
            }

            match self.run_round().await {
                Ok(report) if !report.is_healthy() => {
                    tracing::warn!(stalled = ?report.stalled, "round completed with stalled blocks");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("round failed: {}", e);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.round_interval) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("runtime shutdown requested during sleep");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus_core::consensus::params::Parameters;
    use consensus_core::id::Id;

    fn build_runtime() -> Runtime {
        let vm = Arc::new(DemoVm::new());
        let sender = Arc::new(DemoSender::new(vm.clone()));
        let validators = Arc::new(DemoValidatorSet::new(4));
        let clock = Arc::new(SystemClock);
        let metrics = Arc::new(NodeMetrics::new());
        let params = Parameters::local_test();
        let engine = Engine::new(
            params,
            Id::from_content(b"test-engine"),
            Id::from_content(b"test-subnet"),
            vm.clone(),
            sender.clone(),
            validators,
            clock,
            metrics.clone(),
        );
        Runtime::new(engine, sender, vm, metrics, RuntimeConfig::default())
    }

    #[tokio::test]
    async fn bootstrap_reaches_normal_op() {
        let runtime = build_runtime();
        runtime.bootstrap().await.unwrap();
        let engine = runtime.engine_handle();
        assert_eq!(engine.lock().await.state(), EngineState::NormalOp);
    }

    #[tokio::test]
    async fn run_round_after_bootstrap_proposes_and_polls() {
        let runtime = build_runtime();
        runtime.bootstrap().await.unwrap();
        let report = runtime.run_round().await.unwrap();
        assert!(report.is_healthy());
    }

    #[tokio::test]
    async fn run_stops_promptly_on_shutdown_signal() {
        let runtime = build_runtime();
        runtime.bootstrap().await.unwrap();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { runtime.run(rx).await });
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("runtime should stop promptly")
            .unwrap();
    }
}
