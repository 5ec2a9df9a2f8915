//! # Engine Driver
//!
//! Owns the optional bootstrap resolver and the chain consensus, and
//! drives the lifecycle state machine:
//!
//! ```text
//! Initializing --start()--> Bootstrapping --frontier confirmed--> NormalOp --stop()--> Stopped
//!      \_________________________________stop()________________________________/
//! ```
//!
//! Per the concurrency model, nothing in here suspends mid-mutation: the
//! methods that touch [`Chain`] state (`apply_poll`, `propose_block`) run
//! synchronously to completion, and the only `await` points are the
//! injected collaborator calls that the model explicitly allows to
//! suspend (`Vm::accept`/`reject`/`verify`, `Sender::send_*`,
//! `ValidatorSet` queries). The embedder is responsible for the actual
//! network receive loop — this driver only exposes the entry points that
//! loop must call (`on_frontier_response`, `on_accepted_response`,
//! `issue_poll`, `apply_poll`).

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use std::sync::Arc;

use crate::config::ROUND_SEED_DOMAIN;
use crate::consensus::bag::Bag;
use crate::consensus::bootstrap::{NodeId, Resolver};
use crate::consensus::chain::{Block, Chain, ChainError, PollOutcome};
use crate::consensus::interfaces::{
    Clock, Metrics, RequestId, Sender, SubnetId, ValidatorSet, ValidatorSetError, Vm, VmError,
};
use crate::consensus::params::Parameters;
use crate::consensus::sampler::{self, SampleError};
use crate::crypto::domain_separated_hash;
use crate::id::Id;

use tracing::{debug, info, warn};

/// Derive a per-round sampling seed from the engine's identity and a
/// monotonically advancing round counter, so two engines (or two runs of
/// the same engine) never reuse a seed across unrelated rounds.
pub fn derive_round_seed(engine_id: Id, round_counter: u64) -> u64 {
    let digest = domain_separated_hash(ROUND_SEED_DOMAIN, engine_id.as_bytes());
    let mut counter_mixed = [0u8; 32];
    counter_mixed[..8].copy_from_slice(&round_counter.to_le_bytes());
    let mixed = domain_separated_hash(ROUND_SEED_DOMAIN, &[digest, counter_mixed].concat());
    u64::from_le_bytes(mixed[..8].try_into().unwrap())
}

/// The driver's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed, `start()` not yet called.
    Initializing,
    /// Resolving the initial accepted frontier.
    Bootstrapping,
    /// Steady-state polling.
    NormalOp,
    /// Terminated, either by `stop()` or a fatal VM error.
    Stopped,
}

/// Errors the driver can return. Per the governing error model, VM
/// callback failures are fatal and drive the engine to `Stopped`; every
/// other variant leaves the engine in its current state.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The operation is not valid in the engine's current state.
    #[error("invalid engine state for this operation: {0:?}")]
    InvalidState(EngineState),
    /// A chain topology error (surfaced to the caller; state untouched).
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),
    /// The weighted sampler failed (weight overflow). Fatal for the
    /// current round only; the driver retries the next round.
    #[error("sampling error: {0}")]
    Sampling(#[from] SampleError),
    /// A validator-set query failed.
    #[error("validator set error: {0}")]
    ValidatorSet(#[from] ValidatorSetError),
    /// A bootstrap prism reported an internal error (weight overflow).
    #[error("bootstrap error: {0}")]
    Bootstrap(#[from] crate::consensus::bootstrap::PrismError),
    /// The VM's `accept`/`reject`/`verify` callback failed. Fatal: the
    /// engine transitions to [`EngineState::Stopped`].
    #[error("vm error: {0}")]
    Vm(#[from] VmError),
}

/// Operational health snapshot, returned by [`Engine::health_check`].
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// The driver's current lifecycle state.
    pub state: EngineState,
    /// `true` once the bootstrap phase has handed off to normal operation.
    pub bootstrapped: bool,
    /// Blocks that have been `Processing` longer than
    /// `max_item_processing_time`.
    pub stalled: Vec<Id>,
    /// The chain's last accepted block, if the chain has been primed.
    pub last_accepted: Option<Id>,
    /// Time since the preferred tip last changed or a block was accepted,
    /// if any progress has been observed yet.
    pub time_since_progress: Option<Duration>,
}

impl HealthReport {
    /// `true` if this report should produce a non-zero exit from a
    /// health-check-driven CLI command.
    pub fn is_healthy(&self) -> bool {
        self.state != EngineState::Stopped && self.stalled.is_empty()
    }
}

/// One poll round's outbound request, for the embedder to actually send.
#[derive(Debug, Clone)]
pub struct PollRequest {
    /// Correlation id for matching responses back to this round.
    pub request_id: RequestId,
    /// The validators queried this round.
    pub voters: Vec<NodeId>,
    /// The block id named in the pull query (the preferred tip at issue
    /// time).
    pub preferred: Id,
}

/// The engine driver, generic over its five injected collaborators.
pub struct Engine<V, S, D, C, M>
where
    V: Vm,
    S: Sender,
    D: ValidatorSet,
    C: Clock,
    M: Metrics,
{
    params: Parameters,
    engine_id: Id,
    subnet_id: SubnetId,
    state: EngineState,
    chain: Option<Chain>,
    resolver: Option<Resolver>,
    round_counter: u64,
    processing_since: HashMap<Id, Instant>,
    last_progress_at: Option<Instant>,
    vm: Arc<V>,
    sender: Arc<S>,
    validators: Arc<D>,
    clock: Arc<C>,
    metrics: Arc<M>,
}

impl<V, S, D, C, M> Engine<V, S, D, C, M>
where
    V: Vm,
    S: Sender,
    D: ValidatorSet,
    C: Clock,
    M: Metrics,
{
    /// Construct a new engine in [`EngineState::Initializing`].
    pub fn new(
        params: Parameters,
        engine_id: Id,
        subnet_id: SubnetId,
        vm: Arc<V>,
        sender: Arc<S>,
        validators: Arc<D>,
        clock: Arc<C>,
        metrics: Arc<M>,
    ) -> Self {
        Self {
            params,
            engine_id,
            subnet_id,
            state: EngineState::Initializing,
            chain: None,
            resolver: None,
            round_counter: 0,
            processing_since: HashMap::new(),
            last_progress_at: None,
            vm,
            sender,
            validators,
            clock,
            metrics,
        }
    }

    /// The driver's current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// `true` once bootstrap has handed off to steady-state polling.
    pub fn is_bootstrapped(&self) -> bool {
        matches!(self.state, EngineState::NormalOp)
    }

    /// Begin bootstrapping: sample a seed peer set from the validator set
    /// and issue the first batch of `GetAcceptedFrontier` requests. If the
    /// sampled seed set is empty (a degenerate single-node configuration),
    /// bootstrap is skipped entirely and the chain is primed directly from
    /// the VM's last accepted block.
    pub async fn start(&mut self, request_id: RequestId) -> Result<(), EngineError> {
        if self.state != EngineState::Initializing {
            return Err(EngineError::InvalidState(self.state));
        }
        let seed_peers = self.validators.sample(self.subnet_id, self.params.k as usize).await?;
        if seed_peers.is_empty() {
            info!("no seed peers sampled, skipping bootstrap");
            self.prime_chain_from_vm()?;
            self.state = EngineState::NormalOp;
            return Ok(());
        }
        let mut resolver = Resolver::new(
            seed_peers.into_iter().collect(),
            self.params.max_outstanding as usize,
        );
        let batch = resolver.next_batch();
        self.sender
            .send_get_accepted_frontier(&batch, request_id)
            .await
            .ok(); // network errors downgrade to "no response yet", not fatal
        self.resolver = Some(resolver);
        self.state = EngineState::Bootstrapping;
        info!(seed_peer_count = batch.len(), "bootstrap started");
        Ok(())
    }

    /// Feed a phase-1 (accepted frontier) response into the resolver. Once
    /// every seed peer has responded, fetches validator weights and
    /// advances to phase 2.
    pub async fn on_frontier_response(
        &mut self,
        request_id: RequestId,
        node_id: NodeId,
        ids: HashSet<Id>,
    ) -> Result<(), EngineError> {
        if self.state != EngineState::Bootstrapping {
            return Err(EngineError::InvalidState(self.state));
        }
        let resolver = self.resolver.as_mut().expect("bootstrapping implies a resolver");
        if !resolver.record_response(node_id, ids)? {
            return Ok(()); // unexpected/duplicate response, dropped
        }
        let weights = self.validators.get_validators(0, self.subnet_id).await?;
        resolver.begin_majority(weights)?;
        let batch = resolver.next_batch();
        let candidates = resolver.candidates();
        debug!(
            batch_len = batch.len(),
            candidate_count = candidates.len(),
            "frontier phase complete, entering majority phase"
        );
        if !batch.is_empty() {
            self.sender.send_get_accepted(&batch, request_id, candidates).await.ok();
        }
        Ok(())
    }

    /// Feed a phase-2 (majority confirmation) response into the resolver.
    /// Once the majority phase finishes, primes the chain and transitions
    /// to [`EngineState::NormalOp`].
    pub async fn on_accepted_response(
        &mut self,
        node_id: NodeId,
        ids: HashSet<Id>,
    ) -> Result<(), EngineError> {
        if self.state != EngineState::Bootstrapping {
            return Err(EngineError::InvalidState(self.state));
        }
        let resolver = self.resolver.as_mut().expect("bootstrapping implies a resolver");
        resolver.record_response(node_id, ids)?;
        if resolver.finished() {
            self.prime_chain_from_vm()?;
            self.state = EngineState::NormalOp;
            info!(last_accepted = %self.vm.last_accepted(), "bootstrap finished, entering normal operation");
        }
        Ok(())
    }

    /// Prime the chain from the bootstrap resolver's majority-confirmed
    /// accepted frontier, falling back to the VM's own last accepted block
    /// when bootstrap was skipped or the resolver confirmed nothing. Among
    /// several confirmed frontier candidates, the tallest known block wins
    /// — the frontier is a single accepted tip, not a set.
    fn prime_chain_from_vm(&mut self) -> Result<(), EngineError> {
        let mut last_accepted = self.vm.last_accepted();
        let mut best_height = if last_accepted.is_empty() {
            0
        } else {
            self.vm.get_block(last_accepted)?.height
        };

        if let Some(resolver) = self.resolver.as_ref() {
            let (confirmed, _) = resolver.result();
            for id in confirmed {
                if let Ok(block) = self.vm.get_block(id) {
                    if last_accepted.is_empty() || block.height > best_height {
                        last_accepted = id;
                        best_height = block.height;
                    }
                }
            }
        }

        self.chain = Some(Chain::initialize(self.params.clone(), last_accepted, best_height));
        self.last_progress_at = Some(self.clock.now());
        Ok(())
    }

    /// Verify and attach a new block to the forest.
    pub async fn propose_block(&mut self, block: Block) -> Result<(), EngineError> {
        if self.state != EngineState::NormalOp {
            return Err(EngineError::InvalidState(self.state));
        }
        self.vm.verify(&block).await?;
        let chain = self.chain.as_mut().expect("NormalOp implies a primed chain");
        let id = block.id;
        chain.add(block)?;
        self.processing_since.insert(id, self.clock.now());
        self.vm.set_preference(chain.preference());
        debug!(block = %id, "block proposed and attached");
        Ok(())
    }

    /// Sample voters and issue one poll round for the current preferred
    /// tip. Returns the request so the embedder can actually send it (the
    /// send itself is also performed here via the injected [`Sender`]).
    pub async fn issue_poll(&mut self, request_id: RequestId) -> Result<PollRequest, EngineError> {
        if self.state != EngineState::NormalOp {
            return Err(EngineError::InvalidState(self.state));
        }
        let chain = self.chain.as_ref().expect("NormalOp implies a primed chain");
        let preferred = chain.preference();

        let weights_map = self.validators.get_validators(0, self.subnet_id).await?;
        let mut node_ids: Vec<NodeId> = weights_map.keys().copied().collect();
        node_ids.sort();
        let weights: Vec<u64> = node_ids.iter().map(|n| weights_map[n]).collect();

        self.round_counter += 1;
        let seed = derive_round_seed(self.engine_id, self.round_counter);
        let indices = sampler::sample(&weights, self.params.k as usize, seed)?;
        let voters: Vec<NodeId> = indices.into_iter().map(|i| node_ids[i]).collect();

        self.metrics.record_poll_started();
        self.sender
            .send_pull_query(&voters, request_id, preferred)
            .await
            .ok();

        debug!(round = self.round_counter, voter_count = voters.len(), preferred = %preferred, "poll issued");

        Ok(PollRequest {
            request_id,
            voters,
            preferred,
        })
    }

    /// Apply a collected bag of chits to the chain, notifying the VM of
    /// any finalization boundary crossed and recording progress metrics.
    /// An empty bag is equivalent to an unsuccessful poll at every live
    /// decision point — the chain handles that uniformly.
    pub async fn apply_poll(&mut self, bag: &Bag) -> Result<PollOutcome, EngineError> {
        if self.state != EngineState::NormalOp {
            return Err(EngineError::InvalidState(self.state));
        }
        let chain = self.chain.as_mut().expect("NormalOp implies a primed chain");
        let outcome = chain.record_poll(bag);

        if bag.is_empty() {
            self.metrics.record_poll_failed();
        } else {
            self.metrics.record_poll_successful();
        }

        for &rejected_id in &outcome.rejected {
            self.processing_since.remove(&rejected_id);
            if let Ok(block) = self.vm.get_block(rejected_id) {
                if let Err(e) = self.vm.reject(&block).await {
                    warn!(error = %e, block = %rejected_id, "vm rejected reject callback, stopping engine");
                    self.state = EngineState::Stopped;
                    return Err(e.into());
                }
            }
        }
        for &accepted_id in &outcome.accepted {
            self.processing_since.remove(&accepted_id);
            let block = self.vm.get_block(accepted_id)?;
            if let Err(e) = self.vm.accept(&block).await {
                warn!(error = %e, block = %accepted_id, "vm accept callback failed, stopping engine");
                self.state = EngineState::Stopped;
                return Err(e.into());
            }
            info!(block = %accepted_id, "block finalized");
        }

        if outcome.changed || !outcome.accepted.is_empty() {
            self.last_progress_at = Some(self.clock.now());
            self.vm.set_preference(chain.preference());
        }

        Ok(outcome)
    }

    /// Unconditionally terminate the engine.
    pub fn stop(&mut self) {
        info!(prior_state = ?self.state, "engine stopped");
        self.state = EngineState::Stopped;
    }

    /// A snapshot of operational health.
    pub fn health_check(&self) -> HealthReport {
        let now = self.clock.now();
        let stalled = self
            .processing_since
            .iter()
            .filter(|(_, &since)| now.duration_since(since) > self.params.max_item_processing_time)
            .map(|(&id, _)| id)
            .collect();
        HealthReport {
            state: self.state,
            bootstrapped: self.is_bootstrapped(),
            stalled,
            last_accepted: self.chain.as_ref().map(|c| c.last_accepted()),
            time_since_progress: self.last_progress_at.map(|t| now.duration_since(t)),
        }
    }

    /// Borrow the underlying chain, once primed.
    pub fn chain(&self) -> Option<&Chain> {
        self.chain.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    struct MockVm {
        blocks: Mutex<HashMap<Id, Block>>,
        last_accepted: Mutex<Id>,
        fail_accept: bool,
    }

    impl MockVm {
        fn new(genesis: Id) -> Self {
            let mut blocks = HashMap::new();
            blocks.insert(genesis, Block::new(genesis, Id::EMPTY, 0, vec![]));
            Self {
                blocks: Mutex::new(blocks),
                last_accepted: Mutex::new(genesis),
                fail_accept: false,
            }
        }
    }

    #[async_trait]
    impl Vm for MockVm {
        fn build_block(&self) -> Result<Block, VmError> {
            Err(VmError::UnknownBlock)
        }
        fn parse_block(&self, _bytes: &[u8]) -> Result<Block, VmError> {
            Err(VmError::UnknownBlock)
        }
        fn get_block(&self, id: Id) -> Result<Block, VmError> {
            self.blocks.lock().get(&id).cloned().ok_or(VmError::UnknownBlock)
        }
        fn set_preference(&self, _id: Id) {}
        fn last_accepted(&self) -> Id {
            *self.last_accepted.lock()
        }
        async fn accept(&self, block: &Block) -> Result<(), VmError> {
            if self.fail_accept {
                return Err(VmError::CallbackFailed("boom".into()));
            }
            *self.last_accepted.lock() = block.id;
            Ok(())
        }
        async fn reject(&self, _block: &Block) -> Result<(), VmError> {
            Ok(())
        }
        async fn verify(&self, block: &Block) -> Result<(), VmError> {
            self.blocks.lock().insert(block.id, block.clone());
            Ok(())
        }
    }

    struct MockSender;
    #[async_trait]
    impl Sender for MockSender {
        async fn send_pull_query(&self, _to: &[NodeId], _request_id: RequestId, _block_id: Id) -> Result<(), crate::consensus::interfaces::SendError> {
            Ok(())
        }
        async fn send_push_query(&self, _to: &[NodeId], _request_id: RequestId, _bytes: Vec<u8>) -> Result<(), crate::consensus::interfaces::SendError> {
            Ok(())
        }
        async fn send_get_accepted_frontier(&self, _to: &[NodeId], _request_id: RequestId) -> Result<(), crate::consensus::interfaces::SendError> {
            Ok(())
        }
        async fn send_get_accepted(&self, _to: &[NodeId], _request_id: RequestId, _ids: Vec<Id>) -> Result<(), crate::consensus::interfaces::SendError> {
            Ok(())
        }
    }

    struct MockValidatorSet {
        weights: HashMap<NodeId, u64>,
    }
    #[async_trait]
    impl ValidatorSet for MockValidatorSet {
        async fn get_validators(&self, _at_height: u64, _subnet_id: SubnetId) -> Result<HashMap<NodeId, u64>, ValidatorSetError> {
            Ok(self.weights.clone())
        }
        async fn total_weight(&self, _subnet_id: SubnetId) -> Result<u64, ValidatorSetError> {
            Ok(self.weights.values().sum())
        }
        async fn sample(&self, _subnet_id: SubnetId, k: usize) -> Result<Vec<NodeId>, ValidatorSetError> {
            Ok(self.weights.keys().take(k).copied().collect())
        }
    }

    struct MockClock;
    #[async_trait]
    impl Clock for MockClock {
        fn now(&self) -> Instant {
            Instant::now()
        }
        async fn after(&self, _duration: Duration) {}
    }

    struct MockMetrics;
    impl Metrics for MockMetrics {
        fn record_poll_started(&self) {}
        fn record_poll_successful(&self) {}
        fn record_poll_failed(&self) {}
        fn observe_stage_duration(&self, _stage: &str, _duration: Duration) {}
    }

    fn id(b: u8) -> Id {
        let mut bytes = [0u8; 32];
        bytes[31] = b;
        Id::from_bytes(bytes)
    }

    fn local_engine() -> Engine<MockVm, MockSender, MockValidatorSet, MockClock, MockMetrics> {
        let genesis = id(9);
        Engine::new(
            Parameters::local_test(),
            id(1),
            id(2),
            Arc::new(MockVm::new(genesis)),
            Arc::new(MockSender),
            Arc::new(MockValidatorSet { weights: HashMap::new() }),
            Arc::new(MockClock),
            Arc::new(MockMetrics),
        )
    }

    #[tokio::test]
    async fn start_with_no_peers_skips_bootstrap() {
        let mut engine = local_engine();
        engine.start(1).await.unwrap();
        assert_eq!(engine.state(), EngineState::NormalOp);
        assert!(engine.is_bootstrapped());
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let mut engine = local_engine();
        engine.start(1).await.unwrap();
        let err = engine.start(2).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(EngineState::NormalOp)));
    }

    #[tokio::test]
    async fn propose_and_finalize_a_block() {
        let mut engine = local_engine();
        engine.start(1).await.unwrap();
        let genesis = id(9);
        let a = Block::new(id(5), genesis, 1, vec![1, 2, 3]);
        engine.propose_block(a.clone()).await.unwrap();

        let mut bag = Bag::new();
        bag.add_count(id(5), 1);
        let outcome = engine.apply_poll(&bag).await.unwrap();
        assert_eq!(outcome.accepted, vec![id(5)]);
        assert_eq!(engine.chain().unwrap().last_accepted(), id(5));
    }

    #[tokio::test]
    async fn vm_accept_failure_stops_the_engine() {
        let genesis = id(9);
        let mut vm = MockVm::new(genesis);
        vm.fail_accept = true;
        let mut engine = Engine::new(
            Parameters::local_test(),
            id(1),
            id(2),
            Arc::new(vm),
            Arc::new(MockSender),
            Arc::new(MockValidatorSet { weights: HashMap::new() }),
            Arc::new(MockClock),
            Arc::new(MockMetrics),
        );
        engine.start(1).await.unwrap();
        let a = Block::new(id(5), genesis, 1, vec![]);
        engine.propose_block(a).await.unwrap();
        let mut bag = Bag::new();
        bag.add_count(id(5), 1);
        let err = engine.apply_poll(&bag).await.unwrap_err();
        assert!(matches!(err, EngineError::Vm(_)));
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[test]
    fn round_seed_is_deterministic_and_varies_with_counter() {
        let engine_id = id(7);
        let a = derive_round_seed(engine_id, 1);
        let b = derive_round_seed(engine_id, 1);
        let c = derive_round_seed(engine_id, 2);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn health_check_reports_unhealthy_once_stopped() {
        let engine = local_engine();
        let report = engine.health_check();
        assert!(report.is_healthy());
    }
}
