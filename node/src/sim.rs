//! # In-Process Simulated Quorum
//!
//! Implements every capability trait the engine is built against —
//! [`Vm`], [`Sender`], [`ValidatorSet`], [`Clock`] — entirely in memory, with
//! no real networking or persistence. This is the node crate's equivalent of
//! a development-mode local quorum: enough honest, synchronously-agreeing
//! peers to drive the engine through bootstrap and several rounds of
//! finalization without standing up an actual network.
//!
//! None of this belongs in `consensus-core` — the core crate never names a
//! concrete collaborator. It lives here, in the binary that embeds the
//! engine, exactly where the trait boundary says it should.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use consensus_core::consensus::bag::Bag;
use consensus_core::consensus::bootstrap::NodeId;
use consensus_core::consensus::chain::Block;
use consensus_core::consensus::interfaces::{
    Clock, RequestId, SendError, Sender, SubnetId, ValidatorSet, ValidatorSetError, Vm, VmError,
};
use consensus_core::consensus::sampler;
use consensus_core::id::Id;

/// An in-memory block store standing in for a real VM. Builds blocks that
/// extend its own notion of "current preference" and tracks acceptance
/// locally, the same bookkeeping a real VM would otherwise keep in its own
/// database.
pub struct DemoVm {
    blocks: Mutex<HashMap<Id, Block>>,
    last_accepted: Mutex<Id>,
    preference: Mutex<Id>,
    next_seq: AtomicU64,
}

impl DemoVm {
    /// Construct a fresh VM with no history. Its genesis is the empty id,
    /// matching the engine's convention for "no last accepted block yet".
    pub fn new() -> Self {
        Self {
            blocks: Mutex::new(HashMap::new()),
            last_accepted: Mutex::new(Id::EMPTY),
            preference: Mutex::new(Id::EMPTY),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Encode a block to the wire format this VM's [`Vm::parse_block`]
    /// understands: `id (32) | parent (32) | height (8, LE) | payload`.
    fn encode(block: &Block) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(72 + block.payload.len());
        bytes.extend_from_slice(block.id.as_bytes());
        bytes.extend_from_slice(block.parent.as_bytes());
        bytes.extend_from_slice(&block.height.to_le_bytes());
        bytes.extend_from_slice(&block.payload);
        bytes
    }
}

impl Default for DemoVm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Vm for DemoVm {
    fn build_block(&self) -> Result<Block, VmError> {
        let parent = *self.preference.lock();
        let parent_height = if parent.is_empty() {
            0
        } else {
            self.blocks
                .lock()
                .get(&parent)
                .map(|b| b.height)
                .ok_or(VmError::UnknownBlock)?
        };

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let payload = format!("demo-block-{seq}").into_bytes();
        let mut preimage = Vec::with_capacity(32 + payload.len());
        preimage.extend_from_slice(parent.as_bytes());
        preimage.extend_from_slice(&payload);
        let id = Id::from_content(&preimage);
        let height = if parent.is_empty() { 1 } else { parent_height + 1 };

        let block = Block::new(id, parent, height, payload);
        self.blocks.lock().insert(id, block.clone());
        Ok(block)
    }

    fn parse_block(&self, bytes: &[u8]) -> Result<Block, VmError> {
        if bytes.len() < 72 {
            return Err(VmError::ParseFailed("block shorter than header".into()));
        }
        let mut id_bytes = [0u8; 32];
        id_bytes.copy_from_slice(&bytes[0..32]);
        let mut parent_bytes = [0u8; 32];
        parent_bytes.copy_from_slice(&bytes[32..64]);
        let mut height_bytes = [0u8; 8];
        height_bytes.copy_from_slice(&bytes[64..72]);

        let block = Block::new(
            Id::from_bytes(id_bytes),
            Id::from_bytes(parent_bytes),
            u64::from_le_bytes(height_bytes),
            bytes[72..].to_vec(),
        );
        self.blocks.lock().insert(block.id, block.clone());
        Ok(block)
    }

    fn get_block(&self, id: Id) -> Result<Block, VmError> {
        self.blocks.lock().get(&id).cloned().ok_or(VmError::UnknownBlock)
    }

    fn set_preference(&self, id: Id) {
        *self.preference.lock() = id;
    }

    fn last_accepted(&self) -> Id {
        *self.last_accepted.lock()
    }

    async fn accept(&self, block: &Block) -> Result<(), VmError> {
        self.blocks.lock().insert(block.id, block.clone());
        *self.last_accepted.lock() = block.id;
        Ok(())
    }

    async fn reject(&self, _block: &Block) -> Result<(), VmError> {
        Ok(())
    }

    async fn verify(&self, _block: &Block) -> Result<(), VmError> {
        Ok(())
    }
}

/// A queued bootstrap response, captured the moment the simulated sender
/// would have put it on the wire. The runtime loop drains these and feeds
/// them back into the engine, standing in for the round trip a real
/// network would perform asynchronously.
pub type PeerResponse = (NodeId, HashSet<Id>);

/// An in-memory "network" connecting the engine to a simulated honest
/// quorum. Every queried peer answers immediately and truthfully: pull and
/// push queries echo back the offered block, and bootstrap queries answer
/// from the same [`DemoVm`] the engine itself is wired to (modeling a
/// quorum of identically-configured honest peers).
pub struct DemoSender {
    vm: Arc<DemoVm>,
    poll_bag: Mutex<Bag>,
    frontier_responses: Mutex<Vec<PeerResponse>>,
    accepted_responses: Mutex<Vec<PeerResponse>>,
}

impl DemoSender {
    /// Build a sender backed by the same VM instance the engine uses, so
    /// bootstrap responses reflect real local state.
    pub fn new(vm: Arc<DemoVm>) -> Self {
        Self {
            vm,
            poll_bag: Mutex::new(Bag::new()),
            frontier_responses: Mutex::new(Vec::new()),
            accepted_responses: Mutex::new(Vec::new()),
        }
    }

    /// Drain and return the chits accumulated since the last call. Called
    /// by the runtime loop right after [`consensus_core::consensus::engine::Engine::issue_poll`].
    pub fn take_poll_bag(&self) -> Bag {
        std::mem::replace(&mut *self.poll_bag.lock(), Bag::new())
    }

    /// Drain queued phase-1 bootstrap responses.
    pub fn take_frontier_responses(&self) -> Vec<PeerResponse> {
        std::mem::take(&mut *self.frontier_responses.lock())
    }

    /// Drain queued phase-2 bootstrap responses.
    pub fn take_accepted_responses(&self) -> Vec<PeerResponse> {
        std::mem::take(&mut *self.accepted_responses.lock())
    }
}

#[async_trait]
impl Sender for DemoSender {
    async fn send_pull_query(
        &self,
        to: &[NodeId],
        _request_id: RequestId,
        block_id: Id,
    ) -> Result<(), SendError> {
        let mut bag = self.poll_bag.lock();
        for _ in to {
            bag.add_count(block_id, 1);
        }
        Ok(())
    }

    async fn send_push_query(
        &self,
        to: &[NodeId],
        _request_id: RequestId,
        bytes: Vec<u8>,
    ) -> Result<(), SendError> {
        let block = self
            .vm
            .parse_block(&bytes)
            .map_err(|e| SendError(e.to_string()))?;
        let mut bag = self.poll_bag.lock();
        for _ in to {
            bag.add_count(block.id, 1);
        }
        Ok(())
    }

    async fn send_get_accepted_frontier(
        &self,
        to: &[NodeId],
        _request_id: RequestId,
    ) -> Result<(), SendError> {
        let last = self.vm.last_accepted();
        let mut frontier = HashSet::new();
        if !last.is_empty() {
            frontier.insert(last);
        }
        let mut responses = self.frontier_responses.lock();
        for &node in to {
            responses.push((node, frontier.clone()));
        }
        Ok(())
    }

    async fn send_get_accepted(
        &self,
        to: &[NodeId],
        _request_id: RequestId,
        ids: Vec<Id>,
    ) -> Result<(), SendError> {
        let last = self.vm.last_accepted();
        let confirmed: HashSet<Id> = ids.into_iter().filter(|id| *id == last).collect();
        let mut responses = self.accepted_responses.lock();
        for &node in to {
            responses.push((node, confirmed.clone()));
        }
        Ok(())
    }
}

/// A static, stake-weighted validator set for the simulated quorum. Weights
/// are uniform; the point of the demo harness is exercising the sampling
/// and confidence machinery end to end, not modeling stake skew.
pub struct DemoValidatorSet {
    ids: Vec<NodeId>,
    weights: HashMap<NodeId, u64>,
    rng_state: Mutex<u64>,
}

impl DemoValidatorSet {
    /// Build a validator set of `n` equally-weighted simulated peers.
    pub fn new(n: usize) -> Self {
        let mut ids = Vec::with_capacity(n);
        let mut weights = HashMap::with_capacity(n);
        for i in 0..n {
            let node = NodeId::from_content(format!("demo-validator-{i}").as_bytes());
            ids.push(node);
            weights.insert(node, 1_000_000u64);
        }
        ids.sort();
        Self {
            ids,
            weights,
            rng_state: Mutex::new(0x5eed_u64),
        }
    }

    fn next_seed(&self) -> u64 {
        let mut state = self.rng_state.lock();
        *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        *state
    }
}

#[async_trait]
impl ValidatorSet for DemoValidatorSet {
    async fn get_validators(
        &self,
        _at_height: u64,
        _subnet_id: SubnetId,
    ) -> Result<HashMap<NodeId, u64>, ValidatorSetError> {
        Ok(self.weights.clone())
    }

    async fn total_weight(&self, _subnet_id: SubnetId) -> Result<u64, ValidatorSetError> {
        Ok(self.weights.values().sum())
    }

    async fn sample(&self, _subnet_id: SubnetId, k: usize) -> Result<Vec<NodeId>, ValidatorSetError> {
        let k = k.min(self.ids.len());
        let weights: Vec<u64> = self.ids.iter().map(|n| self.weights[n]).collect();
        let indices = sampler::sample(&weights, k, self.next_seed())
            .map_err(|e| ValidatorSetError(e.to_string()))?;
        Ok(indices.into_iter().map(|i| self.ids[i]).collect())
    }
}

/// Wall-clock time, backed by `tokio`'s timer wheel so `after` cooperates
/// with the async runtime instead of blocking a worker thread.
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn after(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
