//! # Bootstrap Frontier Resolver
//!
//! A two-phase process that determines a safe initial accepted frontier
//! before the chain driver starts polling for real:
//!
//! - **Minority** — query a seed set of peers for their accepted frontier
//!   and take the union of every response. Safe as long as the seed set
//!   contains at least one honest peer.
//! - **Majority** — broadcast that union to every validator, weighted by
//!   stake, and keep only the IDs a strict majority of stake confirms.
//!
//! Both phases implement [`Prism`], a narrow contract the [`Resolver`]
//! drives identically regardless of phase. [`Resolver`] itself only
//! orchestrates request bookkeeping (in-flight/pending, `max_outstanding`)
//! and phase transitions — it never talks to the network directly; the
//! engine driver supplies peer responses and validator weights.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::id::Id;

/// Opaque peer identifier. An alias over [`Id`] since nodes are addressed
/// the same 32-byte-hash way as blocks in this protocol family.
pub type NodeId = Id;

/// Errors a [`Prism`] implementation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PrismError {
    /// Accumulating a peer's confirmed weight overflowed 64 bits.
    #[error("weight overflow recording opinion")]
    WeightOverflow,
}

/// One phase of the bootstrap protocol.
pub trait Prism: Send + Sync {
    /// Peers this phase still needs a response from.
    fn get_peers(&self) -> HashSet<NodeId>;

    /// Record a single peer's response.
    fn record_opinion(&mut self, node_id: NodeId, ids: HashSet<Id>) -> Result<(), PrismError>;

    /// The phase's current output: a candidate ID list, and whether the
    /// phase considers itself complete.
    fn result(&self) -> (Vec<Id>, bool);
}

/// Phase 1: union of every responding peer's reported frontier.
#[derive(Debug, Clone)]
pub struct MinorityPrism {
    remaining: HashSet<NodeId>,
    union: HashSet<Id>,
}

impl MinorityPrism {
    /// Seed the minority phase with the peers that will be queried.
    pub fn new(seed_peers: HashSet<NodeId>) -> Self {
        Self {
            remaining: seed_peers,
            union: HashSet::new(),
        }
    }
}

impl Prism for MinorityPrism {
    fn get_peers(&self) -> HashSet<NodeId> {
        self.remaining.clone()
    }

    fn record_opinion(&mut self, node_id: NodeId, ids: HashSet<Id>) -> Result<(), PrismError> {
        self.remaining.remove(&node_id);
        self.union.extend(ids);
        Ok(())
    }

    fn result(&self) -> (Vec<Id>, bool) {
        let mut ids: Vec<Id> = self.union.iter().copied().collect();
        ids.sort();
        (ids, self.remaining.is_empty())
    }
}

/// Phase 2: stake-weighted confirmation of the minority union.
#[derive(Debug, Clone)]
pub struct MajorityPrism {
    remaining: HashSet<NodeId>,
    weights: HashMap<NodeId, u64>,
    total_weight: u64,
    confirmations: HashMap<Id, u64>,
    candidates: Vec<Id>,
}

impl MajorityPrism {
    /// Construct the majority phase from the candidate IDs surfaced by
    /// the minority phase and the current validator weights.
    pub fn new(candidates: &[Id], weights: HashMap<NodeId, u64>) -> Result<Self, PrismError> {
        let mut total_weight: u64 = 0;
        for &w in weights.values() {
            total_weight = total_weight
                .checked_add(w)
                .ok_or(PrismError::WeightOverflow)?;
        }
        let remaining: HashSet<NodeId> = weights.keys().copied().collect();
        let confirmations = candidates.iter().map(|&id| (id, 0)).collect();
        Ok(Self {
            remaining,
            weights,
            total_weight,
            confirmations,
            candidates: candidates.to_vec(),
        })
    }

    /// The strict-majority threshold: `total_weight / 2 + 1`.
    pub fn threshold(&self) -> u64 {
        self.total_weight / 2 + 1
    }

    /// The candidate set this phase is confirming, as surfaced by the
    /// minority phase — what the engine broadcasts in its `GetAccepted`
    /// queries.
    pub fn candidates(&self) -> &[Id] {
        &self.candidates
    }
}

impl Prism for MajorityPrism {
    fn get_peers(&self) -> HashSet<NodeId> {
        self.remaining.clone()
    }

    fn record_opinion(&mut self, node_id: NodeId, ids: HashSet<Id>) -> Result<(), PrismError> {
        let Some(&weight) = self.weights.get(&node_id) else {
            // Not a known validator for this round; ignore silently, the
            // resolver already deduplicates via in-flight tracking.
            return Ok(());
        };
        self.remaining.remove(&node_id);
        for id in ids {
            let entry = self.confirmations.entry(id).or_insert(0);
            *entry = entry.checked_add(weight).ok_or(PrismError::WeightOverflow)?;
        }
        Ok(())
    }

    fn result(&self) -> (Vec<Id>, bool) {
        let threshold = self.threshold();
        let mut ids: Vec<Id> = self
            .confirmations
            .iter()
            .filter(|&(_, &weight)| weight >= threshold)
            .map(|(&id, _)| id)
            .collect();
        ids.sort();
        (ids, self.remaining.is_empty())
    }
}

/// Degenerate prism for configurations with no bootstrap phase at all.
/// Always reports an empty, unfinished result, as mandated by the
/// governing design — callers that wire this in are expected to bypass
/// the bootstrap phase entirely rather than wait on it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPrism;

impl Prism for NoopPrism {
    fn get_peers(&self) -> HashSet<NodeId> {
        HashSet::new()
    }

    fn record_opinion(&mut self, _node_id: NodeId, _ids: HashSet<Id>) -> Result<(), PrismError> {
        Ok(())
    }

    fn result(&self) -> (Vec<Id>, bool) {
        (Vec::new(), false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Minority,
    Majority,
    Done,
}

/// Coordinates the minority and majority phases, bounding outstanding
/// requests at `max_outstanding` and tracking which peers are currently
/// in flight versus still pending.
pub struct Resolver {
    minority: MinorityPrism,
    majority: Option<MajorityPrism>,
    phase: Phase,
    max_outstanding: usize,
    in_flight: HashSet<NodeId>,
    pending: VecDeque<NodeId>,
    timed_out_once: HashSet<NodeId>,
}

impl Resolver {
    /// Start a fresh resolver over the given seed peers.
    pub fn new(seed_peers: HashSet<NodeId>, max_outstanding: usize) -> Self {
        let pending = seed_peers.iter().copied().collect();
        Self {
            minority: MinorityPrism::new(seed_peers),
            majority: None,
            phase: Phase::Minority,
            max_outstanding: max_outstanding.max(1),
            in_flight: HashSet::new(),
            pending,
            timed_out_once: HashSet::new(),
        }
    }

    /// Pop up to `max_outstanding - in_flight` peers to query next.
    pub fn next_batch(&mut self) -> Vec<NodeId> {
        let capacity = self.max_outstanding.saturating_sub(self.in_flight.len());
        let mut batch = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            match self.pending.pop_front() {
                Some(peer) => {
                    self.in_flight.insert(peer);
                    batch.push(peer);
                }
                None => break,
            }
        }
        batch
    }

    /// Record a peer's response. Returns `false` for a response from a
    /// peer that was not in flight (unexpected or duplicate) — the driver
    /// must drop those.
    pub fn record_response(&mut self, node_id: NodeId, ids: HashSet<Id>) -> Result<bool, PrismError> {
        if !self.in_flight.remove(&node_id) {
            return Ok(false);
        }
        match self.phase {
            Phase::Minority => self.minority.record_opinion(node_id, ids)?,
            Phase::Majority => {
                if let Some(m) = self.majority.as_mut() {
                    m.record_opinion(node_id, ids)?;
                }
            }
            Phase::Done => {}
        }
        Ok(true)
    }

    /// Move a timed-out in-flight peer back onto the pending queue.
    pub fn mark_timed_out(&mut self, node_id: NodeId) {
        if self.in_flight.remove(&node_id) {
            self.timed_out_once.insert(node_id);
            self.pending.push_back(node_id);
        }
    }

    /// Advance from the minority phase into the majority phase, given the
    /// current validator weight map. No-op if not currently in the
    /// minority phase or the minority phase has not yet finished.
    pub fn begin_majority(&mut self, validator_weights: HashMap<NodeId, u64>) -> Result<(), PrismError> {
        if self.phase != Phase::Minority {
            return Ok(());
        }
        let (candidates, finished) = self.minority.result();
        if !finished {
            return Ok(());
        }
        let majority = MajorityPrism::new(&candidates, validator_weights)?;
        self.pending = majority.get_peers().into_iter().collect();
        self.in_flight.clear();
        self.majority = Some(majority);
        self.phase = Phase::Majority;
        Ok(())
    }

    /// `true` once the majority phase has reported `finished`.
    pub fn finished(&self) -> bool {
        matches!(self.phase, Phase::Done)
            || matches!(&self.majority, Some(m) if m.result().1)
    }

    /// The resolver's current output.
    pub fn result(&self) -> (Vec<Id>, bool) {
        match &self.majority {
            Some(m) => m.result(),
            None => (Vec::new(), false),
        }
    }

    /// The candidate set the current phase is confirming (the minority
    /// union, once the majority phase has begun). Empty during the
    /// minority phase itself — there is nothing to broadcast yet.
    pub fn candidates(&self) -> Vec<Id> {
        match &self.majority {
            Some(m) => m.candidates().to_vec(),
            None => Vec::new(),
        }
    }

    /// Force the resolver to conclude with whatever it currently has,
    /// regardless of outstanding peers — the "fail open" path once
    /// `max_outstanding` has been exhausted by repeated timeouts.
    pub fn force_finish(&mut self) {
        self.phase = Phase::Done;
    }

    /// Current phase's remaining peer set, for driver bookkeeping.
    pub fn outstanding_peers(&self) -> HashSet<NodeId> {
        self.in_flight.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(b: u8) -> Id {
        let mut bytes = [0u8; 32];
        bytes[31] = b;
        Id::from_bytes(bytes)
    }

    fn node(b: u8) -> NodeId {
        id(b)
    }

    // Scenario E — bootstrap majority.
    #[test]
    fn scenario_e_bootstrap_majority() {
        let seeds: HashSet<NodeId> = [node(1), node(2), node(3)].into_iter().collect();
        let mut resolver = Resolver::new(seeds, 10);

        let batch = resolver.next_batch();
        assert_eq!(batch.len(), 3);

        let x = id(10);
        let y = id(11);
        resolver
            .record_response(node(1), [x, y].into_iter().collect())
            .unwrap();
        resolver
            .record_response(node(2), [x].into_iter().collect())
            .unwrap();
        resolver
            .record_response(node(3), [y].into_iter().collect())
            .unwrap();

        let (union, finished) = resolver.minority.result();
        assert!(finished);
        assert_eq!(union.len(), 2);

        let weights: HashMap<NodeId, u64> = [(node(1), 40), (node(2), 40), (node(3), 40)]
            .into_iter()
            .collect();
        resolver.begin_majority(weights).unwrap();

        resolver.next_batch();
        resolver
            .record_response(node(1), [x, y].into_iter().collect())
            .unwrap();
        resolver.record_response(node(2), [x].into_iter().collect()).unwrap();
        resolver.record_response(node(3), [y].into_iter().collect()).unwrap();

        assert!(resolver.finished());
        let (accepted, finished) = resolver.result();
        assert!(finished);
        let mut accepted = accepted;
        accepted.sort();
        let mut expected = vec![x, y];
        expected.sort();
        assert_eq!(accepted, expected);
    }

    #[test]
    fn duplicate_response_is_rejected() {
        let seeds: HashSet<NodeId> = [node(1)].into_iter().collect();
        let mut resolver = Resolver::new(seeds, 10);
        resolver.next_batch();
        assert!(resolver
            .record_response(node(1), HashSet::new())
            .unwrap());
        assert!(!resolver
            .record_response(node(1), HashSet::new())
            .unwrap());
    }

    #[test]
    fn unexpected_response_is_rejected() {
        let seeds: HashSet<NodeId> = [node(1)].into_iter().collect();
        let mut resolver = Resolver::new(seeds, 10);
        assert!(!resolver
            .record_response(node(9), HashSet::new())
            .unwrap());
    }

    #[test]
    fn timed_out_peer_is_requeued() {
        let seeds: HashSet<NodeId> = [node(1), node(2)].into_iter().collect();
        let mut resolver = Resolver::new(seeds, 1);
        let batch = resolver.next_batch();
        assert_eq!(batch.len(), 1);
        resolver.mark_timed_out(batch[0]);
        let next = resolver.next_batch();
        assert_eq!(next, batch);
    }

    #[test]
    fn noop_prism_never_finishes() {
        let mut noop = NoopPrism;
        assert!(noop.get_peers().is_empty());
        noop.record_opinion(node(1), HashSet::new()).unwrap();
        let (ids, finished) = noop.result();
        assert!(ids.is_empty());
        assert!(!finished);
    }

    #[test]
    fn majority_weight_overflow_is_reported() {
        let weights: HashMap<NodeId, u64> = [(node(1), u64::MAX), (node(2), 1)].into_iter().collect();
        let err = MajorityPrism::new(&[id(1)], weights).unwrap_err();
        assert_eq!(err, PrismError::WeightOverflow);
    }

    #[test]
    fn force_finish_concludes_with_partial_result() {
        let seeds: HashSet<NodeId> = [node(1), node(2)].into_iter().collect();
        let mut resolver = Resolver::new(seeds, 10);
        resolver.next_batch();
        resolver
            .record_response(node(1), [id(5)].into_iter().collect())
            .unwrap();
        resolver.mark_timed_out(node(2));
        resolver.begin_majority(HashMap::new()).unwrap(); // minority unfinished: no-op
        assert!(!resolver.finished());
        resolver.force_finish();
        assert!(resolver.finished());
    }
}
