//! End-to-end scenario tests for the consensus core.
//!
//! Each test drives the public API the way an embedder would: build
//! `Parameters`, feed a `Bag` of votes into a `Chain` (or a sequence of
//! peer responses into a bootstrap `Resolver`, or weights into the
//! `sampler`), and assert on the resulting verdict. No internal types are
//! reached into — everything here is the crate's public surface.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use consensus_core::consensus::bag::Bag;
use consensus_core::consensus::bootstrap::{NodeId, Resolver};
use consensus_core::consensus::chain::{Block, Chain};
use consensus_core::consensus::params::Parameters;
use consensus_core::consensus::sampler;
use consensus_core::id::Id;

fn id(b: u8) -> Id {
    let mut bytes = [0u8; 32];
    bytes[31] = b;
    Id::from_bytes(bytes)
}

fn params(k: u32, alpha_pref: u32, alpha_conf: u32, beta: u32) -> Parameters {
    Parameters::new(k, alpha_pref, alpha_conf, beta, 1, 10, 100, Duration::from_secs(5))
        .expect("scenario parameters are valid")
}

// ---------------------------------------------------------------------------
// Scenario A — linear finalization
// ---------------------------------------------------------------------------

#[test]
fn scenario_a_linear_finalization() {
    let root = id(0);
    let a = id(1);
    let mut chain = Chain::initialize(params(2, 2, 2, 1), root, 0);
    chain.add(Block::new(a, root, 1, vec![])).unwrap();

    let mut bag = Bag::new();
    bag.add_count(a, 2);
    let outcome = chain.record_poll(&bag);

    assert_eq!(outcome.accepted, vec![a]);
    assert!(chain.is_accepted(&a));
    assert_eq!(chain.preference(), a);
    assert!(chain.finalized());
}

// ---------------------------------------------------------------------------
// Scenario B — fork resolution
// ---------------------------------------------------------------------------

#[test]
fn scenario_b_fork_resolution() {
    let root = id(0);
    let a = id(1);
    let b = id(2);
    let mut chain = Chain::initialize(params(2, 2, 2, 1), root, 0);
    chain.add(Block::new(a, root, 1, vec![])).unwrap();
    chain.add(Block::new(b, root, 1, vec![])).unwrap();

    let mut bag = Bag::new();
    bag.add_count(a, 2);
    let outcome = chain.record_poll(&bag);

    assert_eq!(outcome.accepted, vec![a]);
    assert_eq!(outcome.rejected, vec![b]);
    assert!(chain.is_accepted(&a));
    assert!(chain.is_rejected(&b));
}

// ---------------------------------------------------------------------------
// Scenario C — preference flip without finalization
// ---------------------------------------------------------------------------

#[test]
fn scenario_c_preference_flip_without_finalization() {
    let root = id(0);
    let a = id(1);
    let b = id(2);
    let mut chain = Chain::initialize(params(3, 2, 3, 2), root, 0);
    chain.add(Block::new(a, root, 1, vec![])).unwrap();
    chain.add(Block::new(b, root, 1, vec![])).unwrap();

    let mut bag_a = Bag::new();
    bag_a.add_count(a, 2);
    chain.record_poll(&bag_a);
    assert_eq!(chain.preference(), a);

    let mut bag_b = Bag::new();
    bag_b.add_count(b, 2);
    let outcome = chain.record_poll(&bag_b);

    assert!(outcome.changed);
    assert_eq!(chain.preference(), b);
    assert!(!chain.finalized());
    assert!(!chain.is_accepted(&a));
    assert!(!chain.is_accepted(&b));
}

// ---------------------------------------------------------------------------
// Scenario D — deep chain commit
// ---------------------------------------------------------------------------

#[test]
fn scenario_d_deep_chain_commit() {
    let root = id(0);
    let a = id(1);
    let c = id(2);
    let mut chain = Chain::initialize(params(2, 2, 2, 1), root, 0);
    chain.add(Block::new(a, root, 1, vec![])).unwrap();
    chain.add(Block::new(c, a, 2, vec![])).unwrap();

    let mut bag = Bag::new();
    bag.add_count(c, 2);
    let outcome = chain.record_poll(&bag);

    assert_eq!(outcome.accepted, vec![a, c]);
    assert!(chain.is_accepted(&a));
    assert!(chain.is_accepted(&c));
    assert_eq!(chain.last_accepted(), c);
}

// ---------------------------------------------------------------------------
// Scenario E — bootstrap majority
// ---------------------------------------------------------------------------

#[test]
fn scenario_e_bootstrap_majority() {
    let n1: NodeId = id(1);
    let n2: NodeId = id(2);
    let n3: NodeId = id(3);
    let x = id(10);
    let y = id(11);

    let seeds: HashSet<NodeId> = [n1, n2, n3].into_iter().collect();
    let mut resolver = Resolver::new(seeds, 10);

    resolver.next_batch();
    resolver.record_response(n1, [x, y].into_iter().collect()).unwrap();
    resolver.record_response(n2, [x].into_iter().collect()).unwrap();
    resolver.record_response(n3, [y].into_iter().collect()).unwrap();

    let weights: HashMap<NodeId, u64> = [(n1, 40), (n2, 40), (n3, 40)].into_iter().collect();
    resolver.begin_majority(weights).unwrap();

    resolver.next_batch();
    resolver.record_response(n1, [x, y].into_iter().collect()).unwrap();
    resolver.record_response(n2, [x].into_iter().collect()).unwrap();
    resolver.record_response(n3, [y].into_iter().collect()).unwrap();

    assert!(resolver.finished());
    let (mut accepted, finished) = resolver.result();
    assert!(finished);
    accepted.sort();
    let mut expected = vec![x, y];
    expected.sort();
    assert_eq!(accepted, expected);
}

// ---------------------------------------------------------------------------
// Scenario F — sampler determinism
// ---------------------------------------------------------------------------

#[test]
fn scenario_f_sampler_determinism() {
    let weights = [10, 20, 30, 40];
    let first = sampler::sample(&weights, 3, 42).unwrap();
    let second = sampler::sample(&weights, 3, 42).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}
