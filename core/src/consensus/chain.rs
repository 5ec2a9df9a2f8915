//! # Chain Consensus
//!
//! The block-tree topology driver: a rooted forest descending from the
//! last-accepted block, with preference propagation and atomic
//! finalization of a prefix.
//!
//! ## Decision points
//!
//! The governing design calls a node with more than one live child a
//! "decision point holding a polyadic machine." We broaden that slightly
//! in the implementation: *every* node that has ever had at least one
//! child holds a [`Polyadic`] machine keyed by child id. A node with
//! exactly one live child is a degenerate one-choice polyadic instance —
//! functionally identical to a monadic machine voting for that single
//! choice — which is what lets an uncontested linear chain (no fork ever
//! appears) still accumulate confidence and finalize after `beta`
//! consecutive successful polls (see scenario A in the test suite). When a
//! second child arrives, the same machine simply starts tracking a second
//! choice; nothing needs to be migrated or upgraded. [`Monadic`] and
//! [`Dyadic`] remain independently usable, fully tested components for
//! callers that want exactly a one- or two-choice machine directly — the
//! chain driver just happens not to need the upgrade dance the source
//! material performs, because `Polyadic` already subsumes both cases.
//!
//! ## Polling algorithm
//!
//! 1. Compute, in one depth-first pass over the bag, the aggregate vote
//!    count of every live node's subtree.
//! 2. Walk the path from the root to the *current* preferred tip. At every
//!    node along that path that has at least one live child, feed its
//!    decision point the `(count, child)` pair with the largest aggregate
//!    among its live children (ties broken lexicographically) — exactly
//!    the same "mode of a bag" rule [`crate::consensus::bag::Bag::mode`]
//!    uses at the top level. Every node on the path is polled in this one
//!    pass, which is what lets a multi-level commit (scenario D) finalize
//!    several ancestors in a single `record_poll` call.
//! 3. Walk root-downward: at each node whose decision point just became
//!    (or already was) finalized, reject every other live child's entire
//!    subtree and, if the winning child is still `Processing`, accept it
//!    and advance the accepted frontier. Stop at the first unresolved
//!    decision point.
//! 4. Recompute the preferred tip by following each decision point's
//!    current preference from the (possibly advanced) root down to a
//!    leaf.

use std::collections::{HashMap, HashSet};

use crate::consensus::bag::Bag;
use crate::consensus::machines::{Finalizable, Polyadic, Preference};
use crate::consensus::params::Parameters;
use crate::id::Id;

/// Lifecycle status of a block in the forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Known to exist but not yet attached (never actually stored this
    /// way in the forest — kept for completeness with the governing data
    /// model's lifecycle description).
    Unknown,
    /// Attached to the forest, contested or not, awaiting finalization.
    Processing,
    /// Irrevocably accepted. Terminal.
    Accepted,
    /// Irrevocably rejected (a losing sibling or its descendant). Terminal.
    Rejected,
}

/// A block (or DAG vertex) as the chain driver sees it: enough topology
/// information to place it in the forest. The payload itself is opaque —
/// the collaborator VM owns its interpretation.
#[derive(Debug, Clone)]
pub struct Block {
    /// This block's identifier.
    pub id: Id,
    /// The parent this block extends.
    pub parent: Id,
    /// Height, one greater than the parent's.
    pub height: u64,
    /// Opaque VM payload. Never inspected by the chain driver.
    pub payload: Vec<u8>,
}

impl Block {
    /// Construct a block record.
    pub fn new(id: Id, parent: Id, height: u64, payload: Vec<u8>) -> Self {
        Self {
            id,
            parent,
            height,
            payload,
        }
    }
}

#[derive(Debug, Clone)]
struct NodeRecord {
    parent: Id,
    height: u64,
    status: Status,
}

/// Errors from [`Chain::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// The parent named by the new block is not present in the forest.
    #[error("unknown parent")]
    UnknownParent,
    /// A block with this id is already present.
    #[error("duplicate block")]
    Duplicate,
    /// `height` did not equal `parent.height + 1`.
    #[error("height mismatch: expected {expected}, got {got}")]
    HeightMismatch {
        /// The height the chain expected.
        expected: u64,
        /// The height the block claimed.
        got: u64,
    },
    /// The named parent has already been rejected; nothing may extend it.
    #[error("rejected ancestor")]
    RejectedAncestor,
}

/// Result of [`Chain::record_poll`]: whether the preferred tip moved, and
/// which blocks crossed a finalization boundary this round, in the order
/// the collaborator VM must be notified.
#[derive(Debug, Clone, Default)]
pub struct PollOutcome {
    /// `true` if the preferred tip changed as a result of this poll.
    pub changed: bool,
    /// Newly accepted blocks, in strictly increasing height order.
    pub accepted: Vec<Id>,
    /// Newly rejected blocks (siblings and their subtrees), in the order
    /// they were rejected. Always observed by the VM before the `accept`
    /// of the sibling that beat them.
    pub rejected: Vec<Id>,
}

/// The block-tree consensus driver.
pub struct Chain {
    params: Parameters,
    blocks: HashMap<Id, NodeRecord>,
    children: HashMap<Id, Vec<Id>>,
    decisions: HashMap<Id, Polyadic>,
    last_accepted: Id,
    preferred_leaf: Id,
    preferred_path: HashSet<Id>,
}

impl Chain {
    /// Seed a new forest rooted at `last_accepted`, already `Accepted`.
    pub fn initialize(params: Parameters, last_accepted: Id, last_accepted_height: u64) -> Self {
        let mut blocks = HashMap::new();
        blocks.insert(
            last_accepted,
            NodeRecord {
                parent: Id::EMPTY,
                height: last_accepted_height,
                status: Status::Accepted,
            },
        );
        let mut preferred_path = HashSet::new();
        preferred_path.insert(last_accepted);
        Self {
            params,
            blocks,
            children: HashMap::new(),
            decisions: HashMap::new(),
            last_accepted,
            preferred_leaf: last_accepted,
            preferred_path,
        }
    }

    /// Attach `block` to an existing, non-rejected parent.
    pub fn add(&mut self, block: Block) -> Result<(), ChainError> {
        if self.blocks.contains_key(&block.id) {
            return Err(ChainError::Duplicate);
        }
        let parent = self.blocks.get(&block.parent).ok_or(ChainError::UnknownParent)?;
        if parent.status == Status::Rejected {
            return Err(ChainError::RejectedAncestor);
        }
        let expected_height = parent.height + 1;
        if block.height != expected_height {
            return Err(ChainError::HeightMismatch {
                expected: expected_height,
                got: block.height,
            });
        }

        self.blocks.insert(
            block.id,
            NodeRecord {
                parent: block.parent,
                height: block.height,
                status: Status::Processing,
            },
        );
        let siblings = self.children.entry(block.parent).or_default();
        siblings.push(block.id);

        self.decisions.entry(block.parent).or_insert_with(|| {
            Polyadic::new(&self.params, block.id)
        });

        self.recompute_preferred_path();
        Ok(())
    }

    /// The current preferred tip.
    pub fn preference(&self) -> Id {
        self.preferred_leaf
    }

    /// `true` if `id` lies on the currently preferred path (from the
    /// accepted root down to the preferred tip, inclusive).
    pub fn is_preferred(&self, id: &Id) -> bool {
        self.preferred_path.contains(id)
    }

    /// `true` if `id` has been irrevocably accepted.
    pub fn is_accepted(&self, id: &Id) -> bool {
        matches!(self.blocks.get(id), Some(n) if n.status == Status::Accepted)
    }

    /// `true` if `id` has been irrevocably rejected.
    pub fn is_rejected(&self, id: &Id) -> bool {
        matches!(self.blocks.get(id), Some(n) if n.status == Status::Rejected)
    }

    /// Number of blocks still awaiting a verdict.
    pub fn num_processing(&self) -> usize {
        self.blocks
            .values()
            .filter(|n| n.status == Status::Processing)
            .count()
    }

    /// `true` iff no contested blocks remain outstanding.
    pub fn finalized(&self) -> bool {
        self.num_processing() == 0
    }

    /// The last accepted block (forest root).
    pub fn last_accepted(&self) -> Id {
        self.last_accepted
    }

    /// Apply one round's tallies to the forest.
    pub fn record_poll(&mut self, bag: &Bag) -> PollOutcome {
        let old_tip = self.preferred_leaf;
        let aggregates = self.compute_aggregates(bag);

        // Step 1 & 2: poll every decision point on the path root -> tip,
        // using the path as it stood before this round's updates.
        let path = self.path_from_root(self.preferred_leaf);
        for &node in &path {
            let live_children = self.live_children(&node);
            if live_children.is_empty() {
                continue;
            }
            let mut child_bag = Bag::new();
            for &child in &live_children {
                let count = aggregates.get(&child).copied().unwrap_or(0);
                child_bag.add_count(child, count.min(u32::MAX as u64) as u32);
            }
            let (mode_child, mode_count) = child_bag
                .mode()
                .unwrap_or((live_children[0], 0));
            if let Some(machine) = self.decisions.get_mut(&node) {
                machine.record_poll(mode_count, mode_child);
            }
        }

        // Step 3: root-downward commit pass.
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        let mut current = self.last_accepted;
        loop {
            let live_children = self.live_children(&current);
            if live_children.is_empty() {
                break;
            }
            let finalized_choice = self
                .decisions
                .get(&current)
                .filter(|m| m.finalized())
                .map(|m| m.preference());
            let Some(winner) = finalized_choice else {
                break;
            };
            for &child in &live_children {
                if child != winner {
                    self.reject_subtree(child, &mut rejected);
                }
            }
            if matches!(self.blocks.get(&winner).map(|n| n.status), Some(Status::Processing)) {
                self.blocks.get_mut(&winner).unwrap().status = Status::Accepted;
                self.last_accepted = winner;
                accepted.push(winner);
                current = winner;
            } else {
                // Already accepted in a previous round; nothing more to do
                // at this level, but keep walking in case a descendant
                // decision point has also already finalized.
                current = winner;
            }
        }

        self.recompute_preferred_path();
        PollOutcome {
            changed: old_tip != self.preferred_leaf,
            accepted,
            rejected,
        }
    }

    // -- internal helpers ----------------------------------------------

    fn live_children(&self, id: &Id) -> Vec<Id> {
        let mut live: Vec<Id> = self
            .children
            .get(id)
            .map(|cs| {
                cs.iter()
                    .copied()
                    .filter(|c| !matches!(self.blocks.get(c).map(|n| n.status), Some(Status::Rejected)))
                    .collect()
            })
            .unwrap_or_default();
        live.sort();
        live
    }

    fn reject_subtree(&mut self, root: Id, rejected: &mut Vec<Id>) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.blocks.get_mut(&id) {
                if node.status == Status::Rejected {
                    continue;
                }
                node.status = Status::Rejected;
            }
            rejected.push(id);
            if let Some(children) = self.children.get(&id) {
                stack.extend(children.iter().copied());
            }
        }
    }

    fn path_from_root(&self, tip: Id) -> Vec<Id> {
        // Walk from last_accepted to `tip` by repeatedly descending to
        // whichever live child is an ancestor of (or equal to) tip.
        let mut path = vec![self.last_accepted];
        let mut current = self.last_accepted;
        while current != tip {
            let next = self
                .live_children(&current)
                .into_iter()
                .find(|c| *c == tip || self.is_ancestor_of(*c, tip));
            match next {
                Some(n) => {
                    path.push(n);
                    current = n;
                }
                None => break,
            }
        }
        path
    }

    fn is_ancestor_of(&self, maybe_ancestor: Id, descendant: Id) -> bool {
        let mut current = descendant;
        loop {
            if current == maybe_ancestor {
                return true;
            }
            match self.blocks.get(&current) {
                Some(n) if n.parent != current => current = n.parent,
                _ => return false,
            }
            if current == self.last_accepted && maybe_ancestor != self.last_accepted {
                return maybe_ancestor == current;
            }
        }
    }

    fn recompute_preferred_path(&mut self) {
        let mut path = HashSet::new();
        let mut current = self.last_accepted;
        path.insert(current);
        loop {
            let live_children = self.live_children(&current);
            if live_children.is_empty() {
                break;
            }
            let next = match self.decisions.get(&current) {
                Some(machine) => {
                    let preferred = machine.preference();
                    if live_children.contains(&preferred) {
                        preferred
                    } else {
                        live_children[0]
                    }
                }
                None => live_children[0],
            };
            path.insert(next);
            current = next;
        }
        self.preferred_leaf = current;
        self.preferred_path = path;
    }

    fn compute_aggregates(&self, bag: &Bag) -> HashMap<Id, u64> {
        let mut agg = HashMap::new();
        self.aggregate_node(self.last_accepted, bag, &mut agg);
        agg
    }

    fn aggregate_node(&self, id: Id, bag: &Bag, agg: &mut HashMap<Id, u64>) -> u64 {
        let mut total = bag.count(&id) as u64;
        if let Some(children) = self.children.get(&id) {
            for &child in children {
                if !matches!(self.blocks.get(&child).map(|n| n.status), Some(Status::Rejected)) {
                    total += self.aggregate_node(child, bag, agg);
                }
            }
        }
        agg.insert(id, total);
        total
    }
}
