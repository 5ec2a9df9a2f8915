//! Shared confidence-vector bookkeeping used by [`super::monadic::Monadic`]
//! and [`super::dyadic::Dyadic`] (and, through the latter, embedded in
//! [`super::polyadic::Polyadic`]'s threshold machine).
//!
//! `confidence[i]` must stay monotonically non-increasing in `i`: once the
//! quorum for condition `i` fails, every confidence counter from `i`
//! onward is cleared in the same step. That invariant is enforced here,
//! once, instead of being re-derived in three call sites.

use crate::consensus::params::TerminationCondition;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfidenceVector {
    conditions: Vec<TerminationCondition>,
    counts: Vec<u32>,
    finalized: bool,
}

impl ConfidenceVector {
    pub fn new(conditions: Vec<TerminationCondition>) -> Self {
        let len = conditions.len();
        Self {
            conditions,
            counts: vec![0; len],
            finalized: false,
        }
    }

    pub fn finalized(&self) -> bool {
        self.finalized
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Clear every confidence counter. Used both for an unsuccessful poll
    /// and for a preference switch.
    pub fn clear(&mut self) {
        if self.finalized {
            return;
        }
        for c in &mut self.counts {
            *c = 0;
        }
    }

    /// Apply a successful poll's tally. Walks conditions in ascending
    /// `alpha_conf` order: for each index whose quorum is met, increments
    /// confidence and checks for finalization; at the first index whose
    /// quorum is *not* met, clears that index and everything after it,
    /// then stops. Returns `true` if this call finalized the machine.
    ///
    /// No-op (returns `false`) if already finalized.
    pub fn record_successful(&mut self, count: u32) -> bool {
        if self.finalized {
            return false;
        }
        for i in 0..self.conditions.len() {
            let cond = self.conditions[i];
            if count >= cond.alpha_conf {
                self.counts[i] += 1;
                if self.counts[i] >= cond.beta {
                    self.finalized = true;
                    return true;
                }
            } else {
                for c in &mut self.counts[i..] {
                    *c = 0;
                }
                break;
            }
        }
        false
    }
}
