//! # Polyadic Machine
//!
//! Generalizes the dyadic machine's two-choice preference to an arbitrary
//! number of [`Id`]-keyed choices. The preference is the same "slush"
//! notion as the dyadic case — whichever choice most recently met
//! `alpha_pref` — just keyed by `Id` instead of `0|1`; confidence and
//! finalization are bound to whatever the *current* poll reports, exactly
//! like a dyadic machine.

use super::confidence::ConfidenceVector;
use super::{Finalizable, Preference};
use crate::consensus::params::Parameters;
use crate::id::Id;

/// Many-choice confidence + preference (slush) machine.
#[derive(Debug, Clone)]
pub struct Polyadic {
    confidence: ConfidenceVector,
    alpha_pref: u32,
    slush: Id,
}

impl Polyadic {
    /// Construct a fresh polyadic machine, initially preferring `initial`.
    pub fn new(params: &Parameters, initial: Id) -> Self {
        Self {
            confidence: ConfidenceVector::new(params.termination_conditions()),
            alpha_pref: params.alpha_pref,
            slush: initial,
        }
    }

    /// Record a poll tally for `choice`.
    ///
    /// 1. If already finalized, no-op.
    /// 2. If `count < alpha_pref`, clear confidence (unsuccessful poll).
    /// 3. If `choice` differs from the current slush, clear confidence
    ///    *before* switching — a preference change invalidates
    ///    accumulated agreement with the old preference.
    /// 4. Adopt `choice` as the new slush.
    /// 5. Walk the termination-condition ladder with `count`.
    pub fn record_poll(&mut self, count: u32, choice: Id) {
        if self.finalized() {
            return;
        }
        if count < self.alpha_pref {
            self.confidence.clear();
            return;
        }
        if choice != self.slush {
            self.confidence.clear();
            self.slush = choice;
        }
        self.confidence.record_successful(count);
    }

    /// Clear every confidence counter without touching the preference.
    pub fn record_unsuccessful_poll(&mut self) {
        self.confidence.clear();
    }

    /// The raw confidence counters.
    pub fn confidence(&self) -> &[u32] {
        self.confidence.counts()
    }
}

impl Finalizable for Polyadic {
    fn finalized(&self) -> bool {
        self.confidence.finalized()
    }
}

impl Preference for Polyadic {
    type Choice = Id;

    fn preference(&self) -> Id {
        self.slush
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn params(k: u32, alpha_pref: u32, alpha_conf: u32, beta: u32) -> Parameters {
        Parameters::new(k, alpha_pref, alpha_conf, beta, 1, 1, 1, Duration::from_secs(1)).unwrap()
    }

    fn id(b: u8) -> Id {
        let mut bytes = [0u8; 32];
        bytes[31] = b;
        Id::from_bytes(bytes)
    }

    #[test]
    fn initial_preference_is_retained_without_input() {
        let p = params(2, 2, 2, 1);
        let m = Polyadic::new(&p, id(9));
        assert_eq!(m.preference(), id(9));
        assert!(!m.finalized());
    }

    #[test]
    fn quorum_equal_to_alpha_pref_but_below_alpha_conf_updates_preference_only() {
        let p = params(10, 5, 8, 1);
        let mut m = Polyadic::new(&p, id(0));
        m.record_poll(5, id(1));
        assert_eq!(m.preference(), id(1));
        assert_eq!(m.confidence(), &[0]);
    }

    #[test]
    fn below_alpha_pref_clears_confidence_regardless_of_preference() {
        let p = params(10, 5, 5, 2);
        let mut m = Polyadic::new(&p, id(0));
        m.record_poll(5, id(0));
        assert_eq!(m.confidence(), &[1]);
        m.record_poll(2, id(0)); // below alpha_pref
        assert_eq!(m.confidence(), &[0]);
        assert_eq!(m.preference(), id(0));
    }

    // Scenario C: preference flips on each successive leading poll, with
    // neither flip accumulating enough confidence to finalize.
    #[test]
    fn scenario_c_preference_flip_without_finalization() {
        let p = params(3, 2, 3, 2);
        let mut m = Polyadic::new(&p, id(0));
        m.record_poll(2, id(1)); // update pref, no confidence (2 < alpha_conf=3)
        assert_eq!(m.preference(), id(1));
        m.record_poll(2, id(2)); // flips to id(2), confidence cleared
        assert_eq!(m.preference(), id(2));
        assert!(!m.finalized());
        assert_eq!(m.confidence(), &[0]);
    }

    #[test]
    fn finalizes_on_sustained_agreement() {
        let p = params(2, 2, 2, 1);
        let mut m = Polyadic::new(&p, id(0));
        m.record_poll(2, id(7));
        assert!(m.finalized());
        assert_eq!(m.preference(), id(7));
    }

    #[test]
    fn finalized_machine_ignores_further_polls() {
        let p = params(1, 1, 1, 1);
        let mut m = Polyadic::new(&p, id(0));
        m.record_poll(1, id(1));
        assert!(m.finalized());
        m.record_poll(1, id(0));
        assert_eq!(m.preference(), id(1));
    }
}
