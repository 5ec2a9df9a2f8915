//! # Dyadic Machine
//!
//! Adds a two-choice preference (`slush`) on top of the monadic
//! confidence vector. `record_poll` both updates the preference and walks
//! the confidence ladder in a single step, since the two are coupled: a
//! preference switch clears confidence *before* the new count is applied.

use super::confidence::ConfidenceVector;
use super::{Finalizable, Preference};
use crate::consensus::params::Parameters;

/// Two-choice confidence + preference machine.
#[derive(Debug, Clone)]
pub struct Dyadic {
    confidence: ConfidenceVector,
    alpha_pref: u32,
    slush: u8,
}

impl Dyadic {
    /// Construct a fresh dyadic machine from the given parameters,
    /// initially preferring `initial_preference` (`0` or `1`).
    pub fn new(params: &Parameters, initial_preference: u8) -> Self {
        Self {
            confidence: ConfidenceVector::new(params.termination_conditions()),
            alpha_pref: params.alpha_pref,
            slush: initial_preference,
        }
    }

    /// Build a dyadic machine from a pre-existing confidence vector and the
    /// `alpha_pref` that produced it — used by [`super::Monadic::extend`].
    pub(super) fn from_confidence(
        confidence: ConfidenceVector,
        alpha_pref: u32,
        initial_preference: u8,
    ) -> Self {
        Self {
            confidence,
            alpha_pref,
            slush: initial_preference,
        }
    }

    /// Record a poll tally for `choice` (`0` or `1`).
    ///
    /// 1. If already finalized, no-op.
    /// 2. If `count < alpha_pref`, clear confidence (unsuccessful poll).
    /// 3. If `choice` differs from the current slush, clear confidence
    ///    *before* switching — a preference change invalidates
    ///    accumulated agreement with the old preference.
    /// 4. Adopt `choice` as the new slush.
    /// 5. Walk the termination-condition ladder with `count`.
    pub fn record_poll(&mut self, count: u32, choice: u8) {
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

impl Finalizable for Dyadic {
    fn finalized(&self) -> bool {
        self.confidence.finalized()
    }
}

impl Preference for Dyadic {
    type Choice = u8;

    fn preference(&self) -> u8 {
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

    #[test]
    fn initial_preference_is_retained_without_input() {
        let p = params(2, 2, 2, 1);
        let d = Dyadic::new(&p, 1);
        assert_eq!(d.preference(), 1);
        assert!(!d.finalized());
    }

    #[test]
    fn quorum_equal_to_alpha_pref_but_below_alpha_conf_updates_preference_only() {
        let p = params(10, 5, 8, 1);
        let mut d = Dyadic::new(&p, 0);
        d.record_poll(5, 1);
        assert_eq!(d.preference(), 1);
        assert_eq!(d.confidence(), &[0]);
    }

    #[test]
    fn below_alpha_pref_clears_confidence_regardless_of_preference() {
        let p = params(10, 5, 5, 2);
        let mut d = Dyadic::new(&p, 0);
        d.record_poll(5, 0);
        assert_eq!(d.confidence(), &[1]);
        d.record_poll(2, 0); // below alpha_pref
        assert_eq!(d.confidence(), &[0]);
        assert_eq!(d.preference(), 0);
    }

    #[test]
    fn preference_flip_clears_confidence_before_switching() {
        let p = params(3, 2, 3, 2);
        let mut d = Dyadic::new(&p, 0);
        d.record_poll(3, 0);
        assert_eq!(d.confidence(), &[1]);
        d.record_poll(2, 1); // flips preference, only meets alpha_pref not alpha_conf
        assert_eq!(d.preference(), 1);
        assert_eq!(d.confidence(), &[0]);
    }

    #[test]
    fn finalizes_on_sustained_agreement() {
        let p = params(2, 2, 2, 1);
        let mut d = Dyadic::new(&p, 0);
        d.record_poll(2, 1);
        assert!(d.finalized());
        assert_eq!(d.preference(), 1);
    }

    #[test]
    fn finalized_machine_ignores_further_polls() {
        let p = params(1, 1, 1, 1);
        let mut d = Dyadic::new(&p, 0);
        d.record_poll(1, 1);
        assert!(d.finalized());
        d.record_poll(1, 0);
        assert_eq!(d.preference(), 1);
    }

    // Scenario C from the testable properties: preference flips twice
    // without either flip accumulating enough confidence to finalize.
    #[test]
    fn scenario_c_preference_flip_without_finalization() {
        let p = params(3, 2, 3, 2);
        let mut d = Dyadic::new(&p, 0);
        d.record_poll(2, 0); // update pref, no confidence (2 < alpha_conf=3)
        assert_eq!(d.preference(), 0);
        d.record_poll(2, 1); // flips to 1, confidence cleared
        assert_eq!(d.preference(), 1);
        assert!(!d.finalized());
        assert_eq!(d.confidence(), &[0]);
    }
}
