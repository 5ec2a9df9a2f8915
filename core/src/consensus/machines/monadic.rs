//! # Monadic Machine
//!
//! Drives confidence over a single, fixed choice. A monadic machine never
//! changes what it's voting for — it only accumulates confidence that the
//! network agrees with it, or resets on disagreement.

use super::confidence::ConfidenceVector;
use super::dyadic::Dyadic;
use super::Finalizable;
use crate::consensus::params::Parameters;

/// Single-choice confidence counter.
#[derive(Debug, Clone)]
pub struct Monadic {
    confidence: ConfidenceVector,
    alpha_pref: u32,
}

impl Monadic {
    /// Construct a fresh monadic machine from the given parameters.
    pub fn new(params: &Parameters) -> Self {
        Self {
            confidence: ConfidenceVector::new(params.termination_conditions()),
            alpha_pref: params.alpha_pref,
        }
    }

    /// Record a poll tally for the machine's one choice.
    ///
    /// If `count < alpha_pref`, this is treated as an unsuccessful poll —
    /// see [`Self::record_unsuccessful_poll`]. Otherwise confidence is
    /// advanced per the termination-condition ladder.
    pub fn record_poll(&mut self, count: u32) {
        if count < self.alpha_pref {
            self.record_unsuccessful_poll();
            return;
        }
        self.confidence.record_successful(count);
    }

    /// Clear every confidence counter. Called directly for an unsuccessful
    /// poll, and internally whenever a preference switch invalidates
    /// accumulated confidence.
    pub fn record_unsuccessful_poll(&mut self) {
        self.confidence.clear();
    }

    /// The raw confidence counters, parallel to the parameters'
    /// termination-condition vector.
    pub fn confidence(&self) -> &[u32] {
        self.confidence.counts()
    }

    /// Extend this monadic machine into a two-choice [`Dyadic`] machine,
    /// seeded with the monadic's current confidence vector and preferring
    /// `original_preference` (`0` or `1`) as its current slush.
    pub fn extend(&self, original_preference: u8) -> Dyadic {
        Dyadic::from_confidence(self.confidence.clone(), self.alpha_pref, original_preference)
    }
}

impl Finalizable for Monadic {
    fn finalized(&self) -> bool {
        self.confidence.finalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::machines::Preference;
    use std::time::Duration;

    fn params(k: u32, alpha_pref: u32, alpha_conf: u32, beta: u32) -> Parameters {
        Parameters::new(k, alpha_pref, alpha_conf, beta, 1, 1, 1, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn finalizes_after_beta_successful_polls() {
        let p = params(2, 2, 2, 2);
        let mut m = Monadic::new(&p);
        assert!(!m.finalized());
        m.record_poll(2);
        assert!(!m.finalized());
        m.record_poll(2);
        assert!(m.finalized());
    }

    #[test]
    fn unsuccessful_poll_clears_confidence() {
        let p = params(3, 2, 3, 2);
        let mut m = Monadic::new(&p);
        m.record_poll(3);
        assert_eq!(m.confidence(), &[1]);
        m.record_poll(1); // below alpha_pref
        assert_eq!(m.confidence(), &[0]);
        assert!(!m.finalized());
    }

    #[test]
    fn meeting_alpha_pref_but_not_alpha_conf_does_not_build_confidence() {
        let p = params(10, 5, 8, 1);
        let mut m = Monadic::new(&p);
        m.record_poll(5); // >= alpha_pref, < alpha_conf
        assert_eq!(m.confidence(), &[0]);
        assert!(!m.finalized());
    }

    #[test]
    fn finalized_machine_is_immutable() {
        let p = params(1, 1, 1, 1);
        let mut m = Monadic::new(&p);
        m.record_poll(1);
        assert!(m.finalized());
        let before = m.confidence().to_vec();
        m.record_poll(1);
        m.record_unsuccessful_poll();
        assert_eq!(m.confidence(), before.as_slice());
        assert!(m.finalized());
    }

    #[test]
    fn extend_seeds_dyadic_with_current_confidence() {
        let p = params(3, 2, 3, 5);
        let mut m = Monadic::new(&p);
        m.record_poll(3);
        let d = m.extend(0);
        assert_eq!(d.confidence(), m.confidence());
        assert_eq!(d.preference(), 0);
    }

    #[test]
    fn clone_is_independent() {
        let p = params(2, 2, 2, 2);
        let mut m = Monadic::new(&p);
        m.record_poll(2);
        let clone = m.clone();
        m.record_poll(2);
        assert!(m.finalized());
        assert!(!clone.finalized());
    }
}
