//! # Consensus Parameters
//!
//! `Parameters` bundles every consensus tunable into one eagerly validated
//! struct. Per the redesign flag in the source material, there is no
//! loosely-typed parameter map here — construction either returns a
//! validated `Parameters`, or a specific [`ParamsError`] naming exactly
//! which constraint failed. Nothing downstream ever has to guard against
//! a malformed configuration; `validate()` already did it.

use std::time::Duration;

/// A single `(alpha_conf, beta)` termination condition. The engine may
/// carry several of these — an ascending `alpha_conf` lets a stricter
/// quorum finalize in fewer consecutive rounds than a looser one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationCondition {
    /// Confidence quorum for this condition.
    pub alpha_conf: u32,
    /// Consecutive successful polls at `alpha_conf` required to finalize.
    pub beta: u32,
}

impl TerminationCondition {
    /// Construct a termination condition.
    pub const fn new(alpha_conf: u32, beta: u32) -> Self {
        Self { alpha_conf, beta }
    }
}

/// Consensus tunables. See §3/§4.1 of the governing design for the full
/// semantics of each field.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    /// Voter-set size sampled per poll.
    pub k: u32,
    /// Quorum required to update a preference.
    pub alpha_pref: u32,
    /// Quorum required to increment confidence.
    pub alpha_conf: u32,
    /// Consecutive successful-quorum polls required for finalization.
    pub beta: u32,
    /// Additional termination conditions beyond the primary
    /// `(alpha_conf, beta)` pair, in ascending `alpha_conf` order. May be
    /// empty; the primary pair is always condition zero.
    pub extra_conditions: Vec<TerminationCondition>,
    /// Concurrent in-flight polls per instance.
    pub concurrent_polls: u32,
    /// Target concurrent items in processing.
    pub optimal_processing: u32,
    /// Hard cap on items being decided at once.
    pub max_outstanding: u32,
    /// Timeout before an item in `Processing` is considered stalled.
    pub max_item_processing_time: Duration,
}

/// Errors returned by [`Parameters::validate`]. Each variant names exactly
/// one violated invariant; these are construction-time errors and are
/// never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamsError {
    /// `k` must be at least 1.
    #[error("invalid K: {0} (must be >= 1)")]
    InvalidK(u32),
    /// `alpha_pref`/`alpha_conf` must satisfy `1 <= alpha_pref <= alpha_conf <= k`.
    #[error("invalid alpha: alpha_pref={alpha_pref}, alpha_conf={alpha_conf}, k={k} (require 1 <= alpha_pref <= alpha_conf <= k)")]
    InvalidAlpha {
        /// The offending `alpha_pref`.
        alpha_pref: u32,
        /// The offending `alpha_conf`.
        alpha_conf: u32,
        /// The `k` they were checked against.
        k: u32,
    },
    /// `beta` must be at least 1, and extra conditions must have
    /// ascending `alpha_conf` with non-increasing `beta`.
    #[error("invalid beta: {0}")]
    InvalidBeta(String),
    /// `concurrent_polls` must be at least 1.
    #[error("invalid concurrency: concurrent_polls={0} (must be >= 1)")]
    InvalidConcurrency(u32),
    /// `optimal_processing`/`max_outstanding` must satisfy
    /// `1 <= optimal_processing <= max_outstanding`.
    #[error("invalid outstanding bounds: optimal_processing={optimal}, max_outstanding={max} (require 1 <= optimal <= max)")]
    InvalidOutstanding {
        /// The offending `optimal_processing`.
        optimal: u32,
        /// The offending `max_outstanding`.
        max: u32,
    },
}

impl Parameters {
    /// Construct and validate a parameter set in one step.
    pub fn new(
        k: u32,
        alpha_pref: u32,
        alpha_conf: u32,
        beta: u32,
        concurrent_polls: u32,
        optimal_processing: u32,
        max_outstanding: u32,
        max_item_processing_time: Duration,
    ) -> Result<Self, ParamsError> {
        let params = Self {
            k,
            alpha_pref,
            alpha_conf,
            beta,
            extra_conditions: Vec::new(),
            concurrent_polls,
            optimal_processing,
            max_outstanding,
            max_item_processing_time,
        };
        params.validate()?;
        Ok(params)
    }

    /// A profile tuned for a roughly 20-node quorum: K=20, alpha=15, beta=20.
    pub fn mainnet_default() -> Self {
        Self::new(
            20,
            15,
            15,
            20,
            4,
            50,
            1_000,
            Duration::from_secs(30),
        )
        .expect("mainnet_default parameters are always valid")
    }

    /// A degenerate single-node profile for local development and tests.
    pub fn local_test() -> Self {
        Self::new(1, 1, 1, 1, 1, 1, 1, Duration::from_secs(5))
            .expect("local_test parameters are always valid")
    }

    /// Returns the full, ascending-`alpha_conf` termination condition
    /// vector: the primary `(alpha_conf, beta)` pair followed by
    /// `extra_conditions`.
    pub fn termination_conditions(&self) -> Vec<TerminationCondition> {
        let mut conditions = Vec::with_capacity(1 + self.extra_conditions.len());
        conditions.push(TerminationCondition::new(self.alpha_conf, self.beta));
        conditions.extend(self.extra_conditions.iter().copied());
        conditions
    }

    /// Check every invariant, returning the first violation found.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.k < 1 {
            return Err(ParamsError::InvalidK(self.k));
        }
        if self.alpha_pref < 1 || self.alpha_pref > self.alpha_conf || self.alpha_conf > self.k {
            return Err(ParamsError::InvalidAlpha {
                alpha_pref: self.alpha_pref,
                alpha_conf: self.alpha_conf,
                k: self.k,
            });
        }
        if self.beta < 1 {
            return Err(ParamsError::InvalidBeta(format!(
                "beta={} (must be >= 1)",
                self.beta
            )));
        }
        let mut prev_alpha = self.alpha_conf;
        let mut prev_beta = self.beta;
        for cond in &self.extra_conditions {
            if cond.alpha_conf <= prev_alpha {
                return Err(ParamsError::InvalidBeta(format!(
                    "extra condition alpha_conf={} must exceed previous alpha_conf={}",
                    cond.alpha_conf, prev_alpha
                )));
            }
            if cond.beta > prev_beta {
                return Err(ParamsError::InvalidBeta(format!(
                    "extra condition beta={} must not exceed previous beta={}",
                    cond.beta, prev_beta
                )));
            }
            if cond.alpha_conf > self.k {
                return Err(ParamsError::InvalidAlpha {
                    alpha_pref: self.alpha_pref,
                    alpha_conf: cond.alpha_conf,
                    k: self.k,
                });
            }
            prev_alpha = cond.alpha_conf;
            prev_beta = cond.beta;
        }
        if self.concurrent_polls < 1 {
            return Err(ParamsError::InvalidConcurrency(self.concurrent_polls));
        }
        if self.optimal_processing < 1 || self.optimal_processing > self.max_outstanding {
            return Err(ParamsError::InvalidOutstanding {
                optimal: self.optimal_processing,
                max: self.max_outstanding,
            });
        }
        if self.max_item_processing_time.is_zero() {
            return Err(ParamsError::InvalidBeta(
                "max_item_processing_time must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
