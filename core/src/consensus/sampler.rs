//! # Weighted Sampler
//!
//! Seeded, weighted, without-replacement selection of a voter set. Used
//! both for bootstrap peer selection ([`crate::consensus::bootstrap`]) and
//! for per-round voter selection ([`crate::consensus::engine`]).
//!
//! Determinism is the whole point: the same `(weights, k, seed)` must
//! produce the same ordered output on every platform, every run, forever.
//! We get that for free from [`rand::rngs::StdRng`], which is specified to
//! be a fixed, portable generator (not "whatever the platform's default
//! happens to be") — unlike `rand::thread_rng()`, which we never use here.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Errors from [`sample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SampleError {
    /// The sum of the input weights overflowed `u64`.
    #[error("sum of sample weights overflows u64")]
    Overflow,
}

/// Draw up to `k` distinct indices into `weights` without replacement.
///
/// The probability of drawing index `i` at any given step is
/// `weights[i] / sum(remaining weights)`, conditioned on the indices
/// already drawn. Indices with weight zero are never selected. If fewer
/// than `k` indices have nonzero weight, the result contains exactly that
/// many indices (`min(k, count_nonzero_weights)`).
///
/// Deterministic in `(weights, k, seed)`.
pub fn sample(weights: &[u64], k: usize, seed: u64) -> Result<Vec<usize>, SampleError> {
    let mut total: u64 = 0;
    for &w in weights {
        total = total.checked_add(w).ok_or(SampleError::Overflow)?;
    }

    let mut candidates: Vec<(usize, u64)> = weights
        .iter()
        .enumerate()
        .filter(|&(_, &w)| w > 0)
        .map(|(i, &w)| (i, w))
        .collect();

    let draws = k.min(candidates.len());
    let mut rng = StdRng::seed_from_u64(seed);
    let mut remaining_total: u64 = candidates.iter().map(|&(_, w)| w).sum();
    let mut result = Vec::with_capacity(draws);

    for _ in 0..draws {
        // gen_range is exclusive of the upper bound; remaining_total > 0
        // here because every candidate has weight > 0 and at least one
        // candidate remains.
        let mut target = rng.gen_range(0..remaining_total);
        let mut chosen_pos = candidates.len() - 1;
        for (pos, &(_, w)) in candidates.iter().enumerate() {
            if target < w {
                chosen_pos = pos;
                break;
            }
            target -= w;
        }
        let (idx, w) = candidates.remove(chosen_pos);
        remaining_total -= w;
        result.push(idx);
    }

    Ok(result)
}
