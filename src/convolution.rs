//! Exact convolution of per-byte histograms into a full key histogram.
use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::histogram::Histogram;

/// Discrete convolution of two count sequences.
///
/// `out[i] = sum(a[i - k] * b[k])`, the output has `a.len() + b.len() - 1` elements, or none if
/// one of the inputs is empty. Counts are arbitrary precision integers, so the result is exact.
pub fn convolve(a: &[BigUint], b: &[BigUint]) -> Vec<BigUint> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }

    let mut out = vec![BigUint::zero(); a.len() + b.len() - 1];
    for (k, y) in b.iter().enumerate() {
        // Per-byte histograms are sparse, skip empty bins
        if y.is_zero() {
            continue;
        }
        for (j, x) in a.iter().enumerate() {
            if !x.is_zero() {
                out[j + k] += x * y;
            }
        }
    }

    out
}

/// Histogram of the full key log probability, indexed by the sum of the per-byte bin indices.
///
/// Under the assumption that key bytes are independent, bin `i` counts the full key candidates
/// whose per-byte bin indices sum to `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedHistogram {
    counts: Vec<BigUint>,
}

impl CombinedHistogram {
    /// The neutral element of convolution, `[1]`.
    pub fn identity() -> Self {
        Self {
            counts: vec![BigUint::one()],
        }
    }

    /// Convolve the histograms together, from left to right.
    ///
    /// For `n` histograms of `b` bins, the result has `n * b - (n - 1)` bins.
    pub fn from_histograms(histograms: &[Histogram]) -> Self {
        histograms
            .iter()
            .fold(Self::identity(), |combined, histogram| {
                combined.convolve(histogram)
            })
    }

    /// Convolve with one more per-byte histogram.
    pub fn convolve(&self, histogram: &Histogram) -> Self {
        let counts: Vec<BigUint> = histogram
            .counts()
            .iter()
            .map(|&count| BigUint::from(count))
            .collect();

        Self {
            counts: convolve(&self.counts, &counts),
        }
    }

    /// Return the counts per bin.
    pub fn counts(&self) -> &[BigUint] {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Return the number of full key candidates covered by the histogram.
    pub fn total(&self) -> BigUint {
        self.counts.iter().sum()
    }

    /// Sum of the bins from `start` to the end.
    ///
    /// `start` is clamped to the histogram: a negative start sums every bin, a start past the end
    /// sums nothing.
    pub fn tail_sum(&self, start: i64) -> BigUint {
        let start = usize::try_from(start.max(0)).unwrap_or(usize::MAX);
        self.counts.iter().skip(start).sum()
    }
}

impl From<Vec<BigUint>> for CombinedHistogram {
    fn from(counts: Vec<BigUint>) -> Self {
        Self { counts }
    }
}
