//! Key rank bounds from per-byte scores.
use ndarray::{ArrayView2, Axis};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    convolution::CombinedHistogram,
    distribution::log_probabilities,
    histogram::{BinEdges, Histogram},
    util::log2_plus_one,
};

/// Number of histogram bins used by default, one per candidate byte value.
pub const DEFAULT_NUM_BINS: usize = 256;

/// Bounds on `log2` of the rank of the correct key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankBounds {
    pub lower: f64,
    pub upper: f64,
}

impl RankBounds {
    /// Derive the bounds from the combined histogram and the bin of the correct key.
    ///
    /// `half_width` bins around `true_key_bin` are left out of the lower bound count and included
    /// in the upper bound count. Out of range indices are clamped.
    pub fn from_histogram(
        combined: &CombinedHistogram,
        true_key_bin: i64,
        half_width: usize,
    ) -> Self {
        let half_width = half_width as i64;
        let lower_count = combined.tail_sum(true_key_bin.saturating_add(half_width));
        let upper_count = combined.tail_sum(true_key_bin.saturating_sub(half_width + 1));

        Self::from_counts(&lower_count, &upper_count)
    }

    /// Bounds from candidate counts, as `log2(count + 1)`.
    pub fn from_counts(lower_count: &BigUint, upper_count: &BigUint) -> Self {
        Self {
            lower: log2_plus_one(lower_count),
            upper: log2_plus_one(upper_count),
        }
    }
}

/// Bin of the correct key in the [`CombinedHistogram`].
///
/// Each key byte contributes the position of its log probability against `edges` (see
/// [`Histogram::scalar_position`]). An out-of-range value is clipped to an edge bin, so each
/// position lies in `1..=num_bins` and the result is always a bin of the combined histogram.
/// Positions are 1-based, so `key.len() - 1` is subtracted from their sum.
///
/// # Panics
/// Panics if a key byte is not a row index of `log_probs` or if `key` is longer than the number
/// of columns.
pub fn true_key_bin(log_probs: ArrayView2<f64>, edges: &BinEdges, key: &[u8]) -> i64 {
    let sum: u64 = key
        .iter()
        .enumerate()
        .map(|(i, &byte)| Histogram::scalar_position(log_probs[[byte as usize, i]], edges))
        .sum();

    sum as i64 - (key.len() as i64 - 1)
}

/// Intermediate results of a key rank estimation.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRank {
    /// Edges shared by every key byte
    pub edges: BinEdges,
    /// Convolution of the per-byte histograms
    pub combined: CombinedHistogram,
    /// Bin of the correct key in `combined`
    pub true_key_bin: i64,
    /// Rank bounds
    pub bounds: RankBounds,
}

/// Estimates bounds on the rank of a known key from score matrices.
///
/// Score matrices have one row per candidate byte value and one column per key byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRankEstimator {
    /// Correct key
    key: Vec<u8>,
    /// Number of histogram bins per key byte
    num_bins: usize,
}

impl KeyRankEstimator {
    /// # Panics
    /// Panic if `key` is empty or `num_bins` is 0.
    pub fn new(key: &[u8], num_bins: usize) -> Self {
        assert!(!key.is_empty());
        assert!(num_bins > 0);

        Self {
            key: key.to_vec(),
            num_bins,
        }
    }

    /// Return the correct key.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Return the number of histogram bins per key byte.
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// Number of bins around the correct key bin that separate the two bounds.
    pub fn half_width(&self) -> usize {
        self.key.len() / 2
    }

    /// Estimate the key rank bounds from a score matrix.
    pub fn estimate(&self, scores: ArrayView2<f64>) -> Result<RankBounds, Error> {
        Ok(self.key_rank(scores)?.bounds)
    }

    /// Estimate the key rank from a score matrix, keeping intermediate results.
    ///
    /// The edges of the first column are used to bin every column.
    pub fn key_rank(&self, scores: ArrayView2<f64>) -> Result<KeyRank, Error> {
        self.check_shape(scores)?;

        let log_probs = log_probabilities(scores)?;
        let edges = BinEdges::from_reference(log_probs.column(0), self.num_bins);

        let histograms: Vec<Histogram> = log_probs
            .axis_iter(Axis(1))
            .enumerate()
            .map(|(i, column)| {
                if i == 0 {
                    // Reference column is within its own range
                    Histogram::from_values(column, &edges)
                } else {
                    Histogram::with_clipping(column, &edges)
                }
            })
            .collect();
        let combined = CombinedHistogram::from_histograms(&histograms);

        let true_key_bin = true_key_bin(log_probs.view(), &edges, &self.key);
        let bounds = RankBounds::from_histogram(&combined, true_key_bin, self.half_width());

        Ok(KeyRank {
            edges,
            combined,
            true_key_bin,
            bounds,
        })
    }

    fn check_shape(&self, scores: ArrayView2<f64>) -> Result<(), Error> {
        let (candidates, columns) = scores.dim();
        if columns != self.key.len() {
            return Err(Error::ShapeMismatch {
                expected: self.key.len(),
                found: columns,
            });
        }
        if let Some((position, &value)) = self
            .key
            .iter()
            .enumerate()
            .find(|&(_, &byte)| byte as usize >= candidates)
        {
            return Err(Error::InvalidKeyByte {
                position,
                value,
                candidates,
            });
        }

        Ok(())
    }
}
