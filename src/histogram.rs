//! Histograms of per-byte log probabilities over shared bin edges.
//!
//! Binning is a two-phase process: [`BinEdges`] are computed once from a reference column, then
//! every column (and every true key byte) is binned against those same edges.
use ndarray::{Array1, ArrayView1};

/// Ordered boundaries of `num_bins` equal-width bins.
#[derive(Debug, Clone, PartialEq)]
pub struct BinEdges {
    edges: Vec<f64>,
}

impl BinEdges {
    /// Compute `num_bins` equal-width bins spanning the finite values of `values`.
    ///
    /// A constant reference is widened to `[x - 0.5, x + 0.5]`. Without any finite value the
    /// range defaults to `[-0.5, 0.5]`.
    ///
    /// # Panics
    /// Panic if `num_bins` is 0.
    pub fn from_reference(values: ArrayView1<f64>, num_bins: usize) -> Self {
        assert!(num_bins > 0);

        let (mut min, mut max) = values
            .iter()
            .copied()
            .filter(|x| x.is_finite())
            .fold(None, |range, x| match range {
                None => Some((x, x)),
                Some((min, max)) => Some((f64::min(min, x), f64::max(max, x))),
            })
            .unwrap_or((0., 0.));
        if min == max {
            min -= 0.5;
            max += 0.5;
        }

        let width = (max - min) / num_bins as f64;
        let mut edges: Vec<f64> = (0..=num_bins).map(|i| min + i as f64 * width).collect();
        edges[num_bins] = max;

        Self { edges }
    }

    /// Return the number of bins.
    pub fn num_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Return the lowest edge.
    pub fn min(&self) -> f64 {
        self.edges[0]
    }

    /// Return the highest edge.
    pub fn max(&self) -> f64 {
        self.edges[self.num_bins()]
    }

    /// Return the edges.
    pub fn edges(&self) -> ArrayView1<f64> {
        ArrayView1::from(&self.edges)
    }

    /// Standard bin assignment.
    ///
    /// Bin `k` holds `edges[k] <= x < edges[k + 1]`, the last bin is closed on the right.
    /// Values below the range (including `-inf` and NaN) fall in the first bin, values above it
    /// in the last bin.
    pub fn bin_index(&self, x: f64) -> usize {
        let last = self.num_bins() - 1;
        match self.range_position(x) {
            RangePosition::Below => 0,
            RangePosition::Above => last,
            RangePosition::Inside => (self.edges.partition_point(|&edge| edge <= x) - 1).min(last),
        }
    }

    fn range_position(&self, x: f64) -> RangePosition {
        if x.is_nan() || x < self.min() {
            RangePosition::Below
        } else if x > self.max() {
            RangePosition::Above
        } else {
            RangePosition::Inside
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangePosition {
    Below,
    Inside,
    Above,
}

/// Per-byte histogram of log probabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    counts: Array1<u64>,
}

impl Histogram {
    /// Bin `values` against `edges` with standard binning only: every value lands in exactly one
    /// bin, so the counts sum to `values.len()`.
    pub fn from_values(values: ArrayView1<f64>, edges: &BinEdges) -> Self {
        let mut counts = Array1::zeros(edges.num_bins());
        for &x in values {
            counts[edges.bin_index(x)] += 1;
        }

        Self { counts }
    }

    /// Bin `values` against `edges`, then count every out-of-range value a second time in the
    /// edge bin it was clipped to.
    ///
    /// Out-of-range values are thus counted twice, which inflates the edge bins of every column
    /// but the reference one. This is most likely unintended, but it is kept so that estimates
    /// stay comparable with previously published key rank results.
    pub fn with_clipping(values: ArrayView1<f64>, edges: &BinEdges) -> Self {
        let mut histogram = Self::from_values(values, edges);
        let last = edges.num_bins() - 1;
        for &x in values {
            match edges.range_position(x) {
                RangePosition::Below => histogram.counts[0] += 1,
                RangePosition::Above => histogram.counts[last] += 1,
                RangePosition::Inside => {}
            }
        }

        histogram
    }

    /// 1-based position of a single value against `edges`.
    ///
    /// Unlike [`Histogram::with_clipping`], an out-of-range value is counted once, in the edge
    /// bin it is clipped to.
    pub fn scalar_position(x: f64, edges: &BinEdges) -> u64 {
        edges.bin_index(x) as u64 + 1
    }

    /// Return the counts per bin.
    pub fn counts(&self) -> ArrayView1<u64> {
        self.counts.view()
    }

    /// Return the number of bins.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Return the sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.sum()
    }
}
