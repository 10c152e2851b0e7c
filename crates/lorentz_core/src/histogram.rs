//! Fixed-range, equal-width histograms.
//!
//! [`HistogramSpec`] describes the binning, [`histogram`] bins one sample
//! sequence into a [`PartialHistogram`], and [`reduce`] sums any number of
//! partials into the terminal [`FinalHistogram`].
//!
//! Binning is half-open: a sample `x` lands in bin
//! `floor((x - xmin) / (xmax - xmin) * bins)` when that index lies in
//! `[0, bins)`. Everything else, including `xmax` itself, infinities and NaN,
//! is dropped without error.
//!
//! # Example
//!
//! ```rust
//! use lorentz_core::histogram::{histogram, reduce, HistogramSpec};
//!
//! let spec = HistogramSpec::new(4, 0.0, 4.0).unwrap();
//! let a = histogram(&[0.0, 1.5, 3.9], &spec);
//! let b = histogram(&[1.0, 4.0, -0.1], &spec);
//!
//! let total = reduce(spec, [a, b]).unwrap();
//! assert_eq!(total.counts(), &[1, 3, 0, 1]);
//! assert_eq!(total.total(), 4);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::SpecError;

/// Default number of bins.
pub const DEFAULT_BINS: usize = 100;

/// Default lower bound of the histogram range.
pub const DEFAULT_XMIN: f64 = -10.0;

/// Default upper bound of the histogram range.
pub const DEFAULT_XMAX: f64 = 10.0;

/// Binning shared read-only by every worker of a run.
///
/// Invariants: `bins >= 1`, both bounds and their difference finite,
/// `xmin < xmax`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistogramSpec {
    bins: usize,
    xmin: f64,
    xmax: f64,
}

impl HistogramSpec {
    /// Creates a validated histogram specification.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidHistogramSpec`] if `bins == 0`, either
    /// bound is not finite, `xmin >= xmax`, or `xmax - xmin` overflows.
    pub fn new(bins: usize, xmin: f64, xmax: f64) -> Result<Self, SpecError> {
        let spec = Self { bins, xmin, xmax };
        spec.validate()?;
        Ok(spec)
    }

    /// Re-checks the invariants, e.g. after deserialisation.
    pub fn validate(&self) -> Result<(), SpecError> {
        let reject = |reason| SpecError::InvalidHistogramSpec {
            bins: self.bins,
            xmin: self.xmin,
            xmax: self.xmax,
            reason,
        };
        if self.bins == 0 {
            return Err(reject("bins must be at least 1"));
        }
        if !self.xmin.is_finite() || !self.xmax.is_finite() {
            return Err(reject("range bounds must be finite"));
        }
        if self.xmin >= self.xmax {
            return Err(reject("xmin must be strictly less than xmax"));
        }
        if !(self.xmax - self.xmin).is_finite() {
            return Err(reject("range width must be finite"));
        }
        Ok(())
    }

    /// Number of bins.
    #[inline]
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Inclusive lower bound.
    #[inline]
    pub fn xmin(&self) -> f64 {
        self.xmin
    }

    /// Exclusive upper bound.
    #[inline]
    pub fn xmax(&self) -> f64 {
        self.xmax
    }

    /// Width of a single bin.
    #[inline]
    pub fn bin_width(&self) -> f64 {
        (self.xmax - self.xmin) / self.bins as f64
    }

    /// Maps a sample to its bin, or `None` when it falls outside `[xmin, xmax)`.
    #[inline]
    pub fn bin_index(&self, x: f64) -> Option<usize> {
        let position = ((x - self.xmin) / (self.xmax - self.xmin) * self.bins as f64).floor();
        // NaN fails both comparisons
        if position >= 0.0 && position < self.bins as f64 {
            Some(position as usize)
        } else {
            None
        }
    }

    /// The `bins + 1` bin edges, from `xmin` to `xmax`.
    pub fn edges(&self) -> Vec<f64> {
        let width = self.bin_width();
        (0..=self.bins)
            .map(|i| {
                if i == self.bins {
                    self.xmax
                } else {
                    self.xmin + i as f64 * width
                }
            })
            .collect()
    }

    /// The midpoint of every bin.
    pub fn centers(&self) -> Vec<f64> {
        let width = self.bin_width();
        (0..self.bins)
            .map(|i| self.xmin + (i as f64 + 0.5) * width)
            .collect()
    }
}

impl Default for HistogramSpec {
    fn default() -> Self {
        Self {
            bins: DEFAULT_BINS,
            xmin: DEFAULT_XMIN,
            xmax: DEFAULT_XMAX,
        }
    }
}

/// Bin counts produced by one worker from its chunk alone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialHistogram {
    counts: Vec<u64>,
}

impl PartialHistogram {
    /// Creates an all-zero histogram with `bins` bins.
    pub fn zeros(bins: usize) -> Self {
        Self {
            counts: vec![0; bins],
        }
    }

    /// Wraps existing counts.
    pub fn from_counts(counts: Vec<u64>) -> Self {
        Self { counts }
    }

    /// Bins one sample; out-of-range samples are ignored.
    ///
    /// `self` must have been created for `spec`, i.e. with `spec.bins()` bins.
    #[inline]
    pub fn record(&mut self, spec: &HistogramSpec, x: f64) {
        debug_assert_eq!(self.counts.len(), spec.bins(), "bins of histogram and spec differ");
        if let Some(bin) = spec.bin_index(x) {
            self.counts[bin] += 1;
        }
    }

    /// Adds `other` element-wise into `self`.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::BinMismatch`] if the bin counts differ.
    pub fn merge(&mut self, other: &PartialHistogram) -> Result<(), SpecError> {
        if self.counts.len() != other.counts.len() {
            return Err(SpecError::BinMismatch {
                expected: self.counts.len(),
                found: other.counts.len(),
            });
        }
        for (acc, &c) in self.counts.iter_mut().zip(&other.counts) {
            *acc += c;
        }
        Ok(())
    }

    /// Per-bin counts.
    #[inline]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Number of bins.
    #[inline]
    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    /// Number of in-range samples recorded.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Releases the counts.
    pub fn into_counts(self) -> Vec<u64> {
        self.counts
    }
}

/// Terminal output of an aggregation run.
///
/// `total()` equals the number of drawn samples that landed inside
/// `[xmin, xmax)`, which is at most the number requested.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinalHistogram {
    spec: HistogramSpec,
    counts: Vec<u64>,
}

impl FinalHistogram {
    /// Builds a final histogram from fully reduced counts.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::BinMismatch`] if `counts.len() != spec.bins()`.
    pub fn new(spec: HistogramSpec, counts: Vec<u64>) -> Result<Self, SpecError> {
        if counts.len() != spec.bins() {
            return Err(SpecError::BinMismatch {
                expected: spec.bins(),
                found: counts.len(),
            });
        }
        Ok(Self { spec, counts })
    }

    /// The binning these counts refer to.
    #[inline]
    pub fn spec(&self) -> &HistogramSpec {
        &self.spec
    }

    /// Per-bin counts.
    #[inline]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Number of in-range samples.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Releases the counts.
    pub fn into_counts(self) -> Vec<u64> {
        self.counts
    }

    /// Bin edges of the underlying spec.
    pub fn edges(&self) -> Vec<f64> {
        self.spec.edges()
    }

    /// Bin centres of the underlying spec.
    pub fn centers(&self) -> Vec<f64> {
        self.spec.centers()
    }

    /// Probability density estimate relative to `n_samples` draws.
    ///
    /// Each bin is `count / (n_samples * width)`, so the estimate integrates
    /// to the in-range fraction rather than to one. Returns all zeros when
    /// `n_samples == 0`.
    pub fn density(&self, n_samples: u64) -> Vec<f64> {
        if n_samples == 0 {
            return vec![0.0; self.counts.len()];
        }
        let norm = n_samples as f64 * self.spec.bin_width();
        self.counts.iter().map(|&c| c as f64 / norm).collect()
    }
}

/// Local Histogrammer: bins one sample sequence into private counts.
pub fn histogram(samples: &[f64], spec: &HistogramSpec) -> PartialHistogram {
    let mut partial = PartialHistogram::zeros(spec.bins());
    for &x in samples {
        partial.record(spec, x);
    }
    partial
}

/// Sums partial histograms element-wise into one final histogram.
///
/// Summation is commutative, so the result is independent of the order in
/// which partials arrive.
///
/// # Errors
///
/// Returns [`SpecError::BinMismatch`] if any partial has the wrong bin count.
pub fn reduce<I>(spec: HistogramSpec, partials: I) -> Result<FinalHistogram, SpecError>
where
    I: IntoIterator<Item = PartialHistogram>,
{
    let mut total = PartialHistogram::zeros(spec.bins());
    for partial in partials {
        total.merge(&partial)?;
    }
    FinalHistogram::new(spec, total.into_counts())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn unit_spec() -> HistogramSpec {
        HistogramSpec::new(10, 0.0, 10.0).unwrap()
    }

    #[test]
    fn test_spec_default_matches_reference_range() {
        let spec = HistogramSpec::default();
        assert_eq!(spec.bins(), 100);
        assert_eq!(spec.xmin(), -10.0);
        assert_eq!(spec.xmax(), 10.0);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_spec_rejects_invalid_input() {
        assert!(matches!(
            HistogramSpec::new(0, 0.0, 1.0),
            Err(SpecError::InvalidHistogramSpec { bins: 0, .. })
        ));
        assert!(HistogramSpec::new(10, 1.0, 1.0).is_err());
        assert!(HistogramSpec::new(10, 2.0, 1.0).is_err());
        assert!(HistogramSpec::new(10, f64::NEG_INFINITY, 1.0).is_err());
        assert!(HistogramSpec::new(10, 0.0, f64::NAN).is_err());
        // finite bounds whose difference overflows
        assert!(matches!(
            HistogramSpec::new(10, -1e308, 1e308),
            Err(SpecError::InvalidHistogramSpec {
                reason: "range width must be finite",
                ..
            })
        ));
        assert!(HistogramSpec::new(10, -1e307, 1e307).is_ok());
    }

    #[test]
    fn test_bin_index_wide_range() {
        let spec = HistogramSpec::new(10, -1e307, 1e307).unwrap();
        assert_eq!(spec.bin_index(1e306), Some(5));
        assert_eq!(spec.bin_index(-1e307), Some(0));
        assert!(spec.bin_width().is_finite());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "bins of histogram and spec differ")]
    fn test_record_rejects_foreign_spec() {
        let mut partial = PartialHistogram::zeros(3);
        partial.record(&unit_spec(), 0.5);
    }

    #[test]
    fn test_bin_index_half_open_boundaries() {
        let spec = unit_spec();
        assert_eq!(spec.bin_index(0.0), Some(0));
        assert_eq!(spec.bin_index(0.999), Some(0));
        assert_eq!(spec.bin_index(1.0), Some(1));
        assert_eq!(spec.bin_index(9.999), Some(9));
        assert_eq!(spec.bin_index(10.0), None);
        assert_eq!(spec.bin_index(-1e-12), None);
    }

    #[test]
    fn test_bin_index_drops_non_finite() {
        let spec = unit_spec();
        assert_eq!(spec.bin_index(f64::NAN), None);
        assert_eq!(spec.bin_index(f64::INFINITY), None);
        assert_eq!(spec.bin_index(f64::NEG_INFINITY), None);
    }

    #[test]
    fn test_histogram_drops_out_of_range() {
        let spec = unit_spec();
        let samples = [-5.0, 0.0, 0.5, 5.5, 10.0, 42.0, f64::NAN];
        let partial = histogram(&samples, &spec);

        assert_eq!(partial.bins(), 10);
        assert_eq!(partial.total(), 3);
        assert_eq!(partial.counts()[0], 2);
        assert_eq!(partial.counts()[5], 1);
    }

    #[test]
    fn test_histogram_empty_input() {
        let partial = histogram(&[], &unit_spec());
        assert_eq!(partial, PartialHistogram::zeros(10));
    }

    #[test]
    fn test_edges_and_centers() {
        let spec = HistogramSpec::new(4, -2.0, 2.0).unwrap();
        assert_eq!(spec.edges(), vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert_eq!(spec.centers(), vec![-1.5, -0.5, 0.5, 1.5]);
        assert_relative_eq!(spec.bin_width(), 1.0);
    }

    #[test]
    fn test_merge_rejects_mismatch() {
        let mut a = PartialHistogram::zeros(3);
        let b = PartialHistogram::zeros(4);
        assert_eq!(
            a.merge(&b),
            Err(SpecError::BinMismatch {
                expected: 3,
                found: 4
            })
        );
    }

    #[test]
    fn test_reduce_sums_elementwise() {
        let spec = HistogramSpec::new(3, 0.0, 3.0).unwrap();
        let partials = vec![
            PartialHistogram::from_counts(vec![1, 2, 3]),
            PartialHistogram::from_counts(vec![10, 0, 5]),
            PartialHistogram::from_counts(vec![0, 0, 1]),
        ];
        let total = reduce(spec, partials).unwrap();
        assert_eq!(total.counts(), &[11, 2, 9]);
        assert_eq!(total.total(), 22);
    }

    #[test]
    fn test_reduce_of_nothing_is_zero() {
        let spec = unit_spec();
        let total = reduce(spec, Vec::new()).unwrap();
        assert_eq!(total.counts(), &[0; 10]);
    }

    #[test]
    fn test_final_histogram_rejects_wrong_length() {
        let spec = unit_spec();
        assert!(FinalHistogram::new(spec, vec![0; 9]).is_err());
    }

    #[test]
    fn test_density_normalisation() {
        let spec = HistogramSpec::new(2, 0.0, 1.0).unwrap();
        let hist = FinalHistogram::new(spec, vec![30, 50]).unwrap();
        let density = hist.density(100);

        // width 0.5: 30 / (100 * 0.5) = 0.6
        assert_relative_eq!(density[0], 0.6, epsilon = 1e-12);
        assert_relative_eq!(density[1], 1.0, epsilon = 1e-12);
        let integral: f64 = density.iter().map(|d| d * spec.bin_width()).sum();
        assert_relative_eq!(integral, 0.8, epsilon = 1e-12);

        assert_eq!(hist.density(0), vec![0.0, 0.0]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn test_reduce_is_order_independent(
            rows in prop::collection::vec(prop::collection::vec(0u64..1_000, 8), 1..12),
            seed in any::<u64>(),
        ) {
            let spec = HistogramSpec::new(8, 0.0, 8.0).unwrap();
            let partials: Vec<_> = rows.into_iter().map(PartialHistogram::from_counts).collect();

            let mut permuted = partials.clone();
            // deterministic Fisher-Yates driven by the generated seed
            let mut state = seed | 1;
            for i in (1..permuted.len()).rev() {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                permuted.swap(i, (state % (i as u64 + 1)) as usize);
            }

            let forward = reduce(spec, partials.clone()).unwrap();
            let shuffled = reduce(spec, permuted).unwrap();
            let reversed = reduce(spec, partials.into_iter().rev()).unwrap();
            prop_assert_eq!(&forward, &shuffled);
            prop_assert_eq!(&forward, &reversed);
        }

        #[test]
        fn test_histogram_total_never_exceeds_input(
            samples in prop::collection::vec(-20.0f64..20.0, 0..500),
        ) {
            let spec = HistogramSpec::default();
            let partial = histogram(&samples, &spec);
            let in_range = samples.iter().filter(|&&x| (-10.0..10.0).contains(&x)).count() as u64;
            prop_assert!(partial.total() <= samples.len() as u64);
            prop_assert_eq!(partial.total(), in_range);
        }
    }
}
