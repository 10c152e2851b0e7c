//! Shared accumulators written by many workers during a run.
//!
//! Both types own a `bins`-long counter buffer and attach their
//! synchronisation discipline to it:
//!
//! - [`MutexAccumulator`]: one lock around the whole buffer; a worker adds its
//!   entire partial histogram under a single acquisition.
//! - [`AtomicAccumulator`]: one `AtomicU64` per bin; every increment is an
//!   atomic fetch-and-add, so concurrent increments to the same bin are never
//!   lost.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use lorentz_core::{FinalHistogram, HistogramSpec, PartialHistogram, SpecError};

/// Mutex-guarded counter buffer.
#[derive(Debug)]
pub struct MutexAccumulator {
    spec: HistogramSpec,
    counts: Mutex<PartialHistogram>,
}

impl MutexAccumulator {
    /// Creates a zeroed accumulator for `spec`.
    pub fn new(spec: HistogramSpec) -> Self {
        Self {
            spec,
            counts: Mutex::new(PartialHistogram::zeros(spec.bins())),
        }
    }

    /// Adds a complete partial histogram under one lock acquisition.
    pub fn absorb(&self, partial: &PartialHistogram) -> Result<(), SpecError> {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.merge(partial)
    }

    /// Consumes the accumulator once every worker has been joined.
    pub fn into_final(self) -> Result<FinalHistogram, SpecError> {
        let counts = self
            .counts
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        FinalHistogram::new(self.spec, counts.into_counts())
    }
}

/// Lock-free per-bin counters.
#[derive(Debug)]
pub struct AtomicAccumulator {
    spec: HistogramSpec,
    bins: Vec<AtomicU64>,
}

impl AtomicAccumulator {
    /// Creates a zeroed accumulator for `spec`.
    pub fn new(spec: HistogramSpec) -> Self {
        Self {
            spec,
            bins: (0..spec.bins()).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Bins one sample; out-of-range samples are ignored.
    #[inline]
    pub fn record(&self, x: f64) {
        if let Some(bin) = self.spec.bin_index(x) {
            // Relaxed: only the count matters, and the final read happens
            // after every worker has been joined.
            self.bins[bin].fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Bins a slice of samples.
    pub fn record_all(&self, samples: &[f64]) {
        for &x in samples {
            self.record(x);
        }
    }

    /// Sum of all counters at this instant.
    pub fn total(&self) -> u64 {
        self.bins.iter().map(|b| b.load(Ordering::Relaxed)).sum()
    }

    /// Consumes the accumulator once every worker has been joined.
    pub fn into_final(self) -> Result<FinalHistogram, SpecError> {
        let counts = self.bins.into_iter().map(AtomicU64::into_inner).collect();
        FinalHistogram::new(self.spec, counts)
    }
}
