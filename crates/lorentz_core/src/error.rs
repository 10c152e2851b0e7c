//! Error types for histogram construction, partitioning and sampling.
//!
//! This module provides:
//! - `SpecError`: Invalid inputs detected before any work is dispatched
//! - `SampleError`: A sampler could not produce the requested draws

use thiserror::Error;

/// Validation errors raised before any sampling starts.
///
/// # Examples
/// ```
/// use lorentz_core::SpecError;
///
/// let err = SpecError::InvalidWorkerCount(0);
/// assert_eq!(
///     err.to_string(),
///     "Invalid worker count 0: at least one worker is required"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpecError {
    /// Fewer than one worker requested.
    #[error("Invalid worker count {0}: at least one worker is required")]
    InvalidWorkerCount(usize),

    /// Bin count or range rejected.
    #[error("Invalid histogram spec (bins={bins}, xmin={xmin}, xmax={xmax}): {reason}")]
    InvalidHistogramSpec {
        /// Requested number of bins.
        bins: usize,
        /// Requested lower bound.
        xmin: f64,
        /// Requested upper bound.
        xmax: f64,
        /// Which constraint was violated.
        reason: &'static str,
    },

    /// Sampler parameters rejected.
    #[error("Invalid sampler parameter '{name}': {reason}")]
    InvalidSampler {
        /// Parameter name.
        name: &'static str,
        /// Which constraint was violated.
        reason: &'static str,
    },

    /// Two histograms with different bin counts were combined.
    #[error("Bin count mismatch: expected {expected}, found {found}")]
    BinMismatch {
        /// Bin count of the receiving histogram.
        expected: usize,
        /// Bin count of the histogram being merged.
        found: usize,
    },
}

/// Failure reported by a [`Sampler`](crate::sampler::Sampler) for one block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SampleError(pub String);

impl SampleError {
    /// Creates a sample error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_error_display() {
        let err = SpecError::InvalidHistogramSpec {
            bins: 0,
            xmin: -10.0,
            xmax: 10.0,
            reason: "bins must be at least 1",
        };
        let msg = err.to_string();
        assert!(msg.contains("bins=0"));
        assert!(msg.contains("bins must be at least 1"));

        let err = SpecError::BinMismatch {
            expected: 10,
            found: 12,
        };
        assert_eq!(err.to_string(), "Bin count mismatch: expected 10, found 12");
    }

    #[test]
    fn test_sample_error_display() {
        let err = SampleError::new("entropy source unavailable");
        assert_eq!(err.to_string(), "entropy source unavailable");
    }
}
