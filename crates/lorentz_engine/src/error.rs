//! Error types for the aggregation engine.

use std::time::Duration;

use lorentz_core::SpecError;
use thiserror::Error;

/// Aggregation error.
///
/// Validation variants are raised before any worker starts. Every other
/// variant is raised only after all workers have been joined, cancelled or
/// reaped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregateError {
    /// Fewer than one worker requested.
    #[error("Invalid worker count {0}: at least one worker is required")]
    InvalidWorkerCount(usize),

    /// Bin count or range rejected.
    #[error("Invalid histogram spec: {0}")]
    InvalidHistogramSpec(String),

    /// Sampler parameters rejected.
    #[error("Invalid sampler: {0}")]
    InvalidSampler(String),

    /// Engine configuration rejected.
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// A worker raised, panicked or crashed.
    #[error("Worker {index} failed: {cause}")]
    WorkerFailed {
        /// Index of the failed worker.
        index: usize,
        /// Description of the failure.
        cause: String,
    },

    /// The configured deadline passed before every worker finished.
    #[error("Aggregation timed out after {0:?}")]
    Timeout(Duration),

    /// The process backend needs a sampler that can be rebuilt in a child.
    #[error("Sampler cannot be sent to worker processes")]
    SamplerNotPortable,

    /// The thread pool or task runtime could not be started.
    #[error("Failed to start concurrency runtime: {0}")]
    Runtime(String),

    /// Malformed worker-process message.
    #[error("Worker protocol error: {0}")]
    Protocol(String),
}

impl From<SpecError> for AggregateError {
    fn from(err: SpecError) -> Self {
        match err {
            SpecError::InvalidWorkerCount(n) => AggregateError::InvalidWorkerCount(n),
            err @ SpecError::InvalidSampler { .. } => {
                AggregateError::InvalidSampler(err.to_string())
            }
            other => AggregateError::InvalidHistogramSpec(other.to_string()),
        }
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, AggregateError>;
