//! Sampler interface consumed by the aggregation engine.
//!
//! A [`Sampler`] turns a [`Block`] of global sample indices into exactly
//! `block.len` real numbers. The engine never looks at how the values are
//! produced; [`SamplerKind`] is the catalogue of samplers that can also be
//! shipped to worker processes.

mod kind;

pub use kind::SamplerKind;

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::SampleError;

/// A contiguous run of global sample indices drawn on behalf of one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Index of the worker drawing this block.
    pub worker: usize,
    /// Global index of the first sample.
    pub offset: u64,
    /// Number of samples to draw.
    pub len: usize,
}

/// Source of samples for the engine.
///
/// Implementations must be safe to call from many workers at once and must
/// return exactly `block.len` values on success.
pub trait Sampler: Send + Sync {
    /// Draws the samples for `block`.
    fn draw(&self, block: Block) -> Result<Vec<f64>, SampleError>;

    /// A serialisable description of this sampler, if it can be rebuilt in
    /// another process.
    fn portable(&self) -> Option<SamplerKind> {
        None
    }
}

impl<F> Sampler for F
where
    F: Fn(Block) -> Result<Vec<f64>, SampleError> + Send + Sync,
{
    fn draw(&self, block: Block) -> Result<Vec<f64>, SampleError> {
        self(block)
    }
}

/// Inverse CDF of the standard Lorentzian: `x = 1 / tan(pi * u)`.
#[inline]
pub fn lorentzian_transform(u: f64) -> f64 {
    1.0 / (PI * u).tan()
}

/// Density of the standard Lorentzian, `1 / (pi * (1 + x^2))`.
#[inline]
pub fn lorentzian_pdf(x: f64) -> f64 {
    1.0 / (PI * (1.0 + x * x))
}
