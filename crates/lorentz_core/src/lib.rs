//! # Lorentz Core
//!
//! Building blocks shared by every concurrency backend of the histogram
//! aggregation engine:
//!
//! - [`histogram`]: [`HistogramSpec`], the Local Histogrammer and the reduction
//! - [`partition`]: the Work Partitioner ([`partition()`], [`ChunkPlan`])
//! - [`sampler`]: the [`Sampler`] trait and the portable [`SamplerKind`] catalogue
//! - [`rng`]: seeded random streams
//!
//! Nothing in this crate spawns threads or holds shared mutable state; every
//! function here may run concurrently on private data.
//!
//! ## Usage Example
//!
//! ```rust
//! use lorentz_core::{histogram, partition, reduce, HistogramSpec, Sampler, SamplerKind};
//!
//! let spec = HistogramSpec::new(10, 0.0, 10.0).unwrap();
//! let sampler = SamplerKind::Cyclic { period: 10, shift: 0.5 };
//! let plan = partition(1000, 4).unwrap();
//!
//! let partials = plan.chunks().into_iter().map(|chunk| {
//!     let mut samples = Vec::new();
//!     for block in chunk.blocks(128) {
//!         samples.extend(sampler.draw(block).unwrap());
//!     }
//!     histogram(&samples, &spec)
//! });
//!
//! let result = reduce(spec, partials).unwrap();
//! assert_eq!(result.counts(), &[100; 10]);
//! ```

#![deny(missing_docs)]

pub mod error;
pub mod histogram;
pub mod partition;
pub mod rng;
pub mod sampler;

pub use error::{SampleError, SpecError};
pub use histogram::{histogram, reduce, FinalHistogram, HistogramSpec, PartialHistogram};
pub use partition::{partition, Chunk, ChunkPlan, DEFAULT_BLOCK_SIZE};
pub use sampler::{lorentzian_pdf, lorentzian_transform, Block, Sampler, SamplerKind};
