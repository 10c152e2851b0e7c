//! # Random Number Generation
//!
//! Seeded pseudo-random streams for the samplers.
//!
//! - **Reproducibility**: a seeded [`SampleRng`] always yields the same sequence
//! - **Efficiency**: batch operations write into caller-owned `&mut [f64]` slices
//! - **Independence**: [`block_seed`] derives one stream per sample block, so a
//!   seeded run draws the same values whichever worker or thread owns the block
//!
//! ## Usage Example
//!
//! ```rust
//! use lorentz_core::rng::SampleRng;
//!
//! let mut rng = SampleRng::from_seed(12345);
//! let mut buffer = vec![0.0; 1000];
//! rng.fill_lorentzian(&mut buffer);
//! assert_eq!(rng.seed(), Some(12345));
//! ```

mod prng;

pub use prng::{block_seed, SampleRng};
