//! Work partitioning.
//!
//! [`partition`] splits `n` samples over `workers` chunks whose sizes differ
//! by at most one. The remainder is front-loaded: the first `n % workers`
//! chunks receive one extra sample, so a plan is fully determined by
//! `(n, workers)`.
//!
//! ```rust
//! use lorentz_core::partition::partition;
//!
//! let plan = partition(10, 4).unwrap();
//! assert_eq!(plan.sizes(), &[3, 3, 2, 2]);
//! assert_eq!(plan.total(), 10);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::SpecError;
use crate::sampler::Block;

/// Default number of samples drawn per [`Block`].
pub const DEFAULT_BLOCK_SIZE: usize = 1 << 16;

/// The contiguous range of global sample indices owned by one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Worker index, `0..workers`.
    pub worker: usize,
    /// Global index of the first sample in this chunk.
    pub offset: u64,
    /// Number of samples in this chunk.
    pub len: u64,
}

impl Chunk {
    /// Splits the chunk into consecutive blocks of at most `block_size` samples.
    ///
    /// A `block_size` of zero is treated as one.
    pub fn blocks(&self, block_size: usize) -> impl Iterator<Item = Block> {
        let step = block_size.max(1) as u64;
        let worker = self.worker;
        let start = self.offset;
        let end = self.offset + self.len;
        (start..end).step_by(step as usize).map(move |offset| Block {
            worker,
            offset,
            len: (end - offset).min(step) as usize,
        })
    }
}

/// Ordered chunk sizes for one run; immutable once created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkPlan {
    sizes: Vec<u64>,
}

impl ChunkPlan {
    /// Chunk sizes in worker order.
    #[inline]
    pub fn sizes(&self) -> &[u64] {
        &self.sizes
    }

    /// Number of chunks (equals the worker count).
    #[inline]
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Always false: a plan has at least one chunk.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Total number of samples across all chunks.
    pub fn total(&self) -> u64 {
        self.sizes.iter().sum()
    }

    /// Chunks with their global offsets, laid out contiguously in worker order.
    pub fn chunks(&self) -> Vec<Chunk> {
        let mut offset = 0;
        self.sizes
            .iter()
            .enumerate()
            .map(|(worker, &len)| {
                let chunk = Chunk {
                    worker,
                    offset,
                    len,
                };
                offset += len;
                chunk
            })
            .collect()
    }
}

/// Splits `n` samples across `workers` near-equal chunks.
///
/// # Errors
///
/// Returns [`SpecError::InvalidWorkerCount`] if `workers == 0`.
pub fn partition(n: u64, workers: usize) -> Result<ChunkPlan, SpecError> {
    if workers == 0 {
        return Err(SpecError::InvalidWorkerCount(workers));
    }
    let w = workers as u64;
    let base = n / w;
    let extra = (n % w) as usize;
    let sizes = (0..workers)
        .map(|i| if i < extra { base + 1 } else { base })
        .collect();
    Ok(ChunkPlan { sizes })
}
