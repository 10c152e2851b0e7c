//! Portable sampler catalogue.

use serde::{Deserialize, Serialize};

use super::{Block, Sampler};
use crate::error::{SampleError, SpecError};
use crate::rng::{block_seed, SampleRng};

/// Samplers that can be described as data and rebuilt in a worker process.
///
/// # Examples
///
/// ```rust
/// use lorentz_core::sampler::{Block, Sampler, SamplerKind};
///
/// let stub = SamplerKind::Cyclic { period: 10, shift: 0.5 };
/// let values = stub.draw(Block { worker: 0, offset: 8, len: 4 }).unwrap();
/// assert_eq!(values, vec![8.5, 9.5, 0.5, 1.5]);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SamplerKind {
    /// Standard Lorentzian (Cauchy) by inverse transform sampling.
    ///
    /// With a seed, each block draws from its own stream derived from the
    /// seed and the block offset.
    Lorentzian {
        /// Optional seed for reproducibility.
        seed: Option<u64>,
    },

    /// Normal distribution.
    Gaussian {
        /// Location.
        mean: f64,
        /// Scale, strictly positive.
        std_dev: f64,
        /// Optional seed for reproducibility.
        seed: Option<u64>,
    },

    /// Deterministic stub: global draw `i` is `(i mod period) + shift`.
    Cyclic {
        /// Cycle length, at least 1.
        period: u64,
        /// Constant added to every value.
        shift: f64,
    },

    /// Deterministic stub returning the same value for every draw.
    Constant {
        /// The value returned.
        value: f64,
    },

    /// Fault injection: every draw for `worker` fails, other workers
    /// delegate to `inner`.
    Faulty {
        /// Worker index whose draws fail.
        worker: usize,
        /// Sampler used by all other workers.
        inner: Box<SamplerKind>,
    },
}

impl Default for SamplerKind {
    fn default() -> Self {
        SamplerKind::Lorentzian { seed: None }
    }
}

impl SamplerKind {
    /// Checks sampler parameters.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidSampler`] for a zero period, a non-positive
    /// or non-finite standard deviation, or non-finite location values.
    pub fn validate(&self) -> Result<(), SpecError> {
        match self {
            SamplerKind::Lorentzian { .. } => Ok(()),
            SamplerKind::Gaussian { mean, std_dev, .. } => {
                if !mean.is_finite() {
                    return Err(SpecError::InvalidSampler {
                        name: "mean",
                        reason: "must be finite",
                    });
                }
                if !std_dev.is_finite() || *std_dev <= 0.0 {
                    return Err(SpecError::InvalidSampler {
                        name: "std_dev",
                        reason: "must be finite and positive",
                    });
                }
                Ok(())
            }
            SamplerKind::Cyclic { period, shift } => {
                if *period == 0 {
                    return Err(SpecError::InvalidSampler {
                        name: "period",
                        reason: "must be at least 1",
                    });
                }
                if !shift.is_finite() {
                    return Err(SpecError::InvalidSampler {
                        name: "shift",
                        reason: "must be finite",
                    });
                }
                Ok(())
            }
            SamplerKind::Constant { .. } => Ok(()),
            SamplerKind::Faulty { inner, .. } => inner.validate(),
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            SamplerKind::Lorentzian { .. } => "lorentzian",
            SamplerKind::Gaussian { .. } => "gaussian",
            SamplerKind::Cyclic { .. } => "cyclic",
            SamplerKind::Constant { .. } => "constant",
            SamplerKind::Faulty { .. } => "faulty",
        }
    }

    fn rng_for(seed: Option<u64>, block: &Block) -> SampleRng {
        match seed {
            Some(seed) => SampleRng::from_seed(block_seed(seed, block.offset)),
            None => SampleRng::from_entropy(),
        }
    }
}

impl Sampler for SamplerKind {
    fn draw(&self, block: Block) -> Result<Vec<f64>, SampleError> {
        match self {
            SamplerKind::Lorentzian { seed } => {
                let mut buffer = vec![0.0; block.len];
                Self::rng_for(*seed, &block).fill_lorentzian(&mut buffer);
                Ok(buffer)
            }
            SamplerKind::Gaussian {
                mean,
                std_dev,
                seed,
            } => {
                let mut buffer = vec![0.0; block.len];
                Self::rng_for(*seed, &block).fill_normal(&mut buffer);
                for x in buffer.iter_mut() {
                    *x = mean + std_dev * *x;
                }
                Ok(buffer)
            }
            SamplerKind::Cyclic { period, shift } => {
                if *period == 0 {
                    return Err(SampleError::new("cyclic sampler period must be at least 1"));
                }
                Ok((block.offset..block.offset + block.len as u64)
                    .map(|i| (i % period) as f64 + shift)
                    .collect())
            }
            SamplerKind::Constant { value } => Ok(vec![*value; block.len]),
            SamplerKind::Faulty { worker, inner } => {
                if block.worker == *worker {
                    Err(SampleError(format!(
                        "injected fault in worker {} at offset {}",
                        worker, block.offset
                    )))
                } else {
                    inner.draw(block)
                }
            }
        }
    }

    fn portable(&self) -> Option<SamplerKind> {
        Some(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(worker: usize, offset: u64, len: usize) -> Block {
        Block {
            worker,
            offset,
            len,
        }
    }

    #[test]
    fn test_lorentzian_seeded_is_reproducible_per_block() {
        let sampler = SamplerKind::Lorentzian { seed: Some(42) };
        let a = sampler.draw(block(0, 1024, 64)).unwrap();
        // a different worker drawing the same indices sees the same values
        let b = sampler.draw(block(3, 1024, 64)).unwrap();
        let c = sampler.draw(block(0, 2048, 64)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_lorentzian_unseeded_length() {
        let sampler = SamplerKind::default();
        assert_eq!(sampler.draw(block(0, 0, 100)).unwrap().len(), 100);
    }

    #[test]
    fn test_gaussian_location_and_scale() {
        let sampler = SamplerKind::Gaussian {
            mean: 3.0,
            std_dev: 0.5,
            seed: Some(1),
        };
        let values = sampler.draw(block(0, 0, 50_000)).unwrap();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        assert!((mean - 3.0).abs() < 0.02, "mean {}", mean);
    }

    #[test]
    fn test_cyclic_uses_global_indices() {
        let sampler = SamplerKind::Cyclic {
            period: 10,
            shift: 0.5,
        };
        let values = sampler.draw(block(1, 23, 3)).unwrap();
        assert_eq!(values, vec![3.5, 4.5, 5.5]);
    }

    #[test]
    fn test_faulty_only_fails_target_worker() {
        let sampler = SamplerKind::Faulty {
            worker: 2,
            inner: Box::new(SamplerKind::Constant { value: 1.0 }),
        };
        assert_eq!(sampler.draw(block(1, 0, 2)).unwrap(), vec![1.0, 1.0]);
        let err = sampler.draw(block(2, 0, 2)).unwrap_err();
        assert!(err.to_string().contains("worker 2"));
    }

    #[test]
    fn test_validate() {
        assert!(SamplerKind::default().validate().is_ok());
        assert!(SamplerKind::Cyclic {
            period: 0,
            shift: 0.0
        }
        .validate()
        .is_err());
        assert!(SamplerKind::Gaussian {
            mean: 0.0,
            std_dev: 0.0,
            seed: None
        }
        .validate()
        .is_err());
        let nested = SamplerKind::Faulty {
            worker: 0,
            inner: Box::new(SamplerKind::Cyclic {
                period: 0,
                shift: 0.0,
            }),
        };
        assert!(nested.validate().is_err());
    }

    #[test]
    fn test_serde_round_trip_keeps_tag() {
        let sampler = SamplerKind::Faulty {
            worker: 2,
            inner: Box::new(SamplerKind::Lorentzian { seed: Some(7) }),
        };
        let json = serde_json::to_string(&sampler).unwrap();
        assert!(json.contains("\"kind\":\"faulty\""));
        let back: SamplerKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sampler);
        assert_eq!(back.portable(), Some(sampler));
    }
}
