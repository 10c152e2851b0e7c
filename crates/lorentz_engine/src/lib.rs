//! # Lorentz Engine
//!
//! Parallel histogram aggregation. An [`Engine`] draws `N` samples from a
//! [`Sampler`](lorentz_core::Sampler) over `W` workers, bins them into a
//! fixed-width histogram, and returns the element-wise sum of the per-worker
//! histograms.
//!
//! ## Backends
//!
//! - [`Backend::Threaded`]: scoped OS threads, one mutex-guarded accumulator
//! - [`Backend::Process`]: child processes, partial histograms sent back as JSON
//! - [`Backend::Cooperative`]: local tasks on a single-threaded tokio runtime
//! - [`Backend::Atomic`]: scoped rayon pool with lock-free per-bin counters
//!
//! For the same `N`, `W`, spec and deterministic sampler every backend
//! returns the same histogram.
//!
//! ## Usage Example
//!
//! ```rust
//! use lorentz_core::{HistogramSpec, SamplerKind};
//! use lorentz_engine::{Backend, Engine, EngineConfig};
//!
//! let config = EngineConfig::builder().block_size(4096).build().unwrap();
//! let engine = Engine::new(config, SamplerKind::Lorentzian { seed: Some(7) });
//! let spec = HistogramSpec::default();
//!
//! let threaded = engine.aggregate(100_000, 4, spec, Backend::Threaded).unwrap();
//! let atomic = engine.aggregate(100_000, 4, spec, Backend::Atomic).unwrap();
//! assert_eq!(threaded, atomic);
//! ```
//!
//! The process backend re-executes a worker binary (by default the current
//! executable with the `worker` argument), which must call [`serve`] on its
//! stdin and stdout.

#![deny(missing_docs)]

pub mod accumulator;
pub mod backend;
pub mod config;
mod control;
pub mod engine;
pub mod error;
pub mod worker;

pub use accumulator::{AtomicAccumulator, MutexAccumulator};
pub use backend::{Backend, UnknownBackend};
pub use config::{EngineConfig, EngineConfigBuilder, WorkerCommand, WORKER_ARG};
pub use engine::{run, Engine};
pub use error::{AggregateError, Result};
pub use worker::{serve, WorkerReply, WorkerTask};
