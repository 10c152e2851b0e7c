//! The aggregation engine: partition, dispatch, reduce.
//!
//! [`Engine::aggregate`] validates its inputs, splits the samples with the
//! Work Partitioner, hands the chunk plan to the selected [`Backend`], and
//! returns the reduced [`FinalHistogram`]. Partitioning and reduction run
//! on the calling thread; only the per-chunk sample-and-bin step runs
//! concurrently.
//!
//! # Failure policy
//!
//! The first worker failure cancels every other worker. The engine waits
//! until all threads, tasks and child processes have been joined, aborted
//! or reaped, and then returns that single failure. A partially summed
//! histogram is never returned.

use std::sync::Arc;
use std::time::Instant;

use lorentz_core::{partition, FinalHistogram, HistogramSpec, Sampler, SamplerKind};
use tracing::{info, info_span, warn};

use crate::backend::{self, Backend, Job};
use crate::config::{EngineConfig, WorkerCommand};
use crate::control::{RunControl, WorkerGauge};
use crate::error::{AggregateError, Result};

/// Histogram aggregation engine.
///
/// # Example
///
/// ```rust
/// use lorentz_core::{HistogramSpec, SamplerKind};
/// use lorentz_engine::{Backend, Engine, EngineConfig};
///
/// let engine = Engine::new(
///     EngineConfig::default(),
///     SamplerKind::Cyclic { period: 10, shift: 0.5 },
/// );
/// let spec = HistogramSpec::new(10, 0.0, 10.0).unwrap();
///
/// let result = engine.aggregate(1000, 4, spec, Backend::Threaded).unwrap();
/// assert_eq!(result.counts(), &[100; 10]);
/// assert_eq!(engine.live_workers(), 0);
/// ```
pub struct Engine {
    config: EngineConfig,
    sampler: Arc<dyn Sampler>,
    gauge: WorkerGauge,
}

impl Engine {
    /// Creates an engine drawing from `sampler`.
    pub fn new<S>(config: EngineConfig, sampler: S) -> Self
    where
        S: Sampler + 'static,
    {
        Self {
            config,
            sampler: Arc::new(sampler),
            gauge: WorkerGauge::new(),
        }
    }

    /// Engine configuration.
    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of workers of this engine still alive.
    ///
    /// Always zero between calls to [`aggregate`](Self::aggregate).
    #[inline]
    pub fn live_workers(&self) -> usize {
        self.gauge.live()
    }

    /// Draws `n` samples over `workers` workers and returns their histogram.
    ///
    /// # Errors
    ///
    /// - [`AggregateError::InvalidWorkerCount`] if `workers == 0`
    /// - [`AggregateError::InvalidHistogramSpec`] for an invalid spec
    /// - [`AggregateError::InvalidSampler`] for invalid sampler parameters,
    ///   whichever backend is selected
    /// - [`AggregateError::InvalidConfig`] for an invalid engine configuration
    /// - [`AggregateError::SamplerNotPortable`] for the process backend with
    ///   a sampler that cannot be rebuilt in a child
    /// - [`AggregateError::WorkerFailed`] for the first failed worker
    /// - [`AggregateError::Timeout`] if the configured deadline passed
    pub fn aggregate(
        &self,
        n: u64,
        workers: usize,
        spec: HistogramSpec,
        backend: Backend,
    ) -> Result<FinalHistogram> {
        self.config.validate()?;
        let plan = partition(n, workers)?;
        spec.validate()?;
        let portable = self.sampler.portable();
        if let Some(kind) = &portable {
            kind.validate()?;
        }
        let remote = match backend {
            Backend::Process => Some(self.process_setup(portable)?),
            _ => None,
        };

        let span = info_span!("aggregate", %backend, n, workers, bins = spec.bins());
        let _enter = span.enter();
        let started = Instant::now();
        info!(chunks = ?plan.sizes(), "dispatching");

        let job = Job {
            chunks: plan.chunks(),
            spec,
            sampler: Arc::clone(&self.sampler),
            control: Arc::new(RunControl::new(self.config.timeout())),
            gauge: self.gauge.clone(),
            block_size: self.config.block_size(),
        };

        let result = match (backend, remote) {
            (Backend::Threaded, _) => backend::threaded::run(&job),
            (Backend::Cooperative, _) => backend::cooperative::run(&job),
            (Backend::Atomic, _) => backend::atomic::run(&job),
            (Backend::Process, Some((command, kind))) => {
                backend::process::run(&job, &command, &kind)
            }
            (Backend::Process, None) => Err(AggregateError::SamplerNotPortable),
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1e3;
        match &result {
            Ok(histogram) => info!(
                in_range = histogram.total(),
                elapsed_ms,
                "aggregation complete"
            ),
            Err(err) => warn!(error = %err, elapsed_ms, "aggregation failed"),
        }
        result
    }

    fn process_setup(
        &self,
        portable: Option<SamplerKind>,
    ) -> Result<(WorkerCommand, SamplerKind)> {
        let kind = portable.ok_or(AggregateError::SamplerNotPortable)?;
        let command = match self.config.worker_command() {
            Some(command) => command.clone(),
            None => WorkerCommand::current_exe()?,
        };
        Ok((command, kind))
    }
}

/// Runs one aggregation with the Lorentzian sampler and default settings.
///
/// ```rust
/// use lorentz_core::HistogramSpec;
/// use lorentz_engine::{run, Backend};
///
/// let result = run(10_000, 4, HistogramSpec::default(), Backend::Atomic).unwrap();
/// assert!(result.total() <= 10_000);
/// assert_eq!(result.counts().len(), 100);
/// ```
pub fn run(
    n: u64,
    workers: usize,
    spec: HistogramSpec,
    backend: Backend,
) -> Result<FinalHistogram> {
    Engine::new(EngineConfig::default(), SamplerKind::default())
        .aggregate(n, workers, spec, backend)
}
