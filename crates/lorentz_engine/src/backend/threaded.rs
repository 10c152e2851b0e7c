//! Thread-pool backend: private partials, one mutex-guarded accumulator.
//!
//! Each worker histograms its chunk into its own [`PartialHistogram`] and
//! then adds the whole partial to the shared [`MutexAccumulator`] under a
//! single lock acquisition before exiting. Threads are scoped, so every one
//! of them has been joined when [`run`] returns.
//!
//! [`PartialHistogram`]: lorentz_core::PartialHistogram

use std::thread;

use lorentz_core::FinalHistogram;
use tracing::debug;

use super::Job;
use crate::accumulator::MutexAccumulator;
use crate::control::Stop;
use crate::error::{AggregateError, Result};
use crate::worker::{guarded, histogram_chunk};

pub(crate) fn run(job: &Job) -> Result<FinalHistogram> {
    let accumulator = MutexAccumulator::new(job.spec);

    thread::scope(|scope| {
        for chunk in &job.chunks {
            if job.control.is_cancelled() {
                break;
            }
            let guard = job.gauge.enter();
            let accumulator = &accumulator;
            let spawned = thread::Builder::new()
                .name(format!("lorentz-worker-{}", chunk.worker))
                .spawn_scoped(scope, move || {
                    let _guard = guard;
                    guarded(chunk.worker, &job.control, || {
                        let partial = histogram_chunk(
                            chunk,
                            &job.spec,
                            job.sampler.as_ref(),
                            &job.control,
                            job.block_size,
                        )?;
                        accumulator.absorb(&partial).map_err(|err| {
                            job.control.fail(AggregateError::WorkerFailed {
                                index: chunk.worker,
                                cause: err.to_string(),
                            });
                            Stop
                        })
                    });
                });
            if let Err(err) = spawned {
                job.control
                    .fail(Job::spawn_failure(chunk.worker, "worker thread", err));
                break;
            }
        }
        debug!(workers = job.chunks.len(), "joining worker threads");
    });

    job.control.finish(())?;
    Ok(accumulator.into_final()?)
}
