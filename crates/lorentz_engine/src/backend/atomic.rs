//! Lock-free backend: atomic per-bin increments into one shared buffer.
//!
//! Runs on a scoped rayon pool sized to the worker count, so all pool
//! threads are joined before [`run`] returns. There is no partial-histogram
//! stage: every in-range sample is a `fetch_add` on [`AtomicAccumulator`].

use lorentz_core::FinalHistogram;
use rayon::prelude::*;

use super::Job;
use crate::accumulator::AtomicAccumulator;
use crate::error::{AggregateError, Result};
use crate::worker::{drive_chunk, guarded};

pub(crate) fn run(job: &Job) -> Result<FinalHistogram> {
    let accumulator = AtomicAccumulator::new(job.spec);

    rayon::ThreadPoolBuilder::new()
        .num_threads(job.chunks.len())
        .thread_name(|i| format!("lorentz-atomic-{}", i))
        .build_scoped(
            |thread| {
                let _guard = job.gauge.enter();
                thread.run()
            },
            |pool| {
                pool.install(|| {
                    job.chunks.par_iter().for_each(|chunk| {
                        guarded(chunk.worker, &job.control, || {
                            drive_chunk(
                                chunk,
                                job.sampler.as_ref(),
                                &job.control,
                                job.block_size,
                                |samples| accumulator.record_all(samples),
                            )
                        });
                    })
                })
            },
        )
        .map_err(|e| AggregateError::Runtime(format!("cannot build thread pool: {}", e)))?;

    job.control.finish(())?;
    Ok(accumulator.into_final()?)
}
