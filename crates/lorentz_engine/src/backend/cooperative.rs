//! Cooperative backend: one local task per chunk on a single thread.
//!
//! Tasks are spawned onto a tokio [`LocalSet`] driven by a current-thread
//! runtime. Chunk work never awaits, so each task runs to completion in
//! submission order and nothing overlaps; the backend exists to show that
//! the aggregate does not depend on real parallelism.

use std::sync::Arc;

use lorentz_core::{reduce, FinalHistogram, PartialHistogram};
use tokio::task::{self, JoinHandle, LocalSet};
use tracing::debug;

use super::Job;
use crate::error::{AggregateError, Result};
use crate::worker::{guarded, histogram_chunk};

pub(crate) fn run(job: &Job) -> Result<FinalHistogram> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|e| AggregateError::Runtime(format!("cannot build task runtime: {}", e)))?;
    let local = LocalSet::new();

    let partials = local.block_on(&runtime, gather(job));
    drop(local);
    drop(runtime);

    let partials = job.control.finish(partials)?;
    Ok(reduce(job.spec, partials)?)
}

async fn gather(job: &Job) -> Vec<PartialHistogram> {
    let handles: Vec<(usize, JoinHandle<Option<PartialHistogram>>)> = job
        .chunks
        .iter()
        .map(|&chunk| {
            let guard = job.gauge.enter();
            let sampler = Arc::clone(&job.sampler);
            let control = Arc::clone(&job.control);
            let spec = job.spec;
            let block_size = job.block_size;
            let handle = task::spawn_local(async move {
                let _guard = guard;
                guarded(chunk.worker, &control, || {
                    histogram_chunk(&chunk, &spec, sampler.as_ref(), &control, block_size)
                })
            });
            (chunk.worker, handle)
        })
        .collect();

    let mut partials = Vec::with_capacity(handles.len());
    let mut pending = handles.into_iter();
    while let Some((worker, handle)) = pending.next() {
        match handle.await {
            Ok(Some(partial)) => partials.push(partial),
            Ok(None) => {}
            Err(err) => job.control.fail(AggregateError::WorkerFailed {
                index: worker,
                cause: err.to_string(),
            }),
        }
        if job.control.is_cancelled() {
            for (worker, rest) in pending.by_ref() {
                debug!(worker, "aborting pending task");
                rest.abort();
                // drain so the aborted task's future is dropped before returning
                let _ = rest.await;
            }
        }
    }
    partials
}
