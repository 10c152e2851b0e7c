//! Per-chunk worker logic and the worker-process protocol.
//!
//! Every backend runs the same loop: for each block of its chunk, check the
//! run control, draw the block, and hand the samples to a sink. The sink is
//! a private [`PartialHistogram`] for the threaded, process and cooperative
//! backends, and the shared atomic counters for the atomic backend.
//!
//! The process backend sends a [`WorkerTask`] as one JSON document on the
//! child's stdin; the child answers with one [`WorkerReply`] on stdout (see
//! [`serve`]).

use std::io::{Read, Write};
use std::panic::{self, AssertUnwindSafe};

use lorentz_core::{Chunk, HistogramSpec, PartialHistogram, Sampler, SamplerKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::control::{panic_message, RunControl, Stop};
use crate::error::{AggregateError, Result};

/// Draws `chunk` block by block and feeds every block to `sink`.
///
/// Sampler failures and short blocks are recorded on `control` as
/// [`AggregateError::WorkerFailed`].
pub(crate) fn drive_chunk<S, F>(
    chunk: &Chunk,
    sampler: &S,
    control: &RunControl,
    block_size: usize,
    mut sink: F,
) -> std::result::Result<(), Stop>
where
    S: Sampler + ?Sized,
    F: FnMut(&[f64]),
{
    for block in chunk.blocks(block_size) {
        control.checkpoint()?;
        match sampler.draw(block) {
            Ok(samples) if samples.len() == block.len => sink(&samples),
            Ok(samples) => {
                control.fail(AggregateError::WorkerFailed {
                    index: chunk.worker,
                    cause: format!(
                        "sampler returned {} values for a block of {}",
                        samples.len(),
                        block.len
                    ),
                });
                return Err(Stop);
            }
            Err(err) => {
                control.fail(AggregateError::WorkerFailed {
                    index: chunk.worker,
                    cause: err.to_string(),
                });
                return Err(Stop);
            }
        }
    }
    Ok(())
}

/// Local-histograms one chunk into private counts.
pub(crate) fn histogram_chunk<S>(
    chunk: &Chunk,
    spec: &HistogramSpec,
    sampler: &S,
    control: &RunControl,
    block_size: usize,
) -> std::result::Result<PartialHistogram, Stop>
where
    S: Sampler + ?Sized,
{
    let mut partial = PartialHistogram::zeros(spec.bins());
    drive_chunk(chunk, sampler, control, block_size, |samples| {
        for &x in samples {
            partial.record(spec, x);
        }
    })?;
    debug!(
        worker = chunk.worker,
        samples = chunk.len,
        in_range = partial.total(),
        "chunk complete"
    );
    Ok(partial)
}

/// Runs `work` for worker `index`, turning a panic into a recorded failure.
///
/// Returns `None` if the worker stopped or panicked.
pub(crate) fn guarded<T, F>(index: usize, control: &RunControl, work: F) -> Option<T>
where
    F: FnOnce() -> std::result::Result<T, Stop>,
{
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(Stop)) => None,
        Err(payload) => {
            control.fail(AggregateError::WorkerFailed {
                index,
                cause: panic_message(payload.as_ref()),
            });
            None
        }
    }
}

/// One chunk of work shipped to a worker process.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkerTask {
    /// The chunk to draw.
    pub chunk: Chunk,
    /// Binning.
    pub spec: HistogramSpec,
    /// Sampler rebuilt in the child.
    pub sampler: SamplerKind,
    /// Samples per block.
    pub block_size: usize,
}

/// A worker process's partial histogram.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReply {
    /// Index of the worker that produced the counts.
    pub worker: usize,
    /// Bin counts.
    pub counts: Vec<u64>,
}

impl WorkerReply {
    /// Checks the reply against what the parent expects.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::Protocol`] if the worker index or bin count
    /// does not match.
    pub fn into_partial(self, worker: usize, bins: usize) -> Result<PartialHistogram> {
        if self.worker != worker {
            return Err(AggregateError::Protocol(format!(
                "expected reply from worker {}, got worker {}",
                worker, self.worker
            )));
        }
        if self.counts.len() != bins {
            return Err(AggregateError::Protocol(format!(
                "worker {} returned {} bins, expected {}",
                worker,
                self.counts.len(),
                bins
            )));
        }
        Ok(PartialHistogram::from_counts(self.counts))
    }
}

/// Executes one [`WorkerTask`] read from `input` and writes the
/// [`WorkerReply`] to `output`.
///
/// This is the body of a worker process.
///
/// # Errors
///
/// Returns [`AggregateError::Protocol`] for unreadable input or unwritable
/// output, validation errors for a bad task, and
/// [`AggregateError::WorkerFailed`] if sampling fails.
pub fn serve<R: Read, W: Write>(input: R, mut output: W) -> Result<()> {
    let task: WorkerTask = serde_json::from_reader(input)
        .map_err(|e| AggregateError::Protocol(format!("invalid task: {}", e)))?;
    task.spec.validate()?;
    task.sampler.validate()?;

    let control = RunControl::new(None);
    let worker = task.chunk.worker;
    let partial = guarded(worker, &control, || {
        histogram_chunk(
            &task.chunk,
            &task.spec,
            &task.sampler,
            &control,
            task.block_size.max(1),
        )
    });
    let partial = control.finish(partial)?.ok_or_else(|| AggregateError::WorkerFailed {
        index: worker,
        cause: "worker stopped without a result".to_string(),
    })?;

    let reply = WorkerReply {
        worker,
        counts: partial.into_counts(),
    };
    serde_json::to_writer(&mut output, &reply)
        .map_err(|e| AggregateError::Protocol(format!("cannot write reply: {}", e)))?;
    output
        .write_all(b"\n")
        .and_then(|_| output.flush())
        .map_err(|e| AggregateError::Protocol(format!("cannot write reply: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lorentz_core::{Block, SampleError};

    fn chunk(worker: usize, offset: u64, len: u64) -> Chunk {
        Chunk {
            worker,
            offset,
            len,
        }
    }

    #[test]
    fn test_histogram_chunk_counts_every_block() {
        let spec = HistogramSpec::new(10, 0.0, 10.0).unwrap();
        let sampler = SamplerKind::Cyclic {
            period: 10,
            shift: 0.5,
        };
        let control = RunControl::new(None);

        let partial = histogram_chunk(&chunk(0, 0, 250), &spec, &sampler, &control, 7).unwrap();
        assert_eq!(partial.total(), 250);
        assert_eq!(partial.counts()[0], 25);
    }

    #[test]
    fn test_sampler_error_is_recorded() {
        let spec = HistogramSpec::default();
        let sampler = |_: Block| -> std::result::Result<Vec<f64>, SampleError> {
            Err(SampleError::new("no entropy"))
        };
        let control = RunControl::new(None);

        let result = histogram_chunk(&chunk(3, 0, 10), &spec, &sampler, &control, 4);
        assert_eq!(result, Err(Stop));
        assert_eq!(
            control.finish(()),
            Err(AggregateError::WorkerFailed {
                index: 3,
                cause: "no entropy".to_string()
            })
        );
    }

    #[test]
    fn test_short_block_is_a_failure() {
        let spec = HistogramSpec::default();
        let sampler = |block: Block| -> std::result::Result<Vec<f64>, SampleError> {
            Ok(vec![0.0; block.len.saturating_sub(1)])
        };
        let control = RunControl::new(None);

        assert!(histogram_chunk(&chunk(1, 0, 10), &spec, &sampler, &control, 5).is_err());
        assert!(matches!(
            control.finish(()),
            Err(AggregateError::WorkerFailed { index: 1, .. })
        ));
    }

    #[test]
    fn test_cancelled_worker_draws_nothing() {
        let spec = HistogramSpec::default();
        let sampler = |_: Block| -> std::result::Result<Vec<f64>, SampleError> {
            panic!("must not be called")
        };
        let control = RunControl::new(None);
        control.fail(AggregateError::Runtime("stop".to_string()));

        assert_eq!(
            histogram_chunk(&chunk(0, 0, 10), &spec, &sampler, &control, 5),
            Err(Stop)
        );
    }

    #[test]
    fn test_guarded_catches_panic() {
        let control = RunControl::new(None);
        let out: Option<()> = guarded(4, &control, || panic!("kaboom"));
        assert!(out.is_none());
        match control.finish(()) {
            Err(AggregateError::WorkerFailed { index, cause }) => {
                assert_eq!(index, 4);
                assert!(cause.contains("kaboom"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_serve_round_trip() {
        let task = WorkerTask {
            chunk: chunk(1, 250, 250),
            spec: HistogramSpec::new(10, 0.0, 10.0).unwrap(),
            sampler: SamplerKind::Cyclic {
                period: 10,
                shift: 0.5,
            },
            block_size: 64,
        };
        let input = serde_json::to_vec(&task).unwrap();
        let mut output = Vec::new();

        serve(input.as_slice(), &mut output).unwrap();

        let reply: WorkerReply = serde_json::from_slice(&output).unwrap();
        assert_eq!(reply.worker, 1);
        assert_eq!(reply.counts, vec![25; 10]);
    }

    #[test]
    fn test_serve_reports_injected_fault() {
        let task = WorkerTask {
            chunk: chunk(2, 0, 10),
            spec: HistogramSpec::default(),
            sampler: SamplerKind::Faulty {
                worker: 2,
                inner: Box::new(SamplerKind::default()),
            },
            block_size: 64,
        };
        let input = serde_json::to_vec(&task).unwrap();
        let mut output = Vec::new();

        let err = serve(input.as_slice(), &mut output).unwrap_err();
        assert!(matches!(err, AggregateError::WorkerFailed { index: 2, .. }));
        assert!(output.is_empty());
    }

    #[test]
    fn test_serve_rejects_garbage() {
        let mut output = Vec::new();
        let err = serve(&b"not json"[..], &mut output).unwrap_err();
        assert!(matches!(err, AggregateError::Protocol(_)));
    }

    #[test]
    fn test_reply_validation() {
        let reply = WorkerReply {
            worker: 1,
            counts: vec![1, 2],
        };
        assert!(reply.clone().into_partial(0, 2).is_err());
        assert!(reply.clone().into_partial(1, 3).is_err());
        assert_eq!(reply.into_partial(1, 2).unwrap().total(), 3);
    }
}
