//! Concurrency backends.
//!
//! All four backends take the same [`Job`] and must produce the same
//! [`FinalHistogram`](lorentz_core::FinalHistogram) for the same chunk plan
//! and sampler. They differ only in how the chunks are dispatched and how
//! the partial results come back:
//!
//! | Backend | Dispatch | Collection |
//! |---------|----------|------------|
//! | [`Backend::Threaded`] | one scoped OS thread per chunk | mutex-guarded accumulator |
//! | [`Backend::Process`] | one child process per chunk | JSON replies over pipes, reduced by the parent |
//! | [`Backend::Cooperative`] | one local task per chunk on a current-thread runtime | joined in submission order |
//! | [`Backend::Atomic`] | scoped rayon pool, `par_iter` over chunks | per-bin atomic increments, no partials |

pub(crate) mod atomic;
pub(crate) mod cooperative;
pub(crate) mod process;
pub(crate) mod threaded;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use lorentz_core::{Chunk, HistogramSpec, Sampler};
use serde::{Deserialize, Serialize};

use crate::control::{RunControl, WorkerGauge};
use crate::error::AggregateError;

/// Concurrency discipline used to realise dispatch and collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Shared-memory threads with a mutex-guarded accumulator.
    #[default]
    Threaded,
    /// Isolated worker processes returning their partial histograms.
    Process,
    /// Single-threaded cooperative tasks; no real overlap for CPU-bound work.
    Cooperative,
    /// Data-parallel loop with lock-free atomic per-bin increments.
    Atomic,
}

impl Backend {
    /// Every backend, in declaration order.
    pub const ALL: [Backend; 4] = [
        Backend::Threaded,
        Backend::Process,
        Backend::Cooperative,
        Backend::Atomic,
    ];

    /// Backends that run inside the calling process.
    pub const IN_PROCESS: [Backend; 3] =
        [Backend::Threaded, Backend::Cooperative, Backend::Atomic];

    /// Lowercase name, as accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Threaded => "threaded",
            Backend::Process => "process",
            Backend::Cooperative => "cooperative",
            Backend::Atomic => "atomic",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised backend name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown backend '{0}': expected one of threaded, process, cooperative, atomic")]
pub struct UnknownBackend(pub String);

impl FromStr for Backend {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "threaded" | "thread" | "threads" => Ok(Backend::Threaded),
            "process" | "processes" | "multiprocess" => Ok(Backend::Process),
            "cooperative" | "async" | "coop" => Ok(Backend::Cooperative),
            "atomic" | "lockfree" | "lock-free" => Ok(Backend::Atomic),
            _ => Err(UnknownBackend(s.to_string())),
        }
    }
}

/// Everything a backend needs to execute one chunk plan.
pub(crate) struct Job {
    pub chunks: Vec<Chunk>,
    pub spec: HistogramSpec,
    pub sampler: Arc<dyn Sampler>,
    pub control: Arc<RunControl>,
    pub gauge: WorkerGauge,
    pub block_size: usize,
}

impl Job {
    pub fn spawn_failure(worker: usize, what: &str, err: impl fmt::Display) -> AggregateError {
        AggregateError::WorkerFailed {
            index: worker,
            cause: format!("failed to start {}: {}", what, err),
        }
    }
}
