//! Run control shared by the workers of one aggregation.
//!
//! [`RunControl`] carries the cancellation flag, the optional deadline and
//! the first-failure slot. Workers call [`RunControl::checkpoint`] before
//! every block; the first worker to fail calls [`RunControl::fail`], which
//! stops every other worker at its next checkpoint.
//!
//! [`WorkerGauge`] counts live workers so callers can audit that nothing is
//! left running once an aggregation returns.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::{AggregateError, Result};

/// Signal that a worker must stop without producing a result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stop;

/// Cancellation, deadline and first failure for one run.
#[derive(Debug)]
pub struct RunControl {
    cancelled: AtomicBool,
    started: Instant,
    timeout: Option<Duration>,
    failure: Mutex<Option<AggregateError>>,
}

impl RunControl {
    /// Creates a control block; the deadline, if any, starts counting now.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            started: Instant::now(),
            timeout,
            failure: Mutex::new(None),
        }
    }

    /// True once a failure, timeout or explicit cancellation was recorded.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Time left before the deadline, `None` when no deadline is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.timeout
            .map(|limit| limit.saturating_sub(self.started.elapsed()))
    }

    /// True if a deadline is set and has passed.
    pub fn deadline_passed(&self) -> bool {
        matches!(self.remaining(), Some(left) if left.is_zero())
    }

    /// Called by workers between blocks.
    ///
    /// Records [`AggregateError::Timeout`] the first time the deadline is
    /// found to have passed.
    pub fn checkpoint(&self) -> std::result::Result<(), Stop> {
        if self.is_cancelled() {
            return Err(Stop);
        }
        if let Some(limit) = self.timeout {
            if self.deadline_passed() {
                self.fail(AggregateError::Timeout(limit));
                return Err(Stop);
            }
        }
        Ok(())
    }

    /// Records `err` if it is the first failure and cancels all workers.
    pub fn fail(&self, err: AggregateError) {
        let mut slot = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            warn!(error = %err, "aggregation failed, cancelling remaining workers");
            *slot = Some(err);
        }
        self.cancelled.store(true, Ordering::Release);
    }

    /// Records a timeout for the configured deadline.
    pub fn time_out(&self) {
        if let Some(limit) = self.timeout {
            self.fail(AggregateError::Timeout(limit));
        }
    }

    /// Turns the run into `value` or the first recorded failure.
    pub fn finish<T>(&self, value: T) -> Result<T> {
        let slot = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(value),
        }
    }
}

/// Counter of live workers (threads, tasks or child processes).
#[derive(Clone, Debug, Default)]
pub struct WorkerGauge {
    live: Arc<AtomicUsize>,
}

impl WorkerGauge {
    /// Creates a gauge reading zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of workers currently alive.
    #[inline]
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Registers a worker until the returned guard is dropped.
    pub fn enter(&self) -> WorkerGuard {
        self.live.fetch_add(1, Ordering::SeqCst);
        WorkerGuard {
            live: Arc::clone(&self.live),
        }
    }
}

/// RAII registration of one live worker.
#[derive(Debug)]
pub struct WorkerGuard {
    live: Arc<AtomicUsize>,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_passes_without_deadline() {
        let control = RunControl::new(None);
        assert!(control.checkpoint().is_ok());
        assert_eq!(control.remaining(), None);
        assert_eq!(control.finish(7), Ok(7));
    }

    #[test]
    fn test_first_failure_wins() {
        let control = RunControl::new(None);
        control.fail(AggregateError::WorkerFailed {
            index: 2,
            cause: "first".to_string(),
        });
        control.fail(AggregateError::WorkerFailed {
            index: 0,
            cause: "second".to_string(),
        });

        assert!(control.is_cancelled());
        assert_eq!(control.checkpoint(), Err(Stop));
        assert!(matches!(
            control.finish(()),
            Err(AggregateError::WorkerFailed { index: 2, .. })
        ));
    }

    #[test]
    fn test_expired_deadline_records_timeout() {
        let control = RunControl::new(Some(Duration::ZERO));
        assert!(control.deadline_passed());
        assert_eq!(control.checkpoint(), Err(Stop));
        assert_eq!(
            control.finish(()),
            Err(AggregateError::Timeout(Duration::ZERO))
        );
    }

    #[test]
    fn test_gauge_tracks_guards() {
        let gauge = WorkerGauge::new();
        let a = gauge.enter();
        let b = gauge.clone().enter();
        assert_eq!(gauge.live(), 2);
        drop(a);
        assert_eq!(gauge.live(), 1);
        drop(b);
        assert_eq!(gauge.live(), 0);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("bad input");
        assert_eq!(panic_message(payload.as_ref()), "panicked: bad input");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "panicked: owned");
        let payload: Box<dyn Any + Send> = Box::new(5u8);
        assert_eq!(panic_message(payload.as_ref()), "panicked");
    }
}
