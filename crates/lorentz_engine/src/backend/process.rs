//! Process-pool backend: isolated workers, partial results by message.
//!
//! One child process is started per chunk with the configured
//! [`WorkerCommand`]. The child receives a [`WorkerTask`] as JSON on stdin
//! and answers with a [`WorkerReply`] on stdout; stderr is kept as the
//! failure cause. The parent polls the children, and on the first failure
//! or on the deadline kills and reaps every child still running. Only after
//! all children have been reaped are the replies parsed and reduced.

use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, Scope, ScopedJoinHandle};
use std::time::Duration;

use lorentz_core::{reduce, Chunk, FinalHistogram, PartialHistogram, SamplerKind};
use tracing::{debug, info, warn};

use super::Job;
use crate::config::WorkerCommand;
use crate::control::{RunControl, WorkerGuard};
use crate::error::{AggregateError, Result};
use crate::worker::{WorkerReply, WorkerTask};

const POLL_INTERVAL: Duration = Duration::from_millis(2);

type Pipe<'scope> = ScopedJoinHandle<'scope, io::Result<Vec<u8>>>;

struct Running<'scope> {
    worker: usize,
    child: Child,
    status: Option<ExitStatus>,
    stdout: Pipe<'scope>,
    stderr: Option<Pipe<'scope>>,
    _guard: WorkerGuard,
}

pub(crate) fn run(
    job: &Job,
    command: &WorkerCommand,
    sampler: &SamplerKind,
) -> Result<FinalHistogram> {
    let partials = thread::scope(|scope| {
        let mut children = Vec::with_capacity(job.chunks.len());
        for chunk in &job.chunks {
            if job.control.is_cancelled() {
                break;
            }
            match spawn(scope, job, command, sampler, chunk) {
                Ok(running) => children.push(running),
                Err(err) => job.control.fail(err),
            }
        }
        info!(spawned = children.len(), "worker processes started");

        supervise(&mut children, &job.control);
        collect(children, job)
    });

    let partials = job.control.finish(partials)?;
    Ok(reduce(job.spec, partials)?)
}

fn spawn<'scope>(
    scope: &'scope Scope<'scope, '_>,
    job: &Job,
    command: &WorkerCommand,
    sampler: &SamplerKind,
    chunk: &Chunk,
) -> Result<Running<'scope>> {
    let guard = job.gauge.enter();
    let mut child = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Job::spawn_failure(chunk.worker, "worker process", e))?;

    let task = WorkerTask {
        chunk: *chunk,
        spec: job.spec,
        sampler: sampler.clone(),
        block_size: job.block_size,
    };
    if let Some(mut stdin) = child.stdin.take() {
        // a failed write surfaces as a non-zero exit of the child
        let written = serde_json::to_writer(&mut stdin, &task)
            .map_err(io::Error::from)
            .and_then(|_| stdin.flush());
        if let Err(err) = written {
            debug!(worker = chunk.worker, error = %err, "cannot write task to worker");
        }
    }

    let stdout = child.stdout.take().map(|out| scope.spawn(move || read_all(out)));
    let stderr = child.stderr.take().map(|err| scope.spawn(move || read_all(err)));
    let stdout = match stdout {
        Some(handle) => handle,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(AggregateError::Protocol(format!(
                "worker {} has no stdout pipe",
                chunk.worker
            )));
        }
    };

    debug!(
        worker = chunk.worker,
        pid = child.id(),
        samples = chunk.len,
        "worker process spawned"
    );
    Ok(Running {
        worker: chunk.worker,
        child,
        status: None,
        stdout,
        stderr,
        _guard: guard,
    })
}

fn read_all<R: Read>(mut pipe: R) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf)?;
    Ok(buf)
}

fn supervise(children: &mut [Running<'_>], control: &RunControl) {
    loop {
        let mut pending = 0;
        for running in children.iter_mut().filter(|r| r.status.is_none()) {
            match running.child.try_wait() {
                Ok(Some(status)) => {
                    running.status = Some(status);
                    if status.success() {
                        debug!(worker = running.worker, "worker process exited");
                    } else {
                        let cause = failure_cause(running, status);
                        control.fail(AggregateError::WorkerFailed {
                            index: running.worker,
                            cause,
                        });
                    }
                }
                Ok(None) => pending += 1,
                Err(err) => control.fail(AggregateError::WorkerFailed {
                    index: running.worker,
                    cause: format!("cannot poll worker process: {}", err),
                }),
            }
        }
        if pending == 0 || control.is_cancelled() {
            break;
        }
        if control.deadline_passed() {
            control.time_out();
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    for running in children.iter_mut().filter(|r| r.status.is_none()) {
        warn!(worker = running.worker, "killing worker process");
        if let Err(err) = running.child.kill() {
            debug!(worker = running.worker, error = %err, "kill failed");
        }
        match running.child.wait() {
            Ok(status) => running.status = Some(status),
            Err(err) => {
                warn!(worker = running.worker, error = %err, "cannot reap worker process")
            }
        }
    }
}

fn failure_cause(running: &mut Running<'_>, status: ExitStatus) -> String {
    let stderr = running
        .stderr
        .take()
        .and_then(|handle| handle.join().ok())
        .and_then(|read| read.ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
        .unwrap_or_default();
    if stderr.is_empty() {
        format!("worker process exited with {}", status)
    } else {
        format!("worker process exited with {}: {}", status, stderr)
    }
}

fn collect(children: Vec<Running<'_>>, job: &Job) -> Vec<PartialHistogram> {
    let mut partials = Vec::with_capacity(children.len());
    for running in children {
        let worker = running.worker;
        let output = running.stdout.join();
        if job.control.is_cancelled() {
            continue;
        }
        let parsed = match output {
            Ok(Ok(bytes)) => serde_json::from_slice::<WorkerReply>(&bytes)
                .map_err(|e| AggregateError::Protocol(format!("worker {} reply: {}", worker, e)))
                .and_then(|reply| reply.into_partial(worker, job.spec.bins())),
            Ok(Err(err)) => Err(AggregateError::WorkerFailed {
                index: worker,
                cause: format!("cannot read worker output: {}", err),
            }),
            Err(_) => Err(AggregateError::WorkerFailed {
                index: worker,
                cause: "output reader panicked".to_string(),
            }),
        };
        match parsed {
            Ok(partial) => partials.push(partial),
            Err(AggregateError::Protocol(cause)) => job.control.fail(AggregateError::WorkerFailed {
                index: worker,
                cause,
            }),
            Err(err) => job.control.fail(err),
        }
    }
    partials
}
