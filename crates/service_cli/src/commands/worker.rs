//! Worker command implementation
//!
//! Body of a process-backend worker: reads one task from stdin and writes
//! the partial histogram to stdout.

use std::io;

use tracing::debug;

use crate::Result;

/// Run the worker command
pub fn run() -> Result<()> {
    debug!(pid = std::process::id(), "worker process started");
    let stdin = io::stdin().lock();
    let stdout = io::stdout().lock();
    lorentz_engine::serve(stdin, stdout)?;
    Ok(())
}
