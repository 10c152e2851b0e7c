//! Engine configuration.
//!
//! Immutable settings shared by every run of an [`Engine`](crate::Engine).
//! Use [`EngineConfig::builder`] to construct instances.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use lorentz_core::DEFAULT_BLOCK_SIZE;

use crate::error::{AggregateError, Result};

/// Argument that puts the `lorentz` binary into worker mode.
pub const WORKER_ARG: &str = "worker";

/// Command used by the process backend to start one worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerCommand {
    /// Executable to run.
    pub program: PathBuf,
    /// Arguments placed before the task is written to stdin.
    pub args: Vec<OsString>,
}

impl WorkerCommand {
    /// Runs `program worker`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: vec![OsString::from(WORKER_ARG)],
        }
    }

    /// Replaces the argument list.
    pub fn with_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// The currently running executable in worker mode.
    pub fn current_exe() -> Result<Self> {
        let program = std::env::current_exe().map_err(|e| {
            AggregateError::Runtime(format!("cannot locate current executable: {}", e))
        })?;
        Ok(Self::new(program))
    }
}

/// Aggregation engine configuration.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use lorentz_engine::EngineConfig;
///
/// let config = EngineConfig::builder()
///     .block_size(4096)
///     .timeout(Duration::from_secs(30))
///     .build()
///     .expect("valid configuration");
///
/// assert_eq!(config.block_size(), 4096);
/// assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
/// ```
#[derive(Clone, Debug)]
pub struct EngineConfig {
    block_size: usize,
    timeout: Option<Duration>,
    worker_command: Option<WorkerCommand>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            timeout: None,
            worker_command: None,
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration builder.
    #[inline]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Samples drawn per block; cancellation is observed between blocks.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Optional deadline for a whole aggregation.
    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Worker command for the process backend, if overridden.
    #[inline]
    pub fn worker_command(&self) -> Option<&WorkerCommand> {
        self.worker_command.as_ref()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `AggregateError::InvalidConfig` if `block_size` is 0.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(AggregateError::InvalidConfig(
                "block size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`EngineConfig`].
#[derive(Clone, Debug, Default)]
pub struct EngineConfigBuilder {
    block_size: Option<usize>,
    timeout: Option<Duration>,
    worker_command: Option<WorkerCommand>,
}

impl EngineConfigBuilder {
    /// Sets the number of samples drawn per block.
    #[inline]
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = Some(block_size);
        self
    }

    /// Sets a deadline after which pending workers are cancelled.
    #[inline]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the deadline from an optional value.
    #[inline]
    pub fn maybe_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the worker command for the process backend.
    #[inline]
    pub fn worker_command(mut self, command: WorkerCommand) -> Self {
        self.worker_command = Some(command);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `AggregateError::InvalidConfig` if `block_size` is 0.
    pub fn build(self) -> Result<EngineConfig> {
        let config = EngineConfig {
            block_size: self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE),
            timeout: self.timeout,
            worker_command: self.worker_command,
        };
        config.validate()?;
        Ok(config)
    }
}
