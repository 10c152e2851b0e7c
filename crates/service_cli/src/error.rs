//! CLI error types

use lorentz_core::{SampleError, SpecError};
use lorentz_engine::AggregateError;
use thiserror::Error;

use crate::config::ConfigError;

/// CLI error types
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] AggregateError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error("Sampling failed: {0}")]
    Sample(#[from] SampleError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
