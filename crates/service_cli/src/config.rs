//! Run configuration management
//!
//! Handles loading configuration from TOML files, environment variables,
//! and CLI arguments.
//!
//! Priority (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (`LORENTZ_*`)
//! 3. Config file (`--config`, or `lorentz.toml` if present)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use lorentz_core::{HistogramSpec, SamplerKind, DEFAULT_BLOCK_SIZE};
use lorentz_engine::{AggregateError, Backend, EngineConfig};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "lorentz.toml";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Invalid log level: {0}. Must be one of: off, error, warn, info, debug, trace")]
    InvalidLogLevel(String),

    #[error("Invalid backend: {0}. Must be one of: threaded, process, cooperative, atomic")]
    InvalidBackend(String),

    #[error("Configuration file error: {0}")]
    FileError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Verbosity of the diagnostics written to stderr
///
/// Ordered from quietest to most detailed. The level applies to the
/// `lorentz` crates; dependencies never log below `warn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const NAMES: [(&'static str, LogLevel); 7] = [
        ("off", LogLevel::Off),
        ("error", LogLevel::Error),
        ("warn", LogLevel::Warn),
        ("warning", LogLevel::Warn),
        ("info", LogLevel::Info),
        ("debug", LogLevel::Debug),
        ("trace", LogLevel::Trace),
    ];

    /// Level selected by `--verbose`: at least `debug`
    pub fn verbose(self) -> Self {
        self.max(LogLevel::Debug)
    }

    pub fn level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    /// `EnvFilter` directives for this level
    pub fn directives(self) -> String {
        let ours = self.level_filter();
        let deps = self.min(LogLevel::Warn).level_filter();
        format!(
            "{},lorentz={},lorentz_engine={},lorentz_core={}",
            deps, ours, ours, ours
        )
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Self::NAMES
            .iter()
            .find(|(known, _)| *known == name)
            .map(|&(_, level)| level)
            .ok_or_else(|| ConfigError::InvalidLogLevel(s.to_string()))
    }
}

impl TryFrom<String> for LogLevel {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, <LogLevel as TryFrom<String>>::Error> {
        value.parse()
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.level_filter())
    }
}

/// Aggregation run configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Number of workers
    pub workers: usize,
    /// Number of histogram bins
    pub bins: usize,
    /// Inclusive lower bound of the histogram range
    pub xmin: f64,
    /// Exclusive upper bound of the histogram range
    pub xmax: f64,
    /// Concurrency backend
    #[serde(deserialize_with = "deserialize_backend")]
    pub backend: Backend,
    /// Seed for reproducible sampling
    pub seed: Option<u64>,
    /// Deadline for one aggregation, in milliseconds
    pub timeout_ms: Option<u64>,
    /// Samples drawn per block
    pub block_size: usize,
    /// Diagnostics level
    pub log_level: LogLevel,
}

fn deserialize_backend<'de, D>(deserializer: D) -> Result<Backend, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_backend(&s).map_err(serde::de::Error::custom)
}

fn parse_backend(s: &str) -> Result<Backend, ConfigError> {
    Backend::from_str(s).map_err(|_| ConfigError::InvalidBackend(s.to_string()))
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            bins: 100,
            xmin: -10.0,
            xmax: 10.0,
            backend: Backend::Threaded,
            seed: None,
            timeout_ms: None,
            block_size: DEFAULT_BLOCK_SIZE,
            log_level: LogLevel::Info,
        }
    }
}

impl CliConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::FileError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content)
            .map_err(|e| ConfigError::FileError(format!("Failed to parse TOML: {}", e)))
    }

    /// Apply `LORENTZ_*` environment variables
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides looked up by variable name
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LORENTZ_WORKERS") {
            self.workers = parse_value("LORENTZ_WORKERS", &v)?;
        }
        if let Some(v) = lookup("LORENTZ_BINS") {
            self.bins = parse_value("LORENTZ_BINS", &v)?;
        }
        if let Some(v) = lookup("LORENTZ_XMIN") {
            self.xmin = parse_value("LORENTZ_XMIN", &v)?;
        }
        if let Some(v) = lookup("LORENTZ_XMAX") {
            self.xmax = parse_value("LORENTZ_XMAX", &v)?;
        }
        if let Some(v) = lookup("LORENTZ_BACKEND") {
            self.backend = parse_backend(&v)?;
        }
        if let Some(v) = lookup("LORENTZ_SEED") {
            self.seed = Some(parse_value("LORENTZ_SEED", &v)?);
        }
        if let Some(v) = lookup("LORENTZ_TIMEOUT_MS") {
            self.timeout_ms = Some(parse_value("LORENTZ_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = lookup("LORENTZ_BLOCK_SIZE") {
            self.block_size = parse_value("LORENTZ_BLOCK_SIZE", &v)?;
        }
        if let Some(v) = lookup("LORENTZ_LOG_LEVEL") {
            self.log_level = LogLevel::from_str(&v)?;
        }
        Ok(())
    }

    /// Merge with CLI arguments (CLI takes precedence)
    pub fn merge_with_cli(&mut self, cli: &CliArgs) -> Result<(), ConfigError> {
        if let Some(workers) = cli.workers {
            self.workers = workers;
        }
        if let Some(bins) = cli.bins {
            self.bins = bins;
        }
        if let Some(xmin) = cli.xmin {
            self.xmin = xmin;
        }
        if let Some(xmax) = cli.xmax {
            self.xmax = xmax;
        }
        if let Some(backend) = &cli.backend {
            self.backend = parse_backend(backend)?;
        }
        if cli.seed.is_some() {
            self.seed = cli.seed;
        }
        if cli.timeout_ms.is_some() {
            self.timeout_ms = cli.timeout_ms;
        }
        if let Some(block_size) = cli.block_size {
            self.block_size = block_size;
        }
        if let Some(level) = &cli.log_level {
            self.log_level = LogLevel::from_str(level)?;
        }
        if cli.verbose {
            self.log_level = self.log_level.verbose();
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        if self.block_size == 0 {
            return Err(ConfigError::Invalid(
                "block_size must be at least 1".to_string(),
            ));
        }
        self.spec()?;
        Ok(())
    }

    /// Histogram binning described by this configuration
    pub fn spec(&self) -> Result<HistogramSpec, ConfigError> {
        HistogramSpec::new(self.bins, self.xmin, self.xmax)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Deadline for one aggregation
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Lorentzian sampler, seeded if configured
    pub fn sampler(&self) -> SamplerKind {
        SamplerKind::Lorentzian { seed: self.seed }
    }

    /// Engine configuration
    pub fn engine_config(&self) -> Result<EngineConfig, AggregateError> {
        EngineConfig::builder()
            .block_size(self.block_size)
            .maybe_timeout(self.timeout())
            .build()
    }
}

/// CLI arguments structure
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Config file path
    pub config_file: Option<PathBuf>,
    pub workers: Option<usize>,
    pub bins: Option<usize>,
    pub xmin: Option<f64>,
    pub xmax: Option<f64>,
    pub backend: Option<String>,
    pub seed: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub block_size: Option<usize>,
    pub log_level: Option<String>,
    /// `--verbose` was given
    pub verbose: bool,
}

/// Build configuration from all sources
pub fn build_config(cli: &CliArgs) -> Result<CliConfig, ConfigError> {
    let mut config = match &cli.config_file {
        Some(path) => CliConfig::from_file(path)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                CliConfig::from_file(default_path)?
            } else {
                CliConfig::default()
            }
        }
    };

    config.apply_env()?;
    config.merge_with_cli(cli)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = CliConfig::default();
        assert_eq!(config.workers, 4);
        assert_eq!(config.bins, 100);
        assert_eq!((config.xmin, config.xmax), (-10.0, 10.0));
        assert_eq!(config.backend, Backend::Threaded);
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.validate().is_ok());
        assert_eq!(config.spec().unwrap(), HistogramSpec::default());
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!(LogLevel::from_str("DEBUG").unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::from_str(" warning ").unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::from_str("off").unwrap(), LogLevel::Off);
        assert!(matches!(
            LogLevel::from_str("loud"),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn test_log_level_directives() {
        assert_eq!(
            LogLevel::Debug.directives(),
            "warn,lorentz=debug,lorentz_engine=debug,lorentz_core=debug"
        );
        assert_eq!(
            LogLevel::Error.directives(),
            "error,lorentz=error,lorentz_engine=error,lorentz_core=error"
        );
        assert_eq!(LogLevel::Trace.to_string(), "trace");
    }

    #[test]
    fn test_verbose_raises_level() {
        let mut config = CliConfig::default();
        let cli = CliArgs {
            log_level: Some("warn".to_string()),
            verbose: true,
            ..Default::default()
        };
        config.merge_with_cli(&cli).unwrap();
        assert_eq!(config.log_level, LogLevel::Debug);

        config.log_level = LogLevel::Trace;
        config
            .merge_with_cli(&CliArgs {
                verbose: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(config.log_level, LogLevel::Trace);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = CliConfig::from_toml(
            r#"
            workers = 8
            backend = "async"
            xmin = -5.0
            log_level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.workers, 8);
        assert_eq!(config.backend, Backend::Cooperative);
        assert_eq!(config.xmin, -5.0);
        assert_eq!(config.xmax, 10.0);
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_from_toml_rejects_unknown_backend() {
        let err = CliConfig::from_toml(r#"backend = "gpu""#).unwrap_err();
        assert!(matches!(err, ConfigError::FileError(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env = vars(&[
            ("LORENTZ_WORKERS", "2"),
            ("LORENTZ_BACKEND", "atomic"),
            ("LORENTZ_SEED", "42"),
            ("LORENTZ_TIMEOUT_MS", "1500"),
        ]);
        let mut config = CliConfig::default();
        config.apply_vars(|k| env.get(k).cloned()).unwrap();

        assert_eq!(config.workers, 2);
        assert_eq!(config.backend, Backend::Atomic);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.sampler(), SamplerKind::Lorentzian { seed: Some(42) });
    }

    #[test]
    fn test_env_invalid_number() {
        let env = vars(&[("LORENTZ_BINS", "many")]);
        let mut config = CliConfig::default();
        let err = config.apply_vars(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "LORENTZ_BINS",
                ..
            }
        ));
    }

    #[test]
    fn test_cli_takes_precedence() {
        let env = vars(&[("LORENTZ_WORKERS", "2"), ("LORENTZ_BINS", "50")]);
        let mut config = CliConfig::default();
        config.apply_vars(|k| env.get(k).cloned()).unwrap();

        let cli = CliArgs {
            workers: Some(16),
            backend: Some("process".to_string()),
            ..Default::default()
        };
        config.merge_with_cli(&cli).unwrap();

        assert_eq!(config.workers, 16);
        assert_eq!(config.bins, 50);
        assert_eq!(config.backend, Backend::Process);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = CliConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CliConfig {
            xmin: 3.0,
            xmax: 3.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = CliConfig {
            block_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_engine_config() {
        let config = CliConfig {
            block_size: 1024,
            timeout_ms: Some(250),
            ..Default::default()
        };
        let engine = config.engine_config().unwrap();
        assert_eq!(engine.block_size(), 1024);
        assert_eq!(engine.timeout(), Some(Duration::from_millis(250)));
    }
}
