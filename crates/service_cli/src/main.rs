//! Lorentz CLI - Parallel Histogram Aggregation
//!
//! Operational entry point for the Lorentz histogram engine.
//!
//! # Commands
//!
//! - `lorentz run --samples <N>` - Aggregate one histogram and print it
//! - `lorentz compare --samples <N>` - Time every backend against a sequential baseline
//! - `lorentz worker` - Serve one worker-process task on stdin/stdout (internal)
//!
//! Logs are written to stderr; stdout carries results only, which keeps the
//! worker-process protocol clean.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod error;

pub use error::{CliError, Result};

use commands::OutputFormat;
use config::{build_config, CliArgs, LogLevel};

/// Lorentz parallel histogram aggregation CLI
#[derive(Parser)]
#[command(name = "lorentz")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path (TOML); `lorentz.toml` is read if present
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Histogram and engine options shared by `run` and `compare`
#[derive(Args, Debug, Clone, Default)]
struct HistogramOpts {
    /// Number of histogram bins
    #[arg(long)]
    bins: Option<usize>,

    /// Inclusive lower bound of the histogram range
    #[arg(long, allow_hyphen_values = true)]
    xmin: Option<f64>,

    /// Exclusive upper bound of the histogram range
    #[arg(long, allow_hyphen_values = true)]
    xmax: Option<f64>,

    /// Seed for reproducible sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Abort the aggregation after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Samples drawn per block
    #[arg(long)]
    block_size: Option<usize>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate a Lorentzian histogram and print it
    Run {
        /// Total number of samples
        #[arg(short = 'n', long)]
        samples: u64,

        /// Number of workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Backend (threaded, process, cooperative, atomic)
        #[arg(short, long)]
        backend: Option<String>,

        /// Output format (table, json, csv)
        #[arg(short, long, default_value = "table")]
        format: String,

        #[command(flatten)]
        histogram: HistogramOpts,
    },

    /// Compare backends and worker counts against a sequential baseline
    Compare {
        /// Total number of samples
        #[arg(short = 'n', long)]
        samples: u64,

        /// Comma-separated worker counts
        #[arg(long, value_delimiter = ',', default_value = "1,2,4")]
        workers_list: Vec<usize>,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,

        #[command(flatten)]
        histogram: HistogramOpts,
    },

    /// Serve one worker-process task (used by the process backend)
    #[command(hide = true)]
    Worker,
}

impl Cli {
    fn config_args(&self) -> CliArgs {
        let (workers, backend, opts) = match &self.command {
            Commands::Run {
                workers,
                backend,
                histogram,
                ..
            } => (*workers, backend.clone(), histogram.clone()),
            Commands::Compare { histogram, .. } => (None, None, histogram.clone()),
            Commands::Worker => (None, None, HistogramOpts::default()),
        };
        CliArgs {
            config_file: self.config.clone(),
            workers,
            bins: opts.bins,
            xmin: opts.xmin,
            xmax: opts.xmax,
            backend,
            seed: opts.seed,
            timeout_ms: opts.timeout_ms,
            block_size: opts.block_size,
            log_level: opts.log_level,
            verbose: self.verbose,
        }
    }
}

fn init_tracing(level: LogLevel) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.directives())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::Worker = cli.command {
        // the parent reads stderr as the failure cause, keep it short
        init_tracing(LogLevel::Error);
        return commands::worker::run();
    }

    let config = build_config(&cli.config_args())?;
    init_tracing(config.log_level);
    info!(
        workers = config.workers,
        bins = config.bins,
        xmin = config.xmin,
        xmax = config.xmax,
        backend = %config.backend,
        seed = ?config.seed,
        timeout_ms = ?config.timeout_ms,
        "configuration loaded"
    );

    match cli.command {
        Commands::Run {
            samples, format, ..
        } => commands::run::run(&config, samples, format.parse::<OutputFormat>()?),
        Commands::Compare {
            samples,
            workers_list,
            format,
            ..
        } => commands::compare::run(
            &config,
            samples,
            &workers_list,
            format.parse::<OutputFormat>()?,
        ),
        Commands::Worker => commands::worker::run(),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}
