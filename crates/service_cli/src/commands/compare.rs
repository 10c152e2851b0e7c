//! Compare command implementation
//!
//! Times a sequential single-chunk baseline and every backend at each
//! requested worker count, and reports runtime and speedup.

use std::io::{self, Write};
use std::time::Instant;

use lorentz_core::{
    histogram, partition, reduce, FinalHistogram, HistogramSpec, PartialHistogram, Sampler,
    SamplerKind,
};
use lorentz_engine::{Backend, Engine};
use serde::Serialize;
use tracing::{info, warn};

use super::OutputFormat;
use crate::config::CliConfig;
use crate::{CliError, Result};

/// One timed aggregation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timing {
    pub backend: String,
    pub workers: usize,
    pub elapsed_ms: f64,
    pub speedup: f64,
    pub in_range: u64,
}

/// Timings of one comparison run
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub samples: u64,
    pub cores: usize,
    pub baseline_ms: f64,
    pub timings: Vec<Timing>,
}

impl Comparison {
    /// Write the comparison in `format`
    pub fn render<W: Write>(&self, format: OutputFormat, mut out: W) -> Result<()> {
        match format {
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut out, self)?;
                writeln!(out)?;
            }
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(out);
                for timing in &self.timings {
                    writer.serialize(timing)?;
                }
                writer.flush()?;
            }
            OutputFormat::Table => {
                writeln!(
                    out,
                    "samples={} cores={} sequential={:.2}ms",
                    self.samples, self.cores, self.baseline_ms
                )?;
                writeln!(out, "┌─────────────┬─────────┬──────────────┬──────────┐")?;
                writeln!(out, "│ Backend     │ Workers │ Time (ms)    │ Speedup  │")?;
                writeln!(out, "├─────────────┼─────────┼──────────────┼──────────┤")?;
                for t in &self.timings {
                    writeln!(
                        out,
                        "│ {:<11} │ {:>7} │ {:>12.2} │ {:>7.2}x │",
                        t.backend, t.workers, t.elapsed_ms, t.speedup
                    )?;
                }
                writeln!(out, "└─────────────┴─────────┴──────────────┴──────────┘")?;
            }
        }
        Ok(())
    }
}

/// Draw and bin all `samples` on the calling thread, in one chunk
pub fn sequential_baseline(
    samples: u64,
    spec: &HistogramSpec,
    sampler: &SamplerKind,
    block_size: usize,
) -> Result<FinalHistogram> {
    let plan = partition(samples, 1)?;
    let mut counts = PartialHistogram::zeros(spec.bins());
    for chunk in plan.chunks() {
        for block in chunk.blocks(block_size) {
            let drawn = sampler.draw(block)?;
            counts.merge(&histogram(&drawn, spec))?;
        }
    }
    Ok(reduce(*spec, [counts])?)
}

/// Run the compare command
pub fn run(
    config: &CliConfig,
    samples: u64,
    workers_list: &[usize],
    format: OutputFormat,
) -> Result<()> {
    if workers_list.is_empty() {
        return Err(CliError::InvalidArgument(
            "workers list must not be empty".to_string(),
        ));
    }
    let spec = config.spec()?;
    let sampler = config.sampler();
    let cores = num_cpus::get();

    let started = Instant::now();
    let baseline = sequential_baseline(samples, &spec, &sampler, config.block_size)?;
    let baseline_ms = started.elapsed().as_secs_f64() * 1e3;
    info!(baseline_ms, in_range = baseline.total(), "sequential baseline");

    let engine = Engine::new(config.engine_config()?, sampler);
    let mut timings = Vec::new();
    for &workers in workers_list {
        if workers > cores {
            warn!(workers, cores, "more workers than available cores");
        }
        for backend in Backend::ALL {
            let started = Instant::now();
            let result = engine.aggregate(samples, workers, spec, backend)?;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1e3;
            info!(%backend, workers, elapsed_ms, "timed aggregation");
            timings.push(Timing {
                backend: backend.to_string(),
                workers,
                elapsed_ms,
                speedup: baseline_ms / elapsed_ms.max(f64::EPSILON),
                in_range: result.total(),
            });
        }
    }

    let comparison = Comparison {
        samples,
        cores,
        baseline_ms,
        timings,
    };
    comparison.render(format, io::stdout().lock())
}
