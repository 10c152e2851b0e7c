//! Run command implementation
//!
//! Aggregates one Lorentzian histogram with the configured backend and
//! prints it next to the theoretical density.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use lorentz_core::{lorentzian_pdf, FinalHistogram};
use lorentz_engine::Engine;
use serde::Serialize;
use tracing::info;

use super::OutputFormat;
use crate::config::CliConfig;
use crate::Result;

/// One histogram bin as reported to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinRow {
    pub left: f64,
    pub right: f64,
    pub count: u64,
    pub density: f64,
    pub lorentzian_pdf: f64,
}

/// Result of one aggregation
#[derive(Debug, Clone, Serialize)]
pub struct HistogramReport {
    pub backend: String,
    pub samples: u64,
    pub workers: usize,
    pub seed: Option<u64>,
    pub in_range: u64,
    pub elapsed_ms: f64,
    pub bins: Vec<BinRow>,
}

impl HistogramReport {
    /// Build the report for `result`, normalising against `samples` draws
    pub fn new(
        config: &CliConfig,
        samples: u64,
        result: &FinalHistogram,
        elapsed: Duration,
    ) -> Self {
        let edges = result.edges();
        let centers = result.centers();
        let density = result.density(samples);
        let bins = result
            .counts()
            .iter()
            .enumerate()
            .map(|(i, &count)| BinRow {
                left: edges[i],
                right: edges[i + 1],
                count,
                density: density[i],
                lorentzian_pdf: lorentzian_pdf(centers[i]),
            })
            .collect();

        Self {
            backend: config.backend.to_string(),
            samples,
            workers: config.workers,
            seed: config.seed,
            in_range: result.total(),
            elapsed_ms: elapsed.as_secs_f64() * 1e3,
            bins,
        }
    }

    /// Write the report in `format`
    pub fn render<W: Write>(&self, format: OutputFormat, mut out: W) -> Result<()> {
        match format {
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut out, self)?;
                writeln!(out)?;
            }
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(out);
                for row in &self.bins {
                    writer.serialize(row)?;
                }
                writer.flush()?;
            }
            OutputFormat::Table => {
                writeln!(
                    out,
                    "backend={} samples={} workers={} in_range={} elapsed={:.2}ms",
                    self.backend, self.samples, self.workers, self.in_range, self.elapsed_ms
                )?;
                writeln!(
                    out,
                    "┌─────────────────────────┬────────────┬────────────┬────────────┐"
                )?;
                writeln!(
                    out,
                    "│ Bin                     │ Count      │ Density    │ Lorentzian │"
                )?;
                writeln!(
                    out,
                    "├─────────────────────────┼────────────┼────────────┼────────────┤"
                )?;
                for row in &self.bins {
                    let bin = format!("[{:.3}, {:.3})", row.left, row.right);
                    writeln!(
                        out,
                        "│ {:<23} │ {:>10} │ {:>10.6} │ {:>10.6} │",
                        bin, row.count, row.density, row.lorentzian_pdf
                    )?;
                }
                writeln!(
                    out,
                    "└─────────────────────────┴────────────┴────────────┴────────────┘"
                )?;
            }
        }
        Ok(())
    }
}

/// Run the run command
pub fn run(config: &CliConfig, samples: u64, format: OutputFormat) -> Result<()> {
    let engine = Engine::new(config.engine_config()?, config.sampler());
    let spec = config.spec()?;

    let started = Instant::now();
    let result = engine.aggregate(samples, config.workers, spec, config.backend)?;
    let elapsed = started.elapsed();
    info!(
        in_range = result.total(),
        elapsed_ms = elapsed.as_secs_f64() * 1e3,
        "run complete"
    );

    let report = HistogramReport::new(config, samples, &result, elapsed);
    report.render(format, io::stdout().lock())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lorentz_core::HistogramSpec;

    fn report() -> HistogramReport {
        let config = CliConfig {
            bins: 4,
            xmin: -2.0,
            xmax: 2.0,
            ..Default::default()
        };
        let spec = HistogramSpec::new(4, -2.0, 2.0).unwrap();
        let result = FinalHistogram::new(spec, vec![10, 30, 30, 10]).unwrap();
        HistogramReport::new(&config, 100, &result, Duration::from_millis(5))
    }

    #[test]
    fn test_report_rows() {
        let report = report();
        assert_eq!(report.in_range, 80);
        assert_eq!(report.bins.len(), 4);
        assert_eq!(report.bins[0].left, -2.0);
        assert_eq!(report.bins[3].right, 2.0);
        assert_relative_eq!(report.bins[1].density, 0.3, epsilon = 1e-12);
        assert_relative_eq!(
            report.bins[2].lorentzian_pdf,
            lorentzian_pdf(0.5),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_render_json() {
        let mut out = Vec::new();
        report().render(OutputFormat::Json, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["in_range"], 80);
        assert_eq!(value["bins"][1]["count"], 30);
    }

    #[test]
    fn test_render_csv() {
        let mut out = Vec::new();
        report().render(OutputFormat::Csv, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("left,right,count,density,lorentzian_pdf")
        );
        assert_eq!(text.lines().count(), 5);
    }

    #[test]
    fn test_render_table() {
        let mut out = Vec::new();
        report().render(OutputFormat::Table, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("in_range=80"));
        assert!(text.contains("[-2.000, -1.000)"));
    }
}
