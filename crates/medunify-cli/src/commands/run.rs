//! Build the unified table

use std::path::PathBuf;

use anyhow::{Context, Result};
use medunify_core::sink::{CsvSinkConfig, JsonLinesSinkConfig};
use medunify_core::{Config, Pipeline, SinkConfig};

use crate::OutputFormat;

/// Command-line overrides for a run
#[derive(Debug, Default)]
pub struct RunOptions {
    /// Output path override
    pub output: Option<String>,
    /// Output format override
    pub format: Option<OutputFormat>,
    /// Where to write the JSON run report
    pub report: Option<String>,
    /// Disable degraded mode
    pub strict: bool,
}

/// Run the pipeline once and write the result
pub fn run(config_path: &str, options: &RunOptions) -> Result<()> {
    tracing::info!("Loading configuration from {}", config_path);

    let mut config = Config::load(config_path).context("Failed to load configuration")?;
    if options.strict {
        config.project.degraded.enabled = false;
    }

    let sink_config = sink_config(&config, options);
    tracing::info!(
        "Project: {} ({} -> {})",
        config.project.name,
        config.raw_dir().display(),
        sink_config.path().display()
    );

    let mut sink = sink_config.open(&config.project.degraded.sentinel);
    let report = Pipeline::new(config)
        .run_into(sink.as_mut())
        .context("Pipeline run failed")?;

    if let Some(path) = &options.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write report to {path}"))?;
        tracing::info!("Report written to {}", path);
    }

    println!(
        "{} rows, {} columns written to {}",
        report.output_rows,
        report.output_columns.len(),
        report.output.as_deref().unwrap_or("-")
    );
    println!(
        "registry rows: {}, price rows: {}, matched: {}, unmatched: {}",
        report.stats.registry_rows,
        report.stats.price_rows,
        report.stats.matched,
        report.stats.unmatched
    );
    if report.join.is_degraded() {
        println!("join: degraded (price data unavailable)");
    } else {
        println!("join: full");
    }

    Ok(())
}

/// Configured sink with the command-line format and path applied.
///
/// Switching format keeps the configured file name and directory and only
/// swaps the extension.
fn sink_config(config: &Config, options: &RunOptions) -> SinkConfig {
    let mut sink = config.output();

    let swapped = match (options.format, &sink) {
        (Some(OutputFormat::Csv), SinkConfig::Jsonl(jsonl)) => Some(SinkConfig::Csv(CsvSinkConfig {
            path: jsonl.path.with_extension("csv"),
            ..CsvSinkConfig::default()
        })),
        (Some(OutputFormat::Jsonl), SinkConfig::Csv(csv)) => {
            Some(SinkConfig::Jsonl(JsonLinesSinkConfig {
                path: csv.path.with_extension("jsonl"),
            }))
        }
        _ => None,
    };
    if let Some(swapped) = swapped {
        sink = swapped;
    }

    if let Some(output) = &options.output {
        sink.set_path(PathBuf::from(output));
    }

    sink
}
