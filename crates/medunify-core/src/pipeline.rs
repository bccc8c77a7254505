//! End-to-end run: locate, read, project, reconcile, assemble
//!
//! A run either produces a [`UnifiedTable`] or stops with the first fatal
//! error. The only failure that does not stop it is an unavailable price
//! source while degraded mode is enabled; the table is then built from the
//! registry alone and its [`JoinMode`] says so.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::assemble::{JoinMode, UnifiedTable, assemble};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::locate::{LocatedSource, SourceKind};
use crate::normalize::NormalizedTable;
use crate::reconcile::{ReconcileStats, Reconciliation, reconcile, registry_only};
use crate::record::CanonicalTable;
use crate::schema::{Projection, TargetSchema, project};
use crate::sink::TableSink;
use crate::sources::{read_price, read_registry};
use crate::table::RawTable;

/// What was read from one source
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    /// Source kind
    pub kind: SourceKind,
    /// File that was read
    pub path: PathBuf,
    /// File modification time
    pub modified: DateTime<Utc>,
    /// SHA-256 of the file contents, hex encoded
    pub sha256: String,
    /// Data rows read (blank rows excluded)
    pub raw_rows: usize,
    /// Normalized labels that occur more than once
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub duplicate_labels: Vec<String>,
}

/// Summary of a pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Project name
    pub project: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration in seconds
    pub elapsed_secs: f64,
    /// Sources that were read
    pub sources: Vec<SourceReport>,
    /// How each source's headers were resolved
    pub projections: Vec<Projection>,
    /// Reconciliation row counts
    pub stats: ReconcileStats,
    /// Rows in the unified table
    pub output_rows: usize,
    /// Columns of the unified table
    pub output_columns: Vec<String>,
    /// Full or degraded join
    pub join: JoinMode,
    /// Destination, when the table was written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// The unified table together with the report describing it
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// The unified table
    pub table: UnifiedTable,
    /// Run summary
    pub report: RunReport,
}

/// A source read all the way to canonical records
struct LoadedSource {
    report: SourceReport,
    projection: Projection,
    table: CanonicalTable,
}

/// Runs the reconciliation for one project configuration
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    /// Create a pipeline for `config`.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// The configuration the pipeline runs with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the pipeline and return the unified table.
    pub fn run(&self) -> Result<PipelineOutput> {
        let started_at = Utc::now();
        self.config.validate()?;
        let project = &self.config.project;

        tracing::info!(project = %project.name, raw_dir = %self.config.raw_dir().display(), "run started");

        let registry = self.load(SourceKind::Registry)?;

        let (price, mode) = match self.load(SourceKind::Price) {
            Ok(price) => (Some(price), JoinMode::Full),
            Err(err) if err.is_source_unavailable() && project.degraded.enabled => {
                tracing::warn!(error = %err, "price source unavailable; continuing with registry data only");
                (
                    None,
                    JoinMode::Degraded {
                        reason: err.to_string(),
                    },
                )
            }
            Err(err) => return Err(err),
        };

        let prefix_len = project.join.prefix_len;
        let Reconciliation { records, stats } = match &price {
            Some(price) => reconcile(&registry.table, &price.table, prefix_len),
            None => {
                let price_fields = self.config.price_schema()?.field_names();
                registry_only(&registry.table, &price_fields, prefix_len)
            }
        };

        let columns = self.config.columns()?;
        let table = assemble(&records, &columns, mode.clone());
        if table.is_empty() {
            tracing::warn!("unified table has no rows");
        }

        let mut sources = vec![registry.report];
        let mut projections = vec![registry.projection];
        if let Some(price) = price {
            sources.push(price.report);
            projections.push(price.projection);
        }

        let finished_at = Utc::now();
        let report = RunReport {
            project: project.name.clone(),
            started_at,
            finished_at,
            elapsed_secs: (finished_at - started_at).num_milliseconds() as f64 / 1000.0,
            sources,
            projections,
            stats,
            output_rows: table.len(),
            output_columns: table.columns.clone(),
            join: mode,
            output: None,
        };

        tracing::info!(
            rows = report.output_rows,
            columns = report.output_columns.len(),
            degraded = report.join.is_degraded(),
            "run finished"
        );

        Ok(PipelineOutput { table, report })
    }

    /// Run the pipeline and write the unified table to `sink`.
    pub fn run_into(&self, sink: &mut dyn TableSink) -> Result<RunReport> {
        let PipelineOutput { table, mut report } = self.run()?;
        sink.write(&table)?;
        report.output = Some(sink.describe());
        Ok(report)
    }

    /// Locate and read one source, then resolve its headers without cleaning
    /// any rows.
    pub fn inspect(&self, kind: SourceKind) -> Result<(LocatedSource, Projection)> {
        let located = self.config.locator().locate(kind)?;
        let raw = self.read_raw(&located)?;
        let normalized = NormalizedTable::from_raw(raw);
        let projection = project(&normalized.labels, &self.schema_for(kind)?, kind)?;
        Ok((located, projection))
    }

    fn schema_for(&self, kind: SourceKind) -> Result<TargetSchema> {
        match kind {
            SourceKind::Registry => self.config.registry_schema(),
            SourceKind::Price => self.config.price_schema(),
        }
    }

    fn read_raw(&self, located: &LocatedSource) -> Result<RawTable> {
        match located.kind {
            SourceKind::Registry => read_registry(
                &located.path,
                self.config.project.registry.delimiter as u8,
                self.config.registry_encoding()?,
            ),
            SourceKind::Price => read_price(&located.path, &self.config.price_read_options()),
        }
    }

    fn load(&self, kind: SourceKind) -> Result<LoadedSource> {
        let located = self.config.locator().locate(kind)?;
        tracing::info!(source = %kind, path = %located.path.display(), "reading source");

        let sha256 = fingerprint(kind, &located.path)?;
        let raw = self.read_raw(&located)?;
        let raw_rows = raw.len();

        let normalized = NormalizedTable::from_raw(raw);
        let duplicate_labels: Vec<String> = normalized
            .duplicate_labels()
            .into_iter()
            .map(str::to_string)
            .collect();
        for label in &duplicate_labels {
            tracing::warn!(source = %kind, label = %label, "duplicate column label; first occurrence is used");
        }

        let projection = project(&normalized.labels, &self.schema_for(kind)?, kind)?;
        let table = projection.apply(&normalized, &self.config.project.decimal);
        tracing::info!(source = %kind, rows = raw_rows, fields = projection.fields.len(), "source projected");

        Ok(LoadedSource {
            report: SourceReport {
                kind,
                path: located.path,
                modified: located.modified,
                sha256,
                raw_rows,
                duplicate_labels,
            },
            projection,
            table,
        })
    }
}

/// SHA-256 of a source file, hex encoded.
fn fingerprint(kind: SourceKind, path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|source| Error::SourceRead {
        kind,
        path: path.to_path_buf(),
        source,
    })?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
