//! Table sinks
//!
//! Sinks are the loader side of the pipeline: they take the finished
//! [`UnifiedTable`] and persist it. The pipeline itself never knows where the
//! table ends up.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::assemble::UnifiedTable;
use crate::error::{Error, Result};

/// Destination for a unified table
pub trait TableSink {
    /// Persist `table`.
    fn write(&mut self, table: &UnifiedTable) -> Result<()>;

    /// Human-readable destination, used in logs and errors.
    fn describe(&self) -> String;
}

/// Sink configuration from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Delimited text file
    Csv(CsvSinkConfig),

    /// One JSON object per line
    Jsonl(JsonLinesSinkConfig),
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self::Csv(CsvSinkConfig::default())
    }
}

impl SinkConfig {
    /// Output path.
    pub fn path(&self) -> &Path {
        match self {
            Self::Csv(c) => &c.path,
            Self::Jsonl(j) => &j.path,
        }
    }

    /// Replace the output path.
    pub fn set_path(&mut self, path: PathBuf) {
        match self {
            Self::Csv(c) => c.path = path,
            Self::Jsonl(j) => j.path = path,
        }
    }

    /// Short format name (`csv` or `jsonl`).
    pub fn format(&self) -> &'static str {
        match self {
            Self::Csv(_) => "csv",
            Self::Jsonl(_) => "jsonl",
        }
    }

    /// Build the sink; `sentinel` renders price values that were unavailable.
    pub fn open(&self, sentinel: &str) -> Box<dyn TableSink> {
        match self {
            Self::Csv(c) => Box::new(CsvSink::new(c.clone(), sentinel)),
            Self::Jsonl(j) => Box::new(JsonLinesSink::new(j.clone(), sentinel)),
        }
    }
}

/// CSV sink configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvSinkConfig {
    /// File path
    #[serde(default = "default_csv_path")]
    pub path: PathBuf,

    /// Field delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Whether to start the file with a UTF-8 byte order mark
    #[serde(default = "default_bom")]
    pub bom: bool,
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("dados_processados/medicamentos_unificados.csv")
}

fn default_delimiter() -> char {
    ';'
}

fn default_bom() -> bool {
    true
}

impl Default for CsvSinkConfig {
    fn default() -> Self {
        Self {
            path: default_csv_path(),
            delimiter: default_delimiter(),
            bom: default_bom(),
        }
    }
}

/// JSON lines sink configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonLinesSinkConfig {
    /// File path
    #[serde(default = "default_jsonl_path")]
    pub path: PathBuf,
}

fn default_jsonl_path() -> PathBuf {
    PathBuf::from("dados_processados/medicamentos_unificados.jsonl")
}

impl Default for JsonLinesSinkConfig {
    fn default() -> Self {
        Self {
            path: default_jsonl_path(),
        }
    }
}

fn create_file(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| sink_error(path, e))?;
    }
    let file = File::create(path).map_err(|e| sink_error(path, e))?;
    Ok(BufWriter::new(file))
}

fn sink_error(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::Sink {
        sink: path.display().to_string(),
        message: err.to_string(),
    }
}

// ============================================================================
// CSV
// ============================================================================

/// Writes the table as delimited UTF-8 text
///
/// Missing values are written as empty fields and unavailable price values as
/// the sentinel.
pub struct CsvSink {
    config: CsvSinkConfig,
    sentinel: String,
}

impl CsvSink {
    /// Create a new CSV sink
    pub fn new(config: CsvSinkConfig, sentinel: &str) -> Self {
        Self {
            config,
            sentinel: sentinel.to_string(),
        }
    }
}

impl TableSink for CsvSink {
    fn write(&mut self, table: &UnifiedTable) -> Result<()> {
        let path = self.config.path.as_path();
        if table.is_empty() {
            tracing::warn!(path = %path.display(), "unified table is empty; writing headers only");
        }
        if !self.config.delimiter.is_ascii() {
            return Err(sink_error(path, "delimiter must be a single ASCII character"));
        }

        let mut out = create_file(path)?;
        if self.config.bom {
            out.write_all("\u{feff}".as_bytes())
                .map_err(|e| sink_error(path, e))?;
        }

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.config.delimiter as u8)
            .from_writer(out);
        if !table.columns.is_empty() {
            writer
                .write_record(&table.columns)
                .map_err(|e| sink_error(path, e))?;
        }
        for row in &table.rows {
            writer
                .write_record(row.iter().map(|v| v.render(&self.sentinel)))
                .map_err(|e| sink_error(path, e))?;
        }
        writer.flush().map_err(|e| sink_error(path, e))?;

        tracing::info!(path = %path.display(), rows = table.len(), columns = table.columns.len(), "csv written");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.config.path.display())
    }
}

// ============================================================================
// JSON lines
// ============================================================================

/// Writes one JSON object per row, keyed by column name
///
/// Missing values become `null` and unavailable price values the sentinel
/// string.
pub struct JsonLinesSink {
    config: JsonLinesSinkConfig,
    sentinel: String,
}

impl JsonLinesSink {
    /// Create a new JSON lines sink
    pub fn new(config: JsonLinesSinkConfig, sentinel: &str) -> Self {
        Self {
            config,
            sentinel: sentinel.to_string(),
        }
    }
}

impl TableSink for JsonLinesSink {
    fn write(&mut self, table: &UnifiedTable) -> Result<()> {
        let path = self.config.path.as_path();
        if table.is_empty() {
            tracing::warn!(path = %path.display(), "unified table is empty; writing an empty file");
        }

        let mut out = create_file(path)?;
        for row in &table.rows {
            let object: serde_json::Map<String, serde_json::Value> = table
                .columns
                .iter()
                .zip(row)
                .map(|(column, value)| (column.clone(), value.to_json(&self.sentinel)))
                .collect();
            let line = serde_json::to_string(&object)?;
            writeln!(out, "{}", line).map_err(|e| sink_error(path, e))?;
        }
        out.flush().map_err(|e| sink_error(path, e))?;

        tracing::info!(path = %path.display(), rows = table.len(), "jsonl written");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("jsonl:{}", self.config.path.display())
    }
}
