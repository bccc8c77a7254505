//! Error types for medunify-core

use std::path::PathBuf;

use thiserror::Error;

use crate::locate::SourceKind;

/// Result type alias for medunify-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in medunify-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be found
    #[error("configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was searched
        path: String,
    },

    /// Failed to parse YAML configuration
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Invalid configuration value
    #[error("invalid configuration: {message}")]
    ConfigInvalid {
        /// Description of what's invalid
        message: String,
    },

    /// A required raw source file is absent
    #[error("{kind} source not found: {path}")]
    SourceNotFound {
        /// Which source was being located
        kind: SourceKind,
        /// Expected file, or the directory that was searched
        path: PathBuf,
    },

    /// A raw source file exists but could not be read
    #[error("failed to read {kind} source {path}: {source}")]
    SourceRead {
        /// Which source was being read
        kind: SourceKind,
        /// File that failed
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// A raw source file could not be parsed into a table
    #[error("failed to parse {kind} source {path}: {message}")]
    SourceParse {
        /// Which source was being parsed
        kind: SourceKind,
        /// File that failed
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// No row of the spreadsheet looked like the header row
    #[error(
        "no header row found in {path} within {scanned} rows (markers: {})",
        .markers.join(", ")
    )]
    HeaderNotFound {
        /// File that was scanned
        path: PathBuf,
        /// Marker substrings that were searched for
        markers: Vec<String>,
        /// Number of rows inspected
        scanned: usize,
    },

    /// Required semantic fields could not be resolved from the headers
    #[error(
        "{source_kind} schema resolution failed; missing required fields: {}",
        .missing.join(", ")
    )]
    SchemaResolution {
        /// Source whose headers were projected
        source_kind: SourceKind,
        /// Every unresolved required field, in schema order
        missing: Vec<String>,
    },

    /// Writing the unified table failed
    #[error("sink '{sink}' error: {message}")]
    Sink {
        /// Sink description (usually the output path)
        sink: String,
        /// Description of the error
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this failure means the source could not be located or parsed.
    ///
    /// Only these failures of the price source may fall back to degraded mode.
    pub fn is_source_unavailable(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound { .. }
                | Self::SourceRead { .. }
                | Self::SourceParse { .. }
                | Self::HeaderNotFound { .. }
        )
    }
}
