//! Medunify Core Library
//!
//! This crate reconciles the ANVISA medicine registry with the CMED consumer
//! price list into one unified table:
//! - Source discovery and reading (latin1 CSV, spreadsheets with a preamble)
//! - Header normalization and declarative schema projection
//! - Field cleaning, prefix-key reconciliation and output assembly
//! - Table sinks (CSV, JSON lines)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌───────────┐   ┌──────────┐
//! │ Locator  │──▶│ Readers  │──▶│ Normalize │──▶│  Project  │──▶│  Clean   │
//! │ (files)  │   │ (tables) │   │ (labels)  │   │ (schema)  │   │ (values) │
//! └──────────┘   └──────────┘   └───────────┘   └───────────┘   └────┬─────┘
//!                                                                    │
//!                    ┌──────────┐   ┌───────────┐   ┌────────────┐   │
//!                    │   Sink   │◀──│ Assemble  │◀──│ Reconcile  │◀──┘
//!                    │ (loader) │   │ (columns) │   │ (join key) │
//!                    └──────────┘   └───────────┘   └────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use medunify_core::{Config, Pipeline};
//!
//! let config = Config::load("./medunify.yaml")?;
//! let mut sink = config.output().open(&config.project.degraded.sentinel);
//! let report = Pipeline::new(config).run_into(sink.as_mut())?;
//! println!("{} rows, {:?}", report.output_rows, report.join);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assemble;
pub mod clean;
pub mod config;
pub mod error;
pub mod locate;
pub mod normalize;
pub mod pipeline;
pub mod reconcile;
pub mod record;
pub mod schema;
pub mod sink;
pub mod sources;
pub mod table;

pub use assemble::{JoinMode, UnifiedTable, assemble};
pub use config::{Config, ProjectConfig};
pub use error::{Error, Result};
pub use locate::{LocatedSource, SourceKind, SourceLocator};
pub use pipeline::{Pipeline, PipelineOutput, RunReport};
pub use reconcile::{JoinKey, ReconcileStats, UnifiedRecord, reconcile};
pub use record::{CanonicalRecord, CanonicalTable, Value};
pub use schema::{FieldKind, FieldRule, Projection, TargetSchema, project};
pub use sink::{SinkConfig, TableSink};
