//! Output assembly

use serde::Serialize;

use crate::reconcile::UnifiedRecord;
use crate::record::Value;

/// How the unified table was produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum JoinMode {
    /// Registry joined with price data
    Full,
    /// Registry only; price fields are [`Value::NotAvailable`]
    Degraded {
        /// Why the price source was unavailable
        reason: String,
    },
}

impl JoinMode {
    /// Whether price data is missing from the table.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// The unified table handed to a [`TableSink`](crate::sink::TableSink)
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedTable {
    /// Column names, in declared order
    pub columns: Vec<String>,
    /// Rows, positionally aligned with `columns`
    pub rows: Vec<Vec<Value>>,
    /// Whether price data was joined
    pub mode: JoinMode,
}

impl UnifiedTable {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Lay out unified records as a table with the declared column order.
///
/// A declared column is kept only if at least one record carries it; the rest
/// are dropped without padding. Records lacking a kept column get
/// [`Value::Missing`].
pub fn assemble(records: &[UnifiedRecord], declared_columns: &[String], mode: JoinMode) -> UnifiedTable {
    let columns: Vec<String> = declared_columns
        .iter()
        .filter(|column| records.iter().any(|r| r.fields.contains_key(column.as_str())))
        .cloned()
        .collect();

    let omitted = declared_columns.len() - columns.len();
    if omitted > 0 && !records.is_empty() {
        tracing::debug!(omitted, "declared columns absent from every record");
    }

    let rows = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|column| record.get(column).cloned().unwrap_or(Value::Missing))
                .collect()
        })
        .collect();

    UnifiedTable { columns, rows, mode }
}
