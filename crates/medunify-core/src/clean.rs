//! Per-field cleaning
//!
//! All functions are total: a value that cannot be cleaned becomes an empty
//! identifier or [`Value::Missing`], never an error. Whether a row survives is
//! decided later by the reconciler.

use serde::{Deserialize, Serialize};

use crate::record::Value;
use crate::table::Cell;

/// Thousands separator and decimal mark of the source locale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecimalFormat {
    /// Thousands separator, removed before parsing
    #[serde(default = "default_thousands")]
    pub thousands: char,
    /// Decimal mark, converted to `.` before parsing
    #[serde(default = "default_decimal")]
    pub decimal: char,
}

fn default_thousands() -> char {
    '.'
}

fn default_decimal() -> char {
    ','
}

impl Default for DecimalFormat {
    fn default() -> Self {
        Self {
            thousands: default_thousands(),
            decimal: default_decimal(),
        }
    }
}

/// Keep only the ASCII digits of an identifier.
///
/// `"123.456.789-0"` becomes `"1234567890"`; input without digits yields `""`.
pub fn clean_identifier(cell: &Cell) -> String {
    cell.as_text()
        .chars()
        .filter(char::is_ascii_digit)
        .collect()
}

/// Trim, collapse inner whitespace and upper-case a text value.
pub fn clean_text(cell: &Cell) -> Value {
    let text = cell.as_text();
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        Value::Missing
    } else {
        Value::Text(collapsed.to_uppercase())
    }
}

/// Parse a locale-formatted decimal.
///
/// Numeric spreadsheet cells pass through. Text has a leading `R$` dropped,
/// thousands separators removed and the decimal mark converted before
/// parsing. Anything unparseable, including infinities and NaN, is
/// [`Value::Missing`].
pub fn clean_decimal(cell: &Cell, format: &DecimalFormat) -> Value {
    let parsed = match cell {
        Cell::Number(n) => Some(*n),
        Cell::Empty => None,
        Cell::Text(s) => parse_decimal_text(s, format),
    };
    match parsed {
        Some(n) if n.is_finite() => Value::Decimal(n),
        _ => Value::Missing,
    }
}

fn parse_decimal_text(raw: &str, format: &DecimalFormat) -> Option<f64> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("R$").unwrap_or(trimmed).trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized: String = trimmed
        .chars()
        .filter(|c| *c != format.thousands && !c.is_whitespace())
        .map(|c| if c == format.decimal { '.' } else { c })
        .collect();
    // Reject what `f64::from_str` would otherwise accept as words ("inf", "NaN").
    if !normalized
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    {
        return None;
    }
    normalized.parse::<f64>().ok()
}
