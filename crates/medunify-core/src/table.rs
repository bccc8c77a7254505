//! Raw tabular data as read from the publisher files
//!
//! A [`RawTable`] keeps the publisher's header labels untouched and stores each
//! row positionally aligned with them. Every later stage builds a new value
//! from it instead of mutating it.

use serde::{Deserialize, Serialize};

/// A raw cell value as it came out of the source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// Text cell (delimited files only produce these)
    Text(String),
    /// Numeric spreadsheet cell
    Number(f64),
    /// Empty cell, or a cell missing from a short row
    Empty,
}

impl Cell {
    /// Build a cell from text, mapping blank strings to [`Cell::Empty`].
    pub fn from_text(value: &str) -> Self {
        if value.trim().is_empty() {
            Self::Empty
        } else {
            Self::Text(value.to_string())
        }
    }

    /// Whether the cell carries no data.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) => false,
            Self::Empty => true,
        }
    }

    /// Render the cell as text.
    ///
    /// Integral numbers are written without a fractional part so that
    /// registration numbers stored as spreadsheet numbers keep their digits.
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => format_number(*n),
            Self::Empty => String::new(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e17 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

/// Ordered header labels plus ordered rows of raw cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// Header labels exactly as published
    pub headers: Vec<String>,
    /// Rows, each with exactly `headers.len()` cells
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    /// Build a table, padding short rows with [`Cell::Empty`], truncating long
    /// ones and skipping rows where every cell is empty.
    pub fn new(headers: Vec<String>, rows: impl IntoIterator<Item = Vec<Cell>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .filter(|row| !row.iter().all(Cell::is_empty))
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();
        Self { headers, rows }
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_numbers_render_without_fraction() {
        assert_eq!(Cell::Number(1000100010017.0).as_text(), "1000100010017");
        assert_eq!(Cell::Number(12.5).as_text(), "12.5");
        assert_eq!(Cell::Empty.as_text(), "");
    }

    #[test]
    fn test_from_text_blank_is_empty() {
        assert_eq!(Cell::from_text("   "), Cell::Empty);
        assert_eq!(Cell::from_text(" x "), Cell::Text(" x ".to_string()));
    }

    #[test]
    fn test_new_pads_and_skips_blank_rows() {
        let table = RawTable::new(
            vec!["A".to_string(), "B".to_string()],
            vec![
                vec![Cell::from_text("1")],
                vec![Cell::Empty, Cell::from_text("  ")],
                vec![
                    Cell::from_text("2"),
                    Cell::from_text("3"),
                    Cell::from_text("extra"),
                ],
            ],
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0], vec![Cell::from_text("1"), Cell::Empty]);
        assert_eq!(table.rows[1].len(), 2);
        assert_eq!(table.rows[1][1], Cell::from_text("3"));
    }
}
