//! Header row location for spreadsheets with a free-form preamble

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::locate::SourceKind;
use crate::normalize::normalize_label;
use crate::table::Cell;

/// Content-based header scan settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderScan {
    /// Substrings a header row is expected to contain (normalized before use)
    #[serde(default = "default_markers")]
    pub markers: Vec<String>,

    /// Number of leading rows inspected
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// Distinct markers a row must contain to count as the header
    #[serde(default = "default_min_hits")]
    pub min_hits: usize,
}

fn default_markers() -> Vec<String> {
    vec![
        "registro".to_string(),
        "ean".to_string(),
        "apresentacao".to_string(),
    ]
}

fn default_max_rows() -> usize {
    100
}

fn default_min_hits() -> usize {
    2
}

impl Default for HeaderScan {
    fn default() -> Self {
        Self {
            markers: default_markers(),
            max_rows: default_max_rows(),
            min_hits: default_min_hits(),
        }
    }
}

/// How the header row of the price sheet is found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderLocator {
    /// First row matching enough markers
    Scan(HeaderScan),
    /// Fixed number of preamble rows to skip
    Offset(usize),
}

impl Default for HeaderLocator {
    fn default() -> Self {
        Self::Scan(HeaderScan::default())
    }
}

impl HeaderLocator {
    /// Index of the header row in `grid`.
    pub fn locate(&self, grid: &[Vec<Cell>], path: &Path) -> Result<usize> {
        match self {
            Self::Offset(offset) => {
                if *offset < grid.len() {
                    Ok(*offset)
                } else {
                    Err(Error::SourceParse {
                        kind: SourceKind::Price,
                        path: path.to_path_buf(),
                        message: format!(
                            "header offset {offset} is past the last row ({} rows)",
                            grid.len()
                        ),
                    })
                }
            }
            Self::Scan(scan) => scan_for_header(grid, scan, path),
        }
    }
}

fn scan_for_header(grid: &[Vec<Cell>], scan: &HeaderScan, path: &Path) -> Result<usize> {
    let markers: Vec<String> = scan
        .markers
        .iter()
        .map(|m| normalize_label(m))
        .filter(|m| !m.is_empty())
        .collect();
    let needed = scan.min_hits.clamp(1, markers.len().max(1));

    for (index, row) in grid.iter().take(scan.max_rows).enumerate() {
        let labels: Vec<String> = row
            .iter()
            .map(|cell| normalize_label(&cell.as_text()))
            .filter(|label| !label.is_empty())
            .collect();
        let hits = markers
            .iter()
            .filter(|marker| labels.iter().any(|label| label.contains(marker.as_str())))
            .count();
        if hits >= needed {
            tracing::debug!(path = %path.display(), row = index, hits, "header row found");
            return Ok(index);
        }
    }

    Err(Error::HeaderNotFound {
        path: path.to_path_buf(),
        markers: scan.markers.clone(),
        scanned: grid.len().min(scan.max_rows),
    })
}
