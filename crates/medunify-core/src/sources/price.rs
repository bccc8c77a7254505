//! Price table reader (spreadsheet, or delimited text with the same layout)

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};

use super::header::HeaderLocator;
use super::registry::{parse_delimited, parse_error};
use crate::error::{Error, Result};
use crate::locate::SourceKind;
use crate::table::{Cell, RawTable};

/// Options for reading the price table
#[derive(Debug, Clone, Default)]
pub struct PriceReadOptions {
    /// Sheet to read; the first sheet when `None`
    pub sheet: Option<String>,
    /// Delimiter used when the file is delimited text
    pub delimiter: u8,
    /// How the header row is found
    pub header: HeaderLocator,
}

/// Read the price table into a [`RawTable`].
///
/// Files with a `csv` extension are read as UTF-8 delimited text, anything
/// else goes through the spreadsheet reader. In both cases the header row is
/// located inside the leading preamble and everything above it is discarded.
pub fn read_price(path: &Path, options: &PriceReadOptions) -> Result<RawTable> {
    let is_delimited = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let grid = if is_delimited {
        read_delimited_grid(path, options.delimiter)?
    } else {
        read_sheet_grid(path, options.sheet.as_deref())?
    };

    let header_row = options.header.locate(&grid, path)?;
    let mut rows = grid.into_iter().skip(header_row);
    let headers = rows
        .next()
        .map(|cells| cells.iter().map(|c| c.as_text().trim().to_string()).collect())
        .unwrap_or_default();

    tracing::debug!(path = %path.display(), header_row, "price header located");
    Ok(RawTable::new(headers, rows))
}

fn read_delimited_grid(path: &Path, delimiter: u8) -> Result<Vec<Vec<Cell>>> {
    let bytes = std::fs::read(path).map_err(|source| Error::SourceRead {
        kind: SourceKind::Price,
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|e| parse_error(SourceKind::Price, path, e))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
    parse_delimited(text.as_bytes(), delimiter, false)
        .map(|(_, rows)| rows)
        .map_err(|e| parse_error(SourceKind::Price, path, e))
}

fn read_sheet_grid(path: &Path, sheet: Option<&str>) -> Result<Vec<Vec<Cell>>> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| parse_error(SourceKind::Price, path, e))?;

    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| parse_error(SourceKind::Price, path, "workbook has no sheets"))?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| parse_error(SourceKind::Price, path, format!("sheet '{sheet_name}': {e}")))?;

    // The range starts at the first used cell; restore the leading blank rows
    // so header offsets count from the top of the sheet.
    let leading = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let mut grid: Vec<Vec<Cell>> = vec![Vec::new(); leading];
    grid.extend(range.rows().map(|row| row.iter().map(data_to_cell).collect::<Vec<_>>()));

    tracing::debug!(path = %path.display(), sheet = %sheet_name, rows = grid.len(), "sheet read");
    Ok(grid)
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::from_text(s),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        other => Cell::from_text(&other.to_string()),
    }
}
