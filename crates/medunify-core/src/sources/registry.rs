//! Registry reader (delimited text in a single-byte encoding)

use std::path::Path;

use encoding_rs::Encoding;

use crate::error::{Error, Result};
use crate::locate::SourceKind;
use crate::table::{Cell, RawTable};

/// Resolve an encoding label (`latin1`, `windows-1252`, `utf-8`...).
pub fn encoding_for_label(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| Error::ConfigInvalid {
        message: format!("unsupported encoding label '{label}'"),
    })
}

/// Read the registry file into a [`RawTable`].
///
/// The whole file is decoded with `encoding` before parsing. Undecodable
/// bytes are replaced rather than rejected, and a warning is logged.
pub fn read_registry(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<RawTable> {
    let bytes = std::fs::read(path).map_err(|source| Error::SourceRead {
        kind: SourceKind::Registry,
        path: path.to_path_buf(),
        source,
    })?;

    let (text, used, had_errors) = encoding.decode(&bytes);
    if had_errors {
        tracing::warn!(
            path = %path.display(),
            encoding = used.name(),
            "registry contains bytes invalid for its encoding; replaced"
        );
    }

    parse_delimited(text.as_bytes(), delimiter, true)
        .map(|(headers, rows)| RawTable::new(headers, rows))
        .map_err(|e| parse_error(SourceKind::Registry, path, e))
}

/// Parse delimited text into rows of cells.
///
/// With `has_headers`, the first record is returned separately as labels;
/// otherwise every record is a row and the label list is empty.
pub(crate) fn parse_delimited(
    data: &[u8],
    delimiter: u8,
    has_headers: bool,
) -> std::result::Result<(Vec<String>, Vec<Vec<Cell>>), csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_headers)
        .flexible(true)
        .from_reader(data);

    let headers = if has_headers {
        reader.headers()?.iter().map(|h| h.to_string()).collect()
    } else {
        Vec::new()
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(Cell::from_text).collect());
    }
    Ok((headers, rows))
}

pub(crate) fn parse_error(kind: SourceKind, path: &Path, err: impl std::fmt::Display) -> Error {
    Error::SourceParse {
        kind,
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_encoding_labels() {
        assert_eq!(encoding_for_label("latin1").unwrap().name(), "windows-1252");
        assert_eq!(encoding_for_label(" UTF-8 ").unwrap().name(), "UTF-8");
        assert!(matches!(
            encoding_for_label("klingon"),
            Err(Error::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn test_read_latin1_registry() {
        let mut file = NamedTempFile::new().unwrap();
        // "PRINCÍPIO" and "SÓDICA" encoded as windows-1252
        file.write_all(b"NUMERO_REGISTRO_PRODUTO;PRINC\xcdPIO_ATIVO\n")
            .unwrap();
        file.write_all(b"123456789-0;DIPIRONA S\xd3DICA\n").unwrap();
        file.write_all(b";\n").unwrap();
        file.write_all(b"987654321;\n").unwrap();

        let encoding = encoding_for_label("latin1").unwrap();
        let table = read_registry(file.path(), b';', encoding).unwrap();
        assert_eq!(table.headers, vec!["NUMERO_REGISTRO_PRODUTO", "PRINCÍPIO_ATIVO"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0][1], Cell::Text("DIPIRONA SÓDICA".to_string()));
        assert_eq!(table.rows[1][1], Cell::Empty);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "A;B;C").unwrap();
        writeln!(file, "1;2").unwrap();
        let encoding = encoding_for_label("utf-8").unwrap();
        let table = read_registry(file.path(), b';', encoding).unwrap();
        assert_eq!(table.rows[0], vec![Cell::from_text("1"), Cell::from_text("2"), Cell::Empty]);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let encoding = encoding_for_label("latin1").unwrap();
        let err = read_registry(Path::new("/nonexistent/registry.csv"), b';', encoding).unwrap_err();
        assert!(matches!(
            err,
            Error::SourceRead {
                kind: SourceKind::Registry,
                ..
            }
        ));
    }
}
