//! Source discovery
//!
//! The registry file always has the same name. The price table is renamed by
//! the publisher on every release, so it is found by extension and the most
//! recently modified candidate wins. The registry file is never a price
//! candidate, even when the extensions overlap.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Which of the two inputs a file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Regulatory registry (ANVISA open data, delimited text)
    Registry,
    /// Price table (CMED, spreadsheet)
    Price,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry => f.write_str("registry"),
            Self::Price => f.write_str("price"),
        }
    }
}

/// A raw file picked for a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatedSource {
    /// Source the file belongs to
    pub kind: SourceKind,
    /// Path to the file
    pub path: PathBuf,
    /// Last modification time reported by the filesystem
    pub modified: DateTime<Utc>,
}

/// Finds the raw files inside the raw-data directory
#[derive(Debug, Clone)]
pub struct SourceLocator {
    raw_dir: PathBuf,
    registry_filename: String,
    price_extensions: Vec<String>,
}

impl SourceLocator {
    /// Create a locator for `raw_dir`.
    ///
    /// Extensions are matched case-insensitively and may be given with or
    /// without a leading dot.
    pub fn new(
        raw_dir: impl Into<PathBuf>,
        registry_filename: impl Into<String>,
        price_extensions: &[String],
    ) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            registry_filename: registry_filename.into(),
            price_extensions: price_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Locate the file for `kind`.
    pub fn locate(&self, kind: SourceKind) -> Result<LocatedSource> {
        match kind {
            SourceKind::Registry => self.locate_registry(),
            SourceKind::Price => self.locate_price(),
        }
    }

    fn locate_registry(&self) -> Result<LocatedSource> {
        let path = self.raw_dir.join(&self.registry_filename);
        let not_found = || Error::SourceNotFound {
            kind: SourceKind::Registry,
            path: path.clone(),
        };
        let metadata = std::fs::metadata(&path).map_err(|_| not_found())?;
        if !metadata.is_file() {
            return Err(not_found());
        }
        Ok(LocatedSource {
            kind: SourceKind::Registry,
            modified: modified_time(&metadata),
            path,
        })
    }

    fn locate_price(&self) -> Result<LocatedSource> {
        let not_found = || Error::SourceNotFound {
            kind: SourceKind::Price,
            path: self.raw_dir.clone(),
        };
        if !self.raw_dir.is_dir() {
            return Err(not_found());
        }

        let mut best: Option<LocatedSource> = None;
        for entry in WalkDir::new(&self.raw_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file()
                || !self.has_price_extension(entry.path())
                || entry.file_name() == self.registry_filename.as_str()
            {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let candidate = LocatedSource {
                kind: SourceKind::Price,
                path: entry.path().to_path_buf(),
                modified: modified_time(&metadata),
            };
            tracing::debug!(path = %candidate.path.display(), modified = %candidate.modified, "price candidate");
            best = match best {
                Some(current) if !is_newer(&candidate, &current) => Some(current),
                _ => Some(candidate),
            };
        }

        best.ok_or_else(not_found)
    }

    fn has_price_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.price_extensions.iter().any(|e| *e == ext)
            })
    }
}

/// Later modification wins; equal times fall back to the greater file name.
fn is_newer(candidate: &LocatedSource, current: &LocatedSource) -> bool {
    (candidate.modified, candidate.path.file_name())
        > (current.modified, current.path.file_name())
}

fn modified_time(metadata: &std::fs::Metadata) -> DateTime<Utc> {
    metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
