//! Column label normalization
//!
//! Publisher headers drift between releases (`APRESENTAÇÃO`, `Apresentacao `,
//! `APRESENTAÇÃO_`...). Every label is reduced to a canonical token:
//! lowercase, diacritics folded through a fixed table, separators removed and
//! anything that is not an ASCII letter or digit dropped.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::table::{Cell, RawTable};

static SEPARATOR_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_\-]+").expect("valid regex"));
static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]").expect("valid regex"));

/// Normalize a single header label to its canonical token.
///
/// The result is deterministic, independent of the process locale, and
/// idempotent: normalizing a token again returns it unchanged. Labels made only
/// of punctuation normalize to `""`.
pub fn normalize_label(label: &str) -> String {
    let folded: String = label
        .chars()
        .flat_map(char::to_lowercase)
        .map(fold_diacritic)
        .collect();
    let joined = SEPARATOR_RUNS.replace_all(&folded, "");
    NON_ALNUM.replace_all(&joined, "").into_owned()
}

/// Normalize a sequence of labels, preserving order and duplicates.
pub fn normalize_labels(labels: &[String]) -> Vec<String> {
    labels.iter().map(|l| normalize_label(l)).collect()
}

/// Fold a lowercase Latin letter with a diacritic to its base letter.
///
/// Covers the Latin-1 Supplement and Latin Extended-A letters used by
/// Portuguese and the other Western European languages. Anything else passes
/// through unchanged.
fn fold_diacritic(ch: char) -> char {
    match ch {
        'à'..='å' | 'ā' | 'ă' | 'ą' | 'ª' => 'a',
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
        'ď' | 'đ' => 'd',
        'è'..='ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => 'g',
        'ĥ' | 'ħ' => 'h',
        'ì'..='ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => 'i',
        'ĵ' => 'j',
        'ķ' => 'k',
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => 'l',
        'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
        'ò'..='ö' | 'ø' | 'ō' | 'ŏ' | 'ő' | 'º' => 'o',
        'ŕ' | 'ŗ' | 'ř' => 'r',
        'ś' | 'ŝ' | 'ş' | 'š' => 's',
        'ţ' | 'ť' | 'ŧ' => 't',
        'ù'..='ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
        'ŵ' => 'w',
        'ý' | 'ÿ' | 'ŷ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        other => other,
    }
}

/// A [`RawTable`] whose labels were rewritten to canonical tokens
///
/// Rows are carried over untouched, so row count and order match the raw table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedTable {
    /// Canonical tokens, positionally aligned with the raw headers
    pub labels: Vec<String>,
    /// Rows, unchanged from the raw table
    pub rows: Vec<Vec<Cell>>,
}

impl NormalizedTable {
    /// Rewrite the labels of a raw table.
    pub fn from_raw(raw: RawTable) -> Self {
        Self {
            labels: normalize_labels(&raw.headers),
            rows: raw.rows,
        }
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Labels that occur more than once, each reported once in first-seen order.
    pub fn duplicate_labels(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        let mut dupes = Vec::new();
        for label in self.labels.iter().filter(|l| !l.is_empty()) {
            if !seen.insert(label.as_str()) && !dupes.contains(&label.as_str()) {
                dupes.push(label.as_str());
            }
        }
        dupes
    }
}
