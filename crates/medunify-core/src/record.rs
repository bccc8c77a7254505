//! Cleaned values and per-source canonical records

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

/// A cleaned scalar value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Cleaned text (identifiers are digit strings)
    Text(String),
    /// Parsed decimal number
    Decimal(f64),
    /// Value absent or unparseable in the source
    Missing,
    /// Price data unavailable for the whole run (degraded mode)
    NotAvailable,
}

impl Value {
    /// Text content, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Decimal content, if this is a decimal value.
    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            Self::Decimal(n) => Some(*n),
            _ => None,
        }
    }

    /// Render for delimited output, using `sentinel` for [`Value::NotAvailable`].
    pub fn render(&self, sentinel: &str) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Decimal(n) => n.to_string(),
            Self::Missing => String::new(),
            Self::NotAvailable => sentinel.to_string(),
        }
    }

    /// Convert to JSON, using `sentinel` for [`Value::NotAvailable`].
    pub fn to_json(&self, sentinel: &str) -> serde_json::Value {
        match self {
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Decimal(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Missing => serde_json::Value::Null,
            Self::NotAvailable => serde_json::Value::String(sentinel.to_string()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Decimal(n) => serializer.serialize_f64(*n),
            Self::Missing => serializer.serialize_none(),
            Self::NotAvailable => serializer.serialize_unit_variant("Value", 3, "not_available"),
        }
    }
}

/// One row of a source projected onto its target schema
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanonicalRecord {
    /// Semantic field name to cleaned value
    pub fields: BTreeMap<String, Value>,
}

impl CanonicalRecord {
    /// Value of `field`, if the field was projected.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for CanonicalRecord {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// All canonical records of one source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalTable {
    /// Name of the identifier field the join key is derived from
    pub key_field: String,
    /// Projected field names, in schema order
    pub field_names: Vec<String>,
    /// Records, in source row order
    pub records: Vec<CanonicalRecord>,
}

impl CanonicalTable {
    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Cleaned identifier of a record, or `""` when it has none.
    pub fn key_of<'a>(&self, record: &'a CanonicalRecord) -> &'a str {
        record
            .get(&self.key_field)
            .and_then(Value::as_str)
            .unwrap_or("")
    }
}
