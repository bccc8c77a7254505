//! Prefix-key reconciliation of registry and price records
//!
//! Registry numbers and price-list registrations share only their leading
//! digits (the price list appends a presentation suffix), so both sides are
//! joined on a fixed-length digit prefix.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;

use crate::record::{CanonicalRecord, CanonicalTable, Value};

/// Fixed-length digit prefix of a cleaned identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct JoinKey(String);

impl JoinKey {
    /// Derive the key from a cleaned identifier.
    ///
    /// Returns `None` when the identifier has fewer than `prefix_len` digits.
    pub fn derive(identifier: &str, prefix_len: usize) -> Option<Self> {
        if prefix_len == 0 {
            return None;
        }
        let digits: String = identifier
            .chars()
            .filter(char::is_ascii_digit)
            .take(prefix_len)
            .collect();
        (digits.len() == prefix_len).then_some(Self(digits))
    }

    /// The key digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JoinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registry record joined with its price record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedRecord {
    /// Key both sides matched on
    pub key: JoinKey,
    /// Fields of both sides; registry values win on name collisions
    pub fields: BTreeMap<String, Value>,
}

impl UnifiedRecord {
    /// Value of `field`, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Row counts observed while reconciling
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// Registry records in
    pub registry_rows: usize,
    /// Price records in
    pub price_rows: usize,
    /// Registry records without a usable key
    pub registry_unkeyed: usize,
    /// Price records without a usable key
    pub price_unkeyed: usize,
    /// Price records dropped because an earlier record had the same key
    pub price_duplicates: usize,
    /// Registry records that found a price record
    pub matched: usize,
    /// Keyed registry records without a price record
    pub unmatched: usize,
}

/// Output of [`reconcile`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Joined records, in registry order
    pub records: Vec<UnifiedRecord>,
    /// Row counts
    pub stats: ReconcileStats,
}

fn keyed<'a>(
    table: &'a CanonicalTable,
    prefix_len: usize,
) -> (Vec<(JoinKey, &'a CanonicalRecord)>, usize) {
    let mut out = Vec::with_capacity(table.len());
    let mut unkeyed = 0;
    for record in &table.records {
        match JoinKey::derive(table.key_of(record), prefix_len) {
            Some(key) => out.push((key, record)),
            None => unkeyed += 1,
        }
    }
    (out, unkeyed)
}

/// Inner-join registry records to price records on their [`JoinKey`].
///
/// Records without a key are dropped on both sides. Among price records with
/// the same key only the first in source order is used. Registry order is
/// preserved and unmatched registry records are dropped. An empty result is
/// a valid outcome.
pub fn reconcile(registry: &CanonicalTable, price: &CanonicalTable, prefix_len: usize) -> Reconciliation {
    let (registry_keyed, registry_unkeyed) = keyed(registry, prefix_len);
    let (price_keyed, price_unkeyed) = keyed(price, prefix_len);

    let mut index: HashMap<JoinKey, &CanonicalRecord> = HashMap::with_capacity(price_keyed.len());
    let mut price_duplicates = 0;
    for (key, record) in price_keyed {
        if index.contains_key(&key) {
            price_duplicates += 1;
        } else {
            index.insert(key, record);
        }
    }

    let mut records = Vec::new();
    let mut unmatched = 0;
    for (key, registry_record) in registry_keyed {
        let Some(price_record) = index.get(&key) else {
            unmatched += 1;
            continue;
        };
        let mut fields = price_record.fields.clone();
        fields.extend(registry_record.fields.clone());
        records.push(UnifiedRecord { key, fields });
    }

    let stats = ReconcileStats {
        registry_rows: registry.len(),
        price_rows: price.len(),
        registry_unkeyed,
        price_unkeyed,
        price_duplicates,
        matched: records.len(),
        unmatched,
    };
    tracing::info!(
        registry_rows = stats.registry_rows,
        price_rows = stats.price_rows,
        registry_unkeyed = stats.registry_unkeyed,
        price_unkeyed = stats.price_unkeyed,
        price_duplicates = stats.price_duplicates,
        matched = stats.matched,
        unmatched = stats.unmatched,
        "reconciled"
    );

    Reconciliation { records, stats }
}

/// Registry-only records for a run without price data.
///
/// Every keyed registry record is kept and each of `price_fields` is set to
/// [`Value::NotAvailable`] unless the registry already has that field.
pub fn registry_only(
    registry: &CanonicalTable,
    price_fields: &[String],
    prefix_len: usize,
) -> Reconciliation {
    let (registry_keyed, registry_unkeyed) = keyed(registry, prefix_len);

    let records: Vec<UnifiedRecord> = registry_keyed
        .into_iter()
        .map(|(key, record)| {
            let mut fields: BTreeMap<String, Value> = price_fields
                .iter()
                .map(|name| (name.clone(), Value::NotAvailable))
                .collect();
            fields.extend(record.fields.clone());
            UnifiedRecord { key, fields }
        })
        .collect();

    let stats = ReconcileStats {
        registry_rows: registry.len(),
        registry_unkeyed,
        ..ReconcileStats::default()
    };
    tracing::info!(
        registry_rows = stats.registry_rows,
        registry_unkeyed = stats.registry_unkeyed,
        output_rows = records.len(),
        "registry-only records built"
    );

    Reconciliation { records, stats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn table(key_field: &str, rows: &[&[(&str, Value)]]) -> CanonicalTable {
        let records: Vec<CanonicalRecord> = rows
            .iter()
            .map(|row| row.iter().map(|(k, v)| (*k, v.clone())).collect())
            .collect();
        CanonicalTable {
            key_field: key_field.to_string(),
            field_names: rows
                .first()
                .map(|r| r.iter().map(|(k, _)| k.to_string()).collect())
                .unwrap_or_default(),
            records,
        }
    }

    #[rstest]
    #[case("1234567890", Some("123456789"))]
    #[case("1234567890001", Some("123456789"))]
    #[case("123456789", Some("123456789"))]
    #[case("12345678", None)]
    #[case("", None)]
    fn test_join_key_derive(#[case] id: &str, #[case] expected: Option<&str>) {
        assert_eq!(
            JoinKey::derive(id, 9).as_ref().map(JoinKey::as_str),
            expected
        );
    }

    #[test]
    fn test_registry_and_price_identifiers_join_on_prefix() {
        let registry = table(
            "registro_ms",
            &[&[("registro_ms", text("1234567890")), ("principio_ativo", text("DIPIRONA"))]],
        );
        let price = table(
            "registro_cmed",
            &[&[("registro_cmed", text("1234567890001")), ("pmc_0", Value::Decimal(10.5))]],
        );

        let result = reconcile(&registry, &price, 9);
        assert_eq!(result.records.len(), 1);
        let record = &result.records[0];
        assert_eq!(record.key.as_str(), "123456789");
        assert_eq!(record.get("principio_ativo"), Some(&text("DIPIRONA")));
        assert_eq!(record.get("pmc_0"), Some(&Value::Decimal(10.5)));
        assert_eq!(record.get("registro_ms"), Some(&text("1234567890")));
        assert_eq!(record.get("registro_cmed"), Some(&text("1234567890001")));
    }

    #[test]
    fn test_first_price_row_wins() {
        let registry = table("registro_ms", &[&[("registro_ms", text("987654321"))]]);
        let price = table(
            "registro_cmed",
            &[
                &[("registro_cmed", text("98765432100")), ("produto", text("PRIMEIRO"))],
                &[("registro_cmed", text("98765432111")), ("produto", text("SEGUNDO"))],
            ],
        );

        let result = reconcile(&registry, &price, 9);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].get("produto"), Some(&text("PRIMEIRO")));
        assert_eq!(result.stats.price_duplicates, 1);
    }

    #[test]
    fn test_unkeyed_and_unmatched_rows_are_dropped_and_counted() {
        let registry = table(
            "registro_ms",
            &[
                &[("registro_ms", text("111111111"))],
                &[("registro_ms", text("1234"))],
                &[("registro_ms", Value::Missing)],
                &[("registro_ms", text("222222222"))],
            ],
        );
        let price = table(
            "registro_cmed",
            &[
                &[("registro_cmed", text("2222222229999"))],
                &[("registro_cmed", text("99"))],
            ],
        );

        let result = reconcile(&registry, &price, 9);
        assert_eq!(
            result.stats,
            ReconcileStats {
                registry_rows: 4,
                price_rows: 2,
                registry_unkeyed: 2,
                price_unkeyed: 1,
                price_duplicates: 0,
                matched: 1,
                unmatched: 1,
            }
        );
        assert_eq!(result.records[0].key.as_str(), "222222222");
    }

    #[test]
    fn test_registry_order_preserved() {
        let registry = table(
            "registro_ms",
            &[
                &[("registro_ms", text("333333333"))],
                &[("registro_ms", text("111111111"))],
                &[("registro_ms", text("222222222"))],
            ],
        );
        let price = table(
            "registro_cmed",
            &[
                &[("registro_cmed", text("111111111000"))],
                &[("registro_cmed", text("222222222000"))],
                &[("registro_cmed", text("333333333000"))],
            ],
        );
        let keys: Vec<String> = reconcile(&registry, &price, 9)
            .records
            .iter()
            .map(|r| r.key.to_string())
            .collect();
        assert_eq!(keys, vec!["333333333", "111111111", "222222222"]);
    }

    #[test]
    fn test_registry_value_wins_on_collision() {
        let registry = table(
            "registro_ms",
            &[&[("registro_ms", text("123456789")), ("produto", text("REGISTRO"))]],
        );
        let price = table(
            "registro_cmed",
            &[&[("registro_cmed", text("123456789")), ("produto", text("PRECO"))]],
        );
        let result = reconcile(&registry, &price, 9);
        assert_eq!(result.records[0].get("produto"), Some(&text("REGISTRO")));
    }

    #[test]
    fn test_no_matches_is_empty_not_error() {
        let registry = table("registro_ms", &[&[("registro_ms", text("123456789"))]]);
        let price = table("registro_cmed", &[]);
        let result = reconcile(&registry, &price, 9);
        assert!(result.records.is_empty());
        assert_eq!(result.stats.unmatched, 1);
    }

    #[test]
    fn test_registry_only_marks_price_fields_unavailable() {
        let registry = table(
            "registro_ms",
            &[
                &[("registro_ms", text("1234567890")), ("principio_ativo", text("DIPIRONA"))],
                &[("registro_ms", text("12")), ("principio_ativo", text("X"))],
            ],
        );
        let price_fields = vec!["pmc_0".to_string(), "principio_ativo".to_string()];
        let result = registry_only(&registry, &price_fields, 9);

        assert_eq!(result.records.len(), 1);
        let record = &result.records[0];
        assert_eq!(record.get("pmc_0"), Some(&Value::NotAvailable));
        assert_eq!(record.get("principio_ativo"), Some(&text("DIPIRONA")));
        assert_eq!(result.stats.registry_unkeyed, 1);
        assert_eq!(result.stats.matched, 0);
    }
}
