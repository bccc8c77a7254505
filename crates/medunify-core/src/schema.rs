//! Target schemas and header projection
//!
//! Each source is projected onto a small set of semantic fields. How a field
//! is found among the publisher's headers is declared as data, so a new header
//! phrasing is absorbed by editing a profile rather than code.
//!
//! # Example
//!
//! ```yaml
//! key: registro_cmed
//! fields:
//!   - name: registro_cmed
//!     kind: identifier
//!     exact: [REGISTRO]
//!   - name: apresentacao
//!     exact: ["APRESENTAÇÃO"]
//!     fallback: apresenta
//!   - name: pmc_sem_impostos
//!     kind: decimal
//!     exact: [PMC Sem Impostos]
//!     required: false
//! ```
//!
//! Candidates and fallback tokens go through [`normalize_label`] before
//! matching, so they can be copied verbatim from the publisher's header row.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::clean::{DecimalFormat, clean_decimal, clean_identifier, clean_text};
use crate::error::{Error, Result};
use crate::locate::SourceKind;
use crate::normalize::{NormalizedTable, normalize_label};
use crate::record::{CanonicalRecord, CanonicalTable, Value};
use crate::table::Cell;

/// Name of the built-in registry profile
pub const ANVISA_PROFILE: &str = "anvisa";
/// Name of the built-in price profile
pub const CMED_PROFILE: &str = "cmed";

/// How a field's raw cells are cleaned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Digits only (registration numbers, CNPJ, GGREM codes)
    Identifier,
    /// Trimmed, upper-cased free text
    #[default]
    Text,
    /// Locale-formatted decimal (prices)
    Decimal,
}

/// Resolution rule for one semantic field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Semantic field name used in the output
    pub name: String,

    /// Cleaning applied to the field
    #[serde(default)]
    pub kind: FieldKind,

    /// Header phrasings that match exactly after normalization, in priority
    /// order. When empty, the field name itself is the only candidate.
    #[serde(default)]
    pub exact: Vec<String>,

    /// Substring looked for when no exact candidate matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,

    /// Whether projection fails when the field cannot be resolved
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl FieldRule {
    /// A required text field matched by the given header phrasings.
    pub fn new(name: &str, kind: FieldKind, exact: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind,
            exact: exact.iter().map(|s| s.to_string()).collect(),
            fallback: None,
            required: true,
        }
    }

    /// Add a substring fallback.
    pub fn with_fallback(mut self, token: &str) -> Self {
        self.fallback = Some(token.to_string());
        self
    }

    /// Mark the field as optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    fn normalized_candidates(&self) -> Vec<String> {
        if self.exact.is_empty() {
            vec![normalize_label(&self.name)]
        } else {
            self.exact.iter().map(|c| normalize_label(c)).collect()
        }
    }

    fn normalized_fallback(&self) -> Option<String> {
        self.fallback
            .as_deref()
            .map(normalize_label)
            .filter(|t| !t.is_empty())
    }
}

/// The semantic fields projected out of one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSchema {
    /// Identifier field the join key is derived from
    pub key: String,
    /// Field rules, in output order
    pub fields: Vec<FieldRule>,
}

impl TargetSchema {
    /// Field names in schema order.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Rule for `name`, if declared.
    pub fn field(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check internal consistency: unique names and a required identifier key.
    pub fn validate(&self, profile: &str) -> Result<()> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(invalid(format!(
                    "profile '{profile}' declares field '{}' twice",
                    field.name
                )));
            }
        }
        let key = self.field(&self.key).ok_or_else(|| {
            invalid(format!(
                "profile '{profile}' key '{}' is not a declared field",
                self.key
            ))
        })?;
        if key.kind != FieldKind::Identifier || !key.required {
            return Err(invalid(format!(
                "profile '{profile}' key '{}' must be a required identifier field",
                self.key
            )));
        }
        Ok(())
    }
}

fn invalid(message: String) -> Error {
    Error::ConfigInvalid { message }
}

/// How a field was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// An exact candidate matched
    Exact,
    /// Only the substring fallback matched
    Fallback,
}

/// A field resolved to a source column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedField {
    /// Semantic field name
    pub name: String,
    /// Cleaning applied to the field
    #[serde(skip)]
    pub kind: FieldKind,
    /// Normalized label of the matched column
    pub label: String,
    /// Column position in the source table
    pub index: usize,
    /// Whether the match was exact or via fallback
    pub matched_by: MatchKind,
}

/// Result of projecting a header row onto a target schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    /// Source the headers came from
    pub source: SourceKind,
    /// Identifier field the join key is derived from
    pub key_field: String,
    /// Resolved fields, in schema order; unresolved optional fields are absent
    pub fields: Vec<ResolvedField>,
}

/// Resolve every field of `schema` against a normalized label set.
///
/// Per field, exact candidates are tried first (first matching column wins).
/// Only fields without an exact match use their fallback substring, and a
/// fallback never picks a column another field matched exactly. Fails with
/// [`Error::SchemaResolution`] listing every unresolved required field.
pub fn project(labels: &[String], schema: &TargetSchema, source: SourceKind) -> Result<Projection> {
    let mut resolved: BTreeMap<usize, (usize, MatchKind)> = BTreeMap::new();
    let mut claimed: HashSet<usize> = HashSet::new();

    for (field_idx, rule) in schema.fields.iter().enumerate() {
        let hit = rule.normalized_candidates().iter().find_map(|candidate| {
            labels
                .iter()
                .position(|label| !label.is_empty() && label == candidate)
        });
        if let Some(column) = hit {
            resolved.insert(field_idx, (column, MatchKind::Exact));
            claimed.insert(column);
        }
    }

    for (field_idx, rule) in schema.fields.iter().enumerate() {
        if resolved.contains_key(&field_idx) {
            continue;
        }
        let Some(token) = rule.normalized_fallback() else {
            continue;
        };
        let hit = labels
            .iter()
            .enumerate()
            .find(|(i, label)| !claimed.contains(i) && label.contains(token.as_str()))
            .map(|(i, _)| i);
        if let Some(column) = hit {
            tracing::warn!(
                source = %source,
                field = %rule.name,
                label = %labels[column],
                "field resolved through substring fallback"
            );
            resolved.insert(field_idx, (column, MatchKind::Fallback));
            claimed.insert(column);
        }
    }

    let missing: Vec<String> = schema
        .fields
        .iter()
        .enumerate()
        .filter(|(i, rule)| rule.required && !resolved.contains_key(i))
        .map(|(_, rule)| rule.name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(Error::SchemaResolution {
            source_kind: source,
            missing,
        });
    }

    let fields = resolved
        .into_iter()
        .map(|(field_idx, (index, matched_by))| {
            let rule = &schema.fields[field_idx];
            tracing::debug!(source = %source, field = %rule.name, label = %labels[index], ?matched_by, "field resolved");
            ResolvedField {
                name: rule.name.clone(),
                kind: rule.kind,
                label: labels[index].clone(),
                index,
                matched_by,
            }
        })
        .collect();

    Ok(Projection {
        source,
        key_field: schema.key.clone(),
        fields,
    })
}

impl Projection {
    /// Resolved field names, in schema order.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Project and clean every row of `table`.
    pub fn apply(&self, table: &NormalizedTable, decimal: &DecimalFormat) -> CanonicalTable {
        let records = table
            .rows
            .iter()
            .map(|row| {
                self.fields
                    .iter()
                    .map(|field| {
                        let cell = row.get(field.index).unwrap_or(&Cell::Empty);
                        (field.name.as_str(), clean_cell(cell, field.kind, decimal))
                    })
                    .collect::<CanonicalRecord>()
            })
            .collect();

        CanonicalTable {
            key_field: self.key_field.clone(),
            field_names: self.field_names(),
            records,
        }
    }
}

fn clean_cell(cell: &Cell, kind: FieldKind, decimal: &DecimalFormat) -> Value {
    match kind {
        FieldKind::Identifier => {
            let digits = clean_identifier(cell);
            if digits.is_empty() {
                Value::Missing
            } else {
                Value::Text(digits)
            }
        }
        FieldKind::Text => clean_text(cell),
        FieldKind::Decimal => clean_decimal(cell, decimal),
    }
}

/// Built-in profile for the ANVISA open-data registry export.
pub fn anvisa_schema() -> TargetSchema {
    use FieldKind::{Identifier, Text};
    TargetSchema {
        key: "registro_ms".to_string(),
        fields: vec![
            FieldRule::new("registro_ms", Identifier, &["NUMERO_REGISTRO_PRODUTO", "NUMERO_REGISTRO"])
                .with_fallback("numeroregistro"),
            FieldRule::new("classe_terapeutica", Text, &["CLASSE_TERAPEUTICA"])
                .with_fallback("classeterapeutica"),
            FieldRule::new("principio_ativo", Text, &["PRINCIPIO_ATIVO"]).with_fallback("principioativo"),
            FieldRule::new("nome_produto", Text, &["NOME_PRODUTO"]).optional(),
            FieldRule::new("empresa_detentora_registro", Text, &["EMPRESA_DETENTORA_REGISTRO"])
                .with_fallback("empresadetentora")
                .optional(),
            FieldRule::new("situacao_registro", Text, &["SITUACAO_REGISTRO"]).optional(),
        ],
    }
}

/// ICMS rates published as PMC columns, and whether an `ALC` variant exists.
const PMC_RATES: &[(&str, bool)] = &[
    ("0", false),
    ("12", true),
    ("17", true),
    ("17,5", true),
    ("18", true),
    ("19", true),
    ("19,5", false),
    ("20", true),
    ("20,5", true),
    ("21", true),
    ("22", true),
    ("22,5", true),
    ("23", true),
];

/// Built-in profile for the CMED consumer price list.
pub fn cmed_schema() -> TargetSchema {
    use FieldKind::{Decimal, Identifier, Text};
    let mut fields = vec![
        FieldRule::new("laboratorio", Text, &["LABORATÓRIO"]).with_fallback("laboratorio"),
        FieldRule::new("cnpj", Identifier, &["CNPJ"]).optional(),
        FieldRule::new("registro_cmed", Identifier, &["REGISTRO"]).with_fallback("registro"),
        FieldRule::new("produto", Text, &["PRODUTO"]),
        FieldRule::new("apresentacao", Text, &["APRESENTAÇÃO"]).with_fallback("apresenta"),
        FieldRule::new(
            "tipo_produto",
            Text,
            &["TIPO DE PRODUTO (STATUS DO PRODUTO)", "TIPO DE PRODUTO"],
        )
        .with_fallback("tipodeproduto")
        .optional(),
        FieldRule::new("tarja", Text, &["TARJA"]).optional(),
        FieldRule::new("codigo_ggrem", Identifier, &["CÓDIGO GGREM"])
            .with_fallback("ggrem")
            .optional(),
        FieldRule::new("regime_de_preco", Text, &["REGIME DE PREÇO"])
            .with_fallback("regimedepreco")
            .optional(),
        FieldRule::new("pmc_sem_impostos", Decimal, &["PMC Sem Impostos"]).optional(),
    ];

    for (rate, has_alc) in PMC_RATES {
        let suffix = rate.replace(',', "_");
        fields.push(
            FieldRule::new(&format!("pmc_{suffix}"), Decimal, &[&format!("PMC {rate} %")]).optional(),
        );
        if *has_alc {
            fields.push(
                FieldRule::new(
                    &format!("pmc_{suffix}_alc"),
                    Decimal,
                    &[&format!("PMC {rate} % ALC")],
                )
                .optional(),
            );
        }
    }

    fields.push(
        FieldRule::new("restricao_hospitalar", Text, &["RESTRIÇÃO HOSPITALAR"])
            .with_fallback("restricaohospitalar")
            .optional(),
    );
    fields.push(
        FieldRule::new(
            "lista_concessao_credito_tributario",
            Text,
            &["LISTA DE CONCESSÃO DE CRÉDITO TRIBUTÁRIO (PIS/COFINS)"],
        )
        .with_fallback("listadeconcessao")
        .optional(),
    );

    TargetSchema {
        key: "registro_cmed".to_string(),
        fields,
    }
}

/// Built-in profiles by name.
pub fn builtin_profiles() -> BTreeMap<String, TargetSchema> {
    BTreeMap::from([
        (ANVISA_PROFILE.to_string(), anvisa_schema()),
        (CMED_PROFILE.to_string(), cmed_schema()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_labels;
    use crate::table::RawTable;

    fn labels(raw: &[&str]) -> Vec<String> {
        normalize_labels(&raw.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    fn small_schema() -> TargetSchema {
        TargetSchema {
            key: "registro".to_string(),
            fields: vec![
                FieldRule::new("registro", FieldKind::Identifier, &["REGISTRO"]),
                FieldRule::new("apresentacao", FieldKind::Text, &["APRESENTAÇÃO"])
                    .with_fallback("apresenta"),
                FieldRule::new("preco", FieldKind::Decimal, &["PMC 0 %"]).optional(),
            ],
        }
    }

    #[test]
    fn test_parse_field_rule_defaults() {
        let yaml = r#"
name: produto
"#;
        let rule: FieldRule = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.kind, FieldKind::Text);
        assert!(rule.required);
        assert!(rule.exact.is_empty());
        assert_eq!(rule.normalized_candidates(), vec!["produto"]);
    }

    #[test]
    fn test_parse_target_schema() {
        let yaml = r#"
key: registro_cmed
fields:
  - name: registro_cmed
    kind: identifier
    exact: [REGISTRO]
  - name: apresentacao
    exact: ["APRESENTAÇÃO"]
    fallback: apresenta
  - name: pmc_sem_impostos
    kind: decimal
    exact: [PMC Sem Impostos]
    required: false
"#;
        let schema: TargetSchema = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(schema.fields.len(), 3);
        assert_eq!(schema.fields[2].kind, FieldKind::Decimal);
        assert!(!schema.fields[2].required);
        schema.validate("custom").unwrap();
    }

    #[test]
    fn test_exact_match_preferred_over_fallback() {
        let cols = labels(&["APRESENTAÇÃO ANTIGA", "REGISTRO", "APRESENTAÇÃO"]);
        let projection = project(&cols, &small_schema(), SourceKind::Price).unwrap();
        let field = &projection.fields[1];
        assert_eq!(field.name, "apresentacao");
        assert_eq!(field.index, 2);
        assert_eq!(field.matched_by, MatchKind::Exact);
    }

    #[test]
    fn test_fallback_used_when_exact_missing() {
        let cols = labels(&["Registro", "Apresentação do produto"]);
        let projection = project(&cols, &small_schema(), SourceKind::Price).unwrap();
        assert_eq!(projection.fields.len(), 2);
        assert_eq!(projection.fields[1].label, "apresentacaodoproduto");
        assert_eq!(projection.fields[1].matched_by, MatchKind::Fallback);
    }

    #[test]
    fn test_fallback_skips_exactly_claimed_columns() {
        let schema = TargetSchema {
            key: "registro".to_string(),
            fields: vec![
                FieldRule::new("registro_antigo", FieldKind::Identifier, &["REG ANTIGO"])
                    .with_fallback("registro")
                    .optional(),
                FieldRule::new("registro", FieldKind::Identifier, &["REGISTRO"]),
            ],
        };
        let cols = labels(&["REGISTRO", "REGISTRO ANTIGO"]);
        let projection = project(&cols, &schema, SourceKind::Price).unwrap();
        let antigo = projection.fields.iter().find(|f| f.name == "registro_antigo").unwrap();
        assert_eq!(antigo.index, 1);
        let registro = projection.fields.iter().find(|f| f.name == "registro").unwrap();
        assert_eq!(registro.index, 0);
    }

    #[test]
    fn test_missing_required_fields_are_enumerated() {
        let cols = labels(&["PRODUTO", "EAN 1"]);
        let err = project(&cols, &small_schema(), SourceKind::Price).unwrap_err();
        match err {
            Error::SchemaResolution {
                source_kind,
                missing,
            } => {
                assert_eq!(source_kind, SourceKind::Price);
                assert_eq!(missing, vec!["registro", "apresentacao"]);
            }
            other => panic!("Expected SchemaResolution, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_labels_never_resolve() {
        let schema = TargetSchema {
            key: "registro".to_string(),
            fields: vec![
                FieldRule::new("registro", FieldKind::Identifier, &["REGISTRO"]),
                FieldRule::new("vazio", FieldKind::Text, &["***"]).optional(),
            ],
        };
        let cols = labels(&["REGISTRO", "---"]);
        let projection = project(&cols, &schema, SourceKind::Registry).unwrap();
        assert_eq!(projection.field_names(), vec!["registro"]);
    }

    #[test]
    fn test_optional_field_absent_is_omitted() {
        let cols = labels(&["REGISTRO", "APRESENTAÇÃO"]);
        let projection = project(&cols, &small_schema(), SourceKind::Price).unwrap();
        assert_eq!(projection.field_names(), vec!["registro", "apresentacao"]);
    }

    #[test]
    fn test_apply_cleans_by_kind() {
        let raw = RawTable::new(
            vec!["REGISTRO".into(), "APRESENTAÇÃO".into(), "PMC 0 %".into()],
            vec![
                vec![
                    Cell::from_text("1.2345.6789.001-1"),
                    Cell::from_text("  10 mg com rev  "),
                    Cell::from_text("1.234,50"),
                ],
                vec![Cell::from_text("sem registro"), Cell::from_text("x"), Cell::from_text("n/a")],
            ],
        );
        let table = NormalizedTable::from_raw(raw);
        let projection = project(&table.labels, &small_schema(), SourceKind::Price).unwrap();
        let canonical = projection.apply(&table, &DecimalFormat::default());

        assert_eq!(canonical.key_field, "registro");
        assert_eq!(canonical.len(), 2);
        let first = &canonical.records[0];
        assert_eq!(first.get("registro"), Some(&Value::Text("1234567890011".into())));
        assert_eq!(first.get("apresentacao"), Some(&Value::Text("10 MG COM REV".into())));
        assert_eq!(first.get("preco"), Some(&Value::Decimal(1234.5)));

        let second = &canonical.records[1];
        assert_eq!(second.get("registro"), Some(&Value::Missing));
        assert_eq!(second.get("preco"), Some(&Value::Missing));
        assert_eq!(canonical.key_of(second), "");
    }

    #[test]
    fn test_builtin_profiles_are_valid() {
        for (name, schema) in builtin_profiles() {
            schema.validate(&name).unwrap();
        }
    }

    #[test]
    fn test_cmed_profile_resolves_publisher_headers() {
        let cols = labels(&[
            "SUBSTÂNCIA",
            "CNPJ",
            "LABORATÓRIO",
            "CÓDIGO GGREM",
            "REGISTRO",
            "EAN 1",
            "PRODUTO",
            "APRESENTAÇÃO",
            "CLASSE TERAPÊUTICA",
            "TIPO DE PRODUTO (STATUS DO PRODUTO)",
            "REGIME DE PREÇO",
            "PF Sem Impostos",
            "PMC Sem Impostos",
            "PMC 0 %",
            "PMC 17,5 %",
            "PMC 17,5 %  ALC",
            "PMC 17 %",
            "RESTRIÇÃO HOSPITALAR",
            "LISTA DE CONCESSÃO DE CRÉDITO TRIBUTÁRIO (PIS/COFINS)",
            "TARJA",
        ]);
        let projection = project(&cols, &cmed_schema(), SourceKind::Price).unwrap();
        let by_name = |name: &str| {
            projection
                .fields
                .iter()
                .find(|f| f.name == name)
                .map(|f| f.label.clone())
        };
        assert_eq!(by_name("registro_cmed").as_deref(), Some("registro"));
        assert_eq!(by_name("pmc_17_5").as_deref(), Some("pmc175"));
        assert_eq!(by_name("pmc_17_5_alc").as_deref(), Some("pmc175alc"));
        assert_eq!(by_name("pmc_17").as_deref(), Some("pmc17"));
        assert_eq!(by_name("pmc_12"), None);
        assert!(projection.fields.iter().all(|f| f.matched_by == MatchKind::Exact));
    }

    #[test]
    fn test_anvisa_profile_resolves_open_data_headers() {
        let cols = labels(&[
            "TIPO_PRODUTO",
            "NOME_PRODUTO",
            "DATA_FINALIZACAO_PROCESSO",
            "CATEGORIA_REGULATORIA",
            "NUMERO_REGISTRO_PRODUTO",
            "DATA_VENCIMENTO_REGISTRO",
            "NUMERO_PROCESSO",
            "CLASSE_TERAPEUTICA",
            "EMPRESA_DETENTORA_REGISTRO",
            "SITUACAO_REGISTRO",
            "PRINCIPIO_ATIVO",
        ]);
        let projection = project(&cols, &anvisa_schema(), SourceKind::Registry).unwrap();
        assert_eq!(projection.fields.len(), 6);
        assert_eq!(projection.fields[0].index, 4);
    }

    #[test]
    fn test_validate_rejects_non_identifier_key() {
        let schema = TargetSchema {
            key: "produto".to_string(),
            fields: vec![FieldRule::new("produto", FieldKind::Text, &["PRODUTO"])],
        };
        assert!(matches!(
            schema.validate("bad"),
            Err(Error::ConfigInvalid { .. })
        ));
    }
}
