//! Configuration parsing and validation
//!
//! This module handles loading and validating the `medunify.yaml` project
//! file. Every section has defaults, so an empty file describes the standard
//! ANVISA + CMED layout:
//!
//! ```yaml
//! name: medicamentos
//! raw_dir: dados_brutos
//! registry:
//!   filename: DADOS_ABERTOS_MEDICAMENTOS.csv
//!   delimiter: ";"
//!   encoding: latin1
//!   profile: anvisa
//! price:
//!   extensions: [xls, xlsx]
//!   profile: cmed
//!   header:
//!     scan: { markers: [registro, ean, apresentacao], max_rows: 100, min_hits: 2 }
//! join:
//!   prefix_len: 9
//! degraded:
//!   enabled: true
//!   sentinel: "N/D"
//! output:
//!   type: csv
//!   path: dados_processados/medicamentos_unificados.csv
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::clean::DecimalFormat;
use crate::error::{Error, Result};
use crate::locate::SourceLocator;
use crate::schema::{ANVISA_PROFILE, CMED_PROFILE, TargetSchema, builtin_profiles};
use crate::sink::SinkConfig;
use crate::sources::{HeaderLocator, HeaderScan, PriceReadOptions, encoding_for_label};

/// Name of the project file looked up inside a directory
pub const CONFIG_FILE: &str = "medunify.yaml";

/// Root project configuration from `medunify.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    #[serde(default = "default_name")]
    pub name: String,

    /// Directory holding the raw source files
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,

    /// Registry source settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Price source settings
    #[serde(default)]
    pub price: PriceConfig,

    /// Join settings
    #[serde(default)]
    pub join: JoinConfig,

    /// Behaviour when the price source is unavailable
    #[serde(default)]
    pub degraded: DegradedConfig,

    /// Number format of price cells stored as text
    #[serde(default)]
    pub decimal: DecimalFormat,

    /// Declared output columns, in order. Defaults to every registry field
    /// followed by every price field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,

    /// Additional or overriding schema profiles, by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profiles: BTreeMap<String, TargetSchema>,

    /// Where the unified table is written
    #[serde(default)]
    pub output: SinkConfig,
}

fn default_name() -> String {
    "medicamentos".to_string()
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("dados_brutos")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            raw_dir: default_raw_dir(),
            registry: RegistryConfig::default(),
            price: PriceConfig::default(),
            join: JoinConfig::default(),
            degraded: DegradedConfig::default(),
            decimal: DecimalFormat::default(),
            columns: None,
            profiles: BTreeMap::new(),
            output: SinkConfig::default(),
        }
    }
}

/// Registry source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// File name inside the raw directory
    #[serde(default = "default_registry_filename")]
    pub filename: String,

    /// Field delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Text encoding label
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// Schema profile name
    #[serde(default = "default_registry_profile")]
    pub profile: String,
}

fn default_registry_filename() -> String {
    "DADOS_ABERTOS_MEDICAMENTOS.csv".to_string()
}

fn default_delimiter() -> char {
    ';'
}

fn default_encoding() -> String {
    "latin1".to_string()
}

fn default_registry_profile() -> String {
    ANVISA_PROFILE.to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            filename: default_registry_filename(),
            delimiter: default_delimiter(),
            encoding: default_encoding(),
            profile: default_registry_profile(),
        }
    }
}

/// Price source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceConfig {
    /// File extensions considered price tables
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Schema profile name
    #[serde(default = "default_price_profile")]
    pub profile: String,

    /// Sheet name; the first sheet when unset
    #[serde(default)]
    pub sheet: Option<String>,

    /// Field delimiter when the price table is a `.csv` file
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Header row location
    #[serde(default)]
    pub header: HeaderConfig,
}

fn default_extensions() -> Vec<String> {
    vec!["xls".to_string(), "xlsx".to_string()]
}

fn default_price_profile() -> String {
    CMED_PROFILE.to_string()
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            profile: default_price_profile(),
            sheet: None,
            delimiter: default_delimiter(),
            header: HeaderConfig::default(),
        }
    }
}

/// Header location: a content scan (default) or a fixed row offset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeaderConfig {
    /// Scan settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan: Option<HeaderScan>,

    /// Number of rows above the header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

impl HeaderConfig {
    /// The configured locator.
    pub fn locator(&self) -> HeaderLocator {
        match (&self.scan, self.offset) {
            (_, Some(offset)) => HeaderLocator::Offset(offset),
            (Some(scan), None) => HeaderLocator::Scan(scan.clone()),
            (None, None) => HeaderLocator::default(),
        }
    }
}

/// Join configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinConfig {
    /// Number of leading identifier digits compared
    #[serde(default = "default_prefix_len")]
    pub prefix_len: usize,
}

fn default_prefix_len() -> usize {
    9
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            prefix_len: default_prefix_len(),
        }
    }
}

/// Degraded mode configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedConfig {
    /// Continue with registry-only output when the price source is unavailable
    #[serde(default = "default_degraded_enabled")]
    pub enabled: bool,

    /// Text written for unavailable price values
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
}

fn default_degraded_enabled() -> bool {
    true
}

fn default_sentinel() -> String {
    "N/D".to_string()
}

impl Default for DegradedConfig {
    fn default() -> Self {
        Self {
            enabled: default_degraded_enabled(),
            sentinel: default_sentinel(),
        }
    }
}

/// Main configuration container
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Base path of the project; relative paths resolve against it
    pub base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_project(ProjectConfig::default(), ".")
    }
}

impl Config {
    /// Load configuration from a directory or file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the project directory or a `medunify.yaml` file
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = Config::load("./medicamentos")?;
    /// println!("Raw data in {}", config.raw_dir().display());
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let (config_path, base_path) = if path.is_dir() {
            (path.join(CONFIG_FILE), path.to_path_buf())
        } else {
            (
                path.to_path_buf(),
                path.parent().unwrap_or(Path::new(".")).to_path_buf(),
            )
        };

        if !config_path.is_file() {
            return Err(Error::ConfigNotFound {
                path: config_path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(&config_path)?;
        let project: ProjectConfig = if contents.trim().is_empty() {
            ProjectConfig::default()
        } else {
            serde_yaml::from_str(&contents)?
        };

        Ok(Self::from_project(project, base_path))
    }

    /// Wrap an in-memory project configuration.
    pub fn from_project(project: ProjectConfig, base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        let base_path = if base_path.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            base_path
        };
        Self { project, base_path }
    }

    /// Resolve `path` against the project base unless it is absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    /// Raw-data directory.
    pub fn raw_dir(&self) -> PathBuf {
        self.resolve(&self.project.raw_dir)
    }

    /// Locator for the two raw sources.
    pub fn locator(&self) -> SourceLocator {
        SourceLocator::new(
            self.raw_dir(),
            self.project.registry.filename.clone(),
            &self.project.price.extensions,
        )
    }

    /// Encoding of the registry file.
    pub fn registry_encoding(&self) -> Result<&'static Encoding> {
        encoding_for_label(&self.project.registry.encoding)
    }

    /// Options for the price reader.
    pub fn price_read_options(&self) -> PriceReadOptions {
        PriceReadOptions {
            sheet: self.project.price.sheet.clone(),
            delimiter: self.project.price.delimiter as u8,
            header: self.project.price.header.locator(),
        }
    }

    /// Schema profile by name; configured profiles shadow the built-in ones.
    pub fn profile(&self, name: &str) -> Result<TargetSchema> {
        if let Some(schema) = self.project.profiles.get(name) {
            return Ok(schema.clone());
        }
        builtin_profiles()
            .remove(name)
            .ok_or_else(|| Error::ConfigInvalid {
                message: format!("unknown schema profile '{name}'"),
            })
    }

    /// Schema of the registry source.
    pub fn registry_schema(&self) -> Result<TargetSchema> {
        self.profile(&self.project.registry.profile)
    }

    /// Schema of the price source.
    pub fn price_schema(&self) -> Result<TargetSchema> {
        self.profile(&self.project.price.profile)
    }

    /// Declared output columns.
    pub fn columns(&self) -> Result<Vec<String>> {
        if let Some(columns) = &self.project.columns {
            return Ok(columns.clone());
        }
        let mut columns = self.registry_schema()?.field_names();
        columns.extend(self.price_schema()?.field_names());
        Ok(columns)
    }

    /// Output sink configuration with its path resolved.
    pub fn output(&self) -> SinkConfig {
        let mut output = self.project.output.clone();
        output.set_path(self.resolve(output.path()));
        output
    }

    /// Check the configuration for values that cannot work.
    pub fn validate(&self) -> Result<()> {
        let project = &self.project;

        if project.join.prefix_len == 0 {
            return Err(invalid("join.prefix_len must be at least 1"));
        }
        ensure_ascii_delimiter("registry.delimiter", project.registry.delimiter)?;
        ensure_ascii_delimiter("price.delimiter", project.price.delimiter)?;
        if let SinkConfig::Csv(csv) = &project.output {
            ensure_ascii_delimiter("output.delimiter", csv.delimiter)?;
        }
        self.registry_encoding()?;

        if project.price.extensions.iter().all(|e| e.trim_matches('.').is_empty()) {
            return Err(invalid("price.extensions must list at least one extension"));
        }
        if project.price.header.scan.is_some() && project.price.header.offset.is_some() {
            return Err(invalid("price.header takes either 'scan' or 'offset', not both"));
        }
        if let Some(scan) = &project.price.header.scan {
            if scan.markers.iter().all(|m| m.trim().is_empty()) {
                return Err(invalid("price.header.scan.markers must not be empty"));
            }
            if scan.max_rows == 0 || scan.min_hits == 0 {
                return Err(invalid(
                    "price.header.scan.max_rows and min_hits must be at least 1",
                ));
            }
        }
        if project.decimal.thousands == project.decimal.decimal {
            return Err(invalid(
                "decimal.thousands and decimal.decimal must be different characters",
            ));
        }
        if project.degraded.enabled && project.degraded.sentinel.is_empty() {
            return Err(invalid("degraded.sentinel must not be empty"));
        }

        for (name, schema) in &project.profiles {
            schema.validate(name)?;
        }
        let registry = self.registry_schema()?;
        registry.validate(&project.registry.profile)?;
        let price = self.price_schema()?;
        price.validate(&project.price.profile)?;

        let registry_names: HashSet<String> = registry.field_names().into_iter().collect();
        let shared: Vec<String> = price
            .field_names()
            .into_iter()
            .filter(|n| registry_names.contains(n))
            .collect();
        if !shared.is_empty() {
            return Err(invalid(&format!(
                "profiles '{}' and '{}' both declare: {}",
                project.registry.profile,
                project.price.profile,
                shared.join(", ")
            )));
        }

        if let Some(columns) = &project.columns {
            let mut seen = HashSet::new();
            if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
                return Err(invalid(&format!("column '{dup}' is declared twice")));
            }
        }

        Ok(())
    }
}

fn invalid(message: &str) -> Error {
    Error::ConfigInvalid {
        message: message.to_string(),
    }
}

fn ensure_ascii_delimiter(field: &str, delimiter: char) -> Result<()> {
    if delimiter.is_ascii() {
        Ok(())
    } else {
        Err(invalid(&format!(
            "{field} must be a single ASCII character, got '{delimiter}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, FieldRule};
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r#"
name: test-project
"#;
        let config: ProjectConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.name, "test-project");
        assert_eq!(config.raw_dir, PathBuf::from("dados_brutos"));
        assert_eq!(config.registry.encoding, "latin1");
        assert_eq!(config.join.prefix_len, 9);
        assert!(config.degraded.enabled);
        assert_eq!(config.price.header.locator(), HeaderLocator::default());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
name: test-project
raw_dir: ./raw
registry:
  filename: registro.csv
  delimiter: ","
  encoding: utf-8
price:
  extensions: [csv]
  sheet: Planilha1
  header:
    offset: 41
join:
  prefix_len: 11
degraded:
  enabled: false
  sentinel: "-"
decimal:
  thousands: ","
  decimal: "."
columns: [registro_ms, produto]
output:
  type: jsonl
  path: out/unificado.jsonl
"#;
        let config: ProjectConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.registry.delimiter, ',');
        assert_eq!(config.price.sheet.as_deref(), Some("Planilha1"));
        assert_eq!(config.price.header.locator(), HeaderLocator::Offset(41));
        assert_eq!(config.join.prefix_len, 11);
        assert!(!config.degraded.enabled);
        assert_eq!(config.decimal.decimal, '.');
        assert_eq!(config.columns.as_ref().map(Vec::len), Some(2));
        assert_eq!(config.output.format(), "jsonl");
    }

    #[test]
    fn test_load_from_dir_resolves_paths() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "name: test\nraw_dir: raw\noutput:\n  type: csv\n  path: out/u.csv\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.project.name, "test");
        assert_eq!(config.raw_dir(), dir.path().join("raw"));
        assert_eq!(config.output().path(), dir.path().join("out/u.csv"));
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.yaml");
        std::fs::write(&path, "").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.project, ProjectConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn test_load_missing_config() {
        let dir = TempDir::new().unwrap();
        match Config::load(dir.path()) {
            Err(Error::ConfigNotFound { path }) => assert!(path.ends_with(CONFIG_FILE)),
            other => panic!("Expected ConfigNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_default_columns_follow_profiles() {
        let columns = Config::default().columns().unwrap();
        assert_eq!(&columns[..3], ["registro_ms", "classe_terapeutica", "principio_ativo"]);
        assert!(columns.contains(&"pmc_17_5_alc".to_string()));
        assert_eq!(
            columns.last().map(String::as_str),
            Some("lista_concessao_credito_tributario")
        );
    }

    #[test]
    fn test_configured_profile_shadows_builtin() {
        let mut project = ProjectConfig::default();
        project.profiles.insert(
            CMED_PROFILE.to_string(),
            TargetSchema {
                key: "registro_cmed".to_string(),
                fields: vec![FieldRule::new("registro_cmed", FieldKind::Identifier, &["REG"])],
            },
        );
        let config = Config::from_project(project, ".");
        assert_eq!(config.price_schema().unwrap().fields.len(), 1);
        config.validate().unwrap();
    }

    fn assert_invalid(expected: &str, mutate: impl FnOnce(&mut ProjectConfig)) {
        let mut project = ProjectConfig::default();
        mutate(&mut project);
        match Config::from_project(project, ".").validate() {
            Err(Error::ConfigInvalid { message }) => {
                assert!(message.contains(expected), "{expected}: {message}")
            }
            other => panic!("Expected ConfigInvalid for {expected}, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert_invalid("prefix_len", |p| p.join.prefix_len = 0);
        assert_invalid("encoding", |p| p.registry.encoding = "klingon".into());
        assert_invalid("unknown schema profile", |p| p.price.profile = "bulario".into());
        assert_invalid("both declare", |p| p.price.profile = ANVISA_PROFILE.into());
        assert_invalid("either", |p| {
            p.price.header = HeaderConfig {
                scan: Some(HeaderScan::default()),
                offset: Some(41),
            }
        });
        assert_invalid("ASCII", |p| p.registry.delimiter = '§');
        assert_invalid("declared twice", |p| {
            p.columns = Some(vec!["produto".into(), "produto".into()])
        });
    }

    #[test]
    fn test_validate_rejects_ambiguous_decimal_format() {
        assert_invalid("must be different", |p| p.decimal.thousands = ',');

        let yaml = r#"
decimal:
  thousands: ","
  decimal: "."
"#;
        let project: ProjectConfig = serde_yaml::from_str(yaml).unwrap();
        Config::from_project(project, ".").validate().unwrap();
    }
}
