//! Initialize a new medunify project

use anyhow::{Context, Result};
use medunify_core::config::CONFIG_FILE;
use std::fs;
use std::path::Path;

/// Run the init command
pub fn run(path: &str, name: Option<&str>) -> Result<()> {
    let project_dir = Path::new(path);

    // Create directory if it doesn't exist
    if !project_dir.exists() {
        fs::create_dir_all(project_dir)
            .with_context(|| format!("Failed to create {}", project_dir.display()))?;
    }

    // Get absolute path for deriving name
    let abs_path = project_dir.canonicalize()?;

    // Derive project name from directory name if not provided
    let project_name = match name {
        Some(n) => n.to_string(),
        None => abs_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("Could not determine project name from path"))?,
    };

    // Check if already initialized
    if project_dir.join(CONFIG_FILE).exists() {
        anyhow::bail!(
            "Directory '{}' already contains a {}",
            project_dir.display(),
            CONFIG_FILE
        );
    }

    tracing::info!("Creating new medunify project: {}", project_name);

    fs::create_dir_all(project_dir.join("dados_brutos"))?;

    let config = format!(
        r#"# medunify project configuration
name: {project_name}
raw_dir: dados_brutos

# ANVISA open-data registry, downloaded under a fixed name
registry:
  filename: DADOS_ABERTOS_MEDICAMENTOS.csv
  delimiter: ";"
  encoding: latin1
  profile: anvisa

# CMED price list; the most recently modified spreadsheet wins
price:
  extensions: [xls, xlsx]
  profile: cmed
  header:
    scan:
      markers: [registro, ean, apresentacao]
      max_rows: 100
      min_hits: 2

join:
  prefix_len: 9

# Keep producing registry rows when no price list can be read
degraded:
  enabled: true
  sentinel: "N/D"

output:
  type: csv
  path: dados_processados/medicamentos_unificados.csv
  delimiter: ";"
  bom: true
"#
    );
    fs::write(project_dir.join(CONFIG_FILE), config)?;

    let gitignore = r#"# Source downloads and generated tables
dados_brutos/
dados_processados/
"#;
    fs::write(project_dir.join(".gitignore"), gitignore)?;

    tracing::info!(
        "✓ Created project '{}' at {}",
        project_name,
        abs_path.display()
    );
    tracing::info!("");
    tracing::info!("Next steps:");
    if path != "." {
        tracing::info!("  cd {}", project_dir.display());
    }
    tracing::info!("  place DADOS_ABERTOS_MEDICAMENTOS.csv and the CMED spreadsheet in dados_brutos/");
    tracing::info!("  medunify validate    # Check header resolution");
    tracing::info!("  medunify run         # Build the unified table");

    Ok(())
}
