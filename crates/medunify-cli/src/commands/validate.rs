//! Validate configuration and header resolution

use anyhow::{Context, Result};
use medunify_core::schema::MatchKind;
use medunify_core::{Config, Pipeline, SourceKind};

/// Run the validate command
pub fn run(config_path: &str) -> Result<()> {
    tracing::info!("Validating configuration: {}", config_path);

    let config = Config::load(config_path).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    println!("✓ Project: {}", config.project.name);
    println!("✓ Raw data: {}", config.raw_dir().display());

    let pipeline = Pipeline::new(config);
    let mut failed = Vec::new();

    for kind in [SourceKind::Registry, SourceKind::Price] {
        match pipeline.inspect(kind) {
            Ok((located, projection)) => {
                println!("✓ {} source: {}", kind, located.path.display());
                for field in &projection.fields {
                    let how = match field.matched_by {
                        MatchKind::Exact => "exact",
                        MatchKind::Fallback => "fallback",
                    };
                    println!(
                        "    {:<36} <- {} (column {}, {})",
                        field.name, field.label, field.index, how
                    );
                }
            }
            Err(err) => {
                println!("✗ {} source: {}", kind, err);
                failed.push(kind);
            }
        }
    }

    if !failed.is_empty() {
        let names: Vec<String> = failed.iter().map(ToString::to_string).collect();
        anyhow::bail!("Header resolution failed for: {}", names.join(", "));
    }

    println!("✓ Configuration is valid");
    Ok(())
}
