//! Show project status command

use anyhow::{Context, Result};
use medunify_core::{Config, SourceKind};

/// Run the status command
pub fn run(config_path: &str) -> Result<()> {
    tracing::info!("Project status");

    let config = Config::load(config_path).context("Failed to load configuration")?;
    let project = &config.project;
    let output = config.output();

    println!("Project:   {}", project.name);
    println!("Base path: {}", config.base_path.display());
    println!("Raw data:  {}", config.raw_dir().display());
    println!(
        "Registry:  {} ({}, delimiter '{}', profile {})",
        project.registry.filename,
        project.registry.encoding,
        project.registry.delimiter,
        project.registry.profile
    );
    println!(
        "Price:     *.{{{}}} (profile {})",
        project.price.extensions.join(","),
        project.price.profile
    );
    println!("Join:      first {} digits", project.join.prefix_len);
    if project.degraded.enabled {
        println!("Degraded:  enabled (sentinel \"{}\")", project.degraded.sentinel);
    } else {
        println!("Degraded:  disabled");
    }
    println!("Output:    {} ({})", output.path().display(), output.format());

    let locator = config.locator();
    println!();
    for kind in [SourceKind::Registry, SourceKind::Price] {
        match locator.locate(kind) {
            Ok(located) => println!(
                "{:<9} {} (modified {})",
                format!("{kind}:"),
                located.path.display(),
                located.modified.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            Err(err) => println!("{:<9} {}", format!("{kind}:"), err),
        }
    }

    Ok(())
}
