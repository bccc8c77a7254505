//! Medunify CLI
//!
//! Runs the ANVISA/CMED reconciliation and inspects project setup.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// Medunify - medicine registry and price reconciliation
#[derive(Parser)]
#[command(name = "medunify")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "medunify.yaml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new medunify project
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,

        /// Project name (defaults to directory name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Build the unified table
    Run {
        /// Write the table here instead of the configured output path
        #[arg(short, long)]
        output: Option<String>,

        /// Output format (overrides the configured sink type)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Write the run report as JSON to this path
        #[arg(long)]
        report: Option<String>,

        /// Fail instead of continuing without price data
        #[arg(long)]
        strict: bool,
    },

    /// Resolve both sources' headers without reconciling
    Validate,

    /// Show project status
    Status,
}

/// Output formats selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Delimited text
    Csv,
    /// One JSON object per line
    Jsonl,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Init { path, name } => {
            commands::init::run(&path, name.as_deref())?;
        }
        Commands::Run {
            output,
            format,
            report,
            strict,
        } => {
            let options = commands::run::RunOptions {
                output,
                format,
                report,
                strict,
            };
            commands::run::run(&cli.config, &options)?;
        }
        Commands::Validate => {
            commands::validate::run(&cli.config)?;
        }
        Commands::Status => {
            commands::status::run(&cli.config)?;
        }
    }

    Ok(())
}
