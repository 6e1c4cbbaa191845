//! zitadelle CLI - runs test cases and reports their results

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use zitadelle_testing::ReporterKind;

mod config;
mod demo;

use config::{CliConfig, DEFAULT_CONFIG_FILE};
use demo::Suite;

/// zitadelle - test registration and execution engine
#[derive(Parser)]
#[command(name = "zitadelle")]
#[command(about = "Run zitadelle test cases")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bundled demonstration cases
    Demo {
        /// Which case to run
        #[arg(short, long, value_enum, default_value = "all")]
        suite: Suite,
        /// Skip tests carrying this tag (repeatable)
        #[arg(short = 'x', long = "exclude-tag")]
        exclude_tags: Vec<String>,
        /// Reporter (console, json)
        #[arg(short, long)]
        format: Option<ReporterKind>,
    },

    /// Write a default configuration file
    InitConfig {
        /// Output path
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Demo {
            suite,
            exclude_tags,
            format,
        } => demo_command(cli.config.as_deref(), cli.verbose, suite, exclude_tags, format),
        Commands::InitConfig { output } => init_config_command(&output),
    };

    match result {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn demo_command(
    config_path: Option<&Path>,
    verbose: bool,
    suite: Suite,
    exclude_tags: Vec<String>,
    format: Option<ReporterKind>,
) -> Result<()> {
    let mut config = CliConfig::load(config_path)?;
    config.apply_overrides(verbose, exclude_tags, format);
    debug!(?config, "effective configuration");

    demo::run(suite, &config.runner)
}

fn init_config_command(output: &Path) -> Result<()> {
    CliConfig::default().save(output)?;
    println!("{} {}", "Wrote".green(), output.display());
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
