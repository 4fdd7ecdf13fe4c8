//! sealtrail - client-side validation of single-use-seal contracts
//!
//! Operator CLI over a local stash: inspect and import consignments, export
//! histories, query contract state and apply chain status snapshots.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sealtrail_core::config::StashConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

/// sealtrail - client-side validation of single-use-seal contracts
#[derive(Parser, Debug)]
#[command(name = "sealtrail")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to stash configuration file
    #[arg(short, long, default_value = "sealtrail.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    // === Consignments ===
    /// Decode a consignment file and summarize it without validating
    Inspect(commands::consignment::InspectArgs),

    /// Validate a consignment and merge it into the stash
    Import(commands::consignment::ImportArgs),

    /// Write the history of a set of seals to a consignment file
    Export(commands::consignment::ExportArgs),

    // === Contract state ===
    /// Show the state of a contract
    State(commands::state::StateArgs),

    /// List contracts in the stash
    #[command(alias = "ls")]
    Contracts,

    /// List registered schemas
    Schemas,

    // === Chain status ===
    /// Apply witness statuses from a chain snapshot to every contract
    Sync(commands::sync::SyncArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Inspect(args) => commands::consignment::inspect(&args),
        Commands::Import(args) => commands::consignment::import(config, &args),
        Commands::Export(args) => commands::consignment::export(config, &args),
        Commands::State(args) => commands::state::show(config, &args),
        Commands::Contracts => commands::state::contracts(config),
        Commands::Schemas => commands::state::schemas(config),
        Commands::Sync(args) => commands::sync::run(config, &args),
    }
}

/// Loads the stash configuration, falling back to defaults when the file is
/// absent.
fn load_config(path: &Path) -> Result<StashConfig> {
    if !path.exists() {
        return Ok(StashConfig::default());
    }
    StashConfig::from_file(path)
        .with_context(|| format!("failed to load config from {}", path.display()))
}
