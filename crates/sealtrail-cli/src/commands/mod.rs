//! CLI command implementations.

use anyhow::{Context, Result};
use sealtrail_core::config::StashConfig;
use sealtrail_core::stash::Stash;

pub mod consignment;
pub mod state;
pub mod sync;

/// Opens the stash described by `config`.
fn open_stash(config: StashConfig) -> Result<Stash> {
    let location = config
        .database
        .as_ref()
        .map_or_else(|| "memory".to_string(), |path| path.display().to_string());
    Stash::open(config).with_context(|| format!("failed to open stash ({location})"))
}

/// Builds the single-threaded runtime commands run their async work on.
fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")
}
