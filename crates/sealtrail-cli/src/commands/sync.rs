//! `sealtrail sync`: apply witness statuses from a chain snapshot.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use sealtrail_core::config::StashConfig;
use sealtrail_core::resolver::SnapshotResolver;

use super::{open_stash, runtime};

/// Arguments for `sealtrail sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Chain snapshot (JSON) carrying witness statuses
    #[arg(short, long)]
    pub resolver: PathBuf,
}

/// Feeds every witness status in the snapshot to every contract.
pub fn run(config: StashConfig, args: &SyncArgs) -> Result<()> {
    let snapshot = SnapshotResolver::from_file(&args.resolver)
        .with_context(|| format!("failed to load chain snapshot {}", args.resolver.display()))?;
    let updates = snapshot.statuses();

    let stash = open_stash(config)?;
    let reports = runtime()?
        .block_on(stash.sync_all(&updates))
        .context("failed to apply witness statuses")?;

    if reports.is_empty() {
        println!("No changes ({} status update(s) applied)", updates.len());
        return Ok(());
    }
    for (contract_id, report) in reports {
        println!("Contract {contract_id}");
        for opid in &report.promoted {
            println!("  final      {opid}");
        }
        for opid in &report.retracted {
            println!("  retracted  {opid}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = SyncArgs {
            resolver: dir.path().join("absent.json"),
        };
        let err = run(StashConfig::default(), &args).unwrap_err();
        assert!(err.to_string().contains("chain snapshot"));
    }

    #[test]
    fn empty_stash_has_nothing_to_sync() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        std::fs::write(&path, SnapshotResolver::default().to_json()).unwrap();

        run(StashConfig::default(), &SyncArgs { resolver: path }).unwrap();
    }
}
