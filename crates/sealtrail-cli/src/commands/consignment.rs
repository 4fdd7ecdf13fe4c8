//! Consignment commands: `inspect`, `import` and `export`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use sealtrail_core::config::StashConfig;
use sealtrail_core::consignment::Consignment;
use sealtrail_core::contract::{ContractId, SealDefinition};
use sealtrail_core::resolver::SnapshotResolver;

use super::{open_stash, runtime};

/// Arguments for `sealtrail inspect`.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Consignment file
    pub file: PathBuf,

    /// Only decode the header
    #[arg(long)]
    pub header_only: bool,
}

/// Arguments for `sealtrail import`.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Consignment file
    pub file: PathBuf,

    /// Chain snapshot (JSON) used to resolve witnesses
    #[arg(short, long)]
    pub resolver: PathBuf,
}

/// Arguments for `sealtrail export`.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Contract identifier (hex)
    #[arg(long)]
    pub contract: ContractId,

    /// Seal whose history to export (`<txid>:<vout>:<blinding>`), repeatable
    #[arg(long = "seal", required = true)]
    pub seals: Vec<SealDefinition>,

    /// Output file
    #[arg(short, long)]
    pub output: PathBuf,
}

/// Decodes a consignment and prints what it carries.
pub fn inspect(args: &InspectArgs) -> Result<()> {
    let bytes = read_file(&args.file)?;
    let header = Consignment::peek_header(&bytes).context("malformed consignment header")?;

    println!("Consignment: {}", args.file.display());
    println!("  Version:  {}.{}", header.version[0], header.version[1]);
    println!("  Contract: {}", header.contract_id);
    if args.header_only {
        return Ok(());
    }

    let consignment = Consignment::from_bytes(&bytes).context("malformed consignment")?;
    match &consignment.genesis {
        Some(genesis) => println!("  Genesis:  included (schema {})", genesis.genesis.schema_id),
        None => println!("  Genesis:  not included"),
    }
    println!("  Operations: {}", consignment.len());
    for operation in &consignment.operations {
        let name = operation
            .kind_name()
            .map_or_else(String::new, ToString::to_string);
        println!(
            "    {} {} {} ({} input(s))",
            operation.id(),
            operation.kind(),
            name,
            operation.inputs().len()
        );
    }
    println!("  Witnesses: {}", consignment.witnesses.len());
    for witness in &consignment.witnesses {
        println!("    {} -> {}", witness.id, witness.opid);
    }
    Ok(())
}

/// Validates a consignment against the stash and merges it.
pub fn import(config: StashConfig, args: &ImportArgs) -> Result<()> {
    let bytes = read_file(&args.file)?;
    let consignment = Consignment::from_bytes(&bytes).context("malformed consignment")?;
    let resolver = SnapshotResolver::from_file(&args.resolver)
        .with_context(|| format!("failed to load chain snapshot {}", args.resolver.display()))?;

    if config.database.is_none() {
        eprintln!("warning: no database configured; the import is validated but not kept");
    }
    let stash = open_stash(config)?;

    let report = runtime()?
        .block_on(stash.import(&consignment, &resolver))
        .context("consignment rejected")?;

    println!(
        "{} contract {}",
        if report.created { "Created" } else { "Updated" },
        report.contract_id
    );
    println!("  Imported: {}", report.imported.len());
    for opid in &report.imported {
        println!("    {opid}");
    }
    println!("  Already known: {}", report.skipped.len());
    Ok(())
}

/// Writes the history of the given seals to a consignment file.
pub fn export(config: StashConfig, args: &ExportArgs) -> Result<()> {
    let terminals: BTreeSet<SealDefinition> = args.seals.iter().copied().collect();
    if terminals.is_empty() {
        bail!("at least one seal is required");
    }

    let stash = open_stash(config)?;
    let consignment = stash
        .export(args.contract, &terminals)
        .with_context(|| format!("failed to export contract {}", args.contract))?;

    std::fs::write(&args.output, consignment.to_bytes())
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    println!(
        "Exported {} operation(s) of contract {} to {}",
        consignment.len(),
        args.contract,
        args.output.display()
    );
    Ok(())
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspect_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.consignment");
        std::fs::write(&file, b"not a consignment").unwrap();

        let err = inspect(&InspectArgs {
            file,
            header_only: true,
        })
        .unwrap_err();
        assert!(err.to_string().contains("header"));
    }

    #[test]
    fn inspect_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = inspect(&InspectArgs {
            file: dir.path().join("absent"),
            header_only: false,
        })
        .unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn inspect_decodes_empty_consignment() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty.consignment");
        let consignment = Consignment {
            contract_id: ContractId::from_bytes([7; 32]),
            genesis: None,
            operations: Vec::new(),
            witnesses: Vec::new(),
        };
        std::fs::write(&file, consignment.to_bytes()).unwrap();

        inspect(&InspectArgs {
            file,
            header_only: false,
        })
        .unwrap();
    }

    #[test]
    fn export_of_unknown_contract_fails() {
        let dir = tempfile::tempdir().unwrap();
        let args = ExportArgs {
            contract: ContractId::from_bytes([1; 32]),
            seals: vec![SealDefinition::new([2; 32].into(), 0, 0)],
            output: dir.path().join("out.consignment"),
        };

        assert!(export(StashConfig::default(), &args).is_err());
        assert!(!args.output.exists());
    }
}
