//! Read-only stash queries: `state`, `contracts` and `schemas`.

use anyhow::{Context, Result};
use clap::Args;
use sealtrail_core::config::StashConfig;
use sealtrail_core::contract::{ContractId, SealDefinition, StateValue};
use sealtrail_core::state::{ContractStateView, StateFilter};

use super::open_stash;

/// Arguments for `sealtrail state`.
#[derive(Args, Debug)]
pub struct StateArgs {
    /// Contract identifier (hex)
    #[arg(long)]
    pub contract: ContractId,

    /// Only show allocations on these seals, repeatable
    #[arg(long = "seal")]
    pub seals: Vec<SealDefinition>,

    /// Print the state as JSON
    #[arg(long)]
    pub json: bool,
}

/// Prints the projected state of one contract.
pub fn show(config: StashConfig, args: &StateArgs) -> Result<()> {
    let stash = open_stash(config)?;
    let filter = if args.seals.is_empty() {
        StateFilter::All
    } else {
        StateFilter::Seals(args.seals.iter().copied().collect())
    };

    let view = stash
        .state(args.contract, &filter)
        .with_context(|| format!("failed to read state of contract {}", args.contract))?;

    if args.json {
        let json = serde_json::to_string_pretty(&view).context("failed to serialize state")?;
        println!("{json}");
    } else {
        print_view(&view);
    }
    Ok(())
}

/// Lists the contracts in the stash.
pub fn contracts(config: StashConfig) -> Result<()> {
    let stash = open_stash(config)?;
    let ids = stash.contracts();
    if ids.is_empty() {
        println!("No contracts");
        return Ok(());
    }
    for contract_id in ids {
        let ledger = stash.ledger(contract_id)?;
        println!(
            "{contract_id}  {}  {} operation(s)",
            ledger.schema().name,
            ledger.len()
        );
    }
    Ok(())
}

/// Lists the registered schemas.
pub fn schemas(config: StashConfig) -> Result<()> {
    let stash = open_stash(config)?;
    for (schema_id, schema) in stash.registry().list() {
        println!(
            "{schema_id}  {}  ({} transition(s), {} extension(s))",
            schema.name,
            schema.transitions.len(),
            schema.extensions.len()
        );
    }
    Ok(())
}

fn print_view(view: &ContractStateView) {
    println!("Contract: {}", view.contract_id);

    println!("Global state:");
    for (ty, values) in &view.global {
        for value in values {
            println!("  {ty} = {}", render(&value.value));
        }
    }

    if !view.aggregated.is_empty() {
        println!("Aggregated:");
        for (ty, total) in &view.aggregated {
            println!("  {ty} = {total}");
        }
    }

    println!("Owned state:");
    for (ty, allocations) in &view.owned {
        for allocation in allocations {
            println!(
                "  {ty}  {}  {}  [{}]",
                allocation.seal,
                render(&allocation.value),
                allocation.status
            );
        }
        println!("  {ty} balance: {}", view.balance(ty));
    }
}

fn render(value: &StateValue) -> String {
    match value {
        StateValue::Void => "void".to_string(),
        StateValue::Amount(amount) => amount.to_string(),
        StateValue::Data(data) => std::str::from_utf8(data)
            .map_or_else(|_| hex::encode(data), |text| format!("{text:?}")),
        StateValue::Token { index, amount } => format!("token #{index} x{amount}"),
    }
}
