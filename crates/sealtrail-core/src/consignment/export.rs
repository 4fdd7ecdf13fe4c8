//! Minimal-disclosure export.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::debug;

use super::Consignment;
use crate::contract::{OperationId, SealDefinition};
use crate::ledger::{Ledger, OpNode, OpState};

/// Errors raised while exporting a consignment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExportError {
    /// No live operation assigned this seal.
    #[error("seal {0} is not assigned in this contract")]
    UnknownSeal(SealDefinition),

    /// An operation on the path has no witness yet.
    #[error("operation {0} is not anchored")]
    Unanchored(OperationId),
}

/// Collects the history proving the state of `terminals`.
///
/// Walks back from the operations that assigned the terminal seals through
/// the producers of their inputs, down to genesis. Only operations on that
/// causal path are included, ordered as the ledger accepted them, which
/// puts ancestors first.
///
/// # Errors
///
/// Returns [`ExportError::UnknownSeal`] for a seal no live operation
/// assigned and [`ExportError::Unanchored`] if the path crosses a staged
/// operation.
pub fn export(ledger: &Ledger, terminals: &BTreeSet<SealDefinition>) -> Result<Consignment, ExportError> {
    let mut pending: Vec<&OpNode> = Vec::with_capacity(terminals.len());
    for seal in terminals {
        let producer = ledger
            .producer(seal)
            .ok_or(ExportError::UnknownSeal(*seal))?;
        pending.push(producer);
    }

    let mut visited = BTreeSet::new();
    let mut path: Vec<&OpNode> = Vec::new();
    while let Some(node) = pending.pop() {
        let opid = node.id();
        if node.operation.is_genesis() || !visited.insert(opid) {
            continue;
        }
        if node.state == OpState::Staged || node.witness.is_none() {
            return Err(ExportError::Unanchored(opid));
        }
        for input in node.operation.inputs() {
            let producer = ledger
                .producer(input)
                .ok_or(ExportError::UnknownSeal(*input))?;
            pending.push(producer);
        }
        path.push(node);
    }
    path.sort_by_key(|node| node.seq);

    let operations = path.iter().map(|node| node.operation.clone()).collect();
    let witnesses = path.iter().filter_map(|node| node.witness.clone()).collect();
    debug!(
        contract_id = %ledger.contract_id(),
        operations = path.len(),
        terminals = terminals.len(),
        "exported consignment"
    );
    Ok(Consignment {
        contract_id: ledger.contract_id(),
        genesis: Some(ledger.genesis().clone()),
        operations,
        witnesses,
    })
}
