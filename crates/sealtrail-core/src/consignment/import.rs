//! Atomic consignment import.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::Consignment;
use crate::contract::{ContractId, Operation, OperationId, SealDefinition, Witness, WitnessId};
use crate::crypto::SignatureValidator;
use crate::ledger::{Ledger, LedgerError};
use crate::resolver::{WitnessResolver, resolve_witness};
use crate::schema::{SchemaError, SchemaRegistry};
use crate::validation::{ValidationError, Validator, WitnessBinding, independent_batches};

/// Errors raised while importing a consignment.
///
/// Any error leaves the target ledger exactly as it was.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ImportError {
    /// The consignment belongs to a different contract.
    #[error("consignment for contract {found} does not match {expected}")]
    ContractMismatch {
        /// Contract being imported into.
        expected: ContractId,
        /// Contract named by the consignment.
        found: ContractId,
    },

    /// A new contract arrived without its genesis.
    #[error("consignment for unknown contract {0} carries no genesis")]
    MissingGenesis(ContractId),

    /// The carried genesis differs from the one already known.
    #[error("genesis of contract {0} differs from the known one")]
    GenesisMismatch(ContractId),

    /// The issuer signature over the genesis does not verify.
    #[error("issuer signature of contract {0} is invalid")]
    InvalidSignature(ContractId),

    /// The genesis schema is unknown or the genesis does not fit it.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The consignment carries more operations than permitted.
    #[error("consignment carries {count} operations, maximum is {max}")]
    TooLarge {
        /// Operations carried.
        count: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A genesis appears among the operations.
    #[error("unexpected genesis {0} among operations")]
    UnexpectedGenesis(OperationId),

    /// The same operation is carried twice.
    #[error("operation {0} is carried twice")]
    DuplicateOperation(OperationId),

    /// An operation has no witness.
    #[error("operation {0} has no witness")]
    MissingWitness(OperationId),

    /// Two witnesses claim the same operation.
    #[error("operation {0} has more than one witness")]
    DuplicateWitness(OperationId),

    /// A witness anchors no carried operation.
    #[error("witness {0} anchors no carried operation")]
    OrphanWitness(WitnessId),

    /// An input is produced by no earlier operation.
    #[error("operation {opid} spends seal {seal} that no earlier operation assigned")]
    Unordered {
        /// Operation concerned.
        opid: OperationId,
        /// The unsatisfied input.
        seal: SealDefinition,
    },

    /// An operation failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The genesis could not start a ledger.
    #[error(transparent)]
    Ledger(LedgerError),
}

impl ImportError {
    /// Whether retrying later may succeed, i.e. the chain could not yet
    /// confirm a witness.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl From<LedgerError> for ImportError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(err) => Self::Validation(err),
            other => Self::Ledger(other),
        }
    }
}

/// Collaborators and limits of an import.
#[derive(Clone, Copy)]
pub struct ImportContext<'a> {
    pub registry: &'a SchemaRegistry,
    /// Used for contracts new to the caller.
    pub validator: &'a Validator,
    pub resolver: &'a dyn WitnessResolver,
    pub signatures: &'a dyn SignatureValidator,
    /// Bound on each resolver call.
    pub timeout: Duration,
    /// Finality threshold for contracts new to the caller.
    pub min_confirmations: u32,
    pub max_operations: usize,
}

/// Result of a successful import.
#[derive(Debug)]
pub struct ImportOutcome {
    /// The ledger with the consignment merged in. Replaces the target.
    pub ledger: Ledger,
    /// Newly accepted operations, in acceptance order.
    pub imported: Vec<OperationId>,
    /// Carried operations the target already knew.
    pub skipped: Vec<OperationId>,
}

/// Replays a consignment on top of `target`, or on a new ledger when the
/// contract is not known yet.
///
/// Every new operation is fully validated, witness included: the resolver
/// must confirm the witness is on chain and closes each spent seal. The
/// genesis of a new contract must carry a valid issuer signature and use a
/// registered schema. Operations already known are skipped, so importing the
/// same consignment twice changes nothing.
///
/// Work happens on a copy of the target; the caller receives the merged
/// ledger only if every operation passed.
///
/// # Errors
///
/// Returns the first structural or validation failure as [`ImportError`].
pub async fn import(
    target: Option<&Ledger>,
    consignment: &Consignment,
    ctx: &ImportContext<'_>,
) -> Result<ImportOutcome, ImportError> {
    let contract_id = consignment.contract_id;
    let result = replay(target, consignment, ctx).await;
    if let Err(err) = &result {
        warn!(contract_id = %contract_id, error = %err, "rejected consignment");
    }
    result
}

async fn replay(
    target: Option<&Ledger>,
    consignment: &Consignment,
    ctx: &ImportContext<'_>,
) -> Result<ImportOutcome, ImportError> {
    let contract_id = consignment.contract_id;
    if consignment.operations.len() > ctx.max_operations {
        return Err(ImportError::TooLarge {
            count: consignment.operations.len(),
            max: ctx.max_operations,
        });
    }

    let mut scratch = match target {
        Some(ledger) => {
            if ledger.contract_id() != contract_id {
                return Err(ImportError::ContractMismatch {
                    expected: ledger.contract_id(),
                    found: contract_id,
                });
            }
            if consignment
                .genesis
                .as_ref()
                .is_some_and(|genesis| genesis != ledger.genesis())
            {
                return Err(ImportError::GenesisMismatch(contract_id));
            }
            ledger.clone()
        },
        None => {
            let genesis = consignment
                .genesis
                .clone()
                .ok_or(ImportError::MissingGenesis(contract_id))?;
            if genesis.contract_id() != contract_id {
                return Err(ImportError::ContractMismatch {
                    expected: contract_id,
                    found: genesis.contract_id(),
                });
            }
            if !genesis.verify(ctx.signatures) {
                return Err(ImportError::InvalidSignature(contract_id));
            }
            let schema = ctx.registry.get(&genesis.genesis.schema_id)?;
            Ledger::issue(genesis, schema, ctx.validator.clone(), ctx.min_confirmations)?
        },
    };

    let witnesses = index_witnesses(consignment)?;
    let (pending, skipped) = check_topology(&scratch, consignment, &witnesses)?;
    let operations: Vec<Operation> = pending.iter().map(|&(operation, _)| operation.clone()).collect();

    let mut imported = Vec::with_capacity(pending.len());
    for batch in independent_batches(&operations) {
        let mut evidence = Vec::with_capacity(batch.len());
        for &index in &batch {
            let &(operation, witness) = &pending[index];
            evidence.push(resolve_witness(ctx.resolver, witness, operation.inputs(), ctx.timeout).await);
        }

        let outcomes = {
            let bindings: Vec<(&Operation, Option<WitnessBinding<'_>>)> = batch
                .iter()
                .zip(&evidence)
                .map(|(&index, chain)| {
                    let &(operation, witness) = &pending[index];
                    let binding = WitnessBinding {
                        witness,
                        chain: Some(chain),
                    };
                    (operation, Some(binding))
                })
                .collect();
            scratch
                .validator()
                .validate_batch(scratch.schema(), &scratch, &bindings)
        };
        for outcome in outcomes {
            outcome?;
        }

        for (&index, chain) in batch.iter().zip(evidence) {
            let &(operation, witness) = &pending[index];
            let opid = operation.id();
            let state = scratch.insert_validated(operation.clone(), witness.clone(), chain.status);
            debug!(contract_id = %contract_id, opid = %opid, state = %state, "imported operation");
            imported.push(opid);
        }
    }

    info!(
        contract_id = %contract_id,
        imported = imported.len(),
        skipped = skipped.len(),
        "imported consignment"
    );
    Ok(ImportOutcome {
        ledger: scratch,
        imported,
        skipped,
    })
}

/// Maps each carried operation to its witness.
fn index_witnesses(consignment: &Consignment) -> Result<BTreeMap<OperationId, &Witness>, ImportError> {
    let carried: BTreeSet<OperationId> = consignment.operation_ids().collect();
    let mut witnesses = BTreeMap::new();
    for witness in &consignment.witnesses {
        if !carried.contains(&witness.opid) {
            return Err(ImportError::OrphanWitness(witness.id));
        }
        if witnesses.insert(witness.opid, witness).is_some() {
            return Err(ImportError::DuplicateWitness(witness.opid));
        }
    }
    Ok(witnesses)
}

/// Checks ordering and completeness, and splits the operations into new
/// ones and ones the ledger already knows.
fn check_topology<'c>(
    ledger: &Ledger,
    consignment: &'c Consignment,
    witnesses: &BTreeMap<OperationId, &'c Witness>,
) -> Result<(Vec<(&'c Operation, &'c Witness)>, Vec<OperationId>), ImportError> {
    let mut seen = BTreeSet::new();
    let mut produced = BTreeSet::new();
    let mut pending = Vec::new();
    let mut skipped = Vec::new();

    for operation in &consignment.operations {
        let opid = operation.id();
        if operation.is_genesis() {
            return Err(ImportError::UnexpectedGenesis(opid));
        }
        if operation.contract_id() != consignment.contract_id {
            return Err(ImportError::ContractMismatch {
                expected: consignment.contract_id,
                found: operation.contract_id(),
            });
        }
        if !seen.insert(opid) {
            return Err(ImportError::DuplicateOperation(opid));
        }
        let witness = *witnesses
            .get(&opid)
            .ok_or(ImportError::MissingWitness(opid))?;
        if let Some(seal) = operation
            .inputs()
            .iter()
            .find(|seal| !produced.contains(*seal) && ledger.projection().seal(seal).is_none())
        {
            return Err(ImportError::Unordered { opid, seal: *seal });
        }
        produced.extend(operation.outputs().map(|(_, seal, _)| *seal));

        if ledger.contains(&opid) {
            skipped.push(opid);
        } else {
            pending.push((operation, witness));
        }
    }
    Ok((pending, skipped))
}
