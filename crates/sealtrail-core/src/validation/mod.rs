//! The validation engine.
//!
//! [`Validator::validate`] is a pure function from a schema, a predecessor
//! [`StateView`], an operation and an optional witness to a
//! [`ValidationOutcome`]. Checks run in a fixed order and stop at the first
//! violation:
//!
//! 1. shape: declared types and arity bounds ([`ErrorKind::SchemaViolation`])
//! 2. seal uniqueness: inputs open and unclaimed, outputs fresh
//!    ([`ErrorKind::SealReuse`])
//! 3. business rules declared for the operation kind
//! 4. global state consistency ([`ErrorKind::GlobalStateViolation`])
//! 5. witness binding, only when a witness is supplied
//!    ([`ErrorKind::InvalidWitness`], [`ErrorKind::WitnessUnresolved`]).
//!    With chain evidence the witness must also be mined and publish the
//!    commitment it claims; a tentative witness is not yet resolved.
//!
//! The engine never mutates state; callers apply an operation only after it
//! validated in full.

mod batch;
mod rules;
mod view;


use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use batch::independent_batches;
pub use rules::{CustomRule, ResolvedInput, RuleContext, RuleRegistry};
pub use view::{EmptyView, SealEntry, SealUse, StateView};

use crate::commitment::{CommitmentScheme, MerkleMpc};
use crate::contract::{ContractId, Operation, OperationId, Witness, WitnessStatus};
use crate::resolver::{ChainEvidence, SealStatus};
use crate::schema::{Aggregation, Cardinality, InputTypes, Schema};

/// Category of a validation failure.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum ErrorKind {
    /// The operation does not match its schema layout.
    SchemaViolation,
    /// An input seal is unknown, closed or reserved.
    SealReuse,
    /// Outputs of a fungible type do not sum to its inputs.
    AmountConservation,
    /// Issued supply exceeds the declared cap or misreports itself.
    CappedIssuance,
    /// Structured outputs differ from the consumed inputs.
    FixedFieldViolation,
    /// A global declaration breaks its cardinality or aggregation.
    GlobalStateViolation,
    /// A host-registered rule failed or is not registered.
    CustomRule,
    /// The witness does not commit to the operation or the chain contradicts it.
    InvalidWitness,
    /// The chain cannot yet confirm the witness.
    WitnessUnresolved,
}

impl ErrorKind {
    /// Whether retrying after a resync may succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::WitnessUnresolved)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SchemaViolation => "schema violation",
            Self::SealReuse => "seal reuse",
            Self::AmountConservation => "amount conservation",
            Self::CappedIssuance => "capped issuance",
            Self::FixedFieldViolation => "fixed field violation",
            Self::GlobalStateViolation => "global state violation",
            Self::CustomRule => "custom rule",
            Self::InvalidWitness => "invalid witness",
            Self::WitnessUnresolved => "witness unresolved",
        })
    }
}

/// A rejected operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} in operation {opid}: {message}")]
pub struct ValidationError {
    /// Failure category.
    pub kind: ErrorKind,
    /// Operation that failed.
    pub opid: OperationId,
    /// Human-readable detail.
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(kind: ErrorKind, opid: OperationId, message: impl Into<String>) -> Self {
        Self {
            kind,
            opid,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Result of validating one operation.
pub type ValidationOutcome = Result<(), ValidationError>;

/// A witness offered for an operation.
#[derive(Clone, Copy, Debug)]
pub struct WitnessBinding<'a> {
    pub witness: &'a Witness,
    /// Chain observations; `None` checks the commitment proof only.
    pub chain: Option<&'a ChainEvidence>,
}

/// Stateless validation engine.
///
/// Cloning is cheap; clones share the rule registry and commitment scheme.
#[derive(Clone, Debug)]
pub struct Validator {
    rules: Arc<RuleRegistry>,
    scheme: Arc<dyn CommitmentScheme>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(Arc::new(RuleRegistry::new()), Arc::new(MerkleMpc))
    }
}

impl Validator {
    #[must_use]
    pub fn new(rules: Arc<RuleRegistry>, scheme: Arc<dyn CommitmentScheme>) -> Self {
        Self { rules, scheme }
    }

    /// Validates `operation` against `view`.
    ///
    /// # Errors
    ///
    /// Returns the first violation as a [`ValidationError`].
    pub fn validate(
        &self,
        schema: &Schema,
        view: &dyn StateView,
        operation: &Operation,
        witness: Option<WitnessBinding<'_>>,
    ) -> ValidationOutcome {
        let opid = operation.id();
        let fail = |kind, message: String| Err(ValidationError::new(kind, opid, message));

        let mut inputs = Vec::with_capacity(operation.inputs().len());
        let mut input_types = InputTypes::new();
        for seal in operation.inputs() {
            let Some(entry) = view.seal(seal) else {
                return fail(
                    ErrorKind::SchemaViolation,
                    format!("input seal {seal} was never assigned"),
                );
            };
            *input_types.entry(entry.ty.clone()).or_default() += 1;
            inputs.push(ResolvedInput {
                seal: *seal,
                ty: entry.ty.clone(),
                value: entry.value.clone(),
            });
        }

        // 1. Shape
        check_identity(schema, view, operation)
            .or_else(|message| fail(ErrorKind::SchemaViolation, message))?;
        if let Err(err) = schema.check_shape(operation, &input_types) {
            return fail(ErrorKind::SchemaViolation, err.to_string());
        }

        // 2. Seal uniqueness
        check_seals(view, operation).or_else(|message| fail(ErrorKind::SealReuse, message))?;

        // 3. Business rules
        if let Some(layout) = schema.operation(operation.kind(), operation.kind_name()) {
            let ctx = RuleContext {
                schema,
                operation,
                inputs: &inputs,
                view,
            };
            for rule in &layout.rules {
                if let Err((kind, message)) = rules::apply(rule, &ctx, &self.rules) {
                    return fail(kind, message);
                }
            }
        }

        // 4. Global consistency
        check_globals(schema, view, operation)
            .or_else(|message| fail(ErrorKind::GlobalStateViolation, message))?;

        // 5. Witness binding
        if let Some(binding) = witness {
            let contract_id = view.contract_id().unwrap_or_else(|| operation.contract_id());
            self.check_witness(contract_id, operation, binding)?;
        }
        Ok(())
    }

    /// Checks that a witness commits to `operation` and, when chain evidence
    /// is present, that the chain agrees with it: the witness must be mined,
    /// publish the claimed commitment and close every input seal.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidWitness`] on any mismatch and
    /// [`ErrorKind::WitnessUnresolved`] when the chain cannot confirm it yet.
    pub fn check_witness(
        &self,
        contract_id: ContractId,
        operation: &Operation,
        binding: WitnessBinding<'_>,
    ) -> ValidationOutcome {
        let opid = operation.id();
        let witness = binding.witness;
        let invalid = |message: String| Err(ValidationError::new(ErrorKind::InvalidWitness, opid, message));
        let unresolved =
            |message: String| Err(ValidationError::new(ErrorKind::WitnessUnresolved, opid, message));

        if witness.opid != opid {
            return invalid(format!("witness {} is bound to operation {}", witness.id, witness.opid));
        }
        if !self
            .scheme
            .verify(contract_id, opid, &witness.proof, &witness.commitment)
        {
            return invalid(format!(
                "commitment {} of witness {} does not bind the operation",
                witness.commitment, witness.id
            ));
        }

        let Some(chain) = binding.chain else {
            return Ok(());
        };
        match chain.status {
            None => return unresolved(format!("witness {} is unknown to the resolver", witness.id)),
            Some(WitnessStatus::Invalid) => {
                return invalid(format!("witness {} is invalid on chain", witness.id));
            },
            Some(WitnessStatus::Tentative) => {
                return unresolved(format!("witness {} is not mined yet", witness.id));
            },
            Some(WitnessStatus::Mined { .. }) => {},
        }
        match chain.commitment {
            None => {
                return unresolved(format!(
                    "commitment published by witness {} is unknown",
                    witness.id
                ));
            },
            Some(published) if published != witness.commitment => {
                return invalid(format!("witness {} publishes {published}", witness.id));
            },
            Some(_) => {},
        }
        for seal in operation.inputs() {
            match chain.seals.get(seal).copied().flatten() {
                None => return unresolved(format!("seal {seal} could not be resolved")),
                Some(SealStatus::Open) => {
                    return unresolved(format!("seal {seal} is not closed yet"));
                },
                Some(SealStatus::Closed {
                    witness_id,
                    commitment,
                }) => {
                    if witness_id != witness.id {
                        return invalid(format!("seal {seal} was closed by {witness_id}"));
                    }
                    if commitment != witness.commitment {
                        return invalid(format!(
                            "seal {seal} closing transaction publishes {commitment}"
                        ));
                    }
                },
            }
        }
        Ok(())
    }
}

fn check_identity(
    schema: &Schema,
    view: &dyn StateView,
    operation: &Operation,
) -> Result<(), String> {
    match (operation, view.contract_id()) {
        (Operation::Genesis(genesis), None) => {
            if genesis.schema_id == schema.id() {
                Ok(())
            } else {
                Err(format!("genesis references schema {}", genesis.schema_id))
            }
        },
        (Operation::Genesis(_), Some(contract_id)) => {
            Err(format!("contract {contract_id} already has a genesis"))
        },
        (_, None) => Err("operation precedes genesis".into()),
        (_, Some(contract_id)) if operation.contract_id() != contract_id => Err(format!(
            "operation belongs to contract {}",
            operation.contract_id()
        )),
        _ => Ok(()),
    }
}

fn check_seals(view: &dyn StateView, operation: &Operation) -> Result<(), String> {
    for seal in operation.inputs() {
        match view.seal(seal).map(|entry| entry.status) {
            Some(SealUse::Open) => {},
            Some(SealUse::Pending) => {
                return Err(format!("seal {seal} is assigned by an unanchored operation"));
            },
            Some(SealUse::Reserved { by } | SealUse::Spent { by }) => {
                return Err(format!("seal {seal} is already closed by {by}"));
            },
            None => return Err(format!("seal {seal} is unknown")),
        }
    }

    let mut outputs = BTreeSet::new();
    for (_, seal, _) in operation.outputs() {
        if !outputs.insert(*seal) {
            return Err(format!("seal {seal} is assigned twice"));
        }
        if operation.inputs().contains(seal) || view.seal(seal).is_some() {
            return Err(format!("seal {seal} was already used"));
        }
    }
    Ok(())
}

fn check_globals(schema: &Schema, view: &dyn StateView, operation: &Operation) -> Result<(), String> {
    for (name, values) in operation.globals() {
        let Some(ty) = schema.global_types.get(name) else {
            return Err(format!("global '{name}' is undeclared"));
        };
        let existing = view.global(name);

        if ty.cardinality == Cardinality::Once {
            if values.len() > 1 {
                return Err(format!("once-global '{name}' declared {} times", values.len()));
            }
            if let (Some(prior), Some(new)) = (existing.first(), values.first()) {
                if prior != new {
                    return Err(format!("once-global '{name}' redeclared with a different value"));
                }
            }
        }

        if ty.aggregation == Aggregation::Sum {
            let total = existing
                .iter()
                .chain(values)
                .filter_map(crate::contract::StateValue::amount)
                .try_fold(0u64, u64::checked_add);
            if total.is_none() {
                return Err(format!("aggregate '{name}' overflows"));
            }
        }
    }
    Ok(())
}
