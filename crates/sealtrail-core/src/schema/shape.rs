//! Structural conformance of operations to their schema.

use std::collections::BTreeMap;

use thiserror::Error;

use super::{GlobalDomain, OwnedDomain, Schema};
use crate::contract::{Operation, OperationKind, StateValue, TypeName};

/// Number of consumed allocations per owned type, as resolved by the caller
/// from the predecessor state.
pub type InputTypes = BTreeMap<TypeName, usize>;

/// Structural mismatch between an operation and its schema.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ShapeError {
    /// The schema does not declare this operation kind.
    #[error("schema declares no {kind} named '{name}'")]
    UnknownOperation {
        /// Operation class.
        kind: OperationKind,
        /// Declared kind name.
        name: String,
    },

    /// A global type is absent from the schema or from the operation layout.
    #[error("global '{name}' is not allowed here")]
    UnexpectedGlobal {
        /// Offending type.
        name: TypeName,
    },

    /// An owned type is absent from the schema or from the operation layout.
    #[error("owned state '{name}' is not allowed as {section}")]
    UnexpectedOwned {
        /// `"input"` or `"output"`.
        section: &'static str,
        /// Offending type.
        name: TypeName,
    },

    /// Entry count outside declared bounds.
    #[error("{section} '{name}' has {count} entries, expected {min}..={max}")]
    Arity {
        /// `"input"`, `"output"` or `"global"`.
        section: &'static str,
        /// Offending type.
        name: TypeName,
        /// Entries present.
        count: usize,
        /// Declared minimum.
        min: u16,
        /// Declared maximum.
        max: u16,
    },

    /// A value does not belong to its type's domain.
    #[error("value of '{name}' is outside its declared domain")]
    Domain {
        /// Offending type.
        name: TypeName,
    },
}

impl Schema {
    /// Checks that an operation uses only declared types, within arity
    /// bounds, with values in each type's domain.
    ///
    /// This is a structural check only; business rules run in the
    /// validation engine.
    ///
    /// # Errors
    ///
    /// Returns the first [`ShapeError`] encountered.
    pub fn check_shape(&self, operation: &Operation, inputs: &InputTypes) -> Result<(), ShapeError> {
        let kind = operation.kind();
        let layout = self
            .operation(kind, operation.kind_name())
            .ok_or_else(|| ShapeError::UnknownOperation {
                kind,
                name: operation
                    .kind_name()
                    .map_or_else(String::new, ToString::to_string),
            })?;

        for (name, values) in operation.globals() {
            let (Some(ty), true) = (self.global_types.get(name), layout.globals.contains_key(name)) else {
                return Err(ShapeError::UnexpectedGlobal { name: name.clone() });
            };
            let domain_ok = values.iter().all(|value| match (ty.domain, value) {
                (GlobalDomain::Amount, StateValue::Amount(_)) | (GlobalDomain::Data, StateValue::Data(_)) => true,
                _ => false,
            });
            if !domain_ok {
                return Err(ShapeError::Domain { name: name.clone() });
            }
        }
        check_counts(
            "global",
            &layout.globals,
            operation.globals().iter().map(|(name, values)| (name, values.len())),
        )?;

        for (name, seals) in operation.assignments() {
            let (Some(ty), true) = (self.owned_types.get(name), layout.outputs.contains_key(name)) else {
                return Err(ShapeError::UnexpectedOwned {
                    section: "output",
                    name: name.clone(),
                });
            };
            if !seals.values().all(|value| owned_domain_accepts(ty.domain, value)) {
                return Err(ShapeError::Domain { name: name.clone() });
            }
        }
        check_counts(
            "output",
            &layout.outputs,
            operation.assignments().iter().map(|(name, seals)| (name, seals.len())),
        )?;

        if let Some(name) = inputs.keys().find(|name| !layout.inputs.contains_key(*name)) {
            return Err(ShapeError::UnexpectedOwned {
                section: "input",
                name: name.clone(),
            });
        }
        check_counts("input", &layout.inputs, inputs.iter().map(|(name, count)| (name, *count)))
    }
}

fn owned_domain_accepts(domain: OwnedDomain, value: &StateValue) -> bool {
    matches!(
        (domain, value),
        (OwnedDomain::Rights, StateValue::Void)
            | (OwnedDomain::Fungible, StateValue::Amount(_))
            | (OwnedDomain::Structured, StateValue::Data(_) | StateValue::Token { .. })
    )
}

/// Every declared type must appear within bounds; absent types count as 0.
fn check_counts<'a>(
    section: &'static str,
    declared: &BTreeMap<TypeName, super::Arity>,
    present: impl Iterator<Item = (&'a TypeName, usize)>,
) -> Result<(), ShapeError> {
    let present: BTreeMap<&TypeName, usize> = present.collect();
    for (name, arity) in declared {
        let count = present.get(name).copied().unwrap_or(0);
        if !arity.contains(count) {
            return Err(ShapeError::Arity {
                section,
                name: name.clone(),
                count,
                min: arity.min,
                max: arity.max,
            });
        }
    }
    Ok(())
}
