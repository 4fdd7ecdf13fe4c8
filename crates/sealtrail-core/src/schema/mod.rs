//! Contract schemas and the schema registry.
//!
//! A [`Schema`] declares the global and owned state types a contract may
//! carry, the genesis layout, and the transition and extension kinds with
//! their arity bounds and validation rules. Schemas are immutable; their
//! [`SchemaId`] is the tagged hash of the canonical encoding, so the same
//! schema may back any number of contracts.
//!
//! # Example
//!
//! ```rust
//! use sealtrail_core::schema::{SchemaRegistry, standard};
//!
//! let registry = SchemaRegistry::new();
//! let id = registry.register(standard::fungible_asset()).unwrap();
//! // Registering identical content again is a no-op.
//! assert_eq!(registry.register(standard::fungible_asset()).unwrap(), id);
//! assert!(registry.get(&id).is_ok());
//! ```

mod registry;
mod shape;
pub mod standard;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use registry::{DEFAULT_MAX_SCHEMAS, SchemaRegistry};
pub use shape::{InputTypes, ShapeError};

use crate::codec::{self, CodecError, StrictDecode, StrictEncode, StrictReader, StrictWriter};
use crate::contract::{OperationKind, SchemaId, TypeName};
use crate::crypto::TaggedHasher;

/// Errors raised by schema definition checks and registry access.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaError {
    /// No schema is registered under the identifier.
    #[error("schema not found: {0}")]
    NotFound(SchemaId),

    /// Different content claims an already registered identifier.
    #[error("conflicting content registered under schema {0}")]
    Conflict(SchemaId),

    /// The registry reached its capacity.
    #[error("schema registry full (max {max})")]
    RegistryFull {
        /// Configured capacity.
        max: usize,
    },

    /// The schema is internally inconsistent.
    #[error("invalid schema '{name}': {reason}")]
    Invalid {
        /// Human-readable schema name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An operation does not conform to its schema.
    #[error("shape violation: {0}")]
    Shape(#[from] ShapeError),
}

/// How many values a global type may hold across the contract history.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    /// Declared once; later redeclarations must repeat the same value.
    Once,
    /// Accumulates a series of values.
    Many,
}

/// How a global series is summarized by the state projector.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Aggregation {
    None,
    /// Values are amounts; the aggregate is their sum.
    Sum,
}

/// Value domain of a global state type.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GlobalDomain {
    Amount,
    Data,
}

/// Declaration of a global state type.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct GlobalType {
    pub cardinality: Cardinality,
    pub aggregation: Aggregation,
    pub domain: GlobalDomain,
}

impl GlobalType {
    /// A write-once data field such as a ticker.
    #[must_use]
    pub const fn once(domain: GlobalDomain) -> Self {
        Self {
            cardinality: Cardinality::Once,
            aggregation: Aggregation::None,
            domain,
        }
    }

    /// An amount series summed by the projector.
    #[must_use]
    pub const fn summed() -> Self {
        Self {
            cardinality: Cardinality::Many,
            aggregation: Aggregation::Sum,
            domain: GlobalDomain::Amount,
        }
    }
}

/// Value domain of an owned state type.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OwnedDomain {
    /// Carries no value; ownership alone matters.
    Rights,
    /// Fungible amounts.
    Fungible,
    /// Structured data or non-fungible tokens.
    Structured,
}

/// Declaration of an owned state type.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct OwnedType {
    pub domain: OwnedDomain,
}

/// Inclusive bounds on how many entries of a type an operation carries.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Arity {
    pub min: u16,
    pub max: u16,
}

impl Arity {
    #[must_use]
    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    /// Exactly one.
    #[must_use]
    pub const fn once() -> Self {
        Self::new(1, 1)
    }

    /// Zero or one.
    #[must_use]
    pub const fn optional() -> Self {
        Self::new(0, 1)
    }

    /// At least one.
    #[must_use]
    pub const fn some() -> Self {
        Self::new(1, u16::MAX)
    }

    /// Any number, including none.
    #[must_use]
    pub const fn any() -> Self {
        Self::new(0, u16::MAX)
    }

    #[must_use]
    pub fn contains(self, count: usize) -> bool {
        count >= usize::from(self.min) && count <= usize::from(self.max)
    }
}

/// A business rule attached to an operation kind.
///
/// Rules are data: the validation engine maps each variant to its
/// implementation, and `Custom` ids to host-registered rules.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "rule")]
pub enum ValidationRule {
    /// Inputs and outputs of a fungible type sum to the same amount.
    Conservation { state: TypeName },
    /// New outputs of `state` are reported in the `supply` series and the
    /// cumulative supply stays within the `cap` global.
    CappedIssuance {
        state: TypeName,
        cap: TypeName,
        supply: TypeName,
    },
    /// Token indices of a structured type are preserved with unit amounts.
    FixedField { state: TypeName },
    /// A rule implemented by the host, looked up by id.
    Custom { id: TypeName },
}

/// Layout and rules of one operation kind.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct OperationSchema {
    /// Owned types consumed, by the type of the spent allocation.
    #[serde(default)]
    pub inputs: BTreeMap<TypeName, Arity>,
    /// Owned types assigned.
    #[serde(default)]
    pub outputs: BTreeMap<TypeName, Arity>,
    /// Global types declared.
    #[serde(default)]
    pub globals: BTreeMap<TypeName, Arity>,
    #[serde(default)]
    pub rules: Vec<ValidationRule>,
}

/// Immutable declaration of a contract's state shape and rules.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Schema {
    /// Human-readable name; part of the identity.
    pub name: String,
    pub global_types: BTreeMap<TypeName, GlobalType>,
    pub owned_types: BTreeMap<TypeName, OwnedType>,
    pub genesis: OperationSchema,
    #[serde(default)]
    pub transitions: BTreeMap<TypeName, OperationSchema>,
    #[serde(default)]
    pub extensions: BTreeMap<TypeName, OperationSchema>,
}

impl Schema {
    /// Content-derived identifier.
    #[must_use]
    pub fn id(&self) -> SchemaId {
        SchemaId(TaggedHasher::hash(
            TaggedHasher::SCHEMA_TAG,
            &codec::to_vec(self),
        ))
    }

    /// Layout for an operation of the given kind and name.
    ///
    /// Genesis has no name; transitions and extensions are looked up by it.
    #[must_use]
    pub fn operation(&self, kind: OperationKind, name: Option<&TypeName>) -> Option<&OperationSchema> {
        match (kind, name) {
            (OperationKind::Genesis, _) => Some(&self.genesis),
            (OperationKind::Transition, Some(name)) => self.transitions.get(name),
            (OperationKind::Extension, Some(name)) => self.extensions.get(name),
            _ => None,
        }
    }

    /// Checks internal consistency: every referenced type is declared with
    /// a domain its rules can work on, and arity bounds are ordered.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Invalid`] describing the first inconsistency.
    pub fn check_definition(&self) -> Result<(), SchemaError> {
        let invalid = |reason: String| SchemaError::Invalid {
            name: self.name.clone(),
            reason,
        };

        for (name, ty) in &self.global_types {
            if ty.aggregation == Aggregation::Sum && ty.domain != GlobalDomain::Amount {
                return Err(invalid(format!("summed global '{name}' must hold amounts")));
            }
        }

        let sections = std::iter::once((String::from("genesis"), &self.genesis))
            .chain(self.transitions.iter().map(|(n, s)| (format!("transition '{n}'"), s)))
            .chain(self.extensions.iter().map(|(n, s)| (format!("extension '{n}'"), s)));

        for (label, op) in sections {
            for (name, arity) in op.inputs.iter().chain(&op.outputs) {
                if !self.owned_types.contains_key(name) {
                    return Err(invalid(format!("{label} references undeclared owned type '{name}'")));
                }
                if arity.min > arity.max {
                    return Err(invalid(format!("{label} has inverted arity for '{name}'")));
                }
            }
            for (name, arity) in &op.globals {
                let Some(ty) = self.global_types.get(name) else {
                    return Err(invalid(format!("{label} references undeclared global '{name}'")));
                };
                if arity.min > arity.max {
                    return Err(invalid(format!("{label} has inverted arity for '{name}'")));
                }
                if ty.cardinality == Cardinality::Once && arity.max > 1 {
                    return Err(invalid(format!("{label} may declare once-global '{name}' repeatedly")));
                }
            }
            for rule in &op.rules {
                self.check_rule(rule).map_err(|reason| invalid(format!("{label}: {reason}")))?;
            }
        }

        if !self.genesis.inputs.is_empty() {
            return Err(invalid("genesis cannot consume inputs".into()));
        }
        if self.extensions.values().any(|ext| !ext.inputs.is_empty()) {
            return Err(invalid("extensions cannot consume inputs".into()));
        }
        Ok(())
    }

    fn check_rule(&self, rule: &ValidationRule) -> Result<(), String> {
        let owned = |name: &TypeName, domain: OwnedDomain| match self.owned_types.get(name) {
            Some(ty) if ty.domain == domain => Ok(()),
            Some(_) => Err(format!("owned type '{name}' has the wrong domain for its rule")),
            None => Err(format!("rule references undeclared owned type '{name}'")),
        };
        match rule {
            ValidationRule::Conservation { state } => owned(state, OwnedDomain::Fungible),
            ValidationRule::FixedField { state } => owned(state, OwnedDomain::Structured),
            ValidationRule::CappedIssuance { state, cap, supply } => {
                owned(state, OwnedDomain::Fungible)?;
                match self.global_types.get(cap) {
                    Some(ty) if ty.cardinality == Cardinality::Once && ty.domain == GlobalDomain::Amount => {},
                    _ => return Err(format!("cap '{cap}' must be a once-declared amount")),
                }
                match self.global_types.get(supply) {
                    Some(ty) if ty.aggregation == Aggregation::Sum => Ok(()),
                    _ => Err(format!("supply '{supply}' must be a summed global")),
                }
            },
            ValidationRule::Custom { .. } => Ok(()),
        }
    }
}

impl StrictEncode for Cardinality {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        writer.write_u8(match self {
            Self::Once => 0,
            Self::Many => 1,
        });
    }
}

impl StrictDecode for Cardinality {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        match reader.read_u8()? {
            0 => Ok(Self::Once),
            1 => Ok(Self::Many),
            tag => Err(CodecError::InvalidTag {
                type_name: "Cardinality",
                tag,
            }),
        }
    }
}

impl StrictEncode for Aggregation {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        writer.write_u8(match self {
            Self::None => 0,
            Self::Sum => 1,
        });
    }
}

impl StrictDecode for Aggregation {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        match reader.read_u8()? {
            0 => Ok(Self::None),
            1 => Ok(Self::Sum),
            tag => Err(CodecError::InvalidTag {
                type_name: "Aggregation",
                tag,
            }),
        }
    }
}

impl StrictEncode for GlobalDomain {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        writer.write_u8(match self {
            Self::Amount => 0,
            Self::Data => 1,
        });
    }
}

impl StrictDecode for GlobalDomain {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        match reader.read_u8()? {
            0 => Ok(Self::Amount),
            1 => Ok(Self::Data),
            tag => Err(CodecError::InvalidTag {
                type_name: "GlobalDomain",
                tag,
            }),
        }
    }
}

impl StrictEncode for GlobalType {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        self.cardinality.strict_encode(writer);
        self.aggregation.strict_encode(writer);
        self.domain.strict_encode(writer);
    }
}

impl StrictDecode for GlobalType {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            cardinality: StrictDecode::strict_decode(reader)?,
            aggregation: StrictDecode::strict_decode(reader)?,
            domain: StrictDecode::strict_decode(reader)?,
        })
    }
}

impl StrictEncode for OwnedType {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        writer.write_u8(match self.domain {
            OwnedDomain::Rights => 0,
            OwnedDomain::Fungible => 1,
            OwnedDomain::Structured => 2,
        });
    }
}

impl StrictDecode for OwnedType {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        let domain = match reader.read_u8()? {
            0 => OwnedDomain::Rights,
            1 => OwnedDomain::Fungible,
            2 => OwnedDomain::Structured,
            tag => {
                return Err(CodecError::InvalidTag {
                    type_name: "OwnedDomain",
                    tag,
                });
            },
        };
        Ok(Self { domain })
    }
}

impl StrictEncode for Arity {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        writer.write_u16(self.min);
        writer.write_u16(self.max);
    }
}

impl StrictDecode for Arity {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            min: reader.read_u16()?,
            max: reader.read_u16()?,
        })
    }
}

impl StrictEncode for ValidationRule {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        match self {
            Self::Conservation { state } => {
                writer.write_u8(0);
                state.strict_encode(writer);
            },
            Self::CappedIssuance { state, cap, supply } => {
                writer.write_u8(1);
                state.strict_encode(writer);
                cap.strict_encode(writer);
                supply.strict_encode(writer);
            },
            Self::FixedField { state } => {
                writer.write_u8(2);
                state.strict_encode(writer);
            },
            Self::Custom { id } => {
                writer.write_u8(3);
                id.strict_encode(writer);
            },
        }
    }
}

impl StrictDecode for ValidationRule {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        match reader.read_u8()? {
            0 => Ok(Self::Conservation {
                state: StrictDecode::strict_decode(reader)?,
            }),
            1 => Ok(Self::CappedIssuance {
                state: StrictDecode::strict_decode(reader)?,
                cap: StrictDecode::strict_decode(reader)?,
                supply: StrictDecode::strict_decode(reader)?,
            }),
            2 => Ok(Self::FixedField {
                state: StrictDecode::strict_decode(reader)?,
            }),
            3 => Ok(Self::Custom {
                id: StrictDecode::strict_decode(reader)?,
            }),
            tag => Err(CodecError::InvalidTag {
                type_name: "ValidationRule",
                tag,
            }),
        }
    }
}

impl StrictEncode for OperationSchema {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        self.inputs.strict_encode(writer);
        self.outputs.strict_encode(writer);
        self.globals.strict_encode(writer);
        self.rules.strict_encode(writer);
    }
}

impl StrictDecode for OperationSchema {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            inputs: StrictDecode::strict_decode(reader)?,
            outputs: StrictDecode::strict_decode(reader)?,
            globals: StrictDecode::strict_decode(reader)?,
            rules: StrictDecode::strict_decode(reader)?,
        })
    }
}

impl StrictEncode for Schema {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        self.name.strict_encode(writer);
        self.global_types.strict_encode(writer);
        self.owned_types.strict_encode(writer);
        self.genesis.strict_encode(writer);
        self.transitions.strict_encode(writer);
        self.extensions.strict_encode(writer);
    }
}

impl StrictDecode for Schema {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            name: StrictDecode::strict_decode(reader)?,
            global_types: StrictDecode::strict_decode(reader)?,
            owned_types: StrictDecode::strict_decode(reader)?,
            genesis: StrictDecode::strict_decode(reader)?,
            transitions: StrictDecode::strict_decode(reader)?,
            extensions: StrictDecode::strict_decode(reader)?,
        })
    }
}
