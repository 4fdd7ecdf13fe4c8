//! Genesis, transitions and extensions.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::{ContractId, OperationId, SchemaId};
use super::seal::SealDefinition;
use super::state::{GlobalState, OwnedAssignments, StateValue, TypeName};
use crate::codec::{self, CodecError, StrictDecode, StrictEncode, StrictReader, StrictWriter};
use crate::crypto::{IssuerId, IssuerSigner, Signature, SignatureValidator, TaggedHasher};

static NO_INPUTS: BTreeSet<SealDefinition> = BTreeSet::new();

/// Root operation of a contract.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Genesis {
    pub schema_id: SchemaId,
    pub issuer: IssuerId,
    /// Issue time in seconds since the Unix epoch.
    pub timestamp: u64,
    pub testnet: bool,
    pub globals: GlobalState,
    pub assignments: OwnedAssignments,
}

impl Genesis {
    /// Derives the contract identifier from the canonical genesis encoding.
    #[must_use]
    pub fn contract_id(&self) -> ContractId {
        ContractId(TaggedHasher::hash(
            TaggedHasher::CONTRACT_TAG,
            &codec::to_vec(self),
        ))
    }
}

/// Genesis with the issuer's signature over its contract id.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SignedGenesis {
    pub genesis: Genesis,
    pub signature: Signature,
}

impl SignedGenesis {
    /// Signs `genesis` with the issuer key.
    #[must_use]
    pub fn sign(genesis: Genesis, signer: &IssuerSigner) -> Self {
        let signature = signer.sign(genesis.contract_id().as_bytes());
        Self { genesis, signature }
    }

    /// Checks the signature against the issuer declared in the genesis.
    #[must_use]
    pub fn verify(&self, validator: &dyn SignatureValidator) -> bool {
        validator.verify(
            self.genesis.contract_id().as_bytes(),
            &self.genesis.issuer,
            &self.signature,
        )
    }

    #[must_use]
    pub fn contract_id(&self) -> ContractId {
        self.genesis.contract_id()
    }
}

/// An operation spending owned state.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Transition {
    pub contract_id: ContractId,
    pub kind: TypeName,
    /// Seals closed by this transition.
    pub inputs: BTreeSet<SealDefinition>,
    pub globals: GlobalState,
    pub assignments: OwnedAssignments,
    /// Disambiguates otherwise identical operations.
    pub nonce: u64,
}

/// An operation contributing state without spending any seal.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Extension {
    pub contract_id: ContractId,
    pub kind: TypeName,
    pub globals: GlobalState,
    pub assignments: OwnedAssignments,
    pub nonce: u64,
}

/// Coarse classification of operations.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    Genesis,
    Transition,
    Extension,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Genesis => "genesis",
            Self::Transition => "transition",
            Self::Extension => "extension",
        })
    }
}

/// A node of a contract's operation graph.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Operation {
    Genesis(Genesis),
    Transition(Transition),
    Extension(Extension),
}

impl Operation {
    const TAG_GENESIS: u8 = 0;
    const TAG_TRANSITION: u8 = 1;
    const TAG_EXTENSION: u8 = 2;

    /// Content-derived identifier. For genesis this equals the contract id.
    #[must_use]
    pub fn id(&self) -> OperationId {
        match self {
            Self::Genesis(genesis) => genesis.contract_id().into(),
            _ => OperationId(TaggedHasher::hash(
                TaggedHasher::OPERATION_TAG,
                &codec::to_vec(self),
            )),
        }
    }

    #[must_use]
    pub fn contract_id(&self) -> ContractId {
        match self {
            Self::Genesis(genesis) => genesis.contract_id(),
            Self::Transition(transition) => transition.contract_id,
            Self::Extension(extension) => extension.contract_id,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::Genesis(_) => OperationKind::Genesis,
            Self::Transition(_) => OperationKind::Transition,
            Self::Extension(_) => OperationKind::Extension,
        }
    }

    /// Schema-declared kind name; `None` for genesis.
    #[must_use]
    pub const fn kind_name(&self) -> Option<&TypeName> {
        match self {
            Self::Genesis(_) => None,
            Self::Transition(transition) => Some(&transition.kind),
            Self::Extension(extension) => Some(&extension.kind),
        }
    }

    /// Seals closed by this operation.
    #[must_use]
    pub fn inputs(&self) -> &BTreeSet<SealDefinition> {
        match self {
            Self::Transition(transition) => &transition.inputs,
            Self::Genesis(_) | Self::Extension(_) => &NO_INPUTS,
        }
    }

    #[must_use]
    pub const fn globals(&self) -> &GlobalState {
        match self {
            Self::Genesis(genesis) => &genesis.globals,
            Self::Transition(transition) => &transition.globals,
            Self::Extension(extension) => &extension.globals,
        }
    }

    #[must_use]
    pub const fn assignments(&self) -> &OwnedAssignments {
        match self {
            Self::Genesis(genesis) => &genesis.assignments,
            Self::Transition(transition) => &transition.assignments,
            Self::Extension(extension) => &extension.assignments,
        }
    }

    /// Every `(type, seal, value)` assigned by this operation.
    pub fn outputs(&self) -> impl Iterator<Item = (&TypeName, &SealDefinition, &StateValue)> {
        self.assignments().iter().flat_map(|(name, seals)| {
            seals.iter().map(move |(seal, value)| (name, seal, value))
        })
    }

    #[must_use]
    pub fn is_genesis(&self) -> bool {
        matches!(self, Self::Genesis(_))
    }
}

impl StrictEncode for Genesis {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        self.schema_id.strict_encode(writer);
        self.issuer.strict_encode(writer);
        writer.write_u64(self.timestamp);
        self.testnet.strict_encode(writer);
        self.globals.strict_encode(writer);
        self.assignments.strict_encode(writer);
    }
}

impl StrictDecode for Genesis {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            schema_id: StrictDecode::strict_decode(reader)?,
            issuer: StrictDecode::strict_decode(reader)?,
            timestamp: reader.read_u64()?,
            testnet: StrictDecode::strict_decode(reader)?,
            globals: StrictDecode::strict_decode(reader)?,
            assignments: StrictDecode::strict_decode(reader)?,
        })
    }
}

impl StrictEncode for SignedGenesis {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        self.genesis.strict_encode(writer);
        self.signature.strict_encode(writer);
    }
}

impl StrictDecode for SignedGenesis {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            genesis: StrictDecode::strict_decode(reader)?,
            signature: StrictDecode::strict_decode(reader)?,
        })
    }
}

impl StrictEncode for Transition {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        self.contract_id.strict_encode(writer);
        self.kind.strict_encode(writer);
        self.inputs.strict_encode(writer);
        self.globals.strict_encode(writer);
        self.assignments.strict_encode(writer);
        writer.write_u64(self.nonce);
    }
}

impl StrictDecode for Transition {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            contract_id: StrictDecode::strict_decode(reader)?,
            kind: StrictDecode::strict_decode(reader)?,
            inputs: StrictDecode::strict_decode(reader)?,
            globals: StrictDecode::strict_decode(reader)?,
            assignments: StrictDecode::strict_decode(reader)?,
            nonce: reader.read_u64()?,
        })
    }
}

impl StrictEncode for Extension {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        self.contract_id.strict_encode(writer);
        self.kind.strict_encode(writer);
        self.globals.strict_encode(writer);
        self.assignments.strict_encode(writer);
        writer.write_u64(self.nonce);
    }
}

impl StrictDecode for Extension {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            contract_id: StrictDecode::strict_decode(reader)?,
            kind: StrictDecode::strict_decode(reader)?,
            globals: StrictDecode::strict_decode(reader)?,
            assignments: StrictDecode::strict_decode(reader)?,
            nonce: reader.read_u64()?,
        })
    }
}

impl StrictEncode for Operation {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        match self {
            Self::Genesis(genesis) => {
                writer.write_u8(Self::TAG_GENESIS);
                genesis.strict_encode(writer);
            },
            Self::Transition(transition) => {
                writer.write_u8(Self::TAG_TRANSITION);
                transition.strict_encode(writer);
            },
            Self::Extension(extension) => {
                writer.write_u8(Self::TAG_EXTENSION);
                extension.strict_encode(writer);
            },
        }
    }
}

impl StrictDecode for Operation {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        match reader.read_u8()? {
            Self::TAG_GENESIS => Genesis::strict_decode(reader).map(Self::Genesis),
            Self::TAG_TRANSITION => Transition::strict_decode(reader).map(Self::Transition),
            Self::TAG_EXTENSION => Extension::strict_decode(reader).map(Self::Extension),
            tag => Err(CodecError::InvalidTag {
                type_name: "Operation",
                tag,
            }),
        }
    }
}
