//! Consignments: the minimal history that proves ownership of some seals.
//!
//! A consignment is what a sender hands a receiver. It carries the genesis,
//! every operation on the causal path from genesis to the transferred
//! seals, and the witness anchoring each of those operations. The receiver
//! replays it with [`import`] and trusts nothing it cannot validate.
//!
//! # Wire Format
//!
//! ```text
//! magic    8 bytes   "SEALCNSG"
//! version  2 bytes   major, minor
//! contract 32 bytes  ContractId
//! genesis            Option<SignedGenesis>
//! ops                Vec<Operation>, ancestors first
//! witnesses          Vec<Witness>, in operation order
//! ```
//!
//! Everything after the version is strict-encoded, so two encoders always
//! agree on the bytes of the same consignment.

mod export;
mod import;

#[cfg(test)]
mod tests;

pub use export::{ExportError, export};
pub use import::{ImportContext, ImportError, ImportOutcome, import};

use crate::codec::{self, CodecError, StrictDecode, StrictEncode, StrictReader, StrictWriter};
use crate::contract::{ContractId, Operation, OperationId, SignedGenesis, Witness};

/// Leading bytes of every consignment.
pub const MAGIC: [u8; 8] = *b"SEALCNSG";

/// Format version written by this crate.
pub const VERSION: [u8; 2] = [0, 1];

/// The fixed-size prefix of a consignment.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ConsignmentHeader {
    pub version: [u8; 2],
    pub contract_id: ContractId,
}

impl StrictEncode for ConsignmentHeader {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        writer.write_raw(&MAGIC);
        writer.write_raw(&self.version);
        self.contract_id.strict_encode(writer);
    }
}

impl StrictDecode for ConsignmentHeader {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        let magic: [u8; 8] = reader.read_array()?;
        if magic != MAGIC {
            return Err(CodecError::InvalidValue {
                type_name: "Consignment",
                reason: "bad magic".into(),
            });
        }
        let version: [u8; 2] = reader.read_array()?;
        if version[0] != VERSION[0] {
            return Err(CodecError::InvalidValue {
                type_name: "Consignment",
                reason: format!("unsupported version {}.{}", version[0], version[1]),
            });
        }
        Ok(Self {
            version,
            contract_id: ContractId::strict_decode(reader)?,
        })
    }
}

/// A contract history slice ready for transfer.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Consignment {
    pub contract_id: ContractId,
    /// Required when the receiver does not know the contract yet.
    pub genesis: Option<SignedGenesis>,
    /// Non-genesis operations, ancestors before descendants.
    pub operations: Vec<Operation>,
    /// One witness per operation.
    pub witnesses: Vec<Witness>,
}

impl Consignment {
    /// Encodes the consignment in its wire format.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        codec::to_vec(self)
    }

    /// Decodes a consignment.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the bytes are not a well-formed
    /// consignment of a supported version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        codec::from_slice(bytes)
    }

    /// Decodes only the header, leaving the body unread.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the header is malformed.
    pub fn peek_header(bytes: &[u8]) -> Result<ConsignmentHeader, CodecError> {
        ConsignmentHeader::strict_decode(&mut StrictReader::new(bytes))
    }

    /// Identifiers of the carried operations, in order.
    pub fn operation_ids(&self) -> impl Iterator<Item = OperationId> + '_ {
        self.operations.iter().map(Operation::id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl StrictEncode for Consignment {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        ConsignmentHeader {
            version: VERSION,
            contract_id: self.contract_id,
        }
        .strict_encode(writer);
        self.genesis.strict_encode(writer);
        self.operations.strict_encode(writer);
        self.witnesses.strict_encode(writer);
    }
}

impl StrictDecode for Consignment {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        let header = ConsignmentHeader::strict_decode(reader)?;
        Ok(Self {
            contract_id: header.contract_id,
            genesis: StrictDecode::strict_decode(reader)?,
            operations: StrictDecode::strict_decode(reader)?,
            witnesses: StrictDecode::strict_decode(reader)?,
        })
    }
}
