//! Witness transactions and their on-chain status.

use serde::{Deserialize, Serialize};

use super::ids::{Commitment, OperationId, WitnessId};
use crate::codec::{CodecError, StrictDecode, StrictEncode, StrictReader, StrictWriter};
use crate::commitment::MerkleProof;

/// Chain status of a witness transaction as reported by a resolver.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum WitnessStatus {
    /// Seen but not mined.
    Tentative,
    /// Mined with the given number of confirmations.
    Mined { depth: u32 },
    /// Dropped, double-spent or reorganized out.
    Invalid,
}

impl WitnessStatus {
    const TAG_TENTATIVE: u8 = 0;
    const TAG_MINED: u8 = 1;
    const TAG_INVALID: u8 = 2;

    #[must_use]
    pub const fn is_valid(self) -> bool {
        !matches!(self, Self::Invalid)
    }

    /// Whether the witness is buried at least `min_confirmations` deep.
    #[must_use]
    pub const fn is_final(self, min_confirmations: u32) -> bool {
        matches!(self, Self::Mined { depth } if depth >= min_confirmations)
    }
}

/// Binds an operation to the transaction that closed its input seals.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Witness {
    pub id: WitnessId,
    pub opid: OperationId,
    /// Commitment the transaction publishes.
    pub commitment: Commitment,
    /// Proof that `opid` is committed under `commitment`.
    pub proof: MerkleProof,
}

impl StrictEncode for WitnessStatus {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        match self {
            Self::Tentative => writer.write_u8(Self::TAG_TENTATIVE),
            Self::Mined { depth } => {
                writer.write_u8(Self::TAG_MINED);
                writer.write_u32(*depth);
            },
            Self::Invalid => writer.write_u8(Self::TAG_INVALID),
        }
    }
}

impl StrictDecode for WitnessStatus {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        match reader.read_u8()? {
            Self::TAG_TENTATIVE => Ok(Self::Tentative),
            Self::TAG_MINED => Ok(Self::Mined {
                depth: reader.read_u32()?,
            }),
            Self::TAG_INVALID => Ok(Self::Invalid),
            tag => Err(CodecError::InvalidTag {
                type_name: "WitnessStatus",
                tag,
            }),
        }
    }
}

impl StrictEncode for Witness {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        self.id.strict_encode(writer);
        self.opid.strict_encode(writer);
        self.commitment.strict_encode(writer);
        self.proof.strict_encode(writer);
    }
}

impl StrictDecode for Witness {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            id: StrictDecode::strict_decode(reader)?,
            opid: StrictDecode::strict_decode(reader)?,
            commitment: StrictDecode::strict_decode(reader)?,
            proof: StrictDecode::strict_decode(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finality_threshold() {
        assert!(!WitnessStatus::Tentative.is_final(1));
        assert!(!WitnessStatus::Mined { depth: 5 }.is_final(6));
        assert!(WitnessStatus::Mined { depth: 6 }.is_final(6));
        assert!(!WitnessStatus::Invalid.is_valid());
    }

    #[test]
    fn test_status_json_shape() {
        let json = serde_json::to_string(&WitnessStatus::Mined { depth: 3 }).unwrap();
        assert_eq!(json, r#"{"status":"mined","depth":3}"#);
    }
}
