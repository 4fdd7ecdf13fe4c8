//! 256-bit protocol identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::codec::{CodecError, StrictDecode, StrictEncode, StrictReader, StrictWriter};

/// Error parsing a hex-rendered identifier.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("invalid {type_name}: {source}")]
pub struct IdParseError {
    type_name: &'static str,
    #[source]
    source: hex::FromHexError,
}

macro_rules! hash_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            #[must_use]
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            #[must_use]
            pub const fn to_bytes(self) -> [u8; 32] {
                self.0
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let mut bytes = [0u8; 32];
                hex::decode_to_slice(s, &mut bytes).map_err(|source| IdParseError {
                    type_name: stringify!($name),
                    source,
                })?;
                Ok(Self(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }

        impl StrictEncode for $name {
            fn strict_encode(&self, writer: &mut StrictWriter) {
                writer.write_raw(&self.0);
            }
        }

        impl StrictDecode for $name {
            fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
                reader.read_array().map(Self)
            }
        }
    };
}

hash_id!(
    /// Identifier of a contract: the tagged hash of its genesis.
    ContractId
);

hash_id!(
    /// Identifier of a schema: the tagged hash of its canonical encoding.
    SchemaId
);

hash_id!(
    /// Identifier of an operation: the tagged hash of its canonical encoding.
    OperationId
);

hash_id!(
    /// Identifier of a witness transaction.
    WitnessId
);

hash_id!(
    /// Bitcoin transaction identifier.
    Txid
);

hash_id!(
    /// A 32-byte commitment published by a witness transaction.
    Commitment
);

impl From<ContractId> for OperationId {
    fn from(id: ContractId) -> Self {
        Self(id.0)
    }
}

impl From<WitnessId> for Txid {
    fn from(id: WitnessId) -> Self {
        Self(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    #[test]
    fn test_display_parse_round_trip() {
        let id = ContractId::from_bytes([0xAB; 32]);
        let text = id.to_string();
        assert_eq!(text.len(), 64);
        assert_eq!(text.parse::<ContractId>().unwrap(), id);
    }

    #[test]
    fn test_parse_rejects_bad_hex() {
        assert!("zz".parse::<OperationId>().is_err());
        assert!("abcd".parse::<OperationId>().is_err());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let id = SchemaId::from_bytes([1; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        assert_eq!(serde_json::from_str::<SchemaId>(&json).unwrap(), id);
    }

    #[test]
    fn test_strict_encoding_is_raw() {
        let id = WitnessId::from_bytes([5; 32]);
        let bytes = codec::to_vec(&id);
        assert_eq!(bytes, vec![5; 32]);
        assert_eq!(codec::from_slice::<WitnessId>(&bytes).unwrap(), id);
    }
}
