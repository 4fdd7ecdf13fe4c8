//! Single-use seal definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::ids::Txid;
use crate::codec::{CodecError, StrictDecode, StrictEncode, StrictReader, StrictWriter};

/// A Bitcoin transaction output.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Outpoint {
    pub txid: Txid,
    pub vout: u32,
}

impl Outpoint {
    #[must_use]
    pub const fn new(txid: Txid, vout: u32) -> Self {
        Self { txid, vout }
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// A single-use seal: an outpoint plus a blinding factor.
///
/// The seal is *open* while its outpoint is unspent and *closed* once a
/// witness transaction spends it. The blinding factor lets the same outpoint
/// carry distinct seals across unrelated contracts.
///
/// Serializes as its display string so it can key JSON maps.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SealDefinition {
    pub outpoint: Outpoint,
    pub blinding: u64,
}

impl SealDefinition {
    #[must_use]
    pub const fn new(txid: Txid, vout: u32, blinding: u64) -> Self {
        Self {
            outpoint: Outpoint::new(txid, vout),
            blinding,
        }
    }
}

/// Renders as `<txid>:<vout>:<blinding>`.
impl fmt::Display for SealDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.outpoint, self.blinding)
    }
}

/// Error parsing a seal definition string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid seal definition '{input}': expected <txid>:<vout>:<blinding>")]
pub struct SealParseError {
    input: String,
}

impl FromStr for SealDefinition {
    type Err = SealParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || SealParseError {
            input: s.to_string(),
        };
        let mut parts = s.split(':');
        let (Some(txid), Some(vout), Some(blinding), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(err());
        };
        Ok(Self::new(
            txid.parse().map_err(|_| err())?,
            vout.parse().map_err(|_| err())?,
            blinding.parse().map_err(|_| err())?,
        ))
    }
}

impl Serialize for SealDefinition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SealDefinition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl StrictEncode for Outpoint {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        self.txid.strict_encode(writer);
        writer.write_u32(self.vout);
    }
}

impl StrictDecode for Outpoint {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            txid: Txid::strict_decode(reader)?,
            vout: reader.read_u32()?,
        })
    }
}

impl StrictEncode for SealDefinition {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        self.outpoint.strict_encode(writer);
        writer.write_u64(self.blinding);
    }
}

impl StrictDecode for SealDefinition {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            outpoint: Outpoint::strict_decode(reader)?,
            blinding: reader.read_u64()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_string_round_trip() {
        let seal = SealDefinition::new(Txid::from_bytes([0x11; 32]), 3, 42);
        let text = seal.to_string();
        assert_eq!(text.parse::<SealDefinition>().unwrap(), seal);
    }

    #[test]
    fn test_seal_parse_rejects_malformed() {
        assert!("abc".parse::<SealDefinition>().is_err());
        let txid = Txid::from_bytes([0x11; 32]);
        assert!(format!("{txid}:1").parse::<SealDefinition>().is_err());
        assert!(format!("{txid}:1:2:3").parse::<SealDefinition>().is_err());
        assert!(format!("{txid}:x:2").parse::<SealDefinition>().is_err());
    }

    #[test]
    fn test_seal_keys_json_map() {
        let seal = SealDefinition::new(Txid::from_bytes([0x22; 32]), 0, 7);
        let map = std::collections::BTreeMap::from([(seal, 5u64)]);
        let json = serde_json::to_string(&map).unwrap();
        let back: std::collections::BTreeMap<SealDefinition, u64> =
            serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
