//! Ed25519 issuer signatures.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::hash::Hash;
use crate::codec::{CodecError, StrictDecode, StrictEncode, StrictReader, StrictWriter};

/// Size of an Ed25519 public key in bytes.
pub const ISSUER_ID_SIZE: usize = 32;

/// Size of an Ed25519 signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Identity of a contract issuer: an Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IssuerId(pub [u8; ISSUER_ID_SIZE]);

impl fmt::Display for IssuerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for IssuerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IssuerId({self})")
    }
}

impl FromStr for IssuerId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; ISSUER_ID_SIZE];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for IssuerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IssuerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A detached Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; SIGNATURE_SIZE]);

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}

impl StrictEncode for IssuerId {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        writer.write_raw(&self.0);
    }
}

impl StrictDecode for IssuerId {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        reader.read_array().map(Self)
    }
}

impl StrictEncode for Signature {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        writer.write_raw(&self.0);
    }
}

impl StrictDecode for Signature {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        reader.read_array().map(Self)
    }
}

/// Verifies issuer signatures over genesis content hashes.
///
/// Consignment import consults the validator exactly once per newly seen
/// contract.
pub trait SignatureValidator: Send + Sync {
    /// Returns `true` iff `signature` is a valid signature by `issuer` over
    /// `content_hash`.
    fn verify(&self, content_hash: &Hash, issuer: &IssuerId, signature: &Signature) -> bool;
}

/// Strict Ed25519 signature validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Validator;

impl SignatureValidator for Ed25519Validator {
    fn verify(&self, content_hash: &Hash, issuer: &IssuerId, signature: &Signature) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&issuer.0) else {
            return false;
        };
        let signature = ed25519_dalek::Signature::from_bytes(&signature.0);
        key.verify_strict(content_hash, &signature).is_ok()
    }
}

/// Signing half of an issuer identity.
pub struct IssuerSigner {
    key: SigningKey,
}

impl IssuerSigner {
    /// Builds a signer from a 32-byte Ed25519 secret.
    #[must_use]
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(secret),
        }
    }

    /// Public identity matching this signer.
    #[must_use]
    pub fn issuer_id(&self) -> IssuerId {
        IssuerId(self.key.verifying_key().to_bytes())
    }

    /// Signs a content hash.
    #[must_use]
    pub fn sign(&self, content_hash: &Hash) -> Signature {
        Signature(self.key.sign(content_hash).to_bytes())
    }
}

impl fmt::Debug for IssuerSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuerSigner")
            .field("issuer", &self.issuer_id())
            .finish_non_exhaustive()
    }
}
