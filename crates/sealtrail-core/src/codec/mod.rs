//! Strict consensus codec.
//!
//! Deterministic binary encoding for every protocol value. The bytes produced
//! here are what identifiers and commitments hash, so two independent
//! encoders must agree on every byte for the same logical value.
//!
//! # Encoding Rules
//!
//! 1. Fixed-width integers are little-endian.
//! 2. Lengths and counts use a compact prefix: values below `0xFD` take one
//!    byte; larger values are tagged `0xFD`/`0xFE`/`0xFF` followed by a
//!    `u16`/`u32`/`u64`. The shortest form is mandatory.
//! 3. Byte strings, strings and collections are length-prefixed, never
//!    delimiter-terminated.
//! 4. Maps and sets are written in byte-lexicographic order of the encoded
//!    key, independent of in-memory ordering or insertion order.
//! 5. Enums are a one-byte tag followed by the variant payload.
//!
//! Decoding rejects truncated input, trailing bytes, non-minimal length
//! prefixes, out-of-order or duplicate keys, unknown tags and invalid UTF-8.
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//!
//! use sealtrail_core::codec::{self, StrictDecode};
//!
//! let mut map = BTreeMap::new();
//! map.insert("zebra".to_string(), 1u64);
//! map.insert("ant".to_string(), 2u64);
//!
//! let bytes = codec::to_vec(&map);
//! let decoded: BTreeMap<String, u64> = codec::from_slice(&bytes).unwrap();
//! assert_eq!(decoded, map);
//! ```

mod impls;
mod reader;
mod writer;

#[cfg(test)]
mod tests;

pub use reader::StrictReader;
use thiserror::Error;
pub use writer::StrictWriter;

/// Upper bound on the element count of any decoded collection.
pub const MAX_COLLECTION_LEN: usize = 1 << 20;

/// Upper bound on the byte length of any decoded string.
pub const MAX_STRING_LEN: usize = 1 << 16;

/// Errors produced while decoding strict-encoded bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    /// The input ended before the value was complete.
    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes required by the current read.
        needed: usize,
        /// Bytes left in the input.
        remaining: usize,
    },

    /// Bytes remained after the top-level value was decoded.
    #[error("{count} trailing bytes after value")]
    TrailingBytes {
        /// Number of unread bytes.
        count: usize,
    },

    /// A compact integer used a longer form than required.
    #[error("non-minimal compact integer encoding for {value}")]
    NonMinimalVarInt {
        /// The decoded value.
        value: u64,
    },

    /// A length prefix exceeded the permitted maximum.
    #[error("length {len} exceeds maximum {max}")]
    LengthExceeded {
        /// The declared length.
        len: u64,
        /// The permitted maximum.
        max: usize,
    },

    /// An enum tag did not match any known variant.
    #[error("invalid tag {tag:#04x} for {type_name}")]
    InvalidTag {
        /// Name of the type being decoded.
        type_name: &'static str,
        /// The offending tag byte.
        tag: u8,
    },

    /// A string was not valid UTF-8.
    #[error("invalid UTF-8 in string")]
    InvalidUtf8,

    /// Map or set keys were not in strictly increasing canonical order.
    #[error("non-canonical key order in {type_name}")]
    NonCanonicalOrder {
        /// Name of the collection type being decoded.
        type_name: &'static str,
    },

    /// A value was structurally well-formed but semantically invalid.
    #[error("invalid {type_name}: {reason}")]
    InvalidValue {
        /// Name of the type being decoded.
        type_name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// A value with a canonical strict encoding.
pub trait StrictEncode {
    /// Appends the canonical encoding of `self` to `writer`.
    fn strict_encode(&self, writer: &mut StrictWriter);
}

/// A value decodable from its canonical strict encoding.
pub trait StrictDecode: Sized {
    /// Reads one value from `reader`.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] when the bytes are malformed.
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError>;
}

/// Encodes a value into a fresh byte vector.
#[must_use]
pub fn to_vec<T: StrictEncode + ?Sized>(value: &T) -> Vec<u8> {
    let mut writer = StrictWriter::new();
    value.strict_encode(&mut writer);
    writer.into_bytes()
}

/// Decodes a value that must span the whole input.
///
/// # Errors
///
/// Returns [`CodecError::TrailingBytes`] if bytes remain after the value, or
/// any other [`CodecError`] if the value itself is malformed.
pub fn from_slice<T: StrictDecode>(bytes: &[u8]) -> Result<T, CodecError> {
    let mut reader = StrictReader::new(bytes);
    let value = T::strict_decode(&mut reader)?;
    reader.finish()?;
    Ok(value)
}
