//! Typed state atoms and assignments.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::seal::SealDefinition;
use crate::codec::{CodecError, StrictDecode, StrictEncode, StrictReader, StrictWriter};

/// Maximum length of a state or operation-kind name in bytes.
pub const MAX_NAME_LEN: usize = 64;

/// Maximum length of a structured data value in bytes.
pub const MAX_DATA_LEN: usize = 1 << 16;

/// Name of a global state type, owned state type or operation kind.
///
/// Names are 1 to 64 ASCII characters drawn from letters, digits, `_`, `-`
/// and `.`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeName(Cow<'static, str>);

impl TypeName {
    /// Checks a candidate name.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the name is invalid.
    pub fn try_new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(format!(
                "name must be 1..={MAX_NAME_LEN} bytes, got {}",
                name.len()
            ));
        }
        if let Some(c) = name.chars().find(|c| !is_name_char(*c)) {
            return Err(format!("invalid character {c:?} in name '{name}'"));
        }
        Ok(Self(Cow::Owned(name)))
    }

    /// Builds a name from a literal, checked at compile time when used in a
    /// `const` item.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a valid name.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        assert!(is_valid_static(name), "invalid static type name");
        Self(Cow::Borrowed(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

const fn is_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b'.')
}

fn is_name_char(c: char) -> bool {
    u8::try_from(c).is_ok_and(is_name_byte)
}

const fn is_valid_static(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_NAME_LEN {
        return false;
    }
    let mut index = 0;
    while index < bytes.len() {
        if !is_name_byte(bytes[index]) {
            return false;
        }
        index += 1;
    }
    true
}

impl TryFrom<String> for TypeName {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::try_new(name)
    }
}

impl From<TypeName> for String {
    fn from(name: TypeName) -> Self {
        name.0.into_owned()
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl std::borrow::Borrow<str> for TypeName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl StrictEncode for TypeName {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        self.as_str().strict_encode(writer);
    }
}

impl StrictDecode for TypeName {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        let raw = reader.read_bytes(MAX_NAME_LEN)?;
        let name = std::str::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8)?;
        Self::try_new(name).map_err(|reason| CodecError::InvalidValue {
            type_name: "TypeName",
            reason,
        })
    }
}

/// A typed state atom.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum StateValue {
    /// Rights-only state carrying no value.
    Void,
    /// Fungible amount.
    Amount(u64),
    /// Opaque structured data.
    Data(#[serde(with = "hex_bytes")] Vec<u8>),
    /// Non-fungible token: index plus unit amount.
    Token { index: u32, amount: u64 },
}

impl StateValue {
    const TAG_VOID: u8 = 0;
    const TAG_AMOUNT: u8 = 1;
    const TAG_DATA: u8 = 2;
    const TAG_TOKEN: u8 = 3;

    /// The fungible amount, if this is an [`Amount`](Self::Amount).
    #[must_use]
    pub const fn amount(&self) -> Option<u64> {
        match self {
            Self::Amount(amount) => Some(*amount),
            _ => None,
        }
    }

    /// Convenience constructor for UTF-8 data.
    #[must_use]
    pub fn text(text: &str) -> Self {
        Self::Data(text.as_bytes().to_vec())
    }
}

impl StrictEncode for StateValue {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        match self {
            Self::Void => writer.write_u8(Self::TAG_VOID),
            Self::Amount(amount) => {
                writer.write_u8(Self::TAG_AMOUNT);
                writer.write_u64(*amount);
            },
            Self::Data(data) => {
                writer.write_u8(Self::TAG_DATA);
                writer.write_bytes(data);
            },
            Self::Token { index, amount } => {
                writer.write_u8(Self::TAG_TOKEN);
                writer.write_u32(*index);
                writer.write_u64(*amount);
            },
        }
    }
}

impl StrictDecode for StateValue {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        match reader.read_u8()? {
            Self::TAG_VOID => Ok(Self::Void),
            Self::TAG_AMOUNT => Ok(Self::Amount(reader.read_u64()?)),
            Self::TAG_DATA => Ok(Self::Data(reader.read_bytes(MAX_DATA_LEN)?.to_vec())),
            Self::TAG_TOKEN => Ok(Self::Token {
                index: reader.read_u32()?,
                amount: reader.read_u64()?,
            }),
            tag => Err(CodecError::InvalidTag {
                type_name: "StateValue",
                tag,
            }),
        }
    }
}

/// Global state declared by an operation: values per global type, in
/// declaration order.
pub type GlobalState = BTreeMap<TypeName, Vec<StateValue>>;

/// Owned state assigned by an operation: for each owned type, the seals it
/// assigns to and the value each carries.
pub type OwnedAssignments = BTreeMap<TypeName, BTreeMap<SealDefinition, StateValue>>;

/// A seal paired with the owned value it carries.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Assignment {
    pub seal: SealDefinition,
    pub value: StateValue,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, T: AsRef<[u8]>>(
        bytes: T,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes.as_ref()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
