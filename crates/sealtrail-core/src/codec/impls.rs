//! Strict encoding for primitive and collection types.

use std::collections::{BTreeMap, BTreeSet};

use super::{
    CodecError, MAX_COLLECTION_LEN, MAX_STRING_LEN, StrictDecode, StrictEncode, StrictReader,
    StrictWriter,
};

impl StrictEncode for u8 {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        writer.write_u8(*self);
    }
}

impl StrictDecode for u8 {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        reader.read_u8()
    }
}

impl StrictEncode for u16 {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        writer.write_u16(*self);
    }
}

impl StrictDecode for u16 {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        reader.read_u16()
    }
}

impl StrictEncode for u32 {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        writer.write_u32(*self);
    }
}

impl StrictDecode for u32 {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        reader.read_u32()
    }
}

impl StrictEncode for u64 {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        writer.write_u64(*self);
    }
}

impl StrictDecode for u64 {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        reader.read_u64()
    }
}

impl StrictEncode for bool {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        writer.write_u8(u8::from(*self));
    }
}

impl StrictDecode for bool {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        match reader.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            tag => Err(CodecError::InvalidTag {
                type_name: "bool",
                tag,
            }),
        }
    }
}

impl<const N: usize> StrictEncode for [u8; N] {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        writer.write_raw(self);
    }
}

impl<const N: usize> StrictDecode for [u8; N] {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        reader.read_array()
    }
}

impl StrictEncode for str {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        writer.write_bytes(self.as_bytes());
    }
}

impl StrictEncode for String {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        self.as_str().strict_encode(writer);
    }
}

impl StrictDecode for String {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        let bytes = reader.read_bytes(MAX_STRING_LEN)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8)
    }
}

impl<T: StrictEncode + ?Sized> StrictEncode for &T {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        (**self).strict_encode(writer);
    }
}

impl<T: StrictEncode> StrictEncode for Option<T> {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        match self {
            None => writer.write_u8(0),
            Some(value) => {
                writer.write_u8(1);
                value.strict_encode(writer);
            },
        }
    }
}

impl<T: StrictDecode> StrictDecode for Option<T> {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        match reader.read_u8()? {
            0 => Ok(None),
            1 => T::strict_decode(reader).map(Some),
            tag => Err(CodecError::InvalidTag {
                type_name: "Option",
                tag,
            }),
        }
    }
}

impl<A: StrictEncode, B: StrictEncode> StrictEncode for (A, B) {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        self.0.strict_encode(writer);
        self.1.strict_encode(writer);
    }
}

impl<A: StrictDecode, B: StrictDecode> StrictDecode for (A, B) {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        Ok((A::strict_decode(reader)?, B::strict_decode(reader)?))
    }
}

impl<T: StrictEncode> StrictEncode for [T] {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        writer.write_len(self.len());
        for item in self {
            item.strict_encode(writer);
        }
    }
}

impl<T: StrictEncode> StrictEncode for Vec<T> {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        self.as_slice().strict_encode(writer);
    }
}

impl<T: StrictDecode> StrictDecode for Vec<T> {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        let len = reader.read_len(MAX_COLLECTION_LEN)?;
        // Every element occupies at least one byte.
        if len > reader.remaining() {
            return Err(CodecError::UnexpectedEof {
                needed: len,
                remaining: reader.remaining(),
            });
        }
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(T::strict_decode(reader)?);
        }
        Ok(items)
    }
}

impl<K: StrictEncode, V: StrictEncode> StrictEncode for BTreeMap<K, V> {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        let mut entries: Vec<(Vec<u8>, &V)> = self
            .iter()
            .map(|(key, value)| (super::to_vec(key), value))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        writer.write_len(entries.len());
        for (key, value) in entries {
            writer.write_raw(&key);
            value.strict_encode(writer);
        }
    }
}

impl<K: StrictDecode + Ord, V: StrictDecode> StrictDecode for BTreeMap<K, V> {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        let len = reader.read_len(MAX_COLLECTION_LEN)?;
        let mut map = Self::new();
        let mut prev_key: Option<&[u8]> = None;
        for _ in 0..len {
            let start = reader.position();
            let key = K::strict_decode(reader)?;
            let key_bytes = reader.slice_since(start);
            if prev_key.is_some_and(|prev| prev >= key_bytes) {
                return Err(CodecError::NonCanonicalOrder {
                    type_name: "BTreeMap",
                });
            }
            prev_key = Some(key_bytes);
            let value = V::strict_decode(reader)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<T: StrictEncode> StrictEncode for BTreeSet<T> {
    fn strict_encode(&self, writer: &mut StrictWriter) {
        let mut items: Vec<Vec<u8>> = self.iter().map(super::to_vec).collect();
        items.sort();

        writer.write_len(items.len());
        for item in items {
            writer.write_raw(&item);
        }
    }
}

impl<T: StrictDecode + Ord> StrictDecode for BTreeSet<T> {
    fn strict_decode(reader: &mut StrictReader<'_>) -> Result<Self, CodecError> {
        let len = reader.read_len(MAX_COLLECTION_LEN)?;
        let mut set = Self::new();
        let mut prev: Option<&[u8]> = None;
        for _ in 0..len {
            let start = reader.position();
            let item = T::strict_decode(reader)?;
            let item_bytes = reader.slice_since(start);
            if prev.is_some_and(|prev| prev >= item_bytes) {
                return Err(CodecError::NonCanonicalOrder {
                    type_name: "BTreeSet",
                });
            }
            prev = Some(item_bytes);
            set.insert(item);
        }
        Ok(set)
    }
}
