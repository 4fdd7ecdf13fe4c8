//! Tests for the strict codec.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use super::*;

#[test]
fn test_varint_boundaries() {
    let cases: &[(u64, &[u8])] = &[
        (0, &[0x00]),
        (0xFC, &[0xFC]),
        (0xFD, &[0xFD, 0xFD, 0x00]),
        (0xFFFF, &[0xFD, 0xFF, 0xFF]),
        (0x1_0000, &[0xFE, 0x00, 0x00, 0x01, 0x00]),
        (
            0x1_0000_0000,
            &[0xFF, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00],
        ),
    ];
    for (value, expected) in cases {
        let mut writer = StrictWriter::new();
        writer.write_varint(*value);
        assert_eq!(writer.into_bytes(), *expected, "encoding of {value}");

        let mut reader = StrictReader::new(expected);
        assert_eq!(reader.read_varint().unwrap(), *value);
        assert!(reader.is_exhausted());
    }
}

#[test]
fn test_varint_rejects_overlong() {
    // 0x10 encoded in the three-byte form.
    let mut reader = StrictReader::new(&[0xFD, 0x10, 0x00]);
    assert_eq!(
        reader.read_varint(),
        Err(CodecError::NonMinimalVarInt { value: 0x10 })
    );

    let mut reader = StrictReader::new(&[0xFE, 0xFF, 0xFF, 0x00, 0x00]);
    assert!(matches!(
        reader.read_varint(),
        Err(CodecError::NonMinimalVarInt { .. })
    ));
}

#[test]
fn test_trailing_bytes_rejected() {
    let mut bytes = to_vec(&7u32);
    bytes.push(0);
    assert_eq!(
        from_slice::<u32>(&bytes),
        Err(CodecError::TrailingBytes { count: 1 })
    );
}

#[test]
fn test_truncated_input_rejected() {
    let bytes = to_vec(&"hello".to_string());
    let result = from_slice::<String>(&bytes[..bytes.len() - 1]);
    assert!(matches!(result, Err(CodecError::UnexpectedEof { .. })));
}

#[test]
fn test_invalid_bool_rejected() {
    assert!(matches!(
        from_slice::<bool>(&[2]),
        Err(CodecError::InvalidTag {
            type_name: "bool",
            tag: 2
        })
    ));
}

#[test]
fn test_invalid_utf8_rejected() {
    assert_eq!(
        from_slice::<String>(&[2, 0xC3, 0x28]),
        Err(CodecError::InvalidUtf8)
    );
}

#[test]
fn test_map_keys_sorted_by_encoding() {
    // "b" encodes as [1, 'b'] and "aa" as [2, 'a', 'a'], so the shorter key
    // sorts first even though "aa" < "b" as strings.
    let mut map = BTreeMap::new();
    map.insert("aa".to_string(), 1u8);
    map.insert("b".to_string(), 2u8);

    let bytes = to_vec(&map);
    assert_eq!(bytes, vec![2, 1, b'b', 2, 2, b'a', b'a', 1]);
    assert_eq!(from_slice::<BTreeMap<String, u8>>(&bytes).unwrap(), map);
}

#[test]
fn test_map_rejects_out_of_order_keys() {
    let bytes = vec![2, 2, b'a', b'a', 1, 1, b'b', 2];
    assert_eq!(
        from_slice::<BTreeMap<String, u8>>(&bytes),
        Err(CodecError::NonCanonicalOrder {
            type_name: "BTreeMap"
        })
    );
}

#[test]
fn test_set_rejects_duplicates() {
    let bytes = vec![2, 5, 0, 0, 0, 5, 0, 0, 0];
    assert_eq!(
        from_slice::<BTreeSet<u32>>(&bytes),
        Err(CodecError::NonCanonicalOrder {
            type_name: "BTreeSet"
        })
    );
}

#[test]
fn test_oversized_collection_rejected_before_allocation() {
    let mut writer = StrictWriter::new();
    writer.write_varint(u64::MAX);
    let bytes = writer.into_bytes();
    assert!(matches!(
        from_slice::<Vec<u8>>(&bytes),
        Err(CodecError::LengthExceeded { .. })
    ));

    let mut writer = StrictWriter::new();
    writer.write_varint(1000);
    let bytes = writer.into_bytes();
    assert!(matches!(
        from_slice::<Vec<u64>>(&bytes),
        Err(CodecError::UnexpectedEof { .. })
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_varint_round_trip(value in any::<u64>()) {
        let mut writer = StrictWriter::new();
        writer.write_varint(value);
        let bytes = writer.into_bytes();
        let mut reader = StrictReader::new(&bytes);
        prop_assert_eq!(reader.read_varint().unwrap(), value);
        prop_assert!(reader.is_exhausted());
    }

    #[test]
    fn prop_map_round_trip(entries in proptest::collection::vec((".{0,12}", any::<u64>()), 0..24)) {
        let map: BTreeMap<String, u64> = entries.into_iter().collect();
        let bytes = to_vec(&map);
        prop_assert_eq!(from_slice::<BTreeMap<String, u64>>(&bytes).unwrap(), map);
    }

    /// Encoding must not depend on the order entries were inserted.
    #[test]
    fn prop_map_encoding_order_independent(
        entries in proptest::collection::vec(("[a-z]{0,6}", any::<u32>()), 0..16)
    ) {
        let forward: BTreeMap<String, u32> = entries.iter().cloned().collect();
        let mut reversed = BTreeMap::new();
        for (key, value) in entries.iter().rev() {
            reversed.entry(key.clone()).or_insert(*value);
        }
        // Align values for duplicate keys so both maps hold the same data.
        for (key, value) in &forward {
            reversed.insert(key.clone(), *value);
        }
        prop_assert_eq!(to_vec(&forward), to_vec(&reversed));
    }

    #[test]
    fn prop_nested_round_trip(
        items in proptest::collection::vec(
            (any::<bool>(), proptest::option::of(any::<[u8; 4]>()), proptest::collection::vec(any::<u8>(), 0..40)),
            0..10,
        )
    ) {
        let value: Vec<(bool, (Option<[u8; 4]>, Vec<u8>))> =
            items.into_iter().map(|(a, b, c)| (a, (b, c))).collect();
        let bytes = to_vec(&value);
        prop_assert_eq!(from_slice::<Vec<(bool, (Option<[u8; 4]>, Vec<u8>))>>(&bytes).unwrap(), value);
    }
}
