//! Fuzz harness for consignment decoding.
//!
//! Arbitrary bytes must either decode or fail with a `CodecError`; a
//! successful decode must re-encode to the same bytes and agree with the
//! header-only decode.

#![no_main]
use libfuzzer_sys::fuzz_target;
use sealtrail_core::consignment::Consignment;

fuzz_target!(|data: &[u8]| {
    let header = Consignment::peek_header(data);
    let Ok(consignment) = Consignment::from_bytes(data) else {
        return;
    };

    let header = header.expect("full decode succeeded but header decode failed");
    assert_eq!(header.contract_id, consignment.contract_id);
    assert_eq!(consignment.to_bytes(), data, "decoding is not canonical");

    let _ = consignment.operation_ids().count();
});
