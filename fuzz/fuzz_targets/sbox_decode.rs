//! Fuzz target for the table decoder
//!
//! Arbitrary i32 tables must decode to a payload or an error, never
//! panic, over-read, or allocate past the declared capacity.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let table: Vec<i32> = data
        .chunks_exact(4)
        .map(|chunk| i32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    if let Ok(payload) = ghostclass_sbox::decode(&table) {
        assert!(payload.len() <= ghostclass_sbox::MAX_PAYLOAD);
    }
});
