//! Fuzz target for the combined reveal path
//!
//! Drives the full pipeline (parse, candidate scan, initializer
//! simulation, container decode) with arbitrary bytes. The simulator in
//! particular must tolerate hostile instruction streams without panics
//! or unbounded allocation.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = ghostclass_conceal::reveal_auto(data);
});
