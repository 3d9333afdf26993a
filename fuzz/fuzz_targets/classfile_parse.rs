//! Fuzz target for ClassFile::parse
//!
//! This fuzzer feeds arbitrary byte sequences to the parser to find:
//! - Panics or integer overflows in section length handling
//! - Buffer over-reads around the constant pool's two-slot entries
//! - Round-trip violations (anything that parses must re-serialize to
//!   the identical bytes)
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use ghostclass_classfile::ClassFile;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(class) = ClassFile::parse(data) {
        let bytes = class.serialize().expect("parsed trees must serialize");
        assert_eq!(bytes, data, "round-trip must be identity");
    }
});
