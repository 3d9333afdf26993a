//! Round-trippable class-file codec.
//!
//! Parses a compiled class file for a stack-based VM into an editable
//! tree and serializes it back. The contract that everything else is
//! built on: `serialize(parse(x)) == x` for any input that parses, and
//! any region an edit did not touch is emitted byte-for-byte.
//!
//! The codec is a pure function on byte arrays: no I/O, no shared state,
//! safe to run concurrently on distinct inputs.
//!
//! # Editing
//!
//! Edits go through the tree: [`ConstantPool`]'s `intern_*` family (which
//! dedupes and enforces the 65534-slot ceiling), and [`ClassFile`]'s
//! `append_attribute` / `append_field` / `prepend_clinit`. The
//! [`visitor::walk`] event walk serves read-only scans.

#![forbid(unsafe_code)]

pub mod attributes;
pub mod class;
pub mod code;
pub mod errors;
pub mod opcodes;
pub mod pool;
pub mod reader;
pub mod visitor;

pub use attributes::{
    known, Attribute, AttributeInfo, BootstrapMethod, CodeAttribute, ExceptionEntry, FrameBody,
    StackMapFrame, VerificationType,
};
pub use class::{
    flags, ClassFile, ClinitPrefix, Member, CLINIT_DESCRIPTOR, CLINIT_NAME, MAGIC,
    MAX_MAJOR_VERSION,
};
pub use code::{instructions, Instruction, Instructions};
pub use errors::{ClassFileError, Result};
pub use pool::{tags, Constant, ConstantPool, MAX_POOL_SLOTS};
pub use reader::ClassReader;
pub use visitor::{walk, ClassVisitor};
