//! Codec error types.
//!
//! Every failure mode of parsing, editing, and serializing a class file:
//! - `Truncated` / `InvalidMagic` / `UnsupportedVersion`: rejected input
//! - `UnknownTag` / `IndexOutOfRange` / `WrongConstantKind`: pool damage
//! - `PoolFull` / `TooLarge`: edits that would overflow a count field

use thiserror::Error;

/// Convenience alias used throughout the codec.
pub type Result<T> = std::result::Result<T, ClassFileError>;

/// Errors produced by the class-file codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassFileError {
    /// Input ended before a required field could be read.
    #[error("truncated input: needed {needed} more byte(s) at offset {offset}")]
    Truncated {
        /// Offset at which the read was attempted.
        offset: usize,
        /// Number of bytes the read still required.
        needed: usize,
    },

    /// The first four bytes were not the class-file magic.
    #[error("invalid magic: expected {expected:#010x}, found {found:#010x}")]
    InvalidMagic {
        /// The magic the format mandates.
        expected: u32,
        /// What the input actually started with.
        found: u32,
    },

    /// Class-file version newer than the parser understands.
    #[error("unsupported class-file version {major}.{minor} (max major {max})")]
    UnsupportedVersion {
        /// Major version found in the input.
        major: u16,
        /// Minor version found in the input.
        minor: u16,
        /// Highest major version the parser accepts.
        max: u16,
    },

    /// A constant-pool entry used a tag the format does not define.
    #[error("unknown constant-pool tag {tag} at index {index}")]
    UnknownTag {
        /// The undefined tag byte.
        tag: u8,
        /// Pool index at which it appeared.
        index: u16,
    },

    /// A code array used an opcode the format does not define.
    #[error("unknown opcode {opcode:#04x} at pc {pc}")]
    UnknownOpcode {
        /// The undefined opcode byte.
        opcode: u8,
        /// Offset within the code array.
        pc: usize,
    },

    /// A pool index referenced a slot that does not exist.
    #[error("constant-pool index {index} out of range (count {count})")]
    IndexOutOfRange {
        /// The out-of-range index.
        index: u16,
        /// The pool's entry count (indices are valid in `1..count`).
        count: u16,
    },

    /// A pool index resolved to an entry of the wrong kind.
    #[error("constant-pool index {index} is a {found}, expected {expected}")]
    WrongConstantKind {
        /// The index that was resolved.
        index: u16,
        /// Kind the caller required.
        expected: &'static str,
        /// Kind actually stored there.
        found: &'static str,
    },

    /// An edit would grow the constant pool past 65534 entries.
    #[error("constant pool is full (65534 usable slots)")]
    PoolFull,

    /// A count or length no longer fits its on-disk field.
    #[error("{what} length {len} exceeds the format limit {limit}")]
    TooLarge {
        /// Which section overflowed.
        what: &'static str,
        /// The offending length.
        len: usize,
        /// The format's limit for it.
        limit: usize,
    },

    /// Structurally invalid content that has no more specific kind.
    #[error("malformed {what}: {detail}")]
    Malformed {
        /// Which structure was malformed.
        what: &'static str,
        /// Human-readable detail.
        detail: String,
    },
}
