//! Payload codec shaped like a cryptographic substitution table.
//!
//! An arbitrary byte string is packed into a fixed-size table of 32-bit
//! signed integers that passes for an S-Box: random head, CRC32, payload
//! words, random noise, and a tail that XOR-binds the head to the payload
//! length. The table carries everything needed to reverse the packing:
//!
//! ```text
//! slot 0            r, drawn from OS entropy
//! slot 1            CRC32(payload), reinterpreted as i32
//! slots 2..2+W      payload bytes, 4 per slot, big-endian, zero-padded
//! slots 2+W..N-2    noise, drawn from OS entropy
//! slot N-1          r XOR payload_len
//! ```
//!
//! The length never appears in the clear: `slot[0] ^ slot[N-1]` recovers
//! it (the implicit length signature). Decoding verifies both the length
//! identity and the CRC before returning anything.
//!
//! Encoding is intentionally non-deterministic: two encodes of one
//! payload share only the CRC slot and the payload words. The entropy
//! source is the OS's; a predictable generator here would let an observer
//! recognize the construction from the noise slots.

#![forbid(unsafe_code)]

use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// Table sizes the format permits, in slots.
pub const TABLE_SIZES: [usize; 3] = [128, 192, 256];

/// Payloads up to this many bytes fit the 128-slot table.
const SMALL_LIMIT: usize = 500;

/// Payloads up to this many bytes fit the 192-slot table.
const MEDIUM_LIMIT: usize = 756;

/// Hard payload cap: the 256-slot table's data region, `(256 - 3) * 4`.
pub const MAX_PAYLOAD: usize = 1012;

/// Errors produced by the table codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SboxError {
    /// Payload exceeds the largest table's capacity.
    #[error("payload of {size} byte(s) exceeds the {max}-byte table capacity")]
    PayloadTooLarge {
        /// Offered payload size.
        size: usize,
        /// The codec's hard cap.
        max: usize,
    },

    /// Table length is not one of the permitted sizes.
    #[error("table of {size} slot(s) is not a valid size (expected 128, 192, or 256)")]
    BadSize {
        /// The offered table length.
        size: usize,
    },

    /// The implicit length signature decodes to an impossible length.
    #[error("implicit length {declared} is outside 0..={capacity}")]
    BadLength {
        /// Length recovered from `slot[0] ^ slot[N-1]`.
        declared: i32,
        /// The table's data capacity in bytes.
        capacity: usize,
    },

    /// Payload bytes fail the CRC32 stored in slot 1.
    #[error("checksum mismatch: table says {expected:#010x}, payload hashes to {found:#010x}")]
    BadChecksum {
        /// CRC stored in the table.
        expected: u32,
        /// CRC of the unpacked bytes.
        found: u32,
    },
}

/// Pick the table size for a payload length.
fn table_size(payload_len: usize) -> Result<usize, SboxError> {
    if payload_len <= SMALL_LIMIT {
        Ok(128)
    } else if payload_len <= MEDIUM_LIMIT {
        Ok(192)
    } else if payload_len <= MAX_PAYLOAD {
        Ok(256)
    } else {
        Err(SboxError::PayloadTooLarge { size: payload_len, max: MAX_PAYLOAD })
    }
}

/// Data capacity in bytes of a table with `size` slots.
fn capacity(size: usize) -> usize {
    (size - 3) * 4
}

/// Pack `payload` into a freshly drawn table.
///
/// Non-deterministic: slot 0, slot N-1, and every noise slot come from
/// OS entropy on each call.
pub fn encode(payload: &[u8]) -> Result<Vec<i32>, SboxError> {
    let size = table_size(payload.len())?;
    let mut table = vec![0i32; size];

    let r = OsRng.next_u32();
    table[0] = r as i32;
    table[1] = crc32fast::hash(payload) as i32;

    let word_count = payload.len().div_ceil(4);
    for word in 0..word_count {
        let mut bytes = [0u8; 4];
        for (offset, slot) in bytes.iter_mut().enumerate() {
            if let Some(byte) = payload.get(word * 4 + offset) {
                *slot = *byte;
            }
        }
        table[2 + word] = u32::from_be_bytes(bytes) as i32;
    }

    for slot in table.iter_mut().take(size - 1).skip(2 + word_count) {
        *slot = OsRng.next_u32() as i32;
    }

    table[size - 1] = (r ^ payload.len() as u32) as i32;
    Ok(table)
}

/// Unpack and verify a table produced by [`encode`].
pub fn decode(table: &[i32]) -> Result<Vec<u8>, SboxError> {
    let size = table.len();
    if !TABLE_SIZES.contains(&size) {
        return Err(SboxError::BadSize { size });
    }

    let declared = (table[0] as u32 ^ table[size - 1] as u32) as i32;
    if declared < 0 || declared as usize > capacity(size) {
        return Err(SboxError::BadLength { declared, capacity: capacity(size) });
    }
    let payload_len = declared as usize;

    let mut payload = Vec::with_capacity(payload_len);
    for index in 0..payload_len {
        let word = (table[2 + index / 4] as u32).to_be_bytes();
        payload.push(word[index % 4]);
    }

    let expected = table[1] as u32;
    let found = crc32fast::hash(&payload);
    if expected != found {
        return Err(SboxError::BadChecksum { expected, found });
    }
    Ok(payload)
}
