//! Deterministic names for the injected fields.
//!
//! Both names derive from the carrier's class name through the host VM's
//! canonical string hash (polynomial, multiplier 31, seed 0, over UTF-16
//! code units). The derivation is a cross-compatibility contract: a class
//! concealed here must extract anywhere, so the hash and the modular
//! arithmetic are pinned by vector tests against known host values.

/// The host VM's 32-bit string hash.
///
/// Wrapping i32 arithmetic over UTF-16 code units; matches
/// `String.hashCode()` bit-for-bit.
#[must_use]
pub fn jvm_string_hash(s: &str) -> i32 {
    s.encode_utf16().fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Name of the injected table field: `_T<d>` for even hashes, `_S<d>`
/// for odd, with `d = |hash| mod 10`.
#[must_use]
pub fn table_field_name(class_name: &str) -> String {
    let hash = jvm_string_hash(class_name);
    let digit = hash.unsigned_abs() % 10;
    let prefix = if hash % 2 == 0 { "_T" } else { "_S" };
    format!("{prefix}{digit}")
}

/// Name of the injected checksum field: `_<c>k` with
/// `c = 'a' + (|hash| mod 26)`.
#[must_use]
pub fn checksum_field_name(class_name: &str) -> String {
    let hash = jvm_string_hash(class_name);
    let letter = (b'a' + (hash.unsigned_abs() % 26) as u8) as char;
    format!("_{letter}k")
}
