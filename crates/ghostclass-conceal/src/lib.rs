//! Payload concealment for compiled class files.
//!
//! Two strategies over the round-trippable codec, each recoverable
//! bit-for-bit:
//!
//! - **Attribute mode** ([`conceal_attribute`] / [`reveal_attribute`]):
//!   the payload rides in a single class-level `GhostPayload` attribute
//!   as a magic-and-length container. Deterministic, capacity bounded
//!   only by the class-file size cap.
//! - **S-Box mode** ([`conceal_sbox`] / [`reveal_sbox`]): the payload is
//!   packed into an integer table resembling a substitution box, and the
//!   carrier's static initializer is extended to build it at load time.
//!   Non-deterministic (fresh entropy per call), capacity 1012 bytes.
//!
//! [`reveal_auto`] tries S-Box first and falls back to the attribute.
//! [`verify_emitted`] exposes the full verifier gateway (structural walk
//! plus host acceptance) through the same error type.
//!
//! All five operations are pure functions on byte arrays: no shared
//! state, no I/O. The only process-wide resource is the OS entropy source
//! the table encoder draws from, so concurrent calls need no
//! coordination. Either the full result is produced or an error is
//! returned; no partial output is ever visible.

#![forbid(unsafe_code)]

mod attribute;
pub mod container;
mod emitter;
pub mod naming;
mod sbox;
mod simulator;

use ghostclass_classfile::{ClassFile, ClassFileError};
use ghostclass_sbox::SboxError;
use ghostclass_verify::VerifyError;
use thiserror::Error;
use tracing::debug;

/// Everything that can go wrong while concealing or revealing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GhostError {
    /// The carrier class file did not parse or could not be edited.
    #[error("carrier class file: {0}")]
    ClassFile(#[from] ClassFileError),

    /// The table codec rejected the payload or the recovered table.
    #[error("s-box table: {0}")]
    Sbox(#[from] SboxError),

    /// No concealed payload is present. Normal for clean classes.
    #[error("no concealed payload present")]
    NoPayload,

    /// The payload container's magic did not match.
    #[error("container magic mismatch: expected {expected:#010x}, found {found:#010x}")]
    BadMagic {
        /// The magic the container format mandates.
        expected: u32,
        /// What the attribute actually started with.
        found: u32,
    },

    /// The container's declared length disagrees with the bytes present.
    #[error("container declares {declared} byte(s) but {available} are available")]
    BadLength {
        /// Declared length, sign-extended so negative values survive.
        declared: i64,
        /// Bytes actually present after the header.
        available: usize,
    },

    /// The payload is too large for the chosen mode.
    #[error("payload of {size} byte(s) exceeds the {max}-byte limit")]
    PayloadTooLarge {
        /// Offered payload size.
        size: usize,
        /// The mode's limit.
        max: usize,
    },

    /// Truncated or otherwise unparseable container.
    #[error("payload container corrupted: {0}")]
    Corrupted(&'static str),

    /// The emitted class was rejected by the verifier.
    #[error("emitted class failed verification: {diagnostics}")]
    VerifyFailed {
        /// Accumulated verifier diagnostics.
        diagnostics: String,
    },

    /// The verifier gateway could not consult the host environment at
    /// all (no `java` launcher, or scratch space unavailable).
    #[error("verification host unavailable: {reason}")]
    HostUnavailable {
        /// What kept the host from being consulted.
        reason: String,
    },
}

impl From<VerifyError> for GhostError {
    fn from(error: VerifyError) -> Self {
        match error {
            VerifyError::ClassFile(inner) => GhostError::ClassFile(inner),
            VerifyError::Structural { diagnostics } => GhostError::VerifyFailed { diagnostics },
            VerifyError::Runtime { class_name, diagnostics } => GhostError::VerifyFailed {
                diagnostics: format!("{class_name}: {diagnostics}"),
            },
            VerifyError::HostUnavailable { reason } => GhostError::HostUnavailable { reason },
            // Scratch-space failure also means no verdict was obtained.
            VerifyError::Io(detail) => GhostError::HostUnavailable { reason: detail },
        }
    }
}

/// Conceal `payload` in `class_bytes` as a `GhostPayload` attribute.
///
/// Deterministic in its inputs. Replaces any payload attribute already
/// present.
pub fn conceal_attribute(class_bytes: &[u8], payload: &[u8]) -> Result<Vec<u8>, GhostError> {
    attribute::conceal(class_bytes, payload)
}

/// Recover a payload concealed by [`conceal_attribute`].
pub fn reveal_attribute(class_bytes: &[u8]) -> Result<Vec<u8>, GhostError> {
    attribute::reveal(class_bytes)
}

/// Conceal `payload` in `class_bytes` as an initializer-built table.
///
/// Non-deterministic: the table's entropy slots are drawn fresh on every
/// call. Payloads over 1012 bytes are rejected.
pub fn conceal_sbox(class_bytes: &[u8], payload: &[u8]) -> Result<Vec<u8>, GhostError> {
    sbox::conceal(class_bytes, payload)
}

/// Recover a payload concealed by [`conceal_sbox`].
pub fn reveal_sbox(class_bytes: &[u8]) -> Result<Vec<u8>, GhostError> {
    sbox::reveal(class_bytes)
}

/// Recover a payload concealed by either strategy.
///
/// Tries S-Box first. Any S-Box failure short of the carrier itself
/// failing to parse falls through to the attribute path; a carrier parse
/// error is terminal because the attribute path would only repeat it.
pub fn reveal_auto(class_bytes: &[u8]) -> Result<Vec<u8>, GhostError> {
    match reveal_sbox(class_bytes) {
        Ok(payload) => Ok(payload),
        Err(GhostError::ClassFile(error)) => Err(GhostError::ClassFile(error)),
        Err(error) => {
            debug!(%error, "s-box reveal failed, trying attribute");
            reveal_attribute(class_bytes)
        },
    }
}

/// Run the full verifier gateway over emitted class bytes: the
/// structural walk, then the host loader, optionally invoking a public
/// static no-argument void `entry_point` on the class.
///
/// The class name is taken from the bytes themselves. Machines with no
/// host JVM surface [`GhostError::HostUnavailable`]; a host that loads
/// the class but rejects or faults it surfaces
/// [`GhostError::VerifyFailed`] with the captured diagnostics.
pub fn verify_emitted(class_bytes: &[u8], entry_point: Option<&str>) -> Result<(), GhostError> {
    ghostclass_verify::verify_structural(class_bytes)?;
    let class = ClassFile::parse(class_bytes)?;
    let class_name = class.class_name()?.to_owned();
    ghostclass_verify::verify_runtime(class_bytes, &class_name, entry_point)?;
    Ok(())
}
