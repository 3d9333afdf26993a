//! Verifier gateway.
//!
//! Thin adapter answering two questions about emitted class bytes:
//!
//! - [`verify_structural`]: is the byte sequence structurally well
//!   formed? A native walk over the parsed tree; no I/O.
//! - [`verify_runtime`]: does the host environment accept and execute
//!   it? The bytes are written to a uniquely-named scratch directory,
//!   presented to the host `java` launcher through a synthesized probe
//!   class, and the exit status decides. The scratch directory is
//!   released on every exit path, including errors, and never outlives
//!   the call; concurrent calls get disjoint directories.

#![forbid(unsafe_code)]

mod runner;
pub mod structural;

use std::io::ErrorKind;
use std::process::Command;

use ghostclass_classfile::{ClassFile, ClassFileError};
use thiserror::Error;
use tracing::debug;

pub use runner::{launcher_class, LAUNCHER_CLASS};

/// Gateway failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// The bytes did not even parse.
    #[error("class file: {0}")]
    ClassFile(#[from] ClassFileError),

    /// Parsed, but the structural walk found inconsistencies.
    #[error("structural verification failed: {diagnostics}")]
    Structural {
        /// Accumulated diagnostics, one finding per line.
        diagnostics: String,
    },

    /// The host loaded or executed the class and rejected it.
    #[error("host rejected {class_name}: {diagnostics}")]
    Runtime {
        /// Binary name of the class under test.
        class_name: String,
        /// Captured host output.
        diagnostics: String,
    },

    /// No host `java` launcher is available on this machine.
    #[error("host runtime unavailable: {reason}")]
    HostUnavailable {
        /// What failed while spawning the host.
        reason: String,
    },

    /// Scratch-space I/O failed.
    #[error("scratch space: {0}")]
    Io(String),
}

impl From<std::io::Error> for VerifyError {
    fn from(error: std::io::Error) -> Self {
        VerifyError::Io(error.to_string())
    }
}

/// Statically check that `bytes` is a well-formed class file.
///
/// Returns `Ok(())` or the accumulated diagnostic text.
pub fn verify_structural(bytes: &[u8]) -> Result<(), VerifyError> {
    let class = ClassFile::parse(bytes)?;
    let diagnostics = structural::check(&class);
    if diagnostics.is_empty() {
        debug!(len = bytes.len(), "structural verification passed");
        Ok(())
    } else {
        Err(VerifyError::Structural { diagnostics: diagnostics.join("\n") })
    }
}

/// Present `bytes` to the host loader and optionally invoke a static
/// no-argument void `entry_point` on it.
///
/// `class_name` is the internal-form name the bytes declare; the file is
/// written under that name so the loader finds it.
pub fn verify_runtime(
    bytes: &[u8],
    class_name: &str,
    entry_point: Option<&str>,
) -> Result<(), VerifyError> {
    let scratch = tempfile::TempDir::new()?;

    let class_path = scratch.path().join(format!("{class_name}.class"));
    if let Some(parent) = class_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&class_path, bytes)?;
    std::fs::write(
        scratch.path().join(format!("{LAUNCHER_CLASS}.class")),
        launcher_class(class_name, entry_point)?,
    )?;

    debug!(class = class_name, scratch = %scratch.path().display(), "invoking host");
    let output = Command::new("java")
        .arg("-cp")
        .arg(scratch.path())
        .arg(LAUNCHER_CLASS)
        .output()
        .map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                VerifyError::HostUnavailable { reason: "no `java` launcher on PATH".to_owned() }
            } else {
                VerifyError::Io(error.to_string())
            }
        })?;
    // `scratch` is dropped (and deleted) on every path from here on.

    if output.status.success() {
        debug!(class = class_name, "host accepted");
        Ok(())
    } else {
        let mut diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();
        if diagnostics.is_empty() {
            diagnostics = String::from_utf8_lossy(&output.stdout).into_owned();
        }
        Err(VerifyError::Runtime { class_name: class_name.replace('/', "."), diagnostics })
    }
}

#[cfg(test)]
mod tests {
    use ghostclass_classfile::{flags, ConstantPool, Member};

    use super::*;

    fn sample_class(name: &str) -> ClassFile {
        let mut pool = ConstantPool::new();
        let this_class = pool.intern_class(name.as_bytes()).unwrap();
        let super_class = pool.intern_class(b"java/lang/Object").unwrap();
        ClassFile {
            minor_version: 0,
            major_version: 52,
            constant_pool: pool,
            access_flags: flags::ACC_PUBLIC | flags::ACC_SUPER,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    #[test]
    fn well_formed_class_passes() {
        let bytes = sample_class("Clean").serialize().unwrap();
        assert_eq!(verify_structural(&bytes), Ok(()));
    }

    #[test]
    fn dangling_this_class_is_reported() {
        let mut class = sample_class("Broken");
        class.this_class = 999;
        let bytes = class.serialize().unwrap();
        let Err(VerifyError::Structural { diagnostics }) = verify_structural(&bytes) else {
            unreachable!("expected a structural failure");
        };
        assert!(diagnostics.contains("this-class"));
    }

    #[test]
    fn method_code_presence_rules_are_enforced() {
        let mut class = sample_class("BadMethod");
        let name = class.constant_pool.intern_utf8(b"run").unwrap();
        let descriptor = class.constant_pool.intern_utf8(b"()V").unwrap();
        class.methods.push(Member {
            access_flags: flags::ACC_ABSTRACT,
            name_index: name,
            descriptor_index: descriptor,
            attributes: Vec::new(),
        });
        // Abstract with no Code: fine.
        assert_eq!(verify_structural(&class.serialize().unwrap()), Ok(()));

        // Concrete with no Code: flagged.
        class.methods[0].access_flags = flags::ACC_PUBLIC;
        let Err(VerifyError::Structural { diagnostics }) =
            verify_structural(&class.serialize().unwrap())
        else {
            unreachable!("expected a structural failure");
        };
        assert!(diagnostics.contains("exactly one Code attribute"));
    }

    #[test]
    fn unparseable_bytes_fail_with_classfile_error() {
        assert!(matches!(verify_structural(&[1, 2, 3]), Err(VerifyError::ClassFile(_))));
    }

    #[test]
    fn runtime_gateway_degrades_without_a_host() {
        // Whatever this machine has installed, the call must come back
        // with a verdict or HostUnavailable, never hang or leak scratch.
        let bytes = sample_class("Probeable").serialize().unwrap();
        match verify_runtime(&bytes, "Probeable", None) {
            Ok(()) | Err(VerifyError::Runtime { .. } | VerifyError::HostUnavailable { .. }) => {},
            Err(other) => unreachable!("unexpected gateway error: {other}"),
        }
    }
}
