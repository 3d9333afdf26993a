//! Attribute-mode concealment: a single class-level `GhostPayload`
//! attribute carrying the versioned container.

use ghostclass_classfile::{AttributeInfo, ClassFile};
use tracing::debug;

use crate::{container, GhostError};

/// Splice a payload into a carrier as a `GhostPayload` attribute.
///
/// Any existing `GhostPayload` attribute is replaced, never duplicated:
/// revealing a re-concealed class must yield the newest payload, and the
/// class must keep exactly one attribute of that name.
pub fn conceal(class_bytes: &[u8], payload: &[u8]) -> Result<Vec<u8>, GhostError> {
    let mut class = ClassFile::parse(class_bytes)?;
    let replaced = class.remove_attributes_named(container::ATTRIBUTE_NAME)?;
    if replaced > 0 {
        debug!(replaced, "replacing existing payload attribute");
    }

    class.append_attribute(container::ATTRIBUTE_NAME, container::encode(payload)?)?;
    let out = class.serialize()?;

    ghostclass_verify::verify_structural(&out)?;
    debug!(carrier = class_bytes.len(), emitted = out.len(), "payload attribute concealed");
    Ok(out)
}

/// Recover the payload from a `GhostPayload` attribute.
pub fn reveal(class_bytes: &[u8]) -> Result<Vec<u8>, GhostError> {
    let class = ClassFile::parse(class_bytes)?;
    let Some(attribute) = class.find_attribute(container::ATTRIBUTE_NAME)? else {
        return Err(GhostError::NoPayload);
    };
    // The codec does not recognize GhostPayload, so its content is always
    // carried opaque.
    let AttributeInfo::Unknown(bytes) = &attribute.info else {
        return Err(GhostError::Corrupted("payload attribute parsed as a recognized kind"));
    };
    let payload = container::decode(bytes)?;
    debug!(len = payload.len(), "payload attribute revealed");
    Ok(payload.to_vec())
}
