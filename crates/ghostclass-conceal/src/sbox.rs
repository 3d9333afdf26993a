//! S-Box-mode concealment: the payload is packed into an integer table
//! materialized by the carrier's own static initializer.
//!
//! Concealment injects two static fields named per the carrier's class
//! name, splices a table-building prefix at the initializer entry, and
//! rebounds the method's stack and locals. Recovery scans static `int[]`
//! fields as candidates and re-executes the initializer prefix for each
//! until one decodes.

use ghostclass_classfile::{
    flags, ClassFile, ClassVisitor, ConstantPool, Member, CLINIT_DESCRIPTOR, CLINIT_NAME,
};
use tracing::{debug, trace};

use crate::emitter::{emit_prefix, FieldRefs};
use crate::{naming, simulator, GhostError};

/// Descriptor of the injected table field.
const TABLE_DESCRIPTOR: &[u8] = b"[I";

/// Descriptor of the injected checksum field.
const CHECKSUM_DESCRIPTOR: &[u8] = b"J";

/// Conceal a payload as a table literal in the carrier's initializer.
pub fn conceal(class_bytes: &[u8], payload: &[u8]) -> Result<Vec<u8>, GhostError> {
    let table = ghostclass_sbox::encode(payload)?;
    conceal_table(class_bytes, &table)
}

/// Splice a literal table into the carrier. Factored out of [`conceal`]
/// so corruption behavior can be pinned against a known table.
fn conceal_table(class_bytes: &[u8], table: &[i32]) -> Result<Vec<u8>, GhostError> {
    let mut class = ClassFile::parse(class_bytes)?;
    let class_name = class.class_name()?.to_owned();
    let table_name = naming::table_field_name(&class_name);
    let checksum_name = naming::checksum_field_name(&class_name);
    debug!(class = %class_name, table = %table_name, slots = table.len(), "concealing table");

    if !class.has_field(table_name.as_bytes(), TABLE_DESCRIPTOR)? {
        class.append_field(
            flags::ACC_PRIVATE | flags::ACC_STATIC | flags::ACC_FINAL,
            table_name.as_bytes(),
            TABLE_DESCRIPTOR,
        )?;
    }
    if !class.has_field(checksum_name.as_bytes(), CHECKSUM_DESCRIPTOR)? {
        class.append_field(
            flags::ACC_PUBLIC | flags::ACC_STATIC | flags::ACC_FINAL,
            checksum_name.as_bytes(),
            CHECKSUM_DESCRIPTOR,
        )?;
    }

    let refs = FieldRefs {
        table: class.constant_pool.intern_fieldref(
            class_name.as_bytes(),
            table_name.as_bytes(),
            TABLE_DESCRIPTOR,
        )?,
        checksum: class.constant_pool.intern_fieldref(
            class_name.as_bytes(),
            checksum_name.as_bytes(),
            CHECKSUM_DESCRIPTOR,
        )?,
    };

    let prefix = emit_prefix(&mut class.constant_pool, table, refs)?;
    class.prepend_clinit(&prefix)?;

    let out = class.serialize()?;
    ghostclass_verify::verify_structural(&out)?;
    debug!(carrier = class_bytes.len(), emitted = out.len(), "table concealed");
    Ok(out)
}

/// Collects the names of static `int[]` fields during a walk.
#[derive(Default)]
struct CandidateFields {
    names: Vec<Vec<u8>>,
}

impl ClassVisitor for CandidateFields {
    fn visit_field(&mut self, pool: &ConstantPool, field: &Member) {
        if field.access_flags & flags::ACC_STATIC == 0 {
            return;
        }
        let (Ok(name), Ok(descriptor)) = (field.name(pool), field.descriptor(pool)) else {
            return;
        };
        if descriptor == TABLE_DESCRIPTOR {
            self.names.push(name.to_vec());
        }
    }
}

/// Recover a payload concealed by [`conceal`].
///
/// A candidate whose initializer yields a table that then fails to decode
/// surfaces that decode error (a damaged table must not read as "no
/// payload"); only a class with no recoverable table at all is
/// `NoPayload`.
pub fn reveal(class_bytes: &[u8]) -> Result<Vec<u8>, GhostError> {
    let class = ClassFile::parse(class_bytes)?;

    let mut candidates = CandidateFields::default();
    ghostclass_classfile::walk(&class, &mut candidates);
    if candidates.names.is_empty() {
        return Err(GhostError::NoPayload);
    }

    let Some(index) = class.find_method(CLINIT_NAME, CLINIT_DESCRIPTOR)? else {
        return Err(GhostError::NoPayload);
    };
    let Some(code) = class.methods[index].code(&class.constant_pool)? else {
        return Err(GhostError::NoPayload);
    };

    let mut last_decode_error = None;
    for name in &candidates.names {
        let Some(table) = simulator::recover_table(&code.code, &class.constant_pool, name) else {
            trace!(field = %String::from_utf8_lossy(name), "candidate did not yield a table");
            continue;
        };
        match ghostclass_sbox::decode(&table) {
            Ok(payload) => {
                debug!(
                    field = %String::from_utf8_lossy(name),
                    len = payload.len(),
                    "table revealed"
                );
                return Ok(payload);
            },
            Err(error) => {
                trace!(field = %String::from_utf8_lossy(name), %error, "candidate did not decode");
                last_decode_error = Some(error);
            },
        }
    }
    match last_decode_error {
        Some(error) => Err(GhostError::Sbox(error)),
        None => Err(GhostError::NoPayload),
    }
}

#[cfg(test)]
mod tests {
    use ghostclass_classfile::{
        opcodes, Attribute, AttributeInfo, CodeAttribute, ConstantPool,
    };
    use ghostclass_sbox::SboxError;

    use super::*;

    fn carrier(name: &str) -> Vec<u8> {
        let mut pool = ConstantPool::new();
        let this_class = pool.intern_class(name.as_bytes()).unwrap();
        let super_class = pool.intern_class(b"java/lang/Object").unwrap();
        let init_ref = pool.intern_methodref(b"java/lang/Object", b"<init>", b"()V").unwrap();
        let init_name = pool.intern_utf8(b"<init>").unwrap();
        let init_descriptor = pool.intern_utf8(b"()V").unwrap();
        let code_name = pool.intern_utf8(b"Code").unwrap();
        let class = ClassFile {
            minor_version: 0,
            major_version: 52,
            constant_pool: pool,
            access_flags: flags::ACC_PUBLIC | flags::ACC_SUPER,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: vec![Member {
                access_flags: flags::ACC_PUBLIC,
                name_index: init_name,
                descriptor_index: init_descriptor,
                attributes: vec![Attribute {
                    name_index: code_name,
                    info: AttributeInfo::Code(CodeAttribute {
                        max_stack: 1,
                        max_locals: 1,
                        code: vec![
                            opcodes::ALOAD_0,
                            opcodes::INVOKESPECIAL,
                            (init_ref >> 8) as u8,
                            init_ref as u8,
                            opcodes::RETURN,
                        ],
                        exception_table: Vec::new(),
                        attributes: Vec::new(),
                    }),
                }],
            }],
            attributes: Vec::new(),
        };
        class.serialize().unwrap()
    }

    #[test]
    fn corrupted_tail_slot_surfaces_a_decode_error() {
        let mut table = ghostclass_sbox::encode(b"precious payload").unwrap();
        let last = table.len() - 1;
        table[last] ^= 0x1234_5678;

        let concealed = conceal_table(&carrier("Damaged"), &table).unwrap();
        let error = reveal(&concealed).unwrap_err();
        assert!(
            matches!(
                error,
                GhostError::Sbox(SboxError::BadLength { .. } | SboxError::BadChecksum { .. })
            ),
            "corruption must not read as a missing or wrong payload: {error}"
        );
    }

    #[test]
    fn corrupted_crc_slot_surfaces_a_decode_error() {
        let mut table = ghostclass_sbox::encode(b"precious payload").unwrap();
        table[1] = table[1].wrapping_add(1);

        let concealed = conceal_table(&carrier("Damaged2"), &table).unwrap();
        assert!(matches!(
            reveal(&concealed),
            Err(GhostError::Sbox(SboxError::BadChecksum { .. }))
        ));
    }
}
