//! Carrier fixtures built through the codec's own construction API.

use ghostclass_classfile::{
    flags, opcodes, Attribute, AttributeInfo, ClassFile, CodeAttribute, ConstantPool, Member,
};

/// A public class with only a default constructor, serialized.
pub fn minimal_carrier(name: &str) -> Vec<u8> {
    build_carrier(name, false).serialize().unwrap()
}

/// A carrier that already owns a static initializer (it stores 42 into a
/// static `boot` field), serialized.
pub fn carrier_with_clinit(name: &str) -> Vec<u8> {
    build_carrier(name, true).serialize().unwrap()
}

fn build_carrier(name: &str, with_clinit: bool) -> ClassFile {
    let mut pool = ConstantPool::new();
    let this_class = pool.intern_class(name.as_bytes()).unwrap();
    let super_class = pool.intern_class(b"java/lang/Object").unwrap();
    let init_ref = pool.intern_methodref(b"java/lang/Object", b"<init>", b"()V").unwrap();
    let init_name = pool.intern_utf8(b"<init>").unwrap();
    let init_descriptor = pool.intern_utf8(b"()V").unwrap();
    let touch_name = pool.intern_utf8(b"touch").unwrap();
    let code_name = pool.intern_utf8(b"Code").unwrap();

    let mut class = ClassFile {
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

    // A public static no-arg method the runtime gateway can invoke.
    class.methods.push(Member {
        access_flags: flags::ACC_PUBLIC | flags::ACC_STATIC,
        name_index: touch_name,
        descriptor_index: init_descriptor,
        attributes: vec![Attribute {
            name_index: code_name,
            info: AttributeInfo::Code(CodeAttribute {
                max_stack: 0,
                max_locals: 0,
                code: vec![opcodes::RETURN],
                exception_table: Vec::new(),
                attributes: Vec::new(),
            }),
        }],
    });

    if with_clinit {
        class.append_field(flags::ACC_STATIC, b"boot", b"I").unwrap();
        let boot_ref = class
            .constant_pool
            .intern_fieldref(name.as_bytes(), b"boot", b"I")
            .unwrap();
        let clinit_name = class.constant_pool.intern_utf8(b"<clinit>").unwrap();
        let clinit_descriptor = class.constant_pool.intern_utf8(b"()V").unwrap();
        let code_name = class.constant_pool.intern_utf8(b"Code").unwrap();
        class.methods.push(Member {
            access_flags: flags::ACC_STATIC,
            name_index: clinit_name,
            descriptor_index: clinit_descriptor,
            attributes: vec![Attribute {
                name_index: code_name,
                info: AttributeInfo::Code(CodeAttribute {
                    max_stack: 1,
                    max_locals: 0,
                    code: vec![
                        opcodes::BIPUSH,
                        42,
                        opcodes::PUTSTATIC,
                        (boot_ref >> 8) as u8,
                        boot_ref as u8,
                        opcodes::RETURN,
                    ],
                    exception_table: Vec::new(),
                    attributes: Vec::new(),
                }),
            }],
        });
    }

    class
}

/// Names of every declared field of a serialized class.
pub fn field_names(class_bytes: &[u8]) -> Vec<String> {
    let class = ClassFile::parse(class_bytes).unwrap();
    class
        .fields
        .iter()
        .map(|field| {
            String::from_utf8_lossy(field.name(&class.constant_pool).unwrap()).into_owned()
        })
        .collect()
}
