//! Synthesizes the launcher class the runtime gateway drops next to the
//! class under test.
//!
//! The launcher is built with the codec itself rather than shipped as a
//! compiled resource: a `Probe` class whose `main` forces the target
//! through the host loader with `Class.forName` (which also runs its
//! static initializer) and then, when an entry point was requested,
//! invokes it as a static no-argument void method.

use ghostclass_classfile::{
    flags, opcodes, Attribute, AttributeInfo, ClassFile, CodeAttribute, ConstantPool, Member,
    Result,
};

/// Class name the launcher is written under.
pub const LAUNCHER_CLASS: &str = "Probe";

/// Build the launcher's class-file bytes.
///
/// `target` is the internal-form name of the class under test;
/// `entry_point`, when present, must name a `public static void` method
/// of the target taking no arguments.
pub fn launcher_class(target: &str, entry_point: Option<&str>) -> Result<Vec<u8>> {
    let mut pool = ConstantPool::new();
    let this_class = pool.intern_class(LAUNCHER_CLASS.as_bytes())?;
    let super_class = pool.intern_class(b"java/lang/Object")?;
    let object_init = pool.intern_methodref(b"java/lang/Object", b"<init>", b"()V")?;
    let for_name = pool.intern_methodref(
        b"java/lang/Class",
        b"forName",
        b"(Ljava/lang/String;)Ljava/lang/Class;",
    )?;
    // forName takes the dotted binary name, not the internal form.
    let binary_name = target.replace('/', ".");
    let target_literal = pool.intern_string(binary_name.as_bytes())?;
    let entry_ref = match entry_point {
        Some(name) => Some(pool.intern_methodref(target.as_bytes(), name.as_bytes(), b"()V")?),
        None => None,
    };

    let init_name = pool.intern_utf8(b"<init>")?;
    let init_descriptor = pool.intern_utf8(b"()V")?;
    let main_name = pool.intern_utf8(b"main")?;
    let main_descriptor = pool.intern_utf8(b"([Ljava/lang/String;)V")?;
    let code_name = pool.intern_utf8(b"Code")?;

    let mut main_code = Vec::new();
    if target_literal <= 255 {
        main_code.push(opcodes::LDC);
        main_code.push(target_literal as u8);
    } else {
        main_code.push(opcodes::LDC_W);
        main_code.extend_from_slice(&target_literal.to_be_bytes());
    }
    main_code.push(opcodes::INVOKESTATIC);
    main_code.extend_from_slice(&for_name.to_be_bytes());
    main_code.push(opcodes::POP);
    if let Some(entry_ref) = entry_ref {
        main_code.push(opcodes::INVOKESTATIC);
        main_code.extend_from_slice(&entry_ref.to_be_bytes());
    }
    main_code.push(opcodes::RETURN);

    let class = ClassFile {
        minor_version: 0,
        major_version: 52,
        constant_pool: pool,
        access_flags: flags::ACC_PUBLIC | flags::ACC_SUPER,
        this_class,
        super_class,
        interfaces: Vec::new(),
        fields: Vec::new(),
        methods: vec![
            Member {
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
                            (object_init >> 8) as u8,
                            object_init as u8,
                            opcodes::RETURN,
                        ],
                        exception_table: Vec::new(),
                        attributes: Vec::new(),
                    }),
                }],
            },
            Member {
                access_flags: flags::ACC_PUBLIC | flags::ACC_STATIC,
                name_index: main_name,
                descriptor_index: main_descriptor,
                attributes: vec![Attribute {
                    name_index: code_name,
                    info: AttributeInfo::Code(CodeAttribute {
                        max_stack: 1,
                        max_locals: 1,
                        code: main_code,
                        exception_table: Vec::new(),
                        attributes: Vec::new(),
                    }),
                }],
            },
        ],
        attributes: Vec::new(),
    };
    class.serialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launcher_parses_and_names_itself() {
        let bytes = launcher_class("TestClass", None).unwrap();
        let class = ClassFile::parse(&bytes).unwrap();
        assert_eq!(class.class_name().unwrap(), LAUNCHER_CLASS);
        assert!(class.find_method(b"main", b"([Ljava/lang/String;)V").unwrap().is_some());
    }

    #[test]
    fn entry_point_adds_an_invocation() {
        let without = launcher_class("pkg/Target", None).unwrap();
        let with = launcher_class("pkg/Target", Some("run")).unwrap();
        assert!(with.len() > without.len());

        let class = ClassFile::parse(&with).unwrap();
        // The dotted binary name is what reaches forName.
        let mut found = false;
        for (_, constant) in class.constant_pool.entries() {
            if let ghostclass_classfile::Constant::Utf8(bytes) = constant {
                if bytes == b"pkg.Target" {
                    found = true;
                }
            }
        }
        assert!(found, "expected the dotted name in the pool");
    }
}
