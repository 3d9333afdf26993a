//! Native structural well-formedness walk.
//!
//! Checks that every pool reference anywhere in the tree resolves to an
//! entry of the expected kind, and that code-bearing methods are shaped
//! the way the loader demands. Diagnostics accumulate; the caller decides
//! that any diagnostic at all means rejection.

use ghostclass_classfile::{
    flags, Attribute, AttributeInfo, ClassFile, ClassVisitor, Constant, ConstantPool, Member,
};

/// Run every check, returning accumulated diagnostics (empty means well
/// formed).
pub fn check(class: &ClassFile) -> Vec<String> {
    let mut checker = Checker::default();
    checker.check_pool(&class.constant_pool);
    ghostclass_classfile::walk(class, &mut checker);
    checker.diagnostics
}

#[derive(Default)]
struct Checker {
    diagnostics: Vec<String>,
}

impl Checker {
    fn expect_kind(&mut self, pool: &ConstantPool, index: u16, kind: &'static str, context: &str) {
        match pool.get(index) {
            Ok(constant) if constant.kind() == kind => {},
            Ok(constant) => self.diagnostics.push(format!(
                "{context}: pool index {index} is a {}, expected {kind}",
                constant.kind()
            )),
            Err(error) => self.diagnostics.push(format!("{context}: {error}")),
        }
    }

    fn check_pool(&mut self, pool: &ConstantPool) {
        for (index, constant) in pool.entries() {
            let context = format!("pool entry {index}");
            match constant {
                Constant::Class { name_index }
                | Constant::Module { name_index }
                | Constant::Package { name_index } => {
                    self.expect_kind(pool, *name_index, "Utf8", &context);
                },
                Constant::String { string_index } => {
                    self.expect_kind(pool, *string_index, "Utf8", &context);
                },
                Constant::Fieldref { class_index, name_and_type_index }
                | Constant::Methodref { class_index, name_and_type_index }
                | Constant::InterfaceMethodref { class_index, name_and_type_index } => {
                    self.expect_kind(pool, *class_index, "Class", &context);
                    self.expect_kind(pool, *name_and_type_index, "NameAndType", &context);
                },
                Constant::NameAndType { name_index, descriptor_index } => {
                    self.expect_kind(pool, *name_index, "Utf8", &context);
                    self.expect_kind(pool, *descriptor_index, "Utf8", &context);
                },
                Constant::MethodHandle { reference_index, .. } => {
                    if let Err(error) = pool.get(*reference_index) {
                        self.diagnostics.push(format!("{context}: {error}"));
                    }
                },
                Constant::MethodType { descriptor_index } => {
                    self.expect_kind(pool, *descriptor_index, "Utf8", &context);
                },
                Constant::Dynamic { name_and_type_index, .. }
                | Constant::InvokeDynamic { name_and_type_index, .. } => {
                    self.expect_kind(pool, *name_and_type_index, "NameAndType", &context);
                },
                Constant::Utf8(_)
                | Constant::Integer(_)
                | Constant::Float { .. }
                | Constant::Long(_)
                | Constant::Double { .. } => {},
            }
        }
    }

    fn check_attribute(&mut self, pool: &ConstantPool, attribute: &Attribute, context: &str) {
        self.expect_kind(pool, attribute.name_index, "Utf8", context);
        if let AttributeInfo::Code(code) = &attribute.info {
            for entry in &code.exception_table {
                if entry.catch_type != 0 {
                    self.expect_kind(pool, entry.catch_type, "Class", context);
                }
            }
            for nested in &code.attributes {
                self.check_attribute(pool, nested, context);
            }
        }
    }

    fn check_member(&mut self, pool: &ConstantPool, member: &Member, what: &str) {
        let context = format!(
            "{what} {}",
            member.name(pool).map_or_else(
                |_| "<unresolvable>".to_owned(),
                |name| String::from_utf8_lossy(name).into_owned()
            )
        );
        self.expect_kind(pool, member.name_index, "Utf8", &context);
        self.expect_kind(pool, member.descriptor_index, "Utf8", &context);
        for attribute in &member.attributes {
            self.check_attribute(pool, attribute, &context);
        }
    }
}

impl ClassVisitor for Checker {
    fn visit_class(&mut self, class: &ClassFile) {
        let pool = &class.constant_pool;
        self.expect_kind(pool, class.this_class, "Class", "this-class");
        if class.super_class != 0 {
            self.expect_kind(pool, class.super_class, "Class", "super-class");
        }
        for interface in &class.interfaces {
            self.expect_kind(pool, *interface, "Class", "interface");
        }
    }

    fn visit_field(&mut self, pool: &ConstantPool, field: &Member) {
        self.check_member(pool, field, "field");
        if field.code(pool).is_ok_and(|code| code.is_some()) {
            self.diagnostics.push("field carries a Code attribute".to_owned());
        }
    }

    fn visit_method(&mut self, pool: &ConstantPool, method: &Member) {
        self.check_member(pool, method, "method");

        let code_count = method
            .attributes
            .iter()
            .filter(|attribute| matches!(attribute.info, AttributeInfo::Code(_)))
            .count();
        let bodyless = method.access_flags & (flags::ACC_ABSTRACT | flags::ACC_NATIVE) != 0;
        let name = method
            .name(pool)
            .map_or_else(|_| "<unresolvable>".to_owned(), |n| String::from_utf8_lossy(n).into_owned());
        if bodyless && code_count != 0 {
            self.diagnostics.push(format!("method {name}: abstract/native but has a Code attribute"));
        }
        if !bodyless && code_count != 1 {
            self.diagnostics
                .push(format!("method {name}: expected exactly one Code attribute, found {code_count}"));
        }
    }

    fn visit_attribute(&mut self, pool: &ConstantPool, attribute: &Attribute) {
        self.check_attribute(pool, attribute, "class attribute");
    }
}
