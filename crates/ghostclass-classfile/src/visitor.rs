//! Event walk over a parsed class.
//!
//! Events are delivered in class-file order: the header, each field, each
//! method followed by each instruction of its code, then each class-level
//! attribute. Callers that want to rewrite do so through the tree's edit
//! operations; the walk exists so scanners (the extractors, the
//! structural verifier) don't hand-roll the same loops.
//!
//! Instruction events come from the shared decoder in [`crate::code`]; a
//! method whose code stops decoding (undefined opcode, truncated
//! operands) delivers the instructions up to that point and no further.

use crate::attributes::Attribute;
use crate::class::{ClassFile, Member};
use crate::code::{instructions, Instruction};
use crate::pool::ConstantPool;

/// Receiver for class-file events. Every method defaults to a no-op, so
/// implementations override only what they care about.
pub trait ClassVisitor {
    /// The class header (version, flags, names) before any member event.
    fn visit_class(&mut self, class: &ClassFile) {
        let _ = class;
    }

    /// One field declaration.
    fn visit_field(&mut self, pool: &ConstantPool, field: &Member) {
        let _ = (pool, field);
    }

    /// One method declaration, before its instruction events.
    fn visit_method(&mut self, pool: &ConstantPool, method: &Member) {
        let _ = (pool, method);
    }

    /// One instruction of the most recently visited method's code.
    fn visit_code_instruction(&mut self, pool: &ConstantPool, instruction: &Instruction<'_>) {
        let _ = (pool, instruction);
    }

    /// One class-level attribute.
    fn visit_attribute(&mut self, pool: &ConstantPool, attribute: &Attribute) {
        let _ = (pool, attribute);
    }
}

/// Drive a visitor over `class` in file order.
pub fn walk(class: &ClassFile, visitor: &mut dyn ClassVisitor) {
    visitor.visit_class(class);
    for field in &class.fields {
        visitor.visit_field(&class.constant_pool, field);
    }
    for method in &class.methods {
        visitor.visit_method(&class.constant_pool, method);
        let Ok(Some(code)) = method.code(&class.constant_pool) else {
            continue;
        };
        for instruction in instructions(&code.code) {
            let Ok(instruction) = instruction else {
                break;
            };
            visitor.visit_code_instruction(&class.constant_pool, &instruction);
        }
    }
    for attribute in &class.attributes {
        visitor.visit_attribute(&class.constant_pool, attribute);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AttributeInfo, CodeAttribute};
    use crate::opcodes;

    #[derive(Default)]
    struct Counter {
        fields: usize,
        methods: usize,
        instructions: Vec<u8>,
        attributes: usize,
    }

    impl ClassVisitor for Counter {
        fn visit_field(&mut self, _pool: &ConstantPool, _field: &Member) {
            self.fields += 1;
        }

        fn visit_method(&mut self, _pool: &ConstantPool, _method: &Member) {
            self.methods += 1;
        }

        fn visit_code_instruction(&mut self, _pool: &ConstantPool, instruction: &Instruction<'_>) {
            self.instructions.push(instruction.opcode);
        }

        fn visit_attribute(&mut self, _pool: &ConstantPool, _attribute: &Attribute) {
            self.attributes += 1;
        }
    }

    #[test]
    fn events_cover_every_section() {
        let mut pool = ConstantPool::new();
        let this_class = pool.intern_class(b"Walked").unwrap();
        let name = pool.intern_utf8(b"x").unwrap();
        let descriptor = pool.intern_utf8(b"I").unwrap();
        let method_name = pool.intern_utf8(b"go").unwrap();
        let method_descriptor = pool.intern_utf8(b"()V").unwrap();
        let code_name = pool.intern_utf8(b"Code").unwrap();
        let class = ClassFile {
            minor_version: 0,
            major_version: 52,
            constant_pool: pool,
            access_flags: 0,
            this_class,
            super_class: 0,
            interfaces: Vec::new(),
            fields: vec![Member {
                access_flags: 0,
                name_index: name,
                descriptor_index: descriptor,
                attributes: Vec::new(),
            }],
            methods: vec![Member {
                access_flags: 0,
                name_index: method_name,
                descriptor_index: method_descriptor,
                attributes: vec![Attribute {
                    name_index: code_name,
                    info: AttributeInfo::Code(CodeAttribute {
                        max_stack: 1,
                        max_locals: 0,
                        code: vec![opcodes::ICONST_0, opcodes::POP, opcodes::RETURN],
                        exception_table: Vec::new(),
                        attributes: Vec::new(),
                    }),
                }],
            }],
            attributes: Vec::new(),
        };

        let mut counter = Counter::default();
        walk(&class, &mut counter);
        assert_eq!(counter.fields, 1);
        assert_eq!(counter.methods, 1);
        assert_eq!(
            counter.instructions,
            vec![opcodes::ICONST_0, opcodes::POP, opcodes::RETURN]
        );
        assert_eq!(counter.attributes, 0);
    }

    #[test]
    fn undecodable_code_stops_instruction_events_only() {
        let mut pool = ConstantPool::new();
        let this_class = pool.intern_class(b"Partial").unwrap();
        let method_name = pool.intern_utf8(b"go").unwrap();
        let method_descriptor = pool.intern_utf8(b"()V").unwrap();
        let code_name = pool.intern_utf8(b"Code").unwrap();
        let class = ClassFile {
            minor_version: 0,
            major_version: 52,
            constant_pool: pool,
            access_flags: 0,
            this_class,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: vec![Member {
                access_flags: 0,
                name_index: method_name,
                descriptor_index: method_descriptor,
                attributes: vec![Attribute {
                    name_index: code_name,
                    info: AttributeInfo::Code(CodeAttribute {
                        max_stack: 0,
                        max_locals: 0,
                        code: vec![opcodes::ICONST_0, 0xCB, opcodes::RETURN],
                        exception_table: Vec::new(),
                        attributes: Vec::new(),
                    }),
                }],
            }],
            attributes: Vec::new(),
        };

        let mut counter = Counter::default();
        walk(&class, &mut counter);
        assert_eq!(counter.methods, 1);
        assert_eq!(counter.instructions, vec![opcodes::ICONST_0]);
    }
}
