//! The class file as an editable tree, and the parse/serialize pair.
//!
//! # Invariants
//!
//! - Round-trip identity: for any input that parses, serializing the
//!   unmodified tree reproduces the input byte-for-byte. Everything the
//!   codec does not interpret (unknown attributes, Utf8 content, float
//!   bit patterns) is carried raw to keep this true.
//! - Grow-only pool: edits intern new constants but never remove or
//!   reorder existing ones, so every index taken from the input stays
//!   valid.

use crate::attributes::{known, Attribute, AttributeInfo, CodeAttribute};
use crate::errors::{ClassFileError, Result};
use crate::opcodes;
use crate::pool::ConstantPool;
use crate::reader::ClassReader;
use bytes::BufMut;

/// Access-flag bits shared by classes, fields, and methods.
pub mod flags {
    /// ACC_PUBLIC
    pub const ACC_PUBLIC: u16 = 0x0001;
    /// ACC_PRIVATE
    pub const ACC_PRIVATE: u16 = 0x0002;
    /// ACC_PROTECTED
    pub const ACC_PROTECTED: u16 = 0x0004;
    /// ACC_STATIC
    pub const ACC_STATIC: u16 = 0x0008;
    /// ACC_FINAL
    pub const ACC_FINAL: u16 = 0x0010;
    /// ACC_SUPER (classes) / ACC_SYNCHRONIZED (methods)
    pub const ACC_SUPER: u16 = 0x0020;
    /// ACC_NATIVE
    pub const ACC_NATIVE: u16 = 0x0100;
    /// ACC_ABSTRACT
    pub const ACC_ABSTRACT: u16 = 0x0400;
}

/// Name of the static initializer method.
pub const CLINIT_NAME: &[u8] = b"<clinit>";
/// Descriptor of the static initializer method.
pub const CLINIT_DESCRIPTOR: &[u8] = b"()V";

/// A field or method declaration. The two sections share one on-disk
/// layout: access flags, name, descriptor, attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Access-flag bitfield.
    pub access_flags: u16,
    /// Pool index of the `Utf8` name.
    pub name_index: u16,
    /// Pool index of the `Utf8` descriptor.
    pub descriptor_index: u16,
    /// Member attributes (`Code`, `ConstantValue`, ...).
    pub attributes: Vec<Attribute>,
}

impl Member {
    fn parse(pool: &ConstantPool, reader: &mut ClassReader<'_>) -> Result<Self> {
        let access_flags = reader.u16()?;
        let name_index = reader.u16()?;
        let descriptor_index = reader.u16()?;
        let attribute_count = reader.u16()?;
        let mut attributes = Vec::with_capacity(usize::from(attribute_count));
        for _ in 0..attribute_count {
            attributes.push(Attribute::parse(pool, reader)?);
        }
        Ok(Self { access_flags, name_index, descriptor_index, attributes })
    }

    fn serialize(&self, pool: &ConstantPool, out: &mut Vec<u8>) -> Result<()> {
        out.put_u16(self.access_flags);
        out.put_u16(self.name_index);
        out.put_u16(self.descriptor_index);
        out.put_u16(count_u16("member attribute", self.attributes.len())?);
        for attribute in &self.attributes {
            attribute.serialize(pool, out)?;
        }
        Ok(())
    }

    /// Resolve this member's name through the pool.
    pub fn name<'p>(&self, pool: &'p ConstantPool) -> Result<&'p [u8]> {
        pool.get_utf8(self.name_index)
    }

    /// Resolve this member's descriptor through the pool.
    pub fn descriptor<'p>(&self, pool: &'p ConstantPool) -> Result<&'p [u8]> {
        pool.get_utf8(self.descriptor_index)
    }

    /// The member's `Code` attribute, if present.
    pub fn code(&self, pool: &ConstantPool) -> Result<Option<&CodeAttribute>> {
        for attribute in &self.attributes {
            if attribute.name(pool)? == known::CODE {
                if let AttributeInfo::Code(code) = &attribute.info {
                    return Ok(Some(code));
                }
            }
        }
        Ok(None)
    }
}

/// Code to splice at the entry of the static initializer, with the
/// resource bounds the splice requires on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinitPrefix {
    /// Straight-line instruction stream (no trailing `return`).
    pub code: Vec<u8>,
    /// Operand-stack depth the prefix needs.
    pub max_stack: u16,
    /// Local slots the prefix needs.
    pub max_locals: u16,
}

/// The class-file magic.
pub const MAGIC: u32 = 0xCAFE_BABE;

/// Highest major version the parser accepts.
pub const MAX_MAJOR_VERSION: u16 = 69;

/// The VM's cap on one method's bytecode length.
const CODE_LENGTH_LIMIT: usize = 65535;

/// One parsed class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    /// Minor format version.
    pub minor_version: u16,
    /// Major format version.
    pub major_version: u16,
    /// The constant pool.
    pub constant_pool: ConstantPool,
    /// Class access flags.
    pub access_flags: u16,
    /// Pool index of this class's `Class` entry.
    pub this_class: u16,
    /// Pool index of the superclass's `Class` entry (0 for `Object`).
    pub super_class: u16,
    /// Pool indices of implemented interfaces, in declaration order.
    pub interfaces: Vec<u16>,
    /// Declared fields, in declaration order.
    pub fields: Vec<Member>,
    /// Declared methods, in declaration order.
    pub methods: Vec<Member>,
    /// Class-level attributes.
    pub attributes: Vec<Attribute>,
}

fn count_u16(what: &'static str, len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| ClassFileError::TooLarge {
        what,
        len,
        limit: usize::from(u16::MAX),
    })
}

impl ClassFile {
    /// Parse a complete class file.
    ///
    /// Fails on short input, wrong magic, a version newer than
    /// [`MAX_MAJOR_VERSION`], pool damage, truncated sections, or
    /// trailing bytes after the last attribute.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = ClassReader::new(bytes);

        let magic = reader.u32()?;
        if magic != MAGIC {
            return Err(ClassFileError::InvalidMagic { expected: MAGIC, found: magic });
        }
        let minor_version = reader.u16()?;
        let major_version = reader.u16()?;
        if major_version > MAX_MAJOR_VERSION {
            return Err(ClassFileError::UnsupportedVersion {
                major: major_version,
                minor: minor_version,
                max: MAX_MAJOR_VERSION,
            });
        }

        let constant_pool = ConstantPool::parse(&mut reader)?;
        let access_flags = reader.u16()?;
        let this_class = reader.u16()?;
        let super_class = reader.u16()?;

        let interface_count = reader.u16()?;
        let mut interfaces = Vec::with_capacity(usize::from(interface_count));
        for _ in 0..interface_count {
            interfaces.push(reader.u16()?);
        }

        let field_count = reader.u16()?;
        let mut fields = Vec::with_capacity(usize::from(field_count));
        for _ in 0..field_count {
            fields.push(Member::parse(&constant_pool, &mut reader)?);
        }

        let method_count = reader.u16()?;
        let mut methods = Vec::with_capacity(usize::from(method_count));
        for _ in 0..method_count {
            methods.push(Member::parse(&constant_pool, &mut reader)?);
        }

        let attribute_count = reader.u16()?;
        let mut attributes = Vec::with_capacity(usize::from(attribute_count));
        for _ in 0..attribute_count {
            attributes.push(Attribute::parse(&constant_pool, &mut reader)?);
        }

        if !reader.is_at_end() {
            return Err(ClassFileError::Malformed {
                what: "class file",
                detail: format!("{} trailing byte(s) after final attribute", reader.remaining()),
            });
        }

        Ok(Self {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// Serialize the tree back to bytes.
    ///
    /// Cannot fail for a tree that came out of [`ClassFile::parse`] and was
    /// edited within the documented limits.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(1024);
        out.put_u32(MAGIC);
        out.put_u16(self.minor_version);
        out.put_u16(self.major_version);
        self.constant_pool.serialize(&mut out);
        out.put_u16(self.access_flags);
        out.put_u16(self.this_class);
        out.put_u16(self.super_class);

        out.put_u16(count_u16("interface", self.interfaces.len())?);
        for interface in &self.interfaces {
            out.put_u16(*interface);
        }

        out.put_u16(count_u16("field", self.fields.len())?);
        for field in &self.fields {
            field.serialize(&self.constant_pool, &mut out)?;
        }

        out.put_u16(count_u16("method", self.methods.len())?);
        for method in &self.methods {
            method.serialize(&self.constant_pool, &mut out)?;
        }

        out.put_u16(count_u16("class attribute", self.attributes.len())?);
        for attribute in &self.attributes {
            attribute.serialize(&self.constant_pool, &mut out)?;
        }

        Ok(out)
    }

    /// This class's internal-form name.
    pub fn class_name(&self) -> Result<&str> {
        let bytes = self.constant_pool.class_name_bytes(self.this_class)?;
        std::str::from_utf8(bytes).map_err(|_| ClassFileError::Malformed {
            what: "class name",
            detail: "this-class name is not valid UTF-8".to_owned(),
        })
    }

    /// First class-level attribute with the given name, if any.
    pub fn find_attribute(&self, name: &[u8]) -> Result<Option<&Attribute>> {
        for attribute in &self.attributes {
            if attribute.name(&self.constant_pool)? == name {
                return Ok(Some(attribute));
            }
        }
        Ok(None)
    }

    /// Drop every class-level attribute with the given name. Returns how
    /// many were removed. The pool keeps the name entry; pools are
    /// grow-only.
    pub fn remove_attributes_named(&mut self, name: &[u8]) -> Result<usize> {
        let mut matched = Vec::new();
        for (index, attribute) in self.attributes.iter().enumerate() {
            if self.constant_pool.get_utf8(attribute.name_index)? == name {
                matched.push(index);
            }
        }
        for index in matched.iter().rev() {
            self.attributes.remove(*index);
        }
        Ok(matched.len())
    }

    /// Append a class-level attribute with opaque content.
    pub fn append_attribute(&mut self, name: &[u8], content: Vec<u8>) -> Result<()> {
        if self.attributes.len() >= usize::from(u16::MAX) {
            return Err(ClassFileError::TooLarge {
                what: "class attribute",
                len: self.attributes.len() + 1,
                limit: usize::from(u16::MAX),
            });
        }
        let name_index = self.constant_pool.intern_utf8(name)?;
        self.attributes.push(Attribute { name_index, info: AttributeInfo::Unknown(content) });
        Ok(())
    }

    /// Append a field declaration with no attributes.
    pub fn append_field(&mut self, access_flags: u16, name: &[u8], descriptor: &[u8]) -> Result<()> {
        if self.fields.len() >= usize::from(u16::MAX) {
            return Err(ClassFileError::TooLarge {
                what: "field",
                len: self.fields.len() + 1,
                limit: usize::from(u16::MAX),
            });
        }
        let name_index = self.constant_pool.intern_utf8(name)?;
        let descriptor_index = self.constant_pool.intern_utf8(descriptor)?;
        self.fields.push(Member {
            access_flags,
            name_index,
            descriptor_index,
            attributes: Vec::new(),
        });
        Ok(())
    }

    /// True when a field with this name and descriptor is already declared.
    pub fn has_field(&self, name: &[u8], descriptor: &[u8]) -> Result<bool> {
        for field in &self.fields {
            if field.name(&self.constant_pool)? == name
                && field.descriptor(&self.constant_pool)? == descriptor
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Index of the method with this name and descriptor, if declared.
    pub fn find_method(&self, name: &[u8], descriptor: &[u8]) -> Result<Option<usize>> {
        for (index, method) in self.methods.iter().enumerate() {
            if method.name(&self.constant_pool)? == name
                && method.descriptor(&self.constant_pool)? == descriptor
            {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Splice `prefix` at the entry of the static initializer, creating the
    /// method when the class has none.
    ///
    /// When a `<clinit>` exists, its original code becomes the tail:
    /// exception-handler ranges shift by the prefix length, the first
    /// stack-map frame's delta shifts likewise (later frames are relative
    /// to their predecessor and stay valid), and the stack/locals bounds
    /// become the maximum of both requirements. A fresh `<clinit>` is the
    /// prefix followed by `return`.
    pub fn prepend_clinit(&mut self, prefix: &ClinitPrefix) -> Result<()> {
        let prefix_len = prefix.code.len();
        match self.find_method(CLINIT_NAME, CLINIT_DESCRIPTOR)? {
            Some(index) => {
                let pool = &self.constant_pool;
                let method = &mut self.methods[index];
                let mut found = false;
                for attribute in &mut method.attributes {
                    if pool.get_utf8(attribute.name_index)? != known::CODE {
                        continue;
                    }
                    let AttributeInfo::Code(code) = &mut attribute.info else {
                        continue;
                    };
                    found = true;

                    let new_length = prefix_len + code.code.len();
                    if new_length > CODE_LENGTH_LIMIT {
                        return Err(ClassFileError::TooLarge {
                            what: "code",
                            len: new_length,
                            limit: CODE_LENGTH_LIMIT,
                        });
                    }

                    let mut spliced = Vec::with_capacity(new_length);
                    spliced.extend_from_slice(&prefix.code);
                    spliced.append(&mut code.code);
                    code.code = spliced;

                    let shift = prefix_len as u16;
                    for entry in &mut code.exception_table {
                        entry.start_pc = shift_pc(entry.start_pc, shift)?;
                        entry.end_pc = shift_pc(entry.end_pc, shift)?;
                        entry.handler_pc = shift_pc(entry.handler_pc, shift)?;
                    }
                    if let Some(frames) = code.stack_map_table_mut(pool)? {
                        if let Some(first) = frames.first_mut() {
                            first.shift_offset_delta(shift)?;
                        }
                    }

                    code.max_stack = code.max_stack.max(prefix.max_stack);
                    code.max_locals = code.max_locals.max(prefix.max_locals);
                    break;
                }
                if !found {
                    return Err(ClassFileError::Malformed {
                        what: "static initializer",
                        detail: "declared without a Code attribute".to_owned(),
                    });
                }
                Ok(())
            },
            None => {
                if prefix_len + 1 > CODE_LENGTH_LIMIT {
                    return Err(ClassFileError::TooLarge {
                        what: "code",
                        len: prefix_len + 1,
                        limit: CODE_LENGTH_LIMIT,
                    });
                }
                if self.methods.len() >= usize::from(u16::MAX) {
                    return Err(ClassFileError::TooLarge {
                        what: "method",
                        len: self.methods.len() + 1,
                        limit: usize::from(u16::MAX),
                    });
                }
                let name_index = self.constant_pool.intern_utf8(CLINIT_NAME)?;
                let descriptor_index = self.constant_pool.intern_utf8(CLINIT_DESCRIPTOR)?;
                let code_name = self.constant_pool.intern_utf8(known::CODE)?;

                let mut code = Vec::with_capacity(prefix_len + 1);
                code.extend_from_slice(&prefix.code);
                code.push(opcodes::RETURN);

                self.methods.push(Member {
                    access_flags: flags::ACC_STATIC,
                    name_index,
                    descriptor_index,
                    attributes: vec![Attribute {
                        name_index: code_name,
                        info: AttributeInfo::Code(CodeAttribute {
                            max_stack: prefix.max_stack,
                            max_locals: prefix.max_locals,
                            code,
                            exception_table: Vec::new(),
                            attributes: Vec::new(),
                        }),
                    }],
                });
                Ok(())
            },
        }
    }
}

fn shift_pc(pc: u16, by: u16) -> Result<u16> {
    pc.checked_add(by).ok_or(ClassFileError::TooLarge {
        what: "exception handler pc",
        len: usize::from(pc) + usize::from(by),
        limit: usize::from(u16::MAX),
    })
}
