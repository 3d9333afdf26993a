//! Attribute sections.
//!
//! The codec parses a small recognized set structurally (`Code`,
//! `ConstantValue`, `StackMapTable`, `BootstrapMethods`); every other
//! attribute is carried as `(name_index, opaque bytes)` and re-emitted
//! verbatim. That policy is what lets a class containing attributes the
//! codec has never heard of survive a round-trip untouched.
//!
//! `StackMapTable` is parsed framewise because prepending code to a method
//! shifts the bytecode offset of the first frame; all later frames are
//! delta-encoded against their predecessor and stay valid.

use crate::errors::{ClassFileError, Result};
use crate::pool::ConstantPool;
use crate::reader::ClassReader;
use bytes::BufMut;

/// Names of the attributes the codec parses structurally.
pub mod known {
    /// Method bytecode container.
    pub const CODE: &[u8] = b"Code";
    /// Final-field initializer constant.
    pub const CONSTANT_VALUE: &[u8] = b"ConstantValue";
    /// Verification frames.
    pub const STACK_MAP_TABLE: &[u8] = b"StackMapTable";
    /// Bootstrap method table for dynamic constants and call sites.
    pub const BOOTSTRAP_METHODS: &[u8] = b"BootstrapMethods";
}

/// One attribute: a pool-indexed name plus content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Index of the `Utf8` pool entry holding the attribute name.
    pub name_index: u16,
    /// Parsed or opaque content.
    pub info: AttributeInfo,
}

/// Attribute content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeInfo {
    /// A `Code` attribute, parsed structurally.
    Code(CodeAttribute),
    /// A `ConstantValue` attribute.
    ConstantValue {
        /// Pool index of the constant.
        value_index: u16,
    },
    /// A `StackMapTable` attribute, parsed framewise.
    StackMapTable(Vec<StackMapFrame>),
    /// A `BootstrapMethods` attribute.
    BootstrapMethods(Vec<BootstrapMethod>),
    /// Any attribute the codec does not recognize, byte-preserved.
    Unknown(Vec<u8>),
}

/// One entry of a `BootstrapMethods` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapMethod {
    /// Pool index of the `MethodHandle` entry.
    pub method_ref: u16,
    /// Pool indices of the static arguments.
    pub arguments: Vec<u16>,
}

/// One row of a `Code` attribute's exception table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionEntry {
    /// Start of the protected range (inclusive).
    pub start_pc: u16,
    /// End of the protected range (exclusive).
    pub end_pc: u16,
    /// Handler entry point.
    pub handler_pc: u16,
    /// Pool index of the caught class, or 0 for catch-all.
    pub catch_type: u16,
}

/// The `Code` attribute of one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
    /// Operand-stack depth bound.
    pub max_stack: u16,
    /// Local-variable slot bound.
    pub max_locals: u16,
    /// Raw instruction stream.
    pub code: Vec<u8>,
    /// Exception handler table.
    pub exception_table: Vec<ExceptionEntry>,
    /// Nested attributes (`StackMapTable`, debug tables, ...).
    pub attributes: Vec<Attribute>,
}

/// One verification-type item inside a stack-map frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationType {
    /// ITEM_Top
    Top,
    /// ITEM_Integer
    Integer,
    /// ITEM_Float
    Float,
    /// ITEM_Double
    Double,
    /// ITEM_Long
    Long,
    /// ITEM_Null
    Null,
    /// ITEM_UninitializedThis
    UninitializedThis,
    /// ITEM_Object
    Object {
        /// Pool index of the `Class` entry.
        class_index: u16,
    },
    /// ITEM_Uninitialized
    Uninitialized {
        /// Offset of the `new` instruction.
        offset: u16,
    },
}

impl VerificationType {
    fn parse(reader: &mut ClassReader<'_>) -> Result<Self> {
        let item = match reader.u8()? {
            0 => VerificationType::Top,
            1 => VerificationType::Integer,
            2 => VerificationType::Float,
            3 => VerificationType::Double,
            4 => VerificationType::Long,
            5 => VerificationType::Null,
            6 => VerificationType::UninitializedThis,
            7 => VerificationType::Object { class_index: reader.u16()? },
            8 => VerificationType::Uninitialized { offset: reader.u16()? },
            tag => {
                return Err(ClassFileError::Malformed {
                    what: "verification type",
                    detail: format!("undefined item tag {tag}"),
                });
            },
        };
        Ok(item)
    }

    fn serialize(&self, out: &mut Vec<u8>) {
        match self {
            VerificationType::Top => out.put_u8(0),
            VerificationType::Integer => out.put_u8(1),
            VerificationType::Float => out.put_u8(2),
            VerificationType::Double => out.put_u8(3),
            VerificationType::Long => out.put_u8(4),
            VerificationType::Null => out.put_u8(5),
            VerificationType::UninitializedThis => out.put_u8(6),
            VerificationType::Object { class_index } => {
                out.put_u8(7);
                out.put_u16(*class_index);
            },
            VerificationType::Uninitialized { offset } => {
                out.put_u8(8);
                out.put_u16(*offset);
            },
        }
    }
}

/// Frame payload variants, by frame family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBody {
    /// same_frame / same_frame_extended
    Same,
    /// same_locals_1_stack_item (plain or extended)
    SameLocals1 {
        /// The single stack item.
        stack: VerificationType,
    },
    /// chop_frame
    Chop {
        /// Number of locals chopped (1..=3).
        chopped: u8,
    },
    /// append_frame
    Append {
        /// The appended locals (1..=3 items).
        locals: Vec<VerificationType>,
    },
    /// full_frame
    Full {
        /// Complete locals list.
        locals: Vec<VerificationType>,
        /// Complete stack list.
        stack: Vec<VerificationType>,
    },
}

/// One stack-map frame.
///
/// `extended` records whether the input used the explicit-u16-delta form
/// (tags 247/251) even though the delta would fit the compact form; the
/// distinction must survive a round-trip byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMapFrame {
    /// Delta from the previous frame's offset (or the method start, for
    /// the first frame).
    pub offset_delta: u16,
    /// True when the explicit-delta encoding must be used.
    pub extended: bool,
    /// Frame payload.
    pub body: FrameBody,
}

impl StackMapFrame {
    fn parse(reader: &mut ClassReader<'_>) -> Result<Self> {
        let tag = reader.u8()?;
        let frame = match tag {
            0..=63 => Self { offset_delta: u16::from(tag), extended: false, body: FrameBody::Same },
            64..=127 => Self {
                offset_delta: u16::from(tag - 64),
                extended: false,
                body: FrameBody::SameLocals1 { stack: VerificationType::parse(reader)? },
            },
            247 => Self {
                offset_delta: reader.u16()?,
                extended: true,
                body: FrameBody::SameLocals1 { stack: VerificationType::parse(reader)? },
            },
            248..=250 => Self {
                offset_delta: reader.u16()?,
                extended: true,
                body: FrameBody::Chop { chopped: 251 - tag },
            },
            251 => Self { offset_delta: reader.u16()?, extended: true, body: FrameBody::Same },
            252..=254 => {
                let offset_delta = reader.u16()?;
                let mut locals = Vec::with_capacity(usize::from(tag - 251));
                for _ in 0..(tag - 251) {
                    locals.push(VerificationType::parse(reader)?);
                }
                Self { offset_delta, extended: true, body: FrameBody::Append { locals } }
            },
            255 => {
                let offset_delta = reader.u16()?;
                let locals_count = reader.u16()?;
                let mut locals = Vec::with_capacity(usize::from(locals_count));
                for _ in 0..locals_count {
                    locals.push(VerificationType::parse(reader)?);
                }
                let stack_count = reader.u16()?;
                let mut stack = Vec::with_capacity(usize::from(stack_count));
                for _ in 0..stack_count {
                    stack.push(VerificationType::parse(reader)?);
                }
                Self { offset_delta, extended: true, body: FrameBody::Full { locals, stack } }
            },
            128..=246 => {
                return Err(ClassFileError::Malformed {
                    what: "stack-map frame",
                    detail: format!("reserved frame tag {tag}"),
                });
            },
        };
        Ok(frame)
    }

    fn serialize(&self, out: &mut Vec<u8>) {
        match &self.body {
            FrameBody::Same => {
                if !self.extended && self.offset_delta <= 63 {
                    out.put_u8(self.offset_delta as u8);
                } else {
                    out.put_u8(251);
                    out.put_u16(self.offset_delta);
                }
            },
            FrameBody::SameLocals1 { stack } => {
                if !self.extended && self.offset_delta <= 63 {
                    out.put_u8(64 + self.offset_delta as u8);
                } else {
                    out.put_u8(247);
                    out.put_u16(self.offset_delta);
                }
                stack.serialize(out);
            },
            FrameBody::Chop { chopped } => {
                out.put_u8(251 - chopped);
                out.put_u16(self.offset_delta);
            },
            FrameBody::Append { locals } => {
                out.put_u8(251 + locals.len() as u8);
                out.put_u16(self.offset_delta);
                for local in locals {
                    local.serialize(out);
                }
            },
            FrameBody::Full { locals, stack } => {
                out.put_u8(255);
                out.put_u16(self.offset_delta);
                out.put_u16(locals.len() as u16);
                for local in locals {
                    local.serialize(out);
                }
                out.put_u16(stack.len() as u16);
                for item in stack {
                    item.serialize(out);
                }
            },
        }
    }

    /// Grow the delta by `by`, promoting to the explicit encoding when the
    /// compact form no longer fits.
    pub fn shift_offset_delta(&mut self, by: u16) -> Result<()> {
        let shifted =
            self.offset_delta.checked_add(by).ok_or(ClassFileError::TooLarge {
                what: "stack-map frame offset delta",
                len: usize::from(self.offset_delta) + usize::from(by),
                limit: usize::from(u16::MAX),
            })?;
        self.offset_delta = shifted;
        if shifted > 63 {
            self.extended = true;
        }
        Ok(())
    }
}

impl Attribute {
    /// Parse one attribute (name index + length + content).
    pub fn parse(pool: &ConstantPool, reader: &mut ClassReader<'_>) -> Result<Self> {
        let name_index = reader.u16()?;
        let length = reader.u32()?;
        let body = reader.bytes(length as usize)?;
        let name = pool.get_utf8(name_index)?;

        let mut sub = ClassReader::new(body);
        let info = if name == known::CODE {
            AttributeInfo::Code(CodeAttribute::parse(pool, &mut sub)?)
        } else if name == known::CONSTANT_VALUE {
            AttributeInfo::ConstantValue { value_index: sub.u16()? }
        } else if name == known::STACK_MAP_TABLE {
            let count = sub.u16()?;
            let mut frames = Vec::with_capacity(usize::from(count));
            for _ in 0..count {
                frames.push(StackMapFrame::parse(&mut sub)?);
            }
            AttributeInfo::StackMapTable(frames)
        } else if name == known::BOOTSTRAP_METHODS {
            let count = sub.u16()?;
            let mut methods = Vec::with_capacity(usize::from(count));
            for _ in 0..count {
                let method_ref = sub.u16()?;
                let argument_count = sub.u16()?;
                let mut arguments = Vec::with_capacity(usize::from(argument_count));
                for _ in 0..argument_count {
                    arguments.push(sub.u16()?);
                }
                methods.push(BootstrapMethod { method_ref, arguments });
            }
            AttributeInfo::BootstrapMethods(methods)
        } else {
            return Ok(Self { name_index, info: AttributeInfo::Unknown(body.to_vec()) });
        };

        if !sub.is_at_end() {
            return Err(ClassFileError::Malformed {
                what: "attribute",
                detail: format!(
                    "{} byte(s) of trailing content in a recognized attribute",
                    sub.remaining()
                ),
            });
        }
        Ok(Self { name_index, info })
    }

    /// Serialize this attribute (name index + recomputed length + content).
    pub fn serialize(&self, pool: &ConstantPool, out: &mut Vec<u8>) -> Result<()> {
        let mut body = Vec::new();
        match &self.info {
            AttributeInfo::Code(code) => code.serialize(pool, &mut body)?,
            AttributeInfo::ConstantValue { value_index } => body.put_u16(*value_index),
            AttributeInfo::StackMapTable(frames) => {
                if frames.len() > usize::from(u16::MAX) {
                    return Err(ClassFileError::TooLarge {
                        what: "stack-map frame",
                        len: frames.len(),
                        limit: usize::from(u16::MAX),
                    });
                }
                body.put_u16(frames.len() as u16);
                for frame in frames {
                    frame.serialize(&mut body);
                }
            },
            AttributeInfo::BootstrapMethods(methods) => {
                body.put_u16(methods.len() as u16);
                for method in methods {
                    body.put_u16(method.method_ref);
                    body.put_u16(method.arguments.len() as u16);
                    for argument in &method.arguments {
                        body.put_u16(*argument);
                    }
                }
            },
            AttributeInfo::Unknown(bytes) => body.put_slice(bytes),
        }

        let length = u32::try_from(body.len()).map_err(|_| ClassFileError::TooLarge {
            what: "attribute content",
            len: body.len(),
            limit: u32::MAX as usize,
        })?;
        out.put_u16(self.name_index);
        out.put_u32(length);
        out.put_slice(&body);
        Ok(())
    }

    /// Resolve this attribute's name through the pool.
    pub fn name<'p>(&self, pool: &'p ConstantPool) -> Result<&'p [u8]> {
        pool.get_utf8(self.name_index)
    }
}

impl CodeAttribute {
    fn parse(pool: &ConstantPool, reader: &mut ClassReader<'_>) -> Result<Self> {
        let max_stack = reader.u16()?;
        let max_locals = reader.u16()?;
        let code_length = reader.u32()?;
        let code = reader.bytes(code_length as usize)?.to_vec();

        let handler_count = reader.u16()?;
        let mut exception_table = Vec::with_capacity(usize::from(handler_count));
        for _ in 0..handler_count {
            exception_table.push(ExceptionEntry {
                start_pc: reader.u16()?,
                end_pc: reader.u16()?,
                handler_pc: reader.u16()?,
                catch_type: reader.u16()?,
            });
        }

        let attribute_count = reader.u16()?;
        let mut attributes = Vec::with_capacity(usize::from(attribute_count));
        for _ in 0..attribute_count {
            attributes.push(Attribute::parse(pool, reader)?);
        }

        Ok(Self { max_stack, max_locals, code, exception_table, attributes })
    }

    fn serialize(&self, pool: &ConstantPool, out: &mut Vec<u8>) -> Result<()> {
        out.put_u16(self.max_stack);
        out.put_u16(self.max_locals);
        let code_length = u32::try_from(self.code.len()).map_err(|_| ClassFileError::TooLarge {
            what: "code",
            len: self.code.len(),
            limit: u32::MAX as usize,
        })?;
        out.put_u32(code_length);
        out.put_slice(&self.code);

        out.put_u16(self.exception_table.len() as u16);
        for entry in &self.exception_table {
            out.put_u16(entry.start_pc);
            out.put_u16(entry.end_pc);
            out.put_u16(entry.handler_pc);
            out.put_u16(entry.catch_type);
        }

        out.put_u16(self.attributes.len() as u16);
        for attribute in &self.attributes {
            attribute.serialize(pool, out)?;
        }
        Ok(())
    }

    /// The `StackMapTable` nested in this code attribute, if any.
    pub fn stack_map_table_mut(
        &mut self,
        pool: &ConstantPool,
    ) -> Result<Option<&mut Vec<StackMapFrame>>> {
        for attribute in &mut self.attributes {
            let name = pool.get_utf8(attribute.name_index)?;
            if name == known::STACK_MAP_TABLE {
                if let AttributeInfo::StackMapTable(frames) = &mut attribute.info {
                    return Ok(Some(frames));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_attribute_round_trips_verbatim() {
        let mut pool = ConstantPool::new();
        let attribute = Attribute {
            name_index: pool.intern_utf8(b"SourceFile").unwrap(),
            info: AttributeInfo::Unknown(vec![0xDE, 0xAD, 0xBE, 0xEF]),
        };
        let mut bytes = Vec::new();
        attribute.serialize(&pool, &mut bytes).unwrap();

        let parsed = Attribute::parse(&pool, &mut ClassReader::new(&bytes)).unwrap();
        assert_eq!(parsed, attribute);
    }

    #[test]
    fn code_attribute_round_trips() {
        let mut pool = ConstantPool::new();
        let code_name = pool.intern_utf8(b"Code").unwrap();
        let attribute = Attribute {
            name_index: code_name,
            info: AttributeInfo::Code(CodeAttribute {
                max_stack: 2,
                max_locals: 1,
                code: vec![0x03, 0xAC], // iconst_0; ireturn
                exception_table: vec![ExceptionEntry {
                    start_pc: 0,
                    end_pc: 1,
                    handler_pc: 1,
                    catch_type: 0,
                }],
                attributes: Vec::new(),
            }),
        };
        let mut bytes = Vec::new();
        attribute.serialize(&pool, &mut bytes).unwrap();
        let parsed = Attribute::parse(&pool, &mut ClassReader::new(&bytes)).unwrap();
        assert_eq!(parsed, attribute);
    }

    #[test]
    fn extended_frame_encoding_is_preserved() {
        // same_frame_extended with a delta that would fit the compact form
        let frame =
            StackMapFrame { offset_delta: 5, extended: true, body: FrameBody::Same };
        let mut bytes = Vec::new();
        frame.serialize(&mut bytes);
        assert_eq!(bytes, vec![251, 0, 5]);

        let parsed = StackMapFrame::parse(&mut ClassReader::new(&bytes)).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn compact_frame_promotes_when_shifted() {
        let mut frame =
            StackMapFrame { offset_delta: 60, extended: false, body: FrameBody::Same };
        frame.shift_offset_delta(10).unwrap();
        assert_eq!(frame.offset_delta, 70);

        let mut bytes = Vec::new();
        frame.serialize(&mut bytes);
        assert_eq!(bytes, vec![251, 0, 70]);
    }

    #[test]
    fn full_frame_round_trips() {
        let frame = StackMapFrame {
            offset_delta: 300,
            extended: true,
            body: FrameBody::Full {
                locals: vec![
                    VerificationType::Integer,
                    VerificationType::Object { class_index: 9 },
                ],
                stack: vec![VerificationType::Long],
            },
        };
        let mut bytes = Vec::new();
        frame.serialize(&mut bytes);
        let parsed = StackMapFrame::parse(&mut ClassReader::new(&bytes)).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn reserved_frame_tag_is_rejected() {
        let reserved = [130u8];
        assert!(matches!(
            StackMapFrame::parse(&mut ClassReader::new(&reserved)),
            Err(ClassFileError::Malformed { .. })
        ));
    }
}
