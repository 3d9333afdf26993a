//! Constant pool: the table of shared literals every other section
//! references by index.
//!
//! Indices are 1-based and `Long`/`Double` entries occupy two slots, both
//! quirks mandated by the format. The pool is grow-only: parsing fills it
//! and edits only append through the `intern_*` family, which dedupes and
//! refuses to grow past the 65534-slot ceiling.
//!
//! # Invariants
//!
//! - `Utf8` entries are raw byte strings. The VM stores modified UTF-8 and
//!   re-encoding through `String` would not round-trip, so the codec never
//!   does; `Utf8` content is only interpreted on demand.
//! - `Float`/`Double` entries are raw bit patterns for the same reason
//!   (NaN payloads must survive).

use crate::errors::{ClassFileError, Result};
use crate::reader::ClassReader;
use bytes::BufMut;

/// Constant-pool tag bytes, as defined by the format.
pub mod tags {
    /// CONSTANT_Utf8
    pub const UTF8: u8 = 1;
    /// CONSTANT_Integer
    pub const INTEGER: u8 = 3;
    /// CONSTANT_Float
    pub const FLOAT: u8 = 4;
    /// CONSTANT_Long
    pub const LONG: u8 = 5;
    /// CONSTANT_Double
    pub const DOUBLE: u8 = 6;
    /// CONSTANT_Class
    pub const CLASS: u8 = 7;
    /// CONSTANT_String
    pub const STRING: u8 = 8;
    /// CONSTANT_Fieldref
    pub const FIELDREF: u8 = 9;
    /// CONSTANT_Methodref
    pub const METHODREF: u8 = 10;
    /// CONSTANT_InterfaceMethodref
    pub const INTERFACE_METHODREF: u8 = 11;
    /// CONSTANT_NameAndType
    pub const NAME_AND_TYPE: u8 = 12;
    /// CONSTANT_MethodHandle
    pub const METHOD_HANDLE: u8 = 15;
    /// CONSTANT_MethodType
    pub const METHOD_TYPE: u8 = 16;
    /// CONSTANT_Dynamic
    pub const DYNAMIC: u8 = 17;
    /// CONSTANT_InvokeDynamic
    pub const INVOKE_DYNAMIC: u8 = 18;
    /// CONSTANT_Module
    pub const MODULE: u8 = 19;
    /// CONSTANT_Package
    pub const PACKAGE: u8 = 20;
}

/// One constant-pool entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    /// Raw modified-UTF-8 byte string.
    Utf8(Vec<u8>),
    /// 32-bit signed integer literal.
    Integer(i32),
    /// 32-bit float literal, kept as raw bits.
    Float {
        /// IEEE-754 bit pattern.
        bits: u32,
    },
    /// 64-bit signed integer literal. Occupies two pool slots.
    Long(i64),
    /// 64-bit float literal, kept as raw bits. Occupies two pool slots.
    Double {
        /// IEEE-754 bit pattern.
        bits: u64,
    },
    /// Reference to a class, by the index of its internal-form name.
    Class {
        /// Index of a `Utf8` entry.
        name_index: u16,
    },
    /// String literal, by the index of its content.
    String {
        /// Index of a `Utf8` entry.
        string_index: u16,
    },
    /// Field reference.
    Fieldref {
        /// Index of a `Class` entry.
        class_index: u16,
        /// Index of a `NameAndType` entry.
        name_and_type_index: u16,
    },
    /// Method reference.
    Methodref {
        /// Index of a `Class` entry.
        class_index: u16,
        /// Index of a `NameAndType` entry.
        name_and_type_index: u16,
    },
    /// Interface-method reference.
    InterfaceMethodref {
        /// Index of a `Class` entry.
        class_index: u16,
        /// Index of a `NameAndType` entry.
        name_and_type_index: u16,
    },
    /// Paired name and descriptor.
    NameAndType {
        /// Index of a `Utf8` entry holding the name.
        name_index: u16,
        /// Index of a `Utf8` entry holding the descriptor.
        descriptor_index: u16,
    },
    /// Method handle.
    MethodHandle {
        /// Handle kind (1..=9).
        reference_kind: u8,
        /// Index of the referenced member entry.
        reference_index: u16,
    },
    /// Method type.
    MethodType {
        /// Index of a `Utf8` entry holding the descriptor.
        descriptor_index: u16,
    },
    /// Dynamically-computed constant.
    Dynamic {
        /// Index into the `BootstrapMethods` attribute.
        bootstrap_method_attr_index: u16,
        /// Index of a `NameAndType` entry.
        name_and_type_index: u16,
    },
    /// Dynamically-computed call site.
    InvokeDynamic {
        /// Index into the `BootstrapMethods` attribute.
        bootstrap_method_attr_index: u16,
        /// Index of a `NameAndType` entry.
        name_and_type_index: u16,
    },
    /// Module declaration.
    Module {
        /// Index of a `Utf8` entry.
        name_index: u16,
    },
    /// Package declaration.
    Package {
        /// Index of a `Utf8` entry.
        name_index: u16,
    },
}

impl Constant {
    /// Human-readable kind name, used in diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Constant::Utf8(_) => "Utf8",
            Constant::Integer(_) => "Integer",
            Constant::Float { .. } => "Float",
            Constant::Long(_) => "Long",
            Constant::Double { .. } => "Double",
            Constant::Class { .. } => "Class",
            Constant::String { .. } => "String",
            Constant::Fieldref { .. } => "Fieldref",
            Constant::Methodref { .. } => "Methodref",
            Constant::InterfaceMethodref { .. } => "InterfaceMethodref",
            Constant::NameAndType { .. } => "NameAndType",
            Constant::MethodHandle { .. } => "MethodHandle",
            Constant::MethodType { .. } => "MethodType",
            Constant::Dynamic { .. } => "Dynamic",
            Constant::InvokeDynamic { .. } => "InvokeDynamic",
            Constant::Module { .. } => "Module",
            Constant::Package { .. } => "Package",
        }
    }

    /// True for entries that occupy two pool slots.
    #[must_use]
    pub fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double { .. })
    }
}

/// A pool slot: either a real entry or the phantom slot that follows a
/// `Long`/`Double` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Entry(Constant),
    Continuation,
}

/// Highest number of usable slots. The on-disk `constant_pool_count` is a
/// u16 equal to slot count + 1, so 65534 is the hard ceiling.
pub const MAX_POOL_SLOTS: usize = 65534;

/// The constant pool of one class file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstantPool {
    slots: Vec<Slot>,
}

impl ConstantPool {
    /// Empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// The on-disk `constant_pool_count`: number of slots + 1.
    #[must_use]
    pub fn count(&self) -> u16 {
        self.slots.len() as u16 + 1
    }

    /// Iterate over `(index, entry)` pairs, skipping continuation slots.
    pub fn entries(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot {
            Slot::Entry(c) => Some((i as u16 + 1, c)),
            Slot::Continuation => None,
        })
    }

    /// Resolve an index to its entry.
    pub fn get(&self, index: u16) -> Result<&Constant> {
        if index == 0 || usize::from(index) > self.slots.len() {
            return Err(ClassFileError::IndexOutOfRange { index, count: self.count() });
        }
        match &self.slots[usize::from(index) - 1] {
            Slot::Entry(c) => Ok(c),
            Slot::Continuation => Err(ClassFileError::WrongConstantKind {
                index,
                expected: "entry",
                found: "long/double continuation slot",
            }),
        }
    }

    /// Resolve an index to `Utf8` content.
    pub fn get_utf8(&self, index: u16) -> Result<&[u8]> {
        match self.get(index)? {
            Constant::Utf8(bytes) => Ok(bytes),
            other => Err(ClassFileError::WrongConstantKind {
                index,
                expected: "Utf8",
                found: other.kind(),
            }),
        }
    }

    /// Resolve an index to `Utf8` content that must also be valid UTF-8.
    pub fn get_utf8_str(&self, index: u16) -> Result<&str> {
        std::str::from_utf8(self.get_utf8(index)?).map_err(|_| ClassFileError::Malformed {
            what: "Utf8 constant",
            detail: format!("index {index} is not valid UTF-8"),
        })
    }

    /// Resolve a `Class` entry to its internal-form name.
    pub fn class_name_bytes(&self, index: u16) -> Result<&[u8]> {
        match self.get(index)? {
            Constant::Class { name_index } => self.get_utf8(*name_index),
            other => Err(ClassFileError::WrongConstantKind {
                index,
                expected: "Class",
                found: other.kind(),
            }),
        }
    }

    /// Resolve a `Fieldref`/`Methodref` entry to `(class name, member name,
    /// descriptor)`.
    pub fn member_ref(&self, index: u16) -> Result<(&[u8], &[u8], &[u8])> {
        let (class_index, nat_index) = match self.get(index)? {
            Constant::Fieldref { class_index, name_and_type_index }
            | Constant::Methodref { class_index, name_and_type_index }
            | Constant::InterfaceMethodref { class_index, name_and_type_index } => {
                (*class_index, *name_and_type_index)
            },
            other => {
                return Err(ClassFileError::WrongConstantKind {
                    index,
                    expected: "Fieldref/Methodref",
                    found: other.kind(),
                });
            },
        };
        let class = self.class_name_bytes(class_index)?;
        match self.get(nat_index)? {
            Constant::NameAndType { name_index, descriptor_index } => {
                Ok((class, self.get_utf8(*name_index)?, self.get_utf8(*descriptor_index)?))
            },
            other => Err(ClassFileError::WrongConstantKind {
                index: nat_index,
                expected: "NameAndType",
                found: other.kind(),
            }),
        }
    }

    fn push(&mut self, constant: Constant) -> Result<u16> {
        let slots_needed = if constant.is_wide() { 2 } else { 1 };
        if self.slots.len() + slots_needed > MAX_POOL_SLOTS {
            return Err(ClassFileError::PoolFull);
        }
        let index = self.slots.len() as u16 + 1;
        let wide = constant.is_wide();
        self.slots.push(Slot::Entry(constant));
        if wide {
            self.slots.push(Slot::Continuation);
        }
        Ok(index)
    }

    fn find(&self, wanted: &Constant) -> Option<u16> {
        self.entries().find(|(_, c)| *c == wanted).map(|(i, _)| i)
    }

    fn intern(&mut self, constant: Constant) -> Result<u16> {
        if let Some(index) = self.find(&constant) {
            return Ok(index);
        }
        self.push(constant)
    }

    /// Intern a `Utf8` entry, returning the existing index when present.
    pub fn intern_utf8(&mut self, bytes: &[u8]) -> Result<u16> {
        if bytes.len() > usize::from(u16::MAX) {
            return Err(ClassFileError::TooLarge {
                what: "Utf8 constant",
                len: bytes.len(),
                limit: usize::from(u16::MAX),
            });
        }
        self.intern(Constant::Utf8(bytes.to_vec()))
    }

    /// Intern an `Integer` entry.
    pub fn intern_integer(&mut self, value: i32) -> Result<u16> {
        self.intern(Constant::Integer(value))
    }

    /// Intern a `Long` entry.
    pub fn intern_long(&mut self, value: i64) -> Result<u16> {
        self.intern(Constant::Long(value))
    }

    /// Intern a `Class` entry for an internal-form name.
    pub fn intern_class(&mut self, name: &[u8]) -> Result<u16> {
        let name_index = self.intern_utf8(name)?;
        self.intern(Constant::Class { name_index })
    }

    /// Intern a `String` entry for literal content.
    pub fn intern_string(&mut self, content: &[u8]) -> Result<u16> {
        let string_index = self.intern_utf8(content)?;
        self.intern(Constant::String { string_index })
    }

    /// Intern a `NameAndType` entry.
    pub fn intern_name_and_type(&mut self, name: &[u8], descriptor: &[u8]) -> Result<u16> {
        let name_index = self.intern_utf8(name)?;
        let descriptor_index = self.intern_utf8(descriptor)?;
        self.intern(Constant::NameAndType { name_index, descriptor_index })
    }

    /// Intern a `Fieldref` entry.
    pub fn intern_fieldref(&mut self, class: &[u8], name: &[u8], descriptor: &[u8]) -> Result<u16> {
        let class_index = self.intern_class(class)?;
        let name_and_type_index = self.intern_name_and_type(name, descriptor)?;
        self.intern(Constant::Fieldref { class_index, name_and_type_index })
    }

    /// Intern a `Methodref` entry.
    pub fn intern_methodref(
        &mut self,
        class: &[u8],
        name: &[u8],
        descriptor: &[u8],
    ) -> Result<u16> {
        let class_index = self.intern_class(class)?;
        let name_and_type_index = self.intern_name_and_type(name, descriptor)?;
        self.intern(Constant::Methodref { class_index, name_and_type_index })
    }

    /// Parse the pool section (count + entries).
    pub fn parse(reader: &mut ClassReader<'_>) -> Result<Self> {
        let count = reader.u16()?;
        let mut pool = Self::new();
        // u32 so a wide entry in the final slot cannot wrap the counter.
        let mut index: u32 = 1;
        while index < u32::from(count) {
            let tag = reader.u8()?;
            let constant = Self::parse_entry(tag, index as u16, reader)?;
            let wide = constant.is_wide();
            pool.slots.push(Slot::Entry(constant));
            if wide {
                pool.slots.push(Slot::Continuation);
                index += 2;
            } else {
                index += 1;
            }
        }
        if index != u32::from(count) {
            // A wide entry in the final slot claimed a phantom slot past the
            // declared count.
            return Err(ClassFileError::Malformed {
                what: "constant pool",
                detail: format!("wide entry overruns declared count {count}"),
            });
        }
        Ok(pool)
    }

    fn parse_entry(tag: u8, index: u16, reader: &mut ClassReader<'_>) -> Result<Constant> {
        let constant = match tag {
            tags::UTF8 => {
                let len = reader.u16()?;
                Constant::Utf8(reader.bytes(usize::from(len))?.to_vec())
            },
            tags::INTEGER => Constant::Integer(reader.i32()?),
            tags::FLOAT => Constant::Float { bits: reader.u32()? },
            tags::LONG => Constant::Long(reader.u64()? as i64),
            tags::DOUBLE => Constant::Double { bits: reader.u64()? },
            tags::CLASS => Constant::Class { name_index: reader.u16()? },
            tags::STRING => Constant::String { string_index: reader.u16()? },
            tags::FIELDREF => Constant::Fieldref {
                class_index: reader.u16()?,
                name_and_type_index: reader.u16()?,
            },
            tags::METHODREF => Constant::Methodref {
                class_index: reader.u16()?,
                name_and_type_index: reader.u16()?,
            },
            tags::INTERFACE_METHODREF => Constant::InterfaceMethodref {
                class_index: reader.u16()?,
                name_and_type_index: reader.u16()?,
            },
            tags::NAME_AND_TYPE => Constant::NameAndType {
                name_index: reader.u16()?,
                descriptor_index: reader.u16()?,
            },
            tags::METHOD_HANDLE => Constant::MethodHandle {
                reference_kind: reader.u8()?,
                reference_index: reader.u16()?,
            },
            tags::METHOD_TYPE => Constant::MethodType { descriptor_index: reader.u16()? },
            tags::DYNAMIC => Constant::Dynamic {
                bootstrap_method_attr_index: reader.u16()?,
                name_and_type_index: reader.u16()?,
            },
            tags::INVOKE_DYNAMIC => Constant::InvokeDynamic {
                bootstrap_method_attr_index: reader.u16()?,
                name_and_type_index: reader.u16()?,
            },
            tags::MODULE => Constant::Module { name_index: reader.u16()? },
            tags::PACKAGE => Constant::Package { name_index: reader.u16()? },
            _ => return Err(ClassFileError::UnknownTag { tag, index }),
        };
        Ok(constant)
    }

    /// Serialize the pool section (count + entries).
    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.put_u16(self.count());
        for (_, constant) in self.entries() {
            Self::serialize_entry(constant, out);
        }
    }

    fn serialize_entry(constant: &Constant, out: &mut Vec<u8>) {
        match constant {
            Constant::Utf8(bytes) => {
                out.put_u8(tags::UTF8);
                out.put_u16(bytes.len() as u16);
                out.put_slice(bytes);
            },
            Constant::Integer(value) => {
                out.put_u8(tags::INTEGER);
                out.put_i32(*value);
            },
            Constant::Float { bits } => {
                out.put_u8(tags::FLOAT);
                out.put_u32(*bits);
            },
            Constant::Long(value) => {
                out.put_u8(tags::LONG);
                out.put_u64(*value as u64);
            },
            Constant::Double { bits } => {
                out.put_u8(tags::DOUBLE);
                out.put_u64(*bits);
            },
            Constant::Class { name_index } => {
                out.put_u8(tags::CLASS);
                out.put_u16(*name_index);
            },
            Constant::String { string_index } => {
                out.put_u8(tags::STRING);
                out.put_u16(*string_index);
            },
            Constant::Fieldref { class_index, name_and_type_index } => {
                out.put_u8(tags::FIELDREF);
                out.put_u16(*class_index);
                out.put_u16(*name_and_type_index);
            },
            Constant::Methodref { class_index, name_and_type_index } => {
                out.put_u8(tags::METHODREF);
                out.put_u16(*class_index);
                out.put_u16(*name_and_type_index);
            },
            Constant::InterfaceMethodref { class_index, name_and_type_index } => {
                out.put_u8(tags::INTERFACE_METHODREF);
                out.put_u16(*class_index);
                out.put_u16(*name_and_type_index);
            },
            Constant::NameAndType { name_index, descriptor_index } => {
                out.put_u8(tags::NAME_AND_TYPE);
                out.put_u16(*name_index);
                out.put_u16(*descriptor_index);
            },
            Constant::MethodHandle { reference_kind, reference_index } => {
                out.put_u8(tags::METHOD_HANDLE);
                out.put_u8(*reference_kind);
                out.put_u16(*reference_index);
            },
            Constant::MethodType { descriptor_index } => {
                out.put_u8(tags::METHOD_TYPE);
                out.put_u16(*descriptor_index);
            },
            Constant::Dynamic { bootstrap_method_attr_index, name_and_type_index } => {
                out.put_u8(tags::DYNAMIC);
                out.put_u16(*bootstrap_method_attr_index);
                out.put_u16(*name_and_type_index);
            },
            Constant::InvokeDynamic { bootstrap_method_attr_index, name_and_type_index } => {
                out.put_u8(tags::INVOKE_DYNAMIC);
                out.put_u16(*bootstrap_method_attr_index);
                out.put_u16(*name_and_type_index);
            },
            Constant::Module { name_index } => {
                out.put_u8(tags::MODULE);
                out.put_u16(*name_index);
            },
            Constant::Package { name_index } => {
                out.put_u8(tags::PACKAGE);
                out.put_u16(*name_index);
            },
        }
    }
}
