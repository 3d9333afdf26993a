//! The instruction subset the editing layers emit and recognize.
//!
//! This is not a full opcode table; it covers constant pushes, array
//! creation and element access, the long arithmetic the checksum
//! accumulator uses, field access, and method invocation.

/// iconst_m1
pub const ICONST_M1: u8 = 0x02;
/// iconst_0
pub const ICONST_0: u8 = 0x03;
/// iconst_5 (the top of the iconst family)
pub const ICONST_5: u8 = 0x08;
/// lconst_0
pub const LCONST_0: u8 = 0x09;
/// lconst_1
pub const LCONST_1: u8 = 0x0A;
/// bipush: push a sign-extended byte
pub const BIPUSH: u8 = 0x10;
/// sipush: push a sign-extended short
pub const SIPUSH: u8 = 0x11;
/// ldc: push a one-slot pool constant (index fits a byte)
pub const LDC: u8 = 0x12;
/// ldc_w: push a one-slot pool constant (wide index)
pub const LDC_W: u8 = 0x13;
/// ldc2_w: push a two-slot pool constant
pub const LDC2_W: u8 = 0x14;
/// aload: load a reference from a local slot
pub const ALOAD: u8 = 0x19;
/// aload_0
pub const ALOAD_0: u8 = 0x2A;
/// aload_3 (the top of the aload_<n> family)
pub const ALOAD_3: u8 = 0x2D;
/// iaload: load an int from an array
pub const IALOAD: u8 = 0x2E;
/// astore: store a reference into a local slot
pub const ASTORE: u8 = 0x3A;
/// astore_0
pub const ASTORE_0: u8 = 0x4B;
/// astore_3 (the top of the astore_<n> family)
pub const ASTORE_3: u8 = 0x4E;
/// iastore: store an int into an array
pub const IASTORE: u8 = 0x4F;
/// dup
pub const DUP: u8 = 0x59;
/// lmul
pub const LMUL: u8 = 0x69;
/// lxor
pub const LXOR: u8 = 0x83;
/// i2l: widen int to long
pub const I2L: u8 = 0x85;
/// return (void)
pub const RETURN: u8 = 0xB1;
/// getstatic
pub const GETSTATIC: u8 = 0xB2;
/// putstatic
pub const PUTSTATIC: u8 = 0xB3;
/// invokespecial
pub const INVOKESPECIAL: u8 = 0xB7;
/// invokestatic
pub const INVOKESTATIC: u8 = 0xB8;
/// newarray: create a primitive array
pub const NEWARRAY: u8 = 0xBC;
/// pop
pub const POP: u8 = 0x57;

/// `newarray` array-type code for `int[]`.
pub const T_INT: u8 = 10;
