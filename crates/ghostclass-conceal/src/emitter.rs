//! Synthesizes the class-initializer prefix that materializes the table
//! at load time.
//!
//! The emitted stream is straight-line (no branches, so no stack-map
//! frames of its own):
//!
//! 1. `newarray int` of the table length, one `dup`/index/value/`iastore`
//!    group per slot, each constant in its tightest encoding.
//! 2. The array parked in local 0 and stored to the table field.
//! 3. A 64-bit accumulator folding `xor(T[i] * 31)` over every element,
//!    read back out of the parked array, stored to the checksum field.
//!
//! The accumulator exists to put every table slot on a live data-flow
//! path; without it an optimizing rewriter could drop the array store.
//!
//! Stack and locals bounds are computed by symbolic simulation of the
//! emitted stream itself rather than trusted arithmetic on the shape.

use ghostclass_classfile::{instructions, opcodes, ClassFileError, ClinitPrefix, ConstantPool};

use crate::GhostError;

/// Pool indices of the two injected fields' `Fieldref` entries.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldRefs {
    /// The `int[]` table field.
    pub table: u16,
    /// The `long` checksum field.
    pub checksum: u16,
}

/// Emit the initializer prefix for `table`.
pub(crate) fn emit_prefix(
    pool: &mut ConstantPool,
    table: &[i32],
    refs: FieldRefs,
) -> Result<ClinitPrefix, GhostError> {
    let mut code = Vec::with_capacity(table.len() * 16);

    push_int(&mut code, pool, table.len() as i32)?;
    code.push(opcodes::NEWARRAY);
    code.push(opcodes::T_INT);

    for (index, value) in table.iter().enumerate() {
        code.push(opcodes::DUP);
        push_int(&mut code, pool, index as i32)?;
        push_int(&mut code, pool, *value)?;
        code.push(opcodes::IASTORE);
    }

    code.push(opcodes::ASTORE_0);
    code.push(opcodes::ALOAD_0);
    put_static(&mut code, refs.table);

    let thirty_one = pool.intern_long(31)?;
    code.push(opcodes::LCONST_0);
    for index in 0..table.len() {
        code.push(opcodes::ALOAD_0);
        push_int(&mut code, pool, index as i32)?;
        code.push(opcodes::IALOAD);
        code.push(opcodes::I2L);
        code.push(opcodes::LDC2_W);
        code.extend_from_slice(&thirty_one.to_be_bytes());
        code.push(opcodes::LMUL);
        code.push(opcodes::LXOR);
    }
    put_static(&mut code, refs.checksum);

    let (max_stack, max_locals) = bounds(&code, pool)?;
    Ok(ClinitPrefix { code, max_stack, max_locals })
}

/// Append the tightest push of an int constant: `iconst_<n>`, `bipush`,
/// `sipush`, or a pool load.
fn push_int(code: &mut Vec<u8>, pool: &mut ConstantPool, value: i32) -> Result<(), GhostError> {
    match value {
        -1..=5 => code.push((i32::from(opcodes::ICONST_0) + value) as u8),
        -128..=127 => {
            code.push(opcodes::BIPUSH);
            code.push(value as i8 as u8);
        },
        -32768..=32767 => {
            code.push(opcodes::SIPUSH);
            code.extend_from_slice(&(value as i16).to_be_bytes());
        },
        _ => {
            let index = pool.intern_integer(value)?;
            if index <= 255 {
                code.push(opcodes::LDC);
                code.push(index as u8);
            } else {
                code.push(opcodes::LDC_W);
                code.extend_from_slice(&index.to_be_bytes());
            }
        },
    }
    Ok(())
}

fn put_static(code: &mut Vec<u8>, field_ref: u16) {
    code.push(opcodes::PUTSTATIC);
    code.extend_from_slice(&field_ref.to_be_bytes());
}

fn unexpected(op: u8) -> GhostError {
    GhostError::ClassFile(ClassFileError::Malformed {
        what: "emitted initializer",
        detail: format!("opcode {op:#04x} outside the emitter's instruction set"),
    })
}

/// Symbolically execute the emitted subset, tracking operand-slot depth
/// (longs count as two) and the highest local slot touched.
///
/// Instruction boundaries come from the codec's shared decoder; only the
/// depth semantics live here.
fn bounds(code: &[u8], pool: &ConstantPool) -> Result<(u16, u16), GhostError> {
    let mut depth: i32 = 0;
    let mut max_depth: i32 = 0;
    let mut max_locals: u16 = 0;

    for instruction in instructions(code) {
        let instruction = instruction.map_err(GhostError::ClassFile)?;
        let op = instruction.opcode;
        let delta = match op {
            opcodes::ICONST_M1..=opcodes::ICONST_5
            | opcodes::BIPUSH
            | opcodes::SIPUSH
            | opcodes::LDC
            | opcodes::LDC_W
            | opcodes::DUP
            | opcodes::I2L => 1,
            opcodes::LCONST_0 | opcodes::LCONST_1 | opcodes::LDC2_W => 2,
            opcodes::ALOAD_0..=opcodes::ALOAD_3 => {
                max_locals = max_locals.max(u16::from(op - opcodes::ALOAD_0) + 1);
                1
            },
            opcodes::ASTORE_0..=opcodes::ASTORE_3 => {
                max_locals = max_locals.max(u16::from(op - opcodes::ASTORE_0) + 1);
                -1
            },
            opcodes::NEWARRAY | opcodes::RETURN => 0,
            opcodes::IASTORE => -3,
            opcodes::IALOAD => -1,
            opcodes::LMUL | opcodes::LXOR => -2,
            opcodes::PUTSTATIC => {
                let index = instruction.u16_at(0).ok_or_else(|| unexpected(op))?;
                let (_, _, descriptor) = pool.member_ref(index).map_err(GhostError::ClassFile)?;
                if matches!(descriptor.first(), Some(b'J' | b'D')) { -2 } else { -1 }
            },
            other => return Err(unexpected(other)),
        };
        depth += delta;
        if depth < 0 {
            return Err(GhostError::ClassFile(ClassFileError::Malformed {
                what: "emitted initializer",
                detail: format!("operand stack underflow at pc {}", instruction.pc),
            }));
        }
        max_depth = max_depth.max(depth);
    }

    Ok((max_depth as u16, max_locals))
}
