//! Minimal stack machine that re-executes a class-initializer prefix to
//! recover the table literal.
//!
//! Instruction boundaries come from the codec's shared decoder
//! ([`ghostclass_classfile::instructions`]); this module adds only the
//! semantics. The machine understands exactly the opcodes the emitter
//! produces (constant pushes, `newarray int`, `dup`, `iastore`/`iaload`,
//! the parked-array `astore`/`aload`, the long accumulator arithmetic,
//! `putstatic`) and nothing else. Any other opcode aborts the current
//! candidate rather than the whole operation, so an initializer that a
//! compiler front-loaded with its own setup merely skips that candidate.
//!
//! Recovery stops at the first `putstatic` whose target is the candidate
//! field. With the newest prefix always spliced at the method entry, the
//! first match is the newest concealment.

use std::collections::HashMap;

use ghostclass_classfile::{instructions, opcodes, ConstantPool};

/// Upper bound on a simulated array, well above any table size but low
/// enough that hostile inputs cannot demand large allocations.
const ARRAY_LIMIT: i32 = 65535;

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Int(i32),
    Long,
    Ref(usize),
}

/// Run the machine over `code`, looking for a store to `field_name`.
///
/// Returns the array assigned to the field, or `None` when the stream
/// leaves the understood subset or ends without storing to it.
pub(crate) fn recover_table(
    code: &[u8],
    pool: &ConstantPool,
    field_name: &[u8],
) -> Option<Vec<i32>> {
    let mut stack: Vec<Value> = Vec::new();
    let mut locals: HashMap<u8, Value> = HashMap::new();
    let mut arrays: Vec<Vec<i32>> = Vec::new();

    for instruction in instructions(code) {
        let instruction = instruction.ok()?;
        match instruction.opcode {
            opcodes::ICONST_M1..=opcodes::ICONST_5 => {
                stack.push(Value::Int(
                    i32::from(instruction.opcode) - i32::from(opcodes::ICONST_0),
                ));
            },
            opcodes::BIPUSH => {
                stack.push(Value::Int(i32::from(instruction.u8_at(0)? as i8)));
            },
            opcodes::SIPUSH => {
                stack.push(Value::Int(i32::from(instruction.u16_at(0)? as i16)));
            },
            opcodes::LDC => {
                let index = u16::from(instruction.u8_at(0)?);
                stack.push(Value::Int(constant_int(pool, index)?));
            },
            opcodes::LDC_W => {
                stack.push(Value::Int(constant_int(pool, instruction.u16_at(0)?)?));
            },
            opcodes::LDC2_W | opcodes::LCONST_0 | opcodes::LCONST_1 => {
                stack.push(Value::Long);
            },
            opcodes::NEWARRAY => {
                let atype = instruction.u8_at(0)?;
                let Value::Int(len) = stack.pop()? else { return None };
                if atype != opcodes::T_INT || !(0..=ARRAY_LIMIT).contains(&len) {
                    return None;
                }
                arrays.push(vec![0i32; len as usize]);
                stack.push(Value::Ref(arrays.len() - 1));
            },
            opcodes::DUP => {
                let top = stack.last()?.clone();
                if top == Value::Long {
                    return None;
                }
                stack.push(top);
            },
            opcodes::IASTORE => {
                let Value::Int(value) = stack.pop()? else { return None };
                let Value::Int(index) = stack.pop()? else { return None };
                let Value::Ref(array) = stack.pop()? else { return None };
                let slot = arrays.get_mut(array)?.get_mut(usize::try_from(index).ok()?)?;
                *slot = value;
            },
            opcodes::IALOAD => {
                let Value::Int(index) = stack.pop()? else { return None };
                let Value::Ref(array) = stack.pop()? else { return None };
                let value = *arrays.get(array)?.get(usize::try_from(index).ok()?)?;
                stack.push(Value::Int(value));
            },
            opcodes::ASTORE_0..=opcodes::ASTORE_3 => {
                let value = stack.pop()?;
                if !matches!(value, Value::Ref(_)) {
                    return None;
                }
                locals.insert(instruction.opcode - opcodes::ASTORE_0, value);
            },
            opcodes::ASTORE => {
                let slot = instruction.u8_at(0)?;
                let value = stack.pop()?;
                if !matches!(value, Value::Ref(_)) {
                    return None;
                }
                locals.insert(slot, value);
            },
            opcodes::ALOAD_0..=opcodes::ALOAD_3 => {
                stack.push(locals.get(&(instruction.opcode - opcodes::ALOAD_0))?.clone());
            },
            opcodes::ALOAD => {
                stack.push(locals.get(&instruction.u8_at(0)?)?.clone());
            },
            opcodes::I2L => {
                let Value::Int(_) = stack.pop()? else { return None };
                stack.push(Value::Long);
            },
            opcodes::LMUL | opcodes::LXOR => {
                let (Value::Long, Value::Long) = (stack.pop()?, stack.pop()?) else {
                    return None;
                };
                stack.push(Value::Long);
            },
            opcodes::PUTSTATIC => {
                let index = instruction.u16_at(0)?;
                let (_, name, descriptor) = pool.member_ref(index).ok()?;
                let value = stack.pop()?;
                if name == field_name && descriptor == b"[I" {
                    let Value::Ref(array) = value else { return None };
                    return Some(arrays.get(array)?.clone());
                }
                // Someone else's field: widths must still line up.
                let wide = matches!(descriptor.first(), Some(b'J' | b'D'));
                if wide != (value == Value::Long) {
                    return None;
                }
            },
            _ => return None,
        }
    }
    None
}

fn constant_int(pool: &ConstantPool, index: u16) -> Option<i32> {
    match pool.get(index).ok()? {
        ghostclass_classfile::Constant::Integer(value) => Some(*value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::{emit_prefix, FieldRefs};

    fn emitted(table: &[i32]) -> (Vec<u8>, ConstantPool) {
        let mut pool = ConstantPool::new();
        let refs = FieldRefs {
            table: pool.intern_fieldref(b"Carrier", b"_S1", b"[I").unwrap(),
            checksum: pool.intern_fieldref(b"Carrier", b"_mk", b"J").unwrap(),
        };
        let prefix = emit_prefix(&mut pool, table, refs).unwrap();
        (prefix.code, pool)
    }

    #[test]
    fn recovers_the_emitted_table() {
        let table: Vec<i32> = vec![i32::MIN, -1, 0, 1, 127, 128, 32767, 32768, i32::MAX];
        let (code, pool) = emitted(&table);
        assert_eq!(recover_table(&code, &pool, b"_S1"), Some(table));
    }

    #[test]
    fn wrong_candidate_name_misses() {
        let (code, pool) = emitted(&[1, 2, 3]);
        assert_eq!(recover_table(&code, &pool, b"_T9"), None);
    }

    #[test]
    fn foreign_opcode_aborts_the_candidate() {
        let (mut code, pool) = emitted(&[5, 6]);
        code.insert(0, 0xBB); // `new`: outside the subset
        assert_eq!(recover_table(&code, &pool, b"_S1"), None);
    }

    #[test]
    fn undefined_opcode_aborts_the_candidate() {
        let (mut code, pool) = emitted(&[5, 6]);
        code.insert(0, 0xCB); // not an instruction at all
        assert_eq!(recover_table(&code, &pool, b"_S1"), None);
    }

    #[test]
    fn trailing_foreign_code_after_the_store_is_ignored() {
        let (mut code, pool) = emitted(&[10, 20, 30]);
        code.extend_from_slice(&[0xBB, 0xFF, 0xFF]); // garbage past the store
        assert_eq!(recover_table(&code, &pool, b"_S1"), Some(vec![10, 20, 30]));
    }

    #[test]
    fn second_prefix_behind_the_first_is_reachable() {
        // Simulate a re-concealment: new prefix for _S1 spliced ahead of an
        // older prefix for _T2. Scanning for the old field must skim the
        // whole new prefix (including its accumulator) first.
        let mut pool = ConstantPool::new();
        let new_refs = FieldRefs {
            table: pool.intern_fieldref(b"Carrier", b"_S1", b"[I").unwrap(),
            checksum: pool.intern_fieldref(b"Carrier", b"_mk", b"J").unwrap(),
        };
        let old_refs = FieldRefs {
            table: pool.intern_fieldref(b"Carrier", b"_T2", b"[I").unwrap(),
            checksum: pool.intern_fieldref(b"Carrier", b"_ck", b"J").unwrap(),
        };
        let mut code = emit_prefix(&mut pool, &[7, 8], new_refs).unwrap().code;
        code.extend_from_slice(&emit_prefix(&mut pool, &[9, 10, 11], old_refs).unwrap().code);

        assert_eq!(recover_table(&code, &pool, b"_S1"), Some(vec![7, 8]));
        assert_eq!(recover_table(&code, &pool, b"_T2"), Some(vec![9, 10, 11]));
    }

    #[test]
    fn stack_underflow_aborts() {
        let pool = ConstantPool::new();
        // iastore with an empty stack
        assert_eq!(recover_table(&[opcodes::IASTORE], &pool, b"_S1"), None);
    }
}
