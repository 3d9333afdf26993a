//! Instruction-level iteration over a method's bytecode.
//!
//! One decoder for everything that walks a code array: the visitor's
//! per-instruction events, the extractors' simulator, and the emitter's
//! bound computation all consume [`instructions`] instead of hand-rolling
//! pc arithmetic.
//!
//! The decoder knows the operand width of every defined opcode, including
//! the three variable-length shapes: `tableswitch` and `lookupswitch`
//! (padded to a four-byte boundary relative to the code start) and the
//! `wide` prefix. It assigns no meaning to instructions; consumers match
//! on [`Instruction::opcode`] and read [`Instruction::operands`].

use crate::errors::{ClassFileError, Result};

/// One decoded instruction, borrowing the code array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction<'a> {
    /// Offset of the opcode within the code array.
    pub pc: usize,
    /// The opcode byte.
    pub opcode: u8,
    /// Operand bytes following the opcode, verbatim (for the switch
    /// instructions this includes the alignment padding).
    pub operands: &'a [u8],
}

impl Instruction<'_> {
    /// Operand byte at `offset`, if present.
    #[must_use]
    pub fn u8_at(&self, offset: usize) -> Option<u8> {
        self.operands.get(offset).copied()
    }

    /// Big-endian u16 operand at `offset`, if present.
    #[must_use]
    pub fn u16_at(&self, offset: usize) -> Option<u16> {
        let high = self.u8_at(offset)?;
        let low = self.u8_at(offset + 1)?;
        Some(u16::from_be_bytes([high, low]))
    }
}

/// Iterate over the instructions of a code array.
///
/// Each item is the next decoded instruction or the error that stopped
/// decoding (undefined opcode, or operands running past the end of the
/// array). After an error the iterator is exhausted.
pub fn instructions(code: &[u8]) -> Instructions<'_> {
    Instructions { code, pc: 0 }
}

/// Iterator state for [`instructions`].
#[derive(Debug)]
pub struct Instructions<'a> {
    code: &'a [u8],
    pc: usize,
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pc >= self.code.len() {
            return None;
        }
        match instruction_length(self.code, self.pc) {
            Ok(length) => {
                let end = self.pc + length;
                if end > self.code.len() {
                    self.pc = self.code.len();
                    return Some(Err(ClassFileError::Truncated {
                        offset: self.pc,
                        needed: end - self.code.len(),
                    }));
                }
                let instruction = Instruction {
                    pc: self.pc,
                    opcode: self.code[self.pc],
                    operands: &self.code[self.pc + 1..end],
                };
                self.pc = end;
                Some(Ok(instruction))
            },
            Err(error) => {
                self.pc = self.code.len();
                Some(Err(error))
            },
        }
    }
}

fn read_i32(code: &[u8], offset: usize) -> Result<i32> {
    match code.get(offset..offset + 4) {
        Some(bytes) => Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        None => Err(ClassFileError::Truncated {
            offset,
            needed: offset + 4 - code.len(),
        }),
    }
}

/// Total encoded length (opcode included) of the instruction at `pc`.
fn instruction_length(code: &[u8], pc: usize) -> Result<usize> {
    let opcode = code[pc];
    let operand_len = match opcode {
        // nop through dconst_1, the _<n> load/store families, array
        // access, stack ops, arithmetic, conversions, comparisons,
        // returns, arraylength/athrow, monitors
        0x00..=0x0F
        | 0x1A..=0x35
        | 0x3B..=0x83
        | 0x85..=0x98
        | 0xAC..=0xB1
        | 0xBE
        | 0xBF
        | 0xC2
        | 0xC3 => 0,
        // bipush, ldc, single-byte-index loads/stores, ret, newarray
        0x10 | 0x12 | 0x15..=0x19 | 0x36..=0x3A | 0xA9 | 0xBC => 1,
        // sipush, ldc_w/ldc2_w, iinc, two-byte branches, field/method
        // access, new/anewarray, checkcast/instanceof, ifnull/ifnonnull
        0x11 | 0x13 | 0x14 | 0x84 | 0x99..=0xA8 | 0xB2..=0xB8 | 0xBB | 0xBD | 0xC0 | 0xC1
        | 0xC6 | 0xC7 => 2,
        // multianewarray
        0xC5 => 3,
        // invokeinterface, invokedynamic, goto_w, jsr_w
        0xB9 | 0xBA | 0xC8 | 0xC9 => 4,
        // wide prefix: the widened opcode plus a u16 index, and for iinc
        // also a u16 increment
        0xC4 => match code.get(pc + 1) {
            Some(0x84) => 5,
            Some(_) => 3,
            None => {
                return Err(ClassFileError::Truncated { offset: pc + 1, needed: 1 });
            },
        },
        // tableswitch: pad to a 4-byte boundary, default, low, high, then
        // one 4-byte offset per covered value
        0xAA => {
            let pad = (4 - (pc + 1) % 4) % 4;
            let base = pc + 1 + pad;
            let low = read_i32(code, base + 4)?;
            let high = read_i32(code, base + 8)?;
            if high < low {
                return Err(ClassFileError::Malformed {
                    what: "tableswitch",
                    detail: format!("high {high} below low {low} at pc {pc}"),
                });
            }
            let count = (i64::from(high) - i64::from(low) + 1) as usize;
            pad + 12 + count.checked_mul(4).ok_or(ClassFileError::Malformed {
                what: "tableswitch",
                detail: format!("jump table overflow at pc {pc}"),
            })?
        },
        // lookupswitch: pad, default, npairs, then 8 bytes per pair
        0xAB => {
            let pad = (4 - (pc + 1) % 4) % 4;
            let base = pc + 1 + pad;
            let npairs = read_i32(code, base + 4)?;
            if npairs < 0 {
                return Err(ClassFileError::Malformed {
                    what: "lookupswitch",
                    detail: format!("negative pair count {npairs} at pc {pc}"),
                });
            }
            pad + 8 + (npairs as usize).checked_mul(8).ok_or(ClassFileError::Malformed {
                what: "lookupswitch",
                detail: format!("pair table overflow at pc {pc}"),
            })?
        },
        _ => return Err(ClassFileError::UnknownOpcode { opcode, pc }),
    };
    Ok(1 + operand_len)
}
