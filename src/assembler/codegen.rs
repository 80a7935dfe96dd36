use thiserror::Error;

use self::opcode::{GLYPH_CODES, KEY_CODES, OPCODE_MAPPING};
use super::resolver::{Program, ResolvedInstruction, ResolvedOperand};
use crate::ast::{AddressingMode, Mnemonic};

/// Mapping from instruction definitions to opcodes, plus the glyph and
/// key-code tables.
pub mod opcode;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodeGenError {
    #[error("Invalid opcode: {0} {1:?}")]
    InvalidOpcode(Mnemonic, AddressingMode),
    #[error("No glyph code for character '{0}'")]
    UnknownGlyph(char),
}

/// One byte of the memory image, annotated for the listing comment in
/// the output file.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MemoryCell {
    pub addr: u32,
    pub value: u8,
    pub comment: String,
}

impl MemoryCell {
    fn new(addr: u32, value: u8, comment: String) -> MemoryCell {
        MemoryCell {
            addr,
            value,
            comment,
        }
    }
}

fn opcode_comment(ins: &ResolvedInstruction) -> String {
    match &ins.label {
        Some(label) => format!("{} ({})", ins.mnemonic, label),
        None => ins.mnemonic.to_string(),
    }
}

/// Displacement from the byte following the displacement byte itself.
fn displacement(target: u32, displacement_addr: u32) -> i8 {
    // The second pass guarantees operands are in range; branch reach is
    // bounded by the 64K memory check, so the cast is the contract here
    (target as i64 - (displacement_addr as i64 + 1)) as i8
}

/// Encode one resolved instruction into its cells, dispatching on the
/// addressing mode.
pub fn instruction_to_cells(ins: &ResolvedInstruction) -> Result<Vec<MemoryCell>, CodeGenError> {
    let mode = ins.operand.addressing_mode();
    let opcode = OPCODE_MAPPING
        .find_opcode((ins.mnemonic, mode))
        .ok_or(CodeGenError::InvalidOpcode(ins.mnemonic, mode))?;

    let mut cells = vec![MemoryCell::new(ins.addr, opcode, opcode_comment(ins))];

    match &ins.operand {
        ResolvedOperand::Inherent => {}
        ResolvedOperand::Immediate(value) => {
            if ins.size == 2 {
                cells.push(MemoryCell::new(
                    ins.addr + 1,
                    *value as i8 as u8,
                    value.to_string(),
                ));
            } else {
                let bytes = (*value as i16).to_be_bytes();
                cells.push(MemoryCell::new(ins.addr + 1, bytes[0], value.to_string()));
                cells.push(MemoryCell::new(ins.addr + 2, bytes[1], value.to_string()));
            }
        }
        ResolvedOperand::Unsigned(value) => {
            cells.push(MemoryCell::new(ins.addr + 1, *value, value.to_string()));
        }
        ResolvedOperand::Glyph(c) => {
            let code = GLYPH_CODES
                .get(c)
                .copied()
                .ok_or(CodeGenError::UnknownGlyph(*c))?;
            cells.push(MemoryCell::new(ins.addr + 1, code, c.to_string()));
        }
        ResolvedOperand::Extended { addr, label } => {
            let bytes = (*addr as u16).to_be_bytes();
            let comment = match label {
                Some(label) => format!("{} (abs {})", label, addr),
                None => addr.to_string(),
            };
            cells.push(MemoryCell::new(ins.addr + 1, bytes[0], comment.clone()));
            cells.push(MemoryCell::new(ins.addr + 2, bytes[1], comment));
        }
        ResolvedOperand::Relative { target, label } => {
            let offset = displacement(*target, ins.addr + 1);
            cells.push(MemoryCell::new(
                ins.addr + 1,
                offset as u8,
                format!("{} (rel {})", label, offset),
            ));
        }
        ResolvedOperand::Indexed(offset) => {
            cells.push(MemoryCell::new(
                ins.addr + 1,
                *offset as i8 as u8,
                format!("{},X", offset),
            ));
        }
        ResolvedOperand::KeyRelative { key, target, label } => {
            cells.push(MemoryCell::new(
                ins.addr + 1,
                KEY_CODES[*key as usize],
                format!("KEY_{}", key),
            ));
            let offset = displacement(*target, ins.addr + 2);
            cells.push(MemoryCell::new(
                ins.addr + 2,
                offset as u8,
                format!("{} (rel {})", label, offset),
            ));
        }
    }

    Ok(cells)
}

/// Encode the whole program: instructions in code-segment order, then
/// the zero-initialized data segment in variable-declaration order.
#[tracing::instrument(skip_all)]
pub fn encode(program: &Program) -> Result<Vec<MemoryCell>, CodeGenError> {
    let mut cells = Vec::with_capacity(program.mem_size() as usize);
    for ins in &program.instructions {
        cells.extend(instruction_to_cells(ins)?);
    }
    for var in &program.variables {
        for i in 0..var.size {
            cells.push(MemoryCell::new(var.addr + i, 0x00, var.name.clone()));
        }
    }
    tracing::debug!(cells = cells.len(), "memory image encoded");
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::resolver::ResolvedVariable;

    use pretty_assertions::assert_eq;

    fn resolved(
        mnemonic: Mnemonic,
        operand: ResolvedOperand,
        addr: u32,
        size: u8,
    ) -> ResolvedInstruction {
        ResolvedInstruction {
            label: None,
            mnemonic,
            operand,
            addr,
            size,
            line: 1,
        }
    }

    fn bytes(cells: &[MemoryCell]) -> Vec<u8> {
        cells.iter().map(|c| c.value).collect()
    }

    #[test]
    fn test_encode_inherent() {
        let ins = resolved(Mnemonic::RTS, ResolvedOperand::Inherent, 0, 1);
        let cells = instruction_to_cells(&ins).unwrap();
        assert_eq!(cells, vec![MemoryCell::new(0, 0x39, "RTS".to_string())]);
    }

    #[test]
    fn test_encode_labeled_opcode_comment() {
        let ins = ResolvedInstruction {
            label: Some(".main".to_string()),
            ..resolved(Mnemonic::CLRS, ResolvedOperand::Inherent, 0, 1)
        };
        let cells = instruction_to_cells(&ins).unwrap();
        assert_eq!(cells[0].comment, "CLRS (.main)");
    }

    #[test]
    fn test_encode_immediate_single_byte() {
        let ins = resolved(Mnemonic::LDAA, ResolvedOperand::Immediate(-1), 0, 2);
        let cells = instruction_to_cells(&ins).unwrap();
        assert_eq!(bytes(&cells), vec![0x86, 0xFF]);
        assert_eq!(cells[1].comment, "-1");
    }

    #[test]
    fn test_encode_immediate_word_big_endian() {
        let ins = resolved(Mnemonic::LDX, ResolvedOperand::Immediate(0x1234), 0, 3);
        let cells = instruction_to_cells(&ins).unwrap();
        assert_eq!(bytes(&cells), vec![0xCE, 0x12, 0x34]);
    }

    #[test]
    fn test_encode_unsigned_immediate() {
        let ins = resolved(Mnemonic::LDR, ResolvedOperand::Unsigned(255), 0, 2);
        let cells = instruction_to_cells(&ins).unwrap();
        assert_eq!(bytes(&cells), vec![0x45, 0xFF]);
        assert_eq!(cells[1].comment, "255");
    }

    #[test]
    fn test_encode_glyph() {
        let ins = resolved(Mnemonic::DRSYM, ResolvedOperand::Glyph('A'), 0, 2);
        let cells = instruction_to_cells(&ins).unwrap();
        assert_eq!(bytes(&cells), vec![0xC5, 0x08]);
        assert_eq!(cells[1].comment, "A");
    }

    #[test]
    fn test_encode_extended_variable_address() {
        let ins = resolved(
            Mnemonic::STAA,
            ResolvedOperand::Extended {
                addr: 0x0114,
                label: None,
            },
            0,
            3,
        );
        let cells = instruction_to_cells(&ins).unwrap();
        assert_eq!(bytes(&cells), vec![0xB7, 0x01, 0x14]);
        assert_eq!(cells[1].comment, "276");
        assert_eq!(cells[2].comment, "276");
    }

    #[test]
    fn test_encode_subroutine_call() {
        let ins = resolved(
            Mnemonic::JSR,
            ResolvedOperand::Extended {
                addr: 12,
                label: Some("DRAW".to_string()),
            },
            0,
            3,
        );
        let cells = instruction_to_cells(&ins).unwrap();
        assert_eq!(bytes(&cells), vec![0xBD, 0x00, 0x0C]);
        assert_eq!(cells[1].comment, "DRAW (abs 12)");
    }

    #[test]
    fn test_encode_relative_forward_and_backward() {
        // Backward: target 0, displacement byte at 11: 0 - 12 = -12
        let back = resolved(
            Mnemonic::BNE,
            ResolvedOperand::Relative {
                target: 0,
                label: "LOOP".to_string(),
            },
            10,
            2,
        );
        let cells = instruction_to_cells(&back).unwrap();
        assert_eq!(bytes(&cells), vec![0x26, 0xF4]);
        assert_eq!(cells[1].comment, "LOOP (rel -12)");

        // Forward: target 20, displacement byte at 11: 20 - 12 = 8
        let fwd = resolved(
            Mnemonic::BRA,
            ResolvedOperand::Relative {
                target: 20,
                label: "END".to_string(),
            },
            10,
            2,
        );
        let cells = instruction_to_cells(&fwd).unwrap();
        assert_eq!(bytes(&cells), vec![0x20, 0x08]);
        assert_eq!(cells[1].comment, "END (rel 8)");
    }

    #[test]
    fn test_encode_indexed() {
        let ins = resolved(Mnemonic::STAB, ResolvedOperand::Indexed(-5), 0, 2);
        let cells = instruction_to_cells(&ins).unwrap();
        assert_eq!(bytes(&cells), vec![0xE7, 0xFB]);
        assert_eq!(cells[1].comment, "-5,X");
    }

    #[test]
    fn test_encode_key_branch() {
        // Key byte at addr 1, displacement byte at addr 2: 0 - 3 = -3
        let ins = resolved(
            Mnemonic::BKE,
            ResolvedOperand::KeyRelative {
                key: 3,
                target: 0,
                label: ".main".to_string(),
            },
            0,
            3,
        );
        let cells = instruction_to_cells(&ins).unwrap();
        assert_eq!(bytes(&cells), vec![0xCD, 0x26, 0xFD]);
        assert_eq!(cells[1].comment, "KEY_3");
        assert_eq!(cells[2].comment, ".main (rel -3)");
    }

    #[test]
    fn test_encode_program_emits_variables_as_zeroes() {
        let program = Program {
            instructions: vec![resolved(Mnemonic::RTS, ResolvedOperand::Inherent, 0, 1)],
            variables: vec![ResolvedVariable {
                name: "SQUARE".to_string(),
                addr: 1,
                size: 2,
            }],
            code_size: 1,
            data_size: 2,
        };
        let cells = encode(&program).unwrap();
        assert_eq!(
            cells,
            vec![
                MemoryCell::new(0, 0x39, "RTS".to_string()),
                MemoryCell::new(1, 0x00, "SQUARE".to_string()),
                MemoryCell::new(2, 0x00, "SQUARE".to_string()),
            ]
        );
    }

    // Encoding then decoding through the same opcode table recovers the
    // instruction.
    #[test]
    fn test_round_trip_through_opcode_table() {
        let tests = vec![
            resolved(Mnemonic::LDAA, ResolvedOperand::Immediate(0x12), 0, 2),
            resolved(Mnemonic::LDX, ResolvedOperand::Immediate(0x1234), 0, 3),
            resolved(
                Mnemonic::STAA,
                ResolvedOperand::Extended {
                    addr: 0x0200,
                    label: None,
                },
                0,
                3,
            ),
            resolved(
                Mnemonic::BNE,
                ResolvedOperand::Relative {
                    target: 0,
                    label: "L".to_string(),
                },
                4,
                2,
            ),
        ];

        for ins in tests {
            let cells = instruction_to_cells(&ins).unwrap();
            let (mnemonic, mode) = OPCODE_MAPPING.find_instruction(cells[0].value).unwrap();
            assert_eq!(mnemonic, ins.mnemonic);
            assert_eq!(mode, ins.operand.addressing_mode());

            match ins.operand {
                ResolvedOperand::Immediate(value) => {
                    if ins.size == 2 {
                        assert_eq!(cells[1].value as i8 as i32, value);
                    } else {
                        let word = i16::from_be_bytes([cells[1].value, cells[2].value]);
                        assert_eq!(word as i32, value);
                    }
                }
                ResolvedOperand::Extended { addr, .. } => {
                    let word = u16::from_be_bytes([cells[1].value, cells[2].value]);
                    assert_eq!(word as u32, addr);
                }
                ResolvedOperand::Relative { target, .. } => {
                    let offset = cells[1].value as i8;
                    assert_eq!(
                        offset as i64,
                        target as i64 - (ins.addr as i64 + 1 + 1),
                    );
                }
                _ => {}
            }
        }
    }
}
