use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::ast::{AddressingMode, Mnemonic};

/// A mapper between instruction definitions and opcodes.
///
/// The base opcodes follow the 68HC11 map; the drawing, color and
/// game-clock extensions sit in slots the 6811 leaves unused or that this
/// subset never decodes.
#[derive(Debug)]
pub struct OpcodeMapping {
    forward_map: HashMap<(Mnemonic, AddressingMode), u8>,
    reverse_map: HashMap<u8, (Mnemonic, AddressingMode)>,
}

impl OpcodeMapping {
    /// Find the opcode corresponding to the given instruction.
    pub fn find_opcode(&self, instruction: (Mnemonic, AddressingMode)) -> Option<u8> {
        self.forward_map.get(&instruction).copied()
    }

    /// Find the instruction corresponding to the given opcode.
    ///
    /// Shadowed opcodes (e.g. `BCS`/`BLO`) decode to whichever mnemonic
    /// was registered last.
    pub fn find_instruction(&self, opcode: u8) -> Option<(Mnemonic, AddressingMode)> {
        self.reverse_map.get(&opcode).copied()
    }

    fn new() -> Self {
        use AddressingMode::*;
        use Mnemonic::*;

        let mut forward_map = HashMap::new();
        let mut reverse_map = HashMap::new();

        let mappings = vec![
            (ABA, Inherent, 0x1B),
            (ABX, Inherent, 0x3A),
            (ADDD, Immediate, 0xC3),
            (ADDD, Extended, 0xF3),
            (ASRD, Inherent, 0x87), // Unused opcode (in 6811)
            (BCS, Relative, 0x25),
            (BEQ, Relative, 0x27),
            (BHI, Relative, 0x22),
            (BKE, ImmediateRelative, 0xCD), // Unused opcode (in 6811)
            (BLO, Relative, 0x25),          // Same opcode as BCS
            (BNE, Relative, 0x26),
            (BRA, Relative, 0x20),
            (CLRS, Inherent, 0x95),   // Shadows BITA
            (CPK, Immediate, 0x85),   // Shadows BITA
            (CPX, Immediate, 0x8C),
            (CPX, Extended, 0xBC),
            (DRCL, Inherent, 0x65),  // Unused opcode (in 6811)
            (DRHLN, Inherent, 0x6B), // Unused opcode (in 6811)
            (DRRCT, Inherent, 0x75), // Unused opcode (in 6811)
            (DRSYM, Immediate, 0xC5), // Shadows BITB
            (DRVLN, Inherent, 0x7B), // Unused opcode (in 6811)
            (INX, Inherent, 0x08),
            (JSR, Extended, 0xBD),
            (LDAA, Immediate, 0x86),
            (LDAA, Extended, 0xB6),
            (LDAB, Immediate, 0xC6),
            (LDAB, Extended, 0xF6),
            (LDB, Immediate, 0x41), // Unused opcodes (in 6811)
            (LDB, Extended, 0x51),
            (LDD, Immediate, 0xCC),
            (LDD, Extended, 0xFC),
            (LDG, Immediate, 0x42), // Unused opcodes (in 6811)
            (LDG, Extended, 0x52),
            (LDR, Immediate, 0x45), // Unused opcodes (in 6811)
            (LDR, Extended, 0x55),
            (LDX, Immediate, 0xCE),
            (LDX, Extended, 0xFE),
            (LDXA, Immediate, 0x4B), // Unused opcodes (in 6811)
            (LDXA, Extended, 0x5B),
            (LDXB, Immediate, 0x4E), // Unused opcodes (in 6811)
            (LDXB, Extended, 0x5E),
            (LDYA, Immediate, 0x61), // Unused opcodes (in 6811)
            (LDYA, Extended, 0x71),
            (LDYB, Immediate, 0x62), // Unused opcodes (in 6811)
            (LDYB, Extended, 0x72),
            (MUL, Inherent, 0x3D),
            (NEGA, Inherent, 0x40),
            (PSHA, Inherent, 0x36),
            (PSHB, Inherent, 0x37),
            (PSHCB, Inherent, 0xA4), // Shadows ANDA
            (PSHCG, Inherent, 0x94), // Shadows ANDA
            (PSHCR, Inherent, 0x84), // Shadows ANDA
            (PSHX, Inherent, 0x3C),
            (PSHXA, Inherent, 0x88), // Shadows EORA
            (PSHXB, Inherent, 0x98), // Shadows EORA
            (PSHYA, Inherent, 0xA8), // Shadows EORA
            (PSHYB, Inherent, 0xB8), // Shadows EORA
            (PULA, Inherent, 0x32),
            (PULB, Inherent, 0x33),
            (PULCB, Inherent, 0xAA), // Shadows ORAA
            (PULCG, Inherent, 0x9A), // Shadows ORAA
            (PULCR, Inherent, 0x8A), // Shadows ORAA
            (PULX, Inherent, 0x38),
            (PULXA, Inherent, 0xC4), // Shadows ANDB
            (PULXB, Inherent, 0xD4), // Shadows ANDB
            (PULYA, Inherent, 0xE4), // Shadows ANDB
            (PULYB, Inherent, 0xF4), // Shadows ANDB
            (RNDA, Immediate, 0x8B), // Shadows ADDA
            (RSTK, Inherent, 0xC7),  // Unused opcode (in 6811)
            (RTS, Inherent, 0x39),
            (STAA, Extended, 0xB7),
            (STAA, Indexed, 0xA7),
            (STAB, Extended, 0xF7),
            (STAB, Indexed, 0xE7),
            (STD, Extended, 0xFD),
            (STX, Extended, 0xFF),
            (SUBA, Immediate, 0x80),
            (SUBA, Extended, 0xB0),
            (SUBD, Immediate, 0x83),
            (SUBD, Extended, 0xB3),
            (TDXA, Inherent, 0xA5), // Shadows BITA
            (TDXB, Inherent, 0xE5), // Shadows BITB
            (TDYA, Inherent, 0xB5), // Shadows BITA
            (TDYB, Inherent, 0xF5), // Shadows BITB
            (XGDX, Inherent, 0x8F),
        ];

        for &(mnemonic, addr_mode, opcode) in &mappings {
            forward_map.insert((mnemonic, addr_mode), opcode);
            reverse_map.insert(opcode, (mnemonic, addr_mode));
        }

        OpcodeMapping {
            forward_map,
            reverse_map,
        }
    }
}

fn glyph_codes() -> HashMap<char, u8> {
    let mut codes: HashMap<char, u8> = ('A'..='Z')
        .chain('0'..='9')
        .zip(8u8..)
        .collect();
    codes.insert('@', 5);
    codes.insert('#', 6);
    codes
}

lazy_static! {
    pub static ref OPCODE_MAPPING: OpcodeMapping = OpcodeMapping::new();

    /// Byte emitted for each printable character the symbol-draw
    /// instruction accepts.
    pub static ref GLYPH_CODES: HashMap<char, u8> = glyph_codes();
}

/// PS/2 set-2 make codes for the sixteen keys `0`-`9`, `A`-`F`, indexed
/// by key id.
pub const KEY_CODES: [u8; 16] = [
    0x45, 0x16, 0x1E, 0x26, 0x25, 0x2E, 0x36, 0x3D, 0x3E, 0x46, 0x1C, 0x32, 0x21, 0x23, 0x24, 0x2B,
];
