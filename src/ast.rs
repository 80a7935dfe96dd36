use std::fmt;

/// Mnemonic of an instruction.
///
/// This represents the operation that is performed by the instruction.
/// The set is a 68HC11 subset extended with drawing and game-clock
/// operations.
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, strum_macros::EnumString, strum_macros::EnumIter)]
pub enum Mnemonic {
    ABA,
    ABX,
    ADDD,
    ASRD,
    BCS,
    BEQ,
    BHI,
    BKE,
    BLO,
    BNE,
    BRA,
    CLRS,
    CPK,
    CPX,
    DRCL,
    DRHLN,
    DRRCT,
    DRSYM,
    DRVLN,
    INX,
    JSR,
    LDAA,
    LDAB,
    LDB,
    LDD,
    LDG,
    LDR,
    LDX,
    LDXA,
    LDXB,
    LDYA,
    LDYB,
    MUL,
    NEGA,
    PSHA,
    PSHB,
    PSHCB,
    PSHCG,
    PSHCR,
    PSHX,
    PSHXA,
    PSHXB,
    PSHYA,
    PSHYB,
    PULA,
    PULB,
    PULCB,
    PULCG,
    PULCR,
    PULX,
    PULXA,
    PULXB,
    PULYA,
    PULYB,
    RNDA,
    RSTK,
    RTS,
    STAA,
    STAB,
    STD,
    STX,
    SUBA,
    SUBD,
    TDXA,
    TDXB,
    TDYA,
    TDYB,
    XGDX,
}

impl Mnemonic {
    /// Instructions without an operand (1 byte).
    pub fn is_inherent(&self) -> bool {
        matches!(
            self,
            Mnemonic::ABA
                | Mnemonic::ABX
                | Mnemonic::ASRD
                | Mnemonic::CLRS
                | Mnemonic::DRCL
                | Mnemonic::DRHLN
                | Mnemonic::DRRCT
                | Mnemonic::DRVLN
                | Mnemonic::INX
                | Mnemonic::MUL
                | Mnemonic::NEGA
                | Mnemonic::PSHA
                | Mnemonic::PSHB
                | Mnemonic::PSHCB
                | Mnemonic::PSHCG
                | Mnemonic::PSHCR
                | Mnemonic::PSHX
                | Mnemonic::PSHXA
                | Mnemonic::PSHXB
                | Mnemonic::PSHYA
                | Mnemonic::PSHYB
                | Mnemonic::PULA
                | Mnemonic::PULB
                | Mnemonic::PULCB
                | Mnemonic::PULCG
                | Mnemonic::PULCR
                | Mnemonic::PULX
                | Mnemonic::PULXA
                | Mnemonic::PULXB
                | Mnemonic::PULYA
                | Mnemonic::PULYB
                | Mnemonic::RSTK
                | Mnemonic::RTS
                | Mnemonic::TDXA
                | Mnemonic::TDXB
                | Mnemonic::TDYA
                | Mnemonic::TDYB
                | Mnemonic::XGDX
        )
    }

    /// Conditional and unconditional branches (relative mode, 2 bytes).
    pub fn is_branch(&self) -> bool {
        matches!(
            self,
            Mnemonic::BCS
                | Mnemonic::BEQ
                | Mnemonic::BHI
                | Mnemonic::BLO
                | Mnemonic::BNE
                | Mnemonic::BRA
        )
    }

    /// The color/game-clock family whose immediate operand is an unsigned
    /// byte rather than a signed value.
    pub fn is_unsigned_immediate(&self) -> bool {
        matches!(
            self,
            Mnemonic::CPK | Mnemonic::LDB | Mnemonic::LDG | Mnemonic::LDR | Mnemonic::RNDA
        )
    }

    /// Instructions that accept a variable reference operand, which the
    /// resolver rewrites to extended mode.
    pub fn takes_variable(&self) -> bool {
        matches!(
            self,
            Mnemonic::ADDD
                | Mnemonic::CPX
                | Mnemonic::LDAA
                | Mnemonic::LDAB
                | Mnemonic::LDB
                | Mnemonic::LDD
                | Mnemonic::LDG
                | Mnemonic::LDR
                | Mnemonic::LDX
                | Mnemonic::LDXA
                | Mnemonic::LDXB
                | Mnemonic::LDYA
                | Mnemonic::LDYB
                | Mnemonic::STAA
                | Mnemonic::STAB
                | Mnemonic::STD
                | Mnemonic::STX
                | Mnemonic::SUBA
                | Mnemonic::SUBD
        )
    }

    /// Instructions that accept an immediate expression operand.
    pub fn takes_immediate(&self) -> bool {
        matches!(
            self,
            Mnemonic::ADDD
                | Mnemonic::CPK
                | Mnemonic::CPX
                | Mnemonic::LDAA
                | Mnemonic::LDAB
                | Mnemonic::LDB
                | Mnemonic::LDD
                | Mnemonic::LDG
                | Mnemonic::LDR
                | Mnemonic::LDX
                | Mnemonic::LDXA
                | Mnemonic::LDXB
                | Mnemonic::LDYA
                | Mnemonic::LDYB
                | Mnemonic::RNDA
                | Mnemonic::SUBA
                | Mnemonic::SUBD
        )
    }

    /// Instructions that accept an indexed `offset,X` operand.
    pub fn takes_indexed(&self) -> bool {
        matches!(self, Mnemonic::STAA | Mnemonic::STAB)
    }

    /// Total size in bytes of the immediate form of this instruction.
    ///
    /// Accumulator and color loads carry a single operand byte; the
    /// double-accumulator and register operations carry two.
    pub fn immediate_size(&self) -> u8 {
        match self {
            Mnemonic::CPK
            | Mnemonic::DRSYM
            | Mnemonic::LDAA
            | Mnemonic::LDAB
            | Mnemonic::LDB
            | Mnemonic::LDG
            | Mnemonic::LDR
            | Mnemonic::RNDA
            | Mnemonic::SUBA => 2,
            _ => 3,
        }
    }

    /// Operand width in bytes implied by the mnemonic, used to warn about
    /// mismatches against a referenced variable's declared size.
    pub fn operand_width(&self) -> u8 {
        match self {
            Mnemonic::LDAA
            | Mnemonic::LDAB
            | Mnemonic::LDB
            | Mnemonic::LDG
            | Mnemonic::LDR
            | Mnemonic::STAA
            | Mnemonic::STAB
            | Mnemonic::SUBA => 1,
            _ => 2,
        }
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Addressing mode of an instruction.
///
/// This fixes the instruction's byte size and how its operand is encoded.
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy)]
pub enum AddressingMode {
    /// No operand, the register set is implied by the opcode
    Inherent,
    /// Literal operand value, 1 or 2 bytes big-endian
    Immediate,
    /// 2-byte big-endian absolute address
    Extended,
    /// Signed single-byte displacement from the following instruction
    Relative,
    /// Signed single-byte offset against the index register X
    Indexed,
    /// Key code byte followed by a relative displacement
    ImmediateRelative,
}

/// A constant arithmetic expression, folded to a value during resolution.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Expr {
    Num(i32),
    /// Reference to a named constant, e.g. `#SCREEN_W`
    ConstRef(String),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// An operand as produced by the parser.
///
/// Symbolic references (`Variable`, `Branch`, `Subroutine`, `KeyBranch`,
/// constant references inside expressions) are replaced with numeric
/// operands by the resolver before any encoding happens.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Operand {
    Inherent,
    Immediate(Expr),
    /// `DRSYM 'A'` — a printable glyph, encoded via the glyph table
    Glyph(char),
    /// Variable reference, rewritten to extended mode during resolution
    Variable(String),
    /// Branch target label
    Branch(String),
    /// `JSR` target label, encoded as an absolute address
    Subroutine(String),
    /// `offset,X`
    Indexed(i32),
    /// `BKE (key) label`
    KeyBranch(u8, String),
}

/// A single instruction with an optional label.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Instruction {
    pub label: Option<String>,
    pub mnemonic: Mnemonic,
    pub operand: Operand,
    /// Size in bytes, fixed by mnemonic and operand shape at construction
    pub size: u8,
    pub line: usize,
}

impl Instruction {
    pub fn new(label: Option<String>, mnemonic: Mnemonic, operand: Operand, line: usize) -> Self {
        let size = match &operand {
            Operand::Inherent => 1,
            Operand::Immediate(_) | Operand::Glyph(_) => mnemonic.immediate_size(),
            Operand::Variable(_) | Operand::Subroutine(_) => 3,
            Operand::Branch(_) | Operand::Indexed(_) => 2,
            Operand::KeyBranch(_, _) => 3,
        };
        Self {
            label,
            mnemonic,
            operand,
            size,
            line,
        }
    }
}

/// A constant declaration, e.g. `SCREEN_W EQU 160`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ConstantDef {
    pub name: String,
    pub expr: Expr,
    pub line: usize,
}

/// A variable declaration, e.g. `COUNT RMB 2`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct VariableDef {
    pub name: String,
    pub size: i32,
    pub line: usize,
}

/// A single element of the source program, i.e. one line.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Element {
    Constant(ConstantDef),
    Variable(VariableDef),
    Instruction(Instruction),
}

impl Element {
    pub fn new_instruction(
        label: Option<String>,
        mnemonic: Mnemonic,
        operand: Operand,
        line: usize,
    ) -> Element {
        Element::Instruction(Instruction::new(label, mnemonic, operand, line))
    }
}
