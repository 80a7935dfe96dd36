use super::diagnostics::{DiagnosticKind, Report};
use super::symbols::{SymbolTable, ENTRY_LABEL};
use crate::ast::{AddressingMode, Element, Instruction, Mnemonic, Operand};

/// An operand with every symbolic reference replaced by its numeric
/// value. This is the only operand type the encoder accepts, so
/// resolution-before-encoding is enforced by the type system rather than
/// by convention.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ResolvedOperand {
    Inherent,
    /// Signed immediate value, 1 or 2 operand bytes
    Immediate(i32),
    /// Unsigned immediate byte (color/game-clock family, normalized by
    /// the second pass)
    Unsigned(u8),
    /// Glyph character for the symbol-draw instruction
    Glyph(char),
    /// Absolute address; `label` is kept for subroutine targets so the
    /// encoder can annotate the bytes
    Extended { addr: u32, label: Option<String> },
    /// Branch target; the encoder computes the displacement byte
    Relative { target: u32, label: String },
    /// Signed offset against the index register X
    Indexed(i32),
    /// Key id plus branch target
    KeyRelative { key: u8, target: u32, label: String },
}

impl ResolvedOperand {
    pub fn addressing_mode(&self) -> AddressingMode {
        match self {
            ResolvedOperand::Inherent => AddressingMode::Inherent,
            ResolvedOperand::Immediate(_)
            | ResolvedOperand::Unsigned(_)
            | ResolvedOperand::Glyph(_) => AddressingMode::Immediate,
            ResolvedOperand::Extended { .. } => AddressingMode::Extended,
            ResolvedOperand::Relative { .. } => AddressingMode::Relative,
            ResolvedOperand::Indexed(_) => AddressingMode::Indexed,
            ResolvedOperand::KeyRelative { .. } => AddressingMode::ImmediateRelative,
        }
    }
}

/// An instruction with an assigned address and a resolved operand.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ResolvedInstruction {
    pub label: Option<String>,
    pub mnemonic: Mnemonic,
    pub operand: ResolvedOperand,
    pub addr: u32,
    pub size: u8,
    pub line: usize,
}

/// A variable with its assigned data-segment address.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ResolvedVariable {
    pub name: String,
    pub addr: u32,
    pub size: u32,
}

/// The fully resolved program: the encoder's read-only input.
///
/// Instructions are in code-segment declaration order and variables in
/// variable-declaration order, matching the addresses assigned by the
/// first pass.
#[derive(Debug, PartialEq, Eq, Default)]
pub struct Program {
    pub instructions: Vec<ResolvedInstruction>,
    pub variables: Vec<ResolvedVariable>,
    pub code_size: u32,
    pub data_size: u32,
}

impl Program {
    /// Total occupied memory in bytes, code segment first.
    pub fn mem_size(&self) -> u32 {
        self.code_size + self.data_size
    }
}

/// Run both resolver passes.
///
/// Diagnostics are accumulated, never fail-fast: both passes always run
/// to completion so a single invocation reports as much as possible. The
/// returned program is only meaningful if `report` carries no errors.
#[tracing::instrument(skip_all)]
pub fn resolve(elements: &[Element], symbols: &mut SymbolTable, report: &mut Report) -> Program {
    let mut program = first_pass(elements, symbols, report);
    second_pass(&mut program, report);
    program
}

/// Pass 1: assign addresses to variables and labels, then substitute
/// every symbolic reference with its resolved value. Warns about unused
/// symbols and validates the entry point.
fn first_pass(elements: &[Element], symbols: &mut SymbolTable, report: &mut Report) -> Program {
    assign_addresses(elements, symbols);

    let mut program = Program {
        code_size: symbols.code_size(),
        data_size: symbols.data_size(),
        ..Program::default()
    };
    let mut code_offset = 0;

    for element in elements {
        match element {
            Element::Constant(_) => {}
            Element::Variable(def) => {
                // Duplicates were rejected at registration; only the
                // surviving entry carries an address.
                if let Some(var) = symbols.find_variable(&def.name) {
                    if var.line == def.line {
                        program.variables.push(ResolvedVariable {
                            name: var.name.clone(),
                            addr: var.addr.unwrap_or(0),
                            size: var.size,
                        });
                    }
                }
            }
            Element::Instruction(ins) => {
                let addr = code_offset;
                code_offset += ins.size as u32;
                if let Some(operand) = resolve_operand(ins, symbols, report) {
                    program.instructions.push(ResolvedInstruction {
                        label: ins.label.clone(),
                        mnemonic: ins.mnemonic,
                        operand,
                        addr,
                        size: ins.size,
                        line: ins.line,
                    });
                }
            }
        }
    }

    warn_unused_symbols(symbols, report);
    check_entry_point(symbols, report);

    program
}

/// Walk the program once to give every variable and label its final
/// address. Forward references resolve because this runs before any
/// reference is looked at.
fn assign_addresses(elements: &[Element], symbols: &mut SymbolTable) {
    let mut data_offset = symbols.code_size();
    for var in symbols.variables_mut() {
        var.addr = Some(data_offset);
        data_offset += var.size;
    }

    let mut code_offset = 0;
    for element in elements {
        if let Element::Instruction(ins) = element {
            if let Some(name) = &ins.label {
                if let Some(label) = symbols.find_label_mut(name) {
                    label.addr = Some(code_offset);
                }
            }
            code_offset += ins.size as u32;
        }
    }
}

fn resolve_label(
    name: &str,
    line: usize,
    symbols: &mut SymbolTable,
    report: &mut Report,
) -> Option<u32> {
    match symbols.find_label_mut(name) {
        Some(label) => {
            label.used = true;
            // Assigned by the address pass
            Some(label.addr.unwrap_or(0))
        }
        None => {
            report.add(DiagnosticKind::UndefinedLabel(name.to_string()), Some(line));
            None
        }
    }
}

fn resolve_operand(
    ins: &Instruction,
    symbols: &mut SymbolTable,
    report: &mut Report,
) -> Option<ResolvedOperand> {
    match &ins.operand {
        Operand::Inherent => Some(ResolvedOperand::Inherent),
        Operand::Immediate(expr) => symbols
            .eval_expr(expr, ins.line, report)
            .map(ResolvedOperand::Immediate),
        Operand::Glyph(c) => Some(ResolvedOperand::Glyph(*c)),
        Operand::Variable(name) => {
            let (addr, size) = match symbols.find_variable_mut(name) {
                Some(var) => {
                    var.used = true;
                    (var.addr.unwrap_or(0), var.size)
                }
                None => {
                    report.add(
                        DiagnosticKind::UndefinedVariable(name.clone()),
                        Some(ins.line),
                    );
                    return None;
                }
            };
            let expected = ins.mnemonic.operand_width();
            if expected as u32 != size {
                report.add(
                    DiagnosticKind::SizeMismatch {
                        mnemonic: ins.mnemonic,
                        expected,
                        name: name.clone(),
                        actual: size,
                    },
                    Some(ins.line),
                );
            }
            // The variable reference becomes an extended-mode absolute
            // address
            Some(ResolvedOperand::Extended { addr, label: None })
        }
        Operand::Branch(name) => {
            let target = resolve_label(name, ins.line, symbols, report)?;
            Some(ResolvedOperand::Relative {
                target,
                label: name.clone(),
            })
        }
        Operand::Subroutine(name) => {
            let addr = resolve_label(name, ins.line, symbols, report)?;
            Some(ResolvedOperand::Extended {
                addr,
                label: Some(name.clone()),
            })
        }
        Operand::Indexed(offset) => Some(ResolvedOperand::Indexed(*offset)),
        Operand::KeyBranch(key, name) => {
            let target = resolve_label(name, ins.line, symbols, report)?;
            Some(ResolvedOperand::KeyRelative {
                key: *key,
                target,
                label: name.clone(),
            })
        }
    }
}

fn warn_unused_symbols(symbols: &SymbolTable, report: &mut Report) {
    for constant in symbols.constants().iter().filter(|c| !c.used) {
        report.add(
            DiagnosticKind::UnusedConstant(constant.name.clone()),
            Some(constant.line),
        );
    }
    for var in symbols.variables().iter().filter(|v| !v.used) {
        report.add(
            DiagnosticKind::UnusedVariable(var.name.clone()),
            Some(var.line),
        );
    }
    for label in symbols.labels().iter().filter(|l| !l.used) {
        report.add(
            DiagnosticKind::UnusedLabel(label.name.clone()),
            Some(label.line),
        );
    }
}

fn check_entry_point(symbols: &SymbolTable, report: &mut Report) {
    match symbols.find_label(ENTRY_LABEL) {
        None => report.add(DiagnosticKind::MissingEntryPoint, None),
        Some(label) => {
            if label.addr != Some(0) {
                report.add(DiagnosticKind::EntryPointNotFirst, Some(label.line));
            }
        }
    }
}

/// Pass 2: range checks and representation normalization.
///
/// The color/game-clock family takes an unsigned byte; ordinary
/// immediates must fit the signed width implied by the instruction size;
/// indexed offsets must fit a signed byte. The symbol-draw glyph is a
/// character code and is not range checked.
fn second_pass(program: &mut Program, report: &mut Report) {
    for ins in &mut program.instructions {
        match ins.operand {
            ResolvedOperand::Immediate(value) if ins.mnemonic.is_unsigned_immediate() => {
                if !(0..=255).contains(&value) {
                    report.add(
                        DiagnosticKind::ValueOutOfRange(value, ins.mnemonic),
                        Some(ins.line),
                    );
                } else {
                    ins.operand = ResolvedOperand::Unsigned(value as u8);
                }
            }
            ResolvedOperand::Immediate(value) => {
                let in_range = match ins.size {
                    2 => (-128..=127).contains(&value),
                    _ => (-32768..=32767).contains(&value),
                };
                if !in_range {
                    report.add(
                        DiagnosticKind::ValueOutOfRange(value, ins.mnemonic),
                        Some(ins.line),
                    );
                }
            }
            ResolvedOperand::Indexed(offset) => {
                if !(-128..=127).contains(&offset) {
                    report.add(
                        DiagnosticKind::ValueOutOfRange(offset, ins.mnemonic),
                        Some(ins.line),
                    );
                }
            }
            _ => {}
        }
    }
}
