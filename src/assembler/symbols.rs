use super::diagnostics::{DiagnosticKind, Report};
use crate::ast::{BinaryOp, Element, Expr, Instruction, VariableDef};

/// The reserved entry label. It must exist and resolve to address 0.
pub const ENTRY_LABEL: &str = ".main";

/// A named constant, folded to its value at declaration time.
#[derive(Debug, PartialEq, Eq)]
pub struct Constant {
    pub name: String,
    pub value: i32,
    pub used: bool,
    pub line: usize,
}

/// A variable reserving `size` bytes in the data segment. The address is
/// assigned by the resolver's first pass.
#[derive(Debug, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub size: u32,
    pub addr: Option<u32>,
    pub used: bool,
    pub line: usize,
}

/// A label naming an instruction in the code segment.
#[derive(Debug, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub addr: Option<u32>,
    pub used: bool,
    pub line: usize,
}

/// Owns the three symbol tables and the running segment sizes.
///
/// Tables are vectors in declaration order, which keeps every diagnostic
/// deterministic. Programs for this target are tiny, so linear lookup is
/// fine.
#[derive(Debug, Default)]
pub struct SymbolTable {
    constants: Vec<Constant>,
    variables: Vec<Variable>,
    labels: Vec<Label>,
    code_size: u32,
    data_size: u32,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    /// Size of the code segment, which occupies `[0, code_size)`.
    pub fn code_size(&self) -> u32 {
        self.code_size
    }

    /// Size of the data segment, which follows the code segment.
    pub fn data_size(&self) -> u32 {
        self.data_size
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut [Variable] {
        &mut self.variables
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn find_variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn find_variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.iter_mut().find(|v| v.name == name)
    }

    pub fn find_label(&self, name: &str) -> Option<&Label> {
        self.labels.iter().find(|l| l.name == name)
    }

    pub fn find_label_mut(&mut self, name: &str) -> Option<&mut Label> {
        self.labels.iter_mut().find(|l| l.name == name)
    }

    /// Register a constant. Redefinition is allowed and overrides the old
    /// value with a warning.
    pub fn register_constant(&mut self, name: &str, value: i32, line: usize, report: &mut Report) {
        if let Some(existing) = self.constants.iter_mut().find(|c| c.name == name) {
            report.add(
                DiagnosticKind::RedefinedConstant(name.to_string()),
                Some(line),
            );
            existing.value = value;
            existing.line = line;
            return;
        }
        self.constants.push(Constant {
            name: name.to_string(),
            value,
            used: false,
            line,
        });
    }

    /// Register a variable and grow the data segment by its size.
    pub fn register_variable(&mut self, def: &VariableDef, report: &mut Report) {
        if self.find_variable(&def.name).is_some() {
            report.add(
                DiagnosticKind::DuplicateName(def.name.clone()),
                Some(def.line),
            );
            return;
        }
        if def.size <= 0 {
            report.add(
                DiagnosticKind::InvalidSize(def.name.clone()),
                Some(def.line),
            );
            return;
        }
        self.data_size += def.size as u32;
        self.variables.push(Variable {
            name: def.name.clone(),
            size: def.size as u32,
            addr: None,
            used: false,
            line: def.line,
        });
    }

    /// Register an instruction: its optional label, and its size into the
    /// code segment regardless of labeling.
    pub fn register_label(&mut self, ins: &Instruction, report: &mut Report) {
        if let Some(name) = &ins.label {
            if self.find_label(name).is_some() {
                report.add(DiagnosticKind::DuplicateLabel(name.clone()), Some(ins.line));
            } else {
                self.labels.push(Label {
                    name: name.clone(),
                    addr: None,
                    // The entry label is referenced by the hardware reset,
                    // not by other instructions
                    used: name == ENTRY_LABEL,
                    line: ins.line,
                });
            }
        }
        self.code_size += ins.size as u32;
    }

    /// Fold a constant expression to its value, marking every referenced
    /// constant as used. Returns `None` after reporting when a reference
    /// is undefined or the arithmetic misbehaves; both subtrees are still
    /// walked so one bad expression surfaces all of its problems.
    ///
    /// Division truncates toward zero.
    pub fn eval_expr(&mut self, expr: &Expr, line: usize, report: &mut Report) -> Option<i32> {
        match expr {
            Expr::Num(value) => Some(*value),
            Expr::ConstRef(name) => {
                match self.constants.iter_mut().find(|c| c.name == *name) {
                    Some(constant) => {
                        constant.used = true;
                        Some(constant.value)
                    }
                    None => {
                        report.add(DiagnosticKind::UndefinedConstant(name.clone()), Some(line));
                        None
                    }
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval_expr(lhs, line, report);
                let rhs = self.eval_expr(rhs, line, report);
                let (lhs, rhs) = (lhs?, rhs?);
                let result = match op {
                    BinaryOp::Add => lhs.checked_add(rhs),
                    BinaryOp::Sub => lhs.checked_sub(rhs),
                    BinaryOp::Mul => lhs.checked_mul(rhs),
                    BinaryOp::Div => {
                        if rhs == 0 {
                            report.add(DiagnosticKind::DivisionByZero, Some(line));
                            return None;
                        }
                        lhs.checked_div(rhs)
                    }
                };
                if result.is_none() {
                    report.add(DiagnosticKind::ExpressionOverflow, Some(line));
                }
                result
            }
        }
    }
}

/// Populate the symbol tables from the element sequence.
#[tracing::instrument(skip_all)]
pub fn register_elements(elements: &[Element], report: &mut Report) -> SymbolTable {
    let mut table = SymbolTable::new();
    for element in elements {
        match element {
            Element::Constant(def) => {
                if let Some(value) = table.eval_expr(&def.expr, def.line, report) {
                    table.register_constant(&def.name, value, def.line, report);
                }
            }
            Element::Variable(def) => table.register_variable(def, report),
            Element::Instruction(ins) => table.register_label(ins, report),
        }
    }
    tracing::debug!(
        code_size = table.code_size,
        data_size = table.data_size,
        "segments sized"
    );
    if table.code_size + table.data_size > 0x10000 {
        report.add(DiagnosticKind::ProgramOverflow, None);
    }
    table
}
