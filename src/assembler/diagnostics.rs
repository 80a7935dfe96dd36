use std::fmt;

use crate::ast::Mnemonic;

/// Everything the pipeline can complain about.
///
/// Errors block compilation once both resolver passes have finished;
/// warnings never do.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiagnosticKind {
    // Front end
    #[error("Illegal character '{0}'")]
    IllegalCharacter(char),
    #[error("Syntax error near '{0}'")]
    Syntax(String),

    // Registration
    #[error("Duplicate name definition {0}")]
    DuplicateName(String),
    #[error("Duplicate label definition {0}")]
    DuplicateLabel(String),
    #[error("Error in variable declaration {0}: the number of bytes must be greater than zero")]
    InvalidSize(String),
    #[error("Program does not fit in a 64K memory")]
    ProgramOverflow,

    // Resolution
    #[error("Undefined label {0}")]
    UndefinedLabel(String),
    #[error("Undefined variable {0}")]
    UndefinedVariable(String),
    #[error("Undefined constant {0}")]
    UndefinedConstant(String),
    #[error("Division by zero in constant expression")]
    DivisionByZero,
    #[error("Overflow in constant expression")]
    ExpressionOverflow,
    #[error("Main entry point not defined")]
    MissingEntryPoint,
    #[error("Main label should be the first instruction")]
    EntryPointNotFirst,
    #[error("Value out of range {0} (instruction {1})")]
    ValueOutOfRange(i32, Mnemonic),

    // Warnings
    #[error("Overriding already defined constant {0}")]
    RedefinedConstant(String),
    #[error("Unused constant {0}")]
    UnusedConstant(String),
    #[error("Unused variable {0}")]
    UnusedVariable(String),
    #[error("Unused label {0}")]
    UnusedLabel(String),
    #[error("Size mismatch. Instruction {mnemonic} expects {expected} byte(s), variable {name} has {actual} byte(s)")]
    SizeMismatch {
        mnemonic: Mnemonic,
        expected: u8,
        name: String,
        actual: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::RedefinedConstant(_)
            | DiagnosticKind::UnusedConstant(_)
            | DiagnosticKind::UnusedVariable(_)
            | DiagnosticKind::UnusedLabel(_)
            | DiagnosticKind::SizeMismatch { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// A single diagnostic, tagged with the source line it originated from
/// when one is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub line: Option<usize>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.kind.severity() {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
        };
        match self.line {
            Some(line) => write!(f, "{}: {} (at line: {})", tag, self.kind, line),
            None => write!(f, "{}: {}", tag, self.kind),
        }
    }
}

/// Accumulates diagnostics across the whole pipeline.
///
/// Stages report into this and keep going, so a single run surfaces as
/// many problems as possible. Only the final error count decides whether
/// the compilation fails.
#[derive(Debug, Default)]
pub struct Report {
    diagnostics: Vec<Diagnostic>,
}

impl Report {
    pub fn new() -> Report {
        Report::default()
    }

    pub fn add(&mut self, kind: DiagnosticKind, line: Option<usize>) {
        self.diagnostics.push(Diagnostic { kind, line });
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.kind.severity() == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics.len() - self.error_count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Summary line in the style of the reference toolchain, or `None`
    /// when the run was clean.
    pub fn summary(&self) -> Option<String> {
        match self.error_count() {
            0 => None,
            1 => Some("There is 1 error.".to_string()),
            n => Some(format!("There are {} errors.", n)),
        }
    }
}
