use std::path::PathBuf;

use anyhow::Context;

use self::diagnostics::Report;

/// Lexes code into tokens.
///
/// Converts a string into tokens. For example, the line `LDAA #SPEED`
/// would be converted into the following tokens:
///
/// ```text
/// [
///     Token { token: TokenType::Identifier, literal: "LDAA", line: 1 },
///     Token { token: TokenType::ConstRef, literal: "SPEED", line: 1 },
///     Token { token: TokenType::Eof, literal: "", line: 1 },
/// ]
/// ```
pub mod lexer;

/// Parses tokens into the element sequence.
pub mod parser;

/// Accumulates errors and warnings across all stages.
pub mod diagnostics;

/// Owns the constant, variable and label tables and the segment sizes.
pub mod symbols;

/// Two-pass semantic analysis: address assignment, reference resolution
/// and range checking.
pub mod resolver;

/// Encodes the resolved program into annotated memory bytes.
pub mod codegen;

/// Serializes memory bytes into .mif text.
pub mod mif;

#[derive(Debug, thiserror::Error)]
pub enum AssemblerError {
    #[error("aborting due to {0} previous error(s)")]
    ErrorsReported(usize),
    #[error("Code generation error: {0}")]
    CodeGen(#[from] codegen::CodeGenError),
}

/// Run the full pipeline on a source string and produce the output image.
///
/// Diagnostics from every stage accumulate in `report`; the pipeline only
/// gives up once both resolver passes have finished, so one run reports
/// as much as possible.
#[tracing::instrument(skip_all)]
pub fn compile_source(
    input: &str,
    depth: Option<u32>,
    report: &mut Report,
) -> Result<String, AssemblerError> {
    let tokens = lexer::tokenize(input, report);
    let elements = parser::parse_program(&tokens, report);
    let mut symbols = symbols::register_elements(&elements, report);
    let program = resolver::resolve(&elements, &mut symbols, report);

    if report.has_errors() {
        return Err(AssemblerError::ErrorsReported(report.error_count()));
    }

    let cells = codegen::encode(&program)?;
    Ok(mif::write_image(&cells, program.mem_size(), depth))
}

#[derive(clap::Args, Debug)]
pub struct AssemblyArgs {
    #[clap(help = "The source file")]
    file: PathBuf,
    #[clap(short, long)]
    #[clap(help = "The output file, defaults to the source file with a .mif extension")]
    output_file: Option<PathBuf>,
    #[clap(short, long)]
    #[clap(help = "The number of words in the memory")]
    words: Option<u32>,
}

/// Assemble a source file into a .mif file, reporting diagnostics on
/// stderr.
#[tracing::instrument]
pub fn assemble(args: &AssemblyArgs) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Unable to read '{}'", args.file.display()))?;

    let mut report = Report::new();
    let result = compile_source(&source, args.words, &mut report);
    for diagnostic in report.diagnostics() {
        eprintln!("{}", diagnostic);
    }

    match result {
        Ok(image) => {
            let output_file = args
                .output_file
                .clone()
                .unwrap_or_else(|| args.file.with_extension("mif"));
            std::fs::write(&output_file, image)
                .with_context(|| format!("Unable to write '{}'", output_file.display()))?;
            Ok(())
        }
        Err(err) => {
            if let Some(summary) = report.summary() {
                eprintln!("{}", summary);
            }
            Err(err.into())
        }
    }
}
