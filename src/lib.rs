/// Transforms assembly code for an extended 68HC11 clone into a memory
/// initialization image.
///
/// The steps are:
/// 1. **Lexing** - converting a string into tokens
/// 2. **Parsing** - converting tokens into a sequence of declarations and
///    instructions
/// 3. **Registration** - populating the constant, variable and label tables
/// 4. **Resolving** - two passes over the elements
///     - Pass 1: address assignment and reference resolution
///     - Pass 2: range checks and representation normalization
/// 5. **Encoding** - generating annotated memory bytes
/// 6. **Image writing** - serializing the bytes into .mif text
pub mod assembler;

/// Element types shared by the parser and the resolver.
pub mod ast;
