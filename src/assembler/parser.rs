use std::str::FromStr;

use crate::{
    assembler::diagnostics::{DiagnosticKind, Report},
    assembler::lexer::{Token, TokenType},
    ast::{BinaryOp, ConstantDef, Element, Expr, Mnemonic, Operand, VariableDef},
};

/// A syntax error local to one source line. The parser reports it and
/// resumes at the next line, so one bad line does not hide the rest.
#[derive(Debug, PartialEq, Eq)]
struct SyntaxError {
    near: String,
    line: usize,
}

type ParseResult<T> = Result<T, SyntaxError>;

pub struct Parser<'a> {
    tokens: &'a [Token],
    position: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    fn current_token(&self) -> &Token {
        // The token stream always ends with Eof
        self.tokens
            .get(self.position)
            .unwrap_or_else(|| self.tokens.last().expect("non-empty token stream"))
    }

    fn next_token(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn current_token_is(&self, token_type: TokenType) -> bool {
        self.current_token().token == token_type
    }

    fn syntax_error(&self) -> SyntaxError {
        let token = self.current_token();
        let near = match token.token {
            TokenType::Newline => "NEWLINE".to_string(),
            TokenType::Eof => "<eof>".to_string(),
            _ => token.literal.clone(),
        };
        SyntaxError {
            near,
            line: token.line,
        }
    }

    /// Skip to the first token of the next line.
    fn recover_to_next_line(&mut self) {
        while !self.current_token_is(TokenType::Newline) && !self.current_token_is(TokenType::Eof) {
            self.next_token();
        }
        if self.current_token_is(TokenType::Newline) {
            self.next_token();
        }
    }

    fn expect(&mut self, token_type: TokenType) -> ParseResult<Token> {
        if self.current_token().token == token_type {
            let token = self.current_token().clone();
            self.next_token();
            Ok(token)
        } else {
            Err(self.syntax_error())
        }
    }

    fn parse_decimal(&mut self) -> ParseResult<i32> {
        let token = self.expect(TokenType::Number)?;
        token.literal.parse::<i32>().map_err(|_| SyntaxError {
            near: token.literal,
            line: token.line,
        })
    }

    /// Hex literals are two's-complement signed in their nibble width,
    /// so `$FF` is -1 while `$0FF` is 255.
    fn parse_hex(&mut self) -> ParseResult<i32> {
        let token = self.expect(TokenType::Hex)?;
        let nibbles = token.literal.len();
        if nibbles == 0 || nibbles > 8 {
            return Err(SyntaxError {
                near: token.literal,
                line: token.line,
            });
        }
        let raw = u32::from_str_radix(&token.literal, 16).map_err(|_| SyntaxError {
            near: token.literal.clone(),
            line: token.line,
        })?;
        let bits = nibbles as u32 * 4;
        if bits == 32 {
            return Ok(raw as i32);
        }
        let sign_bit = 1u32 << (bits - 1);
        if raw & sign_bit != 0 {
            Ok(raw as i64 as i32 - (1i64 << bits) as i32)
        } else {
            Ok(raw as i32)
        }
    }

    /// A numeric literal in either radix, e.g. for `RMB` sizes and
    /// indexed offsets.
    fn parse_literal(&mut self) -> ParseResult<i32> {
        match self.current_token().token {
            TokenType::Number => self.parse_decimal(),
            TokenType::Hex => self.parse_hex(),
            _ => Err(self.syntax_error()),
        }
    }

    // Expressions, with `*`/`/` binding tighter than `+`/`-`.

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.current_token().token {
                TokenType::Plus => BinaryOp::Add,
                TokenType::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.next_token();
            let right = self.parse_term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_term(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.current_token().token {
                TokenType::Star => BinaryOp::Mul,
                TokenType::Slash => BinaryOp::Div,
                _ => return Ok(left),
            };
            self.next_token();
            let right = self.parse_factor()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_factor(&mut self) -> ParseResult<Expr> {
        match self.current_token().token {
            TokenType::Number => Ok(Expr::Num(self.parse_decimal()?)),
            TokenType::Hex => Ok(Expr::Num(self.parse_hex()?)),
            TokenType::ConstRef => {
                let name = self.current_token().literal.clone();
                self.next_token();
                Ok(Expr::ConstRef(name))
            }
            TokenType::ParenLeft => {
                self.next_token();
                let expr = self.parse_expr()?;
                self.expect(TokenType::ParenRight)?;
                Ok(expr)
            }
            _ => Err(self.syntax_error()),
        }
    }

    // Instructions

    fn parse_operand(&mut self, mnemonic: Mnemonic) -> ParseResult<Operand> {
        if mnemonic.is_inherent() {
            return Ok(Operand::Inherent);
        }
        if mnemonic.is_branch() {
            let target = self.expect(TokenType::Identifier)?;
            return Ok(Operand::Branch(target.literal));
        }
        match mnemonic {
            Mnemonic::JSR => {
                let target = self.expect(TokenType::Identifier)?;
                Ok(Operand::Subroutine(target.literal))
            }
            Mnemonic::DRSYM => {
                let glyph = self.expect(TokenType::Char)?;
                let c = glyph.literal.chars().next().ok_or(SyntaxError {
                    near: glyph.literal.clone(),
                    line: glyph.line,
                })?;
                Ok(Operand::Glyph(c))
            }
            Mnemonic::BKE => {
                self.expect(TokenType::ParenLeft)?;
                let key_token = self.current_token().clone();
                let key = self.parse_decimal()?;
                if !(0..=15).contains(&key) {
                    return Err(SyntaxError {
                        near: key_token.literal,
                        line: key_token.line,
                    });
                }
                self.expect(TokenType::ParenRight)?;
                let target = self.expect(TokenType::Identifier)?;
                Ok(Operand::KeyBranch(key as u8, target.literal))
            }
            _ => self.parse_value_operand(mnemonic),
        }
    }

    /// Loads, stores and arithmetic: a variable reference, an indexed
    /// `offset,X` pair, or an immediate expression.
    fn parse_value_operand(&mut self, mnemonic: Mnemonic) -> ParseResult<Operand> {
        if mnemonic.takes_variable() && self.current_token_is(TokenType::Identifier) {
            let name = self.current_token().literal.clone();
            self.next_token();
            return Ok(Operand::Variable(name));
        }
        if mnemonic.takes_indexed() {
            let offset = self.parse_literal()?;
            self.expect(TokenType::Comma)?;
            let register = self.expect(TokenType::Identifier)?;
            if register.literal != "X" {
                return Err(SyntaxError {
                    near: register.literal,
                    line: register.line,
                });
            }
            return Ok(Operand::Indexed(offset));
        }
        if mnemonic.takes_immediate() {
            return Ok(Operand::Immediate(self.parse_expr()?));
        }
        Err(self.syntax_error())
    }

    fn parse_instruction(&mut self, label: Option<String>) -> ParseResult<Element> {
        let token = self.expect(TokenType::Identifier)?;
        let mnemonic = Mnemonic::from_str(&token.literal).map_err(|_| SyntaxError {
            near: token.literal.clone(),
            line: token.line,
        })?;
        let operand = self.parse_operand(mnemonic)?;
        Ok(Element::new_instruction(label, mnemonic, operand, token.line))
    }

    fn current_token_is_keyword(&self, keyword: &str) -> bool {
        self.current_token_is(TokenType::Identifier) && self.current_token().literal == keyword
    }

    /// One line: a constant declaration, a variable declaration, or an
    /// instruction with an optional leading label.
    fn parse_element(&mut self) -> ParseResult<Element> {
        let first = self.expect(TokenType::Identifier)?;

        if Mnemonic::from_str(&first.literal).is_ok() {
            self.position -= 1;
            return self.parse_instruction(None);
        }

        if self.current_token_is_keyword("EQU") {
            self.next_token();
            let expr = self.parse_expr()?;
            return Ok(Element::Constant(ConstantDef {
                name: first.literal,
                expr,
                line: first.line,
            }));
        }
        if self.current_token_is_keyword("RMB") {
            self.next_token();
            let size = self.parse_literal()?;
            return Ok(Element::Variable(VariableDef {
                name: first.literal,
                size,
                line: first.line,
            }));
        }
        self.parse_instruction(Some(first.literal))
    }

    fn parse_program(&mut self, report: &mut Report) -> Vec<Element> {
        let mut elements = Vec::new();
        loop {
            while self.current_token_is(TokenType::Newline) {
                self.next_token();
            }
            if self.current_token_is(TokenType::Eof) {
                return elements;
            }
            match self.parse_element() {
                Ok(element) => {
                    if !self.current_token_is(TokenType::Newline)
                        && !self.current_token_is(TokenType::Eof)
                    {
                        let err = self.syntax_error();
                        report.add(DiagnosticKind::Syntax(err.near), Some(err.line));
                        self.recover_to_next_line();
                    } else {
                        elements.push(element);
                    }
                }
                Err(err) => {
                    report.add(DiagnosticKind::Syntax(err.near), Some(err.line));
                    self.recover_to_next_line();
                }
            }
        }
    }
}

/// Parse a token stream into the element sequence. Syntax errors are
/// accumulated into `report`; affected lines are dropped.
#[tracing::instrument(skip_all)]
pub fn parse_program(tokens: &[Token], report: &mut Report) -> Vec<Element> {
    Parser::new(tokens).parse_program(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::lexer::tokenize;
    use crate::ast::{ConstantDef, Instruction, VariableDef};

    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> Vec<Element> {
        let mut report = Report::new();
        let tokens = tokenize(input, &mut report);
        let elements = parse_program(&tokens, &mut report);
        assert!(
            !report.has_errors(),
            "unexpected errors: {:?}",
            report.diagnostics()
        );
        elements
    }

    #[test]
    fn test_parse_declarations() {
        let elements = parse("SCREEN_W EQU 160\nSQUARE RMB 2\n");
        assert_eq!(
            elements,
            vec![
                Element::Constant(ConstantDef {
                    name: "SCREEN_W".to_string(),
                    expr: Expr::Num(160),
                    line: 1,
                }),
                Element::Variable(VariableDef {
                    name: "SQUARE".to_string(),
                    size: 2,
                    line: 2,
                }),
            ]
        );
    }

    #[test]
    fn test_parse_expression_precedence() {
        let elements = parse("N EQU 2 + 3 * 4\n");
        assert_eq!(
            elements,
            vec![Element::Constant(ConstantDef {
                name: "N".to_string(),
                expr: Expr::Binary(
                    BinaryOp::Add,
                    Box::new(Expr::Num(2)),
                    Box::new(Expr::Binary(
                        BinaryOp::Mul,
                        Box::new(Expr::Num(3)),
                        Box::new(Expr::Num(4)),
                    )),
                ),
                line: 1,
            })]
        );
    }

    #[test]
    fn test_parse_parenthesized_expression() {
        let elements = parse("N EQU (2 + 3) * #FOUR\n");
        assert_eq!(
            elements,
            vec![Element::Constant(ConstantDef {
                name: "N".to_string(),
                expr: Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Binary(
                        BinaryOp::Add,
                        Box::new(Expr::Num(2)),
                        Box::new(Expr::Num(3)),
                    )),
                    Box::new(Expr::ConstRef("FOUR".to_string())),
                ),
                line: 1,
            })]
        );
    }

    #[test]
    fn test_parse_signed_hex() {
        let elements = parse("A EQU $FF\nB EQU $0FF\n");
        assert_eq!(
            elements,
            vec![
                Element::Constant(ConstantDef {
                    name: "A".to_string(),
                    expr: Expr::Num(-1),
                    line: 1,
                }),
                Element::Constant(ConstantDef {
                    name: "B".to_string(),
                    expr: Expr::Num(255),
                    line: 2,
                }),
            ]
        );
    }

    #[test]
    fn test_parse_instruction_shapes() {
        let elements = parse(
            "RTS\n\
             LDAA 5\n\
             LDAA COUNT\n\
             BNE LOOP\n\
             JSR DRAW\n\
             DRSYM '7'\n\
             STAA 5,X\n\
             BKE (3) LOOP\n",
        );
        let operands: Vec<Operand> = elements
            .into_iter()
            .map(|e| match e {
                Element::Instruction(Instruction { operand, .. }) => operand,
                other => panic!("expected instruction, got {:?}", other),
            })
            .collect();
        assert_eq!(
            operands,
            vec![
                Operand::Inherent,
                Operand::Immediate(Expr::Num(5)),
                Operand::Variable("COUNT".to_string()),
                Operand::Branch("LOOP".to_string()),
                Operand::Subroutine("DRAW".to_string()),
                Operand::Glyph('7'),
                Operand::Indexed(5),
                Operand::KeyBranch(3, "LOOP".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_labeled_instruction() {
        let elements = parse(".main LDX 0\nLOOP INX\n");
        assert_eq!(
            elements,
            vec![
                Element::new_instruction(
                    Some(".main".to_string()),
                    Mnemonic::LDX,
                    Operand::Immediate(Expr::Num(0)),
                    1,
                ),
                Element::new_instruction(
                    Some("LOOP".to_string()),
                    Mnemonic::INX,
                    Operand::Inherent,
                    2,
                ),
            ]
        );
    }

    #[test]
    fn test_recovery_keeps_later_lines() {
        let mut report = Report::new();
        let tokens = tokenize("LDAA ,\nINX\n", &mut report);
        let elements = parse_program(&tokens, &mut report);

        assert_eq!(report.error_count(), 1);
        assert_eq!(
            report.diagnostics()[0].kind,
            DiagnosticKind::Syntax(",".to_string())
        );
        assert_eq!(
            elements,
            vec![Element::new_instruction(
                None,
                Mnemonic::INX,
                Operand::Inherent,
                2
            )]
        );
    }

    #[test]
    fn test_key_id_out_of_range() {
        let mut report = Report::new();
        let tokens = tokenize("BKE (16) LOOP\n", &mut report);
        parse_program(&tokens, &mut report);
        assert_eq!(report.error_count(), 1);
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let mut report = Report::new();
        let tokens = tokenize("RTS 5\n", &mut report);
        let elements = parse_program(&tokens, &mut report);
        assert_eq!(report.error_count(), 1);
        assert!(elements.is_empty());
    }
}
