//! Recursive-descent formula parser.
//!
//! The entry point is [`Parser::parse`], which tokenizes the input and parses
//! exactly one expression spanning the whole formula.
//!
//! Faults do not abort the parse. Each one is reported to the
//! [`ErrorListener`] and the parser recovers (assuming a missing token is
//! present, or skipping a stray one) so that later faults are reported too.
//! When anything was reported, no tree is returned.

use crate::error::ErrorListener;
use crate::formula::ast::*;
use crate::formula::lexer::{Lexer, Token, TokenKind};

/// Nesting limit used by [`Parser::parse`].
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// A recursive-descent parser over a token stream.
pub struct Parser<'l> {
    tokens: Vec<Token>,
    pos: usize,
    listener: &'l mut ErrorListener,
    depth: usize,
    max_depth: usize,
    /// Set once the nesting limit trips; suppresses follow-on reports.
    halted: bool,
}

impl<'l> Parser<'l> {
    /// Lex and parse `formula` with the default nesting limit.
    pub fn parse(formula: &str, listener: &'l mut ErrorListener) -> Option<Expr> {
        Self::parse_with_max_depth(formula, DEFAULT_MAX_DEPTH, listener)
    }

    /// Lex and parse `formula`, allowing at most `max_depth` levels of
    /// parentheses, `IF` and aggregate calls.
    pub fn parse_with_max_depth(
        formula: &str,
        max_depth: usize,
        listener: &'l mut ErrorListener,
    ) -> Option<Expr> {
        let tokens = Lexer::new(formula).tokenize(listener);
        Parser::new(tokens, max_depth, listener).parse_formula()
    }

    /// Parse a token stream, normally the output of the lexer. An
    /// [`TokenKind::Eof`] is appended if `tokens` does not end with one.
    pub fn new(mut tokens: Vec<Token>, max_depth: usize, listener: &'l mut ErrorListener) -> Self {
        if !matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof) {
            let (line, column) = tokens.last().map_or((1, 0), |t| {
                (t.line, t.column + t.lexeme.chars().count() as u32)
            });
            tokens.push(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                line,
                column,
            });
        }
        Parser {
            tokens,
            pos: 0,
            listener,
            depth: 0,
            max_depth,
            halted: false,
        }
    }

    /// `formula := expr EOF`
    pub fn parse_formula(&mut self) -> Option<Expr> {
        let expr = self.parse_expr();
        if self.current().kind != TokenKind::Eof {
            let tok = self.current().clone();
            self.error_at(&tok, format!("extraneous input '{}' expecting <EOF>", tok.describe()));
        }
        if self.listener.has_errors() {
            return None;
        }
        expr
    }

    // =======================================================================
    // Token helpers
    // =======================================================================

    fn current(&self) -> &Token {
        // `new` guarantees a trailing Eof, and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_ahead(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    /// Consume `expected`, or report it missing and carry on as if present.
    fn expect(&mut self, expected: TokenKind, text: &str) {
        if self.current().kind == expected {
            self.advance();
        } else {
            let tok = self.current().clone();
            self.error_at(&tok, format!("missing '{text}' at '{}'", tok.describe()));
        }
    }

    fn error_at(&mut self, tok: &Token, msg: String) {
        if !self.halted {
            self.listener.report(tok.line, tok.column, msg);
        }
    }

    // =======================================================================
    // Expressions
    // =======================================================================
    //
    // Precedence (lowest to highest):
    //   1. Comparison (=, !=, <>, <, >, <=, >=), at most one, non-associative
    //   2. Addition (+, -)
    //   3. Multiplication (*, /, %)
    //   4. Primary (literals, columns, parens, IF, aggregate calls)

    fn parse_expr(&mut self) -> Option<Expr> {
        self.parse_comparison_expr()
    }

    fn parse_comparison_expr(&mut self) -> Option<Expr> {
        let left = self.parse_add_expr();
        let Some(op) = comparison_op(&self.current().kind) else {
            return left;
        };
        self.advance();
        let right = self.parse_add_expr();

        // Chaining is not part of the grammar; report it and consume the
        // rest of the chain so it does not surface as a second fault.
        while comparison_op(&self.current().kind).is_some() {
            let tok = self.advance();
            self.error_at(&tok, "comparison operators cannot be chained".to_string());
            self.parse_add_expr();
        }

        Some(Expr::Comparison {
            left: Box::new(left?),
            op,
            right: Box::new(right?),
        })
    }

    fn parse_add_expr(&mut self) -> Option<Expr> {
        let mut left = self.parse_mul_expr();
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_mul_expr();
            left = binary(left, op, right);
        }
        left
    }

    fn parse_mul_expr(&mut self) -> Option<Expr> {
        let mut left = self.parse_primary_expr();
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_primary_expr();
            left = binary(left, op, right);
        }
        left
    }

    fn parse_primary_expr(&mut self) -> Option<Expr> {
        let tok = self.current().clone();
        match &tok.kind {
            TokenKind::Number => {
                self.advance();
                Some(Expr::Number(tok.lexeme))
            }
            TokenKind::String(value) => {
                self.advance();
                Some(Expr::String(value.clone()))
            }
            TokenKind::Identifier => {
                self.advance();
                if self.current().kind == TokenKind::LeftParen {
                    self.error_at(&tok, format!("unknown function '{}'", tok.lexeme));
                    // Parse the argument anyway so faults inside it are reported.
                    self.parse_call_argument();
                    return None;
                }
                Some(Expr::Column(tok.lexeme))
            }
            TokenKind::LeftParen => {
                self.nested(|p| {
                    p.advance();
                    let inner = p.parse_expr();
                    p.expect(TokenKind::RightParen, ")");
                    Some(Expr::Nested(Box::new(inner?)))
                })
            }
            // Keywords not followed by `(` are ordinary column names.
            TokenKind::If | TokenKind::Aggregate(_)
                if *self.peek_ahead(1) != TokenKind::LeftParen =>
            {
                self.advance();
                Some(Expr::Column(tok.lexeme))
            }
            TokenKind::If => self.nested(|p| {
                p.advance();
                p.advance(); // (
                let condition = p.parse_expr();
                p.expect(TokenKind::Comma, ",");
                let then_branch = p.parse_expr();
                p.expect(TokenKind::Comma, ",");
                let else_branch = p.parse_expr();
                p.expect(TokenKind::RightParen, ")");
                Some(Expr::If {
                    condition: Box::new(condition?),
                    then_branch: Box::new(then_branch?),
                    else_branch: Box::new(else_branch?),
                })
            }),
            TokenKind::Aggregate(function) => {
                let function = *function;
                self.advance();
                let argument = self.parse_call_argument();
                Some(Expr::Aggregate {
                    function,
                    argument: Box::new(argument?),
                })
            }
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Percent
            | TokenKind::Eq
            | TokenKind::NotEq
            | TokenKind::LtGt
            | TokenKind::Lt
            | TokenKind::Gt
            | TokenKind::LtEq
            | TokenKind::GtEq => {
                // Stray operators: skip the whole run, then look for an operand.
                while is_operator(&self.current().kind) {
                    let stray = self.advance();
                    self.error_at(
                        &stray,
                        format!("extraneous input '{}' expecting an expression", stray.lexeme),
                    );
                }
                self.parse_primary_expr();
                None
            }
            TokenKind::RightParen | TokenKind::Comma | TokenKind::Eof => {
                // Left in place so the enclosing rule can match it.
                self.error_at(
                    &tok,
                    format!("mismatched input '{}' expecting an expression", tok.describe()),
                );
                None
            }
        }
    }

    /// `'(' expr ')'` following a function name.
    fn parse_call_argument(&mut self) -> Option<Expr> {
        self.nested(|p| {
            p.expect(TokenKind::LeftParen, "(");
            let argument = p.parse_expr();
            p.expect(TokenKind::RightParen, ")");
            argument
        })
    }

    /// Run `f` one nesting level deeper, enforcing the depth limit.
    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Option<Expr>) -> Option<Expr> {
        if self.halted {
            return None;
        }
        if self.depth >= self.max_depth {
            let tok = self.current().clone();
            self.error_at(
                &tok,
                format!("maximum nesting depth of {} exceeded", self.max_depth),
            );
            self.halted = true;
            self.pos = self.tokens.len() - 1;
            return None;
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}

fn comparison_op(kind: &TokenKind) -> Option<ComparisonOp> {
    match kind {
        TokenKind::Gt => Some(ComparisonOp::Gt),
        TokenKind::Lt => Some(ComparisonOp::Lt),
        TokenKind::GtEq => Some(ComparisonOp::GtEq),
        TokenKind::LtEq => Some(ComparisonOp::LtEq),
        TokenKind::Eq => Some(ComparisonOp::Eq),
        TokenKind::NotEq => Some(ComparisonOp::NotEq),
        TokenKind::LtGt => Some(ComparisonOp::LtGt),
        _ => None,
    }
}

fn is_operator(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Plus | TokenKind::Minus | TokenKind::Star | TokenKind::Slash | TokenKind::Percent
    ) || comparison_op(kind).is_some()
}

fn binary(left: Option<Expr>, op: BinaryOp, right: Option<Expr>) -> Option<Expr> {
    Some(Expr::Binary {
        left: Box::new(left?),
        op,
        right: Box::new(right?),
    })
}

// ===========================================================================
// Tests
// ===========================================================================
