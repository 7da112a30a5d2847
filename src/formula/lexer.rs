//! Hand-written formula tokenizer.
//!
//! The [`Lexer`] takes raw formula text and produces a `Vec<Token>` that
//! always ends with [`TokenKind::Eof`]. Keywords are case-insensitive.
//! Faults (unrecognized characters, unterminated strings) are reported to an
//! [`ErrorListener`] and skipped, so one pass surfaces every lexical problem.

use std::fmt;

use crate::error::ErrorListener;

/// Aggregate functions recognised by the formula language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Sum,
    Avg,
    Min,
    Max,
    Count,
    Stddev,
    Variance,
    Median,
    Mode,
}

impl AggregateFunction {
    /// Look up a function by name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "SUM" => Some(Self::Sum),
            "AVG" => Some(Self::Avg),
            "MIN" => Some(Self::Min),
            "MAX" => Some(Self::Max),
            "COUNT" => Some(Self::Count),
            "STDDEV" => Some(Self::Stddev),
            "VARIANCE" => Some(Self::Variance),
            "MEDIAN" => Some(Self::Median),
            "MODE" => Some(Self::Mode),
            _ => None,
        }
    }

    /// The uppercased name as written in formulas.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Count => "COUNT",
            Self::Stddev => "STDDEV",
            Self::Variance => "VARIANCE",
            Self::Median => "MEDIAN",
            Self::Mode => "MODE",
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The classification of a [`Token`].
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // -----------------------------------------------------------------------
    // Keywords
    // -----------------------------------------------------------------------
    If,
    Aggregate(AggregateFunction),

    // -----------------------------------------------------------------------
    // Literals & identifiers
    // -----------------------------------------------------------------------
    Number,
    /// A quoted string; carries the contents with escapes resolved.
    String(String),
    Identifier,

    // -----------------------------------------------------------------------
    // Operators & punctuation
    // -----------------------------------------------------------------------
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    /// `!=`
    NotEq,
    /// `<>`
    LtGt,
    Lt,
    Gt,
    LtEq,
    GtEq,
    LeftParen,
    RightParen,
    Comma,

    /// End-of-input sentinel.
    Eof,
}

/// A token with its source text and position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// The exact source text, quotes included for strings.
    pub lexeme: String,
    /// 1-based line.
    pub line: u32,
    /// 0-based character offset within the line.
    pub column: u32,
}

impl Token {
    /// How the token is quoted in diagnostics.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Eof => "<EOF>".to_string(),
            _ => self.lexeme.clone(),
        }
    }
}

fn keyword_kind(word: &str) -> Option<TokenKind> {
    if word.eq_ignore_ascii_case("IF") {
        return Some(TokenKind::If);
    }
    AggregateFunction::from_name(word).map(TokenKind::Aggregate)
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

/// A hand-written formula tokenizer.
///
/// Create one with [`Lexer::new`], then call [`Lexer::tokenize`] to obtain
/// the full token stream.
pub struct Lexer<'a> {
    input: &'a str,
    /// Byte offset into `input`.
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            pos: 0,
            line: 1,
            column: 0,
        }
    }

    /// Tokenize the entire input, reporting faults to `listener`.
    ///
    /// The returned vector always ends with [`TokenKind::Eof`], even when
    /// faults were reported.
    pub fn tokenize(mut self, listener: &mut ErrorListener) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token(listener);
            let is_eof = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        tokens
    }

    // -- helpers ------------------------------------------------------------

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    // -- main scanner -------------------------------------------------------

    fn next_token(&mut self, listener: &mut ErrorListener) -> Token {
        loop {
            self.skip_whitespace();
            let (start, line, column) = (self.pos, self.line, self.column);

            let Some(ch) = self.peek() else {
                return Token {
                    kind: TokenKind::Eof,
                    lexeme: String::new(),
                    line,
                    column,
                };
            };

            let kind = if ch == '\'' || ch == '"' {
                self.read_string(ch, listener)
            } else if ch.is_ascii_digit() {
                Some(self.read_number())
            } else if ch.is_ascii_alphabetic() || ch == '_' {
                Some(self.read_identifier_or_keyword())
            } else {
                self.read_operator(listener)
            };

            // `None` means a fault was reported and its input skipped.
            if let Some(kind) = kind {
                return Token {
                    kind,
                    lexeme: self.input[start..self.pos].to_string(),
                    line,
                    column,
                };
            }
        }
    }

    // -- literal readers ----------------------------------------------------

    fn read_string(&mut self, quote: char, listener: &mut ErrorListener) -> Option<TokenKind> {
        let (line, column) = (self.line, self.column);
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.advance() {
                None => {
                    listener.report(line, column, "unterminated string literal");
                    return None;
                }
                Some(c) if c == quote => {
                    // A doubled delimiter escapes itself.
                    if self.peek() == Some(quote) {
                        self.advance();
                        value.push(quote);
                    } else {
                        break;
                    }
                }
                Some(c) => value.push(c),
            }
        }
        Some(TokenKind::String(value))
    }

    fn read_number(&mut self) -> TokenKind {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        // At most one fractional part, and only if digits follow the dot.
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        TokenKind::Number
    }

    fn read_identifier_or_keyword(&mut self) -> TokenKind {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.advance();
        }
        keyword_kind(&self.input[start..self.pos]).unwrap_or(TokenKind::Identifier)
    }

    fn read_operator(&mut self, listener: &mut ErrorListener) -> Option<TokenKind> {
        let (line, column) = (self.line, self.column);
        let ch = self.advance()?;
        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            ',' => TokenKind::Comma,
            '=' => TokenKind::Eq,
            '!' if self.peek() == Some('=') => {
                self.advance();
                TokenKind::NotEq
            }
            '<' => match self.peek() {
                Some('=') => {
                    self.advance();
                    TokenKind::LtEq
                }
                Some('>') => {
                    self.advance();
                    TokenKind::LtGt
                }
                _ => TokenKind::Lt,
            },
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            other => {
                listener.report(line, column, format!("token recognition error at: '{other}'"));
                return None;
            }
        };
        Some(kind)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
