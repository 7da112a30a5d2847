//! Formula front-end.
//!
//! This module contains the lexer (tokenizer), abstract syntax tree (AST)
//! definitions, and a recursive-descent parser that transforms raw formula
//! text into a single [`Expr`] for SQL generation.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::*;
pub use lexer::{Token, TokenKind};
pub use parser::Parser;
