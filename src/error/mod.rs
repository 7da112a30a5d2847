//! Unified error handling for formulac.
//!
//! Two layers live here:
//!
//! - [`Diagnostic`] and [`ErrorListener`]: positioned lexical and syntax
//!   faults. The lexer and parser never stop at the first fault; they report
//!   into a listener and keep going so the caller sees every problem at once.
//! - [`FormulaError`]: the error type returned from the public API. A
//!   non-empty diagnostic list becomes [`FormulaError::Syntax`].
//!
//! A convenience [`Result<T>`] alias is re-exported so that callers can
//! write `Result<T>` instead of `std::result::Result<T, FormulaError>`.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// A single lexical or syntax fault with its source position.
///
/// `line` is 1-based, `column` is the 0-based character offset within that
/// line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Syntax error at line {}:{} - {}",
            self.line, self.column, self.message
        )
    }
}

/// Collects diagnostics from the lexer and parser of one compile.
#[derive(Debug, Default)]
pub struct ErrorListener {
    diagnostics: Vec<Diagnostic>,
}

impl ErrorListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fault at the given position.
    pub fn report(&mut self, line: u32, column: u32, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            line,
            column,
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// The canonical error type for all formulac operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// The formula failed to lex or parse. Never empty.
    #[error("{}", join_diagnostics(.0))]
    Syntax(Vec<Diagnostic>),

    /// An unexpected fault inside the compiler. This is a bug.
    #[error("{0}")]
    Internal(String),

    /// A table, column, or type name that cannot be spliced into SQL.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The schema lookup knows nothing about the requested table.
    #[error("Table '{0}' does not exist")]
    TableNotFound(String),

    /// A generated column would shadow one the table already has.
    #[error("Column '{column}' already exists in table '{table}'")]
    ColumnExists { table: String, column: String },
}

impl FormulaError {
    /// The human-readable messages carried by this error, one per fault.
    pub fn messages(&self) -> Vec<String> {
        match self {
            FormulaError::Syntax(diagnostics) => {
                diagnostics.iter().map(ToString::to_string).collect()
            }
            other => vec![other.to_string()],
        }
    }

    /// The positioned diagnostics, if this is a syntax failure.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            FormulaError::Syntax(diagnostics) => diagnostics,
            _ => &[],
        }
    }
}

fn join_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A specialised [`Result`] type for formulac operations.
pub type Result<T> = std::result::Result<T, FormulaError>;
