//! # formulac
//!
//! Compiles user-written column formulas such as
//! `IF((product_sales + service_sales) > 100000, "High", "Standard")`
//! into PostgreSQL expression fragments, together with metadata describing
//! the formula: referenced columns, aggregate functions, semantic flags and
//! an inferred result type.
//!
//! The pipeline is lex, parse, generate, infer. Each call is independent and
//! shares no state, so a [`Compiler`] can be used from many threads at once.
//!
//! ```
//! let compiled = formulac::compile("a + b * c").unwrap();
//! assert_eq!(compiled.sql, "(a + (b * c))");
//! assert_eq!(compiled.metadata.referenced_columns, ["a", "b", "c"]);
//! ```

pub mod catalog;
pub mod codegen;
pub mod error;
pub mod examples;
pub mod formula;
pub mod render;
pub mod types;

pub use error::{Diagnostic, ErrorListener, FormulaError, Result};
pub use types::{DataType, FormulaMetadata};

use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use formula::parser::{Parser, DEFAULT_MAX_DEPTH};

/// Tunables for a [`Compiler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// How deeply parentheses, `IF` and aggregate calls may nest.
    pub max_depth: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// The successful result of compiling one formula.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledFormula {
    /// A single balanced SQL expression with no statement terminator.
    pub sql: String,
    pub metadata: FormulaMetadata,
    /// The result type inferred from `metadata`.
    pub data_type: DataType,
}

/// Compiles formulas to SQL. Cheap to copy; holds only options.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compiler {
    options: CompilerOptions,
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Self {
        Compiler { options }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile `formula` into SQL and metadata.
    ///
    /// Returns [`FormulaError::Syntax`] with every lexical and syntax fault
    /// found, or [`FormulaError::Internal`] if the compiler itself failed.
    /// No SQL is produced in either case.
    pub fn compile(&self, formula: &str) -> Result<CompiledFormula> {
        debug!(len = formula.len(), "compiling formula");

        let result = guarded(|| self.compile_inner(formula));

        match &result {
            Ok(compiled) => trace!(
                sql = %compiled.sql,
                data_type = %compiled.data_type,
                columns = compiled.metadata.referenced_columns.len(),
                "formula compiled"
            ),
            Err(err) => debug!(errors = err.messages().len(), "formula rejected"),
        }
        result
    }

    fn compile_inner(&self, formula: &str) -> Result<CompiledFormula> {
        let mut listener = ErrorListener::new();
        let parsed = Parser::parse_with_max_depth(formula, self.options.max_depth, &mut listener);
        let expr = match parsed {
            Some(expr) if !listener.has_errors() => expr,
            _ => {
                let mut diagnostics = listener.into_diagnostics();
                if diagnostics.is_empty() {
                    // The parser only withholds a tree after reporting a fault.
                    diagnostics.push(Diagnostic {
                        line: 1,
                        column: 0,
                        message: "no expression produced".to_string(),
                    });
                }
                return Err(FormulaError::Syntax(diagnostics));
            }
        };

        let mut metadata = FormulaMetadata::new();
        let sql = codegen::generate_sql(&expr, &mut metadata);
        let data_type = metadata.infer_data_type();
        Ok(CompiledFormula {
            sql,
            metadata,
            data_type,
        })
    }
}

/// Compile `formula` with default options.
pub fn compile(formula: &str) -> Result<CompiledFormula> {
    Compiler::default().compile(formula)
}

/// Run a compile step, turning a panic into [`FormulaError::Internal`].
fn guarded(step: impl FnOnce() -> Result<CompiledFormula>) -> Result<CompiledFormula> {
    match panic::catch_unwind(AssertUnwindSafe(step)) {
        Ok(result) => result,
        Err(payload) => Err(FormulaError::Internal(format!(
            "Parse error: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unexpected failure"
    }
}
