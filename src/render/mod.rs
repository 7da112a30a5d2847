//! Embedding compiled formulas into full SQL statements.
//!
//! formulac never executes SQL. These helpers only produce statement text
//! for a caller to run: a `GENERATED ALWAYS AS ... STORED` column definition
//! and a preview `SELECT`. Table and column names are spliced in as-is, so
//! they must be plain identifiers.

use crate::error::{FormulaError, Result};
use crate::CompiledFormula;

/// A computed column to add to an existing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedColumn {
    pub table: String,
    pub column: String,
    /// Explicit SQL type (e.g. `DECIMAL(12, 2)`). Falls back to the
    /// formula's inferred type when `None`.
    pub data_type: Option<String>,
}

impl GeneratedColumn {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        GeneratedColumn {
            table: table.into(),
            column: column.into(),
            data_type: None,
        }
    }

    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    /// Render the `ALTER TABLE` statement adding this column.
    pub fn to_ddl(&self, compiled: &CompiledFormula) -> Result<String> {
        check_identifier(&self.table)?;
        check_identifier(&self.column)?;
        let data_type = match &self.data_type {
            Some(explicit) => {
                check_type_name(explicit)?;
                explicit.trim().to_string()
            }
            None => compiled.data_type.to_string(),
        };
        Ok(format!(
            "ALTER TABLE {}\nADD COLUMN {} {}\nGENERATED ALWAYS AS ({}) STORED;",
            self.table, self.column, data_type, compiled.sql
        ))
    }
}

/// Render a `SELECT` showing the formula's value alongside each row.
pub fn preview_query(
    table: &str,
    column: &str,
    compiled: &CompiledFormula,
    rows: usize,
) -> Result<String> {
    check_identifier(table)?;
    check_identifier(column)?;
    Ok(format!(
        "SELECT *, {} AS {} FROM {} LIMIT {}",
        compiled.sql, column, table, rows
    ))
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_identifier(name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(FormulaError::InvalidIdentifier(name.to_string()))
    }
}

fn check_type_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    let ok = trimmed.starts_with(|c: char| c.is_ascii_alphabetic())
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '(' | ')' | ',' | '_'));
    if ok {
        Ok(())
    } else {
        Err(FormulaError::InvalidIdentifier(name.to_string()))
    }
}
