//! Checking compiled formulas against a table schema.
//!
//! The compiler never looks at a schema: it records which column names a
//! formula mentions and leaves resolution to the caller. This module holds
//! the caller side of that contract.
//!
//! - [`SchemaLookup`]: the collaborator that knows a table's columns. A
//!   database-backed implementation lives with the caller.
//! - [`InMemoryCatalog`]: a map-backed lookup for tests, CLIs and callers
//!   that already hold the schema.
//! - [`validate`]: cross-checks [`FormulaMetadata::referenced_columns`]
//!   against a lookup, matching names case-insensitively.
//! - [`check_new_column`]: refuses a generated column name the table
//!   already uses.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::error::{FormulaError, Result};
use crate::CompiledFormula;

/// Warning attached to every formula that aggregates.
pub const AGGREGATION_WARNING: &str =
    "Formula contains aggregate functions. This will compute across all rows in the slice.";

/// Source of column names for a table.
pub trait SchemaLookup {
    /// The column names of `table`, or `None` if the table is unknown.
    fn columns(&self, table: &str) -> Option<Vec<String>>;
}

/// A schema held in memory. Table names are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    /// Keyed by lowercased table name.
    tables: HashMap<String, Vec<String>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a table and its columns.
    pub fn add_table<I, S>(&mut self, table: &str, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables.insert(
            table.to_ascii_lowercase(),
            columns.into_iter().map(Into::into).collect(),
        );
    }

    /// Builder-style [`add_table`](Self::add_table).
    pub fn with_table<I, S>(mut self, table: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_table(table, columns);
        self
    }
}

impl SchemaLookup for InMemoryCatalog {
    fn columns(&self, table: &str) -> Option<Vec<String>> {
        self.tables.get(&table.to_ascii_lowercase()).cloned()
    }
}

/// The outcome of checking a formula against a schema.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check that every column `compiled` references exists in `table`.
///
/// Returns [`FormulaError::TableNotFound`] when the lookup does not know the
/// table. Unknown columns are reported in [`Validation::errors`], one per
/// column, in the order the formula first mentions them.
pub fn validate(
    compiled: &CompiledFormula,
    table: &str,
    lookup: &impl SchemaLookup,
) -> Result<Validation> {
    let columns = lookup
        .columns(table)
        .ok_or_else(|| FormulaError::TableNotFound(table.to_string()))?;

    let mut validation = Validation::default();
    for name in &compiled.metadata.referenced_columns {
        if !columns.iter().any(|c| c.eq_ignore_ascii_case(name)) {
            validation
                .errors
                .push(format!("Column '{name}' does not exist in table '{table}'"));
        }
    }
    if compiled.metadata.has_aggregation {
        validation.warnings.push(AGGREGATION_WARNING.to_string());
    }

    debug!(
        table,
        errors = validation.errors.len(),
        warnings = validation.warnings.len(),
        "formula validated against schema"
    );
    Ok(validation)
}

/// Check that `column` can be added to `table` without clashing.
///
/// Names are compared case-insensitively, like [`validate`].
pub fn check_new_column(table: &str, column: &str, lookup: &impl SchemaLookup) -> Result<()> {
    let columns = lookup
        .columns(table)
        .ok_or_else(|| FormulaError::TableNotFound(table.to_string()))?;
    if columns.iter().any(|c| c.eq_ignore_ascii_case(column)) {
        return Err(FormulaError::ColumnExists {
            table: table.to_string(),
            column: column.to_string(),
        });
    }
    Ok(())
}
