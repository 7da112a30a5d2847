//! Result types and formula metadata.
//!
//! This module provides:
//! - [`DataType`]: the SQL type a compiled formula is expected to produce.
//! - [`FormulaMetadata`]: the accumulator filled in while SQL is generated,
//!   describing which columns and aggregates a formula uses.
//! - [`FormulaMetadata::infer_data_type`]: derives the result type from the
//!   recorded flags alone. Column types are never consulted.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DataType
// ---------------------------------------------------------------------------

/// The detected result type of a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    #[default]
    Numeric,
    Text,
    Boolean,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Numeric => "NUMERIC",
            DataType::Text => "TEXT",
            DataType::Boolean => "BOOLEAN",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FormulaMetadata
// ---------------------------------------------------------------------------

/// What a formula references and which constructs it uses.
///
/// Built fresh for every compile and only ever grows during it: names are
/// appended once, in first-occurrence order, and flags never reset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaMetadata {
    /// Column names, deduplicated by exact text.
    pub referenced_columns: Vec<String>,
    /// Uppercased aggregate function names.
    pub aggregated_functions: Vec<String>,
    pub has_if_condition: bool,
    pub has_aggregation: bool,
    pub has_comparison: bool,
    /// `NUMERIC` until the first string literal is seen, then `TEXT`.
    pub detected_data_type: DataType,
}

impl FormulaMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_column(&mut self, name: &str) {
        if !self.referenced_columns.iter().any(|c| c == name) {
            self.referenced_columns.push(name.to_string());
        }
    }

    pub fn record_aggregate(&mut self, name: &str) {
        self.has_aggregation = true;
        let name = name.to_ascii_uppercase();
        if !self.aggregated_functions.contains(&name) {
            self.aggregated_functions.push(name);
        }
    }

    pub fn record_string_literal(&mut self) {
        if self.detected_data_type == DataType::Numeric {
            self.detected_data_type = DataType::Text;
        }
    }

    /// The result type implied by the recorded flags.
    ///
    /// Precedence: any `IF` gives `TEXT` (branch types are not inspected),
    /// then any comparison gives `BOOLEAN`, then any string literal gives
    /// `TEXT`, otherwise `NUMERIC`.
    pub fn infer_data_type(&self) -> DataType {
        if self.has_if_condition {
            DataType::Text
        } else if self.has_comparison {
            DataType::Boolean
        } else if self.detected_data_type == DataType::Text {
            DataType::Text
        } else {
            DataType::Numeric
        }
    }
}
