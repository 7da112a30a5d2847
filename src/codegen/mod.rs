//! SQL generation for parsed formulas.
//!
//! [`generate_sql`] walks an [`Expr`] once and returns an equivalent
//! PostgreSQL expression, recording what it sees into a
//! [`FormulaMetadata`] accumulator along the way.
//!
//! Every operator application is wrapped in its own parentheses, so the
//! output never depends on the target database's precedence rules:
//! `a + b * c` becomes `(a + (b * c))`.

use crate::formula::ast::{AggregateFunction, ComparisonOp, Expr};
use crate::types::FormulaMetadata;

/// Generate the SQL fragment for `expr`, filling in `metadata`.
pub fn generate_sql(expr: &Expr, metadata: &mut FormulaMetadata) -> String {
    match expr {
        Expr::Number(text) => text.clone(),

        Expr::String(value) => {
            metadata.record_string_literal();
            quote_literal(value)
        }

        Expr::Column(name) => {
            metadata.record_column(name);
            name.clone()
        }

        Expr::Binary { .. } => binary_chain_sql(expr, metadata),

        Expr::Comparison { left, op, right } => {
            metadata.has_comparison = true;
            let l = generate_sql(left, metadata);
            let r = generate_sql(right, metadata);
            format!("({l} {} {r})", comparison_sql(*op))
        }

        Expr::If {
            condition,
            then_branch,
            else_branch,
        } => {
            metadata.has_if_condition = true;
            let cond = generate_sql(condition, metadata);
            let then_sql = generate_sql(then_branch, metadata);
            let else_sql = generate_sql(else_branch, metadata);
            format!("CASE WHEN {cond} THEN {then_sql} ELSE {else_sql} END")
        }

        Expr::Aggregate { function, argument } => {
            metadata.record_aggregate(function.name());
            let arg = generate_sql(argument, metadata);
            aggregate_sql(*function, &arg)
        }

        // Operators already parenthesize their operands.
        Expr::Nested(inner) => generate_sql(inner, metadata),
    }
}

/// Generate a left-leaning operator chain without recursing down its spine.
///
/// `a + b + c` is `((a + b) + c)`: one opening parenthesis per operator up
/// front, then each `op right)` appended in source order.
fn binary_chain_sql(expr: &Expr, metadata: &mut FormulaMetadata) -> String {
    let mut spine = Vec::new();
    let mut node = expr;
    while let Expr::Binary { left, op, right } = node {
        spine.push((*op, right.as_ref()));
        node = left;
    }

    let mut sql = "(".repeat(spine.len());
    sql.push_str(&generate_sql(node, metadata));
    for (op, right) in spine.into_iter().rev() {
        let r = generate_sql(right, metadata);
        sql.push(' ');
        sql.push_str(op.symbol());
        sql.push(' ');
        sql.push_str(&r);
        sql.push(')');
    }
    sql
}

/// Quote a string value as a PostgreSQL literal.
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn comparison_sql(op: ComparisonOp) -> &'static str {
    match op {
        ComparisonOp::NotEq | ComparisonOp::LtGt => "<>",
        ComparisonOp::Eq => "=",
        other => other.symbol(),
    }
}

/// Map a formula aggregate onto its PostgreSQL spelling.
fn aggregate_sql(function: AggregateFunction, arg: &str) -> String {
    match function {
        AggregateFunction::Stddev => format!("STDDEV_POP({arg})"),
        AggregateFunction::Variance => format!("VAR_POP({arg})"),
        AggregateFunction::Median => {
            format!("PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY {arg})")
        }
        AggregateFunction::Mode => format!("MODE() WITHIN GROUP (ORDER BY {arg})"),
        AggregateFunction::Sum
        | AggregateFunction::Avg
        | AggregateFunction::Min
        | AggregateFunction::Max
        | AggregateFunction::Count => format!("{}({arg})", function.name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorListener;
    use crate::formula::Parser;
    use crate::types::DataType;

    fn sql(formula: &str) -> (String, FormulaMetadata) {
        let mut listener = ErrorListener::new();
        let expr = Parser::parse(formula, &mut listener)
            .unwrap_or_else(|| panic!("{formula:?}: {:?}", listener.diagnostics()));
        let mut metadata = FormulaMetadata::new();
        let sql = generate_sql(&expr, &mut metadata);
        (sql, metadata)
    }

    #[test]
    fn every_operator_is_parenthesized() {
        assert_eq!(sql("a + b * c").0, "(a + (b * c))");
        assert_eq!(sql("a * b + c").0, "((a * b) + c)");
        assert_eq!(sql("a - b - c").0, "((a - b) - c)");
        assert_eq!(sql("a / b % 2").0, "((a / b) % 2)");
    }

    #[test]
    fn user_parentheses_pass_through() {
        assert_eq!(sql("(a+b)*2").0, "((a + b) * 2)");
        assert_eq!(sql("((a))").0, "a");
        assert_eq!(sql("a - (b - c)").0, "(a - (b - c))");
    }

    #[test]
    fn numbers_are_verbatim() {
        let (out, meta) = sql("1.15");
        assert_eq!(out, "1.15");
        assert_eq!(meta, FormulaMetadata::new());
    }

    #[test]
    fn strings_are_requoted_and_escaped() {
        let (out, meta) = sql("\"O'Brien\"");
        assert_eq!(out, "'O''Brien'");
        assert_eq!(meta.detected_data_type, DataType::Text);
        assert_eq!(sql("'it''s'").0, "'it''s'");
        assert_eq!(sql("\"\"").0, "''");
    }

    #[test]
    fn comparison_operators_normalize() {
        assert_eq!(sql("a != b").0, "(a <> b)");
        assert_eq!(sql("a <> b").0, "(a <> b)");
        assert_eq!(sql("a = b").0, "(a = b)");
        assert_eq!(sql("a >= b").0, "(a >= b)");
        assert_eq!(sql("a <= b").0, "(a <= b)");
        assert_eq!(sql("a < b").0, "(a < b)");
        let (out, meta) = sql("a > b");
        assert_eq!(out, "(a > b)");
        assert!(meta.has_comparison);
    }

    #[test]
    fn if_becomes_case() {
        let (out, meta) = sql("IF(a > b, \"x\", \"y\")");
        assert_eq!(out, "CASE WHEN (a > b) THEN 'x' ELSE 'y' END");
        assert!(meta.has_if_condition);
        assert!(meta.has_comparison);
        assert_eq!(meta.referenced_columns, vec!["a", "b"]);
    }

    #[test]
    fn aggregate_mapping() {
        assert_eq!(sql("SUM(revenue)").0, "SUM(revenue)");
        assert_eq!(sql("avg(revenue)").0, "AVG(revenue)");
        assert_eq!(sql("Min(x) + MAX(x)").0, "(MIN(x) + MAX(x))");
        assert_eq!(sql("COUNT(x)").0, "COUNT(x)");
        assert_eq!(sql("STDDEV(revenue)").0, "STDDEV_POP(revenue)");
        assert_eq!(sql("VARIANCE(revenue)").0, "VAR_POP(revenue)");
        assert_eq!(
            sql("MEDIAN(revenue)").0,
            "PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY revenue)"
        );
        assert_eq!(
            sql("mode(a + b)").0,
            "MODE() WITHIN GROUP (ORDER BY (a + b))"
        );
    }

    #[test]
    fn aggregates_are_recorded_once_in_order() {
        let (_, meta) = sql("sum(a) / SUM(b) + avg(a)");
        assert!(meta.has_aggregation);
        assert_eq!(meta.aggregated_functions, vec!["SUM", "AVG"]);
        assert_eq!(meta.referenced_columns, vec!["a", "b"]);
    }

    #[test]
    fn columns_dedup_in_first_occurrence_order() {
        let (_, meta) = sql("revenue + revenue");
        assert_eq!(meta.referenced_columns, vec!["revenue"]);
        let (_, meta) = sql("c * b + a * c + B");
        assert_eq!(meta.referenced_columns, vec!["c", "b", "a", "B"]);
    }

    #[test]
    fn long_chains_keep_left_association() {
        let formula = (0..50_000)
            .map(|i| format!("c{}", i % 3))
            .collect::<Vec<_>>()
            .join(" - ");
        let (out, meta) = sql(&formula);
        assert!(out.starts_with(&format!("{}c0 - c1)", "(".repeat(49_999))));
        assert!(out.ends_with(" - c0) - c1)"));
        assert_eq!(meta.referenced_columns, vec!["c0", "c1", "c2"]);

        let (out, _) = sql("a * b + c * d * e - (f - g)");
        assert_eq!(out, "(((a * b) + ((c * d) * e)) - (f - g))");
    }

    #[test]
    fn nested_if_inside_aggregate() {
        let (out, meta) = sql("SUM(IF(qty > 0, price, 0))");
        assert_eq!(out, "SUM(CASE WHEN (qty > 0) THEN price ELSE 0 END)");
        assert!(meta.has_if_condition && meta.has_aggregation && meta.has_comparison);
        assert_eq!(meta.infer_data_type(), DataType::Text);
    }
}
