use formulac::catalog::{validate, InMemoryCatalog};
use formulac::render::GeneratedColumn;
use formulac::{compile, Compiler, DataType, FormulaError};
use rusqlite::Connection;

fn sales_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE sales (
            name TEXT,
            product_sales INTEGER,
            service_sales INTEGER,
            operating_cost INTEGER,
            employee_count INTEGER
        );
        INSERT INTO sales VALUES ('north', 100, 50, 30, 10);
        INSERT INTO sales VALUES ('south', 200, 0, 260, 60);
        INSERT INTO sales VALUES ('east', 300, 100, 150, 40);",
    )
    .unwrap();
    conn
}

/// Run a compiled fragment against every row, ordered by name.
fn eval_rows<T: rusqlite::types::FromSql>(conn: &Connection, formula: &str) -> Vec<T> {
    let compiled = compile(formula).unwrap();
    let sql = format!("SELECT {} FROM sales ORDER BY name", compiled.sql);
    let mut stmt = conn.prepare(&sql).unwrap();
    let rows = stmt.query_map([], |row| row.get::<_, T>(0)).unwrap();
    rows.map(Result::unwrap).collect()
}

fn eval_scalar<T: rusqlite::types::FromSql>(conn: &Connection, formula: &str) -> T {
    let compiled = compile(formula).unwrap();
    let sql = format!("SELECT {} FROM sales", compiled.sql);
    conn.query_row(&sql, [], |row| row.get(0)).unwrap()
}

// -- Output shape -----------------------------------------------------------

#[test]
fn precedence_is_explicit_in_output() {
    assert_eq!(compile("a + b * c").unwrap().sql, "(a + (b * c))");
    assert_eq!(compile("(a+b)*2").unwrap().sql, "((a + b) * 2)");
    assert_eq!(compile("a*b-c/d%e").unwrap().sql, "((a * b) - ((c / d) % e))");
}

#[test]
fn if_with_comparison_is_text() {
    let compiled = compile(r#"IF(a > b, "x", "y")"#).unwrap();
    assert_eq!(compiled.sql, "CASE WHEN (a > b) THEN 'x' ELSE 'y' END");
    assert!(compiled.metadata.has_if_condition);
    assert!(compiled.metadata.has_comparison);
    assert_eq!(compiled.data_type, DataType::Text);
}

#[test]
fn aggregates_map_to_postgres() {
    assert_eq!(compile("SUM(revenue)").unwrap().sql, "SUM(revenue)");
    assert_eq!(compile("STDDEV(revenue)").unwrap().sql, "STDDEV_POP(revenue)");
    assert_eq!(
        compile("MEDIAN(revenue)").unwrap().sql,
        "PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY revenue)"
    );
}

#[test]
fn repeated_column_is_listed_once() {
    let compiled = compile("revenue + revenue").unwrap();
    assert_eq!(compiled.metadata.referenced_columns, vec!["revenue"]);
    assert_eq!(compiled.data_type, DataType::Numeric);
}

#[test]
fn string_literal_escapes_and_types_as_text() {
    let compiled = compile(r#""O'Brien""#).unwrap();
    assert_eq!(compiled.sql, "'O''Brien'");
    assert_eq!(compiled.data_type, DataType::Text);
}

#[test]
fn bare_comparison_is_boolean() {
    let compiled = compile("a > b").unwrap();
    assert_eq!(compiled.sql, "(a > b)");
    assert!(compiled.metadata.has_comparison);
    assert_eq!(compiled.data_type, DataType::Boolean);
}

#[test]
fn not_equal_spellings_normalize() {
    assert_eq!(compile("a != b").unwrap().sql, "(a <> b)");
    assert_eq!(compile("a <> b").unwrap().sql, "(a <> b)");
}

#[test]
fn unbalanced_parenthesis_fails_with_position() {
    let err = compile("(a+b").unwrap_err();
    let diags = err.diagnostics();
    assert!(!diags.is_empty());
    assert_eq!(diags[0].line, 1);
    assert_eq!(diags[0].column, 4);
    assert_eq!(
        err.messages(),
        vec!["Syntax error at line 1:4 - missing ')' at '<EOF>'"]
    );
}

#[test]
fn every_fault_is_reported() {
    let err = compile("a +\n$ b * (c").unwrap_err();
    let messages = err.messages();
    assert_eq!(
        messages,
        vec![
            "Syntax error at line 2:0 - token recognition error at: '$'",
            "Syntax error at line 2:8 - missing ')' at '<EOF>'",
        ]
    );
}

#[test]
fn failure_is_all_or_nothing() {
    // A valid prefix does not yield a partial result.
    let result = compile("SUM(a) + ");
    assert!(matches!(result, Err(FormulaError::Syntax(_))));
}

#[test]
fn compiles_are_independent() {
    let first = compile(r#"IF(a = 1, "y", "n")"#).unwrap();
    let second = compile("x + 1").unwrap();
    assert!(first.metadata.has_if_condition);
    assert!(!second.metadata.has_if_condition);
    assert!(!second.metadata.has_comparison);
    assert_eq!(second.metadata.referenced_columns, vec!["x"]);
}

#[test]
fn concurrent_compiles_share_nothing() {
    let compiler = Compiler::default();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                scope.spawn(move || {
                    let formula = format!("col{i} * {i} + SUM(col{i})");
                    compiler.compile(&formula).unwrap()
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            let compiled = handle.join().unwrap();
            assert_eq!(compiled.sql, format!("((col{i} * {i}) + SUM(col{i}))"));
            assert_eq!(compiled.metadata.referenced_columns, vec![format!("col{i}")]);
        }
    });
}

#[test]
fn very_long_operator_chain_compiles() {
    let formula = vec!["revenue"; 100_000].join(" + ");
    let compiled = compile(&formula).unwrap();
    assert!(compiled.sql.ends_with("+ revenue) + revenue)"));
    assert_eq!(compiled.sql.matches('(').count(), 99_999);
    assert_eq!(compiled.metadata.referenced_columns, vec!["revenue"]);
    assert_eq!(compiled.data_type, DataType::Numeric);
}

#[test]
fn long_chain_inside_calls_and_branches() {
    let terms = vec!["x"; 20_000].join(" * ");
    let formula = format!("IF(SUM({terms}) > 0, \"up\", \"down\")");
    let compiled = compile(&formula).unwrap();
    assert!(compiled.sql.starts_with("CASE WHEN (SUM(((("));
    assert!(compiled.sql.ends_with(" * x)) > 0) THEN 'up' ELSE 'down' END"));
    assert_eq!(compiled.data_type, DataType::Text);
}

#[test]
fn long_run_of_stray_operators_is_a_syntax_error() {
    let result = compile(&format!("{}1", "-".repeat(20_000)));
    let Err(FormulaError::Syntax(diags)) = &result else {
        panic!("expected a syntax error, got {result:?}");
    };
    assert_eq!(diags.len(), 20_000);
    assert!(diags
        .iter()
        .all(|d| d.message == "extraneous input '-' expecting an expression"));
}

#[test]
fn deep_nesting_is_a_syntax_error_not_a_crash() {
    let formula = format!("{}a{}", "(".repeat(100_000), ")".repeat(100_000));
    let err = compile(&formula).unwrap_err();
    assert_eq!(
        err.messages(),
        vec!["Syntax error at line 1:256 - maximum nesting depth of 256 exceeded"]
    );
}

// -- Generated SQL runs -----------------------------------------------------

#[test]
fn arithmetic_evaluates_with_declared_precedence() {
    let conn = sales_db();
    // east, north, south
    let values: Vec<i64> = eval_rows(&conn, "product_sales + service_sales * 2");
    assert_eq!(values, vec![500, 200, 200]);
    let values: Vec<i64> = eval_rows(&conn, "(product_sales + service_sales) * 2");
    assert_eq!(values, vec![800, 300, 400]);
    let values: Vec<i64> = eval_rows(&conn, "product_sales - service_sales - operating_cost");
    assert_eq!(values, vec![50, 20, -60]);
    let values: Vec<i64> = eval_rows(&conn, "product_sales % 7");
    assert_eq!(values, vec![6, 2, 4]);
}

#[test]
fn if_evaluates_as_case() {
    let conn = sales_db();
    let values: Vec<String> = eval_rows(
        &conn,
        r#"IF(operating_cost > (product_sales + service_sales), "Loss", "Profit")"#,
    );
    assert_eq!(values, vec!["Profit", "Profit", "Loss"]);
}

#[test]
fn comparison_evaluates_to_truth_value() {
    let conn = sales_db();
    let values: Vec<bool> = eval_rows(&conn, "employee_count != 60");
    assert_eq!(values, vec![true, true, false]);
    let values: Vec<bool> = eval_rows(&conn, "employee_count = 60");
    assert_eq!(values, vec![false, false, true]);
}

#[test]
fn quoted_strings_round_trip_through_the_database() {
    let conn = sales_db();
    let value: String = conn
        .query_row(
            &format!("SELECT {}", compile(r#""O'Brien""#).unwrap().sql),
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(value, "O'Brien");
}

#[test]
fn portable_aggregates_evaluate() {
    let conn = sales_db();
    assert_eq!(eval_scalar::<i64>(&conn, "SUM(product_sales)"), 600);
    assert_eq!(eval_scalar::<f64>(&conn, "AVG(product_sales + service_sales)"), 250.0);
    assert_eq!(eval_scalar::<i64>(&conn, "MAX(employee_count) - MIN(employee_count)"), 50);
    assert_eq!(eval_scalar::<i64>(&conn, "COUNT(name)"), 3);
}

// -- Caller-side helpers ----------------------------------------------------

#[test]
fn validate_then_render_generated_column() {
    let catalog = InMemoryCatalog::new().with_table(
        "sales",
        ["product_sales", "service_sales", "operating_cost"],
    );
    let compiled = compile("product_sales * 1.15").unwrap();
    assert!(validate(&compiled, "sales", &catalog).unwrap().is_valid());

    let ddl = GeneratedColumn::new("sales", "adjusted")
        .to_ddl(&compiled)
        .unwrap();
    assert_eq!(
        ddl,
        "ALTER TABLE sales\nADD COLUMN adjusted NUMERIC\nGENERATED ALWAYS AS ((product_sales * 1.15)) STORED;"
    );

    let bad = compile("product_sales * ghost").unwrap();
    let validation = validate(&bad, "sales", &catalog).unwrap();
    assert_eq!(
        validation.errors,
        vec!["Column 'ghost' does not exist in table 'sales'"]
    );
}

#[test]
fn generated_column_ddl_runs_in_sqlite() {
    let conn = sales_db();
    let compiled = compile("product_sales + service_sales - operating_cost").unwrap();
    // SQLite spells this `ADD COLUMN ... AS (...) VIRTUAL`; check the fragment fits.
    conn.execute_batch(&format!(
        "ALTER TABLE sales ADD COLUMN margin INTEGER GENERATED ALWAYS AS ({}) VIRTUAL;",
        compiled.sql
    ))
    .unwrap();
    let margin: i64 = conn
        .query_row("SELECT margin FROM sales WHERE name = 'east'", [], |row| row.get(0))
        .unwrap();
    assert_eq!(margin, 250);
}
