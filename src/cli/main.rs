//! # formulac CLI
//!
//! Compiles formulas from the command line, from a file (one per line), or
//! interactively when neither is given.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::{debug, info};

use formulac::catalog::{check_new_column, validate, InMemoryCatalog, Validation};
use formulac::render::GeneratedColumn;
use formulac::{CompiledFormula, Compiler, CompilerOptions};

#[derive(Parser, Debug)]
#[command(name = "formulac")]
#[command(about = "Compile column formulas into PostgreSQL expressions")]
#[command(version)]
struct Args {
    /// Formula to compile (starts an interactive shell if omitted)
    formula: Option<String>,

    /// Read formulas from a file, one per line; `#` starts a comment line
    #[arg(short, long, value_name = "PATH", conflicts_with = "formula")]
    file: Option<PathBuf>,

    /// Table the formula belongs to
    #[arg(short, long)]
    table: Option<String>,

    /// Emit an ALTER TABLE ... GENERATED ALWAYS AS statement for this column
    #[arg(short, long, requires = "table")]
    column: Option<String>,

    /// SQL type for the generated column (defaults to the inferred type)
    #[arg(long = "type", value_name = "SQL_TYPE", requires = "column")]
    data_type: Option<String>,

    /// Known columns of --table, comma separated, to check references against
    #[arg(long, value_delimiter = ',', requires = "table")]
    columns: Option<Vec<String>>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Maximum nesting of parentheses, IF and aggregate calls
    #[arg(long, default_value_t = CompilerOptions::default().max_depth)]
    max_depth: usize,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Everything reported for one formula.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    formula: String,
    success: bool,
    #[serde(flatten)]
    compiled: Option<CompiledFormula>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ddl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation: Option<Validation>,
    errors: Vec<String>,
}

struct Session {
    compiler: Compiler,
    args: Args,
    catalog: Option<InMemoryCatalog>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    setup_tracing(args.verbose);

    let catalog = match (&args.table, &args.columns) {
        (Some(table), Some(columns)) => {
            Some(InMemoryCatalog::new().with_table(table, columns.iter().map(|c| c.trim())))
        }
        _ => None,
    };
    let compiler = Compiler::new(CompilerOptions {
        max_depth: args.max_depth,
    });
    let session = Session {
        compiler,
        args,
        catalog,
    };

    if let Some(formula) = session.args.formula.clone() {
        return exit_code(session.run_one(&formula));
    }
    if let Some(path) = session.args.file.clone() {
        return match fs::read_to_string(&path) {
            Ok(contents) => exit_code(session.run_batch(&contents)),
            Err(e) => {
                eprintln!("Error reading {}: {}", path.display(), e);
                ExitCode::FAILURE
            }
        };
    }
    session.repl();
    ExitCode::SUCCESS
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

impl Session {
    fn report(&self, formula: &str) -> Report {
        let mut report = Report {
            formula: formula.to_string(),
            success: false,
            compiled: None,
            ddl: None,
            validation: None,
            errors: Vec::new(),
        };

        let compiled = match self.compiler.compile(formula) {
            Ok(compiled) => compiled,
            Err(e) => {
                report.errors = e.messages();
                return report;
            }
        };

        if let (Some(table), Some(catalog)) = (&self.args.table, &self.catalog) {
            match validate(&compiled, table, catalog) {
                Ok(validation) => {
                    report.errors.extend(validation.errors.iter().cloned());
                    report.validation = Some(validation);
                }
                Err(e) => report.errors.extend(e.messages()),
            }
        }

        if let (Some(table), Some(column)) = (&self.args.table, &self.args.column) {
            let mut target = GeneratedColumn::new(table.as_str(), column.as_str());
            if let Some(data_type) = &self.args.data_type {
                target = target.with_data_type(data_type.as_str());
            }
            let ddl = match &self.catalog {
                Some(catalog) => check_new_column(table, column, catalog)
                    .and_then(|()| target.to_ddl(&compiled)),
                None => target.to_ddl(&compiled),
            };
            match ddl {
                Ok(ddl) => report.ddl = Some(ddl),
                Err(e) => report.errors.extend(e.messages()),
            }
        }

        report.success = report.errors.is_empty();
        report.compiled = Some(compiled);
        report
    }

    /// Compile and print one formula. Returns whether it succeeded.
    fn run_one(&self, formula: &str) -> bool {
        let report = self.report(formula);
        if self.args.json {
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("Error: {e}"),
            }
        } else {
            print_report(&report);
        }
        report.success
    }

    fn run_batch(&self, contents: &str) -> bool {
        let mut all_ok = true;
        let mut count = 0usize;
        for line in contents.lines() {
            let formula = line.trim();
            if formula.is_empty() || formula.starts_with('#') {
                continue;
            }
            count += 1;
            all_ok &= self.run_one(formula);
        }
        info!(count, all_ok, "batch finished");
        all_ok
    }

    fn repl(&self) {
        println!("formulac v{}", env!("CARGO_PKG_VERSION"));
        println!("Enter \".help\" for usage hints.");

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("formula> ");
            if stdout.flush().is_err() {
                break;
            }

            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => break, // EOF
                Ok(_) => {}
                Err(_) => break,
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('.') {
                if !handle_dot_command(trimmed) {
                    break;
                }
                continue;
            }
            self.run_one(trimmed);
        }
        println!();
    }
}

fn print_report(report: &Report) {
    if let Some(compiled) = &report.compiled {
        let meta = &compiled.metadata;
        println!("SQL:       {}", compiled.sql);
        println!("Type:      {}", compiled.data_type);
        println!("Columns:   {}", meta.referenced_columns.join(", "));
        if meta.has_aggregation {
            println!("Functions: {}", meta.aggregated_functions.join(", "));
        }
        if let Some(validation) = &report.validation {
            for warning in &validation.warnings {
                println!("Warning:   {warning}");
            }
        }
        if let Some(ddl) = &report.ddl {
            println!("{ddl}");
        }
    }
    for error in &report.errors {
        eprintln!("Error: {error}");
    }
}

/// Returns `false` when the shell should exit.
fn handle_dot_command(cmd: &str) -> bool {
    let command = cmd
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase();
    debug!(%command, "dot command");

    match command.as_str() {
        ".help" => {
            println!(".help              Show this help");
            println!(".examples          List sample formulas");
            println!(".quit              Exit this program");
            println!(".exit              Exit this program");
        }
        ".examples" => {
            for (category, formulas) in formulac::examples::EXAMPLES {
                println!("{category}:");
                for formula in *formulas {
                    println!("  {formula}");
                }
            }
        }
        ".quit" | ".exit" => return false,
        _ => {
            eprintln!("Error: unknown command: {}", command);
            eprintln!("Use .help for a list of commands.");
        }
    }
    true
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("formulac=trace,info")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
