//! Abstract syntax tree for formulas.
//!
//! A formula parsed by [`super::parser::Parser`] is a single [`Expr`] tree.
//! The tree is consumed once by the SQL generator in [`crate::codegen`].

use std::fmt;
use std::mem;

pub use super::lexer::AggregateFunction;

/// An arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }
}

/// A comparison operator, recorded as the user spelled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Gt,
    Lt,
    GtEq,
    LtEq,
    Eq,
    /// `!=`
    NotEq,
    /// `<>`
    LtGt,
}

impl ComparisonOp {
    /// The operator as it appeared in the formula.
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Gt => ">",
            ComparisonOp::Lt => "<",
            ComparisonOp::GtEq => ">=",
            ComparisonOp::LtEq => "<=",
            ComparisonOp::Eq => "=",
            ComparisonOp::NotEq => "!=",
            ComparisonOp::LtGt => "<>",
        }
    }
}

/// A formula expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal, kept as source text.
    Number(String),
    /// A string literal; the contents with quote escapes resolved.
    String(String),
    /// A column name, exactly as written.
    Column(String),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Comparison {
        left: Box<Expr>,
        op: ComparisonOp,
        right: Box<Expr>,
    },
    /// `IF(condition, then, else)`.
    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Aggregate {
        function: AggregateFunction,
        argument: Box<Expr>,
    },
    /// A parenthesized sub-expression.
    Nested(Box<Expr>),
}

impl Expr {
    /// Walk down the left spine of an operator chain.
    ///
    /// Returns the leftmost operand and the `(op, right)` pairs from the
    /// innermost application outwards. Chains are parsed left-associatively,
    /// so `a + b + c` has a spine as long as its term count.
    fn binary_spine(&self) -> (&Expr, Vec<(BinaryOp, &Expr)>) {
        let mut spine = Vec::new();
        let mut node = self;
        while let Expr::Binary { left, op, right } = node {
            spine.push((*op, right.as_ref()));
            node = left;
        }
        spine.reverse();
        (node, spine)
    }
}

impl fmt::Display for Expr {
    /// Renders the formula back in formula syntax, fully spaced.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(text) => f.write_str(text),
            Expr::String(value) => write!(f, "\"{}\"", value.replace('"', "\"\"")),
            Expr::Column(name) => f.write_str(name),
            Expr::Binary { .. } => {
                let (first, rest) = self.binary_spine();
                write!(f, "{first}")?;
                for (op, right) in rest {
                    write!(f, " {} {right}", op.symbol())?;
                }
                Ok(())
            }
            Expr::Comparison { left, op, right } => write!(f, "{left} {} {right}", op.symbol()),
            Expr::If {
                condition,
                then_branch,
                else_branch,
            } => write!(f, "IF({condition}, {then_branch}, {else_branch})"),
            Expr::Aggregate { function, argument } => write!(f, "{function}({argument})"),
            Expr::Nested(inner) => write!(f, "({inner})"),
        }
    }
}

impl Drop for Expr {
    // Frees an operator chain's left spine one node at a time. Remaining
    // recursion is bounded by the parser's nesting limit.
    fn drop(&mut self) {
        let mut spine = Vec::new();
        detach_left(self, &mut spine);
        while let Some(mut node) = spine.pop() {
            detach_left(&mut node, &mut spine);
        }
    }
}

fn detach_left(expr: &mut Expr, spine: &mut Vec<Box<Expr>>) {
    if let Expr::Binary { left, .. } = expr {
        if matches!(**left, Expr::Binary { .. }) {
            spine.push(mem::replace(left, Box::new(Expr::Number(String::new()))));
        }
    }
}
