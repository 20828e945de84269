use std::fmt;

use crate::token::{Position, Span};

mod parser;


pub use parser::{Parser, MAX_NESTING_DEPTH, MAX_TREE_HEIGHT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Concatenate,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "<>",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanEqual => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Concatenate => "&",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn missing(at: Position) -> Self {
        Self {
            kind: ExprKind::Missing,
            span: Span::single(at),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self.kind, ExprKind::Missing)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Placeholder for an operand cut off by the end of the document
    Missing,
    Identifier(String),
    Number(f64),
    Text(String),
    Logical(bool),
    Null,
    List(Vec<Expr>),
    Record(Vec<Binding>),
    Let {
        bindings: Vec<Binding>,
        body: Box<Expr>,
    },
    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Parenthesized(Box<Expr>),
    Invoke(Invocation),
}

/// `name = value`, used by both `let` and record literals.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub name_span: Span,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub callee: Box<Expr>,
    pub arguments: Vec<Expr>,
    /// Start of the opening parenthesis.
    pub open: Position,
    /// Start of every argument-separating comma.
    pub separators: Vec<Position>,
    /// Start of the closing parenthesis, absent while the call is still being typed.
    pub close: Option<Position>,
}

/// Output of the parse stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub root: Expr,
    /// The document ended in the middle of a construct.
    pub incomplete: bool,
    pub line_lengths: Vec<u32>,
}
