//! AST for JEX scripts.
//!
//! Expressions and statements are tagged sums; every node carries the span of
//! the source it was parsed from. The tree is immutable after compilation and
//! owns its children outright, so a compiled program can be shared across
//! threads freely.

use bigdecimal::BigDecimal;

use crate::error::Span;

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    /// Boolean-coerced negation `!x`.
    Not,
    /// Numeric negation `-x`.
    Neg,
}

/// Binary operators, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    /// Symbol used in diagnostics.
    pub(crate) fn symbol(self) -> &'static str {
        match self {
            Self::Or => "||",
            Self::And => "&&",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        }
    }
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    NullLit,
    BoolLit(bool),
    NumberLit(BigDecimal),
    /// String literal; `&ident` macro expansion happens at evaluation time.
    StringLit(String),
    /// `&name`.
    VarRef(String),
    /// `$name`; only `in`, `out`, and `meta` resolve, checked at evaluation.
    BuiltInVar(String),
    /// A `$.a.b[0]` source path, reassembled into its canonical string form.
    JsonPathLit(String),
    Unary {
        op: UnaryOp,
        operand: Box<ExprNode>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<ExprNode>,
        rhs: Box<ExprNode>,
    },
    /// Function call; resolution order is script, libraries, registry.
    Call {
        name: String,
        args: Vec<ExprNode>,
    },
    /// `{ key: expr, … }` with string keys, insertion order preserved.
    ObjectLit(Vec<(String, ExprNode)>),
    /// `[ expr, … ]`.
    ArrayLit(Vec<ExprNode>),
    /// `base.name`.
    Property {
        base: Box<ExprNode>,
        name: String,
    },
    /// `base[index]`.
    Index {
        base: Box<ExprNode>,
        index: Box<ExprNode>,
    },
}

/// A spanned expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ExprNode {
    pub expr: Expr,
    pub span: Span,
}

impl ExprNode {
    pub(crate) fn new(expr: Expr, span: Span) -> Self {
        Self { expr, span }
    }
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Stmt {
    /// `%let name = expr ;`
    Let { name: String, value: ExprNode },
    /// `%set path = expr ;` — Form A; the target is `$out`, the path comes
    /// from the shape of the path expression.
    SetPath { path: ExprNode, value: ExprNode },
    /// `%set target , path , value ;` — Form B.
    SetTarget {
        target: ExprNode,
        path: ExprNode,
        value: ExprNode,
    },
    If {
        condition: ExprNode,
        then_block: Vec<StmtNode>,
        else_block: Option<Vec<StmtNode>>,
    },
    /// `%foreach name %in expr %do ; … %end ;`
    Foreach {
        var: String,
        collection: ExprNode,
        body: Vec<StmtNode>,
    },
    /// `%do name = start %to end ; … %end ;`
    DoLoop {
        var: String,
        start: ExprNode,
        end: ExprNode,
        body: Vec<StmtNode>,
    },
    Break,
    Continue,
    Return { value: Option<ExprNode> },
    Expression(ExprNode),
}

/// A spanned statement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StmtNode {
    pub stmt: Stmt,
    pub span: Span,
}

impl StmtNode {
    pub(crate) fn new(stmt: Stmt, span: Span) -> Self {
        Self { stmt, span }
    }
}

/// A `%func name(params) ; … %endfunc ;` declaration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<StmtNode>,
    pub span: Span,
}

/// Raw parser output: top-level statements plus the function declarations
/// found among them, in source order. The compiler turns this into a
/// [`crate::Program`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedScript {
    pub statements: Vec<StmtNode>,
    pub functions: Vec<FunctionDecl>,
}
