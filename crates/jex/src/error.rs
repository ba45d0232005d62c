//! Error taxonomy for the engine.
//!
//! Three kinds of failure flow out of the public surface:
//! - [`CompileError`]: lexical, syntactic, or compile-time semantic violations.
//! - [`RuntimeError`]: evaluation failures (unknown function, arity mismatch,
//!   unsupported operand, path-shape mismatch, strict-mode misses, regex timeout).
//! - [`LimitExceeded`]: a bounded resource ran out (loop iterations, recursion
//!   depth, normalizer budgets, output size).
//!
//! Every error carries a human-readable message and, where available, the
//! originating span. Runtime errors may additionally carry the name of the
//! function being evaluated and the path being written.

use std::fmt;

use strum::{Display, IntoStaticStr};

/// A position in source text: 1-based line and column, 0-based byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl Pos {
    #[must_use]
    pub const fn new(line: u32, column: u32, offset: u32) -> Self {
        Self { line, column, offset }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open source range attached to tokens, AST nodes, and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    #[must_use]
    pub const fn new(start: Pos, end: Pos) -> Self {
        Self { start, end }
    }

    /// Returns the span covering both `self` and `other`.
    #[must_use]
    pub fn to(self, other: Self) -> Self {
        Self {
            start: self.start,
            end: other.end,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start)
    }
}

/// A compile-time failure with the offending source span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    message: String,
    span: Option<Span>,
}

impl CompileError {
    pub(crate) fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span: Some(span),
        }
    }

    pub(crate) fn spanless(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn span(&self) -> Option<Span> {
        self.span
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "compile error at {span}: {}", self.message),
            None => write!(f, "compile error: {}", self.message),
        }
    }
}

impl std::error::Error for CompileError {}

/// An evaluation failure.
///
/// The span points at the statement or expression being evaluated when known;
/// `function` names the built-in, host, or user function that produced the
/// error; `path` is set by set-path operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    message: String,
    span: Option<Span>,
    function: Option<String>,
    path: Option<String>,
}

impl RuntimeError {
    /// Creates a bare runtime error; also the way host functions report
    /// failures (the evaluator tags it with the function name).
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
            function: None,
            path: None,
        }
    }

    /// Attaches a span unless one is already present.
    #[must_use]
    pub(crate) fn with_span(mut self, span: Span) -> Self {
        self.span.get_or_insert(span);
        self
    }

    /// Tags the error with the function it came from, keeping the innermost name.
    #[must_use]
    pub(crate) fn with_function(mut self, name: &str) -> Self {
        self.function.get_or_insert_with(|| name.to_string());
        self
    }

    /// Tags the error with the path being written.
    #[must_use]
    pub(crate) fn with_path(mut self, path: &str) -> Self {
        self.path.get_or_insert_with(|| path.to_string());
        self
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn span(&self) -> Option<Span> {
        self.span
    }

    #[must_use]
    pub fn function(&self) -> Option<&str> {
        self.function.as_deref()
    }

    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "runtime error")?;
        if let Some(function) = &self.function {
            write!(f, " in {function}()")?;
        }
        if let Some(span) = self.span {
            write!(f, " at {span}")?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(path) = &self.path {
            write!(f, " (path {path})")?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}

/// Names the bound that a [`LimitExceeded`] error reports.
///
/// Most display forms match an `ExecutionOptions` or `NormalizerOptions`
/// field so hosts can surface which knob to raise (e.g. `MaxLoopIterations`);
/// `MaxArrayExtension` is a fixed engine bound on set-path array padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, serde::Serialize, serde::Deserialize)]
pub enum LimitKind {
    MaxLoopIterations,
    MaxRecursionDepth,
    MaxNodesVisited,
    MaxTotalReplacements,
    MaxOutputSizeBytes,
    MaxArrayExtension,
}

/// A bounded resource was exhausted during execution or normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitExceeded {
    kind: LimitKind,
    limit: u64,
}

impl LimitExceeded {
    pub(crate) const fn new(kind: LimitKind, limit: u64) -> Self {
        Self { kind, limit }
    }

    /// The limit that was exceeded.
    #[must_use]
    pub fn kind(&self) -> LimitKind {
        self.kind
    }

    /// The configured value of the exceeded limit.
    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }
}

impl fmt::Display for LimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "limit exceeded: {} ({})", self.kind, self.limit)
    }
}

impl std::error::Error for LimitExceeded {}

/// Top-level error type returned by `compile`, `execute`, and `normalize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JexError {
    Compile(CompileError),
    Runtime(RuntimeError),
    Limit(LimitExceeded),
}

impl JexError {
    /// Shorthand used by built-ins and the evaluator.
    pub(crate) fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(RuntimeError::new(message))
    }

    pub(crate) const fn limit(kind: LimitKind, limit: u64) -> Self {
        Self::Limit(LimitExceeded::new(kind, limit))
    }

    /// Attaches a span to the inner runtime error, if that is what this is.
    #[must_use]
    pub(crate) fn with_span(self, span: Span) -> Self {
        match self {
            Self::Runtime(err) => Self::Runtime(err.with_span(span)),
            other => other,
        }
    }

    /// Tags the inner runtime error with a function name, if applicable.
    #[must_use]
    pub(crate) fn with_function(self, name: &str) -> Self {
        match self {
            Self::Runtime(err) => Self::Runtime(err.with_function(name)),
            other => other,
        }
    }
}

impl fmt::Display for JexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile(err) => err.fmt(f),
            Self::Runtime(err) => err.fmt(f),
            Self::Limit(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for JexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Compile(err) => Some(err),
            Self::Runtime(err) => Some(err),
            Self::Limit(err) => Some(err),
        }
    }
}

impl From<CompileError> for JexError {
    fn from(err: CompileError) -> Self {
        Self::Compile(err)
    }
}

impl From<RuntimeError> for JexError {
    fn from(err: RuntimeError) -> Self {
        Self::Runtime(err)
    }
}

impl From<LimitExceeded> for JexError {
    fn from(err: LimitExceeded) -> Self {
        Self::Limit(err)
    }
}

/// Result alias used throughout the crate.
pub type JexResult<T> = Result<T, JexError>;
