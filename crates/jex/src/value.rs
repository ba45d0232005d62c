//! The runtime value model and its deterministic coercions.
//!
//! A [`Value`] is a scalar the evaluator passes around: null, boolean,
//! arbitrary-precision decimal, string, datetime with offset, or a handle
//! into a JSON tree. JSON handles ([`JsonRef`]) are path views: a shared root
//! plus a segment chain, so property and index access never clone the
//! underlying document, and mutating built-ins (`push`, `setPath`, `%set`
//! Form B) write through to the live tree a variable is bound to. Handles on
//! `$in` and `$meta` are read-only; writes through them are rejected.

use std::cell::RefCell;
use std::rc::Rc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset};
use num_traits::{ToPrimitive, Zero};
use serde_json::Value as JsonValue;
use smallvec::SmallVec;

use crate::path::{PathSeg, SetPathError, get_at_path, get_at_path_mut, set_at_path};

/// A shared handle to (a location inside) a JSON document.
#[derive(Debug, Clone)]
pub struct JsonRef {
    root: Rc<RefCell<JsonValue>>,
    path: SmallVec<[PathSeg; 4]>,
    readonly: bool,
}

impl JsonRef {
    /// Wraps an owned document as a fresh mutable root.
    pub(crate) fn new_root(value: JsonValue) -> Self {
        Self {
            root: Rc::new(RefCell::new(value)),
            path: SmallVec::new(),
            readonly: false,
        }
    }

    /// Wraps an owned document as a read-only root (`$in`, `$meta`).
    pub(crate) fn readonly_root(value: JsonValue) -> Self {
        Self {
            readonly: true,
            ..Self::new_root(value)
        }
    }

    /// Handle to `self.key`; no existence check, reads resolve lazily.
    pub(crate) fn child_key(&self, key: &str) -> Self {
        let mut path = self.path.clone();
        path.push(PathSeg::Key(key.to_string()));
        Self {
            root: Rc::clone(&self.root),
            path,
            readonly: self.readonly,
        }
    }

    /// Handle extended by a pre-parsed segment chain.
    pub(crate) fn descend(&self, segments: &[PathSeg]) -> Self {
        let mut path = self.path.clone();
        path.extend(segments.iter().cloned());
        Self {
            root: Rc::clone(&self.root),
            path,
            readonly: self.readonly,
        }
    }

    /// Handle to `self[index]`.
    pub(crate) fn child_index(&self, index: usize) -> Self {
        let mut path = self.path.clone();
        path.push(PathSeg::Index(index));
        Self {
            root: Rc::clone(&self.root),
            path,
            readonly: self.readonly,
        }
    }

    /// Whether writes through this handle are rejected.
    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Borrows the node this handle points at, if it still resolves.
    pub fn with_value<R>(&self, f: impl FnOnce(Option<&JsonValue>) -> R) -> R {
        let root = self.root.borrow();
        f(get_at_path(&root, &self.path))
    }

    /// Clones the node this handle points at; Null when it does not resolve.
    #[must_use]
    pub fn materialize(&self) -> JsonValue {
        self.with_value(|node| node.cloned().unwrap_or(JsonValue::Null))
    }

    /// Writes `value` at `extra` below this handle, creating intermediates.
    pub(crate) fn set_at(&self, extra: &[PathSeg], value: JsonValue) -> Result<(), SetPathError> {
        if self.readonly {
            return Err(SetPathError::Invalid("target is read-only".to_string()));
        }
        let mut combined: SmallVec<[PathSeg; 8]> = SmallVec::new();
        combined.extend(self.path.iter().cloned());
        combined.extend(extra.iter().cloned());
        let mut root = self.root.borrow_mut();
        set_at_path(&mut root, &combined, value)
    }

    /// Parses `path` with the set-path grammar and writes `value` below this
    /// handle, creating intermediates. This is the write surface offered to
    /// host functions (typically on the `$out` handle); writes that would
    /// extend an array past the engine bound fail with a limit error.
    pub fn set_path(&self, path: &str, value: JsonValue) -> Result<(), crate::error::JexError> {
        let parsed = crate::path::parse_path(path)
            .map_err(|msg| crate::error::JexError::Runtime(crate::error::RuntimeError::new(msg).with_path(path)))?;
        self.set_at(&parsed.segments, value).map_err(|err| err.into_jex(path))
    }

    /// Mutable access to the resolved node (used by `push`).
    pub(crate) fn with_node_mut<R>(&self, f: impl FnOnce(&mut JsonValue) -> Result<R, String>) -> Result<R, String> {
        if self.readonly {
            return Err("target is read-only".to_string());
        }
        let mut root = self.root.borrow_mut();
        match get_at_path_mut(&mut root, &self.path) {
            Some(node) => f(node),
            None => Err("target path no longer resolves".to_string()),
        }
    }

    /// Length of the resolved array, if this resolves to an array.
    pub(crate) fn array_len(&self) -> Option<usize> {
        self.with_value(|node| node.and_then(JsonValue::as_array).map(Vec::len))
    }

    /// Structural equality of the resolved nodes.
    pub(crate) fn structural_eq(&self, other: &Self) -> bool {
        self.with_value(|a| other.with_value(|b| a.unwrap_or(&JsonValue::Null) == b.unwrap_or(&JsonValue::Null)))
    }
}

/// A runtime scalar.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(BigDecimal),
    Str(String),
    DateTime(DateTime<FixedOffset>),
    Json(JsonRef),
}

impl Value {
    /// Wraps an owned JSON node: scalars become native kinds, containers
    /// become fresh mutable roots.
    #[must_use]
    pub fn from_json(node: JsonValue) -> Self {
        match node {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => Self::Number(json_number_to_decimal(&n)),
            JsonValue::String(s) => Self::Str(s),
            container => Self::Json(JsonRef::new_root(container)),
        }
    }

    /// Resolves a JSON handle on a scalar node down to its native kind;
    /// arrays and objects (and non-JSON values) come back unchanged.
    #[must_use]
    pub fn unwrap_scalar(&self) -> Self {
        match self {
            Self::Json(handle) => handle.with_value(|node| match node {
                None | Some(JsonValue::Null) => Self::Null,
                Some(JsonValue::Bool(b)) => Self::Bool(*b),
                Some(JsonValue::Number(n)) => Self::Number(json_number_to_decimal(n)),
                Some(JsonValue::String(s)) => Self::Str(s.clone()),
                Some(_) => self.clone(),
            }),
            other => other.clone(),
        }
    }

    /// The `typeOf` name of this value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::DateTime(_) => "datetime",
            // a handle always resolves to a concrete kind (a missing node
            // reads as null), so the "json" and "unknown" names are
            // deliberately never produced
            Self::Json(handle) => handle.with_value(|node| match node {
                None | Some(JsonValue::Null) => "null",
                Some(JsonValue::Bool(_)) => "boolean",
                Some(JsonValue::Number(_)) => "number",
                Some(JsonValue::String(_)) => "string",
                Some(JsonValue::Array(_)) => "array",
                Some(JsonValue::Object(_)) => "object",
            }),
        }
    }

    /// Boolean coercion.
    #[must_use]
    pub fn coerce_bool(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => !n.is_zero(),
            Self::Str(s) => !s.is_empty(),
            Self::DateTime(_) => true,
            Self::Json(handle) => handle.with_value(|node| match node {
                None | Some(JsonValue::Null) => false,
                Some(JsonValue::Bool(b)) => *b,
                Some(JsonValue::Number(n)) => json_number_to_decimal(n) != BigDecimal::zero(),
                Some(JsonValue::String(s)) => !s.is_empty(),
                Some(_) => true,
            }),
        }
    }

    /// Numeric coercion; anything unparseable is 0.
    #[must_use]
    pub fn coerce_number(&self) -> BigDecimal {
        match self {
            Self::Null | Self::DateTime(_) => BigDecimal::zero(),
            Self::Bool(b) => BigDecimal::from(i32::from(*b)),
            Self::Number(n) => n.clone(),
            Self::Str(s) => parse_decimal(s),
            Self::Json(handle) => handle.with_value(|node| match node {
                Some(JsonValue::Number(n)) => json_number_to_decimal(n),
                Some(JsonValue::String(s)) => parse_decimal(s),
                Some(JsonValue::Bool(b)) => BigDecimal::from(i32::from(*b)),
                _ => BigDecimal::zero(),
            }),
        }
    }

    /// String coercion. JSON containers render as canonical compact JSON;
    /// JSON string nodes render as their bare text.
    #[must_use]
    pub fn coerce_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Str(s) => s.clone(),
            Self::DateTime(dt) => dt.to_rfc3339(),
            Self::Json(handle) => handle.with_value(|node| match node {
                None | Some(JsonValue::Null) => String::new(),
                Some(JsonValue::Bool(b)) => b.to_string(),
                Some(JsonValue::Number(n)) => n.to_string(),
                Some(JsonValue::String(s)) => s.clone(),
                Some(container) => serde_json::to_string(container).unwrap_or_default(),
            }),
        }
    }

    /// Converts into an owned JSON node for storage in a tree.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Number(n) => decimal_to_json(n),
            Self::Str(s) => JsonValue::String(s.clone()),
            Self::DateTime(dt) => JsonValue::String(dt.to_rfc3339()),
            Self::Json(handle) => handle.materialize(),
        }
    }

    /// Language equality: same-kind values compare structurally, mixed kinds
    /// compare by string coercion, and Null only equals Null. JSON scalars
    /// are unwrapped first so `Json(1) == Number(1)` holds numerically.
    #[must_use]
    pub fn loose_eq(&self, other: &Self) -> bool {
        let a = self.unwrap_scalar();
        let b = other.unwrap_scalar();
        match (&a, &b) {
            (Self::Null, Self::Null) => true,
            (Self::Null, _) | (_, Self::Null) => false,
            (Self::Bool(x), Self::Bool(y)) => x == y,
            (Self::Number(x), Self::Number(y)) => x == y,
            (Self::Str(x), Self::Str(y)) => x == y,
            (Self::DateTime(x), Self::DateTime(y)) => x == y,
            (Self::Json(x), Self::Json(y)) => x.structural_eq(y),
            _ => a.coerce_string() == b.coerce_string(),
        }
    }
}

/// Parses an invariant-locale decimal, defaulting to 0.
fn parse_decimal(text: &str) -> BigDecimal {
    text.trim().parse::<BigDecimal>().unwrap_or_else(|_| BigDecimal::zero())
}

/// Converts a JSON number to a decimal via its shortest text form, so the
/// binary float `29.99` becomes exactly `29.99`.
pub(crate) fn json_number_to_decimal(n: &serde_json::Number) -> BigDecimal {
    n.to_string().parse().unwrap_or_else(|_| BigDecimal::zero())
}

/// Converts a decimal to a JSON number: `i64` when integral and in range,
/// otherwise the closest `f64`. Decimals beyond `f64` fall back to their
/// text form rather than losing the value entirely.
pub(crate) fn decimal_to_json(n: &BigDecimal) -> JsonValue {
    if n.is_integer()
        && let Some(i) = n.to_i64()
    {
        return JsonValue::Number(serde_json::Number::from(i));
    }
    n.to_f64()
        .and_then(serde_json::Number::from_f64)
        .map_or_else(|| JsonValue::String(n.to_string()), JsonValue::Number)
}
