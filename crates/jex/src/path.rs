//! Set-path parsing and JSON tree surgery.
//!
//! The write-side path grammar is deliberately small: `name` segments and
//! `[integer]` / `['quoted']` segments, optionally prefixed by `$` and one of
//! the built-in roots (`in`, `out`, `meta`). Reading and writing walk the
//! tree segment by segment; writes create missing intermediates (an object
//! when the next segment is a name, an array when it is an index) and extend
//! arrays with nulls. The richer read-side JSONPath dialect (wildcards,
//! filters) belongs to the `jp1`/`jpAll` built-ins, not to this module.

use serde_json::Value as JsonValue;
use smallvec::SmallVec;

use crate::error::{JexError, LimitKind, RuntimeError};

/// Largest index a set-path write may create by padding an array with nulls.
///
/// Index segments come from script and input data, and the padding happens
/// while a statement executes, before the post-run output-size cap is ever
/// consulted. Without this bound a single `%set $.a[999999999999] = 1;`
/// allocates the whole gap in one step.
pub(crate) const MAX_ARRAY_EXTENSION: usize = 100_000;

/// Failure from a set-path write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SetPathError {
    /// Shape mismatch or read-only target.
    Invalid(String),
    /// An index write would extend an array past [`MAX_ARRAY_EXTENSION`].
    ArrayExtension,
}

impl SetPathError {
    /// Converts into the public taxonomy, attaching the path text.
    pub(crate) fn into_jex(self, path: &str) -> JexError {
        match self {
            Self::Invalid(message) => JexError::Runtime(RuntimeError::new(message).with_path(path)),
            Self::ArrayExtension => JexError::limit(LimitKind::MaxArrayExtension, MAX_ARRAY_EXTENSION as u64),
        }
    }
}

/// One step in a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathSeg {
    Key(String),
    Index(usize),
}

impl std::fmt::Display for PathSeg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(key) => write!(f, ".{key}"),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Built-in root named by a path prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PathRoot {
    In,
    Out,
    Meta,
}

/// A parsed set-path: optional root plus segments.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedPath {
    pub root: Option<PathRoot>,
    pub segments: SmallVec<[PathSeg; 8]>,
}

/// Parses a set-path string such as `$out.a.b[0]`, `$.result`, or `a['k'].b`.
///
/// The leading `$` and a built-in root name directly after it are consumed as
/// the root marker; `$.name` keeps `name` as an ordinary segment.
pub(crate) fn parse_path(text: &str) -> Result<ParsedPath, String> {
    let mut rest = text.trim();
    if let Some(stripped) = rest.strip_prefix('$') {
        rest = stripped;
    }
    let mut root = None;
    for (name, marker) in [("in", PathRoot::In), ("out", PathRoot::Out), ("meta", PathRoot::Meta)] {
        if let Some(stripped) = rest.strip_prefix(name)
            && matches!(stripped.chars().next(), None | Some('.' | '['))
        {
            root = Some(marker);
            rest = stripped;
            break;
        }
    }

    let mut segments = SmallVec::new();
    let mut chars = rest.chars().peekable();
    let mut first = true;
    while let Some(&ch) = chars.peek() {
        match ch {
            '.' => {
                chars.next();
                let name = take_name(&mut chars);
                if name.is_empty() {
                    return Err(format!("empty segment in path `{text}`"));
                }
                segments.push(PathSeg::Key(name));
            }
            '[' => {
                chars.next();
                segments.push(parse_bracket(text, &mut chars)?);
            }
            _ if first => {
                // a bare leading name, as in `a.b` without `$.`
                let name = take_name(&mut chars);
                if name.is_empty() {
                    return Err(format!("unexpected character `{ch}` in path `{text}`"));
                }
                segments.push(PathSeg::Key(name));
            }
            other => return Err(format!("unexpected character `{other}` in path `{text}`")),
        }
        first = false;
    }
    Ok(ParsedPath { root, segments })
}

fn take_name(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut name = String::new();
    while let Some(&ch) = chars.peek() {
        if ch == '.' || ch == '[' {
            break;
        }
        name.push(ch);
        chars.next();
    }
    name.trim().to_string()
}

fn parse_bracket(full: &str, chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<PathSeg, String> {
    match chars.peek().copied() {
        Some(quote @ ('\'' | '"')) => {
            chars.next();
            let mut key = String::new();
            loop {
                match chars.next() {
                    Some(c) if c == quote => break,
                    Some(c) => key.push(c),
                    None => return Err(format!("unterminated quoted segment in path `{full}`")),
                }
            }
            match chars.next() {
                Some(']') => Ok(PathSeg::Key(key)),
                _ => Err(format!("expected `]` after quoted segment in path `{full}`")),
            }
        }
        _ => {
            let mut digits = String::new();
            loop {
                match chars.next() {
                    Some(']') => break,
                    Some(c) => digits.push(c),
                    None => return Err(format!("unterminated `[` in path `{full}`")),
                }
            }
            let digits = digits.trim();
            digits
                .parse::<usize>()
                .map(PathSeg::Index)
                .map_err(|_| format!("path index `{digits}` is not a non-negative integer in `{full}`"))
        }
    }
}

/// Reads the node at `segments`, if present.
pub(crate) fn get_at_path<'a>(mut node: &'a JsonValue, segments: &[PathSeg]) -> Option<&'a JsonValue> {
    for segment in segments {
        node = match segment {
            PathSeg::Key(key) => node.as_object()?.get(key)?,
            PathSeg::Index(index) => node.as_array()?.get(*index)?,
        };
    }
    Some(node)
}

/// Mutable variant of [`get_at_path`]; does not create anything.
pub(crate) fn get_at_path_mut<'a>(mut node: &'a mut JsonValue, segments: &[PathSeg]) -> Option<&'a mut JsonValue> {
    for segment in segments {
        node = match segment {
            PathSeg::Key(key) => node.as_object_mut()?.get_mut(key)?,
            PathSeg::Index(index) => node.as_array_mut()?.get_mut(*index)?,
        };
    }
    Some(node)
}

/// Writes `value` at `segments` under `node`, creating intermediate
/// containers. Null intermediates are promoted to the container kind the next
/// segment needs; arrays are padded with nulls up to the requested index,
/// bounded by [`MAX_ARRAY_EXTENSION`]. A name segment on a non-object or an
/// index segment on a non-array fails.
pub(crate) fn set_at_path(node: &mut JsonValue, segments: &[PathSeg], value: JsonValue) -> Result<(), SetPathError> {
    let Some((first, rest)) = segments.split_first() else {
        *node = value;
        return Ok(());
    };
    match first {
        PathSeg::Key(key) => {
            if node.is_null() {
                *node = JsonValue::Object(serde_json::Map::new());
            }
            let Some(map) = node.as_object_mut() else {
                return Err(SetPathError::Invalid(format!(
                    "cannot set key `{key}` on a non-object value"
                )));
            };
            let child = map.entry(key.clone()).or_insert(JsonValue::Null);
            set_at_path(child, rest, value)
        }
        PathSeg::Index(index) => {
            if node.is_null() {
                *node = JsonValue::Array(Vec::new());
            }
            let Some(array) = node.as_array_mut() else {
                return Err(SetPathError::Invalid(format!(
                    "cannot set index [{index}] on a non-array value"
                )));
            };
            if *index >= array.len() && *index >= MAX_ARRAY_EXTENSION {
                return Err(SetPathError::ArrayExtension);
            }
            while array.len() <= *index {
                array.push(JsonValue::Null);
            }
            set_at_path(&mut array[*index], rest, value)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_roots_and_segments() {
        let path = parse_path("$out.a.b[0]").unwrap();
        assert_eq!(path.root, Some(PathRoot::Out));
        assert_eq!(
            path.segments.as_slice(),
            &[
                PathSeg::Key("a".to_string()),
                PathSeg::Key("b".to_string()),
                PathSeg::Index(0)
            ]
        );

        // `$.out` keeps `out` as a plain segment
        let path = parse_path("$.out.x").unwrap();
        assert_eq!(path.root, None);
        assert_eq!(path.segments[0], PathSeg::Key("out".to_string()));

        let path = parse_path("a['k k'].b").unwrap();
        assert_eq!(path.root, None);
        assert_eq!(path.segments[0], PathSeg::Key("a".to_string()));
        assert_eq!(path.segments[1], PathSeg::Key("k k".to_string()));
    }

    #[test]
    fn rejects_bad_paths() {
        assert!(parse_path("$.a[x]").is_err());
        assert!(parse_path("$.a[1").is_err());
        assert!(parse_path("$..b").is_err());
    }

    #[test]
    fn set_creates_intermediates() {
        let mut node = json!({});
        let path = parse_path("$.a.b[2].c").unwrap();
        set_at_path(&mut node, &path.segments, json!(7)).unwrap();
        assert_eq!(node, json!({"a": {"b": [null, null, {"c": 7}]}}));
    }

    #[test]
    fn array_extension_is_capped() {
        let mut node = json!({});
        let path = parse_path(&format!("$.a[{MAX_ARRAY_EXTENSION}]")).unwrap();
        let err = set_at_path(&mut node, &path.segments, json!(1)).unwrap_err();
        assert_eq!(err, SetPathError::ArrayExtension);
        // nothing was allocated for the rejected write
        assert_eq!(node, json!({"a": []}));

        // indexes below the cap still pad with nulls
        let path = parse_path("$.a[3]").unwrap();
        set_at_path(&mut node, &path.segments, json!(1)).unwrap();
        assert_eq!(node, json!({"a": [null, null, null, 1]}));
    }

    #[test]
    fn set_rejects_shape_mismatches() {
        let mut node = json!({"a": 5});
        let path = parse_path("$.a.b").unwrap();
        assert!(set_at_path(&mut node, &path.segments, json!(1)).is_err());

        let mut node = json!({"a": {}});
        let path = parse_path("$.a[0]").unwrap();
        assert!(set_at_path(&mut node, &path.segments, json!(1)).is_err());
    }

    #[test]
    fn get_walks_paths() {
        let node = json!({"a": [{"b": 1}]});
        let path = parse_path("$.a[0].b").unwrap();
        assert_eq!(get_at_path(&node, &path.segments), Some(&json!(1)));
        let missing = parse_path("$.a[1].b").unwrap();
        assert_eq!(get_at_path(&node, &missing.segments), None);
    }
}
