//! String built-ins.
//!
//! Substring operations are character-based, matching `length`'s char-count
//! contract. The regex functions compile per call with a backtrack budget
//! derived from `regex_timeout_ms` and check elapsed wall-clock afterwards;
//! blowing either budget is the regex-timeout runtime error.

use std::time::Instant;

use fancy_regex::{Captures, Regex, RegexBuilder};
use serde_json::Value as JsonValue;

use crate::error::{JexError, JexResult};
use crate::registry::FunctionRegistry;
use crate::stdlib::arg;
use crate::value::{JsonRef, Value};

/// Backtrack steps granted per millisecond of regex budget.
const BACKTRACK_STEPS_PER_MS: usize = 10_000;

pub(crate) fn install(registry: &mut FunctionRegistry) {
    registry.register_builtin("trim", 1, Some(1), |_, args| {
        Ok(Value::Str(arg(&args, 0).coerce_string().trim().to_string()))
    });

    registry.register_builtin("lower", 1, Some(1), |_, args| {
        Ok(Value::Str(arg(&args, 0).coerce_string().to_lowercase()))
    });

    registry.register_builtin("upper", 1, Some(1), |_, args| {
        Ok(Value::Str(arg(&args, 0).coerce_string().to_uppercase()))
    });

    registry.register_builtin("substr", 2, Some(3), |_, args| {
        let text = arg(&args, 0).coerce_string();
        let chars: Vec<char> = text.chars().collect();
        let start = to_index(&arg(&args, 1)).clamp(0, chars.len() as i64) as usize;
        let taken = match args.get(2) {
            None => chars[start..].iter().collect(),
            Some(len) => {
                let len = to_index(len);
                if len <= 0 {
                    String::new()
                } else {
                    chars[start..].iter().take(len as usize).collect()
                }
            }
        };
        Ok(Value::Str(taken))
    });

    registry.register_builtin("left", 2, Some(2), |_, args| {
        let text = arg(&args, 0).coerce_string();
        let n = to_index(&arg(&args, 1)).max(0) as usize;
        Ok(Value::Str(text.chars().take(n).collect()))
    });

    registry.register_builtin("right", 2, Some(2), |_, args| {
        let text = arg(&args, 0).coerce_string();
        let n = to_index(&arg(&args, 1)).max(0) as usize;
        let chars: Vec<char> = text.chars().collect();
        let skip = chars.len().saturating_sub(n);
        Ok(Value::Str(chars[skip..].iter().collect()))
    });

    registry.register_builtin("split", 2, Some(2), |_, args| {
        let text = arg(&args, 0).coerce_string();
        let delim = arg(&args, 1).coerce_string();
        let parts: Vec<JsonValue> = if delim.is_empty() {
            vec![JsonValue::String(text)]
        } else {
            text.split(&delim).map(|p| JsonValue::String(p.to_string())).collect()
        };
        Ok(Value::Json(JsonRef::new_root(JsonValue::Array(parts))))
    });

    registry.register_builtin("join", 2, Some(2), |_, args| {
        let delim = arg(&args, 1).coerce_string();
        let source = arg(&args, 0);
        let joined = match &source {
            Value::Json(handle) => handle.with_value(|node| match node {
                Some(JsonValue::Array(items)) => items
                    .iter()
                    .map(|item| Value::from_json(item.clone()).coerce_string())
                    .collect::<Vec<_>>()
                    .join(&delim),
                _ => source.coerce_string(),
            }),
            other => other.coerce_string(),
        };
        Ok(Value::Str(joined))
    });

    registry.register_builtin("replace", 3, Some(3), |_, args| {
        let text = arg(&args, 0).coerce_string();
        let find = arg(&args, 1).coerce_string();
        let replacement = arg(&args, 2).coerce_string();
        if find.is_empty() {
            return Ok(Value::Str(text));
        }
        Ok(Value::Str(text.replace(&find, &replacement)))
    });

    registry.register_builtin("regexMatch", 2, Some(2), |ctx, args| {
        let text = arg(&args, 0).coerce_string();
        let pattern = arg(&args, 1).coerce_string();
        let budget = RegexBudget::start(ctx.options().regex_timeout_ms);
        let regex = budget.compile(&pattern)?;
        let matched = regex.is_match(&text).map_err(map_regex_error)?;
        budget.check_elapsed()?;
        Ok(Value::Bool(matched))
    });

    registry.register_builtin("regexReplace", 3, Some(3), |ctx, args| {
        let text = arg(&args, 0).coerce_string();
        let pattern = arg(&args, 1).coerce_string();
        let replacement = arg(&args, 2).coerce_string();
        let budget = RegexBudget::start(ctx.options().regex_timeout_ms);
        let regex = budget.compile(&pattern)?;
        let replaced = replace_all(&regex, &text, &replacement)?;
        budget.check_elapsed()?;
        Ok(Value::Str(replaced))
    });

    registry.register_builtin("concat", 0, None, |_, args| {
        let mut out = String::new();
        for value in &args {
            out.push_str(&value.coerce_string());
        }
        Ok(Value::Str(out))
    });

    registry.register_builtin("length", 1, Some(1), |_, args| {
        let len: usize = match arg(&args, 0) {
            Value::Str(s) => s.chars().count(),
            Value::Json(handle) => handle.with_value(|node| match node {
                Some(JsonValue::String(s)) => s.chars().count(),
                Some(JsonValue::Array(items)) => items.len(),
                Some(JsonValue::Object(map)) => map.len(),
                _ => 0,
            }),
            _ => 0,
        };
        Ok(Value::Number(bigdecimal::BigDecimal::from(len as u64)))
    });
}

fn to_index(value: &Value) -> i64 {
    use bigdecimal::RoundingMode;
    use num_traits::ToPrimitive;
    value
        .coerce_number()
        .with_scale_round(0, RoundingMode::Down)
        .to_i64()
        .unwrap_or(0)
}

/// Per-call regex budget: a backtrack limit at compile time plus a wall-clock
/// check after the operation.
struct RegexBudget {
    started: Instant,
    timeout_ms: u64,
}

impl RegexBudget {
    fn start(timeout_ms: u64) -> Self {
        Self {
            started: Instant::now(),
            timeout_ms,
        }
    }

    fn compile(&self, pattern: &str) -> JexResult<Regex> {
        let limit = (self.timeout_ms.max(1) as usize).saturating_mul(BACKTRACK_STEPS_PER_MS);
        RegexBuilder::new(pattern)
            .backtrack_limit(limit)
            .build()
            .map_err(|err| JexError::runtime(format!("invalid regex pattern: {err}")))
    }

    fn check_elapsed(&self) -> JexResult<()> {
        if self.started.elapsed().as_millis() as u64 > self.timeout_ms {
            return Err(JexError::runtime(format!(
                "regex timeout exceeded ({} ms)",
                self.timeout_ms
            )));
        }
        Ok(())
    }
}

fn map_regex_error(err: fancy_regex::Error) -> JexError {
    if matches!(
        err,
        fancy_regex::Error::RuntimeError(fancy_regex::RuntimeError::BacktrackLimitExceeded)
    ) {
        JexError::runtime("regex timeout exceeded (backtrack limit)")
    } else {
        JexError::runtime(format!("regex evaluation failed: {err}"))
    }
}

/// Replaces every match, expanding group references in the template.
fn replace_all(regex: &Regex, text: &str, replacement: &str) -> JexResult<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for captures in regex.captures_iter(text) {
        let captures = captures.map_err(map_regex_error)?;
        let whole = captures.get(0).expect("group 0 always exists");
        out.push_str(&text[last..whole.start()]);
        expand_template(&mut out, replacement, &captures);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Expands `$1`, `${name}`, and `$$` in a replacement template. Unknown or
/// unmatched groups expand to nothing.
fn expand_template(out: &mut String, template: &str, captures: &Captures<'_>) {
    let chars: Vec<char> = template.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '$' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        i += 1;
        match chars.get(i) {
            Some('$') => {
                out.push('$');
                i += 1;
            }
            Some('{') => {
                i += 1;
                let start = i;
                while i < chars.len() && chars[i] != '}' {
                    i += 1;
                }
                if i >= chars.len() {
                    out.push_str("${");
                    out.extend(chars[start..].iter());
                    break;
                }
                let name: String = chars[start..i].iter().collect();
                i += 1;
                push_group(out, captures, &name);
            }
            Some(c) if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let index: String = chars[start..i].iter().collect();
                push_group(out, captures, &index);
            }
            _ => out.push('$'),
        }
    }
}

fn push_group(out: &mut String, captures: &Captures<'_>, name: &str) {
    let group = match name.parse::<usize>() {
        Ok(index) => captures.get(index),
        Err(_) => captures.name(name),
    };
    if let Some(group) = group {
        out.push_str(group.as_str());
    }
}
