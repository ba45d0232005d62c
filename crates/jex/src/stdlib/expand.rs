//! `expandJson` / `expandJsonAll`: parse JSON embedded in string values.
//!
//! Both operate on a deep clone of their argument and replace parseable
//! string leaves with the parsed node, recursing into replacements. The
//! depth budget counts nested string-parse layers along one chain: parsing a
//! string costs one level, walking into containers costs nothing.

use bigdecimal::RoundingMode;
use num_traits::ToPrimitive;
use serde_json::Value as JsonValue;

use crate::path::parse_path;
use crate::registry::FunctionRegistry;
use crate::stdlib::arg;
use crate::value::{JsonRef, Value};

const DEFAULT_MAX_DEPTH: u32 = 10;

pub(crate) fn install(registry: &mut FunctionRegistry) {
    // expandJson(json, pathStr [, maxDepth]): expand the one string at path
    registry.register_builtin("expandJson", 2, Some(3), |_, args| {
        let mut clone = arg(&args, 0).to_json();
        let path_text = arg(&args, 1).coerce_string();
        let max_depth = depth_arg(&args, 2);
        if let Ok(parsed) = parse_path(&path_text)
            && let Some(node) = crate::path::get_at_path_mut(&mut clone, &parsed.segments)
        {
            expand_strings(node, max_depth);
        }
        Ok(Value::Json(JsonRef::new_root(clone)))
    });

    // expandJsonAll(json [, maxDepth]): walk everything
    registry.register_builtin("expandJsonAll", 1, Some(2), |_, args| {
        let mut clone = arg(&args, 0).to_json();
        let max_depth = depth_arg(&args, 1);
        expand_strings(&mut clone, max_depth);
        Ok(Value::Json(JsonRef::new_root(clone)))
    });
}

fn depth_arg(args: &[Value], index: usize) -> u32 {
    args.get(index)
        .and_then(|v| {
            v.coerce_number()
                .with_scale_round(0, RoundingMode::Down)
                .to_u32()
        })
        .unwrap_or(DEFAULT_MAX_DEPTH)
}

/// True when the trimmed text could be a JSON document or string literal.
fn looks_like_json(text: &str) -> bool {
    matches!(text.trim_start().chars().next(), Some('{' | '[' | '"'))
}

/// Recursively expands parseable string leaves in place. `budget` is the
/// number of string-parse layers still allowed on this chain.
fn expand_strings(node: &mut JsonValue, budget: u32) {
    match node {
        JsonValue::String(text) => {
            if budget == 0 || !looks_like_json(text) {
                return;
            }
            if let Ok(parsed) = serde_json::from_str::<JsonValue>(text.trim()) {
                *node = parsed;
                // the replacement may itself contain (or be) encoded JSON
                expand_strings(node, budget - 1);
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                expand_strings(item, budget);
            }
        }
        JsonValue::Object(map) => {
            for value in map.values_mut() {
                expand_strings(value, budget);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn expands_nested_layers_up_to_budget() {
        let mut node = json!({"data": "{\"x\": \"{\\\"y\\\": 1}\"}"});
        expand_strings(&mut node, 2);
        assert_eq!(node, json!({"data": {"x": {"y": 1}}}));

        let mut node = json!({"data": "{\"x\": \"{\\\"y\\\": 1}\"}"});
        expand_strings(&mut node, 1);
        assert_eq!(node, json!({"data": {"x": "{\"y\": 1}"}}));
    }

    #[test]
    fn leaves_plain_strings_alone() {
        let mut node = json!({"a": "hello", "b": 5});
        expand_strings(&mut node, 10);
        assert_eq!(node, json!({"a": "hello", "b": 5}));
    }

    #[test]
    fn quoted_string_unescapes_one_layer() {
        // a JSON string literal containing an escaped object
        let mut node = json!("\"{\\\"x\\\": 1}\"");
        expand_strings(&mut node, 2);
        assert_eq!(node, json!({"x": 1}));
    }
}
