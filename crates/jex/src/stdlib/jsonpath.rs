//! JSONPath built-ins: `jp1`, `jpAll`, `coalescePath`, `existsPath`.
//!
//! These are the read side of path handling and accept the full JSONPath
//! dialect of the query engine (wildcards, recursive descent, filters). All
//! of them only ever read their argument.

use serde_json::Value as JsonValue;

use crate::error::{JexError, JexResult};
use crate::registry::FunctionRegistry;
use crate::stdlib::arg;
use crate::value::{JsonRef, Value};

pub(crate) fn install(registry: &mut FunctionRegistry) {
    registry.register_builtin("jp1", 2, Some(2), |_, args| {
        let matches = select(&arg(&args, 0), &arg(&args, 1).coerce_string())?;
        Ok(matches.into_iter().next().map_or(Value::Null, Value::from_json))
    });

    registry.register_builtin("jpAll", 2, Some(2), |_, args| {
        let matches = select(&arg(&args, 0), &arg(&args, 1).coerce_string())?;
        Ok(Value::Json(JsonRef::new_root(JsonValue::Array(matches))))
    });

    registry.register_builtin("coalescePath", 2, None, |_, args| {
        let source = arg(&args, 0);
        for path in &args[1..] {
            let matches = select(&source, &path.coerce_string())?;
            if let Some(node) = matches.into_iter().next()
                && !node.is_null()
            {
                return Ok(Value::from_json(node));
            }
        }
        Ok(Value::Null)
    });

    registry.register_builtin("existsPath", 2, Some(2), |_, args| {
        // present counts, even when the present node is JSON null
        let matches = select(&arg(&args, 0), &arg(&args, 1).coerce_string())?;
        Ok(Value::Bool(!matches.is_empty()))
    });
}

/// Runs a JSONPath query against the JSON form of `value`.
fn select(value: &Value, path: &str) -> JexResult<Vec<JsonValue>> {
    let query = |node: &JsonValue| {
        jsonpath_lib::select(node, path)
            .map(|nodes| nodes.into_iter().cloned().collect::<Vec<_>>())
            .map_err(|err| JexError::runtime(format!("invalid JSONPath `{path}`: {err}")))
    };
    match value {
        Value::Json(handle) => handle.with_value(|node| query(node.unwrap_or(&JsonValue::Null))),
        Value::Null => Ok(Vec::new()),
        other => query(&other.to_json()),
    }
}
