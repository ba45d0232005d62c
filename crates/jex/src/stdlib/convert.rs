//! Type conversion and inspection built-ins.

use serde_json::Value as JsonValue;

use crate::registry::FunctionRegistry;
use crate::stdlib::{arg, dates};
use crate::value::Value;

pub(crate) fn install(registry: &mut FunctionRegistry) {
    registry.register_builtin("toString", 1, Some(1), |_, args| {
        Ok(Value::Str(arg(&args, 0).coerce_string()))
    });

    registry.register_builtin("toNumber", 1, Some(1), |_, args| {
        Ok(Value::Number(arg(&args, 0).coerce_number()))
    });

    registry.register_builtin("toBool", 1, Some(1), |_, args| {
        Ok(Value::Bool(arg(&args, 0).coerce_bool()))
    });

    registry.register_builtin("toDate", 1, Some(1), |_, args| {
        let value = arg(&args, 0).unwrap_scalar();
        Ok(match value {
            Value::DateTime(dt) => Value::DateTime(dt),
            Value::Str(text) => dates::parse_default(&text).map_or(Value::Null, Value::DateTime),
            _ => Value::Null,
        })
    });

    registry.register_builtin("isNull", 1, Some(1), |_, args| {
        Ok(Value::Bool(matches!(arg(&args, 0).unwrap_scalar(), Value::Null)))
    });

    registry.register_builtin("isEmpty", 1, Some(1), |_, args| {
        let empty = match arg(&args, 0) {
            Value::Null => true,
            Value::Str(s) => s.is_empty(),
            Value::Json(handle) => handle.with_value(|node| match node {
                None | Some(JsonValue::Null) => true,
                Some(JsonValue::String(s)) => s.is_empty(),
                Some(JsonValue::Array(items)) => items.is_empty(),
                Some(JsonValue::Object(map)) => map.is_empty(),
                Some(_) => false,
            }),
            _ => false,
        };
        Ok(Value::Bool(empty))
    });

    registry.register_builtin("typeOf", 1, Some(1), |_, args| {
        Ok(Value::Str(arg(&args, 0).type_name().to_string()))
    });
}
