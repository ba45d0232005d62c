//! Array/object builders, access helpers, and the `setPath` output helper.
//!
//! `push` and `setPath` are void functions that mutate through the live
//! handle they are given; a handle on `$in` or `$meta` is read-only and the
//! write is rejected.

use bigdecimal::BigDecimal;
use serde_json::Value as JsonValue;

use crate::error::JexError;
use crate::path::parse_path;
use crate::registry::FunctionRegistry;
use crate::stdlib::arg;
use crate::value::{JsonRef, Value};

pub(crate) fn install(registry: &mut FunctionRegistry) {
    registry.register_builtin("arr", 0, None, |_, args| {
        let items: Vec<JsonValue> = args.iter().map(Value::to_json).collect();
        Ok(Value::Json(JsonRef::new_root(JsonValue::Array(items))))
    });

    // obj(k1, v1, k2, v2, …); an odd trailing key is dropped
    registry.register_builtin("obj", 0, None, |_, args| {
        let mut map = serde_json::Map::with_capacity(args.len() / 2);
        for pair in args.chunks_exact(2) {
            map.insert(pair[0].coerce_string(), pair[1].to_json());
        }
        Ok(Value::Json(JsonRef::new_root(JsonValue::Object(map))))
    });

    registry.register_builtin_void("push", 2, Some(2), |_, args| {
        let Value::Json(handle) = arg(&args, 0) else {
            return Err(JexError::runtime("push target must be an array"));
        };
        // materialize the value before taking the mutable borrow: both
        // arguments may share a root
        let value = arg(&args, 1).to_json();
        handle
            .with_node_mut(|node| match node.as_array_mut() {
                Some(items) => {
                    items.push(value);
                    Ok(())
                }
                None => Err("push target must be an array".to_string()),
            })
            .map_err(JexError::runtime)?;
        Ok(Value::Null)
    });

    registry.register_builtin("first", 1, Some(1), |_, args| Ok(element_at(&arg(&args, 0), 0)));

    registry.register_builtin("last", 1, Some(1), |_, args| {
        let value = arg(&args, 0);
        match array_len(&value) {
            Some(len) if len > 0 => Ok(element_at(&value, len - 1)),
            _ => Ok(Value::Null),
        }
    });

    registry.register_builtin("count", 1, Some(1), |_, args| {
        let count = array_len(&arg(&args, 0)).unwrap_or(0);
        Ok(Value::Number(BigDecimal::from(count as u64)))
    });

    // indexBy(array, keyPath): keyPath is a JSONPath into each element;
    // duplicate keys keep the last element
    registry.register_builtin("indexBy", 2, Some(2), |_, args| {
        let source = arg(&args, 0);
        let key_path = arg(&args, 1).coerce_string();
        let items: Vec<JsonValue> = match &source {
            Value::Json(handle) => handle.with_value(|node| match node {
                Some(JsonValue::Array(items)) => items.clone(),
                _ => Vec::new(),
            }),
            _ => Vec::new(),
        };
        let mut map = serde_json::Map::new();
        for item in items {
            let key = jsonpath_lib::select(&item, &key_path)
                .map_err(|err| JexError::runtime(format!("invalid JSONPath `{key_path}`: {err}")))?
                .into_iter()
                .next()
                .map(|node| Value::from_json(node.clone()).coerce_string());
            if let Some(key) = key {
                map.insert(key, item);
            }
        }
        Ok(Value::Json(JsonRef::new_root(JsonValue::Object(map))))
    });

    registry.register_builtin("lookup", 2, Some(2), |_, args| {
        let Value::Json(handle) = arg(&args, 0) else {
            return Ok(Value::Null);
        };
        let key = arg(&args, 1).coerce_string();
        let exists = handle.with_value(|node| node.is_some_and(|n| n.get(&key).is_some()));
        Ok(if exists {
            Value::Json(handle.child_key(&key))
        } else {
            Value::Null
        })
    });

    // setPath(target, pathStr, value): the %set Form B semantics as a void
    // function, usable from expressions and host code
    registry.register_builtin_void("setPath", 3, Some(3), |_, args| {
        let Value::Json(handle) = arg(&args, 0) else {
            return Err(JexError::runtime("setPath target must be a JSON node"));
        };
        let path_text = arg(&args, 1).coerce_string();
        let parsed = parse_path(&path_text).map_err(JexError::runtime)?;
        let value = arg(&args, 2).to_json();
        handle
            .set_at(&parsed.segments, value)
            .map_err(|err| err.into_jex(&path_text))?;
        Ok(Value::Null)
    });
}

fn array_len(value: &Value) -> Option<usize> {
    match value {
        Value::Json(handle) => handle.with_value(|node| node.and_then(JsonValue::as_array).map(Vec::len)),
        _ => None,
    }
}

/// Live handle to `value[index]`, Null when out of range or not an array.
fn element_at(value: &Value, index: usize) -> Value {
    match value {
        Value::Json(handle) => {
            let in_range = handle.with_value(|node| {
                node.and_then(JsonValue::as_array)
                    .is_some_and(|items| index < items.len())
            });
            if in_range {
                Value::Json(handle.child_index(index))
            } else {
                Value::Null
            }
        }
        _ => Value::Null,
    }
}
