//! The JSON-in-string preprocessor.
//!
//! A pure transformation over a JSON tree, independent of script execution:
//! string leaves that look like serialized JSON (`{…}` or `[…]` after
//! trimming) are parsed and replaced in place, recursing into the
//! replacement. Strings that fail to parse directly are unescaped one layer
//! at a time (re-read as a JSON string literal) and retried, up to
//! `max_depth_per_string` layers. The traversal is budgeted: nodes visited
//! and total replacements both raise `LimitExceeded` when exhausted.
//!
//! The input is never mutated; the transformed tree is a clone.

use serde_json::Value as JsonValue;

use crate::error::{JexError, JexResult, LimitKind};

/// Options for [`normalize`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct NormalizerOptions {
    /// How many unescape layers to attempt per string.
    pub max_depth_per_string: u32,
    /// Budget of nodes visited across the whole traversal.
    pub max_nodes_visited: u64,
    /// Budget of string-to-JSON replacements.
    pub max_total_replacements: u64,
    /// Strings longer than this are not attempted.
    pub max_string_length: usize,
    /// When true, a string that looks like JSON but never parses is an error.
    pub strict: bool,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            max_depth_per_string: 5,
            max_nodes_visited: 250_000,
            max_total_replacements: 50_000,
            max_string_length: 256_000,
            strict: false,
        }
    }
}

#[derive(Debug, Default)]
struct Budgets {
    nodes_visited: u64,
    replacements: u64,
}

/// Applies the preprocessor to a clone of `input` and returns the clone.
pub fn normalize(input: &JsonValue, options: &NormalizerOptions) -> JexResult<JsonValue> {
    let mut clone = input.clone();
    let mut budgets = Budgets::default();
    visit(&mut clone, options, &mut budgets)?;
    log::trace!(
        "normalizer visited {} nodes, made {} replacements",
        budgets.nodes_visited,
        budgets.replacements
    );
    Ok(clone)
}

fn visit(node: &mut JsonValue, options: &NormalizerOptions, budgets: &mut Budgets) -> JexResult<()> {
    budgets.nodes_visited += 1;
    if budgets.nodes_visited > options.max_nodes_visited {
        return Err(JexError::limit(LimitKind::MaxNodesVisited, options.max_nodes_visited));
    }
    match node {
        JsonValue::Object(map) => {
            for value in map.values_mut() {
                visit(value, options, budgets)?;
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                visit(item, options, budgets)?;
            }
        }
        JsonValue::String(_) => try_expand_string(node, options, budgets)?,
        _ => {}
    }
    Ok(())
}

/// Candidate check: trimmed length at least 2 with matching container
/// brackets at both ends.
fn is_candidate(text: &str, options: &NormalizerOptions) -> bool {
    if text.len() > options.max_string_length {
        return false;
    }
    let trimmed = text.trim();
    let bytes = trimmed.as_bytes();
    trimmed.len() >= 2
        && matches!(
            (bytes[0], bytes[trimmed.len() - 1]),
            (b'{', b'}') | (b'[', b']')
        )
}

fn try_expand_string(node: &mut JsonValue, options: &NormalizerOptions, budgets: &mut Budgets) -> JexResult<()> {
    let JsonValue::String(text) = &*node else {
        return Ok(());
    };
    if !is_candidate(text, options) {
        return Ok(());
    }

    let mut candidate = text.trim().to_string();
    let mut parsed = None;
    for _ in 0..=options.max_depth_per_string {
        match serde_json::from_str::<JsonValue>(&candidate) {
            Ok(value) => {
                parsed = Some(value);
                break;
            }
            Err(_) => {
                // unescape one layer by re-reading the text as the content
                // of a JSON string literal
                match serde_json::from_str::<String>(&format!("\"{candidate}\"")) {
                    Ok(inner) => candidate = inner,
                    Err(_) => break,
                }
            }
        }
    }

    let Some(parsed) = parsed else {
        if options.strict {
            return Err(JexError::runtime(format!(
                "string looks like JSON but failed to parse after {} unescape layer(s)",
                options.max_depth_per_string
            )));
        }
        return Ok(());
    };

    budgets.replacements += 1;
    if budgets.replacements > options.max_total_replacements {
        return Err(JexError::limit(
            LimitKind::MaxTotalReplacements,
            options.max_total_replacements,
        ));
    }
    *node = parsed;
    // the replacement counts as fresh nodes and may hold more encoded JSON
    visit(node, options, budgets)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn expands_simple_embedded_json() {
        let input = json!({"data": "{\"x\":1}"});
        let output = normalize(&input, &NormalizerOptions::default()).unwrap();
        assert_eq!(output, json!({"data": {"x": 1}}));
        // the argument is untouched
        assert_eq!(input, json!({"data": "{\"x\":1}"}));
    }

    #[test]
    fn unescapes_layers_up_to_depth() {
        let input = json!({"data": "{\\\"x\\\":1}"});
        let output = normalize(&input, &NormalizerOptions::default()).unwrap();
        assert_eq!(output, json!({"data": {"x": 1}}));

        let shallow = NormalizerOptions {
            max_depth_per_string: 0,
            ..NormalizerOptions::default()
        };
        let output = normalize(&input, &shallow).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn node_budget_raises() {
        let input = json!({"a": 1, "b": 2, "c": 3, "d": 4, "e": 5});
        let options = NormalizerOptions {
            max_nodes_visited: 3,
            ..NormalizerOptions::default()
        };
        let err = normalize(&input, &options).unwrap_err();
        let JexError::Limit(limit) = err else {
            panic!("expected a limit error, got {err}");
        };
        assert_eq!(limit.kind(), LimitKind::MaxNodesVisited);
        assert_eq!(limit.limit(), 3);
    }

    #[test]
    fn replacement_budget_raises() {
        let input = json!(["{\"x\":1}", "{\"y\":2}"]);
        let options = NormalizerOptions {
            max_total_replacements: 1,
            ..NormalizerOptions::default()
        };
        assert!(matches!(normalize(&input, &options), Err(JexError::Limit(_))));
    }

    #[test]
    fn oversized_strings_are_skipped() {
        let big = format!("{{\"k\":\"{}\"}}", "a".repeat(64));
        let input = json!({"data": big.clone()});
        let options = NormalizerOptions {
            max_string_length: 16,
            ..NormalizerOptions::default()
        };
        let output = normalize(&input, &options).unwrap();
        assert_eq!(output, json!({"data": big}));
    }

    #[test]
    fn strict_mode_raises_on_unparseable_candidates() {
        let input = json!({"data": "{not json}"});
        let options = NormalizerOptions {
            strict: true,
            ..NormalizerOptions::default()
        };
        assert!(matches!(normalize(&input, &options), Err(JexError::Runtime(_))));
        // lenient mode leaves it unchanged
        assert_eq!(
            normalize(&input, &NormalizerOptions::default()).unwrap(),
            json!({"data": "{not json}"})
        );
    }

    #[test]
    fn idempotent_when_no_limit_is_hit() {
        let input = json!({"data": "{\"x\":\"{\\\"y\\\":2}\"}", "plain": [1, 2]});
        let options = NormalizerOptions::default();
        let once = normalize(&input, &options).unwrap();
        let twice = normalize(&once, &options).unwrap();
        assert_eq!(once, twice);
    }
}
