//! The standalone JSON-in-string preprocessor.

use jex::{JexError, LimitKind, NormalizerOptions, normalize};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn parses_embedded_documents() {
    let input = json!({"data": "{\"x\":1}"});
    let output = normalize(&input, &NormalizerOptions::default()).unwrap();
    assert_eq!(output, json!({"data": {"x": 1}}));
}

#[test]
fn node_limit_raises() {
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
}

#[test]
fn nested_and_escaped_layers() {
    // the embedded document itself embeds another, one escape layer deeper
    let input = json!({"outer": "{\"inner\": \"{\\\"deep\\\": true}\"}"});
    let output = normalize(&input, &NormalizerOptions::default()).unwrap();
    assert_eq!(output, json!({"outer": {"inner": {"deep": true}}}));
}

#[test]
fn arrays_are_traversed() {
    let input = json!(["[1,2]", "plain", 7]);
    let output = normalize(&input, &NormalizerOptions::default()).unwrap();
    assert_eq!(output, json!([[1, 2], "plain", 7]));
}

#[test]
fn does_not_mutate_its_argument() {
    let input = json!({"data": "{\"x\":1}"});
    let before = input.clone();
    let _ = normalize(&input, &NormalizerOptions::default()).unwrap();
    assert_eq!(input, before);
}

#[test]
fn running_twice_is_the_same_as_once() {
    let input = json!({
        "a": "{\"nested\": \"{\\\"n\\\": 1}\"}",
        "b": ["[true]", "{oops"],
        "c": 3
    });
    let options = NormalizerOptions::default();
    let once = normalize(&input, &options).unwrap();
    let twice = normalize(&once, &options).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn non_candidates_survive() {
    let input = json!({
        "short": "{",
        "quoted": "\"just a string\"",
        "braceless": "x:1",
        "num": 12
    });
    let output = normalize(&input, &NormalizerOptions::default()).unwrap();
    // only `{…}`/`[…]` shaped strings are candidates for the normalizer
    assert_eq!(output, input);
}
