//! Library loading and call-resolution order.

use jex::{Engine, ExecutionOptions, JexError};
use pretty_assertions::assert_eq;
use serde_json::json;

const HELPERS: &str = r#"
%func greet(name);
    %return concat("hello ", &name);
%endfunc;

%func shadowed();
    %return "from-library";
%endfunc;
"#;

#[test]
fn load_library_reports_declared_functions() {
    let mut engine = Engine::new();
    let info = engine.load_library("helpers", HELPERS).unwrap();
    assert_eq!(info.name, "helpers");
    let mut functions = info.functions.clone();
    functions.sort();
    assert_eq!(functions, vec!["greet", "shadowed"]);
    assert!(engine.library("helpers").is_some());
}

#[test]
fn load_library_from_reader() {
    let mut engine = Engine::new();
    let info = engine
        .load_library_from_reader("streamed", HELPERS.as_bytes())
        .unwrap();
    assert_eq!(info.name, "streamed");
}

#[test]
fn library_functions_are_callable_from_scripts() {
    let mut engine = Engine::new();
    engine.load_library("helpers", HELPERS).unwrap();
    let output = engine
        .execute(
            r#"%set $.msg = greet("world");"#,
            json!({}),
            &ExecutionOptions::default(),
        )
        .unwrap();
    assert_eq!(output, json!({"msg": "hello world"}));
}

#[test]
fn script_functions_shadow_library_functions() {
    let mut engine = Engine::new();
    engine.load_library("helpers", HELPERS).unwrap();
    let script = r#"
%func shadowed();
    %return "from-script";
%endfunc;
%set $.who = shadowed();
"#;
    let output = engine
        .execute(script, json!({}), &ExecutionOptions::default())
        .unwrap();
    assert_eq!(output, json!({"who": "from-script"}));
}

#[test]
fn libraries_shadow_the_engine_registry() {
    let mut engine = Engine::new();
    // `trim` normally comes from the standard library
    engine
        .load_library("override", "%func trim(s); %return \"overridden\"; %endfunc;")
        .unwrap();
    let output = engine
        .execute(
            r#"%set $.t = trim("  x  ");"#,
            json!({}),
            &ExecutionOptions::default(),
        )
        .unwrap();
    assert_eq!(output, json!({"t": "overridden"}));
}

#[test]
fn earlier_libraries_win() {
    let mut engine = Engine::new();
    engine
        .load_library("first", "%func pick(); %return 1; %endfunc;")
        .unwrap();
    engine
        .load_library("second", "%func pick(); %return 2; %endfunc;")
        .unwrap();
    let output = engine
        .execute("%set $.n = pick();", json!({}), &ExecutionOptions::default())
        .unwrap();
    assert_eq!(output, json!({"n": 1}));
}

#[test]
fn library_sources_are_function_only() {
    let mut engine = Engine::new();
    let err = engine
        .load_library("bad", "%let x = 1; %func f(); %return 1; %endfunc;")
        .unwrap_err();
    assert!(matches!(err, JexError::Compile(_)), "got {err}");

    let err = engine.load_library("empty", "// nothing\n").unwrap_err();
    assert!(matches!(err, JexError::Compile(_)), "got {err}");
}

#[test]
fn duplicate_library_names_are_rejected() {
    let mut engine = Engine::new();
    engine.load_library("dup", HELPERS).unwrap();
    let err = engine.load_library("dup", HELPERS).unwrap_err();
    assert!(err.to_string().contains("dup"), "got {err}");
}

#[test]
fn library_functions_count_against_recursion_depth() {
    let mut engine = Engine::new();
    engine
        .load_library("loops", "%func spin(); %return spin(); %endfunc;")
        .unwrap();
    let err = engine
        .execute(
            "%set $.x = spin();",
            json!({}),
            &ExecutionOptions::default().max_recursion_depth(5),
        )
        .unwrap_err();
    assert!(matches!(err, JexError::Limit(_)), "got {err}");
}
