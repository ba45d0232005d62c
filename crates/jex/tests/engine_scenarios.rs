//! End-to-end scenarios: whole scripts over literal inputs.

use jex::{Engine, ExecutionOptions, JexError, LimitKind};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn run(script: &str, input: Value) -> Value {
    Engine::new()
        .execute(script, input, &ExecutionOptions::default())
        .unwrap()
}

// === Shopping cart to order summary ===

const CART_SCRIPT: &str = r#"
%let subtotal = 0;
%let itemCount = 0;
%foreach item %in $.items %do;
    %let subtotal = &subtotal + &item.price * &item.quantity;
    %let itemCount = &itemCount + &item.quantity;
%end;

%let discount = 0;
%if (&subtotal >= 100) %then %do;
    %let discount = round(&subtotal * 0.1, 2);
%end;
%let total = &subtotal - &discount;

%set $.orderId = jp1($in, "$.order.id");
%set $.customerName = jp1($in, "$.order.customer.name");
%set $.itemCount = &itemCount;
%set $.subtotal = &subtotal;
%set $.discount = &discount;
%set $.total = &total;
%set $.qualifiesForFreeShipping = &total >= 100;
"#;

#[test]
fn shopping_cart_to_order_summary() {
    let input = json!({
        "order": {"id": "ORD-12345", "customer": {"name": "Jane Doe"}},
        "items": [
            {"name": "Widget", "price": 29.99, "quantity": 2},
            {"name": "Gadget", "price": 9.99, "quantity": 3},
            {"name": "Gizmo", "price": 65.02, "quantity": 1}
        ]
    });
    let output = run(CART_SCRIPT, input);
    assert_eq!(
        output,
        json!({
            "orderId": "ORD-12345",
            "customerName": "Jane Doe",
            "itemCount": 6,
            "subtotal": 154.97,
            "discount": 15.50,
            "total": 139.47,
            "qualifiesForFreeShipping": true
        })
    );
}

// === Loop limit ===

#[test]
fn do_loop_hits_iteration_limit() {
    let engine = Engine::new();
    let options = ExecutionOptions::default().max_loop_iterations(100);
    let err = engine
        .execute("%do i = 1 %to 1000000; %let x = &i; %end;", json!({}), &options)
        .unwrap_err();
    let JexError::Limit(limit) = err else {
        panic!("expected a limit error, got {err}");
    };
    assert_eq!(limit.kind(), LimitKind::MaxLoopIterations);
    assert_eq!(limit.kind().to_string(), "MaxLoopIterations");
    assert_eq!(limit.limit(), 100);
}

// === Break / continue ===

#[test]
fn break_stops_after_three_iterations() {
    let script = r"
%let count = 0;
%foreach num %in $.numbers %do;
    %let count = &count + 1;
    %if (&num == 3) %then %do;
        %break;
    %end;
%end;
%set $.iterations = &count;
";
    let output = run(script, json!({"numbers": [1, 2, 3, 4, 5]}));
    assert_eq!(output, json!({"iterations": 3}));
}

#[test]
fn continue_skips_the_matching_element() {
    let script = r"
%let sum = 0;
%foreach num %in $.numbers %do;
    %if (&num == 3) %then %do;
        %continue;
    %end;
    %let sum = &sum + &num;
%end;
%set $.sum = &sum;
";
    let output = run(script, json!({"numbers": [1, 2, 3, 4, 5]}));
    assert_eq!(output, json!({"sum": 12}));
}

// === Recursion ===

#[test]
fn recursive_factorial() {
    let script = r"
%func factorial(n);
    %if (&n <= 1) %then %do;
        %return 1;
    %end;
    %return &n * factorial(&n - 1);
%endfunc;
%set $.result = factorial(5);
";
    assert_eq!(run(script, json!({})), json!({"result": 120}));
}

#[test]
fn unbounded_recursion_hits_depth_limit() {
    let engine = Engine::new();
    let options = ExecutionOptions::default().max_recursion_depth(10);
    let err = engine
        .execute(
            "%func f(); %return f(); %endfunc; %set $.x = f();",
            json!({}),
            &options,
        )
        .unwrap_err();
    let JexError::Limit(limit) = err else {
        panic!("expected a limit error, got {err}");
    };
    assert_eq!(limit.kind(), LimitKind::MaxRecursionDepth);
    assert_eq!(limit.limit(), 10);
}

// === Foreach shapes ===

#[test]
fn foreach_over_null_and_single_values() {
    let script = r"
%let count = 0;
%foreach item %in $.maybe %do;
    %let count = &count + 1;
%end;
%set $.count = &count;
";
    assert_eq!(run(script, json!({})), json!({"count": 0}));
    assert_eq!(run(script, json!({"maybe": null})), json!({"count": 0}));
    assert_eq!(run(script, json!({"maybe": {"one": 1}})), json!({"count": 1}));
    assert_eq!(run(script, json!({"maybe": [1, 2, 3]})), json!({"count": 3}));
}

// === Set forms ===

#[test]
fn set_form_a_builds_nested_output() {
    let script = r#"
%set $.a.b[1].c = 5;
%set $out.top = "x";
"#;
    assert_eq!(
        run(script, json!({})),
        json!({"a": {"b": [null, {"c": 5}]}, "top": "x"})
    );
}

#[test]
fn set_form_b_mutates_a_variable_target() {
    let script = r#"
%let t = obj("keep", 1);
%set &t, "nested.deep", 2;
%set $.result = &t;
"#;
    assert_eq!(
        run(script, json!({})),
        json!({"result": {"keep": 1, "nested": {"deep": 2}}})
    );
}

#[test]
fn writes_to_input_are_rejected() {
    let engine = Engine::new();
    let err = engine
        .execute("%set $in.x = 1;", json!({}), &ExecutionOptions::default())
        .unwrap_err();
    assert!(matches!(err, JexError::Runtime(_)), "got {err}");

    // the same through a Form B handle on $in
    let err = engine
        .execute(
            r#"%set $in, "x", 1;"#,
            json!({}),
            &ExecutionOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, JexError::Runtime(_)), "got {err}");
}

// === Scope discipline ===

#[test]
fn function_locals_do_not_leak_to_the_caller() {
    let script = r"
%let x = 1;
%func f();
    %let x = 99;
    %return 0;
%endfunc;
%let ignored = f();
%set $.x = &x;
";
    assert_eq!(run(script, json!({})), json!({"x": 1}));
}

#[test]
fn loop_let_updates_the_outer_binding() {
    let script = r"
%let last = 0;
%foreach n %in $.numbers %do;
    %let last = &n;
%end;
%set $.last = &last;
";
    assert_eq!(run(script, json!({"numbers": [7, 8, 9]})), json!({"last": 9}));
}

// === Operators ===

#[test]
fn division_and_modulo_by_zero_yield_zero() {
    let script = "%set $.div = 10 / 0; %set $.rem = 10 % 0;";
    assert_eq!(run(script, json!({})), json!({"div": 0, "rem": 0}));

    let engine = Engine::new();
    let strict = ExecutionOptions::default().strict(true);
    assert!(engine.execute("%set $.d = 1 / 0;", json!({}), &strict).is_err());
}

#[test]
fn plus_concatenates_when_either_side_is_a_string() {
    let script = r#"
%set $.cat = "n=" + 4;
%set $.sum = 4 + 1.5;
"#;
    assert_eq!(run(script, json!({})), json!({"cat": "n=4", "sum": 5.5}));
}

#[test]
fn mixed_kind_equality_compares_string_coercions() {
    let script = r#"
%set $.numStr = 1 == "1";
%set $.jsonNum = jp1($in, "$.n") == 3;
%set $.nullVsEmpty = null == "";
"#;
    assert_eq!(
        run(script, json!({"n": 3})),
        json!({"numStr": true, "jsonNum": true, "nullVsEmpty": false})
    );
}

#[test]
fn short_circuit_skips_the_right_side() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let mut engine = Engine::new();
    engine.register_function("bump", 0, Some(0), move |_, _| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(jex::Value::Bool(true))
    });
    let script = r"
%let a = false && bump();
%let b = true || bump();
%set $.done = true;
";
    let output = engine
        .execute(script, json!({}), &ExecutionOptions::default())
        .unwrap();
    assert_eq!(output, json!({"done": true}));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// === Macro expansion ===

#[test]
fn string_literals_expand_variable_references() {
    let script = r#"
%let name = "Jane";
%set $.greeting = "Hello &name!";
%set $.missing = "[&nope]";
%set $.literalAmp = "a & b";
"#;
    assert_eq!(
        run(script, json!({})),
        json!({"greeting": "Hello Jane!", "missing": "[]", "literalAmp": "a & b"})
    );
}

#[test]
fn strict_mode_rejects_unknown_variables() {
    let engine = Engine::new();
    let strict = ExecutionOptions::default().strict(true);
    assert!(engine.execute("%set $.x = &nope;", json!({}), &strict).is_err());
    assert!(
        engine
            .execute(r#"%set $.x = "hi &nope";"#, json!({}), &strict)
            .is_err()
    );
    // lenient mode reads Null
    assert_eq!(
        run("%set $.x = &nope == null;", json!({})),
        json!({"x": true})
    );
}

// === Purity and thread safety ===

#[test]
fn execution_is_repeatable() {
    let engine = Engine::new();
    let program = engine.compile(CART_SCRIPT, &Default::default()).unwrap();
    let input = json!({
        "order": {"id": "ORD-12345", "customer": {"name": "Jane Doe"}},
        "items": [{"name": "w", "price": 10.0, "quantity": 1}]
    });
    let options = ExecutionOptions::default();
    let first = engine.run(&program, input.clone(), None, &options).unwrap();
    let second = engine.run(&program, input.clone(), None, &options).unwrap();
    assert_eq!(first, second);

    // compiling again observes the same behavior
    let recompiled = engine.compile(CART_SCRIPT, &Default::default()).unwrap();
    let third = engine.run(&recompiled, input, None, &options).unwrap();
    assert_eq!(first, third);
}

#[test]
fn compiled_programs_run_concurrently() {
    let engine = Engine::new();
    let program = engine
        .compile("%set $.doubled = jp1($in, \"$.n\") * 2;", &Default::default())
        .unwrap();
    let options = ExecutionOptions::default();

    let sequential: Vec<Value> = (0..8)
        .map(|n| engine.run(&program, json!({"n": n}), None, &options).unwrap())
        .collect();

    let concurrent: Vec<Value> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let engine = &engine;
                let program = &program;
                let options = &options;
                scope.spawn(move || engine.run(program, json!({"n": n}), None, options).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(sequential, concurrent);
}

// === Misc surface ===

#[test]
fn meta_is_readable_and_optional() {
    let engine = Engine::new();
    let program = engine
        .compile("%set $.tag = jp1($meta, \"$.tag\"); %set $.metaIsNull = $meta == null;", &Default::default())
        .unwrap();
    let with_meta = engine
        .run(&program, json!({}), Some(json!({"tag": "m1"})), &ExecutionOptions::default())
        .unwrap();
    assert_eq!(with_meta, json!({"tag": "m1", "metaIsNull": false}));

    let without_meta = engine
        .run(&program, json!({}), None, &ExecutionOptions::default())
        .unwrap();
    assert_eq!(without_meta, json!({"tag": null, "metaIsNull": true}));
}

#[test]
fn object_and_array_literals_evaluate_their_entries() {
    let script = r#"
%let two = 2;
%set $.obj = { a: 1, "b c": [&two, 3] };
"#;
    assert_eq!(run(script, json!({})), json!({"obj": {"a": 1, "b c": [2, 3]}}));
}

#[test]
fn unknown_function_and_builtin_var_fail() {
    let engine = Engine::new();
    let err = engine
        .execute("%set $.x = nosuch(1);", json!({}), &ExecutionOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("nosuch"), "got {err}");

    let err = engine
        .execute("%set $.x = $bogus;", json!({}), &ExecutionOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("bogus"), "got {err}");
}

#[test]
fn output_size_limit_is_enforced() {
    let engine = Engine::new();
    let options = ExecutionOptions::default().max_output_size_bytes(8);
    let err = engine
        .execute(
            r#"%set $.filler = "0123456789abcdef";"#,
            json!({}),
            &options,
        )
        .unwrap_err();
    let JexError::Limit(limit) = err else {
        panic!("expected a limit error, got {err}");
    };
    assert_eq!(limit.kind(), LimitKind::MaxOutputSizeBytes);
}

#[test]
fn array_padding_from_script_input_is_bounded() {
    let engine = Engine::new();
    // a huge literal index
    let err = engine
        .execute("%set $.a[999999999999] = 1;", json!({}), &ExecutionOptions::default())
        .unwrap_err();
    let JexError::Limit(limit) = err else {
        panic!("expected a limit error, got {err}");
    };
    assert_eq!(limit.kind(), LimitKind::MaxArrayExtension);

    // the same through an input-controlled index and the setPath built-in
    let err = engine
        .execute(
            r#"setPath($out, concat("a[", jp1($in, "$.n"), "]"), 1);"#,
            json!({"n": 999999999999_u64}),
            &ExecutionOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, JexError::Limit(_)), "got {err}");
}

#[test]
fn return_at_top_level_ends_the_script() {
    let script = r"
%set $.before = 1;
%return;
%set $.after = 2;
";
    assert_eq!(run(script, json!({})), json!({"before": 1}));
}

#[test]
fn host_void_functions_can_write_output() {
    let mut engine = Engine::new();
    engine.register_void_function("stamp", 1, Some(1), |ctx, args| {
        let value = args[0].to_json();
        ctx.output().set_path("stamped", value)
    });
    let output = engine
        .execute("stamp(42);", json!({}), &ExecutionOptions::default())
        .unwrap();
    assert_eq!(output, json!({"stamped": 42}));
}
