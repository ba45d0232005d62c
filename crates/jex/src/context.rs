//! Per-execution runtime state.
//!
//! Each call to `execute` owns one [`ExecutionContext`]: the input handle
//! (read-only), the output handle (starts as an empty object), the optional
//! metadata handle, the variable scope stack, the loop-iteration and
//! recursion-depth counters, and the control flags the evaluator threads
//! through statements. Nothing here is shared between executions.

use ahash::AHashMap;
use serde_json::Value as JsonValue;

use crate::error::{JexError, JexResult, LimitKind};
use crate::value::{JsonRef, Value};

/// Options governing one execution.
///
/// All limits are enforced inside the evaluator; `strict` switches the
/// lenient missing-variable/missing-path behavior to hard errors.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    /// Missing variables and properties are errors instead of Null, and
    /// division by zero is an error instead of 0.
    pub strict: bool,
    /// Total loop-body entries allowed across the whole execution.
    pub max_loop_iterations: u64,
    /// Maximum user/library function call depth.
    pub max_recursion_depth: usize,
    /// Budget for each regex built-in call, in milliseconds.
    pub regex_timeout_ms: u64,
    /// Maximum size of the serialized output; 0 means unlimited.
    pub max_output_size_bytes: u64,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            strict: false,
            max_loop_iterations: 100_000,
            max_recursion_depth: 100,
            regex_timeout_ms: 1_000,
            max_output_size_bytes: 0,
        }
    }
}

impl ExecutionOptions {
    /// Sets strict evaluation.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets the loop-iteration budget.
    #[must_use]
    pub fn max_loop_iterations(mut self, limit: u64) -> Self {
        self.max_loop_iterations = limit;
        self
    }

    /// Sets the recursion-depth budget.
    #[must_use]
    pub fn max_recursion_depth(mut self, limit: usize) -> Self {
        self.max_recursion_depth = limit;
        self
    }

    /// Sets the per-call regex budget in milliseconds.
    #[must_use]
    pub fn regex_timeout_ms(mut self, millis: u64) -> Self {
        self.regex_timeout_ms = millis;
        self
    }

    /// Sets the output size cap in bytes (0 disables it).
    #[must_use]
    pub fn max_output_size_bytes(mut self, bytes: u64) -> Self {
        self.max_output_size_bytes = bytes;
        self
    }
}

/// One frame of the variable stack. Barrier frames (function calls) hide
/// everything beneath them; transparent frames (loops) do not.
#[derive(Debug, Default)]
struct Frame {
    vars: AHashMap<String, Value>,
    barrier: bool,
}

/// The variable store: a global frame at the base plus pushed frames.
///
/// Lookup walks from the innermost frame outward and stops behind a barrier.
/// Assignment updates the nearest visible existing binding, else creates the
/// variable in the innermost frame.
#[derive(Debug)]
pub(crate) struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::default()],
        }
    }

    pub fn push(&mut self, barrier: bool) {
        self.frames.push(Frame {
            vars: AHashMap::new(),
            barrier,
        });
    }

    pub fn pop(&mut self) {
        debug_assert!(self.frames.len() > 1, "the global frame is never popped");
        self.frames.pop();
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        for frame in self.frames.iter().rev() {
            if let Some(value) = frame.vars.get(name) {
                return Some(value);
            }
            if frame.barrier {
                return None;
            }
        }
        None
    }

    /// Nearest-existing-binding assignment.
    pub fn assign(&mut self, name: &str, value: Value) {
        let mut target = None;
        for (index, frame) in self.frames.iter().enumerate().rev() {
            if frame.vars.contains_key(name) {
                target = Some(index);
                break;
            }
            if frame.barrier {
                break;
            }
        }
        let index = target.unwrap_or(self.frames.len() - 1);
        self.frames[index].vars.insert(name.to_string(), value);
    }

    /// Forces a binding into the innermost frame (loop variables, parameters).
    pub fn declare(&mut self, name: &str, value: Value) {
        let top = self.frames.len() - 1;
        self.frames[top].vars.insert(name.to_string(), value);
    }
}

/// Break/continue/return flags plus the captured return value.
#[derive(Debug, Default)]
pub(crate) struct ControlFlow {
    pub should_break: bool,
    pub should_continue: bool,
    pub should_return: bool,
    pub return_value: Option<Value>,
}

impl ControlFlow {
    /// True when any flag short-circuits the remaining statements of a block.
    pub fn interrupts(&self) -> bool {
        self.should_break || self.should_continue || self.should_return
    }

    /// Consumed by function boundaries: takes the return value and clears
    /// every flag (a stray `%break` in a function body stops at the call).
    pub fn take_return(&mut self) -> Value {
        self.should_break = false;
        self.should_continue = false;
        self.should_return = false;
        self.return_value.take().unwrap_or(Value::Null)
    }
}

/// Per-execution state, also handed to built-in and host functions.
pub struct ExecutionContext {
    input: JsonRef,
    output: JsonRef,
    meta: Option<JsonRef>,
    options: ExecutionOptions,
    pub(crate) scopes: ScopeStack,
    pub(crate) flow: ControlFlow,
    loop_iterations: u64,
    recursion_depth: usize,
}

impl ExecutionContext {
    pub(crate) fn new(input: JsonValue, meta: Option<JsonValue>, options: ExecutionOptions) -> Self {
        Self {
            input: JsonRef::readonly_root(input),
            output: JsonRef::new_root(JsonValue::Object(serde_json::Map::new())),
            meta: meta.map(JsonRef::readonly_root),
            options,
            scopes: ScopeStack::new(),
            flow: ControlFlow::default(),
            loop_iterations: 0,
            recursion_depth: 0,
        }
    }

    /// Read-only handle to `$in`.
    #[must_use]
    pub fn input(&self) -> &JsonRef {
        &self.input
    }

    /// Mutable handle to `$out`.
    #[must_use]
    pub fn output(&self) -> &JsonRef {
        &self.output
    }

    /// Read-only handle to `$meta`, when one was supplied.
    #[must_use]
    pub fn meta(&self) -> Option<&JsonRef> {
        self.meta.as_ref()
    }

    /// The effective execution options.
    #[must_use]
    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    /// Whether strict evaluation is on.
    #[must_use]
    pub fn strict(&self) -> bool {
        self.options.strict
    }

    /// Counts one loop-body entry; the counter is global to the execution.
    pub(crate) fn enter_loop_iteration(&mut self) -> JexResult<()> {
        self.loop_iterations += 1;
        if self.loop_iterations > self.options.max_loop_iterations {
            return Err(JexError::limit(
                LimitKind::MaxLoopIterations,
                self.options.max_loop_iterations,
            ));
        }
        Ok(())
    }

    /// Counts a user/library function call; paired with [`Self::exit_call`].
    pub(crate) fn enter_call(&mut self) -> JexResult<()> {
        if self.recursion_depth >= self.options.max_recursion_depth {
            return Err(JexError::limit(
                LimitKind::MaxRecursionDepth,
                self.options.max_recursion_depth as u64,
            ));
        }
        self.recursion_depth += 1;
        Ok(())
    }

    pub(crate) fn exit_call(&mut self) {
        self.recursion_depth = self.recursion_depth.saturating_sub(1);
    }

    /// Total loop-body entries so far (exposed for diagnostics).
    #[must_use]
    pub fn loop_iterations(&self) -> u64 {
        self.loop_iterations
    }
}
