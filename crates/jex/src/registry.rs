//! The engine function registry: standard library plus host registrations.
//!
//! Entries are keyed case-insensitively and carry arity bounds that are
//! checked before invocation. The registry is split into the built-in table
//! populated at engine construction and a host overlay; the overlay wins on
//! name collisions so hosts can replace a built-in.

use std::sync::Arc;

use ahash::AHashMap;

use crate::context::ExecutionContext;
use crate::error::{JexError, JexResult, RuntimeError};
use crate::value::Value;

/// Signature shared by built-in and host functions.
pub type NativeFn = Arc<dyn Fn(&mut ExecutionContext, Vec<Value>) -> JexResult<Value> + Send + Sync>;

/// A registered function with its arity bounds.
#[derive(Clone)]
pub(crate) struct FunctionEntry {
    /// Name in its registered casing, used in error messages.
    name: String,
    min_args: usize,
    /// None means unbounded.
    max_args: Option<usize>,
    /// Void functions are called for their side effects; calls yield Null.
    void: bool,
    func: NativeFn,
}

impl std::fmt::Debug for FunctionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionEntry")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("void", &self.void)
            .finish_non_exhaustive()
    }
}

impl FunctionEntry {
    /// Checks arity, invokes, and tags failures with the function name.
    pub fn call(&self, ctx: &mut ExecutionContext, args: Vec<Value>) -> JexResult<Value> {
        let count = args.len();
        if count < self.min_args || self.max_args.is_some_and(|max| count > max) {
            return Err(JexError::Runtime(
                RuntimeError::new(arity_message(self.min_args, self.max_args, count)).with_function(&self.name),
            ));
        }
        let result = (self.func)(ctx, args).map_err(|err| err.with_function(&self.name))?;
        Ok(if self.void { Value::Null } else { result })
    }
}

fn arity_message(min: usize, max: Option<usize>, got: usize) -> String {
    match max {
        Some(max) if max == min => format!("expects {min} argument(s), got {got}"),
        Some(max) => format!("expects between {min} and {max} arguments, got {got}"),
        None => format!("expects at least {min} argument(s), got {got}"),
    }
}

/// Case-insensitive function registry with a host overlay.
#[derive(Debug, Default)]
pub(crate) struct FunctionRegistry {
    builtins: AHashMap<String, FunctionEntry>,
    overlay: AHashMap<String, FunctionEntry>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a standard-library function.
    pub fn register_builtin(
        &mut self,
        name: &str,
        min_args: usize,
        max_args: Option<usize>,
        func: impl Fn(&mut ExecutionContext, Vec<Value>) -> JexResult<Value> + Send + Sync + 'static,
    ) {
        self.builtins.insert(
            name.to_ascii_lowercase(),
            FunctionEntry {
                name: name.to_string(),
                min_args,
                max_args,
                void: false,
                func: Arc::new(func),
            },
        );
    }

    /// Registers a void standard-library function.
    pub fn register_builtin_void(
        &mut self,
        name: &str,
        min_args: usize,
        max_args: Option<usize>,
        func: impl Fn(&mut ExecutionContext, Vec<Value>) -> JexResult<Value> + Send + Sync + 'static,
    ) {
        self.builtins.insert(
            name.to_ascii_lowercase(),
            FunctionEntry {
                name: name.to_string(),
                min_args,
                max_args,
                void: true,
                func: Arc::new(func),
            },
        );
    }

    /// Registers a host function into the overlay.
    pub fn register_host(&mut self, name: &str, min_args: usize, max_args: Option<usize>, void: bool, func: NativeFn) {
        self.overlay.insert(
            name.to_ascii_lowercase(),
            FunctionEntry {
                name: name.to_string(),
                min_args,
                max_args,
                void,
                func,
            },
        );
    }

    /// Looks a function up; the host overlay shadows the built-ins.
    pub fn lookup(&self, name: &str) -> Option<&FunctionEntry> {
        let key = name.to_ascii_lowercase();
        self.overlay.get(&key).or_else(|| self.builtins.get(&key))
    }
}
