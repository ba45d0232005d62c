//! The embedding surface.
//!
//! An [`Engine`] owns the function registry (standard library plus host
//! registrations) and the loaded libraries. Compilation produces an immutable
//! [`Program`]; execution creates a fresh context per call, so one engine and
//! one program can serve any number of sequential or concurrent executions —
//! registration and library loading are `&mut self` and therefore happen
//! between runs.

use std::io::Read;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::compile::{CompileOptions, Program, compile_script};
use crate::context::{ExecutionContext, ExecutionOptions};
use crate::error::{CompileError, JexError, JexResult};
use crate::eval::Evaluator;
use crate::library::{Library, LibraryManager};
use crate::registry::FunctionRegistry;
use crate::stdlib;
use crate::value::Value;

/// Handle returned by library loading: the name plus the declared functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryInfo {
    pub name: String,
    pub functions: Vec<String>,
}

/// The JEX engine: compiler plus function registry plus libraries.
#[derive(Debug)]
pub struct Engine {
    registry: FunctionRegistry,
    libraries: LibraryManager,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Creates an engine with the standard library registered.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = FunctionRegistry::new();
        stdlib::install(&mut registry);
        log::debug!("engine created with standard library");
        Self {
            registry,
            libraries: LibraryManager::new(),
        }
    }

    /// Registers a value-returning host function.
    ///
    /// The callback receives the execution context (input, output, meta,
    /// options) and the evaluated arguments. `max_args` of `None` means
    /// unbounded. Registering over an existing name replaces it.
    pub fn register_function(
        &mut self,
        name: &str,
        min_args: usize,
        max_args: Option<usize>,
        func: impl Fn(&mut ExecutionContext, Vec<Value>) -> JexResult<Value> + Send + Sync + 'static,
    ) {
        self.registry.register_host(name, min_args, max_args, false, Arc::new(func));
    }

    /// Registers a void host function; calls evaluate to Null.
    pub fn register_void_function(
        &mut self,
        name: &str,
        min_args: usize,
        max_args: Option<usize>,
        func: impl Fn(&mut ExecutionContext, Vec<Value>) -> JexResult<()> + Send + Sync + 'static,
    ) {
        self.registry.register_host(
            name,
            min_args,
            max_args,
            true,
            Arc::new(move |ctx, args| {
                func(ctx, args)?;
                Ok(Value::Null)
            }),
        );
    }

    /// Compiles and loads a library from source text.
    ///
    /// # Errors
    /// Fails when the source is not exclusively function declarations, when
    /// it declares none, or when the library name is already taken.
    pub fn load_library(&mut self, name: &str, source: &str) -> JexResult<LibraryInfo> {
        let library = Library::compile(name, source)?;
        let info = LibraryInfo {
            name: library.name().to_string(),
            functions: library.function_names(),
        };
        self.libraries.insert(library)?;
        log::debug!("loaded library `{}` with {} function(s)", info.name, info.functions.len());
        Ok(info)
    }

    /// Loads a library from any readable source (a file, a stream).
    pub fn load_library_from_reader(&mut self, name: &str, mut reader: impl Read) -> JexResult<LibraryInfo> {
        let mut source = String::new();
        reader
            .read_to_string(&mut source)
            .map_err(|err| JexError::Compile(CompileError::spanless(format!("failed to read library source: {err}"))))?;
        self.load_library(name, &source)
    }

    /// A previously loaded library, by name.
    #[must_use]
    pub fn library(&self, name: &str) -> Option<&Library> {
        self.libraries.get(name)
    }

    /// Compiles a script into an immutable, shareable [`Program`].
    pub fn compile(&self, source: &str, options: &CompileOptions) -> JexResult<Program> {
        compile_script(source, options).map_err(JexError::Compile)
    }

    /// Compile-and-run convenience for one-shot scripts.
    pub fn execute(&self, script: &str, input: JsonValue, options: &ExecutionOptions) -> JexResult<JsonValue> {
        let program = self.compile(script, &CompileOptions::default())?;
        self.run(&program, input, None, options)
    }

    /// Runs a compiled program over `input`, returning the final `$out`.
    pub fn run(
        &self,
        program: &Program,
        input: JsonValue,
        meta: Option<JsonValue>,
        options: &ExecutionOptions,
    ) -> JexResult<JsonValue> {
        let ctx = ExecutionContext::new(input, meta, options.clone());
        Evaluator::new(program, &self.registry, &self.libraries, ctx).run()
    }
}
