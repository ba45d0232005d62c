//! JEX: a compile-once / execute-many language for transforming one JSON
//! document into another.
//!
//! The engine embeds in a host process: create an [`Engine`] (which registers
//! the standard library), optionally register host functions and load
//! function libraries, [`Engine::compile`] a script into an immutable
//! [`Program`], and run it against inputs. Compiled programs are `Send +
//! Sync` and safe to share across threads; every execution owns its own
//! context and is bounded by [`ExecutionOptions`] (loop iterations, recursion
//! depth, regex budgets, output size).
//!
//! ```
//! use jex::{Engine, ExecutionOptions};
//! use serde_json::json;
//!
//! let engine = Engine::new();
//! let output = engine
//!     .execute(
//!         r#"%set $.greeting = concat("hello ", jp1($in, "$.name"));"#,
//!         json!({"name": "world"}),
//!         &ExecutionOptions::default(),
//!     )
//!     .unwrap();
//! assert_eq!(output, json!({"greeting": "hello world"}));
//! ```
//!
//! The JSON-in-string preprocessor ([`normalize`]) is a standalone
//! transformation, usable with or without the engine.

mod ast;
mod compile;
mod context;
mod engine;
mod error;
mod eval;
mod lexer;
mod library;
mod normalize;
mod parser;
mod path;
mod registry;
mod stdlib;
mod value;

pub use crate::{
    compile::{CompileOptions, Program},
    context::{ExecutionContext, ExecutionOptions},
    engine::{Engine, LibraryInfo},
    error::{CompileError, JexError, JexResult, LimitExceeded, LimitKind, Pos, RuntimeError, Span},
    library::Library,
    normalize::{NormalizerOptions, normalize},
    registry::NativeFn,
    value::{JsonRef, Value},
};
