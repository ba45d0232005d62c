//! The standard library.
//!
//! One file per concern; every submodule exposes an `install` that registers
//! its functions (name, arity bounds, implementation) into the engine
//! registry. Registration happens once, at engine construction.

use crate::registry::FunctionRegistry;
use crate::value::Value;

pub(crate) mod collections;
pub(crate) mod convert;
pub(crate) mod dates;
pub(crate) mod expand;
pub(crate) mod jsonpath;
pub(crate) mod math;
pub(crate) mod strings;

/// Populates the registry with every built-in.
pub(crate) fn install(registry: &mut FunctionRegistry) {
    jsonpath::install(registry);
    strings::install(registry);
    math::install(registry);
    dates::install(registry);
    convert::install(registry);
    collections::install(registry);
    expand::install(registry);
}

/// Argument accessor; arity is already checked, but optional trailing
/// arguments read as Null when absent.
pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Null)
}
