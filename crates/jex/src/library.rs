//! Named function bundles loaded by the host.
//!
//! A library is compiled from source that may contain only function
//! declarations (at least one). Call resolution consults libraries in
//! insertion order, after script functions and before the engine registry.

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::ast::FunctionDecl;
use crate::compile::compile_library_source;
use crate::error::CompileError;

/// A compiled library.
#[derive(Debug, Clone)]
pub struct Library {
    name: String,
    /// Keyed by lowercased function name.
    functions: AHashMap<String, FunctionDecl>,
}

impl Library {
    /// Compiles `source` into a library named `name`.
    pub(crate) fn compile(name: &str, source: &str) -> Result<Self, CompileError> {
        let functions = compile_library_source(source)?;
        Ok(Self {
            name: name.to_string(),
            functions,
        })
    }

    /// The library name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared function names, in their source casing.
    #[must_use]
    pub fn function_names(&self) -> Vec<String> {
        self.functions.values().map(|f| f.name.clone()).collect()
    }

    pub(crate) fn function(&self, lower_name: &str) -> Option<&FunctionDecl> {
        self.functions.get(lower_name)
    }
}

/// Insertion-ordered collection of libraries.
#[derive(Debug, Default)]
pub(crate) struct LibraryManager {
    libraries: IndexMap<String, Library>,
}

impl LibraryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a library; duplicate names fail.
    pub fn insert(&mut self, library: Library) -> Result<(), CompileError> {
        if self.libraries.contains_key(library.name()) {
            return Err(CompileError::spanless(format!(
                "a library named `{}` is already loaded",
                library.name()
            )));
        }
        self.libraries.insert(library.name().to_string(), library);
        Ok(())
    }

    /// Finds the first declaration of `name`, scanning insertion order.
    pub fn find_function(&self, name: &str) -> Option<&FunctionDecl> {
        let key = name.to_ascii_lowercase();
        self.libraries.values().find_map(|lib| lib.function(&key))
    }

    pub fn get(&self, name: &str) -> Option<&Library> {
        self.libraries.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order_resolution() {
        let mut manager = LibraryManager::new();
        manager
            .insert(Library::compile("first", "%func f(); %return 1; %endfunc;").unwrap())
            .unwrap();
        manager
            .insert(Library::compile("second", "%func f(); %return 2; %endfunc; %func g(); %return 3; %endfunc;").unwrap())
            .unwrap();
        // `f` resolves to the first library's declaration
        let f = manager.find_function("F").unwrap();
        assert_eq!(f.name, "f");
        assert!(manager.find_function("g").is_some());
        assert!(manager.find_function("h").is_none());
    }

    #[test]
    fn duplicate_library_names_fail() {
        let mut manager = LibraryManager::new();
        let lib = Library::compile("dup", "%func f(); %return 1; %endfunc;").unwrap();
        manager.insert(lib.clone()).unwrap();
        assert!(manager.insert(lib).is_err());
    }
}
