//! Compilation: parse, validate, and split function declarations out into
//! the program's function table.
//!
//! A compiled [`Program`] is immutable and `Send + Sync`; one program can be
//! shared by any number of concurrent executions.

use ahash::AHashMap;

use crate::ast::{FunctionDecl, StmtNode};
use crate::error::CompileError;
use crate::parser::parse;

/// Options controlling compilation.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Reserved for additional compile-time semantic checks (arity, unknown
    /// identifiers). Evaluation-side strictness lives in
    /// [`crate::ExecutionOptions::strict`].
    pub strict: bool,
    /// When false, any `%func` declaration in the script is a compile error.
    pub allow_user_functions: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            strict: false,
            allow_user_functions: true,
        }
    }
}

/// A compiled script: the statement list plus the script-function table.
#[derive(Debug, Clone)]
pub struct Program {
    pub(crate) statements: Vec<StmtNode>,
    /// Keyed by lowercased function name.
    pub(crate) functions: AHashMap<String, FunctionDecl>,
}

impl Program {
    /// Names of the functions declared by the script, in no particular order.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.values().map(|f| f.name.as_str())
    }

    pub(crate) fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.get(&name.to_ascii_lowercase())
    }
}

/// Compiles a script source into a [`Program`].
pub(crate) fn compile_script(source: &str, options: &CompileOptions) -> Result<Program, CompileError> {
    let parsed = parse(source)?;
    if !options.allow_user_functions
        && let Some(func) = parsed.functions.first()
    {
        return Err(CompileError::new(
            format!("user function declarations are disabled: `{}`", func.name),
            func.span,
        ));
    }
    let functions = collect_functions(parsed.functions)?;
    log::debug!(
        "compiled script: {} statements, {} functions",
        parsed.statements.len(),
        functions.len()
    );
    Ok(Program {
        statements: parsed.statements,
        functions,
    })
}

/// Compiles a library source: function declarations only, at least one.
pub(crate) fn compile_library_source(source: &str) -> Result<AHashMap<String, FunctionDecl>, CompileError> {
    let parsed = parse(source)?;
    if let Some(stmt) = parsed.statements.first() {
        return Err(CompileError::new(
            "libraries may only contain function declarations",
            stmt.span,
        ));
    }
    if parsed.functions.is_empty() {
        return Err(CompileError::spanless(
            "a library must declare at least one function",
        ));
    }
    collect_functions(parsed.functions)
}

/// Builds the case-insensitive function table, rejecting duplicates.
fn collect_functions(declarations: Vec<FunctionDecl>) -> Result<AHashMap<String, FunctionDecl>, CompileError> {
    let mut table = AHashMap::with_capacity(declarations.len());
    for decl in declarations {
        let key = decl.name.to_ascii_lowercase();
        if table.contains_key(&key) {
            return Err(CompileError::new(
                format!("duplicate function declaration `{}`", decl.name),
                decl.span,
            ));
        }
        table.insert(key, decl);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_functions_from_statements() {
        let program = compile_script(
            "%func f(); %return 1; %endfunc; %let x = f();",
            &CompileOptions::default(),
        )
        .unwrap();
        assert_eq!(program.statements.len(), 1);
        assert!(program.function("F").is_some());
    }

    #[test]
    fn duplicate_functions_fail() {
        let err = compile_script(
            "%func f(); %return 1; %endfunc; %func F(); %return 2; %endfunc;",
            &CompileOptions::default(),
        )
        .unwrap_err();
        assert!(err.message().contains("duplicate"));
    }

    #[test]
    fn user_functions_can_be_disabled() {
        let options = CompileOptions {
            allow_user_functions: false,
            ..CompileOptions::default()
        };
        assert!(compile_script("%func f(); %return 1; %endfunc;", &options).is_err());
        assert!(compile_script("%let x = 1;", &options).is_ok());
    }

    #[test]
    fn library_rules() {
        assert!(compile_library_source("%let x = 1;").is_err());
        assert!(compile_library_source("").is_err());
        let table = compile_library_source("%func f(); %return 1; %endfunc;").unwrap();
        assert_eq!(table.len(), 1);
    }
}
