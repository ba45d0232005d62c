//! The tree-walking evaluator.
//!
//! Statements thread break/continue/return flags through the execution
//! context; loops consume break/continue as they exit, function calls consume
//! return at their boundary, and the top level consumes return to end the
//! run. The loop-iteration counter is global to the execution and checked at
//! every loop-body entry; recursion depth is checked at every user/library
//! function call.

use bigdecimal::{BigDecimal, RoundingMode};
use num_traits::{ToPrimitive, Zero};
use serde_json::Value as JsonValue;

use crate::ast::{BinaryOp, Expr, ExprNode, FunctionDecl, Stmt, StmtNode, UnaryOp};
use crate::compile::Program;
use crate::context::ExecutionContext;
use crate::error::{JexError, JexResult, LimitKind, RuntimeError};
use crate::library::LibraryManager;
use crate::path::{PathRoot, parse_path};
use crate::registry::FunctionRegistry;
use crate::value::{JsonRef, Value};

/// Walks one program over one execution context.
pub(crate) struct Evaluator<'a> {
    program: &'a Program,
    registry: &'a FunctionRegistry,
    libraries: &'a LibraryManager,
    ctx: ExecutionContext,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        program: &'a Program,
        registry: &'a FunctionRegistry,
        libraries: &'a LibraryManager,
        ctx: ExecutionContext,
    ) -> Self {
        Self {
            program,
            registry,
            libraries,
            ctx,
        }
    }

    /// Runs the program and returns the final `$out`.
    pub fn run(mut self) -> JexResult<JsonValue> {
        let program = self.program;
        for stmt in &program.statements {
            self.exec_stmt(stmt)?;
            if self.ctx.flow.interrupts() {
                break;
            }
        }
        let output = self.ctx.output().materialize();
        let cap = self.ctx.options().max_output_size_bytes;
        if cap > 0 {
            let size = serde_json::to_vec(&output).map(|bytes| bytes.len() as u64).unwrap_or(0);
            if size > cap {
                return Err(JexError::limit(LimitKind::MaxOutputSizeBytes, cap));
            }
        }
        log::trace!("execution finished after {} loop iterations", self.ctx.loop_iterations());
        Ok(output)
    }

    // === Statements ===

    fn exec_stmt(&mut self, stmt: &StmtNode) -> JexResult<()> {
        self.exec_stmt_inner(stmt).map_err(|err| err.with_span(stmt.span))
    }

    fn exec_stmt_inner(&mut self, stmt: &StmtNode) -> JexResult<()> {
        match &stmt.stmt {
            Stmt::Let { name, value } => {
                let value = self.eval_expr(value)?;
                self.ctx.scopes.assign(name, value);
            }
            Stmt::SetPath { path, value } => self.exec_set_path(path, value)?,
            Stmt::SetTarget { target, path, value } => self.exec_set_target(target, path, value)?,
            Stmt::If {
                condition,
                then_block,
                else_block,
            } => {
                if self.eval_expr(condition)?.coerce_bool() {
                    self.run_block(then_block)?;
                } else if let Some(block) = else_block {
                    self.run_block(block)?;
                }
            }
            Stmt::Foreach { var, collection, body } => self.exec_foreach(var, collection, body)?,
            Stmt::DoLoop { var, start, end, body } => self.exec_do_loop(var, start, end, body)?,
            Stmt::Break => self.ctx.flow.should_break = true,
            Stmt::Continue => self.ctx.flow.should_continue = true,
            Stmt::Return { value } => {
                let value = match value {
                    Some(expr) => Some(self.eval_expr(expr)?),
                    None => None,
                };
                self.ctx.flow.return_value = value;
                self.ctx.flow.should_return = true;
            }
            Stmt::Expression(expr) => {
                self.eval_expr(expr)?;
            }
        }
        Ok(())
    }

    fn run_block(&mut self, block: &[StmtNode]) -> JexResult<()> {
        for stmt in block {
            self.exec_stmt(stmt)?;
            if self.ctx.flow.interrupts() {
                break;
            }
        }
        Ok(())
    }

    /// Form A: the path comes from the shape of the path expression and the
    /// target is `$out`. Writes aimed at `$in` or `$meta` are rejected.
    fn exec_set_path(&mut self, path: &ExprNode, value: &ExprNode) -> JexResult<()> {
        let path_text = self.path_string(path)?;
        if path_text.starts_with('&') {
            return Err(JexError::runtime(
                "a variable set target requires the three-argument %set form",
            ));
        }
        let parsed = parse_path(&path_text).map_err(JexError::runtime)?;
        match parsed.root {
            Some(PathRoot::In) => {
                return Err(JexError::Runtime(
                    RuntimeError::new("$in is read-only and cannot be a set target").with_path(&path_text),
                ));
            }
            Some(PathRoot::Meta) => {
                return Err(JexError::Runtime(
                    RuntimeError::new("$meta is read-only and cannot be a set target").with_path(&path_text),
                ));
            }
            Some(PathRoot::Out) | None => {}
        }
        let value = self.eval_expr(value)?.to_json();
        self.ctx
            .output()
            .set_at(&parsed.segments, value)
            .map_err(|err| err.into_jex(&path_text))
    }

    /// Form B: the target is evaluated (it must be a JSON node), the path is
    /// evaluated to a string and applied inside the target.
    fn exec_set_target(&mut self, target: &ExprNode, path: &ExprNode, value: &ExprNode) -> JexResult<()> {
        let target = self.eval_expr(target)?;
        let Value::Json(handle) = target else {
            return Err(JexError::runtime(format!(
                "%set target must be a JSON node, got {}",
                target.type_name()
            )));
        };
        let path_text = self.eval_expr(path)?.coerce_string();
        let parsed = parse_path(&path_text).map_err(JexError::runtime)?;
        let value = self.eval_expr(value)?.to_json();
        handle
            .set_at(&parsed.segments, value)
            .map_err(|err| err.into_jex(&path_text))
    }

    fn exec_foreach(&mut self, var: &str, collection: &ExprNode, body: &[StmtNode]) -> JexResult<()> {
        enum Shape {
            Empty,
            Array(usize),
            Single,
        }
        let collection = self.eval_expr(collection)?;
        match collection {
            Value::Null => {}
            Value::Json(handle) => {
                let shape = handle.with_value(|node| match node {
                    None | Some(JsonValue::Null) => Shape::Empty,
                    Some(JsonValue::Array(items)) => Shape::Array(items.len()),
                    Some(_) => Shape::Single,
                });
                match shape {
                    Shape::Empty => {}
                    Shape::Array(len) => {
                        for index in 0..len {
                            let item = Value::Json(handle.child_index(index));
                            if !self.loop_body(var, item, body)? {
                                break;
                            }
                        }
                    }
                    Shape::Single => {
                        self.loop_body(var, Value::Json(handle), body)?;
                    }
                }
            }
            single => {
                self.loop_body(var, single, body)?;
            }
        }
        Ok(())
    }

    fn exec_do_loop(&mut self, var: &str, start: &ExprNode, end: &ExprNode, body: &[StmtNode]) -> JexResult<()> {
        let start = truncate_to_i64(&self.eval_expr(start)?.coerce_number());
        let end = truncate_to_i64(&self.eval_expr(end)?.coerce_number());
        let mut index = start;
        while index <= end {
            if !self.loop_body(var, Value::Number(BigDecimal::from(index)), body)? {
                break;
            }
            index += 1;
        }
        Ok(())
    }

    /// One loop iteration: counts against the loop budget, runs the body in a
    /// transparent scope, and consumes break/continue. Returns whether the
    /// loop should keep going.
    fn loop_body(&mut self, var: &str, value: Value, body: &[StmtNode]) -> JexResult<bool> {
        self.ctx.enter_loop_iteration()?;
        self.ctx.scopes.push(false);
        self.ctx.scopes.declare(var, value);
        let result = self.run_block(body);
        self.ctx.scopes.pop();
        result?;
        if self.ctx.flow.should_continue {
            self.ctx.flow.should_continue = false;
            return Ok(true);
        }
        if self.ctx.flow.should_break {
            self.ctx.flow.should_break = false;
            return Ok(false);
        }
        Ok(!self.ctx.flow.should_return)
    }

    // === Expressions ===

    fn eval_expr(&mut self, node: &ExprNode) -> JexResult<Value> {
        self.eval_expr_inner(node).map_err(|err| err.with_span(node.span))
    }

    fn eval_expr_inner(&mut self, node: &ExprNode) -> JexResult<Value> {
        match &node.expr {
            Expr::NullLit => Ok(Value::Null),
            Expr::BoolLit(b) => Ok(Value::Bool(*b)),
            Expr::NumberLit(n) => Ok(Value::Number(n.clone())),
            Expr::StringLit(text) => Ok(Value::Str(self.expand_macros(text)?)),
            Expr::VarRef(name) => match self.ctx.scopes.get(name) {
                Some(value) => Ok(value.clone()),
                None if self.ctx.strict() => Err(JexError::runtime(format!("unknown variable `&{name}`"))),
                None => Ok(Value::Null),
            },
            Expr::BuiltInVar(name) => self.eval_builtin_var(name),
            Expr::JsonPathLit(path) => self.eval_json_path(path),
            Expr::Unary { op, operand } => {
                let value = self.eval_expr(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.coerce_bool()),
                    UnaryOp::Neg => Value::Number(-value.coerce_number()),
                })
            }
            Expr::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs),
            Expr::Call { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expr(arg)?);
                }
                self.call_function(name, values)
            }
            Expr::ObjectLit(entries) => {
                let mut map = serde_json::Map::with_capacity(entries.len());
                for (key, value) in entries {
                    let value = self.eval_expr(value)?.to_json();
                    map.insert(key.clone(), value);
                }
                Ok(Value::Json(JsonRef::new_root(JsonValue::Object(map))))
            }
            Expr::ArrayLit(items) => {
                let mut array = Vec::with_capacity(items.len());
                for item in items {
                    array.push(self.eval_expr(item)?.to_json());
                }
                Ok(Value::Json(JsonRef::new_root(JsonValue::Array(array))))
            }
            Expr::Property { base, name } => {
                let base = self.eval_expr(base)?;
                match base {
                    Value::Json(handle) => {
                        if self.ctx.strict() {
                            let exists = handle.with_value(|n| n.is_some_and(|n| n.get(name).is_some()));
                            if !exists {
                                return Err(JexError::runtime(format!("missing property `{name}`")));
                            }
                        }
                        Ok(Value::Json(handle.child_key(name)))
                    }
                    _ if self.ctx.strict() => Err(JexError::runtime(format!(
                        "cannot access property `{name}` on a {} value",
                        base.type_name()
                    ))),
                    _ => Ok(Value::Null),
                }
            }
            Expr::Index { base, index } => {
                let base = self.eval_expr(base)?;
                let index = self.eval_expr(index)?.unwrap_scalar();
                match base {
                    Value::Json(handle) => match index {
                        // a string index reads an object key, like `x['k']`
                        Value::Str(key) => Ok(Value::Json(handle.child_key(&key))),
                        other => {
                            let position = truncate_to_i64(&other.coerce_number());
                            if position < 0 {
                                if self.ctx.strict() {
                                    return Err(JexError::runtime(format!("negative index {position}")));
                                }
                                return Ok(Value::Null);
                            }
                            let child = handle.child_index(position as usize);
                            if self.ctx.strict() {
                                let exists = child.with_value(|n| n.is_some());
                                if !exists {
                                    return Err(JexError::runtime(format!("missing index [{position}]")));
                                }
                            }
                            Ok(Value::Json(child))
                        }
                    },
                    _ if self.ctx.strict() => Err(JexError::runtime(format!(
                        "cannot index into a {} value",
                        base.type_name()
                    ))),
                    _ => Ok(Value::Null),
                }
            }
        }
    }

    fn eval_builtin_var(&self, name: &str) -> JexResult<Value> {
        match name.to_ascii_lowercase().as_str() {
            "in" => Ok(Value::Json(self.ctx.input().clone())),
            "out" => Ok(Value::Json(self.ctx.output().clone())),
            "meta" => Ok(self
                .ctx
                .meta()
                .map_or(Value::Null, |handle| Value::Json(handle.clone()))),
            _ => Err(JexError::runtime(format!("unknown built-in variable `${name}`"))),
        }
    }

    /// A `$.…` literal in expression position reads from the input: a plain
    /// segment chain becomes a live handle into `$in`; a wildcard path
    /// collects every match into a fresh array.
    fn eval_json_path(&mut self, path: &str) -> JexResult<Value> {
        if path.contains("[*]") {
            let matches: Result<Vec<JsonValue>, String> = self.ctx.input().with_value(|node| {
                let node = node.unwrap_or(&JsonValue::Null);
                jsonpath_lib::select(node, path)
                    .map(|nodes| nodes.into_iter().cloned().collect())
                    .map_err(|err| format!("invalid path `{path}`: {err}"))
            });
            return Ok(Value::Json(JsonRef::new_root(JsonValue::Array(
                matches.map_err(JexError::runtime)?,
            ))));
        }
        let parsed = parse_path(path).map_err(JexError::runtime)?;
        let handle = self.ctx.input().descend(&parsed.segments);
        if self.ctx.strict() && !handle.with_value(|n| n.is_some()) {
            return Err(JexError::Runtime(
                RuntimeError::new("path does not resolve in $in").with_path(path),
            ));
        }
        Ok(Value::Json(handle))
    }

    fn eval_binary(&mut self, op: BinaryOp, lhs: &ExprNode, rhs: &ExprNode) -> JexResult<Value> {
        // short-circuit forms evaluate the right side only when needed
        match op {
            BinaryOp::And => {
                if !self.eval_expr(lhs)?.coerce_bool() {
                    return Ok(Value::Bool(false));
                }
                return Ok(Value::Bool(self.eval_expr(rhs)?.coerce_bool()));
            }
            BinaryOp::Or => {
                if self.eval_expr(lhs)?.coerce_bool() {
                    return Ok(Value::Bool(true));
                }
                return Ok(Value::Bool(self.eval_expr(rhs)?.coerce_bool()));
            }
            _ => {}
        }

        let lhs = self.eval_expr(lhs)?;
        let rhs = self.eval_expr(rhs)?;
        match op {
            BinaryOp::Add => {
                let a = lhs.unwrap_scalar();
                let b = rhs.unwrap_scalar();
                if matches!(a, Value::Str(_)) || matches!(b, Value::Str(_)) {
                    Ok(Value::Str(a.coerce_string() + &b.coerce_string()))
                } else {
                    Ok(Value::Number(a.coerce_number() + b.coerce_number()))
                }
            }
            BinaryOp::Sub => Ok(Value::Number(lhs.coerce_number() - rhs.coerce_number())),
            BinaryOp::Mul => Ok(Value::Number(lhs.coerce_number() * rhs.coerce_number())),
            BinaryOp::Div | BinaryOp::Mod => {
                let a = lhs.coerce_number();
                let b = rhs.coerce_number();
                if b.is_zero() {
                    // division and modulo by zero yield 0 (strict mode errors)
                    if self.ctx.strict() {
                        return Err(JexError::runtime(format!(
                            "{} by zero",
                            if op == BinaryOp::Div { "division" } else { "modulo" }
                        )));
                    }
                    return Ok(Value::Number(BigDecimal::zero()));
                }
                Ok(Value::Number(if op == BinaryOp::Div { a / b } else { a % b }))
            }
            BinaryOp::Lt => Ok(Value::Bool(lhs.coerce_number() < rhs.coerce_number())),
            BinaryOp::LtEq => Ok(Value::Bool(lhs.coerce_number() <= rhs.coerce_number())),
            BinaryOp::Gt => Ok(Value::Bool(lhs.coerce_number() > rhs.coerce_number())),
            BinaryOp::GtEq => Ok(Value::Bool(lhs.coerce_number() >= rhs.coerce_number())),
            BinaryOp::Eq => Ok(Value::Bool(lhs.loose_eq(&rhs))),
            BinaryOp::NotEq => Ok(Value::Bool(!lhs.loose_eq(&rhs))),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    /// Call resolution: script functions, then libraries in insertion order,
    /// then the engine registry.
    fn call_function(&mut self, name: &str, args: Vec<Value>) -> JexResult<Value> {
        let program = self.program;
        if let Some(decl) = program.function(name) {
            return self.call_user(decl, args);
        }
        let libraries = self.libraries;
        if let Some(decl) = libraries.find_function(name) {
            return self.call_user(decl, args);
        }
        let registry = self.registry;
        if let Some(entry) = registry.lookup(name) {
            return entry.call(&mut self.ctx, args);
        }
        Err(JexError::runtime(format!("unknown function `{name}`")))
    }

    /// Runs a user or library function body in a fresh barrier scope.
    /// Missing arguments bind Null; extras are ignored.
    fn call_user(&mut self, decl: &FunctionDecl, args: Vec<Value>) -> JexResult<Value> {
        self.ctx.enter_call()?;
        self.ctx.scopes.push(true);
        let mut args = args.into_iter();
        for param in &decl.params {
            self.ctx.scopes.declare(param, args.next().unwrap_or(Value::Null));
        }
        let result = self.run_block(&decl.body);
        self.ctx.scopes.pop();
        self.ctx.exit_call();
        result.map_err(|err| err.with_function(&decl.name))?;
        Ok(self.ctx.flow.take_return())
    }

    /// Macro expansion inside string literals: each `&ident` is replaced by
    /// the string coercion of the variable, in a single left-to-right pass.
    fn expand_macros(&self, text: &str) -> JexResult<String> {
        if !text.contains('&') {
            return Ok(text.to_string());
        }
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch == '&' && matches!(chars.peek(), Some(c) if c.is_ascii_alphabetic() || *c == '_') {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match self.ctx.scopes.get(&name) {
                    Some(value) => out.push_str(&value.coerce_string()),
                    None if self.ctx.strict() => {
                        return Err(JexError::runtime(format!("unknown variable `&{name}` in string literal")));
                    }
                    None => {}
                }
            } else {
                out.push(ch);
            }
        }
        Ok(out)
    }

    /// Path construction from a path expression (Set Form A).
    fn path_string(&mut self, node: &ExprNode) -> JexResult<String> {
        match &node.expr {
            Expr::BuiltInVar(name) => Ok(format!("${}", name.to_ascii_lowercase())),
            Expr::JsonPathLit(path) => Ok(path.clone()),
            // string literal paths are used verbatim, without macro expansion
            Expr::StringLit(text) => Ok(text.clone()),
            Expr::VarRef(name) => Ok(format!("&{name}")),
            Expr::Property { base, name } => Ok(format!("{}.{name}", self.path_string(base)?)),
            Expr::Index { base, index } => {
                let base = self.path_string(base)?;
                let index = self.eval_expr(index)?.coerce_number();
                let position = truncate_to_i64(&index);
                if position < 0 {
                    return Err(JexError::runtime(format!(
                        "path index must be non-negative, got {index}"
                    )));
                }
                Ok(format!("{base}[{position}]"))
            }
            _ => Err(JexError::runtime("expression cannot be used as a set path")),
        }
    }
}

/// Truncates a decimal toward zero, saturating to 0 outside `i64`.
fn truncate_to_i64(value: &BigDecimal) -> i64 {
    value
        .with_scale_round(0, RoundingMode::Down)
        .to_i64()
        .unwrap_or(0)
}
