//! Top-down parser for JEX.
//!
//! Statements dispatch on the leading keyword; expressions use precedence
//! climbing (`||` < `&&` < equality < comparison < additive < multiplicative
//! < unary < postfix). Every statement is terminated by a semicolon, and
//! block closers (`%end`, `%endfunc`) consume one too.
//!
//! `$` handling: `$` followed by `.` starts a JSONPath literal that is
//! reassembled into its canonical string form at parse time; `$` followed by
//! a name is a built-in variable reference.

use num_traits::ToPrimitive;

use crate::ast::{BinaryOp, Expr, ExprNode, FunctionDecl, ParsedScript, Stmt, StmtNode, UnaryOp};
use crate::error::{CompileError, Span};
use crate::lexer::{Keyword, Token, TokenKind, tokenize};

/// Lexes and parses `source` into statements and function declarations.
pub(crate) fn parse(source: &str) -> Result<ParsedScript, CompileError> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).parse_script()
}

/// How a `<block>` was terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockEnd {
    /// `%end ;` was consumed.
    End,
    /// Stopped in front of `%else` (then-branch of an `%if` only).
    Else,
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, index: 0 }
    }

    fn peek(&self) -> &Token {
        // tokenize always appends Eof, and we never advance past it
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_span(&self) -> Span {
        self.peek().span
    }

    fn peek_kind_at(&self, offset: usize) -> &TokenKind {
        let index = (self.index + offset).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    fn prev_span(&self) -> Span {
        self.tokens[self.index.saturating_sub(1)].span
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.index.min(self.tokens.len() - 1)].clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn at_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek_kind(), TokenKind::Keyword(k) if *k == kw)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_here(&self, message: impl Into<String>) -> CompileError {
        CompileError::new(message, self.peek_span())
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, CompileError> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!(
                "expected {}, found {}",
                kind.describe(),
                self.peek_kind().describe()
            )))
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> Result<Token, CompileError> {
        if self.at_keyword(kw) {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!("expected %{kw}, found {}", self.peek_kind().describe())))
        }
    }

    fn expect_semicolon(&mut self) -> Result<(), CompileError> {
        self.expect(&TokenKind::Semicolon).map(|_| ())
    }

    fn expect_ident(&mut self) -> Result<(String, Span), CompileError> {
        match self.peek_kind() {
            TokenKind::Ident(_) => {
                let token = self.advance();
                let TokenKind::Ident(name) = token.kind else {
                    unreachable!("peeked an identifier");
                };
                Ok((name, token.span))
            }
            other => Err(self.error_here(format!("expected an identifier, found {}", other.describe()))),
        }
    }

    // === Statements ===

    fn parse_script(mut self) -> Result<ParsedScript, CompileError> {
        let mut statements = Vec::new();
        let mut functions = Vec::new();
        loop {
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            if self.at(&TokenKind::Eof) {
                return Ok(ParsedScript { statements, functions });
            }
            if self.at_keyword(Keyword::Func) {
                functions.push(self.parse_function()?);
            } else {
                statements.push(self.parse_statement()?);
            }
        }
    }

    fn parse_statement(&mut self) -> Result<StmtNode, CompileError> {
        let start = self.peek_span();
        let stmt = match self.peek_kind() {
            TokenKind::Keyword(Keyword::Let) => self.parse_let()?,
            TokenKind::Keyword(Keyword::Set) => self.parse_set()?,
            TokenKind::Keyword(Keyword::If) => self.parse_if()?,
            TokenKind::Keyword(Keyword::Foreach) => self.parse_foreach()?,
            TokenKind::Keyword(Keyword::Do) => self.parse_do_loop()?,
            TokenKind::Keyword(Keyword::Break) => {
                self.advance();
                self.expect_semicolon()?;
                Stmt::Break
            }
            TokenKind::Keyword(Keyword::Continue) => {
                self.advance();
                self.expect_semicolon()?;
                Stmt::Continue
            }
            TokenKind::Keyword(Keyword::Return) => {
                self.advance();
                let value = if self.at(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.expect_semicolon()?;
                Stmt::Return { value }
            }
            TokenKind::Keyword(Keyword::Func) => {
                return Err(self.error_here("function declarations are only allowed at the top level"));
            }
            TokenKind::Keyword(kw @ (Keyword::End | Keyword::Else | Keyword::Then | Keyword::Endfunc | Keyword::In | Keyword::To)) => {
                return Err(self.error_here(format!("unexpected %{kw}")));
            }
            _ => {
                let expr = self.parse_expression()?;
                self.expect_semicolon()?;
                Stmt::Expression(expr)
            }
        };
        Ok(StmtNode::new(stmt, start.to(self.prev_span())))
    }

    fn parse_let(&mut self) -> Result<Stmt, CompileError> {
        self.expect_keyword(Keyword::Let)?;
        let (name, _) = self.expect_ident()?;
        self.expect(&TokenKind::Assign)?;
        let value = self.parse_expression()?;
        self.expect_semicolon()?;
        Ok(Stmt::Let { name, value })
    }

    /// `%set` has two shapes, told apart by the token after the first
    /// expression: `=` (Form A, path into `$out`) or `,` (Form B,
    /// target/path/value).
    fn parse_set(&mut self) -> Result<Stmt, CompileError> {
        self.expect_keyword(Keyword::Set)?;
        let first = self.parse_expression()?;
        if self.eat(&TokenKind::Assign) {
            let value = self.parse_expression()?;
            self.expect_semicolon()?;
            Ok(Stmt::SetPath { path: first, value })
        } else if self.eat(&TokenKind::Comma) {
            let path = self.parse_expression()?;
            self.expect(&TokenKind::Comma)?;
            let value = self.parse_expression()?;
            self.expect_semicolon()?;
            Ok(Stmt::SetTarget {
                target: first,
                path,
                value,
            })
        } else {
            Err(self.error_here(format!(
                "expected `=` or `,` after %set target, found {}",
                self.peek_kind().describe()
            )))
        }
    }

    fn parse_if(&mut self) -> Result<Stmt, CompileError> {
        self.expect_keyword(Keyword::If)?;
        self.expect(&TokenKind::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RParen)?;
        self.expect_keyword(Keyword::Then)?;
        self.expect_keyword(Keyword::Do)?;
        self.expect_semicolon()?;
        let (then_block, end) = self.parse_block(true)?;
        let else_block = match end {
            BlockEnd::Else => {
                self.expect_keyword(Keyword::Else)?;
                self.expect_keyword(Keyword::Do)?;
                self.expect_semicolon()?;
                let (block, _) = self.parse_block(false)?;
                Some(block)
            }
            BlockEnd::End => None,
        };
        Ok(Stmt::If {
            condition,
            then_block,
            else_block,
        })
    }

    fn parse_foreach(&mut self) -> Result<Stmt, CompileError> {
        self.expect_keyword(Keyword::Foreach)?;
        let (var, _) = self.expect_ident()?;
        self.expect_keyword(Keyword::In)?;
        let collection = self.parse_expression()?;
        self.expect_keyword(Keyword::Do)?;
        self.expect_semicolon()?;
        let (body, _) = self.parse_block(false)?;
        Ok(Stmt::Foreach { var, collection, body })
    }

    fn parse_do_loop(&mut self) -> Result<Stmt, CompileError> {
        self.expect_keyword(Keyword::Do)?;
        let (var, _) = self.expect_ident()?;
        self.expect(&TokenKind::Assign)?;
        let start = self.parse_expression()?;
        self.expect_keyword(Keyword::To)?;
        let end = self.parse_expression()?;
        self.expect_semicolon()?;
        let (body, _) = self.parse_block(false)?;
        Ok(Stmt::DoLoop { var, start, end, body })
    }

    /// Parses statements up to `%end ;` (consumed). With `allow_else`, the
    /// block may instead stop in front of `%else`, which is left for the
    /// caller.
    fn parse_block(&mut self, allow_else: bool) -> Result<(Vec<StmtNode>, BlockEnd), CompileError> {
        let mut statements = Vec::new();
        loop {
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            if self.at_keyword(Keyword::End) {
                self.advance();
                self.expect_semicolon()?;
                return Ok((statements, BlockEnd::End));
            }
            if allow_else && self.at_keyword(Keyword::Else) {
                return Ok((statements, BlockEnd::Else));
            }
            if self.at(&TokenKind::Eof) {
                return Err(self.error_here("unclosed block: expected %end"));
            }
            statements.push(self.parse_statement()?);
        }
    }

    /// `%func NAME ( params? ) ; <statements> %endfunc ;`
    fn parse_function(&mut self) -> Result<FunctionDecl, CompileError> {
        let start = self.peek_span();
        self.expect_keyword(Keyword::Func)?;
        let (name, _) = self.expect_ident()?;
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                let (param, _) = self.expect_ident()?;
                params.push(param);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        self.expect_semicolon()?;

        let mut body = Vec::new();
        loop {
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            if self.at_keyword(Keyword::Endfunc) {
                self.advance();
                self.expect_semicolon()?;
                break;
            }
            if self.at_keyword(Keyword::Func) {
                return Err(self.error_here("function declarations cannot be nested"));
            }
            if self.at(&TokenKind::Eof) {
                return Err(self.error_here("unclosed function: expected %endfunc"));
            }
            body.push(self.parse_statement()?);
        }
        Ok(FunctionDecl {
            name,
            params,
            body,
            span: start.to(self.prev_span()),
        })
    }

    // === Expressions ===

    fn parse_expression(&mut self) -> Result<ExprNode, CompileError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<ExprNode, CompileError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&TokenKind::OrOr) {
            let rhs = self.parse_and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<ExprNode, CompileError> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&TokenKind::AndAnd) {
            let rhs = self.parse_equality()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<ExprNode, CompileError> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<ExprNode, CompileError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::LtEq,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::GtEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<ExprNode, CompileError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<ExprNode, CompileError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<ExprNode, CompileError> {
        let start = self.peek_span();
        let op = match self.peek_kind() {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            let span = start.to(operand.span);
            return Ok(ExprNode::new(
                Expr::Unary {
                    op,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<ExprNode, CompileError> {
        let mut node = self.parse_primary()?;
        loop {
            if self.eat(&TokenKind::Dot) {
                let (name, _) = self.expect_ident()?;
                if self.at(&TokenKind::LParen) {
                    return Err(self.error_here("method calls are not supported; call the function with the value as an argument"));
                }
                let span = node.span.to(self.prev_span());
                node = ExprNode::new(
                    Expr::Property {
                        base: Box::new(node),
                        name,
                    },
                    span,
                );
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.parse_expression()?;
                self.expect(&TokenKind::RBracket)?;
                let span = node.span.to(self.prev_span());
                node = ExprNode::new(
                    Expr::Index {
                        base: Box::new(node),
                        index: Box::new(index),
                    },
                    span,
                );
            } else {
                return Ok(node);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<ExprNode, CompileError> {
        let start = self.peek_span();
        let kind = self.peek_kind().clone();
        match kind {
            TokenKind::Null => {
                self.advance();
                Ok(ExprNode::new(Expr::NullLit, start))
            }
            TokenKind::True => {
                self.advance();
                Ok(ExprNode::new(Expr::BoolLit(true), start))
            }
            TokenKind::False => {
                self.advance();
                Ok(ExprNode::new(Expr::BoolLit(false), start))
            }
            TokenKind::Number(value) => {
                self.advance();
                Ok(ExprNode::new(Expr::NumberLit(value), start))
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok(ExprNode::new(Expr::StringLit(value), start))
            }
            TokenKind::VarRef(name) => {
                self.advance();
                Ok(ExprNode::new(Expr::VarRef(name), start))
            }
            TokenKind::Dollar => self.parse_dollar(),
            TokenKind::Ident(name) => {
                self.advance();
                if self.at(&TokenKind::LParen) {
                    self.parse_call(name, start)
                } else {
                    // a bare identifier reads the variable of that name
                    Ok(ExprNode::new(Expr::VarRef(name), start))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                Ok(ExprNode::new(inner.expr, start.to(self.prev_span())))
            }
            TokenKind::LBrace => self.parse_object_literal(),
            TokenKind::LBracket => self.parse_array_literal(),
            other => Err(self.error_here(format!("expected an expression, found {}", other.describe()))),
        }
    }

    fn parse_call(&mut self, name: String, start: Span) -> Result<ExprNode, CompileError> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(ExprNode::new(
            Expr::Call { name, args },
            start.to(self.prev_span()),
        ))
    }

    /// `$` followed by `.` or `[` begins a JSONPath literal; `$name` is a
    /// built-in variable. The path is reassembled in canonical form:
    /// `$.a.b[0]`, `$.a['k']`, `$.a[*]`.
    fn parse_dollar(&mut self) -> Result<ExprNode, CompileError> {
        let start = self.peek_span();
        self.expect(&TokenKind::Dollar)?;
        match self.peek_kind() {
            TokenKind::Dot => {
                let mut path = String::from("$");
                loop {
                    if self.eat(&TokenKind::Dot) {
                        let (name, _) = self.expect_ident()?;
                        path.push('.');
                        path.push_str(&name);
                    } else if self.at(&TokenKind::LBracket)
                        && matches!(
                            self.peek_kind_at(1),
                            TokenKind::Number(_) | TokenKind::Str(_) | TokenKind::Star
                        )
                    {
                        self.advance();
                        match self.peek_kind().clone() {
                            TokenKind::Number(n) => {
                                self.advance();
                                let Some(index) = n.to_u64().filter(|_| n.is_integer()) else {
                                    return Err(CompileError::new(
                                        format!("path index must be a non-negative integer, found `{n}`"),
                                        self.prev_span(),
                                    ));
                                };
                                path.push_str(&format!("[{index}]"));
                            }
                            TokenKind::Str(key) => {
                                self.advance();
                                path.push_str(&format!("['{key}']"));
                            }
                            TokenKind::Star => {
                                self.advance();
                                path.push_str("[*]");
                            }
                            other => {
                                return Err(self.error_here(format!(
                                    "expected an index, a quoted key, or `*` in path segment, found {}",
                                    other.describe()
                                )));
                            }
                        }
                        self.expect(&TokenKind::RBracket)?;
                    } else {
                        break;
                    }
                }
                Ok(ExprNode::new(Expr::JsonPathLit(path), start.to(self.prev_span())))
            }
            TokenKind::Ident(_) => {
                let (name, _) = self.expect_ident()?;
                Ok(ExprNode::new(Expr::BuiltInVar(name), start.to(self.prev_span())))
            }
            other => Err(self.error_here(format!(
                "expected `.` or a built-in variable name after `$`, found {}",
                other.describe()
            ))),
        }
    }

    fn parse_object_literal(&mut self) -> Result<ExprNode, CompileError> {
        let start = self.peek_span();
        self.expect(&TokenKind::LBrace)?;
        let mut entries = Vec::new();
        if !self.at(&TokenKind::RBrace) {
            loop {
                let key = match self.peek_kind().clone() {
                    TokenKind::Str(key) => {
                        self.advance();
                        key
                    }
                    TokenKind::Ident(key) => {
                        self.advance();
                        key
                    }
                    other => {
                        return Err(self.error_here(format!(
                            "expected an object key (identifier or string), found {}",
                            other.describe()
                        )));
                    }
                };
                self.expect(&TokenKind::Colon)?;
                let value = self.parse_expression()?;
                entries.push((key, value));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(ExprNode::new(Expr::ObjectLit(entries), start.to(self.prev_span())))
    }

    fn parse_array_literal(&mut self) -> Result<ExprNode, CompileError> {
        let start = self.peek_span();
        self.expect(&TokenKind::LBracket)?;
        let mut items = Vec::new();
        if !self.at(&TokenKind::RBracket) {
            loop {
                items.push(self.parse_expression()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBracket)?;
        Ok(ExprNode::new(Expr::ArrayLit(items), start.to(self.prev_span())))
    }
}

fn binary(op: BinaryOp, lhs: ExprNode, rhs: ExprNode) -> ExprNode {
    let span = lhs.span.to(rhs.span);
    ExprNode::new(
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    )
}

#[cfg(test)]
mod tests {
    use bigdecimal::BigDecimal;

    use super::*;

    fn parse_one(source: &str) -> Stmt {
        let script = parse(source).unwrap();
        assert_eq!(script.statements.len(), 1, "expected one statement");
        script.statements.into_iter().next().unwrap().stmt
    }

    #[test]
    fn let_statement() {
        let Stmt::Let { name, value } = parse_one("%let x = 1 + 2;") else {
            panic!("expected %let");
        };
        assert_eq!(name, "x");
        assert!(matches!(value.expr, Expr::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn set_form_a_and_b() {
        assert!(matches!(parse_one("%set $.a.b = 1;"), Stmt::SetPath { .. }));
        assert!(matches!(
            parse_one("%set &t, \"a.b\", 1;"),
            Stmt::SetTarget { .. }
        ));
    }

    #[test]
    fn precedence() {
        let Stmt::Expression(expr) = parse_one("1 + 2 * 3 == 7 && true;") else {
            panic!("expected expression statement");
        };
        // && binds loosest here
        assert!(matches!(expr.expr, Expr::Binary { op: BinaryOp::And, .. }));
    }

    #[test]
    fn json_path_literal_is_canonical() {
        let Stmt::Expression(expr) = parse_one("$.a.b[0][\"k\"][*];") else {
            panic!("expected expression statement");
        };
        assert_eq!(expr.expr, Expr::JsonPathLit("$.a.b[0]['k'][*]".to_string()));
    }

    #[test]
    fn dollar_ident_is_builtin_var() {
        let Stmt::Expression(expr) = parse_one("$in;") else {
            panic!("expected expression statement");
        };
        assert_eq!(expr.expr, Expr::BuiltInVar("in".to_string()));
    }

    #[test]
    fn if_with_else() {
        let stmt = parse_one("%if (&x == 1) %then %do; %let y = 1; %else %do; %let y = 2; %end;");
        let Stmt::If {
            then_block,
            else_block,
            ..
        } = stmt
        else {
            panic!("expected %if");
        };
        assert_eq!(then_block.len(), 1);
        assert_eq!(else_block.unwrap().len(), 1);
    }

    #[test]
    fn if_without_else_closed_by_end() {
        let stmt = parse_one("%if (true) %then %do; %let y = 1; %end;");
        let Stmt::If { else_block, .. } = stmt else {
            panic!("expected %if");
        };
        assert!(else_block.is_none());
    }

    #[test]
    fn foreach_and_do_loops() {
        assert!(matches!(
            parse_one("%foreach item %in $.items %do; %break; %end;"),
            Stmt::Foreach { .. }
        ));
        let Stmt::DoLoop { var, .. } = parse_one("%do i = 1 %to 10; %continue; %end;") else {
            panic!("expected %do loop");
        };
        assert_eq!(var, "i");
    }

    #[test]
    fn function_declaration() {
        let script = parse("%func add(a, b); %return &a + &b; %endfunc;").unwrap();
        assert!(script.statements.is_empty());
        assert_eq!(script.functions.len(), 1);
        assert_eq!(script.functions[0].name, "add");
        assert_eq!(script.functions[0].params, vec!["a", "b"]);
    }

    #[test]
    fn function_body_may_contain_end_blocks() {
        let script = parse(
            "%func f(n); %if (&n <= 1) %then %do; %return 1; %end; %return &n; %endfunc;",
        )
        .unwrap();
        assert_eq!(script.functions[0].body.len(), 2);
    }

    #[test]
    fn nested_function_is_rejected() {
        assert!(parse("%func f(); %func g(); %endfunc; %endfunc;").is_err());
    }

    #[test]
    fn method_call_is_rejected() {
        assert!(parse("&x.foo();").is_err());
    }

    #[test]
    fn missing_semicolon_is_rejected() {
        assert!(parse("%let x = 1").is_err());
    }

    #[test]
    fn empty_statements_are_skipped() {
        let script = parse(";; %let x = 1; ;;").unwrap();
        assert_eq!(script.statements.len(), 1);
    }

    #[test]
    fn object_and_array_literals() {
        let Stmt::Expression(expr) = parse_one("{ a: 1, \"b c\": [2, 3] };") else {
            panic!("expected expression statement");
        };
        let Expr::ObjectLit(entries) = expr.expr else {
            panic!("expected object literal");
        };
        assert_eq!(entries[0].0, "a");
        assert_eq!(entries[1].0, "b c");
        assert!(matches!(entries[1].1.expr, Expr::ArrayLit(_)));
    }

    #[test]
    fn unary_and_numbers() {
        let Stmt::Expression(expr) = parse_one("-1.5;") else {
            panic!("expected expression statement");
        };
        let Expr::Unary { op: UnaryOp::Neg, operand } = expr.expr else {
            panic!("expected negation");
        };
        assert_eq!(
            operand.expr,
            Expr::NumberLit("1.5".parse::<BigDecimal>().unwrap())
        );
    }
}
