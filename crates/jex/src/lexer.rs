//! Hand-written lexer for JEX source text.
//!
//! Produces a flat token stream with source spans. The interesting corners are
//! the disambiguations the grammar requires:
//! - `%` followed by an alphabetic character starts a keyword (matched
//!   case-insensitively against the keyword table); any other `%` is modulo.
//! - `&&` is logical AND; `&` followed by an identifier start is a variable
//!   reference; anything else after `&` is an error.
//! - `|` must pair up into `||`.
//! - `=`/`==`, `!`/`!=`, `<`/`<=`, `>`/`>=` follow maximal munch.
//!
//! Comments (`// …` and non-nesting `/* … */`) and whitespace are skipped.
//! Number literals parse into `BigDecimal` here; string literals are unescaped
//! here. `true`/`false`/`null` are literal tokens, not keywords.

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use strum::EnumString;

use crate::error::{CompileError, Pos, Span};

/// The `%`-prefixed keywords, matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, strum::Display)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub(crate) enum Keyword {
    Let,
    Set,
    If,
    Then,
    Else,
    Do,
    End,
    Foreach,
    In,
    To,
    Break,
    Continue,
    Return,
    Func,
    Endfunc,
}

/// A lexical token. Literal payloads are fully decoded here.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Keyword(Keyword),
    Ident(String),
    /// `&name` variable reference.
    VarRef(String),
    Number(BigDecimal),
    /// String literal, already unescaped.
    Str(String),
    True,
    False,
    Null,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Bang,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,
    Dollar,

    Eof,
}

impl TokenKind {
    /// Short description used in parser diagnostics.
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Keyword(kw) => format!("%{kw}"),
            Self::Ident(name) => format!("identifier `{name}`"),
            Self::VarRef(name) => format!("variable `&{name}`"),
            Self::Number(n) => format!("number `{n}`"),
            Self::Str(_) => "string literal".to_string(),
            Self::True => "`true`".to_string(),
            Self::False => "`false`".to_string(),
            Self::Null => "`null`".to_string(),
            Self::Plus => "`+`".to_string(),
            Self::Minus => "`-`".to_string(),
            Self::Star => "`*`".to_string(),
            Self::Slash => "`/`".to_string(),
            Self::Percent => "`%`".to_string(),
            Self::Assign => "`=`".to_string(),
            Self::EqEq => "`==`".to_string(),
            Self::NotEq => "`!=`".to_string(),
            Self::Lt => "`<`".to_string(),
            Self::LtEq => "`<=`".to_string(),
            Self::Gt => "`>`".to_string(),
            Self::GtEq => "`>=`".to_string(),
            Self::AndAnd => "`&&`".to_string(),
            Self::OrOr => "`||`".to_string(),
            Self::Bang => "`!`".to_string(),
            Self::LParen => "`(`".to_string(),
            Self::RParen => "`)`".to_string(),
            Self::LBrace => "`{`".to_string(),
            Self::RBrace => "`}`".to_string(),
            Self::LBracket => "`[`".to_string(),
            Self::RBracket => "`]`".to_string(),
            Self::Comma => "`,`".to_string(),
            Self::Semicolon => "`;`".to_string(),
            Self::Colon => "`:`".to_string(),
            Self::Dot => "`.`".to_string(),
            Self::Dollar => "`$`".to_string(),
            Self::Eof => "end of input".to_string(),
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// A spanned token.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Tokenizes `source`, returning the token stream terminated by an `Eof` token.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    Lexer::new(source).run()
}

/// Character cursor with line/column tracking.
struct Lexer<'a> {
    source: &'a str,
    offset: usize,
    line: u32,
    column: u32,
    /// Position where the token currently being lexed started.
    token_start: Pos,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            offset: 0,
            line: 1,
            column: 1,
            token_start: Pos::new(1, 1, 0),
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.offset..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.source[self.offset..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn bump_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn pos(&self) -> Pos {
        Pos::new(self.line, self.column, self.offset as u32)
    }

    fn span_from_start(&self) -> Span {
        Span::new(self.token_start, self.pos())
    }

    fn push(&mut self, kind: TokenKind) {
        let span = self.span_from_start();
        self.tokens.push(Token { kind, span });
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::new(message, self.span_from_start())
    }

    fn run(mut self) -> Result<Vec<Token>, CompileError> {
        loop {
            self.skip_trivia()?;
            self.token_start = self.pos();
            let Some(ch) = self.peek() else {
                self.push(TokenKind::Eof);
                return Ok(self.tokens);
            };
            match ch {
                c if c.is_ascii_alphabetic() || c == '_' => self.lex_word(),
                c if c.is_ascii_digit() => self.lex_number()?,
                '"' => self.lex_string()?,
                '%' => self.lex_percent()?,
                '&' => self.lex_ampersand()?,
                '|' => self.lex_pipe()?,
                _ => self.lex_operator()?,
            }
        }
    }

    /// Skips whitespace, line comments, and non-nesting block comments.
    fn skip_trivia(&mut self) -> Result<(), CompileError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_second() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek_second() == Some('*') => {
                    self.token_start = self.pos();
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            None => return Err(self.error("unterminated block comment")),
                            Some('*') if self.peek_second() == Some('/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn take_ident(&mut self) -> String {
        let start = self.offset;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        self.source[start..self.offset].to_string()
    }

    fn lex_word(&mut self) {
        let word = self.take_ident();
        let kind = if word.eq_ignore_ascii_case("true") {
            TokenKind::True
        } else if word.eq_ignore_ascii_case("false") {
            TokenKind::False
        } else if word.eq_ignore_ascii_case("null") {
            TokenKind::Null
        } else {
            TokenKind::Ident(word)
        };
        self.push(kind);
    }

    fn lex_number(&mut self) -> Result<(), CompileError> {
        let start = self.offset;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') && matches!(self.peek_second(), Some(c) if c.is_ascii_digit()) {
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        let text = &self.source[start..self.offset];
        // a trailing dot like `1.` is left to the parser as `1` followed by `.`
        match BigDecimal::from_str(text) {
            Ok(value) => {
                self.push(TokenKind::Number(value));
                Ok(())
            }
            Err(_) => Err(self.error(format!("invalid number literal `{text}`"))),
        }
    }

    fn lex_string(&mut self) -> Result<(), CompileError> {
        self.bump(); // opening quote
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string literal")),
                Some('"') => break,
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('r') => value.push('\r'),
                    Some('t') => value.push('\t'),
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some(c) => return Err(self.error(format!("invalid escape sequence `\\{c}`"))),
                    None => return Err(self.error("unterminated string literal")),
                },
                Some('\n') => return Err(self.error("unterminated string literal")),
                Some(c) => value.push(c),
            }
        }
        self.push(TokenKind::Str(value));
        Ok(())
    }

    fn lex_percent(&mut self) -> Result<(), CompileError> {
        self.bump(); // %
        if matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
            let word = self.take_ident();
            match Keyword::from_str(&word) {
                Ok(kw) => self.push(TokenKind::Keyword(kw)),
                Err(_) => return Err(self.error(format!("unrecognized keyword `%{word}`"))),
            }
        } else {
            self.push(TokenKind::Percent);
        }
        Ok(())
    }

    fn lex_ampersand(&mut self) -> Result<(), CompileError> {
        self.bump(); // &
        if self.bump_if('&') {
            self.push(TokenKind::AndAnd);
            return Ok(());
        }
        if matches!(self.peek(), Some(c) if c.is_ascii_alphabetic() || c == '_') {
            let name = self.take_ident();
            self.push(TokenKind::VarRef(name));
            Ok(())
        } else {
            Err(self.error("expected `&&` or a variable name after `&`"))
        }
    }

    fn lex_pipe(&mut self) -> Result<(), CompileError> {
        self.bump(); // |
        if self.bump_if('|') {
            self.push(TokenKind::OrOr);
            Ok(())
        } else {
            Err(self.error("expected `||`; a lone `|` is not an operator"))
        }
    }

    fn lex_operator(&mut self) -> Result<(), CompileError> {
        let ch = self.bump().expect("caller checked peek");
        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '=' => {
                if self.bump_if('=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.bump_if('=') {
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if self.bump_if('=') {
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.bump_if('=') {
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            '$' => TokenKind::Dollar,
            other => return Err(self.error(format!("unexpected character `{other}`"))),
        };
        self.push(kind);
        Ok(())
    }
}
