//! Unit expression lexer and parser.
//!
//! Grammar (juxtaposition is multiplication, `^` is an alias for `**`):
//!
//! ```text
//! expr   := unary (('*' | '/' | <implicit>) unary)*
//! unary  := ('-' | '+') unary | power
//! power  := atom (('**' | '^') exponent)?
//! atom   := number | identifier | '(' expr ')'
//! ```
//!
//! Exponents are integers, optionally signed or parenthesized, and at most
//! [`MAX_EXPONENT`] in magnitude. Nesting of parentheses and unary signs is
//! limited to [`MAX_NESTING`] levels.

use std::fmt;

use crate::dimension::MAX_EXPONENT;
use crate::error::{EngineError, EngineResult};

/// Deepest nesting of `(`, unary `-`/`+` and exponent signs the parser accepts.
pub const MAX_NESTING: usize = 64;

/// Parsed unit expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Unit(String),
    Neg(Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, i32),
}

impl Expr {
    /// Parse `input` into an expression tree.
    pub fn parse(input: &str) -> EngineResult<Expr> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(EngineError::parse(input, "empty expression"));
        }
        let mut parser = Parser {
            input,
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(EngineError::parse(
                input,
                format!("unexpected {}", parser.tokens[parser.pos].describe()),
            ));
        }
        Ok(expr)
    }

    /// Evaluate a purely numeric expression; `None` if any unit appears.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Expr::Number(v) => Some(*v),
            Expr::Unit(_) => None,
            Expr::Neg(e) => e.as_number().map(|v| -v),
            Expr::Mul(a, b) => Some(a.as_number()? * b.as_number()?),
            Expr::Div(a, b) => Some(a.as_number()? / b.as_number()?),
            Expr::Pow(e, n) => e.as_number().map(|v| v.powi(*n)),
        }
    }

    /// Whether the expression mentions `token` anywhere.
    pub fn references(&self, token: &str) -> bool {
        match self {
            Expr::Number(_) => false,
            Expr::Unit(t) => t == token,
            Expr::Neg(e) | Expr::Pow(e, _) => e.references(token),
            Expr::Mul(a, b) | Expr::Div(a, b) => a.references(token) || b.references(token),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(v) => write!(f, "{v}"),
            Expr::Unit(name) => f.write_str(name),
            Expr::Neg(e) => write!(f, "-{e}"),
            Expr::Mul(a, b) => write!(f, "({a} * {b})"),
            Expr::Div(a, b) => write!(f, "({a} / {b})"),
            Expr::Pow(e, n) => write!(f, "{e} ** {n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Star,
    Slash,
    Pow,
    Minus,
    Plus,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(v) => format!("number {v}"),
            Token::Ident(s) => format!("identifier '{s}'"),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
            Token::Pow => "'**'".into(),
            Token::Minus => "'-'".into(),
            Token::Plus => "'+'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
        }
    }

    fn starts_operand(&self) -> bool {
        matches!(self, Token::Number(_) | Token::Ident(_) | Token::LParen)
    }
}

/// Identifier characters: letters (including `µ`), digits, `_`.
pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn tokenize(input: &str) -> EngineResult<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()))
        {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            // Exponent only when digits follow, so `2 eV` stays two tokens.
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().collect();
            let value: f64 = text
                .parse()
                .map_err(|_| EngineError::parse(input, format!("invalid number '{text}'")))?;
            tokens.push(Token::Number(value));
            continue;
        }

        if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let token = match text.as_str() {
                "NaN" | "nan" => Token::Number(f64::NAN),
                "inf" | "Infinity" => Token::Number(f64::INFINITY),
                _ => Token::Ident(text),
            };
            tokens.push(token);
            continue;
        }

        let token = match c {
            '*' if chars.get(i + 1) == Some(&'*') => {
                i += 1;
                Token::Pow
            }
            '*' => Token::Star,
            '^' => Token::Pow,
            '/' => Token::Slash,
            '-' => Token::Minus,
            '+' => Token::Plus,
            '(' => Token::LParen,
            ')' => Token::RParen,
            other => {
                return Err(EngineError::parse(
                    input,
                    format!("unexpected character '{other}'"),
                ));
            }
        };
        tokens.push(token);
        i += 1;
    }

    Ok(tokens)
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn error(&self, reason: impl Into<String>) -> EngineError {
        EngineError::parse(self.input, reason)
    }

    /// Run `f` one nesting level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> EngineResult<T>) -> EngineResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("nested deeper than {MAX_NESTING} levels")));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expr(&mut self) -> EngineResult<Expr> {
        let mut lhs = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    lhs = Expr::Mul(Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    lhs = Expr::Div(Box::new(lhs), Box::new(rhs));
                }
                Some(tok) if tok.starts_operand() => {
                    let rhs = self.unary()?;
                    lhs = Expr::Mul(Box::new(lhs), Box::new(rhs));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn unary(&mut self) -> EngineResult<Expr> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                let inner = self.nested(Self::unary)?;
                Ok(Expr::Neg(Box::new(inner)))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.nested(Self::unary)
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> EngineResult<Expr> {
        let base = self.atom()?;
        if self.peek() == Some(&Token::Pow) {
            self.pos += 1;
            let exp = self.exponent()?;
            return Ok(Expr::Pow(Box::new(base), exp));
        }
        Ok(base)
    }

    fn exponent(&mut self) -> EngineResult<i32> {
        match self.next() {
            Some(Token::Minus) => Ok(-self.nested(Self::exponent)?),
            Some(Token::Plus) => self.nested(Self::exponent),
            Some(Token::LParen) => {
                let value = self.nested(Self::exponent)?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(self.error("expected ')' after exponent")),
                }
            }
            Some(Token::Number(v)) if v.fract() == 0.0 && v.abs() <= f64::from(MAX_EXPONENT) => {
                Ok(v as i32)
            }
            Some(Token::Number(v)) if v.fract() == 0.0 => Err(self.error(format!(
                "exponent {v} is larger than {MAX_EXPONENT}"
            ))),
            Some(Token::Number(v)) => Err(self.error(format!("non-integer exponent {v}"))),
            Some(tok) => Err(self.error(format!("expected exponent, found {}", tok.describe()))),
            None => Err(self.error("expected exponent, found end of input")),
        }
    }

    fn atom(&mut self) -> EngineResult<Expr> {
        match self.next() {
            Some(Token::Number(v)) => Ok(Expr::Number(v)),
            Some(Token::Ident(name)) => Ok(Expr::Unit(name)),
            Some(Token::LParen) => {
                let inner = self.nested(Self::expr)?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.error("unbalanced parentheses")),
                }
            }
            Some(tok) => Err(self.error(format!("unexpected {}", tok.describe()))),
            None => Err(self.error("unexpected end of input")),
        }
    }
}
