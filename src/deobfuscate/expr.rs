//! Arithmetic evaluator for the small expressions obfuscators emit inside tables.
//!
//! Only numeric literals, `+ - * / % **`, unary signs and parentheses are
//! accepted. Anything else is rejected before evaluation, and [`evaluate`] turns
//! every rejection into `0`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Real(f64),
}

impl Number {
    /// Integer view used for table indices; reals are truncated.
    pub const fn as_index(self) -> i64 {
        match self {
            Self::Int(v) => v,
            Self::Real(v) => v as i64,
        }
    }

    /// The value as an integer if it has no fractional part.
    pub fn as_exact_int(self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(v),
            Self::Real(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => Some(v as i64),
            Self::Real(_) => None,
        }
    }

    const fn as_real(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Real(v) => v,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,

    #[error("disallowed construct: {0}")]
    Disallowed(String),

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic overflow")]
    Overflow,
}

type ExprResult<T> = std::result::Result<T, ExprError>;

#[derive(Debug, Clone, Copy, PartialEq)]
enum ExprToken {
    Num(Number),
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    Percent,
    LParen,
    RParen,
}

/// Evaluates `expr`, or returns `0` if it is empty, malformed or contains
/// anything other than plain arithmetic.
pub fn evaluate(expr: &str) -> Number {
    try_evaluate(expr).unwrap_or(Number::Int(0))
}

pub fn try_evaluate(expr: &str) -> ExprResult<Number> {
    let tokens = tokenize(expr.trim())?;
    if tokens.is_empty() {
        return Err(ExprError::Empty);
    }

    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(ExprError::Syntax("trailing input".to_string()));
    }
    Ok(value)
}

fn tokenize(expr: &str) -> ExprResult<Vec<ExprToken>> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let token = match ch {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '+' => ExprToken::Plus,
            '-' => ExprToken::Minus,
            '*' if chars.get(i + 1) == Some(&'*') => {
                i += 1;
                ExprToken::DoubleStar
            }
            '*' => ExprToken::Star,
            '/' => ExprToken::Slash,
            '%' => ExprToken::Percent,
            '(' => ExprToken::LParen,
            ')' => ExprToken::RParen,
            c if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) => {
                let (number, len) = read_number(&chars[i..])?;
                tokens.push(ExprToken::Num(number));
                i += len;
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                let name: String = chars[i..]
                    .iter()
                    .take_while(|c| c.is_alphanumeric() || **c == '_')
                    .collect();
                return Err(ExprError::Disallowed(format!("name `{name}`")));
            }
            c => return Err(ExprError::Disallowed(format!("character `{c}`"))),
        };
        tokens.push(token);
        i += 1;
    }

    Ok(tokens)
}

fn read_number(chars: &[char]) -> ExprResult<(Number, usize)> {
    if chars.len() > 1 && chars[0] == '0' {
        let radix = match chars[1] {
            'x' | 'X' => Some(16),
            'o' | 'O' => Some(8),
            'b' | 'B' => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            let digits: String = chars[2..]
                .iter()
                .take_while(|c| c.is_ascii_alphanumeric() || **c == '_')
                .collect();
            let len = 2 + digits.chars().count();
            let cleaned = digits.replace('_', "");
            let value = i64::from_str_radix(&cleaned, radix)
                .map_err(|e| ExprError::Syntax(format!("bad literal: {e}")))?;
            return Ok((Number::Int(value), len));
        }
    }

    let mut len = 0;
    let mut is_real = false;
    while len < chars.len() && (chars[len].is_ascii_digit() || chars[len] == '_') {
        len += 1;
    }
    if chars.get(len) == Some(&'.') {
        is_real = true;
        len += 1;
        while len < chars.len() && (chars[len].is_ascii_digit() || chars[len] == '_') {
            len += 1;
        }
    }
    if matches!(chars.get(len), Some('e' | 'E')) {
        let mut exp_len = len + 1;
        if matches!(chars.get(exp_len), Some('+' | '-')) {
            exp_len += 1;
        }
        if chars.get(exp_len).is_some_and(char::is_ascii_digit) {
            is_real = true;
            len = exp_len;
            while len < chars.len() && chars[len].is_ascii_digit() {
                len += 1;
            }
        }
    }

    let text: String = chars[..len].iter().filter(|c| **c != '_').collect();
    if chars.get(len).is_some_and(|c| c.is_alphanumeric() || *c == '_' || *c == '.') {
        return Err(ExprError::Syntax(format!("malformed number near `{text}`")));
    }

    if is_real {
        let value: f64 = text
            .parse()
            .map_err(|_| ExprError::Syntax(format!("bad real `{text}`")))?;
        return Ok((Number::Real(value), len));
    }

    if text.len() > 1 && text.starts_with('0') && text.chars().any(|c| c != '0') {
        return Err(ExprError::Syntax(format!("leading zero in `{text}`")));
    }
    let value: i64 = text.parse().map_err(|_| ExprError::Overflow)?;
    Ok((Number::Int(value), len))
}

struct Parser {
    tokens: Vec<ExprToken>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<ExprToken> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<ExprToken> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    fn parse_expr(&mut self) -> ExprResult<Number> {
        let mut left = self.parse_term()?;
        loop {
            match self.peek() {
                Some(ExprToken::Plus) => {
                    self.pos += 1;
                    left = add(left, self.parse_term()?)?;
                }
                Some(ExprToken::Minus) => {
                    self.pos += 1;
                    left = sub(left, self.parse_term()?)?;
                }
                _ => return Ok(left),
            }
        }
    }

    fn parse_term(&mut self) -> ExprResult<Number> {
        let mut left = self.parse_unary()?;
        loop {
            match self.peek() {
                Some(ExprToken::Star) => {
                    self.pos += 1;
                    left = mul(left, self.parse_unary()?)?;
                }
                Some(ExprToken::Slash) => {
                    self.pos += 1;
                    left = div(left, self.parse_unary()?)?;
                }
                Some(ExprToken::Percent) => {
                    self.pos += 1;
                    left = rem(left, self.parse_unary()?)?;
                }
                _ => return Ok(left),
            }
        }
    }

    fn parse_unary(&mut self) -> ExprResult<Number> {
        match self.peek() {
            Some(ExprToken::Plus) => {
                self.pos += 1;
                self.parse_unary()
            }
            Some(ExprToken::Minus) => {
                self.pos += 1;
                neg(self.parse_unary()?)
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> ExprResult<Number> {
        let base = self.parse_atom()?;
        if self.peek() == Some(ExprToken::DoubleStar) {
            self.pos += 1;
            let exponent = self.parse_unary()?;
            return pow(base, exponent);
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> ExprResult<Number> {
        match self.bump() {
            Some(ExprToken::Num(n)) => Ok(n),
            Some(ExprToken::LParen) => {
                let value = self.parse_expr()?;
                match self.bump() {
                    Some(ExprToken::RParen) => Ok(value),
                    _ => Err(ExprError::Syntax("unclosed parenthesis".to_string())),
                }
            }
            Some(other) => Err(ExprError::Syntax(format!("unexpected {other:?}"))),
            None => Err(ExprError::Syntax("unexpected end".to_string())),
        }
    }
}

fn finite(value: f64) -> ExprResult<Number> {
    if value.is_finite() {
        Ok(Number::Real(value))
    } else {
        Err(ExprError::Overflow)
    }
}

fn add(a: Number, b: Number) -> ExprResult<Number> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x.checked_add(y).map(Number::Int).ok_or(ExprError::Overflow),
        _ => finite(a.as_real() + b.as_real()),
    }
}

fn sub(a: Number, b: Number) -> ExprResult<Number> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x.checked_sub(y).map(Number::Int).ok_or(ExprError::Overflow),
        _ => finite(a.as_real() - b.as_real()),
    }
}

fn mul(a: Number, b: Number) -> ExprResult<Number> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x.checked_mul(y).map(Number::Int).ok_or(ExprError::Overflow),
        _ => finite(a.as_real() * b.as_real()),
    }
}

fn div(a: Number, b: Number) -> ExprResult<Number> {
    if b.as_real() == 0.0 {
        return Err(ExprError::DivisionByZero);
    }
    finite(a.as_real() / b.as_real())
}

/// Modulo with the sign of the divisor.
fn rem(a: Number, b: Number) -> ExprResult<Number> {
    match (a, b) {
        (_, Number::Int(0)) => Err(ExprError::DivisionByZero),
        (Number::Int(x), Number::Int(y)) => {
            let r = x.checked_rem(y).ok_or(ExprError::Overflow)?;
            if r != 0 && (r < 0) != (y < 0) {
                Ok(Number::Int(r + y))
            } else {
                Ok(Number::Int(r))
            }
        }
        _ => {
            let (x, y) = (a.as_real(), b.as_real());
            if y == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            let r = x % y;
            if r != 0.0 && (r < 0.0) != (y < 0.0) {
                finite(r + y)
            } else {
                finite(r)
            }
        }
    }
}

fn neg(a: Number) -> ExprResult<Number> {
    match a {
        Number::Int(x) => x.checked_neg().map(Number::Int).ok_or(ExprError::Overflow),
        Number::Real(x) => Ok(Number::Real(-x)),
    }
}

fn pow(base: Number, exponent: Number) -> ExprResult<Number> {
    match (base, exponent) {
        (Number::Int(x), Number::Int(y)) if y >= 0 => {
            let y = u32::try_from(y).map_err(|_| ExprError::Overflow)?;
            x.checked_pow(y).map(Number::Int).ok_or(ExprError::Overflow)
        }
        _ => {
            let (x, y) = (base.as_real(), exponent.as_real());
            if x == 0.0 && y < 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            let value = x.powf(y);
            if value.is_nan() {
                return Err(ExprError::Syntax("no real result".to_string()));
            }
            finite(value)
        }
    }
}
