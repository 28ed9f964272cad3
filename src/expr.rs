//! Arithmetic on numeric input typed by the user.
//!
//! Numeric items accept entries such as `2*(3+4)/7` or `1e-3`.  Only number literals, `+ - * /`,
//! `//`, `**` and parentheses are understood; anything else fails.  Integers stay integers
//! until a true division or a float operand is involved, as in Python.

use std::sync::OnceLock;

use regex::Regex;

/// Nesting allowed for parentheses and sign prefixes before input is rejected.
const MAX_DEPTH: usize = 256;

/// Result of evaluating an expression.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn to_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(x) => x,
        }
    }

    /// Python's `int()`: floats truncate toward zero.
    pub fn to_i64(self) -> Option<i64> {
        match self {
            Number::Int(i) => Some(i),
            Number::Float(x) if x.is_finite() && x.abs() < 9.2e18 => Some(x.trunc() as i64),
            Number::Float(_) => None,
        }
    }
}

fn allowed_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([\d()+/\-*.]|e)+$").expect("valid regex"))
}

/// Evaluate `input`, or `None` if it contains anything but plain arithmetic.
///
/// ```
/// use guidata::expr::{evaluate, Number};
///
/// assert_eq!(evaluate("2*(3+4)"), Some(Number::Int(14)));
/// assert_eq!(evaluate("7/2"), Some(Number::Float(3.5)));
/// assert_eq!(evaluate("1e3"), Some(Number::Float(1000.0)));
/// assert_eq!(evaluate("abs(-1)"), None);
/// ```
pub fn evaluate(input: &str) -> Option<Number> {
    if !allowed_chars().is_match(input) {
        return None;
    }
    let mut parser = Parser { src: input.as_bytes(), pos: 0, depth: 0 };
    let value = parser.expr()?;
    match parser.pos == parser.src.len() {
        true => Some(value),
        false => None,
    }
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> { self.src.get(self.pos).copied() }

    /// Run `f` one level deeper, failing once `MAX_DEPTH` is exceeded.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        if self.depth >= MAX_DEPTH {
            return None;
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    fn eat(&mut self, token: &[u8]) -> bool {
        if self.src[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Option<Number> {
        let mut acc = self.term()?;
        loop {
            if self.eat(b"+") {
                acc = arith(acc, self.term()?, i64::checked_add, |a, b| a + b)?;
            } else if self.eat(b"-") {
                acc = arith(acc, self.term()?, i64::checked_sub, |a, b| a - b)?;
            } else {
                return Some(acc);
            }
        }
    }

    // term := unary (('*' | '/' | '//') unary)*
    fn term(&mut self) -> Option<Number> {
        let mut acc = self.unary()?;
        loop {
            if self.eat(b"*") {
                acc = arith(acc, self.unary()?, i64::checked_mul, |a, b| a * b)?;
            } else if self.eat(b"//") {
                acc = floor_div(acc, self.unary()?)?;
            } else if self.eat(b"/") {
                let rhs = self.unary()?.to_f64();
                if rhs == 0.0 {
                    return None;
                }
                acc = Number::Float(acc.to_f64() / rhs);
            } else {
                return Some(acc);
            }
        }
    }

    // unary := ('-' | '+') unary | power
    fn unary(&mut self) -> Option<Number> {
        if self.eat(b"-") {
            return match self.nested(Self::unary)? {
                Number::Int(i) => i.checked_neg().map(Number::Int),
                Number::Float(x) => Some(Number::Float(-x)),
            };
        }
        if self.eat(b"+") {
            return self.nested(Self::unary);
        }
        self.power()
    }

    // power := atom ('**' unary)?
    fn power(&mut self) -> Option<Number> {
        let base = self.atom()?;
        if !self.eat(b"**") {
            return Some(base);
        }
        let exp = self.nested(Self::unary)?;
        match (base, exp) {
            (Number::Int(b), Number::Int(e)) if e >= 0 => {
                let e = u32::try_from(e).ok()?;
                b.checked_pow(e).map(Number::Int)
            },
            (b, e) => {
                let x = b.to_f64().powf(e.to_f64());
                x.is_finite().then_some(Number::Float(x))
            },
        }
    }

    fn atom(&mut self) -> Option<Number> {
        if self.eat(b"(") {
            let inner = self.nested(Self::expr)?;
            return self.eat(b")").then_some(inner);
        }
        self.number()
    }

    fn number(&mut self) -> Option<Number> {
        let start = self.pos;
        let mut is_float = false;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') {
            is_float = true;
            self.pos += 1;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
        }
        let mantissa = &self.src[start..self.pos];
        if mantissa.is_empty() || mantissa == b"." {
            return None;
        }
        if self.peek() == Some(b'e') {
            is_float = true;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            let digits = self.pos;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
            if digits == self.pos {
                return None;
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).ok()?;
        if is_float {
            text.parse().ok().map(Number::Float)
        } else {
            text.parse().ok().map(Number::Int)
        }
    }
}

fn arith(
    a: Number,
    b: Number,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Option<Number> {
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => int_op(a, b).map(Number::Int),
        (a, b) => Some(Number::Float(float_op(a.to_f64(), b.to_f64()))),
    }
}

fn floor_div(a: Number, b: Number) -> Option<Number> {
    match (a, b) {
        (_, Number::Int(0)) => None,
        (Number::Int(a), Number::Int(b)) => {
            let q = a.checked_div(b)?;
            let adjust = (a % b != 0) && ((a < 0) != (b < 0));
            Some(Number::Int(if adjust { q - 1 } else { q }))
        },
        (a, b) => {
            let b = b.to_f64();
            if b == 0.0 {
                return None;
            }
            Some(Number::Float((a.to_f64() / b).floor()))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_and_signs() {
        assert_eq!(evaluate("1+2*3"), Some(Number::Int(7)));
        assert_eq!(evaluate("(1+2)*3"), Some(Number::Int(9)));
        assert_eq!(evaluate("-2**2"), Some(Number::Int(-4)));
        assert_eq!(evaluate("2**-1"), Some(Number::Float(0.5)));
        assert_eq!(evaluate("--3"), Some(Number::Int(3)));
        assert_eq!(evaluate("-7//2"), Some(Number::Int(-4)));
        assert_eq!(evaluate("1.5e2-50"), Some(Number::Float(100.0)));
        assert_eq!(evaluate(".5"), Some(Number::Float(0.5)));
    }

    #[test]
    fn rejects_everything_else() {
        assert_eq!(evaluate(""), None);
        assert_eq!(evaluate("1/0"), None);
        assert_eq!(evaluate("e"), None);
        assert_eq!(evaluate("1e"), None);
        assert_eq!(evaluate("(1+2"), None);
        assert_eq!(evaluate("1 + 2"), None);
        assert_eq!(evaluate("__import__('os')"), None);
        assert_eq!(evaluate("9223372036854775807+1"), None);
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let nested = format!("{}1{}", "(".repeat(5000), ")".repeat(5000));
        assert_eq!(evaluate(&nested), None);
        assert_eq!(evaluate(&format!("{}1", "-".repeat(5000))), None);
        assert_eq!(evaluate(&format!("2{}1", "**".repeat(5000))), None);

        let shallow = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(evaluate(&shallow), Some(Number::Int(1)));
        assert_eq!(evaluate(&format!("{}1", "-".repeat(100))), Some(Number::Int(1)));
    }

    #[test]
    fn int_conversion_truncates() {
        assert_eq!(Number::Float(-3.7).to_i64(), Some(-3));
        assert_eq!(Number::Float(f64::NAN).to_i64(), None);
    }
}
