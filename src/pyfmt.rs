//! Python-compatible string formatting of [`Value`]s.
//!
//! Display properties of items carry format strings written for Python's `%` operator
//! (`"%.3f"`, `"%(name)s"`) and occasionally for `str.format` (`"{}"`, `"{:.2f}"`).  This module
//! renders them the same way, for the subset of conversions that make sense for item values.

use crate::error::{Error, Result};
use crate::value::Value;

/// Render `fmt % (value,)`.
///
/// ```
/// use guidata::{pyfmt, Value};
///
/// assert_eq!(pyfmt::percent_format("%.3f", &Value::Float(2.0))?, "2.000");
/// assert_eq!(pyfmt::percent_format("%5d%%", &Value::Int(42))?, "   42%");
/// assert_eq!(pyfmt::percent_format("%e", &Value::Float(1234.5))?, "1.234500e+03");
/// # Ok::<(), guidata::Error>(())
/// ```
pub fn percent_format(fmt: &str, value: &Value) -> Result<String> {
    let mut used = false;
    let out = render(fmt, &mut |spec| match (spec.name, used) {
        (Some(_), _) => Err(bad_format(fmt, "format requires a mapping")),
        (None, true) => Err(bad_format(fmt, "not enough arguments for format string")),
        (None, false) => {
            used = true;
            Ok(value.clone())
        },
    })?;
    if !used {
        return Err(bad_format(fmt, "not all arguments converted during string formatting"));
    }
    Ok(out)
}

/// Render `fmt % mapping`, looking every `%(name)` up through `lookup`.
pub fn percent_format_named(fmt: &str, lookup: &mut dyn FnMut(&str) -> Option<Value>) -> Result<String> {
    render(fmt, &mut |spec| match spec.name {
        Some(name) => lookup(name).ok_or_else(|| bad_format(fmt, &format!("no value for '{}'", name))),
        None => Err(bad_format(fmt, "format requires named conversions")),
    })
}

/// The names used by `%(name)` conversions, in order of appearance.  `%%(x)` is not a conversion.
pub fn named_fields(fmt: &str) -> Vec<String> {
    let mut names = vec![];
    let mut rest = fmt;
    while let Some(pos) = rest.find('%') {
        let after = &rest[pos + 1..];
        if let Some(stripped) = after.strip_prefix('%') {
            rest = stripped;
            continue;
        }
        if let Some(inner) = after.strip_prefix('(') {
            if let Some(close) = inner.find(')') {
                let name = &inner[..close];
                if !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    names.push(name.to_string());
                }
            }
        }
        rest = after;
    }
    names
}

/// Render `fmt.format(value)`: every `{}`/`{0}` field receives `value`, with an optional
/// `:[sign][0][width][.precision][type]` spec.
pub fn brace_format(fmt: &str, value: &Value) -> Result<String> {
    let mut out = String::new();
    let mut chars = fmt.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                out.push('{');
            },
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                out.push('}');
            },
            '{' => {
                let close = fmt[i..].find('}').ok_or_else(|| bad_format(fmt, "single '{' encountered"))?;
                let field = &fmt[i + 1..i + close];
                let (index, spec) = field.split_once(':').unwrap_or((field, ""));
                if !(index.is_empty() || index == "0") {
                    return Err(bad_format(fmt, "only the first positional field is available"));
                }
                if spec.is_empty() {
                    out.push_str(&value.to_string());
                } else {
                    let mut spec = Spec::parse_brace(spec).ok_or_else(|| bad_format(fmt, "unsupported format spec"))?;
                    out.push_str(&spec.apply(value).map_err(|msg| bad_format(fmt, &msg))?);
                }
                while let Some(&(j, _)) = chars.peek() {
                    if j > i + close {
                        break;
                    }
                    chars.next();
                }
            },
            '}' => return Err(bad_format(fmt, "single '}' encountered")),
            c => out.push(c),
        }
    }
    Ok(out)
}

fn bad_format(fmt: &str, msg: &str) -> Error {
    Error::Unsupported(format!("cannot format {:?}: {}", fmt, msg))
}

struct Spec<'a> {
    name: Option<&'a str>,
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alt: bool,
    width: usize,
    precision: Option<usize>,
    conv: char,
}

fn render<'f>(fmt: &'f str, next_arg: &mut dyn FnMut(&Spec<'f>) -> Result<Value>) -> Result<String> {
    let mut out = String::with_capacity(fmt.len());
    let mut rest = fmt;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let (mut spec, len) = Spec::parse_percent(&rest[pos + 1..])
            .ok_or_else(|| bad_format(fmt, "incomplete or unsupported format"))?;
        rest = &rest[pos + 1 + len..];
        if spec.conv == '%' {
            out.push('%');
            continue;
        }
        let value = next_arg(&spec)?;
        out.push_str(&spec.apply(&value).map_err(|msg| bad_format(fmt, &msg))?);
    }
    out.push_str(rest);
    Ok(out)
}

impl<'a> Spec<'a> {
    fn empty(conv: char) -> Self {
        Spec {
            name: None, left: false, plus: false, space: false, zero: false, alt: false,
            width: 0, precision: None, conv,
        }
    }

    /// Parse what follows a `%`.  Returns the spec and the number of bytes it spans.
    fn parse_percent(s: &'a str) -> Option<(Self, usize)> {
        Spec::parse_with(s, None)
    }

    /// Parse a `str.format` spec, without fill/alignment characters.  A missing type means
    /// plain `str()`.
    fn parse_brace(s: &'a str) -> Option<Self> {
        match Spec::parse_with(s, Some('\0'))? {
            (spec, len) if len == s.len() && spec.name.is_none() => Some(spec),
            _ => None,
        }
    }

    fn parse_with(s: &'a str, implicit_conv: Option<char>) -> Option<(Self, usize)> {
        let bytes = s.as_bytes();
        let mut spec = Spec::empty('s');
        let mut i = 0;
        if implicit_conv.is_none() && bytes.first() == Some(&b'(') {
            let close = s.find(')')?;
            spec.name = Some(&s[1..close]);
            i = close + 1;
        }
        while let Some(&b) = bytes.get(i) {
            match b {
                b'-' => spec.left = true,
                b'+' => spec.plus = true,
                b' ' => spec.space = true,
                b'0' => spec.zero = true,
                b'#' => spec.alt = true,
                _ => break,
            }
            i += 1;
        }
        let start = i;
        while bytes.get(i).map_or(false, u8::is_ascii_digit) {
            i += 1;
        }
        spec.width = s[start..i].parse().unwrap_or(0);
        if bytes.get(i) == Some(&b'.') {
            i += 1;
            let start = i;
            while bytes.get(i).map_or(false, u8::is_ascii_digit) {
                i += 1;
            }
            spec.precision = Some(s[start..i].parse().unwrap_or(0));
        }
        while implicit_conv.is_none() && matches!(bytes.get(i), Some(b'h' | b'l' | b'L')) {
            i += 1;
        }
        match (bytes.get(i), implicit_conv) {
            (None, Some(conv)) => {
                spec.conv = conv;
                Some((spec, i))
            },
            (Some(&b), _) if "sradiufFeEgGxXo%".contains(b as char) => {
                spec.conv = b as char;
                Some((spec, i + 1))
            },
            _ => None,
        }
    }

    fn apply(&mut self, value: &Value) -> std::result::Result<String, String> {
        let (sign, body) = match self.conv {
            's' | '\0' => (String::new(), truncate(value.to_string(), self.precision)),
            'r' | 'a' => (String::new(), truncate(value.repr(), self.precision)),
            'd' | 'i' | 'u' => {
                let i = as_integer(value, true)?;
                split_sign(i.to_string())
            },
            'x' | 'X' | 'o' => {
                let i = as_integer(value, false)?;
                let (prefix, digits) = match self.conv {
                    'x' => ("0x", format!("{:x}", i.unsigned_abs())),
                    'X' => ("0X", format!("{:X}", i.unsigned_abs())),
                    _ => ("0o", format!("{:o}", i.unsigned_abs())),
                };
                let digits = if self.alt { format!("{}{}", prefix, digits) } else { digits };
                (if i < 0 { "-".to_string() } else { String::new() }, digits)
            },
            conv => {
                let x = as_float(value)?;
                let precision = self.precision.unwrap_or(6);
                let upper = conv.is_ascii_uppercase();
                let text = if !x.is_finite() {
                    let s = if x.is_nan() { "nan".to_string() } else if x > 0.0 { "inf".to_string() } else { "-inf".to_string() };
                    self.zero = false;
                    s
                } else {
                    match conv.to_ascii_lowercase() {
                        'f' => format!("{:.*}", precision, x),
                        'e' => exp_format(x, precision),
                        _ => general_format(x, precision, self.alt),
                    }
                };
                split_sign(if upper { text.to_uppercase() } else { text })
            },
        };

        let numeric = !matches!(self.conv, 's' | 'r' | 'a' | '\0');
        let sign = match (numeric, sign.is_empty()) {
            (true, true) if self.plus => "+".to_string(),
            (true, true) if self.space => " ".to_string(),
            _ => sign,
        };
        let len = sign.chars().count() + body.chars().count();
        let pad = self.width.saturating_sub(len);
        Ok(if pad == 0 {
            sign + &body
        } else if self.left {
            format!("{}{}{}", sign, body, " ".repeat(pad))
        } else if self.zero && numeric {
            format!("{}{}{}", sign, "0".repeat(pad), body)
        } else {
            format!("{}{}{}", " ".repeat(pad), sign, body)
        })
    }
}

fn truncate(s: String, precision: Option<usize>) -> String {
    match precision {
        Some(n) => s.chars().take(n).collect(),
        None => s,
    }
}

fn split_sign(s: String) -> (String, String) {
    match s.strip_prefix('-') {
        Some(rest) => ("-".to_string(), rest.to_string()),
        None => (String::new(), s),
    }
}

fn as_integer(value: &Value, allow_float: bool) -> std::result::Result<i64, String> {
    match *value {
        Value::Int(i) => Ok(i),
        Value::Bool(b) => Ok(b as i64),
        Value::Float(x) if allow_float && x.is_finite() => Ok(x.trunc() as i64),
        ref other => Err(format!("a number is required, not {}", other.kind_name())),
    }
}

fn as_float(value: &Value) -> std::result::Result<f64, String> {
    match *value {
        Value::Float(x) => Ok(x),
        Value::Int(i) => Ok(i as f64),
        Value::Bool(b) => Ok(b as u8 as f64),
        ref other => Err(format!("must be real number, not {}", other.kind_name())),
    }
}

/// `%e`: mantissa with `precision` digits, exponent signed and at least two digits wide.
fn exp_format(x: f64, precision: usize) -> String {
    let s = format!("{:.*e}", precision, x);
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            format!("{}e{}{:02}", mantissa, if exp < 0 { '-' } else { '+' }, exp.abs())
        },
        None => s,
    }
}

/// `%g`: fixed or exponent notation depending on the magnitude, trailing zeros removed.
fn general_format(x: f64, precision: usize, alt: bool) -> String {
    let p = precision.max(1);
    let exp = if x == 0.0 {
        0
    } else {
        let s = format!("{:.*e}", p - 1, x);
        s.split_once('e').and_then(|(_, e)| e.parse::<i32>().ok()).unwrap_or(0)
    };
    let text = if -4 <= exp && exp < p as i32 {
        format!("{:.*}", (p as i32 - 1 - exp).max(0) as usize, x)
    } else {
        exp_format(x, p - 1)
    };
    if alt {
        return text;
    }
    let (mantissa, exponent) = match text.find('e') {
        Some(pos) => text.split_at(pos),
        None => (text.as_str(), ""),
    };
    let mantissa = if mantissa.contains('.') {
        mantissa.trim_end_matches('0').trim_end_matches('.')
    } else {
        mantissa
    };
    format!("{}{}", mantissa, exponent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(fmt: &str, v: impl Into<Value>) -> String {
        percent_format(fmt, &v.into()).unwrap()
    }

    #[test]
    fn common_conversions() {
        assert_eq!(pct("%s", 1.5), "1.5");
        assert_eq!(pct("%s", "abc"), "abc");
        assert_eq!(pct("%r", "abc"), "'abc'");
        assert_eq!(pct("%d", 3.9), "3");
        assert_eq!(pct("%+d", 3), "+3");
        assert_eq!(pct("%06.2f", -2.5), "-02.50");
        assert_eq!(pct("%-6s|", "ab"), "ab    |");
        assert_eq!(pct("%.2e", 0.000123), "1.23e-04");
        assert_eq!(pct("%x", 255), "ff");
        assert_eq!(pct("%#x", 255), "0xff");
    }

    #[test]
    fn general_format_matches_python() {
        assert_eq!(pct("%g", 0.0), "0");
        assert_eq!(pct("%g", 100000.0), "100000");
        assert_eq!(pct("%g", 1000000.0), "1e+06");
        assert_eq!(pct("%g", 0.0001), "0.0001");
        assert_eq!(pct("%g", 0.00001), "1e-05");
        assert_eq!(pct("%.3g", 3.14159), "3.14");
    }

    #[test]
    fn argument_count_is_checked() {
        assert!(percent_format("no conversion", &Value::Int(1)).is_err());
        assert!(percent_format("%s %s", &Value::Int(1)).is_err());
        assert!(percent_format("%d", &Value::Str("x".into())).is_err());
        assert_eq!(percent_format_named("100%%", &mut |_| None).unwrap(), "100%");
    }

    #[test]
    fn named_conversions() -> Result<()> {
        let fmt = "%(a)s-%(b).1f %%(c)s";
        assert_eq!(named_fields(fmt), ["a", "b"]);
        let out = percent_format_named(fmt, &mut |name| match name {
            "a" => Some(Value::Str("x".into())),
            "b" => Some(Value::Float(0.25)),
            _ => None,
        })?;
        assert_eq!(out, "x-0.2 %(c)s");
        assert!(percent_format_named("%(zz)s", &mut |_| None).is_err());
        Ok(())
    }

    #[test]
    fn brace_fields() -> Result<()> {
        assert_eq!(brace_format("{}", &Value::Float(1.0))?, "1.0");
        assert_eq!(brace_format("[{:.2f}] {{x}}", &Value::Float(3.14159))?, "[3.14] {x}");
        assert_eq!(brace_format("{0} mm", &Value::Int(7))?, "7 mm");
        assert!(brace_format("{1}", &Value::Int(7)).is_err());
        Ok(())
    }
}
