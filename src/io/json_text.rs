//! JSON text extended with the bare tokens `NaN`, `Infinity` and `-Infinity`.
//!
//! Output goes through `serde_json`'s formatters, so finite values look exactly as `serde_json`
//! would write them.  Input is parsed by `serde_json` after each non-finite token has been
//! replaced by `null`; the replaced tokens are remembered in document order and handed back
//! when the deserializer visits the corresponding `null`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Write};

use indexmap::IndexMap;
use serde::de::{self, DeserializeSeed, MapAccess, SeqAccess, Visitor};
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};

use crate::error::{Error, Result};
use crate::value::{date_to_ordinal, datetime_to_timestamp, Value};

const NULL: &str = "null";
const NAN: &str = "NaN";
const INFINITY: &str = "Infinity";
const NEG_INFINITY: &str = "-Infinity";

/// The document `data` as text, compact or indented by `indent` spaces.
pub(crate) fn dump(data: &IndexMap<String, Value>, indent: Option<usize>) -> Result<String> {
    let mut buf = Vec::new();
    match indent {
        None => write_object(&mut buf, &mut CompactFormatter, data)?,
        Some(n) => {
            let indent = vec![b' '; n];
            write_object(&mut buf, &mut PrettyFormatter::with_indent(&indent), data)?
        },
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn write_object<W, F>(w: &mut W, f: &mut F, map: &IndexMap<String, Value>) -> io::Result<()>
where
    W: Write,
    F: Formatter,
{
    f.begin_object(w)?;
    for (i, (key, value)) in map.iter().enumerate() {
        f.begin_object_key(w, i == 0)?;
        write_str(w, key)?;
        f.end_object_key(w)?;
        f.begin_object_value(w)?;
        write_value(w, f, value)?;
        f.end_object_value(w)?;
    }
    f.end_object(w)
}

fn write_value<W, F>(w: &mut W, f: &mut F, value: &Value) -> io::Result<()>
where
    W: Write,
    F: Formatter,
{
    match value {
        Value::None => f.write_null(w),
        Value::Bool(b) => f.write_bool(w, *b),
        Value::Int(i) => f.write_i64(w, *i),
        Value::Float(x) => write_float(w, f, *x),
        Value::Str(s) => write_str(w, s),
        Value::Date(d) => f.write_i64(w, date_to_ordinal(*d)),
        Value::DateTime(dt) => write_float(w, f, datetime_to_timestamp(*dt)),
        Value::Array(a) => write_value(w, f, &a.to_tagged()),
        Value::Seq(items) => {
            f.begin_array(w)?;
            for (i, item) in items.iter().enumerate() {
                f.begin_array_value(w, i == 0)?;
                write_value(w, f, item)?;
                f.end_array_value(w)?;
            }
            f.end_array(w)
        },
        Value::Dict(map) => write_object(w, f, map),
        Value::Object(_) => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "datasets must be converted to dicts before formatting",
        )),
    }
}

fn write_float<W, F>(w: &mut W, f: &mut F, x: f64) -> io::Result<()>
where
    W: Write,
    F: Formatter,
{
    match x {
        x if x.is_finite() => f.write_f64(w, x),
        x if x.is_nan() => f.write_raw_fragment(w, NAN),
        x if x > 0.0 => f.write_raw_fragment(w, INFINITY),
        _ => f.write_raw_fragment(w, NEG_INFINITY),
    }
}

fn write_str<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    serde_json::to_writer(w, s).map_err(io::Error::from)
}

/// Parse a document whose top level is an object.  Tagged arrays are left as lists.
pub(crate) fn parse(text: &str) -> Result<IndexMap<String, Value>> {
    let (masked, nulls) = mask_non_finite(text);
    let nulls = RefCell::new(nulls);
    let mut de = serde_json::Deserializer::from_str(&masked);
    let value = ValueSeed { nulls: &nulls }.deserialize(&mut de)?;
    de.end()?;
    match value {
        Value::Dict(map) => Ok(map),
        other => Err(Error::mismatch("", "JSON object", &other)),
    }
}

/// Replace the non-finite tokens outside of strings by `null`.
///
/// Returns the rewritten text and, for every `null` token in it, the float it stands for (or
/// `None` for a genuine `null`).
fn mask_non_finite(text: &str) -> (String, VecDeque<Option<f64>>) {
    let tokens = [
        (NULL, None),
        (NAN, Some(f64::NAN)),
        (INFINITY, Some(f64::INFINITY)),
        (NEG_INFINITY, Some(f64::NEG_INFINITY)),
    ];
    let mut out = String::with_capacity(text.len());
    let mut nulls = VecDeque::new();
    let mut in_string = false;
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        if !in_string {
            if let Some(&(token, x)) = tokens.iter().find(|(token, _)| rest.starts_with(*token)) {
                nulls.push_back(x);
                out.push_str(NULL);
                rest = &rest[token.len()..];
                continue;
            }
        }
        let mut len = c.len_utf8();
        match c {
            '"' => in_string = !in_string,
            // keep the escaped character, which may be a quote
            '\\' if in_string => len += rest[1..].chars().next().map_or(0, char::len_utf8),
            _ => {},
        }
        out.push_str(&rest[..len]);
        rest = &rest[len..];
    }
    (out, nulls)
}

#[derive(Clone, Copy)]
struct ValueSeed<'a> {
    nulls: &'a RefCell<VecDeque<Option<f64>>>,
}

impl<'de> DeserializeSeed<'de> for ValueSeed<'_> {
    type Value = Value;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for ValueSeed<'_> {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(match self.nulls.borrow_mut().pop_front().flatten() {
            Some(x) => Value::Float(x),
            None => Value::None,
        })
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
        Ok(i64::try_from(v).map_or(Value::Float(v as f64), Value::Int))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::Str(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::Str(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element_seed(self)? {
            items.push(item);
        }
        Ok(Value::Seq(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Value, A::Error> {
        let mut out = IndexMap::new();
        while let Some(key) = map.next_key::<String>()? {
            out.insert(key, map.next_value_seed(self)?);
        }
        Ok(Value::Dict(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn non_finite_tokens() -> TestResult {
        let mut data = IndexMap::new();
        data.insert("a".to_string(), Value::Float(f64::INFINITY));
        data.insert("b".to_string(), Value::Seq(vec![
            Value::Float(f64::NEG_INFINITY),
            Value::None,
            Value::Float(f64::NAN),
            Value::Float(1.5),
        ]));
        let text = dump(&data, None)?;
        assert_eq!(text, r#"{"a":Infinity,"b":[-Infinity,null,NaN,1.5]}"#);

        let back = parse(&text)?;
        assert_eq!(back["a"], Value::Float(f64::INFINITY));
        let b = back["b"].as_seq().ok_or("b")?;
        assert_eq!(b[0], Value::Float(f64::NEG_INFINITY));
        assert_eq!(b[1], Value::None);
        assert!(b[2].as_f64().is_some_and(f64::is_nan));
        assert_eq!(b[3], Value::Float(1.5));
        Ok(())
    }

    #[test]
    fn tokens_inside_strings_are_text() -> TestResult {
        let text = r#"{"NaN": "Infinity \" null", "k\\": -Infinity, "n": null}"#;
        let back = parse(text)?;
        assert_eq!(back["NaN"], Value::from("Infinity \" null"));
        assert_eq!(back["k\\"], Value::Float(f64::NEG_INFINITY));
        assert_eq!(back["n"], Value::None);
        Ok(())
    }

    #[test]
    fn pretty_output_matches_serde_json() -> TestResult {
        let mut data = IndexMap::new();
        data.insert("g".to_string(), Value::Dict(IndexMap::from([
            ("x".to_string(), Value::Int(1)),
            ("s".to_string(), Value::from("q\"\n")),
        ])));
        data.insert("e".to_string(), Value::Dict(IndexMap::new()));
        data.insert("l".to_string(), Value::Seq(vec![Value::Bool(true), Value::Float(0.5)]));
        let expected = serde_json::to_string_pretty(&serde_json::json!({
            "g": {"x": 1, "s": "q\"\n"},
            "e": {},
            "l": [true, 0.5],
        }))?;
        assert_eq!(dump(&data, Some(2))?, expected);
        Ok(())
    }

    #[test]
    fn large_unsigned_numbers_become_floats() -> TestResult {
        let back = parse(r#"{"n": 18446744073709551615, "m": 12}"#)?;
        assert_eq!(back["n"], Value::Float(18446744073709551615.0));
        assert_eq!(back["m"], Value::Int(12));
        Ok(())
    }

    #[test]
    fn top_level_must_be_an_object() {
        assert!(parse("[1, 2]").is_err());
        assert!(parse(r#"{"a": 1} x"#).is_err());
        assert!(parse(r#"{"a": Nan}"#).is_err());
    }
}
