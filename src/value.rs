use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;

use crate::array::Array;
use crate::dataset::DataSet;

/// Everything an item can hold and a backend can store.
///
/// Items call the typed writer methods directly; [`Writer::write`][crate::io::Writer::write]
/// dispatches on this enum for the generic path.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absence of a value.
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
    /// Naive timestamps are interpreted as UTC when converted.
    DateTime(NaiveDateTime),
    Array(Array),
    Seq(Vec<Value>),
    Dict(IndexMap<String, Value>),
    /// A nested dataset, owned by the item that holds it.
    Object(Box<DataSet>),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Array(_) => "array",
            Value::Seq(_) => "sequence",
            Value::Dict(_) => "dict",
            Value::Object(_) => "dataset",
        }
    }

    pub fn is_none(&self) -> bool { matches!(self, Value::None) }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Value::Int(i) => Some(i),
            _ => None,
        }
    }

    /// Floats, and ints widened to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(x) => Some(x),
            Value::Int(i) => Some(i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&DataSet> {
        match self {
            Value::Object(ds) => Some(ds),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut DataSet> {
        match self {
            Value::Object(ds) => Some(ds),
            _ => None,
        }
    }

    /// Python truthiness: `None`, `False`, zero, and empty containers are false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Seq(v) => !v.is_empty(),
            Value::Dict(d) => !d.is_empty(),
            Value::Date(_) | Value::DateTime(_) | Value::Object(_) => true,
        }
    }

    /// Python-style `repr`: strings are quoted, containers show their elements' reprs.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => quote(s),
            Value::Seq(items) => {
                let inner: Vec<_> = items.iter().map(Value::repr).collect();
                format!("[{}]", inner.join(", "))
            },
            Value::Dict(map) => {
                let inner: Vec<_> = map.iter().map(|(k, v)| format!("{}: {}", quote(k), v.repr())).collect();
                format!("{{{}}}", inner.join(", "))
            },
            other => other.to_string(),
        }
    }
}

fn quote(s: &str) -> String {
    let delim = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delim);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if c == delim => {
                out.push('\\');
                out.push(c);
            },
            c => out.push(c),
        }
    }
    out.push(delim);
    out
}

/// Python `str()` of a float: always shows a fractional part or an exponent.
pub(crate) fn float_str(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let abs = x.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let s = format!("{:e}", x);
        // Rust writes `1e20`, Python `1e+20`.
        return match s.split_once('e') {
            Some((mantissa, exp)) => {
                let (sign, digits) = match exp.strip_prefix('-') {
                    Some(d) => ('-', d),
                    None => ('+', exp),
                };
                format!("{}e{}{:0>2}", mantissa, sign, digits)
            },
            None => s,
        };
    }
    let s = format!("{}", x);
    if s.contains('.') { s } else { s + ".0" }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => f.write_str(&float_str(*x)),
            Value::Str(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Array(a) => write!(f, "{}", a),
            Value::Seq(_) | Value::Dict(_) => f.write_str(&self.repr()),
            Value::Object(ds) => write!(f, "{}", ds),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident,)*) => {$(
        impl From<$ty> for Value {
            fn from(x: $ty) -> Self { Value::$variant(x.into()) }
        }
    )*};
}

impl_from! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    f64 => Float,
    String => Str,
    &str => Str,
    NaiveDate => Date,
    NaiveDateTime => DateTime,
    Array => Array,
    Vec<Value> => Seq,
    IndexMap<String, Value> => Dict,
}

impl From<DataSet> for Value {
    fn from(ds: DataSet) -> Self { Value::Object(Box::new(ds)) }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(x: Option<T>) -> Self {
        x.map_or(Value::None, Into::into)
    }
}

/// Days since `0001-01-01`, which has ordinal 1.
pub fn date_to_ordinal(date: NaiveDate) -> i64 {
    date.num_days_from_ce() as i64
}

/// Inverse of [`date_to_ordinal`].  `None` when out of range.
pub fn date_from_ordinal(ordinal: i64) -> Option<NaiveDate> {
    i32::try_from(ordinal).ok().and_then(NaiveDate::from_num_days_from_ce_opt)
}

/// Seconds since the Unix epoch, reading the naive value as UTC.
pub fn datetime_to_timestamp(dt: NaiveDateTime) -> f64 {
    let utc = dt.and_utc();
    utc.timestamp() as f64 + utc.timestamp_subsec_micros() as f64 * 1e-6
}

/// Inverse of [`datetime_to_timestamp`], at microsecond resolution.
pub fn datetime_from_timestamp(ts: f64) -> Option<NaiveDateTime> {
    if !ts.is_finite() {
        return None;
    }
    let micros = (ts * 1e6).round();
    let secs = (micros / 1e6).floor();
    let nanos = ((micros - secs * 1e6) * 1e3) as u32;
    DateTime::from_timestamp(secs as i64, nanos).map(|utc| utc.naive_utc())
}
