//! The writer/reader protocol shared by every storage backend.
//!
//! A handler keeps a stack of group names (its [`Scope`]).  Values are always written to, and
//! read from, the location named by the full stack.  [`GroupExt::group`] pushes a name for the
//! duration of a closure:
//!
//! ```
//! use guidata::io::{GroupExt, JsonWriter, Writer};
//!
//! let mut writer = JsonWriter::new(None);
//! writer.group("camera", |w| w.group("gain", |w| w.write_float(2.0)))?;
//! assert_eq!(writer.get_json(None)?, r#"{"camera":{"gain":2.0}}"#);
//! # Ok::<(), guidata::Error>(())
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use log::{debug, trace};
use uuid::Uuid;

use crate::array::Array;
use crate::error::{Error, Result};
use crate::value::{date_to_ordinal, datetime_to_timestamp, Value};

pub mod ini;
pub mod json;
mod json_text;
#[cfg(feature = "h5")]
pub mod h5;

pub use self::ini::{IniReader, IniWriter};
pub use self::json::{JsonReader, JsonWriter};
#[cfg(feature = "h5")]
pub use self::h5::{H5Reader, H5Writer};

/// Stack of open group names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    stack: Vec<String>,
}

impl Scope {
    pub fn new() -> Self { Self::default() }

    /// A scope that starts inside `name`.
    pub fn with_root(name: &str) -> Self {
        Scope { stack: vec![name.to_string()] }
    }

    pub fn begin(&mut self, name: &str) {
        self.stack.push(name.to_string());
    }

    /// Close the innermost group.
    ///
    /// # Panics
    ///
    /// Panics when `name` is not the innermost open group.
    pub fn end(&mut self, name: &str) {
        let popped = self.stack.pop();
        assert_eq!(
            popped.as_deref(), Some(name),
            "ending section does not match the current section",
        );
    }

    /// The `/`-joined stack.
    pub fn path(&self) -> String { self.stack.join("/") }

    pub fn names(&self) -> &[String] { &self.stack }

    pub fn last(&self) -> Option<&str> { self.stack.last().map(String::as_str) }

    /// Every name but the innermost.
    pub fn parent(&self) -> &[String] {
        match self.stack.split_last() {
            Some((_, parent)) => parent,
            None => &[],
        }
    }

    pub fn depth(&self) -> usize { self.stack.len() }
}

/// Something that owns a [`Scope`].
pub trait Handler {
    fn scope(&self) -> &Scope;
    fn scope_mut(&mut self) -> &mut Scope;

    fn begin(&mut self, name: &str) {
        trace!("begin {}/{}", self.scope().path(), name);
        self.scope_mut().begin(name);
    }

    fn end(&mut self, name: &str) {
        trace!("end {}", self.scope().path());
        self.scope_mut().end(name);
    }

    /// The current location, `/`-joined.
    fn option(&self) -> String { self.scope().path() }
}

/// Scoped group helper available on every handler.
pub trait GroupExt: Handler {
    /// Run `f` inside group `name`.  The group is closed whatever `f` returns.
    fn group<T>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> T) -> T {
        self.begin(name);
        let out = f(self);
        self.end(name);
        out
    }
}

impl<H: Handler + ?Sized> GroupExt for H {}

/// A value that can write itself through any [`Writer`].
pub trait Serializable {
    fn serialize(&self, writer: &mut dyn Writer) -> Result<()>;
}

/// A value that can update itself from any [`Reader`].
pub trait Deserializable {
    fn deserialize(&mut self, reader: &mut dyn Reader) -> Result<()>;
}

/// Upcast to a trait object, for default methods that hand `self` to a [`Serializable`].
pub trait AsWriter {
    fn as_writer(&mut self) -> &mut dyn Writer;
}

impl<W: Writer> AsWriter for W {
    fn as_writer(&mut self) -> &mut dyn Writer { self }
}

/// Backend side of serialization: typed writes at the current scope.
pub trait Writer: Handler + AsWriter {
    fn write_bool(&mut self, value: bool) -> Result<()>;
    fn write_int(&mut self, value: i64) -> Result<()>;
    fn write_float(&mut self, value: f64) -> Result<()>;
    fn write_str(&mut self, value: &str) -> Result<()>;
    fn write_array(&mut self, value: &Array) -> Result<()>;
    fn write_sequence(&mut self, value: &[Value]) -> Result<()>;
    fn write_dict(&mut self, value: &IndexMap<String, Value>) -> Result<()>;
    fn write_none(&mut self) -> Result<()>;

    /// Stored as the day ordinal.
    fn write_date(&mut self, value: NaiveDate) -> Result<()> {
        self.write_int(date_to_ordinal(value))
    }

    /// Stored as a Unix timestamp.
    fn write_datetime(&mut self, value: NaiveDateTime) -> Result<()> {
        self.write_float(datetime_to_timestamp(value))
    }

    fn write_object(&mut self, obj: &dyn Serializable) -> Result<()> {
        obj.serialize(self.as_writer())
    }

    /// The `IDs` entry of an object list.
    fn write_id_list(&mut self, ids: &[String]) -> Result<()> {
        let ids: Vec<Value> = ids.iter().map(|id| Value::Str(id.clone())).collect();
        self.write_sequence(&ids)
    }

    /// Dispatch on the kind of `value`.
    fn write(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::None => self.write_none(),
            Value::Bool(b) => self.write_bool(*b),
            Value::Int(i) => self.write_int(*i),
            Value::Float(x) => self.write_float(*x),
            Value::Str(s) => self.write_str(s),
            Value::Date(d) => self.write_date(*d),
            Value::DateTime(dt) => self.write_datetime(*dt),
            Value::Array(a) => self.write_array(a),
            Value::Seq(v) => self.write_sequence(v),
            Value::Dict(d) => self.write_dict(d),
            Value::Object(ds) => self.write_object(ds.as_ref()),
        }
    }

    /// [`write`](Self::write) inside group `name`.
    fn write_named(&mut self, value: &Value, name: &str) -> Result<()> {
        self.begin(name);
        let out = self.write(value);
        self.end(name);
        out
    }
}

/// Writer helpers that need generics.
pub trait WriterExt: Writer {
    /// Write `seq` in group `name`: one sub-group per element, keyed by a fresh UUID, and an
    /// `IDs` list giving their order.  `None` elements, and a `None` sequence, are stored as
    /// `None`.
    fn write_object_list<S: Serializable>(&mut self, seq: Option<&[Option<S>]>, name: &str) -> Result<()> {
        self.group(name, |w| {
            let seq = match seq {
                Some(seq) => seq,
                None => return w.write_none(),
            };
            let mut ids = Vec::with_capacity(seq.len());
            for obj in seq {
                let id = Uuid::new_v4().to_string();
                w.group(&id, |w| match obj {
                    Some(obj) => obj.serialize(w.as_writer()),
                    None => w.write_none(),
                })?;
                ids.push(id);
            }
            w.group("IDs", |w| w.write_id_list(&ids))
        })
    }
}

impl<W: Writer + ?Sized> WriterExt for W {}

/// Upcast to a trait object, for default methods that hand `self` to a [`Deserializable`].
pub trait AsReader {
    fn as_reader(&mut self) -> &mut dyn Reader;
}

impl<R: Reader> AsReader for R {
    fn as_reader(&mut self) -> &mut dyn Reader { self }
}

/// Backend side of deserialization: reads at the current scope.
///
/// Only [`read_any`](Self::read_any) and [`is_group`](Self::is_group) are required; the typed
/// reads convert what `read_any` returns.  A stored `None` reads as `Ok(None)`, a missing entry
/// is [`Error::MissingKey`].
pub trait Reader: Handler + AsReader {
    fn read_any(&mut self) -> Result<Value>;

    /// Whether the current location holds a nested object rather than a scalar or `None`.
    fn is_group(&mut self) -> bool;

    fn read_bool(&mut self) -> Result<Option<bool>> {
        bool_of(self.read_any()?).map_err(|v| Error::mismatch(self.option(), "bool", &v))
    }

    fn read_int(&mut self) -> Result<Option<i64>> {
        int_of(self.read_any()?).map_err(|v| Error::mismatch(self.option(), "int", &v))
    }

    fn read_float(&mut self) -> Result<Option<f64>> {
        float_of(self.read_any()?).map_err(|v| Error::mismatch(self.option(), "float", &v))
    }

    fn read_str(&mut self) -> Result<Option<String>> {
        match self.read_any()? {
            Value::None => Ok(None),
            Value::Str(s) => Ok(Some(s)),
            other => Err(Error::mismatch(self.option(), "str", &other)),
        }
    }

    fn read_array(&mut self) -> Result<Option<Array>> {
        match self.read_any()? {
            Value::None => Ok(None),
            Value::Array(a) => Ok(Some(a)),
            other => Err(Error::mismatch(self.option(), "array", &other)),
        }
    }

    fn read_sequence(&mut self) -> Result<Option<Vec<Value>>> {
        match self.read_any()? {
            Value::None => Ok(None),
            Value::Seq(v) => Ok(Some(v)),
            other => Err(Error::mismatch(self.option(), "list", &other)),
        }
    }

    fn read_dict(&mut self) -> Result<Option<IndexMap<String, Value>>> {
        match self.read_any()? {
            Value::None => Ok(None),
            Value::Dict(d) => Ok(Some(d)),
            other => Err(Error::mismatch(self.option(), "dict", &other)),
        }
    }

    fn read_none(&mut self) -> Result<Value> {
        self.read_any()
    }

    /// The `IDs` entry of an object list.
    fn read_id_list(&mut self) -> Result<Vec<String>> {
        let ids = self.read_sequence()?.unwrap_or_default();
        ids.into_iter()
            .map(|id| match id {
                Value::Str(s) => Ok(s),
                other => Err(Error::mismatch(self.option(), "str", &other)),
            })
            .collect()
    }
}

// Scalar conversions shared by the typed reads.  `Err` hands back the value that did not fit.

pub(crate) fn bool_of(value: Value) -> std::result::Result<Option<bool>, Value> {
    match value {
        Value::None => Ok(None),
        Value::Bool(b) => Ok(Some(b)),
        Value::Int(i) => Ok(Some(i != 0)),
        Value::Float(x) => Ok(Some(x != 0.0)),
        other => Err(other),
    }
}

pub(crate) fn int_of(value: Value) -> std::result::Result<Option<i64>, Value> {
    match value {
        Value::None => Ok(None),
        Value::Int(i) => Ok(Some(i)),
        Value::Bool(b) => Ok(Some(b as i64)),
        Value::Float(x) if x.is_finite() => Ok(Some(x.trunc() as i64)),
        other => Err(other),
    }
}

pub(crate) fn float_of(value: Value) -> std::result::Result<Option<f64>, Value> {
    match value {
        Value::None => Ok(None),
        Value::Float(x) => Ok(Some(x)),
        Value::Int(i) => Ok(Some(i as f64)),
        Value::Bool(b) => Ok(Some(b as i64 as f64)),
        other => Err(other),
    }
}

/// Reader helpers that need generics.
pub trait ReaderExt: Reader {
    /// Run `func` inside group `name`; on failure, return `default` if one is given.
    fn read<T>(&mut self, name: &str, func: impl FnOnce(&mut Self) -> Result<T>, default: Option<T>) -> Result<T> {
        self.group(name, |r| match func(r) {
            Ok(value) => Ok(value),
            Err(e) => default.ok_or(e),
        })
    }

    /// [`read_any`](Reader::read_any) inside group `name`.
    fn read_value(&mut self, name: &str) -> Result<Value> {
        self.group(name, |r| r.read_any())
    }

    /// Deserialize `instance` from group `name`.
    ///
    /// Returns `false`, leaving `instance` untouched, when no object is stored there.
    fn read_into<D: Deserializable + ?Sized>(&mut self, name: &str, instance: &mut D) -> Result<bool> {
        self.group(name, |r| {
            if !r.is_group() {
                return Ok(false);
            }
            instance.deserialize(r.as_reader())?;
            Ok(true)
        })
    }

    /// Read back what [`WriterExt::write_object_list`] wrote.
    ///
    /// `factory` builds each element before it is deserialized.  `progress` receives the
    /// percentage done before each element and returns `true` to cancel, in which case the
    /// elements read so far are returned.
    fn read_object_list<T: Deserializable>(
        &mut self,
        name: &str,
        mut factory: impl FnMut() -> T,
        mut progress: Option<&mut dyn FnMut(u32) -> bool>,
    ) -> Result<Option<Vec<Option<T>>>> {
        self.group(name, |r| {
            if !r.is_group() {
                return Ok(None);
            }
            let ids = r.group("IDs", |r| r.read_id_list())?;
            let count = ids.len();
            let mut seq = Vec::with_capacity(count);
            for (idx, id) in ids.iter().enumerate() {
                if let Some(progress) = progress.as_deref_mut() {
                    if progress((100 * idx / count) as u32) {
                        debug!("reading of '{}' cancelled after {} objects", r.option(), idx);
                        break;
                    }
                }
                debug!("reading object {}/{}", r.option(), id);
                let obj = r.group(id, |r| -> Result<Option<T>> {
                    if !r.is_group() {
                        return Ok(None);
                    }
                    let mut obj = factory();
                    obj.deserialize(r.as_reader())?;
                    Ok(Some(obj))
                })?;
                seq.push(obj);
            }
            Ok(Some(seq))
        })
    }
}

impl<R: Reader + ?Sized> ReaderExt for R {}
