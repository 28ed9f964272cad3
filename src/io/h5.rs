//! HDF5 backend over an [`H5File`].
//!
//! Scalars become attributes of the enclosing group, arrays become datasets.  Sequences and
//! dicts get a group of their own: a sequence stores element `i` as `__seq{i}` and its length
//! as `__seq`, a dict stores each value under its key and the key count as `__dict`.  Dates and
//! datetimes are stored as numbers next to a `{name}__type__` attribute naming the type.  `None`
//! is stored as an empty string.

use std::mem;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use log::debug;

use crate::array::Array;
use crate::error::{Error, Result};
use crate::h5file::{Group, H5File, Node};
use crate::io::{bool_of, float_of, int_of, Handler, Reader, Scope, Writer};
use crate::value::{date_from_ordinal, date_to_ordinal, datetime_from_timestamp, datetime_to_timestamp, Value};

const SEQ: &str = "__seq";
const DICT: &str = "__dict";
const TYPE_SUFFIX: &str = "__type__";

fn seq_name(index: usize) -> String {
    format!("{}{}", SEQ, index)
}

fn type_name(name: &str) -> String {
    format!("{}{}", name, TYPE_SUFFIX)
}

/// Writes into an [`H5File`], saved as an HDF5 file at `path` by [`close`](Self::close) or on
/// drop.
///
/// ```
/// use guidata::io::{GroupExt, H5Reader, H5Writer, Reader, Writer};
///
/// let mut writer = H5Writer::in_memory();
/// writer.group("run", |w| w.group("seen", |w| w.write_bool(true)))?;
/// let mut reader = H5Reader::from_file(writer.into_file());
/// assert_eq!(reader.group("run", |r| r.group("seen", |r| r.read_bool()))?, Some(true));
/// # Ok::<(), guidata::Error>(())
/// ```
#[derive(Debug)]
pub struct H5Writer {
    path: Option<PathBuf>,
    file: H5File,
    scope: Scope,
    closed: bool,
}

impl H5Writer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        H5Writer { path: Some(path.into()), file: H5File::new(), scope: Scope::new(), closed: false }
    }

    /// A writer with nowhere to save; take the result with [`into_file`](Self::into_file).
    pub fn in_memory() -> Self {
        H5Writer { path: None, file: H5File::new(), scope: Scope::new(), closed: false }
    }

    pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

    pub fn file(&self) -> &H5File { &self.file }

    pub fn into_file(mut self) -> H5File {
        self.closed = true;
        mem::take(&mut self.file)
    }

    /// Save the file.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.save()
    }

    fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => self.file.save(path),
            None => Ok(()),
        }
    }

    /// The group holding the current location, and the location's name in it.
    fn parent_mut(&mut self) -> Result<(&mut Group, String)> {
        let Some((name, parents)) = self.scope.names().split_last() else {
            return Err(Error::Unsupported("cannot write a value outside of any group".into()));
        };
        let group = self.file.root_mut().require_path(parents)?;
        Ok((group, name.clone()))
    }

    fn set_attr(&mut self, value: impl Into<Value>) -> Result<()> {
        let (group, name) = self.parent_mut()?;
        group.set_attr(&name, value);
        Ok(())
    }

    fn set_typed_attr(&mut self, value: impl Into<Value>, type_tag: &str) -> Result<()> {
        let (group, name) = self.parent_mut()?;
        group.set_attr(&name, value);
        group.set_attr(&type_name(&name), type_tag);
        Ok(())
    }
}

impl Drop for H5Writer {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.save();
        }
    }
}

impl Handler for H5Writer {
    fn scope(&self) -> &Scope { &self.scope }
    fn scope_mut(&mut self) -> &mut Scope { &mut self.scope }
}

impl Writer for H5Writer {
    /// Stored as an integer attribute.
    fn write_bool(&mut self, value: bool) -> Result<()> { self.set_attr(value as i64) }
    fn write_int(&mut self, value: i64) -> Result<()> { self.set_attr(value) }
    fn write_float(&mut self, value: f64) -> Result<()> { self.set_attr(value) }
    fn write_str(&mut self, value: &str) -> Result<()> { self.set_attr(value) }
    fn write_none(&mut self) -> Result<()> { self.set_attr("") }

    fn write_array(&mut self, value: &Array) -> Result<()> {
        let (group, name) = self.parent_mut()?;
        group.set_dataset(&name, value.clone().at_least_1d());
        Ok(())
    }

    fn write_date(&mut self, value: NaiveDate) -> Result<()> {
        self.set_typed_attr(date_to_ordinal(value), "date")
    }

    fn write_datetime(&mut self, value: NaiveDateTime) -> Result<()> {
        self.set_typed_attr(datetime_to_timestamp(value), "datetime")
    }

    fn write_sequence(&mut self, value: &[Value]) -> Result<()> {
        for (index, item) in value.iter().enumerate() {
            self.write_named(item, &seq_name(index))?;
        }
        self.write_named(&Value::Int(value.len() as i64), SEQ)
    }

    fn write_dict(&mut self, value: &IndexMap<String, Value>) -> Result<()> {
        for (key, item) in value {
            if item.is_none() {
                return Err(Error::Unsupported(format!("cannot store None for key '{}' of '{}'", key, self.option())));
            }
            self.write_named(item, key)?;
        }
        self.write_named(&Value::Int(value.len() as i64), DICT)
    }

    fn write_id_list(&mut self, ids: &[String]) -> Result<()> {
        self.set_attr(ids.iter().map(|id| Value::Str(id.clone())).collect::<Vec<_>>())
    }

    /// Booleans reached through here, such as sequence elements, keep their type.
    fn write(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::None => self.write_none(),
            Value::Bool(b) => self.set_attr(*b),
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
}

/// Reads from an [`H5File`].
#[derive(Debug, Default)]
pub struct H5Reader {
    path: Option<PathBuf>,
    file: H5File,
    scope: Scope,
}

impl H5Reader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = H5File::open(path)?;
        Ok(H5Reader { path: Some(path.to_path_buf()), ..H5Reader::from_file(file) })
    }

    pub fn from_file(file: H5File) -> Self {
        H5Reader { path: None, file, scope: Scope::new() }
    }

    pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

    pub fn file(&self) -> &H5File { &self.file }

    fn parent(&self) -> Result<(&Group, &str)> {
        let Some((name, parents)) = self.scope.names().split_last() else {
            return Err(Error::missing(""));
        };
        Ok((self.file.root().find(parents)?, name.as_str()))
    }

    /// [`read_any`](Reader::read_any), with the empty string standing for `None`.
    fn read_nonempty(&mut self) -> Result<Value> {
        match self.read_any()? {
            Value::Str(s) if s.is_empty() => Ok(Value::None),
            value => Ok(value),
        }
    }
}

impl Handler for H5Reader {
    fn scope(&self) -> &Scope { &self.scope }
    fn scope_mut(&mut self) -> &mut Scope { &mut self.scope }
}

impl Reader for H5Reader {
    fn read_any(&mut self) -> Result<Value> {
        let path = self.option();
        let (group, name) = self.parent()?;
        member_value(group, name, &path)?.ok_or_else(|| Error::missing(path))
    }

    fn is_group(&mut self) -> bool {
        match self.parent() {
            Ok((group, name)) => !group.has_attr(name) && group.group(name).is_some(),
            Err(_) => false,
        }
    }

    fn read_bool(&mut self) -> Result<Option<bool>> {
        bool_of(self.read_nonempty()?).map_err(|v| Error::mismatch(self.option(), "bool", &v))
    }

    fn read_int(&mut self) -> Result<Option<i64>> {
        int_of(self.read_nonempty()?).map_err(|v| Error::mismatch(self.option(), "int", &v))
    }

    fn read_float(&mut self) -> Result<Option<f64>> {
        float_of(self.read_nonempty()?).map_err(|v| Error::mismatch(self.option(), "float", &v))
    }

    fn read_array(&mut self) -> Result<Option<Array>> {
        match self.read_nonempty()? {
            Value::None => Ok(None),
            Value::Array(a) => Ok(Some(a)),
            other => Err(Error::mismatch(self.option(), "array", &other)),
        }
    }

    fn read_sequence(&mut self) -> Result<Option<Vec<Value>>> {
        match self.read_nonempty()? {
            Value::None => Ok(None),
            Value::Seq(v) => Ok(Some(v)),
            other => Err(Error::mismatch(self.option(), "list", &other)),
        }
    }

    fn read_dict(&mut self) -> Result<Option<IndexMap<String, Value>>> {
        match self.read_nonempty()? {
            Value::None => Ok(None),
            Value::Dict(d) => Ok(Some(d)),
            other => Err(Error::mismatch(self.option(), "dict", &other)),
        }
    }
}

/// Attribute `name` of `group`, converted according to its type attribute.
fn attr_value(group: &Group, name: &str) -> Option<Value> {
    let value = group.attr(name)?;
    let converted = match group.attr(&type_name(name)).and_then(Value::as_str) {
        Some("datetime") => value.as_f64().and_then(datetime_from_timestamp).map(Value::DateTime),
        Some("date") => value.as_int().and_then(date_from_ordinal).map(Value::Date),
        _ => None,
    };
    Some(converted.unwrap_or_else(|| value.clone()))
}

/// Whatever is stored under `name` in `group`: an attribute, a dataset, a sequence or a dict.
fn member_value(group: &Group, name: &str, path: &str) -> Result<Option<Value>> {
    if let Some(value) = attr_value(group, name) {
        return Ok(Some(value));
    }
    Ok(match group.member(name) {
        Some(Node::Dataset(array)) => Some(Value::Array(array.clone())),
        Some(Node::Group(sub)) if sub.has_attr(SEQ) => Some(Value::Seq(read_seq_group(sub, path)?)),
        Some(Node::Group(sub)) if sub.has_attr(DICT) => Some(Value::Dict(read_dict_group(sub, path)?)),
        _ => None,
    })
}

fn read_seq_group(group: &Group, path: &str) -> Result<Vec<Value>> {
    let len = group.attr(SEQ).and_then(Value::as_int).unwrap_or_default();
    debug!("reading sequence {} of length {}", path, len);
    (0..len.max(0) as usize)
        .map(|index| {
            let name = seq_name(index);
            let item_path = format!("{}/{}", path, name);
            member_value(group, &name, &item_path)?
                .ok_or_else(|| Error::Unsupported(format!("cannot deserialize sequence element '{}'", item_path)))
        })
        .collect()
}

fn read_dict_group(group: &Group, path: &str) -> Result<IndexMap<String, Value>> {
    let mut dict = IndexMap::new();
    for name in group.attrs().keys() {
        if name == DICT || name.ends_with(TYPE_SUFFIX) {
            continue;
        }
        if let Some(value) = attr_value(group, name) {
            dict.insert(name.clone(), value);
        }
    }
    for name in group.members().keys() {
        let item_path = format!("{}/{}", path, name);
        let value = member_value(group, name, &item_path)?
            .ok_or_else(|| Error::Unsupported(format!("cannot deserialize dict entry '{}'", item_path)))?;
        dict.insert(name.clone(), value);
    }
    Ok(dict)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::io::{GroupExt, ReaderExt};

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn reread(writer: H5Writer) -> H5Reader {
        H5Reader::from_file(writer.into_file())
    }

    #[test]
    fn scalars_are_parent_attributes() -> TestResult {
        let mut writer = H5Writer::in_memory();
        writer.group("ds", |w| {
            w.group("n", |w| w.write_int(3))?;
            w.group("flag", |w| w.write_bool(true))
        })?;
        let group = writer.file().root().group("ds").ok_or("no group")?;
        assert_eq!(group.attr("n"), Some(&Value::Int(3)));
        assert_eq!(group.attr("flag"), Some(&Value::Int(1)));

        let mut reader = reread(writer);
        assert_eq!(reader.group("ds", |r| r.read("flag", |r| r.read_bool(), None))?, Some(true));
        Ok(())
    }

    #[test]
    fn none_is_an_empty_string() -> TestResult {
        let mut writer = H5Writer::in_memory();
        writer.write_named(&Value::None, "x")?;
        writer.write_named(&Value::from(""), "s")?;
        let mut reader = reread(writer);
        assert_eq!(reader.read("x", |r| r.read_float(), None)?, None);
        assert_eq!(reader.read("x", |r| r.read_array(), None)?, None);
        assert_eq!(reader.read("s", |r| r.read_str(), None)?, Some(String::new()));
        Ok(())
    }

    #[test]
    fn nested_sequences_and_dicts() -> TestResult {
        let mut dict = IndexMap::new();
        dict.insert("a".to_string(), Value::Int(1));
        dict.insert("b".to_string(), Value::Seq(vec![Value::Bool(false), Value::from("x")]));
        dict.insert("c".to_string(), Value::Array(Array::from_f64(vec![1.0, 2.0])));
        let seq = Value::Seq(vec![Value::Float(0.5), Value::Dict(dict), Value::Seq(vec![])]);

        let mut writer = H5Writer::in_memory();
        writer.write_named(&seq, "seq")?;
        let group = writer.file().root().group("seq").ok_or("no group")?;
        assert_eq!(group.attr("__seq"), Some(&Value::Int(3)));
        assert_eq!(group.attr("__seq0"), Some(&Value::Float(0.5)));

        let mut reader = reread(writer);
        assert_eq!(reader.read_value("seq")?, seq);
        Ok(())
    }

    #[test]
    fn dict_rejects_none() {
        let mut dict = IndexMap::new();
        dict.insert("a".to_string(), Value::None);
        let mut writer = H5Writer::in_memory();
        assert!(writer.write_named(&Value::Dict(dict), "d").is_err());
    }

    #[test]
    fn dates_carry_a_type_attribute() -> TestResult {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).ok_or("date")?;
        let dt = date.and_hms_opt(12, 30, 0).ok_or("time")?;
        let mut writer = H5Writer::in_memory();
        writer.write_named(&Value::Date(date), "d")?;
        writer.write_named(&Value::DateTime(dt), "t")?;
        assert_eq!(writer.file().root().attr("d__type__"), Some(&Value::from("date")));

        let mut reader = reread(writer);
        assert_eq!(reader.read_value("d")?, Value::Date(date));
        assert_eq!(reader.read_value("t")?, Value::DateTime(dt));
        Ok(())
    }

    #[test]
    fn objects_stored_as_none_are_not_groups() -> TestResult {
        let mut writer = H5Writer::in_memory();
        writer.write_named(&Value::None, "gone")?;
        writer.group("here", |w| w.group("x", |w| w.write_int(1)))?;
        let mut reader = reread(writer);
        assert!(!reader.group("gone", |r| r.is_group()));
        assert!(reader.group("here", |r| r.is_group()));
        assert!(!reader.group("absent", |r| r.is_group()));
        assert!(reader.read_value("absent").unwrap_err().is_missing_key());
        Ok(())
    }

    #[test]
    fn close_saves() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.h5");
        let mut writer = H5Writer::new(&path);
        writer.write_named(&Value::Array(Array::from_f64(vec![4.0])), "z")?;
        writer.close()?;

        let mut reader = H5Reader::open(&path)?;
        assert_eq!(reader.read("z", |r| r.read_array(), None)?, Some(Array::from_f64(vec![4.0])));
        Ok(())
    }
}
