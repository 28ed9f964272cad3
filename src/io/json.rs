//! JSON backend: groups are nested objects, values are JSON values.
//!
//! Arrays are stored as `["array", data, "dtype"]`, where `data` is the nested list of elements.
//! Complex arrays list their real parts, then their imaginary parts.  Non-finite floats are
//! written as `NaN`, `Infinity` and `-Infinity`, as Python's `json` module does, and those tokens
//! are accepted when reading.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use log::debug;

use crate::array::Array;
use crate::error::{Error, Result};
use crate::io::json_text::{dump, parse};
use crate::io::{Handler, Reader, Scope, Serializable, Writer};
use crate::type_str::TypeStr;
use crate::value::{date_to_ordinal, datetime_to_timestamp, Value};

/// Builds a JSON document in memory.
#[derive(Debug, Default)]
pub struct JsonWriter {
    filename: Option<PathBuf>,
    data: IndexMap<String, Value>,
    scope: Scope,
}

impl JsonWriter {
    /// `filename` is where [`save`](Self::save) writes; without one, use
    /// [`get_json`](Self::get_json).
    pub fn new(filename: Option<PathBuf>) -> Self {
        JsonWriter { filename, ..JsonWriter::default() }
    }

    pub fn filename(&self) -> Option<&Path> { self.filename.as_deref() }

    /// The document as built so far, every value in its [`to_json`] form.
    pub fn get_json_dict(&self) -> &IndexMap<String, Value> { &self.data }

    pub fn set_json_dict(&mut self, data: IndexMap<String, Value>) { self.data = data; }

    /// The document as text, compact or indented by `indent` spaces.
    pub fn get_json(&self, indent: Option<usize>) -> Result<String> {
        dump(&self.data, indent)
    }

    /// Write the document, indented by 4 spaces, to the file given at construction, inside `dir`
    /// when one is given.  Does nothing without a file name.
    pub fn save(&self, dir: Option<&Path>) -> Result<()> {
        let Some(filename) = &self.filename else { return Ok(()) };
        let path = match dir {
            Some(dir) => dir.join(filename),
            None => filename.clone(),
        };
        debug!("saving JSON to {}", path.display());
        fs::write(&path, self.get_json(Some(4))?)?;
        Ok(())
    }

    fn write_json(&mut self, value: Value) -> Result<()> {
        let Some(name) = self.scope.last().map(str::to_string) else {
            return Err(Error::Unsupported("cannot write a value outside of any group".into()));
        };
        let mut parent = &mut self.data;
        for (depth, group) in self.scope.parent().iter().enumerate() {
            let entry = parent.entry(group.clone()).or_insert_with(|| Value::Dict(IndexMap::new()));
            parent = match entry {
                Value::Dict(map) => map,
                _ => return Err(Error::NotAGroup { path: self.scope.names()[..=depth].join("/") }),
            };
        }
        parent.insert(name, value);
        Ok(())
    }
}

impl Handler for JsonWriter {
    fn scope(&self) -> &Scope { &self.scope }
    fn scope_mut(&mut self) -> &mut Scope { &mut self.scope }
}

impl Writer for JsonWriter {
    fn write_bool(&mut self, value: bool) -> Result<()> { self.write_json(Value::Bool(value)) }
    fn write_int(&mut self, value: i64) -> Result<()> { self.write_json(Value::Int(value)) }
    fn write_float(&mut self, value: f64) -> Result<()> { self.write_json(Value::Float(value)) }
    fn write_str(&mut self, value: &str) -> Result<()> { self.write_json(value.into()) }
    fn write_array(&mut self, value: &Array) -> Result<()> { self.write_json(value.to_tagged()) }

    fn write_sequence(&mut self, value: &[Value]) -> Result<()> {
        let items = value.iter().map(to_json).collect::<Result<_>>()?;
        self.write_json(Value::Seq(items))
    }

    fn write_dict(&mut self, value: &IndexMap<String, Value>) -> Result<()> {
        let map = value.iter().map(|(k, v)| Ok((k.clone(), to_json(v)?))).collect::<Result<_>>()?;
        self.write_json(Value::Dict(map))
    }

    fn write_none(&mut self) -> Result<()> { self.write_json(Value::None) }
}

/// The form in which [`JsonWriter`] stores a value: dates become numbers, arrays become tagged
/// lists and datasets become objects.  Everything else is kept as is.
pub fn to_json(value: &Value) -> Result<Value> {
    Ok(match value {
        Value::Date(d) => Value::Int(date_to_ordinal(*d)),
        Value::DateTime(dt) => Value::Float(datetime_to_timestamp(*dt)),
        Value::Array(a) => a.to_tagged(),
        Value::Seq(items) => Value::Seq(items.iter().map(to_json).collect::<Result<_>>()?),
        Value::Dict(map) => Value::Dict(
            map.iter().map(|(k, v)| Ok((k.clone(), to_json(v)?))).collect::<Result<_>>()?,
        ),
        Value::Object(ds) => {
            let mut writer = JsonWriter::new(None);
            ds.serialize(&mut writer)?;
            Value::Dict(writer.data)
        },
        other => other.clone(),
    })
}

/// Value of a stored JSON value; tagged arrays are decoded wherever they appear.
pub fn from_json(json: &Value) -> Value {
    match json {
        Value::Seq(items) => {
            let seq = Value::Seq(items.iter().map(from_json).collect());
            match Array::from_tagged(&seq) {
                Some(array) => Value::Array(array),
                None => seq,
            }
        },
        Value::Dict(map) => Value::Dict(map.iter().map(|(k, v)| (k.clone(), from_json(v))).collect()),
        other => other.clone(),
    }
}

/// Reads a JSON document.
///
/// ```
/// use guidata::io::{JsonReader, ReaderExt};
///
/// let mut reader: JsonReader = r#"{"p": {"z": ["array", [[1, 2]], "int16"]}}"#.parse()?;
/// let z = reader.read("p", |r| r.read_value("z"), None)?;
/// assert_eq!(z.as_array().map(|a| a.shape().to_vec()), Some(vec![1, 2]));
/// # Ok::<(), guidata::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct JsonReader {
    filename: Option<PathBuf>,
    data: IndexMap<String, Value>,
    scope: Scope,
}

impl JsonReader {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("loading JSON from {}", path.display());
        let text = fs::read_to_string(path)?;
        let mut reader: JsonReader = text.parse()?;
        reader.filename = Some(path.to_path_buf());
        Ok(reader)
    }

    /// Read the file named `text` if there is one, otherwise parse `text` itself.
    pub fn from_file_or_text(text: &str) -> Result<Self> {
        match Path::new(text).is_file() {
            true => JsonReader::from_path(text),
            false => text.parse(),
        }
    }

    pub fn filename(&self) -> Option<&Path> { self.filename.as_deref() }

    /// The parsed document.  Tagged arrays are still plain lists here.
    pub fn get_json_dict(&self) -> &IndexMap<String, Value> { &self.data }

    pub fn set_json_dict(&mut self, data: IndexMap<String, Value>) { self.data = data; }

    pub fn get_json(&self, indent: Option<usize>) -> Result<String> {
        dump(&self.data, indent)
    }

    fn current(&self) -> Result<&Value> {
        let Some((name, parents)) = self.scope.names().split_last() else {
            return Err(Error::missing(""));
        };
        let mut parent = &self.data;
        for (depth, group) in parents.iter().enumerate() {
            parent = match parent.get(group) {
                Some(Value::Dict(map)) => map,
                // an object stored as `None`
                None | Some(Value::None) => return Err(Error::missing(self.option())),
                Some(_) => return Err(Error::NotAGroup { path: parents[..=depth].join("/") }),
            };
        }
        parent.get(name).ok_or_else(|| Error::missing(self.option()))
    }
}

impl FromStr for JsonReader {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let data = parse(text)?;
        Ok(JsonReader { data, ..JsonReader::default() })
    }
}

impl Handler for JsonReader {
    fn scope(&self) -> &Scope { &self.scope }
    fn scope_mut(&mut self) -> &mut Scope { &mut self.scope }
}

impl Reader for JsonReader {
    fn read_any(&mut self) -> Result<Value> {
        self.current().map(from_json)
    }

    fn is_group(&mut self) -> bool {
        matches!(self.current(), Ok(Value::Dict(_)))
    }

    /// Arrays come back as nested lists when the tag is missing or broken.
    fn read_array(&mut self) -> Result<Option<Array>> {
        match self.read_any()? {
            Value::None => Ok(None),
            Value::Array(a) => Ok(Some(a)),
            seq @ Value::Seq(_) => Array::from_value_list(&seq, TypeStr::FLOAT64).map(Some),
            other => Err(Error::mismatch(self.option(), "array", &other)),
        }
    }
}
