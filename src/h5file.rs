//! In-memory image of an HDF5 file: a tree of groups holding attributes, sub-groups and array
//! datasets.
//!
//! The tree is read from and written to real HDF5 files through the `hdf5` crate (built from the
//! bundled library).  Scalar attributes keep their HDF5 type, strings are variable-length UTF-8
//! and datasets are deflated at level 1.  HDF5 lists attributes and members by name, so a loaded
//! tree is in name order rather than in the order it was written.

use std::path::Path;

use half::f16;
use hdf5::types::{TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::H5Type;
use indexmap::IndexMap;
use log::{debug, warn};
use num_complex::{Complex32, Complex64};

use crate::array::{Array, ArrayData};
use crate::error::{Error, Result};
use crate::type_str::{TypeChar, TypeStr};
use crate::value::Value;

/// A member of a [`Group`].
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Group(Group),
    Dataset(Array),
}

/// Attributes and members, both in insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    attrs: IndexMap<String, Value>,
    members: IndexMap<String, Node>,
}

impl Group {
    pub fn attrs(&self) -> &IndexMap<String, Value> { &self.attrs }

    pub fn attr(&self, name: &str) -> Option<&Value> { self.attrs.get(name) }

    pub fn has_attr(&self, name: &str) -> bool { self.attrs.contains_key(name) }

    pub fn set_attr(&mut self, name: &str, value: impl Into<Value>) {
        self.attrs.insert(name.to_string(), value.into());
    }

    pub fn members(&self) -> &IndexMap<String, Node> { &self.members }

    pub fn member(&self, name: &str) -> Option<&Node> { self.members.get(name) }

    pub fn group(&self, name: &str) -> Option<&Group> {
        match self.members.get(name) {
            Some(Node::Group(group)) => Some(group),
            _ => None,
        }
    }

    pub fn dataset(&self, name: &str) -> Option<&Array> {
        match self.members.get(name) {
            Some(Node::Dataset(array)) => Some(array),
            _ => None,
        }
    }

    /// Replace member `name` by a dataset.
    pub fn set_dataset(&mut self, name: &str, array: Array) {
        self.members.insert(name.to_string(), Node::Dataset(array));
    }

    /// The sub-group `name`, created if needed.  Fails if `name` is a dataset.
    pub fn require_group(&mut self, name: &str) -> Result<&mut Group> {
        let node = self.members.entry(name.to_string()).or_insert_with(|| Node::Group(Group::default()));
        match node {
            Node::Group(group) => Ok(group),
            Node::Dataset(_) => Err(Error::NotAGroup { path: name.to_string() }),
        }
    }

    /// Follow `path` down from this group.
    pub fn find(&self, path: &[String]) -> Result<&Group> {
        let mut group = self;
        for (depth, name) in path.iter().enumerate() {
            group = match group.members.get(name) {
                Some(Node::Group(g)) => g,
                Some(Node::Dataset(_)) => return Err(Error::NotAGroup { path: path[..=depth].join("/") }),
                None => return Err(Error::missing(path[..=depth].join("/"))),
            };
        }
        Ok(group)
    }

    /// Follow `path` down from this group, creating missing groups.
    pub fn require_path(&mut self, path: &[String]) -> Result<&mut Group> {
        let mut group = self;
        for (depth, name) in path.iter().enumerate() {
            group = group.require_group(name).map_err(|_| Error::NotAGroup { path: path[..=depth].join("/") })?;
        }
        Ok(group)
    }
}

/// A whole file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct H5File {
    root: Group,
}

impl H5File {
    pub fn new() -> Self { Self::default() }

    pub fn root(&self) -> &Group { &self.root }

    pub fn root_mut(&mut self) -> &mut Group { &mut self.root }

    /// Load the whole file.  Attributes and datasets of types with no [`Value`] counterpart are
    /// skipped with a warning.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("opening {}", path.display());
        let file = hdf5::File::open(path)?;
        let root = load_group(&file)?;
        Ok(H5File { root })
    }

    /// Write the tree to `path`, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        debug!("saving {}", path.display());
        let file = hdf5::File::create(path)?;
        store_group(&self.root, &file)?;
        file.flush()?;
        Ok(())
    }
}

fn store_group(group: &Group, h5: &hdf5::Group) -> Result<()> {
    for (name, value) in &group.attrs {
        store_attr(h5, name, value)?;
    }
    for (name, node) in &group.members {
        match node {
            Node::Group(sub) => store_group(sub, &h5.create_group(name)?)?,
            Node::Dataset(array) => store_dataset(h5, name, array)?,
        }
    }
    Ok(())
}

fn unicode(s: &str) -> Result<VarLenUnicode> {
    s.parse().map_err(|e| Error::Unsupported(format!("cannot store string {:?}: {}", s, e)))
}

fn store_attr(h5: &hdf5::Group, name: &str, value: &Value) -> Result<()> {
    match value {
        Value::Bool(b) => h5.new_attr::<bool>().shape(()).create(name)?.write_scalar(b)?,
        Value::Int(i) => h5.new_attr::<i64>().shape(()).create(name)?.write_scalar(i)?,
        Value::Float(x) => h5.new_attr::<f64>().shape(()).create(name)?.write_scalar(x)?,
        Value::Str(s) => h5.new_attr::<VarLenUnicode>().shape(()).create(name)?.write_scalar(&unicode(s)?)?,
        Value::Seq(items) if items.iter().all(|v| matches!(v, Value::Str(_))) => {
            let strings = items.iter().filter_map(Value::as_str).map(unicode).collect::<Result<Vec<_>>>()?;
            let attr = h5.new_attr::<VarLenUnicode>().shape(strings.len()).create(name)?;
            attr.write_raw(strings.as_slice())?;
        },
        other => {
            return Err(Error::Unsupported(format!(
                "cannot store a {} as attribute '{}' of {}", other.kind_name(), name, h5.name(),
            )));
        },
    }
    Ok(())
}

fn store_dataset(h5: &hdf5::Group, name: &str, array: &Array) -> Result<()> {
    let shape: Vec<usize> = array.shape().iter().map(|&n| n as usize).collect();

    macro_rules! store {
        ($ty:ty, $data:expr) => {{
            let data: Vec<$ty> = $data;
            let builder = h5.new_dataset::<$ty>().shape(shape);
            // filters need a chunked layout, which empty datasets cannot have
            if data.is_empty() {
                builder.create(name)?;
            } else {
                builder.deflate(1).create(name)?.write_raw(data.as_slice())?;
            }
        }};
    }

    match (array.data(), array.dtype().num_bytes()) {
        (ArrayData::Bool(v), _) => store!(bool, v.clone()),
        (ArrayData::Int(v), 1) => store!(i8, v.iter().map(|&x| x as i8).collect()),
        (ArrayData::Int(v), 2) => store!(i16, v.iter().map(|&x| x as i16).collect()),
        (ArrayData::Int(v), 4) => store!(i32, v.iter().map(|&x| x as i32).collect()),
        (ArrayData::Int(v), _) => store!(i64, v.clone()),
        (ArrayData::Uint(v), 1) => store!(u8, v.iter().map(|&x| x as u8).collect()),
        (ArrayData::Uint(v), 2) => store!(u16, v.iter().map(|&x| x as u16).collect()),
        (ArrayData::Uint(v), 4) => store!(u32, v.iter().map(|&x| x as u32).collect()),
        (ArrayData::Uint(v), _) => store!(u64, v.clone()),
        (ArrayData::Float(v), 2) => store!(f16, v.iter().map(|&x| f16::from_f64(x)).collect()),
        (ArrayData::Float(v), 4) => store!(f32, v.iter().map(|&x| x as f32).collect()),
        (ArrayData::Float(v), _) => store!(f64, v.clone()),
        (ArrayData::Complex(v), 8) => {
            store!(Complex32, v.iter().map(|z| Complex32::new(z.re as f32, z.im as f32)).collect())
        },
        (ArrayData::Complex(v), _) => store!(Complex64, v.clone()),
    }
    Ok(())
}

/// Last component of an HDF5 path.
fn base_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

fn load_group(h5: &hdf5::Group) -> Result<Group> {
    let mut group = Group::default();
    for name in h5.attr_names()? {
        match load_attr(&h5.attr(&name)?)? {
            Some(value) => {
                group.attrs.insert(name, value);
            },
            None => warn!("skipping attribute '{}' of {}: unsupported type", name, h5.name()),
        }
    }
    for sub in h5.groups()? {
        group.members.insert(base_name(&sub.name()), Node::Group(load_group(&sub)?));
    }
    for dataset in h5.datasets()? {
        match load_dataset(&dataset)? {
            Some(array) => {
                group.members.insert(base_name(&dataset.name()), Node::Dataset(array));
            },
            None => warn!("skipping dataset {}: unsupported type", dataset.name()),
        }
    }
    Ok(group)
}

fn load_attr(attr: &hdf5::Attribute) -> Result<Option<Value>> {
    macro_rules! load {
        ($ty:ty, $convert:expr) => {{
            let convert = $convert;
            match attr.is_scalar() {
                true => convert(attr.read_scalar::<$ty>()?),
                false => Value::Seq(attr.read_raw::<$ty>()?.into_iter().map(convert).collect()),
            }
        }};
    }

    Ok(Some(match attr.dtype()?.to_descriptor()? {
        TypeDescriptor::Boolean => load!(bool, Value::Bool),
        TypeDescriptor::Integer(_) => load!(i64, Value::Int),
        TypeDescriptor::Unsigned(_) => {
            load!(u64, |x: u64| i64::try_from(x).map_or(Value::Float(x as f64), Value::Int))
        },
        TypeDescriptor::Float(_) => load!(f64, Value::Float),
        TypeDescriptor::VarLenUnicode => load!(VarLenUnicode, |s: VarLenUnicode| Value::Str(s.as_str().to_string())),
        TypeDescriptor::VarLenAscii => load!(VarLenAscii, |s: VarLenAscii| Value::Str(s.as_str().to_string())),
        _ => return Ok(None),
    }))
}

fn load_dataset(dataset: &hdf5::Dataset) -> Result<Option<Array>> {
    let shape: Vec<u64> = dataset.shape().iter().map(|&n| n as u64).collect();
    let dtype = dataset.dtype()?;
    let size = dtype.size();
    let descriptor = dtype.to_descriptor()?;

    macro_rules! load {
        ($ty:ty, $convert:expr) => { dataset.read_raw::<$ty>()?.into_iter().map($convert).collect() };
        ($ty:ty) => { dataset.read_raw::<$ty>()? };
    }

    let (type_char, data) = match descriptor {
        TypeDescriptor::Boolean => (TypeChar::Bool, ArrayData::Bool(load!(bool))),
        TypeDescriptor::Integer(_) => (TypeChar::Int, ArrayData::Int(match size {
            1 => load!(i8, i64::from),
            2 => load!(i16, i64::from),
            4 => load!(i32, i64::from),
            _ => load!(i64),
        })),
        TypeDescriptor::Unsigned(_) => (TypeChar::Uint, ArrayData::Uint(match size {
            1 => load!(u8, u64::from),
            2 => load!(u16, u64::from),
            4 => load!(u32, u64::from),
            _ => load!(u64),
        })),
        TypeDescriptor::Float(_) => (TypeChar::Float, ArrayData::Float(match size {
            2 => load!(f16, f16::to_f64),
            4 => load!(f32, f64::from),
            _ => load!(f64),
        })),
        d if d == Complex32::type_descriptor() => {
            let data = load!(Complex32, |z: Complex32| Complex64::new(z.re.into(), z.im.into()));
            (TypeChar::Complex, ArrayData::Complex(data))
        },
        d if d == Complex64::type_descriptor() => (TypeChar::Complex, ArrayData::Complex(load!(Complex64))),
        _ => return Ok(None),
    };
    Array::new(TypeStr::little(type_char, size as u64), shape, data).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn path_of(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn tree_navigation() -> TestResult {
        let mut file = H5File::new();
        file.root_mut().require_path(&path_of(&["a", "b"]))?.set_attr("x", 1);
        file.root_mut().require_group("a")?.set_dataset("d", Array::from_f64(vec![1.0]));

        assert_eq!(file.root().find(&path_of(&["a", "b"]))?.attr("x"), Some(&Value::Int(1)));
        assert!(file.root().find(&path_of(&["a", "c"])).unwrap_err().is_missing_key());
        assert!(matches!(file.root().find(&path_of(&["a", "d"])), Err(Error::NotAGroup { .. })));
        assert!(file.root_mut().require_path(&path_of(&["a", "d", "e"])).is_err());
        Ok(())
    }

    #[test]
    fn file_roundtrip() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tree.h5");
        let mut file = H5File::new();
        let root = file.root_mut();
        root.set_attr("flag", true);
        root.set_attr("ids", vec![Value::from("a"), Value::from("b")]);
        root.set_attr("inf", f64::NEG_INFINITY);
        let group = root.require_group("g")?;
        group.set_attr("ratio", 0.5);
        group.set_attr("n", -7);
        group.set_attr("empty", "");
        group.set_dataset("data", Array::from_shape_f64(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0])?);
        group.set_dataset("none", Array::from_f64(vec![]));
        file.save(&path)?;

        let back = H5File::open(&path)?;
        assert_eq!(back, file);
        assert_eq!(back.root().find(&path_of(&["g"]))?.attr("n"), Some(&Value::Int(-7)));
        Ok(())
    }

    #[test]
    fn dataset_dtypes_survive() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("dtypes.h5");
        let arrays = [
            Array::new(TypeStr::from_name("int8").ok_or("int8")?, vec![3], ArrayData::Int(vec![-1, 0, 1]))?,
            Array::new(TypeStr::from_name("uint16").ok_or("uint16")?, vec![2], ArrayData::Uint(vec![0, 65535]))?,
            Array::new(TypeStr::from_name("float16").ok_or("float16")?, vec![2], ArrayData::Float(vec![0.5, -2.0]))?,
            Array::new(TypeStr::from_name("float32").ok_or("float32")?, vec![1, 2], ArrayData::Float(vec![0.25, 8.0]))?,
            Array::new(TypeStr::BOOL, vec![2], ArrayData::Bool(vec![true, false]))?,
            Array::new(TypeStr::from_name("complex64").ok_or("complex64")?, vec![1], ArrayData::Complex(vec![Complex64::new(1.0, -1.0)]))?,
            Array::new(TypeStr::COMPLEX128, vec![1], ArrayData::Complex(vec![Complex64::new(0.5, 2.0)]))?,
        ];
        let mut file = H5File::new();
        for (i, array) in arrays.iter().enumerate() {
            file.root_mut().set_dataset(&format!("a{}", i), array.clone());
        }
        file.save(&path)?;

        let back = H5File::open(&path)?;
        for (i, array) in arrays.iter().enumerate() {
            assert_eq!(back.root().dataset(&format!("a{}", i)), Some(array));
        }
        Ok(())
    }

    #[test]
    fn files_start_with_the_hdf5_signature() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sig.h5");
        H5File::new().save(&path)?;
        let bytes = std::fs::read(&path)?;
        assert_eq!(&bytes[..8], b"\x89HDF\r\n\x1a\n");
        Ok(())
    }

    #[test]
    fn rejects_other_files() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello")?;
        assert!(H5File::open(&path).is_err());
        Ok(())
    }

    #[test]
    fn unstorable_attributes_are_errors() -> TestResult {
        let dir = tempfile::tempdir()?;
        let mut file = H5File::new();
        file.root_mut().set_attr("mixed", vec![Value::Int(1), Value::from("x")]);
        assert!(file.save(dir.path().join("bad.h5")).is_err());
        Ok(())
    }
}
