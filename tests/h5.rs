mod common;

use std::sync::Arc;

use guidata::io::{GroupExt, H5Reader, H5Writer, Reader, ReaderExt, Writer, WriterExt};
use guidata::{
    Array, BoolItem, DataSet, Deserializable, FloatArrayItem, FloatItem, Result, Schema, Serializable, Value,
};

use common::{all_items, sample, TestResult};

fn bool_dataset() -> Arc<Schema> {
    Schema::builder("BoolDataSet")
        .item("bool_true", BoolItem::new("Boolean True").default(true))
        .item("bool_false", BoolItem::new("Boolean False").default(false))
        .item("bool_none", BoolItem::new("Boolean None").default(Value::None).allow_none(true))
        .build()
}

#[test]
fn boolean_items_roundtrip() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bools.h5");

    let mut ds = DataSet::new(bool_dataset());
    ds.set("bool_true", true)?;
    ds.set("bool_false", false)?;
    let mut writer = H5Writer::new(&path);
    writer.group("test", |w| ds.serialize(w))?;
    writer.close()?;

    let mut back = DataSet::new(bool_dataset());
    let mut reader = H5Reader::open(&path)?;
    assert!(reader.read_into("test", &mut back)?);
    assert_eq!(back.get("bool_true"), Some(&Value::Bool(true)));
    assert_eq!(back.get("bool_false"), Some(&Value::Bool(false)));
    assert_eq!(back.get("bool_none"), Some(&Value::None));

    back.set("bool_true", false)?;
    assert_eq!(back.get("bool_true"), Some(&Value::Bool(false)));
    Ok(())
}

#[test]
fn dataset_roundtrip() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("params.h5");
    let ds = sample()?;
    let mut writer = H5Writer::new(&path);
    writer.group("params", |w| ds.serialize(w))?;
    writer.close()?;

    let bytes = std::fs::read(&path)?;
    assert_eq!(&bytes[..8], b"\x89HDF\r\n\x1a\n");

    let mut reader = H5Reader::open(&path)?;
    let mut back = DataSet::new(all_items());
    assert!(reader.read_into("params", &mut back)?);
    assert_eq!(back, ds);
    Ok(())
}

#[test]
fn missing_items_fall_back_to_defaults() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("partial.h5");
    let mut writer = H5Writer::new(&path);
    writer.write_named(&Value::Int(42), "int")?;
    writer.write_named(&Value::from("oops"), "float")?;
    writer.close()?;

    let mut reader = H5Reader::open(&path)?;
    let mut ds = sample()?;
    ds.deserialize(&mut reader)?;

    let mut expected = DataSet::new(all_items());
    expected.set("int", 42)?;
    assert_eq!(ds, expected);
    Ok(())
}

#[test]
fn non_finite_floats_roundtrip() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("limits.h5");
    let schema = Schema::builder("Limits")
        .item("up", FloatItem::new("Up"))
        .item("down", FloatItem::new("Down"))
        .item("nan", FloatItem::new("NaN"))
        .item("curve", FloatArrayItem::new("Curve"))
        .build();
    let mut ds = DataSet::new(schema.clone());
    ds.set("up", f64::INFINITY)?;
    ds.set("down", f64::NEG_INFINITY)?;
    ds.set("nan", f64::NAN)?;
    ds.set("curve", Array::from_f64(vec![f64::NEG_INFINITY, f64::NAN, 2.0, f64::INFINITY]))?;
    let mut writer = H5Writer::new(&path);
    ds.serialize(&mut writer)?;
    writer.close()?;

    let mut back = DataSet::new(schema);
    back.deserialize(&mut H5Reader::open(&path)?)?;
    assert_eq!(back.get("up"), Some(&Value::Float(f64::INFINITY)));
    assert_eq!(back.get("down"), Some(&Value::Float(f64::NEG_INFINITY)));
    assert!(back.get("nan").and_then(Value::as_f64).is_some_and(f64::is_nan));
    let curve = back.get("curve").and_then(Value::as_array).and_then(Array::to_f64_vec).ok_or("no curve")?;
    assert_eq!(curve[0], f64::NEG_INFINITY);
    assert!(curve[1].is_nan());
    assert_eq!(curve[2..], [2.0, f64::INFINITY]);
    Ok(())
}

#[test]
fn dataset_layout() -> TestResult {
    let ds = sample()?;
    let mut writer = H5Writer::in_memory();
    ds.serialize(&mut writer)?;
    let file = writer.into_file();
    let root = file.root();

    assert_eq!(root.attr("int"), Some(&Value::Int(-4)));
    assert_eq!(root.attr("flag"), Some(&Value::Bool(false)));
    assert_eq!(root.attr("date__type__"), Some(&Value::from("date")));
    assert_eq!(root.dataset("array").map(|a| a.shape().to_vec()), Some(vec![2, 3]));

    let multi = root.group("multi").ok_or("no multi group")?;
    assert_eq!(multi.attr("__seq"), Some(&Value::Int(3)));
    assert_eq!(multi.attr("__seq1"), Some(&Value::Bool(false)));

    let dict = root.group("dict").ok_or("no dict group")?;
    assert_eq!(dict.attr("__dict"), Some(&Value::Int(3)));
    assert_eq!(dict.attr("gain"), Some(&Value::Float(2.5)));

    let roi = root.group("roi").ok_or("no roi group")?;
    assert_eq!(roi.attr("label"), Some(&Value::from("center")));
    Ok(())
}

#[derive(Debug, Default, PartialEq)]
struct Marker {
    name: String,
}

impl Serializable for Marker {
    fn serialize(&self, writer: &mut dyn Writer) -> Result<()> {
        writer.write_named(&Value::from(self.name.as_str()), "name")
    }
}

impl Deserializable for Marker {
    fn deserialize(&mut self, reader: &mut dyn Reader) -> Result<()> {
        self.name = reader.read("name", |r| r.read_str(), None)?.unwrap_or_default();
        Ok(())
    }
}

#[test]
fn object_lists() -> TestResult {
    let markers = [Some(Marker { name: "m1".into() }), None, Some(Marker { name: "m3".into() })];
    let mut writer = H5Writer::in_memory();
    writer.write_object_list(Some(&markers[..]), "markers")?;
    writer.write_object_list::<Marker>(None, "empty")?;

    let group = writer.file().root().group("markers").ok_or("no group")?;
    let ids = group.attr("IDs").and_then(Value::as_seq).ok_or("no IDs attribute")?;
    assert_eq!(ids.len(), 3);

    let mut reader = H5Reader::from_file(writer.into_file());
    let back = reader.read_object_list("markers", Marker::default, None)?;
    assert_eq!(back, Some(markers.into_iter().collect()));
    assert_eq!(reader.read_object_list("empty", Marker::default, None)?, None);
    Ok(())
}

#[test]
fn objects_stored_as_none_leave_instances_untouched() -> TestResult {
    let mut writer = H5Writer::in_memory();
    writer.write_named(&Value::None, "params")?;
    let mut reader = H5Reader::from_file(writer.into_file());

    let mut ds = sample()?;
    assert!(!reader.read_into("params", &mut ds)?);
    assert_eq!(ds, sample()?);
    Ok(())
}

#[test]
fn read_defaults() -> TestResult {
    let mut writer = H5Writer::in_memory();
    writer.group("g", |w| w.group("x", |w| w.write_float(0.25)))?;
    let mut reader = H5Reader::from_file(writer.into_file());
    assert_eq!(reader.group("g", |r| r.read("x", |r| r.read_float(), None))?, Some(0.25));
    assert_eq!(reader.group("g", |r| r.read("y", |r| r.read_float(), Some(Some(1.0))))?, Some(1.0));
    assert!(reader.group("g", |r| r.read("y", |r| r.read_float(), None)).is_err());
    Ok(())
}
