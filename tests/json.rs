mod common;

use indexmap::IndexMap;

use guidata::io::{GroupExt, JsonReader, JsonWriter, Reader, ReaderExt, Writer, WriterExt};
use guidata::{conv, DataSet, Deserializable, FloatItem, Result, Schema, Serializable, Value};

use common::{all_items, sample, TestResult};

/// Version 1.0 of a data object: a title.
#[derive(Debug, Default, PartialEq)]
struct DataObjectV10 {
    title: String,
}

impl Serializable for DataObjectV10 {
    fn serialize(&self, writer: &mut dyn Writer) -> Result<()> {
        writer.write_named(&Value::from(self.title.as_str()), "title")
    }
}

impl Deserializable for DataObjectV10 {
    fn deserialize(&mut self, reader: &mut dyn Reader) -> Result<()> {
        self.title = reader.read("title", |r| r.read_str(), None)?.unwrap_or_default();
        Ok(())
    }
}

/// Version 1.1 adds a subtitle, defaulted when reading older files.
#[derive(Debug, Default, PartialEq)]
struct DataObjectV11 {
    title: String,
    subtitle: String,
}

impl Deserializable for DataObjectV11 {
    fn deserialize(&mut self, reader: &mut dyn Reader) -> Result<()> {
        self.title = reader.read("title", |r| r.read_str(), None)?.unwrap_or_default();
        let default = Some("<default (test)>".to_string());
        self.subtitle = reader.read("subtitle", |r| r.read_str(), Some(default))?.unwrap_or_default();
        Ok(())
    }
}

fn save_model_v10(path: &std::path::Path) -> TestResult {
    let objs = [
        Some(DataObjectV10 { title: "first_obj_title".into() }),
        Some(DataObjectV10 { title: "second_obj_title".into() }),
    ];
    let mut writer = JsonWriter::new(Some(path.to_path_buf()));
    writer.write_named(&Value::from("1.0"), "created_version")?;
    writer.write_object_list(Some(&objs[..]), "ObjList")?;
    writer.save(None)?;
    Ok(())
}

#[test]
fn datamodel_compatibility() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("test.json");
    save_model_v10(&path)?;

    let mut reader = JsonReader::from_path(&path)?;
    assert_eq!(reader.read_value("created_version")?, Value::from("1.0"));
    let objs = reader.read_object_list("ObjList", DataObjectV10::default, None)?.ok_or("no list")?;
    assert_eq!(objs, [
        Some(DataObjectV10 { title: "first_obj_title".into() }),
        Some(DataObjectV10 { title: "second_obj_title".into() }),
    ]);

    let mut reader = JsonReader::from_path(&path)?;
    let objs = reader.read_object_list("ObjList", DataObjectV11::default, None)?.ok_or("no list")?;
    assert_eq!(objs[1], Some(DataObjectV11 {
        title: "second_obj_title".into(),
        subtitle: "<default (test)>".into(),
    }));
    Ok(())
}

#[test]
fn object_lists_with_none() -> TestResult {
    let objs = [Some(DataObjectV10 { title: "a".into() }), None];
    let mut writer = JsonWriter::new(None);
    writer.write_object_list(Some(&objs[..]), "list")?;
    writer.write_object_list::<DataObjectV10>(None, "nothing")?;

    let json = writer.get_json_dict();
    let list = json["list"].as_dict().ok_or("list is not an object")?;
    let ids = list["IDs"].as_seq().ok_or("no IDs")?;
    assert_eq!(ids.len(), 2);
    let second = ids[1].as_str().ok_or("id is not a string")?;
    assert!(list[second].is_none());
    assert!(json["nothing"].is_none());

    let mut reader: JsonReader = writer.get_json(None)?.parse()?;
    let back = reader.read_object_list("list", DataObjectV10::default, None)?;
    assert_eq!(back, Some(objs.into_iter().collect()));
    assert_eq!(reader.read_object_list("nothing", DataObjectV10::default, None)?, None);
    Ok(())
}

#[test]
fn object_list_progress_can_cancel() -> TestResult {
    let objs: Vec<_> = (0..4).map(|i| Some(DataObjectV10 { title: format!("#{}", i) })).collect();
    let mut writer = JsonWriter::new(None);
    writer.write_object_list(Some(&objs[..]), "list")?;

    let mut reader: JsonReader = writer.get_json(None)?.parse()?;
    let mut seen = vec![];
    let mut cancel_halfway = |percent: u32| {
        seen.push(percent);
        percent >= 50
    };
    let progress: &mut dyn FnMut(u32) -> bool = &mut cancel_halfway;
    let back = reader.read_object_list("list", DataObjectV10::default, Some(progress))?.ok_or("no list")?;
    assert_eq!(back.len(), 2);
    assert_eq!(seen, [0, 25, 50]);
    Ok(())
}

#[test]
fn dataset_roundtrip() -> TestResult {
    let ds = sample()?;
    let mut writer = JsonWriter::new(None);
    writer.group("params", |w| ds.serialize(w))?;

    let mut reader: JsonReader = writer.get_json(Some(4))?.parse()?;
    let mut back = DataSet::new(all_items());
    reader.group("params", |r| back.deserialize(r))?;
    assert_eq!(back, ds);
    Ok(())
}

#[test]
fn dataset_stored_values() -> TestResult {
    let ds = sample()?;
    let mut writer = JsonWriter::new(None);
    ds.serialize(&mut writer)?;
    let json = writer.get_json_dict();
    assert_eq!(json["multi"], Value::Seq(vec![true.into(), false.into(), true.into()]));
    let array = json["array"].as_seq().ok_or("array is not a list")?;
    assert_eq!(array[0], Value::from("array"));
    assert_eq!(array[2], Value::from("float64"));
    let roi = IndexMap::from([("x0".to_string(), Value::Int(12)), ("label".to_string(), "center".into())]);
    assert_eq!(json["roi"], Value::Dict(roi));
    assert!(json.get("go").is_none());
    assert!(json.get("_g").is_none());
    Ok(())
}

#[test]
fn missing_items_fall_back_to_defaults() -> TestResult {
    let mut reader: JsonReader = r#"{"int": 42, "float": "not a number"}"#.parse()?;
    let mut ds = sample()?;
    ds.deserialize(&mut reader)?;

    let mut expected = DataSet::new(all_items());
    expected.set("int", 42)?;
    assert_eq!(ds, expected);
    Ok(())
}

#[test]
fn non_finite_floats_roundtrip() -> TestResult {
    let schema = Schema::builder("Limits").item("x", FloatItem::new("X")).build();
    for x in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
        let mut ds = DataSet::new(schema.clone());
        ds.set("x", x)?;
        let text = conv::dataset_to_json(&ds)?;

        let mut reader: JsonReader = text.parse()?;
        let mut back = DataSet::new(schema.clone());
        back.deserialize(&mut reader)?;
        let y = back.get("x").and_then(Value::as_f64).ok_or("x did not come back as a float")?;
        assert!(y == x || (x.is_nan() && y.is_nan()), "{} read back as {}", x, y);
    }
    Ok(())
}

#[test]
fn dataset_json_helpers() -> TestResult {
    let ds = sample()?;
    let text = conv::dataset_to_json(&ds)?;
    let back = conv::json_to_dataset(&text, |name| (name == "AllItems").then(all_items))?;
    assert_eq!(back, ds);
    Ok(())
}

#[test]
fn nested_groups_read_back() -> TestResult {
    let mut writer = JsonWriter::new(None);
    writer.group("a", |w| w.group("b", |w| w.write_int(5)))?;
    let mut reader: JsonReader = writer.get_json(None)?.parse()?;
    assert_eq!(reader.group("a", |r| r.read("b", |r| r.read_int(), None))?, Some(5));
    assert_eq!(reader.group("a", |r| r.read("c", |r| r.read_int(), Some(Some(-1))))?, Some(-1));
    Ok(())
}
