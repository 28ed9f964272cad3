//! A dataset with one item of every storable kind, shared by the backend tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use indexmap::IndexMap;

use guidata::{
    Array, BeginGroup, BoolItem, ButtonItem, ChoiceItem, ColorItem, DataSet, DateItem,
    DateTimeItem, DictItem, EndGroup, FilesOpenItem, FloatArrayItem, FloatItem, FontFamilyItem,
    IntItem, MultipleChoiceItem, ObjectItem, Schema, StringItem, TextItem, Value,
};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn nested_schema() -> Arc<Schema> {
    Schema::builder("Roi")
        .item("x0", IntItem::new("X0").default(0))
        .item("label", StringItem::new("Label").default("roi"))
        .build()
}

pub fn all_items() -> Arc<Schema> {
    Schema::builder("AllItems")
        .doc("Every kind of item")
        .item("float", FloatItem::new("Float").default(1.5).min(0))
        .item("int", IntItem::new("Int").default(3))
        .item("string", StringItem::new("String").default("hello"))
        .item("text", TextItem::new("Text").default("line 1\nline 2"))
        .item("_g", BeginGroup::new("Group"))
        .item("flag", BoolItem::new("Flag").default(true))
        .item("date", DateItem::new("Date"))
        .item("datetime", DateTimeItem::new("Date and time"))
        .item("_e", EndGroup::new("Group"))
        .item("color", ColorItem::new("Color").default("red"))
        .item("choice", ChoiceItem::new("Choice", [(0, "zero"), (1, "one"), (2, "two")]))
        .item("multi", MultipleChoiceItem::new("Multi", [("1", "A"), ("2", "B"), ("3", "C")]))
        .item("array", FloatArrayItem::new("Array"))
        .item("dict", DictItem::new("Dict"))
        .item("files", FilesOpenItem::new("Files"))
        .item("font", FontFamilyItem::new("Font").default("Sans"))
        .item("roi", ObjectItem::new("ROI", nested_schema()))
        .item("go", ButtonItem::new("Go", |_, _, value| value.clone()))
        .build()
}

/// An instance with every value moved away from its default.
pub fn sample() -> Result<DataSet, guidata::Error> {
    let date = NaiveDate::from_ymd_opt(2023, 5, 17).expect("valid date");
    let datetime = date.and_hms_opt(8, 45, 30).expect("valid time");
    let mut dict = IndexMap::new();
    dict.insert("gain".to_string(), Value::Float(2.5));
    dict.insert("name".to_string(), Value::from("detector"));
    dict.insert("levels".to_string(), Value::Seq(vec![Value::Int(1), Value::Int(2)]));

    let mut roi = DataSet::new(nested_schema());
    roi.set("x0", 12)?;
    roi.set("label", "center")?;

    let mut ds = DataSet::new(all_items());
    ds.set("float", 7.25)?;
    ds.set("int", -4)?;
    ds.set("string", "world")?;
    ds.set("text", "first\nsecond")?;
    ds.set("flag", false)?;
    ds.set("date", date)?;
    ds.set("datetime", datetime)?;
    ds.set("color", "#00ff00")?;
    ds.set("choice", 2)?;
    ds.set("multi", vec![Value::from("1"), Value::from("3")])?;
    ds.set("array", Array::from_shape_f64(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.5])?)?;
    ds.set("dict", dict)?;
    ds.set("files", vec![Value::from("a.txt"), Value::from("b.txt")])?;
    ds.set("font", "Serif")?;
    ds.set("roi", roi)?;
    Ok(ds)
}
