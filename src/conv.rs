//! Copying values between datasets and maps, and building schemas from plain data.

use std::sync::Arc;

use indexmap::IndexMap;
use log::debug;

use crate::dataset::{DataSet, Schema};
use crate::error::{Error, Result};
use crate::io::{Deserializable, JsonReader, JsonWriter, ReaderExt, Serializable, Writer};
use crate::item::{DataItem, ItemKind};
use crate::items::{BoolItem, DictItem, FloatArrayItem, FloatItem, IntItem, StringItem};
use crate::props::Realm;
use crate::value::Value;

const DEFAULT_CLASS_NAME: &str = "DictDataSet";
const CLASS_NAME_KEY: &str = "class_name";

/// Something holding values by item name: a [`DataSet`] or a plain map.
pub trait ItemValues {
    fn item_value(&self, name: &str) -> Option<Value>;

    /// Store `value` under `name`.  Datasets ignore names their schema does not declare.
    fn store_item_value(&mut self, name: &str, value: Value) -> Result<()>;

    /// Whether `item` is hidden when its value is taken from here.
    fn hides(&self, item: &DataItem) -> bool;
}

impl ItemValues for DataSet {
    fn item_value(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }

    fn store_item_value(&mut self, name: &str, value: Value) -> Result<()> {
        match self.schema().item(name) {
            Some(_) => self.set(name, value),
            None => Ok(()),
        }
    }

    fn hides(&self, item: &DataItem) -> bool {
        item.get_prop_value_or(Realm::Display, self, "hide", Value::Bool(false))
            .map_or(false, |hide| hide.truthy())
    }
}

impl ItemValues for IndexMap<String, Value> {
    fn item_value(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }

    fn store_item_value(&mut self, name: &str, value: Value) -> Result<()> {
        self.insert(name.to_string(), value);
        Ok(())
    }

    /// Only a plain `hide` property applies; computed ones need an instance.
    fn hides(&self, item: &DataItem) -> bool {
        item.prop(Realm::Display, "hide")
            .and_then(|prop| prop.as_value())
            .map_or(false, Value::truthy)
    }
}

fn is_structural(item: &DataItem) -> bool {
    matches!(
        item.kind(),
        ItemKind::Button { .. } | ItemKind::BeginGroup | ItemKind::EndGroup
        | ItemKind::BeginTabGroup | ItemKind::EndTabGroup
    )
}

/// Copy into `dest` every value of `source` whose name is an item of `dest`.  With
/// `visible_only`, items hidden in `source` are skipped.  Values are checked as by
/// [`DataSet::set`].
///
/// ```
/// use guidata::{conv, DataSet, IntItem, Schema, Value};
/// use indexmap::IndexMap;
///
/// let schema = Schema::builder("Roi").item("x0", IntItem::new("X0")).build();
/// let mut ds = DataSet::new(schema);
/// let source: IndexMap<String, Value> = [("x0".to_string(), Value::Int(12))].into_iter().collect();
/// conv::update_dataset(&mut ds, &source, false)?;
/// assert_eq!(ds.get("x0"), Some(&Value::Int(12)));
/// # Ok::<(), guidata::Error>(())
/// ```
pub fn update_dataset<S: ItemValues + ?Sized>(dest: &mut DataSet, source: &S, visible_only: bool) -> Result<()> {
    let schema = dest.schema().clone();
    for item in schema.items().iter().filter(|item| !is_structural(item)) {
        let Some(value) = source.item_value(item.name()) else { continue };
        if visible_only && source.hides(item) {
            continue;
        }
        dest.set(item.name(), value)?;
    }
    Ok(())
}

/// Copy every item value of `source` into `dest`.  A dataset destination only takes the items
/// it declares; a map takes them all.
pub fn restore_dataset<D: ItemValues + ?Sized>(source: &DataSet, dest: &mut D) -> Result<()> {
    for item in source.schema().items().iter().filter(|item| !is_structural(item)) {
        if let Some(value) = source.get(item.name()) {
            dest.store_item_value(item.name(), value.clone())?;
        }
    }
    Ok(())
}

/// Assign values from `map` without checking them, as done for defaults.
pub(crate) fn update_dataset_from_map(dest: &mut DataSet, map: &IndexMap<String, Value>) {
    for (name, value) in map {
        dest.set_unchecked(name, value.clone());
    }
}

/// A schema with one item per entry of `map`, the entry's value being the item's default.
///
/// Item kinds follow the values: ints, floats, bools, strings, dicts and arrays are supported.
pub fn create_dataset_from_dict(map: &IndexMap<String, Value>, name: Option<&str>) -> Result<Arc<Schema>> {
    let mut builder = Schema::builder(name.unwrap_or(DEFAULT_CLASS_NAME));
    for (key, value) in map {
        let item: DataItem = match value {
            Value::Int(_) => IntItem::new(key.as_str()).default(value.clone()).into(),
            Value::Float(_) => FloatItem::new(key.as_str()).default(value.clone()).into(),
            Value::Bool(_) => BoolItem::new(key.as_str()).default(value.clone()).into(),
            Value::Str(_) => StringItem::new(key.as_str()).default(value.clone()).into(),
            Value::Dict(_) => DictItem::new(key.as_str()).default(value.clone()).into(),
            Value::Array(_) => FloatArrayItem::new(key.as_str()).default(value.clone()).into(),
            other => return Err(Error::Unsupported(format!("unsupported data type: {}", other.kind_name()))),
        };
        builder = builder.item(key, item);
    }
    Ok(builder.build())
}

/// Compact JSON text of `ds`, starting with its schema name under `class_name`.
pub fn dataset_to_json(ds: &DataSet) -> Result<String> {
    let mut writer = JsonWriter::new(None);
    writer.write_named(&Value::from(ds.schema().name()), CLASS_NAME_KEY)?;
    ds.serialize(&mut writer)?;
    writer.get_json(None)
}

/// Inverse of [`dataset_to_json`].  `resolve` maps the stored schema name to a schema.
pub fn json_to_dataset(text: &str, resolve: impl FnOnce(&str) -> Option<Arc<Schema>>) -> Result<DataSet> {
    let mut reader: JsonReader = text.parse()?;
    let class_name = match reader.read_value(CLASS_NAME_KEY)? {
        Value::Str(name) => name,
        other => return Err(Error::mismatch(CLASS_NAME_KEY, "str", &other)),
    };
    debug!("restoring a {} from JSON", class_name);
    let schema = resolve(&class_name)
        .ok_or_else(|| Error::Unsupported(format!("unknown dataset class '{}'", class_name)))?;
    let mut ds = DataSet::new(schema);
    ds.deserialize(&mut reader)?;
    Ok(ds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Array;
    use crate::items::ButtonItem;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn map(entries: &[(&str, Value)]) -> IndexMap<String, Value> {
        entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn schema() -> Arc<Schema> {
        Schema::builder("Params")
            .item("a", IntItem::new("A").default(1))
            .item("b", FloatItem::new("B").default(2.0).hidden(true))
            .build()
    }

    #[test]
    fn update_skips_hidden_on_request() -> TestResult {
        let source = map(&[("a", Value::Int(5)), ("b", Value::Float(7.0)), ("c", Value::from("x"))]);
        let mut ds = DataSet::new(schema());
        update_dataset(&mut ds, &source, true)?;
        assert_eq!(ds.get("a"), Some(&Value::Int(5)));
        assert_eq!(ds.get("b"), Some(&Value::Float(2.0)));

        update_dataset(&mut ds, &source, false)?;
        assert_eq!(ds.get("b"), Some(&Value::Float(7.0)));
        Ok(())
    }

    #[test]
    fn update_from_another_dataset() -> TestResult {
        let mut source = DataSet::new(schema());
        source.set("a", 9)?;
        let mut dest = DataSet::new(schema());
        update_dataset(&mut dest, &source, false)?;
        assert_eq!(dest, source);
        Ok(())
    }

    #[test]
    fn restore_into_map_takes_everything() -> TestResult {
        let schema = Schema::builder("WithButton")
            .item("a", IntItem::new("A").default(3))
            .item("go", ButtonItem::new("Go", |_, _, value| value.clone()))
            .build();
        let ds = DataSet::new(schema);
        let mut out = IndexMap::new();
        restore_dataset(&ds, &mut out)?;
        assert_eq!(out, map(&[("a", Value::Int(3))]));
        Ok(())
    }

    #[test]
    fn schema_from_dict() -> TestResult {
        let source = map(&[
            ("n", Value::Int(1)),
            ("x", Value::Float(0.5)),
            ("flag", Value::Bool(true)),
            ("s", Value::from("text")),
            ("d", Value::Dict(IndexMap::new())),
            ("z", Value::Array(Array::from_f64(vec![1.0]))),
        ]);
        let schema = create_dataset_from_dict(&source, None)?;
        assert_eq!(schema.name(), "DictDataSet");
        let kinds: Vec<_> = schema.items().iter().map(|item| item.kind().class_name()).collect();
        assert_eq!(kinds, ["IntItem", "FloatItem", "BoolItem", "StringItem", "DictItem", "FloatArrayItem"]);

        let mut out = IndexMap::new();
        restore_dataset(&DataSet::new(schema), &mut out)?;
        assert_eq!(out, source);

        assert!(create_dataset_from_dict(&map(&[("l", Value::Seq(vec![]))]), Some("X")).is_err());
        Ok(())
    }

    #[test]
    fn json_roundtrip_with_class_name() -> TestResult {
        let mut ds = DataSet::new(schema());
        ds.set("a", 4)?;
        let text = dataset_to_json(&ds)?;
        assert!(text.starts_with(r#"{"class_name":"Params","a":4"#));

        let back = json_to_dataset(&text, |name| (name == "Params").then(schema))?;
        assert_eq!(back, ds);
        assert!(json_to_dataset(&text, |_| None).is_err());
        Ok(())
    }
}
