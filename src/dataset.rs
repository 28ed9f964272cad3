use std::fmt;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use indexmap::IndexMap;
use log::warn;

use crate::config::{validation_mode, ValidationMode};
use crate::error::{Error, Result};
use crate::io::{Deserializable, GroupExt, IniReader, IniWriter, Reader, Serializable, Writer};
use crate::item::{DataItem, ItemKind};
use crate::props::{ItemProperty, PropValue, Realm};
use crate::userconfig::UserConfig;
use crate::value::Value;
use crate::visitor::{ItemVisitor, TextEditVisitor};

const ACTIVE: &str = "_active";
const ACTIVABLE: &str = "_activable";

/// The ordered item list of a dataset class.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    doc: String,
    items: Vec<DataItem>,
    activable: Option<String>,
}

impl Schema {
    pub fn builder(name: &str) -> SchemaBuilder {
        SchemaBuilder {
            name: name.to_string(),
            doc: String::new(),
            items: IndexMap::new(),
            global_props: vec![],
            activable: None,
        }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn doc(&self) -> &str { &self.doc }

    /// Every item, in declaration order.
    pub fn items(&self) -> &[DataItem] { &self.items }

    /// Items whose name does not start with `_`.
    pub fn get_items(&self) -> impl Iterator<Item = &DataItem> {
        self.items.iter().filter(|item| !item.name().starts_with('_'))
    }

    pub fn item(&self, name: &str) -> Option<&DataItem> {
        self.items.iter().find(|item| item.name() == name)
    }

    /// Name of the item switching an activable dataset on and off.
    pub fn activable_item(&self) -> Option<&str> { self.activable.as_deref() }

    /// Set a property on every item.
    pub fn set_global_prop(&mut self, realm: Realm, name: &str, value: impl Into<PropValue>) {
        let value = value.into();
        for item in &mut self.items {
            item.set_prop(realm, name, value.clone());
        }
    }

    /// Title and comment derived from the doc text: the first non-empty line, then the other
    /// lines stripped.
    fn title_and_comment(&self) -> (String, Option<String>) {
        let mut lines = self.doc.lines().skip_while(|line| line.trim().is_empty());
        let title = match lines.next() {
            Some(line) => line.trim().to_string(),
            None => return (self.name.clone(), None),
        };
        let rest: Vec<&str> = lines.map(str::trim).collect();
        match rest.is_empty() {
            true => (title, None),
            false => (title, Some(rest.join("\n"))),
        }
    }
}

/// Builds a [`Schema`].
///
/// Items are keyed by name: adding a name that is already present (from a base or an earlier
/// call) replaces that item in place, new names are appended.
///
/// ```
/// use guidata::{IntItem, Schema};
///
/// let a = Schema::builder("A")
///     .item("a1", IntItem::new("a1"))
///     .item("a2", IntItem::new("a2"))
///     .build();
/// let b = Schema::builder("B").item("b1", IntItem::new("b1")).build();
/// let ab = Schema::builder("AB").base(&a).base(&b).item("a1", IntItem::new("new a1")).build();
///
/// let names: Vec<_> = ab.items().iter().map(|i| i.name()).collect();
/// assert_eq!(names, ["a1", "a2", "b1"]);
/// assert_eq!(ab.item("a1").unwrap().label(), "new a1");
/// ```
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    doc: String,
    items: IndexMap<String, DataItem>,
    global_props: Vec<(Realm, String, PropValue)>,
    activable: Option<String>,
}

impl SchemaBuilder {
    /// Documentation text.  Its first line is the default dataset title.
    pub fn doc(mut self, doc: &str) -> Self {
        self.doc = doc.to_string();
        self
    }

    /// Inherit the items of `base`.  Its doc is not inherited.
    pub fn base(mut self, base: &Schema) -> Self {
        for item in &base.items {
            self.items.insert(item.name().to_string(), item.clone());
        }
        if self.activable.is_none() {
            self.activable = base.activable.clone();
        }
        self
    }

    pub fn item(mut self, name: &str, item: impl Into<DataItem>) -> Self {
        let mut item = item.into();
        item.set_name(name);
        self.items.insert(name.to_string(), item);
        self
    }

    /// Property applied to every item when the schema is built.
    pub fn global_prop(mut self, realm: Realm, name: &str, value: impl Into<PropValue>) -> Self {
        self.global_props.push((realm, name.to_string(), value.into()));
        self
    }

    /// Make the dataset activable through bool item `enable`: every other item is only active
    /// while `enable` is set.
    pub fn activable(mut self, enable: &str) -> Self {
        self.activable = Some(enable.to_string());
        self
    }

    pub fn build(self) -> Arc<Schema> {
        let mut schema = Schema {
            name: self.name,
            doc: self.doc,
            items: self.items.into_values().collect(),
            activable: self.activable,
        };
        for (realm, name, value) in self.global_props {
            schema.set_global_prop(realm, &name, value);
        }
        if let Some(enable) = schema.activable.clone() {
            schema.set_global_prop(Realm::Display, "active", ItemProperty::attr(ACTIVE));
            if let Some(item) = schema.items.iter_mut().find(|item| item.name() == enable) {
                item.set_prop(Realm::Display, "active", true)
                    .set_prop(Realm::Display, "hide", ItemProperty::attr(ACTIVABLE))
                    .set_prop(Realm::Display, "store", ItemProperty::attr(ACTIVE));
            }
        }
        Arc::new(schema)
    }
}

/// An instance of a [`Schema`]: one value per item plus free instance attributes.
///
/// ```
/// use guidata::{DataSet, FloatItem, Schema};
///
/// let schema = Schema::builder("Filter")
///     .doc("Gaussian filter\nApplied before thresholding.")
///     .item("sigma", FloatItem::new("Sigma").default(1.0).min(0.0))
///     .build();
/// let mut ds = DataSet::new(schema);
/// ds.set("sigma", 2.5)?;
/// assert_eq!(ds.title(), "Gaussian filter");
/// assert_eq!(ds.to_string(), "Gaussian filter:\n    Sigma: 2.5");
/// # Ok::<(), guidata::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct DataSet {
    schema: Arc<Schema>,
    values: IndexMap<String, Value>,
    attrs: IndexMap<String, Value>,
    title: String,
    comment: Option<String>,
    icon: String,
    readonly: bool,
}

impl PartialEq for DataSet {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name == other.schema.name && self.values == other.values && self.attrs == other.attrs
    }
}

impl DataSet {
    /// A new instance with every item at its default.
    pub fn new(schema: Arc<Schema>) -> Self {
        let (title, comment) = schema.title_and_comment();
        let mut attrs = IndexMap::new();
        if schema.activable.is_some() {
            attrs.insert(ACTIVABLE.to_string(), Value::Bool(true));
            attrs.insert(ACTIVE.to_string(), Value::Bool(true));
        }
        let mut ds = DataSet {
            schema,
            values: IndexMap::new(),
            attrs,
            title,
            comment,
            icon: String::new(),
            readonly: false,
        };
        ds.set_defaults();
        ds
    }

    /// A new instance with some values set.  Fails on names the schema does not declare.
    pub fn create<'a>(schema: Arc<Schema>, values: impl IntoIterator<Item = (&'a str, Value)>) -> Result<Self> {
        let mut ds = DataSet::new(schema);
        for (name, value) in values {
            ds.set(name, value)?;
        }
        Ok(ds)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        if !title.is_empty() {
            self.title = title;
        }
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn schema(&self) -> &Arc<Schema> { &self.schema }
    pub fn title(&self) -> &str { &self.title }
    pub fn comment(&self) -> Option<&str> { self.comment.as_deref() }
    pub fn icon(&self) -> &str { &self.icon }
    pub fn is_readonly(&self) -> bool { self.readonly }
    pub fn set_readonly(&mut self, readonly: bool) { self.readonly = readonly }

    /// Current value of item `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.values.get_mut(name)
    }

    /// Assign item `name`, checking the value according to the current
    /// [validation mode](crate::config::set_validation_mode).
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let schema = self.schema.clone();
        let item = schema.item(name).ok_or_else(|| Error::UnknownItem { name: name.to_string() })?;
        let value = coerce(item, value.into());
        let mode = validation_mode();
        if mode != ValidationMode::Disabled && !(value.is_none() && item.allow_none()) {
            if let Err(message) = item.validate(&value) {
                match mode {
                    ValidationMode::Strict => return Err(Error::Validation { item: name.to_string(), message }),
                    _ => warn!("invalid value for item '{}' of {}: {}", name, schema.name, message),
                }
            }
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Assign without checking; unknown names are ignored.
    pub(crate) fn set_unchecked(&mut self, name: &str, value: Value) {
        let schema = self.schema.clone();
        if let Some(item) = schema.item(name) {
            self.values.insert(name.to_string(), coerce(item, value));
        }
    }

    /// An item value, or else an instance attribute.
    pub fn get_attr(&self, name: &str) -> Option<Value> {
        self.values.get(name).or_else(|| self.attrs.get(name)).cloned()
    }

    /// Assign an item without checking, or else store an instance attribute.
    pub fn set_attr(&mut self, name: &str, value: Value) -> Result<()> {
        match self.schema.item(name) {
            Some(_) => self.set_unchecked(name, value),
            None => {
                self.attrs.insert(name.to_string(), value);
            },
        }
        Ok(())
    }

    /// Reset every item to its default.  Defaults are never checked.
    pub fn set_defaults(&mut self) {
        let schema = self.schema.clone();
        for item in schema.items() {
            item.set_default(self);
        }
    }

    /// Names of the public items whose value is invalid.
    pub fn check(&self) -> Vec<String> {
        self.schema.get_items()
            .filter(|item| !item.check_item(self))
            .map(|item| item.name().to_string())
            .collect()
    }

    /// Enable or disable the activation switch of an activable dataset: while activable, the
    /// switch is shown and the other items follow it; otherwise everything is active.
    pub fn set_activable(&mut self, activable: bool) {
        let schema = self.schema.clone();
        let enabled = schema.activable.as_deref()
            .and_then(|enable| self.get(enable))
            .map_or(true, Value::truthy);
        self.attrs.insert(ACTIVABLE.to_string(), Value::Bool(!activable));
        self.attrs.insert(ACTIVE.to_string(), Value::Bool(enabled));
    }

    /// Text rendering.
    ///
    /// One line per item as `indent + label: value`.  With `debug`, labels are replaced by item
    /// names and the item kind is appended.  `align` pads labels to the same width.
    /// `indent` defaults to a newline and four spaces.
    pub fn to_string_with(&self, debug: bool, indent: Option<&str>, align: bool, show_hidden: bool) -> String {
        let mut indent = indent.unwrap_or("\n    ").to_string();
        let mut txt = format!("{}:", self.title);
        let label_of = |item: &DataItem| -> String {
            match debug {
                true => item.name().to_string(),
                false => match item.get_prop_value(Realm::Display, self, "label") {
                    Ok(Value::Str(s)) => s,
                    Ok(other) => other.to_string(),
                    Err(_) => item.name().to_string(),
                },
            }
        };
        let width = match align {
            true => self.schema.items().iter().map(|item| label_of(item).chars().count()).max().unwrap_or(0),
            false => 0,
        };
        for item in self.schema.items() {
            if !show_hidden {
                if let Ok(Value::Bool(true)) = item.get_prop_value(Realm::Display, self, "hide") {
                    continue;
                }
            }
            match (item.kind(), self.get(item.name())) {
                (ItemKind::Object { .. }, Some(Value::Object(nested))) => {
                    txt += &indent;
                    txt += &nested.to_string_with(debug, Some(&format!("{}  ", indent)), false, true);
                    continue;
                },
                (kind, _) if kind.is_begin_group() => {
                    txt += &format!("{}{}:", indent, item.name());
                    indent += "  ";
                    continue;
                },
                (kind, _) if kind.is_end_group() => {
                    let keep = indent.len().saturating_sub(2);
                    indent.truncate(keep);
                    continue;
                },
                _ => {},
            }
            let value = match self.get(item.name()) {
                None | Some(Value::None) => "-".to_string(),
                Some(_) => item.get_string_value(self),
            };
            let label = label_of(item);
            txt += &format!("{}{:<width$}: {}", indent, label, value, width = width);
            if debug {
                txt += &format!(" ({})", item.kind().class_name());
            }
        }
        txt
    }

    /// Pass every item to `visitor`.
    pub fn accept(&mut self, visitor: &mut dyn ItemVisitor) -> Result<()> {
        let schema = self.schema.clone();
        for item in schema.items() {
            item.accept(self, visitor)?;
        }
        Ok(())
    }

    /// Edit the numeric and string items interactively on the terminal.
    pub fn text_edit(&mut self) -> Result<()> {
        let stdin = io::stdin();
        let mut visitor = TextEditVisitor::new(stdin.lock(), io::stdout());
        self.accept(&mut visitor)
    }

    /// [`text_edit`](Self::text_edit) over any line source and sink.
    pub fn text_edit_with<R: BufRead, W: Write>(&mut self, input: R, output: W) -> Result<()> {
        let mut visitor = TextEditVisitor::new(input, output);
        self.accept(&mut visitor)
    }

    /// Load the values stored under `section`/`option` of `conf`.
    pub fn read_config(&mut self, conf: &UserConfig, section: &str, option: &str) -> Result<()> {
        let mut reader = IniReader::new(conf, section, option);
        self.deserialize(&mut reader)
    }

    /// Store the values under `section`/`option` of `conf`, one key per item.
    pub fn write_config(&self, conf: &mut UserConfig, section: &str, option: &str) -> Result<()> {
        let mut writer = IniWriter::new(conf, section, option);
        self.serialize(&mut writer)
    }
}

/// Numeric widening done on assignment: float items store ints as floats.
fn coerce(item: &DataItem, value: Value) -> Value {
    match (item.kind(), value) {
        (ItemKind::Float, Value::Int(i)) => Value::Float(i as f64),
        (_, value) => value,
    }
}

impl Serializable for DataSet {
    /// Each item is written in a group named after it.
    fn serialize(&self, writer: &mut dyn Writer) -> Result<()> {
        for item in self.schema.items() {
            writer.group(item.name(), |w| item.serialize(self, w))?;
        }
        Ok(())
    }
}

impl Deserializable for DataSet {
    /// Each item is read from a group named after it; items that cannot be read get their
    /// default.
    fn deserialize(&mut self, reader: &mut dyn Reader) -> Result<()> {
        let schema = self.schema.clone();
        for item in schema.items() {
            let outcome = reader.group(item.name(), |r| item.deserialize(self, r));
            if let Err(e) = outcome {
                warn!("cannot deserialize '{}' of {}: {}", item.name(), schema.name, e);
                item.set_default(self);
            }
        }
        Ok(())
    }
}

impl fmt::Display for DataSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_string_with(false, None, false, true))
    }
}

/// Several datasets edited together, e.g. as tabs.
#[derive(Debug)]
pub struct DataSetGroup<'a> {
    datasets: Vec<&'a mut DataSet>,
    title: String,
    icon: String,
}

impl<'a> DataSetGroup<'a> {
    pub fn new(datasets: Vec<&'a mut DataSet>, title: Option<&str>) -> Self {
        let title = title.filter(|t| !t.is_empty()).unwrap_or("DataSetGroup").to_string();
        DataSetGroup { datasets, title, icon: String::new() }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn title(&self) -> &str { &self.title }
    pub fn comment(&self) -> Option<&str> { None }
    pub fn icon(&self) -> &str { &self.icon }

    pub fn datasets(&self) -> impl Iterator<Item = &DataSet> {
        self.datasets.iter().map(|ds| &**ds)
    }

    /// Invalid item names, per dataset.
    pub fn check(&self) -> Vec<Vec<String>> {
        self.datasets.iter().map(|ds| ds.check()).collect()
    }

    pub fn accept(&mut self, visitor: &mut dyn ItemVisitor) -> Result<()> {
        for ds in &mut self.datasets {
            ds.accept(visitor)?;
        }
        Ok(())
    }

    /// Whether every member is read only.
    pub fn is_readonly(&self) -> bool {
        self.datasets.iter().all(|ds| ds.is_readonly())
    }

    pub fn set_readonly(&mut self, readonly: bool) {
        for ds in &mut self.datasets {
            ds.set_readonly(readonly);
        }
    }
}

impl fmt::Display for DataSetGroup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let texts: Vec<String> = self.datasets.iter().map(|ds| ds.to_string()).collect();
        f.write_str(&texts.join("\n"))
    }
}
