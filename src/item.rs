use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use log::warn;
use regex::Regex;

use crate::array::Array;
use crate::dataset::{DataSet, Schema};
use crate::error::{Error, Result};
use crate::expr;
use crate::io::{Deserializable, Reader, Writer};
use crate::props::{ItemProperty, PropValue, Props, Realm};
use crate::pyfmt;
use crate::value::{date_from_ordinal, datetime_from_timestamp, Value};
use crate::visitor::ItemVisitor;

/// User check run on float-array values after the type check.
pub type ArrayCheck = Arc<dyn Fn(&Array) -> bool + Send + Sync>;

/// Action of a button item.  Receives the instance, the item and its current value; the
/// returned value becomes the item's new value.
pub type ButtonCallback = Arc<dyn Fn(&mut DataSet, &DataItem, &Value) -> Value + Send + Sync>;

/// What an item holds, and the behaviour attached to it.
#[derive(Clone)]
pub enum ItemKind {
    Float,
    Int,
    String,
    Text,
    Bool,
    Date,
    DateTime,
    Color,
    FileSave,
    FileOpen,
    FilesOpen,
    Directory,
    Choice,
    MultipleChoice,
    ImageChoice,
    FloatArray { check: Option<ArrayCheck> },
    Dict,
    Button { callback: Option<ButtonCallback> },
    FontFamily,
    /// A nested dataset built from `schema`.
    Object { schema: Arc<Schema> },
    BeginGroup,
    EndGroup,
    BeginTabGroup,
    EndTabGroup,
}

impl ItemKind {
    /// The item class name, as shown by debug text output.
    pub fn class_name(&self) -> &'static str {
        match self {
            ItemKind::Float => "FloatItem",
            ItemKind::Int => "IntItem",
            ItemKind::String => "StringItem",
            ItemKind::Text => "TextItem",
            ItemKind::Bool => "BoolItem",
            ItemKind::Date => "DateItem",
            ItemKind::DateTime => "DateTimeItem",
            ItemKind::Color => "ColorItem",
            ItemKind::FileSave => "FileSaveItem",
            ItemKind::FileOpen => "FileOpenItem",
            ItemKind::FilesOpen => "FilesOpenItem",
            ItemKind::Directory => "DirectoryItem",
            ItemKind::Choice => "ChoiceItem",
            ItemKind::MultipleChoice => "MultipleChoiceItem",
            ItemKind::ImageChoice => "ImageChoiceItem",
            ItemKind::FloatArray { .. } => "FloatArrayItem",
            ItemKind::Dict => "DictItem",
            ItemKind::Button { .. } => "ButtonItem",
            ItemKind::FontFamily => "FontFamilyItem",
            ItemKind::Object { .. } => "ObjectItem",
            ItemKind::BeginGroup => "BeginGroup",
            ItemKind::EndGroup => "EndGroup",
            ItemKind::BeginTabGroup => "BeginTabGroup",
            ItemKind::EndTabGroup => "EndTabGroup",
        }
    }

    pub fn is_begin_group(&self) -> bool {
        matches!(self, ItemKind::BeginGroup | ItemKind::BeginTabGroup)
    }

    pub fn is_end_group(&self) -> bool {
        matches!(self, ItemKind::EndGroup | ItemKind::EndTabGroup)
    }

    fn is_numeric(&self) -> bool {
        matches!(self, ItemKind::Float | ItemKind::Int)
    }

    fn is_stringlike(&self) -> bool {
        matches!(
            self,
            ItemKind::String | ItemKind::Text | ItemKind::FontFamily | ItemKind::Color
            | ItemKind::FileSave | ItemKind::FileOpen | ItemKind::Directory
        )
    }

    fn is_choice(&self) -> bool {
        matches!(self, ItemKind::Choice | ItemKind::MultipleChoice | ItemKind::ImageChoice)
    }
}

impl fmt::Debug for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ItemKind::Object { schema } => write!(f, "Object({})", schema.name()),
            other => f.write_str(other.class_name()),
        }
    }
}

/// One entry of a choice list.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub key: Value,
    pub label: String,
    pub icon: Option<String>,
}

impl Choice {
    pub fn new(key: impl Into<Value>, label: impl Into<String>) -> Self {
        Choice { key: key.into(), label: label.into(), icon: None }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// `[key, label, icon]`, the form stored in the `choices` data property.
    pub fn to_value(&self) -> Value {
        let icon = self.icon.clone().map_or(Value::None, Value::Str);
        Value::Seq(vec![self.key.clone(), Value::Str(self.label.clone()), icon])
    }

    /// Accepts `[key, label, icon]`, `[key, label]` or a bare label (whose key is `index`).
    pub fn from_value(index: usize, value: &Value) -> Self {
        match value.as_seq() {
            Some([key, label, rest @ ..]) => Choice {
                key: key.clone(),
                label: label.to_string(),
                icon: rest.first().and_then(Value::as_str).map(str::to_string),
            },
            _ => Choice { key: Value::Int(index as i64), label: value.to_string(), icon: None },
        }
    }
}

impl<K: Into<Value>, L: Into<String>> From<(K, L)> for Choice {
    fn from((key, label): (K, L)) -> Self { Choice::new(key, label) }
}

impl<K: Into<Value>, L: Into<String>> From<(K, L, &str)> for Choice {
    fn from((key, label, icon): (K, L, &str)) -> Self { Choice::new(key, label).with_icon(icon) }
}

/// A dataset item: a named, typed, validated slot with display and data properties.
///
/// Items are normally created with the builders of [`crate::items`] and named when added to a
/// [`Schema`].
#[derive(Debug, Clone)]
pub struct DataItem {
    name: String,
    default: Value,
    help: String,
    props: Props,
    kind: ItemKind,
}

impl DataItem {
    /// Build an unnamed item; the display label and the common properties are set here.
    pub fn new(kind: ItemKind, label: impl Into<String>, default: Value) -> Self {
        let mut item = DataItem { name: String::new(), default, help: String::new(), props: Props::default(), kind };
        item.set_prop(Realm::Display, "label", label.into());
        item.set_pos(0, None, None);
        item.set_prop(Realm::Data, "check_value", true);
        item.set_prop(Realm::Data, "allow_none", false);
        item
    }

    pub fn name(&self) -> &str { &self.name }
    pub(crate) fn set_name(&mut self, name: &str) { self.name = name.to_string() }

    pub fn kind(&self) -> &ItemKind { &self.kind }
    pub(crate) fn kind_mut(&mut self) -> &mut ItemKind { &mut self.kind }
    pub fn default_value(&self) -> &Value { &self.default }
    pub fn set_default_value(&mut self, default: Value) { self.default = default }
    pub fn help(&self) -> &str { &self.help }
    pub fn set_help(&mut self, help: impl Into<String>) { self.help = help.into() }
    pub fn props(&self) -> &Props { &self.props }

    /// The label, when it is a plain string.
    pub fn label(&self) -> String {
        match self.prop(Realm::Display, "label").and_then(PropValue::as_value) {
            Some(Value::Str(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => self.name.clone(),
        }
    }

    pub fn prop(&self, realm: Realm, name: &str) -> Option<&PropValue> {
        self.props.get(realm, name)
    }

    pub fn get_prop(&self, realm: Realm, name: &str) -> Result<&PropValue> {
        self.prop(realm, name).ok_or_else(|| Error::UnknownProp { realm: realm.as_str(), name: name.to_string() })
    }

    pub fn get_prop_or<'a>(&'a self, realm: Realm, name: &str, default: &'a PropValue) -> &'a PropValue {
        self.prop(realm, name).unwrap_or(default)
    }

    pub fn set_prop(&mut self, realm: Realm, name: &str, value: impl Into<PropValue>) -> &mut Self {
        self.props.set(realm, name, value.into());
        self
    }

    /// Position in a grid layout.
    pub fn set_pos(&mut self, col: i64, colspan: Option<i64>, row: Option<i64>) -> &mut Self {
        self.set_prop(Realm::Display, "col", col)
            .set_prop(Realm::Display, "colspan", colspan)
            .set_prop(Realm::Display, "row", row)
    }

    /// The property, evaluated against `instance` when computed.
    pub fn get_prop_value(&self, realm: Realm, instance: &DataSet, name: &str) -> Result<Value> {
        match self.get_prop(realm, name)? {
            PropValue::Value(v) => Ok(v.clone()),
            PropValue::Computed(prop) => prop.evaluate(instance, self, &self.get_value(instance)),
        }
    }

    pub fn get_prop_value_or(&self, realm: Realm, instance: &DataSet, name: &str, default: Value) -> Result<Value> {
        match self.prop(realm, name) {
            None => Ok(default),
            Some(_) => self.get_prop_value(realm, instance, name),
        }
    }

    /// Write through a settable property (see [`ItemProperty::set`]); plain values are replaced.
    pub fn set_prop_value(&mut self, realm: Realm, instance: &mut DataSet, name: &str, value: Value) -> Result<()> {
        match self.prop(realm, name).cloned() {
            Some(PropValue::Computed(prop)) => prop.set(instance, self, value),
            _ => {
                self.set_prop(realm, name, value);
                Ok(())
            },
        }
    }

    /// Evaluated property for rendering purposes: absent, failing or `None` all give `None`.
    fn shown(&self, realm: Realm, instance: &DataSet, name: &str) -> Option<Value> {
        match self.get_prop_value(realm, instance, name) {
            Ok(Value::None) | Err(_) => None,
            Ok(v) => Some(v),
        }
    }

    /// A plain data property, ignoring computed ones.
    fn static_data(&self, name: &str) -> Option<&Value> {
        self.prop(Realm::Data, name).and_then(PropValue::as_value).filter(|v| !v.is_none())
    }

    pub fn allow_none(&self) -> bool {
        self.static_data("allow_none").map_or(false, Value::truthy)
    }

    fn check_enabled(&self) -> bool {
        self.static_data("check_value").map_or(true, Value::truthy)
    }

    /// The item's value on `instance`, `None` when unset.
    pub fn get_value(&self, instance: &DataSet) -> Value {
        instance.get(&self.name).cloned().unwrap_or_default()
    }

    /// Check the item's current value on `instance`.
    pub fn check_item(&self, instance: &DataSet) -> bool {
        let value = self.get_value(instance);
        (value.is_none() && self.allow_none()) || self.check_value(&value)
    }

    /// Whether `value` is acceptable for this item.  Always true when checking is switched off.
    pub fn check_value(&self, value: &Value) -> bool {
        self.validate(value).is_ok()
    }

    /// Like [`check_value`](Self::check_value), with the reason of a rejection.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        if !self.check_enabled() {
            return Ok(());
        }
        let expect = |ok: bool, expected: &str| match ok {
            true => Ok(()),
            false => Err(format!("expected {}, got {}", expected, value.kind_name())),
        };
        match &self.kind {
            ItemKind::Float => match value {
                Value::Float(x) => self.check_number(value, *x),
                _ => expect(false, "float"),
            },
            ItemKind::Int => match value {
                Value::Int(i) => {
                    self.check_number(value, *i as f64)?;
                    self.check_parity(*i)
                },
                _ => expect(false, "int"),
            },
            ItemKind::String | ItemKind::Text | ItemKind::FontFamily => match value.as_str() {
                Some(s) => self.check_string(s),
                None => expect(false, "str"),
            },
            ItemKind::Color => match value.as_str() {
                Some(s) if is_valid_color(s) => Ok(()),
                Some(s) => Err(format!("value {} is not a valid color", s)),
                None => expect(false, "str"),
            },
            ItemKind::FileSave => match value.as_str() {
                Some("") => Err("empty string is not a valid value".to_string()),
                Some(_) => Ok(()),
                None => expect(false, "str"),
            },
            ItemKind::FileOpen => match value.as_str() {
                Some(s) if Path::new(s).is_file() => Ok(()),
                Some(s) => Err(format!("file {} does not exist or is not a file", s)),
                None => expect(false, "str"),
            },
            ItemKind::FilesOpen => match value.as_seq() {
                Some(paths) if paths.iter().all(|p| p.as_str().map_or(false, |s| Path::new(s).is_file())) => Ok(()),
                Some(_) => Err(format!("some files do not exist or are not files: {}", value)),
                None => expect(false, "list"),
            },
            ItemKind::Directory => match value.as_str() {
                Some(s) if Path::new(s).is_dir() => Ok(()),
                Some(s) => Err(format!("directory {} does not exist or is not a directory", s)),
                None => expect(false, "str"),
            },
            ItemKind::Choice | ItemKind::ImageChoice => match self.static_choices() {
                Some(choices) if !choices.iter().any(|c| &c.key == value) => {
                    Err(format!("invalid value {} (not a choice key)", value.repr()))
                },
                _ => Ok(()),
            },
            ItemKind::MultipleChoice => match (value.as_seq(), self.static_choices()) {
                (None, _) => expect(false, "list"),
                (Some(values), Some(choices)) => match values.iter().find(|v| !choices.iter().any(|c| &c.key == *v)) {
                    Some(bad) => Err(format!("invalid value {} (not a choice key)", bad.repr())),
                    None => Ok(()),
                },
                (Some(_), None) => Ok(()),
            },
            ItemKind::FloatArray { check } => match value {
                Value::Array(a) if check.as_ref().map_or(true, |f| f(a)) => Ok(()),
                Value::Array(_) => Err("array rejected by check callback".to_string()),
                _ => expect(false, "array"),
            },
            ItemKind::Bool => expect(matches!(value, Value::Bool(_)), "bool"),
            ItemKind::Date => expect(matches!(value, Value::Date(_)), "date"),
            ItemKind::DateTime => expect(matches!(value, Value::DateTime(_)), "datetime"),
            ItemKind::Dict => expect(matches!(value, Value::Dict(_)), "dict"),
            ItemKind::Object { .. } => expect(matches!(value, Value::Object(_)), "dataset"),
            ItemKind::Button { .. } | ItemKind::BeginGroup | ItemKind::EndGroup
            | ItemKind::BeginTabGroup | ItemKind::EndTabGroup => Ok(()),
        }
    }

    fn check_number(&self, value: &Value, x: f64) -> Result<(), String> {
        if self.static_data("nonzero").map_or(false, Value::truthy) && x == 0.0 {
            return Err("zero is not a valid value".to_string());
        }
        if let Some(min) = self.static_data("min").filter(|m| m.as_f64().map_or(false, |m| x < m)) {
            return Err(format!("value {} is lower than minimum {}", value, min));
        }
        if let Some(max) = self.static_data("max").filter(|m| m.as_f64().map_or(false, |m| x > m)) {
            return Err(format!("value {} is greater than maximum {}", value, max));
        }
        Ok(())
    }

    fn check_parity(&self, i: i64) -> Result<(), String> {
        match self.static_data("even").and_then(Value::as_bool) {
            Some(even) if (i % 2 == 0) != even => {
                Err(format!("value {} is not {}", i, if even { "even" } else { "odd" }))
            },
            _ => Ok(()),
        }
    }

    fn check_string(&self, s: &str) -> Result<(), String> {
        if self.static_data("notempty").map_or(false, Value::truthy) && s.is_empty() {
            return Err("empty string is not a valid value".to_string());
        }
        match self.static_data("regexp").and_then(Value::as_str) {
            // anchored at the start only, like `re.match`
            Some(pattern) => match Regex::new(&format!("^(?:{})", pattern)) {
                Ok(re) if re.is_match(s) => Ok(()),
                Ok(_) => Err(format!("value {} does not match regexp {}", s, pattern)),
                Err(e) => {
                    warn!("invalid regexp for item '{}': {}", self.name, e);
                    Err(format!("invalid regexp {}", pattern))
                },
            },
            None => Ok(()),
        }
    }

    /// The choice list, when it does not depend on the instance.
    pub fn static_choices(&self) -> Option<Vec<Choice>> {
        match self.prop(Realm::Data, "choices")? {
            PropValue::Value(v) => Some(choices_from_value(v)),
            PropValue::Computed(_) => None,
        }
    }

    /// The choice list as seen by `instance`.
    pub fn choices(&self, instance: &DataSet) -> Result<Vec<Choice>> {
        if self.prop(Realm::Data, "choices").is_none() {
            return Ok(vec![]);
        }
        Ok(choices_from_value(&self.get_prop_value(Realm::Data, instance, "choices")?))
    }

    /// Convert user text into a value for this item.  `None` when the text is not acceptable.
    pub fn from_string(&self, text: &str) -> Option<Value> {
        match &self.kind {
            ItemKind::Float => expr::evaluate(text).map(|n| Value::Float(n.to_f64())),
            ItemKind::Int => expr::evaluate(text).and_then(|n| n.to_i64()).map(Value::Int),
            ItemKind::String | ItemKind::Text | ItemKind::FontFamily | ItemKind::Color | ItemKind::Directory => {
                Some(Value::Str(text.to_string()))
            },
            ItemKind::FileSave | ItemKind::FileOpen => Some(Value::Str(self.add_extension(text))),
            ItemKind::FilesOpen => {
                let paths = if text.ends_with("']") || text.ends_with("\"]") {
                    parse_string_list(text)?
                } else {
                    vec![text.to_string()]
                };
                Some(Value::Seq(paths.iter().map(|p| Value::Str(self.add_extension(p))).collect()))
            },
            ItemKind::Bool => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(Value::Bool(true)),
                "false" | "0" | "no" => Some(Value::Bool(false)),
                _ => None,
            },
            ItemKind::Date => NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok().map(Value::Date),
            ItemKind::DateTime => {
                let text = text.trim();
                text.parse::<NaiveDateTime>().ok()
                    .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f").ok())
                    .map(Value::DateTime)
            },
            ItemKind::Choice | ItemKind::ImageChoice => self.static_choices()?
                .into_iter()
                .find(|c| c.key.to_string() == text)
                .map(|c| c.key),
            _ => None,
        }
    }

    fn add_extension(&self, path: &str) -> String {
        let formats = self.formats();
        match formats.as_slice() {
            [ext] if ext != "*" && !path.is_empty() && !path.ends_with(&format!(".{}", ext)) => {
                format!("{}.{}", path, ext)
            },
            _ => path.to_string(),
        }
    }

    fn formats(&self) -> Vec<String> {
        match self.static_data("formats") {
            Some(Value::Seq(v)) => v.iter().map(|f| f.to_string()).collect(),
            Some(Value::Str(s)) => vec![s.clone()],
            _ => vec!["*".to_string()],
        }
    }

    /// Parse `text` and store the result (`None` when it does not parse).
    pub fn set_from_string(&self, instance: &mut DataSet, text: &str) -> Result<()> {
        let value = self.from_string(text).unwrap_or_default();
        instance.set(&self.name, value)
    }

    /// Reset the item's value on `instance`.
    pub fn set_default(&self, instance: &mut DataSet) {
        let value = match &self.kind {
            ItemKind::Object { schema } => {
                let mut nested = DataSet::new(schema.clone());
                if let Value::Dict(defaults) = &self.default {
                    crate::conv::update_dataset_from_map(&mut nested, defaults);
                }
                Value::Object(Box::new(nested))
            },
            _ => self.default.clone(),
        };
        instance.set_unchecked(&self.name, value);
    }

    /// Tooltip text: the help text followed by the automatic description.
    pub fn get_help(&self, instance: &DataSet) -> String {
        let auto = self.get_auto_help(instance);
        match (self.help.is_empty(), auto.is_empty()) {
            (_, true) => self.help.clone(),
            (false, false) => format!("{}\n({})", self.help, auto),
            (true, false) => {
                let mut chars = auto.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => auto,
                }
            },
        }
    }

    /// Generated description of the accepted values, e.g. `float between 1 and 250, unit: mm`.
    pub fn get_auto_help(&self, instance: &DataSet) -> String {
        match &self.kind {
            ItemKind::Float | ItemKind::Int => {
                let mut help = match self.kind {
                    ItemKind::Int => "integer".to_string(),
                    _ => "float".to_string(),
                };
                let min = self.shown(Realm::Data, instance, "min");
                let max = self.shown(Realm::Data, instance, "max");
                match (min, max) {
                    (Some(min), Some(max)) => help += &format!(" between {} and {}", min, max),
                    (Some(min), None) => help += &format!(" higher than {}", min),
                    (None, Some(max)) => help += &format!(" lower than {}", max),
                    (None, None) => {},
                }
                if self.shown(Realm::Data, instance, "nonzero").map_or(false, |v| v.truthy()) {
                    help += ", non zero";
                }
                if let Some(unit) = self.shown(Realm::Display, instance, "unit").filter(Value::truthy) {
                    help += &format!(", unit: {}", unit);
                }
                if let ItemKind::Int = self.kind {
                    match self.shown(Realm::Data, instance, "even").and_then(|v| v.as_bool()) {
                        Some(true) => help += ", even",
                        Some(false) => help += ", odd",
                        None => {},
                    }
                }
                help
            },
            ItemKind::FileSave | ItemKind::FileOpen | ItemKind::FilesOpen => {
                let formats = self.formats();
                if formats == ["*"] {
                    "all file types".to_string()
                } else {
                    format!("supported file types: *.{}", formats.join(", *."))
                }
            },
            kind if kind.is_stringlike() => {
                let mut help = "string".to_string();
                if self.shown(Realm::Data, instance, "notempty").map_or(false, |v| v.truthy()) {
                    help += ", not empty";
                }
                if let Some(re) = self.shown(Realm::Data, instance, "regexp") {
                    help += &format!(", regexp: ``{}``", re);
                }
                help
            },
            _ => String::new(),
        }
    }

    /// Human readable text of the current value, honouring the `repr`, `format`, `func` and
    /// `unit` display properties.
    pub fn get_string_value(&self, instance: &DataSet) -> String {
        if let Some(repr) = self.shown(Realm::Display, instance, "repr") {
            return repr.to_string();
        }
        let value = self.get_value(instance);
        match &self.kind {
            ItemKind::Bool => {
                let mut text = if value.truthy() { "☑" } else { "☐" }.to_string();
                let label = self.shown(Realm::Display, instance, "label").filter(Value::truthy);
                let extra = self.shown(Realm::Display, instance, "text").filter(Value::truthy);
                if let (Some(_), Some(extra)) = (label, extra) {
                    text.push(' ');
                    text.push_str(&extra.to_string());
                }
                text
            },
            ItemKind::Choice | ItemKind::ImageChoice => {
                let choices = self.choices(instance).unwrap_or_default();
                match choices.into_iter().find(|c| c.key == value) {
                    Some(choice) => choice.label,
                    None => self.formatted(instance, &value),
                }
            },
            ItemKind::FloatArray { .. } => match &value {
                Value::Array(a) => self.array_text(instance, a),
                Value::None => String::new(),
                other => other.to_string(),
            },
            ItemKind::String | ItemKind::Text => {
                let text = self.formatted(instance, &value);
                match self.shown(Realm::Display, instance, "password").map_or(false, |v| v.truthy()) {
                    true => "*".repeat(text.chars().count()),
                    false => text,
                }
            },
            _ => self.formatted(instance, &value),
        }
    }

    fn formatted(&self, instance: &DataSet, value: &Value) -> String {
        if value.is_none() {
            return String::new();
        }
        let fmt = match self.shown(Realm::Display, instance, "format") {
            Some(Value::Str(fmt)) => fmt,
            _ => "%s".to_string(),
        };
        let shown = self.display_func(value.clone());
        let mut text = pyfmt::percent_format(&fmt, &shown).unwrap_or_else(|_| shown.to_string());
        if self.kind.is_numeric() {
            if let Some(unit) = self.shown(Realm::Display, instance, "unit").filter(Value::truthy) {
                text.push(' ');
                text.push_str(&unit.to_string());
            }
        }
        text
    }

    /// Transformation applied before formatting: a `func` display property, or the file name
    /// of path items.
    fn display_func(&self, value: Value) -> Value {
        if let Some(PropValue::Computed(ItemProperty::Func { forward, .. })) = self.prop(Realm::Display, "func") {
            return forward(value);
        }
        match (&self.kind, value) {
            (ItemKind::FileSave | ItemKind::FileOpen, Value::Str(path)) => Value::Str(basename(&path)),
            (ItemKind::FilesOpen, Value::Seq(paths)) => Value::Seq(paths.into_iter().map(|p| match p {
                Value::Str(path) => Value::Str(basename(&path)),
                other => other,
            }).collect()),
            (_, value) => value,
        }
    }

    fn array_text(&self, instance: &DataSet, array: &Array) -> String {
        let fmt = match self.shown(Realm::Display, instance, "format") {
            Some(Value::Str(fmt)) => fmt,
            _ => "%s".to_string(),
        };
        let unit = self.shown(Realm::Display, instance, "unit").map(|u| u.to_string()).unwrap_or_default();
        let large = self.shown(Realm::Display, instance, "large").map_or(false, |v| v.truthy());
        let values = match array.to_f64_vec() {
            Some(values) => values,
            None => return format!("= {} {}", array, unit),
        };
        if values.is_empty() {
            return "= []".to_string();
        }
        let f = |x: f64| pyfmt::percent_format(&fmt, &Value::Float(x));
        let text: Result<String> = (|| {
            if large {
                let parts = values.iter().map(|&x| f(x)).collect::<Result<Vec<_>>>()?;
                Ok(format!("= [{}]", parts.join("; ")))
            } else {
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                Ok(format!("~= {} [{} .. {}]", f(mean)?, f(min)?, f(max)?))
            }
        })();
        match text {
            Ok(text) => format!("{} {}", text, unit),
            Err(_) => format!("= {} {}", array, unit),
        }
    }

    /// Write the item's value on `instance` to `writer`, at the writer's current scope.
    pub fn serialize(&self, instance: &DataSet, writer: &mut dyn Writer) -> Result<()> {
        let value = self.get_value(instance);
        match (&self.kind, &value) {
            (ItemKind::Button { .. } | ItemKind::BeginGroup | ItemKind::EndGroup
             | ItemKind::BeginTabGroup | ItemKind::EndTabGroup, _) => Ok(()),
            (_, Value::None) => writer.write_none(),
            (ItemKind::FloatArray { .. }, Value::Array(a)) => writer.write_array(a),
            (ItemKind::Dict, Value::Dict(d)) => writer.write_dict(d),
            (ItemKind::FilesOpen, Value::Seq(paths)) => writer.write_sequence(paths),
            (ItemKind::FilesOpen, Value::Str(path)) => writer.write_sequence(&[Value::Str(path.clone())]),
            (ItemKind::MultipleChoice, Value::Seq(selected)) => {
                let flags: Vec<Value> = self.choices(instance)?
                    .iter()
                    .map(|c| Value::Bool(selected.contains(&c.key)))
                    .collect();
                writer.write_sequence(&flags)
            },
            (ItemKind::Date, Value::Date(d)) => writer.write_date(*d),
            (ItemKind::DateTime, Value::DateTime(dt)) => writer.write_datetime(*dt),
            (ItemKind::Object { .. }, Value::Object(nested)) => writer.write_object(nested.as_ref()),
            (_, value) => writer.write(value),
        }
    }

    /// Read the item's value from `reader` into `instance`.
    ///
    /// Nothing stored falls back to the default silently; any other read failure is logged and
    /// falls back to the default as well, so one bad item never spoils the rest of a dataset.
    pub fn deserialize(&self, instance: &mut DataSet, reader: &mut dyn Reader) -> Result<()> {
        let read = match &self.kind {
            ItemKind::Button { .. } | ItemKind::BeginGroup | ItemKind::EndGroup
            | ItemKind::BeginTabGroup | ItemKind::EndTabGroup => return Ok(()),
            ItemKind::Object { schema } => {
                let mut nested = DataSet::new(schema.clone());
                nested.deserialize(reader)?;
                instance.set_unchecked(&self.name, Value::Object(Box::new(nested)));
                return Ok(());
            },
            ItemKind::MultipleChoice => self.read_choice_flags(instance, reader),
            ItemKind::Float => reader.read_float().map(Value::from),
            ItemKind::Int => reader.read_int().map(Value::from),
            ItemKind::Bool => reader.read_bool().map(Value::from),
            kind if kind.is_stringlike() => reader.read_str().map(Value::from),
            ItemKind::FilesOpen => reader.read_sequence().map(|v| v.map_or(Value::None, Value::Seq)),
            ItemKind::FloatArray { .. } => reader.read_array().map(Value::from),
            ItemKind::Dict => reader.read_dict().map(|d| d.map_or(Value::None, Value::Dict)),
            ItemKind::Date => reader.read_any().and_then(|v| self.as_date(v)),
            ItemKind::DateTime => reader.read_any().and_then(|v| self.as_datetime(v)),
            _ => reader.read_any(),
        };
        let outcome = read.and_then(|value| instance.set(&self.name, value));
        match outcome {
            Ok(()) => {},
            Err(e) if e.is_missing_key() => self.set_default(instance),
            Err(e) => {
                warn!("cannot deserialize item '{}' at '{}': {}", self.name, reader.option(), e);
                self.set_default(instance);
            },
        }
        Ok(())
    }

    fn read_choice_flags(&self, instance: &DataSet, reader: &mut dyn Reader) -> Result<Value> {
        let flags = match reader.read_sequence()? {
            Some(flags) => flags,
            None => return Ok(Value::None),
        };
        // the choice list is the one alive now, even if it depends on items read later
        let choices = self.choices(instance)?;
        Ok(Value::Seq(
            flags.iter()
                .zip(&choices)
                .filter(|(flag, _)| flag.truthy())
                .map(|(_, c)| c.key.clone())
                .collect(),
        ))
    }

    fn as_date(&self, value: Value) -> Result<Value> {
        match value {
            Value::Int(ordinal) => date_from_ordinal(ordinal)
                .map(Value::Date)
                .ok_or_else(|| Error::Unsupported(format!("date ordinal {} out of range", ordinal))),
            v @ (Value::Date(_) | Value::None) => Ok(v),
            other => Err(Error::mismatch(self.name.clone(), "date", &other)),
        }
    }

    fn as_datetime(&self, value: Value) -> Result<Value> {
        match value {
            Value::Float(_) | Value::Int(_) => {
                let ts = value.as_f64().unwrap_or_default();
                datetime_from_timestamp(ts)
                    .map(Value::DateTime)
                    .ok_or_else(|| Error::Unsupported(format!("timestamp {} out of range", ts)))
            },
            v @ (Value::DateTime(_) | Value::None) => Ok(v),
            other => Err(Error::mismatch(self.name.clone(), "datetime", &other)),
        }
    }

    /// Dispatch to the visitor method of this item's kind.
    pub fn accept(&self, instance: &mut DataSet, visitor: &mut dyn ItemVisitor) -> Result<()> {
        match &self.kind {
            ItemKind::Float => visitor.visit_float(instance, self),
            ItemKind::Int => visitor.visit_int(instance, self),
            ItemKind::String => visitor.visit_string(instance, self),
            ItemKind::Text => visitor.visit_text(instance, self),
            ItemKind::Bool => visitor.visit_bool(instance, self),
            ItemKind::Date | ItemKind::DateTime => visitor.visit_date(instance, self),
            ItemKind::Color => visitor.visit_color(instance, self),
            ItemKind::FileSave | ItemKind::FileOpen | ItemKind::FilesOpen | ItemKind::Directory => {
                visitor.visit_path(instance, self)
            },
            ItemKind::Choice | ItemKind::MultipleChoice | ItemKind::ImageChoice => visitor.visit_choice(instance, self),
            ItemKind::FloatArray { .. } => visitor.visit_float_array(instance, self),
            ItemKind::Dict => visitor.visit_dict(instance, self),
            ItemKind::Button { .. } => visitor.visit_button(instance, self),
            ItemKind::FontFamily => visitor.visit_font_family(instance, self),
            ItemKind::Object { .. } => visitor.visit_object(instance, self),
            ItemKind::BeginGroup | ItemKind::EndGroup | ItemKind::BeginTabGroup | ItemKind::EndTabGroup => {
                visitor.visit_group_marker(instance, self)
            },
        }
    }

    /// Run the button callback, storing what it returns.  Other items are left alone.
    pub fn press(&self, instance: &mut DataSet) -> Result<()> {
        if let ItemKind::Button { callback: Some(callback) } = &self.kind {
            let current = self.get_value(instance);
            let value = callback(instance, self, &current);
            instance.set(&self.name, value)?;
        }
        Ok(())
    }

    /// Whether the item is a selectable choice list.
    pub fn is_choice(&self) -> bool { self.kind.is_choice() }
}

fn choices_from_value(value: &Value) -> Vec<Choice> {
    match value.as_seq() {
        Some(entries) => entries.iter().enumerate().map(|(i, v)| Choice::from_value(i, v)).collect(),
        None => vec![],
    }
}

fn basename(path: &str) -> String {
    match path.rfind(['/', '\\']) {
        Some(pos) => path[pos + 1..].to_string(),
        None => path.to_string(),
    }
}

fn parse_string_list(text: &str) -> Option<Vec<String>> {
    match text.parse::<py_literal::Value>().ok()? {
        py_literal::Value::List(items) | py_literal::Value::Tuple(items) => items.into_iter()
            .map(|item| match item {
                py_literal::Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

/// Colour specifications accepted by Qt's `QColor`: `#rgb`, `#rrggbb`, `#aarrggbb`,
/// `#rrrgggbbb`, `#rrrrggggbbbb` or an SVG colour keyword.
pub fn is_valid_color(text: &str) -> bool {
    if let Some(hex) = text.strip_prefix('#') {
        return matches!(hex.len(), 3 | 6 | 8 | 9 | 12) && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    let lower = text.to_ascii_lowercase();
    lower == "transparent" || SVG_COLOR_NAMES.binary_search(&lower.as_str()).is_ok()
}

const SVG_COLOR_NAMES: &[&str] = &[
    "aliceblue", "antiquewhite", "aqua", "aquamarine", "azure", "beige", "bisque", "black",
    "blanchedalmond", "blue", "blueviolet", "brown", "burlywood", "cadetblue", "chartreuse",
    "chocolate", "coral", "cornflowerblue", "cornsilk", "crimson", "cyan", "darkblue", "darkcyan",
    "darkgoldenrod", "darkgray", "darkgreen", "darkgrey", "darkkhaki", "darkmagenta",
    "darkolivegreen", "darkorange", "darkorchid", "darkred", "darksalmon", "darkseagreen",
    "darkslateblue", "darkslategray", "darkslategrey", "darkturquoise", "darkviolet", "deeppink",
    "deepskyblue", "dimgray", "dimgrey", "dodgerblue", "firebrick", "floralwhite", "forestgreen",
    "fuchsia", "gainsboro", "ghostwhite", "gold", "goldenrod", "gray", "green", "greenyellow",
    "grey", "honeydew", "hotpink", "indianred", "indigo", "ivory", "khaki", "lavender",
    "lavenderblush", "lawngreen", "lemonchiffon", "lightblue", "lightcoral", "lightcyan",
    "lightgoldenrodyellow", "lightgray", "lightgreen", "lightgrey", "lightpink", "lightsalmon",
    "lightseagreen", "lightskyblue", "lightslategray", "lightslategrey", "lightsteelblue",
    "lightyellow", "lime", "limegreen", "linen", "magenta", "maroon", "mediumaquamarine",
    "mediumblue", "mediumorchid", "mediumpurple", "mediumseagreen", "mediumslateblue",
    "mediumspringgreen", "mediumturquoise", "mediumvioletred", "midnightblue", "mintcream",
    "mistyrose", "moccasin", "navajowhite", "navy", "oldlace", "olive", "olivedrab", "orange",
    "orangered", "orchid", "palegoldenrod", "palegreen", "paleturquoise", "palevioletred",
    "papayawhip", "peachpuff", "peru", "pink", "plum", "powderblue", "purple", "red", "rosybrown",
    "royalblue", "saddlebrown", "salmon", "sandybrown", "seagreen", "seashell", "sienna", "silver",
    "skyblue", "slateblue", "slategray", "slategrey", "snow", "springgreen", "steelblue", "tan",
    "teal", "thistle", "tomato", "turquoise", "violet", "wheat", "white", "whitesmoke", "yellow",
    "yellowgreen",
];
