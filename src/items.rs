//! Builders for every kind of [`DataItem`].
//!
//! Each builder starts from a label, takes optional settings by value, and converts into a
//! [`DataItem`] when added to a [`SchemaBuilder`](crate::SchemaBuilder):
//!
//! ```
//! use guidata::{FloatItem, IntItem, Schema, DataSet};
//!
//! let schema = Schema::builder("Acquisition")
//!     .item("exposure", FloatItem::new("Exposure").default(0.1).min(0).unit("s"))
//!     .item("frames", IntItem::new("Frames").default(10).max(1000))
//!     .build();
//! let ds = DataSet::new(schema);
//! assert_eq!(ds.check(), Vec::<String>::new());
//! ```

use std::sync::Arc;

use indexmap::IndexMap;

use crate::array::Array;
use crate::dataset::{DataSet, Schema};
use crate::item::{Choice, DataItem, ItemKind};
use crate::props::{ItemProperty, PropValue, Realm};
use crate::value::Value;

macro_rules! item_builder {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name(DataItem);

        impl $name {
            /// Default value, set on new instances and whenever nothing could be read.
            pub fn default(mut self, value: impl Into<Value>) -> Self {
                self.0.set_default_value(value.into());
                self
            }

            /// Help text shown before the generated description.
            pub fn help(mut self, help: impl Into<String>) -> Self {
                self.0.set_help(help);
                self
            }

            /// Set any property.
            pub fn prop(mut self, realm: Realm, name: &str, value: impl Into<PropValue>) -> Self {
                self.0.set_prop(realm, name, value);
                self
            }

            /// Accept `None` as a valid value.
            pub fn allow_none(self, flag: bool) -> Self {
                self.prop(Realm::Data, "allow_none", flag)
            }

            /// Switch value checking on or off.
            pub fn check(self, flag: bool) -> Self {
                self.prop(Realm::Data, "check_value", flag)
            }

            /// Position in a grid layout.
            pub fn pos(mut self, col: i64, colspan: Option<i64>, row: Option<i64>) -> Self {
                self.0.set_pos(col, colspan, row);
                self
            }

            /// Widget visibility.
            pub fn hidden(self, flag: impl Into<PropValue>) -> Self {
                self.prop(Realm::Display, "hide", flag)
            }

            /// Widget activity.
            pub fn active(self, flag: impl Into<PropValue>) -> Self {
                self.prop(Realm::Display, "active", flag)
            }

            /// Whether the item is (de)serialized.
            pub fn store(self, flag: impl Into<PropValue>) -> Self {
                self.prop(Realm::Display, "store", flag)
            }

            pub fn item(&self) -> &DataItem { &self.0 }
        }

        impl From<$name> for DataItem {
            fn from(builder: $name) -> Self { builder.0 }
        }
    };
}

macro_rules! simple_new {
    ($name:ident, $kind:expr) => {
        impl $name {
            pub fn new(label: impl Into<String>) -> Self {
                $name(DataItem::new($kind, label, Value::None))
            }
        }
    };
}

macro_rules! numeric_settings {
    ($name:ident) => {
        impl $name {
            /// Smallest accepted value.
            pub fn min(self, min: impl Into<PropValue>) -> Self {
                self.prop(Realm::Data, "min", min)
            }

            /// Largest accepted value.
            pub fn max(self, max: impl Into<PropValue>) -> Self {
                self.prop(Realm::Data, "max", max)
            }

            /// Reject zero.
            pub fn nonzero(self, flag: bool) -> Self {
                self.prop(Realm::Data, "nonzero", flag)
            }

            /// Unit appended to the displayed value.
            pub fn unit(self, unit: impl Into<PropValue>) -> Self {
                self.prop(Realm::Display, "unit", unit)
            }

            /// `%`-style format of the displayed value.
            pub fn format(self, format: &str) -> Self {
                self.prop(Realm::Display, "format", format)
            }

            /// Show a slider next to the input field.
            pub fn slider(self, flag: bool) -> Self {
                self.prop(Realm::Display, "slider", flag)
            }
        }
    };
}

macro_rules! path_settings {
    ($name:ident) => {
        impl $name {
            /// Accepted extensions, without the leading dot.  A single extension is appended to
            /// typed paths lacking it.
            pub fn formats(self, formats: &[&str]) -> Self {
                let formats: Vec<Value> = formats.iter().map(|f| Value::from(*f)).collect();
                self.prop(Realm::Data, "formats", formats)
            }

            /// Directory a file dialog starts in.
            pub fn basedir(self, dir: impl Into<PropValue>) -> Self {
                self.prop(Realm::Data, "basedir", dir)
            }

            /// List "all files" first in the dialog filter.
            pub fn all_files_first(self, flag: bool) -> Self {
                self.prop(Realm::Data, "all_files_first", flag)
            }
        }
    };
}

item_builder!(
    /// Floating point value.
    FloatItem
);
simple_new!(FloatItem, ItemKind::Float);
numeric_settings!(FloatItem);

impl FloatItem {
    /// Increment of spin boxes and sliders.
    pub fn step(self, step: f64) -> Self {
        self.prop(Realm::Display, "step", step)
    }
}

item_builder!(
    /// Integer value.
    IntItem
);
simple_new!(IntItem, ItemKind::Int);
numeric_settings!(IntItem);

impl IntItem {
    /// Only accept even (`true`) or odd (`false`) values.
    pub fn even(self, even: bool) -> Self {
        self.prop(Realm::Data, "even", even)
    }
}

item_builder!(
    /// Single line of text.
    StringItem
);
simple_new!(StringItem, ItemKind::String);

impl StringItem {
    /// Reject the empty string.
    pub fn notempty(self, flag: bool) -> Self {
        self.prop(Realm::Data, "notempty", flag)
    }

    /// Pattern the value must match, from its start.
    pub fn regexp(self, pattern: &str) -> Self {
        self.prop(Realm::Data, "regexp", pattern)
    }

    /// Mask the value when displayed.
    pub fn password(self, flag: bool) -> Self {
        self.prop(Realm::Display, "password", flag)
    }

    pub fn wordwrap(self, flag: bool) -> Self {
        self.prop(Realm::Display, "wordwrap", flag)
    }
}

item_builder!(
    /// Multi-line text.
    TextItem
);
simple_new!(TextItem, ItemKind::Text);

impl TextItem {
    pub fn notempty(self, flag: bool) -> Self {
        self.prop(Realm::Data, "notempty", flag)
    }

    pub fn wordwrap(self, flag: bool) -> Self {
        self.prop(Realm::Display, "wordwrap", flag)
    }
}

item_builder!(
    /// Check box.
    BoolItem
);

impl BoolItem {
    pub fn new(label: impl Into<String>) -> Self {
        BoolItem(DataItem::new(ItemKind::Bool, label, Value::Bool(false)))
            .prop(Realm::Display, "text", "")
    }

    /// Text next to the check box.
    pub fn text(self, text: &str) -> Self {
        self.prop(Realm::Display, "text", text)
    }
}

item_builder!(
    /// Calendar date.
    DateItem
);
simple_new!(DateItem, ItemKind::Date);

item_builder!(
    /// Date and time of day.
    DateTimeItem
);
simple_new!(DateTimeItem, ItemKind::DateTime);

impl DateItem {
    pub fn format(self, format: &str) -> Self {
        self.prop(Realm::Display, "format", format)
    }
}

impl DateTimeItem {
    pub fn format(self, format: &str) -> Self {
        self.prop(Realm::Display, "format", format)
    }
}

item_builder!(
    /// Colour name or `#rrggbb` specification.
    ColorItem
);
simple_new!(ColorItem, ItemKind::Color);

item_builder!(
    /// Path of a file to write.
    FileSaveItem
);
simple_new!(FileSaveItem, ItemKind::FileSave);
path_settings!(FileSaveItem);

item_builder!(
    /// Path of an existing file.
    FileOpenItem
);
simple_new!(FileOpenItem, ItemKind::FileOpen);
path_settings!(FileOpenItem);

item_builder!(
    /// Paths of several existing files.
    FilesOpenItem
);
path_settings!(FilesOpenItem);

impl FilesOpenItem {
    pub fn new(label: impl Into<String>) -> Self {
        FilesOpenItem(DataItem::new(ItemKind::FilesOpen, label, Value::Seq(vec![])))
    }
}

item_builder!(
    /// Path of an existing directory.
    DirectoryItem
);
simple_new!(DirectoryItem, ItemKind::Directory);

item_builder!(
    /// One value out of a list of choices.
    ChoiceItem
);

fn choice_list<C: Into<Choice>>(choices: impl IntoIterator<Item = C>) -> Vec<Choice> {
    choices.into_iter().map(Into::into).collect()
}

fn labelled(labels: &[&str]) -> Vec<Choice> {
    labels.iter().enumerate().map(|(i, label)| Choice::new(i as i64, *label)).collect()
}

fn choices_prop(choices: &[Choice]) -> Value {
    Value::Seq(choices.iter().map(Choice::to_value).collect())
}

fn choice_item(kind: ItemKind, label: impl Into<String>, choices: Vec<Choice>) -> DataItem {
    // the first key stands in for a missing default
    let default = choices.first().map_or(Value::None, |c| c.key.clone());
    let mut item = DataItem::new(kind, label, default);
    item.set_prop(Realm::Data, "choices", choices_prop(&choices));
    item
}

impl ChoiceItem {
    pub fn new<C: Into<Choice>>(label: impl Into<String>, choices: impl IntoIterator<Item = C>) -> Self {
        ChoiceItem(choice_item(ItemKind::Choice, label, choice_list(choices)))
            .prop(Realm::Display, "radio", false)
    }

    /// Choices keyed by their index.
    pub fn from_labels(label: impl Into<String>, labels: &[&str]) -> Self {
        ChoiceItem(choice_item(ItemKind::Choice, label, labelled(labels)))
            .prop(Realm::Display, "radio", false)
    }

    /// Choices computed from the instance when needed, e.g. a [`ItemProperty::Func`] over
    /// another item.  The property must evaluate to a list of choice entries.
    pub fn computed(label: impl Into<String>, choices: ItemProperty) -> Self {
        ChoiceItem(DataItem::new(ItemKind::Choice, label, Value::None))
            .prop(Realm::Data, "choices", choices)
            .prop(Realm::Display, "radio", false)
    }

    /// Show radio buttons instead of a combo box.
    pub fn radio(self, flag: bool) -> Self {
        self.prop(Realm::Display, "radio", flag)
    }
}

item_builder!(
    /// Any number of values out of a list of choices.
    MultipleChoiceItem
);

impl MultipleChoiceItem {
    pub fn new<C: Into<Choice>>(label: impl Into<String>, choices: impl IntoIterator<Item = C>) -> Self {
        let mut item = choice_item(ItemKind::MultipleChoice, label, choice_list(choices));
        item.set_default_value(Value::Seq(vec![]));
        MultipleChoiceItem(item)
    }

    pub fn from_labels(label: impl Into<String>, labels: &[&str]) -> Self {
        let mut item = choice_item(ItemKind::MultipleChoice, label, labelled(labels));
        item.set_default_value(Value::Seq(vec![]));
        MultipleChoiceItem(item)
    }

    /// Check box grid layout: `(rows, columns)`, either may be negative to mean "as needed".
    pub fn vertical(self, rows: i64) -> Self {
        self.prop(Realm::Display, "shape", Value::Seq(vec![Value::Int(rows), Value::Int(1)]))
    }

    pub fn horizontal(self, columns: i64) -> Self {
        self.prop(Realm::Display, "shape", Value::Seq(vec![Value::Int(1), Value::Int(columns)]))
    }
}

item_builder!(
    /// Choice list displayed with images.
    ImageChoiceItem
);

impl ImageChoiceItem {
    /// `choices` are `(key, label, image)` triples.
    pub fn new<C: Into<Choice>>(label: impl Into<String>, choices: impl IntoIterator<Item = C>) -> Self {
        ImageChoiceItem(choice_item(ItemKind::ImageChoice, label, choice_list(choices)))
    }

    /// Image size in pixels.
    pub fn size(self, width: i64, height: i64) -> Self {
        self.prop(Realm::Display, "size", Value::Seq(vec![Value::Int(width), Value::Int(height)]))
    }
}

item_builder!(
    /// N-dimensional numeric array.
    FloatArrayItem
);

impl FloatArrayItem {
    pub fn new(label: impl Into<String>) -> Self {
        FloatArrayItem(DataItem::new(ItemKind::FloatArray { check: None }, label, Value::None))
            .prop(Realm::Display, "format", "%.3f")
            .prop(Realm::Display, "large", false)
    }

    pub fn format(self, format: &str) -> Self {
        self.prop(Realm::Display, "format", format)
    }

    pub fn unit(self, unit: &str) -> Self {
        self.prop(Realm::Display, "unit", unit)
    }

    /// Show every element instead of a summary.
    pub fn large(self, flag: bool) -> Self {
        self.prop(Realm::Display, "large", flag)
    }

    pub fn transpose(self, flag: bool) -> Self {
        self.prop(Realm::Display, "transpose", flag)
    }

    /// Extra check run on array values.
    pub fn check_with(mut self, check: impl Fn(&Array) -> bool + Send + Sync + 'static) -> Self {
        *self.0.kind_mut() = ItemKind::FloatArray { check: Some(Arc::new(check)) };
        self
    }
}

item_builder!(
    /// String-keyed mapping of arbitrary values.
    DictItem
);

impl DictItem {
    pub fn new(label: impl Into<String>) -> Self {
        DictItem(DataItem::new(ItemKind::Dict, label, Value::Dict(IndexMap::new())))
    }
}

item_builder!(
    /// Push button running a callback; never (de)serialized.
    ButtonItem
);

impl ButtonItem {
    /// The callback receives the instance, the item and its value, and returns the new value.
    pub fn new(
        label: impl Into<String>,
        callback: impl Fn(&mut DataSet, &DataItem, &Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        let kind = ItemKind::Button { callback: Some(Arc::new(callback)) };
        ButtonItem(DataItem::new(kind, label, Value::None))
    }

    pub fn icon(self, icon: &str) -> Self {
        self.prop(Realm::Display, "icon", icon)
    }
}

item_builder!(
    /// Font family name.
    FontFamilyItem
);
simple_new!(FontFamilyItem, ItemKind::FontFamily);

item_builder!(
    /// A nested dataset.
    ///
    /// A `Dict` default is applied to the nested dataset's own defaults.
    ObjectItem
);

impl ObjectItem {
    pub fn new(label: impl Into<String>, schema: Arc<Schema>) -> Self {
        ObjectItem(DataItem::new(ItemKind::Object { schema }, label, Value::None))
    }
}

item_builder!(
    /// Opens a group of items, closed by the next [`EndGroup`].
    BeginGroup
);
simple_new!(BeginGroup, ItemKind::BeginGroup);

item_builder!(
    /// Closes the innermost open group.
    EndGroup
);
simple_new!(EndGroup, ItemKind::EndGroup);

item_builder!(
    /// Opens a group whose sub-groups are shown as tabs.
    BeginTabGroup
);
simple_new!(BeginTabGroup, ItemKind::BeginTabGroup);

item_builder!(
    /// Closes the innermost tab group.
    EndTabGroup
);
simple_new!(EndTabGroup, ItemKind::EndTabGroup);
