use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;

use crate::dataset::DataSet;
use crate::error::{Error, Result};
use crate::item::DataItem;
use crate::pyfmt;
use crate::value::Value;

/// Namespace of an item property.
///
/// `Data` properties drive checking and (de)serialization, `Display` properties drive text and
/// widget rendering, and `Edit` properties are consumed by editors.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Realm {
    Data,
    Display,
    Edit,
}

impl Realm {
    pub fn as_str(self) -> &'static str {
        match self {
            Realm::Data => "data",
            Realm::Display => "display",
            Realm::Edit => "edit",
        }
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Function applied by [`ItemProperty::Func`].
pub type ValueFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// A property whose value is computed from the dataset instance when it is read.
///
/// ```
/// use guidata::{DataSet, FloatItem, BoolItem, ItemProperty, Realm, Schema, Value};
///
/// let schema = Schema::builder("Processing")
///     .item("enabled", BoolItem::new("Enabled").default(false))
///     .item("sigma", FloatItem::new("Sigma").default(1.0)
///         .prop(Realm::Display, "active", ItemProperty::attr("enabled")))
///     .build();
/// let mut ds = DataSet::new(schema);
/// let sigma = ds.schema().item("sigma").unwrap().clone();
///
/// assert_eq!(sigma.get_prop_value(Realm::Display, &ds, "active")?, Value::Bool(false));
/// ds.set("enabled", true)?;
/// assert_eq!(sigma.get_prop_value(Realm::Display, &ds, "active")?, Value::Bool(true));
/// # Ok::<(), guidata::Error>(())
/// ```
#[derive(Clone)]
pub enum ItemProperty {
    /// Renders a format string.
    ///
    /// With `%(name)s` style fields, each name is looked up on the instance.  Without them the
    /// string is a `{}` template for the current item value.  When `ignore_error` is set, a
    /// formatting failure evaluates to `None` instead of an error.
    Format { fmt: String, ignore_error: bool },
    /// Mirrors an instance attribute: an item value or an extra attribute.
    GetAttr(String),
    /// A stored constant, shared by every clone of the property.
    Value(Arc<RwLock<Value>>),
    /// Boolean negation of another property.
    Not(Box<ItemProperty>),
    /// `forward` applied to another property.  Setting pushes `inverse` (or `forward` when
    /// there is no inverse) of the new value into the inner property.
    Func { prop: Box<ItemProperty>, forward: ValueFn, inverse: Option<ValueFn> },
}

impl ItemProperty {
    pub fn format(fmt: impl Into<String>) -> Self {
        ItemProperty::Format { fmt: fmt.into(), ignore_error: true }
    }

    pub fn format_strict(fmt: impl Into<String>) -> Self {
        ItemProperty::Format { fmt: fmt.into(), ignore_error: false }
    }

    pub fn attr(name: impl Into<String>) -> Self {
        ItemProperty::GetAttr(name.into())
    }

    pub fn value(value: impl Into<Value>) -> Self {
        ItemProperty::Value(Arc::new(RwLock::new(value.into())))
    }

    pub fn not(prop: ItemProperty) -> Self {
        ItemProperty::Not(Box::new(prop))
    }

    pub fn func(prop: ItemProperty, forward: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        ItemProperty::Func { prop: Box::new(prop), forward: Arc::new(forward), inverse: None }
    }

    pub fn func_with_inverse(
        prop: ItemProperty,
        forward: impl Fn(Value) -> Value + Send + Sync + 'static,
        inverse: impl Fn(Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        ItemProperty::Func { prop: Box::new(prop), forward: Arc::new(forward), inverse: Some(Arc::new(inverse)) }
    }

    /// Compute the property for `item` on `instance`, `value` being the item's current value.
    pub fn evaluate(&self, instance: &DataSet, item: &DataItem, value: &Value) -> Result<Value> {
        match self {
            ItemProperty::Format { fmt, ignore_error } => {
                let fields = pyfmt::named_fields(fmt);
                let rendered = if fields.is_empty() {
                    pyfmt::brace_format(fmt, value)
                } else {
                    pyfmt::percent_format_named(fmt, &mut |name| instance.get_attr(name))
                };
                match rendered {
                    Ok(text) => Ok(Value::Str(text)),
                    Err(_) if *ignore_error => Ok(Value::None),
                    Err(e) => {
                        log::warn!("wrong format for {}: {:?}", item.name(), fmt);
                        Err(e)
                    },
                }
            },
            ItemProperty::GetAttr(name) => {
                instance.get_attr(name).ok_or_else(|| Error::UnknownItem { name: name.clone() })
            },
            ItemProperty::Value(cell) => {
                Ok(cell.read().unwrap_or_else(PoisonError::into_inner).clone())
            },
            ItemProperty::Not(prop) => {
                Ok(Value::Bool(!prop.evaluate(instance, item, value)?.truthy()))
            },
            ItemProperty::Func { prop, forward, .. } => {
                Ok(forward(prop.evaluate(instance, item, value)?))
            },
        }
    }

    /// Store `value` wherever the property reads from.
    pub fn set(&self, instance: &mut DataSet, item: &DataItem, value: Value) -> Result<()> {
        match self {
            ItemProperty::Format { .. } => {
                Err(Error::Unsupported(format!("format property of '{}' cannot be set", item.name())))
            },
            ItemProperty::GetAttr(name) => instance.set_attr(name, value),
            ItemProperty::Value(cell) => {
                *cell.write().unwrap_or_else(PoisonError::into_inner) = value;
                Ok(())
            },
            ItemProperty::Not(prop) => prop.set(instance, item, Value::Bool(!value.truthy())),
            ItemProperty::Func { prop, forward, inverse } => {
                let inverse = inverse.as_ref().unwrap_or(forward);
                prop.set(instance, item, inverse(value))
            },
        }
    }
}

impl fmt::Debug for ItemProperty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ItemProperty::Format { fmt, ignore_error } => f.debug_struct("Format")
                .field("fmt", fmt)
                .field("ignore_error", ignore_error)
                .finish(),
            ItemProperty::GetAttr(name) => f.debug_tuple("GetAttr").field(name).finish(),
            ItemProperty::Value(cell) => match cell.read() {
                Ok(v) => f.debug_tuple("Value").field(&*v).finish(),
                Err(_) => f.write_str("Value(<poisoned>)"),
            },
            ItemProperty::Not(prop) => f.debug_tuple("Not").field(prop).finish(),
            ItemProperty::Func { prop, inverse, .. } => f.debug_struct("Func")
                .field("prop", prop)
                .field("invertible", &inverse.is_some())
                .finish_non_exhaustive(),
        }
    }
}

/// A property as stored on an item: a plain value or a computed one.
#[derive(Debug, Clone)]
pub enum PropValue {
    Value(Value),
    Computed(ItemProperty),
}

impl PropValue {
    /// The plain value, if the property is not computed.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            PropValue::Value(v) => Some(v),
            PropValue::Computed(_) => None,
        }
    }
}

impl From<ItemProperty> for PropValue {
    fn from(p: ItemProperty) -> Self { PropValue::Computed(p) }
}

macro_rules! impl_prop_value_from {
    ($($ty:ty),*) => {$(
        impl From<$ty> for PropValue {
            fn from(x: $ty) -> Self { PropValue::Value(x.into()) }
        }
    )*};
}

impl_prop_value_from!(Value, bool, i32, i64, f64, String, &str, Option<i64>, Option<f64>, Option<bool>, Vec<Value>);

/// The three property realms of one item.
#[derive(Debug, Clone, Default)]
pub struct Props {
    data: IndexMap<String, PropValue>,
    display: IndexMap<String, PropValue>,
    edit: IndexMap<String, PropValue>,
}

impl Props {
    pub fn realm(&self, realm: Realm) -> &IndexMap<String, PropValue> {
        match realm {
            Realm::Data => &self.data,
            Realm::Display => &self.display,
            Realm::Edit => &self.edit,
        }
    }

    pub fn realm_mut(&mut self, realm: Realm) -> &mut IndexMap<String, PropValue> {
        match realm {
            Realm::Data => &mut self.data,
            Realm::Display => &mut self.display,
            Realm::Edit => &mut self.edit,
        }
    }

    pub fn get(&self, realm: Realm, name: &str) -> Option<&PropValue> {
        self.realm(realm).get(name)
    }

    pub fn set(&mut self, realm: Realm, name: &str, value: PropValue) {
        self.realm_mut(realm).insert(name.to_string(), value);
    }
}
