/*!
Declarative datasets of typed, validated items, with INI, JSON and HDF5 persistence.

# Overview

A [`Schema`] is the ordered list of items of a dataset class: a float with bounds, a choice
among labelled keys, an array, a nested dataset...  A [`DataSet`] holds one value per item.
Items know how to check, format, parse and (de)serialize their value; a dataset does the same
for all of its items at once, in declaration order.

```
use guidata::{ChoiceItem, DataSet, FloatItem, IntItem, Schema, Value};

let schema = Schema::builder("Processing")
    .doc("Processing parameters")
    .item("a", FloatItem::new("Parameter #1").default(2.3))
    .item("b", IntItem::new("Parameter #2").default(5).min(0).max(10))
    .item("kind", ChoiceItem::from_labels("Kind", &["Fast", "Accurate"]))
    .build();

let mut ds = DataSet::new(schema);
ds.set("b", 7)?;
assert_eq!(ds.get("a"), Some(&Value::Float(2.3)));
assert!(ds.check().is_empty());
# Ok::<(), guidata::Error>(())
```

## Validation

By default any value is accepted on assignment.  The [validation mode](config) can log invalid
values or reject them:

```
use guidata::config::{temporary_validation_mode, ValidationMode};
use guidata::{DataSet, IntItem, Schema};

let schema = Schema::builder("Bounded").item("n", IntItem::new("N").max(10)).build();
let mut ds = DataSet::new(schema);

let _guard = temporary_validation_mode(ValidationMode::Strict);
assert!(ds.set("n", 400).is_err());
# Ok::<(), guidata::Error>(())
```

## Persistence

Datasets implement [`io::Serializable`] and [`io::Deserializable`], so they can be stored with
any [`io::Writer`] and read back with any [`io::Reader`]:

* [`io::IniWriter`] / [`io::IniReader`] store one option per item in a [`UserConfig`];
* [`io::JsonWriter`] / [`io::JsonReader`] build nested JSON objects;
* [`io::H5Writer`] / [`io::H5Reader`] (feature `h5`) store groups, attributes and array
  datasets in an [`h5file::H5File`].

```
use guidata::io::{GroupExt, JsonReader, JsonWriter, ReaderExt};
use guidata::{DataSet, Deserializable, FloatItem, Schema, Serializable};

let schema = Schema::builder("Gain").item("gain", FloatItem::new("Gain").default(1.0)).build();
let mut ds = DataSet::new(schema.clone());
ds.set("gain", 4.0)?;

let mut writer = JsonWriter::new(None);
writer.group("camera", |w| ds.serialize(w))?;
assert_eq!(writer.get_json(None)?, r#"{"camera":{"gain":4.0}}"#);

let mut reader: JsonReader = writer.get_json(None)?.parse()?;
let mut back = DataSet::new(schema);
reader.group("camera", |r| back.deserialize(r))?;
assert_eq!(back, ds);
# Ok::<(), guidata::Error>(())
```

## Optional cargo features

* **`"h5"`** (default) enables the HDF5 backend.  It builds the bundled HDF5 library, so it
  needs a C compiler and CMake.
*/

mod array;
pub mod config;
pub mod conv;
mod dataset;
mod error;
pub mod expr;
#[cfg(feature = "h5")]
pub mod h5file;
pub mod io;
mod item;
pub mod items;
mod props;
pub mod pyfmt;
mod type_str;
mod userconfig;
mod value;
mod visitor;

pub use array::{Array, ArrayData};
pub use config::{set_validation_mode, temporary_validation_mode, validation_mode, ValidationMode};
pub use dataset::{DataSet, DataSetGroup, Schema, SchemaBuilder};
pub use error::{Error, Result};
pub use io::{Deserializable, Serializable};
pub use item::{is_valid_color, Choice, DataItem, ItemKind};
pub use items::*;
pub use props::{ItemProperty, PropValue, Props, Realm};
pub use type_str::{Endianness, ParseTypeStrError, TypeChar, TypeStr};
pub use userconfig::{config_path, Defaults, UserConfig};
pub use value::{date_from_ordinal, date_to_ordinal, datetime_from_timestamp, datetime_to_timestamp, Value};
pub use visitor::{ItemVisitor, TextEditVisitor};
