use std::sync::Arc;

use guidata::{
    temporary_validation_mode, validation_mode, Array, DataSet, DirectoryItem, Error, FileOpenItem,
    FileSaveItem, FilesOpenItem, FloatArrayItem, FloatItem, IntItem, Schema, StringItem,
    ValidationMode, Value,
};

fn parameters() -> Arc<Schema> {
    Schema::builder("Parameters")
        .doc("Example dataset")
        .item("fitem", FloatItem::new("Float").min(1).max(250))
        .item("iitem", IntItem::new("Integer").max(20).nonzero(true))
        .item("sitem", StringItem::new("String").notempty(true))
        .item("aitem", FloatArrayItem::new("Array").check_with(|a| a.ndim() == 2))
        .item("fileopenitem", FileOpenItem::new("File").formats(&["rs"]))
        .item("filesopenitem", FilesOpenItem::new("Files").formats(&["rs"]))
        .item("filesaveitem", FileSaveItem::new("Save file").formats(&["rs"]))
        .item("directoryitem", DirectoryItem::new("Directory"))
        .build()
}

fn this_file() -> String {
    format!("{}/tests/validation.rs", env!("CARGO_MANIFEST_DIR"))
}

fn valid_data() -> Vec<(&'static str, Value)> {
    let dir = env!("CARGO_MANIFEST_DIR").to_string();
    vec![
        ("fitem", Value::Float(100.0)),
        ("iitem", Value::Int(10)),
        ("sitem", Value::from("test")),
        ("aitem", Value::Array(Array::from_shape_f64(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap())),
        ("fileopenitem", Value::from(this_file())),
        ("filesopenitem", Value::Seq(vec![Value::from(this_file()), Value::from(format!("{}/Cargo.toml", dir))])),
        ("filesaveitem", Value::from("test.rs")),
        ("directoryitem", Value::from(dir)),
    ]
}

fn invalid_data() -> Vec<(&'static str, Value)> {
    vec![
        ("fitem", Value::Float(300.0)),
        ("fitem", Value::from("10")),
        ("iitem", Value::Int(30)),
        ("iitem", Value::Int(0)),
        ("iitem", Value::from("test")),
        ("iitem", Value::Float(23.2323)),
        ("aitem", Value::Array(Array::from_f64(vec![1.0, 2.0]))),
        ("sitem", Value::from("")),
        ("sitem", Value::Int(123)),
        ("fileopenitem", Value::from("nonexistent.rs")),
        ("filesopenitem", Value::Seq(vec![Value::from("nonexistent1.rs"), Value::from("nonexistent2.rs")])),
        ("filesaveitem", Value::from("")),
        ("directoryitem", Value::from("nonexistent_dir")),
    ]
}

#[test]
fn default_mode_is_disabled() {
    assert_eq!(validation_mode(), ValidationMode::Disabled);
}

#[test]
fn valid_data_is_stored_in_every_mode() -> Result<(), Error> {
    for mode in [ValidationMode::Disabled, ValidationMode::Enabled, ValidationMode::Strict] {
        let _guard = temporary_validation_mode(mode);
        let mut params = DataSet::new(parameters());
        for (name, value) in valid_data() {
            params.set(name, value.clone())?;
            assert_eq!(params.get(name), Some(&value));
        }
        assert!(params.check().is_empty(), "{:?}", params.check());
    }
    Ok(())
}

#[test]
fn invalid_data_without_validation() -> Result<(), Error> {
    let _guard = temporary_validation_mode(ValidationMode::Disabled);
    let mut params = DataSet::new(parameters());
    for (name, value) in invalid_data() {
        params.set(name, value.clone())?;
        assert_eq!(params.get(name), Some(&value));
    }
    Ok(())
}

#[test]
fn invalid_data_with_enabled_validation_is_stored() -> Result<(), Error> {
    let _ = env_logger::builder().is_test(true).try_init();
    let _guard = temporary_validation_mode(ValidationMode::Enabled);
    let mut params = DataSet::new(parameters());
    for (name, value) in invalid_data() {
        params.set(name, value.clone())?;
        assert_eq!(params.get(name), Some(&value));
        assert!(params.check().contains(&name.to_string()));
    }
    Ok(())
}

#[test]
fn invalid_data_with_strict_validation_is_rejected() {
    let _guard = temporary_validation_mode(ValidationMode::Strict);
    let mut params = DataSet::new(parameters());
    for (name, value) in invalid_data() {
        let err = params.set(name, value.clone()).unwrap_err();
        assert!(matches!(err, Error::Validation { ref item, .. } if item == name), "{}", err);
        assert_ne!(params.get(name), Some(&value));
    }
}

#[test]
fn bounded_float_scenario() -> Result<(), Error> {
    let schema = Schema::builder("Bounded")
        .item("x", FloatItem::new("X").min(1).max(250).default(10.0))
        .build();
    let item = schema.item("x").ok_or_else(|| Error::UnknownItem { name: "x".into() })?.clone();
    let mut ds = DataSet::new(schema);

    ds.set("x", 150.0)?;
    assert!(item.check_value(&Value::Float(150.0)));
    assert!(ds.check().is_empty());

    ds.set("x", 400.0)?;
    assert!(!item.check_value(&Value::Float(400.0)));
    assert_eq!(ds.check(), ["x"]);

    assert!(!item.check_value(&Value::from("10")));
    assert!(!item.check_value(&Value::Int(100)));
    let _guard = temporary_validation_mode(ValidationMode::Strict);
    assert!(ds.set("x", "10").is_err());
    // ints widen to floats on assignment
    ds.set("x", 100)?;
    assert_eq!(ds.get("x"), Some(&Value::Float(100.0)));
    Ok(())
}

#[test]
fn none_is_accepted_when_allowed() -> Result<(), Error> {
    let schema = Schema::builder("Nullable")
        .item("n", IntItem::new("N").default(1).allow_none(true))
        .item("m", IntItem::new("M").default(1))
        .build();
    let _guard = temporary_validation_mode(ValidationMode::Strict);
    let mut ds = DataSet::new(schema);
    ds.set("n", Value::None)?;
    assert!(ds.set("m", Value::None).is_err());
    Ok(())
}
