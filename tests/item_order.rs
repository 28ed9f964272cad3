use std::sync::Arc;

use guidata::{BoolItem, DataSet, FloatItem, IntItem, Schema, TextItem};

fn dataset_a() -> Arc<Schema> {
    Schema::builder("DatasetA")
        .item("a1", FloatItem::new("a1"))
        .item("a2", IntItem::new("a2"))
        .build()
}

fn dataset_b() -> Arc<Schema> {
    Schema::builder("DatasetB")
        .item("b1", TextItem::new("b1"))
        .item("b2", BoolItem::new("b2"))
        .build()
}

fn item_names(schema: Arc<Schema>) -> Vec<String> {
    let instance = DataSet::new(schema);
    instance.schema().get_items().map(|item| item.name().to_string()).collect()
}

#[test]
fn single_dataset() {
    assert_eq!(item_names(dataset_a()), ["a1", "a2"]);
}

#[test]
fn simple_inheritance() {
    let derived = Schema::builder("DerivedSimple")
        .base(&dataset_a())
        .item("d", IntItem::new("d"))
        .build();
    assert_eq!(item_names(derived), ["a1", "a2", "d"]);
}

#[test]
fn multiple_bases_keep_base_order() {
    let ab = Schema::builder("DerivedAB")
        .base(&dataset_a())
        .base(&dataset_b())
        .item("d", FloatItem::new("d"))
        .build();
    assert_eq!(item_names(ab), ["a1", "a2", "b1", "b2", "d"]);

    let ba = Schema::builder("DerivedBA")
        .base(&dataset_b())
        .base(&dataset_a())
        .item("d", FloatItem::new("d"))
        .build();
    assert_eq!(item_names(ba), ["b1", "b2", "a1", "a2", "d"]);
}

#[test]
fn overridden_items_keep_their_position() {
    let derived = Schema::builder("Override")
        .base(&dataset_a())
        .item("a1", IntItem::new("a1 as int").default(3))
        .item("c", IntItem::new("c"))
        .build();
    assert_eq!(item_names(derived.clone()), ["a1", "a2", "c"]);
    assert_eq!(derived.item("a1").map(|item| item.label()), Some("a1 as int".to_string()));
}

#[test]
fn private_items_are_not_listed() {
    let schema = Schema::builder("Private")
        .item("_hidden", IntItem::new("hidden"))
        .item("shown", IntItem::new("shown"))
        .build();
    assert_eq!(schema.items().len(), 2);
    assert_eq!(item_names(schema), ["shown"]);
}
