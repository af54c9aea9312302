//! Resource table integration tests
//!
//! Tables are assembled by the fixture builder, parsed, edited and parsed
//! again.

mod fixtures;

use fixtures::*;
use reschiper::res::value::TYPE_REFERENCE;
use reschiper::res::{ParseError, ResId, ResourceTable, Value};

fn multi_config_table() -> TableBuilder {
    TableBuilder::new("com.example")
        .add_type(
            "drawable",
            vec![EntryDef {
                name: "btn_bg".to_string(),
                public: false,
                values: vec![
                    (0, str_value("res/drawable/btn_bg.9.png")),
                    (320, str_value("res/drawable-xhdpi-v4/btn_bg.9.png")),
                ],
            }],
        )
        .add_type(
            "string",
            vec![
                entry("label", str_value("res/drawable/btn_bg.9.png")),
                entry("alias", ValueDef::Ref(0x7f02_0000)),
            ],
        )
        .add_type(
            "style",
            vec![entry(
                "Base.Theme",
                ValueDef::Bag {
                    parent: 0x0103_0005,
                    items: vec![(ATTR_WINDOW_BACKGROUND, TYPE_REFERENCE, 0x7f01_0000)],
                },
            )],
        )
        .unused_key("orphan_key")
}

#[test]
fn test_untouched_table_round_trips() {
    let bytes = multi_config_table().build();
    let table = ResourceTable::parse(&bytes).unwrap();
    assert_eq!(table.serialize().unwrap(), bytes);
}

#[test]
fn test_entries_and_configurations() {
    let table = ResourceTable::parse(&multi_config_table().build()).unwrap();

    let button = table.entry(ResId(0x7f01_0000)).unwrap();
    assert_eq!(button.name(), "btn_bg");
    assert_eq!(button.config_values().len(), 2);
    assert_eq!(button.config_values()[1].config.density(), 320);
    assert_eq!(
        button.file_paths(),
        vec!["res/drawable/btn_bg.9.png", "res/drawable-xhdpi-v4/btn_bg.9.png"]
    );

    // A res/ path in a string type stays a plain string
    let label = table.entry(ResId(0x7f02_0000)).unwrap();
    assert!(matches!(label.config_values()[0].value, Value::String { .. }));

    let alias = table.entry(ResId(0x7f02_0001)).unwrap();
    assert_eq!(
        alias.config_values()[0].value.as_reference(),
        Some(ResId(0x7f02_0000))
    );

    let theme = table.entry(ResId(0x7f03_0000)).unwrap();
    match &theme.config_values()[0].value {
        Value::Bag(bag) => {
            assert_eq!(bag.parent, Some(ResId(0x0103_0005)));
            assert_eq!(bag.items.len(), 1);
            assert_eq!(bag.items[0].value.as_reference(), Some(ResId(0x7f01_0000)));
        }
        other => panic!("expected bag, got {:?}", other),
    }
}

#[test]
fn test_rename_keeps_ids() {
    let mut table = ResourceTable::parse(&multi_config_table().build()).unwrap();
    assert!(table.rename_entry(ResId(0x7f01_0000), "a"));
    assert!(table.rename_entry(ResId(0x7f03_0000), "a"));

    let reparsed = ResourceTable::parse(&table.serialize().unwrap()).unwrap();
    assert_eq!(reparsed.entry(ResId(0x7f01_0000)).unwrap().name(), "a");
    assert_eq!(reparsed.entry(ResId(0x7f03_0000)).unwrap().name(), "a");
    assert_eq!(reparsed.entry(ResId(0x7f02_0000)).unwrap().name(), "label");
    assert_eq!(reparsed.entry(ResId(0x7f02_0001)).unwrap().name(), "alias");

    let package = &reparsed.packages()[0];
    let keys: Vec<&str> = package
        .types()
        .iter()
        .flat_map(|t| t.entries())
        .map(|e| e.name())
        .collect();
    assert_eq!(keys, vec!["a", "label", "alias", "a"]);
}

#[test]
fn test_relocating_shared_string_appends() {
    let mut table = ResourceTable::parse(&multi_config_table().build()).unwrap();
    let pool_len = table.value_pool().len();

    // The default btn_bg path string is also the value of string/label
    let label_index = table.entry(ResId(0x7f02_0000)).unwrap().config_values()[0]
        .value
        .string_index()
        .unwrap();

    assert_eq!(table.relocate_file("res/drawable/btn_bg.9.png", "res/drawable/a.9.png"), 1);

    let reparsed = ResourceTable::parse(&table.serialize().unwrap()).unwrap();
    assert_eq!(reparsed.value_pool().len(), pool_len + 1);
    assert_eq!(
        reparsed.entry(ResId(0x7f01_0000)).unwrap().source_path(),
        Some("res/drawable/a.9.png")
    );
    match &reparsed.entry(ResId(0x7f02_0000)).unwrap().config_values()[0].value {
        Value::String { index, text } => {
            assert_eq!(*index, label_index);
            assert_eq!(text, "res/drawable/btn_bg.9.png");
        }
        other => panic!("expected string, got {:?}", other),
    }
}

#[test]
fn test_unresolved_references_are_reported() {
    let bytes = TableBuilder::new("com.example")
        .add_type(
            "string",
            vec![
                entry("alias", ValueDef::Ref(0x7f01_0005)),
                entry("system", ValueDef::Ref(0x0104_0000)),
            ],
        )
        .build();
    let table = ResourceTable::parse(&bytes).unwrap();
    assert_eq!(
        table.unresolved_references(),
        vec![(ResId(0x7f01_0000), ResId(0x7f01_0005))]
    );
}

#[test]
fn test_non_default_package_id() {
    let bytes = TableBuilder::new("com.example.feature")
        .package_id(0x80)
        .add_type("layout", vec![entry("screen", str_value("res/layout/screen.xml"))])
        .build();
    let table = ResourceTable::parse(&bytes).unwrap();
    assert!(table.owns_package(0x80));
    assert_eq!(table.packages()[0].name, "com.example.feature");
    assert!(table.contains(ResId(0x8001_0000)));
    assert_eq!(table.file_paths(), vec!["res/layout/screen.xml".to_string()]);
}

// ============================================================================
// Type chunk layouts and pool encodings
// ============================================================================

/// Three drawables spread over two densities so that every configuration
/// has a missing entry
fn gapped_table(layout: TypeLayout) -> TableBuilder {
    TableBuilder::new("com.example")
        .layout(layout)
        .add_type(
            "drawable",
            vec![
                EntryDef {
                    name: "first".to_string(),
                    public: false,
                    values: vec![
                        (0, str_value("res/drawable/first.png")),
                        (320, str_value("res/drawable-xhdpi/first.png")),
                    ],
                },
                EntryDef {
                    name: "second".to_string(),
                    public: false,
                    values: vec![(320, str_value("res/drawable-xhdpi/second.png"))],
                },
                entry("third", str_value("res/drawable/third.png")),
            ],
        )
        .add_type(
            "string",
            vec![entry("hello", str_value("Hello")), entry("count", ValueDef::Int(7))],
        )
}

fn assert_layout_renames(layout: TypeLayout) {
    let bytes = gapped_table(layout).build();
    let mut table = ResourceTable::parse(&bytes).unwrap();
    assert_eq!(table.serialize().unwrap(), bytes);

    let second = table.entry(ResId(0x7f01_0001)).unwrap();
    assert_eq!(second.config_values().len(), 1);
    assert_eq!(second.config_values()[0].config.density(), 320);
    assert_eq!(table.entry(ResId(0x7f01_0002)).unwrap().config_values().len(), 1);

    assert!(table.rename_entry(ResId(0x7f01_0000), "a"));
    assert!(table.rename_entry(ResId(0x7f02_0000), "a"));
    assert_eq!(
        table.relocate_file("res/drawable-xhdpi/first.png", "res/drawable-xhdpi/a.png"),
        1
    );

    let reparsed = ResourceTable::parse(&table.serialize().unwrap()).unwrap();
    let first = reparsed.entry(ResId(0x7f01_0000)).unwrap();
    assert_eq!(first.name(), "a");
    assert_eq!(
        first.file_paths(),
        vec!["res/drawable/first.png", "res/drawable-xhdpi/a.png"]
    );
    assert_eq!(reparsed.entry(ResId(0x7f01_0001)).unwrap().name(), "second");
    assert_eq!(reparsed.entry(ResId(0x7f01_0002)).unwrap().name(), "third");

    let hello = reparsed.entry(ResId(0x7f02_0000)).unwrap();
    assert_eq!(hello.name(), "a");
    assert!(matches!(&hello.config_values()[0].value, Value::String { text, .. } if text == "Hello"));
    let count = reparsed.entry(ResId(0x7f02_0001)).unwrap();
    assert_eq!(count.name(), "count");
    assert!(matches!(&count.config_values()[0].value, Value::Scalar(raw) if raw.data == 7));
}

#[test]
fn test_sparse_layout() {
    assert_layout_renames(TypeLayout::Sparse);
}

#[test]
fn test_offset16_layout() {
    assert_layout_renames(TypeLayout::Offset16);
}

#[test]
fn test_compact_entries() {
    let bytes = gapped_table(TypeLayout::Sparse).compact_entries().build();
    let mut table = ResourceTable::parse(&bytes).unwrap();
    assert_eq!(table.serialize().unwrap(), bytes);
    assert_eq!(
        table.entry(ResId(0x7f01_0000)).unwrap().source_path(),
        Some("res/drawable/first.png")
    );

    assert!(table.rename_entry(ResId(0x7f01_0001), "a"));
    assert!(table.rename_entry(ResId(0x7f02_0001), "b"));
    let reparsed = ResourceTable::parse(&table.serialize().unwrap()).unwrap();

    let names: Vec<&str> = reparsed.entries().map(|(_, _, e)| e.name()).collect();
    assert_eq!(names, vec!["first", "a", "third", "hello", "b"]);
    assert!(matches!(
        &reparsed.entry(ResId(0x7f02_0001)).unwrap().config_values()[0].value,
        Value::Scalar(raw) if raw.data == 7
    ));
}

#[test]
fn test_compact_key_overflow() {
    // The appended key lands at index 65536, past what a compact entry holds
    let bytes = TableBuilder::new("com.example")
        .compact_entries()
        .add_type(
            "string",
            vec![entry("first", str_value("One")), entry("second", str_value("Two"))],
        )
        .padding_keys(65_535)
        .build();
    let mut table = ResourceTable::parse(&bytes).unwrap();
    assert!(table.rename_entry(ResId(0x7f01_0000), "a"));

    assert_eq!(
        table.serialize().unwrap_err(),
        ParseError::KeyIndexOverflow { index: 65_536 }
    );
}

#[test]
fn test_utf16_pools() {
    let bytes = gapped_table(TypeLayout::Dense).utf16_pools().build();
    let mut table = ResourceTable::parse(&bytes).unwrap();
    assert!(!table.value_pool().is_utf8());
    assert_eq!(table.serialize().unwrap(), bytes);

    assert!(table.rename_entry(ResId(0x7f01_0002), "a"));
    assert_eq!(table.relocate_file("res/drawable/third.png", "res/drawable/a.png"), 1);

    let reparsed = ResourceTable::parse(&table.serialize().unwrap()).unwrap();
    assert!(!reparsed.value_pool().is_utf8());
    let third = reparsed.entry(ResId(0x7f01_0002)).unwrap();
    assert_eq!(third.name(), "a");
    assert_eq!(third.source_path(), Some("res/drawable/a.png"));
    assert_eq!(reparsed.entry(ResId(0x7f01_0000)).unwrap().name(), "first");
}

#[test]
fn test_relocate_keeps_styled_strings() {
    let bytes = TableBuilder::new("com.example")
        .styled_value("Hello world", &[("b", 0, 4)])
        .add_type(
            "drawable",
            vec![entry("icon", str_value("res/drawable/icon.png"))],
        )
        .add_type("string", vec![entry("greeting", str_value("Hello world"))])
        .build();
    let mut table = ResourceTable::parse(&bytes).unwrap();
    assert_eq!(table.value_pool().style_count(), 1);
    assert_eq!(table.serialize().unwrap(), bytes);

    let pool_len = table.value_pool().len();
    assert_eq!(table.relocate_file("res/drawable/icon.png", "res/drawable/a.png"), 1);

    let reparsed = ResourceTable::parse(&table.serialize().unwrap()).unwrap();
    let pool = reparsed.value_pool();
    assert_eq!(pool.len(), pool_len);
    assert_eq!(pool.style_count(), 1);
    assert_eq!(pool.span_names(), &[1]);
    assert_eq!(pool.get(1), Some("b"));

    match &reparsed.entry(ResId(0x7f02_0000)).unwrap().config_values()[0].value {
        Value::StyledString { index, text } => {
            assert_eq!(*index, 0);
            assert_eq!(text, "Hello world");
        }
        other => panic!("expected styled string, got {:?}", other),
    }
    assert_eq!(
        reparsed.entry(ResId(0x7f01_0000)).unwrap().source_path(),
        Some("res/drawable/a.png")
    );
}
