//! End-to-end obfuscation tests
//!
//! Every test builds a bundle in memory, runs the full pipeline and inspects
//! the emitted archive.

mod fixtures;

use fixtures::*;
use reschiper::config::NamingConfig;
use reschiper::{
    AnchorReason, Archive, Config, KeepReason, ObfuscateError, Obfuscator, PreviousMapping, ResId,
    ResourceTable, XmlDocument,
};

const TABLE: &str = "base/resources.arsc";

fn config_with_keep(keep: &[&str]) -> Config {
    Config {
        keep: keep.iter().map(|s| s.to_string()).collect(),
        ..Config::default()
    }
}

fn output_table(archive: &Archive) -> ResourceTable {
    ResourceTable::parse(archive.payload(TABLE).expect("table present")).unwrap()
}

fn entry_name(table: &ResourceTable, id: u32) -> String {
    table.entry(ResId(id)).unwrap().name().to_string()
}

// ============================================================================
// Scenario tests
// ============================================================================

#[test]
fn test_launcher_icon_renamed_and_moved() {
    let output = Obfuscator::new(config_with_keep(&["app_name"]))
        .run(&sample_bundle())
        .unwrap();

    let rename = output.map.get(ResId(0x7f01_0001)).unwrap();
    assert_eq!(rename.original_name, "ic_launcher");
    assert_eq!(rename.new_name, "a");
    assert_eq!(rename.paths.len(), 1);
    assert_eq!(rename.paths[0].from, "res/mipmap/ic_launcher.png");
    assert_eq!(rename.paths[0].to, "res/drawable/a.png");

    let archive = Archive::load(&output.bundle).unwrap();
    assert!(!archive.contains("base/res/mipmap/ic_launcher.png"));
    assert_eq!(archive.payload("base/res/drawable/a.png"), Some(ICON_PNG));

    let table = output_table(&archive);
    assert_eq!(entry_name(&table, 0x7f01_0001), "a");
    assert_eq!(
        table.entry(ResId(0x7f01_0001)).unwrap().source_path(),
        Some("res/drawable/a.png")
    );
}

#[test]
fn test_keep_rule_and_public_entries_keep_their_names() {
    let output = Obfuscator::new(config_with_keep(&["app_name"]))
        .run(&sample_bundle())
        .unwrap();

    assert_eq!(
        output.map.kept.get(&ResId(0x7f02_0001)),
        Some(&KeepReason::Rule("app_name".to_string()))
    );
    assert_eq!(
        output.map.kept.get(&ResId(0x7f01_0000)),
        Some(&KeepReason::Anchor(AnchorReason::Public))
    );

    let archive = Archive::load(&output.bundle).unwrap();
    let table = output_table(&archive);
    assert_eq!(entry_name(&table, 0x7f02_0001), "app_name");
    assert_eq!(entry_name(&table, 0x7f01_0000), "splash");
    assert!(archive.contains("base/res/drawable/splash.png"));
}

#[test]
fn test_manifest_reference_anchors_entry() {
    let output = Obfuscator::new(Config::default())
        .run(&sample_bundle())
        .unwrap();

    assert_eq!(
        output.map.kept.get(&ResId(0x7f02_0001)),
        Some(&KeepReason::Anchor(AnchorReason::Manifest))
    );
    assert!(output.map.get(ResId(0x7f02_0001)).is_none());
}

#[test]
fn test_layout_id_reference_untouched_and_symbolic_name_rewritten() {
    let output = Obfuscator::new(config_with_keep(&["app_name"]))
        .run(&sample_bundle())
        .unwrap();

    // The layout itself was renamed and moved
    let layout = output.map.get(ResId(0x7f03_0000)).unwrap();
    assert_eq!(layout.paths[0].to, "res/layout/a.xml");
    assert_eq!(output.map.get(ResId(0x7f02_0002)).unwrap().new_name, "b");

    let archive = Archive::load(&output.bundle).unwrap();
    assert!(!archive.contains("base/res/layout/activity_main.xml"));
    let document = XmlDocument::parse(archive.payload("base/res/layout/a.xml").unwrap()).unwrap();

    let background = &document.attributes()[0];
    assert_eq!(background.name, "background");
    assert_eq!(background.typed_value.data, 0x7f01_0001);

    let text = &document.attributes()[1];
    assert_eq!(text.name, "text");
    assert_eq!(text.string_value(), Some("b"));
}

#[test]
fn test_report_lists_symbolic_risks() {
    let output = Obfuscator::new(config_with_keep(&["app_name"]))
        .run(&sample_bundle())
        .unwrap();

    assert_eq!(output.report.risks.len(), 1);
    assert_eq!(output.report.risks[0].id, ResId(0x7f02_0002));
    assert_eq!(output.report.risks[0].name, "welcome_msg");

    let text = output.report.to_text();
    assert!(text.contains("0x7f010001 : com.example.R.drawable.ic_launcher -> com.example.R.drawable.a"));
    assert!(text.contains("base/res/mipmap/ic_launcher.png -> base/res/drawable/a.png"));
    assert!(text.contains("0x7f020001 : string/app_name (keep rule app_name)"));
}

// ============================================================================
// Invariants
// ============================================================================

#[test]
fn test_ids_are_stable() {
    let input = Archive::load(&sample_bundle()).unwrap();
    let before = output_table(&input);

    let output = Obfuscator::new(Config::default()).run(&sample_bundle()).unwrap();
    let after = output_table(&Archive::load(&output.bundle).unwrap());

    let ids = |table: &ResourceTable| -> Vec<ResId> { table.entries().map(|(_, _, e)| e.id()).collect() };
    assert_eq!(ids(&before), ids(&after));
}

#[test]
fn test_runs_are_deterministic() {
    let bundle = sample_bundle();
    let first = Obfuscator::new(config_with_keep(&["app_name"])).run(&bundle).unwrap();
    let second = Obfuscator::new(config_with_keep(&["app_name"])).run(&bundle).unwrap();

    assert_eq!(first.map, second.map);
    assert_eq!(first.bundle, second.bundle);
}

#[test]
fn test_sequential_matches_parallel() {
    let bundle = sample_bundle();
    let parallel = Obfuscator::new(Config::default()).run(&bundle).unwrap();
    let sequential = Obfuscator::new(Config {
        parallel: false,
        ..Config::default()
    })
    .run(&bundle)
    .unwrap();

    assert_eq!(parallel.bundle, sequential.bundle);
}

#[test]
fn test_no_name_collisions_within_a_type() {
    let output = Obfuscator::new(Config::default()).run(&sample_bundle()).unwrap();
    let table = output_table(&Archive::load(&output.bundle).unwrap());

    for package in table.packages() {
        for spec in package.types() {
            let mut names: Vec<&str> = spec.entries().iter().map(|e| e.name()).collect();
            let total = names.len();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), total, "duplicate names in {}", spec.name);
        }
    }
}

#[test]
fn test_type_wide_keep_rule() {
    let output = Obfuscator::new(config_with_keep(&["drawable/*"]))
        .run(&sample_bundle())
        .unwrap();

    assert!(output.map.get(ResId(0x7f01_0001)).is_none());
    let archive = Archive::load(&output.bundle).unwrap();
    assert!(archive.contains("base/res/mipmap/ic_launcher.png"));
}

#[test]
fn test_disabled_obfuscation_keeps_table_bytes() {
    let config = Config {
        enable_obfuscation: false,
        ..Config::default()
    };
    let output = Obfuscator::new(config).run(&sample_bundle()).unwrap();
    assert!(output.map.is_empty());

    let archive = Archive::load(&output.bundle).unwrap();
    assert_eq!(archive.payload(TABLE), Some(sample_table().build().as_slice()));
    assert_eq!(archive.len(), sample_entries().len());
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_occupied_destination_is_a_conflict() {
    let mut entries = sample_entries();
    entries.push(("base/res/drawable/a.png".to_string(), b"static".to_vec()));

    let err = Obfuscator::new(Config::default())
        .run(&zip_entries(&entries))
        .unwrap_err();
    match err {
        ObfuscateError::RewriteConflict {
            source_path,
            destination,
            ..
        } => {
            assert_eq!(source_path, "base/res/mipmap/ic_launcher.png");
            assert_eq!(destination, "base/res/drawable/a.png");
        }
        other => panic!("expected RewriteConflict, got {:?}", other),
    }
}

#[test]
fn test_name_exhaustion() {
    let config = Config {
        naming: NamingConfig {
            max_name_length: 1,
            reserved_names: ('a'..='z').map(|c| c.to_string()).collect(),
        },
        ..Config::default()
    };
    let err = Obfuscator::new(config).run(&sample_bundle()).unwrap_err();
    assert!(matches!(
        err,
        ObfuscateError::NameExhaustion { max_length: 1, .. }
    ));
}

#[test]
fn test_unresolved_reference() {
    let mut entries = sample_entries();
    let broken = build_xml(&[(
        "ImageView",
        vec![attr("background", Some(ATTR_BACKGROUND), AttrValue::Ref(0x7f01_0099))],
    )]);
    entries.push(("base/res/layout/broken.xml".to_string(), broken));
    let bundle = zip_entries(&entries);

    let err = Obfuscator::new(Config::default()).run(&bundle).unwrap_err();
    assert!(matches!(
        err,
        ObfuscateError::UnresolvedReference { target, .. } if target == ResId(0x7f01_0099)
    ));

    let lenient = Config {
        fail_on_unresolved: false,
        ..Config::default()
    };
    assert!(Obfuscator::new(lenient).run(&bundle).is_ok());
}

#[test]
fn test_corrupt_archive() {
    let err = Obfuscator::new(Config::default())
        .run(b"PK\x03\x04 definitely not a zip")
        .unwrap_err();
    assert!(matches!(err, ObfuscateError::CorruptArchive { .. }));
}

#[test]
fn test_malformed_table() {
    let mut entries = sample_entries();
    for (path, payload) in entries.iter_mut() {
        if path.as_str() == TABLE {
            payload.truncate(40);
        }
    }
    let err = Obfuscator::new(Config::default())
        .run(&zip_entries(&entries))
        .unwrap_err();
    assert!(matches!(err, ObfuscateError::MalformedTable { .. }));
}

#[test]
fn test_invalid_keep_rule_is_rejected() {
    let err = Obfuscator::new(config_with_keep(&["string/"]))
        .run(&sample_bundle())
        .unwrap_err();
    assert!(matches!(err, ObfuscateError::Config(_)));
}

// ============================================================================
// Previous mapping, duplicates and filtering
// ============================================================================

#[test]
fn test_previous_mapping_is_reused() {
    let previous = PreviousMapping::parse(
        "res id mapping:\n\
         \t0x7f010001 : com.example.R.drawable.ic_launcher -> com.example.R.drawable.q\n\
         \t0x7f020000 : com.example.R.string.renamed_since -> com.example.R.string.z\n",
    );
    let output = Obfuscator::new(Config::default())
        .with_previous_mapping(previous)
        .run(&sample_bundle())
        .unwrap();

    let icon = output.map.get(ResId(0x7f01_0001)).unwrap();
    assert_eq!(icon.new_name, "q");
    assert_eq!(icon.paths[0].to, "res/drawable/q.png");

    // Original name changed, so a fresh name is generated
    assert_eq!(output.map.get(ResId(0x7f02_0000)).unwrap().new_name, "a");
}

#[test]
fn test_previous_names_outside_the_sequence_are_regenerated() {
    let previous = PreviousMapping::parse(
        "res id mapping:\n\
         \t0x7f010001 : com.example.R.drawable.ic_launcher -> com.example.R.drawable.Bad_Name\n\
         \t0x7f020000 : com.example.R.string.title -> com.example.R.string.abcdefg\n\
         \t0x7f020002 : com.example.R.string.welcome_msg -> com.example.R.string.b7\n",
    );
    let output = Obfuscator::new(Config::default())
        .with_previous_mapping(previous)
        .run(&sample_bundle())
        .unwrap();

    assert_eq!(output.map.get(ResId(0x7f01_0001)).unwrap().new_name, "a");
    assert_eq!(output.map.get(ResId(0x7f02_0000)).unwrap().new_name, "a");
    assert_eq!(output.map.get(ResId(0x7f02_0002)).unwrap().new_name, "b7");
}

#[test]
fn test_duplicate_files_are_merged() {
    let table = TableBuilder::new("com.example")
        .add_type(
            "drawable",
            vec![
                entry("ic_launcher", str_value("res/mipmap/ic_launcher.png")),
                entry("ic_launcher_copy", str_value("res/drawable/ic_launcher_copy.png")),
            ],
        )
        .build();
    let bundle = build_zip(&[
        ("base/manifest/AndroidManifest.xml", build_xml(&[("manifest", vec![])])),
        ("base/resources.arsc", table),
        ("base/res/mipmap/ic_launcher.png", ICON_PNG.to_vec()),
        ("base/res/drawable/ic_launcher_copy.png", ICON_PNG.to_vec()),
    ]);

    let config = Config {
        merge_duplicates: true,
        ..Config::default()
    };
    let output = Obfuscator::new(config).run(&bundle).unwrap();

    assert_eq!(output.report.merged.len(), 1);
    assert_eq!(output.report.merged[0].kept, "base/res/mipmap/ic_launcher.png");
    assert_eq!(output.report.merged[0].removed, "base/res/drawable/ic_launcher_copy.png");

    let archive = Archive::load(&output.bundle).unwrap();
    assert!(!archive.contains("base/res/drawable/ic_launcher_copy.png"));
    assert!(archive.contains("base/res/drawable/a.png"));

    let table = output_table(&archive);
    assert_eq!(
        table.entry(ResId(0x7f01_0000)).unwrap().source_path(),
        Some("res/drawable/a.png")
    );
    assert_eq!(
        table.entry(ResId(0x7f01_0001)).unwrap().source_path(),
        Some("res/drawable/a.png")
    );
}

#[test]
fn test_file_filter_protects_referenced_files() {
    let config = Config {
        file_filter: vec!["base/res/*".to_string(), "base/root/*".to_string()],
        ..Config::default()
    };
    let output = Obfuscator::new(config).run(&sample_bundle()).unwrap();

    assert_eq!(output.report.filtered, vec!["base/root/orphan.bin".to_string()]);
    let archive = Archive::load(&output.bundle).unwrap();
    assert!(!archive.contains("base/root/orphan.bin"));
    assert!(archive.contains("base/res/drawable/splash.png"));
    assert!(archive.contains("base/manifest/AndroidManifest.xml"));
}

#[test]
fn test_kept_entry_file_stays_after_merge() {
    let table = TableBuilder::new("com.example")
        .add_type(
            "drawable",
            vec![
                entry("keep_me", str_value("res/drawable/keep_me.png")),
                entry("dup", str_value("res/drawable/dup.png")),
            ],
        )
        .build();
    let bundle = build_zip(&[
        ("base/manifest/AndroidManifest.xml", build_xml(&[("manifest", vec![])])),
        ("base/resources.arsc", table),
        ("base/res/drawable/keep_me.png", ICON_PNG.to_vec()),
        ("base/res/drawable/dup.png", ICON_PNG.to_vec()),
    ]);

    let config = Config {
        keep: vec!["keep_me".to_string()],
        merge_duplicates: true,
        ..Config::default()
    };
    let output = Obfuscator::new(config).run(&bundle).unwrap();

    let dup = output.map.get(ResId(0x7f01_0001)).unwrap();
    assert_eq!(dup.new_name, "a");
    assert!(dup.paths.is_empty());

    let archive = Archive::load(&output.bundle).unwrap();
    assert_eq!(archive.payload("base/res/drawable/keep_me.png"), Some(ICON_PNG));
    assert!(!archive.contains("base/res/drawable/a.png"));
    assert!(!archive.contains("base/res/drawable/dup.png"));

    let table = output_table(&archive);
    let kept = table.entry(ResId(0x7f01_0000)).unwrap();
    assert_eq!(kept.name(), "keep_me");
    assert_eq!(kept.source_path(), Some("res/drawable/keep_me.png"));
    assert_eq!(
        table.entry(ResId(0x7f01_0001)).unwrap().source_path(),
        Some("res/drawable/keep_me.png")
    );
}

#[test]
fn test_qualifiers_come_from_configuration_for_flat_paths() {
    let table = TableBuilder::new("com.example")
        .add_type(
            "drawable",
            vec![EntryDef {
                name: "icon".to_string(),
                public: false,
                values: vec![(160, str_value("res/a1.png")), (320, str_value("res/B2.png"))],
            }],
        )
        .build();
    let bundle = build_zip(&[
        ("base/manifest/AndroidManifest.xml", build_xml(&[("manifest", vec![])])),
        ("base/resources.arsc", table),
        ("base/res/a1.png", ICON_PNG.to_vec()),
        ("base/res/B2.png", SPLASH_PNG.to_vec()),
    ]);

    let output = Obfuscator::new(Config::default()).run(&bundle).unwrap();

    let archive = Archive::load(&output.bundle).unwrap();
    assert_eq!(archive.payload("base/res/drawable-mdpi/a.png"), Some(ICON_PNG));
    assert_eq!(archive.payload("base/res/drawable-xhdpi/a.png"), Some(SPLASH_PNG));

    let table = output_table(&archive);
    assert_eq!(
        table.entry(ResId(0x7f01_0000)).unwrap().file_paths(),
        vec!["res/drawable-mdpi/a.png", "res/drawable-xhdpi/a.png"]
    );
}
