//! Driver configuration, reporting and failure behaviour

use std::io::Write;

use pretty_assertions::assert_eq;
use strata_core::{ElementStore, CoreTypes, InferenceOptions, LibraryCycle, StaticHierarchy, Type};
use strata_infer::{
    infer_types, resolve_cycles, InferenceError, InferenceReport, ResolutionDriver, ResolveMode,
    Resolver, SnapshotStore, TypeTable,
};
use strata_test_fixtures::{cycle, scenarios, unit, SyntaxBuilder};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn mixed_cycle() -> LibraryCycle {
    let s = SyntaxBuilder::new();
    cycle(vec![unit(
        "lib/mixed.dart",
        vec![
            s.top_var("a", s.ident("b")),
            s.top_var("b", s.int(3)),
            s.class("Base").getter("x", Some("num"), None).build(),
            s.class("Derived")
                .extends("Base")
                .field("x", Some(s.int(5)))
                .build(),
        ],
    )])
}

#[test]
fn test_report_rendering() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let lib = mixed_cycle();
    let hierarchy = StaticHierarchy::new();
    let resolved = ResolutionDriver::new(&lib, &hierarchy, InferenceOptions::default())?.run()?;

    insta::assert_snapshot!(resolved.report.to_string(), @r###"
    components:
      [b]
      [a]
    classes: Base, Derived
    declarations:
      b: int (initializer)
      a: int (initializer)
      Derived.x: num (override of Base)
    "###);
    Ok(())
}

#[test]
fn test_disabled_top_level_inference() -> Result<(), Box<dyn std::error::Error>> {
    let lib = mixed_cycle();
    let hierarchy = StaticHierarchy::new();
    let options = InferenceOptions::default().with_top_level(false);
    let resolved = ResolutionDriver::new(&lib, &hierarchy, options)?.run()?;

    assert_eq!(resolved.elements.find("a").unwrap().current_type, Type::Unknown);
    assert_eq!(resolved.elements.find("b").unwrap().current_type, Type::Unknown);
    assert!(resolved.report.components.is_empty());
    assert_eq!(resolved.elements.find("Derived.x").unwrap().current_type, Type::Num);
    Ok(())
}

#[test]
fn test_disabled_instance_member_inference() -> Result<(), Box<dyn std::error::Error>> {
    let lib = mixed_cycle();
    let hierarchy = StaticHierarchy::new();
    let options = InferenceOptions::default().with_instance_members(false);
    let resolved = ResolutionDriver::new(&lib, &hierarchy, options)?.run()?;

    assert_eq!(resolved.elements.find("a").unwrap().current_type, Type::Int);
    assert_eq!(
        resolved.elements.find("Derived.x").unwrap().current_type,
        Type::Unknown
    );
    assert!(resolved.report.class_order.is_empty());
    Ok(())
}

#[test]
fn test_report_export_from_toml_config() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let report_path = dir.path().join("inference.json");
    let config_path = dir.path().join("strata.toml");
    let mut config = std::fs::File::create(&config_path)?;
    writeln!(
        config,
        "infer_instance_members = true\n\n[report]\nexport_path = {:?}\ninclude_expression_types = true",
        report_path.display().to_string()
    )?;

    let options = InferenceOptions::from_file(&config_path)?;
    assert!(options.should_export_report());

    let lib = mixed_cycle();
    let hierarchy = StaticHierarchy::new();
    let resolved = ResolutionDriver::new(&lib, &hierarchy, options)?.run()?;

    let content = std::fs::read_to_string(&report_path)?;
    let json: serde_json::Value = serde_json::from_str(&content)?;
    assert_eq!(json["records"][0]["name"], "b");
    assert_eq!(json["records"][0]["source"], "initializer");
    assert_eq!(json["class_order"], serde_json::json!(["Base", "Derived"]));
    assert!(json["expression_types"].as_object().is_some_and(|types| !types.is_empty()));
    assert_eq!(
        resolved.report.expression_types.as_ref().map(TypeTable::len),
        Some(resolved.types.len())
    );
    Ok(())
}

#[test]
fn test_report_round_trips_through_json() -> Result<(), Box<dyn std::error::Error>> {
    let lib = mixed_cycle();
    let hierarchy = StaticHierarchy::new();
    let resolved = ResolutionDriver::new(&lib, &hierarchy, InferenceOptions::default())?.run()?;

    let json = resolved.report.to_json()?;
    let back: InferenceReport = serde_json::from_str(&json)?;
    assert_eq!(back, resolved.report);
    Ok(())
}

#[test]
fn test_infer_types_between_caller_passes() -> Result<(), Box<dyn std::error::Error>> {
    let lib = scenarios::forward_reference();
    let mut store = ElementStore::build(&lib)?;
    let provider = CoreTypes::new();
    let hierarchy = StaticHierarchy::new();
    let mut snapshots = SnapshotStore::new();
    let mut table = TypeTable::new();
    Resolver::new(&store, &provider, &hierarchy, ResolveMode::signatures_only(), &mut table)
        .resolve_cycle(&lib, &mut snapshots);

    let report = infer_types(&lib, &mut store, &snapshots, &hierarchy, &InferenceOptions::default())?;

    assert_eq!(store.find("a").unwrap().current_type, Type::Int);
    assert!(store.find("a").unwrap().is_resolved());
    assert_eq!(report.inferred().count(), 2);
    Ok(())
}

#[test]
fn test_missing_snapshots_abort_inference() -> Result<(), Box<dyn std::error::Error>> {
    let lib = scenarios::forward_reference();
    let mut store = ElementStore::build(&lib)?;
    let hierarchy = StaticHierarchy::new();

    let err = infer_types(
        &lib,
        &mut store,
        &SnapshotStore::new(),
        &hierarchy,
        &InferenceOptions::default(),
    )
    .unwrap_err();
    match err {
        InferenceError::StructuralDefect { declaration, .. } => assert_eq!(declaration, "a"),
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(store.find("b").unwrap().current_type, Type::Unknown);
    Ok(())
}

#[test]
fn test_independent_cycles_do_not_share_state() -> Result<(), Box<dyn std::error::Error>> {
    let cycles = vec![scenarios::sum_initializer(), scenarios::override_num_getter()];
    let hierarchy = StaticHierarchy::new();
    let resolved = resolve_cycles(&cycles, &hierarchy, &InferenceOptions::default())?;

    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[0].elements.find("x").unwrap().current_type, Type::Int);
    assert!(resolved[0].elements.find("Derived.x").is_none());
    assert_eq!(
        resolved[1].elements.find("Derived.x").unwrap().current_type,
        Type::Num
    );
    assert_ne!(resolved[0].fingerprint(), resolved[1].fingerprint());
    Ok(())
}
