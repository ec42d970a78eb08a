//! Property tests over randomly generated top-level programs

use proptest::prelude::*;
use strata_core::ast::Item;
use strata_core::{Expr, InferenceOptions, LibraryCycle, StaticHierarchy, Type};
use strata_infer::{infer_types, ResolutionDriver};
use strata_test_fixtures::{cycle, ty, unit, SyntaxBuilder};

#[derive(Debug, Clone)]
enum Init {
    Int(i64),
    Double,
    Str,
    Null,
    Ref(usize),
    AddRef(usize),
    Call,
}

fn init_strategy() -> impl Strategy<Value = Init> {
    prop_oneof![
        any::<i16>().prop_map(|v| Init::Int(v as i64)),
        Just(Init::Double),
        Just(Init::Str),
        Just(Init::Null),
        (0usize..8).prop_map(Init::Ref),
        (0usize..8).prop_map(Init::AddRef),
        Just(Init::Call),
    ]
}

fn program_strategy() -> impl Strategy<Value = Vec<(Init, Option<&'static str>)>> {
    prop::collection::vec(
        (
            init_strategy(),
            prop::option::weighted(0.3, prop_oneof![Just("int"), Just("num"), Just("String"), Just("dynamic")]),
        ),
        1..8,
    )
}

fn build(program: &[(Init, Option<&'static str>)]) -> LibraryCycle {
    let s = SyntaxBuilder::new();
    let count = program.len();
    let name = |i: usize| format!("g{}", i % count);
    let mut units: Vec<Vec<Item>> = vec![Vec::new(), Vec::new()];

    for (i, (init, annotation)) in program.iter().enumerate() {
        let expr: Expr = match init {
            Init::Int(v) => s.int(*v),
            Init::Double => s.double(0.5),
            Init::Str => s.string("s"),
            Init::Null => s.null(),
            Init::Ref(j) => s.ident(&name(*j)),
            Init::AddRef(j) => s.add(s.ident(&name(*j)), s.int(1)),
            Init::Call => s.call("external", vec![]),
        };
        let item = match annotation {
            Some(annotation) => s.typed_var(annotation, &name(i), Some(expr)),
            None => s.top_var(&name(i), expr),
        };
        units[i % 2].push(item);
    }

    let mut units = units.into_iter();
    cycle(vec![
        unit("lib/even.dart", units.next().unwrap_or_default()),
        unit("lib/odd.dart", units.next().unwrap_or_default()),
    ])
}

fn run(lib: &LibraryCycle) -> strata_infer::ResolvedCycle {
    let hierarchy = StaticHierarchy::new();
    ResolutionDriver::new(lib, &hierarchy, InferenceOptions::default())
        .unwrap()
        .run()
        .unwrap()
}

proptest! {
    #[test]
    fn prop_inference_is_deterministic(program in program_strategy()) {
        let lib = build(&program);
        let first = run(&lib);
        let second = run(&lib);
        prop_assert_eq!(first.fingerprint(), second.fingerprint());
        prop_assert_eq!(first.report, second.report);
    }

    #[test]
    fn prop_declared_types_are_sacrosanct(program in program_strategy()) {
        let lib = build(&program);
        let resolved = run(&lib);
        for (i, (_, annotation)) in program.iter().enumerate() {
            if let Some(annotation) = annotation {
                let decl = resolved.elements.find(&format!("g{}", i)).unwrap();
                prop_assert_eq!(&decl.current_type, &ty(annotation));
                prop_assert_eq!(decl.getter_type(), &ty(annotation));
            }
        }
    }

    #[test]
    fn prop_concrete_types_never_regress(program in program_strategy()) {
        let lib = build(&program);
        let hierarchy = StaticHierarchy::new();
        let options = InferenceOptions::default();
        let mut driver = ResolutionDriver::new(&lib, &hierarchy, options.clone()).unwrap();
        driver.resolve_signatures().unwrap();
        driver.infer().unwrap();

        let snapshots = driver.snapshots().clone();
        let after_inference: Vec<Type> = driver
            .elements()
            .declarations()
            .map(|d| d.current_type.clone())
            .collect();

        // a second inference run over the same store only fills in what is still unknown
        let mut store = driver.elements().clone();
        infer_types(&lib, &mut store, &snapshots, &hierarchy, &options).unwrap();
        for (before, decl) in after_inference.iter().zip(store.declarations()) {
            if !before.is_unknown() {
                prop_assert_eq!(before, &decl.current_type);
            }
        }

        driver.resolve_bodies().unwrap();
        let resolved = driver.finish().unwrap();
        for (before, decl) in after_inference.iter().zip(resolved.elements.declarations()) {
            prop_assert_eq!(before, &decl.current_type);
        }
    }
}
