//! Ready-made library cycles

use strata_core::ast::{BinaryOp, Stmt};
use strata_core::LibraryCycle;

use crate::{block, cycle, param, unit, SyntaxBuilder};

/// `var x = 1 + 2;`
pub fn sum_initializer() -> LibraryCycle {
    let s = SyntaxBuilder::new();
    cycle(vec![unit(
        "lib/sum.dart",
        vec![s.top_var("x", s.add(s.int(1), s.int(2)))],
    )])
}

/// `var a = b; var b = 3;`
pub fn forward_reference() -> LibraryCycle {
    let s = SyntaxBuilder::new();
    cycle(vec![unit(
        "lib/forward.dart",
        vec![s.top_var("a", s.ident("b")), s.top_var("b", s.int(3))],
    )])
}

/// `var a = b + 1; var b = a + 1; var c = 1;`
pub fn mutual_cycle() -> LibraryCycle {
    let s = SyntaxBuilder::new();
    cycle(vec![unit(
        "lib/mutual.dart",
        vec![
            s.top_var("a", s.add(s.ident("b"), s.int(1))),
            s.top_var("b", s.add(s.ident("a"), s.int(1))),
            s.top_var("c", s.int(1)),
        ],
    )])
}

/// `int compute() => 1; var y = compute(); var z = 2;`
pub fn call_initializer() -> LibraryCycle {
    let s = SyntaxBuilder::new();
    let body = block(vec![Stmt::Return(Some(s.int(1)))]);
    cycle(vec![unit(
        "lib/call.dart",
        vec![
            s.function("compute", Some("int"), vec![], Some(body)),
            s.top_var("y", s.call("compute", vec![])),
            s.top_var("z", s.int(2)),
        ],
    )])
}

/// `class Base { num get x; }  class Derived extends Base { var x = 5; }`
pub fn override_num_getter() -> LibraryCycle {
    let s = SyntaxBuilder::new();
    cycle(vec![unit(
        "lib/override.dart",
        vec![
            s.class("Base").getter("x", Some("num"), None).build(),
            s.class("Derived")
                .extends("Base")
                .field("x", Some(s.int(5)))
                .build(),
        ],
    )])
}

/// `class Base { dynamic get x; }  class Derived extends Base { final x = 5; }`
pub fn override_dynamic_getter_final() -> LibraryCycle {
    let s = SyntaxBuilder::new();
    cycle(vec![unit(
        "lib/override_dynamic.dart",
        vec![
            s.class("Base").getter("x", Some("dynamic"), None).build(),
            s.class("Derived")
                .extends("Base")
                .final_field("x", Some(s.int(5)))
                .build(),
        ],
    )])
}

/// `class Base { dynamic get x; }  class Derived extends Base { var x = 5; }`
pub fn override_dynamic_getter_mutable() -> LibraryCycle {
    let s = SyntaxBuilder::new();
    cycle(vec![unit(
        "lib/override_dynamic.dart",
        vec![
            s.class("Base").getter("x", Some("dynamic"), None).build(),
            s.class("Derived")
                .extends("Base")
                .field("x", Some(s.int(5)))
                .build(),
        ],
    )])
}

/// Diamond declared subtype-first: `D extends B implements C`, `B, C extends A`.
///
/// Each class overrides `value` without a type; only `A` declares it.
pub fn diamond() -> LibraryCycle {
    let s = SyntaxBuilder::new();
    cycle(vec![
        unit(
            "lib/d.dart",
            vec![s
                .class("D")
                .extends("B")
                .implements("C")
                .getter("value", None, None)
                .build()],
        ),
        unit(
            "lib/bc.dart",
            vec![
                s.class("B").extends("A").getter("value", None, None).build(),
                s.class("C").extends("A").getter("value", None, None).build(),
            ],
        ),
        unit(
            "lib/a.dart",
            vec![s.class("A").getter("value", Some("num"), None).build()],
        ),
    ])
}

/// `class Base { int compute(String s, num n); }`
/// `class Derived extends Base { compute(s, n) { ... } }`
pub fn method_overrides() -> LibraryCycle {
    let s = SyntaxBuilder::new();
    let body = block(vec![Stmt::Return(Some(s.binary(
        BinaryOp::Mul,
        s.ident("n"),
        s.int(2),
    )))]);
    cycle(vec![unit(
        "lib/methods.dart",
        vec![
            s.class("Base")
                .method(
                    "compute",
                    Some("int"),
                    vec![param("s", Some("String")), param("n", Some("num"))],
                    None,
                )
                .build(),
            s.class("Derived")
                .extends("Base")
                .method(
                    "compute",
                    None,
                    vec![param("s", None), param("n", None)],
                    Some(body),
                )
                .build(),
        ],
    )])
}

/// Two units referencing each other's globals
pub fn cross_unit() -> LibraryCycle {
    let s = SyntaxBuilder::new();
    cycle(vec![
        unit(
            "lib/first.dart",
            vec![s.top_var("greeting", s.add(s.string("hello "), s.ident("name")))],
        ),
        unit(
            "lib/second.dart",
            vec![
                s.top_var("name", s.string("world")),
                s.top_var("length", s.call("measure", vec![s.ident("greeting")])),
            ],
        ),
    ])
}
