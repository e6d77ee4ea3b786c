//! Name resolution across modules and fixed-point termination.

use weave::ast::{
    Builder, Constness, Expression, Linkage, NodeKind, NodeRef, OperatorKind, OperatorTarget,
    ParameterKind,
};
use weave::{CompileError, DriverOptions};

fn global(b: &mut Builder<'_>, id: &'static str, init: NodeRef) -> NodeRef {
    let t = b.type_signed_integer(64);
    let q = b.qualified(t, Constness::Mutable);
    b.decl_global(id, q, Some(init), Linkage::Public)
}

/// `a` imports `b`, `b` imports `c` and `c` imports `a` again.
#[test]
fn mutual_imports_settle_within_three_rounds() {
    let mut uses = Vec::new();
    let (driver, output) = weave::compile(DriverOptions::default(), |b| {
        let by = b.expr_name("b::y");
        let x = global(b, "x", by);
        let import_b = b.decl_import("b");
        let a = b.decl_module("a", vec![import_b, x]);

        let cz = b.expr_name("c::z");
        let y = global(b, "y", cz);
        let import_c = b.decl_import("c");
        let bm = b.decl_module("b", vec![import_c, y]);

        let one = b.expr_int(1);
        let z = global(b, "z", one);
        let ax = b.expr_name("a::x");
        let w = global(b, "w", ax);
        let import_a = b.decl_import("a");
        let c = b.decl_module("c", vec![import_a, z, w]);

        uses = vec![(by, y), (cz, z), (ax, x)];
        vec![a, bm, c]
    })
    .unwrap();

    assert!(output.reached_fixed_point);
    assert!(output.rounds <= 3, "took {} rounds", output.rounds);
    let ctx = driver.context();
    for (name, decl) in uses {
        match ctx.kind(name) {
            NodeKind::Expression(Expression::Name {
                resolved: Some(link),
                ..
            }) => assert_eq!(link.node, decl),
            other => panic!("unresolved {other:?}"),
        }
    }
}

#[test]
fn unknown_name_fails_validation() {
    let Err(err) = weave::compile(DriverOptions::default(), |b| {
        let missing = b.expr_name("missing");
        let x = global(b, "x", missing);
        vec![b.decl_module("m", vec![x])]
    }) else {
        panic!("compilation succeeded");
    };
    assert!(matches!(err, CompileError::Validation(_)));
    let messages: Vec<_> = err.diagnostics().iter().map(|d| d.message.as_str()).collect();
    assert!(messages.contains(&"unknown ID 'missing'"), "{messages:?}");
}

/// `f(a: int<bits>) -> int<64>`, declared as a prototype.
fn overload(b: &mut Builder<'_>, bits: u16) -> NodeRef {
    let pt = b.type_signed_integer(bits);
    let pq = b.qualified(pt, Constness::Const);
    let a = b.decl_parameter("a", pq, ParameterKind::In, None);
    let rt = b.type_signed_integer(64);
    let rq = b.qualified(rt, Constness::Const);
    b.decl_function("f", rq, vec![a], None, Linkage::Public)
}

#[test]
fn narrower_overload_wins_a_tie() {
    let mut picked = None;
    let (driver, _) = weave::compile(DriverOptions::default(), |b| {
        let st = b.type_signed_integer(8);
        let sq = b.qualified(st, Constness::Mutable);
        let small = b.decl_global("small", sq, None, Linkage::Private);
        let wide = overload(b, 64);
        let narrow = overload(b, 32);
        let arg = b.expr_name("small");
        let call = b.expr_call("f", vec![arg]);
        let at = b.type_auto();
        let aq = b.qualified(at, Constness::Mutable);
        let y = b.decl_global("y", aq, Some(call), Linkage::Private);
        picked = Some((y, narrow));
        vec![b.decl_module("m", vec![small, wide, narrow, y])]
    })
    .unwrap();

    let (y, narrow) = picked.unwrap();
    let ctx = driver.context();
    let init = ctx.child(y, 1).unwrap();
    match ctx.kind(init) {
        NodeKind::Expression(Expression::ResolvedOperator {
            kind: OperatorKind::Call,
            target: OperatorTarget::Function(link),
        }) => assert_eq!(link.node, narrow),
        other => panic!("unresolved {other:?}"),
    }
}
