//! Structural type unification across modules.

use weave::DriverOptions;
use weave::ast::{AstContext, Builder, Constness, Linkage, NodeRef};
use weave::passes::unifier;

/// `global t: tuple<int<32>, string>`; returns the declaration and the
/// tuple type.
fn tuple_global(b: &mut Builder<'_>) -> (NodeRef, NodeRef) {
    let i = b.type_signed_integer(32);
    let iq = b.qualified(i, Constness::Mutable);
    let s = b.type_string();
    let sq = b.qualified(s, Constness::Mutable);
    let t = b.type_tuple(vec![iq, sq]);
    let tq = b.qualified(t, Constness::Mutable);
    let g = b.decl_global("t", tq, None, Linkage::Public);
    (g, t)
}

#[test]
fn tuples_in_separate_modules_share_serialization() {
    let mut tuples = Vec::new();
    let (driver, output) = weave::compile(DriverOptions::default(), |b| {
        let (ga, ta) = tuple_global(b);
        let (gb, tb) = tuple_global(b);
        tuples = vec![ta, tb];
        vec![b.decl_module("a", vec![ga]), b.decl_module("b", vec![gb])]
    })
    .unwrap();
    assert!(output.reached_fixed_point);

    let ctx = driver.context();
    let a = unifier::serialize(ctx, tuples[0]).unwrap();
    let b = unifier::serialize(ctx, tuples[1]).unwrap();
    assert_eq!(a, b);
    assert!(unifier::types_equal(ctx, tuples[0], tuples[1]));
}

#[test]
fn list_of_auto_is_unresolved() {
    let mut ctx = AstContext::new();
    let mut b = Builder::new(&mut ctx);
    let auto = b.type_auto();
    let aq = b.qualified(auto, Constness::Mutable);
    let list = b.type_list(aq);
    assert!(!ctx.is_resolved(list));
}
