//! Grammars derived from PDL units after a full compilation.

use weave::ast::{Builder, Constness, Keyword, Linkage, NodeRef};
use weave::pdl::ProductionKind;
use weave::{CompileError, DriverOptions, PdlPlugin};
use weave_core::Symbol;

fn declare_unit(b: &mut Builder<'_>, items: Vec<NodeRef>) -> NodeRef {
    let unit = b.type_unit(vec![], items);
    let q = b.qualified(unit, Constness::Mutable);
    let decl = b.decl_type("U", q, Linkage::Public);
    b.decl_module("m", vec![decl])
}

/// `type U = unit { more: uint<8>; x: U if (self.more); }`
#[test]
fn recursive_unit_is_back_patched() {
    let (driver, _) = weave::compile(DriverOptions::default(), |b| {
        let u8t = b.type_unsigned_integer(8);
        let u8q = b.qualified(u8t, Constness::Mutable);
        let more = b.unit_field(Some(Symbol::new("more")), u8q, None, None);
        let name = b.type_name("U");
        let nq = b.qualified(name, Constness::Mutable);
        let this = b.expr_keyword(Keyword::SelfValue);
        let cond = b.expr_field(this, "more");
        let x = b.unit_field(Some(Symbol::new("x")), nq, Some(cond), None);
        vec![declare_unit(b, vec![more, x])]
    })
    .unwrap();

    let pdl = driver.plugin::<PdlPlugin>().unwrap();
    assert_eq!(pdl.grammars().len(), 1);
    let grammar = pdl.grammar("m::U").unwrap();
    assert!(grammar.errors().is_empty());

    let root = grammar.root().unwrap();
    assert!(matches!(grammar.get(root).kind, ProductionKind::Unit { .. }));
    let (placeholder, prod) = grammar
        .productions()
        .find(|(_, p)| matches!(p.kind, ProductionKind::Resolved { .. }))
        .unwrap();
    assert_eq!(prod.kind, ProductionKind::Resolved { target: Some(root) });
    assert_eq!(prod.symbol, "m::U");
    assert_eq!(grammar.resolve(placeholder), root);

    let x = grammar.find("m::U::x").unwrap();
    assert!(matches!(grammar.get(x).kind, ProductionKind::Boolean { .. }));
    assert!(grammar.is_nullable(x));
    assert!(!grammar.is_nullable(root));
}

/// `type U = unit { x: U?; }`
#[test]
fn optional_self_reference_is_back_patched() {
    let (driver, _) = weave::compile(DriverOptions::default(), |b| {
        let name = b.type_name("U");
        let nq = b.qualified(name, Constness::Mutable);
        let opt = b.type_optional(nq);
        let oq = b.qualified(opt, Constness::Mutable);
        let x = b.unit_field(Some(Symbol::new("x")), oq, None, None);
        vec![declare_unit(b, vec![x])]
    })
    .unwrap();

    let pdl = driver.plugin::<PdlPlugin>().unwrap();
    let grammar = pdl.grammar("m::U").unwrap();
    assert!(grammar.errors().is_empty());
    let root = grammar.root().unwrap();
    let (placeholder, prod) = grammar
        .productions()
        .find(|(_, p)| matches!(p.kind, ProductionKind::Resolved { .. }))
        .unwrap();
    assert_eq!(prod.kind, ProductionKind::Resolved { target: Some(root) });
    assert_eq!(grammar.resolve(placeholder), root);

    let x = grammar.find("m::U::x").unwrap();
    assert!(matches!(grammar.get(x).kind, ProductionKind::LookAhead { .. }));
    assert!(grammar.is_nullable(x));
}

#[test]
fn ambiguous_switch_fails_compilation() {
    let Err(err) = weave::compile(DriverOptions::default(), |b| {
        let a = b.expr_bytes(b"A".to_vec());
        let fa = b.unit_literal_field(Some(Symbol::new("a")), a, None, None);
        let c = b.expr_bytes(b"A".to_vec());
        let fc = b.unit_literal_field(Some(Symbol::new("c")), c, None, None);
        let case_a = b.unit_switch_case(fa, vec![]);
        let case_c = b.unit_switch_case(fc, vec![]);
        let switch = b.unit_switch(None, vec![case_a, case_c]);
        vec![declare_unit(b, vec![switch])]
    }) else {
        panic!("compilation succeeded");
    };

    assert!(matches!(err, CompileError::Grammar(_)));
    let message = &err.diagnostics()[0].message;
    assert!(message.starts_with("ambiguous look-ahead"), "{message}");
    assert!(message.ends_with("literal b\"A\" can start both alternatives"), "{message}");
}
