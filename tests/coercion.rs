//! Coercion of initialisers through a full compilation.

use weave::ast::{Builder, Constness, Expression, Linkage, NodeKind, NodeRef, render_short, render_type};
use weave::{CompileError, DriverOptions};

fn int(b: &mut Builder<'_>, width: u16) -> NodeRef {
    let t = b.type_signed_integer(width);
    b.qualified(t, Constness::Mutable)
}

#[test]
fn integer_widens_on_assignment() {
    let mut wide = None;
    let (driver, output) = weave::compile(DriverOptions::default(), |b| {
        let small_type = int(b, 8);
        let small = b.decl_global("small", small_type, None, Linkage::Private);
        let init = b.expr_name("small");
        let wide_type = int(b, 32);
        let w = b.decl_global("wide", wide_type, Some(init), Linkage::Private);
        wide = Some(w);
        vec![b.decl_module("m", vec![small, w])]
    })
    .unwrap();
    assert!(output.reached_fixed_point);

    let ctx = driver.context();
    let init = ctx.child(wide.unwrap(), 1).unwrap();
    assert!(matches!(ctx.kind(init), NodeKind::Expression(Expression::Coerced)));
    assert_eq!(render_short(ctx, init), "small");
    assert_eq!(render_type(ctx, ctx.expression_type(init).unwrap()), "int<32>");
}

#[test]
fn integer_narrowing_is_rejected() {
    let Err(err) = weave::compile(DriverOptions::default(), |b| {
        let wide_type = int(b, 32);
        let wide = b.decl_global("wide", wide_type, None, Linkage::Private);
        let init = b.expr_name("wide");
        let narrow_type = int(b, 8);
        let narrow = b.decl_global("narrow", narrow_type, Some(init), Linkage::Private);
        vec![b.decl_module("m", vec![wide, narrow])]
    }) else {
        panic!("compilation succeeded");
    };

    assert!(matches!(err, CompileError::Validation(_)));
    let expected = "cannot coerce expression 'wide' of type 'int<32>' to type 'int<8>'";
    assert!(
        err.diagnostics().iter().any(|d| d.message.starts_with(expected)),
        "{err}"
    );
}

#[test]
fn literal_is_wrapped_into_optional() {
    let mut global = None;
    let (driver, _) = weave::compile(DriverOptions::default(), |b| {
        let u32t = b.type_unsigned_integer(32);
        let u32q = b.qualified(u32t, Constness::Const);
        let opt = b.type_optional(u32q);
        let optq = b.qualified(opt, Constness::Mutable);
        let c = b.ctor_unsigned_integer(42, 32);
        let init = b.expr_ctor(c);
        let g = b.decl_global("o", optq, Some(init), Linkage::Private);
        global = Some(g);
        vec![b.decl_module("m", vec![g])]
    })
    .unwrap();

    let ctx = driver.context();
    let init = ctx.child(global.unwrap(), 1).unwrap();
    assert_eq!(render_short(ctx, init), "optional(42)");
}

#[test]
fn null_initialises_value_reference() {
    let mut global = None;
    let (driver, _) = weave::compile(DriverOptions::default(), |b| {
        let u8t = b.type_unsigned_integer(8);
        let u8q = b.qualified(u8t, Constness::Mutable);
        let r = b.type_value_ref(u8q);
        let rq = b.qualified(r, Constness::Mutable);
        let null = b.ctor_null();
        let init = b.expr_ctor(null);
        let g = b.decl_global("r", rq, Some(init), Linkage::Private);
        global = Some(g);
        vec![b.decl_module("m", vec![g])]
    })
    .unwrap();

    let ctx = driver.context();
    let init = ctx.child(global.unwrap(), 1).unwrap();
    assert_eq!(render_type(ctx, ctx.expression_type(init).unwrap()), "value_ref<uint<8>>");
}
