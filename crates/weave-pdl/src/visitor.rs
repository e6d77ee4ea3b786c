//! Visitor extension for PDL node classes.
//!
//! [`PdlVisitor`] adds methods for the PDL-only classes on top of the GPIL
//! [`Visitor`]; [`dispatch_pdl`] handles those classes and hands everything
//! else to the GPIL dispatcher.

use weave_ast::{AstContext, NodeClass, NodeRef, Order, Visitor, visitor};

pub trait PdlVisitor: Visitor {
    fn visit_type_unit(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_unqualified_type(ctx, n)
    }
    fn visit_type_sink(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_unqualified_type(ctx, n)
    }

    fn visit_unit_item(&mut self, _ctx: &mut AstContext, _n: NodeRef) {}
    fn visit_unit_field(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_unit_item(ctx, n)
    }
    fn visit_unit_variable(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_unit_item(ctx, n)
    }
    fn visit_unit_switch(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_unit_item(ctx, n)
    }
    fn visit_unit_switch_case(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_unit_item(ctx, n)
    }
    fn visit_unit_property(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_unit_item(ctx, n)
    }
    fn visit_unit_sink(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_unit_item(ctx, n)
    }
}

/// Call the most specific method of `v` for `n`'s class, PDL classes
/// included.
pub fn dispatch_pdl<V: PdlVisitor + ?Sized>(v: &mut V, ctx: &mut AstContext, n: NodeRef) {
    match ctx.class(n) {
        NodeClass::TypeUnit => v.visit_type_unit(ctx, n),
        NodeClass::TypeSink => v.visit_type_sink(ctx, n),
        NodeClass::UnitField => v.visit_unit_field(ctx, n),
        NodeClass::UnitVariable => v.visit_unit_variable(ctx, n),
        NodeClass::UnitSwitch => v.visit_unit_switch(ctx, n),
        NodeClass::UnitSwitchCase => v.visit_unit_switch_case(ctx, n),
        NodeClass::UnitProperty => v.visit_unit_property(ctx, n),
        NodeClass::UnitSink => v.visit_unit_sink(ctx, n),
        _ => visitor::dispatch(v, ctx, n),
    }
}

/// Dispatch every node beneath `root` (inclusive) in the given order.
/// Nodes detached along the way are skipped.
pub fn visit_pdl<V: PdlVisitor + ?Sized>(v: &mut V, ctx: &mut AstContext, root: NodeRef, order: Order) {
    visitor::walk(ctx, root, order, |ctx, n| dispatch_pdl(v, ctx, n));
}

#[cfg(test)]
mod tests {
    use weave_ast::{Builder, Constness};
    use weave_core::Symbol;

    use super::*;

    #[derive(Default)]
    struct Classes(Vec<&'static str>);

    impl Visitor for Classes {
        fn visit_unqualified_type(&mut self, _ctx: &mut AstContext, _n: NodeRef) {
            self.0.push("type");
        }
        fn visit_expression(&mut self, _ctx: &mut AstContext, _n: NodeRef) {
            self.0.push("expression");
        }
    }

    impl PdlVisitor for Classes {
        fn visit_type_unit(&mut self, _ctx: &mut AstContext, _n: NodeRef) {
            self.0.push("unit");
        }
        fn visit_unit_item(&mut self, _ctx: &mut AstContext, _n: NodeRef) {
            self.0.push("item");
        }
    }

    #[test]
    fn pdl_classes_dispatch_to_extension() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let t = b.type_unsigned_integer(8);
        let q = b.qualified(t, Constness::Mutable);
        let field = b.unit_field(Some(Symbol::new("x")), q, None, None);
        let unit = b.type_unit(vec![], vec![field]);

        let mut v = Classes::default();
        visit_pdl(&mut v, &mut ctx, unit, Order::Pre);
        // The qualified type has no handler.
        assert_eq!(v.0, vec!["unit", "item", "type"]);
    }

    #[test]
    fn gpil_classes_fall_back() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let e = b.expr_uint(1);
        let mut v = Classes::default();
        dispatch_pdl(&mut v, &mut ctx, e);
        assert_eq!(v.0, vec!["expression"]);
    }
}
