//! Visitor dispatch and change tracking.
//!
//! [`dispatch`] calls the most specific `visit_*` method for a node's class.
//! Specific methods default to their category method (`visit_function` falls
//! back to `visit_declaration`), and category methods default to doing
//! nothing, so a visitor only overrides what it cares about.
//!
//! Walks snapshot the traversal order up front and skip nodes that a
//! visitor detached from the tree along the way.

use weave_core::DebugStream;

use crate::printer::render_short;
use crate::{AstContext, NodeClass, NodeRef};

pub trait Visitor {
    fn visit_root(&mut self, _ctx: &mut AstContext, _n: NodeRef) {}

    // Declarations.
    fn visit_declaration(&mut self, _ctx: &mut AstContext, _n: NodeRef) {}
    fn visit_module(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_declaration(ctx, n)
    }
    fn visit_imported_module(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_declaration(ctx, n)
    }
    fn visit_type_declaration(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_declaration(ctx, n)
    }
    fn visit_constant(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_declaration(ctx, n)
    }
    fn visit_global_variable(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_declaration(ctx, n)
    }
    fn visit_local_variable(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_declaration(ctx, n)
    }
    fn visit_parameter(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_declaration(ctx, n)
    }
    fn visit_function(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_declaration(ctx, n)
    }
    fn visit_field(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_declaration(ctx, n)
    }
    fn visit_enum_label(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_declaration(ctx, n)
    }

    // Types.
    fn visit_qualified_type(&mut self, _ctx: &mut AstContext, _n: NodeRef) {}
    fn visit_unqualified_type(&mut self, _ctx: &mut AstContext, _n: NodeRef) {}
    fn visit_type_name(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_unqualified_type(ctx, n)
    }
    fn visit_type_enum(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_unqualified_type(ctx, n)
    }
    fn visit_type_struct(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_unqualified_type(ctx, n)
    }
    fn visit_type_union(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_unqualified_type(ctx, n)
    }
    fn visit_type_function(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_unqualified_type(ctx, n)
    }
    fn visit_type_list(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_unqualified_type(ctx, n)
    }
    fn visit_type_tuple(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_unqualified_type(ctx, n)
    }

    // Expressions.
    fn visit_expression(&mut self, _ctx: &mut AstContext, _n: NodeRef) {}
    fn visit_expr_name(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_expression(ctx, n)
    }
    fn visit_expr_ctor(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_expression(ctx, n)
    }
    fn visit_expr_unresolved_operator(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_expression(ctx, n)
    }
    fn visit_expr_resolved_operator(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_expression(ctx, n)
    }
    fn visit_expr_coerced(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_expression(ctx, n)
    }
    fn visit_expr_assign(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_expression(ctx, n)
    }
    fn visit_expr_logical(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_expression(ctx, n)
    }
    fn visit_expr_ternary(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_expression(ctx, n)
    }
    fn visit_expr_member(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_expression(ctx, n)
    }
    fn visit_expr_type(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_expression(ctx, n)
    }
    fn visit_expr_keyword(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_expression(ctx, n)
    }

    // Ctors.
    fn visit_ctor(&mut self, _ctx: &mut AstContext, _n: NodeRef) {}
    fn visit_ctor_tuple(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_ctor(ctx, n)
    }
    fn visit_ctor_list(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_ctor(ctx, n)
    }
    fn visit_ctor_enum(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_ctor(ctx, n)
    }

    // Statements.
    fn visit_statement(&mut self, _ctx: &mut AstContext, _n: NodeRef) {}
    fn visit_stmt_block(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_statement(ctx, n)
    }
    fn visit_stmt_expression(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_statement(ctx, n)
    }
    fn visit_stmt_declaration(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_statement(ctx, n)
    }
    fn visit_stmt_return(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_statement(ctx, n)
    }
    fn visit_stmt_if(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_statement(ctx, n)
    }
    fn visit_stmt_while(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.visit_statement(ctx, n)
    }

    fn visit_attribute(&mut self, _ctx: &mut AstContext, _n: NodeRef) {}
    fn visit_attribute_set(&mut self, _ctx: &mut AstContext, _n: NodeRef) {}
}

/// Call the most specific method of `v` for `n`'s class.
///
/// PDL-only classes have no method here and are skipped; PDL visitors use
/// their own dispatcher, which falls back to this one. PDL types count as
/// unqualified types.
pub fn dispatch<V: Visitor + ?Sized>(v: &mut V, ctx: &mut AstContext, n: NodeRef) {
    match ctx.class(n) {
        NodeClass::Root => v.visit_root(ctx, n),
        NodeClass::Module => v.visit_module(ctx, n),
        NodeClass::ImportedModule => v.visit_imported_module(ctx, n),
        NodeClass::TypeDeclaration => v.visit_type_declaration(ctx, n),
        NodeClass::Constant => v.visit_constant(ctx, n),
        NodeClass::GlobalVariable => v.visit_global_variable(ctx, n),
        NodeClass::LocalVariable => v.visit_local_variable(ctx, n),
        NodeClass::Parameter => v.visit_parameter(ctx, n),
        NodeClass::Function => v.visit_function(ctx, n),
        NodeClass::Field => v.visit_field(ctx, n),
        NodeClass::EnumLabel => v.visit_enum_label(ctx, n),
        NodeClass::QualifiedType => v.visit_qualified_type(ctx, n),
        NodeClass::TypeName => v.visit_type_name(ctx, n),
        NodeClass::TypeEnum => v.visit_type_enum(ctx, n),
        NodeClass::TypeStruct => v.visit_type_struct(ctx, n),
        NodeClass::TypeUnion => v.visit_type_union(ctx, n),
        NodeClass::TypeFunction => v.visit_type_function(ctx, n),
        NodeClass::TypeList => v.visit_type_list(ctx, n),
        NodeClass::TypeTuple => v.visit_type_tuple(ctx, n),
        NodeClass::TypeUnit | NodeClass::TypeSink | NodeClass::TypeOther => {
            v.visit_unqualified_type(ctx, n)
        }
        NodeClass::ExprName => v.visit_expr_name(ctx, n),
        NodeClass::ExprCtor => v.visit_expr_ctor(ctx, n),
        NodeClass::ExprUnresolvedOperator => v.visit_expr_unresolved_operator(ctx, n),
        NodeClass::ExprResolvedOperator => v.visit_expr_resolved_operator(ctx, n),
        NodeClass::ExprCoerced => v.visit_expr_coerced(ctx, n),
        NodeClass::ExprAssign => v.visit_expr_assign(ctx, n),
        NodeClass::ExprLogicalAnd | NodeClass::ExprLogicalOr | NodeClass::ExprLogicalNot => {
            v.visit_expr_logical(ctx, n)
        }
        NodeClass::ExprTernary => v.visit_expr_ternary(ctx, n),
        NodeClass::ExprMember => v.visit_expr_member(ctx, n),
        NodeClass::ExprType => v.visit_expr_type(ctx, n),
        NodeClass::ExprKeyword => v.visit_expr_keyword(ctx, n),
        NodeClass::CtorTuple => v.visit_ctor_tuple(ctx, n),
        NodeClass::CtorList => v.visit_ctor_list(ctx, n),
        NodeClass::CtorEnum => v.visit_ctor_enum(ctx, n),
        NodeClass::CtorOther => v.visit_ctor(ctx, n),
        NodeClass::StmtBlock => v.visit_stmt_block(ctx, n),
        NodeClass::StmtExpression => v.visit_stmt_expression(ctx, n),
        NodeClass::StmtDeclaration => v.visit_stmt_declaration(ctx, n),
        NodeClass::StmtReturn => v.visit_stmt_return(ctx, n),
        NodeClass::StmtIf => v.visit_stmt_if(ctx, n),
        NodeClass::StmtWhile => v.visit_stmt_while(ctx, n),
        NodeClass::Attribute => v.visit_attribute(ctx, n),
        NodeClass::AttributeSet => v.visit_attribute_set(ctx, n),
        NodeClass::UnitField
        | NodeClass::UnitVariable
        | NodeClass::UnitSwitch
        | NodeClass::UnitSwitchCase
        | NodeClass::UnitProperty
        | NodeClass::UnitSink => {}
    }
}

/// Dispatch `n` and pull a result out of the visitor afterwards.
pub fn dispatch_with<V, R>(
    v: &mut V,
    ctx: &mut AstContext,
    n: NodeRef,
    extract: impl FnOnce(&mut V) -> Option<R>,
) -> Option<R>
where
    V: Visitor + ?Sized,
{
    dispatch(v, ctx, n);
    extract(v)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    Pre,
    Post,
}

/// Call `f` on every node beneath `root` (inclusive) in the given order.
///
/// The order is fixed before the first call; nodes that have been detached
/// from `root` by the time their turn comes are skipped.
pub fn walk(
    ctx: &mut AstContext,
    root: NodeRef,
    order: Order,
    mut f: impl FnMut(&mut AstContext, NodeRef),
) {
    let nodes: Vec<NodeRef> = match order {
        Order::Pre => ctx.pre_order(root).map(|(n, _)| n).collect(),
        Order::Post => ctx.post_order(root).map(|(n, _)| n).collect(),
    };
    for n in nodes {
        if ctx.is_within(n, root) {
            f(ctx, n);
        }
    }
}

/// Walk with [`dispatch`] as the callback.
pub fn visit<V: Visitor + ?Sized>(v: &mut V, ctx: &mut AstContext, root: NodeRef, order: Order) {
    walk(ctx, root, order, |ctx, n| dispatch(v, ctx, n));
}

// ============================================================================
// Change tracking
// ============================================================================

/// Records AST modifications made by a pass and logs each one to the pass's
/// debug stream as `<loc> <class> "<old>" -> <class> "<new>" (<message>)`.
pub struct Mutator {
    stream: DebugStream,
    modified: bool,
}

impl Mutator {
    pub fn new(stream: DebugStream) -> Self {
        Self {
            stream,
            modified: false,
        }
    }

    pub fn stream(&self) -> DebugStream {
        self.stream
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Replace `old` with `new` in the tree and record it.
    pub fn replace_node(&mut self, ctx: &mut AstContext, old: NodeRef, new: NodeRef, message: &str) {
        let line = change_line(ctx, old, Some(new), message);
        ctx.replace_node(old, new);
        self.emit(line);
    }

    /// Record that `old` was changed into `new` by other means.
    pub fn record_change_to(&mut self, ctx: &AstContext, old: NodeRef, new: NodeRef, message: &str) {
        let line = change_line(ctx, old, Some(new), message);
        self.emit(line);
    }

    /// Record an in-place change of `n`.
    pub fn record_change(&mut self, ctx: &AstContext, n: NodeRef, message: &str) {
        let line = change_line(ctx, n, None, message);
        self.emit(line);
    }

    fn emit(&mut self, line: String) {
        self.modified = true;
        self.stream.emit(&line);
    }
}

fn change_line(ctx: &AstContext, old: NodeRef, new: Option<NodeRef>, message: &str) -> String {
    let location = ctx
        .nearest_location(old)
        .map(|l| l.to_string())
        .unwrap_or_else(|| "<no location>".to_string());
    let old_part = format!("{} \"{}\"", ctx.kind(old).class_name(), render_short(ctx, old));
    match new {
        Some(new) => format!(
            "{location} {old_part} -> {} \"{}\" ({message})",
            ctx.kind(new).class_name(),
            render_short(ctx, new),
        ),
        None => format!("{location} {old_part} ({message})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Builder, Constness, Linkage};

    #[derive(Default)]
    struct Counter {
        declarations: usize,
        functions: usize,
        types: usize,
    }

    impl Visitor for Counter {
        fn visit_declaration(&mut self, _ctx: &mut AstContext, _n: NodeRef) {
            self.declarations += 1;
        }

        fn visit_function(&mut self, _ctx: &mut AstContext, _n: NodeRef) {
            self.functions += 1;
        }

        fn visit_unqualified_type(&mut self, _ctx: &mut AstContext, _n: NodeRef) {
            self.types += 1;
        }
    }

    #[test]
    fn most_specific_method_wins() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let t = b.type_bool();
        let qt = b.qualified(t, Constness::Mutable);
        let global = b.decl_global("g", qt, None, Linkage::Public);
        let rt = b.type_void();
        let rq = b.qualified(rt, Constness::Const);
        let func = b.decl_function("f", rq, vec![], None, Linkage::Public);
        let module = b.decl_module("m", vec![global, func]);

        let mut counter = Counter::default();
        visit(&mut counter, &mut ctx, module, Order::Pre);
        // The module and the global; the function goes to its own method.
        assert_eq!(counter.declarations, 2);
        assert_eq!(counter.functions, 1);
        // bool, void and the function type.
        assert_eq!(counter.types, 3);
    }

    struct Detacher;

    impl Visitor for Detacher {
        fn visit_qualified_type(&mut self, ctx: &mut AstContext, n: NodeRef) {
            ctx.detach(n);
        }

        fn visit_unqualified_type(&mut self, _ctx: &mut AstContext, n: NodeRef) {
            panic!("visited detached type {n}");
        }
    }

    #[test]
    fn walk_skips_detached_nodes() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let t = b.type_bool();
        let qt = b.qualified(t, Constness::Mutable);
        let global = b.decl_global("g", qt, None, Linkage::Public);
        visit(&mut Detacher, &mut ctx, global, Order::Pre);
        assert_eq!(ctx.child(global, 0), None);
    }

    #[test]
    fn mutator_tracks_modification() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let old = b.expr_int(1);
        let stmt = b.stmt_expression(old);
        let new = b.expr_int(2);

        let mut m = Mutator::new(DebugStream::Resolver);
        assert!(!m.is_modified());
        m.replace_node(&mut ctx, old, new, "test");
        assert!(m.is_modified());
        assert_eq!(ctx.child(stmt, 0), Some(new));
        assert_eq!(ctx.parent(old), None);
    }

    #[test]
    fn change_line_format() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let old = b.expr_int(1);
        let new = b.expr_uint(1);
        let line = change_line(&ctx, old, Some(new), "coerced");
        assert_eq!(
            line,
            "<no location> expression::Ctor \"1\" -> expression::Ctor \"1\" (coerced)"
        );
    }
}
