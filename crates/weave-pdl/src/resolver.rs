//! PDL scopes and resolution steps.
//!
//! GPIL resolution does most of the work on unit bodies; what remains here
//! is what only makes sense inside a unit: the unit's own scope, typing
//! `self` and `$$`, and coercing item values.

use weave_ast::{
    AstContext, Category, Constness, Expression, Keyword, Mutator, NodeKind, NodeRef, Qualifiers,
    TypeKind, UnitItem, UnqualifiedType, Visitor, visitor::Order,
};
use weave_core::{DebugStream, Symbol};
use weave_passes::{Coercer, CoercionStyle, Session, unifier};

use crate::visitor::{PdlVisitor, visit_pdl};

weave_core::symbols! {
    UNTIL => "&until",
    WHILE => "&while",
}

/// Give every unit type a scope holding its parameters and the items that
/// declare an ID, including items inside switch cases.
pub fn build_unit_scopes(ctx: &mut AstContext, root: NodeRef) {
    let units: Vec<NodeRef> = ctx
        .pre_order(root)
        .map(|(n, _)| n)
        .filter(|&n| matches!(ctx.type_kind(n), Some(TypeKind::Unit)))
        .collect();
    for unit in units {
        let mut entries: Vec<(Symbol, NodeRef)> = ctx
            .children_of(unit, 0, Category::Declaration)
            .filter_map(|p| ctx.kind(p).as_declaration().map(|d| (d.id, p)))
            .collect();
        for item in unit_items(ctx, unit) {
            if let Some(id) = ctx.kind(item).as_unit_item().and_then(|i| i.id()) {
                entries.push((id, item));
            }
        }
        let scope = ctx.get_or_create_scope(unit);
        for (id, d) in entries {
            ctx.scope_mut(scope).insert(id, d);
        }
    }
}

/// The items of a unit in order, with switch cases flattened into the
/// items they parse.
pub fn unit_items(ctx: &AstContext, unit: NodeRef) -> Vec<NodeRef> {
    let mut items = Vec::new();
    for item in ctx.children_of(unit, 0, Category::UnitItem) {
        collect_items(ctx, item, &mut items);
    }
    items
}

fn collect_items(ctx: &AstContext, item: NodeRef, out: &mut Vec<NodeRef>) {
    match ctx.kind(item).as_unit_item() {
        Some(UnitItem::Switch) => {
            for case in ctx.children_of(item, 1, Category::UnitItem) {
                collect_items(ctx, case, out);
            }
        }
        Some(UnitItem::SwitchCase { .. }) => {
            if let Some(inner) = ctx.child(item, 0) {
                collect_items(ctx, inner, out);
            }
        }
        Some(_) => out.push(item),
        None => {}
    }
}

/// One PDL resolution step beneath `root`. Returns true if the AST changed.
pub fn resolve(ctx: &mut AstContext, session: &Session<'_>, root: NodeRef) -> bool {
    let mut resolver = PdlResolver {
        coercer: session.coercer(),
        mutator: Mutator::new(DebugStream::PdlResolver),
        bool_type: None,
    };
    visit_pdl(&mut resolver, ctx, root, Order::Post);
    resolver.mutator.is_modified()
}

struct PdlResolver<'a> {
    coercer: Coercer<'a>,
    mutator: Mutator,
    bool_type: Option<NodeRef>,
}

impl PdlResolver<'_> {
    fn bool_type(&mut self, ctx: &mut AstContext) -> NodeRef {
        if let Some(t) = self.bool_type {
            return t;
        }
        let t = ctx.create_node(NodeKind::Type(UnqualifiedType::new(TypeKind::Bool)), [], None);
        unifier::unify_type(ctx, t);
        let qt = ctx.create_node(
            NodeKind::QualifiedType(Qualifiers::rhs(Constness::Const)),
            [Some(t)],
            None,
        );
        self.bool_type = Some(qt);
        qt
    }

    fn set_keyword_type(&mut self, ctx: &mut AstContext, n: NodeRef, t: NodeRef, qualifiers: Qualifiers) {
        let inner = ctx.clone_type_reference(t);
        let location = ctx.location(n);
        let qt = ctx.create_node(NodeKind::QualifiedType(qualifiers), [Some(inner)], location);
        ctx.set_child(n, 0, Some(qt));
        let keyword = match ctx.kind(n) {
            NodeKind::Expression(Expression::Keyword(k)) => k.text(),
            _ => "keyword",
        };
        self.mutator.record_change(ctx, n, &format!("typed {keyword}"));
    }

    /// `$$` is the value of the enclosing field; inside `&until` or
    /// `&while` of a list field it is the element just parsed.
    fn current_value_type(ctx: &AstContext, n: NodeRef) -> Option<NodeRef> {
        let field = ctx.find_ancestor(n, |k| {
            matches!(k, NodeKind::UnitItem(UnitItem::Field { .. }))
        })?;
        let t = ctx.child(field, 0)?;
        if !ctx.is_resolved(t) {
            return None;
        }
        let in_loop_condition = ctx.ancestors(n).any(|a| {
            ctx.attribute_tag(a)
                .is_some_and(|tag| tag == UNTIL() || tag == WHILE())
        });
        if in_loop_condition && matches!(ctx.followed_kind(t), Some(TypeKind::List)) {
            ctx.element_type(t)
        } else {
            Some(t)
        }
    }
}

impl Visitor for PdlResolver<'_> {
    fn visit_expr_keyword(&mut self, ctx: &mut AstContext, n: NodeRef) {
        if ctx.child(n, 0).is_some() {
            return;
        }
        match ctx.kind(n) {
            NodeKind::Expression(Expression::Keyword(Keyword::SelfValue)) => {
                let unit = ctx.find_ancestor(n, |k| {
                    matches!(k, NodeKind::Type(t) if t.kind == TypeKind::Unit)
                });
                if let Some(unit) = unit {
                    self.set_keyword_type(ctx, n, unit, Qualifiers::lhs(Constness::Mutable));
                }
            }
            NodeKind::Expression(Expression::Keyword(Keyword::CurrentValue)) => {
                if let Some(t) = Self::current_value_type(ctx, n) {
                    let u = ctx.unqualified(t).unwrap_or(t);
                    self.set_keyword_type(ctx, n, u, Qualifiers::rhs(Constness::Const));
                }
            }
            _ => {}
        }
    }
}

impl PdlVisitor for PdlResolver<'_> {
    fn visit_unit_field(&mut self, ctx: &mut AstContext, n: NodeRef) {
        let Some(condition) = ctx.child(n, 2) else {
            return;
        };
        let is_bool = ctx
            .expression_type(condition)
            .and_then(|t| ctx.followed_kind(t))
            .is_some_and(|k| *k == TypeKind::Bool);
        if !is_bool {
            let bool_type = self.bool_type(ctx);
            self.coercer.coerce_slot(
                ctx,
                &mut self.mutator,
                n,
                2,
                bool_type,
                CoercionStyle::CONTEXTUAL_CONVERSION,
            );
        }
    }

    fn visit_unit_variable(&mut self, ctx: &mut AstContext, n: NodeRef) {
        if let Some(qt) = ctx.child(n, 0) {
            self.coercer
                .coerce_slot(ctx, &mut self.mutator, n, 1, qt, CoercionStyle::ASSIGNMENT);
        }
    }
}
