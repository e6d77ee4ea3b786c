//! Name and operator resolution.
//!
//! One resolver pass links whatever can be linked with the information
//! currently available and leaves the rest for the next round: names bind
//! to declarations, operators to built-ins or functions, `auto` types are
//! inferred from initialisers, and container literals get their types
//! once their elements are typed.

use weave_ast::{
    AstContext, Builder, Constness, Ctor, DeclKind, Expression, Keyword, Mutator, NodeKind,
    NodeRef, OperatorKind, Qualifiers, TypeKind, UnitItem, UnqualifiedType, Visitor, visitor,
};
use weave_core::{DebugStream, QualifiedId};

use crate::coercer::Coercer;
use crate::operator::{self, Choice, OperatorRegistry, ResultType, Selection};
use crate::plugin::Session;
use crate::unifier;

/// Run one resolution step beneath `root`. Returns true if the AST changed.
pub fn resolve(ctx: &mut AstContext, session: &Session<'_>, root: NodeRef) -> bool {
    let mut resolver = Resolver {
        coercer: session.coercer(),
        registry: session.registry,
        mutator: Mutator::new(DebugStream::Resolver),
    };
    visitor::visit(&mut resolver, ctx, root, visitor::Order::Post);
    resolver.mutator.is_modified()
}

struct Resolver<'a> {
    coercer: Coercer<'a>,
    registry: &'a OperatorRegistry,
    mutator: Mutator,
}

/// Whether `d` denotes a value a name expression can refer to.
pub fn is_value_declaration(ctx: &AstContext, d: NodeRef) -> bool {
    match ctx.kind(d) {
        NodeKind::Declaration(decl) => matches!(
            decl.kind,
            DeclKind::Constant
                | DeclKind::GlobalVariable
                | DeclKind::LocalVariable
                | DeclKind::Parameter { .. }
                | DeclKind::EnumLabel { .. }
                | DeclKind::Field
        ),
        NodeKind::UnitItem(item) => matches!(
            item,
            UnitItem::Field { id: Some(_), .. } | UnitItem::Variable { .. }
        ),
        _ => false,
    }
}

fn is_type_declaration(ctx: &AstContext, d: NodeRef) -> bool {
    matches!(ctx.kind(d).as_declaration(), Some(decl) if decl.kind == DeclKind::Type)
}

/// A detached r-value copy of a type, referring to declared types by name.
fn rhs_copy(ctx: &mut AstContext, t: NodeRef) -> Option<NodeRef> {
    let u = ctx.unqualified(t)?;
    let inner = ctx.clone_type_reference(u);
    let location = ctx.location(t);
    Some(ctx.create_node(
        NodeKind::QualifiedType(Qualifiers::rhs(Constness::Mutable)),
        [Some(inner)],
        location,
    ))
}

impl Resolver<'_> {
    fn is_callee(ctx: &AstContext, n: NodeRef) -> bool {
        let in_call = ctx.parent(n).is_some_and(|p| {
            matches!(
                ctx.kind(p),
                NodeKind::Expression(Expression::UnresolvedOperator(OperatorKind::Call))
            )
        });
        in_call && ctx.index_in_parent(n) == Some(0)
    }

    /// The result type of an operator bound to `choice`.
    fn result_type(&self, ctx: &mut AstContext, choice: Choice, operands: &[NodeRef]) -> Option<NodeRef> {
        match choice {
            Choice::Builtin(id) => match &self.registry.get(id).result {
                ResultType::Type(kind) => {
                    let t = ctx.create_node(NodeKind::Type(UnqualifiedType::new(kind.clone())), [], None);
                    unifier::unify_type(ctx, t);
                    Some(ctx.create_node(
                        NodeKind::QualifiedType(Qualifiers::rhs(Constness::Mutable)),
                        [Some(t)],
                        None,
                    ))
                }
                ResultType::SameAs(j) => {
                    let t = ctx.expression_type(*operands.get(*j)?)?;
                    rhs_copy(ctx, t)
                }
                ResultType::ElementOf(j) => {
                    let t = ctx.expression_type(*operands.get(*j)?)?;
                    let e = ctx.element_type(t)?;
                    Some(ctx.clone_type_reference(e))
                }
                ResultType::Field => None,
            },
            Choice::Field { field, .. } => {
                let t = ctx.declaration_type(field)?;
                Some(ctx.clone_type_reference(t))
            }
            Choice::Function(f) => {
                let result = ctx
                    .child(f, 0)
                    .and_then(|qt| ctx.unqualified(qt))
                    .and_then(|ft| ctx.child(ft, 0))?;
                rhs_copy(ctx, result)
            }
        }
    }

    /// `auto` variable types take the type of their initialiser.
    fn infer_auto(&mut self, ctx: &mut AstContext, decl: NodeRef) {
        let Some(qt) = ctx.child(decl, 0) else {
            return;
        };
        let is_auto = ctx
            .unqualified(qt)
            .and_then(|u| ctx.type_kind(u))
            .is_some_and(|k| *k == TypeKind::Auto);
        if !is_auto {
            return;
        }
        let Some(init_type) = ctx.child(decl, 1).and_then(|i| ctx.expression_type(i)) else {
            return;
        };
        if !ctx.is_resolved(init_type) {
            return;
        }
        let Some(u) = ctx.unqualified(init_type) else {
            return;
        };
        let qualifiers = ctx
            .qualifiers(qt)
            .unwrap_or(Qualifiers::lhs(Constness::Mutable));
        let inner = ctx.clone_type_reference(u);
        let location = ctx.location(qt);
        let new = ctx.create_node(NodeKind::QualifiedType(qualifiers), [Some(inner)], location);
        self.mutator.replace_node(ctx, qt, new, "inferred type");
    }

    /// A method `S::m` records the type declaration of `S`.
    fn bind_method(&mut self, ctx: &mut AstContext, function: NodeRef) {
        let id = match ctx.kind(function).as_declaration() {
            Some(d) => match &d.kind {
                DeclKind::Function(info) if info.linked_type.is_none() && d.id.is_qualified() => d.id,
                _ => return,
            },
            None => return,
        };
        let id = QualifiedId::from(id);
        let Some(owner_id) = QualifiedId::new(id.parent().iter().copied()) else {
            return;
        };
        let Some(from) = ctx.parent(function) else {
            return;
        };
        let owner = ctx
            .lookup(from, &owner_id)
            .into_iter()
            .find(|&d| is_type_declaration(ctx, d));
        let Some(owner) = owner else {
            return;
        };
        let link = ctx.link_to(owner);
        if let Some(d) = ctx.kind_mut(function).as_declaration_mut() {
            if let DeclKind::Function(info) = &mut d.kind {
                info.linked_type = Some(link);
            }
        }
        self.mutator
            .record_change(ctx, function, &format!("bound to type {owner_id}"));
    }

    /// A definition links to an earlier prototype with the same ID and
    /// signature.
    fn link_prototype(&mut self, ctx: &mut AstContext, function: NodeRef) {
        let id = match ctx.kind(function).as_declaration() {
            Some(d) => match &d.kind {
                DeclKind::Function(info) if info.linked_prototype.is_none() => d.id,
                _ => return,
            },
            None => return,
        };
        if ctx.child(function, 1).is_none() {
            return;
        }
        let (Some(from), Some(signature)) = (ctx.parent(function), ctx.child(function, 0)) else {
            return;
        };
        let prototype = ctx
            .lookup(from, &QualifiedId::from(id))
            .into_iter()
            .filter(|&p| p != function && ctx.child(p, 1).is_none())
            .filter(|&p| matches!(ctx.kind(p).as_declaration().map(|d| &d.kind), Some(DeclKind::Function(_))))
            .find(|&p| ctx.child(p, 0).is_some_and(|s| unifier::types_equal(ctx, s, signature)));
        let Some(prototype) = prototype else {
            return;
        };
        let link = ctx.link_to(prototype);
        if let Some(d) = ctx.kind_mut(function).as_declaration_mut() {
            if let DeclKind::Function(info) = &mut d.kind {
                info.linked_prototype = Some(link);
            }
        }
        self.mutator.record_change(ctx, function, "linked to prototype");
    }

    /// Replace a name that denotes a type with a type expression.
    fn name_to_type_expression(&mut self, ctx: &mut AstContext, n: NodeRef, id: QualifiedId, decl: NodeRef) {
        let link = ctx.link_to(decl);
        let location = ctx.location(n);
        let mut b = Builder::new(ctx);
        b.set_location(location);
        let t = b.type_name(id);
        b.ctx().set_resolved(t, link);
        let qt = b.qualified(t, Constness::Const);
        let e = b.expr_type(qt);
        self.mutator.replace_node(ctx, n, e, "name denotes a type");
    }
}

impl Visitor for Resolver<'_> {
    fn visit_expr_name(&mut self, ctx: &mut AstContext, n: NodeRef) {
        let id = match ctx.kind(n) {
            NodeKind::Expression(Expression::Name { id, resolved: None }) => id.clone(),
            _ => return,
        };
        if Self::is_callee(ctx, n) {
            return;
        }
        let decls = ctx.lookup(n, &id);
        if let Some(&d) = decls.iter().find(|&&d| is_value_declaration(ctx, d)) {
            let link = ctx.link_to(d);
            ctx.set_resolved(n, link);
            if ctx.child(n, 0).is_some() {
                ctx.set_child(n, 0, None);
            }
            let target = link.canonical_id.map(|c| c.to_string()).unwrap_or_else(|| id.to_string());
            self.mutator.record_change(ctx, n, &format!("resolved to {target}"));
        } else if let Some(&t) = decls.iter().find(|&&d| is_type_declaration(ctx, d)) {
            self.name_to_type_expression(ctx, n, id, t);
        }
    }

    fn visit_type_name(&mut self, ctx: &mut AstContext, n: NodeRef) {
        let id = match ctx.type_kind(n) {
            Some(TypeKind::Name { id, resolved: None }) => id.clone(),
            _ => return,
        };
        let decl = ctx
            .lookup(n, &id)
            .into_iter()
            .find(|&d| is_type_declaration(ctx, d));
        if let Some(decl) = decl {
            let link = ctx.link_to(decl);
            ctx.set_resolved(n, link);
            self.mutator.record_change(ctx, n, &format!("resolved type {id}"));
        }
    }

    fn visit_expr_unresolved_operator(&mut self, ctx: &mut AstContext, n: NodeRef) {
        let kind = match ctx.kind(n) {
            NodeKind::Expression(Expression::UnresolvedOperator(k)) => *k,
            _ => return,
        };
        let Selection::Selected(candidate) = operator::select(ctx, &self.coercer, self.registry, n) else {
            return;
        };
        let operands: Vec<NodeRef> = ctx.children(n).iter().flatten().copied().collect();
        let Some(result) = self.result_type(ctx, candidate.choice, &operands) else {
            return;
        };
        if let (OperatorKind::Call, Choice::Function(f)) = (kind, candidate.choice) {
            let callee = operands[0];
            if matches!(ctx.kind(callee), NodeKind::Expression(Expression::Name { resolved: None, .. })) {
                let link = ctx.link_to(f);
                ctx.set_resolved(callee, link);
            }
        }
        let slots = ctx.children(n).len();
        ctx.remove_children(n, 0..slots);
        let target = candidate.choice.target(ctx);
        let children = std::iter::once(Some(result)).chain(operands.into_iter().map(Some));
        let resolved = ctx.create_node(
            NodeKind::Expression(Expression::ResolvedOperator { kind, target }),
            children,
            ctx.location(n),
        );
        self.mutator
            .replace_node(ctx, n, resolved, &format!("resolved to {}", candidate.description));
    }

    fn visit_expr_keyword(&mut self, ctx: &mut AstContext, n: NodeRef) {
        if !matches!(ctx.kind(n), NodeKind::Expression(Expression::Keyword(Keyword::SelfValue)))
            || ctx.child(n, 0).is_some()
        {
            return;
        }
        let owner = ctx
            .find_ancestor(n, |k| {
                matches!(k.as_declaration().map(|d| &d.kind), Some(DeclKind::Function(info)) if info.linked_type.is_some())
            })
            .and_then(|f| match ctx.kind(f).as_declaration().map(|d| &d.kind) {
                Some(DeclKind::Function(info)) => info.linked_type,
                _ => None,
            })
            .and_then(|link| ctx.link_target(link))
            .and_then(|decl| ctx.declared_type(decl));
        let Some(owner) = owner else {
            return;
        };
        let inner = ctx.clone_type_reference(owner);
        let qt = ctx.create_node(
            NodeKind::QualifiedType(Qualifiers::lhs(Constness::Mutable)),
            [Some(inner)],
            ctx.location(n),
        );
        ctx.set_child(n, 0, Some(qt));
        self.mutator.record_change(ctx, n, "typed self");
    }

    fn visit_ctor(&mut self, ctx: &mut AstContext, n: NodeRef) {
        let ctor = match ctx.kind(n) {
            NodeKind::Ctor(c @ (Ctor::Tuple | Ctor::List | Ctor::Optional | Ctor::Result)) => c.clone(),
            _ => return,
        };
        let Some(qt) = ctx.child(n, 0) else {
            return;
        };
        let is_auto = ctx
            .unqualified(qt)
            .and_then(|u| ctx.type_kind(u))
            .is_some_and(|k| *k == TypeKind::Auto);
        if !is_auto {
            return;
        }
        let values: Vec<NodeRef> = ctx.children(n)[1..].iter().flatten().copied().collect();
        let types: Option<Vec<NodeRef>> = values
            .iter()
            .map(|&v| ctx.expression_type(v).filter(|&t| ctx.is_resolved(t)))
            .collect();
        let Some(types) = types else {
            return;
        };
        if types.is_empty() {
            return;
        }
        let elements: Vec<NodeRef> = types
            .into_iter()
            .filter_map(|t| {
                let u = ctx.unqualified(t)?;
                let inner = ctx.clone_type_reference(u);
                Some(ctx.create_node(
                    NodeKind::QualifiedType(Qualifiers::rhs(Constness::Mutable)),
                    [Some(inner)],
                    None,
                ))
            })
            .collect();
        let location = ctx.location(qt);
        let mut b = Builder::new(ctx);
        b.set_location(location);
        let t = match ctor {
            Ctor::Tuple => b.type_tuple(elements),
            Ctor::List => b.type_list(elements[0]),
            Ctor::Optional => b.type_optional(elements[0]),
            _ => b.type_result(elements[0]),
        };
        let new = b.qualified(t, Constness::Const);
        self.mutator.replace_node(ctx, qt, new, "inferred literal type");
    }

    fn visit_constant(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.infer_auto(ctx, n);
    }

    fn visit_global_variable(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.infer_auto(ctx, n);
    }

    fn visit_local_variable(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.infer_auto(ctx, n);
    }

    fn visit_function(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.bind_method(ctx, n);
        self.link_prototype(ctx, n);
    }
}

#[cfg(test)]
mod tests {
    use weave_ast::{Linkage, ParameterKind, render_short};

    use super::*;
    use crate::driver::DriverOptions;
    use crate::scope_builder;

    /// Scopes, IDs, resolution and unification until nothing changes.
    fn settle(ctx: &mut AstContext) {
        let registry = OperatorRegistry::builtin();
        let options = DriverOptions::default();
        let session = Session {
            registry: &registry,
            plugins: &[],
            options: &options,
        };
        let root = ctx.root();
        for _ in 0..8 {
            ctx.clear_scopes();
            scope_builder::build_scopes(ctx, root);
            let mut changed = scope_builder::assign_canonical_ids(ctx, root);
            changed |= resolve(ctx, &session, root);
            changed |= unifier::unify(ctx, root);
            if !changed {
                return;
            }
        }
        panic!("no fixed point");
    }

    fn install(ctx: &mut AstContext, module: NodeRef) {
        let root = ctx.root();
        ctx.add_child(root, Some(module));
    }

    #[test]
    fn local_name_resolves_and_drops_hint() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let bt = b.type_bool();
        let bq = b.qualified(bt, Constness::Mutable);
        let init = b.expr_bool(true);
        let x = b.decl_local("x", bq, Some(init));
        let use_x = b.expr_name("x");
        let hint = b.type_auto();
        let hint = b.qualified(hint, Constness::Const);
        b.ctx().set_child(use_x, 0, Some(hint));
        let body = {
            let d = b.stmt_declaration(x);
            let e = b.stmt_expression(use_x);
            b.stmt_block(vec![d, e])
        };
        let vt = b.type_void();
        let vq = b.qualified(vt, Constness::Const);
        let f = b.decl_function("f", vq, vec![], Some(body), Linkage::Public);
        let m = b.decl_module("m", vec![f]);
        install(&mut ctx, m);

        settle(&mut ctx);
        match ctx.kind(use_x) {
            NodeKind::Expression(Expression::Name { resolved: Some(link), .. }) => {
                assert_eq!(link.node, x)
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(ctx.child(use_x, 0), None);
    }

    #[test]
    fn call_uses_default_argument() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let it = b.type_signed_integer(64);
        let iq = b.qualified(it, Constness::Const);
        let default = b.expr_int(7);
        let p = b.decl_parameter("n", iq, ParameterKind::In, Some(default));
        let rt = b.type_signed_integer(64);
        let rq = b.qualified(rt, Constness::Const);
        let g = b.decl_function("g", rq, vec![p], None, Linkage::Public);

        let call = b.expr_call("g", vec![]);
        let at = b.type_auto();
        let aq = b.qualified(at, Constness::Mutable);
        let y = b.decl_global("y", aq, Some(call), Linkage::Private);
        let m = b.decl_module("m", vec![g, y]);
        install(&mut ctx, m);

        settle(&mut ctx);
        let init = ctx.child(y, 1).unwrap();
        assert!(matches!(
            ctx.kind(init),
            NodeKind::Expression(Expression::ResolvedOperator { kind: OperatorKind::Call, .. })
        ));
        let yt = ctx.child(y, 0).unwrap();
        assert_eq!(render_short(&ctx, yt), "int<64>");
    }

    #[test]
    fn tuple_literal_gets_type_from_elements() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let x = b.expr_name("x");
        let one = b.expr_int(1);
        let tuple = b.ctor_tuple(vec![x, one]);
        let te = b.expr_ctor(tuple);
        let at = b.type_auto();
        let aq = b.qualified(at, Constness::Mutable);
        let t = b.decl_global("t", aq, Some(te), Linkage::Private);
        let bt = b.type_bool();
        let bq = b.qualified(bt, Constness::Mutable);
        let x_decl = b.decl_global("x", bq, None, Linkage::Private);
        let m = b.decl_module("m", vec![x_decl, t]);
        install(&mut ctx, m);

        settle(&mut ctx);
        let tt = ctx.child(t, 0).unwrap();
        assert_eq!(render_short(&ctx, tt), "tuple<bool, int<64>>");
    }

    #[test]
    fn method_binds_to_struct() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let st = b.type_struct(vec![]);
        let sq = b.qualified(st, Constness::Mutable);
        let s = b.decl_type("S", sq, Linkage::Public);
        let vt = b.type_void();
        let vq = b.qualified(vt, Constness::Const);
        let this = b.expr_keyword(Keyword::SelfValue);
        let stmt = b.stmt_expression(this);
        let body = b.stmt_block(vec![stmt]);
        let method = b.decl_function("S::m", vq, vec![], Some(body), Linkage::Public);
        let m = b.decl_module("m", vec![s, method]);
        install(&mut ctx, m);

        settle(&mut ctx);
        let linked = match ctx.kind(method).as_declaration().map(|d| &d.kind) {
            Some(DeclKind::Function(info)) => info.linked_type.map(|l| l.node),
            _ => None,
        };
        assert_eq!(linked, Some(s));
        assert!(ctx.expression_type(this).is_some());
    }
}
