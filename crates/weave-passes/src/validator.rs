//! GPIL validation.
//!
//! Pre-validation checks what can be decided on the raw AST; post-validation
//! turns whatever the fixed point left unresolved into user errors.

use std::collections::HashMap;

use weave_ast::{
    AstContext, Category, DeclKind, Expression, NodeKind, NodeRef, OperatorKind, Statement,
    TypeKind, Visitor, render_short, render_type, visitor,
};
use weave_core::{CompilationPhase, Symbol};

use crate::coercer::CoercionStyle;
use crate::normalizer::UNDEF;
use crate::operator::{self, Selection, function_parameters};
use crate::plugin::Session;

weave_core::symbols! {
    SELF => "self",
}

// ============================================================================
// Pre-validation
// ============================================================================

pub fn validate_pre(ctx: &mut AstContext, root: NodeRef) {
    let mut errors: Vec<(NodeRef, String)> = Vec::new();
    for (n, _) in ctx.pre_order(root) {
        match ctx.kind(n) {
            NodeKind::Declaration(d) => {
                if d.id == SELF() {
                    errors.push((n, "'self' is a reserved ID".to_string()));
                }
                if let DeclKind::EnumLabel { implicit: false, .. } = d.kind {
                    if d.id == UNDEF() {
                        errors.push((n, "enum label 'Undef' is reserved".to_string()));
                    }
                }
                if matches!(d.kind, DeclKind::Module) {
                    let decls: Vec<_> = ctx.children_of(n, 0, Category::Declaration).collect();
                    duplicates(ctx, &decls, &mut errors);
                }
            }
            NodeKind::Statement(Statement::Block) => {
                let locals: Vec<_> = ctx
                    .children(n)
                    .iter()
                    .flatten()
                    .filter(|&&s| matches!(ctx.kind(s), NodeKind::Statement(Statement::Declaration)))
                    .filter_map(|&s| ctx.child(s, 0))
                    .collect();
                duplicates(ctx, &locals, &mut errors);
            }
            NodeKind::Type(t) => match t.kind {
                TypeKind::Enum | TypeKind::Struct | TypeKind::Union => {
                    let members: Vec<_> = ctx.children_of(n, 0, Category::Declaration).collect();
                    duplicates(ctx, &members, &mut errors);
                }
                TypeKind::Function => {
                    let params: Vec<_> = ctx.children_of(n, 1, Category::Declaration).collect();
                    duplicates(ctx, &params, &mut errors);
                }
                _ => {}
            },
            _ => {}
        }
    }
    for (n, message) in errors {
        ctx.add_error(n, message, CompilationPhase::PreValidation);
    }
}

/// Report every declaration whose ID was already used among `decls`.
/// Functions may be overloaded and imports may repeat.
fn duplicates(ctx: &AstContext, decls: &[NodeRef], errors: &mut Vec<(NodeRef, String)>) {
    let mut seen: HashMap<Symbol, NodeRef> = HashMap::new();
    for &d in decls {
        let Some(decl) = ctx.kind(d).as_declaration() else {
            continue;
        };
        if matches!(decl.kind, DeclKind::Function(_) | DeclKind::ImportedModule { .. }) {
            continue;
        }
        if seen.insert(decl.id, d).is_some() {
            errors.push((d, format!("ID '{}' redefined", decl.id)));
        }
    }
}

// ============================================================================
// Post-validation
// ============================================================================

pub fn validate_post(ctx: &mut AstContext, session: &Session<'_>, root: NodeRef) {
    let mut v = PostValidator {
        session,
        errors: Vec::new(),
    };
    visitor::visit(&mut v, ctx, root, visitor::Order::Pre);
    for (n, message) in v.errors {
        ctx.add_error(n, message, CompilationPhase::PostValidation);
    }
}

struct PostValidator<'s, 'a> {
    session: &'s Session<'a>,
    errors: Vec<(NodeRef, String)>,
}

impl PostValidator<'_, '_> {
    fn error(&mut self, n: NodeRef, message: impl Into<String>) {
        self.errors.push((n, message.into()));
    }

    fn is_callee(ctx: &AstContext, n: NodeRef) -> bool {
        ctx.index_in_parent(n) == Some(0)
            && ctx.parent(n).is_some_and(|p| {
                matches!(
                    ctx.kind(p),
                    NodeKind::Expression(Expression::UnresolvedOperator(OperatorKind::Call))
                )
            })
    }

    /// The expression in slot `index` of `n` must convert to `dst`.
    fn check_coercion(&mut self, ctx: &AstContext, n: NodeRef, index: usize, dst: NodeRef, style: CoercionStyle) {
        let Some(e) = ctx.child(n, index) else {
            return;
        };
        let Some(src) = ctx.expression_type(e) else {
            return;
        };
        if !ctx.is_resolved(src) || !ctx.is_resolved(dst) {
            return;
        }
        let coercer = self.session.coercer();
        match coercer.coerce_expression(ctx, e, dst, style) {
            Ok(_) => {}
            Err(no_match) => {
                let mut message = format!(
                    "cannot coerce expression '{}' of type '{}' to type '{}'",
                    render_short(ctx, e),
                    render_type(ctx, src),
                    render_type(ctx, dst)
                );
                if let Some(reason) = no_match.reason {
                    message.push_str(&format!(" ({reason})"));
                }
                self.error(e, message);
            }
        }
    }

    fn check_declared_value(&mut self, ctx: &AstContext, n: NodeRef) {
        let Some(qt) = ctx.child(n, 0) else {
            return;
        };
        let auto = ctx
            .unqualified(qt)
            .and_then(|u| ctx.type_kind(u))
            .is_some_and(|k| *k == TypeKind::Auto);
        if auto {
            let id = ctx.kind(n).as_declaration().map(|d| d.id.to_string()).unwrap_or_default();
            self.error(n, format!("cannot infer type of '{id}'"));
            return;
        }
        self.check_coercion(ctx, n, 1, qt, CoercionStyle::ASSIGNMENT);
    }
}

impl Visitor for PostValidator<'_, '_> {
    fn visit_expr_name(&mut self, ctx: &mut AstContext, n: NodeRef) {
        let NodeKind::Expression(Expression::Name { id, resolved }) = ctx.kind(n) else {
            return;
        };
        if resolved.is_some() || Self::is_callee(ctx, n) {
            return;
        }
        let id = id.clone();
        let found = ctx.lookup(n, &id);
        if found.is_empty() {
            self.error(n, format!("unknown ID '{id}'"));
        } else {
            self.error(n, format!("ID '{id}' does not refer to a value"));
        }
    }

    fn visit_type_name(&mut self, ctx: &mut AstContext, n: NodeRef) {
        if let Some(TypeKind::Name { id, resolved: None }) = ctx.type_kind(n) {
            let message = format!("unknown type '{id}'");
            self.error(n, message);
        }
    }

    fn visit_expr_unresolved_operator(&mut self, ctx: &mut AstContext, n: NodeRef) {
        let NodeKind::Expression(Expression::UnresolvedOperator(kind)) = ctx.kind(n) else {
            return;
        };
        let kind = *kind;
        let coercer = self.session.coercer();
        let selection = operator::select(ctx, &coercer, self.session.registry, n);
        let rendered = render_short(ctx, n);
        let message = match selection {
            // Inner errors explain this one.
            Selection::NotReady => return,
            Selection::Selected(_) => format!("operator '{rendered}' could not be resolved"),
            Selection::Ambiguous(candidates) => format!(
                "operator usage is ambiguous: {rendered} (candidates: {})",
                candidates.join(", ")
            ),
            Selection::NoMatch if kind == OperatorKind::Call => {
                let callee = ctx.child(n, 0).map(|c| render_short(ctx, c)).unwrap_or_default();
                let known = ctx
                    .child(n, 0)
                    .and_then(|c| match ctx.kind(c) {
                        NodeKind::Expression(Expression::Name { id, .. }) => Some(id.clone()),
                        _ => None,
                    })
                    .is_some_and(|id| !ctx.lookup(n, &id).is_empty());
                if known {
                    format!("call does not match any function: {rendered}")
                } else {
                    format!("unknown function '{callee}'")
                }
            }
            Selection::NoMatch => format!("unsupported operator usage: {rendered}"),
        };
        self.error(n, message);
    }

    fn visit_expr_resolved_operator(&mut self, ctx: &mut AstContext, n: NodeRef) {
        let NodeKind::Expression(Expression::ResolvedOperator { kind, target }) = ctx.kind(n) else {
            return;
        };
        let (kind, target) = (*kind, *target);
        if let weave_ast::OperatorTarget::Function(link) = target {
            let Some(function) = ctx.link_target(link) else {
                self.error(n, "call target no longer exists");
                return;
            };
            let first_arg = if kind == OperatorKind::MemberCall { 3 } else { 2 };
            for (k, param) in function_parameters(ctx, function).into_iter().enumerate() {
                if let Some(pt) = ctx.child(param, 0) {
                    self.check_coercion(ctx, n, first_arg + k, pt, CoercionStyle::FUNCTION_CALL);
                }
            }
        }
    }

    fn visit_expr_assign(&mut self, ctx: &mut AstContext, n: NodeRef) {
        let Some(target) = ctx.child(n, 0) else {
            return;
        };
        let Some(tt) = ctx.expression_type(target) else {
            return;
        };
        if ctx.qualifiers(tt).is_some_and(|q| q.is_const()) {
            self.error(n, format!("cannot assign to constant '{}'", render_short(ctx, target)));
            return;
        }
        self.check_coercion(ctx, n, 1, tt, CoercionStyle::ASSIGNMENT);
    }

    fn visit_constant(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.check_declared_value(ctx, n);
    }

    fn visit_global_variable(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.check_declared_value(ctx, n);
    }

    fn visit_local_variable(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.check_declared_value(ctx, n);
    }

    fn visit_function(&mut self, ctx: &mut AstContext, n: NodeRef) {
        let Some(DeclKind::Function(info)) = ctx.kind(n).as_declaration().map(|d| &d.kind) else {
            return;
        };
        let Some(link) = info.linked_type else {
            return;
        };
        let is_struct = ctx
            .link_target(link)
            .and_then(|d| ctx.declared_type(d))
            .is_some_and(|t| matches!(ctx.type_kind(t), Some(TypeKind::Struct)));
        if !is_struct {
            let id = ctx.kind(n).as_declaration().map(|d| d.id.to_string()).unwrap_or_default();
            self.error(n, format!("method '{id}' is not declared on a struct type"));
        }
    }

    fn visit_stmt_return(&mut self, ctx: &mut AstContext, n: NodeRef) {
        let function = ctx.find_ancestor(n, |k| {
            matches!(k.as_declaration().map(|d| &d.kind), Some(DeclKind::Function(_)))
        });
        let result = function
            .and_then(|f| ctx.child(f, 0))
            .and_then(|q| ctx.unqualified(q))
            .and_then(|ft| ctx.child(ft, 0));
        let Some(result) = result else {
            return;
        };
        let returns_void = matches!(ctx.followed_kind(result), Some(TypeKind::Void));
        match (ctx.child(n, 0), returns_void) {
            (Some(_), true) => self.error(n, "void function cannot return a value"),
            (None, false) => self.error(n, "function must return a value"),
            (Some(_), false) => self.check_coercion(ctx, n, 0, result, CoercionStyle::ASSIGNMENT),
            (None, true) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use weave_ast::{Builder, Constness, Linkage};

    use super::*;
    use crate::driver::DriverOptions;
    use crate::operator::OperatorRegistry;

    fn messages(ctx: &AstContext) -> Vec<String> {
        ctx.collect_diagnostics(ctx.root())
            .into_iter()
            .map(|d| d.message)
            .collect()
    }

    #[test]
    fn reserved_undef_label() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let e = b.type_enum(vec![(Symbol::new("A"), None), (Symbol::new("Undef"), None)]);
        let q = b.qualified(e, Constness::Const);
        let t = b.decl_type("E", q, Linkage::Public);
        let m = b.decl_module("m", vec![t]);
        let root = ctx.root();
        ctx.add_child(root, Some(m));

        validate_pre(&mut ctx, root);
        assert_eq!(messages(&ctx), vec!["enum label 'Undef' is reserved"]);
    }

    #[test]
    fn duplicate_globals_but_not_functions() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let mut decls = Vec::new();
        for _ in 0..2 {
            let t = b.type_bool();
            let q = b.qualified(t, Constness::Mutable);
            decls.push(b.decl_global("x", q, None, Linkage::Private));
            let v = b.type_void();
            let vq = b.qualified(v, Constness::Const);
            decls.push(b.decl_function("f", vq, vec![], None, Linkage::Public));
        }
        let m = b.decl_module("m", decls);
        let root = ctx.root();
        ctx.add_child(root, Some(m));

        validate_pre(&mut ctx, root);
        assert_eq!(messages(&ctx), vec!["ID 'x' redefined"]);
    }

    #[test]
    fn unknown_name_after_fixed_point() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let y = b.expr_name("y");
        let t = b.type_bool();
        let q = b.qualified(t, Constness::Mutable);
        let x = b.decl_global("x", q, Some(y), Linkage::Private);
        let m = b.decl_module("m", vec![x]);
        let root = ctx.root();
        ctx.add_child(root, Some(m));

        let registry = OperatorRegistry::builtin();
        let options = DriverOptions::default();
        let session = Session {
            registry: &registry,
            plugins: &[],
            options: &options,
        };
        crate::scope_builder::build_scopes(&mut ctx, root);
        validate_post(&mut ctx, &session, root);
        assert_eq!(messages(&ctx), vec!["unknown ID 'y'"]);
    }
}
