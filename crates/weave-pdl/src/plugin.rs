//! The PDL plugin.

use std::any::Any;

use weave_ast::{AstContext, DeclKind, NodeRef, TypeKind};
use weave_core::{CompilationPhase, DebugStream};
use weave_passes::{CoercionStyle, NoMatch, Plugin, Session, unifier};

use crate::grammar::{Grammar, build_grammar};
use crate::{resolver, validator};

/// Front end for `.pdl` sources. Runs before GPIL so that unit scopes
/// exist by the time GPIL resolves names inside unit bodies.
#[derive(Debug, Default)]
pub struct PdlPlugin {
    grammars: Vec<Grammar>,
}

impl PdlPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grammars built by the last transform, one per unit type.
    pub fn grammars(&self) -> &[Grammar] {
        &self.grammars
    }

    /// The grammar of the unit with canonical ID `id`.
    pub fn grammar(&self, id: &str) -> Option<&Grammar> {
        self.grammars.iter().find(|g| g.name() == id)
    }
}

fn unit_declarations(ctx: &AstContext, root: NodeRef) -> Vec<NodeRef> {
    ctx.pre_order(root)
        .map(|(n, _)| n)
        .filter(|&n| {
            ctx.kind(n)
                .as_declaration()
                .is_some_and(|d| d.kind == DeclKind::Type)
        })
        .filter(|&d| {
            ctx.declared_type(d)
                .is_some_and(|t| matches!(ctx.type_kind(t), Some(TypeKind::Unit)))
        })
        .collect()
}

impl Plugin for PdlPlugin {
    fn component(&self) -> &'static str {
        "PDL"
    }

    fn order(&self) -> i32 {
        5
    }

    fn extension(&self) -> &'static str {
        ".pdl"
    }

    fn build_scopes(&self, ctx: &mut AstContext, _session: &Session<'_>, root: NodeRef) {
        resolver::build_unit_scopes(ctx, root);
    }

    /// A unit converts to a reference to itself when assigned or passed.
    fn coerce_type(
        &self,
        ctx: &AstContext,
        src: NodeRef,
        dst: NodeRef,
        style: CoercionStyle,
    ) -> Option<Result<(), NoMatch>> {
        if !style.intersects(CoercionStyle::ASSIGNMENT | CoercionStyle::FUNCTION_CALL) {
            return None;
        }
        let s = ctx.follow(src)?;
        if !matches!(ctx.type_kind(s), Some(TypeKind::Unit)) {
            return None;
        }
        let d = ctx.follow(dst)?;
        if !matches!(
            ctx.type_kind(d),
            Some(TypeKind::ValueRef | TypeKind::StrongRef)
        ) {
            return None;
        }
        let target = ctx.element_type(d).and_then(|e| ctx.follow(e))?;
        unifier::types_equal(ctx, s, target).then_some(Ok(()))
    }

    fn resolve(&self, ctx: &mut AstContext, session: &Session<'_>, root: NodeRef) -> bool {
        resolver::resolve(ctx, session, root)
    }

    fn validate_pre(&self, ctx: &mut AstContext, root: NodeRef) {
        validator::validate_pre(ctx, root);
    }

    fn validate_post(&self, ctx: &mut AstContext, _session: &Session<'_>, root: NodeRef) {
        validator::validate_post(ctx, root);
    }

    fn transform(&mut self, ctx: &mut AstContext, root: NodeRef) -> bool {
        self.grammars.clear();
        for decl in unit_declarations(ctx, root) {
            let Some(grammar) = build_grammar(ctx, decl) else {
                continue;
            };
            DebugStream::PdlGrammar.emit(&format!(
                "{}: {} productions",
                grammar.name(),
                grammar.len()
            ));
            for error in grammar.errors() {
                let n = error.field.unwrap_or(decl);
                ctx.add_error(n, error.message.clone(), CompilationPhase::Grammar);
            }
            self.grammars.push(grammar);
        }
        !self.grammars.is_empty()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use weave_ast::{Builder, Constness, Linkage};
    use weave_core::Symbol;
    use weave_passes::Coercer;

    use super::*;

    /// `type U = unit { x: uint<8>; }` with canonical IDs stamped; returns
    /// the unit type and its declaration.
    fn unit(ctx: &mut AstContext) -> (NodeRef, NodeRef) {
        let mut b = Builder::new(ctx);
        let t = b.type_unsigned_integer(8);
        let q = b.qualified(t, Constness::Mutable);
        let x = b.unit_field(Some(Symbol::new("x")), q, None, None);
        let unit = b.type_unit(vec![], vec![x]);
        let uq = b.qualified(unit, Constness::Mutable);
        let decl = b.decl_type("U", uq, Linkage::Public);
        let m = b.decl_module("m", vec![decl]);
        let root = ctx.root();
        ctx.add_child(root, Some(m));
        if let weave_ast::NodeKind::Type(ty) = ctx.kind_mut(unit) {
            ty.type_id = Some(Symbol::new("m::U"));
        }
        (unit, decl)
    }

    #[test]
    fn unit_coerces_to_reference_of_itself() {
        let mut ctx = AstContext::new();
        let (unit, decl) = unit(&mut ctx);
        let mut b = Builder::new(&mut ctx);
        let name = b.type_name("U");
        let value_ref = b.type_value_ref(name);
        let other = b.type_unsigned_integer(8);
        let other_ref = b.type_strong_ref(other);
        let link = ctx.link_to(decl);
        ctx.set_resolved(name, link);

        let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(PdlPlugin::new())];
        let coercer = Coercer::new(&plugins);
        assert!(
            coercer
                .coerce_type(&ctx, unit, value_ref, CoercionStyle::ASSIGNMENT)
                .is_ok()
        );
        assert!(
            coercer
                .coerce_type(&ctx, unit, value_ref, CoercionStyle::CONTEXTUAL_CONVERSION)
                .is_err()
        );
        assert!(
            coercer
                .coerce_type(&ctx, unit, other_ref, CoercionStyle::FUNCTION_CALL)
                .is_err()
        );
    }

    #[test]
    fn transform_builds_one_grammar_per_unit() {
        let mut ctx = AstContext::new();
        unit(&mut ctx);
        let mut plugin = PdlPlugin::new();
        let root = ctx.root();
        assert!(plugin.transform(&mut ctx, root));
        assert_eq!(plugin.grammars().len(), 1);
        let grammar = plugin.grammar("m::U").unwrap();
        assert!(grammar.find("m::U::x").is_some());

        // Idempotent.
        plugin.transform(&mut ctx, root);
        assert_eq!(plugin.grammars().len(), 1);
    }
}
