//! Scope construction and canonical IDs for GPIL nodes.
//!
//! Scopes are rebuilt from scratch every round, so they always reflect the
//! current shape of the AST. Canonical IDs, once assigned, never change:
//! declaration links capture them to detect stale targets.

use std::collections::HashSet;

use weave_ast::{
    AstContext, Category, DeclKind, Mutator, NodeKind, NodeRef, Statement, TypeKind, render,
};
use weave_core::{DebugStream, QualifiedId, Symbol};

/// Populate the scopes of every module, function, block and declared
/// compound type beneath `root`.
pub fn build_scopes(ctx: &mut AstContext, root: NodeRef) {
    let nodes: Vec<NodeRef> = ctx.pre_order(root).map(|(n, _)| n).collect();
    for &n in &nodes {
        match ctx.kind(n) {
            NodeKind::Declaration(d) => match d.kind {
                DeclKind::Module => module_scope(ctx, n),
                DeclKind::Function(_) => function_scope(ctx, n),
                _ => {}
            },
            NodeKind::Statement(Statement::Block) => block_scope(ctx, n),
            NodeKind::Type(t) => match t.kind {
                TypeKind::Enum | TypeKind::Struct | TypeKind::Union => {
                    let members: Vec<_> = ctx.children_of(n, 0, Category::Declaration).collect();
                    insert_all(ctx, n, &members);
                }
                _ => {}
            },
            _ => {}
        }
    }
    // Methods need the struct scopes built above.
    for n in nodes {
        register_method(ctx, n);
    }
}

fn decl_id(ctx: &AstContext, decl: NodeRef) -> Option<Symbol> {
    ctx.kind(decl).as_declaration().map(|d| d.id)
}

fn insert_all(ctx: &mut AstContext, owner: NodeRef, decls: &[NodeRef]) {
    let scope = ctx.get_or_create_scope(owner);
    for &d in decls {
        if let Some(id) = decl_id(ctx, d) {
            ctx.scope_mut(scope).insert(id, d);
        }
    }
}

fn module_scope(ctx: &mut AstContext, module: NodeRef) {
    let decls: Vec<_> = ctx.children_of(module, 0, Category::Declaration).collect();
    insert_all(ctx, module, &decls);
    let scope = ctx.get_or_create_scope(module);
    if let Some(id) = decl_id(ctx, module) {
        ctx.scope_mut(scope).insert(id, module);
    }
    for d in decls {
        let imported = match ctx.kind(d).as_declaration().map(|d| &d.kind) {
            Some(DeclKind::ImportedModule { module }) => *module,
            _ => continue,
        };
        if let Some(target) = ctx.find_module(imported) {
            ctx.scope_mut(scope).add_import(target);
        }
    }
}

fn function_scope(ctx: &mut AstContext, function: NodeRef) {
    let params = crate::operator::function_parameters(ctx, function);
    insert_all(ctx, function, &params);
}

fn block_scope(ctx: &mut AstContext, block: NodeRef) {
    let locals: Vec<_> = ctx
        .children(block)
        .iter()
        .flatten()
        .filter(|&&s| matches!(ctx.kind(s), NodeKind::Statement(Statement::Declaration)))
        .filter_map(|&s| ctx.child(s, 0))
        .collect();
    insert_all(ctx, block, &locals);
}

/// A function declared as `S::m` is also visible as `m` in the scope of
/// struct `S`, where member calls find it.
fn register_method(ctx: &mut AstContext, function: NodeRef) {
    let id = match ctx.kind(function).as_declaration() {
        Some(d) if matches!(d.kind, DeclKind::Function(_)) && d.id.is_qualified() => d.id,
        _ => return,
    };
    let id = QualifiedId::from(id);
    let Some(owner_id) = QualifiedId::new(id.parent().iter().copied()) else {
        return;
    };
    let Some(from) = ctx.parent(function) else {
        return;
    };
    let owners = ctx.lookup(from, &owner_id);
    for owner in owners {
        let Some(t) = ctx.declared_type(owner) else {
            continue;
        };
        if matches!(ctx.type_kind(t), Some(TypeKind::Struct)) {
            let scope = ctx.get_or_create_scope(t);
            ctx.scope_mut(scope).insert(id.name(), function);
        }
    }
}

// ============================================================================
// Canonical IDs
// ============================================================================

/// Give every declaration beneath `root` a globally unique canonical ID
/// built from its enclosing modules, types and functions, and stamp
/// declared compound types with their type ID. Returns true if anything
/// was assigned.
pub fn assign_canonical_ids(ctx: &mut AstContext, root: NodeRef) -> bool {
    let mut mutator = Mutator::new(DebugStream::Scopes);
    let nodes: Vec<NodeRef> = ctx.pre_order(root).map(|(n, _)| n).collect();
    let mut taken: HashSet<Symbol> = nodes
        .iter()
        .filter_map(|&n| ctx.kind(n).as_declaration().and_then(|d| d.canonical_id))
        .collect();

    for n in nodes {
        let needs_id = ctx
            .kind(n)
            .as_declaration()
            .is_some_and(|d| d.canonical_id.is_none());
        if needs_id {
            let base = canonical_path(ctx, n);
            let mut id = Symbol::from_dynamic(&base);
            let mut suffix = 1;
            while taken.contains(&id) {
                id = Symbol::from_dynamic(&format!("{base}_{suffix}"));
                suffix += 1;
            }
            taken.insert(id);
            if let Some(d) = ctx.kind_mut(n).as_declaration_mut() {
                d.canonical_id = Some(id);
            }
            mutator.record_change(ctx, n, &format!("canonical ID {id}"));
        }
        stamp_type_id(ctx, &mut mutator, n);
    }
    mutator.is_modified()
}

fn canonical_path(ctx: &AstContext, decl: NodeRef) -> String {
    let mut segments: Vec<Symbol> = ctx
        .ancestors(decl)
        .filter_map(|a| match ctx.kind(a).as_declaration() {
            Some(d) if matches!(d.kind, DeclKind::Module | DeclKind::Type | DeclKind::Function(_)) => {
                Some(d.id)
            }
            _ => None,
        })
        .collect();
    segments.reverse();
    segments.extend(decl_id(ctx, decl));
    segments
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join("::")
}

fn stamp_type_id(ctx: &mut AstContext, mutator: &mut Mutator, decl: NodeRef) {
    let canonical = match ctx.kind(decl).as_declaration() {
        Some(d) if d.kind == DeclKind::Type => d.canonical_id,
        _ => None,
    };
    let (Some(id), Some(t)) = (canonical, ctx.declared_type(decl)) else {
        return;
    };
    let mut changed = false;
    if let NodeKind::Type(ty) = ctx.kind_mut(t) {
        let compound = matches!(
            ty.kind,
            TypeKind::Enum | TypeKind::Struct | TypeKind::Union | TypeKind::Unit
        );
        if compound && ty.type_id.is_none() {
            ty.type_id = Some(id);
            changed = true;
        }
    }
    if changed {
        mutator.record_change(ctx, t, &format!("type ID {id}"));
    }
}

/// Render the AST beneath `root` with every scope's contents, for the
/// scope dump.
pub fn dump_scopes(ctx: &AstContext, root: NodeRef) -> String {
    render(ctx, root, weave_ast::RenderOptions { include_scopes: true })
}

#[cfg(test)]
mod tests {
    use weave_ast::{Builder, Constness, Linkage, ParameterKind};

    use super::*;

    fn module_with_struct(ctx: &mut AstContext) -> (NodeRef, NodeRef, NodeRef) {
        let mut b = Builder::new(ctx);
        let it = b.type_signed_integer(32);
        let iq = b.qualified(it, Constness::Mutable);
        let field = b.decl_field("a", iq, None);
        let st = b.type_struct(vec![field]);
        let sq = b.qualified(st, Constness::Mutable);
        let s = b.decl_type("S", sq, Linkage::Public);

        let vt = b.type_void();
        let vq = b.qualified(vt, Constness::Const);
        let bt = b.type_bool();
        let bq = b.qualified(bt, Constness::Mutable);
        let p = b.decl_parameter("flag", bq, ParameterKind::In, None);
        let body = b.stmt_block(vec![]);
        let method = b.decl_function("S::m", vq, vec![p], Some(body), Linkage::Public);

        let m = b.decl_module("m", vec![s, method]);
        let root = ctx.root();
        ctx.add_child(root, Some(m));
        (m, s, method)
    }

    #[test]
    fn module_function_and_struct_scopes() {
        let mut ctx = AstContext::new();
        let (m, s, method) = module_with_struct(&mut ctx);
        let root = ctx.root();
        build_scopes(&mut ctx, root);

        let ms = ctx.node_scope(m).unwrap();
        assert_eq!(ctx.scope(ms).get(Symbol::new("S")), &[s]);
        assert_eq!(ctx.scope(ms).get(Symbol::new("m")), &[m]);

        let fs = ctx.node_scope(method).unwrap();
        assert_eq!(ctx.scope(fs).get(Symbol::new("flag")).len(), 1);

        let st = ctx.declared_type(s).unwrap();
        let ss = ctx.node_scope(st).unwrap();
        assert_eq!(ctx.scope(ss).get(Symbol::new("m")), &[method]);
        assert_eq!(ctx.scope(ss).get(Symbol::new("a")).len(), 1);
    }

    #[test]
    fn canonical_ids_follow_nesting() {
        let mut ctx = AstContext::new();
        let (m, s, method) = module_with_struct(&mut ctx);
        let root = ctx.root();
        assert!(assign_canonical_ids(&mut ctx, root));
        assert!(!assign_canonical_ids(&mut ctx, root));

        let canonical = |n: NodeRef| {
            ctx.kind(n)
                .as_declaration()
                .and_then(|d| d.canonical_id)
                .map(|id| id.to_string())
        };
        assert_eq!(canonical(m).as_deref(), Some("m"));
        assert_eq!(canonical(s).as_deref(), Some("m::S"));
        assert_eq!(canonical(method).as_deref(), Some("m::S::m"));
        let param = crate::operator::function_parameters(&ctx, method)[0];
        assert_eq!(canonical(param).as_deref(), Some("m::S::m::flag"));

        let st = ctx.declared_type(s).unwrap();
        assert_eq!(ctx.type_of_node(st).unwrap().type_id, Some(Symbol::new("m::S")));
    }

    #[test]
    fn duplicate_paths_get_suffixes() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let t1 = b.type_bool();
        let q1 = b.qualified(t1, Constness::Mutable);
        let x1 = b.decl_global("x", q1, None, Linkage::Private);
        let t2 = b.type_bool();
        let q2 = b.qualified(t2, Constness::Mutable);
        let x2 = b.decl_global("x", q2, None, Linkage::Private);
        let m = b.decl_module("m", vec![x1, x2]);
        let root = ctx.root();
        ctx.add_child(root, Some(m));

        assign_canonical_ids(&mut ctx, root);
        let id = |n: NodeRef| ctx.kind(n).as_declaration().and_then(|d| d.canonical_id);
        assert_eq!(id(x1), Some(Symbol::new("m::x")));
        assert_eq!(id(x2), Some(Symbol::new("m::x_1")));
    }
}
