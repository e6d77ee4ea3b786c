//! Indented AST dumps for debugging.

use crate::printer::{render_short, render_type};
use crate::{AstContext, DeclKind, Expression, Linkage, NodeKind, NodeRef, Side, TypeKind};

#[derive(Clone, Copy, Debug, Default)]
pub struct RenderOptions {
    /// List each scope's entries beneath the node that owns it.
    pub include_scopes: bool,
}

/// Render the subtree at `root`, one line per node:
/// `- <class> <description> [<location>]`, indented by depth. Null child
/// slots show as `- <empty>`.
pub fn render(ctx: &AstContext, root: NodeRef, options: RenderOptions) -> String {
    let mut lines = Vec::new();
    render_node(ctx, Some(root), 0, options, &mut lines);
    lines.join("\n")
}

fn render_node(
    ctx: &AstContext,
    n: Option<NodeRef>,
    depth: usize,
    options: RenderOptions,
    lines: &mut Vec<String>,
) {
    let indent = "  ".repeat(depth);
    let Some(n) = n else {
        lines.push(format!("{indent}- <empty>"));
        return;
    };
    let mut line = format!("{indent}- {}", ctx.kind(n).class_name());
    let description = describe(ctx, n);
    if !description.is_empty() {
        line.push(' ');
        line.push_str(&description);
    }
    if let Some(loc) = ctx.location(n) {
        line.push_str(&format!(" [{loc}]"));
    }
    lines.push(line);

    if options.include_scopes {
        if let Some(scope) = ctx.node_scope(n) {
            let s = ctx.scope(scope);
            for (id, decls) in s.items() {
                for &d in decls {
                    lines.push(format!(
                        "{indent}  | {id} -> {} {}",
                        ctx.kind(d).class_name(),
                        render_short(ctx, d)
                    ));
                }
            }
            for &m in s.imports() {
                lines.push(format!("{indent}  | import {}", render_short(ctx, m)));
            }
        }
    }

    for &c in ctx.children(n) {
        render_node(ctx, c, depth + 1, options, lines);
    }
}

fn linkage_name(linkage: Linkage) -> &'static str {
    match linkage {
        Linkage::Public => "public",
        Linkage::Private => "private",
        Linkage::Imported => "imported",
        Linkage::Struct => "struct",
    }
}

fn describe(ctx: &AstContext, n: NodeRef) -> String {
    match ctx.kind(n) {
        NodeKind::Declaration(d) => {
            let mut props = vec![linkage_name(d.linkage).to_string()];
            if let Some(cid) = d.canonical_id {
                props.push(format!("canonical={cid}"));
            }
            if let DeclKind::EnumLabel { value: Some(v), .. } = d.kind {
                props.push(format!("value={v}"));
            }
            format!("{} ({})", d.id, props.join(", "))
        }
        NodeKind::Type(t) => {
            let mut text = render_type(ctx, n);
            if let TypeKind::Name { resolved, .. } = &t.kind {
                text.push_str(if resolved.is_some() { " (resolved)" } else { " (unresolved)" });
            }
            if let Some(u) = &t.unification {
                text.push_str(&format!(" [unified={u}]"));
            }
            text
        }
        NodeKind::QualifiedType(q) => {
            let constness = if q.is_const() { "const" } else { "mutable" };
            let side = match q.side {
                Side::Lhs => "lhs",
                Side::Rhs => "rhs",
            };
            format!("{constness} {side}")
        }
        NodeKind::Expression(Expression::Name { id, resolved }) => {
            let state = if resolved.is_some() { "resolved" } else { "unresolved" };
            format!("{id} ({state})")
        }
        NodeKind::Statement(_) | NodeKind::AttributeSet | NodeKind::Root => String::new(),
        _ => render_short(ctx, n),
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::{Builder, Constness};

    #[test]
    fn render_module() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let t = b.type_bool();
        let q = b.qualified(t, Constness::Mutable);
        let init = b.expr_bool(true);
        let global = b.decl_global("g", q, Some(init), Linkage::Public);
        let module = b.decl_module("m", vec![global]);

        let text = render(&ctx, module, RenderOptions::default());
        assert_snapshot!(text, @r"
        - declaration::Module m (public)
          - declaration::GlobalVariable g (public)
            - QualifiedType mutable lhs
              - type::Bool bool
            - expression::Ctor true
              - ctor::Bool true
                - QualifiedType const rhs
                  - type::Bool bool
        ");
    }

    #[test]
    fn render_null_slots_and_scopes() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let t = b.type_bool();
        let q = b.qualified(t, Constness::Mutable);
        let local = b.decl_local("x", q, None);
        let stmt = b.stmt_declaration(local);
        let block = b.stmt_block(vec![stmt]);
        let scope = ctx.get_or_create_scope(block);
        ctx.scope_mut(scope).insert(weave_core::Symbol::new("x"), local);

        let text = render(&ctx, block, RenderOptions { include_scopes: true });
        assert_snapshot!(text, @r"
        - statement::Block
          | x -> declaration::LocalVariable local x: bool
          - statement::Declaration
            - declaration::LocalVariable x (private)
              - QualifiedType mutable lhs
                - type::Bool bool
              - <empty>
        ");
    }
}
