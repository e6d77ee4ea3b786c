//! Source-like rendering of nodes for diagnostics and change lines.

use crate::{
    AstContext, Category, Ctor, DeclKind, Expression, NodeKind, NodeRef, OperatorKind, Statement,
    TypeKind, UnitItem,
};

/// One-line rendering of any node, e.g. `int<32>`, `x + 1` or
/// `local x: bool`.
pub fn render_short(ctx: &AstContext, n: NodeRef) -> String {
    match ctx.kind(n) {
        NodeKind::Root => "<root>".to_string(),
        NodeKind::Declaration(_) => render_declaration(ctx, n),
        NodeKind::Type(_) | NodeKind::QualifiedType(_) => render_type(ctx, n),
        NodeKind::Expression(_) => render_expression(ctx, n),
        NodeKind::Ctor(_) => render_ctor(ctx, n),
        NodeKind::Statement(_) => render_statement(ctx, n),
        NodeKind::Attribute { tag } => match ctx.child(n, 0) {
            Some(v) => format!("{tag}={}", render_short(ctx, v)),
            None => tag.to_string(),
        },
        NodeKind::AttributeSet => join(ctx, ctx.children(n).iter().flatten().copied(), " "),
        NodeKind::UnitItem(_) => render_unit_item(ctx, n),
    }
}

fn join(ctx: &AstContext, nodes: impl Iterator<Item = NodeRef>, sep: &str) -> String {
    nodes.map(|c| render_short(ctx, c)).collect::<Vec<_>>().join(sep)
}

fn opt(ctx: &AstContext, n: Option<NodeRef>) -> String {
    n.map(|n| render_short(ctx, n))
        .unwrap_or_else(|| "<null>".to_string())
}

/// Render a qualified or unqualified type. Qualifiers are not shown.
pub fn render_type(ctx: &AstContext, t: NodeRef) -> String {
    let Some(u) = ctx.unqualified(t) else {
        return "<null>".to_string();
    };
    let Some(ty) = ctx.type_of_node(u) else {
        return "<null>".to_string();
    };
    let category = ty.kind.category();
    if ty.wildcard {
        return format!("{category}<*>");
    }
    let child = |i| opt(ctx, ctx.child(u, i));
    match &ty.kind {
        TypeKind::SignedInteger { width } | TypeKind::UnsignedInteger { width } => {
            format!("{category}<{width}>")
        }
        TypeKind::List => {
            let elem = ctx.element_type(u);
            format!("list<{}>", opt(ctx, elem))
        }
        TypeKind::Iterator
        | TypeKind::Optional
        | TypeKind::Result
        | TypeKind::StrongRef
        | TypeKind::WeakRef
        | TypeKind::ValueRef => format!("{category}<{}>", child(0)),
        TypeKind::TypeOf => format!("type({})", child(0)),
        TypeKind::Tuple => format!("tuple<{}>", join(ctx, ctx.children(u).iter().flatten().copied(), ", ")),
        TypeKind::Name { id, .. } => id.to_string(),
        TypeKind::Library { cxx_name } => format!("library({cxx_name})"),
        TypeKind::Member { id } => format!("member({id})"),
        TypeKind::Enum | TypeKind::Struct | TypeKind::Union | TypeKind::Unit => match ty.type_id {
            Some(id) => id.to_string(),
            None => {
                let members: Vec<_> = ctx
                    .children(u)
                    .iter()
                    .flatten()
                    .copied()
                    .filter(|&c| !is_implicit_label(ctx, c))
                    .map(|c| render_short(ctx, c))
                    .collect();
                format!("{category} {{ {} }}", members.join(", "))
            }
        },
        TypeKind::Function => {
            let params = join(ctx, ctx.children_of(u, 1, Category::Declaration), ", ");
            format!("function({params}) -> {}", child(0))
        }
        _ => category.to_string(),
    }
}

fn is_implicit_label(ctx: &AstContext, n: NodeRef) -> bool {
    matches!(
        ctx.kind(n).as_declaration().map(|d| &d.kind),
        Some(DeclKind::EnumLabel { implicit: true, .. })
    )
}

fn render_declaration(ctx: &AstContext, n: NodeRef) -> String {
    let Some(d) = ctx.kind(n).as_declaration() else {
        return String::new();
    };
    let id = d.id;
    let ty = || opt(ctx, ctx.child(n, 0));
    match &d.kind {
        DeclKind::Module => format!("module {id}"),
        DeclKind::ImportedModule { module } => format!("import {module}"),
        DeclKind::Type => format!("type {id} = {}", ty()),
        DeclKind::Constant => format!("const {id}: {}", ty()),
        DeclKind::GlobalVariable => format!("global {id}: {}", ty()),
        DeclKind::LocalVariable => format!("local {id}: {}", ty()),
        DeclKind::Parameter { .. } | DeclKind::Field => format!("{id}: {}", ty()),
        DeclKind::Function(_) => {
            let ftype = ctx.child(n, 0).and_then(|q| ctx.unqualified(q));
            match ftype {
                Some(f) => {
                    let params = join(ctx, ctx.children_of(f, 1, Category::Declaration), ", ");
                    format!("function {id}({params}) -> {}", opt(ctx, ctx.child(f, 0)))
                }
                None => format!("function {id}"),
            }
        }
        DeclKind::EnumLabel { value, .. } => match value {
            Some(v) => format!("{id} = {v}"),
            None => id.to_string(),
        },
    }
}

fn render_expression(ctx: &AstContext, n: NodeRef) -> String {
    let Some(e) = ctx.kind(n).as_expression() else {
        return String::new();
    };
    let child = |i| opt(ctx, ctx.child(n, i));
    match e {
        Expression::Name { id, .. } => id.to_string(),
        Expression::Ctor => child(0),
        Expression::UnresolvedOperator(kind) => render_operator(ctx, n, *kind, 0),
        Expression::ResolvedOperator { kind, .. } => render_operator(ctx, n, *kind, 1),
        Expression::Coerced => child(0),
        Expression::Assign => format!("{} = {}", child(0), child(1)),
        Expression::LogicalAnd => format!("{} && {}", child(1), child(2)),
        Expression::LogicalOr => format!("{} || {}", child(1), child(2)),
        Expression::LogicalNot => format!("!{}", child(1)),
        Expression::Ternary => format!("{} ? {} : {}", child(0), child(1), child(2)),
        Expression::Member(id) => id.to_string(),
        Expression::TypeExpr => {
            let inner = ctx.child(n, 0).and_then(|q| ctx.element_type(q));
            opt(ctx, inner)
        }
        Expression::Keyword(k) => k.text().to_string(),
    }
}

/// Operands start at slot `first`.
fn render_operator(ctx: &AstContext, n: NodeRef, kind: OperatorKind, first: usize) -> String {
    let ops: Vec<_> = ctx.children(n)[first.min(ctx.children(n).len())..]
        .iter()
        .map(|&c| opt(ctx, c))
        .collect();
    let op = |i: usize| ops.get(i).cloned().unwrap_or_else(|| "<null>".to_string());
    let args = |from: usize| ops.get(from..).map(|a| a.join(", ")).unwrap_or_default();
    match kind {
        OperatorKind::Negate => format!("-{}", op(0)),
        OperatorKind::Size => format!("|{}|", op(0)),
        OperatorKind::Deref => format!("*{}", op(0)),
        OperatorKind::Index => format!("{}[{}]", op(0), op(1)),
        OperatorKind::Member => format!("{}.{}", op(0), op(1)),
        OperatorKind::MemberCall => format!("{}.{}({})", op(0), op(1), args(2)),
        OperatorKind::Call => format!("{}({})", op(0), args(1)),
        _ => format!("{} {} {}", op(0), kind.symbol(), op(1)),
    }
}

fn render_ctor(ctx: &AstContext, n: NodeRef) -> String {
    let Some(c) = ctx.kind(n).as_ctor() else {
        return String::new();
    };
    let values = || join(ctx, ctx.children(n)[1..].iter().flatten().copied(), ", ");
    match c {
        Ctor::Bool(b) => b.to_string(),
        Ctor::SignedInteger { value, .. } => value.to_string(),
        Ctor::UnsignedInteger { value, .. } => value.to_string(),
        Ctor::Real(v) => format!("{v:?}"),
        Ctor::String(s) => format!("{s:?}"),
        Ctor::Bytes(b) => format!("b\"{}\"", b.escape_ascii()),
        Ctor::Null => "Null".to_string(),
        Ctor::Optional => match ctx.child(n, 1) {
            Some(v) => format!("optional({})", render_short(ctx, v)),
            None => "optional()".to_string(),
        },
        Ctor::Result => format!("result({})", values()),
        Ctor::Error(msg) => format!("error({msg:?})"),
        Ctor::Tuple => format!("({})", values()),
        Ctor::List => format!("[{}]", values()),
        Ctor::Enum { label } => format!("{}::{label}", opt(ctx, ctx.child(n, 0))),
    }
}

fn render_statement(ctx: &AstContext, n: NodeRef) -> String {
    let NodeKind::Statement(s) = ctx.kind(n) else {
        return String::new();
    };
    let child = |i| opt(ctx, ctx.child(n, i));
    match s {
        Statement::Block => "{ ... }".to_string(),
        Statement::Expression => format!("{};", child(0)),
        Statement::Declaration => format!("{};", child(0)),
        Statement::Return => match ctx.child(n, 0) {
            Some(v) => format!("return {};", render_short(ctx, v)),
            None => "return;".to_string(),
        },
        Statement::If => format!("if ({}) ...", child(0)),
        Statement::While => format!("while ({}) ...", child(0)),
    }
}

fn render_unit_item(ctx: &AstContext, n: NodeRef) -> String {
    let Some(item) = ctx.kind(n).as_unit_item() else {
        return String::new();
    };
    let child = |i| opt(ctx, ctx.child(n, i));
    match item {
        UnitItem::Field { id, .. } => {
            let id = id.map(|i| i.to_string()).unwrap_or_default();
            match ctx.child(n, 1) {
                Some(lit) => format!("{id}: {}", render_short(ctx, lit)),
                None => format!("{id}: {}", child(0)),
            }
        }
        UnitItem::Variable { id } => format!("var {id}: {}", child(0)),
        UnitItem::Switch => match ctx.child(n, 0) {
            Some(e) => format!("switch ({})", render_short(ctx, e)),
            None => "switch".to_string(),
        },
        UnitItem::SwitchCase { default: true } => "* -> ...".to_string(),
        UnitItem::SwitchCase { default: false } => {
            format!("{} -> ...", join(ctx, ctx.children(n)[1..].iter().flatten().copied(), ", "))
        }
        UnitItem::Property { id } => match ctx.child(n, 0) {
            Some(v) => format!("{id} = {}", render_short(ctx, v)),
            None => id.to_string(),
        },
        UnitItem::Sink { id } => format!("sink {id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Builder, Constness, Linkage};

    #[test]
    fn renders_types() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let i = b.type_signed_integer(32);
        let iq = b.qualified(i, Constness::Mutable);
        let list = b.type_list(iq);
        let lq = b.qualified(list, Constness::Const);
        let u = b.type_unsigned_integer(8);
        let uq = b.qualified(u, Constness::Mutable);
        let opt = b.type_optional(uq);
        let oq = b.qualified(opt, Constness::Mutable);
        let tuple = b.type_tuple(vec![lq, oq]);
        let wildcard = b.type_wildcard(TypeKind::SignedInteger { width: 0 });

        assert_eq!(render_type(&ctx, tuple), "tuple<list<int<32>>, optional<uint<8>>>");
        assert_eq!(render_type(&ctx, wildcard), "int<*>");
    }

    #[test]
    fn renders_expressions_and_declarations() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let x = b.expr_name("x");
        let one = b.expr_int(1);
        let sum = b.expr_operator(OperatorKind::Sum, vec![x, one]);
        let arg = b.expr_bytes(b"ab\n".to_vec());
        let call = b.expr_call("f", vec![sum, arg]);
        let t = b.type_bool();
        let q = b.qualified(t, Constness::Mutable);
        let param = b.decl_parameter("flag", q, crate::ParameterKind::In, None);
        let r = b.type_void();
        let rq = b.qualified(r, Constness::Const);
        let func = b.decl_function("g", rq, vec![param], None, Linkage::Public);

        assert_eq!(render_short(&ctx, call), "f(x + 1, b\"ab\\n\")");
        assert_eq!(render_short(&ctx, func), "function g(flag: bool) -> void");
    }
}
