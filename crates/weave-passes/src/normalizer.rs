//! Canonicalisation of enum types.
//!
//! Labels without an explicit value are numbered after their predecessor,
//! every enum receives the implicit `Undef = -1` label, and labels are
//! linked back to the declaration of their enum.

use std::collections::HashSet;

use weave_ast::{AstContext, Builder, Category, DeclKind, Mutator, NodeKind, NodeRef, TypeKind, visitor};
use weave_core::{DebugStream, Symbol};

weave_core::symbols! {
    UNDEF => "Undef",
}

/// Value of the implicit `Undef` label.
pub const UNDEF_VALUE: i64 = -1;

/// Normalize every enum beneath `root`. Returns true if anything changed.
pub fn normalize(ctx: &mut AstContext, root: NodeRef) -> bool {
    let mut mutator = Mutator::new(DebugStream::Normalizer);
    visitor::walk(ctx, root, visitor::Order::Pre, |ctx, n| {
        if matches!(ctx.type_kind(n), Some(TypeKind::Enum)) {
            normalize_enum(ctx, &mut mutator, n);
        }
    });
    mutator.is_modified()
}

fn labels(ctx: &AstContext, enum_type: NodeRef) -> Vec<NodeRef> {
    ctx.children_of(enum_type, 0, Category::Declaration)
        .filter(|&l| {
            matches!(
                ctx.kind(l).as_declaration().map(|d| &d.kind),
                Some(DeclKind::EnumLabel { .. })
            )
        })
        .collect()
}

fn normalize_enum(ctx: &mut AstContext, mutator: &mut Mutator, enum_type: NodeRef) {
    let owner = ctx
        .parent(enum_type)
        .and_then(|qt| ctx.parent(qt))
        .filter(|&d| ctx.declared_type(d) == Some(enum_type))
        .filter(|&d| ctx.kind(d).as_declaration().is_some_and(|d| d.canonical_id.is_some()));
    let owner_link = owner.map(|d| ctx.link_to(d));

    let mut previous = -1;
    let mut has_undef = false;
    for label in labels(ctx, enum_type) {
        let mut numbered = None;
        let mut linked = false;
        if let Some(d) = ctx.kind_mut(label).as_declaration_mut() {
            let id = d.id;
            if let DeclKind::EnumLabel {
                value,
                implicit,
                enum_type: link,
            } = &mut d.kind
            {
                if *implicit || id == UNDEF() {
                    has_undef = true;
                }
                if !*implicit {
                    match value {
                        Some(v) => previous = *v,
                        None => {
                            previous += 1;
                            *value = Some(previous);
                            numbered = Some(previous);
                        }
                    }
                }
                if link.is_none() && owner_link.is_some() {
                    *link = owner_link;
                    linked = true;
                }
            }
        }
        if let Some(v) = numbered {
            mutator.record_change(ctx, label, &format!("numbered {v}"));
        }
        if linked {
            mutator.record_change(ctx, label, "linked to enum");
        }
    }

    if !has_undef {
        let location = ctx.location(enum_type);
        let mut b = Builder::new(ctx);
        b.set_location(location);
        let undef = b.decl_enum_label(UNDEF(), Some(UNDEF_VALUE), true);
        ctx.add_child(enum_type, Some(undef));
        mutator.record_change(ctx, enum_type, "added implicit Undef label");
    }
}

/// The labels of an enum with duplicate values removed; the first label
/// of each value wins.
pub fn unique_labels(ctx: &AstContext, enum_type: NodeRef) -> Vec<NodeRef> {
    let mut seen = HashSet::new();
    labels(ctx, enum_type)
        .into_iter()
        .filter(|&l| {
            let value = match ctx.kind(l).as_declaration().map(|d| &d.kind) {
                Some(DeclKind::EnumLabel { value, .. }) => *value,
                _ => None,
            };
            seen.insert(value)
        })
        .collect()
}

/// The value of a numbered label.
pub fn label_value(ctx: &AstContext, label: NodeRef) -> Option<i64> {
    match ctx.kind(label) {
        NodeKind::Declaration(d) => match d.kind {
            DeclKind::EnumLabel { value, .. } => value,
            _ => None,
        },
        _ => None,
    }
}

/// The label ids of an enum, in order.
pub fn label_ids(ctx: &AstContext, enum_type: NodeRef) -> Vec<Symbol> {
    labels(ctx, enum_type)
        .into_iter()
        .filter_map(|l| ctx.kind(l).as_declaration().map(|d| d.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use weave_ast::{Builder, Constness, Linkage};

    use super::*;

    fn color_enum(ctx: &mut AstContext) -> (NodeRef, NodeRef) {
        let mut b = Builder::new(ctx);
        let e = b.type_enum(vec![
            (Symbol::new("Red"), None),
            (Symbol::new("Green"), Some(5)),
            (Symbol::new("Blue"), None),
            (Symbol::new("Teal"), Some(6)),
        ]);
        let q = b.qualified(e, Constness::Const);
        let decl = b.decl_type("Color", q, Linkage::Public);
        (decl, e)
    }

    #[test]
    fn labels_are_numbered_and_undef_added() {
        let mut ctx = AstContext::new();
        let (decl, e) = color_enum(&mut ctx);
        assert!(normalize(&mut ctx, decl));
        assert!(!normalize(&mut ctx, decl));

        let values: Vec<_> = labels(&ctx, e)
            .into_iter()
            .map(|l| label_value(&ctx, l))
            .collect();
        assert_eq!(values, vec![Some(0), Some(5), Some(6), Some(6), Some(-1)]);
        let ids: Vec<_> = label_ids(&ctx, e).iter().map(|s| s.to_string()).collect();
        assert_eq!(ids, vec!["Red", "Green", "Blue", "Teal", "Undef"]);
    }

    #[test]
    fn unique_labels_keep_first_of_each_value() {
        let mut ctx = AstContext::new();
        let (decl, e) = color_enum(&mut ctx);
        normalize(&mut ctx, decl);
        let unique: Vec<_> = unique_labels(&ctx, e)
            .into_iter()
            .filter_map(|l| ctx.kind(l).as_declaration().map(|d| d.id.to_string()))
            .collect();
        assert_eq!(unique, vec!["Red", "Green", "Blue", "Undef"]);
    }

    #[test]
    fn labels_link_once_enum_has_canonical_id() {
        let mut ctx = AstContext::new();
        let (decl, e) = color_enum(&mut ctx);
        normalize(&mut ctx, decl);
        if let Some(d) = ctx.kind_mut(decl).as_declaration_mut() {
            d.canonical_id = Some(Symbol::new("m::Color"));
        }
        assert!(normalize(&mut ctx, decl));
        let first = labels(&ctx, e)[0];
        let link = match ctx.kind(first).as_declaration().map(|d| &d.kind) {
            Some(DeclKind::EnumLabel { enum_type, .. }) => *enum_type,
            _ => None,
        };
        assert_eq!(link.map(|l| l.node), Some(decl));
    }
}
