//! PDL validation.

use std::collections::HashMap;

use weave_ast::{AstContext, AttributeError, Category, NodeRef, TypeKind, UnitItem};
use weave_core::{CompilationPhase, Symbol};

use crate::resolver::unit_items;

weave_core::symbols! {
    COUNT => "&count",
    SIZE => "&size",
    UNTIL => "&until",
}

fn units(ctx: &AstContext, root: NodeRef) -> Vec<NodeRef> {
    ctx.pre_order(root)
        .map(|(n, _)| n)
        .filter(|&n| matches!(ctx.type_kind(n), Some(TypeKind::Unit)))
        .collect()
}

fn is_field(ctx: &AstContext, item: NodeRef) -> bool {
    matches!(ctx.kind(item).as_unit_item(), Some(UnitItem::Field { .. }))
}

fn item_name(ctx: &AstContext, item: NodeRef) -> String {
    ctx.kind(item)
        .as_unit_item()
        .and_then(|i| i.id())
        .map(|id| id.to_string())
        .unwrap_or_else(|| "<anonymous>".to_string())
}

pub fn validate_pre(ctx: &mut AstContext, root: NodeRef) {
    let mut errors = Vec::new();
    for unit in units(ctx, root) {
        let items = unit_items(ctx, unit);

        let mut seen: HashMap<Symbol, NodeRef> = HashMap::new();
        for &item in &items {
            let Some(id) = ctx.kind(item).as_unit_item().and_then(|i| i.id()) else {
                continue;
            };
            if seen.insert(id, item).is_some() {
                errors.push((item, format!("ID '{id}' redefined")));
            }
        }

        for item in items.into_iter().filter(|&i| is_field(ctx, i)) {
            let attrs = ctx.child(item, 3);
            if let Some(count) = ctx.find_attribute(attrs, COUNT()) {
                let kind = ctx
                    .child(item, 0)
                    .and_then(|qt| ctx.unqualified(qt))
                    .and_then(|u| ctx.type_kind(u));
                // A type name is checked once it resolves.
                if !matches!(kind, Some(TypeKind::List | TypeKind::Name { .. })) {
                    errors.push((count, "&count can only be used with lists".to_string()));
                }
                if ctx.has_attribute(attrs, UNTIL()) {
                    errors.push((count, "&count and &until cannot be combined".to_string()));
                }
            }
            if let Some(size) = ctx.find_attribute(attrs, SIZE()) {
                if let Err(e @ AttributeError::MissingValue(_)) = ctx.attribute_value(size) {
                    errors.push((size, e.to_string()));
                }
            }
        }
    }
    for (n, message) in errors {
        ctx.add_error(n, message, CompilationPhase::PreValidation);
    }
}

pub fn validate_post(ctx: &mut AstContext, root: NodeRef) {
    let mut errors = Vec::new();
    for unit in units(ctx, root) {
        for item in ctx.children_of(unit, 0, Category::UnitItem) {
            if let Some(UnitItem::Switch) = ctx.kind(item).as_unit_item() {
                let typed = ctx
                    .child(item, 0)
                    .and_then(|e| ctx.expression_type(e))
                    .is_none_or(|t| ctx.is_resolved(t));
                if !typed {
                    errors.push((item, "cannot determine type of switch expression".to_string()));
                }
            }
        }

        for item in unit_items(ctx, unit) {
            let unresolved = ctx.child(item, 0).filter(|&t| !ctx.is_resolved(t));
            if let Some(t) = unresolved {
                // Unknown type names are reported by the GPIL validator.
                let has_unknown_name = ctx.pre_order(t).any(|(n, _)| {
                    matches!(ctx.type_kind(n), Some(TypeKind::Name { resolved: None, .. }))
                });
                if !has_unknown_name {
                    let message = format!("cannot determine type of unit item '{}'", item_name(ctx, item));
                    errors.push((item, message));
                }
            }

            if !is_field(ctx, item) {
                continue;
            }
            let attrs = ctx.child(item, 3);
            for tag in [SIZE(), COUNT()] {
                let Some(attr) = ctx.find_attribute(attrs, tag) else {
                    continue;
                };
                let Ok(value) = ctx.attribute_value(attr) else {
                    continue;
                };
                let kind = ctx.expression_type(value).and_then(|t| ctx.followed_kind(t));
                let is_integer = kind.is_some_and(|k| k.is_integer());
                if kind.is_some() && !is_integer {
                    errors.push((attr, format!("value of attribute '{tag}' must be an integer")));
                }
            }
        }
    }
    for (n, message) in errors {
        ctx.add_error(n, message, CompilationPhase::PostValidation);
    }
}
