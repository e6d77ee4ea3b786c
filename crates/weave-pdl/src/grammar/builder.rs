//! Translation of unit types into productions.

use std::collections::HashMap;

use weave_ast::{AstContext, Category, NodeRef, TypeKind, UnitItem, render_short, render_type};
use weave_core::{DebugStream, Location, Symbol};

use super::{Grammar, ProductionKind, ProductionRef};

weave_core::symbols! {
    COUNT => "&count",
    EOD => "&eod",
    SIZE => "&size",
    UNTIL => "&until",
    WHILE => "&while",
}

/// Build and analyze the grammar for the unit type declared by `decl`.
/// Returns `None` if `decl` does not declare a unit.
pub fn build_grammar(ctx: &AstContext, decl: NodeRef) -> Option<Grammar> {
    let unit = ctx.declared_type(decl)?;
    if !matches!(ctx.type_kind(unit), Some(TypeKind::Unit)) {
        return None;
    }
    let name = unit_symbol(ctx, unit, decl);
    DebugStream::PdlGrammar.emit(&format!("building grammar for {name}"));

    let mut builder = GrammarBuilder {
        ctx,
        grammar: Grammar::new(name),
        units: HashMap::new(),
        placeholders: Vec::new(),
        current: Vec::new(),
        counter: 0,
    };
    let root = builder.unit_production(unit);
    builder.grammar.root = Some(root);
    builder.patch_placeholders();

    let mut grammar = builder.grammar;
    grammar.analyze();
    Some(grammar)
}

/// The canonical ID of a unit type, or the ID of the declaration naming it
/// before canonical IDs are assigned.
fn unit_symbol(ctx: &AstContext, unit: NodeRef, fallback: NodeRef) -> String {
    if let Some(id) = ctx.type_of_node(unit).and_then(|t| t.type_id) {
        return id.to_string();
    }
    ctx.kind(fallback)
        .as_declaration()
        .map(|d| d.id.to_string())
        .unwrap_or_else(|| "<unit>".to_string())
}

struct GrammarBuilder<'a> {
    ctx: &'a AstContext,
    grammar: Grammar,
    /// Unit types seen so far and their productions; `None` while a unit's
    /// fields are still being translated.
    units: HashMap<NodeRef, Option<ProductionRef>>,
    placeholders: Vec<(ProductionRef, NodeRef)>,
    /// Symbols of the units being translated, innermost last.
    current: Vec<String>,
    counter: usize,
}

impl GrammarBuilder<'_> {
    fn add(
        &mut self,
        symbol: Option<String>,
        kind: ProductionKind,
        location: Option<Location>,
        field: Option<NodeRef>,
    ) -> ProductionRef {
        let symbol = symbol.unwrap_or_else(|| {
            self.counter += 1;
            format!("_{}{}", kind.tag(), self.counter)
        });
        self.grammar.add(symbol, kind, location, field)
    }

    fn unit_production(&mut self, unit: NodeRef) -> ProductionRef {
        if self.units.contains_key(&unit) {
            return self.placeholder(unit);
        }
        self.units.insert(unit, None);

        let ctx = self.ctx;
        let type_id = match ctx.type_of_node(unit).and_then(|t| t.type_id) {
            Some(id) => id,
            None => {
                self.counter += 1;
                Symbol::from_dynamic(&format!("_unit{}", self.counter))
            }
        };
        let symbol = type_id.to_string();
        let args: Vec<String> = ctx
            .children_of(unit, 0, Category::Declaration)
            .filter_map(|p| ctx.kind(p).as_declaration().map(|d| d.id.to_string()))
            .collect();
        // Reserved up front so the unit is listed before its fields.
        let p = self.add(
            Some(symbol.clone()),
            ProductionKind::Unit {
                type_id,
                args,
                fields: Vec::new(),
            },
            ctx.location(unit),
            None,
        );

        self.current.push(symbol);
        let items: Vec<NodeRef> = ctx.children_of(unit, 0, Category::UnitItem).collect();
        let fields: Vec<ProductionRef> = items
            .into_iter()
            .filter_map(|item| self.item_production(item))
            .collect();
        self.current.pop();

        if let ProductionKind::Unit { fields: slot, .. } = &mut self.grammar.get_mut(p).kind {
            *slot = fields;
        }
        self.units.insert(unit, Some(p));
        p
    }

    fn placeholder(&mut self, unit: NodeRef) -> ProductionRef {
        let p = self.add(
            None,
            ProductionKind::Resolved { target: None },
            self.ctx.location(unit),
            None,
        );
        self.placeholders.push((p, unit));
        p
    }

    fn patch_placeholders(&mut self) {
        for (p, unit) in std::mem::take(&mut self.placeholders) {
            let Some(&Some(target)) = self.units.get(&unit) else {
                continue;
            };
            let symbol = self.grammar.get(target).symbol.clone();
            let prod = self.grammar.get_mut(p);
            DebugStream::PdlGrammar.emit(&format!("resolved {} to {symbol}", prod.symbol));
            prod.kind = ProductionKind::Resolved {
                target: Some(target),
            };
            prod.symbol = symbol;
        }
    }

    fn item_production(&mut self, item: NodeRef) -> Option<ProductionRef> {
        let ctx = self.ctx;
        match ctx.kind(item).as_unit_item()? {
            UnitItem::Field { id, skip } => Some(self.field_production(item, *id, *skip)),
            UnitItem::Switch => Some(self.switch_production(item)),
            UnitItem::SwitchCase { .. } => ctx.child(item, 0).and_then(|i| self.item_production(i)),
            UnitItem::Variable { .. } | UnitItem::Property { .. } | UnitItem::Sink { .. } => None,
        }
    }

    fn field_symbol(&mut self, id: Option<Symbol>) -> String {
        let unit = self.current.last().cloned().unwrap_or_default();
        match id {
            Some(id) => format!("{unit}::{id}"),
            None => {
                self.counter += 1;
                format!("{unit}::_anon{}", self.counter)
            }
        }
    }

    /// A field is its value production, wrapped in a `ByteBlock` for
    /// `&size` and in a `Boolean` for a condition. The outermost layer
    /// carries the field's symbol.
    fn field_production(&mut self, item: NodeRef, id: Option<Symbol>, skip: bool) -> ProductionRef {
        let ctx = self.ctx;
        let symbol = self.field_symbol(id);
        let location = ctx.location(item);
        let attrs = ctx.child(item, 3);
        let size = ctx
            .find_attribute(attrs, SIZE())
            .and_then(|a| ctx.attribute_value(a).ok())
            .map(|v| render_short(ctx, v));
        let condition = ctx.child(item, 2).map(|c| render_short(ctx, c));

        let base_name = (size.is_none() && condition.is_none()).then(|| symbol.clone());
        let mut p = if let Some(literal) = ctx.child(item, 1) {
            let kind = ProductionKind::Ctor {
                literal: render_short(ctx, literal),
            };
            self.add(base_name, kind, location, Some(item))
        } else if skip {
            let ty = ctx.child(item, 0).map(|t| render_type(ctx, t)).unwrap_or_default();
            self.add(base_name, ProductionKind::Skip { ty }, location, Some(item))
        } else {
            match ctx.child(item, 0) {
                Some(qt) => self.type_production(qt, attrs, base_name, location, Some(item)),
                None => self.add(base_name, ProductionKind::Epsilon, location, Some(item)),
            }
        };

        if let Some(size) = size {
            let name = condition.is_none().then(|| symbol.clone());
            p = self.add(name, ProductionKind::ByteBlock { size, body: p }, location, Some(item));
        }
        if let Some(predicate) = condition {
            let otherwise = self.add(None, ProductionKind::Epsilon, location, Some(item));
            let kind = ProductionKind::Boolean {
                predicate,
                then: p,
                otherwise,
            };
            p = self.add(Some(symbol), kind, location, Some(item));
        }
        p
    }

    fn type_production(
        &mut self,
        qt: NodeRef,
        attrs: Option<NodeRef>,
        name: Option<String>,
        location: Option<Location>,
        field: Option<NodeRef>,
    ) -> ProductionRef {
        let ctx = self.ctx;
        let Some(t) = ctx.follow(qt) else {
            let ty = render_type(ctx, qt);
            return self.add(name, ProductionKind::Variable { ty }, location, field);
        };
        match ctx.type_kind(t) {
            Some(TypeKind::Unit) => {
                let inner = self.unit_production(t);
                self.add(name, ProductionKind::Enclosure(inner), location, field)
            }
            Some(TypeKind::List) => self.list_production(t, attrs, name, location, field),
            // v -> elem | ()
            Some(TypeKind::Optional) => {
                let body = match ctx.child(t, 0) {
                    Some(e) => self.type_production(e, None, None, location, field),
                    None => self.add(None, ProductionKind::Epsilon, location, field),
                };
                let epsilon = self.add(None, ProductionKind::Epsilon, location, field);
                let kind = ProductionKind::LookAhead {
                    alternatives: [body, epsilon],
                };
                self.add(name, kind, location, field)
            }
            Some(TypeKind::TypeOf) => {
                let ty = ctx.child(t, 0).map(|e| render_type(ctx, e)).unwrap_or_default();
                self.add(name, ProductionKind::TypeLiteral { ty }, location, field)
            }
            Some(TypeKind::Void) => self.add(name, ProductionKind::Epsilon, location, field),
            _ => {
                let ty = render_type(ctx, t);
                self.add(name, ProductionKind::Variable { ty }, location, field)
            }
        }
    }

    /// Lists repeat their element by `&count`, by `&until`/`&while`, up to
    /// the end of data for `&eod` and `&size`, or else for as long as the
    /// next token starts another element.
    fn list_production(
        &mut self,
        list: NodeRef,
        attrs: Option<NodeRef>,
        name: Option<String>,
        location: Option<Location>,
        field: Option<NodeRef>,
    ) -> ProductionRef {
        let ctx = self.ctx;
        let body = match ctx.element_type(list) {
            Some(e) => self.type_production(e, None, None, location, field),
            None => self.add(
                None,
                ProductionKind::Variable {
                    ty: "<unknown>".to_string(),
                },
                location,
                field,
            ),
        };
        let value = |tag: Symbol| {
            ctx.find_attribute(attrs, tag)
                .map(|a| ctx.attribute_value(a).ok().map(|v| render_short(ctx, v)))
        };

        if let Some(count) = value(COUNT()) {
            let count = count.unwrap_or_default();
            return self.add(name, ProductionKind::Counter { count, body }, location, field);
        }
        if let Some(until) = value(UNTIL()) {
            let condition = until.map(|c| format!("!({c})"));
            return self.add(name, ProductionKind::While { condition, body }, location, field);
        }
        if let Some(condition) = value(WHILE()) {
            return self.add(name, ProductionKind::While { condition, body }, location, field);
        }
        if ctx.has_attribute(attrs, EOD()) || ctx.has_attribute(attrs, SIZE()) {
            let kind = ProductionKind::ForEach { body, eod: true };
            return self.add(name, kind, location, field);
        }

        // l -> body l | ()
        let epsilon = self.add(None, ProductionKind::Epsilon, location, field);
        let l = self.add(
            name,
            ProductionKind::LookAhead {
                alternatives: [epsilon, epsilon],
            },
            location,
            field,
        );
        let again = self.add(None, ProductionKind::Reference(l), location, field);
        let more = self.add(None, ProductionKind::Sequence(vec![body, again]), location, field);
        self.grammar.get_mut(l).kind = ProductionKind::LookAhead {
            alternatives: [more, epsilon],
        };
        l
    }

    /// A switch on an expression picks its case by value; a switch without
    /// one picks by look-ahead, chaining its cases right to left.
    fn switch_production(&mut self, item: NodeRef) -> ProductionRef {
        let ctx = self.ctx;
        let location = ctx.location(item);
        let mut cases = Vec::new();
        let mut default = None;
        let case_nodes: Vec<NodeRef> = ctx.children_of(item, 1, Category::UnitItem).collect();
        for case in case_nodes {
            let Some(p) = self.item_production(case) else {
                continue;
            };
            match ctx.kind(case).as_unit_item() {
                Some(UnitItem::SwitchCase { default: true }) => default = Some(p),
                _ => {
                    let labels: Vec<String> = ctx
                        .children_of(case, 1, Category::Expression)
                        .map(|e| render_short(ctx, e))
                        .collect();
                    cases.push((labels, p));
                }
            }
        }

        if let Some(expr) = ctx.child(item, 0) {
            let kind = ProductionKind::Switch {
                expr: render_short(ctx, expr),
                cases,
                default,
            };
            return self.add(None, kind, location, Some(item));
        }

        let mut alternatives: Vec<ProductionRef> = cases.into_iter().map(|(_, p)| p).collect();
        alternatives.extend(default);
        let Some(mut p) = alternatives.pop() else {
            return self.add(None, ProductionKind::Epsilon, location, Some(item));
        };
        while let Some(alt) = alternatives.pop() {
            let kind = ProductionKind::LookAhead {
                alternatives: [alt, p],
            };
            p = self.add(None, kind, location, Some(item));
        }
        p
    }
}

#[cfg(test)]
mod tests {
    use weave_ast::{Builder, Constness, Keyword, Linkage};

    use super::*;
    use crate::Token;

    /// Declare `m::U` with the given items and return its declaration.
    /// Canonical IDs are stamped by hand.
    fn declare(ctx: &mut AstContext, items: Vec<NodeRef>) -> NodeRef {
        let mut b = Builder::new(ctx);
        let unit = b.type_unit(vec![], items);
        let q = b.qualified(unit, Constness::Mutable);
        let decl = b.decl_type("U", q, Linkage::Public);
        let m = b.decl_module("m", vec![decl]);
        let root = ctx.root();
        ctx.add_child(root, Some(m));
        if let weave_ast::NodeKind::Type(ty) = ctx.kind_mut(unit) {
            ty.type_id = Some(Symbol::new("m::U"));
        }
        decl
    }

    fn uint(b: &mut Builder<'_>, width: u16) -> NodeRef {
        let t = b.type_unsigned_integer(width);
        b.qualified(t, Constness::Mutable)
    }

    #[test]
    fn fields_in_order() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let magic = b.expr_bytes(b"GET".to_vec());
        let m = b.unit_literal_field(None, magic, None, None);
        let q = uint(&mut b, 8);
        let x = b.unit_field(Some(Symbol::new("x")), q, None, None);
        let decl = declare(&mut ctx, vec![m, x]);

        let grammar = build_grammar(&ctx, decl).unwrap();
        insta::assert_snapshot!(grammar.to_string(), @r#"
        m::U -> unit m::U::_anon1 m::U::x
        m::U::_anon1 -> b"GET" [literal]
        m::U::x -> uint<8>
        "#);
        assert!(grammar.errors().is_empty());
        let root = grammar.root().unwrap();
        assert_eq!(grammar.get(root).symbol, "m::U");
        assert!(!grammar.is_nullable(root));
    }

    #[test]
    fn recursive_unit_is_back_patched() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let name = b.type_name("U");
        let q = b.qualified(name, Constness::Mutable);
        let this = b.expr_keyword(Keyword::SelfValue);
        let cond = b.expr_field(this, "more");
        let x = b.unit_field(Some(Symbol::new("x")), q, Some(cond), None);
        let decl = declare(&mut ctx, vec![x]);
        let link = ctx.link_to(decl);
        ctx.set_resolved(name, link);

        let grammar = build_grammar(&ctx, decl).unwrap();
        let root = grammar.root().unwrap();
        let placeholder = grammar
            .productions()
            .find(|(_, p)| matches!(p.kind, ProductionKind::Resolved { .. }))
            .map(|(p, _)| p)
            .unwrap();
        assert_eq!(
            grammar.get(placeholder).kind,
            ProductionKind::Resolved { target: Some(root) }
        );
        assert_eq!(grammar.get(placeholder).symbol, grammar.get(root).symbol);
        assert_eq!(grammar.resolve(placeholder), root);
        // The condition makes the recursion optional.
        assert!(grammar.is_nullable(root));
        insta::assert_snapshot!(grammar.to_string(), @r"
        m::U -> unit m::U::x [nullable]
        _enc2 -> enclose m::U [nullable]
        _eps3 -> () [nullable]
        m::U::x -> self.more ? _enc2 : _eps3 [nullable]
        ");
    }

    #[test]
    fn optional_self_reference_is_back_patched() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let name = b.type_name("U");
        let q = b.qualified(name, Constness::Mutable);
        let opt = b.type_optional(q);
        let opt_q = b.qualified(opt, Constness::Mutable);
        let x = b.unit_field(Some(Symbol::new("x")), opt_q, None, None);
        let decl = declare(&mut ctx, vec![x]);
        let link = ctx.link_to(decl);
        ctx.set_resolved(name, link);

        let grammar = build_grammar(&ctx, decl).unwrap();
        let root = grammar.root().unwrap();
        let (placeholder, prod) = grammar
            .productions()
            .find(|(_, p)| matches!(p.kind, ProductionKind::Resolved { .. }))
            .unwrap();
        assert_eq!(prod.kind, ProductionKind::Resolved { target: Some(root) });
        assert_eq!(grammar.resolve(placeholder), root);
        assert!(grammar.errors().is_empty());
        insta::assert_snapshot!(grammar.to_string(), @r"
        m::U -> unit m::U::x [nullable]
        _enc2 -> enclose m::U [nullable]
        _eps3 -> () [nullable]
        m::U::x -> _enc2 | _eps3 [nullable]
        ");
    }

    #[test]
    fn list_without_terminator_loops_on_lookahead() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let elem = b.expr_bytes(b"A".to_vec());
        let lit = b.unit_literal_field(Some(Symbol::new("a")), elem, None, None);
        let inner = b.type_unit(vec![], vec![lit]);
        let inner_q = b.qualified(inner, Constness::Mutable);
        let list = b.type_list(inner_q);
        let list_q = b.qualified(list, Constness::Mutable);
        let xs = b.unit_field(Some(Symbol::new("xs")), list_q, None, None);
        let end = b.expr_bytes(b"B".to_vec());
        let stop = b.unit_literal_field(Some(Symbol::new("end")), end, None, None);
        let decl = declare(&mut ctx, vec![xs, stop]);

        let grammar = build_grammar(&ctx, decl).unwrap();
        assert!(grammar.errors().is_empty());
        let loop_ = grammar.find("m::U::xs").unwrap();
        let [more, done] = grammar.lookahead(loop_).unwrap();
        assert_eq!(more.iter().collect::<Vec<_>>(), vec![&Token::Literal("b\"A\"".to_string())]);
        assert_eq!(done.iter().collect::<Vec<_>>(), vec![&Token::Literal("b\"B\"".to_string())]);
    }

    #[test]
    fn ambiguous_lookahead_is_reported_at_the_field() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let first = b.expr_bytes(b"A".to_vec());
        let a = b.unit_literal_field(Some(Symbol::new("a")), first, None, None);
        let second = b.expr_bytes(b"A".to_vec());
        let c = b.unit_literal_field(Some(Symbol::new("c")), second, None, None);
        let case_a = b.unit_switch_case(a, vec![]);
        let case_c = b.unit_switch_case(c, vec![]);
        let switch = b.unit_switch(None, vec![case_a, case_c]);
        let decl = declare(&mut ctx, vec![switch]);

        let grammar = build_grammar(&ctx, decl).unwrap();
        let errors = grammar.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, Some(switch));
        assert!(errors[0].message.contains("literal b\"A\" can start both alternatives"));
    }

    #[test]
    fn counted_list_in_sized_block() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let e = uint(&mut b, 16);
        let list = b.type_list(e);
        let list_q = b.qualified(list, Constness::Mutable);
        let n = b.expr_uint(4);
        let count = b.attribute("&count", Some(n));
        let eight = b.expr_uint(8);
        let size = b.attribute("&size", Some(eight));
        let attrs = b.attribute_set(vec![count, size]);
        let xs = b.unit_field(Some(Symbol::new("xs")), list_q, None, Some(attrs));
        let decl = declare(&mut ctx, vec![xs]);

        let grammar = build_grammar(&ctx, decl).unwrap();
        insta::assert_snapshot!(grammar.to_string(), @r"
        m::U -> unit m::U::xs [nullable]
        _var1 -> uint<16>
        _count2 -> count(4) _var1 [nullable]
        m::U::xs -> bytes(8) _count2 [nullable]
        ");
    }
}
