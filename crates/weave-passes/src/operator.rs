//! Built-in operators and overload selection.
//!
//! Each built-in operator is described by its operand patterns and a rule
//! for its result type. Resolving an operator expression collects every
//! candidate whose operands match, then keeps the cheapest (fewest
//! coercions) and, among those, the most specific. Anything but a single
//! survivor is left unresolved for validation to report.

use std::collections::BTreeMap;

use weave_ast::{
    AstContext, DeclKind, Expression, NodeKind, NodeRef, OperatorId, OperatorKind,
    OperatorTarget, TypeKind, render_short, render_type,
};

use crate::coercer::{Coercer, CoercionStyle};

/// What an operand must look like.
#[derive(Clone, Debug, PartialEq)]
pub enum OperandType {
    Any,
    /// Any type of the given kind's category (`int<*>`, `list<*>`, ...).
    Category(TypeKind),
    /// A signed or unsigned integer.
    AnyInteger,
    /// The type of operand `n`, after coercion.
    SameAs(usize),
    /// A `Member` expression naming exactly this member.
    MemberId(&'static str),
}

impl OperandType {
    /// Tie-break weight: more specific patterns win among equal-cost
    /// candidates.
    fn specificity(&self) -> u32 {
        match self {
            OperandType::Any => 0,
            OperandType::AnyInteger => 1,
            OperandType::Category(_) | OperandType::SameAs(_) => 2,
            OperandType::MemberId(_) => 3,
        }
    }
}

/// How an operator's result type is derived.
#[derive(Clone, Debug, PartialEq)]
pub enum ResultType {
    Type(TypeKind),
    SameAs(usize),
    /// The element type of the container in operand `n`.
    ElementOf(usize),
    /// The type of the selected struct field.
    Field,
}

#[derive(Clone, Debug)]
pub struct Operator {
    pub id: OperatorId,
    pub kind: OperatorKind,
    /// Groups overloads for lookup, e.g. `integer` or `bytes`.
    pub namespace: &'static str,
    pub operands: Vec<OperandType>,
    pub result: ResultType,
    pub doc: &'static str,
}

impl Operator {
    pub fn signature(&self) -> String {
        format!("{}::{}", self.namespace, self.kind.name())
    }
}

/// All built-in operators, indexed by kind.
pub struct OperatorRegistry {
    operators: Vec<Operator>,
    by_kind: BTreeMap<OperatorKind, Vec<OperatorId>>,
}

fn int() -> OperandType {
    OperandType::AnyInteger
}

fn cat(kind: TypeKind) -> OperandType {
    OperandType::Category(kind)
}

const fn same(n: usize) -> OperandType {
    OperandType::SameAs(n)
}

impl OperatorRegistry {
    pub fn empty() -> Self {
        Self {
            operators: Vec::new(),
            by_kind: BTreeMap::new(),
        }
    }

    /// The operators every compilation knows about.
    pub fn builtin() -> Self {
        use OperatorKind::*;
        use TypeKind as T;

        let mut r = Self::empty();
        let boolean = || ResultType::Type(T::Bool);
        let sint = || T::SignedInteger { width: 0 };
        let uint = || T::UnsignedInteger { width: 0 };

        for kind in [Equal, Unequal] {
            r.add(kind, "generic", vec![OperandType::Any, same(0)], boolean(), "Compares two values of the same type.");
        }
        for kind in [Lower, LowerEqual, Greater, GreaterEqual] {
            r.add(kind, "integer", vec![int(), same(0)], boolean(), "Compares two integers.");
            r.add(kind, "real", vec![cat(T::Real), same(0)], boolean(), "Compares two reals.");
            r.add(kind, "bytes", vec![cat(T::Bytes), same(0)], boolean(), "Compares two byte strings lexicographically.");
        }
        for kind in [Sum, Difference, Multiple, Division, Modulo] {
            r.add(kind, "signed_integer", vec![cat(sint()), same(0)], ResultType::SameAs(0), "Integer arithmetic.");
            r.add(kind, "unsigned_integer", vec![cat(uint()), same(0)], ResultType::SameAs(0), "Unsigned integer arithmetic.");
        }
        for kind in [Sum, Difference, Multiple, Division] {
            r.add(kind, "real", vec![cat(T::Real), same(0)], ResultType::SameAs(0), "Real arithmetic.");
        }
        r.add(Negate, "signed_integer", vec![cat(sint())], ResultType::SameAs(0), "Negates an integer.");
        r.add(Negate, "real", vec![cat(T::Real)], ResultType::SameAs(0), "Negates a real.");
        for kind in [BitAnd, BitOr, BitXor] {
            r.add(kind, "unsigned_integer", vec![cat(uint()), same(0)], ResultType::SameAs(0), "Bitwise operation.");
        }
        for kind in [ShiftLeft, ShiftRight] {
            r.add(kind, "unsigned_integer", vec![cat(uint()), int()], ResultType::SameAs(0), "Bit shift.");
        }
        r.add(Sum, "string", vec![cat(T::String), same(0)], ResultType::SameAs(0), "Concatenates two strings.");
        r.add(Sum, "bytes", vec![cat(T::Bytes), same(0)], ResultType::SameAs(0), "Concatenates two byte strings.");

        let size = || ResultType::Type(T::UnsignedInteger { width: 64 });
        for (ns, kind) in [("list", T::List), ("string", T::String), ("bytes", T::Bytes), ("stream", T::Stream)] {
            r.add(Size, ns, vec![cat(kind)], size(), "Number of elements.");
        }
        r.add(Index, "list", vec![cat(T::List), int()], ResultType::ElementOf(0), "Element at an index.");
        r.add(Index, "bytes", vec![cat(T::Bytes), int()], ResultType::Type(T::UnsignedInteger { width: 8 }), "Byte at an index.");
        for (ns, kind) in [
            ("optional", T::Optional),
            ("result", T::Result),
            ("strong_reference", T::StrongRef),
            ("weak_reference", T::WeakRef),
            ("value_reference", T::ValueRef),
        ] {
            r.add(Deref, ns, vec![cat(kind)], ResultType::ElementOf(0), "Dereferences a value.");
        }

        r.add(MemberCall, "port", vec![cat(T::Port), OperandType::MemberId("protocol")], ResultType::Type(T::String), "The port's transport protocol.");
        r.add(MemberCall, "error", vec![cat(T::Error), OperandType::MemberId("description")], ResultType::Type(T::String), "The error's message.");
        r.add(MemberCall, "stream", vec![cat(T::Stream), OperandType::MemberId("size")], size(), "Bytes currently in the stream.");
        r.add(MemberCall, "unit", vec![cat(T::Unit), OperandType::MemberId("offset")], size(), "Offset of the unit's data in its input.");
        r.add(MemberCall, "unit", vec![cat(T::Unit), OperandType::MemberId("input")], ResultType::Type(T::Stream), "The unit's input stream.");

        for (ns, kind) in [("struct", T::Struct), ("union", T::Union), ("unit", T::Unit)] {
            r.add(Member, ns, vec![cat(kind), OperandType::Any], ResultType::Field, "Accesses a field.");
        }
        r
    }

    pub fn add(
        &mut self,
        kind: OperatorKind,
        namespace: &'static str,
        operands: Vec<OperandType>,
        result: ResultType,
        doc: &'static str,
    ) -> OperatorId {
        let id = OperatorId(self.operators.len() as u32);
        self.operators.push(Operator {
            id,
            kind,
            namespace,
            operands,
            result,
            doc,
        });
        self.by_kind.entry(kind).or_default().push(id);
        id
    }

    /// # Panics
    ///
    /// Panics if `id` did not come from this registry.
    pub fn get(&self, id: OperatorId) -> &Operator {
        &self.operators[id.0 as usize]
    }

    pub fn candidates(&self, kind: OperatorKind) -> impl Iterator<Item = &Operator> {
        self.by_kind
            .get(&kind)
            .into_iter()
            .flatten()
            .map(|&id| self.get(id))
    }

    /// The operator of `kind` in `namespace`, if there is exactly one.
    pub fn lookup(&self, kind: OperatorKind, namespace: &str) -> Option<&Operator> {
        let mut found = self.candidates(kind).filter(|op| op.namespace == namespace);
        let first = found.next()?;
        found.next().is_none().then_some(first)
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// ============================================================================
// Selection
// ============================================================================

/// What a candidate binds the operator to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Choice {
    Builtin(OperatorId),
    /// A function or method declaration.
    Function(NodeRef),
    /// A field of a struct, union or unit, accessed through a built-in
    /// member operator.
    Field { op: OperatorId, field: NodeRef },
}

impl Choice {
    pub fn target(self, ctx: &AstContext) -> OperatorTarget {
        match self {
            Choice::Builtin(op) | Choice::Field { op, .. } => OperatorTarget::Builtin(op),
            Choice::Function(decl) => OperatorTarget::Function(ctx.link_to(decl)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub choice: Choice,
    pub cost: u32,
    pub specificity: u32,
    /// Summed width of the operand types; lower is narrower.
    pub breadth: u32,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    /// Some operand's type is not known yet.
    NotReady,
    NoMatch,
    /// Several equally good candidates, described.
    Ambiguous(Vec<String>),
    Selected(Candidate),
}

/// Parameter declarations of a function declaration.
pub fn function_parameters(ctx: &AstContext, function: NodeRef) -> Vec<NodeRef> {
    ctx.child(function, 0)
        .and_then(|qt| ctx.unqualified(qt))
        .map(|ft| ctx.children_of(ft, 1, weave_ast::Category::Declaration).collect())
        .unwrap_or_default()
}

/// Choose the target of the unresolved operator expression `n`.
pub fn select(ctx: &AstContext, coercer: &Coercer<'_>, registry: &OperatorRegistry, n: NodeRef) -> Selection {
    let NodeKind::Expression(Expression::UnresolvedOperator(kind)) = ctx.kind(n) else {
        return Selection::NoMatch;
    };
    let operands: Option<Vec<NodeRef>> = ctx.children(n).iter().copied().collect();
    let Some(operands) = operands else {
        return Selection::NoMatch;
    };
    let sel = Selector {
        ctx,
        coercer,
        registry,
    };
    match kind {
        OperatorKind::Call => sel.call(n, &operands),
        OperatorKind::MemberCall => sel.member_call(&operands),
        OperatorKind::Member => sel.member(&operands),
        kind => sel.builtin(*kind, &operands),
    }
}

struct Selector<'s, 'a> {
    ctx: &'s AstContext,
    coercer: &'s Coercer<'a>,
    registry: &'s OperatorRegistry,
}

impl Selector<'_, '_> {
    fn typed(&self, e: NodeRef) -> bool {
        self.ctx
            .expression_type(e)
            .is_some_and(|t| self.ctx.is_resolved(t))
    }

    /// The followed type of `e`, looking through references.
    fn receiver_type(&self, e: NodeRef) -> Option<NodeRef> {
        let t = self.ctx.follow(self.ctx.expression_type(e)?)?;
        match self.ctx.type_kind(t)? {
            TypeKind::StrongRef | TypeKind::WeakRef | TypeKind::ValueRef => {
                self.ctx.follow(self.ctx.child(t, 0)?)
            }
            _ => Some(t),
        }
    }

    fn builtin(&self, kind: OperatorKind, operands: &[NodeRef]) -> Selection {
        if !operands.iter().all(|&o| self.typed(o)) {
            return Selection::NotReady;
        }
        let candidates = self
            .registry
            .candidates(kind)
            .filter_map(|op| self.match_builtin(op, operands))
            .collect();
        pick_best(candidates)
    }

    fn match_builtin(&self, op: &Operator, operands: &[NodeRef]) -> Option<Candidate> {
        if op.operands.len() != operands.len() {
            return None;
        }
        let mut cost = 0;
        let mut specificity = 0;
        for (i, pattern) in op.operands.iter().enumerate() {
            cost += self.match_operand(pattern, operands, i)?;
            specificity += pattern.specificity();
        }
        Some(Candidate {
            choice: Choice::Builtin(op.id),
            cost,
            specificity,
            breadth: 0,
            description: op.signature(),
        })
    }

    /// Cost of operand `i` against `pattern`, or `None` if it does not fit.
    fn match_operand(&self, pattern: &OperandType, operands: &[NodeRef], i: usize) -> Option<u32> {
        let e = operands[i];
        match pattern {
            OperandType::Any => Some(0),
            OperandType::MemberId(name) => match self.ctx.kind(e) {
                NodeKind::Expression(Expression::Member(id)) if *id == *name => Some(0),
                _ => None,
            },
            OperandType::Category(kind) => {
                let t = if i == 0 {
                    self.receiver_type(e)?
                } else {
                    self.ctx.follow(self.ctx.expression_type(e)?)?
                };
                self.ctx
                    .type_kind(t)?
                    .same_category(kind)
                    .then_some(0)
            }
            OperandType::AnyInteger => {
                let t = self.ctx.expression_type(e)?;
                self.ctx.followed_kind(t)?.is_integer().then_some(0)
            }
            OperandType::SameAs(j) => {
                let dst = self.ctx.expression_type(*operands.get(*j)?)?;
                self.coercer
                    .coerce_expression(self.ctx, e, dst, CoercionStyle::FUNCTION_CALL)
                    .ok()
                    .map(|c| c.cost())
            }
        }
    }

    /// Match `args` against a function's parameters.
    fn match_function(&self, function: NodeRef, args: &[NodeRef]) -> Option<Candidate> {
        let params = function_parameters(self.ctx, function);
        if args.len() > params.len() {
            return None;
        }
        // Parameters without an argument need a default.
        if params[args.len()..].iter().any(|&p| self.ctx.child(p, 1).is_none()) {
            return None;
        }
        let mut cost = 0;
        let mut specificity = 0;
        let mut breadth = 0;
        for (&arg, &param) in args.iter().zip(&params) {
            let pt = self.ctx.child(param, 0)?;
            let c = self
                .coercer
                .coerce_expression(self.ctx, arg, pt, CoercionStyle::FUNCTION_CALL)
                .ok()?;
            cost += c.cost();
            specificity += 2;
            breadth += type_breadth(self.ctx, pt);
        }
        let description = render_short(self.ctx, function);
        Some(Candidate {
            choice: Choice::Function(function),
            cost,
            specificity,
            breadth,
            description,
        })
    }

    fn functions(&self, decls: &[NodeRef], args: &[NodeRef]) -> Vec<Candidate> {
        let functions: Vec<NodeRef> = decls
            .iter()
            .copied()
            .filter(|&d| is_function(self.ctx, d))
            .collect();
        // A definition supersedes the prototype it is linked to.
        let superseded: Vec<NodeRef> = functions
            .iter()
            .filter_map(|&f| match self.ctx.kind(f).as_declaration().map(|d| &d.kind) {
                Some(DeclKind::Function(info)) => info.linked_prototype.map(|l| l.node),
                _ => None,
            })
            .collect();
        functions
            .into_iter()
            .filter(|f| !superseded.contains(f))
            .filter_map(|f| self.match_function(f, args))
            .collect()
    }

    fn call(&self, n: NodeRef, operands: &[NodeRef]) -> Selection {
        let (&callee, args) = match operands.split_first() {
            Some(split) => split,
            None => return Selection::NoMatch,
        };
        let NodeKind::Expression(Expression::Name { id, .. }) = self.ctx.kind(callee) else {
            return Selection::NoMatch;
        };
        let decls = self.ctx.lookup(n, id);
        if !decls.iter().any(|&d| is_function(self.ctx, d)) {
            return Selection::NoMatch;
        }
        if !args.iter().all(|&a| self.typed(a)) {
            return Selection::NotReady;
        }
        pick_best(self.functions(&decls, args))
    }

    fn member_call(&self, operands: &[NodeRef]) -> Selection {
        if operands.len() < 2 {
            return Selection::NoMatch;
        }
        let (receiver, member, args) = (operands[0], operands[1], &operands[2..]);
        if !self.typed(receiver) || !args.iter().all(|&a| self.typed(a)) {
            return Selection::NotReady;
        }
        let NodeKind::Expression(Expression::Member(name)) = self.ctx.kind(member) else {
            return Selection::NoMatch;
        };
        let mut candidates: Vec<Candidate> = self
            .registry
            .candidates(OperatorKind::MemberCall)
            .filter_map(|op| self.match_builtin(op, operands))
            .collect();
        let methods = self
            .receiver_type(receiver)
            .and_then(|t| self.ctx.node_scope(t))
            .map(|s| self.ctx.scope(s).get(*name).to_vec())
            .unwrap_or_default();
        candidates.extend(self.functions(&methods, args));
        pick_best(candidates)
    }

    fn member(&self, operands: &[NodeRef]) -> Selection {
        let [receiver, member] = operands else {
            return Selection::NoMatch;
        };
        if !self.typed(*receiver) {
            return Selection::NotReady;
        }
        let NodeKind::Expression(Expression::Member(name)) = self.ctx.kind(*member) else {
            return Selection::NoMatch;
        };
        let Some(t) = self.receiver_type(*receiver) else {
            return Selection::NoMatch;
        };
        let namespace = match self.ctx.type_kind(t) {
            Some(TypeKind::Struct) => "struct",
            Some(TypeKind::Union) => "union",
            Some(TypeKind::Unit) => "unit",
            _ => return Selection::NoMatch,
        };
        let Some(op) = self.registry.lookup(OperatorKind::Member, namespace) else {
            return Selection::NoMatch;
        };
        let field = self
            .ctx
            .node_scope(t)
            .map(|s| self.ctx.scope(s).get(*name))
            .unwrap_or_default()
            .iter()
            .copied()
            .find(|&d| self.ctx.declaration_type(d).is_some() && !is_function(self.ctx, d));
        match field {
            Some(field) => Selection::Selected(Candidate {
                choice: Choice::Field { op: op.id, field },
                cost: 0,
                specificity: 0,
                breadth: 0,
                description: format!("{}.{name}", render_type(self.ctx, t)),
            }),
            None => Selection::NoMatch,
        }
    }
}

fn is_function(ctx: &AstContext, d: NodeRef) -> bool {
    matches!(
        ctx.kind(d).as_declaration().map(|d| &d.kind),
        Some(DeclKind::Function(_))
    )
}

/// Width of a parameter type for overload ranking. Only numeric types
/// have one; a `real` is wider than every integer.
fn type_breadth(ctx: &AstContext, t: NodeRef) -> u32 {
    match ctx.followed_kind(t) {
        Some(TypeKind::SignedInteger { width } | TypeKind::UnsignedInteger { width }) => {
            u32::from(*width)
        }
        Some(TypeKind::Real) => 128,
        _ => 0,
    }
}

/// Lowest cost wins. Ties go to the most specific candidate, then to the
/// one with the narrowest operand types.
fn pick_best(candidates: Vec<Candidate>) -> Selection {
    let Some(min_cost) = candidates.iter().map(|c| c.cost).min() else {
        return Selection::NoMatch;
    };
    let cheapest: Vec<_> = candidates.into_iter().filter(|c| c.cost == min_cost).collect();
    let max_spec = cheapest.iter().map(|c| c.specificity).max().unwrap_or(0);
    let specific: Vec<_> = cheapest
        .into_iter()
        .filter(|c| c.specificity == max_spec)
        .collect();
    let min_breadth = specific.iter().map(|c| c.breadth).min().unwrap_or(0);
    let mut best: Vec<_> = specific
        .into_iter()
        .filter(|c| c.breadth == min_breadth)
        .collect();
    if best.len() == 1 {
        Selection::Selected(best.remove(0))
    } else {
        Selection::Ambiguous(best.into_iter().map(|c| c.description).collect())
    }
}

#[cfg(test)]
mod tests {
    use weave_ast::Builder;

    use super::*;
    use crate::unifier;

    fn candidate(cost: u32, specificity: u32, description: &str) -> Candidate {
        Candidate {
            choice: Choice::Builtin(OperatorId(0)),
            cost,
            specificity,
            breadth: 0,
            description: description.to_string(),
        }
    }

    #[test]
    fn pick_best_prefers_cost_then_specificity() {
        let sel = pick_best(vec![candidate(1, 5, "a"), candidate(0, 1, "b"), candidate(0, 2, "c")]);
        assert!(matches!(sel, Selection::Selected(c) if c.description == "c"));

        let sel = pick_best(vec![candidate(0, 2, "a"), candidate(0, 2, "b")]);
        assert_eq!(sel, Selection::Ambiguous(vec!["a".to_string(), "b".to_string()]));

        assert_eq!(pick_best(vec![]), Selection::NoMatch);

        let narrow = Candidate {
            breadth: 32,
            ..candidate(1, 2, "f(int<32>)")
        };
        let wide = Candidate {
            breadth: 64,
            ..candidate(1, 2, "f(int<64>)")
        };
        let sel = pick_best(vec![wide, narrow]);
        assert!(matches!(sel, Selection::Selected(c) if c.description == "f(int<32>)"));
    }

    #[test]
    fn registry_lookup() {
        let r = OperatorRegistry::builtin();
        assert!(!r.is_empty());
        let op = r.lookup(OperatorKind::Member, "struct").unwrap();
        assert_eq!(op.result, ResultType::Field);
        assert_eq!(op.signature(), "struct::Member");
        // Two unit member calls share a namespace.
        assert!(r.lookup(OperatorKind::MemberCall, "unit").is_none());
        assert!(r.candidates(OperatorKind::Sum).count() >= 4);
    }

    #[test]
    fn integer_sum_selects_signed_overload() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let x = b.expr_int(1);
        let y = b.expr_int(2);
        let sum = b.expr_operator(OperatorKind::Sum, vec![x, y]);
        for e in [x, y] {
            let t = ctx.expression_type(e).and_then(|q| ctx.unqualified(q)).unwrap();
            unifier::unify_type(&mut ctx, t);
        }
        let registry = OperatorRegistry::builtin();
        let coercer = Coercer::new(&[]);

        let Selection::Selected(c) = select(&ctx, &coercer, &registry, sum) else {
            panic!("expected a selection");
        };
        let Choice::Builtin(id) = c.choice else {
            panic!("expected a builtin");
        };
        assert_eq!(registry.get(id).namespace, "signed_integer");
        assert_eq!(c.cost, 0);
    }

    #[test]
    fn untyped_operand_is_not_ready() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let x = b.expr_name("x");
        let one = b.expr_int(1);
        let sum = b.expr_operator(OperatorKind::Sum, vec![x, one]);
        let registry = OperatorRegistry::builtin();
        let coercer = Coercer::new(&[]);
        assert_eq!(select(&ctx, &coercer, &registry, sum), Selection::NotReady);
    }

    #[test]
    fn bool_has_no_sum() {
        let mut ctx = AstContext::new();
        let mut b = Builder::new(&mut ctx);
        let x = b.expr_bool(true);
        let y = b.expr_bool(false);
        let sum = b.expr_operator(OperatorKind::Sum, vec![x, y]);
        let registry = OperatorRegistry::builtin();
        let coercer = Coercer::new(&[]);
        assert_eq!(select(&ctx, &coercer, &registry, sum), Selection::NoMatch);
    }
}
