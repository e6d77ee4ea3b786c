//! Type coercion.
//!
//! Decides whether a value of one type may be used where another is
//! expected, and rewrites expressions accordingly: literals are retyped in
//! place when their value fits, anything else is wrapped in a `Coerced`
//! expression.

use std::ops::{BitOr, BitOrAssign};

use weave_ast::{
    AstContext, Constness, Ctor, DeclKind, Expression, Mutator, NodeKind, NodeRef,
    OperatorKind, OperatorTarget, TypeKind, UnqualifiedType, Visitor, visitor,
};
use weave_core::DebugStream;

use crate::operator::{OperandType, OperatorRegistry};
use crate::plugin::{Plugin, Session};
use crate::unifier::types_equal;

// ============================================================================
// Styles and outcomes
// ============================================================================

/// Which conversions a coercion site permits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CoercionStyle(u16);

impl CoercionStyle {
    pub const NONE: Self = Self(0);
    pub const ASSIGNMENT: Self = Self(1 << 0);
    pub const FUNCTION_CALL: Self = Self(1 << 1);
    /// Allow narrowing conversions.
    pub const TRY_COERCION: Self = Self(1 << 2);
    /// Allow conversion to `bool` in conditions.
    pub const CONTEXTUAL_CONVERSION: Self = Self(1 << 3);
    /// Keep an operand's own type when its category already fits.
    pub const PREFER_ORIGINAL: Self = Self(1 << 4);
    pub const DISALLOW_SIGNED_UNSIGNED: Self = Self(1 << 5);
    pub const DISALLOW_LOSSY: Self = Self(1 << 6);

    const NAMES: &'static [(CoercionStyle, &'static str)] = &[
        (Self::ASSIGNMENT, "Assignment"),
        (Self::FUNCTION_CALL, "FunctionCall"),
        (Self::TRY_COERCION, "TryCoercion"),
        (Self::CONTEXTUAL_CONVERSION, "ContextualConversion"),
        (Self::PREFER_ORIGINAL, "PreferOriginal"),
        (Self::DISALLOW_SIGNED_UNSIGNED, "DisallowSignedUnsigned"),
        (Self::DISALLOW_LOSSY, "DisallowLossy"),
    ];

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether any value-changing conversion is allowed at all.
    fn converts(self) -> bool {
        self.intersects(Self::ASSIGNMENT | Self::FUNCTION_CALL | Self::TRY_COERCION)
    }
}

impl BitOr for CoercionStyle {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CoercionStyle {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Debug for CoercionStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = Self::NAMES
            .iter()
            .filter(|(s, _)| self.contains(*s))
            .map(|(_, n)| *n)
            .collect();
        if names.is_empty() {
            f.write_str("None")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

/// A coercion that does not apply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NoMatch {
    pub reason: Option<String>,
}

impl NoMatch {
    pub fn because(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }
}

impl std::fmt::Display for NoMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            Some(r) => f.write_str(r),
            None => f.write_str("no coercion available"),
        }
    }
}

/// How an expression reaches its target type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Coercion {
    Unchanged,
    /// A literal is re-created with the target type.
    RetypeCtor,
    /// The expression is wrapped in a `Coerced` node.
    Wrap,
}

impl Coercion {
    pub fn cost(self) -> u32 {
        match self {
            Coercion::Unchanged => 0,
            Coercion::RetypeCtor | Coercion::Wrap => 1,
        }
    }
}

/// Largest integer magnitude a `real` represents exactly.
const MAX_EXACT_REAL: u64 = 1 << 53;

fn fits_signed(value: i64, width: u16) -> bool {
    if width == 0 || width >= 64 {
        return true;
    }
    let max = (1i64 << (width - 1)) - 1;
    let min = -(1i64 << (width - 1));
    (min..=max).contains(&value)
}

fn fits_unsigned(value: u64, width: u16) -> bool {
    width == 0 || width >= 64 || value < (1u64 << width)
}

// ============================================================================
// Coercer
// ============================================================================

pub struct Coercer<'a> {
    plugins: &'a [Box<dyn Plugin>],
}

impl<'a> Coercer<'a> {
    pub fn new(plugins: &'a [Box<dyn Plugin>]) -> Self {
        Self { plugins }
    }

    /// Type-level coercion of `src` to `dst` (both qualified or
    /// unqualified types).
    pub fn coerce_type(
        &self,
        ctx: &AstContext,
        src: NodeRef,
        dst: NodeRef,
        style: CoercionStyle,
    ) -> Result<Coercion, NoMatch> {
        if !ctx.is_resolved(src) || !ctx.is_resolved(dst) {
            return Err(NoMatch::because("type not resolved"));
        }
        let (Some(s), Some(d)) = (ctx.follow(src), ctx.follow(dst)) else {
            return Err(NoMatch::because("type not resolved"));
        };
        if types_equal(ctx, s, d) {
            return Ok(Coercion::Unchanged);
        }
        let (Some(sty), Some(dty)) = (ctx.type_of_node(s), ctx.type_of_node(d)) else {
            return Err(NoMatch::default());
        };
        if dty.wildcard && sty.kind.same_category(&dty.kind) {
            return Ok(Coercion::Unchanged);
        }
        for plugin in self.plugins {
            if let Some(result) = plugin.coerce_type(ctx, src, dst, style) {
                return result.map(|()| Coercion::Wrap);
            }
        }
        if sty.wildcard && sty.kind.same_category(&dty.kind) && style.converts() {
            return Ok(Coercion::Wrap);
        }

        let narrowing = |from: &UnqualifiedType, to: &UnqualifiedType| -> Result<Coercion, NoMatch> {
            if style.contains(CoercionStyle::DISALLOW_LOSSY) {
                Err(NoMatch::because("lossy conversion not allowed"))
            } else if style.contains(CoercionStyle::TRY_COERCION) {
                Ok(Coercion::Wrap)
            } else {
                Err(NoMatch::because(format!(
                    "narrowing conversion from {} to {}",
                    describe(from),
                    describe(to)
                )))
            }
        };

        match (&sty.kind, &dty.kind) {
            (TypeKind::Bool, TypeKind::Bool) => Ok(Coercion::Unchanged),
            (_, TypeKind::Bool) if style.contains(CoercionStyle::CONTEXTUAL_CONVERSION) => {
                match sty.kind {
                    TypeKind::SignedInteger { .. }
                    | TypeKind::UnsignedInteger { .. }
                    | TypeKind::Optional
                    | TypeKind::Result
                    | TypeKind::Error
                    | TypeKind::StrongRef
                    | TypeKind::WeakRef
                    | TypeKind::ValueRef
                    | TypeKind::Bytes
                    | TypeKind::String => Ok(Coercion::Wrap),
                    _ => Err(NoMatch::default()),
                }
            }
            _ if !style.converts() => Err(NoMatch::default()),
            (TypeKind::SignedInteger { width: a }, TypeKind::SignedInteger { width: b })
            | (TypeKind::UnsignedInteger { width: a }, TypeKind::UnsignedInteger { width: b }) => {
                if b >= a { Ok(Coercion::Wrap) } else { narrowing(sty, dty) }
            }
            (TypeKind::UnsignedInteger { width: a }, TypeKind::SignedInteger { width: b }) => {
                if style.contains(CoercionStyle::DISALLOW_SIGNED_UNSIGNED) {
                    Err(NoMatch::because("signed/unsigned conversion not allowed"))
                } else if b > a {
                    Ok(Coercion::Wrap)
                } else {
                    narrowing(sty, dty)
                }
            }
            (TypeKind::SignedInteger { .. }, TypeKind::UnsignedInteger { .. }) => {
                if style.contains(CoercionStyle::DISALLOW_SIGNED_UNSIGNED) {
                    Err(NoMatch::because("signed/unsigned conversion not allowed"))
                } else {
                    narrowing(sty, dty)
                }
            }
            (
                TypeKind::SignedInteger { width } | TypeKind::UnsignedInteger { width },
                TypeKind::Real,
            ) => {
                // A real holds every integer of up to 32 bits exactly.
                if *width <= 32 {
                    Ok(Coercion::Wrap)
                } else {
                    narrowing(sty, dty)
                }
            }
            (
                TypeKind::Null,
                TypeKind::Optional | TypeKind::StrongRef | TypeKind::WeakRef | TypeKind::ValueRef,
            ) => Ok(Coercion::Wrap),
            (TypeKind::Error, TypeKind::Result) => Ok(Coercion::Wrap),
            (_, TypeKind::Optional | TypeKind::Result) => {
                let elem = ctx.child(d, 0).ok_or_else(NoMatch::default)?;
                self.coerce_type(ctx, s, elem, style).map(|_| Coercion::Wrap)
            }
            (TypeKind::StrongRef, TypeKind::WeakRef) if style.contains(CoercionStyle::ASSIGNMENT) => {
                let (Some(se), Some(de)) = (ctx.child(s, 0), ctx.child(d, 0)) else {
                    return Err(NoMatch::default());
                };
                if types_equal(ctx, se, de) {
                    Ok(Coercion::Wrap)
                } else {
                    Err(NoMatch::because("references to different types"))
                }
            }
            // Dereference.
            (TypeKind::StrongRef, _) if style.contains(CoercionStyle::ASSIGNMENT) => {
                let inner = ctx.child(s, 0).ok_or_else(NoMatch::default)?;
                if types_equal(ctx, inner, d) {
                    Ok(Coercion::Wrap)
                } else {
                    Err(NoMatch::default())
                }
            }
            (TypeKind::Tuple, TypeKind::Tuple) => {
                let se: Vec<_> = ctx.children(s).iter().flatten().copied().collect();
                let de: Vec<_> = ctx.children(d).iter().flatten().copied().collect();
                if se.len() != de.len() {
                    return Err(NoMatch::because("tuples differ in length"));
                }
                for (a, b) in se.into_iter().zip(de) {
                    self.coerce_type(ctx, a, b, style)?;
                }
                Ok(Coercion::Wrap)
            }
            _ => Err(NoMatch::default()),
        }
    }

    /// Whether the literal `ctor` can be re-created with type `dst`.
    pub fn coerce_ctor(
        &self,
        ctx: &AstContext,
        ctor: NodeRef,
        dst: NodeRef,
        style: CoercionStyle,
    ) -> Result<(), NoMatch> {
        for plugin in self.plugins {
            if let Some(result) = plugin.coerce_ctor(ctx, ctor, dst, style) {
                return result;
            }
        }
        let NodeKind::Ctor(c) = ctx.kind(ctor) else {
            return Err(NoMatch::default());
        };
        let Some(d) = ctx.follow(dst) else {
            return Err(NoMatch::because("type not resolved"));
        };
        let Some(dty) = ctx.type_of_node(d) else {
            return Err(NoMatch::default());
        };
        let signed_unsigned_ok = !style.contains(CoercionStyle::DISALLOW_SIGNED_UNSIGNED);
        let too_big = |v: &dyn std::fmt::Display| -> Result<(), NoMatch> {
            Err(NoMatch::because(format!("value {v} does not fit into {}", describe(dty))))
        };
        match (c, &dty.kind) {
            (Ctor::SignedInteger { value, .. }, TypeKind::SignedInteger { width }) => {
                if fits_signed(*value, *width) { Ok(()) } else { too_big(value) }
            }
            (Ctor::SignedInteger { value, .. }, TypeKind::UnsignedInteger { width })
                if signed_unsigned_ok =>
            {
                if *value >= 0 && fits_unsigned(*value as u64, *width) {
                    Ok(())
                } else {
                    too_big(value)
                }
            }
            (Ctor::UnsignedInteger { value, .. }, TypeKind::UnsignedInteger { width }) => {
                if fits_unsigned(*value, *width) { Ok(()) } else { too_big(value) }
            }
            (Ctor::UnsignedInteger { value, .. }, TypeKind::SignedInteger { width })
                if signed_unsigned_ok =>
            {
                let fits = i64::try_from(*value).is_ok_and(|v| fits_signed(v, *width));
                if fits { Ok(()) } else { too_big(value) }
            }
            (Ctor::SignedInteger { value, .. }, TypeKind::Real) => {
                if value.unsigned_abs() <= MAX_EXACT_REAL { Ok(()) } else { too_big(value) }
            }
            (Ctor::UnsignedInteger { value, .. }, TypeKind::Real) => {
                if *value <= MAX_EXACT_REAL { Ok(()) } else { too_big(value) }
            }
            (Ctor::SignedInteger { .. } | Ctor::UnsignedInteger { .. }, TypeKind::Bool)
                if style.contains(CoercionStyle::CONTEXTUAL_CONVERSION) =>
            {
                Ok(())
            }
            (Ctor::SignedInteger { .. } | Ctor::UnsignedInteger { .. }, TypeKind::Enum)
                if style.contains(CoercionStyle::CONTEXTUAL_CONVERSION) =>
            {
                Ok(())
            }
            (
                Ctor::Null,
                TypeKind::Optional | TypeKind::StrongRef | TypeKind::WeakRef | TypeKind::ValueRef,
            ) => Ok(()),
            (Ctor::Optional, TypeKind::Optional) | (Ctor::List, TypeKind::List) => {
                // Only empty literals, whose type is still a wildcard.
                if ctx.children(ctor).len() <= 1 || ctx.child(ctor, 1).is_none() {
                    Ok(())
                } else {
                    Err(NoMatch::default())
                }
            }
            (_, TypeKind::Optional) => {
                // A literal of the element type becomes a set optional.
                let elem = ctx.child(d, 0).ok_or_else(NoMatch::default)?;
                let src = ctx.child(ctor, 0).ok_or_else(NoMatch::default)?;
                if types_equal(ctx, src, elem) {
                    Ok(())
                } else {
                    self.coerce_ctor(ctx, ctor, elem, style)
                }
            }
            _ => Err(NoMatch::default()),
        }
    }

    /// How expression `e` reaches type `dst`.
    pub fn coerce_expression(
        &self,
        ctx: &AstContext,
        e: NodeRef,
        dst: NodeRef,
        style: CoercionStyle,
    ) -> Result<Coercion, NoMatch> {
        let src = ctx
            .expression_type(e)
            .ok_or_else(|| NoMatch::because("expression has no type yet"))?;
        if !ctx.is_resolved(src) || !ctx.is_resolved(dst) {
            return Err(NoMatch::because("type not resolved"));
        }
        if types_equal(ctx, src, dst) {
            return Ok(Coercion::Unchanged);
        }
        if let (Some(s), Some(d)) = (ctx.followed_kind(src), ctx.follow(dst)) {
            let dty = ctx.type_of_node(d);
            let same_category = dty.is_some_and(|t| t.kind.same_category(s));
            if same_category
                && (dty.is_some_and(|t| t.wildcard)
                    || style.contains(CoercionStyle::PREFER_ORIGINAL))
            {
                return Ok(Coercion::Unchanged);
            }
        }

        let ctor_result = match ctx.kind(e) {
            NodeKind::Expression(Expression::Ctor) => ctx
                .child(e, 0)
                .map(|c| self.coerce_ctor(ctx, c, dst, style)),
            _ => None,
        };
        match ctor_result {
            Some(Ok(())) => Ok(Coercion::RetypeCtor),
            Some(Err(ctor_err)) => match self.coerce_type(ctx, src, dst, style) {
                Ok(c) => Ok(c),
                Err(type_err) => Err(if ctor_err.reason.is_some() { ctor_err } else { type_err }),
            },
            None => self.coerce_type(ctx, src, dst, style),
        }
    }

    /// Rewrite `e` in the tree per `coercion`. Returns the expression now
    /// occupying its slot.
    pub fn apply(
        &self,
        ctx: &mut AstContext,
        mutator: &mut Mutator,
        e: NodeRef,
        dst: NodeRef,
        coercion: Coercion,
    ) -> NodeRef {
        match coercion {
            Coercion::Unchanged => e,
            Coercion::RetypeCtor => {
                let Some(old) = ctx.child(e, 0) else {
                    return e;
                };
                let ctor = retype_ctor(ctx, old, dst);
                let new = ctx.create_node(
                    NodeKind::Expression(Expression::Ctor),
                    [Some(ctor)],
                    ctx.location(e),
                );
                mutator.replace_node(ctx, e, new, "coerced literal");
                new
            }
            Coercion::Wrap => {
                let (Some(parent), Some(index)) = (ctx.parent(e), ctx.index_in_parent(e)) else {
                    panic!("apply: cannot wrap detached expression {e}");
                };
                let target = target_type(ctx, dst, Constness::Mutable);
                ctx.set_child(parent, index, None);
                let location = ctx.location(e);
                let coerced = ctx.create_node(
                    NodeKind::Expression(Expression::Coerced),
                    [Some(e), Some(target)],
                    location,
                );
                ctx.set_child(parent, index, Some(coerced));
                mutator.record_change_to(ctx, e, coerced, "coerced expression");
                coerced
            }
        }
    }

    /// Coerce the expression in slot `index` of `parent` to `dst`, if it
    /// needs it. Returns true if the tree changed.
    pub fn coerce_slot(
        &self,
        ctx: &mut AstContext,
        mutator: &mut Mutator,
        parent: NodeRef,
        index: usize,
        dst: NodeRef,
        style: CoercionStyle,
    ) -> bool {
        let Some(e) = ctx.child(parent, index) else {
            return false;
        };
        if !ctx.kind(e).is_expression() {
            return false;
        }
        match self.coerce_expression(ctx, e, dst, style) {
            Ok(Coercion::Unchanged) | Err(_) => false,
            Ok(c) => {
                self.apply(ctx, mutator, e, dst, c);
                true
            }
        }
    }
}

fn describe(t: &UnqualifiedType) -> String {
    match t.kind {
        TypeKind::SignedInteger { width } | TypeKind::UnsignedInteger { width } => {
            format!("{}<{width}>", t.kind.category())
        }
        _ => t.kind.category().to_string(),
    }
}

/// A detached qualified copy of `dst` for use as a coercion target.
fn target_type(ctx: &mut AstContext, dst: NodeRef, constness: Constness) -> NodeRef {
    let unqualified = ctx.unqualified(dst).unwrap_or(dst);
    let inner = ctx.clone_type_reference(unqualified);
    let location = ctx.location(dst);
    ctx.create_node(
        NodeKind::QualifiedType(weave_ast::Qualifiers::rhs(constness)),
        [Some(inner)],
        location,
    )
}

/// A new ctor node holding the value of `old` with type `dst`.
fn retype_ctor(ctx: &mut AstContext, old: NodeRef, dst: NodeRef) -> NodeRef {
    let payload = match ctx.kind(old) {
        NodeKind::Ctor(c) => c.clone(),
        _ => panic!("retype_ctor: {old} is not a ctor"),
    };
    let followed = ctx.follow(dst);
    let target_kind = followed
        .and_then(|d| ctx.type_kind(d))
        .cloned()
        .unwrap_or(TypeKind::Unknown);
    let location = ctx.location(old);

    if target_kind == TypeKind::Optional && !matches!(payload, Ctor::Null | Ctor::Optional) {
        let inner = match followed.and_then(|d| ctx.child(d, 0)) {
            Some(elem) => {
                let same = ctx.child(old, 0).is_some_and(|t| types_equal(ctx, t, elem));
                if same { ctx.deep_clone(old) } else { retype_ctor(ctx, old, elem) }
            }
            None => ctx.deep_clone(old),
        };
        let value = ctx.create_node(NodeKind::Expression(Expression::Ctor), [Some(inner)], location);
        let target = target_type(ctx, dst, Constness::Const);
        return ctx.create_node(NodeKind::Ctor(Ctor::Optional), [Some(target), Some(value)], location);
    }

    let payload = match (&payload, &target_kind) {
        (Ctor::SignedInteger { value, .. }, TypeKind::Enum) => enum_ctor(ctx, followed, *value),
        (Ctor::UnsignedInteger { value, .. }, TypeKind::Enum) => {
            enum_ctor(ctx, followed, i64::try_from(*value).unwrap_or(-1))
        }
        _ => retyped_payload(&payload, &target_kind),
    };
    let target = target_type(ctx, dst, Constness::Const);
    ctx.create_node(NodeKind::Ctor(payload), [Some(target)], location)
}

/// The enum ctor for the label carrying `value`, or `Undef`.
fn enum_ctor(ctx: &AstContext, enum_type: Option<NodeRef>, value: i64) -> Ctor {
    let label = enum_type
        .into_iter()
        .flat_map(|t| ctx.children(t).iter().flatten().copied())
        .filter_map(|l| ctx.kind(l).as_declaration())
        .find(|d| matches!(d.kind, DeclKind::EnumLabel { value: Some(v), .. } if v == value))
        .map(|d| d.id)
        .unwrap_or_else(crate::normalizer::UNDEF);
    Ctor::Enum { label }
}

fn retyped_payload(old: &Ctor, target: &TypeKind) -> Ctor {
    match (old, target) {
        (Ctor::SignedInteger { value, .. }, TypeKind::SignedInteger { width }) => {
            Ctor::SignedInteger { value: *value, width: *width }
        }
        (Ctor::SignedInteger { value, .. }, TypeKind::UnsignedInteger { width }) => {
            Ctor::UnsignedInteger { value: *value as u64, width: *width }
        }
        (Ctor::UnsignedInteger { value, .. }, TypeKind::UnsignedInteger { width }) => {
            Ctor::UnsignedInteger { value: *value, width: *width }
        }
        (Ctor::UnsignedInteger { value, .. }, TypeKind::SignedInteger { width }) => {
            Ctor::SignedInteger { value: *value as i64, width: *width }
        }
        (Ctor::SignedInteger { value, .. }, TypeKind::Real) => Ctor::Real(*value as f64),
        (Ctor::UnsignedInteger { value, .. }, TypeKind::Real) => Ctor::Real(*value as f64),
        (Ctor::SignedInteger { value, .. }, TypeKind::Bool) => Ctor::Bool(*value != 0),
        (Ctor::UnsignedInteger { value, .. }, TypeKind::Bool) => Ctor::Bool(*value != 0),
        (Ctor::Null, TypeKind::Optional) => Ctor::Optional,
        (other, _) => other.clone(),
    }
}

// ============================================================================
// Coercion sweep
// ============================================================================

/// Coerce every expression in a coercion position beneath `root`: variable
/// initialisers, parameter defaults, return values, assignments,
/// conditions and operator operands. Returns true if anything changed.
pub fn coerce(ctx: &mut AstContext, session: &Session<'_>, root: NodeRef) -> bool {
    let mut sweep = CoercionSweep {
        coercer: session.coercer(),
        registry: session.registry,
        mutator: Mutator::new(DebugStream::Coercer),
        bool_type: None,
    };
    visitor::visit(&mut sweep, ctx, root, visitor::Order::Post);
    sweep.mutator.is_modified()
}

struct CoercionSweep<'a> {
    coercer: Coercer<'a>,
    registry: &'a OperatorRegistry,
    mutator: Mutator,
    bool_type: Option<NodeRef>,
}

impl CoercionSweep<'_> {
    fn slot(&mut self, ctx: &mut AstContext, parent: NodeRef, index: usize, dst: NodeRef, style: CoercionStyle) {
        self.coercer
            .coerce_slot(ctx, &mut self.mutator, parent, index, dst, style);
    }

    /// Coerce a condition to `bool` unless it already is one.
    fn condition(&mut self, ctx: &mut AstContext, parent: NodeRef, index: usize) {
        let Some(e) = ctx.child(parent, index) else {
            return;
        };
        let is_bool = ctx
            .expression_type(e)
            .and_then(|t| ctx.followed_kind(t))
            .is_some_and(|k| *k == TypeKind::Bool);
        if is_bool {
            return;
        }
        let bool_type = match self.bool_type {
            Some(t) => t,
            None => {
                let t = ctx.create_node(NodeKind::Type(UnqualifiedType::new(TypeKind::Bool)), [], None);
                crate::unifier::unify_type(ctx, t);
                let qt = ctx.create_node(
                    NodeKind::QualifiedType(weave_ast::Qualifiers::rhs(Constness::Const)),
                    [Some(t)],
                    None,
                );
                self.bool_type = Some(qt);
                qt
            }
        };
        self.slot(ctx, parent, index, bool_type, CoercionStyle::CONTEXTUAL_CONVERSION);
    }

    fn declared_value(&mut self, ctx: &mut AstContext, n: NodeRef) {
        if let Some(qt) = ctx.child(n, 0) {
            self.slot(ctx, n, 1, qt, CoercionStyle::ASSIGNMENT);
        }
    }
}

impl Visitor for CoercionSweep<'_> {
    fn visit_constant(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.declared_value(ctx, n);
    }

    fn visit_global_variable(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.declared_value(ctx, n);
    }

    fn visit_local_variable(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.declared_value(ctx, n);
    }

    fn visit_parameter(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.declared_value(ctx, n);
    }

    fn visit_stmt_return(&mut self, ctx: &mut AstContext, n: NodeRef) {
        let function = ctx.find_ancestor(n, |k| {
            matches!(k, NodeKind::Declaration(d) if matches!(d.kind, DeclKind::Function(_)))
        });
        let result = function
            .and_then(|f| ctx.child(f, 0))
            .and_then(|q| ctx.unqualified(q))
            .and_then(|ft| ctx.child(ft, 0));
        if let Some(result) = result {
            self.slot(ctx, n, 0, result, CoercionStyle::ASSIGNMENT);
        }
    }

    fn visit_stmt_if(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.condition(ctx, n, 0);
    }

    fn visit_stmt_while(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.condition(ctx, n, 0);
    }

    fn visit_expr_ternary(&mut self, ctx: &mut AstContext, n: NodeRef) {
        self.condition(ctx, n, 0);
    }

    fn visit_expr_logical(&mut self, ctx: &mut AstContext, n: NodeRef) {
        for index in 1..ctx.children(n).len() {
            self.condition(ctx, n, index);
        }
    }

    fn visit_expr_assign(&mut self, ctx: &mut AstContext, n: NodeRef) {
        if let Some(target) = ctx.child(n, 0).and_then(|t| ctx.expression_type(t)) {
            self.slot(ctx, n, 1, target, CoercionStyle::ASSIGNMENT);
        }
    }

    fn visit_expr_resolved_operator(&mut self, ctx: &mut AstContext, n: NodeRef) {
        let NodeKind::Expression(Expression::ResolvedOperator { kind, target }) = ctx.kind(n).clone()
        else {
            return;
        };
        match target {
            OperatorTarget::Builtin(id) => {
                let operands = self.registry.get(id).operands.clone();
                for (i, pattern) in operands.iter().enumerate() {
                    if let OperandType::SameAs(j) = pattern {
                        let dst = ctx.child(n, 1 + j).and_then(|o| ctx.expression_type(o));
                        if let Some(dst) = dst {
                            self.slot(ctx, n, 1 + i, dst, CoercionStyle::FUNCTION_CALL);
                        }
                    }
                }
            }
            OperatorTarget::Function(link) => {
                let first_arg = match kind {
                    OperatorKind::MemberCall => 3,
                    _ => 2,
                };
                let params = crate::operator::function_parameters(ctx, link.node);
                for (k, param) in params.into_iter().enumerate() {
                    if let Some(pt) = ctx.child(param, 0) {
                        self.slot(ctx, n, first_arg + k, pt, CoercionStyle::FUNCTION_CALL);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use weave_ast::Builder;

    use super::*;
    use crate::unifier;

    fn int_type(ctx: &mut AstContext, signed: bool, width: u16) -> NodeRef {
        let mut b = Builder::new(ctx);
        let t = if signed {
            b.type_signed_integer(width)
        } else {
            b.type_unsigned_integer(width)
        };
        let q = b.qualified(t, Constness::Mutable);
        unifier::unify_type(ctx, t);
        q
    }

    /// `strong_ref<uint<8>>`, `weak_ref<uint<8>>` or `value_ref<uint<8>>`.
    fn ref_type(ctx: &mut AstContext, kind: TypeKind) -> NodeRef {
        let elem = int_type(ctx, false, 8);
        let mut b = Builder::new(ctx);
        let r = match kind {
            TypeKind::StrongRef => b.type_strong_ref(elem),
            TypeKind::WeakRef => b.type_weak_ref(elem),
            _ => b.type_value_ref(elem),
        };
        let q = b.qualified(r, Constness::Mutable);
        unifier::unify_type(ctx, r);
        q
    }

    #[test]
    fn style_flags_combine() {
        let style = CoercionStyle::ASSIGNMENT | CoercionStyle::TRY_COERCION;
        assert!(style.contains(CoercionStyle::ASSIGNMENT));
        assert!(!style.contains(CoercionStyle::FUNCTION_CALL));
        assert_eq!(format!("{style:?}"), "Assignment|TryCoercion");
        assert_eq!(format!("{:?}", CoercionStyle::NONE), "None");
    }

    #[test]
    fn widening_and_narrowing() {
        let mut ctx = AstContext::new();
        let i8t = int_type(&mut ctx, true, 8);
        let i32t = int_type(&mut ctx, true, 32);
        let u16t = int_type(&mut ctx, false, 16);
        let c = Coercer::new(&[]);
        let assign = CoercionStyle::ASSIGNMENT;

        assert_eq!(c.coerce_type(&ctx, i8t, i32t, assign), Ok(Coercion::Wrap));
        assert!(c.coerce_type(&ctx, i32t, i8t, assign).is_err());
        assert_eq!(
            c.coerce_type(&ctx, i32t, i8t, assign | CoercionStyle::TRY_COERCION),
            Ok(Coercion::Wrap)
        );
        assert!(c
            .coerce_type(&ctx, i32t, i8t, assign | CoercionStyle::TRY_COERCION | CoercionStyle::DISALLOW_LOSSY)
            .is_err());
        assert_eq!(c.coerce_type(&ctx, u16t, i32t, assign), Ok(Coercion::Wrap));
        assert!(c
            .coerce_type(&ctx, u16t, i32t, assign | CoercionStyle::DISALLOW_SIGNED_UNSIGNED)
            .is_err());
        assert_eq!(c.coerce_type(&ctx, i32t, i32t, CoercionStyle::NONE), Ok(Coercion::Unchanged));
    }

    #[test]
    fn literals_retype_when_value_fits() {
        let mut ctx = AstContext::new();
        let u8t = int_type(&mut ctx, false, 8);
        let mut b = Builder::new(&mut ctx);
        let small = b.expr_int(200);
        let big = b.expr_int(300);
        let negative = b.expr_int(-1);
        for e in [small, big, negative] {
            let t = ctx.expression_type(e).and_then(|q| ctx.unqualified(q)).unwrap();
            unifier::unify_type(&mut ctx, t);
        }
        let c = Coercer::new(&[]);
        let assign = CoercionStyle::ASSIGNMENT;

        assert_eq!(c.coerce_expression(&ctx, small, u8t, assign), Ok(Coercion::RetypeCtor));
        let err = c.coerce_expression(&ctx, big, u8t, assign).unwrap_err();
        assert_eq!(err.to_string(), "value 300 does not fit into uint<8>");
        assert!(c.coerce_expression(&ctx, negative, u8t, assign).is_err());
    }

    #[test]
    fn apply_wraps_in_coerced() {
        let mut ctx = AstContext::new();
        let i64t = int_type(&mut ctx, true, 64);
        let i8t = int_type(&mut ctx, true, 8);
        let x = Builder::new(&mut ctx).expr_name("x");
        ctx.set_child(x, 0, Some(i8t));
        let stmt = Builder::new(&mut ctx).stmt_expression(x);

        let c = Coercer::new(&[]);
        let mut m = Mutator::new(DebugStream::Coercer);
        let plan = c.coerce_expression(&ctx, x, i64t, CoercionStyle::ASSIGNMENT);
        assert_eq!(plan, Ok(Coercion::Wrap));
        let new = c.apply(&mut ctx, &mut m, x, i64t, Coercion::Wrap);

        assert!(m.is_modified());
        assert_eq!(ctx.child(stmt, 0), Some(new));
        assert_eq!(ctx.child(new, 0), Some(x));
        let new_type = ctx.expression_type(new).unwrap();
        assert!(unifier::types_equal(&ctx, new_type, i64t));
    }

    #[test]
    fn contextual_conversion_to_bool() {
        let mut ctx = AstContext::new();
        let i32t = int_type(&mut ctx, true, 32);
        let mut b = Builder::new(&mut ctx);
        let bt = b.type_bool();
        let bq = b.qualified(bt, Constness::Const);
        unifier::unify_type(&mut ctx, bt);
        let c = Coercer::new(&[]);

        assert!(c.coerce_type(&ctx, i32t, bq, CoercionStyle::ASSIGNMENT).is_err());
        assert_eq!(
            c.coerce_type(&ctx, i32t, bq, CoercionStyle::CONTEXTUAL_CONVERSION),
            Ok(Coercion::Wrap)
        );
    }

    #[test]
    fn strong_reference_weakens_and_dereferences_on_assignment() {
        let mut ctx = AstContext::new();
        let strong = ref_type(&mut ctx, TypeKind::StrongRef);
        let weak = ref_type(&mut ctx, TypeKind::WeakRef);
        let value = ref_type(&mut ctx, TypeKind::ValueRef);
        let u8t = int_type(&mut ctx, false, 8);
        let c = Coercer::new(&[]);
        let assign = CoercionStyle::ASSIGNMENT;
        let call = CoercionStyle::FUNCTION_CALL;

        assert_eq!(c.coerce_type(&ctx, strong, weak, assign), Ok(Coercion::Wrap));
        assert_eq!(c.coerce_type(&ctx, strong, u8t, assign), Ok(Coercion::Wrap));
        assert!(c.coerce_type(&ctx, strong, weak, call).is_err());
        assert!(c.coerce_type(&ctx, strong, u8t, call).is_err());
        assert!(c.coerce_type(&ctx, strong, u8t, CoercionStyle::TRY_COERCION).is_err());

        assert!(c.coerce_type(&ctx, weak, strong, assign).is_err());
        assert!(c.coerce_type(&ctx, value, strong, assign).is_err());
        assert!(c.coerce_type(&ctx, weak, u8t, assign).is_err());
    }

    #[test]
    fn null_coerces_to_references_and_optionals() {
        let mut ctx = AstContext::new();
        let targets = [
            ref_type(&mut ctx, TypeKind::StrongRef),
            ref_type(&mut ctx, TypeKind::WeakRef),
            ref_type(&mut ctx, TypeKind::ValueRef),
        ];
        let elem = int_type(&mut ctx, false, 8);
        let mut b = Builder::new(&mut ctx);
        let opt = b.type_optional(elem);
        let opt = b.qualified(opt, Constness::Mutable);
        let null_type = b.type_null();
        let null = b.ctor_null();
        let null = b.expr_ctor(null);
        let u8t = int_type(&mut ctx, false, 8);
        let c = Coercer::new(&[]);
        let assign = CoercionStyle::ASSIGNMENT;

        for dst in targets.into_iter().chain([opt]) {
            assert_eq!(c.coerce_type(&ctx, null_type, dst, assign), Ok(Coercion::Wrap));
            assert_eq!(c.coerce_expression(&ctx, null, dst, assign), Ok(Coercion::RetypeCtor));
        }
        assert!(c.coerce_type(&ctx, null_type, u8t, assign).is_err());
    }

    #[test]
    fn wide_integer_to_real_needs_try_coercion() {
        let mut ctx = AstContext::new();
        let i32t = int_type(&mut ctx, true, 32);
        let i64t = int_type(&mut ctx, true, 64);
        let u64t = int_type(&mut ctx, false, 64);
        let mut b = Builder::new(&mut ctx);
        let real = b.type_real();
        let real = b.qualified(real, Constness::Mutable);
        let c = Coercer::new(&[]);
        let assign = CoercionStyle::ASSIGNMENT;
        let try_assign = assign | CoercionStyle::TRY_COERCION;

        assert_eq!(c.coerce_type(&ctx, i32t, real, assign), Ok(Coercion::Wrap));
        for wide in [i64t, u64t] {
            assert!(c.coerce_type(&ctx, wide, real, assign).is_err());
            assert_eq!(c.coerce_type(&ctx, wide, real, try_assign), Ok(Coercion::Wrap));
        }
    }
}
