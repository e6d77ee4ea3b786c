//! Types and type predicates.

use std::collections::HashSet;

use weave_core::{QualifiedId, Symbol};

use crate::{AstContext, DeclKind, DeclLink, NodeKind, NodeRef};

/// An unqualified type node.
///
/// `unification` starts out empty and is filled in exactly once by the
/// unifier; `type_id` is the canonical ID of the declaration naming this
/// type, if any.
#[derive(Clone, Debug, PartialEq)]
pub struct UnqualifiedType {
    pub kind: TypeKind,
    pub wildcard: bool,
    pub unification: Option<String>,
    pub type_id: Option<Symbol>,
}

impl UnqualifiedType {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            wildcard: false,
            unification: None,
            type_id: None,
        }
    }

    pub fn wildcard(kind: TypeKind) -> Self {
        Self {
            wildcard: true,
            ..Self::new(kind)
        }
    }
}

/// Type categories.
///
/// Container types keep their element types as qualified-type children:
/// `List` holds `[0]` an `iterator<T>` qualified type, `Iterator`,
/// `Optional`, `Result`, `StrongRef`, `WeakRef`, `ValueRef` and `TypeOf`
/// hold `[0]` the element type, `Tuple` holds one child per element.
/// `Enum` holds its label declarations, `Struct` and `Union` their field
/// declarations, `Function` holds `[0]` the result type followed by the
/// parameter declarations, and `Unit` holds its parameters followed by its
/// items.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeKind {
    Bool,
    SignedInteger { width: u16 },
    UnsignedInteger { width: u16 },
    Real,
    String,
    Bytes,
    Port,
    Address,
    Stream,
    Error,
    Void,
    Null,
    Unknown,
    Auto,
    List,
    Iterator,
    Optional,
    Result,
    Tuple,
    Enum,
    Struct,
    Union,
    Function,
    StrongRef,
    WeakRef,
    ValueRef,
    /// A reference to a declared type, resolved by the resolver.
    Name {
        id: QualifiedId,
        resolved: Option<DeclLink>,
    },
    /// An externally implemented type.
    Library { cxx_name: String },
    /// The type of a member ID as used in `x.m`.
    Member { id: Symbol },
    /// `type(T)`: the type of a type expression.
    TypeOf,
    Sink,
    Unit,
}

impl TypeKind {
    /// Short category name, as used in rendered types and unification tags.
    pub fn category(&self) -> &'static str {
        match self {
            TypeKind::Bool => "bool",
            TypeKind::SignedInteger { .. } => "int",
            TypeKind::UnsignedInteger { .. } => "uint",
            TypeKind::Real => "real",
            TypeKind::String => "string",
            TypeKind::Bytes => "bytes",
            TypeKind::Port => "port",
            TypeKind::Address => "addr",
            TypeKind::Stream => "stream",
            TypeKind::Error => "error",
            TypeKind::Void => "void",
            TypeKind::Null => "null",
            TypeKind::Unknown => "unknown",
            TypeKind::Auto => "auto",
            TypeKind::List => "list",
            TypeKind::Iterator => "iterator",
            TypeKind::Optional => "optional",
            TypeKind::Result => "result",
            TypeKind::Tuple => "tuple",
            TypeKind::Enum => "enum",
            TypeKind::Struct => "struct",
            TypeKind::Union => "union",
            TypeKind::Function => "function",
            TypeKind::StrongRef => "strong_ref",
            TypeKind::WeakRef => "weak_ref",
            TypeKind::ValueRef => "value_ref",
            TypeKind::Name { .. } => "name",
            TypeKind::Library { .. } => "library",
            TypeKind::Member { .. } => "member",
            TypeKind::TypeOf => "type",
            TypeKind::Sink => "sink",
            TypeKind::Unit => "unit",
        }
    }

    /// Class name used in renderings, e.g. `SignedInteger`.
    pub fn class_name(&self) -> &'static str {
        match self {
            TypeKind::Bool => "Bool",
            TypeKind::SignedInteger { .. } => "SignedInteger",
            TypeKind::UnsignedInteger { .. } => "UnsignedInteger",
            TypeKind::Real => "Real",
            TypeKind::String => "String",
            TypeKind::Bytes => "Bytes",
            TypeKind::Port => "Port",
            TypeKind::Address => "Address",
            TypeKind::Stream => "Stream",
            TypeKind::Error => "Error",
            TypeKind::Void => "Void",
            TypeKind::Null => "Null",
            TypeKind::Unknown => "Unknown",
            TypeKind::Auto => "Auto",
            TypeKind::List => "List",
            TypeKind::Iterator => "Iterator",
            TypeKind::Optional => "Optional",
            TypeKind::Result => "Result",
            TypeKind::Tuple => "Tuple",
            TypeKind::Enum => "Enum",
            TypeKind::Struct => "Struct",
            TypeKind::Union => "Union",
            TypeKind::Function => "Function",
            TypeKind::StrongRef => "StrongReference",
            TypeKind::WeakRef => "WeakReference",
            TypeKind::ValueRef => "ValueReference",
            TypeKind::Name { .. } => "Name",
            TypeKind::Library { .. } => "Library",
            TypeKind::Member { .. } => "Member",
            TypeKind::TypeOf => "Type",
            TypeKind::Sink => "Sink",
            TypeKind::Unit => "Unit",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            TypeKind::SignedInteger { .. } | TypeKind::UnsignedInteger { .. }
        )
    }

    /// Reference categories, which all dereference to their child 0.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            TypeKind::StrongRef | TypeKind::WeakRef | TypeKind::ValueRef
        )
    }

    pub fn same_category(&self, other: &TypeKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Constness {
    Const,
    Mutable,
}

/// Whether a qualified type denotes an assignable location or a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Lhs,
    Rhs,
}

/// Payload of a qualified-type node; child 0 is the unqualified type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Qualifiers {
    pub constness: Constness,
    pub side: Side,
}

impl Qualifiers {
    pub const fn rhs(constness: Constness) -> Self {
        Self {
            constness,
            side: Side::Rhs,
        }
    }

    pub const fn lhs(constness: Constness) -> Self {
        Self {
            constness,
            side: Side::Lhs,
        }
    }

    pub fn is_const(&self) -> bool {
        self.constness == Constness::Const
    }
}

/// Depth cutoff when chasing type names; a chain this long is a cycle.
const MAX_FOLLOW_DEPTH: usize = 64;

impl AstContext {
    /// The unqualified type payload of `t`, if `t` is an unqualified type.
    pub fn type_of_node(&self, t: NodeRef) -> Option<&UnqualifiedType> {
        match self.kind(t) {
            NodeKind::Type(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn type_kind(&self, t: NodeRef) -> Option<&TypeKind> {
        self.type_of_node(t).map(|ty| &ty.kind)
    }

    pub fn qualifiers(&self, qt: NodeRef) -> Option<Qualifiers> {
        match self.kind(qt) {
            NodeKind::QualifiedType(q) => Some(*q),
            _ => None,
        }
    }

    /// Strip the qualified wrapper: returns child 0 of a qualified type, or
    /// `t` itself if it is already unqualified.
    pub fn unqualified(&self, t: NodeRef) -> Option<NodeRef> {
        match self.kind(t) {
            NodeKind::QualifiedType(_) => self.child(t, 0),
            NodeKind::Type(_) => Some(t),
            _ => None,
        }
    }

    /// The type a type declaration declares (unqualified).
    pub fn declared_type(&self, decl: NodeRef) -> Option<NodeRef> {
        match self.kind(decl) {
            NodeKind::Declaration(d) if d.kind == DeclKind::Type => {
                self.child(decl, 0).and_then(|qt| self.unqualified(qt))
            }
            _ => None,
        }
    }

    /// Strip qualification and chase resolved type names to the type they
    /// denote. Returns `None` for unresolved names and name cycles.
    pub fn follow(&self, t: NodeRef) -> Option<NodeRef> {
        let mut current = self.unqualified(t)?;
        for _ in 0..MAX_FOLLOW_DEPTH {
            match self.type_kind(current)? {
                TypeKind::Name { resolved, .. } => {
                    let decl = self.link_target((*resolved)?)?;
                    current = self.declared_type(decl)?;
                }
                _ => return Some(current),
            }
        }
        None
    }

    /// Followed type kind, for quick category checks.
    pub fn followed_kind(&self, t: NodeRef) -> Option<&TypeKind> {
        self.follow(t).and_then(|u| self.type_kind(u))
    }

    /// Element type of a container (list, iterator, optional, result,
    /// reference or `type(T)`), as a qualified type.
    pub fn element_type(&self, t: NodeRef) -> Option<NodeRef> {
        let u = self.follow(t)?;
        match self.type_kind(u)? {
            TypeKind::List => {
                let iter = self.child(u, 0)?;
                self.element_type(iter)
            }
            TypeKind::Iterator
            | TypeKind::Optional
            | TypeKind::Result
            | TypeKind::StrongRef
            | TypeKind::WeakRef
            | TypeKind::ValueRef
            | TypeKind::TypeOf => self.child(u, 0),
            _ => None,
        }
    }

    /// Whether values of this type can be stored in a variable.
    pub fn is_allocable(&self, t: NodeRef) -> bool {
        match self.followed_kind(t) {
            Some(kind) => !matches!(
                kind,
                TypeKind::Void
                    | TypeKind::Null
                    | TypeKind::Unknown
                    | TypeKind::Auto
                    | TypeKind::Member { .. }
                    | TypeKind::TypeOf
                    | TypeKind::Function
            ),
            None => false,
        }
    }

    /// Whether values of this type can be modified in place.
    pub fn is_mutable(&self, t: NodeRef) -> bool {
        matches!(
            self.followed_kind(t),
            Some(
                TypeKind::Bytes
                    | TypeKind::Stream
                    | TypeKind::List
                    | TypeKind::Struct
                    | TypeKind::Union
                    | TypeKind::Unit
                    | TypeKind::Sink
            )
        )
    }

    /// Whether values of this type have a total order.
    pub fn is_sortable(&self, t: NodeRef) -> bool {
        let Some(u) = self.follow(t) else {
            return false;
        };
        match self.type_kind(u) {
            Some(
                TypeKind::Bool
                | TypeKind::SignedInteger { .. }
                | TypeKind::UnsignedInteger { .. }
                | TypeKind::Real
                | TypeKind::String
                | TypeKind::Bytes
                | TypeKind::Address
                | TypeKind::Port
                | TypeKind::Enum,
            ) => true,
            Some(TypeKind::Tuple) => self.children(u).iter().flatten().all(|&e| self.is_sortable(e)),
            Some(TypeKind::Optional) => self.child(u, 0).is_some_and(|e| self.is_sortable(e)),
            _ => false,
        }
    }

    /// Whether a type is fully resolved: no `auto` or `unknown`, and every
    /// name in it resolved. Wildcards count as resolved. Cycles through
    /// type names are cut off and count as resolved.
    pub fn is_resolved(&self, t: NodeRef) -> bool {
        let mut visiting = HashSet::new();
        self.is_resolved_inner(t, &mut visiting)
    }

    fn is_resolved_inner(&self, t: NodeRef, visiting: &mut HashSet<NodeRef>) -> bool {
        if !visiting.insert(t) {
            return true;
        }
        let result = match self.kind(t) {
            NodeKind::QualifiedType(_) => self
                .child(t, 0)
                .is_some_and(|u| self.is_resolved_inner(u, visiting)),
            NodeKind::Type(ty) => match &ty.kind {
                TypeKind::Auto | TypeKind::Unknown => false,
                TypeKind::Name { resolved, .. } => match resolved.and_then(|l| self.link_target(l)) {
                    Some(decl) => self
                        .declared_type(decl)
                        .is_some_and(|u| self.is_resolved_inner(u, visiting)),
                    None => false,
                },
                _ if ty.wildcard => true,
                _ => self
                    .children(t)
                    .iter()
                    .flatten()
                    .all(|&c| self.is_resolved_inner(c, visiting)),
            },
            NodeKind::Declaration(d) => match d.kind {
                DeclKind::EnumLabel { .. } => true,
                _ => self
                    .child(t, 0)
                    .is_none_or(|qt| self.is_resolved_inner(qt, visiting)),
            },
            NodeKind::UnitItem(_) => self
                .child(t, 0)
                .is_none_or(|qt| self.is_resolved_inner(qt, visiting)),
            _ => true,
        };
        visiting.remove(&t);
        result
    }

    /// True if both types denote the same unified type.
    pub fn same_type(&self, a: NodeRef, b: NodeRef) -> bool {
        let (Some(a), Some(b)) = (self.unqualified(a), self.unqualified(b)) else {
            return false;
        };
        if a == b {
            return true;
        }
        match (self.type_of_node(a), self.type_of_node(b)) {
            (Some(ta), Some(tb)) => match (&ta.unification, &tb.unification) {
                (Some(ua), Some(ub)) => ua == ub,
                _ => false,
            },
            _ => false,
        }
    }
}
