//! Expressions and operator identities.

use weave_core::{QualifiedId, Symbol};

use crate::{AstContext, DeclKind, DeclLink, NodeKind, NodeRef, UnitItem};

/// Operator kinds shared by the unresolved and resolved operator nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperatorKind {
    Equal,
    Unequal,
    Lower,
    LowerEqual,
    Greater,
    GreaterEqual,
    Sum,
    Difference,
    Multiple,
    Division,
    Modulo,
    Negate,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    Size,
    Index,
    Deref,
    Member,
    MemberCall,
    Call,
}

impl OperatorKind {
    /// Printable form, e.g. `+` or `.`.
    pub fn symbol(self) -> &'static str {
        match self {
            OperatorKind::Equal => "==",
            OperatorKind::Unequal => "!=",
            OperatorKind::Lower => "<",
            OperatorKind::LowerEqual => "<=",
            OperatorKind::Greater => ">",
            OperatorKind::GreaterEqual => ">=",
            OperatorKind::Sum => "+",
            OperatorKind::Difference => "-",
            OperatorKind::Multiple => "*",
            OperatorKind::Division => "/",
            OperatorKind::Modulo => "%",
            OperatorKind::Negate => "-",
            OperatorKind::BitAnd => "&",
            OperatorKind::BitOr => "|",
            OperatorKind::BitXor => "^",
            OperatorKind::ShiftLeft => "<<",
            OperatorKind::ShiftRight => ">>",
            OperatorKind::Size => "|..|",
            OperatorKind::Index => "[]",
            OperatorKind::Deref => "*",
            OperatorKind::Member => ".",
            OperatorKind::MemberCall => ".()",
            OperatorKind::Call => "()",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OperatorKind::Equal => "Equal",
            OperatorKind::Unequal => "Unequal",
            OperatorKind::Lower => "Lower",
            OperatorKind::LowerEqual => "LowerEqual",
            OperatorKind::Greater => "Greater",
            OperatorKind::GreaterEqual => "GreaterEqual",
            OperatorKind::Sum => "Sum",
            OperatorKind::Difference => "Difference",
            OperatorKind::Multiple => "Multiple",
            OperatorKind::Division => "Division",
            OperatorKind::Modulo => "Modulo",
            OperatorKind::Negate => "Negate",
            OperatorKind::BitAnd => "BitAnd",
            OperatorKind::BitOr => "BitOr",
            OperatorKind::BitXor => "BitXor",
            OperatorKind::ShiftLeft => "ShiftLeft",
            OperatorKind::ShiftRight => "ShiftRight",
            OperatorKind::Size => "Size",
            OperatorKind::Index => "Index",
            OperatorKind::Deref => "Deref",
            OperatorKind::Member => "Member",
            OperatorKind::MemberCall => "MemberCall",
            OperatorKind::Call => "Call",
        }
    }
}

/// Index of a builtin operator in the session's operator registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperatorId(pub u32);

/// What a resolved operator dispatches to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorTarget {
    Builtin(OperatorId),
    /// A user-defined function or struct method.
    Function(DeclLink),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Keyword {
    /// `self` inside a unit or method.
    SelfValue,
    /// `$$` inside a field's attributes: the value just parsed.
    CurrentValue,
}

impl Keyword {
    pub fn text(self) -> &'static str {
        match self {
            Keyword::SelfValue => "self",
            Keyword::CurrentValue => "$$",
        }
    }
}

/// Expression kinds.
///
/// Child layout per kind:
///
/// - `Name`: `[0]` optional type hint, nulled once the name resolves.
/// - `Ctor`: `[0]` the ctor.
/// - `UnresolvedOperator`: operands. A `Call` holds the callee name followed
///   by the arguments; a `MemberCall` holds the receiver, a `Member`
///   expression, then the arguments.
/// - `ResolvedOperator`: `[0]` result type, then the operands as above.
/// - `Coerced`: `[0]` inner expression, `[1]` target type.
/// - `Assign`: `[0]` target, `[1]` source.
/// - `LogicalAnd`, `LogicalOr`: `[0]` bool type, `[1]`, `[2]` operands.
/// - `LogicalNot`: `[0]` bool type, `[1]` operand.
/// - `Ternary`: `[0]` condition, `[1]` true branch, `[2]` false branch.
/// - `Member`: `[0]` member type.
/// - `TypeExpr`: `[0]` the `type(T)` qualified type.
/// - `Keyword`: `[0]` type, set once known.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Name {
        id: QualifiedId,
        resolved: Option<DeclLink>,
    },
    Ctor,
    UnresolvedOperator(OperatorKind),
    ResolvedOperator {
        kind: OperatorKind,
        target: OperatorTarget,
    },
    Coerced,
    Assign,
    LogicalAnd,
    LogicalOr,
    LogicalNot,
    Ternary,
    Member(Symbol),
    TypeExpr,
    Keyword(Keyword),
}

impl Expression {
    pub fn class_name(&self) -> &'static str {
        match self {
            Expression::Name { .. } => "Name",
            Expression::Ctor => "Ctor",
            Expression::UnresolvedOperator(_) => "UnresolvedOperator",
            Expression::ResolvedOperator { .. } => "ResolvedOperator",
            Expression::Coerced => "Coerced",
            Expression::Assign => "Assign",
            Expression::LogicalAnd => "LogicalAnd",
            Expression::LogicalOr => "LogicalOr",
            Expression::LogicalNot => "LogicalNot",
            Expression::Ternary => "Ternary",
            Expression::Member(_) => "Member",
            Expression::TypeExpr => "Type",
            Expression::Keyword(_) => "Keyword",
        }
    }
}

impl AstContext {
    /// The qualified type of an expression, or `None` while unknown.
    pub fn expression_type(&self, e: NodeRef) -> Option<NodeRef> {
        let NodeKind::Expression(expr) = self.kind(e) else {
            return None;
        };
        match expr {
            Expression::Name { resolved, .. } => match resolved {
                Some(link) => self.link_target(*link).and_then(|d| self.declaration_type(d)),
                None => self.child(e, 0),
            },
            Expression::Ctor => self.child(e, 0).and_then(|c| self.child(c, 0)),
            Expression::UnresolvedOperator(_) => None,
            Expression::ResolvedOperator { .. }
            | Expression::LogicalAnd
            | Expression::LogicalOr
            | Expression::LogicalNot
            | Expression::Member(_)
            | Expression::TypeExpr
            | Expression::Keyword(_) => self.child(e, 0),
            Expression::Coerced => self.child(e, 1),
            Expression::Assign => self.child(e, 0).and_then(|t| self.expression_type(t)),
            Expression::Ternary => self.child(e, 1).and_then(|t| self.expression_type(t)),
        }
    }

    /// The qualified type of the value a declaration or unit item
    /// introduces. An enum label's type is its enum.
    pub fn declaration_type(&self, d: NodeRef) -> Option<NodeRef> {
        match self.kind(d) {
            NodeKind::Declaration(decl) => match decl.kind {
                DeclKind::EnumLabel { .. } => {
                    let enum_type = self.parent(d)?;
                    self.parent(enum_type)
                }
                ref kind if kind.has_value_type() => self.child(d, 0),
                _ => None,
            },
            NodeKind::UnitItem(UnitItem::Field { .. } | UnitItem::Variable { .. }) => {
                self.child(d, 0)
            }
            _ => None,
        }
    }

    /// The literal ctor behind a ctor expression, looking through
    /// coercions.
    pub fn ctor_of(&self, e: NodeRef) -> Option<NodeRef> {
        match self.kind(e) {
            NodeKind::Expression(Expression::Ctor) => self.child(e, 0),
            NodeKind::Expression(Expression::Coerced) => self.child(e, 0).and_then(|i| self.ctor_of(i)),
            NodeKind::Ctor(_) => Some(e),
            _ => None,
        }
    }
}
