//! Production graph nodes.

use cranelift_entity::entity_impl;
use weave_ast::NodeRef;
use weave_core::{Location, Symbol};

/// Reference to a production in a grammar's arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductionRef(u32);
entity_impl!(ProductionRef, "prod");

#[derive(Clone, Debug, PartialEq)]
pub struct Production {
    /// Unique within its grammar.
    pub symbol: String,
    pub kind: ProductionKind,
    pub location: Option<Location>,
    /// The unit item this production parses, for diagnostics.
    pub field: Option<NodeRef>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ProductionKind {
    Epsilon,
    /// A fixed value, given by its rendering.
    Ctor { literal: String },
    /// A value whose type doubles as the literal, as in `type(T)`.
    TypeLiteral { ty: String },
    /// `then` if `predicate` holds, otherwise `otherwise`.
    Boolean {
        predicate: String,
        then: ProductionRef,
        otherwise: ProductionRef,
    },
    /// `body` parsed from exactly `size` bytes.
    ByteBlock { size: String, body: ProductionRef },
    /// `body` repeated `count` times.
    Counter { count: String, body: ProductionRef },
    Sequence(Vec<ProductionRef>),
    /// A sub-unit parsed into its own value.
    Enclosure(ProductionRef),
    /// `body` repeated; `eod` allows stopping at the end of data.
    ForEach { body: ProductionRef, eod: bool },
    /// `body` repeated while `condition` holds, or until the end of data
    /// when there is none.
    While {
        condition: Option<String>,
        body: ProductionRef,
    },
    Switch {
        expr: String,
        cases: Vec<(Vec<String>, ProductionRef)>,
        default: Option<ProductionRef>,
    },
    /// One of two alternatives, picked by the next token.
    LookAhead { alternatives: [ProductionRef; 2] },
    /// A non-owning pointer to another production.
    Reference(ProductionRef),
    /// Stands in for a unit production still under construction; patched
    /// once the grammar is complete.
    Resolved { target: Option<ProductionRef> },
    Skip { ty: String },
    Variable { ty: String },
    Unit {
        type_id: Symbol,
        args: Vec<String>,
        fields: Vec<ProductionRef>,
    },
}

impl ProductionKind {
    /// Prefix for generated symbols.
    pub(crate) fn tag(&self) -> &'static str {
        match self {
            ProductionKind::Epsilon => "eps",
            ProductionKind::Ctor { .. } => "ctor",
            ProductionKind::TypeLiteral { .. } => "type",
            ProductionKind::Boolean { .. } => "bool",
            ProductionKind::ByteBlock { .. } => "block",
            ProductionKind::Counter { .. } => "count",
            ProductionKind::Sequence(_) => "seq",
            ProductionKind::Enclosure(_) => "enc",
            ProductionKind::ForEach { .. } => "foreach",
            ProductionKind::While { .. } => "while",
            ProductionKind::Switch { .. } => "switch",
            ProductionKind::LookAhead { .. } => "lah",
            ProductionKind::Reference(_) | ProductionKind::Resolved { .. } => "ref",
            ProductionKind::Skip { .. } => "skip",
            ProductionKind::Variable { .. } => "var",
            ProductionKind::Unit { .. } => "unit",
        }
    }

    /// Consumes input directly rather than through other productions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProductionKind::Ctor { .. }
                | ProductionKind::TypeLiteral { .. }
                | ProductionKind::Skip { .. }
                | ProductionKind::Variable { .. }
        )
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            ProductionKind::Ctor { .. } | ProductionKind::TypeLiteral { .. }
        )
    }

    /// Productions this one refers to, in order.
    pub fn children(&self) -> Vec<ProductionRef> {
        match self {
            ProductionKind::Epsilon
            | ProductionKind::Ctor { .. }
            | ProductionKind::TypeLiteral { .. }
            | ProductionKind::Skip { .. }
            | ProductionKind::Variable { .. }
            | ProductionKind::Resolved { target: None } => vec![],
            ProductionKind::Boolean {
                then, otherwise, ..
            } => vec![*then, *otherwise],
            ProductionKind::ByteBlock { body, .. }
            | ProductionKind::Counter { body, .. }
            | ProductionKind::ForEach { body, .. }
            | ProductionKind::While { body, .. } => vec![*body],
            ProductionKind::Sequence(items) => items.clone(),
            ProductionKind::Unit { fields, .. } => fields.clone(),
            ProductionKind::Enclosure(p)
            | ProductionKind::Reference(p)
            | ProductionKind::Resolved { target: Some(p) } => vec![*p],
            ProductionKind::Switch { cases, default, .. } => cases
                .iter()
                .map(|(_, p)| *p)
                .chain(default.iter().copied())
                .collect(),
            ProductionKind::LookAhead { alternatives } => alternatives.to_vec(),
        }
    }
}
