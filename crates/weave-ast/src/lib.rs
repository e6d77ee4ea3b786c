//! Arena-based AST shared by the GPIL and PDL front ends.
//!
//! Nodes are stored in an [`AstContext`] and referred to by [`NodeRef`].
//! Each node has a [`NodeKind`] payload and an ordered list of child slots,
//! some of which may be null. Passes walk the tree with the [`visitor`]
//! kernel and mutate it in place, logging every change through a
//! [`Mutator`].

pub mod attribute;
pub mod builder;
pub mod context;
pub mod ctor;
pub mod decl;
pub mod expr;
pub mod node;
pub mod printer;
pub mod refs;
pub mod renderer;
pub mod scope;
pub mod stmt;
pub mod ty;
pub mod unit;
pub mod visitor;

pub use attribute::AttributeError;
pub use builder::Builder;
pub use context::AstContext;
pub use ctor::Ctor;
pub use decl::{DeclKind, DeclLink, Declaration, FunctionInfo, Linkage, ParameterKind};
pub use expr::{Expression, Keyword, OperatorId, OperatorKind, OperatorTarget};
pub use node::{Category, Dialect, Meta, NodeClass, NodeData, NodeError, NodeKind};
pub use printer::{render_short, render_type};
pub use refs::{NodeRef, ScopeRef};
pub use renderer::{RenderOptions, render};
pub use scope::Scope;
pub use stmt::Statement;
pub use ty::{Constness, Qualifiers, Side, TypeKind, UnqualifiedType};
pub use unit::UnitItem;
pub use visitor::{Mutator, Order, Visitor, dispatch, dispatch_with, visit, walk};
