//! Entity references into the AST arena.
//!
//! Each ref type is a thin `u32` wrapper providing type-safe indexing into
//! `PrimaryMap` storage owned by `AstContext`.

use cranelift_entity::entity_impl;

/// Reference to a node in the arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(u32);
entity_impl!(NodeRef, "n");

/// Reference to a lexical scope in the arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeRef(u32);
entity_impl!(ScopeRef, "scope");
