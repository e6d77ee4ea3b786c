//! PDL, the protocol description dialect.
//!
//! PDL adds unit types to GPIL: records whose items describe how to parse
//! a value from input. This crate extends the shared passes with what only
//! units need ([`PdlVisitor`], unit scopes, typing of `self` and `$$`, the
//! unit validation rules) and derives a parser [`Grammar`] from every unit
//! once resolution is complete.

pub mod grammar;
pub mod plugin;
pub mod resolver;
pub mod validator;
pub mod visitor;

pub use grammar::{Grammar, GrammarError, Production, ProductionKind, ProductionRef, Token, build_grammar};
pub use plugin::PdlPlugin;
pub use visitor::{PdlVisitor, dispatch_pdl, visit_pdl};
