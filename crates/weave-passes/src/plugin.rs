//! The interface front ends implement to take part in compilation.

use std::any::Any;
use std::io::Read;
use std::path::{Path, PathBuf};

use weave_ast::{AstContext, NodeRef};

use crate::coercer::{CoercionStyle, Coercer, NoMatch};
use crate::driver::DriverOptions;
use crate::error::ParseError;
use crate::operator::OperatorRegistry;

/// Shared, read-only state handed to plugin hooks during a compilation.
pub struct Session<'a> {
    pub registry: &'a OperatorRegistry,
    pub plugins: &'a [Box<dyn Plugin>],
    pub options: &'a DriverOptions,
}

impl<'a> Session<'a> {
    pub fn coercer(&self) -> Coercer<'a> {
        Coercer::new(self.plugins)
    }
}

/// A language front end.
///
/// The driver runs hooks of all registered plugins in ascending `order`.
/// Every hook must be idempotent: it runs once per fixed-point round and
/// may see its own earlier output.
pub trait Plugin: Any {
    /// Name used in logs.
    fn component(&self) -> &'static str;

    /// Position relative to other plugins; lower runs first.
    fn order(&self) -> i32;

    /// Source file extension, including the dot.
    fn extension(&self) -> &'static str;

    fn cxx_includes(&self) -> Vec<String> {
        Vec::new()
    }

    fn library_paths(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Parse a source file into a detached module declaration.
    fn parse(
        &self,
        _ctx: &mut AstContext,
        _path: &Path,
        _input: &mut dyn Read,
    ) -> Result<NodeRef, ParseError> {
        Err(ParseError::Unsupported(self.component().to_string()))
    }

    /// Populate scopes for the node classes this plugin owns.
    fn build_scopes(&self, _ctx: &mut AstContext, _session: &Session<'_>, _root: NodeRef) {}

    /// Whether `ctor` can be retyped to `dst`. `None` defers to the
    /// built-in rules.
    fn coerce_ctor(
        &self,
        _ctx: &AstContext,
        _ctor: NodeRef,
        _dst: NodeRef,
        _style: CoercionStyle,
    ) -> Option<Result<(), NoMatch>> {
        None
    }

    /// Whether a value of type `src` converts to `dst`. `None` defers to
    /// the built-in rules.
    fn coerce_type(
        &self,
        _ctx: &AstContext,
        _src: NodeRef,
        _dst: NodeRef,
        _style: CoercionStyle,
    ) -> Option<Result<(), NoMatch>> {
        None
    }

    /// One resolution step. Returns true if the AST changed.
    fn resolve(&self, _ctx: &mut AstContext, _session: &Session<'_>, _root: NodeRef) -> bool {
        false
    }

    /// Checks that do not depend on resolution; runs once before the
    /// fixed point.
    fn validate_pre(&self, _ctx: &mut AstContext, _root: NodeRef) {}

    /// Checks on the fully resolved AST; runs once after the fixed point.
    fn validate_post(&self, _ctx: &mut AstContext, _session: &Session<'_>, _root: NodeRef) {}

    /// A plugin-specific rendering of `n`, if it has one.
    fn print(&self, _ctx: &AstContext, _n: NodeRef) -> Option<String> {
        None
    }

    /// Final lowering after validation. Returns true if anything was
    /// produced or changed.
    fn transform(&mut self, _ctx: &mut AstContext, _root: NodeRef) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
}
