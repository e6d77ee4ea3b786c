//! The GPIL plugin: the base dialect every other front end builds on.

use std::any::Any;

use weave_ast::{AstContext, NodeRef};

use crate::plugin::{Plugin, Session};
use crate::{normalizer, resolver, scope_builder, validator};

#[derive(Debug, Default)]
pub struct GpilPlugin;

impl GpilPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for GpilPlugin {
    fn component(&self) -> &'static str {
        "GPIL"
    }

    fn order(&self) -> i32 {
        10
    }

    fn extension(&self) -> &'static str {
        ".gpil"
    }

    fn build_scopes(&self, ctx: &mut AstContext, _session: &Session<'_>, root: NodeRef) {
        scope_builder::build_scopes(ctx, root);
    }

    fn resolve(&self, ctx: &mut AstContext, session: &Session<'_>, root: NodeRef) -> bool {
        let resolved = resolver::resolve(ctx, session, root);
        let normalized = normalizer::normalize(ctx, root);
        resolved || normalized
    }

    fn validate_pre(&self, ctx: &mut AstContext, root: NodeRef) {
        validator::validate_pre(ctx, root);
    }

    fn validate_post(&self, ctx: &mut AstContext, session: &Session<'_>, root: NodeRef) {
        validator::validate_post(ctx, session, root);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
