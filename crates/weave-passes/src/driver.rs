//! The compilation driver.
//!
//! The driver owns the AST context and the registered plugins and runs
//! them through validation, the resolution fixed point and the final
//! transform:
//!
//! ```text
//! add_input / add_module
//!     │
//!     ▼
//! validate_pre ─► errors abort
//!     │
//!     ▼
//! round: clear scopes, then per plugin
//!        build_scopes ─► canonical IDs ─► resolve ─► unify ─► coerce
//!     │   (repeat while anything changed, up to max_rounds)
//!     ▼
//! validate_post ─► errors abort
//!     │
//!     ▼
//! transform ─► grammar errors abort
//! ```

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use weave_ast::{AstContext, NodeRef, render_short};
use weave_core::{CompilationPhase, DebugStream, Diagnostic};

use crate::error::{CompileError, CompileResult};
use crate::operator::OperatorRegistry;
use crate::plugin::{Plugin, Session};
use crate::{coercer, scope_builder, unifier};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverOptions {
    /// Upper bound on fixed-point rounds.
    pub max_rounds: usize,
    /// Fail instead of warning when `max_rounds` is exhausted.
    pub strict_fixed_point: bool,
    pub skip_validation: bool,
    /// Debug streams to enable, by name.
    pub debug_streams: Vec<String>,
    /// Log the final AST with scopes on the `renderer` stream.
    pub dump_scopes: bool,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            strict_fixed_point: false,
            skip_validation: false,
            debug_streams: Vec::new(),
            dump_scopes: false,
        }
    }
}

/// What a successful compilation reports.
#[derive(Debug)]
pub struct CompileOutput {
    /// Rounds run, including the final one that changed nothing.
    pub rounds: usize,
    pub reached_fixed_point: bool,
    pub warnings: Vec<Diagnostic>,
}

pub struct Driver {
    ctx: AstContext,
    plugins: Vec<Box<dyn Plugin>>,
    registry: OperatorRegistry,
    options: DriverOptions,
}

impl Driver {
    pub fn new(options: DriverOptions) -> Self {
        Self {
            ctx: AstContext::new(),
            plugins: Vec::new(),
            registry: OperatorRegistry::builtin(),
            options,
        }
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// Register a plugin. Plugins run in ascending order; plugins of
    /// equal order keep their registration order.
    pub fn register_plugin(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
        self.plugins.sort_by_key(|p| p.order());
    }

    pub fn plugins(&self) -> impl Iterator<Item = &dyn Plugin> {
        self.plugins.iter().map(|p| p.as_ref())
    }

    /// The registered plugin of type `T`.
    pub fn plugin<T: Plugin>(&self) -> Option<&T> {
        self.plugins.iter().find_map(|p| p.as_any().downcast_ref::<T>())
    }

    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut OperatorRegistry {
        &mut self.registry
    }

    pub fn context(&self) -> &AstContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut AstContext {
        &mut self.ctx
    }

    /// Attach an already built module declaration beneath the root.
    pub fn add_module(&mut self, module: NodeRef) {
        let root = self.ctx.root();
        self.ctx.add_child(root, Some(module));
    }

    /// Parse `input` with the plugin registered for the extension of
    /// `path` and attach the resulting module.
    pub fn add_input(&mut self, path: &Path, input: &mut dyn Read) -> CompileResult<NodeRef> {
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let plugin = self
            .plugins
            .iter()
            .find(|p| p.extension() == extension)
            .ok_or_else(|| CompileError::NoPluginForExtension(extension.clone()))?;
        DebugStream::Driver.emit(&format!(
            "parsing {} with {}",
            path.display(),
            plugin.component()
        ));
        let module = plugin.parse(&mut self.ctx, path, input)?;
        self.add_module(module);
        Ok(module)
    }

    /// Render `n` through the first plugin that knows how, falling back to
    /// the generic printer.
    pub fn print(&self, n: NodeRef) -> String {
        self.plugins
            .iter()
            .find_map(|p| p.print(&self.ctx, n))
            .unwrap_or_else(|| render_short(&self.ctx, n))
    }

    pub fn compile(&mut self) -> CompileResult<CompileOutput> {
        let root = self.ctx.root();

        if !self.options.skip_validation {
            for plugin in &self.plugins {
                DebugStream::Driver.emit(&format!("pre-validation: {}", plugin.component()));
                plugin.validate_pre(&mut self.ctx, root);
            }
            self.fail_on_errors(root, CompileError::Validation)?;
        }

        let session = Session {
            registry: &self.registry,
            plugins: &self.plugins,
            options: &self.options,
        };
        let mut rounds = 0;
        let mut reached_fixed_point = false;
        while rounds < self.options.max_rounds {
            rounds += 1;
            DebugStream::Driver.emit(&format!("round {rounds}"));
            let modified = run_round(&mut self.ctx, &session, root);
            DebugStream::Driver.emit(&format!(
                "round {rounds} done, {}",
                if modified { "modified" } else { "unchanged" }
            ));
            if !modified {
                reached_fixed_point = true;
                break;
            }
        }
        if !reached_fixed_point {
            tracing::warn!(target: "driver", rounds, "no fixed point reached");
            if self.options.strict_fixed_point {
                return Err(CompileError::FixedPointNotReached { rounds });
            }
        }

        if !self.options.skip_validation {
            for plugin in &self.plugins {
                DebugStream::Driver.emit(&format!("post-validation: {}", plugin.component()));
                plugin.validate_post(&mut self.ctx, &session, root);
            }
            self.fail_on_errors(root, CompileError::Validation)?;
        }

        for plugin in &mut self.plugins {
            if plugin.transform(&mut self.ctx, root) {
                DebugStream::Driver.emit(&format!("transform: {} produced output", plugin.component()));
            }
        }
        let transform_errors: Vec<_> = self
            .ctx
            .collect_diagnostics(root)
            .into_iter()
            .filter(|d| d.is_error())
            .filter(|d| matches!(d.phase, CompilationPhase::Grammar | CompilationPhase::Transform))
            .collect();
        if !transform_errors.is_empty() {
            return Err(CompileError::Grammar(transform_errors));
        }

        if self.options.dump_scopes {
            DebugStream::Renderer.emit(&scope_builder::dump_scopes(&self.ctx, root));
        }

        let warnings = self
            .ctx
            .collect_diagnostics(root)
            .into_iter()
            .filter(|d| !d.is_error())
            .collect();
        Ok(CompileOutput {
            rounds,
            reached_fixed_point,
            warnings,
        })
    }

    fn fail_on_errors(
        &self,
        root: NodeRef,
        wrap: fn(Vec<Diagnostic>) -> CompileError,
    ) -> CompileResult<()> {
        let errors: Vec<_> = self
            .ctx
            .collect_diagnostics(root)
            .into_iter()
            .filter(|d| d.is_error())
            .collect();
        if errors.is_empty() { Ok(()) } else { Err(wrap(errors)) }
    }
}

/// One fixed-point round. Returns true if any pass changed the AST.
fn run_round(ctx: &mut AstContext, session: &Session<'_>, root: NodeRef) -> bool {
    ctx.clear_scopes();
    let mut modified = false;
    for plugin in session.plugins {
        DebugStream::Driver.emit(&format!("  {}", plugin.component()));
        plugin.build_scopes(ctx, session, root);
        modified |= scope_builder::assign_canonical_ids(ctx, root);
        modified |= plugin.resolve(ctx, session, root);
        modified |= unifier::unify(ctx, root);
        modified |= coercer::coerce(ctx, session, root);
    }
    modified
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use weave_ast::{Builder, Constness, Expression, Linkage, NodeKind, OperatorKind};

    use super::*;
    use crate::gpil::GpilPlugin;

    struct Recorder;

    impl Plugin for Recorder {
        fn component(&self) -> &'static str {
            "Recorder"
        }

        fn order(&self) -> i32 {
            1
        }

        fn extension(&self) -> &'static str {
            ".rec"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn driver() -> Driver {
        let mut driver = Driver::new(DriverOptions::default());
        driver.register_plugin(Box::new(GpilPlugin::new()));
        driver
    }

    /// `module m { global x: int<64> = 1 + 2; }`
    fn add_sum_module(driver: &mut Driver) -> NodeRef {
        let mut b = Builder::new(driver.context_mut());
        let one = b.expr_int(1);
        let two = b.expr_int(2);
        let sum = b.expr_operator(OperatorKind::Sum, vec![one, two]);
        let t = b.type_signed_integer(64);
        let q = b.qualified(t, Constness::Mutable);
        let x = b.decl_global("x", q, Some(sum), Linkage::Private);
        let m = b.decl_module("m", vec![x]);
        driver.add_module(m);
        x
    }

    #[test]
    fn options_default() {
        let options = DriverOptions::default();
        assert_eq!(options.max_rounds, 10);
        assert!(!options.strict_fixed_point);
        assert!(options.debug_streams.is_empty());
    }

    #[test]
    fn plugins_run_in_order() {
        let mut driver = driver();
        driver.register_plugin(Box::new(Recorder));
        let names: Vec<_> = driver.plugins().map(|p| p.component()).collect();
        assert_eq!(names, vec!["Recorder", "GPIL"]);
        assert!(driver.plugin::<GpilPlugin>().is_some());
        assert!(driver.plugin::<Recorder>().is_some());
    }

    #[test]
    fn compile_reaches_fixed_point() {
        let mut driver = driver();
        let x = add_sum_module(&mut driver);
        let output = driver.compile().unwrap();
        assert!(output.reached_fixed_point);
        assert!(output.rounds <= 3);
        assert!(output.warnings.is_empty());
        assert_eq!(driver.print(x), "global x: int<64>");
        let init = driver.context().child(x, 1).unwrap();
        assert!(matches!(
            driver.context().kind(init),
            NodeKind::Expression(Expression::ResolvedOperator { .. })
        ));
        assert_eq!(driver.print(init), "1 + 2");
    }

    #[test]
    fn strict_cap_is_an_error() {
        let mut driver = Driver::new(DriverOptions {
            max_rounds: 1,
            strict_fixed_point: true,
            ..DriverOptions::default()
        });
        driver.register_plugin(Box::new(GpilPlugin::new()));
        add_sum_module(&mut driver);
        let err = driver.compile().unwrap_err();
        assert_eq!(err.to_string(), "no fixed point reached after 1 rounds");
    }

    #[test]
    fn unknown_extension() {
        let mut driver = driver();
        let err = driver
            .add_input(Path::new("x.txt"), &mut std::io::empty())
            .unwrap_err();
        assert_eq!(err.to_string(), "no plugin handles files with extension '.txt'");
    }

    #[test]
    fn gpil_has_no_parser() {
        let mut driver = driver();
        let err = driver
            .add_input(Path::new("x.gpil"), &mut std::io::empty())
            .unwrap_err();
        assert_eq!(err.to_string(), "plugin 'GPIL' has no parser");
    }
}
