//! A compiler core for GPIL and its protocol dialect PDL.
//!
//! Front ends build a module AST through [`ast::Builder`] (or a plugin's
//! parser), hand it to a [`Driver`] and let the registered plugins resolve
//! it to a fixed point:
//!
//! ```ignore
//! let mut driver = weave::default_driver(DriverOptions::default());
//! driver.add_module(module);
//! let output = driver.compile()?;
//! let grammar = driver.plugin::<PdlPlugin>().and_then(|p| p.grammar("m::U"));
//! ```

pub mod logging;

pub use weave_ast as ast;
pub use weave_passes as passes;
pub use weave_pdl as pdl;

pub use weave_passes::{CompileError, CompileOutput, CompileResult, Driver, DriverOptions, GpilPlugin, Plugin};
pub use weave_pdl::PdlPlugin;

use weave_ast::{Builder, NodeRef};

/// A driver with the GPIL and PDL plugins registered. Logging is set up
/// for the requested debug streams, if any.
pub fn default_driver(options: DriverOptions) -> Driver {
    if !options.debug_streams.is_empty() {
        logging::init(&options.debug_streams);
    }
    let mut driver = Driver::new(options);
    driver.register_plugin(Box::new(GpilPlugin::new()));
    driver.register_plugin(Box::new(PdlPlugin::new()));
    driver
}

/// Build modules with `build`, attach them to a default driver and compile.
/// The driver is returned with the output so callers can inspect the
/// resolved AST and the grammars.
pub fn compile(
    options: DriverOptions,
    build: impl FnOnce(&mut Builder<'_>) -> Vec<NodeRef>,
) -> CompileResult<(Driver, CompileOutput)> {
    let mut driver = default_driver(options);
    let modules = build(&mut Builder::new(driver.context_mut()));
    for module in modules {
        driver.add_module(module);
    }
    let output = driver.compile()?;
    Ok((driver, output))
}
