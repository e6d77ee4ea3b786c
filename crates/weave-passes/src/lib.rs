//! Resolution passes and the compilation driver.
//!
//! The passes here operate on GPIL nodes and are shared by every front
//! end: scope building, name and operator resolution, type unification,
//! coercion, enum normalization and validation. The [`Driver`] runs them
//! to a fixed point on behalf of the registered [`Plugin`]s.

pub mod coercer;
pub mod driver;
pub mod error;
pub mod gpil;
pub mod normalizer;
pub mod operator;
pub mod plugin;
pub mod resolver;
pub mod scope_builder;
pub mod unifier;
pub mod validator;

pub use coercer::{Coercer, Coercion, CoercionStyle, NoMatch};
pub use driver::{CompileOutput, Driver, DriverOptions};
pub use error::{CompileError, CompileResult, ParseError};
pub use gpil::GpilPlugin;
pub use operator::{Operator, OperatorRegistry, Selection};
pub use plugin::{Plugin, Session};
