//! Shared compiler utilities for the weave toolchain.
//!
//! Everything here is language-agnostic: interned identifiers, source
//! locations, diagnostics and the named debug streams passes log to.

pub mod diagnostic;
pub mod location;
pub mod stream;
pub mod symbol;

pub use diagnostic::{CompilationPhase, Diagnostic, Severity};
pub use location::{Location, Span};
pub use stream::DebugStream;
pub use symbol::{QualifiedId, Symbol};
