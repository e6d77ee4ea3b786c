//! Diagnostic messages emitted during compilation.

use crate::Location;

/// A diagnostic message (error, warning, or info) with source location.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub message: String,
    pub location: Option<Location>,
    pub severity: Severity,
    pub phase: CompilationPhase,
}

impl Diagnostic {
    pub fn error(
        message: impl Into<String>,
        location: Option<Location>,
        phase: CompilationPhase,
    ) -> Self {
        Self {
            message: message.into(),
            location,
            severity: Severity::Error,
            phase,
        }
    }

    pub fn warning(
        message: impl Into<String>,
        location: Option<Location>,
        phase: CompilationPhase,
    ) -> Self {
        Self {
            message: message.into(),
            location,
            severity: Severity::Warning,
            phase,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "[{}] {}: {}", self.severity, loc, self.message),
            None => write!(f, "[{}] <no location>: {}", self.severity, self.message),
        }
    }
}

/// Severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Compilation phase where a diagnostic was emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompilationPhase {
    Parsing,
    PreValidation,
    ScopeBuilding,
    NameResolution,
    Coercion,
    PostValidation,
    Grammar,
    Transform,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Span, Symbol};

    #[test]
    fn diagnostic_display() {
        let loc = Location::new(Symbol::new("m.gpil"), Span::new(0, 4));
        let d = Diagnostic::error("unknown ID 'x'", Some(loc), CompilationPhase::PostValidation);
        assert!(d.is_error());
        assert_eq!(d.to_string(), "[error] m.gpil:0-4: unknown ID 'x'");

        let w = Diagnostic::warning("unused", None, CompilationPhase::PreValidation);
        assert_eq!(w.to_string(), "[warning] <no location>: unused");
    }
}
