//! Errors surfaced by the driver.

use derive_more::{Display, Error, From};
use weave_core::Diagnostic;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Display, Error, From)]
pub enum CompileError {
    #[display("no plugin handles files with extension '{_0}'")]
    NoPluginForExtension(#[error(not(source))] String),

    #[display("{_0}")]
    #[from]
    Parse(ParseError),

    #[display("validation failed:\n{}", render_diagnostics(_0))]
    Validation(#[error(not(source))] Vec<Diagnostic>),

    #[display("grammar construction failed:\n{}", render_diagnostics(_0))]
    Grammar(#[error(not(source))] Vec<Diagnostic>),

    #[display("no fixed point reached after {rounds} rounds")]
    FixedPointNotReached { rounds: usize },
}

impl CompileError {
    /// The diagnostics carried by validation and grammar failures.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileError::Validation(d) | CompileError::Grammar(d) => d,
            _ => &[],
        }
    }
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Display, Error, From)]
pub enum ParseError {
    #[display("{path}: {message}")]
    #[from(ignore)]
    Syntax { path: String, message: String },

    #[display("plugin '{_0}' has no parser")]
    #[from(ignore)]
    Unsupported(#[error(not(source))] String),

    #[display("I/O error: {_0}")]
    Io(std::io::Error),
}
