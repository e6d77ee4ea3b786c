//! Source location types for tracking positions in source files.

use serde::{Deserialize, Serialize};

use crate::Symbol;

/// A span of source code, represented as byte offsets.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A location in source code: the file it came from plus a span.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Location {
    pub path: Symbol,
    pub span: Span,
}

impl Location {
    pub const fn new(path: Symbol, span: Span) -> Self {
        Self { path, span }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}-{}", self.path, self.span.start, self.span.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_display() {
        let loc = Location::new(Symbol::new("a.gpil"), Span::new(3, 9));
        assert_eq!(loc.to_string(), "a.gpil:3-9");
    }
}
