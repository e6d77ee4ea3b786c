//! Named debug streams.
//!
//! Every pass logs its change lines to one stream. A stream is a `tracing`
//! target, so enabling `resolver=debug` in the subscriber filter shows every
//! rewrite the resolver performs.

use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DebugStream {
    Coercer,
    Resolver,
    Normalizer,
    Unifier,
    Scopes,
    Renderer,
    Driver,
    PdlGrammar,
    PdlResolver,
}

impl DebugStream {
    pub const ALL: &'static [DebugStream] = &[
        DebugStream::Coercer,
        DebugStream::Resolver,
        DebugStream::Normalizer,
        DebugStream::Unifier,
        DebugStream::Scopes,
        DebugStream::Renderer,
        DebugStream::Driver,
        DebugStream::PdlGrammar,
        DebugStream::PdlResolver,
    ];

    /// The stream's name, which is also its `tracing` target.
    pub fn name(self) -> &'static str {
        match self {
            DebugStream::Coercer => "coercer",
            DebugStream::Resolver => "resolver",
            DebugStream::Normalizer => "normalizer",
            DebugStream::Unifier => "unifier",
            DebugStream::Scopes => "scopes",
            DebugStream::Renderer => "renderer",
            DebugStream::Driver => "driver",
            DebugStream::PdlGrammar => "pdl/grammar",
            DebugStream::PdlResolver => "pdl/resolver",
        }
    }

    pub fn from_name(name: &str) -> Option<DebugStream> {
        Self::ALL.iter().copied().find(|s| s.name() == name)
    }

    /// Emit one line on this stream.
    ///
    /// `tracing` targets must be constants, hence the per-stream arms.
    pub fn emit(self, line: &str) {
        match self {
            DebugStream::Coercer => debug!(target: "coercer", "{line}"),
            DebugStream::Resolver => debug!(target: "resolver", "{line}"),
            DebugStream::Normalizer => debug!(target: "normalizer", "{line}"),
            DebugStream::Unifier => debug!(target: "unifier", "{line}"),
            DebugStream::Scopes => debug!(target: "scopes", "{line}"),
            DebugStream::Renderer => debug!(target: "renderer", "{line}"),
            DebugStream::Driver => debug!(target: "driver", "{line}"),
            DebugStream::PdlGrammar => debug!(target: "pdl/grammar", "{line}"),
            DebugStream::PdlResolver => debug!(target: "pdl/resolver", "{line}"),
        }
    }
}

impl std::fmt::Display for DebugStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_names_round_trip() {
        for stream in DebugStream::ALL {
            assert_eq!(DebugStream::from_name(stream.name()), Some(*stream));
        }
        assert_eq!(DebugStream::from_name("nope"), None);
    }
}
