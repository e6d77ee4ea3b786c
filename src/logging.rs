//! Logging setup for the debug streams.

use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, fmt};
use weave_core::DebugStream;

/// Install a `fmt` subscriber filtered by `RUST_LOG` (default `warn`), with
/// `debug` enabled for every named stream. Does nothing if a subscriber is
/// already installed.
pub fn init(streams: &[String]) {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let mut unknown = Vec::new();
    for name in streams {
        let directive = DebugStream::from_name(name)
            .and_then(|s| format!("{}=debug", s.name()).parse::<Directive>().ok());
        match directive {
            Some(d) => filter = filter.add_directive(d),
            None => unknown.push(name.as_str()),
        }
    }
    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
    for name in unknown {
        tracing::warn!(stream = name, "unknown debug stream");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init(&["driver".to_string(), "pdl/grammar".to_string()]);
        init(&["no-such-stream".to_string()]);
    }
}
