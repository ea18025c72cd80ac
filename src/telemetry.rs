//! Tracing subscriber setup for demos and benches. Library code never
//! installs a subscriber itself (spec.md §6); this is purely for
//! binaries that want the same span-duration output the profiling demo
//! in this codebase's tensor-graph sibling module used.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Installs a `tracing_subscriber::fmt` subscriber with span-close
/// timing, honoring `RUST_LOG` and defaulting to `info`.
pub fn init_subscriber() {
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
