//! Tracing setup for the CLI.
//!
//! Console-only subscriber on stderr; stdout is reserved for command
//! output. `RUST_LOG` overrides the `--log-level` flag.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber. Call once, before any events.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
