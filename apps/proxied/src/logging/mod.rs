//! Structured logging for proxied
//!
//! This module sets up tracing-based logging. Output goes to stderr so that the
//! JSON printed by the CLI on stdout stays machine readable.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive for a verbosity count taken from the CLI
fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "proxied=info,warn",
        1 => "proxied=debug,info",
        _ => "trace",
    }
}

/// Initialize the logging system
///
/// This sets up tracing with:
/// - Environment-based filtering via RUST_LOG env var
/// - A default level picked from the `-v` count otherwise
/// - Compact console output on stderr
///
/// # Example
/// ```ignore
/// proxied::logging::init(0);
/// tracing::info!("Reading proxy status");
/// ```
pub fn init(verbosity: u8) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity > 0)
                .with_thread_ids(false)
                .compact(),
        )
        .init();
}

/// Initialize logging for tests
///
/// Uses try_init() to avoid panicking if called multiple times.
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("debug"))
        .with(fmt::layer().with_test_writer())
        .try_init();
}
