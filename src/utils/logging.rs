//! Structured Logging Configuration
//!
//! Thin setup layer over `tracing-subscriber`: builds an `EnvFilter` from the
//! configured level (the `RUST_LOG` environment variable wins when set) and
//! installs either the plain or the JSON formatter.
//!
//! The fault handler never logs through this layer; `tracing` is not
//! async-signal-safe, so the handler writes raw diagnostics to stderr instead.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global subscriber from the logging configuration.
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place (tests initialize logging per-process this way).
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if config.json_format {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init();
    }
}

/// Install the global subscriber with default settings.
pub fn init_default() {
    init(&LoggingConfig::default());
}
