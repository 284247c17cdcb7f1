//! Structured logging setup for the droplet bootstrapper
//!
//! Logs go to stderr so that stdout stays reserved for the provisioning
//! request consumed by the orchestration engine.

use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize JSON logging
///
/// This sets up:
/// - JSON formatted logs on stderr
/// - Environment-based log level filtering (`RUST_LOG` wins over `default_level`)
/// - Current span fields so every line carries the stack being resolved
pub fn init_logging(service_name: &str, default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_current_span(true)
                .with_span_list(false),
        )
        .init();

    tracing::info!(
        service = service_name,
        "Logging initialized"
    );
}

/// Initialize simple console logging (for operators at a terminal)
pub fn init_console_logging(service_name: &str, default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::info!(
        service = service_name,
        "Console logging initialized"
    );
}
