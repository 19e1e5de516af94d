//! # Structured Logging Module
//!
//! Environment-aware structured logging for debugging retry storms and
//! lifecycle ordering across async task runs.
//!
//! Output format is plain console text by default; set
//! `TASKKIT_LOG_FORMAT=json` for JSON lines. `RUST_LOG` overrides the
//! environment-derived default filter.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
///
/// Safe to call more than once; later calls are no-ops. If the host process
/// already installed a global subscriber, that one is kept.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let default_level = default_log_level(&environment);
        let json_output = std::env::var("TASKKIT_LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

        let initialized = if json_output {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true)
                        .with_filter(filter),
                )
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_level(true)
                        .with_filter(filter),
                )
                .try_init()
        };

        if initialized.is_err() {
            tracing::debug!(
                "global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            environment = %environment,
            json = json_output,
            "🔧 STRUCTURED LOGGING: initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("TASKKIT_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn default_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}
