//! # Structured Logging
//!
//! Environment-aware `tracing` setup for processes embedding the bus.
//!
//! The filter honours `RUST_LOG` when set; otherwise the level follows the
//! deployment environment (`COURIER_ENV`): `test` and `development` log at
//! debug, `production` at info. `COURIER_LOG_FORMAT=json` switches the console
//! output to JSON lines.

use std::io::IsTerminal;
use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::detect_environment;

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install the global tracing subscriber once.
///
/// Safe to call repeatedly and alongside a subscriber installed elsewhere;
/// an existing global subscriber is left in place.
pub fn init_tracing() {
    TRACING_INITIALIZED.get_or_init(|| {
        let environment = detect_environment();
        let log_level = get_log_level(&environment);
        let json = use_json_format(std::env::var("COURIER_LOG_FORMAT").ok().as_deref());

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        // Determine if we're in a TTY for ANSI color support
        let use_ansi = !json && IsTerminal::is_terminal(&std::io::stdout());

        let json_layer = json.then(|| {
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
        });
        let console_layer = (!json).then(|| {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(use_ansi)
        });

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .with(console_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        } else {
            tracing::info!(
                environment = %environment,
                ansi_colors = use_ansi,
                json_format = json,
                "Structured logging initialized"
            );
        }
    });
}

/// Default filter directive for an environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

fn use_json_format(format: Option<&str>) -> bool {
    format.is_some_and(|f| f.eq_ignore_ascii_case("json"))
}

/// Log structured data for bus lifecycle and registration operations
pub fn log_bus_operation(operation: &str, target: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        target_name = %target,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "BUS_OPERATION"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("staging"), "debug");
    }

    #[test]
    fn test_json_format_selection() {
        assert!(use_json_format(Some("json")));
        assert!(use_json_format(Some("JSON")));
        assert!(!use_json_format(Some("pretty")));
        assert!(!use_json_format(None));
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
        log_bus_operation("test", "logging", "success", Some("initialized twice"));
    }
}
