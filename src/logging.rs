//! # Structured Logging Module
//!
//! Environment-aware `tracing` setup. `RUST_LOG` wins over the configured
//! level; without either the level follows the deployment environment.

use crate::config::{detect_environment, LogConfig};
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install the global subscriber once. Later calls are no-ops.
pub fn init_structured_logging(settings: &LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = detect_environment();
        let level = settings
            .level
            .clone()
            .filter(|level| !level.trim().is_empty())
            .unwrap_or_else(|| default_level(&environment).to_string());

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

        let layer = if settings.json {
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(false)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .boxed()
        };

        // A subscriber may already be installed, e.g. by a test harness
        if tracing_subscriber::registry()
            .with(layer.with_filter(filter))
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized");
            return;
        }

        tracing::info!(
            environment = %environment,
            level = %level,
            json = settings.json,
            pid = std::process::id(),
            "🔧 Structured logging initialized"
        );
    });
}

fn default_level(environment: &str) -> &'static str {
    match environment {
        "development" => "debug",
        "test" => "warn",
        _ => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(default_level("development"), "debug");
        assert_eq!(default_level("test"), "warn");
        assert_eq!(default_level("production"), "info");
        assert_eq!(default_level("staging"), "info");
    }

    #[test]
    fn test_init_is_idempotent() {
        let settings = LogConfig::default();
        init_structured_logging(&settings);
        init_structured_logging(&LogConfig {
            level: Some("trace".into()),
            json: true,
        });
        assert!(LOGGER_INITIALIZED.get().is_some());
    }
}
