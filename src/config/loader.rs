//! Configuration loader
//!
//! Layers the TOML file with `JJZ__` environment overrides through the
//! `config` crate, validates the result and logs a sanitized summary.

use super::validation::{ConfigValidator, ValidationReport};
use super::AppConfig;
use crate::error::{AlertError, AlertResult};
use crate::notify::mask_target;
use config::{Config, Environment, File, FileFormat};
use serde_json::Value;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const ENV_PREFIX: &str = "JJZ";
const ENV_SEPARATOR: &str = "__";
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Field names whose values never reach the logs.
const SENSITIVE_PATTERNS: &[&str] = &["password", "secret", "token", "key", "credential"];
/// Fields holding notifier or endpoint URLs, which embed keys in their path.
const URL_FIELDS: &[&str] = &["url", "urls", "apprise_api_url"];

#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: AppConfig,
    environment: String,
    path: Option<PathBuf>,
    report: ValidationReport,
}

impl ConfigManager {
    /// Load `path` with environment overrides, then validate.
    pub fn load_from_path(path: impl AsRef<Path>) -> AlertResult<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`load_from_path`](Self::load_from_path) but reads overrides from
    /// `env_source` instead of the process environment when given.
    pub fn load_with_env(
        path: impl AsRef<Path>,
        env_source: Option<config::Map<String, String>>,
    ) -> AlertResult<Self> {
        let path = path.as_ref();
        check_config_file(path)?;
        debug!(path = %path.display(), "Loading configuration");

        let source = File::from(path).format(FileFormat::Toml).required(true);
        let environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(env_source);

        let config = Config::builder()
            .add_source(source)
            .add_source(environment)
            .build()?
            .try_deserialize::<AppConfig>()?;

        Self::from_config(config, Some(path.to_path_buf()))
    }

    /// Parse a TOML document without environment overrides.
    pub fn from_toml_str(document: &str) -> AlertResult<Self> {
        let config = Config::builder()
            .add_source(File::from_str(document, FileFormat::Toml))
            .build()?
            .try_deserialize::<AppConfig>()?;
        Self::from_config(config, None)
    }

    fn from_config(config: AppConfig, path: Option<PathBuf>) -> AlertResult<Self> {
        let report = ConfigValidator::validate(&config);
        for warning in &report.warnings {
            warn!(warning = %warning, "⚠️ Configuration warning");
        }
        report.clone().into_result()?;

        let environment = detect_environment();
        let sanitized = sanitize_json(serde_json::to_value(&config)?);
        debug!(config = %sanitized, "Configuration loaded");
        info!(
            environment = %environment,
            accounts = config.jjz_accounts.len(),
            plates = config.plates.len(),
            admin_channels = config.global.admin.notifications.len(),
            redis = config.global.redis.url.is_some(),
            warnings = report.warnings.len(),
            "✅ Configuration loaded"
        );

        Ok(Self {
            config,
            environment,
            path,
            report,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn into_config(self) -> AppConfig {
        self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn warnings(&self) -> &[String] {
        &self.report.warnings
    }

    /// The loaded configuration with sensitive fields masked.
    pub fn debug_config(&self) -> Value {
        serde_json::to_value(&self.config)
            .map(sanitize_json)
            .unwrap_or(Value::Null)
    }
}

fn check_config_file(path: &Path) -> AlertResult<()> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        AlertError::Configuration(format!("cannot read config file {}: {e}", path.display()))
    })?;
    if !metadata.is_file() {
        return Err(AlertError::Configuration(format!(
            "config path {} is not a regular file",
            path.display()
        )));
    }
    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(AlertError::Configuration(format!(
            "config file {} is too large ({} bytes)",
            path.display(),
            metadata.len()
        )));
    }
    Ok(())
}

/// Deployment environment from `JJZ_ENV`, then `APP_ENV`.
pub fn detect_environment() -> String {
    env::var("JJZ_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "development".to_string())
}

/// Mask sensitive fields for logging.
pub fn sanitize_json(value: Value) -> Value {
    sanitize_value(value, None)
}

fn sanitize_value(value: Value, field: Option<&str>) -> Value {
    let field_lower = field.map(str::to_lowercase);
    let field_lower = field_lower.as_deref();

    if let Some(name) = field_lower {
        if SENSITIVE_PATTERNS.iter().any(|p| name.contains(p)) && !value.is_null() {
            return Value::String("***REDACTED***".to_string());
        }
    }

    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, inner)| {
                    let sanitized = sanitize_value(inner, Some(&key));
                    (key, sanitized)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| sanitize_value(item, field))
                .collect(),
        ),
        Value::String(text) if field_lower.is_some_and(|f| URL_FIELDS.contains(&f)) => {
            Value::String(mask_target(&text))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_masks_tokens_and_target_urls() {
        let sanitized = sanitize_json(json!({
            "jjz_accounts": [{"name": "main", "jjz": {"token": "abc", "url": "https://jjz.example.com/api/stateList"}}],
            "plates": [{"plate": "京A12345", "notifications": [{"type": "apprise", "urls": ["bark://api.day.app/abcdefghijklmnop"]}]}],
            "global": {"redis": {"url": null}}
        }));

        assert_eq!(sanitized["jjz_accounts"][0]["jjz"]["token"], "***REDACTED***");
        assert_eq!(sanitized["jjz_accounts"][0]["name"], "main");
        let target = sanitized["plates"][0]["notifications"][0]["urls"][0]
            .as_str()
            .unwrap();
        assert!(!target.contains("abcdefghijklmnop"));
        assert_eq!(sanitized["plates"][0]["plate"], "京A12345");
        assert!(sanitized["global"]["redis"]["url"].is_null());
    }

    #[test]
    fn test_from_toml_str_applies_defaults() {
        let manager = ConfigManager::from_toml_str(
            r#"
            [[jjz_accounts]]
            name = "main"
            jjz = { token = "t", url = "https://jjz.example.com/api" }

            [[plates]]
            plate = "京A12345"
            notifications = [{ type = "apprise", urls = ["bark://api.day.app/key"] }]
            "#,
        )
        .unwrap();

        let config = manager.config();
        assert_eq!(config.jjz_accounts.len(), 1);
        assert_eq!(config.global.resolver.query_timeout, 10);
        assert_eq!(config.global.circuit_breaker.failure_threshold, 5);
        assert!(manager.path().is_none());
    }

    #[test]
    fn test_invalid_document_is_rejected() {
        let error = ConfigManager::from_toml_str(
            r#"
            [global.remind]
            times = ["8 o'clock"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(error, AlertError::Configuration(_)));
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let error = ConfigManager::load_from_path("/nonexistent/jjz.toml").unwrap_err();
        assert!(matches!(error, AlertError::Configuration(_)));
    }
}
