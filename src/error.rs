//! Error taxonomy for the alerting core.
//!
//! Every failure that crosses a module boundary is an [`AlertError`]. Each
//! variant maps to an [`ErrorKind`], and the kind decides the severity and the
//! default recovery strategy used by the resilience layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Substrings that identify an expired or rejected upstream credential.
const TOKEN_ERROR_MARKERS: &[&str] = &["token", "unauthorized", "401", "403", "认证失败", "令牌"];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlertError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("API error: {message}")]
    Api {
        message: String,
        status_code: Option<u16>,
    },
    #[error("Cache error: {0}")]
    Cache(String),
    #[error("Retryable error: {message}")]
    Retryable {
        message: String,
        retry_after: Duration,
    },
    #[error("Credential error for account {account}: {message}")]
    Credential { account: String, message: String },
    #[error("Push error: {0}")]
    Push(String),
    #[error("Traffic rule error: {0}")]
    Traffic(String),
    #[error("Circuit breaker open for {component}")]
    CircuitOpen { component: String },
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AlertResult<T> = Result<T, AlertError>;

/// Category name of an [`AlertError`], used as the throttle key for admin alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Network,
    Api,
    Cache,
    Retryable,
    Credential,
    Push,
    Traffic,
    CircuitOpen,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    Retry,
    Fallback,
    GracefulDegradation,
    None,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Network => "network",
            ErrorKind::Api => "api",
            ErrorKind::Cache => "cache",
            ErrorKind::Retryable => "retryable",
            ErrorKind::Credential => "credential",
            ErrorKind::Push => "push",
            ErrorKind::Traffic => "traffic",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::Internal => "internal",
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ErrorKind::Configuration | ErrorKind::Api => ErrorSeverity::High,
            ErrorKind::Network | ErrorKind::Cache => ErrorSeverity::Medium,
            ErrorKind::Retryable => ErrorSeverity::Low,
            _ => ErrorSeverity::Medium,
        }
    }

    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            ErrorKind::Configuration => RecoveryStrategy::Fallback,
            ErrorKind::Network | ErrorKind::Api | ErrorKind::Retryable => RecoveryStrategy::Retry,
            ErrorKind::Cache => RecoveryStrategy::GracefulDegradation,
            _ => RecoveryStrategy::None,
        }
    }

    /// Admin-facing hint attached to escalation messages.
    pub fn suggestion(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "检查配置文件格式和必填项",
            ErrorKind::Network => "检查网络连接和服务可用性",
            ErrorKind::Api => "检查API服务状态和接口返回",
            ErrorKind::Cache => "检查缓存服务连接和状态",
            ErrorKind::Credential => "更新进京证账户的token",
            ErrorKind::Push => "检查推送通道配置",
            _ => "查看日志获取详细信息",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorSeverity::Low => "low",
            ErrorSeverity::Medium => "medium",
            ErrorSeverity::High => "high",
            ErrorSeverity::Critical => "critical",
        };
        f.write_str(name)
    }
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoveryStrategy::Retry => "retry",
            RecoveryStrategy::Fallback => "fallback",
            RecoveryStrategy::GracefulDegradation => "graceful_degradation",
            RecoveryStrategy::None => "none",
        };
        f.write_str(name)
    }
}

impl AlertError {
    pub fn api(message: impl Into<String>) -> Self {
        AlertError::Api {
            message: message.into(),
            status_code: None,
        }
    }

    pub fn api_status(message: impl Into<String>, status_code: u16) -> Self {
        AlertError::Api {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        AlertError::Retryable {
            message: message.into(),
            retry_after: Duration::from_secs(5),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AlertError::Configuration(_) => ErrorKind::Configuration,
            AlertError::Network(_) => ErrorKind::Network,
            AlertError::Api { .. } => ErrorKind::Api,
            AlertError::Cache(_) => ErrorKind::Cache,
            AlertError::Retryable { .. } => ErrorKind::Retryable,
            AlertError::Credential { .. } => ErrorKind::Credential,
            AlertError::Push(_) => ErrorKind::Push,
            AlertError::Traffic(_) => ErrorKind::Traffic,
            AlertError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            AlertError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.kind().severity()
    }

    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        self.kind().recovery_strategy()
    }

    pub fn error_code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Configuration => "CONFIG_ERROR",
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::Api => "API_ERROR",
            ErrorKind::Cache => "CACHE_ERROR",
            ErrorKind::Retryable => "RETRYABLE_ERROR",
            ErrorKind::Credential => "CREDENTIAL_ERROR",
            ErrorKind::Push => "PUSH_ERROR",
            ErrorKind::Traffic => "TRAFFIC_ERROR",
            ErrorKind::CircuitOpen => "CIRCUIT_OPEN",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }

    /// Raw message without the category prefix added by `Display`.
    pub fn message(&self) -> String {
        match self {
            AlertError::Configuration(msg)
            | AlertError::Network(msg)
            | AlertError::Cache(msg)
            | AlertError::Push(msg)
            | AlertError::Traffic(msg)
            | AlertError::Internal(msg) => msg.clone(),
            AlertError::Api { message, .. }
            | AlertError::Retryable { message, .. }
            | AlertError::Credential { message, .. } => message.clone(),
            AlertError::CircuitOpen { component } => {
                format!("circuit breaker open for {component}")
            }
        }
    }

    pub fn details(&self) -> BTreeMap<String, String> {
        let mut details = BTreeMap::new();
        match self {
            AlertError::Api {
                status_code: Some(code),
                ..
            } => {
                details.insert("status_code".to_string(), code.to_string());
            }
            AlertError::Retryable { retry_after, .. } => {
                details.insert(
                    "retry_after".to_string(),
                    retry_after.as_secs().to_string(),
                );
            }
            AlertError::Credential { account, .. } => {
                details.insert("account".to_string(), account.clone());
            }
            AlertError::CircuitOpen { component } => {
                details.insert("component".to_string(), component.clone());
            }
            _ => {}
        }
        details
    }

    pub fn is_credential_error(&self) -> bool {
        matches!(self, AlertError::Credential { .. })
    }

    pub fn should_notify_admin(&self) -> bool {
        self.severity() >= ErrorSeverity::High || self.is_credential_error()
    }
}

/// Whether an upstream failure text looks like an invalid or expired token.
pub fn is_token_error(text: &str) -> bool {
    let lowered = text.to_lowercase();
    TOKEN_ERROR_MARKERS
        .iter()
        .any(|marker| lowered.contains(&marker.to_lowercase()))
}

impl From<config::ConfigError> for AlertError {
    fn from(error: config::ConfigError) -> Self {
        AlertError::Configuration(error.to_string())
    }
}

impl From<serde_json::Error> for AlertError {
    fn from(error: serde_json::Error) -> Self {
        AlertError::Internal(format!("JSON serialization error: {error}"))
    }
}
