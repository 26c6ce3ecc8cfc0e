//! # Configuration
//!
//! One TOML file describes the whole deployment: global knobs under
//! `[global]`, upstream accounts under `[[jjz_accounts]]` and the tracked
//! vehicles under `[[plates]]`. Every section has defaults, so a file that
//! only lists accounts and plates is a complete configuration.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use jjz_alert::config::ConfigManager;
//!
//! # fn main() -> Result<(), jjz_alert::error::AlertError> {
//! let manager = ConfigManager::load_from_path("config.toml")?;
//! let accounts = manager.config().accounts();
//! let cutoff = manager.config().global.remind.cutoff()?;
//! # Ok(())
//! # }
//! ```
//!
//! Environment variables prefixed `JJZ__` override file values, with `__`
//! between path segments: `JJZ__GLOBAL__REDIS__URL=redis://cache:6379/0`.

pub mod accounts;
pub mod loader;
pub mod validation;

use crate::cache::CacheSettings;
use crate::error::{AlertError, AlertResult};
use crate::notify::{ChannelConfig, Recipient};
use crate::resilience::{CircuitBreakerConfig, RetryPolicy, DEFAULT_NOTIFY_INTERVAL};
use crate::resolver::{Account, ResolverSettings};
use crate::traffic::DEFAULT_RULES_URL;
use crate::workflow::WorkflowSettings;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub use accounts::{ReloadingAccountSource, DEFAULT_RELOAD_INTERVAL};
pub use loader::{detect_environment, sanitize_json, ConfigManager, ENV_PREFIX};
pub use validation::{ConfigValidator, ValidationReport};

/// Plates are configured in the same shape the dispatcher consumes.
pub type PlateConfig = Recipient;

pub const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub global: GlobalConfig,
    pub jjz_accounts: Vec<AccountConfig>,
    pub plates: Vec<PlateConfig>,
}

impl AppConfig {
    pub fn accounts(&self) -> Vec<Account> {
        self.jjz_accounts.iter().map(AccountConfig::to_account).collect()
    }

    pub fn recipients(&self) -> Vec<Recipient> {
        self.plates.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub log: LogConfig,
    pub cache: CacheConfig,
    pub redis: RedisConfig,
    pub admin: AdminConfig,
    pub remind: RemindConfig,
    pub resolver: ResolverConfig,
    pub circuit_breaker: BreakerConfig,
    pub traffic: TrafficConfig,
    pub notifier: NotifierConfig,
}

/// `level` unset means "pick from the deployment environment".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: Option<String>,
    pub json: bool,
}

/// TTLs in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub push_history_ttl: u64,
    pub push_history_max: usize,
    pub status_ttl: u64,
    pub stats_ttl: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            push_history_ttl: 2_592_000,
            push_history_max: 100,
            status_ttl: 604_800,
            stats_ttl: 2_592_000,
        }
    }
}

impl CacheConfig {
    pub fn to_settings(&self) -> CacheSettings {
        CacheSettings {
            status_ttl: Duration::from_secs(self.status_ttl),
            push_history_ttl: Duration::from_secs(self.push_history_ttl),
            push_history_max: self.push_history_max.max(1),
            stats_ttl: Duration::from_secs(self.stats_ttl),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub notifications: Vec<ChannelConfig>,
    /// Seconds between two admin alerts of the same kind.
    pub notify_interval: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            notifications: Vec::new(),
            notify_interval: DEFAULT_NOTIFY_INTERVAL.as_secs(),
        }
    }
}

impl AdminConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.notify_interval)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemindConfig {
    pub enable: bool,
    /// Daily `HH:MM` run times for the scheduler.
    pub times: Vec<String>,
    pub next_day_cutoff: String,
    pub max_concurrency: usize,
    pub dedup_window_minutes: Option<u64>,
}

impl Default for RemindConfig {
    fn default() -> Self {
        Self {
            enable: true,
            times: vec!["08:00".into(), "12:00".into(), "18:00".into()],
            next_day_cutoff: "20:30".into(),
            max_concurrency: 3,
            dedup_window_minutes: None,
        }
    }
}

pub fn parse_time(value: &str) -> AlertResult<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), TIME_FORMAT)
        .map_err(|_| AlertError::Configuration(format!("invalid time '{value}', expected HH:MM")))
}

impl RemindConfig {
    pub fn cutoff(&self) -> AlertResult<NaiveTime> {
        parse_time(&self.next_day_cutoff)
    }

    /// Run times sorted and deduplicated.
    pub fn schedule_times(&self) -> AlertResult<Vec<NaiveTime>> {
        let mut times = self
            .times
            .iter()
            .map(|t| parse_time(t))
            .collect::<AlertResult<Vec<_>>>()?;
        times.sort();
        times.dedup();
        Ok(times)
    }

    pub fn to_workflow_settings(&self) -> AlertResult<WorkflowSettings> {
        Ok(WorkflowSettings {
            next_day_cutoff: self.cutoff()?,
            max_concurrency: self.max_concurrency.max(1),
            dedup_window_minutes: self.dedup_window_minutes.filter(|m| *m > 0),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Seconds.
    pub query_timeout: u64,
    pub retry: RetryConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            query_timeout: 10,
            retry: RetryConfig::default(),
        }
    }
}

impl ResolverConfig {
    pub fn to_settings(&self) -> ResolverSettings {
        ResolverSettings {
            query_timeout: Duration::from_secs(self.query_timeout.max(1)),
            retry: self.retry.to_policy(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Seconds, fractional allowed.
    pub initial_delay: f64,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: 1.0,
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        let initial_delay = if self.initial_delay.is_finite() && self.initial_delay > 0.0 {
            Duration::from_secs_f64(self.initial_delay)
        } else {
            Duration::ZERO
        };
        RetryPolicy::new(self.max_attempts, initial_delay, self.backoff_factor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    /// Seconds.
    pub timeout: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: 60,
        }
    }
}

impl BreakerConfig {
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new(self.failure_threshold, Duration::from_secs(self.timeout))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    pub url: String,
    pub timeout: u64,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RULES_URL.to_string(),
            timeout: 10,
        }
    }
}

impl TrafficConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Base URL of the apprise-api server; without it apprise channels are rejected.
    pub apprise_api_url: Option<String>,
    pub timeout: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            apprise_api_url: None,
            timeout: 10,
        }
    }
}

impl NotifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    pub jjz: AccountEndpoint,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountEndpoint {
    pub token: String,
    pub url: String,
}

impl fmt::Debug for AccountEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountEndpoint")
            .field("token", &"<redacted>")
            .field("url", &self.url)
            .finish()
    }
}

impl AccountConfig {
    pub fn to_account(&self) -> Account {
        Account {
            name: self.name.clone(),
            token: self.jjz.token.clone(),
            url: self.jjz.url.clone(),
        }
    }
}
