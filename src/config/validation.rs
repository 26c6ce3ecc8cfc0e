//! Static checks over a parsed [`AppConfig`].
//!
//! Errors make the configuration unusable and fail the load. Warnings are
//! logged and the load proceeds.

use super::{parse_time, AppConfig};
use crate::error::{AlertError, AlertResult};
use crate::notify::channel::normalize_plate;
use crate::notify::notifier::is_valid_service_url;
use crate::notify::ChannelConfig;
use serde::Serialize;
use std::collections::HashSet;

/// Push history shorter than a day cannot back the dedup window.
const MIN_PUSH_HISTORY_TTL: u64 = 86_400;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> AlertResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AlertError::Configuration(self.errors.join("; ")))
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

fn is_http_url(url: &str) -> bool {
    (url.starts_with("http://") || url.starts_with("https://")) && is_valid_service_url(url)
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &AppConfig) -> ValidationReport {
        let mut report = ValidationReport::default();
        Self::check_accounts(config, &mut report);
        Self::check_plates(config, &mut report);
        Self::check_global(config, &mut report);
        report
    }

    fn check_accounts(config: &AppConfig, report: &mut ValidationReport) {
        if config.jjz_accounts.is_empty() {
            report.warning("no jjz_accounts configured; every plate will resolve to an error");
        }

        let mut names = HashSet::new();
        for (index, account) in config.jjz_accounts.iter().enumerate() {
            let name = account.name.trim();
            if name.is_empty() {
                report.error(format!("jjz_accounts[{index}] has an empty name"));
            } else if !names.insert(name.to_string()) {
                report.error(format!("duplicate account name '{name}'"));
            }
            if account.jjz.token.trim().is_empty() {
                report.error(format!("account '{name}' has no token"));
            }
            if account.jjz.url.trim().is_empty() {
                report.error(format!("account '{name}' has no url"));
            } else if !is_http_url(&account.jjz.url) {
                report.error(format!("account '{name}' url is not an http(s) URL"));
            }
        }
    }

    fn check_plates(config: &AppConfig, report: &mut ValidationReport) {
        if config.plates.is_empty() {
            report.warning("no plates configured; runs will do nothing");
        }

        let mut plates = HashSet::new();
        for (index, recipient) in config.plates.iter().enumerate() {
            let plate = normalize_plate(&recipient.plate);
            if plate.is_empty() {
                report.error(format!("plates[{index}] has an empty plate"));
                continue;
            }
            if !plates.insert(plate.clone()) {
                report.error(format!("duplicate plate '{plate}'"));
            }
            if recipient.notifications.is_empty() {
                report.warning(format!("plate '{plate}' has no notification channels"));
            }
            Self::check_channels(&format!("plate '{plate}'"), &recipient.notifications, report);
        }
    }

    fn check_channels(owner: &str, channels: &[ChannelConfig], report: &mut ValidationReport) {
        for channel in channels {
            match channel {
                ChannelConfig::Apprise { urls } => {
                    if urls.is_empty() {
                        report.error(format!("{owner}: apprise channel has no urls"));
                    }
                    let malformed = urls.iter().filter(|u| !is_valid_service_url(u)).count();
                    if malformed > 0 {
                        report.warning(format!(
                            "{owner}: {malformed} apprise url(s) are malformed and will be skipped"
                        ));
                    }
                }
                ChannelConfig::Webhook { url, .. } => {
                    if !is_http_url(url) {
                        report.error(format!("{owner}: webhook url is not an http(s) URL"));
                    }
                }
            }
        }
    }

    fn check_global(config: &AppConfig, report: &mut ValidationReport) {
        let global = &config.global;

        for time in &global.remind.times {
            if parse_time(time).is_err() {
                report.error(format!("remind.times entry '{time}' is not HH:MM"));
            }
        }
        if parse_time(&global.remind.next_day_cutoff).is_err() {
            report.error(format!(
                "remind.next_day_cutoff '{}' is not HH:MM",
                global.remind.next_day_cutoff
            ));
        }
        if global.remind.max_concurrency == 0 {
            report.warning("remind.max_concurrency is 0; using 1");
        }

        let retry = &global.resolver.retry;
        if retry.max_attempts == 0 {
            report.error("resolver.retry.max_attempts must be at least 1");
        }
        if !retry.initial_delay.is_finite() || retry.initial_delay < 0.0 {
            report.error("resolver.retry.initial_delay must be a non-negative number");
        }
        if !retry.backoff_factor.is_finite() || retry.backoff_factor < 1.0 {
            report.error("resolver.retry.backoff_factor must be at least 1");
        }
        if global.resolver.query_timeout == 0 {
            report.error("resolver.query_timeout must be greater than 0");
        }

        if let Err(message) = global.circuit_breaker.to_breaker_config().validate() {
            report.error(format!("circuit_breaker: {message}"));
        }

        if global.cache.push_history_ttl < MIN_PUSH_HISTORY_TTL {
            report.warning(format!(
                "cache.push_history_ttl of {}s is shorter than a day",
                global.cache.push_history_ttl
            ));
        }
        if global.cache.push_history_max == 0 {
            report.error("cache.push_history_max must be at least 1");
        }

        if global.admin.notifications.is_empty() {
            report.warning("no admin notifications configured; failures will only be logged");
        }
        Self::check_channels("admin", &global.admin.notifications, report);

        if !is_http_url(&global.traffic.url) {
            report.error("traffic.url is not an http(s) URL");
        }

        if let Some(url) = &global.notifier.apprise_api_url {
            if !is_http_url(url) {
                report.error("notifier.apprise_api_url is not an http(s) URL");
            }
        } else if Self::uses_apprise(config) {
            report.warning("apprise channels configured without notifier.apprise_api_url; they will fail");
        }

        if let Some(url) = &global.redis.url {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                report.error("redis.url must start with redis:// or rediss://");
            }
        }
    }

    fn uses_apprise(config: &AppConfig) -> bool {
        config
            .plates
            .iter()
            .flat_map(|p| p.notifications.iter())
            .chain(config.global.admin.notifications.iter())
            .any(ChannelConfig::is_multi_target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccountConfig, AccountEndpoint};
    use crate::notify::Recipient;

    fn account(name: &str, token: &str, url: &str) -> AccountConfig {
        AccountConfig {
            name: name.into(),
            jjz: AccountEndpoint {
                token: token.into(),
                url: url.into(),
            },
        }
    }

    fn apprise(urls: &[&str]) -> ChannelConfig {
        ChannelConfig::Apprise {
            urls: urls.iter().map(|u| u.to_string()).collect(),
        }
    }

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.jjz_accounts = vec![account("main", "t", "https://jjz.example.com/api")];
        config.plates = vec![Recipient::new("京A12345", vec![apprise(&["bark://api.day.app/k"])])];
        config.global.admin.notifications = vec![apprise(&["bark://api.day.app/admin"])];
        config.global.notifier.apprise_api_url = Some("http://apprise:8000".into());
        config
    }

    #[test]
    fn test_valid_config_has_no_findings() {
        let report = ConfigValidator::validate(&valid_config());
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    }

    #[test]
    fn test_duplicates_and_missing_credentials_are_errors() {
        let mut config = valid_config();
        config.jjz_accounts.push(account("main", "", "ftp://nope"));
        config.plates.push(Recipient::new(" 京a12345 ", vec![]));

        let report = ConfigValidator::validate(&config);
        assert!(report.errors.iter().any(|e| e.contains("duplicate account name")));
        assert!(report.errors.iter().any(|e| e.contains("has no token")));
        assert!(report.errors.iter().any(|e| e.contains("not an http(s) URL")));
        assert!(report.errors.iter().any(|e| e.contains("duplicate plate '京A12345'")));
        assert!(report.warnings.iter().any(|w| w.contains("no notification channels")));
    }

    #[test]
    fn test_retry_and_breaker_bounds() {
        let mut config = valid_config();
        config.global.resolver.retry.max_attempts = 0;
        config.global.resolver.retry.backoff_factor = 0.5;
        config.global.circuit_breaker.failure_threshold = 0;

        let report = ConfigValidator::validate(&config);
        assert_eq!(report.errors.len(), 3, "{:?}", report.errors);
        assert!(report.into_result().is_err());
    }

    #[test]
    fn test_malformed_apprise_target_is_only_a_warning() {
        let mut config = valid_config();
        config.plates[0].notifications = vec![apprise(&["bark://api.day.app/k", "garbage"])];

        let report = ConfigValidator::validate(&config);
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.contains("malformed")));
    }

    #[test]
    fn test_empty_config_warns_without_failing() {
        let report = ConfigValidator::validate(&AppConfig::default());
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.contains("no jjz_accounts")));
        assert!(report.warnings.iter().any(|w| w.contains("no plates")));
    }
}
