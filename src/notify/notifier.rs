//! Channel notifier collaborators.
//!
//! A notifier validates its own targets, sends once for the whole list and
//! reports per-target outcomes. Malformed targets are counted invalid and
//! never attempted.

use crate::http::HttpClient;
use crate::notify::placeholders::mask_target;
use crate::notify::{ChannelKind, PushPriority};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const INVALID_TARGET: &str = "invalid target format";
pub const NO_VALID_TARGETS: &str = "no valid targets";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetResult {
    /// Masked target, safe to log and persist.
    pub target: String,
    pub valid: bool,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotifierOutcome {
    pub success: bool,
    pub valid_targets: usize,
    pub invalid_targets: usize,
    pub target_results: Vec<TargetResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NotifierOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn success_count(&self) -> usize {
        self.target_results.iter().filter(|r| r.success).count()
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// `headers` are extra request headers configured on the channel.
    async fn send(
        &self,
        targets: &[String],
        headers: &[(String, String)],
        title: &str,
        body: &str,
        priority: PushPriority,
    ) -> NotifierOutcome;
}

/// `scheme://rest` with an alphanumeric scheme and no whitespace.
pub fn is_valid_service_url(target: &str) -> bool {
    let Some((scheme, rest)) = target.split_once("://") else {
        return false;
    };
    let scheme_ok = scheme
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    scheme_ok && !rest.is_empty() && !target.chars().any(char::is_whitespace)
}

fn is_valid_http_url(target: &str) -> bool {
    (target.starts_with("http://") || target.starts_with("https://")) && is_valid_service_url(target)
}

/// Target check applied by the notifier of `kind`.
pub fn is_valid_target(kind: ChannelKind, target: &str) -> bool {
    match kind {
        ChannelKind::Apprise => is_valid_service_url(target),
        ChannelKind::Webhook => is_valid_http_url(target),
    }
}

/// Split targets by validity, recording invalid ones up front.
fn partition_targets(
    targets: &[String],
    validate: fn(&str) -> bool,
) -> (Vec<String>, Vec<TargetResult>) {
    let mut valid = Vec::new();
    let mut results = Vec::new();
    for target in targets {
        if validate(target) {
            valid.push(target.clone());
        } else {
            warn!(target = %mask_target(target), "Invalid notifier target");
            results.push(TargetResult {
                target: mask_target(target),
                valid: false,
                success: false,
                error: Some(INVALID_TARGET.to_string()),
            });
        }
    }
    (valid, results)
}

/// Sends through an apprise-api server (`POST {server}/notify/`).
pub struct AppriseApiNotifier {
    http: Arc<dyn HttpClient>,
    endpoint: String,
    timeout: Duration,
}

impl AppriseApiNotifier {
    pub fn new(http: Arc<dyn HttpClient>, server_url: &str, timeout: Duration) -> Self {
        Self {
            http,
            endpoint: format!("{}/notify/", server_url.trim_end_matches('/')),
            timeout,
        }
    }
}

#[async_trait]
impl Notifier for AppriseApiNotifier {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Apprise
    }

    async fn send(
        &self,
        targets: &[String],
        _headers: &[(String, String)],
        title: &str,
        body: &str,
        priority: PushPriority,
    ) -> NotifierOutcome {
        let (valid, mut target_results) = partition_targets(targets, |t| is_valid_target(ChannelKind::Apprise, t));
        let invalid_targets = target_results.len();

        if valid.is_empty() {
            return NotifierOutcome {
                invalid_targets,
                target_results,
                ..NotifierOutcome::failed(NO_VALID_TARGETS)
            };
        }

        let notification_type = match priority {
            PushPriority::Normal => "info",
            PushPriority::High => "warning",
        };
        let payload = json!({
            "urls": valid.join(","),
            "title": title,
            "body": body,
            "type": notification_type,
        });

        debug!(valid_targets = valid.len(), "Sending apprise notification");
        let result = self
            .http
            .post_json(&self.endpoint, &[], &payload, self.timeout)
            .await;

        let (success, error) = match result {
            Ok(_) => {
                info!(valid_targets = valid.len(), "✅ Apprise notification sent");
                (true, None)
            }
            Err(e) => {
                error!(valid_targets = valid.len(), error = %e, "❌ Apprise notification failed");
                (false, Some(e.message()))
            }
        };

        target_results.extend(valid.iter().map(|target| TargetResult {
            target: mask_target(target),
            valid: true,
            success,
            error: error.clone(),
        }));

        NotifierOutcome {
            success,
            valid_targets: valid.len(),
            invalid_targets,
            target_results,
            error,
        }
    }
}

/// Posts a JSON envelope to each HTTP(S) target.
pub struct WebhookNotifier {
    http: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(http: Arc<dyn HttpClient>, timeout: Duration) -> Self {
        Self { http, timeout }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    async fn send(
        &self,
        targets: &[String],
        headers: &[(String, String)],
        title: &str,
        body: &str,
        priority: PushPriority,
    ) -> NotifierOutcome {
        let (valid, mut target_results) = partition_targets(targets, |t| is_valid_target(ChannelKind::Webhook, t));
        let invalid_targets = target_results.len();

        if valid.is_empty() {
            return NotifierOutcome {
                invalid_targets,
                target_results,
                ..NotifierOutcome::failed(NO_VALID_TARGETS)
            };
        }

        let payload = json!({
            "title": title,
            "body": body,
            "priority": priority.as_str(),
            "sound": priority.default_sound(),
        });

        let mut last_error = None;
        for target in &valid {
            let result = self.http.post_json(target, headers, &payload, self.timeout).await;
            let error = result.err().map(|e| e.message());
            if let Some(message) = &error {
                warn!(target = %mask_target(target), error = %message, "Webhook delivery failed");
                last_error = Some(message.clone());
            }
            target_results.push(TargetResult {
                target: mask_target(target),
                valid: true,
                success: error.is_none(),
                error,
            });
        }

        let success = target_results.iter().any(|r| r.success);
        NotifierOutcome {
            success,
            valid_targets: valid.len(),
            invalid_targets,
            target_results,
            error: if success { None } else { last_error },
        }
    }
}
