//! Dispatch outcomes, aggregated target → channel → recipient.

use crate::notify::notifier::{is_valid_target, NotifierOutcome, TargetResult, INVALID_TARGET};
use crate::notify::placeholders::mask_target;
use crate::notify::{ChannelKind, PushPriority};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MESSAGE_TYPE: &str = "permit_status";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelResult {
    pub channel: ChannelKind,
    pub success: bool,
    pub valid_targets: usize,
    pub invalid_targets: usize,
    pub target_results: Vec<TargetResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Local>,
    pub duration_ms: u64,
}

impl ChannelResult {
    pub fn from_outcome(
        channel: ChannelKind,
        outcome: NotifierOutcome,
        timestamp: DateTime<Local>,
        duration_ms: u64,
    ) -> Self {
        Self {
            channel,
            success: outcome.success,
            valid_targets: outcome.valid_targets,
            invalid_targets: outcome.invalid_targets,
            target_results: outcome.target_results,
            error: outcome.error,
            timestamp,
            duration_ms,
        }
    }

    /// Channel that was never handed to a notifier. Targets are still split
    /// by the notifier's own validity rule.
    pub fn rejected(
        channel: ChannelKind,
        targets: &[String],
        error: impl Into<String>,
        timestamp: DateTime<Local>,
    ) -> Self {
        let target_results: Vec<TargetResult> = targets
            .iter()
            .filter(|t| !is_valid_target(channel, t))
            .map(|t| TargetResult {
                target: mask_target(t),
                valid: false,
                success: false,
                error: Some(INVALID_TARGET.to_string()),
            })
            .collect();

        Self {
            channel,
            success: false,
            valid_targets: targets.len() - target_results.len(),
            invalid_targets: target_results.len(),
            target_results,
            error: Some(error.into()),
            timestamp,
            duration_ms: 0,
        }
    }

    pub fn success_count(&self) -> usize {
        self.target_results.iter().filter(|r| r.success).count()
    }

    pub fn total_count(&self) -> usize {
        self.valid_targets + self.invalid_targets
    }
}

/// Aggregated result of one dispatch to one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushOutcome {
    pub plate: String,
    pub success: bool,
    pub success_count: usize,
    pub total_count: usize,
    pub channels: Vec<ChannelResult>,
    pub errors: Vec<String>,
}

impl PushOutcome {
    pub fn aggregate(plate: &str, channels: Vec<ChannelResult>) -> Self {
        let success_count = channels.iter().map(ChannelResult::success_count).sum();
        let total_count = channels.iter().map(ChannelResult::total_count).sum();
        let any_channel_ok = channels.iter().any(|c| c.success);
        let errors = channels
            .iter()
            .filter_map(|c| c.error.as_ref().map(|e| format!("{}: {e}", c.channel)))
            .collect();

        Self {
            plate: plate.to_string(),
            success: success_count > 0 || any_channel_ok,
            success_count,
            total_count,
            channels,
            errors,
        }
    }

    pub fn invalid_targets(&self) -> usize {
        self.channels.iter().map(|c| c.invalid_targets).sum()
    }
}

/// Summary of one dispatch kept in the per-plate history list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushHistoryEntry {
    pub plate: String,
    pub timestamp: DateTime<Local>,
    pub title: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    #[serde(default)]
    pub priority: PushPriority,
    pub success_count: usize,
    pub total_count: usize,
    #[serde(default)]
    pub errors: Vec<String>,
}

fn default_message_type() -> String {
    DEFAULT_MESSAGE_TYPE.to_string()
}

impl PushHistoryEntry {
    pub fn from_outcome(
        outcome: &PushOutcome,
        title: &str,
        message_type: &str,
        priority: PushPriority,
        timestamp: DateTime<Local>,
    ) -> Self {
        Self {
            plate: outcome.plate.clone(),
            timestamp,
            title: title.to_string(),
            message_type: message_type.to_string(),
            priority,
            success_count: outcome.success_count,
            total_count: outcome.total_count,
            errors: outcome.errors.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(success: bool, valid: bool) -> TargetResult {
        TargetResult {
            target: "bark://h/****".into(),
            valid,
            success,
            error: None,
        }
    }

    #[test]
    fn test_aggregate_counts_across_channels() {
        let now = Local::now();
        let apprise = ChannelResult {
            channel: ChannelKind::Apprise,
            success: true,
            valid_targets: 1,
            invalid_targets: 1,
            target_results: vec![target(false, false), target(true, true)],
            error: None,
            timestamp: now,
            duration_ms: 3,
        };
        let webhook = ChannelResult::rejected(
            ChannelKind::Webhook,
            &["https://hooks.test/jjz".to_string()],
            "circuit open",
            now,
        );

        let outcome = PushOutcome::aggregate("京A12345", vec![apprise, webhook]);
        assert!(outcome.success);
        assert_eq!(outcome.success_count, 1);
        assert_eq!(outcome.total_count, 3);
        assert_eq!(outcome.invalid_targets(), 1);
        assert_eq!(outcome.errors, vec!["webhook: circuit open"]);
    }

    #[test]
    fn test_rejected_channel_splits_targets_by_validity() {
        let targets = vec![
            "bark://api.day.app/key-one".to_string(),
            "not a url".to_string(),
            "missing-scheme".to_string(),
        ];
        let apprise = ChannelResult::rejected(ChannelKind::Apprise, &targets, "circuit open", Local::now());
        assert_eq!((apprise.valid_targets, apprise.invalid_targets), (1, 2));
        assert_eq!(apprise.total_count(), 3);
        assert!(apprise.target_results.iter().all(|r| !r.valid && !r.success));

        let webhook = ChannelResult::rejected(
            ChannelKind::Webhook,
            &["bark://api.day.app/key-one".to_string()],
            "circuit open",
            Local::now(),
        );
        assert_eq!((webhook.valid_targets, webhook.invalid_targets), (0, 1));
    }

    #[test]
    fn test_channel_success_without_targets_counts() {
        let outcome = PushOutcome::aggregate(
            "P",
            vec![ChannelResult {
                channel: ChannelKind::Webhook,
                success: true,
                valid_targets: 0,
                invalid_targets: 0,
                target_results: vec![],
                error: None,
                timestamp: Local::now(),
                duration_ms: 0,
            }],
        );
        assert!(outcome.success);
        assert_eq!(outcome.success_count, 0);
    }

    #[test]
    fn test_history_entry_defaults_message_type() {
        let entry: PushHistoryEntry = serde_json::from_str(
            r#"{"plate":"P","timestamp":"2025-08-15T08:00:00+08:00","title":"t","success_count":1,"total_count":1}"#,
        )
        .unwrap();
        assert_eq!(entry.message_type, DEFAULT_MESSAGE_TYPE);
        assert_eq!(entry.priority, PushPriority::Normal);
    }
}
