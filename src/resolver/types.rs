//! Permit status records.

use crate::notify::normalize_plate;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upstream account able to list the permits of its vehicles.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub token: String,
    pub url: String,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("name", &self.name)
            .field("token", &"***")
            .field("url", &self.url)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermitState {
    Valid,
    Expired,
    Pending,
    Invalid,
    Error,
    Unknown,
}

impl PermitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermitState::Valid => "valid",
            PermitState::Expired => "expired",
            PermitState::Pending => "pending",
            PermitState::Invalid => "invalid",
            PermitState::Error => "error",
            PermitState::Unknown => "unknown",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PermitState::Valid => "有效",
            PermitState::Expired => "已过期",
            PermitState::Pending => "审核中",
            PermitState::Invalid => "无效",
            PermitState::Error => "错误",
            PermitState::Unknown => "未知",
        }
    }
}

impl fmt::Display for PermitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    #[default]
    Api,
    Cache,
}

/// One permit record for one vehicle as returned by one account.
///
/// Lives only for a single resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountRecord {
    pub account: String,
    pub plate: String,
    pub state_code: String,
    pub state_text: String,
    pub apply_time: String,
    pub valid_start: String,
    pub valid_end: String,
    pub days_remaining: Option<u32>,
    pub remaining_applications: Option<String>,
    pub permit_type: String,
}

/// Reconciled status of one plate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitStatus {
    pub plate: String,
    pub status: PermitState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_applications: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permit_type_raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_state_raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub data_source: DataSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Local>>,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl PermitStatus {
    fn bare(plate: &str, status: PermitState) -> Self {
        Self {
            plate: normalize_plate(plate),
            status,
            apply_time: None,
            valid_start: None,
            valid_end: None,
            days_remaining: None,
            remaining_applications: None,
            permit_type_raw: None,
            processing_state_raw: None,
            error_message: None,
            data_source: DataSource::Api,
            cached_at: None,
        }
    }

    pub fn error(plate: &str, message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::bare(plate, PermitState::Error)
        }
    }

    pub fn invalid(plate: &str, message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::bare(plate, PermitState::Invalid)
        }
    }

    /// Build from the selected record and its derived state.
    ///
    /// Invalid and Error statuses never carry a validity window.
    pub fn from_record(plate: &str, record: &AccountRecord, status: PermitState) -> Self {
        let carries_window = !matches!(status, PermitState::Invalid | PermitState::Error);
        let mut permit = Self {
            apply_time: non_empty(&record.apply_time),
            days_remaining: record.days_remaining,
            remaining_applications: record
                .remaining_applications
                .as_deref()
                .and_then(non_empty),
            permit_type_raw: non_empty(&record.permit_type),
            processing_state_raw: non_empty(&record.state_text),
            ..Self::bare(plate, status)
        };

        if carries_window {
            permit.valid_start = non_empty(&record.valid_start);
            permit.valid_end = non_empty(&record.valid_end);
        } else {
            permit.error_message = Some(match non_empty(&record.state_text) {
                Some(text) => format!("permit not usable: {text}"),
                None => "permit not usable".to_string(),
            });
        }
        permit
    }

    pub fn is_error(&self) -> bool {
        self.status == PermitState::Error
    }

    /// Permit type inside full- or half-width parentheses, e.g. `进京证(六环外)` → `六环外`.
    pub fn permit_type_label(&self) -> String {
        let raw = self.permit_type_raw.as_deref().unwrap_or_default();
        bracketed(raw).unwrap_or(raw).to_string()
    }

    /// Processing state for display: the bracketed part when approved.
    pub fn state_label(&self) -> String {
        let raw = self.processing_state_raw.as_deref().unwrap_or_default();
        if raw.contains(super::derive::APPROVED_MARKER) {
            if let Some(inner) = bracketed(raw) {
                return inner.to_string();
            }
        }
        raw.to_string()
    }
}

fn bracketed(text: &str) -> Option<&str> {
    for (open, close) in [('（', '）'), ('(', ')')] {
        if let Some(start) = text.find(open) {
            let inner_start = start + open.len_utf8();
            if let Some(len) = text[inner_start..].find(close) {
                return Some(&text[inner_start..inner_start + len]);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(state_text: &str, permit_type: &str) -> AccountRecord {
        AccountRecord {
            plate: "京A12345".into(),
            state_code: "1".into(),
            state_text: state_text.into(),
            valid_start: "2025-08-10".into(),
            valid_end: "2025-08-16".into(),
            permit_type: permit_type.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_labels_extract_bracketed_text() {
        let permit = PermitStatus::from_record(
            "京a12345",
            &record("审核通过(生效中)", "进京证（六环内）"),
            PermitState::Valid,
        );
        assert_eq!(permit.plate, "京A12345");
        assert_eq!(permit.permit_type_label(), "六环内");
        assert_eq!(permit.state_label(), "生效中");
    }

    #[test]
    fn test_invalid_never_carries_window() {
        let permit = PermitStatus::from_record("京A12345", &record("审核不通过", "进京证"), PermitState::Invalid);
        assert!(permit.valid_start.is_none());
        assert!(permit.valid_end.is_none());
        assert!(permit.error_message.is_some());
        assert_eq!(permit.state_label(), "审核不通过");
    }
}
