use super::sync::SyncReport;
use crate::notify::PushOutcome;
use crate::resolver::PermitStatus;
use crate::traffic::PlateRestriction;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

pub const SKIP_NO_NEXT_DAY_ACTION: &str = "no_next_day_action_needed";
pub const SKIP_RECENTLY_SENT: &str = "recently_sent";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRequest {
    /// Restrict the run to these plates; `None` runs every configured plate.
    pub plates: Option<Vec<String>>,
    pub force_refresh: bool,
    pub include_sync: bool,
}

impl Default for WorkflowRequest {
    fn default() -> Self {
        Self {
            plates: None,
            force_refresh: false,
            include_sync: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowMode {
    SameDay,
    NextDay,
}

impl fmt::Display for WorkflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkflowMode::SameDay => "same_day",
            WorkflowMode::NextDay => "next_day",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateResult {
    pub plate: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PermitStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restriction: Option<PlateRestriction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push: Option<PushOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlateResult {
    pub fn failed(plate: &str, error: impl Into<String>) -> Self {
        Self {
            plate: plate.to_string(),
            success: false,
            status: None,
            restriction: None,
            push: None,
            skipped: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowReport {
    pub run_id: Uuid,
    pub mode: WorkflowMode,
    pub started_at: DateTime<Local>,
    pub success: bool,
    pub total_plates: usize,
    pub success_plates: usize,
    pub failed_plates: usize,
    pub plate_results: BTreeMap<String, PlateResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_report: Option<SyncReport>,
    pub errors: Vec<String>,
}

impl WorkflowReport {
    pub fn new(mode: WorkflowMode, started_at: DateTime<Local>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            started_at,
            success: false,
            total_plates: 0,
            success_plates: 0,
            failed_plates: 0,
            plate_results: BTreeMap::new(),
            sync_report: None,
            errors: Vec::new(),
        }
    }

    pub fn record(&mut self, result: PlateResult) {
        if result.success {
            self.success_plates += 1;
        } else {
            self.failed_plates += 1;
            if let Some(error) = &result.error {
                self.errors.push(error.clone());
            }
        }
        self.plate_results.insert(result.plate.clone(), result);
        self.success = self.success_plates > 0;
    }
}
