//! Downstream sync collaborator.

use crate::error::AlertResult;
use crate::resolver::PermitStatus;
use crate::traffic::PlateRestriction;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub total_plates: usize,
    pub success_plates: usize,
    pub failed_plates: usize,
    /// Per-plate outcome, keyed by normalized plate.
    pub results: BTreeMap<String, bool>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl SyncReport {
    pub fn from_results(results: BTreeMap<String, bool>, errors: Vec<String>) -> Self {
        let success_plates = results.values().filter(|ok| **ok).count();
        Self {
            total_plates: results.len(),
            success_plates,
            failed_plates: results.len() - success_plates,
            results,
            errors,
        }
    }
}

/// Receives the resolved statuses at most once per run.
#[async_trait]
pub trait DownstreamSync: Send + Sync {
    async fn sync(
        &self,
        statuses: &HashMap<String, PermitStatus>,
        restrictions: &HashMap<String, PlateRestriction>,
    ) -> AlertResult<SyncReport>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSync;

#[async_trait]
impl DownstreamSync for NoopSync {
    async fn sync(
        &self,
        statuses: &HashMap<String, PermitStatus>,
        _restrictions: &HashMap<String, PlateRestriction>,
    ) -> AlertResult<SyncReport> {
        let results = statuses.keys().map(|plate| (plate.clone(), true)).collect();
        Ok(SyncReport::from_results(results, Vec::new()))
    }
}
