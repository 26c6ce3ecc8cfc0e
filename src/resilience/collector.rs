//! Bounded in-memory record of recent errors for diagnostics.

use crate::clock::SharedClock;
use crate::error::{AlertError, ErrorKind};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};

pub const DEFAULT_MAX_ERRORS: usize = 100;
const SUMMARY_RECENT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Local>,
    pub kind: ErrorKind,
    pub message: String,
    pub context: String,
    pub error_code: String,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorSummary {
    pub total_errors: usize,
    pub error_counts: HashMap<ErrorKind, u64>,
    pub recent_errors: Vec<ErrorRecord>,
}

#[derive(Debug, Default)]
struct CollectorState {
    records: VecDeque<ErrorRecord>,
    counts: HashMap<ErrorKind, u64>,
}

#[derive(Debug)]
pub struct ErrorCollector {
    max_errors: usize,
    clock: SharedClock,
    state: Mutex<CollectorState>,
}

impl ErrorCollector {
    pub fn new(clock: SharedClock) -> Self {
        Self::with_capacity(DEFAULT_MAX_ERRORS, clock)
    }

    pub fn with_capacity(max_errors: usize, clock: SharedClock) -> Self {
        Self {
            max_errors: max_errors.max(1),
            clock,
            state: Mutex::new(CollectorState::default()),
        }
    }

    pub fn record(&self, error: &AlertError, context: &str) {
        let record = ErrorRecord {
            timestamp: self.clock.now(),
            kind: error.kind(),
            message: error.message(),
            context: context.to_string(),
            error_code: error.error_code().to_string(),
            details: error.details(),
        };

        let mut state = self.state.lock();
        *state.counts.entry(record.kind).or_insert(0) += 1;
        state.records.push_back(record);
        while state.records.len() > self.max_errors {
            state.records.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recent `limit` records, newest last.
    pub fn recent(&self, limit: usize) -> Vec<ErrorRecord> {
        let state = self.state.lock();
        let skip = state.records.len().saturating_sub(limit);
        state.records.iter().skip(skip).cloned().collect()
    }

    pub fn summary(&self) -> ErrorSummary {
        let recent_errors = self.recent(SUMMARY_RECENT);
        let state = self.state.lock();
        ErrorSummary {
            total_errors: state.records.len(),
            error_counts: state.counts.clone(),
            recent_errors,
        }
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.records.clear();
        state.counts.clear();
    }
}
