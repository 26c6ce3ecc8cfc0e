//! Error escalation and resilience status reporting.

use crate::error::{AlertError, ErrorSeverity, RecoveryStrategy};
use crate::resilience::{
    CircuitBreakerManager, CircuitBreakerSnapshot, ErrorCollector, ErrorSummary,
    ThrottledAdminNotifier,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Upper bound on how long an escalation may hold up its caller.
pub const DEFAULT_ESCALATION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecoveryStats {
    pub total: u64,
    pub success: u64,
    pub failures: u64,
    pub last_strategy: Option<RecoveryStrategy>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResilienceStatus {
    pub errors: ErrorSummary,
    pub circuit_breakers: Vec<CircuitBreakerSnapshot>,
    pub open_circuits: Vec<String>,
    pub recovery_attempts: BTreeMap<String, RecoveryStats>,
}

/// Records failures, logs them by severity and forwards the serious ones to
/// the throttled admin notifier.
#[derive(Debug)]
pub struct ErrorHandler {
    collector: Arc<ErrorCollector>,
    admin: Option<ThrottledAdminNotifier>,
    escalation_timeout: Duration,
    recovery: Mutex<BTreeMap<String, RecoveryStats>>,
}

impl ErrorHandler {
    pub fn new(collector: Arc<ErrorCollector>, admin: Option<ThrottledAdminNotifier>) -> Self {
        Self {
            collector,
            admin,
            escalation_timeout: DEFAULT_ESCALATION_TIMEOUT,
            recovery: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_escalation_timeout(mut self, timeout: Duration) -> Self {
        self.escalation_timeout = timeout;
        self
    }

    pub fn collector(&self) -> &Arc<ErrorCollector> {
        &self.collector
    }

    /// Handle a failure. Returns true when an admin alert was delivered.
    pub async fn handle(&self, err: &AlertError, context: &str) -> bool {
        self.collector.record(err, context);

        match err.severity() {
            ErrorSeverity::Critical | ErrorSeverity::High => error!(
                kind = %err.kind(),
                code = err.error_code(),
                context,
                error = %err,
                "🚨 High severity failure"
            ),
            ErrorSeverity::Medium => warn!(kind = %err.kind(), context, error = %err, "⚠️ Failure"),
            ErrorSeverity::Low => info!(kind = %err.kind(), context, error = %err, "Minor failure"),
        }

        if !err.should_notify_admin() {
            return false;
        }

        let Some(admin) = &self.admin else {
            return false;
        };

        match tokio::time::timeout(self.escalation_timeout, admin.notify_error(err, context)).await {
            Ok(sent) => sent,
            Err(_) => {
                warn!(
                    kind = %err.kind(),
                    timeout_ms = self.escalation_timeout.as_millis() as u64,
                    "Admin alert timed out"
                );
                false
            }
        }
    }

    pub fn record_recovery(&self, service: &str, strategy: RecoveryStrategy, success: bool) {
        let mut recovery = self.recovery.lock();
        let entry = recovery.entry(service.to_string()).or_default();
        entry.total += 1;
        if success {
            entry.success += 1;
        } else {
            entry.failures += 1;
        }
        entry.last_strategy = Some(strategy);
    }

    pub fn status(&self, breakers: &CircuitBreakerManager) -> ResilienceStatus {
        ResilienceStatus {
            errors: self.collector.summary(),
            circuit_breakers: breakers.snapshots(),
            open_circuits: breakers.open_circuits(),
            recovery_attempts: self.recovery.lock().clone(),
        }
    }
}
