//! Multi-account status resolution.
//!
//! Every account is queried once per pass for all of its vehicles. Records
//! are matched to the requested plates case-insensitively and the record
//! with the greatest apply time wins. Failures never escape: they end in a
//! [`PermitStatus`] with status `Error`.

use super::accounts::AccountSource;
use super::derive::derive_status;
use super::parse::parse_account_response;
use super::types::{Account, AccountRecord, PermitState, PermitStatus};
use crate::cache::PermitCache;
use crate::clock::SharedClock;
use crate::error::{is_token_error, AlertError, AlertResult, RecoveryStrategy};
use crate::http::HttpClient;
use crate::notify::normalize_plate;
use crate::resilience::{CircuitBreakerManager, ErrorHandler, RetryPolicy};
use chrono::NaiveDate;
use futures::future::join_all;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const NO_ACCOUNTS: &str = "no accounts configured";
pub const NO_MATCHING_RECORD: &str = "no matching record";
const SERVICE_NAME: &str = "status_resolver";

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub query_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

/// Outcome of querying one account.
type AccountOutcome = (String, AlertResult<Vec<AccountRecord>>);

pub struct StatusResolver {
    accounts: Arc<dyn AccountSource>,
    http: Arc<dyn HttpClient>,
    cache: PermitCache,
    breakers: Arc<CircuitBreakerManager>,
    errors: Arc<ErrorHandler>,
    clock: SharedClock,
    settings: ResolverSettings,
}

impl StatusResolver {
    pub fn new(
        accounts: Arc<dyn AccountSource>,
        http: Arc<dyn HttpClient>,
        cache: PermitCache,
        breakers: Arc<CircuitBreakerManager>,
        errors: Arc<ErrorHandler>,
        clock: SharedClock,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            accounts,
            http,
            cache,
            breakers,
            errors,
            clock,
            settings,
        }
    }

    pub fn cache(&self) -> &PermitCache {
        &self.cache
    }

    pub async fn configured_accounts(&self) -> AlertResult<Vec<Account>> {
        self.accounts.accounts().await
    }

    async fn query_account(&self, account: &Account) -> AlertResult<Vec<AccountRecord>> {
        let breaker = self
            .breakers
            .get_circuit_breaker(&format!("account:{}", account.name));
        let headers = vec![
            ("Authorization".to_string(), account.token.clone()),
            ("Content-Type".to_string(), "application/json".to_string()),
        ];
        let timeout = self.settings.query_timeout;

        let result = breaker
            .call(|| async {
                let body = json!({});
                let response = tokio::time::timeout(
                    timeout,
                    self.http.post_json(&account.url, &headers, &body, timeout),
                )
                .await
                .map_err(|_| {
                    AlertError::Network(format!("query timed out after {}s", timeout.as_secs()))
                })??;
                parse_account_response(&account.name, &response)
            })
            .await
            .map_err(|e| e.into_inner(|component| AlertError::CircuitOpen { component }));

        result.map_err(|e| classify_account_error(&account.name, e))
    }

    /// Query every account to completion, concurrently.
    async fn sweep(&self, accounts: &[Account]) -> Vec<AccountOutcome> {
        let queries = accounts.iter().map(|account| async move {
            let result = self.query_account(account).await;
            match &result {
                Ok(records) => debug!(account = %account.name, records = records.len(), "Account queried"),
                Err(e) => warn!(account = %account.name, error = %e, "❌ Account query failed"),
            }
            (account.name.clone(), result)
        });
        join_all(queries).await
    }

    fn reconcile(&self, plate: &str, outcomes: &[AccountOutcome], today: NaiveDate) -> PermitStatus {
        let plate = normalize_plate(plate);

        if !outcomes.is_empty() && outcomes.iter().all(|(_, result)| result.is_err()) {
            let message = outcomes
                .iter()
                .rev()
                .find_map(|(_, result)| result.as_ref().err().map(AlertError::message))
                .unwrap_or_default();
            return PermitStatus::error(&plate, message);
        }

        let candidates: Vec<&AccountRecord> = outcomes
            .iter()
            .filter_map(|(_, result)| result.as_ref().ok())
            .flatten()
            .filter(|record| normalize_plate(&record.plate) == plate)
            .collect();

        let Some(selected) = select_latest(&candidates) else {
            return PermitStatus::invalid(&plate, NO_MATCHING_RECORD);
        };

        for dropped in candidates.iter().filter(|r| !std::ptr::eq(**r, selected)) {
            debug!(
                plate = %plate,
                account = %dropped.account,
                apply_time = %dropped.apply_time,
                kept_apply_time = %selected.apply_time,
                "Dropping older permit record"
            );
        }

        let state = derive_status(
            &selected.state_code,
            &selected.state_text,
            &selected.valid_start,
            &selected.valid_end,
            today,
        );
        PermitStatus::from_record(&plate, selected, state)
    }

    async fn persist(&self, status: &PermitStatus) {
        if status.is_error() {
            return;
        }
        if let Err(e) = self.cache.store_status(status).await {
            warn!(plate = %status.plate, error = %e, "Failed to cache permit status");
        }
    }

    async fn escalate_failures(&self, outcomes: &[AccountOutcome], context: &str) {
        for (_, result) in outcomes {
            if let Err(e) = result {
                self.errors.handle(e, context).await;
            }
        }
    }

    /// Resolve every plate in one pass over all accounts.
    pub async fn resolve_many(&self, plates: &[String]) -> HashMap<String, PermitStatus> {
        let accounts = match self.accounts.accounts().await {
            Ok(accounts) => accounts,
            Err(e) => {
                self.errors.handle(&e, "resolve_many").await;
                return error_for_all(plates, &e.message());
            }
        };

        if accounts.is_empty() {
            warn!("No upstream accounts configured");
            self.errors
                .handle(&AlertError::Configuration(NO_ACCOUNTS.to_string()), "resolve_many")
                .await;
            return error_for_all(plates, NO_ACCOUNTS);
        }

        let outcomes = self.sweep(&accounts).await;
        self.escalate_failures(&outcomes, "resolve_many").await;

        let today = self.clock.today();
        let mut statuses = HashMap::with_capacity(plates.len());
        for plate in plates {
            let status = self.reconcile(plate, &outcomes, today);
            self.persist(&status).await;
            statuses.insert(status.plate.clone(), status);
        }

        info!(
            plates = plates.len(),
            accounts = accounts.len(),
            failed_accounts = outcomes.iter().filter(|(_, r)| r.is_err()).count(),
            "✅ Permit statuses resolved"
        );
        statuses
    }

    async fn attempt_one(&self, plate: &str) -> AlertResult<(PermitStatus, Vec<AlertError>)> {
        let accounts = self.accounts.accounts().await?;
        if accounts.is_empty() {
            return Err(AlertError::Configuration(NO_ACCOUNTS.to_string()));
        }

        let outcomes = self.sweep(&accounts).await;
        let mut failures: Vec<AlertError> = outcomes
            .iter()
            .filter_map(|(_, result)| result.as_ref().err().cloned())
            .collect();

        if failures.len() == outcomes.len() {
            // the last account in configuration order decides the reported error
            return Err(failures.pop().unwrap_or_else(|| AlertError::Internal(NO_ACCOUNTS.to_string())));
        }

        Ok((self.reconcile(plate, &outcomes, self.clock.today()), failures))
    }

    /// Resolve a single plate with retry on retryable failures.
    pub async fn resolve_one(&self, plate: &str) -> PermitStatus {
        let policy = &self.settings.retry;
        match policy.run("resolve_one", || self.attempt_one(plate)).await {
            Ok((status, failures)) => {
                for failure in failures.iter().filter(|e| e.is_credential_error()) {
                    self.errors.handle(failure, "resolve_one").await;
                }
                self.errors.record_recovery(SERVICE_NAME, RecoveryStrategy::Retry, true);
                self.persist(&status).await;
                status
            }
            Err(e) => {
                error!(plate, error = %e, "❌ Permit status resolution failed");
                self.errors.record_recovery(SERVICE_NAME, e.recovery_strategy(), false);
                self.errors.handle(&e, "resolve_one").await;
                PermitStatus::error(plate, e.message())
            }
        }
    }

    /// Drop the cached entry and resolve again.
    pub async fn refresh(&self, plate: &str) -> PermitStatus {
        if let Err(e) = self.cache.delete_status(plate).await {
            warn!(plate, error = %e, "Failed to drop cached permit status");
        }
        self.resolve_one(plate).await
    }

    pub async fn cached_status(&self, plate: &str) -> Option<PermitStatus> {
        self.cache.load_status(plate).await
    }

    pub async fn cached_plates(&self) -> AlertResult<Vec<String>> {
        self.cache.cached_plates().await
    }

    /// Cached valid permits with at most `days_threshold` days left.
    pub async fn expiring(&self, days_threshold: u32) -> Vec<PermitStatus> {
        let plates = match self.cache.cached_plates().await {
            Ok(plates) => plates,
            Err(e) => {
                warn!(error = %e, "Failed to list cached plates");
                return Vec::new();
            }
        };

        let mut expiring = Vec::new();
        for plate in plates {
            if let Some(status) = self.cache.load_status(&plate).await {
                let due = status.days_remaining.is_some_and(|days| days <= days_threshold);
                if status.status == PermitState::Valid && due {
                    expiring.push(status);
                }
            }
        }
        expiring
    }
}

fn classify_account_error(account: &str, error: AlertError) -> AlertError {
    match error {
        AlertError::CircuitOpen { .. } | AlertError::Credential { .. } => error,
        other if is_token_error(&other.message()) => AlertError::Credential {
            account: account.to_string(),
            message: other.message(),
        },
        other => other,
    }
}

/// Greatest apply time wins; an empty apply time sorts lowest, ties keep the first seen.
fn select_latest<'a>(candidates: &[&'a AccountRecord]) -> Option<&'a AccountRecord> {
    candidates.iter().copied().fold(None, |best, record| match best {
        Some(current) if current.apply_time >= record.apply_time => Some(current),
        _ => Some(record),
    })
}

fn error_for_all(plates: &[String], message: &str) -> HashMap<String, PermitStatus> {
    plates
        .iter()
        .map(|plate| {
            let status = PermitStatus::error(plate, message);
            (status.plate.clone(), status)
        })
        .collect()
}
