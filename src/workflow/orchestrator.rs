//! Run sequencing: resolve, check restrictions, compose, dispatch, sync.
//!
//! Recipients are processed concurrently up to `max_concurrency`. After the
//! cutoff time the run switches to next-day messaging.

use super::sync::DownstreamSync;
use super::types::{
    PlateResult, WorkflowMode, WorkflowReport, WorkflowRequest, SKIP_NO_NEXT_DAY_ACTION,
    SKIP_RECENTLY_SENT,
};
use crate::clock::SharedClock;
use crate::error::AlertError;
use crate::notify::{
    normalize_plate, DispatchOptions, MessageComposer, PushDispatcher, Recipient, RestrictionDay,
};
use crate::resilience::ErrorHandler;
use crate::resolver::derive::parse_date;
use crate::resolver::{PermitStatus, StatusResolver};
use crate::traffic::{PlateRestriction, TrafficChecker};
use chrono::{NaiveDate, NaiveTime};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

pub const NO_PLATES: &str = "no plates configured";

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub next_day_cutoff: NaiveTime,
    pub max_concurrency: usize,
    pub dedup_window_minutes: Option<u64>,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            next_day_cutoff: NaiveTime::from_hms_opt(20, 30, 0).unwrap_or_default(),
            max_concurrency: 3,
            dedup_window_minutes: None,
        }
    }
}

pub struct WorkflowOrchestrator {
    recipients: Vec<Recipient>,
    resolver: Arc<StatusResolver>,
    traffic: Arc<TrafficChecker>,
    dispatcher: Arc<PushDispatcher>,
    sync: Arc<dyn DownstreamSync>,
    errors: Arc<ErrorHandler>,
    clock: SharedClock,
    settings: WorkflowSettings,
    composer: MessageComposer,
}

/// Inputs shared by every recipient task of one run.
struct RunContext<'a> {
    mode: WorkflowMode,
    today: NaiveDate,
    statuses: &'a HashMap<String, PermitStatus>,
    restrictions: &'a HashMap<String, PlateRestriction>,
}

impl WorkflowOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        recipients: Vec<Recipient>,
        resolver: Arc<StatusResolver>,
        traffic: Arc<TrafficChecker>,
        dispatcher: Arc<PushDispatcher>,
        sync: Arc<dyn DownstreamSync>,
        errors: Arc<ErrorHandler>,
        clock: SharedClock,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            recipients,
            resolver,
            traffic,
            dispatcher,
            sync,
            errors,
            clock,
            settings,
            composer: MessageComposer,
        }
    }

    pub fn mode_at(&self, time: NaiveTime) -> WorkflowMode {
        if time >= self.settings.next_day_cutoff {
            WorkflowMode::NextDay
        } else {
            WorkflowMode::SameDay
        }
    }

    async fn fail_configuration(&self, report: &mut WorkflowReport, message: &str) {
        error!(run_id = %report.run_id, message, "❌ Workflow cannot start");
        report.errors.push(message.to_string());
        self.errors
            .handle(&AlertError::Configuration(message.to_string()), "workflow")
            .await;
    }

    fn select_recipients(&self, request: &WorkflowRequest, report: &mut WorkflowReport) -> Vec<&Recipient> {
        let Some(requested) = &request.plates else {
            return self.recipients.iter().collect();
        };

        let mut selected = Vec::new();
        let mut missing = Vec::new();
        for plate in requested {
            let wanted = normalize_plate(plate);
            match self.recipients.iter().find(|r| r.normalized_plate() == wanted) {
                Some(recipient) => selected.push(recipient),
                None => missing.push(plate.clone()),
            }
        }
        if !missing.is_empty() {
            let message = format!("plates not configured: {}", missing.join(", "));
            warn!(run_id = %report.run_id, %message, "Requested plates skipped");
            report.errors.push(message);
        }
        selected
    }

    pub async fn run(&self, request: WorkflowRequest) -> WorkflowReport {
        let now = self.clock.now();
        let mode = self.mode_at(now.time());
        let mut report = WorkflowReport::new(mode, now);
        info!(run_id = %report.run_id, %mode, "🚀 Starting permit workflow");

        match self.resolver.configured_accounts().await {
            Ok(accounts) if accounts.is_empty() => {
                self.fail_configuration(&mut report, crate::resolver::NO_ACCOUNTS).await;
                return report;
            }
            Ok(_) => {}
            Err(e) => {
                self.fail_configuration(&mut report, &e.message()).await;
                return report;
            }
        }
        if self.recipients.is_empty() {
            self.fail_configuration(&mut report, NO_PLATES).await;
            return report;
        }

        let targets = self.select_recipients(&request, &mut report);
        if targets.is_empty() {
            report.errors.push("no valid plates to process".to_string());
            return report;
        }
        report.total_plates = targets.len();
        let plates: Vec<String> = targets.iter().map(|r| r.normalized_plate()).collect();

        if let Err(e) = self.traffic.preload_today().await {
            warn!(run_id = %report.run_id, error = %e, "Traffic rule preload failed");
        }

        if request.force_refresh {
            for plate in &plates {
                if let Err(e) = self.resolver.cache().delete_status(plate).await {
                    warn!(plate = %plate, error = %e, "Failed to drop cached status");
                }
            }
        }

        let statuses = self.resolver.resolve_many(&plates).await;
        let today = self.clock.today();
        let restrictions = self.traffic.check_plates(&plates, today).await;

        let ctx = RunContext {
            mode,
            today,
            statuses: &statuses,
            restrictions: &restrictions,
        };
        let permits = Semaphore::new(self.settings.max_concurrency.max(1));
        let tasks = targets.iter().map(|recipient| {
            let ctx = &ctx;
            let permits = &permits;
            async move {
                match permits.acquire().await {
                    Ok(_permit) => self.process_recipient(recipient, ctx).await,
                    Err(_) => PlateResult::failed(&recipient.normalized_plate(), "semaphore closed"),
                }
            }
        });
        for result in join_all(tasks).await {
            report.record(result);
        }

        if request.include_sync {
            self.run_sync(&mut report, &statuses, &restrictions).await;
        }

        info!(
            run_id = %report.run_id,
            success = report.success,
            success_plates = report.success_plates,
            total_plates = report.total_plates,
            "🏁 Permit workflow finished"
        );
        report
    }

    async fn process_recipient(&self, recipient: &Recipient, ctx: &RunContext<'_>) -> PlateResult {
        let plate = recipient.normalized_plate();
        let name = recipient.name();

        let status = match ctx.statuses.get(&plate) {
            Some(status) if !status.is_error() => status.clone(),
            other => {
                let detail = other
                    .and_then(|s| s.error_message.clone())
                    .map(|m| format!(": {m}"))
                    .unwrap_or_default();
                error!(plate = %plate, "❌ Permit status unavailable, no push sent");
                return PlateResult::failed(&plate, format!("permit query failed for {plate}{detail}"));
            }
        };

        let mut result = PlateResult {
            plate: plate.clone(),
            success: false,
            status: Some(status.clone()),
            restriction: ctx.restrictions.get(&plate).cloned(),
            push: None,
            skipped: None,
            error: None,
        };

        let message = match ctx.mode {
            WorkflowMode::SameDay => {
                let restricted = result
                    .restriction
                    .as_ref()
                    .is_some_and(|r| r.is_limited)
                    .then_some(RestrictionDay::Today);
                self.composer.status_message(name, &status, restricted)
            }
            WorkflowMode::NextDay => {
                let Some(tomorrow) = ctx.today.succ_opt() else {
                    result.error = Some("date out of range".to_string());
                    return result;
                };
                let start = status.valid_start.as_deref().and_then(parse_date);
                let end = status.valid_end.as_deref().and_then(parse_date);

                match (start, end) {
                    (Some(start), Some(end)) if start <= tomorrow && tomorrow <= end => {
                        let restriction = self.traffic.check_plate(&plate, tomorrow).await;
                        let restricted = restriction.is_limited.then_some(RestrictionDay::Tomorrow);
                        result.restriction = Some(restriction);
                        self.composer.status_message(name, &status, restricted)
                    }
                    (_, Some(end)) if end <= ctx.today => self.composer.next_day_reminder(name),
                    _ => {
                        debug!(plate = %plate, "Nothing to send for tomorrow");
                        result.success = true;
                        result.skipped = Some(SKIP_NO_NEXT_DAY_ACTION.to_string());
                        return result;
                    }
                }
            }
        };

        if let Some(window) = self.settings.dedup_window_minutes {
            if self
                .dispatcher
                .was_recently_sent(&plate, &message.message_type, window)
                .await
            {
                info!(plate = %plate, message_type = %message.message_type, "Recently sent, skipping");
                result.success = true;
                result.skipped = Some(SKIP_RECENTLY_SENT.to_string());
                return result;
            }
        }

        let outcome = self
            .dispatcher
            .dispatch(
                recipient,
                &message.title,
                &message.body,
                message.priority,
                &DispatchOptions::of_type(message.message_type.clone()),
            )
            .await;

        result.success = outcome.success;
        if !outcome.success {
            result.error = Some(format!("push failed for {plate}: {}", outcome.errors.join("; ")));
        }
        result.push = Some(outcome);
        result
    }

    async fn run_sync(
        &self,
        report: &mut WorkflowReport,
        statuses: &HashMap<String, PermitStatus>,
        restrictions: &HashMap<String, PlateRestriction>,
    ) {
        let synced: HashMap<String, PermitStatus> = report
            .plate_results
            .values()
            .filter(|r| r.success)
            .filter_map(|r| statuses.get(&r.plate).map(|s| (r.plate.clone(), s.clone())))
            .collect();
        if synced.is_empty() {
            return;
        }
        let synced_restrictions: HashMap<String, PlateRestriction> = restrictions
            .iter()
            .filter(|(plate, _)| synced.contains_key(*plate))
            .map(|(plate, r)| (plate.clone(), r.clone()))
            .collect();

        match self.sync.sync(&synced, &synced_restrictions).await {
            Ok(sync_report) => {
                info!(
                    run_id = %report.run_id,
                    success_plates = sync_report.success_plates,
                    total_plates = sync_report.total_plates,
                    "🔁 Downstream sync finished"
                );
                report.sync_report = Some(sync_report);
            }
            Err(e) => {
                warn!(run_id = %report.run_id, error = %e, "Downstream sync failed");
                report.errors.push(format!("downstream sync failed: {}", e.message()));
            }
        }
    }
}
