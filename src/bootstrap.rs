//! # Alert System Bootstrap
//!
//! Builds every component from an [`AppConfig`] and hands back one
//! [`AlertSystem`] handle. Collaborators that reach outside the process
//! (HTTP, the clock, downstream sync) are injectable so tests can drive the
//! full wiring without a network.

use crate::cache::{CacheProvider, PermitCache};
use crate::clock::{SharedClock, SystemClock};
use crate::config::{AppConfig, ConfigManager, ReloadingAccountSource};
use crate::error::{AlertError, AlertResult};
use crate::http::{HttpClient, ReqwestHttpClient};
use crate::notify::{
    AdminChannel, AppriseApiNotifier, ChannelNotifiers, Notifier, PushDispatcher, WebhookNotifier,
};
use crate::resilience::{
    CircuitBreakerManager, ErrorCollector, ErrorHandler, ResilienceStatus, ThrottledAdminNotifier,
};
use crate::resolver::{AccountSource, StaticAccountSource, StatusResolver};
use crate::traffic::{HttpRuleSource, TrafficChecker};
use crate::workflow::{
    next_run_after, DownstreamSync, NoopSync, WorkflowOrchestrator, WorkflowReport,
    WorkflowRequest,
};
use chrono::NaiveTime;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Out-of-process collaborators.
#[derive(Clone)]
pub struct Collaborators {
    pub http: Arc<dyn HttpClient>,
    pub clock: SharedClock,
    pub sync: Arc<dyn DownstreamSync>,
    /// Overrides the account source derived from the config.
    pub accounts: Option<Arc<dyn AccountSource>>,
}

impl Collaborators {
    pub fn production() -> AlertResult<Self> {
        Ok(Self {
            http: Arc::new(ReqwestHttpClient::new()?),
            clock: Arc::new(SystemClock),
            sync: Arc::new(NoopSync),
            accounts: None,
        })
    }
}

/// Handle over the wired components.
pub struct AlertSystem {
    pub orchestrator: Arc<WorkflowOrchestrator>,
    pub resolver: Arc<StatusResolver>,
    pub traffic: Arc<TrafficChecker>,
    pub dispatcher: Arc<PushDispatcher>,
    pub errors: Arc<ErrorHandler>,
    pub breakers: Arc<CircuitBreakerManager>,
    pub cache: PermitCache,
    clock: SharedClock,
    schedule: Vec<NaiveTime>,
    remind_enabled: bool,
}

impl AlertSystem {
    pub async fn run(&self, request: WorkflowRequest) -> WorkflowReport {
        self.orchestrator.run(request).await
    }

    pub fn status(&self) -> ResilienceStatus {
        self.errors.status(&self.breakers)
    }

    pub fn schedule(&self) -> &[NaiveTime] {
        &self.schedule
    }

    /// Run the workflow at each scheduled time until `shutdown` resolves.
    pub async fn run_scheduled<F>(&self, shutdown: F) -> AlertResult<()>
    where
        F: Future<Output = ()>,
    {
        if !self.remind_enabled {
            warn!("Reminders disabled (remind.enable = false); scheduler not started");
            return Ok(());
        }
        if self.schedule.is_empty() {
            return Err(AlertError::Configuration("remind.times is empty".to_string()));
        }

        tokio::pin!(shutdown);
        loop {
            let now = self.clock.now();
            let Some(next) = next_run_after(now, &self.schedule) else {
                return Err(AlertError::Internal("no schedulable run time".to_string()));
            };
            let wait = (next - now).to_std().unwrap_or_default();
            info!(next_run = %next.format("%Y-%m-%d %H:%M"), wait_secs = wait.as_secs(), "⏰ Next scheduled run");

            tokio::select! {
                _ = &mut shutdown => {
                    info!("🛑 Scheduler shutdown requested");
                    return Ok(());
                }
                _ = tokio::time::sleep(wait) => {
                    let report = self.run(WorkflowRequest::default()).await;
                    if !report.success {
                        error!(run_id = %report.run_id, errors = ?report.errors, "Scheduled run had failures");
                    }
                }
            }
        }
    }
}

pub struct AlertBootstrap;

impl AlertBootstrap {
    /// Production wiring from a loaded configuration file.
    pub async fn from_manager(manager: &ConfigManager) -> AlertResult<AlertSystem> {
        Self::build(
            manager.config(),
            manager.path().map(PathBuf::from),
            Collaborators::production()?,
        )
        .await
    }

    /// Wire the system. With a `config_path` the account list is re-read from
    /// that file between runs.
    pub async fn build(
        config: &AppConfig,
        config_path: Option<PathBuf>,
        collaborators: Collaborators,
    ) -> AlertResult<AlertSystem> {
        let Collaborators {
            http,
            clock,
            sync,
            accounts,
        } = collaborators;
        let global = &config.global;

        let breakers = Arc::new(CircuitBreakerManager::new(
            global.circuit_breaker.to_breaker_config(),
            clock.clone(),
        ));
        let provider =
            CacheProvider::from_config_graceful(global.redis.url.as_deref(), &breakers, clock.clone()).await;
        let cache = PermitCache::new(provider, global.cache.to_settings(), clock.clone());

        let notifier_timeout = global.notifier.timeout();
        let apprise = global.notifier.apprise_api_url.as_deref().map(|url| {
            Arc::new(AppriseApiNotifier::new(http.clone(), url, notifier_timeout)) as Arc<dyn Notifier>
        });
        let notifiers = ChannelNotifiers {
            apprise,
            webhook: Some(Arc::new(WebhookNotifier::new(http.clone(), notifier_timeout))),
        };
        let dispatcher = Arc::new(PushDispatcher::new(
            notifiers,
            breakers.clone(),
            cache.clone(),
            clock.clone(),
        ));

        let admin = (!global.admin.notifications.is_empty()).then(|| {
            let sink = Arc::new(AdminChannel::new(
                dispatcher.clone(),
                global.admin.notifications.clone(),
            ));
            ThrottledAdminNotifier::new(sink, global.admin.interval(), clock.clone())
        });
        let errors = Arc::new(ErrorHandler::new(
            Arc::new(ErrorCollector::new(clock.clone())),
            admin,
        ));

        let accounts: Arc<dyn AccountSource> = match (accounts, &config_path) {
            (Some(accounts), _) => accounts,
            (None, Some(path)) => Arc::new(ReloadingAccountSource::seeded(
                path.clone(),
                config.accounts(),
                clock.clone(),
            )),
            (None, None) => Arc::new(StaticAccountSource::new(config.accounts())),
        };
        let resolver = Arc::new(StatusResolver::new(
            accounts,
            http.clone(),
            cache.clone(),
            breakers.clone(),
            errors.clone(),
            clock.clone(),
            global.resolver.to_settings(),
        ));

        let rules = Arc::new(HttpRuleSource::new(
            http,
            global.traffic.url.clone(),
            global.traffic.timeout(),
        ));
        let traffic = Arc::new(TrafficChecker::new(rules, cache.clone(), clock.clone()));

        let orchestrator = Arc::new(WorkflowOrchestrator::new(
            config.recipients(),
            resolver.clone(),
            traffic.clone(),
            dispatcher.clone(),
            sync,
            errors.clone(),
            clock.clone(),
            global.remind.to_workflow_settings()?,
        ));

        info!(
            cache = cache.provider().provider_name(),
            plates = config.plates.len(),
            accounts = config.jjz_accounts.len(),
            admin = global.admin.notifications.len(),
            "✅ Alert system bootstrapped"
        );

        Ok(AlertSystem {
            orchestrator,
            resolver,
            traffic,
            dispatcher,
            errors,
            breakers,
            cache,
            clock,
            schedule: global.remind.schedule_times()?,
            remind_enabled: global.remind.enable,
        })
    }
}
