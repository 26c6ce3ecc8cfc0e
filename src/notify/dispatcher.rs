//! Per-recipient fan-out over the configured channels.
//!
//! Channels run serially in configuration order. Each channel kind has its
//! own notifier and its own circuit breaker, and a failing channel never
//! stops the next one. Every dispatch ends with a history entry.

use super::channel::{ChannelConfig, ChannelKind, Recipient};
use super::notifier::{Notifier, NotifierOutcome};
use super::placeholders::{substitute, TargetContext};
use super::result::{ChannelResult, PushHistoryEntry, PushOutcome, DEFAULT_MESSAGE_TYPE};
use super::PushPriority;
use crate::cache::PermitCache;
use crate::clock::SharedClock;
use crate::resilience::{CircuitBreakerError, CircuitBreakerManager};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Notifier implementation for each channel kind.
#[derive(Clone, Default)]
pub struct ChannelNotifiers {
    pub apprise: Option<Arc<dyn Notifier>>,
    pub webhook: Option<Arc<dyn Notifier>>,
}

impl ChannelNotifiers {
    pub fn for_kind(&self, kind: ChannelKind) -> Option<&Arc<dyn Notifier>> {
        match kind {
            ChannelKind::Apprise => self.apprise.as_ref(),
            ChannelKind::Webhook => self.webhook.as_ref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub message_type: String,
    /// Overrides the recipient's icon for this dispatch.
    pub icon: Option<String>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            message_type: DEFAULT_MESSAGE_TYPE.to_string(),
            icon: None,
        }
    }
}

impl DispatchOptions {
    pub fn of_type(message_type: impl Into<String>) -> Self {
        Self {
            message_type: message_type.into(),
            ..Self::default()
        }
    }
}

pub struct PushDispatcher {
    notifiers: ChannelNotifiers,
    breakers: Arc<CircuitBreakerManager>,
    cache: PermitCache,
    clock: SharedClock,
}

impl PushDispatcher {
    pub fn new(
        notifiers: ChannelNotifiers,
        breakers: Arc<CircuitBreakerManager>,
        cache: PermitCache,
        clock: SharedClock,
    ) -> Self {
        Self {
            notifiers,
            breakers,
            cache,
            clock,
        }
    }

    pub async fn dispatch(
        &self,
        recipient: &Recipient,
        title: &str,
        body: &str,
        priority: PushPriority,
        options: &DispatchOptions,
    ) -> PushOutcome {
        let plate = recipient.normalized_plate();
        let icon = options.icon.as_deref().or(recipient.icon.as_deref());
        let ctx = TargetContext {
            plate: &plate,
            display_name: recipient.name(),
            icon,
            priority,
        };

        if recipient.notifications.is_empty() {
            warn!(plate = %plate, "Recipient has no notification channels");
        }

        let mut channels = Vec::with_capacity(recipient.notifications.len());
        for channel in &recipient.notifications {
            channels.push(self.send_channel(channel, &ctx, title, body).await);
        }

        let outcome = PushOutcome::aggregate(&plate, channels);
        if outcome.success {
            info!(
                plate = %plate,
                success_count = outcome.success_count,
                total_count = outcome.total_count,
                "📨 Push dispatched"
            );
        } else {
            warn!(plate = %plate, errors = ?outcome.errors, "❌ Push failed on every channel");
        }

        let entry = PushHistoryEntry::from_outcome(
            &outcome,
            title,
            &options.message_type,
            priority,
            self.clock.now(),
        );
        if let Err(e) = self.cache.record_push(&entry).await {
            warn!(plate = %plate, error = %e, "Failed to record push history");
        }

        outcome
    }

    async fn send_channel(
        &self,
        channel: &ChannelConfig,
        ctx: &TargetContext<'_>,
        title: &str,
        body: &str,
    ) -> ChannelResult {
        let kind = channel.kind();
        let started_at = self.clock.now();
        let targets: Vec<String> = if channel.is_multi_target() {
            channel.targets().iter().map(|t| substitute(t, ctx)).collect()
        } else {
            channel.targets()
        };

        let Some(notifier) = self.notifiers.for_kind(kind) else {
            warn!(channel = %kind, "No notifier registered for channel");
            return ChannelResult::rejected(
                kind,
                &targets,
                format!("no notifier registered for {kind}"),
                started_at,
            );
        };

        let headers = channel.headers();
        let breaker = self.breakers.get_circuit_breaker(&kind.breaker_name());
        let timer = Instant::now();

        // failures caused only by bad targets must not trip the breaker
        let result = breaker
            .call(|| async {
                let outcome = notifier
                    .send(&targets, &headers, title, body, ctx.priority)
                    .await;
                if !outcome.success && outcome.valid_targets > 0 {
                    Err(outcome)
                } else {
                    Ok(outcome)
                }
            })
            .await;

        let outcome: NotifierOutcome = match result {
            Ok(outcome) | Err(CircuitBreakerError::OperationFailed(outcome)) => outcome,
            Err(CircuitBreakerError::CircuitOpen { component }) => {
                debug!(channel = %kind, "Notifier circuit open, skipping channel");
                return ChannelResult::rejected(
                    kind,
                    &targets,
                    format!("circuit breaker open for {component}"),
                    started_at,
                );
            }
        };

        ChannelResult::from_outcome(kind, outcome, started_at, timer.elapsed().as_millis() as u64)
    }

    pub async fn was_recently_sent(&self, plate: &str, message_type: &str, window_minutes: u64) -> bool {
        self.cache
            .was_recently_sent(plate, message_type, window_minutes)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheProvider, CacheSettings};
    use crate::clock::SystemClock;
    use crate::notify::notifier::TargetResult;
    use crate::resilience::{CircuitBreakerConfig, CircuitState};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct ScriptedNotifier {
        fail: bool,
        sent: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl Notifier for ScriptedNotifier {
        fn kind(&self) -> ChannelKind {
            ChannelKind::Apprise
        }

        async fn send(
            &self,
            targets: &[String],
            _headers: &[(String, String)],
            _title: &str,
            _body: &str,
            _priority: PushPriority,
        ) -> NotifierOutcome {
            self.sent.lock().push(targets.to_vec());
            NotifierOutcome {
                success: !self.fail,
                valid_targets: targets.len(),
                invalid_targets: 0,
                target_results: targets
                    .iter()
                    .map(|t| TargetResult {
                        target: t.clone(),
                        valid: true,
                        success: !self.fail,
                        error: None,
                    })
                    .collect(),
                error: self.fail.then(|| "down".to_string()),
            }
        }
    }

    fn dispatcher(apprise: Arc<ScriptedNotifier>, threshold: u32) -> (PushDispatcher, Arc<CircuitBreakerManager>) {
        let clock: SharedClock = Arc::new(SystemClock);
        let breakers = Arc::new(CircuitBreakerManager::new(
            CircuitBreakerConfig::new(threshold, Duration::from_secs(60)),
            clock.clone(),
        ));
        let cache = PermitCache::new(CacheProvider::memory(clock.clone()), CacheSettings::default(), clock.clone());
        let notifiers = ChannelNotifiers {
            apprise: Some(apprise),
            webhook: None,
        };
        (PushDispatcher::new(notifiers, breakers.clone(), cache, clock), breakers)
    }

    fn recipient() -> Recipient {
        Recipient::new(
            "京a12345",
            vec![
                ChannelConfig::Webhook {
                    url: "https://hooks.example/x".into(),
                    headers: Default::default(),
                },
                ChannelConfig::Apprise {
                    urls: vec!["bark://h/KEY?group={plate}&icon={icon}".into()],
                },
            ],
        )
    }

    #[tokio::test]
    async fn test_templates_targets_and_continues_after_missing_notifier() {
        let apprise = Arc::new(ScriptedNotifier::default());
        let (dispatcher, _) = dispatcher(apprise.clone(), 5);

        let outcome = dispatcher
            .dispatch(&recipient(), "t", "b", PushPriority::Normal, &DispatchOptions::default())
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.channels.len(), 2);
        assert_eq!(outcome.channels[0].channel, ChannelKind::Webhook);
        assert!(!outcome.channels[0].success);
        assert_eq!(apprise.sent.lock()[0], vec!["bark://h/KEY?group=京A12345"]);
        assert!(dispatcher.was_recently_sent("京A12345", DEFAULT_MESSAGE_TYPE, 60).await);
    }

    #[tokio::test]
    async fn test_failing_channel_opens_its_breaker() {
        let apprise = Arc::new(ScriptedNotifier {
            fail: true,
            ..Default::default()
        });
        let (dispatcher, breakers) = dispatcher(apprise.clone(), 2);
        let options = DispatchOptions::default();

        for _ in 0..3 {
            let outcome = dispatcher
                .dispatch(&recipient(), "t", "b", PushPriority::High, &options)
                .await;
            assert!(!outcome.success);
        }

        assert_eq!(apprise.sent.lock().len(), 2);
        let breaker = breakers.get_circuit_breaker("notifier:apprise");
        assert_eq!(breaker.state(), CircuitState::Open);
    }
}
