//! Fan-out across channels with per-channel circuit breakers.

mod mocks;

use jjz_alert::cache::{CacheProvider, CacheSettings, PermitCache};
use jjz_alert::clock::{ManualClock, SharedClock};
use jjz_alert::notify::{
    ChannelConfig, ChannelKind, ChannelNotifiers, DispatchOptions, PushDispatcher, PushPriority, Recipient,
    DEFAULT_MESSAGE_TYPE,
};
use jjz_alert::resilience::{CircuitBreakerConfig, CircuitBreakerManager, CircuitState};
use mocks::{date, manual_clock, RecordingNotifier};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    dispatcher: PushDispatcher,
    breakers: Arc<CircuitBreakerManager>,
    cache: PermitCache,
    clock: Arc<ManualClock>,
    apprise: Arc<RecordingNotifier>,
    webhook: Arc<RecordingNotifier>,
}

fn harness(threshold: u32) -> Harness {
    let clock = manual_clock(date(2025, 8, 15), 9, 0);
    let shared: SharedClock = clock.clone();
    let breakers = Arc::new(CircuitBreakerManager::new(
        CircuitBreakerConfig::new(threshold, Duration::from_secs(60)),
        shared.clone(),
    ));
    let cache = PermitCache::new(
        CacheProvider::memory(shared.clone()),
        CacheSettings::default(),
        shared.clone(),
    );
    let apprise = RecordingNotifier::new(ChannelKind::Apprise);
    let webhook = RecordingNotifier::new(ChannelKind::Webhook);
    let notifiers = ChannelNotifiers {
        apprise: Some(apprise.clone()),
        webhook: Some(webhook.clone()),
    };

    Harness {
        dispatcher: PushDispatcher::new(notifiers, breakers.clone(), cache.clone(), shared),
        breakers,
        cache,
        clock,
        apprise,
        webhook,
    }
}

fn recipient(apprise_urls: &[&str]) -> Recipient {
    let mut recipient = Recipient::new(
        "京b67890",
        vec![
            ChannelConfig::Apprise {
                urls: apprise_urls.iter().map(|u| u.to_string()).collect(),
            },
            ChannelConfig::Webhook {
                url: "https://hooks.test/jjz".into(),
                headers: Default::default(),
            },
        ],
    );
    recipient.display_name = Some("通勤车".into());
    recipient
}

async fn send(h: &Harness, recipient: &Recipient) -> jjz_alert::notify::PushOutcome {
    h.dispatcher
        .dispatch(recipient, "进京证提醒", "正文", PushPriority::Normal, &DispatchOptions::default())
        .await
}

#[tokio::test]
async fn test_failing_apprise_opens_only_its_breaker() {
    let h = harness(5);
    h.apprise.set_failing(true);
    let target = recipient(&["bark://api.day.app/key-{plate}"]);

    for _ in 0..7 {
        let outcome = send(&h, &target).await;
        // webhook keeps delivering while apprise is down
        assert!(outcome.success);
        assert_eq!(outcome.success_count, 1);
    }

    assert_eq!(h.apprise.sent().len(), 5);
    assert_eq!(h.webhook.sent().len(), 7);
    assert_eq!(
        h.breakers.get_circuit_breaker("notifier:apprise").state(),
        CircuitState::Open
    );
    assert_eq!(
        h.breakers.get_circuit_breaker("notifier:webhook").state(),
        CircuitState::Closed
    );
    assert_eq!(h.breakers.open_circuits(), vec!["notifier:apprise".to_string()]);

    let rejected = send(&h, &target).await;
    let apprise_result = &rejected.channels[0];
    assert_eq!(apprise_result.channel, ChannelKind::Apprise);
    assert!(!apprise_result.success);
    assert!(apprise_result
        .error
        .as_deref()
        .is_some_and(|e| e.contains("circuit breaker open")));
}

#[tokio::test]
async fn test_open_breaker_recovers_after_cooldown() {
    let h = harness(2);
    h.apprise.set_failing(true);
    let target = recipient(&["bark://api.day.app/key"]);

    send(&h, &target).await;
    send(&h, &target).await;
    send(&h, &target).await;
    assert_eq!(h.apprise.sent().len(), 2);

    h.apprise.set_failing(false);
    h.clock.advance(Duration::from_secs(61));

    let outcome = send(&h, &target).await;
    assert!(outcome.channels[0].success);
    assert_eq!(h.apprise.sent().len(), 3);
    assert_eq!(
        h.breakers.get_circuit_breaker("notifier:apprise").state(),
        CircuitState::Closed
    );
}

#[tokio::test]
async fn test_invalid_targets_never_trip_the_breaker() {
    let h = harness(2);
    let target = recipient(&["not a url", "missing-scheme"]);

    for _ in 0..4 {
        let outcome = send(&h, &target).await;
        let apprise_result = &outcome.channels[0];
        assert!(!apprise_result.success);
        assert_eq!(apprise_result.valid_targets, 0);
        assert_eq!(apprise_result.invalid_targets, 2);
    }

    assert!(h.apprise.sent().is_empty());
    assert_eq!(
        h.breakers.get_circuit_breaker("notifier:apprise").state(),
        CircuitState::Closed
    );
}

#[tokio::test]
async fn test_targets_are_templated_and_history_is_recorded() {
    let h = harness(5);
    let target = recipient(&["bark://api.day.app/key?group={plate}&title={display_name}"]);

    let outcome = send(&h, &target).await;
    assert_eq!(outcome.plate, "京B67890");
    assert_eq!(
        h.apprise.sent()[0].targets,
        vec!["bark://api.day.app/key?group=京B67890&title=通勤车".to_string()]
    );

    h.clock.advance(Duration::from_secs(30));
    h.apprise.set_failing(true);
    h.webhook.set_failing(true);
    let failed = send(&h, &target).await;
    assert!(!failed.success);

    let history = h.cache.push_history("京B67890", 10).await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].success_count, 0);
    assert_eq!(history[1].success_count, 2);
    assert_eq!(history[1].title, "进京证提醒");
    assert!(h.dispatcher.was_recently_sent("京B67890", DEFAULT_MESSAGE_TYPE, 5).await);
}

#[tokio::test]
async fn test_open_breaker_still_counts_malformed_targets_invalid() {
    let h = harness(1);
    h.apprise.set_failing(true);
    let target = recipient(&["bark://api.day.app/key", "not a url"]);

    let first = send(&h, &target).await;
    assert_eq!(
        (first.channels[0].valid_targets, first.channels[0].invalid_targets),
        (1, 1)
    );

    let rejected = send(&h, &target).await;
    let apprise_result = &rejected.channels[0];
    assert!(apprise_result
        .error
        .as_deref()
        .is_some_and(|e| e.contains("circuit breaker open")));
    assert_eq!((apprise_result.valid_targets, apprise_result.invalid_targets), (1, 1));
    assert_eq!(rejected.invalid_targets(), 1);
    assert_eq!(rejected.total_count, 3);
    assert_eq!(h.apprise.sent().len(), 1);
}
