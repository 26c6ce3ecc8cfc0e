//! Daily restriction lookups.
//!
//! Lookups go to the in-process rules of the current day first, then the
//! shared cache, then the upstream source. An upstream fetch caches the
//! whole published week. The outcome of the last fetch is kept for
//! [`FETCH_COOLDOWN`], so a source that is down or has not published a date
//! is asked once per cool-off rather than once per plate.

use super::source::RuleSource;
use super::types::{PlateRestriction, TrafficRule};
use crate::cache::PermitCache;
use crate::clock::{elapsed_since, SharedClock};
use crate::error::{AlertError, AlertResult, ErrorKind};
use crate::notify::normalize_plate;
use crate::resilience::RetryPolicy;
use chrono::{DateTime, Local, NaiveDate};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Minimum wait before the upstream is asked again after a fetch.
pub const FETCH_COOLDOWN: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct LastFetch {
    at: DateTime<Local>,
    /// `None` when the fetch succeeded.
    error: Option<String>,
}

#[derive(Debug, Default)]
struct DayRules {
    loaded_on: Option<NaiveDate>,
    rules: HashMap<NaiveDate, TrafficRule>,
    last_fetch: Option<LastFetch>,
}

pub struct TrafficChecker {
    source: Arc<dyn RuleSource>,
    cache: PermitCache,
    clock: SharedClock,
    retry: RetryPolicy,
    memory: Mutex<DayRules>,
}

impl TrafficChecker {
    pub fn new(source: Arc<dyn RuleSource>, cache: PermitCache, clock: SharedClock) -> Self {
        Self {
            source,
            cache,
            clock,
            retry: RetryPolicy::new(3, Duration::from_secs(2), 1.0).with_retryable([
                ErrorKind::Network,
                ErrorKind::Api,
                ErrorKind::Traffic,
            ]),
            memory: Mutex::new(DayRules::default()),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn remember(&self, rules: impl IntoIterator<Item = TrafficRule>) {
        let today = self.clock.today();
        let mut memory = self.memory.lock();
        if memory.loaded_on != Some(today) {
            memory.rules.clear();
            memory.loaded_on = Some(today);
        }
        memory.rules.extend(rules.into_iter().map(|rule| (rule.date, rule)));
    }

    fn mark_fetch(&self, error: Option<String>) {
        self.memory.lock().last_fetch = Some(LastFetch {
            at: self.clock.now(),
            error,
        });
    }

    /// Last fetch of today, while it is still inside the cool-off.
    fn recent_fetch(&self) -> Option<LastFetch> {
        let memory = self.memory.lock();
        let last = memory.last_fetch.as_ref()?;
        let fresh = last.at.date_naive() == self.clock.today()
            && elapsed_since(self.clock.as_ref(), last.at) < FETCH_COOLDOWN;
        fresh.then(|| last.clone())
    }

    fn from_memory(&self, date: NaiveDate) -> Option<TrafficRule> {
        let memory = self.memory.lock();
        if memory.loaded_on != Some(self.clock.today()) {
            return None;
        }
        memory.rules.get(&date).cloned()
    }

    /// Rule for `date`, or `None` when the published week does not cover it.
    pub async fn rule_for(&self, date: NaiveDate) -> AlertResult<Option<TrafficRule>> {
        if let Some(rule) = self.from_memory(date) {
            return Ok(Some(rule));
        }

        if let Some(rule) = self.cache.load_traffic_rule(date).await {
            debug!(%date, "Traffic rule served from cache");
            self.remember([rule.clone()]);
            return Ok(Some(rule));
        }

        if let Some(last) = self.recent_fetch() {
            return match last.error {
                Some(message) => {
                    debug!(%date, "Traffic source failed recently, not refetching");
                    Err(AlertError::Traffic(message))
                }
                None => {
                    debug!(%date, "No traffic rule in the recently fetched week");
                    Ok(None)
                }
            };
        }

        let rules = match self
            .retry
            .run("fetch_traffic_rules", || self.source.fetch_rules())
            .await
        {
            Ok(rules) => rules,
            Err(e) => {
                self.mark_fetch(Some(e.message()));
                return Err(e);
            }
        };
        self.mark_fetch(None);

        for rule in &rules {
            if let Err(e) = self.cache.store_traffic_rule(rule).await {
                warn!(date = %rule.date, error = %e, "Failed to cache traffic rule");
            }
        }
        let found = rules.iter().find(|rule| rule.date == date).cloned();
        self.remember(rules);

        if found.is_none() {
            warn!(%date, "No traffic rule published for date");
        }
        Ok(found)
    }

    /// Load today's rule ahead of a run. Failure is reported, not fatal.
    pub async fn preload_today(&self) -> AlertResult<()> {
        let today = self.clock.today();
        match self.rule_for(today).await? {
            Some(rule) => {
                info!(date = %today, limited = %rule.limited_numbers, "🚦 Today's traffic rule loaded");
                Ok(())
            }
            None => Err(AlertError::Traffic(format!("no rule published for {today}"))),
        }
    }

    pub async fn check_plate(&self, plate: &str, date: NaiveDate) -> PlateRestriction {
        let plate = normalize_plate(plate);
        match self.rule_for(date).await {
            Ok(Some(rule)) => PlateRestriction::from_rule(&plate, date, rule),
            Ok(None) => PlateRestriction::unknown(&plate, date, format!("no rule published for {date}")),
            Err(e) => {
                warn!(plate = %plate, %date, error = %e, "Traffic restriction lookup failed");
                PlateRestriction::unknown(&plate, date, e.message())
            }
        }
    }

    pub async fn check_plates(&self, plates: &[String], date: NaiveDate) -> HashMap<String, PlateRestriction> {
        let mut results = HashMap::with_capacity(plates.len());
        for plate in plates {
            let restriction = self.check_plate(plate, date).await;
            results.insert(restriction.plate.clone(), restriction);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheProvider, CacheSettings};
    use crate::clock::{Clock, ManualClock};
    use async_trait::async_trait;
    use chrono::NaiveDateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource {
        calls: AtomicUsize,
        rules: Vec<TrafficRule>,
    }

    #[async_trait]
    impl RuleSource for FixedSource {
        async fn fetch_rules(&self) -> AlertResult<Vec<TrafficRule>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.rules.is_empty() {
                Err(AlertError::Network("unreachable".into()))
            } else {
                Ok(self.rules.clone())
            }
        }
    }

    fn unretried(rules: Vec<TrafficRule>) -> (TrafficChecker, Arc<FixedSource>, Arc<ManualClock>) {
        let (checker, source, clock) = checker(rules);
        (checker.with_retry(RetryPolicy::new(1, Duration::ZERO, 1.0)), source, clock)
    }

    fn checker(rules: Vec<TrafficRule>) -> (TrafficChecker, Arc<FixedSource>, Arc<ManualClock>) {
        let start = NaiveDateTime::parse_from_str("2025-08-15 07:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let clock = Arc::new(ManualClock::at_local(start).unwrap());
        let cache = PermitCache::new(CacheProvider::memory(clock.clone()), CacheSettings::default(), clock.clone());
        let source = Arc::new(FixedSource {
            calls: AtomicUsize::new(0),
            rules,
        });
        let checker = TrafficChecker::new(source.clone(), cache, clock.clone());
        (checker, source, clock)
    }

    #[tokio::test]
    async fn test_week_fetched_once() {
        let today = NaiveDate::from_ymd_opt(2025, 8, 15).unwrap();
        let tomorrow = today.succ_opt().unwrap();
        let (checker, source, _) = unretried(vec![
            TrafficRule::new(today, "1和6"),
            TrafficRule::new(tomorrow, "2和7"),
        ]);

        checker.preload_today().await.unwrap();
        let restriction = checker.check_plate("京a00006", today).await;
        assert!(restriction.is_limited);
        assert_eq!(restriction.plate, "京A00006");

        let restriction = checker.check_plate("京A00007", tomorrow).await;
        assert!(restriction.is_limited);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_lookup_is_not_limited() {
        let (checker, _, clock) = unretried(vec![]);
        let restriction = checker.check_plate("京A12345", clock.today()).await;
        assert!(!restriction.is_limited);
        assert_eq!(restriction.error_message.as_deref(), Some("unreachable"));
        assert!(checker.preload_today().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_preload_is_not_retried_per_plate() {
        let (checker, source, clock) = checker(vec![]);
        let plates: Vec<String> = (1..=5).map(|n| format!("京A1234{n}")).collect();
        let started = tokio::time::Instant::now();

        assert!(checker.preload_today().await.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);

        let restrictions = checker.check_plates(&plates, clock.today()).await;
        assert_eq!(restrictions.len(), 5);
        assert!(restrictions
            .values()
            .all(|r| !r.is_limited && r.error_message.as_deref() == Some("unreachable")));
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(4));

        clock.advance(FETCH_COOLDOWN + Duration::from_secs(1));
        checker.check_plate(&plates[0], clock.today()).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_unpublished_date_waits_for_cooldown() {
        let (checker, source, clock) = unretried(vec![TrafficRule::new(
            NaiveDate::from_ymd_opt(2025, 8, 16).unwrap(),
            "2和7",
        )]);
        let today = clock.today();

        assert!(checker.rule_for(today).await.unwrap().is_none());
        assert!(checker.check_plate("京A12345", today).await.error_message.is_some());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        clock.advance(FETCH_COOLDOWN);
        assert!(checker.rule_for(today).await.unwrap().is_none());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
