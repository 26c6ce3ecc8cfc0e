//! Domain key schema over [`CacheProvider`].
//!
//! | key                    | value                     | expiry                |
//! |------------------------|---------------------------|-----------------------|
//! | `jjz:{plate}`          | `PermitStatus` JSON       | `status_ttl`          |
//! | `traffic:rules:{date}` | `TrafficRule` JSON        | end of that day       |
//! | `push_history:{plate}` | list of `PushHistoryEntry`| `push_history_ttl`    |
//! | `stats:{kind}:{date}`  | hash of `{op}_count`      | `stats_ttl`           |

use super::errors::CacheResult;
use super::provider::CacheProvider;
use crate::clock::{elapsed_since, SharedClock};
use crate::error::AlertResult;
use crate::notify::{normalize_plate, PushHistoryEntry};
use crate::resolver::{DataSource, PermitStatus};
use crate::traffic::TrafficRule;
use chrono::{Duration as ChronoDuration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

const STATUS_PREFIX: &str = "jjz:";
const TRAFFIC_PREFIX: &str = "traffic:rules:";
const HISTORY_PREFIX: &str = "push_history:";
const STATS_PREFIX: &str = "stats:";

pub const STATS_KIND_PERMIT: &str = "jjz";
pub const STATS_KIND_TRAFFIC: &str = "traffic";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatOp {
    Hit,
    Miss,
    Set,
    Error,
}

impl StatOp {
    fn field(&self) -> &'static str {
        match self {
            StatOp::Hit => "hit_count",
            StatOp::Miss => "miss_count",
            StatOp::Set => "set_count",
            StatOp::Error => "error_count",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub status_ttl: Duration,
    pub push_history_ttl: Duration,
    pub push_history_max: usize,
    pub stats_ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            status_ttl: Duration::from_secs(604_800),
            push_history_ttl: Duration::from_secs(2_592_000),
            push_history_max: 100,
            stats_ttl: Duration::from_secs(2_592_000),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KindStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub errors: u64,
    pub hit_rate: f64,
}

impl KindStats {
    fn finish(mut self) -> Self {
        let lookups = self.hits + self.misses;
        self.hit_rate = if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64 * 100.0
        };
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub days: u32,
    pub provider: &'static str,
    pub kinds: BTreeMap<String, KindStats>,
}

/// Typed access to the cache for statuses, rules, push history and stats.
///
/// Every read that fails at the backend is logged and treated as absent.
#[derive(Debug, Clone)]
pub struct PermitCache {
    provider: CacheProvider,
    settings: CacheSettings,
    clock: SharedClock,
}

fn status_key(plate: &str) -> String {
    format!("{STATUS_PREFIX}{}", normalize_plate(plate))
}

fn traffic_key(date: NaiveDate) -> String {
    format!("{TRAFFIC_PREFIX}{}", date.format("%Y-%m-%d"))
}

fn history_key(plate: &str) -> String {
    format!("{HISTORY_PREFIX}{}", normalize_plate(plate))
}

fn stats_key(kind: &str, date: NaiveDate) -> String {
    format!("{STATS_PREFIX}{kind}:{}", date.format("%Y-%m-%d"))
}

impl PermitCache {
    pub fn new(provider: CacheProvider, settings: CacheSettings, clock: SharedClock) -> Self {
        Self {
            provider,
            settings,
            clock,
        }
    }

    pub fn provider(&self) -> &CacheProvider {
        &self.provider
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub async fn store_status(&self, status: &PermitStatus) -> AlertResult<()> {
        let mut cached = status.clone();
        cached.cached_at = Some(self.clock.now());
        let payload = serde_json::to_string(&cached)?;

        self.provider
            .set(&status_key(&status.plate), &payload, Some(self.settings.status_ttl))
            .await?;
        self.bump_stat(STATS_KIND_PERMIT, StatOp::Set).await;
        debug!(plate = %status.plate, status = %status.status, "Permit status cached");
        Ok(())
    }

    pub async fn load_status(&self, plate: &str) -> Option<PermitStatus> {
        let key = status_key(plate);
        let raw = match self.provider.get(&key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(plate, error = %e, "Failed to read cached permit status");
                self.bump_stat(STATS_KIND_PERMIT, StatOp::Error).await;
                return None;
            }
        };

        let Some(raw) = raw else {
            self.bump_stat(STATS_KIND_PERMIT, StatOp::Miss).await;
            return None;
        };

        match serde_json::from_str::<PermitStatus>(&raw) {
            Ok(mut status) => {
                status.data_source = DataSource::Cache;
                self.bump_stat(STATS_KIND_PERMIT, StatOp::Hit).await;
                Some(status)
            }
            Err(e) => {
                warn!(plate, error = %e, "Discarding undecodable cached permit status");
                self.bump_stat(STATS_KIND_PERMIT, StatOp::Error).await;
                None
            }
        }
    }

    pub async fn delete_status(&self, plate: &str) -> AlertResult<bool> {
        Ok(self.provider.delete(&status_key(plate)).await?)
    }

    /// Plates with a cached status, sorted.
    pub async fn cached_plates(&self) -> AlertResult<Vec<String>> {
        let keys = self.provider.keys(&format!("{STATUS_PREFIX}*")).await?;
        let mut plates: Vec<String> = keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(STATUS_PREFIX).map(str::to_string))
            .collect();
        plates.sort();
        Ok(plates)
    }

    /// Store a rule until the end of its own day (at least one second).
    pub async fn store_traffic_rule(&self, rule: &TrafficRule) -> AlertResult<()> {
        let mut cached = rule.clone();
        cached.cached_at = Some(self.clock.now());
        let payload = serde_json::to_string(&cached)?;

        self.provider
            .set(&traffic_key(rule.date), &payload, Some(self.ttl_until_end_of(rule.date)))
            .await?;
        self.bump_stat(STATS_KIND_TRAFFIC, StatOp::Set).await;
        Ok(())
    }

    fn ttl_until_end_of(&self, date: NaiveDate) -> Duration {
        let now = self.clock.now();
        let end_of_day = (date + ChronoDuration::days(1))
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight - now.naive_local());
        end_of_day
            .and_then(|remaining| remaining.to_std().ok())
            .filter(|remaining| remaining.as_secs() >= 1)
            .unwrap_or(Duration::from_secs(1))
    }

    pub async fn load_traffic_rule(&self, date: NaiveDate) -> Option<TrafficRule> {
        let raw = match self.provider.get(&traffic_key(date)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%date, error = %e, "Failed to read cached traffic rule");
                self.bump_stat(STATS_KIND_TRAFFIC, StatOp::Error).await;
                return None;
            }
        };

        let Some(raw) = raw else {
            self.bump_stat(STATS_KIND_TRAFFIC, StatOp::Miss).await;
            return None;
        };

        match serde_json::from_str::<TrafficRule>(&raw) {
            Ok(mut rule) => {
                rule.data_source = DataSource::Cache;
                self.bump_stat(STATS_KIND_TRAFFIC, StatOp::Hit).await;
                Some(rule)
            }
            Err(e) => {
                warn!(%date, error = %e, "Discarding undecodable cached traffic rule");
                None
            }
        }
    }

    /// Append to the plate's history, trim to the configured length and refresh its TTL.
    pub async fn record_push(&self, entry: &PushHistoryEntry) -> AlertResult<()> {
        let key = history_key(&entry.plate);
        let payload = serde_json::to_string(entry)?;
        let keep = self.settings.push_history_max.max(1) as isize;

        self.provider.lpush(&key, &payload).await?;
        self.provider.ltrim(&key, 0, keep - 1).await?;
        self.provider.expire(&key, self.settings.push_history_ttl).await?;
        Ok(())
    }

    /// Newest-first history, at most `limit` entries.
    pub async fn push_history(&self, plate: &str, limit: usize) -> Vec<PushHistoryEntry> {
        if limit == 0 {
            return Vec::new();
        }
        let raw = match self.provider.lrange(&history_key(plate), 0, limit as isize - 1).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(plate, error = %e, "Failed to read push history");
                return Vec::new();
            }
        };
        raw.iter()
            .filter_map(|item| serde_json::from_str(item).ok())
            .collect()
    }

    /// Whether a push of `message_type` reached history within the last `window_minutes`.
    pub async fn was_recently_sent(&self, plate: &str, message_type: &str, window_minutes: u64) -> bool {
        let window = Duration::from_secs(window_minutes.saturating_mul(60));
        let history = self
            .push_history(plate, self.settings.push_history_max.max(1))
            .await;

        history
            .iter()
            .find(|entry| entry.message_type == message_type)
            .is_some_and(|entry| elapsed_since(self.clock.as_ref(), entry.timestamp) <= window)
    }

    pub async fn bump_stat(&self, kind: &str, op: StatOp) {
        let key = stats_key(kind, self.clock.today());
        let result: CacheResult<()> = async {
            self.provider.hincrby(&key, op.field(), 1).await?;
            self.provider.expire(&key, self.settings.stats_ttl).await?;
            Ok(())
        }
        .await;
        if let Err(e) = result {
            debug!(kind, error = %e, "Failed to update cache stats");
        }
    }

    /// Per-kind counters summed over the last `days` days including today.
    pub async fn stats(&self, days: u32) -> CacheStats {
        let today = self.clock.today();
        let mut kinds = BTreeMap::new();

        for kind in [STATS_KIND_PERMIT, STATS_KIND_TRAFFIC] {
            let mut totals = KindStats::default();
            for offset in 0..days.max(1) {
                let date = today - ChronoDuration::days(i64::from(offset));
                let fields = self
                    .provider
                    .hgetall(&stats_key(kind, date))
                    .await
                    .unwrap_or_default();
                let count = |field: &str| {
                    fields
                        .get(field)
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(0)
                };
                totals.hits += count(StatOp::Hit.field());
                totals.misses += count(StatOp::Miss.field());
                totals.sets += count(StatOp::Set.field());
                totals.errors += count(StatOp::Error.field());
            }
            kinds.insert(kind.to_string(), totals.finish());
        }

        CacheStats {
            days: days.max(1),
            provider: self.provider.provider_name(),
            kinds,
        }
    }
}
