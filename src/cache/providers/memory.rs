//! In-process cache provider backed by `DashMap`.
//!
//! Single-instance deployments and tests use this backend. Expiry is checked
//! lazily against the injected clock on every access.

use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::traits::{glob_match, resolve_range, CacheService};
use crate::clock::SharedClock;
use chrono::{DateTime, Duration as ChronoDuration, Local};
use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
enum StoredValue {
    Text(String),
    List(VecDeque<String>),
    Hash(HashMap<String, i64>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: StoredValue,
    expires_at: Option<DateTime<Local>>,
}

#[derive(Debug, Clone)]
pub struct MemoryCacheService {
    entries: Arc<DashMap<String, Entry>>,
    clock: SharedClock,
}

impl MemoryCacheService {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
        }
    }

    fn expiry(&self, ttl: Duration) -> DateTime<Local> {
        self.clock.now() + ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::MAX)
    }

    fn is_live(&self, entry: &Entry) -> bool {
        entry.expires_at.map_or(true, |at| at > self.clock.now())
    }

    /// Remove `key` if it has expired.
    fn purge_if_expired(&self, key: &str) {
        let now = self.clock.now();
        self.entries
            .remove_if(key, |_, entry| entry.expires_at.is_some_and(|at| at <= now));
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| self.is_live(e.value())).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheService for MemoryCacheService {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.purge_if_expired(key);
        let result = match self.entries.get(key) {
            Some(entry) => match &entry.value {
                StoredValue::Text(text) => Some(text.clone()),
                _ => return Err(CacheError::WrongType(key.to_string())),
            },
            None => None,
        };

        if result.is_some() {
            debug!(key = key, "Cache HIT");
        } else {
            debug!(key = key, "Cache MISS");
        }
        Ok(result)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let expires_at = ttl.map(|ttl| self.expiry(ttl));
        self.entries.insert(
            key.to_string(),
            Entry {
                value: StoredValue::Text(value.to_string()),
                expires_at,
            },
        );
        debug!(key = key, ttl_seconds = ttl.map(|t| t.as_secs()), "Cache SET");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.purge_if_expired(key);
        Ok(self.entries.remove(key).is_some())
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| self.is_live(entry.value()) && glob_match(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn lpush(&self, key: &str, value: &str) -> CacheResult<u64> {
        self.purge_if_expired(key);
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: StoredValue::List(VecDeque::new()),
            expires_at: None,
        });
        match &mut entry.value {
            StoredValue::List(list) => {
                list.push_front(value.to_string());
                Ok(list.len() as u64)
            }
            _ => Err(CacheError::WrongType(key.to_string())),
        }
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> CacheResult<Vec<String>> {
        self.purge_if_expired(key);
        let Some(entry) = self.entries.get(key) else {
            return Ok(Vec::new());
        };
        match &entry.value {
            StoredValue::List(list) => Ok(resolve_range(list.len(), start, stop)
                .map(|(from, to)| list.range(from..=to).cloned().collect())
                .unwrap_or_default()),
            _ => Err(CacheError::WrongType(key.to_string())),
        }
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> CacheResult<()> {
        self.purge_if_expired(key);
        let Some(mut entry) = self.entries.get_mut(key) else {
            return Ok(());
        };
        match &mut entry.value {
            StoredValue::List(list) => {
                match resolve_range(list.len(), start, stop) {
                    Some((from, to)) => {
                        list.truncate(to + 1);
                        list.drain(..from);
                    }
                    None => list.clear(),
                }
                Ok(())
            }
            _ => Err(CacheError::WrongType(key.to_string())),
        }
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> CacheResult<i64> {
        self.purge_if_expired(key);
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: StoredValue::Hash(HashMap::new()),
            expires_at: None,
        });
        match &mut entry.value {
            StoredValue::Hash(hash) => {
                let counter = hash.entry(field.to_string()).or_insert(0);
                *counter += delta;
                Ok(*counter)
            }
            _ => Err(CacheError::WrongType(key.to_string())),
        }
    }

    async fn hgetall(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        self.purge_if_expired(key);
        let Some(entry) = self.entries.get(key) else {
            return Ok(HashMap::new());
        };
        match &entry.value {
            StoredValue::Hash(hash) => Ok(hash
                .iter()
                .map(|(field, value)| (field.clone(), value.to_string()))
                .collect()),
            _ => Err(CacheError::WrongType(key.to_string())),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        self.purge_if_expired(key);
        let expires_at = self.expiry(ttl);
        Ok(match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.expires_at = Some(expires_at);
                true
            }
            None => false,
        })
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }

    fn is_distributed(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn service() -> (MemoryCacheService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Local::now()));
        (MemoryCacheService::new(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_ttl_expiry_follows_clock() {
        let (cache, clock) = service();
        cache
            .set("jjz:京A1", "{}", Some(Duration::from_secs(10)))
            .await
            .unwrap();
        assert_eq!(cache.get("jjz:京A1").await.unwrap().as_deref(), Some("{}"));

        clock.advance(Duration::from_secs(10));
        assert_eq!(cache.get("jjz:京A1").await.unwrap(), None);
        assert!(cache.keys("jjz:*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_push_and_trim() {
        let (cache, _clock) = service();
        for i in 0..5 {
            cache.lpush("history", &i.to_string()).await.unwrap();
        }
        cache.ltrim("history", 0, 2).await.unwrap();

        assert_eq!(cache.lrange("history", 0, -1).await.unwrap(), vec!["4", "3", "2"]);
        assert_eq!(cache.lrange("missing", 0, -1).await.unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_counters_and_expire() {
        let (cache, clock) = service();
        assert_eq!(cache.hincrby("stats", "hits_count", 1).await.unwrap(), 1);
        assert_eq!(cache.hincrby("stats", "hits_count", 2).await.unwrap(), 3);
        assert!(cache.expire("stats", Duration::from_secs(5)).await.unwrap());
        assert!(!cache.expire("missing", Duration::from_secs(5)).await.unwrap());

        let all = cache.hgetall("stats").await.unwrap();
        assert_eq!(all.get("hits_count").map(String::as_str), Some("3"));

        clock.advance(Duration::from_secs(6));
        assert!(cache.hgetall("stats").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_type_is_an_error() {
        let (cache, _clock) = service();
        cache.set("plain", "v", None).await.unwrap();
        assert!(matches!(
            cache.lpush("plain", "x").await,
            Err(CacheError::WrongType(_))
        ));
    }
}
