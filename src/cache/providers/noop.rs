//! No-op cache provider
//!
//! Always returns None/success. Used when caching is disabled or when the
//! distributed backend is unavailable at startup (graceful degradation).

use crate::cache::errors::CacheResult;
use crate::cache::traits::CacheService;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct NoOpCacheService;

impl NoOpCacheService {
    pub fn new() -> Self {
        Self
    }
}

impl CacheService for NoOpCacheService {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> CacheResult<bool> {
        Ok(false)
    }

    async fn keys(&self, _pattern: &str) -> CacheResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn lpush(&self, _key: &str, _value: &str) -> CacheResult<u64> {
        Ok(0)
    }

    async fn lrange(&self, _key: &str, _start: isize, _stop: isize) -> CacheResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn ltrim(&self, _key: &str, _start: isize, _stop: isize) -> CacheResult<()> {
        Ok(())
    }

    async fn hincrby(&self, _key: &str, _field: &str, delta: i64) -> CacheResult<i64> {
        Ok(delta)
    }

    async fn hgetall(&self, _key: &str) -> CacheResult<HashMap<String, String>> {
        Ok(HashMap::new())
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> CacheResult<bool> {
        Ok(false)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "noop"
    }

    fn is_distributed(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_get_returns_none() {
        let svc = NoOpCacheService::new();
        svc.set("key", "value", None).await.unwrap();
        assert_eq!(svc.get("key").await.unwrap(), None);
        assert!(svc.lrange("key", 0, -1).await.unwrap().is_empty());
    }
}
