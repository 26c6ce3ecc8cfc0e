//! Cache service trait definition

use super::errors::CacheResult;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

/// Key/value operations the alerting core relies on.
///
/// Implemented by concrete cache providers (in-memory, Redis, NoOp). Every
/// operation is atomic at the key level; callers do no locking of their own.
/// Absence is `Ok(None)` / empty, never an error.
pub trait CacheService: Send + Sync {
    /// Get a string value. `Ok(None)` on miss.
    fn get(&self, key: &str) -> impl Future<Output = CacheResult<Option<String>>> + Send;

    /// Set a string value, with an optional TTL.
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = CacheResult<()>> + Send;

    /// Delete a key. Returns whether it existed.
    fn delete(&self, key: &str) -> impl Future<Output = CacheResult<bool>> + Send;

    /// Keys matching a glob pattern (only `*` wildcards are used by the core).
    fn keys(&self, pattern: &str) -> impl Future<Output = CacheResult<Vec<String>>> + Send;

    /// Prepend to a list. Returns the new length.
    fn lpush(&self, key: &str, value: &str) -> impl Future<Output = CacheResult<u64>> + Send;

    /// Inclusive range with Redis index semantics (negative counts from the end).
    fn lrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> impl Future<Output = CacheResult<Vec<String>>> + Send;

    /// Keep only the inclusive range of a list.
    fn ltrim(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> impl Future<Output = CacheResult<()>> + Send;

    /// Increment a hash field. Returns the new value.
    fn hincrby(
        &self,
        key: &str,
        field: &str,
        delta: i64,
    ) -> impl Future<Output = CacheResult<i64>> + Send;

    fn hgetall(&self, key: &str)
        -> impl Future<Output = CacheResult<HashMap<String, String>>> + Send;

    /// Set a TTL on an existing key. Returns false when the key does not exist.
    fn expire(&self, key: &str, ttl: Duration) -> impl Future<Output = CacheResult<bool>> + Send;

    /// Check if the cache backend is healthy
    fn health_check(&self) -> impl Future<Output = CacheResult<bool>> + Send;

    /// Get the name of the cache provider
    fn provider_name(&self) -> &'static str;

    /// Whether state is shared across processes (and involves network calls)
    fn is_distributed(&self) -> bool;
}

/// Resolve a Redis-style inclusive range against a list length.
pub(crate) fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

/// Glob match supporting `*` only.
pub(crate) fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !key.starts_with(first) || key.len() < first.len() + last.len() || !key.ends_with(last) {
        return false;
    }

    let mut remainder = &key[first.len()..key.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match remainder.find(part) {
            Some(index) => remainder = &remainder[index + part.len()..],
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_range() {
        assert_eq!(resolve_range(5, 0, -1), Some((0, 4)));
        assert_eq!(resolve_range(5, 0, 99), Some((0, 4)));
        assert_eq!(resolve_range(5, -2, -1), Some((3, 4)));
        assert_eq!(resolve_range(5, 3, 1), None);
        assert_eq!(resolve_range(0, 0, -1), None);
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("jjz:*", "jjz:京A12345"));
        assert!(!glob_match("jjz:*", "traffic:rules:2025-08-15"));
        assert!(glob_match("stats:*:2025-08-15", "stats:jjz:2025-08-15"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("a*b*c", "acb"));
    }
}
