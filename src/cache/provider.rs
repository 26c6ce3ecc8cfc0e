//! Cache provider with integrated circuit breaker
//!
//! Uses enum dispatch over the concrete backends. Circuit breaker protection
//! is internal: consumers use `CacheProvider` and get fail-fast behavior when
//! the distributed backend is unavailable.

use super::errors::CacheResult;
use super::providers::{MemoryCacheService, NoOpCacheService};
use super::traits::CacheService;
use crate::clock::SharedClock;
use crate::resilience::{CircuitBreaker, CircuitBreakerError, CircuitBreakerManager, CircuitState};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[cfg(feature = "cache-redis")]
use super::providers::RedisCacheService;

#[cfg(feature = "cache-redis")]
const CACHE_BREAKER: &str = "cache:redis";

#[derive(Debug, Clone)]
enum CacheBackend {
    #[cfg(feature = "cache-redis")]
    Redis(Box<RedisCacheService>),
    Memory(Box<MemoryCacheService>),
    NoOp(NoOpCacheService),
}

macro_rules! dispatch {
    ($backend:expr, $svc:ident => $call:expr) => {
        match $backend {
            #[cfg(feature = "cache-redis")]
            CacheBackend::Redis($svc) => $call,
            CacheBackend::Memory($svc) => $call,
            CacheBackend::NoOp($svc) => $call,
        }
    };
}

/// Cache provider with circuit breaker protection for distributed backends
///
/// - When open: reads return absent/empty, writes are no-ops
/// - Closes again on the first successful probe after the cooldown
///
/// In-memory backends don't need circuit breaker protection.
#[derive(Clone)]
pub struct CacheProvider {
    backend: CacheBackend,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
}

impl std::fmt::Debug for CacheProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheProvider")
            .field("backend", &self.backend)
            .field(
                "circuit_breaker",
                &self.circuit_breaker.as_ref().map(|cb| cb.state()),
            )
            .finish()
    }
}

impl CacheProvider {
    /// Build a provider from the optional Redis URL.
    ///
    /// Without a URL (or when Redis cannot be reached, or the `cache-redis`
    /// feature is off) the in-memory backend is used. Startup never fails
    /// because of the cache.
    pub async fn from_config_graceful(
        redis_url: Option<&str>,
        breakers: &CircuitBreakerManager,
        clock: SharedClock,
    ) -> Self {
        let Some(url) = redis_url.filter(|url| !url.trim().is_empty()) else {
            info!(backend = "memory", "Cache provider initialized");
            return Self::memory(clock);
        };

        Self::create_redis(url, breakers, clock).await
    }

    #[cfg(feature = "cache-redis")]
    async fn create_redis(url: &str, breakers: &CircuitBreakerManager, clock: SharedClock) -> Self {
        match RedisCacheService::connect(url).await {
            Ok(service) => {
                info!(backend = "redis", "Distributed cache provider initialized successfully");
                Self {
                    backend: CacheBackend::Redis(Box::new(service)),
                    circuit_breaker: Some(breakers.get_circuit_breaker(CACHE_BREAKER)),
                }
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Failed to connect to Redis, falling back to in-memory cache (graceful degradation)"
                );
                Self::memory(clock)
            }
        }
    }

    #[cfg(not(feature = "cache-redis"))]
    async fn create_redis(_url: &str, _breakers: &CircuitBreakerManager, clock: SharedClock) -> Self {
        warn!("Redis cache backend requested but 'cache-redis' feature not enabled, using in-memory cache");
        Self::memory(clock)
    }

    pub fn memory(clock: SharedClock) -> Self {
        Self {
            backend: CacheBackend::Memory(Box::new(MemoryCacheService::new(clock))),
            circuit_breaker: None,
        }
    }

    pub fn noop() -> Self {
        Self {
            backend: CacheBackend::NoOp(NoOpCacheService::new()),
            circuit_breaker: None,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        dispatch!(&self.backend, s => s.provider_name())
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.backend, CacheBackend::NoOp(_))
    }

    pub fn circuit_state(&self) -> Option<CircuitState> {
        self.circuit_breaker.as_ref().map(|cb| cb.state())
    }

    async fn guarded<T, Fut>(&self, operation: &str, degraded: T, call: Fut) -> CacheResult<T>
    where
        Fut: Future<Output = CacheResult<T>>,
    {
        let Some(cb) = &self.circuit_breaker else {
            return call.await;
        };

        match cb.call(|| call).await {
            Ok(value) => Ok(value),
            Err(CircuitBreakerError::CircuitOpen { .. }) => {
                debug!(operation, "Cache circuit open, degrading");
                Ok(degraded)
            }
            Err(CircuitBreakerError::OperationFailed(e)) => Err(e),
        }
    }

    pub async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.guarded("get", None, async {
            dispatch!(&self.backend, s => s.get(key).await)
        })
        .await
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        self.guarded("set", (), async {
            dispatch!(&self.backend, s => s.set(key, value, ttl).await)
        })
        .await
    }

    pub async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.guarded("delete", false, async {
            dispatch!(&self.backend, s => s.delete(key).await)
        })
        .await
    }

    pub async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        self.guarded("keys", Vec::new(), async {
            dispatch!(&self.backend, s => s.keys(pattern).await)
        })
        .await
    }

    pub async fn lpush(&self, key: &str, value: &str) -> CacheResult<u64> {
        self.guarded("lpush", 0, async {
            dispatch!(&self.backend, s => s.lpush(key, value).await)
        })
        .await
    }

    pub async fn lrange(&self, key: &str, start: isize, stop: isize) -> CacheResult<Vec<String>> {
        self.guarded("lrange", Vec::new(), async {
            dispatch!(&self.backend, s => s.lrange(key, start, stop).await)
        })
        .await
    }

    pub async fn ltrim(&self, key: &str, start: isize, stop: isize) -> CacheResult<()> {
        self.guarded("ltrim", (), async {
            dispatch!(&self.backend, s => s.ltrim(key, start, stop).await)
        })
        .await
    }

    pub async fn hincrby(&self, key: &str, field: &str, delta: i64) -> CacheResult<i64> {
        self.guarded("hincrby", 0, async {
            dispatch!(&self.backend, s => s.hincrby(key, field, delta).await)
        })
        .await
    }

    pub async fn hgetall(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        self.guarded("hgetall", HashMap::new(), async {
            dispatch!(&self.backend, s => s.hgetall(key).await)
        })
        .await
    }

    pub async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        self.guarded("expire", false, async {
            dispatch!(&self.backend, s => s.expire(key, ttl).await)
        })
        .await
    }

    pub async fn health_check(&self) -> CacheResult<bool> {
        dispatch!(&self.backend, s => s.health_check().await)
    }
}
