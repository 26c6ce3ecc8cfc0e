//! Cache provider implementations

pub mod memory;
pub mod noop;

#[cfg(feature = "cache-redis")]
pub mod redis;

pub use memory::MemoryCacheService;
pub use noop::NoOpCacheService;

#[cfg(feature = "cache-redis")]
pub use self::redis::RedisCacheService;
