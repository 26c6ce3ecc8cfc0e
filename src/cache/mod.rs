//! # Cache
//!
//! Backend contract ([`CacheService`]), the breaker-guarded
//! [`CacheProvider`] that dispatches over the configured backend, and
//! [`PermitCache`], which owns the key schema used by the rest of the crate.
//!
//! Absence is a normal outcome. A cache failure never fails a resolution or
//! a dispatch; callers log it and carry on.
//!
//! ```rust
//! use jjz_alert::cache::CacheProvider;
//! use jjz_alert::clock::{SharedClock, SystemClock};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let clock: SharedClock = Arc::new(SystemClock);
//! let cache = CacheProvider::memory(clock);
//!
//! cache.set("jjz:status:京A12345", "{}", Some(Duration::from_secs(60))).await.unwrap();
//! assert_eq!(cache.get("jjz:status:京A12345").await.unwrap().as_deref(), Some("{}"));
//! assert!(CacheProvider::noop().get("jjz:status:京A12345").await.unwrap().is_none());
//! # });
//! ```

pub mod errors;
pub mod provider;
pub mod providers;
pub mod store;
pub mod traits;

pub use errors::{CacheError, CacheResult};
pub use provider::CacheProvider;
pub use store::{CacheSettings, CacheStats, KindStats, PermitCache, StatOp};
pub use traits::CacheService;
