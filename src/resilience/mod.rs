//! # Resilience Module
//!
//! Retry with backoff, per-service circuit breakers, a bounded error
//! collector and a throttled admin notifier. The resolver and the push
//! dispatcher take these as injected services; nothing here is a global.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use jjz_alert::clock::SystemClock;
//! use jjz_alert::error::AlertError;
//! use jjz_alert::resilience::{CircuitBreakerConfig, CircuitBreakerManager, RetryPolicy};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), AlertError> {
//! let breakers = CircuitBreakerManager::new(CircuitBreakerConfig::default(), Arc::new(SystemClock));
//! let breaker = breakers.get_circuit_breaker("account:main");
//!
//! let body = RetryPolicy::default()
//!     .run("query_account", || async {
//!         breaker
//!             .call(|| async { Ok::<_, AlertError>("{}".to_string()) })
//!             .await
//!             .map_err(|e| e.into_inner(|component| AlertError::CircuitOpen { component }))
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod circuit_breaker;
pub mod collector;
pub mod config;
pub mod handler;
pub mod manager;
pub mod retry;

pub use admin::{AdminSink, ThrottledAdminNotifier, DEFAULT_NOTIFY_INTERVAL};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitBreakerSnapshot, CircuitState};
pub use collector::{ErrorCollector, ErrorRecord, ErrorSummary};
pub use config::CircuitBreakerConfig;
pub use handler::{ErrorHandler, RecoveryStats, ResilienceStatus};
pub use manager::CircuitBreakerManager;
pub use retry::{with_retry, RetryPolicy};
