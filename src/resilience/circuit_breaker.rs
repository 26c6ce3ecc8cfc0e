//! # Circuit Breaker Implementation
//!
//! Fault isolation for upstream accounts, notifier channels and the
//! distributed cache. Three states: Closed (normal operation), Open (failing
//! fast) and Half-Open (one probe allowed after the cooldown).
//!
//! The cooldown is measured from the most recent failure, not from the moment
//! the circuit opened, and a single half-open success closes the circuit.

use crate::clock::{elapsed_since, SharedClock};
use crate::resilience::CircuitBreakerConfig;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, error, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Cooldown elapsed - the next call probes the dependency
    HalfOpen,
}

/// Errors that can occur during circuit breaker operation
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, rejecting all calls
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// Operation failed and was recorded
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

impl<E> CircuitBreakerError<E> {
    /// Collapse into the wrapped error type, mapping rejection through `on_open`.
    pub fn into_inner(self, on_open: impl FnOnce(String) -> E) -> E {
        match self {
            CircuitBreakerError::CircuitOpen { component } => on_open(component),
            CircuitBreakerError::OperationFailed(error) => error,
        }
    }
}

/// Point-in-time view of a breaker for status reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure_time: Option<DateTime<Local>>,
    pub total_calls: u64,
    pub rejected_calls: u64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<DateTime<Local>>,
    total_calls: u64,
    rejected_calls: u64,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: SharedClock,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig, clock: SharedClock) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            timeout_seconds = config.timeout.as_secs(),
            "🛡️ Circuit breaker initialized"
        );

        Self {
            name,
            config,
            clock,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_time: None,
                total_calls: 0,
                rejected_calls: 0,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute an operation with circuit breaker protection
    pub async fn call<F, T, E, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.should_allow_call() {
            return Err(CircuitBreakerError::CircuitOpen {
                component: self.name.clone(),
            });
        }

        let result = operation().await;

        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    fn should_allow_call(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.total_calls += 1;

        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure_time
                    .map(|at| elapsed_since(self.clock.as_ref(), at) >= self.config.timeout)
                    .unwrap_or(true);

                if cooled_down {
                    inner.state = CircuitState::HalfOpen;
                    info!(
                        component = %self.name,
                        failure_count = inner.failure_count,
                        "🟡 Circuit breaker half-open (testing recovery)"
                    );
                    true
                } else {
                    inner.rejected_calls += 1;
                    debug!(component = %self.name, "🔴 Call rejected, circuit open");
                    false
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        let previous = inner.state;
        inner.failure_count = 0;
        inner.state = CircuitState::Closed;

        if previous != CircuitState::Closed {
            info!(
                component = %self.name,
                total_calls = inner.total_calls,
                "🟢 Circuit breaker closed (recovered)"
            );
        }
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_time = Some(self.clock.now());

        let should_open = inner.state == CircuitState::HalfOpen
            || inner.failure_count >= self.config.failure_threshold;

        if should_open && inner.state != CircuitState::Open {
            inner.state = CircuitState::Open;
            error!(
                component = %self.name,
                failure_count = inner.failure_count,
                failure_threshold = self.config.failure_threshold,
                timeout_seconds = self.config.timeout.as_secs(),
                "🔴 Circuit breaker opened (failing fast)"
            );
        } else {
            warn!(
                component = %self.name,
                failure_count = inner.failure_count,
                "⚠️ Protected operation failed"
            );
        }
    }

    /// Force circuit to closed state and clear the failure history
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.last_failure_time = None;
        warn!(component = %self.name, "🚨 Circuit breaker reset");
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.inner.lock();
        CircuitBreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure_time: inner.last_failure_time,
            total_calls: inner.total_calls,
            rejected_calls: inner.rejected_calls,
        }
    }
}
