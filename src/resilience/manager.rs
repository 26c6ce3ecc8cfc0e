//! # Circuit Breaker Manager
//!
//! One breaker per logical service name (`account:main`, `notifier:apprise`,
//! `cache:redis`, ...), created lazily on first use and kept for the process
//! lifetime.

use crate::clock::SharedClock;
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot, CircuitState};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct CircuitBreakerManager {
    circuit_breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    config: CircuitBreakerConfig,
    clock: SharedClock,
}

impl CircuitBreakerManager {
    pub fn new(config: CircuitBreakerConfig, clock: SharedClock) -> Self {
        info!(
            failure_threshold = config.failure_threshold,
            timeout_seconds = config.timeout.as_secs(),
            "Initializing circuit breaker manager"
        );

        Self {
            circuit_breakers: RwLock::new(HashMap::new()),
            config,
            clock,
        }
    }

    /// Get or create circuit breaker for a component
    pub fn get_circuit_breaker(&self, component_name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.circuit_breakers.read().get(component_name) {
            return Arc::clone(breaker);
        }

        let mut breakers = self.circuit_breakers.write();

        // Double-check: another task may have created it between the two locks
        if let Some(breaker) = breakers.get(component_name) {
            return Arc::clone(breaker);
        }

        let breaker = Arc::new(CircuitBreaker::new(
            component_name,
            self.config.clone(),
            Arc::clone(&self.clock),
        ));
        breakers.insert(component_name.to_string(), Arc::clone(&breaker));
        breaker
    }

    pub fn list_components(&self) -> Vec<String> {
        let mut names: Vec<String> = self.circuit_breakers.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn snapshots(&self) -> Vec<CircuitBreakerSnapshot> {
        let mut snapshots: Vec<CircuitBreakerSnapshot> = self
            .circuit_breakers
            .read()
            .values()
            .map(|breaker| breaker.snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    pub fn open_circuits(&self) -> Vec<String> {
        self.snapshots()
            .into_iter()
            .filter(|snapshot| snapshot.state == CircuitState::Open)
            .map(|snapshot| snapshot.name)
            .collect()
    }

    /// Reset a single breaker. Returns false when no breaker with that name exists.
    pub fn reset(&self, component_name: &str) -> bool {
        match self.circuit_breakers.read().get(component_name) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }
}
