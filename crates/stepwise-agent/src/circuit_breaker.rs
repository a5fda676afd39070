//! Circuit breaker for the language-model API
//!
//! A scenario interprets every step through the API. When the API keeps
//! failing (bad key, quota, outage) the breaker opens and further steps go
//! straight to the fallback table instead of waiting on doomed requests.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use stepwise_core::{Result, StepwiseError};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests allowed
    Closed,
    /// Too many consecutive failures; requests rejected
    Open,
    /// Cool-down elapsed; the next request probes recovery
    HalfOpen,
}

/// Consecutive-failure circuit breaker, owned by one client
///
/// ```
/// use stepwise_agent::{CircuitBreaker, CircuitState};
///
/// let cb = CircuitBreaker::new(2, 60);
/// cb.record_failure();
/// cb.record_failure();
/// assert_eq!(cb.state(), CircuitState::Open);
/// assert!(cb.guard().is_err());
/// ```
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_count: AtomicU32,
    last_failure_ms: AtomicU64,
    threshold: u32,
    cool_down: Duration,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

impl CircuitBreaker {
    /// `threshold` consecutive failures open the circuit for `cool_down_secs`
    pub fn new(threshold: u32, cool_down_secs: u64) -> Self {
        Self {
            failure_count: AtomicU32::new(0),
            last_failure_ms: AtomicU64::new(0),
            threshold,
            cool_down: Duration::from_secs(cool_down_secs),
        }
    }

    pub fn state(&self) -> CircuitState {
        if self.failure_count.load(Ordering::Relaxed) < self.threshold {
            return CircuitState::Closed;
        }
        if self.remaining_cool_down_ms() == 0 {
            CircuitState::HalfOpen
        } else {
            CircuitState::Open
        }
    }

    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        self.last_failure_ms.store(now_millis(), Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Err with the remaining cool-down while the circuit is open
    pub fn guard(&self) -> Result<()> {
        match self.state() {
            CircuitState::Open => Err(StepwiseError::ApiLimit(format!(
                "Circuit breaker is OPEN after {} consecutive API failures; retry in {}s",
                self.failure_count(),
                self.remaining_cool_down_ms().div_ceil(1000)
            ))),
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
        }
    }

    fn remaining_cool_down_ms(&self) -> u64 {
        let elapsed = now_millis().saturating_sub(self.last_failure_ms.load(Ordering::Relaxed));
        (self.cool_down.as_millis() as u64).saturating_sub(elapsed)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        // 3 failures, 60 second cool-down
        Self::new(3, 60)
    }
}
