use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::SourceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls before letting one trial call through.
    pub cool_down: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cool_down: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct Breaker {
    state: CircuitState,
    failures: u32,
    opened_at: Option<Instant>,
}

/// Stops hammering a provider that keeps failing across symbols.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: &'static str,
    config: CircuitBreakerConfig,
    inner: Mutex<Breaker>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            config,
            inner: Mutex::new(Breaker {
                state: CircuitState::Closed,
                failures: 0,
                opened_at: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Breaker> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admits a call, or fails fast while the circuit is open.
    pub fn try_acquire(&self) -> Result<(), SourceError> {
        let mut inner = self.lock();
        if inner.state != CircuitState::Open {
            return Ok(());
        }

        let cooled = inner
            .opened_at
            .is_some_and(|opened_at| opened_at.elapsed() >= self.config.cool_down);
        if cooled {
            inner.state = CircuitState::HalfOpen;
            inner.opened_at = None;
            tracing::info!(provider = self.name, "circuit half-open, probing provider");
            Ok(())
        } else {
            Err(SourceError::unavailable(format!(
                "{} circuit is open after {} consecutive failures",
                self.name, inner.failures
            )))
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            tracing::info!(provider = self.name, "circuit closed");
        }
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failures = inner.failures.saturating_add(1);
        let trip = inner.state == CircuitState::HalfOpen
            || inner.failures >= self.config.failure_threshold;
        if trip && inner.state != CircuitState::Open {
            tracing::warn!(
                provider = self.name,
                failures = inner.failures,
                "circuit opened"
            );
        }
        if trip {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new("provider", CircuitBreakerConfig::default())
    }
}
