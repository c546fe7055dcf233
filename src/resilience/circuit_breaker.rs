// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Circuit breaker guarding calls to the upstream draw source.
//!
//! Provides protection against cascading failures when the external API is
//! unhealthy. Wraps async operations, counts consecutive failures and trips
//! the breaker when the threshold is reached.
//!
//! States:
//! - Closed: Normal operation, requests pass through
//! - Open: Source unhealthy, requests fail fast without attempting
//! - HalfOpen: Exactly one trial request is in flight; everyone else is rejected
//!
//! ```text
//!            failures >= threshold
//!   Closed ─────────────────────────▶ Open
//!     ▲                                │ recovery_timeout elapsed,
//!     │ trial ok                       │ next call becomes the trial
//!     │                                ▼
//!     └──────────────────────────── HalfOpen ──trial failed──▶ Open
//! ```
//!
//! All transitions happen under one lock, so concurrent callers observe a
//! single shared state and at most one trial is admitted at a time. The lock
//! is never held across the guarded operation.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Circuit breaker state for metrics/monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed = 0,
    HalfOpen = 1,
    Open = 2,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::HalfOpen => write!(f, "half_open"),
            Self::Open => write!(f, "open"),
        }
    }
}

/// Error type for circuit-protected operations
#[derive(Debug, thiserror::Error)]
pub enum CircuitError<E> {
    /// The circuit breaker rejected the call (circuit is open)
    #[error("circuit breaker open, request rejected")]
    Rejected,

    /// The underlying operation failed
    #[error("operation failed: {0}")]
    Inner(#[source] E),
}

/// Configuration for a circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitConfig {
    /// Number of consecutive failures to trip the circuit
    pub failure_threshold: u32,
    /// How long to stay open before admitting a trial call
    pub recovery_timeout: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitConfig {
    /// Aggressive config (trips faster, waits longer to recover)
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(60),
        }
    }

    /// Lenient config (tolerates more failures)
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            failure_threshold: 10,
            recovery_timeout: Duration::from_secs(15),
        }
    }

    /// Fast recovery for testing
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            failure_threshold: 2,
            recovery_timeout: Duration::from_millis(50),
        }
    }
}

/// Point-in-time view of a breaker, for stats endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitStats {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub calls_total: u64,
    pub rejections: u64,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
    /// Set while the single half-open trial is running
    trial_in_flight: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Trial,
}

/// A named circuit breaker with metrics tracking
pub struct CircuitBreaker {
    name: String,
    config: CircuitConfig,
    inner: Mutex<Inner>,

    // Metrics
    calls_total: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and config
    pub fn new(name: impl Into<String>, config: CircuitConfig) -> Self {
        let name = name.into();
        info!(
            circuit = %name,
            threshold = config.failure_threshold,
            recovery_secs = config.recovery_timeout.as_secs_f64(),
            "Circuit breaker initialized"
        );
        crate::metrics::set_circuit_state(&name, CircuitState::Closed as u8);

        Self {
            name,
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                last_failure_at: None,
                trial_in_flight: false,
            }),
            calls_total: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
        }
    }

    /// Create with default config
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitConfig::default())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    /// Current state. Does not promote Open to HalfOpen; that happens on the
    /// next call.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Consecutive failures counted while closed
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Execute an async operation through the circuit breaker.
    ///
    /// Takes a closure that returns a Future, so a rejected call never
    /// constructs the operation at all. Only `Err` counts as a failure; an
    /// operation that wants "absent" to be benign should return it in `Ok`.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.calls_total.fetch_add(1, Ordering::Relaxed);

        let Some(admission) = self.try_admit() else {
            self.rejections.fetch_add(1, Ordering::Relaxed);
            warn!(circuit = %self.name, "Circuit breaker rejected call (open)");
            crate::metrics::record_circuit_call(&self.name, "rejected");
            return Err(CircuitError::Rejected);
        };

        // Resolves the trial as a failure if the future is dropped mid-flight
        let mut guard = TrialGuard { breaker: self, admission, armed: true };

        match f().await {
            Ok(result) => {
                guard.armed = false;
                self.on_success(admission);
                self.successes.fetch_add(1, Ordering::Relaxed);
                debug!(circuit = %self.name, "Circuit call succeeded");
                crate::metrics::record_circuit_call(&self.name, "success");
                Ok(result)
            }
            Err(e) => {
                guard.armed = false;
                self.on_failure(admission);
                self.failures.fetch_add(1, Ordering::Relaxed);
                debug!(circuit = %self.name, "Circuit call failed");
                crate::metrics::record_circuit_call(&self.name, "failure");
                Err(CircuitError::Inner(e))
            }
        }
    }

    fn try_admit(&self) -> Option<Admission> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Some(Admission::Normal),
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|t| Instant::now().saturating_duration_since(t))
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.config.recovery_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    info!(circuit = %self.name, "Circuit breaker half-open, admitting trial call");
                    crate::metrics::set_circuit_state(&self.name, CircuitState::HalfOpen as u8);
                    Some(Admission::Trial)
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    None
                } else {
                    inner.trial_in_flight = true;
                    Some(Admission::Trial)
                }
            }
        }
    }

    fn on_success(&self, admission: Admission) {
        let mut inner = self.inner.lock();
        match admission {
            Admission::Trial => {
                inner.trial_in_flight = false;
                inner.state = CircuitState::Closed;
                inner.failure_count = 0;
                info!(circuit = %self.name, "Circuit breaker recovered, closed");
                crate::metrics::set_circuit_state(&self.name, CircuitState::Closed as u8);
            }
            Admission::Normal => {
                // A call admitted while closed may land after the breaker
                // tripped; it must not close it again.
                if inner.state == CircuitState::Closed {
                    inner.failure_count = 0;
                }
            }
        }
    }

    fn on_failure(&self, admission: Admission) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        inner.last_failure = Some(now);
        inner.last_failure_at = Some(Utc::now());

        match admission {
            Admission::Trial => {
                inner.trial_in_flight = false;
                inner.state = CircuitState::Open;
                warn!(circuit = %self.name, "Trial call failed, circuit re-opened");
                crate::metrics::set_circuit_state(&self.name, CircuitState::Open as u8);
            }
            Admission::Normal => {
                if inner.state != CircuitState::Closed {
                    return;
                }
                inner.failure_count += 1;
                warn!(
                    circuit = %self.name,
                    failures = inner.failure_count,
                    threshold = self.config.failure_threshold,
                    "Circuit breaker failure"
                );
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    error!(
                        circuit = %self.name,
                        failures = inner.failure_count,
                        "Circuit breaker opened"
                    );
                    crate::metrics::set_circuit_state(&self.name, CircuitState::Open as u8);
                }
            }
        }
    }

    /// Manually close the circuit and clear the failure history
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.last_failure = None;
        inner.last_failure_at = None;
        inner.trial_in_flight = false;
        info!(circuit = %self.name, "Circuit breaker manually reset");
        crate::metrics::set_circuit_state(&self.name, CircuitState::Closed as u8);
    }

    /// Snapshot for stats endpoints
    #[must_use]
    pub fn stats(&self) -> CircuitStats {
        let inner = self.inner.lock();
        CircuitStats {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            failure_threshold: self.config.failure_threshold,
            last_failure_at: inner.last_failure_at,
            calls_total: self.calls_total(),
            rejections: self.rejections(),
        }
    }

    /// Get total number of calls
    #[must_use]
    pub fn calls_total(&self) -> u64 {
        self.calls_total.load(Ordering::Relaxed)
    }

    /// Get number of successful calls
    #[must_use]
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    /// Get number of failed calls (operation errors)
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Get number of rejected calls (circuit open)
    #[must_use]
    pub fn rejections(&self) -> u64 {
        self.rejections.load(Ordering::Relaxed)
    }
}

struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.admission == Admission::Trial {
            debug!(circuit = %self.breaker.name, "Trial call cancelled");
            self.breaker.on_failure(Admission::Trial);
        }
    }
}
