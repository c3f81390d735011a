//! Circuit breaker implementation for isolating failing API partitions
//!
//! Each breaker is a consecutive-failure counter with three states:
//!
//! ```text
//! Closed   --N-th consecutive failure-->              Open
//! Open     --inspected once recovery_timeout passed--> HalfOpen (probe allowed)
//! HalfOpen --success-->                               Closed (count reset)
//! HalfOpen --failure-->                               Open   (count still >= N)
//! ```
//!
//! There is no sliding window and no success threshold: one success at any
//! point closes the breaker and clears the count.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::CircuitBreakerStatus;

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before the circuit opens
    pub failure_threshold: u32,

    /// Time after the last failure before a probe request is let through
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    status: CircuitBreakerStatus,
    failure_count: u32,
    last_failure: Option<Instant>,
}

/// A circuit breaker guarding a single service partition.
///
/// All state lives behind one mutex so that the inspection in
/// [`CircuitBreaker::can_execute`] and the transition it may perform are a
/// single atomic step.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<BreakerState>,
    total_failures: AtomicU64,
    total_successes: AtomicU64,
}

impl CircuitBreaker {
    /// Create a new circuit breaker on the system clock
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock("breaker", config, Arc::new(SystemClock))
    }

    /// Create a named circuit breaker reading time from `clock`
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            clock,
            state: Mutex::new(BreakerState {
                status: CircuitBreakerStatus::Closed,
                failure_count: 0,
                last_failure: None,
            }),
            total_failures: AtomicU64::new(0),
            total_successes: AtomicU64::new(0),
        }
    }

    /// Check whether a call may proceed.
    ///
    /// This is an impure query: once the recovery timeout has elapsed since
    /// the last failure, an open breaker moves to half-open and the calling
    /// request is admitted as the probe.
    pub fn can_execute(&self) -> bool {
        let now = self.clock.now();
        let mut state = self.lock();

        if state.status != CircuitBreakerStatus::Open {
            return true;
        }

        if self.recovery_elapsed(&state, now) {
            state.status = CircuitBreakerStatus::HalfOpen;
            info!(breaker = %self.name, "Circuit breaker transitioning to Half-Open state");
            true
        } else {
            false
        }
    }

    /// Record a successful call. Idempotent.
    pub fn record_success(&self) {
        self.total_successes.fetch_add(1, Ordering::Relaxed);
        let mut state = self.lock();

        if state.status != CircuitBreakerStatus::Closed {
            info!(breaker = %self.name, "Circuit breaker transitioning to Closed state");
        }

        state.failure_count = 0;
        state.status = CircuitBreakerStatus::Closed;
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        let now = self.clock.now();
        let mut state = self.lock();

        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure = Some(now);

        if state.failure_count >= self.config.failure_threshold {
            if state.status != CircuitBreakerStatus::Open {
                warn!(
                    breaker = %self.name,
                    failures = state.failure_count,
                    "Circuit breaker transitioning to Open state"
                );
            }
            state.status = CircuitBreakerStatus::Open;
        } else {
            debug!(breaker = %self.name, failures = state.failure_count, "Failure recorded");
        }
    }

    /// Current status, without side effects.
    ///
    /// An open breaker whose recovery timeout has elapsed reports
    /// `HalfOpen` even before the next `can_execute` performs the transition.
    pub fn status(&self) -> CircuitBreakerStatus {
        let now = self.clock.now();
        let state = self.lock();

        match state.status {
            CircuitBreakerStatus::Open if self.recovery_elapsed(&state, now) => {
                CircuitBreakerStatus::HalfOpen
            }
            status => status,
        }
    }

    /// Current number of consecutive failures
    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Time of the most recent recorded failure
    pub fn last_failure(&self) -> Option<Instant> {
        self.lock().last_failure
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get metrics about the circuit breaker
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let now = self.clock.now();
        let status = self.status();
        let state = self.lock();

        CircuitBreakerMetrics {
            name: self.name.clone(),
            status,
            failure_count: state.failure_count,
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_successes: self.total_successes.load(Ordering::Relaxed),
            since_last_failure: state
                .last_failure
                .map(|at| now.saturating_duration_since(at)),
        }
    }

    fn recovery_elapsed(&self, state: &BreakerState, now: Instant) -> bool {
        match state.last_failure {
            Some(at) => now.saturating_duration_since(at) >= self.config.recovery_timeout,
            None => true,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Metrics for a circuit breaker
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerMetrics {
    /// Breaker name
    pub name: String,

    /// Current status
    pub status: CircuitBreakerStatus,

    /// Current consecutive failure count
    pub failure_count: u32,

    /// Total failures seen
    pub total_failures: u64,

    /// Total successes seen
    pub total_successes: u64,

    /// Time since the last recorded failure, if any
    pub since_last_failure: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::ManualClock;

    fn breaker() -> (CircuitBreaker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cb = CircuitBreaker::with_clock("test", CircuitBreakerConfig::default(), clock.clone());
        (cb, clock)
    }

    fn open(cb: &CircuitBreaker) {
        for _ in 0..cb.config().failure_threshold {
            cb.record_failure();
        }
    }

    #[test]
    fn test_circuit_closed_initially() {
        let (cb, _) = breaker();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert_eq!(cb.failure_count(), 0);
        assert!(cb.last_failure().is_none());
        assert!(cb.can_execute());
    }

    #[test]
    fn test_circuit_opens_exactly_at_threshold() {
        let (cb, _) = breaker();

        for expected in 1..5 {
            cb.record_failure();
            assert_eq!(cb.failure_count(), expected);
            assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
            assert!(cb.can_execute());
        }

        cb.record_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Open);
        assert!(!cb.can_execute());
    }

    #[test]
    fn test_success_interrupts_failure_streak() {
        let (cb, _) = breaker();
        for _ in 0..4 {
            cb.record_failure();
        }
        cb.record_success();
        for _ in 0..4 {
            cb.record_failure();
        }
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
    }

    #[test]
    fn test_open_denies_until_recovery_timeout() {
        let (cb, clock) = breaker();
        open(&cb);

        clock.advance(Duration::from_millis(59_999));
        assert!(!cb.can_execute());
        assert_eq!(cb.status(), CircuitBreakerStatus::Open);

        clock.advance(Duration::from_millis(1));
        assert!(cb.can_execute());
        assert_eq!(cb.status(), CircuitBreakerStatus::HalfOpen);
    }

    #[test]
    fn test_status_reports_half_open_without_inspection() {
        let (cb, clock) = breaker();
        open(&cb);
        clock.advance(Duration::from_secs(61));

        // Read accessor reports the effective state but does not transition
        assert_eq!(cb.status(), CircuitBreakerStatus::HalfOpen);
        assert_eq!(cb.lock().status, CircuitBreakerStatus::Open);
    }

    #[test]
    fn test_half_open_success_closes() {
        let (cb, clock) = breaker();
        open(&cb);
        clock.advance(Duration::from_secs(60));
        assert!(cb.can_execute());

        cb.record_success();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[test]
    fn test_half_open_failure_reopens_and_restamps() {
        let (cb, clock) = breaker();
        open(&cb);
        let first_failure = cb.last_failure();

        clock.advance(Duration::from_secs(60));
        assert!(cb.can_execute());
        assert_eq!(cb.failure_count(), 5);

        cb.record_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Open);
        assert_eq!(cb.failure_count(), 6);
        assert!(cb.last_failure() > first_failure);

        // The new failure restarts the recovery window
        clock.advance(Duration::from_secs(30));
        assert!(!cb.can_execute());
    }

    #[test]
    fn test_record_success_is_idempotent() {
        let (cb, _) = breaker();
        cb.record_success();
        cb.record_success();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert_eq!(cb.failure_count(), 0);
        assert!(cb.can_execute());
    }

    #[test]
    fn test_metrics() {
        let (cb, clock) = breaker();
        cb.record_failure();
        clock.advance(Duration::from_secs(2));
        cb.record_success();
        cb.record_failure();

        let metrics = cb.metrics();
        assert_eq!(metrics.name, "test");
        assert_eq!(metrics.failure_count, 1);
        assert_eq!(metrics.total_failures, 2);
        assert_eq!(metrics.total_successes, 1);
        assert_eq!(metrics.since_last_failure, Some(Duration::ZERO));
    }
}
