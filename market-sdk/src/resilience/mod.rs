//! Resilience patterns for the marketplace client
//!
//! This module provides:
//! - A consecutive-failure circuit breaker per service partition
//! - The registry mapping partitions to breakers, and the path classifier
//! - The retry policy used by queries and mutations
//! - An injectable clock so recovery timeouts can be tested

mod circuit_breaker;
mod clock;
mod registry;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics};
pub use clock::{Clock, ManualClock, SystemClock};
pub use registry::{BreakerRegistry, BreakerSnapshot, Partition};
pub use retry::{CallKind, RetryConfig, RetryExecutor, RetryPolicy};

use serde::Serialize;

/// Status of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitBreakerStatus {
    /// Circuit is closed, allowing requests
    Closed,

    /// Circuit is open, rejecting requests
    Open,

    /// Circuit is half-open, letting a probe request through
    HalfOpen,
}

impl std::fmt::Display for CircuitBreakerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}
