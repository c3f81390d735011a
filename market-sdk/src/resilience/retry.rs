//! Retry policy for queries and mutations
//!
//! The policy decides whether a failed call is re-issued. It consults the
//! default breaker first, never retries 4xx responses, and caps the number
//! of retries separately for reads (queries) and writes (mutations).
//! Exhausting a query's retries counts as one more failure against the
//! default breaker; mutations report their terminal outcome through
//! [`RetryPolicy::on_mutation_success`] / [`RetryPolicy::on_mutation_error`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use tracing::{debug, warn};

use super::registry::BreakerRegistry;
use crate::error::{Result, ServiceError};

/// Whether a call reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Query,
    Mutation,
}

impl CallKind {
    /// GET and HEAD are queries; every other method mutates
    pub fn for_method(method: &Method) -> Self {
        if *method == Method::GET || *method == Method::HEAD {
            CallKind::Query
        } else {
            CallKind::Mutation
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries granted to a query after its first failure
    pub query_max_retries: u32,

    /// Retries granted to a mutation after its first failure
    pub mutation_max_retries: u32,

    /// First query backoff; doubles per retry
    pub base_delay: Duration,

    /// Upper bound for query backoff
    pub max_delay: Duration,

    /// Fixed delay between mutation attempts
    pub mutation_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            query_max_retries: 3,
            mutation_max_retries: 1,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            mutation_delay: Duration::from_millis(1000),
        }
    }
}

impl fmt::Display for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RetryConfig {{ query_max_retries: {}, mutation_max_retries: {}, base_delay: {:?}, max_delay: {:?}, mutation_delay: {:?} }}",
            self.query_max_retries,
            self.mutation_max_retries,
            self.base_delay,
            self.max_delay,
            self.mutation_delay
        )
    }
}

/// Retry decisions backed by the default breaker
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    registry: Arc<BreakerRegistry>,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig, registry: Arc<BreakerRegistry>) -> Self {
        Self { config, registry }
    }

    /// Decide whether to re-issue a call.
    ///
    /// `failure_count` is the number of retries already performed for the
    /// call, so it is 0 when the first attempt fails. With the default
    /// ceiling of 3, `should_retry(Query, 2, ..)` is still true: a query is
    /// attempted four times and gives up when the count reaches 3.
    pub fn should_retry(&self, kind: CallKind, failure_count: u32, error: &ServiceError) -> bool {
        let breaker = self.registry.default_breaker();

        if !breaker.can_execute() {
            debug!(?kind, "Default circuit breaker is open, not retrying");
            return false;
        }

        if error.is_client_error() {
            debug!(?kind, status = ?error.status_code(), "Client error, not retrying");
            return false;
        }

        let ceiling = match kind {
            CallKind::Query => self.config.query_max_retries,
            CallKind::Mutation => self.config.mutation_max_retries,
        };

        if failure_count < ceiling {
            return true;
        }

        if kind == CallKind::Query {
            warn!(retries = failure_count, "Query retries exhausted: {}", error);
            breaker.record_failure();
        }
        false
    }

    /// Delay before retry number `attempt_index` (0-based)
    pub fn retry_delay(&self, kind: CallKind, attempt_index: u32) -> Duration {
        match kind {
            CallKind::Query => {
                let factor = 2u32.saturating_pow(attempt_index);
                self.config
                    .base_delay
                    .saturating_mul(factor)
                    .min(self.config.max_delay)
            }
            CallKind::Mutation => self.config.mutation_delay,
        }
    }

    /// Terminal success of a mutation
    pub fn on_mutation_success(&self) {
        self.registry.default_breaker().record_success();
    }

    /// Terminal failure of a mutation
    pub fn on_mutation_error(&self, error: &ServiceError) {
        debug!("Mutation failed: {}", error);
        self.registry.default_breaker().record_failure();
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

/// Drives a call through the retry policy, sleeping between attempts
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run a read-type call
    pub async fn query<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run(CallKind::Query, operation).await
    }

    /// Run a write-type call, reporting its terminal outcome to the default breaker
    pub async fn mutation<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let result = self.run(CallKind::Mutation, operation).await;

        match &result {
            Ok(_) => self.policy.on_mutation_success(),
            Err(err) => self.policy.on_mutation_error(err),
        }

        result
    }

    async fn run<F, Fut, T>(&self, kind: CallKind, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if self.policy.should_retry(kind, retries, &err) => {
                    let delay = self.policy.retry_delay(kind, retries);
                    debug!(
                        ?kind,
                        attempt = retries + 1,
                        ?delay,
                        "Call failed with retryable error, retrying: {}",
                        err
                    );
                    tokio::time::sleep(delay).await;
                    retries += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}
