//! Interceptors installed on every `MarketClient`
//!
//! Order matters: the auth interceptor augments the request, then the
//! circuit gate decides admission, and the outcome recorder tallies the
//! settled result against the partition's breaker.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::{ApiRequest, ApiResponse, Interceptor, TokenStore};
use crate::error::{Result, ServiceError};
use crate::resilience::{BreakerRegistry, Partition};

/// Attaches `Authorization: Bearer <token>` when a token is stored
pub struct AuthInterceptor {
    store: Arc<dyn TokenStore>,
}

impl AuthInterceptor {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }
}

impl Interceptor for AuthInterceptor {
    fn on_request(&self, request: ApiRequest) -> Result<ApiRequest> {
        match self.store.token() {
            Some(token) if !token.is_empty() => {
                Ok(request.header("Authorization", format!("Bearer {}", token)))
            }
            _ => Ok(request),
        }
    }
}

/// Refuses to dispatch calls whose partition breaker is open
pub struct CircuitGate {
    registry: Arc<BreakerRegistry>,
}

impl CircuitGate {
    pub fn new(registry: Arc<BreakerRegistry>) -> Self {
        Self { registry }
    }
}

impl Interceptor for CircuitGate {
    fn on_request(&self, request: ApiRequest) -> Result<ApiRequest> {
        let (partition, breaker) = self.registry.for_path(&request.path);

        if !breaker.can_execute() {
            warn!(%partition, path = %request.path, "Circuit breaker is open, rejecting request");
            return Err(ServiceError::circuit_open(partition));
        }

        Ok(request)
    }
}

/// Credits or debits the breaker of the partition a call was issued to.
///
/// Never alters the outcome it observes.
pub struct OutcomeRecorder {
    registry: Arc<BreakerRegistry>,
}

impl OutcomeRecorder {
    pub fn new(registry: Arc<BreakerRegistry>) -> Self {
        Self { registry }
    }

    /// Partition an error is attributed to; `Default` when the error does
    /// not know which request it came from
    pub fn partition_for_error(error: &ServiceError) -> Partition {
        error
            .request_path()
            .map(Partition::classify)
            .unwrap_or(Partition::Default)
    }
}

impl Interceptor for OutcomeRecorder {
    fn on_response(&self, response: ApiResponse) -> ApiResponse {
        let (partition, breaker) = self.registry.for_path(&response.request.path);
        debug!(%partition, status = response.status, "Recording success");
        breaker.record_success();
        response
    }

    fn on_error(&self, error: ServiceError) -> ServiceError {
        if error.is_cancelled() || error.is_circuit_open() {
            return error;
        }

        let partition = Self::partition_for_error(&error);
        debug!(%partition, status = ?error.status_code(), "Recording failure: {}", error);
        self.registry.get(partition).record_failure();
        error
    }
}
