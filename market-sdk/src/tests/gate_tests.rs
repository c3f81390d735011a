//! Gate and recorder tests against a mocked transport
//!
//! The mocked `Transport` lets these tests assert exactly whether the
//! network was contacted, independent of any HTTP server.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::{json, Value};
    use tokio_test::{assert_err, assert_ok};

    use crate::core::{ApiRequest, ApiResponse, ClientBuilder, MockTransport, RequestExecutor, REQUEST_ID_HEADER};
    use crate::error::{ErrorContext, ServiceError};
    use crate::resilience::{BreakerRegistry, CircuitBreakerConfig, CircuitBreakerStatus, ManualClock, Partition};
    use crate::MarketClient;

    fn client_with(transport: MockTransport, registry: Arc<BreakerRegistry>) -> MarketClient {
        ClientBuilder::new()
            .transport(Arc::new(transport))
            .registry(registry)
            .build()
            .unwrap()
    }

    fn ok_response(request: &ApiRequest) -> crate::Result<ApiResponse> {
        Ok(ApiResponse::new(request.clone(), 200, json!({"ok": true})))
    }

    #[tokio::test]
    async fn test_open_breaker_never_calls_transport() {
        let registry = Arc::new(BreakerRegistry::default());
        for _ in 0..5 {
            registry.get(Partition::Trades).record_failure();
        }

        let mut transport = MockTransport::new();
        transport.expect_send().times(0);
        let client = client_with(transport, registry.clone());

        let err = client.get::<Value>("/trades/42", None).await.unwrap_err();
        assert!(err.is_circuit_open());
        assert!(matches!(err, ServiceError::CircuitOpen { partition: Partition::Trades }));
        assert_eq!(
            err.to_string(),
            "Circuit breaker is OPEN for trades - service temporarily unavailable"
        );

        // Rejections are not recorded anywhere
        assert_eq!(registry.get(Partition::Trades).failure_count(), 5);
        assert_eq!(registry.default_breaker().failure_count(), 0);
    }

    #[tokio::test]
    async fn test_admitted_request_carries_request_id() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|request| request.headers.contains_key(REQUEST_ID_HEADER) && request.path == "/catalog/sets")
            .times(1)
            .returning(ok_response);

        let registry = Arc::new(BreakerRegistry::default());
        let client = client_with(transport, registry.clone());

        let body: Value = assert_ok!(client.get("/catalog/sets", None).await);
        assert_eq!(body["ok"], true);
        assert_eq!(registry.get(Partition::Catalog).metrics().total_successes, 1);
    }

    #[tokio::test]
    async fn test_error_without_request_path_debits_default() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Err(ServiceError::network("socket closed")));

        let registry = Arc::new(BreakerRegistry::default());
        let client = client_with(transport, registry.clone());

        let err = assert_err!(client.get::<Value>("/inventory/items", None).await);
        assert_eq!(err.request_path(), None);
        assert_eq!(registry.default_breaker().failure_count(), 1);
        assert_eq!(registry.get(Partition::Inventory).failure_count(), 0);
    }

    #[tokio::test]
    async fn test_error_is_surfaced_unchanged() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(1).returning(|request| {
            Err(ServiceError::service("bad gateway").with_context(request.error_context().status_code(502)))
        });

        let registry = Arc::new(BreakerRegistry::default());
        let client = client_with(transport, registry.clone());

        let err = client.get::<Value>("/users/5", None).await.unwrap_err();
        assert!(matches!(err.kind(), ServiceError::Service(_)));
        assert_eq!(err.status_code(), Some(502));
        assert_eq!(err.request_path(), Some("/users/5"));
        assert!(err.request_id().is_some());
        assert_eq!(registry.get(Partition::Users).failure_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_probe_reopens_partition() {
        let clock = Arc::new(ManualClock::new());
        let registry = Arc::new(BreakerRegistry::with_clock(CircuitBreakerConfig::default(), clock.clone()));
        for _ in 0..5 {
            registry.get(Partition::Marketplace).record_failure();
        }

        let mut transport = MockTransport::new();
        transport.expect_send().times(1).returning(|request| {
            Err(ServiceError::service("still down").with_context(request.error_context().status_code(503)))
        });
        let client = client_with(transport, registry.clone());

        clock.advance(Duration::from_secs(60));
        assert!(client.get::<Value>("/marketplace/listings", None).await.is_err());

        let marketplace = registry.get(Partition::Marketplace);
        assert_eq!(marketplace.status(), CircuitBreakerStatus::Open);
        assert_eq!(marketplace.failure_count(), 6);

        // The failed probe restarted the recovery window
        let err = client.get::<Value>("/marketplace/listings", None).await.unwrap_err();
        assert!(err.is_circuit_open());
    }

    #[tokio::test]
    async fn test_context_status_drives_client_error_check() {
        let err = ServiceError::validation("bad price")
            .with_context(ErrorContext::new().endpoint("/marketplace/listings").status_code(422));
        assert!(err.is_client_error());

        let err = ServiceError::service("oops").with_context(ErrorContext::new().status_code(500));
        assert!(!err.is_client_error());
    }
}
