//! End-to-end retry tests for queries and mutations
//!
//! Delays are shrunk to a few milliseconds; the attempt counts and breaker
//! bookkeeping are what matter here.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use reqwest::Method;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::core::ClientBuilder;
    use crate::error::ServiceError;
    use crate::resilience::{ManualClock, Partition, RetryConfig};
    use crate::MarketClient;

    fn fast_retries() -> RetryConfig {
        RetryConfig {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            mutation_delay: Duration::from_millis(1),
            ..RetryConfig::default()
        }
    }

    fn create_test_client(server: &MockServer) -> MarketClient {
        ClientBuilder::new()
            .base_url(server.uri())
            .retry_config(fast_retries())
            .clock(Arc::new(ManualClock::new()))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_query_recovers_after_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/marketplace/listings"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/marketplace/listings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server);
        let listings: Vec<Value> = client.query("/marketplace/listings", None).await.unwrap();

        assert_eq!(listings.len(), 1);
        assert_eq!(client.registry().get(Partition::Marketplace).failure_count(), 0);
        assert_eq!(client.registry().default_breaker().failure_count(), 0);
    }

    #[tokio::test]
    async fn test_query_exhaustion_debits_default_breaker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/marketplace/listings"))
            .respond_with(ResponseTemplate::new(503))
            .expect(4)
            .mount(&server)
            .await;

        let client = create_test_client(&server);
        let err = client.query::<Value>("/marketplace/listings", None).await.unwrap_err();

        assert_eq!(err.status_code(), Some(503));
        // One failure per attempt on the partition, plus one for exhaustion
        assert_eq!(client.registry().get(Partition::Marketplace).failure_count(), 4);
        assert_eq!(client.registry().default_breaker().failure_count(), 1);
    }

    #[tokio::test]
    async fn test_mutation_retries_once_then_reports_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/trades"))
            .and(body_json(json!({"offer": [1, 2], "want": [3]})))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let client = create_test_client(&server);
        let body = json!({"offer": [1, 2], "want": [3]});
        let err = client
            .mutate::<Value, Value>(Method::POST, "/trades", Some(&body))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(500));
        assert_eq!(client.registry().get(Partition::Trades).failure_count(), 2);
        assert_eq!(client.registry().default_breaker().failure_count(), 1);
    }

    #[tokio::test]
    async fn test_mutation_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/inventory/items/4"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({"message": "Quantity must be positive"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server);
        let err = client
            .mutate::<Value, Value>(Method::PUT, "/inventory/items/4", Some(&json!({"quantity": -1})))
            .await
            .unwrap_err();

        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "Validation error: Quantity must be positive");
        assert_eq!(client.registry().default_breaker().failure_count(), 1);
    }

    #[tokio::test]
    async fn test_mutation_success_resets_default_breaker() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/trades/8/accept"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "accepted"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server);
        client.registry().default_breaker().record_failure();
        client.registry().default_breaker().record_failure();

        let result: Value = client
            .mutate::<Value, Value>(Method::POST, "/trades/8/accept", None)
            .await
            .unwrap();

        assert_eq!(result["status"], "accepted");
        assert_eq!(client.registry().default_breaker().failure_count(), 0);
    }

    #[tokio::test]
    async fn test_open_default_breaker_stops_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/catalog/cards"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server);
        for _ in 0..5 {
            client.registry().default_breaker().record_failure();
        }

        let err = client.query::<Value>("/catalog/cards", None).await.unwrap_err();
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(client.registry().get(Partition::Catalog).failure_count(), 1);
    }

    #[derive(Debug, Deserialize)]
    struct CatalogItem {
        #[allow(dead_code)]
        id: u64,
    }

    #[tokio::test]
    async fn test_decode_mismatch_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/catalog/items/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "x"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server);
        let err = client.query::<CatalogItem>("/catalog/items/1", None).await.unwrap_err();

        assert!(matches!(err.kind(), ServiceError::Parsing(_)));
        assert_eq!(client.registry().get(Partition::Catalog).metrics().total_successes, 1);
        assert_eq!(client.registry().default_breaker().failure_count(), 0);
    }
}
