//! Client builder implementation
//!
//! Wires the transport, the breaker registry and the interceptor chain into
//! a `MarketClient`.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client as ReqwestClient;

use crate::client::{AuthInterceptor, CircuitGate, HttpTransport, MarketClient, OutcomeRecorder};
use crate::config::MarketConfig;
use crate::core::{Interceptor, MemoryTokenStore, TokenStore, Transport};
use crate::error::{Result, ServiceError};
use crate::resilience::{BreakerRegistry, CircuitBreakerConfig, Clock, RetryConfig, RetryPolicy};

const DEFAULT_USER_AGENT: &str = concat!("market-sdk/", env!("CARGO_PKG_VERSION"));

/// Builder for [`MarketClient`]
pub struct ClientBuilder {
    /// Base URL for the API
    base_url: Option<String>,

    token_store: Option<Arc<dyn TokenStore>>,

    /// Custom headers to include with all requests
    custom_headers: HashMap<String, String>,

    timeout: Duration,

    retry_config: RetryConfig,

    circuit_breaker_config: CircuitBreakerConfig,

    /// Shared registry; built from `circuit_breaker_config` when unset
    registry: Option<Arc<BreakerRegistry>>,

    clock: Option<Arc<dyn Clock>>,

    transport: Option<Arc<dyn Transport>>,

    user_agent: String,

    /// Enable response compression
    compression: bool,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            token_store: None,
            custom_headers: HashMap::new(),
            timeout: Duration::from_secs(30),
            retry_config: RetryConfig::default(),
            circuit_breaker_config: CircuitBreakerConfig::default(),
            registry: None,
            clock: None,
            transport: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            compression: true,
        }
    }
}

impl ClientBuilder {
    /// Create a new client builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded configuration
    pub fn from_config(config: &MarketConfig) -> Self {
        Self::new()
            .base_url(config.base_url.clone())
            .timeout(config.timeout())
            .circuit_breaker(config.breaker_config())
            .retry_config(config.retry_config())
    }

    /// Set the base URL for the API
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Use a fixed bearer token
    pub fn auth_token(self, token: impl Into<String>) -> Self {
        self.token_store(Arc::new(MemoryTokenStore::with_token(token)))
    }

    /// Read the bearer token from a store on every call
    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Add a custom header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.insert(key.into(), value.into());
        self
    }

    /// Set request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure retry behavior
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Configure the breakers created for each partition
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker_config = config;
        self
    }

    /// Share an existing registry instead of creating one
    pub fn registry(mut self, registry: Arc<BreakerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Time source for the breakers created by this builder
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace the HTTP transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enable or disable compression
    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Build an HTTP client with the configured settings
    pub fn build_http_client(&self) -> Result<ReqwestClient> {
        let mut headers = HeaderMap::new();
        for (key, value) in &self.custom_headers {
            let header_name = HeaderName::from_str(key)
                .map_err(|e| ServiceError::configuration(format!("Invalid header name: {}", e)))?;

            let header_value = HeaderValue::from_str(value)
                .map_err(|e| ServiceError::configuration(format!("Invalid header value: {}", e)))?;

            headers.insert(header_name, header_value);
        }

        ReqwestClient::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str())
            .gzip(self.compression)
            .default_headers(headers)
            .build()
            .map_err(|e| ServiceError::configuration(format!("Failed to build HTTP client: {}", e)))
    }

    /// Registry the client will use
    pub fn build_registry(&self) -> Arc<BreakerRegistry> {
        match (&self.registry, &self.clock) {
            (Some(registry), _) => Arc::clone(registry),
            (None, Some(clock)) => Arc::new(BreakerRegistry::with_clock(
                self.circuit_breaker_config.clone(),
                Arc::clone(clock),
            )),
            (None, None) => Arc::new(BreakerRegistry::new(self.circuit_breaker_config.clone())),
        }
    }

    /// Build the client.
    ///
    /// Fails when no transport was supplied and the base URL is missing or
    /// invalid.
    pub fn build(self) -> Result<MarketClient> {
        let transport: Arc<dyn Transport> = match &self.transport {
            Some(transport) => Arc::clone(transport),
            None => {
                let base_url = self
                    .base_url
                    .as_deref()
                    .ok_or_else(|| ServiceError::configuration("API base URL is required"))?;
                Arc::new(HttpTransport::new(self.build_http_client()?, base_url)?)
            }
        };

        let registry = self.build_registry();

        let mut interceptors: Vec<Arc<dyn Interceptor>> = Vec::with_capacity(3);
        if let Some(store) = &self.token_store {
            interceptors.push(Arc::new(AuthInterceptor::new(Arc::clone(store))));
        }
        interceptors.push(Arc::new(CircuitGate::new(Arc::clone(&registry))));
        interceptors.push(Arc::new(OutcomeRecorder::new(Arc::clone(&registry))));

        let policy = RetryPolicy::new(self.retry_config, Arc::clone(&registry));

        Ok(MarketClient::new(transport, interceptors, registry, policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{ManualClock, Partition};

    #[test]
    fn test_build_requires_base_url() {
        let err = ClientBuilder::new().build().unwrap_err();
        assert!(matches!(err, ServiceError::Configuration(_)));
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        let builder = ClientBuilder::new()
            .base_url("https://api.example.com")
            .header("bad header", "x");
        assert!(builder.build_http_client().is_err());
    }

    #[test]
    fn test_shared_registry_is_used() {
        let registry = Arc::new(BreakerRegistry::default());
        let client = ClientBuilder::new()
            .base_url("https://api.example.com")
            .registry(Arc::clone(&registry))
            .build()
            .unwrap();

        registry.get(Partition::Catalog).record_failure();
        assert!(Arc::ptr_eq(client.registry(), &registry));
        assert_eq!(client.registry().get(Partition::Catalog).failure_count(), 1);
    }

    #[test]
    fn test_from_config() {
        let config = MarketConfig {
            base_url: "http://localhost:8080/api".to_string(),
            failure_threshold: 2,
            query_max_retries: 1,
            ..MarketConfig::default()
        };
        let builder = ClientBuilder::from_config(&config).clock(Arc::new(ManualClock::new()));

        let registry = builder.build_registry();
        assert_eq!(registry.get(Partition::Users).config().failure_threshold, 2);

        let client = builder.build().unwrap();
        assert_eq!(client.retry_policy().config().query_max_retries, 1);
    }
}
