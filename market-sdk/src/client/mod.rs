//! The marketplace API client
//!
//! `MarketClient` runs every call through its interceptor chain and the
//! transport. Plain verbs (`get`, `post`, ...) make a single attempt;
//! [`MarketClient::query`] and [`MarketClient::mutate`] add the retry
//! policy for reads and writes respectively.

pub mod cancel;
pub mod interceptors;
pub mod transport;

pub use cancel::{cancellable, CancelHandle};
pub use interceptors::{AuthInterceptor, CircuitGate, OutcomeRecorder};
pub use transport::HttpTransport;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::{ApiRequest, ApiResponse, Interceptor, RequestExecutor, Transport, REQUEST_ID_HEADER};
use crate::error::Result;
use crate::resilience::{BreakerRegistry, BreakerSnapshot, RetryExecutor, RetryPolicy};
use crate::util::generate_request_id;

/// Client for the marketplace API
pub struct MarketClient {
    transport: Arc<dyn Transport>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    registry: Arc<BreakerRegistry>,
    retry: RetryExecutor,
}

impl MarketClient {
    /// Assemble a client. Prefer [`crate::ClientBuilder`], which wires the
    /// standard interceptors in the right order.
    pub fn new(
        transport: Arc<dyn Transport>,
        interceptors: Vec<Arc<dyn Interceptor>>,
        registry: Arc<BreakerRegistry>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            interceptors,
            registry,
            retry: RetryExecutor::new(retry),
        }
    }

    /// The breakers this client gates and records against
    pub fn registry(&self) -> &Arc<BreakerRegistry> {
        &self.registry
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        self.retry.policy()
    }

    /// Current state of every partition's breaker
    pub fn snapshot(&self) -> Vec<BreakerSnapshot> {
        self.registry.snapshot()
    }

    /// Send one request through the interceptor chain.
    ///
    /// A rejection from any `on_request` hook ends the call before the
    /// transport is touched and skips the settlement hooks.
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        request
            .headers
            .entry(REQUEST_ID_HEADER.to_string())
            .or_insert_with(generate_request_id);

        for interceptor in &self.interceptors {
            request = interceptor.on_request(request)?;
        }

        match self.transport.send(&request).await {
            Ok(response) => Ok(self
                .interceptors
                .iter()
                .fold(response, |response, interceptor| interceptor.on_response(response))),
            Err(error) => Err(self
                .interceptors
                .iter()
                .fold(error, |error, interceptor| interceptor.on_error(error))),
        }
    }

    async fn execute<R>(&self, request: ApiRequest) -> Result<R>
    where
        R: DeserializeOwned,
    {
        self.send(request).await?.into_json()
    }

    /// Read call under the query retry policy. Only the exchange is
    /// retried; the body is decoded once the call has settled.
    pub async fn query<R>(&self, path: &str, query_params: Option<HashMap<String, String>>) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let request = with_query(ApiRequest::get(path), query_params);
        let this = self;

        self.retry
            .query(move || this.send(request.clone()))
            .await?
            .into_json()
    }

    /// Write call under the mutation retry policy. The terminal outcome is
    /// also reported to the default breaker.
    pub async fn mutate<T, R>(&self, method: Method, path: &str, body: Option<&T>) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = ApiRequest::new(method, path);
        if let Some(body) = body {
            request = request.json(body)?;
        }
        let this = self;

        self.retry
            .mutation(move || this.send(request.clone()))
            .await?
            .into_json()
    }
}

impl std::fmt::Debug for MarketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketClient")
            .field("interceptors", &self.interceptors.len())
            .field("retry", self.retry.policy().config())
            .finish()
    }
}

fn with_query(request: ApiRequest, query_params: Option<HashMap<String, String>>) -> ApiRequest {
    let mut params: Vec<_> = query_params.unwrap_or_default().into_iter().collect();
    params.sort();
    params
        .into_iter()
        .fold(request, |request, (key, value)| request.query_param(key, value))
}

#[async_trait]
impl RequestExecutor for MarketClient {
    async fn get<R>(&self, endpoint: &str, query_params: Option<HashMap<String, String>>) -> Result<R>
    where
        R: DeserializeOwned + Send,
    {
        self.execute(with_query(ApiRequest::get(endpoint), query_params))
            .await
    }

    async fn post<T, R>(&self, endpoint: &str, body: &T) -> Result<R>
    where
        T: Serialize + Send + Sync,
        R: DeserializeOwned + Send,
    {
        self.execute(ApiRequest::new(Method::POST, endpoint).json(body)?)
            .await
    }

    async fn put<T, R>(&self, endpoint: &str, body: &T) -> Result<R>
    where
        T: Serialize + Send + Sync,
        R: DeserializeOwned + Send,
    {
        self.execute(ApiRequest::new(Method::PUT, endpoint).json(body)?)
            .await
    }

    async fn patch<T, R>(&self, endpoint: &str, body: &T) -> Result<R>
    where
        T: Serialize + Send + Sync,
        R: DeserializeOwned + Send,
    {
        self.execute(ApiRequest::new(Method::PATCH, endpoint).json(body)?)
            .await
    }

    async fn delete<R>(&self, endpoint: &str) -> Result<R>
    where
        R: DeserializeOwned + Send,
    {
        self.execute(ApiRequest::new(Method::DELETE, endpoint))
            .await
    }
}
