//! Core abstractions for the Market SDK
//!
//! This module provides the trait seams the client is assembled from:
//!
//! - `Transport`: Sends a request over the wire and settles it
//! - `Interceptor`: Observes or rewrites calls before dispatch and after settlement
//! - `RequestExecutor`: Typed HTTP verbs on top of the interceptor chain
//! - `TokenStore`: Source of the bearer token for authenticated calls
//! - `ClientBuilder`: Builder pattern for creating clients

pub mod builder;
pub mod request;

pub use builder::ClientBuilder;
pub use request::{ApiRequest, ApiResponse, REQUEST_ID_HEADER};

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Result, ServiceError};

/// The HTTP collaborator: owns connections, serialization and TLS.
///
/// Implementations must attach the request's error context (see
/// [`ApiRequest::error_context`]) to every error produced once the request
/// has been handed to the network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

/// Hooks invoked around every call.
///
/// For a call that passes all `on_request` hooks, exactly one of
/// `on_response` / `on_error` runs per interceptor once the transport
/// settles. A call rejected by `on_request` or cancelled before settlement
/// runs neither.
pub trait Interceptor: Send + Sync {
    /// Inspect or augment a request before dispatch; `Err` aborts the call
    fn on_request(&self, request: ApiRequest) -> Result<ApiRequest> {
        Ok(request)
    }

    /// Observe a successful response
    fn on_response(&self, response: ApiResponse) -> ApiResponse {
        response
    }

    /// Observe a failed call
    fn on_error(&self, error: ServiceError) -> ServiceError {
        error
    }
}

/// Trait responsible for executing HTTP requests with strong typing
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Execute a GET request
    async fn get<R>(&self, endpoint: &str, query_params: Option<HashMap<String, String>>) -> Result<R>
    where
        R: DeserializeOwned + Send;

    /// Execute a POST request
    async fn post<T, R>(&self, endpoint: &str, body: &T) -> Result<R>
    where
        T: Serialize + Send + Sync,
        R: DeserializeOwned + Send;

    /// Execute a PUT request
    async fn put<T, R>(&self, endpoint: &str, body: &T) -> Result<R>
    where
        T: Serialize + Send + Sync,
        R: DeserializeOwned + Send;

    /// Execute a PATCH request
    async fn patch<T, R>(&self, endpoint: &str, body: &T) -> Result<R>
    where
        T: Serialize + Send + Sync,
        R: DeserializeOwned + Send;

    /// Execute a DELETE request
    async fn delete<R>(&self, endpoint: &str) -> Result<R>
    where
        R: DeserializeOwned + Send;
}

/// Where the session's bearer token lives
pub trait TokenStore: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// Token store held in memory for the lifetime of the session
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    /// Store the token issued at login
    pub fn set(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    /// Forget the token on logout
    pub fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl TokenStore for MemoryTokenStore {
    fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
