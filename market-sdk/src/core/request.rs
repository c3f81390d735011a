//! Request and response descriptors passed between the client, its
//! interceptors and the transport.

use std::collections::HashMap;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ErrorContext, Result, ServiceError};

/// An outbound API call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,

    /// Path relative to the API base URL, e.g. `/inventory/items`
    pub path: String,

    pub query: Vec<(String, String)>,

    pub headers: HashMap<String, String>,

    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Add a query parameter
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Attach a JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ServiceError::validation(format!("Failed to serialize request: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Error context describing this request
    pub fn error_context(&self) -> ErrorContext {
        let context = ErrorContext::new()
            .method(self.method.clone())
            .endpoint(self.path.clone());

        match self.headers.get(REQUEST_ID_HEADER) {
            Some(id) => context.request_id(id.clone()),
            None => context,
        }
    }
}

/// Header carrying the per-call request id
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// A settled, successful API call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// The request this response answers, as it was dispatched
    pub request: ApiRequest,

    pub status: u16,

    /// Decoded JSON body; `Value::Null` for empty bodies
    pub data: Value,
}

impl ApiResponse {
    pub fn new(request: ApiRequest, status: u16, data: Value) -> Self {
        Self {
            request,
            status,
            data,
        }
    }

    /// Deserialize the body into `R`
    pub fn into_json<R: DeserializeOwned>(self) -> Result<R> {
        let path = self.request.path;
        serde_json::from_value(self.data).map_err(|e| {
            ServiceError::parsing(format!("Failed to parse response: {}", e))
                .with_context(ErrorContext::new().endpoint(path))
        })
    }
}
