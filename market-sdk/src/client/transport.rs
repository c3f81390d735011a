//! reqwest-backed transport

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::core::{ApiRequest, ApiResponse, Transport};
use crate::error::mapping::{map_http_error, map_transport_error};
use crate::error::{Result, ServiceError};
use crate::util::sanitize_for_logging;

/// Sends calls to the marketplace API over HTTP.
///
/// Errors always carry the context of the request as it was issued, so a
/// call that gets redirected is still attributed to the path the caller
/// asked for.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(client: ReqwestClient, base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url).map_err(|e| {
            ServiceError::configuration(format!("Invalid API base URL {}: {}", base_url, e))
        })?;

        // Url::join replaces the last segment unless the base ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for a request path
    pub fn resolve(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ServiceError::validation(format!("Invalid request path {}: {}", path, e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let context = request.error_context();
        let url = self
            .resolve(&request.path)
            .map_err(|e| e.with_context(context.clone()))?;

        debug!(
            method = %request.method,
            url = %sanitize_for_logging(url.as_str()),
            "Dispatching request"
        );

        let mut builder = self.client.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_transport_error(e, context.clone()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_transport_error(e, context.clone()))?;

        if !status.is_success() {
            debug!(
                status = status.as_u16(),
                path = %request.path,
                "Request failed: {}",
                sanitize_for_logging(&body)
            );
            return Err(map_http_error(status, &body, context));
        }

        // A 2xx is a success even when the body is not JSON
        let data = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body).unwrap_or(Value::String(body))
        };

        Ok(ApiResponse::new(request.clone(), status.as_u16(), data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> HttpTransport {
        HttpTransport::new(ReqwestClient::new(), base).unwrap()
    }

    #[test]
    fn test_resolve_keeps_base_path() {
        let transport = transport("https://api.example.com/v1");
        assert_eq!(
            transport.resolve("/inventory/items").unwrap().as_str(),
            "https://api.example.com/v1/inventory/items"
        );
        assert_eq!(
            transport.resolve("catalog").unwrap().as_str(),
            "https://api.example.com/v1/catalog"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = HttpTransport::new(ReqwestClient::new(), "::nope").unwrap_err();
        assert!(matches!(err, ServiceError::Configuration(_)));
    }
}
