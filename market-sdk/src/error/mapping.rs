//! Error mapping for marketplace API responses
//!
//! Converts non-2xx responses and transport failures into the normalized
//! `ServiceError` taxonomy, and buckets errors into the categories a
//! presentation layer distinguishes.

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use super::{ErrorContext, ServiceError};

/// Map an error response to a ServiceError.
///
/// The returned error carries `context` with the response status filled in.
pub fn map_http_error(status: StatusCode, body: &str, mut context: ErrorContext) -> ServiceError {
    context.status_code = Some(status.as_u16());

    let message = match serde_json::from_str::<Value>(body) {
        Ok(json) => json
            .get("message")
            .or_else(|| json.get("error"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| fallback_message(status, body)),
        Err(_) => fallback_message(status, body),
    };

    let error = match status {
        StatusCode::UNAUTHORIZED => ServiceError::authentication(message),
        StatusCode::FORBIDDEN => ServiceError::authorization(message),
        StatusCode::NOT_FOUND => ServiceError::not_found(message),
        StatusCode::TOO_MANY_REQUESTS => ServiceError::rate_limit(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ServiceError::timeout(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY | StatusCode::CONFLICT => {
            ServiceError::validation(message)
        }
        _ => ServiceError::service(message),
    };

    error.with_context(context)
}

fn fallback_message(status: StatusCode, body: &str) -> String {
    if body.is_empty() {
        status.to_string()
    } else if body.len() > 100 {
        format!("{}: {}", status, crate::util::truncate_string(body, 100))
    } else {
        format!("{}: {}", status, body)
    }
}

/// Map a reqwest failure to a ServiceError tagged with the request context
pub fn map_transport_error(err: reqwest::Error, mut context: ErrorContext) -> ServiceError {
    if let Some(status) = err.status() {
        context.status_code = Some(status.as_u16());
    }

    let error = if err.is_timeout() {
        ServiceError::timeout(format!("Request timed out: {}", err))
    } else if err.is_connect() {
        ServiceError::network(format!("Connection error: {}", err))
    } else if err.is_redirect() {
        ServiceError::network(format!("Too many redirects: {}", err))
    } else if err.is_decode() {
        ServiceError::parsing(format!("Response decode error: {}", err))
    } else if err.is_builder() {
        ServiceError::validation(format!("Invalid request: {}", err))
    } else if err.is_request() {
        ServiceError::network(format!("Failed to send request: {}", err))
    } else {
        ServiceError::internal(format!("HTTP client error: {}", err))
    };

    error.with_context(context)
}

/// How an error should be presented to an end user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// A breaker refused the call: "service temporarily unavailable"
    Unavailable,
    NotFound,
    InvalidInput,
    Unauthorized,
    /// Network trouble or a server fault; may succeed later
    Transient,
    Cancelled,
    Internal,
}

impl ErrorCategory {
    /// Default user-facing message for the category
    pub fn message(&self) -> &'static str {
        match self {
            Self::Unavailable => "Service temporarily unavailable",
            Self::NotFound => "Not found",
            Self::InvalidInput => "Invalid input",
            Self::Unauthorized => "You are not allowed to do that",
            Self::Transient => "Something went wrong, please try again",
            Self::Cancelled => "Request cancelled",
            Self::Internal => "Unexpected error",
        }
    }
}

/// Bucket an error into its user-facing category
pub fn categorize(error: &ServiceError) -> ErrorCategory {
    match error.kind() {
        ServiceError::CircuitOpen { .. } => ErrorCategory::Unavailable,
        ServiceError::Cancelled(_) => ErrorCategory::Cancelled,
        ServiceError::NotFound(_) => ErrorCategory::NotFound,
        ServiceError::Authentication(_) | ServiceError::Authorization(_) => {
            ErrorCategory::Unauthorized
        }
        ServiceError::Validation(_) => ErrorCategory::InvalidInput,
        ServiceError::Network(_)
        | ServiceError::Timeout(_)
        | ServiceError::RateLimit(_)
        | ServiceError::Service(_) => ErrorCategory::Transient,
        ServiceError::Parsing(_)
        | ServiceError::Configuration(_)
        | ServiceError::Internal(_)
        | ServiceError::WithContext { .. } => ErrorCategory::Internal,
    }
}
