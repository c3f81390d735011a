//! # Market SDK
//!
//! Client for the marketplace REST API (catalog, inventory, listings, trades,
//! users) with per-partition circuit breaking.
//!
//! This crate provides:
//!
//! - A typed API client with request / response / error interceptors
//! - One circuit breaker per service partition (inventory, marketplace,
//!   trades, catalog, users, default), chosen by request path
//! - Retry policies for queries and mutations that respect the breakers
//! - Comprehensive error handling system
//! - Configuration management utilities
//!
//! ## Architecture
//!
//! - `Transport`: Sends one request over the wire (reqwest by default)
//! - `Interceptor`: Hooks run before dispatch and after settlement
//! - `BreakerRegistry`: The fixed set of breakers, shared by every caller
//! - `RetryPolicy`: Decides whether failed calls are re-issued
//! - `MarketClient`: Ties the above together
//! - `ServiceError`: Comprehensive error handling system

pub mod core;
pub use crate::core::{ApiRequest, ApiResponse, ClientBuilder, Interceptor, MemoryTokenStore, RequestExecutor, TokenStore, Transport};

pub mod client;
pub use client::{cancellable, CancelHandle, HttpTransport, MarketClient};

pub mod error;
pub use error::{ErrorCategory, ErrorContext, Result, ServiceError};

pub mod resilience;
pub use resilience::{
    BreakerRegistry, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStatus, Partition, RetryConfig,
    RetryPolicy,
};

pub mod config;
pub use config::{ConfigProvider, MarketConfig, ServiceConfig};

pub mod util;

#[cfg(test)]
mod tests;

/// Create a new default client builder
pub fn client() -> ClientBuilder {
    ClientBuilder::new()
}

/// Build a client from `MARKET_*` environment variables
pub fn client_from_env() -> Result<MarketClient> {
    let config = MarketConfig::from_env()?;
    ClientBuilder::from_config(&config).build()
}
