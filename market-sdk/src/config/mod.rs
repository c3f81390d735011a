//! Configuration management for the marketplace client
//!
//! This module provides utilities for loading and validating the client's
//! configuration, with support for environment variables.

use std::collections::HashMap;
use std::env;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, ServiceError};
use crate::resilience::{CircuitBreakerConfig, RetryConfig};
use crate::util::parse_duration;

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Get a string configuration value
    fn get_string(&self, key: &str) -> Result<String>;
}

/// Extension methods for configuration providers
pub trait ConfigProviderExt: ConfigProvider {
    /// Get an integer configuration value
    fn get_int(&self, key: &str) -> Result<i64> {
        let value = self.get_string(key)?;
        value
            .trim()
            .parse::<i64>()
            .map_err(|e| ServiceError::configuration(format!("Invalid integer for key {}: {}", key, e)))
    }

    /// Get a boolean configuration value
    fn get_bool(&self, key: &str) -> Result<bool> {
        let value = self.get_string(key)?;
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(ServiceError::configuration(format!(
                "Invalid boolean value for key {}: {}",
                key, value
            ))),
        }
    }

    /// Get a duration. A bare number is read as milliseconds; otherwise any
    /// form accepted by [`parse_duration`] ("60s", "500ms", "1m").
    fn get_duration(&self, key: &str) -> Result<Duration> {
        let value = self.get_string(key)?;
        if let Ok(ms) = value.trim().parse::<u64>() {
            return Ok(Duration::from_millis(ms));
        }
        parse_duration(&value)
            .ok_or_else(|| ServiceError::configuration(format!("Invalid duration for key {}: {}", key, value)))
    }

    /// Get a string configuration value with a default
    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|_| default.to_string())
    }

    /// Get an integer configuration value with a default
    fn get_int_or(&self, key: &str, default: i64) -> i64 {
        self.get_int(key).unwrap_or(default)
    }

    /// Get a boolean configuration value with a default
    fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    /// Get a duration with a default
    fn get_duration_or(&self, key: &str, default: Duration) -> Duration {
        self.get_duration(key).unwrap_or(default)
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Environment variable based configuration provider
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    /// Optional prefix for environment variables
    prefix: Option<String>,

    /// Optional namespace for variables (e.g., "STAGING")
    namespace: Option<String>,
}

impl EnvConfigProvider {
    /// Create a new environment variable config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prefix for environment variables
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set a namespace for environment variables
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Environment variable name for a configuration key
    pub fn format_key(&self, key: &str) -> String {
        let parts = [self.prefix.as_deref(), self.namespace.as_deref()];
        let mut env_key: String = parts
            .iter()
            .flatten()
            .map(|part| format!("{}_", part))
            .collect();

        env_key.push_str(&key.to_uppercase().replace(|c: char| !c.is_ascii_alphanumeric(), "_"));
        env_key
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        let env_key = self.format_key(key);

        env::var(&env_key).map_err(|e| match e {
            env::VarError::NotPresent => {
                ServiceError::configuration(format!("Environment variable not set: {}", env_key))
            }
            env::VarError::NotUnicode(_) => ServiceError::configuration(format!(
                "Environment variable is not valid unicode: {}",
                env_key
            )),
        })
    }
}

/// In-memory config provider for testing or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Set a configuration value
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| ServiceError::configuration(format!("Configuration key not found: {}", key)))
    }
}

/// Tries each provider in order; the first one holding the key wins
#[derive(Default)]
pub struct CompositeConfigProvider {
    providers: Vec<Box<dyn ConfigProvider>>,
}

impl CompositeConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider to the end of the chain
    pub fn add_provider(&mut self, provider: impl ConfigProvider + 'static) {
        self.providers.push(Box::new(provider));
    }

    /// Builder-style variant of [`CompositeConfigProvider::add_provider`]
    pub fn with_provider(mut self, provider: impl ConfigProvider + 'static) -> Self {
        self.add_provider(provider);
        self
    }
}

impl ConfigProvider for CompositeConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.providers
            .iter()
            .find_map(|provider| provider.get_string(key).ok())
            .ok_or_else(|| {
                ServiceError::configuration(format!("Configuration key not found in any provider: {}", key))
            })
    }
}

/// Global default configuration provider (`MARKET_*` environment variables)
pub static DEFAULT_PROVIDER: Lazy<Arc<EnvConfigProvider>> =
    Lazy::new(|| Arc::new(EnvConfigProvider::new().with_prefix("MARKET")));

/// Trait for service-specific configuration
pub trait ServiceConfig: Debug + Send + Sync {
    /// Validate this configuration
    fn validate(&self) -> Result<()>;

    /// Service name
    fn service_name(&self) -> &str;
}

/// Configuration for the marketplace API client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// API base URL, e.g. `https://api.example.com/v1`
    pub base_url: String,

    /// Per-request timeout in seconds
    pub timeout_seconds: u64,

    pub failure_threshold: u32,

    pub recovery_timeout_ms: u64,

    pub query_max_retries: u32,

    pub mutation_max_retries: u32,

    pub retry_base_delay_ms: u64,

    pub retry_max_delay_ms: u64,

    pub mutation_retry_delay_ms: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_seconds: 30,
            failure_threshold: 5,
            recovery_timeout_ms: 60_000,
            query_max_retries: 3,
            mutation_max_retries: 1,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 30_000,
            mutation_retry_delay_ms: 1000,
        }
    }
}

impl MarketConfig {
    /// Load configuration from a config provider. Only `api_base_url` is
    /// required; every other key falls back to its default.
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let defaults = Self::default();
        let millis = |key: &str, default: u64| -> Result<u64> {
            match provider.get_string(key) {
                Ok(_) => Ok(provider.get_duration(key)?.as_millis() as u64),
                Err(_) => Ok(default),
            }
        };
        let count = |key: &str, default: u32| -> Result<u32> {
            match provider.get_string(key) {
                Ok(_) => u32::try_from(provider.get_int(key)?).map_err(|_| {
                    ServiceError::configuration(format!("Value out of range for key {}", key))
                }),
                Err(_) => Ok(default),
            }
        };

        let timeout_seconds = match provider.get_string("timeout_seconds") {
            Ok(value) => match value.trim().parse::<u64>() {
                Ok(secs) => secs,
                Err(_) => parse_duration(&value)
                    .ok_or_else(|| {
                        ServiceError::configuration(format!("Invalid duration for key timeout_seconds: {}", value))
                    })?
                    .as_secs(),
            },
            Err(_) => defaults.timeout_seconds,
        };

        let config = Self {
            base_url: provider.get_string("api_base_url")?,
            timeout_seconds,
            failure_threshold: count("failure_threshold", defaults.failure_threshold)?,
            recovery_timeout_ms: millis("recovery_timeout_ms", defaults.recovery_timeout_ms)?,
            query_max_retries: count("query_max_retries", defaults.query_max_retries)?,
            mutation_max_retries: count("mutation_max_retries", defaults.mutation_max_retries)?,
            retry_base_delay_ms: millis("retry_base_delay_ms", defaults.retry_base_delay_ms)?,
            retry_max_delay_ms: millis("retry_max_delay_ms", defaults.retry_max_delay_ms)?,
            mutation_retry_delay_ms: millis("mutation_retry_delay_ms", defaults.mutation_retry_delay_ms)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from `MARKET_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_provider(&**DEFAULT_PROVIDER)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Breaker settings shared by every partition
    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            recovery_timeout: Duration::from_millis(self.recovery_timeout_ms),
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            query_max_retries: self.query_max_retries,
            mutation_max_retries: self.mutation_max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            mutation_delay: Duration::from_millis(self.mutation_retry_delay_ms),
        }
    }
}

impl ServiceConfig for MarketConfig {
    fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(ServiceError::configuration("API base URL is required"));
        }

        Url::parse(&self.base_url).map_err(|e| {
            ServiceError::configuration(format!("Invalid API base URL {}: {}", self.base_url, e))
        })?;

        if self.failure_threshold == 0 {
            return Err(ServiceError::configuration("Failure threshold must be at least 1"));
        }

        if self.timeout_seconds == 0 {
            return Err(ServiceError::configuration("Request timeout must be non-zero"));
        }

        Ok(())
    }

    fn service_name(&self) -> &str {
        "market"
    }
}
