//! Service partitions and the registry holding one breaker per partition.
//!
//! Calls are routed to a partition by substring matching on the request
//! path, checked in a fixed priority order. The first match wins:
//!
//! ```text
//! /inventory -> Inventory
//! /marketplace -> Marketplace
//! /trades -> Trades
//! /catalog -> Catalog
//! /users | /auth -> Users
//! otherwise -> Default
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics};
use super::clock::{Clock, SystemClock};

/// A logical slice of the backend guarded by its own breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Inventory,
    Marketplace,
    Trades,
    Catalog,
    /// Users and authentication
    Users,
    Default,
}

impl Partition {
    /// All partitions in classification priority order
    pub const ALL: [Partition; 6] = [
        Partition::Inventory,
        Partition::Marketplace,
        Partition::Trades,
        Partition::Catalog,
        Partition::Users,
        Partition::Default,
    ];

    /// Route a request path to its partition. Total and deterministic.
    pub fn classify(path: &str) -> Partition {
        if path.contains("/inventory") {
            Partition::Inventory
        } else if path.contains("/marketplace") {
            Partition::Marketplace
        } else if path.contains("/trades") {
            Partition::Trades
        } else if path.contains("/catalog") {
            Partition::Catalog
        } else if path.contains("/users") || path.contains("/auth") {
            Partition::Users
        } else {
            Partition::Default
        }
    }

    /// Route a cache query key (e.g. `"listings"`) to its partition
    pub fn for_query_key(key: &str) -> Partition {
        if key.contains("inventory") {
            Partition::Inventory
        } else if key.contains("listings") || key.contains("marketplace") {
            Partition::Marketplace
        } else if key.contains("trades") {
            Partition::Trades
        } else if key.contains("catalog") {
            Partition::Catalog
        } else if key.contains("users") || key.contains("auth") {
            Partition::Users
        } else {
            Partition::Default
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Inventory => "inventory",
            Partition::Marketplace => "marketplace",
            Partition::Trades => "trades",
            Partition::Catalog => "catalog",
            Partition::Users => "users",
            Partition::Default => "default",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed mapping from partition to breaker.
///
/// Built once and shared (usually behind an `Arc`) by everything that issues
/// requests; breakers are never added, replaced or removed.
#[derive(Debug)]
pub struct BreakerRegistry {
    breakers: [CircuitBreaker; 6],
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl BreakerRegistry {
    /// Create a registry on the system clock
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a registry whose breakers all read time from `clock`
    pub fn with_clock(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        let breakers = Partition::ALL.map(|partition| {
            CircuitBreaker::with_clock(partition.as_str(), config.clone(), Arc::clone(&clock))
        });
        Self { breakers }
    }

    /// Breaker for a partition
    pub fn get(&self, partition: Partition) -> &CircuitBreaker {
        &self.breakers[partition.index()]
    }

    /// Classify a path and return its partition with the matching breaker
    pub fn for_path(&self, path: &str) -> (Partition, &CircuitBreaker) {
        let partition = Partition::classify(path);
        (partition, self.get(partition))
    }

    /// The breaker consulted by the retry policy
    pub fn default_breaker(&self) -> &CircuitBreaker {
        self.get(Partition::Default)
    }

    /// Iterate over every partition and its breaker
    pub fn iter(&self) -> impl Iterator<Item = (Partition, &CircuitBreaker)> {
        Partition::ALL.into_iter().zip(self.breakers.iter())
    }

    /// Diagnostics for every breaker
    pub fn snapshot(&self) -> Vec<BreakerSnapshot> {
        self.iter()
            .map(|(partition, breaker)| BreakerSnapshot {
                partition,
                metrics: breaker.metrics(),
            })
            .collect()
    }
}

/// Point-in-time view of one partition's breaker
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub partition: Partition,
    #[serde(flatten)]
    pub metrics: CircuitBreakerMetrics,
}
