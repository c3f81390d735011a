//! Circuit Breaker Demo
//!
//! Drives the client against an in-process transport whose inventory
//! service is down, to show a partition breaker opening, rejecting calls
//! locally, and closing again after a successful probe.
//!
//! To run this example:
//! ```
//! RUST_LOG=market_sdk=debug cargo run --example breaker_demo
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use market_sdk::{
    resilience::ManualClock, ApiRequest, ApiResponse, ClientBuilder, Partition, RequestExecutor,
    ServiceError, Transport,
};

/// Answers every call locally; inventory fails until `healthy` is set
struct FlakyBackend {
    healthy: AtomicBool,
}

#[async_trait]
impl Transport for FlakyBackend {
    async fn send(&self, request: &ApiRequest) -> market_sdk::Result<ApiResponse> {
        if request.path.contains("/inventory") && !self.healthy.load(Ordering::SeqCst) {
            return Err(ServiceError::service("inventory database unreachable")
                .with_context(request.error_context().status_code(503)));
        }
        Ok(ApiResponse::new(request.clone(), 200, json!({"path": request.path})))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Circuit Breaker Demo");

    let backend = Arc::new(FlakyBackend {
        healthy: AtomicBool::new(false),
    });
    let clock = Arc::new(ManualClock::new());
    let client = ClientBuilder::new()
        .transport(backend.clone())
        .clock(clock.clone())
        .build()?;

    println!("\n1. Failing inventory calls until the breaker opens:");
    for attempt in 1..=6 {
        match client.get::<Value>("/inventory/items", None).await {
            Ok(_) => println!("  Call {}: ok", attempt),
            Err(e) => println!("  Call {}: {}", attempt, e),
        }
    }

    println!("\n2. Other partitions keep working:");
    let listings: Value = client.get("/marketplace/listings", None).await?;
    println!("  {}", listings);

    println!("\n3. Backend recovers, recovery timeout elapses:");
    backend.healthy.store(true, Ordering::SeqCst);
    clock.advance(Duration::from_secs(60));
    println!(
        "  inventory breaker is {}",
        client.registry().get(Partition::Inventory).status()
    );
    let items: Value = client.get("/inventory/items", None).await?;
    println!("  probe succeeded: {}", items);

    println!("\n4. Breaker snapshot:");
    println!("{}", serde_json::to_string_pretty(&client.snapshot())?);

    Ok(())
}
