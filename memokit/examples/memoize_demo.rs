//! Memoization Demo Application
//!
//! Walks through every execution mode and the tiered, per-context stores.
//!
//! Usage:
//!   cargo run --example memoize_demo
//!
//! Environment variables:
//!   MEMOKIT_MAX_AGE                  - Default max age in seconds (-1 never expires, 0 never stores)
//!   MEMOKIT_SIMULATED_ASYNC_DELAY_MS - Delay added to every store lookup
//!   RUST_LOG                         - Log filter (default: info,memokit=debug)

use memokit::{ConfigLayer, ExecutionContext, MemoError, Memoizer, MemoryStore, ScopedStore};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Stands in for CPU-bound work; it blocks the calling thread while it runs
fn slow_square(x: u64) -> u64 {
    std::thread::sleep(Duration::from_millis(50));
    x * x
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,memokit=debug")),
        )
        .init();

    info!("=== memokit Demo ===");

    let memo = Memoizer::from_env()?;
    info!("Defaults: {:?}", memo.resolve().await?);

    let square = memo.memoize_sync(slow_square).named("square");

    info!("\n--- Normal mode ---");
    for attempt in 1..=2 {
        let started = Instant::now();
        let value = square.call(12).await?;
        info!("  attempt {}: {} in {:?}", attempt, value, started.elapsed());
    }

    info!("\n--- Cache-only mode ---");
    match square.cached(13).await {
        Ok(value) => info!("  unexpected hit: {}", value),
        Err(MemoError::CacheMiss { key }) => info!("  miss for {}", key),
        Err(e) => return Err(e.into()),
    }

    info!("\n--- Write-through and read-through ---");
    square.write_through(1, 12).await?;
    info!("  after write-through: {}", square.call(12).await?);
    info!("  after read-through:  {}", square.read_through(12).await?);

    info!("\n--- Async computation ---");
    let fetch = memo
        .memoize(|id: u64| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if id == 0 {
                anyhow::bail!("no record with id 0");
            }
            Ok(id * 1_000)
        })
        .named("fetch");
    info!("  fetch(3) = {}", fetch.call(3).await?);
    if let Err(e) = fetch.call(0).await {
        info!("  fetch(0) failed and was not cached: {}", e);
    }

    info!("\n--- Per-context tier over a shared tier ---");
    let shared = Arc::new(MemoryStore::<u64>::new());
    let tiered = Arc::new(ScopedStore::<u64>::chained(shared.clone()));
    let per_request = Memoizer::with_defaults(ConfigLayer::<u64>::new().store(tiered.clone()).max_age(60));
    let cube = per_request.memoize_sync(|x: u64| x * x * x).named("cube");

    for request in 1..=3 {
        let ctx = ExecutionContext::new();
        let value = ctx.clone().run(cube.call(5)).await?;
        info!("  request {} ({}): cube(5) = {}", request, ctx.id(), value);
    }
    info!("  promotions from shared tier: {}", tiered.promotions());
    info!("  shared tier: {}", shared.stats().await);

    info!("\n=== Demo Complete ===");
    Ok(())
}
