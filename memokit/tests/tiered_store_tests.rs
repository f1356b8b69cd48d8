//! Integration tests for chained store tiers

use chrono::Utc;
use memokit::{
    start_auto_purge, ConfigLayer, Expiry, MaxAge, Memoizer, MemoryStore, ResolvedConfig, Store,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

fn resolved(store: Arc<dyn Store<String>>, max_age: MaxAge) -> ResolvedConfig<String> {
    ResolvedConfig::new(store).with_max_age(max_age)
}

#[tokio::test]
async fn test_three_tier_promotion() {
    let l3 = Arc::new(MemoryStore::<String>::new());
    let l2 = Arc::new(MemoryStore::<String>::chained(l3.clone()));
    let l1 = Arc::new(MemoryStore::<String>::chained(l2.clone()));
    let config = resolved(l1.clone(), MaxAge::Seconds(120));

    let source = l3.set("k", &config, Some("deep".to_string())).await.unwrap();

    let entry = assert_ok!(l1.get("k", &config).await);
    assert_eq!(entry.value(), "deep");

    // Promoted into both upper tiers, never outliving the source
    assert!(l2.local().contains_key("k").await);
    assert!(l1.local().contains_key("k").await);
    assert!(entry.expires_at().unwrap() <= source.expires_at().unwrap());
    assert_eq!(l1.promotions(), 1);
    assert_eq!(l2.promotions(), 1);
}

#[tokio::test]
async fn test_write_reaches_every_tier() {
    let l3 = Arc::new(MemoryStore::<String>::new());
    let l2 = Arc::new(MemoryStore::<String>::chained(l3.clone()));
    let l1 = Arc::new(MemoryStore::<String>::chained(l2.clone()));
    let config = resolved(l1.clone(), MaxAge::Never);

    l1.set("k", &config, Some("v".to_string())).await.unwrap();

    assert!(l3.contains_key("k").await);
    assert!(l2.local().contains_key("k").await);
    assert!(l1.local().contains_key("k").await);
}

#[tokio::test]
async fn test_no_store_write_deletes_in_every_tier() {
    let l2 = Arc::new(MemoryStore::<String>::new());
    let l1 = Arc::new(MemoryStore::<String>::chained(l2.clone()));
    let keep = resolved(l1.clone(), MaxAge::Seconds(30));
    let drop = resolved(l1.clone(), MaxAge::NoStore);

    l1.set("k", &keep, Some("v".to_string())).await.unwrap();
    assert!(l1.set("k", &drop, Some("v".to_string())).await.is_none());

    assert!(l2.is_empty().await);
    assert!(l1.local().is_empty().await);
}

#[tokio::test]
async fn test_never_expiring_promotion() {
    let l2 = Arc::new(MemoryStore::<String>::new());
    let l1 = Arc::new(MemoryStore::<String>::chained(l2.clone()));
    let config = resolved(l1.clone(), MaxAge::Never);

    l2.set("k", &config, Some("forever".to_string())).await.unwrap();
    let entry = assert_ok!(l1.get("k", &config).await);

    assert_eq!(entry.expires(), Expiry::Never);
}

#[tokio::test]
async fn test_promoted_copy_expires_with_source() {
    let l2 = Arc::new(MemoryStore::<String>::new());
    let l1 = Arc::new(MemoryStore::<String>::chained(l2.clone()));
    let short = resolved(l1.clone(), MaxAge::Seconds(2));

    l2.set("k", &short, Some("brief".to_string())).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    // Promoted with the floored remaining lifetime of the source
    let promoted = assert_ok!(l1.get("k", &short).await);
    assert!(promoted.expires_at().unwrap() <= Utc::now() + chrono::Duration::seconds(1));

    tokio::time::sleep(Duration::from_millis(1600)).await;
    assert!(l1.get("k", &short).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_memoizer_over_tiers() {
    let shared = Arc::new(MemoryStore::<String>::new());
    let front = Arc::new(MemoryStore::<String>::chained(shared.clone()));
    let memo = Memoizer::with_defaults(ConfigLayer::<String>::new().store(front.clone()).max_age(60));
    let greet = memo
        .memoize_sync(|name: String| format!("hello {}", name))
        .named("greet");

    assert_eq!(assert_ok!(greet.call("ada".to_string()).await), "hello ada");

    // Losing the front tier is recovered from the shared one
    front.clear().await;
    assert!(front.local().is_empty().await);
    assert_eq!(assert_ok!(greet.cached("ada".to_string()).await), "hello ada");
    assert_eq!(front.promotions(), 1);
}

#[tokio::test]
async fn test_stats_across_tiers() {
    let l2 = Arc::new(MemoryStore::<String>::new());
    let l1 = Arc::new(MemoryStore::<String>::chained(l2.clone()));
    let config = resolved(l1.clone(), MaxAge::Seconds(30));

    l2.set("k", &config, Some("v".to_string())).await.unwrap();
    l1.get("k", &config).await.unwrap();
    l1.get("k", &config).await.unwrap();

    let front = l1.local().stats().await;
    assert_eq!(front.misses, 1);
    assert_eq!(front.hits, 1);
    assert_eq!(front.writes, 1);

    let back = l2.stats().await;
    assert_eq!(back.hits, 1);
    assert_eq!(back.hit_rate(), 100.0);
}

#[tokio::test]
async fn test_auto_purge_task() {
    let store = Arc::new(MemoryStore::<String>::new());
    let config = resolved(store.clone(), MaxAge::Seconds(1));

    store.set("a", &config, Some("x".to_string())).await.unwrap();
    store.set("b", &config, Some("y".to_string())).await.unwrap();

    let purger = tokio::spawn(start_auto_purge(store.clone(), Duration::from_millis(200)));
    tokio::time::sleep(Duration::from_millis(1500)).await;
    purger.abort();

    assert!(store.is_empty().await);
    assert_eq!(store.stats().await.expired, 2);
}
