//! Single-flight and retention behavior of the keyed store and in-memory cache.

use idp_client::cache::{Cache, InMemoryCache, SingleFlightStore};
use idp_client::config::CacheSettings;
use idp_client::errors::IdpError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

#[tokio::test]
async fn test_concurrent_callers_share_one_factory_run() -> Result<(), anyhow::Error> {
    let cache = InMemoryCache::new(CacheSettings::new("tokens"));
    let runs = AtomicUsize::new(0);

    let factory = || async {
        runs.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok::<_, IdpError>("token-1".to_string())
    };

    let (first, second) = tokio::join!(
        cache.get_or_create("service-a", None, factory),
        cache.get_or_create("service-a", None, factory),
    );

    assert_eq!(first?, "token-1");
    assert_eq!(second?, "token-1");
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(cache.get_value("service-a").await?, "token-1");
    Ok(())
}

#[tokio::test]
async fn test_failed_factory_lets_waiter_run_its_own() -> Result<(), anyhow::Error> {
    let store: SingleFlightStore<String, String> = SingleFlightStore::new();
    let runs = AtomicUsize::new(0);

    let failing = || async {
        runs.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Err::<String, _>("upstream unavailable")
    };
    let succeeding = || async {
        runs.fetch_add(1, Ordering::SeqCst);
        Ok::<_, &str>("token-2".to_string())
    };

    let (first, second) = tokio::join!(
        store.get_or_create("service-b".to_string(), None, failing),
        store.get_or_create("service-b".to_string(), None, succeeding),
    );

    assert_eq!(first, Err("upstream unavailable"));
    assert_eq!(second.as_deref(), Ok("token-2"));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(store.get(&"service-b".to_string()).as_deref(), Some("token-2"));
    Ok(())
}

#[tokio::test]
async fn test_distinct_keys_do_not_serialize() -> Result<(), anyhow::Error> {
    let store: Arc<SingleFlightStore<String, u32>> = Arc::new(SingleFlightStore::new());
    let barrier = Arc::new(Barrier::new(2));

    let run = |key: &'static str, value: u32| {
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);
        async move {
            store
                .get_or_create(key.to_string(), None, || async move {
                    // Both factories must be running at once to pass the barrier.
                    barrier.wait().await;
                    Ok::<_, IdpError>(value)
                })
                .await
        }
    };

    let (a, b) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(run("key-a", 1), run("key-b", 2))
    })
    .await?;

    assert_eq!(a?, 1);
    assert_eq!(b?, 2);
    assert_eq!(store.lock_count(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_entry_expires_after_ttl() -> Result<(), anyhow::Error> {
    let cache = InMemoryCache::new(CacheSettings::new("tokens"));
    cache
        .set_value("short-lived", "v", Some(Duration::from_secs(30)))
        .await?;
    assert_eq!(cache.get_value("short-lived").await?, "v");

    tokio::time::advance(Duration::from_secs(31)).await;

    let result = cache.get_value("short-lived").await;
    assert!(matches!(result, Err(IdpError::NotFound(_))));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_default_expiration_applies_without_explicit_ttl() -> Result<(), anyhow::Error> {
    let retaining = InMemoryCache::new(CacheSettings::new("forever"));
    let expiring = InMemoryCache::new(CacheSettings::new("daily").with_expiration_days(1));

    retaining.set_value("k", "v", None).await?;
    expiring.set_value("k", "v", None).await?;

    tokio::time::advance(Duration::from_secs(86_400 + 1)).await;

    assert_eq!(retaining.get_value("k").await?, "v");
    assert!(matches!(
        expiring.get_value("k").await,
        Err(IdpError::NotFound(_))
    ));
    assert_eq!(expiring.purge_expired().await, 1);
    assert!(expiring.is_empty());
    assert_eq!(retaining.len(), 1);
    Ok(())
}
