//! Cache-aside reads and write-through of the key vault provider.

use common::secret::ExposeSecret;
use idp_client::cache::{Cache, CacheExt};
use idp_client::errors::IdpError;
use idp_client::vault::KeyVault;
use idp_test_utils::{
    cached_vault, test_cache, CountingSecretBackend, PRIMARY_KEY_PKCS8_B64, TEST_CERTIFICATE_NAME,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[tokio::test]
async fn test_second_read_is_served_from_cache() -> Result<(), anyhow::Error> {
    let backend = Arc::new(CountingSecretBackend::new().with_secret("db-password", "p@ss"));
    let cache = test_cache();
    let vault = cached_vault(backend.clone(), cache.clone());

    let first = vault.get_secret("db-password").await?;
    assert_eq!(first.expose_secret(), "p@ss");
    assert_eq!(backend.fetch_count(), 1);
    assert_eq!(cache.get_value("db-password").await?, "p@ss");

    let second = vault.get_secret("db-password").await?;
    assert_eq!(second.expose_secret(), "p@ss");
    assert_eq!(backend.fetch_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_set_writes_store_then_cache() -> Result<(), anyhow::Error> {
    let backend = Arc::new(CountingSecretBackend::new().with_secret("api-key", "old"));
    let cache = test_cache();
    let vault = cached_vault(backend.clone(), cache.clone());

    vault.get_secret("api-key").await?;
    assert!(vault.set_secret("api-key", "new").await?);

    assert_eq!(backend.write_count(), 1);
    assert_eq!(backend.stored("api-key").as_deref(), Some("new"));
    assert_eq!(cache.get_value("api-key").await?, "new");
    assert_eq!(vault.get_secret("api-key").await?.expose_secret(), "new");
    assert_eq!(backend.fetch_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_failed_store_write_leaves_cache_untouched() -> Result<(), anyhow::Error> {
    let backend = Arc::new(CountingSecretBackend::new().with_secret("api-key", "old"));
    let cache = test_cache();
    let vault = cached_vault(backend.clone(), cache.clone());
    vault.get_secret("api-key").await?;

    backend.set_failing(true);
    let result = vault.set_secret("api-key", "new").await;

    assert!(matches!(result, Err(IdpError::Remote(_))));
    assert_eq!(cache.get_value("api-key").await?, "old");
    Ok(())
}

#[tokio::test]
async fn test_delete_clears_cache_only() -> Result<(), anyhow::Error> {
    let backend = Arc::new(CountingSecretBackend::new().with_secret("db-password", "p@ss"));
    let cache = test_cache();
    let vault = cached_vault(backend.clone(), cache.clone());

    vault.get_secret("db-password").await?;
    assert!(vault.delete_cache_entry("db-password").await?);
    assert!(!cache.contains("db-password").await?);
    assert_eq!(backend.stored("db-password").as_deref(), Some("p@ss"));

    vault.get_secret("db-password").await?;
    assert_eq!(backend.fetch_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_store_failure_propagates_and_is_not_cached() -> Result<(), anyhow::Error> {
    let backend = Arc::new(CountingSecretBackend::failing().with_secret("db-password", "p@ss"));
    let cache = test_cache();
    let vault = cached_vault(backend.clone(), cache.clone());

    let result = vault.get_secret("db-password").await;
    assert!(matches!(result, Err(IdpError::Remote(_))));
    assert!(cache.is_empty());

    backend.set_failing(false);
    assert_eq!(vault.get_secret("db-password").await?.expose_secret(), "p@ss");
    assert_eq!(backend.fetch_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_empty_name_is_rejected_before_io() -> Result<(), anyhow::Error> {
    let backend = Arc::new(CountingSecretBackend::new());
    let vault = cached_vault(backend.clone(), test_cache());

    assert!(matches!(
        vault.get_secret("  ").await,
        Err(IdpError::Validation(_))
    ));
    assert!(matches!(
        vault.set_secret("", "v").await,
        Err(IdpError::Validation(_))
    ));
    assert_eq!(backend.fetch_count(), 0);
    assert_eq!(backend.write_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_certificate_is_fetched_once() -> Result<(), anyhow::Error> {
    let backend = Arc::new(
        CountingSecretBackend::new().with_secret(TEST_CERTIFICATE_NAME, PRIMARY_KEY_PKCS8_B64),
    );
    let vault = cached_vault(backend.clone(), test_cache());

    let first = vault.obtain_certificate_async(TEST_CERTIFICATE_NAME).await?;
    let second = vault.obtain_certificate_async(TEST_CERTIFICATE_NAME).await?;

    assert_eq!(first.public_key_der(), second.public_key_der());
    assert_eq!(backend.fetch_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_list_secrets_reads_store() -> Result<(), anyhow::Error> {
    let backend = Arc::new(
        CountingSecretBackend::new()
            .with_secret("b-secret", "2")
            .with_secret("a-secret", "1"),
    );
    let vault = cached_vault(backend.clone(), test_cache());

    assert_eq!(vault.list_secrets().await?, vec!["a-secret", "b-secret"]);
    assert_eq!(backend.list_count(), 1);
    Ok(())
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Endpoint {
    host: String,
    port: u16,
}

#[tokio::test]
async fn test_typed_json_values() -> Result<(), anyhow::Error> {
    let cache = test_cache();
    let endpoint = Endpoint {
        host: "db.internal".to_string(),
        port: 5432,
    };

    assert!(cache.set_json("endpoint", &endpoint, None).await?);
    let loaded: Endpoint = cache.get_json("endpoint").await?;
    assert_eq!(loaded, endpoint);

    cache.set_value("broken", "{not json", None).await?;
    let result: Result<Endpoint, _> = cache.get_json("broken").await;
    assert!(matches!(result, Err(IdpError::InvalidResponse(_))));
    Ok(())
}
