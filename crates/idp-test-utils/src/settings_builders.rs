//! Settings and component builders with test defaults.

use crate::crypto_fixtures::{PRIMARY_KEY_PKCS8_B64, TEST_CERTIFICATE_NAME};
use crate::mock_backend::CountingSecretBackend;
use idp_client::cache::InMemoryCache;
use idp_client::config::{CacheSettings, ClientSettings};
use idp_client::vault::CachedKeyVault;
use std::sync::Arc;

pub const TEST_CLIENT_ID: &str = "client-123";
pub const TEST_VAULT_NAME: &str = "primary";
pub const TEST_CACHE_NAME: &str = "secrets";

/// Client settings pointing at `authorization_server` with the fixture
/// certificate name and vault.
pub fn test_client_settings(authorization_server: &str) -> ClientSettings {
    ClientSettings::new(
        authorization_server,
        TEST_CLIENT_ID,
        TEST_CERTIFICATE_NAME,
        TEST_VAULT_NAME,
    )
}

/// Counting backend holding the primary fixture certificate.
pub fn certificate_backend() -> Arc<CountingSecretBackend> {
    Arc::new(CountingSecretBackend::new().with_secret(TEST_CERTIFICATE_NAME, PRIMARY_KEY_PKCS8_B64))
}

/// In-memory cache named [`TEST_CACHE_NAME`] without default expiration.
pub fn test_cache() -> Arc<InMemoryCache> {
    Arc::new(InMemoryCache::new(CacheSettings::new(TEST_CACHE_NAME)))
}

/// Cache-aside key vault over `backend` and `cache`.
pub fn cached_vault(
    backend: Arc<CountingSecretBackend>,
    cache: Arc<InMemoryCache>,
) -> Arc<CachedKeyVault> {
    Arc::new(CachedKeyVault::with_cache(TEST_VAULT_NAME, backend, cache))
}
