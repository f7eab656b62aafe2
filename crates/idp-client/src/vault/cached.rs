//! Cache-aside credential provider.
//!
//! The backing store is the source of truth; the cache is a derived index
//! that may be evicted at any time.
//!
//! - Reads: cache first, store on any cache miss, then repopulate the cache.
//! - Writes: store first, then cache.
//! - Deletes: cache only.

use super::{KeyVault, SecretBackend};
use crate::cache::Cache;
use crate::config::KeyVaultSettings;
use crate::crypto::Certificate;
use crate::errors::{require_non_empty, IdpError};
use crate::observability::metrics::record_vault_request;
use crate::registry::CacheRegistry;
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

pub struct CachedKeyVault {
    name: String,
    backend: Arc<dyn SecretBackend>,
    cache: Option<Arc<dyn Cache>>,
}

impl fmt::Debug for CachedKeyVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedKeyVault")
            .field("name", &self.name)
            .field("cache", &self.cache.as_ref().map(|c| c.name().to_string()))
            .finish_non_exhaustive()
    }
}

impl CachedKeyVault {
    /// Build from settings, resolving the named cache when caching is enabled.
    ///
    /// # Errors
    ///
    /// `IdpError::Configuration` when caching is enabled and the configured
    /// cache name is missing or not registered.
    pub fn new(
        settings: &KeyVaultSettings,
        backend: Arc<dyn SecretBackend>,
        caches: &CacheRegistry,
    ) -> Result<Self, IdpError> {
        require_non_empty("key vault name", &settings.name)?;

        let cache = if settings.use_cache {
            let cache_name = settings
                .cache_settings_name
                .as_deref()
                .filter(|n| !n.trim().is_empty())
                .ok_or_else(|| {
                    IdpError::Configuration(format!(
                        "Key vault '{}' enables caching without a cache settings name",
                        settings.name
                    ))
                })?;
            Some(caches.get(cache_name)?)
        } else {
            None
        };

        Ok(Self {
            name: settings.name.clone(),
            backend,
            cache,
        })
    }

    /// Provider that always reads the store.
    #[must_use]
    pub fn uncached(name: impl Into<String>, backend: Arc<dyn SecretBackend>) -> Self {
        Self {
            name: name.into(),
            backend,
            cache: None,
        }
    }

    /// Provider mirroring reads into `cache`.
    #[must_use]
    pub fn with_cache(
        name: impl Into<String>,
        backend: Arc<dyn SecretBackend>,
        cache: Arc<dyn Cache>,
    ) -> Self {
        Self {
            name: name.into(),
            backend,
            cache: Some(cache),
        }
    }

    #[must_use]
    pub fn is_caching(&self) -> bool {
        self.cache.is_some()
    }

    async fn fetch(&self, name: &str) -> Result<SecretString, IdpError> {
        let start = Instant::now();
        let result = self.backend.get_secret(name).await;
        record_vault_request("get_secret", status_label(&result), start.elapsed());
        result
    }

    fn fetch_blocking(&self, name: &str) -> Result<SecretString, IdpError> {
        let start = Instant::now();
        let result = self.backend.get_secret_blocking(name);
        record_vault_request("get_secret", status_label(&result), start.elapsed());
        result
    }

    fn cached_value(&self, lookup: Result<String, IdpError>) -> Option<SecretString> {
        match lookup {
            Ok(value) => {
                debug!(target: "idp.vault", vault = %self.name, "Served from cache");
                Some(SecretString::from(value))
            }
            Err(IdpError::NotFound(_)) => None,
            Err(e) => {
                warn!(target: "idp.vault", vault = %self.name, error = %e, "Cache read failed, falling back to store");
                None
            }
        }
    }

    /// Cache-aside read of a raw secret value.
    async fn read_through(&self, name: &str) -> Result<SecretString, IdpError> {
        require_non_empty("name", name)?;

        let Some(cache) = &self.cache else {
            return self.fetch(name).await;
        };

        if let Some(value) = self.cached_value(cache.get_value(name).await) {
            return Ok(value);
        }

        let value = self.fetch(name).await?;
        cache
            .set_value(name, value.expose_secret(), None)
            .await
            .map_err(|e| repopulate_error(name, &e))?;
        debug!(target: "idp.vault", vault = %self.name, "Cache repopulated from store");
        Ok(value)
    }

    /// Blocking cache-aside read of a raw secret value.
    fn read_through_blocking(&self, name: &str) -> Result<SecretString, IdpError> {
        require_non_empty("name", name)?;

        let Some(cache) = &self.cache else {
            return self.fetch_blocking(name);
        };

        if let Some(value) = self.cached_value(cache.get_value_blocking(name)) {
            return Ok(value);
        }

        let value = self.fetch_blocking(name)?;
        cache
            .set_value_blocking(name, value.expose_secret(), None)
            .map_err(|e| repopulate_error(name, &e))?;
        debug!(target: "idp.vault", vault = %self.name, "Cache repopulated from store");
        Ok(value)
    }
}

fn status_label<T>(result: &Result<T, IdpError>) -> &'static str {
    if result.is_ok() {
        "success"
    } else {
        "error"
    }
}

fn repopulate_error(name: &str, err: &IdpError) -> IdpError {
    IdpError::Remote(format!("Failed to repopulate cache for '{name}': {err}"))
}

#[async_trait]
impl KeyVault for CachedKeyVault {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all)]
    async fn get_secret(&self, name: &str) -> Result<SecretString, IdpError> {
        self.read_through(name).await
    }

    #[instrument(skip_all)]
    async fn set_secret(&self, name: &str, value: &str) -> Result<bool, IdpError> {
        require_non_empty("name", name)?;
        require_non_empty("value", value)?;

        let start = Instant::now();
        let result = self.backend.set_secret(name, value).await;
        record_vault_request("set_secret", status_label(&result), start.elapsed());
        result?;

        if let Some(cache) = &self.cache {
            cache.set_value(name, value, None).await?;
        }
        Ok(true)
    }

    #[instrument(skip_all)]
    fn obtain_certificate(&self, name: &str) -> Result<Certificate, IdpError> {
        let payload = self.read_through_blocking(name)?;
        Certificate::from_base64(payload.expose_secret())
    }

    #[instrument(skip_all)]
    async fn obtain_certificate_async(&self, name: &str) -> Result<Certificate, IdpError> {
        let payload = self.read_through(name).await?;
        Certificate::from_base64(payload.expose_secret())
    }

    #[instrument(skip_all)]
    async fn list_secrets(&self) -> Result<Vec<String>, IdpError> {
        let start = Instant::now();
        let result = self.backend.list_secret_names().await;
        record_vault_request("list_secrets", status_label(&result), start.elapsed());
        result
    }

    #[instrument(skip_all)]
    async fn delete_cache_entry(&self, name: &str) -> Result<bool, IdpError> {
        require_non_empty("name", name)?;
        match &self.cache {
            Some(cache) => cache.delete_entry(name).await,
            None => Ok(true),
        }
    }
}
