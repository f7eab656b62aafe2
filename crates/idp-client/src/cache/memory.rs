//! In-process [`Cache`] backed by a [`SingleFlightStore`].

use super::store::SingleFlightStore;
use super::Cache;
use crate::config::CacheSettings;
use crate::errors::{require_non_empty, IdpError};
use crate::observability::metrics::record_cache_lookup;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::instrument;

/// String cache held in process memory.
///
/// Writes without an explicit TTL follow [`CacheSettings::default_ttl`].
#[derive(Debug)]
pub struct InMemoryCache {
    settings: CacheSettings,
    store: SingleFlightStore<String, String>,
}

impl InMemoryCache {
    #[must_use]
    pub fn new(settings: CacheSettings) -> Self {
        let store = SingleFlightStore::with_default_ttl(settings.default_ttl());
        Self { settings, store }
    }

    #[must_use]
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Single-flight read-through for callers that own the factory.
    pub async fn get_or_create<F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        factory: F,
    ) -> Result<String, IdpError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, IdpError>>,
    {
        require_non_empty("key", key)?;
        self.store.get_or_create(key.to_string(), ttl, factory).await
    }

    /// Remove expired entries. Returns the number removed.
    pub async fn purge_expired(&self) -> usize {
        self.store.purge_expired().await
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn lookup(&self, key: &str) -> Result<String, IdpError> {
        require_non_empty("key", key)?;
        match self.store.get(&key.to_string()) {
            Some(value) => {
                record_cache_lookup(&self.settings.name, "hit");
                Ok(value)
            }
            None => {
                record_cache_lookup(&self.settings.name, "miss");
                tracing::debug!(target: "idp.cache", cache = %self.settings.name, "Cache miss");
                Err(IdpError::NotFound(format!("No value found for key {key}")))
            }
        }
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    fn name(&self) -> &str {
        &self.settings.name
    }

    #[instrument(skip_all)]
    async fn get_value(&self, key: &str) -> Result<String, IdpError> {
        self.lookup(key)
    }

    #[instrument(skip_all)]
    async fn set_value(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, IdpError> {
        require_non_empty("key", key)?;
        require_non_empty("value", value)?;
        self.store
            .insert(key.to_string(), value.to_string(), ttl)
            .await;
        Ok(true)
    }

    #[instrument(skip_all)]
    async fn delete_entry(&self, key: &str) -> Result<bool, IdpError> {
        require_non_empty("key", key)?;
        Ok(self.store.delete(&key.to_string()).await)
    }

    async fn contains(&self, key: &str) -> Result<bool, IdpError> {
        require_non_empty("key", key)?;
        Ok(self.store.contains(&key.to_string()))
    }

    fn get_value_blocking(&self, key: &str) -> Result<String, IdpError> {
        self.lookup(key)
    }

    fn set_value_blocking(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, IdpError> {
        require_non_empty("key", key)?;
        require_non_empty("value", value)?;
        self.store
            .insert_blocking(key.to_string(), value.to_string(), ttl);
        Ok(true)
    }
}
