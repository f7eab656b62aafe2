//! Named caches used by the credential provider.
//!
//! A [`Cache`] is a string key/value store identified by name. Instances are
//! built by the composition root and registered in a
//! [`CacheRegistry`](crate::registry::CacheRegistry); nothing in this crate
//! holds a process-wide cache.

pub mod memory;
pub mod store;

pub use memory::InMemoryCache;
pub use store::{KeyGuard, LockTable, SingleFlightStore};

use crate::errors::IdpError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Cache capability consumed by the credential provider.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Registry name of this cache.
    fn name(&self) -> &str;

    /// Value for `key`.
    ///
    /// # Errors
    ///
    /// `IdpError::NotFound` when the key is absent or expired.
    async fn get_value(&self, key: &str) -> Result<String, IdpError>;

    /// Store `value`, replacing any existing entry. `ttl` overrides the
    /// cache's default retention.
    async fn set_value(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, IdpError>;

    /// Remove `key`. Succeeds for absent keys.
    async fn delete_entry(&self, key: &str) -> Result<bool, IdpError>;

    /// Whether a live entry exists for `key`.
    async fn contains(&self, key: &str) -> Result<bool, IdpError>;

    /// Synchronous [`get_value`](Cache::get_value).
    fn get_value_blocking(&self, key: &str) -> Result<String, IdpError>;

    /// Synchronous [`set_value`](Cache::set_value).
    fn set_value_blocking(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, IdpError>;
}

/// Typed JSON helpers over any [`Cache`].
#[async_trait]
pub trait CacheExt: Cache {
    /// Deserialize the JSON value stored under `key`.
    async fn get_json<T>(&self, key: &str) -> Result<T, IdpError>
    where
        T: DeserializeOwned + Send,
    {
        let raw = self.get_value(key).await?;
        serde_json::from_str(&raw).map_err(|e| {
            IdpError::InvalidResponse(format!("Cached value is not the expected JSON: {e}"))
        })
    }

    /// Serialize `value` as JSON and store it under `key`.
    async fn set_json<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<bool, IdpError>
    where
        T: Serialize + Sync,
    {
        let raw = serde_json::to_string(value)
            .map_err(|e| IdpError::Validation(format!("Value cannot be serialized: {e}")))?;
        self.set_value(key, &raw, ttl).await
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}
