//! Trust-store access: secrets and signing certificates by name.
//!
//! [`KeyVault`] is the capability consumed by the assertion builder. The
//! shipped implementation, [`CachedKeyVault`], layers cache-aside reads over
//! a [`SecretBackend`] that talks to the actual store.

pub mod azure;
pub mod cached;
pub mod memory;

pub use azure::AzureSecretBackend;
pub use cached::CachedKeyVault;
pub use memory::MemorySecretBackend;

use crate::crypto::Certificate;
use crate::errors::IdpError;
use async_trait::async_trait;
use common::secret::SecretString;

/// Named trust store of secrets and certificates.
#[async_trait]
pub trait KeyVault: Send + Sync {
    /// Registry name of this key vault.
    fn name(&self) -> &str;

    async fn get_secret(&self, name: &str) -> Result<SecretString, IdpError>;

    /// Write `value` to the store (and the cache, when enabled).
    async fn set_secret(&self, name: &str, value: &str) -> Result<bool, IdpError>;

    /// Resolve a certificate on the calling thread.
    ///
    /// Must not be called from within an asynchronous execution context.
    fn obtain_certificate(&self, name: &str) -> Result<Certificate, IdpError>;

    async fn obtain_certificate_async(&self, name: &str) -> Result<Certificate, IdpError>;

    /// Names of all secrets held by the store, in store order.
    async fn list_secrets(&self) -> Result<Vec<String>, IdpError>;

    /// Evict `name` from the cache. Never touches the store.
    async fn delete_cache_entry(&self, name: &str) -> Result<bool, IdpError>;
}

/// Raw access to a backing secret store.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    async fn get_secret(&self, name: &str) -> Result<SecretString, IdpError>;

    /// Synchronous [`get_secret`](SecretBackend::get_secret).
    fn get_secret_blocking(&self, name: &str) -> Result<SecretString, IdpError>;

    async fn set_secret(&self, name: &str, value: &str) -> Result<(), IdpError>;

    async fn list_secret_names(&self) -> Result<Vec<String>, IdpError>;
}
