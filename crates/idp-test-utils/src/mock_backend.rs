//! Counting trust-store backend for cache-aside and single-flight tests.
//!
//! Wraps an in-memory secret map and records how often each operation reached
//! the "store". Can be switched into a failing mode and slowed down to widen
//! race windows.
//!
//! # Example
//!
//! ```rust,ignore
//! use idp_test_utils::CountingSecretBackend;
//!
//! let backend = Arc::new(CountingSecretBackend::new().with_secret("db-password", "p@ss"));
//! let vault = CachedKeyVault::with_cache("primary", backend.clone(), cache);
//!
//! vault.get_secret("db-password").await?;
//! vault.get_secret("db-password").await?;
//! assert_eq!(backend.fetch_count(), 1);
//! ```

use async_trait::async_trait;
use common::secret::SecretString;
use idp_client::errors::IdpError;
use idp_client::vault::{MemorySecretBackend, SecretBackend};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Secret backend that counts store round trips.
#[derive(Debug, Default)]
pub struct CountingSecretBackend {
    inner: MemorySecretBackend,
    fetches: AtomicUsize,
    writes: AtomicUsize,
    lists: AtomicUsize,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl CountingSecretBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose every operation fails with `IdpError::Remote`.
    #[must_use]
    pub fn failing() -> Self {
        let backend = Self::default();
        backend.set_failing(true);
        backend
    }

    /// Seed a secret without counting a write.
    #[must_use]
    pub fn with_secret(mut self, name: &str, value: &str) -> Self {
        self.inner = self.inner.with_secret(name, value);
        self
    }

    /// Sleep before each fetch.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `get_secret` calls (async and blocking) that reached the store.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    /// Current stored value of `name`.
    pub fn stored(&self, name: &str) -> Option<String> {
        self.inner.peek(name)
    }

    fn check_failing(&self) -> Result<(), IdpError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(IdpError::Remote("Simulated trust store outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SecretBackend for CountingSecretBackend {
    async fn get_secret(&self, name: &str) -> Result<SecretString, IdpError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.check_failing()?;
        self.inner.get_secret(name).await
    }

    fn get_secret_blocking(&self, name: &str) -> Result<SecretString, IdpError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.check_failing()?;
        self.inner.get_secret_blocking(name)
    }

    async fn set_secret(&self, name: &str, value: &str) -> Result<(), IdpError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;
        self.inner.set_secret(name, value).await
    }

    async fn list_secret_names(&self) -> Result<Vec<String>, IdpError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;
        self.inner.list_secret_names().await
    }
}
