//! In-process [`SecretBackend`] for development setups and tests.

use super::SecretBackend;
use crate::errors::{require_non_empty, IdpError};
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// Secret store held in memory. Listing returns names in sorted order.
#[derive(Debug, Default)]
pub struct MemorySecretBackend {
    secrets: RwLock<BTreeMap<String, SecretString>>,
}

impl MemorySecretBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a secret.
    #[must_use]
    pub fn with_secret(self, name: &str, value: &str) -> Self {
        self.insert(name, value);
        self
    }

    fn insert(&self, name: &str, value: &str) {
        self.secrets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), SecretString::from(value));
    }

    fn read(&self, name: &str) -> Result<SecretString, IdpError> {
        require_non_empty("name", name)?;
        self.secrets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| IdpError::Remote(format!("Secret '{name}' does not exist in the store")))
    }

    /// Current value of `name`, if present.
    #[must_use]
    pub fn peek(&self, name: &str) -> Option<String> {
        self.secrets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|v| v.expose_secret().to_string())
    }
}

#[async_trait]
impl SecretBackend for MemorySecretBackend {
    async fn get_secret(&self, name: &str) -> Result<SecretString, IdpError> {
        self.read(name)
    }

    fn get_secret_blocking(&self, name: &str) -> Result<SecretString, IdpError> {
        self.read(name)
    }

    async fn set_secret(&self, name: &str, value: &str) -> Result<(), IdpError> {
        require_non_empty("name", name)?;
        require_non_empty("value", value)?;
        self.insert(name, value);
        Ok(())
    }

    async fn list_secret_names(&self) -> Result<Vec<String>, IdpError> {
        Ok(self
            .secrets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect())
    }
}
