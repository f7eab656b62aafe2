//! Composition root: builds the registries and the exchange client from
//! process configuration.
//!
//! Wiring order: optional cache (`CACHE_*`), Azure Key Vault backend and its
//! cache-aside provider (`KEY_VAULT_*`), then the exchange client (`IDP_*`),
//! which resolves the key vault by name.

use crate::cache::{Cache, InMemoryCache};
use crate::config::{CacheSettings, ClientSettings, KeyVaultSettings};
use crate::errors::IdpError;
use crate::registry::{CacheRegistry, VaultRegistry};
use crate::token_client::TokenExchangeClient;
use crate::vault::{AzureSecretBackend, CachedKeyVault, KeyVault};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use tracing::info;

/// Everything the composition root owns.
#[derive(Debug)]
pub struct IdpComponents {
    pub caches: CacheRegistry,
    pub vaults: VaultRegistry,
    pub client: TokenExchangeClient,
}

impl IdpComponents {
    /// Build from environment variables.
    ///
    /// # Errors
    ///
    /// `IdpError::Configuration` for missing or invalid settings, or any
    /// construction error of the individual components.
    pub fn from_env() -> Result<Self, IdpError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Build from a variable map.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, IdpError> {
        let client_settings = ClientSettings::from_vars(vars)?;
        let vault_settings = KeyVaultSettings::from_vars(vars)?;

        let mut caches = CacheRegistry::new("cache");
        if vars.contains_key("CACHE_NAME") {
            let cache_settings = CacheSettings::from_vars(vars)?;
            let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new(cache_settings));
            caches.register_cache(cache)?;
        }

        let backend = Arc::new(AzureSecretBackend::new(
            &vault_settings,
            client_settings.http_timeout(),
        )?);
        let vault: Arc<dyn KeyVault> =
            Arc::new(CachedKeyVault::new(&vault_settings, backend, &caches)?);

        let mut vaults = VaultRegistry::new("key vault");
        vaults.register_vault(vault)?;

        let client = TokenExchangeClient::new(client_settings, &vaults)?;

        info!(
            target: "idp.bootstrap",
            caches = ?caches.names(),
            vaults = ?vaults.names(),
            token_endpoint = %client.token_endpoint(),
            "IdP client composed"
        );

        Ok(Self {
            caches,
            vaults,
            client,
        })
    }
}
