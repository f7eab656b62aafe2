//! Name → instance maps built once by the composition root.
//!
//! Names are matched case-insensitively. A registry is immutable after it is
//! handed to the components that resolve from it.

use crate::cache::Cache;
use crate::errors::{require_non_empty, IdpError};
use crate::vault::KeyVault;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Registry of named caches.
pub type CacheRegistry = NamedRegistry<dyn Cache>;

/// Registry of named key vaults.
pub type VaultRegistry = NamedRegistry<dyn KeyVault>;

pub struct NamedRegistry<T: ?Sized> {
    kind: &'static str,
    entries: BTreeMap<String, Arc<T>>,
}

impl<T: ?Sized> fmt::Debug for NamedRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedRegistry")
            .field("kind", &self.kind)
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<T: ?Sized> NamedRegistry<T> {
    /// Empty registry. `kind` names the registered thing in error messages.
    #[must_use]
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    /// Register `instance` under `name`.
    ///
    /// # Errors
    ///
    /// - `IdpError::Validation` - `name` is empty
    /// - `IdpError::Configuration` - `name` is already registered
    pub fn register(&mut self, name: &str, instance: Arc<T>) -> Result<(), IdpError> {
        require_non_empty("name", name)?;
        let normalized = name.trim().to_lowercase();
        if self.entries.contains_key(&normalized) {
            return Err(IdpError::Configuration(format!(
                "Duplicate {} name '{name}'",
                self.kind
            )));
        }
        self.entries.insert(normalized, instance);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, name: &str, instance: Arc<T>) -> Result<Self, IdpError> {
        self.register(name, instance)?;
        Ok(self)
    }

    /// Resolve `name`.
    ///
    /// # Errors
    ///
    /// `IdpError::Configuration` when nothing is registered under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<T>, IdpError> {
        self.entries
            .get(&name.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| {
                IdpError::Configuration(format!("No {} registered with name '{name}'", self.kind))
            })
    }

    /// Registered names (normalized), in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl NamedRegistry<dyn Cache> {
    /// Register a cache under its own name.
    pub fn register_cache(&mut self, cache: Arc<dyn Cache>) -> Result<(), IdpError> {
        let name = cache.name().to_string();
        self.register(&name, cache)
    }
}

impl NamedRegistry<dyn KeyVault> {
    /// Register a key vault under its own name.
    pub fn register_vault(&mut self, vault: Arc<dyn KeyVault>) -> Result<(), IdpError> {
        let name = vault.name().to_string();
        self.register(&name, vault)
    }
}
