//! Settings for the token exchange client, the Key Vault credential provider
//! and the in-memory cache.
//!
//! Every settings struct loads from environment variables (`from_env`) through
//! a testable `from_vars` entry point, and also derives `Deserialize` with the
//! same defaults so it can be embedded in a host application's settings file.

use crate::crypto::SigningAlgorithm;
use crate::errors::IdpError;
use common::jwt::JWT_BEARER_ASSERTION_TYPE;
use common::secret::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default token endpoint path appended to the authorization server.
pub const DEFAULT_SUFFIX_TOKEN_ENDPOINT: &str = "/connect/token";

/// Default client assertion lifetime in minutes.
pub const DEFAULT_JWT_EXPIRE_IN_MINUTES: u32 = 5;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 10;

/// Default Azure AD authority host.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Azure Instance Metadata Service token endpoint used for managed identity.
pub const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// Default retention of cache entries written without an explicit TTL.
pub const DEFAULT_EXPIRATION_DAYS: u32 = 7;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl From<ConfigError> for IdpError {
    fn from(err: ConfigError) -> Self {
        IdpError::Configuration(err.to_string())
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name).filter(|v| !v.trim().is_empty()).cloned()
}

fn parsed<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match optional(vars, name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

// ============================================================================
// Token exchange client
// ============================================================================

fn default_suffix_token_endpoint() -> String {
    DEFAULT_SUFFIX_TOKEN_ENDPOINT.to_string()
}

fn default_client_assertion_type() -> String {
    JWT_BEARER_ASSERTION_TYPE.to_string()
}

fn default_jwt_expire_in_minutes() -> u32 {
    DEFAULT_JWT_EXPIRE_IN_MINUTES
}

fn default_http_timeout_seconds() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECONDS
}

/// Settings for the token exchange client (`IDP_*`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSettings {
    /// Base URL of the authorization server.
    pub authorization_server: String,

    /// Token endpoint path appended to `authorization_server`.
    #[serde(default = "default_suffix_token_endpoint")]
    pub suffix_token_endpoint: String,

    /// OAuth client identifier; also the assertion's `iss` and `sub`.
    pub client_id: String,

    /// Scope requested in the exchange. Omitted from the form when unset.
    #[serde(default)]
    pub scope: Option<String>,

    /// Assertion audience. Defaults to the token endpoint URL.
    #[serde(default)]
    pub audience: Option<String>,

    #[serde(default = "default_client_assertion_type")]
    pub client_assertion_type: String,

    #[serde(default = "default_jwt_expire_in_minutes")]
    pub jwt_expire_in_minutes: u32,

    #[serde(default)]
    pub jwt_signing_algo: SigningAlgorithm,

    /// Name of the signing certificate in the trust store.
    pub key_vault_certificate_name: String,

    /// Name of the key vault registered in the composition root.
    pub key_vault_settings_name: String,

    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
}

impl ClientSettings {
    /// Create settings with defaults for every optional field.
    #[must_use]
    pub fn new(
        authorization_server: impl Into<String>,
        client_id: impl Into<String>,
        key_vault_certificate_name: impl Into<String>,
        key_vault_settings_name: impl Into<String>,
    ) -> Self {
        Self {
            authorization_server: authorization_server.into(),
            suffix_token_endpoint: default_suffix_token_endpoint(),
            client_id: client_id.into(),
            scope: None,
            audience: None,
            client_assertion_type: default_client_assertion_type(),
            jwt_expire_in_minutes: DEFAULT_JWT_EXPIRE_IN_MINUTES,
            jwt_signing_algo: SigningAlgorithm::default(),
            key_vault_certificate_name: key_vault_certificate_name.into(),
            key_vault_settings_name: key_vault_settings_name.into(),
            http_timeout_seconds: DEFAULT_HTTP_TIMEOUT_SECONDS,
        }
    }

    /// Load settings from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load settings from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let jwt_expire_in_minutes = parsed(
            vars,
            "IDP_JWT_EXPIRE_IN_MINUTES",
            DEFAULT_JWT_EXPIRE_IN_MINUTES,
        )?;
        if jwt_expire_in_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                name: "IDP_JWT_EXPIRE_IN_MINUTES".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let jwt_signing_algo = match optional(vars, "IDP_JWT_SIGNING_ALGO") {
            Some(raw) => raw.parse().map_err(|e: IdpError| ConfigError::InvalidValue {
                name: "IDP_JWT_SIGNING_ALGO".to_string(),
                reason: e.to_string(),
            })?,
            None => SigningAlgorithm::default(),
        };

        let http_timeout_seconds = parsed(
            vars,
            "IDP_HTTP_TIMEOUT_SECONDS",
            DEFAULT_HTTP_TIMEOUT_SECONDS,
        )?;
        if http_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                name: "IDP_HTTP_TIMEOUT_SECONDS".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(ClientSettings {
            authorization_server: required(vars, "IDP_AUTHORIZATION_SERVER")?,
            suffix_token_endpoint: optional(vars, "IDP_SUFFIX_TOKEN_ENDPOINT")
                .unwrap_or_else(default_suffix_token_endpoint),
            client_id: required(vars, "IDP_CLIENT_ID")?,
            scope: optional(vars, "IDP_SCOPE"),
            audience: optional(vars, "IDP_AUDIENCE"),
            client_assertion_type: optional(vars, "IDP_CLIENT_ASSERTION_TYPE")
                .unwrap_or_else(default_client_assertion_type),
            jwt_expire_in_minutes,
            jwt_signing_algo,
            key_vault_certificate_name: required(vars, "IDP_KEY_VAULT_CERTIFICATE_NAME")?,
            key_vault_settings_name: required(vars, "IDP_KEY_VAULT_SETTINGS_NAME")?,
            http_timeout_seconds,
        })
    }

    /// Full token endpoint URL: authorization server plus endpoint suffix.
    #[must_use]
    pub fn token_endpoint(&self) -> String {
        let base = self.authorization_server.trim_end_matches('/');
        if self.suffix_token_endpoint.starts_with('/') {
            format!("{base}{}", self.suffix_token_endpoint)
        } else {
            format!("{base}/{}", self.suffix_token_endpoint)
        }
    }

    /// Configured audience, or the token endpoint URL when none is set.
    #[must_use]
    pub fn effective_audience(&self) -> String {
        self.audience
            .clone()
            .unwrap_or_else(|| self.token_endpoint())
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    #[must_use]
    pub fn with_suffix_token_endpoint(mut self, suffix: impl Into<String>) -> Self {
        self.suffix_token_endpoint = suffix.into();
        self
    }

    #[must_use]
    pub fn with_jwt_expire_in_minutes(mut self, minutes: u32) -> Self {
        self.jwt_expire_in_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_signing_algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.jwt_signing_algo = algorithm;
        self
    }

    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout_seconds = timeout.as_secs();
        self
    }
}

// ============================================================================
// Key Vault credential provider
// ============================================================================

fn default_authority_host() -> String {
    DEFAULT_AUTHORITY_HOST.to_string()
}

fn default_imds_endpoint() -> String {
    DEFAULT_IMDS_ENDPOINT.to_string()
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

/// Settings for an Azure Key Vault backed credential provider (`KEY_VAULT_*`).
///
/// The vault is accessed either with a client secret (`tenant_id`,
/// `client_id`, `client_secret`) or, when `use_managed_identity` is set, with
/// the host's managed identity. In the latter mode the client secret fields
/// are optional and a non-empty `client_id` selects a user-assigned identity.
#[derive(Clone, Deserialize)]
pub struct KeyVaultSettings {
    /// Registry name of this key vault.
    pub name: String,

    /// Vault URI, e.g. `https://my-vault.vault.azure.net`.
    pub uri: String,

    #[serde(default)]
    pub tenant_id: String,

    #[serde(default)]
    pub client_id: String,

    /// Client secret used to obtain the Key Vault access token.
    #[serde(default = "empty_secret")]
    pub client_secret: SecretString,

    #[serde(default = "default_authority_host")]
    pub authority_host: String,

    /// Obtain the Key Vault access token from the managed identity endpoint.
    #[serde(default)]
    pub use_managed_identity: bool,

    #[serde(default = "default_imds_endpoint")]
    pub imds_endpoint: String,

    /// Mirror reads into a named cache.
    #[serde(default)]
    pub use_cache: bool,

    /// Name of the registered cache used when `use_cache` is set.
    #[serde(default)]
    pub cache_settings_name: Option<String>,
}

impl std::fmt::Debug for KeyVaultSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyVaultSettings")
            .field("name", &self.name)
            .field("uri", &self.uri)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("authority_host", &self.authority_host)
            .field("use_managed_identity", &self.use_managed_identity)
            .field("imds_endpoint", &self.imds_endpoint)
            .field("use_cache", &self.use_cache)
            .field("cache_settings_name", &self.cache_settings_name)
            .finish()
    }
}

impl KeyVaultSettings {
    /// Load settings from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load settings from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let use_cache = parsed(vars, "KEY_VAULT_USE_CACHE", false)?;
        let cache_settings_name = optional(vars, "KEY_VAULT_CACHE_SETTINGS_NAME");
        if use_cache && cache_settings_name.is_none() {
            return Err(ConfigError::MissingEnvVar(
                "KEY_VAULT_CACHE_SETTINGS_NAME".to_string(),
            ));
        }

        let use_managed_identity = parsed(vars, "KEY_VAULT_USE_MANAGED_IDENTITY", false)?;
        let credential_var = |name: &str| -> Result<String, ConfigError> {
            if use_managed_identity {
                Ok(optional(vars, name).unwrap_or_default())
            } else {
                required(vars, name)
            }
        };

        Ok(KeyVaultSettings {
            name: required(vars, "KEY_VAULT_NAME")?,
            uri: required(vars, "KEY_VAULT_URI")?,
            tenant_id: credential_var("KEY_VAULT_TENANT_ID")?,
            client_id: credential_var("KEY_VAULT_CLIENT_ID")?,
            client_secret: SecretString::from(credential_var("KEY_VAULT_CLIENT_SECRET")?),
            authority_host: optional(vars, "KEY_VAULT_AUTHORITY_HOST")
                .unwrap_or_else(default_authority_host),
            use_managed_identity,
            imds_endpoint: optional(vars, "KEY_VAULT_IMDS_ENDPOINT")
                .unwrap_or_else(default_imds_endpoint),
            use_cache,
            cache_settings_name,
        })
    }
}

// ============================================================================
// In-memory cache
// ============================================================================

fn default_expiration_days() -> u32 {
    DEFAULT_EXPIRATION_DAYS
}

/// Settings for an in-memory cache instance (`CACHE_*`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheSettings {
    /// Registry name of this cache.
    pub name: String,

    /// Expire entries written without an explicit TTL after
    /// `default_expiration_days`. When false such entries never expire.
    #[serde(default)]
    pub use_expiration: bool,

    #[serde(default = "default_expiration_days")]
    pub default_expiration_days: u32,
}

impl CacheSettings {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            use_expiration: false,
            default_expiration_days: DEFAULT_EXPIRATION_DAYS,
        }
    }

    /// Load settings from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load settings from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Ok(CacheSettings {
            name: required(vars, "CACHE_NAME")?,
            use_expiration: parsed(vars, "CACHE_USE_EXPIRATION", false)?,
            default_expiration_days: parsed(
                vars,
                "CACHE_DEFAULT_EXPIRATION_DAYS",
                DEFAULT_EXPIRATION_DAYS,
            )?,
        })
    }

    /// Expire entries written without an explicit TTL after `days`.
    #[must_use]
    pub fn with_expiration_days(mut self, days: u32) -> Self {
        self.use_expiration = true;
        self.default_expiration_days = days;
        self
    }

    /// TTL applied to writes that carry none.
    #[must_use]
    pub fn default_ttl(&self) -> Option<Duration> {
        self.use_expiration
            .then(|| Duration::from_secs(u64::from(self.default_expiration_days) * 86_400))
    }
}
