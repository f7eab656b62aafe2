//! OAuth 2.0 client-credentials exchange with a JWT-bearer client assertion.
//!
//! Each call to [`TokenExchangeClient::exchange_client_assertion`] builds a
//! fresh assertion (new `jti`) and makes exactly one POST to the token
//! endpoint. There is no retry and no token caching at this layer; callers
//! decide when a token is stale via [`AuthorizationToken::is_expired`].
//!
//! # Security
//!
//! - Access tokens are stored as `SecretString` and redacted in Debug output
//! - Assertions are never logged
//! - The client identifier is logged as a correlation hash only

use crate::assertion::AssertionBuilder;
use crate::config::ClientSettings;
use crate::errors::{require_non_empty, IdpError};
use crate::oauth::ExpiresIn;
use crate::observability::metrics::record_token_exchange;
use crate::observability::{hash_for_correlation, ErrorCategory};
use crate::registry::VaultRegistry;
use crate::vault::KeyVault;
use chrono::{DateTime, Utc};
use common::secret::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, trace, warn};

/// Default connection timeout for the HTTP client.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Token
// =============================================================================

/// Access token issued by the authorization server.
#[derive(Clone)]
pub struct AuthorizationToken {
    access_token: SecretString,
    token_type: String,
    expires_at: DateTime<Utc>,
}

impl fmt::Debug for AuthorizationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationToken")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AuthorizationToken {
    #[must_use]
    pub fn new(
        access_token: SecretString,
        token_type: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token,
            token_type: token_type.into(),
            expires_at,
        }
    }

    #[must_use]
    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    #[must_use]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Completion time of the exchange plus `expires_in`.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// `Authorization` header value, e.g. `Bearer abc123`.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token.expose_secret())
    }
}

/// Token endpoint success body.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: ExpiresIn,
    token_type: String,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

// =============================================================================
// Client
// =============================================================================

/// Exchanges signed client assertions for access tokens.
pub struct TokenExchangeClient {
    settings: ClientSettings,
    token_endpoint: String,
    assertions: AssertionBuilder,
    vault: Arc<dyn KeyVault>,
    http: reqwest::Client,
}

impl fmt::Debug for TokenExchangeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenExchangeClient")
            .field("token_endpoint", &self.token_endpoint)
            .field("assertions", &self.assertions)
            .finish_non_exhaustive()
    }
}

impl TokenExchangeClient {
    /// Create a client, resolving its key vault by
    /// `settings.key_vault_settings_name`.
    ///
    /// # Errors
    ///
    /// - `IdpError::Validation` - a required setting is empty
    /// - `IdpError::Configuration` - the key vault is not registered or the
    ///   HTTP client cannot be built
    pub fn new(settings: ClientSettings, vaults: &VaultRegistry) -> Result<Self, IdpError> {
        require_non_empty("key vault settings name", &settings.key_vault_settings_name)?;
        let vault = vaults.get(&settings.key_vault_settings_name)?;
        Self::with_vault(settings, vault)
    }

    /// Create a client over an explicit key vault.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new), minus vault resolution.
    pub fn with_vault(settings: ClientSettings, vault: Arc<dyn KeyVault>) -> Result<Self, IdpError> {
        require_non_empty("client assertion type", &settings.client_assertion_type)?;
        let assertions = AssertionBuilder::new(&settings, Arc::clone(&vault))?;

        let http = reqwest::Client::builder()
            .timeout(settings.http_timeout())
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| IdpError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            token_endpoint: settings.token_endpoint(),
            settings,
            assertions,
            vault,
            http,
        })
    }

    /// Full URL the exchange is posted to.
    #[must_use]
    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    #[must_use]
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    #[must_use]
    pub fn assertion_builder(&self) -> &AssertionBuilder {
        &self.assertions
    }

    /// Sign a fresh assertion and exchange it for an access token.
    ///
    /// # Errors
    ///
    /// - Any error from building the assertion
    /// - `IdpError::Remote` - the request could not be sent or read
    /// - `IdpError::RemoteStatus` - non-2xx response (status and body verbatim)
    /// - `IdpError::InvalidResponse` - 2xx body is not a token response
    #[instrument(skip_all)]
    pub async fn exchange_client_assertion(&self) -> Result<AuthorizationToken, IdpError> {
        let start = Instant::now();
        let result = self.exchange().await;

        match &result {
            Ok(token) => {
                record_token_exchange("success", None, start.elapsed());
                info!(
                    target: "idp.token_client",
                    client = %hash_for_correlation(&self.settings.client_id),
                    expires_at = %token.expires_at,
                    "Access token acquired"
                );
            }
            Err(e) => {
                let category = ErrorCategory::from(e);
                record_token_exchange("error", Some(category.as_str()), start.elapsed());
                warn!(
                    target: "idp.token_client",
                    client = %hash_for_correlation(&self.settings.client_id),
                    error_category = category.as_str(),
                    status = ?e.status(),
                    "Token exchange failed"
                );
            }
        }

        result
    }

    async fn exchange(&self) -> Result<AuthorizationToken, IdpError> {
        let assertion = self.assertions.build_signed_assertion().await?;

        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.settings.client_id.as_str()),
            (
                "client_assertion_type",
                self.settings.client_assertion_type.as_str(),
            ),
            ("client_assertion", assertion.as_str()),
        ];
        if let Some(scope) = self.settings.scope.as_deref() {
            form.push(("scope", scope));
        }

        debug!(
            target: "idp.token_client",
            url = %self.token_endpoint,
            "Posting client assertion to token endpoint"
        );

        let response = self
            .http
            .post(&self.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                debug!(target: "idp.token_client", error = %e, "HTTP request failed");
                IdpError::Remote(format!("Token request failed: {e}"))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| IdpError::Remote(format!("Failed to read token response: {e}")))?;

        if !status.is_success() {
            trace!(target: "idp.token_client", body = %body, "Token endpoint error body");
            return Err(IdpError::RemoteStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            warn!(target: "idp.token_client", error = %e, "Failed to parse token response");
            IdpError::InvalidResponse(e.to_string())
        })?;

        let expires_in = parsed.expires_in.seconds()?;
        let expires_at = i64::try_from(expires_in)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                IdpError::InvalidResponse(format!("expires_in out of range: {expires_in}"))
            })?;

        Ok(AuthorizationToken {
            access_token: SecretString::from(parsed.access_token),
            token_type: parsed.token_type,
            expires_at,
        })
    }

    /// Evict the configured signing certificate from the key vault's cache.
    ///
    /// The trust store is not touched. A vault without a cache has nothing to
    /// evict and reports success.
    ///
    /// # Errors
    ///
    /// `IdpError::Validation` when the certificate name is empty, or any
    /// error from the cache.
    #[instrument(skip_all)]
    pub async fn delete_cached_certificate(&self) -> Result<bool, IdpError> {
        let name = &self.settings.key_vault_certificate_name;
        require_non_empty("certificate name", name)?;
        let deleted = self.vault.delete_cache_entry(name).await?;
        debug!(target: "idp.token_client", deleted = deleted, "Cached signing certificate evicted");
        Ok(deleted)
    }
}
