//! Azure Key Vault [`SecretBackend`] over the Key Vault REST API.
//!
//! Requests are authorized with an Azure AD access token obtained either
//! through the client-credentials grant (client secret) or from the managed
//! identity endpoint of the host. That token is memoized in a
//! [`SingleFlightStore`] until shortly before it expires, so concurrent
//! requests share one token acquisition. A token the vault rejects with 401
//! is discarded so the next request acquires a new one.
//!
//! Async calls use `reqwest::Client`; blocking calls use a lazily built
//! `reqwest::blocking::Client`. Neither path blocks on the other.

use super::SecretBackend;
use crate::cache::SingleFlightStore;
use crate::config::KeyVaultSettings;
use crate::errors::{require_non_empty, IdpError};
use crate::oauth::ExpiresIn;
use crate::observability::metrics::record_vault_request;
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Key Vault REST API version.
pub const KEY_VAULT_API_VERSION: &str = "7.4";

/// Azure AD scope for Key Vault data-plane access.
pub const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";

/// Resource requested from the managed identity endpoint.
pub const KEY_VAULT_RESOURCE: &str = "https://vault.azure.net";

/// Managed identity endpoint API version.
pub const IMDS_API_VERSION: &str = "2018-02-01";

/// Access tokens are refreshed this long before they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Default connection timeout for HTTP clients.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on `nextLink` pages followed by one listing.
const MAX_LIST_PAGES: usize = 1000;

const ACCESS_TOKEN_KEY: &str = "key-vault";

// =============================================================================
// Wire types
// =============================================================================

/// Token body returned by both Azure AD and the managed identity endpoint.
#[derive(Deserialize)]
struct AadTokenResponse {
    access_token: String,
    expires_in: ExpiresIn,
}

impl fmt::Debug for AadTokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AadTokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Deserialize)]
struct SecretBundle {
    value: String,
}

#[derive(Debug, Deserialize)]
struct SecretListPage {
    #[serde(default)]
    value: Vec<SecretItem>,
    #[serde(rename = "nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SecretItem {
    id: String,
}

// =============================================================================
// Credentials
// =============================================================================

/// How the Key Vault access token is obtained.
enum Credential {
    ClientSecret {
        token_url: String,
        client_id: String,
        client_secret: SecretString,
    },
    ManagedIdentity {
        endpoint: String,
        /// User-assigned identity; `None` selects the system-assigned one.
        client_id: Option<String>,
    },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::ClientSecret {
                token_url,
                client_id,
                ..
            } => f
                .debug_struct("ClientSecret")
                .field("token_url", token_url)
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .finish(),
            Credential::ManagedIdentity {
                endpoint,
                client_id,
            } => f
                .debug_struct("ManagedIdentity")
                .field("endpoint", endpoint)
                .field("client_id", client_id)
                .finish(),
        }
    }
}

impl Credential {
    fn from_settings(settings: &KeyVaultSettings) -> Result<Self, IdpError> {
        if settings.use_managed_identity {
            require_http_url("managed identity endpoint", &settings.imds_endpoint)?;
            let client_id = Some(settings.client_id.trim())
                .filter(|id| !id.is_empty())
                .map(str::to_string);
            return Ok(Credential::ManagedIdentity {
                endpoint: settings.imds_endpoint.clone(),
                client_id,
            });
        }

        require_non_empty("key vault tenant id", &settings.tenant_id)?;
        require_non_empty("key vault client id", &settings.client_id)?;
        require_non_empty("key vault client secret", settings.client_secret.expose_secret())?;
        Ok(Credential::ClientSecret {
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                settings.authority_host.trim_end_matches('/'),
                settings.tenant_id
            ),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
        })
    }

    fn kind(&self) -> &'static str {
        match self {
            Credential::ClientSecret { .. } => "client_secret",
            Credential::ManagedIdentity { .. } => "managed_identity",
        }
    }

    fn request(&self, http: &reqwest::Client) -> reqwest::RequestBuilder {
        match self {
            Credential::ClientSecret {
                token_url,
                client_id,
                client_secret,
            } => http
                .post(token_url)
                .form(&client_secret_form(client_id, client_secret)),
            Credential::ManagedIdentity {
                endpoint,
                client_id,
            } => http
                .get(endpoint)
                .header("Metadata", "true")
                .query(&managed_identity_query(client_id.as_deref())),
        }
    }

    fn request_blocking(
        &self,
        http: &reqwest::blocking::Client,
    ) -> reqwest::blocking::RequestBuilder {
        match self {
            Credential::ClientSecret {
                token_url,
                client_id,
                client_secret,
            } => http
                .post(token_url)
                .form(&client_secret_form(client_id, client_secret)),
            Credential::ManagedIdentity {
                endpoint,
                client_id,
            } => http
                .get(endpoint)
                .header("Metadata", "true")
                .query(&managed_identity_query(client_id.as_deref())),
        }
    }
}

fn client_secret_form<'a>(
    client_id: &'a str,
    client_secret: &'a SecretString,
) -> [(&'static str, &'a str); 4] {
    [
        ("grant_type", "client_credentials"),
        ("client_id", client_id),
        ("client_secret", client_secret.expose_secret()),
        ("scope", KEY_VAULT_SCOPE),
    ]
}

fn managed_identity_query(client_id: Option<&str>) -> Vec<(&'static str, &str)> {
    let mut query = vec![
        ("api-version", IMDS_API_VERSION),
        ("resource", KEY_VAULT_RESOURCE),
    ];
    if let Some(client_id) = client_id {
        query.push(("client_id", client_id));
    }
    query
}

fn require_http_url(field: &str, url: &str) -> Result<(), IdpError> {
    require_non_empty(field, url)?;
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(IdpError::Configuration(format!(
            "{field} must be an HTTP(S) URL: {url}"
        )))
    }
}

// =============================================================================
// Backend
// =============================================================================

pub struct AzureSecretBackend {
    vault_uri: String,
    credential: Credential,
    timeout: Duration,
    http: reqwest::Client,
    blocking_http: Mutex<Option<reqwest::blocking::Client>>,
    tokens: SingleFlightStore<&'static str, SecretString>,
}

impl fmt::Debug for AzureSecretBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureSecretBackend")
            .field("vault_uri", &self.vault_uri)
            .field("credential", &self.credential)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl AzureSecretBackend {
    /// Build a backend for the vault described by `settings`.
    ///
    /// # Errors
    ///
    /// - `IdpError::Validation` - a required setting is empty
    /// - `IdpError::Configuration` - the vault URI or managed identity
    ///   endpoint is not HTTP(S), or the HTTP client cannot be built
    pub fn new(settings: &KeyVaultSettings, timeout: Duration) -> Result<Self, IdpError> {
        require_http_url("Key vault URI", &settings.uri)?;
        let credential = Credential::from_settings(settings)?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| IdpError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        debug!(
            target: "idp.vault.azure",
            vault_uri = %settings.uri,
            credential = credential.kind(),
            "Key Vault backend configured"
        );

        Ok(Self {
            vault_uri: settings.uri.trim_end_matches('/').to_string(),
            credential,
            timeout,
            http,
            blocking_http: Mutex::new(None),
            tokens: SingleFlightStore::new(),
        })
    }

    fn blocking_client(&self) -> Result<reqwest::blocking::Client, IdpError> {
        let mut slot = self
            .blocking_http
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| IdpError::Configuration(format!("Failed to build HTTP client: {e}")))?;
        *slot = Some(client.clone());
        Ok(client)
    }

    fn secret_url(&self, name: &str) -> Result<String, IdpError> {
        require_non_empty("name", name)?;
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(IdpError::Validation(format!(
                "Key vault secret names may only contain letters, digits and '-': {name}"
            )));
        }
        Ok(format!(
            "{}/secrets/{name}?api-version={KEY_VAULT_API_VERSION}",
            self.vault_uri
        ))
    }

    fn list_url(&self) -> String {
        format!(
            "{}/secrets?api-version={KEY_VAULT_API_VERSION}",
            self.vault_uri
        )
    }

    // -------------------------------------------------------------------------
    // Access token
    // -------------------------------------------------------------------------

    async fn access_token(&self) -> Result<SecretString, IdpError> {
        self.tokens
            .get_or_create_with(ACCESS_TOKEN_KEY, || self.request_access_token())
            .await
    }

    fn access_token_blocking(&self) -> Result<SecretString, IdpError> {
        self.tokens
            .get_or_create_with_blocking(ACCESS_TOKEN_KEY, || self.request_access_token_blocking())
    }

    #[instrument(skip_all)]
    async fn request_access_token(&self) -> Result<(SecretString, Option<Duration>), IdpError> {
        debug!(target: "idp.vault.azure", credential = self.credential.kind(), "Requesting Key Vault access token");
        let start = Instant::now();

        let result = async {
            let response = self
                .credential
                .request(&self.http)
                .send()
                .await
                .map_err(transport_error)?;
            let status = response.status();
            let body = response.text().await.map_err(transport_error)?;
            parse_token(status, body)
        }
        .await;

        record_vault_request("access_token", status_label(&result), start.elapsed());
        result
    }

    fn request_access_token_blocking(&self) -> Result<(SecretString, Option<Duration>), IdpError> {
        debug!(target: "idp.vault.azure", credential = self.credential.kind(), "Requesting Key Vault access token");
        let start = Instant::now();

        let result = self.blocking_client().and_then(|client| {
            let response = self
                .credential
                .request_blocking(&client)
                .send()
                .map_err(transport_error)?;
            let status = response.status();
            let body = response.text().map_err(transport_error)?;
            parse_token(status, body)
        });

        record_vault_request("access_token", status_label(&result), start.elapsed());
        result
    }

    /// Drop the memoized access token if it is still the one the vault
    /// rejected. A token refreshed by another caller in the meantime is kept.
    async fn forget_rejected_token(&self, rejected: &SecretString, err: &IdpError) {
        if err.status() == Some(401) {
            let removed = self
                .tokens
                .remove_if(&ACCESS_TOKEN_KEY, |current| same_token(current, rejected))
                .await;
            warn!(target: "idp.vault.azure", discarded = removed, "Key Vault rejected the access token");
        }
    }

    /// Synchronous [`forget_rejected_token`](Self::forget_rejected_token).
    fn forget_rejected_token_blocking(&self, rejected: &SecretString, err: &IdpError) {
        if err.status() == Some(401) {
            let removed = self
                .tokens
                .remove_if_blocking(&ACCESS_TOKEN_KEY, |current| same_token(current, rejected));
            warn!(target: "idp.vault.azure", discarded = removed, "Key Vault rejected the access token");
        }
    }

    // -------------------------------------------------------------------------
    // Requests
    // -------------------------------------------------------------------------

    async fn get_text(&self, url: &str) -> Result<String, IdpError> {
        let token = self.access_token().await?;
        let result = async {
            let response = self
                .http
                .get(url)
                .bearer_auth(token.expose_secret())
                .send()
                .await
                .map_err(transport_error)?;
            let status = response.status();
            let body = response.text().await.map_err(transport_error)?;
            check_status(status, body)
        }
        .await;

        if let Err(e) = &result {
            self.forget_rejected_token(&token, e).await;
        }
        result
    }

    fn get_text_blocking(&self, url: &str) -> Result<String, IdpError> {
        let token = self.access_token_blocking()?;
        let result = self.blocking_client().and_then(|client| {
            let response = client
                .get(url)
                .bearer_auth(token.expose_secret())
                .send()
                .map_err(transport_error)?;
            let status = response.status();
            let body = response.text().map_err(transport_error)?;
            check_status(status, body)
        });

        if let Err(e) = &result {
            self.forget_rejected_token_blocking(&token, e);
        }
        result
    }
}

fn same_token(current: &SecretString, rejected: &SecretString) -> bool {
    current.expose_secret() == rejected.expose_secret()
}

fn transport_error(err: reqwest::Error) -> IdpError {
    IdpError::Remote(format!("Key vault request failed: {err}"))
}

fn check_status(status: reqwest::StatusCode, body: String) -> Result<String, IdpError> {
    if status.is_success() {
        Ok(body)
    } else {
        warn!(target: "idp.vault.azure", status = %status, "Key vault returned an error status");
        Err(IdpError::RemoteStatus {
            status: status.as_u16(),
            body,
        })
    }
}

fn parse_token(
    status: reqwest::StatusCode,
    body: String,
) -> Result<(SecretString, Option<Duration>), IdpError> {
    let body = check_status(status, body)?;
    let response: AadTokenResponse = serde_json::from_str(&body)
        .map_err(|e| IdpError::InvalidResponse(format!("Invalid access token response: {e}")))?;

    let expires_in = response.expires_in.seconds()?;
    let ttl = Duration::from_secs(expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
    debug!(target: "idp.vault.azure", expires_in_secs = expires_in, "Key Vault access token acquired");
    Ok((SecretString::from(response.access_token), Some(ttl)))
}

fn parse_secret(body: &str) -> Result<SecretString, IdpError> {
    let bundle: SecretBundle = serde_json::from_str(body)
        .map_err(|e| IdpError::InvalidResponse(format!("Invalid secret bundle: {e}")))?;
    Ok(SecretString::from(bundle.value))
}

fn name_from_id(id: &str) -> Option<String> {
    id.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn status_label<T>(result: &Result<T, IdpError>) -> &'static str {
    if result.is_ok() {
        "success"
    } else {
        "error"
    }
}

#[async_trait]
impl SecretBackend for AzureSecretBackend {
    #[instrument(skip_all)]
    async fn get_secret(&self, name: &str) -> Result<SecretString, IdpError> {
        let url = self.secret_url(name)?;
        let body = self.get_text(&url).await?;
        parse_secret(&body)
    }

    #[instrument(skip_all)]
    fn get_secret_blocking(&self, name: &str) -> Result<SecretString, IdpError> {
        let url = self.secret_url(name)?;
        let body = self.get_text_blocking(&url)?;
        parse_secret(&body)
    }

    #[instrument(skip_all)]
    async fn set_secret(&self, name: &str, value: &str) -> Result<(), IdpError> {
        let url = self.secret_url(name)?;
        require_non_empty("value", value)?;
        let token = self.access_token().await?;

        let response = self
            .http
            .put(&url)
            .bearer_auth(token.expose_secret())
            .json(&serde_json::json!({ "value": value }))
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if let Err(e) = check_status(status, body) {
            self.forget_rejected_token(&token, &e).await;
            return Err(e);
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn list_secret_names(&self) -> Result<Vec<String>, IdpError> {
        let mut names = Vec::new();
        let mut next = Some(self.list_url());
        let mut pages = 0;

        while let Some(url) = next {
            pages += 1;
            if pages > MAX_LIST_PAGES {
                return Err(IdpError::InvalidResponse(format!(
                    "Secret listing exceeded {MAX_LIST_PAGES} pages"
                )));
            }

            let body = self.get_text(&url).await?;
            let page: SecretListPage = serde_json::from_str(&body)
                .map_err(|e| IdpError::InvalidResponse(format!("Invalid secret list page: {e}")))?;

            names.extend(page.value.iter().filter_map(|item| name_from_id(&item.id)));
            next = page.next_link.filter(|link| !link.is_empty());
        }

        debug!(target: "idp.vault.azure", count = names.len(), pages = pages, "Listed secrets");
        Ok(names)
    }
}
