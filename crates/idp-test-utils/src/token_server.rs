//! Mock authorization server for token exchange tests.
//!
//! Wraps a `wiremock::MockServer` with helpers for the token endpoint and
//! for inspecting the form bodies the client posted.

use crate::assertions::form_field;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Token endpoint path used by the harness.
pub const TEST_TOKEN_PATH: &str = "/connect/token";

/// Mock authorization server.
///
/// # Example
/// ```rust,ignore
/// let server = TestTokenServer::start().await;
/// server.mount_token("abc123", 3600).await;
///
/// let settings = test_client_settings(&server.uri());
/// let client = TokenExchangeClient::with_vault(settings, vault)?;
/// let token = client.exchange_client_assertion().await?;
///
/// assert_eq!(server.posted_assertions().await.len(), 1);
/// ```
pub struct TestTokenServer {
    server: MockServer,
}

impl TestTokenServer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL (the authorization server setting).
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Full token endpoint URL.
    pub fn token_endpoint(&self) -> String {
        format!("{}{TEST_TOKEN_PATH}", self.server.uri())
    }

    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    /// Answer every exchange with a Bearer token.
    pub async fn mount_token(&self, access_token: &str, expires_in: u64) {
        self.mount_response(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "expires_in": expires_in,
            "token_type": "Bearer"
        })))
        .await;
    }

    /// Answer every exchange with `status` and a raw body.
    pub async fn mount_error(&self, status: u16, body: &str) {
        self.mount_response(ResponseTemplate::new(status).set_body_string(body))
            .await;
    }

    pub async fn mount_response(&self, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(TEST_TOKEN_PATH))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Form bodies of all requests received so far.
    pub async fn posted_forms(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|request| String::from_utf8_lossy(&request.body).into_owned())
            .collect()
    }

    /// `client_assertion` values of all requests received so far.
    pub async fn posted_assertions(&self) -> Vec<String> {
        self.posted_forms()
            .await
            .iter()
            .filter_map(|form| form_field(form, "client_assertion"))
            .collect()
    }
}
