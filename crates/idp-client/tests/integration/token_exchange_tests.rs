//! Token endpoint exchange against a mock authorization server.

use chrono::Utc;
use common::secret::ExposeSecret;
use idp_client::bootstrap::IdpComponents;
use idp_client::crypto::SigningAlgorithm;
use idp_client::errors::IdpError;
use idp_client::token_client::TokenExchangeClient;
use idp_test_utils::{
    cached_vault, certificate_backend, form_field, test_cache, test_certificate,
    test_client_settings, AssertionChecks, TestTokenServer, PRIMARY_KEY_PKCS8_B64,
    TEST_CERTIFICATE_NAME, TEST_CLIENT_ID,
};
use std::collections::{HashMap, HashSet};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_successful_exchange() -> Result<(), anyhow::Error> {
    let server = TestTokenServer::start().await;
    server.mount_token("abc123", 3600).await;

    let vault = cached_vault(certificate_backend(), test_cache());
    let client = TokenExchangeClient::with_vault(test_client_settings(&server.uri()), vault)?;

    let token = client.exchange_client_assertion().await?;

    assert_eq!(token.access_token().expose_secret(), "abc123");
    assert_eq!(token.token_type(), "Bearer");
    let drift = token.expires_at() - (Utc::now() + chrono::Duration::seconds(3600));
    assert!(drift.num_milliseconds().abs() <= 1000, "drift {drift}");
    Ok(())
}

#[tokio::test]
async fn test_rejected_exchange_surfaces_status_and_body() -> Result<(), anyhow::Error> {
    let server = TestTokenServer::start().await;
    server.mount_error(400, r#"{"error":"invalid_client"}"#).await;

    let vault = cached_vault(certificate_backend(), test_cache());
    let client = TokenExchangeClient::with_vault(test_client_settings(&server.uri()), vault)?;

    match client.exchange_client_assertion().await {
        Err(IdpError::RemoteStatus { status, body }) => {
            assert_eq!(status, 400);
            assert_eq!(body, r#"{"error":"invalid_client"}"#);
        }
        other => panic!("expected RemoteStatus, got {other:?}"),
    }
    assert_eq!(server.posted_forms().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_posted_form_and_assertion() -> Result<(), anyhow::Error> {
    let server = TestTokenServer::start().await;
    server.mount_token("abc123", 3600).await;

    let settings = test_client_settings(&server.uri()).with_scope("api.read api.write");
    let client = TokenExchangeClient::with_vault(settings, cached_vault(certificate_backend(), test_cache()))?;
    client.exchange_client_assertion().await?;

    let forms = server.posted_forms().await;
    let form = forms.first().expect("one request");
    assert_eq!(form_field(form, "grant_type").as_deref(), Some("client_credentials"));
    assert_eq!(form_field(form, "client_id").as_deref(), Some(TEST_CLIENT_ID));
    assert_eq!(
        form_field(form, "client_assertion_type").as_deref(),
        Some("urn:ietf:params:oauth:client-assertion-type:jwt-bearer")
    );
    assert_eq!(form_field(form, "scope").as_deref(), Some("api.read api.write"));

    let assertion = form_field(form, "client_assertion").expect("assertion posted");
    assertion
        .assert_client(TEST_CLIENT_ID)
        .assert_audience(&server.token_endpoint())
        .assert_signed_by(&test_certificate(), SigningAlgorithm::Rs512);
    Ok(())
}

#[tokio::test]
async fn test_one_request_per_exchange_with_distinct_assertions() -> Result<(), anyhow::Error> {
    let server = TestTokenServer::start().await;
    server.mount_token("abc123", 3600).await;

    let backend = certificate_backend();
    let client = TokenExchangeClient::with_vault(
        test_client_settings(&server.uri()),
        cached_vault(backend.clone(), test_cache()),
    )?;
    for _ in 0..3 {
        client.exchange_client_assertion().await?;
    }

    let assertions = server.posted_assertions().await;
    assert_eq!(assertions.len(), 3);
    let ids: HashSet<String> = assertions.iter().map(|a| a.claims().jti).collect();
    assert_eq!(ids.len(), 3);
    assert_eq!(backend.fetch_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_server_error_is_not_retried() -> Result<(), anyhow::Error> {
    let server = TestTokenServer::start().await;
    server.mount_error(503, "unavailable").await;

    let client = TokenExchangeClient::with_vault(
        test_client_settings(&server.uri()),
        cached_vault(certificate_backend(), test_cache()),
    )?;
    let err = client.exchange_client_assertion().await.unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert_eq!(server.posted_forms().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_delete_cached_certificate_forces_refetch() -> Result<(), anyhow::Error> {
    let server = TestTokenServer::start().await;
    server.mount_token("abc123", 3600).await;

    let backend = certificate_backend();
    let cache = test_cache();
    let client = TokenExchangeClient::with_vault(
        test_client_settings(&server.uri()),
        cached_vault(backend.clone(), cache.clone()),
    )?;

    client.exchange_client_assertion().await?;
    assert!(client.delete_cached_certificate().await?);
    assert!(cache.is_empty());
    client.exchange_client_assertion().await?;

    assert_eq!(backend.fetch_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_composed_from_environment_against_key_vault() -> Result<(), anyhow::Error> {
    let server = TestTokenServer::start().await;
    server.mount_token("abc123", 3600).await;
    let mock = server.inner();

    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "aad-token",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(mock)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/secrets/{TEST_CERTIFICATE_NAME}")))
        .and(header("authorization", "Bearer aad-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": PRIMARY_KEY_PKCS8_B64
        })))
        .expect(1)
        .mount(mock)
        .await;

    let vars: HashMap<String, String> = [
        ("IDP_AUTHORIZATION_SERVER", server.uri()),
        ("IDP_CLIENT_ID", TEST_CLIENT_ID.to_string()),
        ("IDP_KEY_VAULT_CERTIFICATE_NAME", TEST_CERTIFICATE_NAME.to_string()),
        ("IDP_KEY_VAULT_SETTINGS_NAME", "primary".to_string()),
        ("KEY_VAULT_NAME", "primary".to_string()),
        ("KEY_VAULT_URI", server.uri()),
        ("KEY_VAULT_AUTHORITY_HOST", server.uri()),
        ("KEY_VAULT_TENANT_ID", "tenant-1".to_string()),
        ("KEY_VAULT_CLIENT_ID", "vault-reader".to_string()),
        ("KEY_VAULT_CLIENT_SECRET", "vault-secret".to_string()),
        ("KEY_VAULT_USE_CACHE", "true".to_string()),
        ("KEY_VAULT_CACHE_SETTINGS_NAME", "certs".to_string()),
        ("CACHE_NAME", "certs".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    let components = IdpComponents::from_vars(&vars)?;
    for _ in 0..2 {
        let token = components.client.exchange_client_assertion().await?;
        assert_eq!(token.authorization_header(), "Bearer abc123");
    }
    Ok(())
}
