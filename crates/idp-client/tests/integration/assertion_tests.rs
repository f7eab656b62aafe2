//! Client assertion construction, signing and self-verification.

use async_trait::async_trait;
use common::secret::SecretString;
use idp_client::assertion::AssertionBuilder;
use idp_client::crypto::{Certificate, SigningAlgorithm};
use idp_client::errors::IdpError;
use idp_client::vault::KeyVault;
use idp_test_utils::{
    certificate_backend, cached_vault, mismatched_certificate, secondary_certificate,
    test_cache, test_certificate, test_client_settings, AssertionChecks, SECONDARY_KEY_PKCS1_B64,
    TEST_CERTIFICATE_NAME, TEST_CLIENT_ID,
};
use std::collections::HashSet;
use std::sync::Arc;

const AUTHORIZATION_SERVER: &str = "https://idp.example.com";

/// Key vault that always hands out one fixed certificate.
struct FixedCertificateVault {
    certificate: Certificate,
}

#[async_trait]
impl KeyVault for FixedCertificateVault {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn get_secret(&self, name: &str) -> Result<SecretString, IdpError> {
        Err(IdpError::Remote(format!("no secret {name}")))
    }

    async fn set_secret(&self, _name: &str, _value: &str) -> Result<bool, IdpError> {
        Ok(false)
    }

    fn obtain_certificate(&self, _name: &str) -> Result<Certificate, IdpError> {
        Ok(self.certificate.clone())
    }

    async fn obtain_certificate_async(&self, _name: &str) -> Result<Certificate, IdpError> {
        Ok(self.certificate.clone())
    }

    async fn list_secrets(&self) -> Result<Vec<String>, IdpError> {
        Ok(Vec::new())
    }

    async fn delete_cache_entry(&self, _name: &str) -> Result<bool, IdpError> {
        Ok(true)
    }
}

#[tokio::test]
async fn test_assertion_properties() -> Result<(), anyhow::Error> {
    let settings = test_client_settings(AUTHORIZATION_SERVER)
        .with_signing_algorithm(SigningAlgorithm::Rs256)
        .with_jwt_expire_in_minutes(7);
    let builder = AssertionBuilder::new(&settings, cached_vault(certificate_backend(), test_cache()))?;

    let assertion = builder.build_signed_assertion().await?;

    assertion
        .assert_alg(SigningAlgorithm::Rs256)
        .assert_client(TEST_CLIENT_ID)
        .assert_audience("https://idp.example.com/connect/token")
        .assert_lifetime_minutes(7)
        .assert_signed_by(&test_certificate(), SigningAlgorithm::Rs256);
    Ok(())
}

#[tokio::test]
async fn test_default_algorithm_is_rs512() -> Result<(), anyhow::Error> {
    let settings = test_client_settings(AUTHORIZATION_SERVER).with_audience("api://idp");
    let builder = AssertionBuilder::new(&settings, cached_vault(certificate_backend(), test_cache()))?;

    builder
        .build_signed_assertion()
        .await?
        .assert_alg(SigningAlgorithm::Rs512)
        .assert_audience("api://idp")
        .assert_lifetime_minutes(5)
        .assert_signed_by(&test_certificate(), SigningAlgorithm::Rs512);
    Ok(())
}

#[tokio::test]
async fn test_every_assertion_has_a_fresh_jti() -> Result<(), anyhow::Error> {
    let settings = test_client_settings(AUTHORIZATION_SERVER);
    let builder = AssertionBuilder::new(&settings, cached_vault(certificate_backend(), test_cache()))?;

    let mut ids = HashSet::new();
    for _ in 0..5 {
        ids.insert(builder.build_signed_assertion().await?.claims().jti);
    }
    assert_eq!(ids.len(), 5);
    Ok(())
}

#[tokio::test]
async fn test_self_verification_failure_is_signing_error() -> Result<(), anyhow::Error> {
    let vault = Arc::new(FixedCertificateVault {
        certificate: mismatched_certificate(),
    });
    let builder = AssertionBuilder::new(&test_client_settings(AUTHORIZATION_SERVER), vault)?;

    let result = builder.build_signed_assertion().await;
    assert!(matches!(result, Err(IdpError::Signing(_))));
    Ok(())
}

#[tokio::test]
async fn test_rotated_certificate_is_used_after_write() -> Result<(), anyhow::Error> {
    let vault = cached_vault(certificate_backend(), test_cache());
    let builder = AssertionBuilder::new(&test_client_settings(AUTHORIZATION_SERVER), vault.clone())?;

    builder
        .build_signed_assertion()
        .await?
        .assert_signed_by(&test_certificate(), SigningAlgorithm::Rs512);

    vault
        .set_secret(TEST_CERTIFICATE_NAME, SECONDARY_KEY_PKCS1_B64)
        .await?;

    builder
        .build_signed_assertion()
        .await?
        .assert_signed_by(&secondary_certificate(), SigningAlgorithm::Rs512);
    Ok(())
}

#[tokio::test]
async fn test_corrupt_certificate_payload_is_configuration_error() -> Result<(), anyhow::Error> {
    let backend = certificate_backend();
    let vault = cached_vault(backend.clone(), test_cache());
    vault.set_secret(TEST_CERTIFICATE_NAME, "not base64!").await?;

    let builder = AssertionBuilder::new(&test_client_settings(AUTHORIZATION_SERVER), vault)?;
    assert!(matches!(
        builder.build_signed_assertion().await,
        Err(IdpError::Configuration(_))
    ));
    Ok(())
}
