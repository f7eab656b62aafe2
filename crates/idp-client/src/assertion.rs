//! RFC 7523 client assertion builder.
//!
//! An assertion is a compact JWT whose header carries only `alg` and whose
//! claims identify the client (`iss == sub == client_id`) to the token
//! endpoint (`aud`). Every build draws a fresh `jti` and `iat`.
//!
//! The signing certificate is resolved by name through a [`KeyVault`] on each
//! build, so rotation in the trust store (or eviction from its cache) takes
//! effect without rebuilding the client. Every signature is verified against
//! the certificate's public key before the assertion is returned.

use crate::config::ClientSettings;
use crate::crypto::{Certificate, SigningAlgorithm};
use crate::errors::{require_non_empty, IdpError};
use crate::observability::hash_for_correlation;
use crate::observability::metrics::record_assertion_signed;
use crate::vault::KeyVault;
use chrono::Utc;
use common::jwt::{encode_segment, join_compact, ClientAssertionClaims, JwtHeader};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Builds signed client assertions for one client.
pub struct AssertionBuilder {
    client_id: String,
    audience: String,
    certificate_name: String,
    algorithm: SigningAlgorithm,
    lifetime_secs: i64,
    vault: Arc<dyn KeyVault>,
}

impl fmt::Debug for AssertionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssertionBuilder")
            .field("client_id", &"[REDACTED]")
            .field("audience", &self.audience)
            .field("certificate_name", &self.certificate_name)
            .field("algorithm", &self.algorithm)
            .field("lifetime_secs", &self.lifetime_secs)
            .field("vault", &self.vault.name())
            .finish()
    }
}

impl AssertionBuilder {
    /// Create a builder from client settings and the vault holding the
    /// signing certificate.
    ///
    /// # Errors
    ///
    /// `IdpError::Validation` when the client id, certificate name or
    /// authorization server is empty, or the lifetime is zero.
    pub fn new(settings: &ClientSettings, vault: Arc<dyn KeyVault>) -> Result<Self, IdpError> {
        require_non_empty("client id", &settings.client_id)?;
        require_non_empty("authorization server", &settings.authorization_server)?;
        require_non_empty("certificate name", &settings.key_vault_certificate_name)?;
        if settings.jwt_expire_in_minutes == 0 {
            return Err(IdpError::Validation(
                "assertion lifetime must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            client_id: settings.client_id.clone(),
            audience: settings.effective_audience(),
            certificate_name: settings.key_vault_certificate_name.clone(),
            algorithm: settings.jwt_signing_algo,
            lifetime_secs: i64::from(settings.jwt_expire_in_minutes) * 60,
            vault,
        })
    }

    #[must_use]
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    #[must_use]
    pub fn certificate_name(&self) -> &str {
        &self.certificate_name
    }

    /// Build, sign and self-verify an assertion.
    ///
    /// # Errors
    ///
    /// - Any error from resolving the certificate
    /// - `IdpError::Signing` - signing or self-verification failed
    #[instrument(skip_all)]
    pub async fn build_signed_assertion(&self) -> Result<String, IdpError> {
        let certificate = self
            .vault
            .obtain_certificate_async(&self.certificate_name)
            .await?;
        self.sign_with_certificate(&certificate)
    }

    /// Blocking [`build_signed_assertion`](Self::build_signed_assertion).
    ///
    /// Must not be called from within an asynchronous execution context.
    ///
    /// # Errors
    ///
    /// Same as [`build_signed_assertion`](Self::build_signed_assertion).
    #[instrument(skip_all)]
    pub fn build_signed_assertion_blocking(&self) -> Result<String, IdpError> {
        let certificate = self.vault.obtain_certificate(&self.certificate_name)?;
        self.sign_with_certificate(&certificate)
    }

    /// Build and sign an assertion with an already resolved certificate.
    ///
    /// # Errors
    ///
    /// `IdpError::Signing` when signing fails or the signature does not verify
    /// against the certificate's public key.
    pub fn sign_with_certificate(&self, certificate: &Certificate) -> Result<String, IdpError> {
        let result = self.sign(certificate);
        match &result {
            Ok(_) => {
                record_assertion_signed("success");
                debug!(
                    target: "idp.assertion",
                    client = %hash_for_correlation(&self.client_id),
                    alg = %self.algorithm,
                    "Client assertion signed"
                );
            }
            Err(e) => {
                record_assertion_signed("error");
                warn!(
                    target: "idp.assertion",
                    client = %hash_for_correlation(&self.client_id),
                    alg = %self.algorithm,
                    error = %e,
                    "Client assertion signing failed"
                );
            }
        }
        result
    }

    fn claims(&self) -> ClientAssertionClaims {
        ClientAssertionClaims::new(
            &self.client_id,
            &self.audience,
            Uuid::new_v4().to_string(),
            Utc::now().timestamp(),
            self.lifetime_secs,
        )
    }

    fn sign(&self, certificate: &Certificate) -> Result<String, IdpError> {
        let header = encode_segment(&JwtHeader::new(self.algorithm.as_str()))?;
        let claims = encode_segment(&self.claims())?;
        let signing_input = format!("{header}.{claims}");

        let signature = certificate.sign(self.algorithm, signing_input.as_bytes())?;
        certificate
            .verify(self.algorithm, signing_input.as_bytes(), &signature)
            .map_err(|_| {
                IdpError::Signing(
                    "Assertion signature did not verify against the certificate public key"
                        .to_string(),
                )
            })?;

        Ok(join_compact(&signing_input, &signature))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::vault::{CachedKeyVault, MemorySecretBackend};
    use common::jwt::{decode_segment, decode_signature, split_compact};
    use idp_test_utils::crypto_fixtures::{PRIMARY_KEY_PKCS8_B64, SECONDARY_KEY_PKCS1_B64};
    use metrics_util::debugging::DebuggingRecorder;

    const CERT_NAME: &str = "signing-cert";

    fn settings() -> ClientSettings {
        ClientSettings::new("https://idp.example.com", "client-123", CERT_NAME, "primary")
    }

    fn vault() -> Arc<dyn KeyVault> {
        let backend =
            Arc::new(MemorySecretBackend::new().with_secret(CERT_NAME, PRIMARY_KEY_PKCS8_B64));
        Arc::new(CachedKeyVault::uncached("primary", backend))
    }

    fn decode_claims(token: &str) -> ClientAssertionClaims {
        let parts = split_compact(token).unwrap();
        decode_segment(parts.claims).unwrap()
    }

    #[test]
    fn test_new_validates_settings() {
        let empty_client = ClientSettings::new("https://idp.example.com", "", CERT_NAME, "primary");
        assert!(matches!(
            AssertionBuilder::new(&empty_client, vault()),
            Err(IdpError::Validation(_))
        ));

        let empty_cert = ClientSettings::new("https://idp.example.com", "client-123", " ", "primary");
        assert!(matches!(
            AssertionBuilder::new(&empty_cert, vault()),
            Err(IdpError::Validation(_))
        ));

        let zero_lifetime = settings().with_jwt_expire_in_minutes(0);
        assert!(matches!(
            AssertionBuilder::new(&zero_lifetime, vault()),
            Err(IdpError::Validation(_))
        ));
    }

    #[test]
    fn test_audience_defaults_to_token_endpoint() {
        let builder = AssertionBuilder::new(&settings(), vault()).unwrap();
        assert_eq!(builder.audience(), "https://idp.example.com/connect/token");

        let builder =
            AssertionBuilder::new(&settings().with_audience("https://aud.example.com"), vault())
                .unwrap();
        assert_eq!(builder.audience(), "https://aud.example.com");
    }

    #[tokio::test]
    async fn test_assertion_header_and_claims() {
        let builder = AssertionBuilder::new(&settings().with_jwt_expire_in_minutes(10), vault())
            .unwrap();
        let before = Utc::now().timestamp();
        let token = builder.build_signed_assertion().await.unwrap();
        let after = Utc::now().timestamp();

        let parts = split_compact(&token).unwrap();
        let header: serde_json::Value = decode_segment(parts.header).unwrap();
        assert_eq!(header, serde_json::json!({ "alg": "RS512" }));

        let claims = decode_claims(&token);
        assert_eq!(claims.iss, "client-123");
        assert_eq!(claims.sub, "client-123");
        assert_eq!(claims.aud, "https://idp.example.com/connect/token");
        assert_eq!(claims.exp - claims.iat, 600);
        assert!(claims.iat >= before && claims.iat <= after);
        assert!(Uuid::parse_str(&claims.jti).is_ok());
    }

    #[tokio::test]
    async fn test_sequential_assertions_have_distinct_jti() {
        let builder = AssertionBuilder::new(&settings(), vault()).unwrap();
        let first = decode_claims(&builder.build_signed_assertion().await.unwrap());
        let second = decode_claims(&builder.build_signed_assertion().await.unwrap());
        assert_ne!(first.jti, second.jti);
    }

    #[tokio::test]
    async fn test_signature_verifies_for_each_algorithm() {
        let certificate = Certificate::from_base64(PRIMARY_KEY_PKCS8_B64).unwrap();
        for algorithm in [
            SigningAlgorithm::Rs256,
            SigningAlgorithm::Rs384,
            SigningAlgorithm::Rs512,
        ] {
            let builder =
                AssertionBuilder::new(&settings().with_signing_algorithm(algorithm), vault())
                    .unwrap();
            let token = builder.build_signed_assertion().await.unwrap();
            let parts = split_compact(&token).unwrap();
            let signature = decode_signature(parts.signature).unwrap();

            let header: JwtHeader = decode_segment(parts.header).unwrap();
            assert_eq!(header.alg, algorithm.as_str());
            certificate
                .verify(algorithm, parts.signing_input().as_bytes(), &signature)
                .unwrap();
        }
    }

    #[test]
    fn test_blocking_build() {
        let builder = AssertionBuilder::new(&settings(), vault()).unwrap();
        let token = builder.build_signed_assertion_blocking().unwrap();
        assert_eq!(decode_claims(&token).iss, "client-123");
    }

    #[test]
    fn test_mismatched_public_key_is_signing_error() {
        let secondary = Certificate::from_base64(SECONDARY_KEY_PKCS1_B64).unwrap();
        let mismatched = Certificate::from_base64(PRIMARY_KEY_PKCS8_B64)
            .unwrap()
            .with_public_key_der(secondary.public_key_der().to_vec());

        let builder = AssertionBuilder::new(&settings(), vault()).unwrap();
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let result = metrics::with_local_recorder(&recorder, || {
            builder.sign_with_certificate(&mismatched)
        });

        assert!(matches!(result, Err(IdpError::Signing(_))));
        let snapshot = snapshotter.snapshot().into_vec();
        assert!(snapshot.iter().any(|(key, _, _, _)| {
            key.key().name() == "idp_assertions_signed_total"
                && key.key().labels().any(|l| l.key() == "status" && l.value() == "error")
        }));
    }

    #[tokio::test]
    async fn test_missing_certificate_propagates() {
        let backend = Arc::new(MemorySecretBackend::new());
        let vault: Arc<dyn KeyVault> = Arc::new(CachedKeyVault::uncached("primary", backend));
        let builder = AssertionBuilder::new(&settings(), vault).unwrap();
        assert!(matches!(
            builder.build_signed_assertion().await,
            Err(IdpError::Remote(_))
        ));
    }

    #[test]
    fn test_debug_redacts_client_id() {
        let builder = AssertionBuilder::new(&settings(), vault()).unwrap();
        let debug_str = format!("{builder:?}");
        assert!(!debug_str.contains("client-123"));
        assert!(debug_str.contains(CERT_NAME));
    }
}
