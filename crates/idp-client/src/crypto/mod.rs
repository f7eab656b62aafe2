//! RSA key material and PKCS#1 v1.5 signatures for client assertions.
//!
//! A [`Certificate`] is materialized from the base64 payload stored in the
//! trust store. Accepted payloads are DER `PrivateKeyInfo` (PKCS#8) or DER
//! `RSAPrivateKey` (PKCS#1), optionally wrapped in PEM armor. PKCS#12
//! bundles are not supported.

use crate::errors::IdpError;
use base64::{engine::general_purpose, Engine as _};
use ring::rand::SystemRandom;
use ring::signature::{self, RsaEncoding, RsaKeyPair, UnparsedPublicKey, VerificationAlgorithm};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;

// ============================================================================
// Algorithms
// ============================================================================

/// JWS algorithms supported for client assertions (RSASSA-PKCS1-v1_5).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    #[serde(rename = "RS256")]
    Rs256,
    #[serde(rename = "RS384")]
    Rs384,
    #[default]
    #[serde(rename = "RS512")]
    Rs512,
}

impl SigningAlgorithm {
    /// JWS `alg` header value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::Rs256 => "RS256",
            SigningAlgorithm::Rs384 => "RS384",
            SigningAlgorithm::Rs512 => "RS512",
        }
    }

    fn signing_encoding(self) -> &'static dyn RsaEncoding {
        match self {
            SigningAlgorithm::Rs256 => &signature::RSA_PKCS1_SHA256,
            SigningAlgorithm::Rs384 => &signature::RSA_PKCS1_SHA384,
            SigningAlgorithm::Rs512 => &signature::RSA_PKCS1_SHA512,
        }
    }

    fn verification_algorithm(self) -> &'static dyn VerificationAlgorithm {
        match self {
            SigningAlgorithm::Rs256 => &signature::RSA_PKCS1_2048_8192_SHA256,
            SigningAlgorithm::Rs384 => &signature::RSA_PKCS1_2048_8192_SHA384,
            SigningAlgorithm::Rs512 => &signature::RSA_PKCS1_2048_8192_SHA512,
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = IdpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RS256" => Ok(SigningAlgorithm::Rs256),
            "RS384" => Ok(SigningAlgorithm::Rs384),
            "RS512" => Ok(SigningAlgorithm::Rs512),
            other => Err(IdpError::Configuration(format!(
                "Unsupported signing algorithm '{other}', expected RS256, RS384 or RS512"
            ))),
        }
    }
}

// ============================================================================
// Certificate
// ============================================================================

/// RSA signing certificate resolved from the trust store.
///
/// Cloning is cheap; the private key is shared. Key material never appears
/// in Debug output.
#[derive(Clone)]
pub struct Certificate {
    key_pair: Arc<RsaKeyPair>,
    public_key_der: Vec<u8>,
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("key_pair", &"[REDACTED]")
            .field("modulus_bits", &self.modulus_bits())
            .finish()
    }
}

impl Certificate {
    /// Parse a DER private key, trying PKCS#8 first and PKCS#1 second.
    pub fn from_der(der: &[u8]) -> Result<Self, IdpError> {
        let key_pair = match RsaKeyPair::from_pkcs8(der) {
            Ok(key_pair) => key_pair,
            Err(pkcs8_err) => RsaKeyPair::from_der(der).map_err(|pkcs1_err| {
                IdpError::Configuration(format!(
                    "Certificate payload is not an RSA private key (PKCS#8: {pkcs8_err}, PKCS#1: {pkcs1_err})"
                ))
            })?,
        };

        let public_key_der = key_pair.public().as_ref().to_vec();
        Ok(Self {
            key_pair: Arc::new(key_pair),
            public_key_der,
        })
    }

    /// Decode a base64 (optionally PEM-armored) payload and parse it.
    #[instrument(skip_all)]
    pub fn from_base64(payload: &str) -> Result<Self, IdpError> {
        let b64: String = payload
            .lines()
            .filter(|line| !line.starts_with("-----"))
            .flat_map(str::split_whitespace)
            .collect();

        if b64.is_empty() {
            return Err(IdpError::Configuration(
                "Certificate payload is empty".to_string(),
            ));
        }

        let der = general_purpose::STANDARD
            .decode(b64)
            .map_err(|e| IdpError::Configuration(format!("Certificate payload is not base64: {e}")))?;

        Self::from_der(&der)
    }

    /// Replace the public half so that self-verification fails.
    #[cfg(any(test, feature = "test-utils"))]
    #[must_use]
    pub fn with_public_key_der(mut self, public_key_der: Vec<u8>) -> Self {
        self.public_key_der = public_key_der;
        self
    }

    /// DER `RSAPublicKey` of this certificate.
    #[must_use]
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_key_der
    }

    #[must_use]
    pub fn modulus_bits(&self) -> usize {
        self.key_pair.public().modulus_len() * 8
    }

    /// Sign `message` with the private key.
    pub fn sign(&self, algorithm: SigningAlgorithm, message: &[u8]) -> Result<Vec<u8>, IdpError> {
        sign_pkcs1(&self.key_pair, algorithm, message)
    }

    /// Verify `signature` over `message` with the public key.
    pub fn verify(
        &self,
        algorithm: SigningAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), IdpError> {
        verify_pkcs1(&self.public_key_der, algorithm, message, signature)
    }
}

// ============================================================================
// Signatures
// ============================================================================

/// Produce an RSASSA-PKCS1-v1_5 signature.
pub fn sign_pkcs1(
    key_pair: &RsaKeyPair,
    algorithm: SigningAlgorithm,
    message: &[u8],
) -> Result<Vec<u8>, IdpError> {
    let rng = SystemRandom::new();
    let mut signature = vec![0u8; key_pair.public().modulus_len()];

    key_pair
        .sign(algorithm.signing_encoding(), &rng, message, &mut signature)
        .map_err(|e| IdpError::Signing(format!("RSA signing failed: {e}")))?;

    Ok(signature)
}

/// Verify an RSASSA-PKCS1-v1_5 signature against a DER `RSAPublicKey`.
pub fn verify_pkcs1(
    public_key_der: &[u8],
    algorithm: SigningAlgorithm,
    message: &[u8],
    signature: &[u8],
) -> Result<(), IdpError> {
    UnparsedPublicKey::new(algorithm.verification_algorithm(), public_key_der)
        .verify(message, signature)
        .map_err(|_| IdpError::Signing("Signature verification failed".to_string()))
}
