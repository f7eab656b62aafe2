//! Compact JWT serialization helpers shared across IdP client components.
//!
//! This module provides the building blocks for RFC 7523 client assertions:
//! - Size limits for untrusted compact tokens
//! - The JOSE header and client-assertion claim set
//! - base64url (no padding) segment encoding and decoding
//! - Splitting and joining of the `header.claims.signature` form
//!
//! Signing and verification live with the key material; this module never
//! touches keys.
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{encode_segment, join_compact, ClientAssertionClaims, JwtHeader};
//!
//! let header = encode_segment(&JwtHeader::new("RS512"))?;
//! let claims = encode_segment(&ClientAssertionClaims::new(client_id, aud, jti, iat, 300))?;
//! let signing_input = format!("{header}.{claims}");
//! let signature = sign(signing_input.as_bytes())?;
//! let assertion = join_compact(&signing_input, &signature);
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum accepted size of a compact JWT in bytes (8KB).
///
/// Checked before any base64 decoding. A 4096-bit RSA signature plus the
/// client-assertion claims stays well below this limit.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// RFC 7523 client assertion type for JWT-bearer client authentication.
pub const JWT_BEARER_ASSERTION_TYPE: &str =
    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

// =============================================================================
// Error Types
// =============================================================================

/// Errors produced while encoding or decoding compact JWT segments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtFormatError {
    /// Token size exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("Token exceeds maximum size of {MAX_JWT_SIZE_BYTES} bytes")]
    TokenTooLarge,

    /// Token does not have exactly three dot-separated segments.
    #[error("Token is not in compact serialization form")]
    MalformedToken,

    /// A segment is not valid base64url.
    #[error("Invalid base64url segment: {0}")]
    InvalidEncoding(String),

    /// A segment does not contain the expected JSON document.
    #[error("Invalid JSON segment: {0}")]
    InvalidJson(String),
}

// =============================================================================
// Header and Claims
// =============================================================================

/// JOSE header of a client assertion.
///
/// Only `alg` is emitted. Authorization servers that require `typ` or `kid`
/// accept assertions without them for the `private_key_jwt` method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtHeader {
    /// JWS algorithm name (e.g. `RS512`).
    pub alg: String,
}

impl JwtHeader {
    /// Creates a header for the given JWS algorithm name.
    #[must_use]
    pub fn new(alg: impl Into<String>) -> Self {
        Self { alg: alg.into() }
    }
}

/// Claim set of an RFC 7523 client assertion.
///
/// Field declaration order is the serialization order:
/// `iss`, `sub`, `aud`, `jti`, `exp`, `iat`.
///
/// `iss` and `sub` carry the client identifier and are redacted in Debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAssertionClaims {
    /// Issuer (the client identifier).
    pub iss: String,

    /// Subject (the client identifier).
    pub sub: String,

    /// Audience (the authorization server's token endpoint or configured value).
    pub aud: String,

    /// Unique assertion identifier.
    pub jti: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,
}

impl fmt::Debug for ClientAssertionClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientAssertionClaims")
            .field("iss", &"[REDACTED]")
            .field("sub", &"[REDACTED]")
            .field("aud", &self.aud)
            .field("jti", &self.jti)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .finish()
    }
}

impl ClientAssertionClaims {
    /// Creates a claim set where `iss == sub == client_id` and
    /// `exp = iat + lifetime_secs`.
    #[must_use]
    pub fn new(
        client_id: &str,
        audience: &str,
        jti: String,
        iat: i64,
        lifetime_secs: i64,
    ) -> Self {
        Self {
            iss: client_id.to_string(),
            sub: client_id.to_string(),
            aud: audience.to_string(),
            jti,
            exp: iat.saturating_add(lifetime_secs),
            iat,
        }
    }

    /// Lifetime of the assertion in seconds.
    #[must_use]
    pub fn lifetime_secs(&self) -> i64 {
        self.exp.saturating_sub(self.iat)
    }
}

// =============================================================================
// Segment Encoding
// =============================================================================

/// The three segments of a compact JWT, borrowed from the original token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactParts<'a> {
    /// base64url header segment.
    pub header: &'a str,
    /// base64url claims segment.
    pub claims: &'a str,
    /// base64url signature segment.
    pub signature: &'a str,
}

impl CompactParts<'_> {
    /// The `header.claims` string that the signature covers.
    #[must_use]
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.header, self.claims)
    }
}

/// Serialize a value to JSON and encode it as a base64url (no padding) segment.
///
/// # Errors
///
/// Returns `JwtFormatError::InvalidJson` if the value cannot be serialized.
pub fn encode_segment<T: Serialize>(value: &T) -> Result<String, JwtFormatError> {
    let json = serde_json::to_vec(value).map_err(|e| JwtFormatError::InvalidJson(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decode a base64url segment and deserialize its JSON content.
///
/// # Errors
///
/// - `JwtFormatError::InvalidEncoding` - segment is not base64url
/// - `JwtFormatError::InvalidJson` - decoded bytes are not the expected JSON
pub fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, JwtFormatError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT segment base64");
        JwtFormatError::InvalidEncoding(e.to_string())
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT segment JSON");
        JwtFormatError::InvalidJson(e.to_string())
    })
}

/// Decode the raw signature bytes from a base64url signature segment.
///
/// # Errors
///
/// Returns `JwtFormatError::InvalidEncoding` if the segment is not base64url.
pub fn decode_signature(segment: &str) -> Result<Vec<u8>, JwtFormatError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| JwtFormatError::InvalidEncoding(e.to_string()))
}

/// Split a compact JWT into its three segments.
///
/// The size limit is checked before the token is inspected.
///
/// # Errors
///
/// - `JwtFormatError::TokenTooLarge` - token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `JwtFormatError::MalformedToken` - not exactly three non-empty segments
pub fn split_compact(token: &str) -> Result<CompactParts<'_>, JwtFormatError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtFormatError::TokenTooLarge);
    }

    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(claims), Some(signature), None)
            if !header.is_empty() && !claims.is_empty() && !signature.is_empty() =>
        {
            Ok(CompactParts {
                header,
                claims,
                signature,
            })
        }
        _ => Err(JwtFormatError::MalformedToken),
    }
}

/// Append a base64url signature to a signing input, producing the compact form.
#[must_use]
pub fn join_compact(signing_input: &str, signature: &[u8]) -> String {
    format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature))
}

// =============================================================================
// Tests
// =============================================================================
