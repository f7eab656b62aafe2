//! Observability helpers for the IdP client.
//!
//! Instrumented functions use `#[instrument(skip_all)]` and log an explicit
//! allow-list of fields:
//! - **SAFE**: enums, operation names, status codes, durations
//! - **HASHED**: client identifiers (see [`hash_for_correlation`])
//! - **NEVER**: secret values, certificate material, assertions, access tokens
//!
//! The library only emits through the `metrics` facade; installing an
//! exporter is left to the host process.

pub mod metrics;

use crate::errors::IdpError;
use sha2::{Digest, Sha256};

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars)
///
/// Used for client identifiers that need correlation across log entries
/// but should not be logged in plaintext.
pub fn hash_for_correlation(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(digest.get(..4).unwrap_or_default())
}

/// Error categories for metrics labels (bounded cardinality)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing arguments or bad settings, raised before any I/O.
    Configuration,
    /// Cache miss.
    NotFound,
    /// Trust store or token endpoint failure.
    Remote,
    /// Signature production or self-verification failure.
    Cryptographic,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Remote => "remote",
            ErrorCategory::Cryptographic => "cryptographic",
        }
    }
}

impl From<&IdpError> for ErrorCategory {
    fn from(err: &IdpError) -> Self {
        match err {
            IdpError::Validation(_) | IdpError::Configuration(_) => ErrorCategory::Configuration,
            IdpError::NotFound(_) => ErrorCategory::NotFound,
            IdpError::RemoteStatus { .. } | IdpError::Remote(_) | IdpError::InvalidResponse(_) => {
                ErrorCategory::Remote
            }
            IdpError::Signing(_) => ErrorCategory::Cryptographic,
        }
    }
}
