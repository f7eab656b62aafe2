//! Error types for the IdP client.
//!
//! `IdpError` is returned by every fallible operation in the crate. Validation
//! and configuration errors are raised before any I/O. No component retries;
//! remote failures are surfaced to the caller unchanged.

use common::jwt::JwtFormatError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdpError {
    /// A required argument was missing or empty.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid settings or an unresolvable named dependency.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Cache miss. Recovered locally by cache-aside readers.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A remote endpoint answered with a non-success status.
    ///
    /// `body` is the response body verbatim.
    #[error("Failed status code: {status} Message: {body}")]
    RemoteStatus { status: u16, body: String },

    /// A trust-store or transport failure without a status code.
    #[error("Remote error: {0}")]
    Remote(String),

    /// A remote endpoint answered with a body that could not be understood.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Signature production or self-verification failed.
    #[error("Signing error: {0}")]
    Signing(String),
}

impl IdpError {
    /// Returns true for the cache-miss variant.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, IdpError::NotFound(_))
    }

    /// HTTP status of a remote failure, if one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            IdpError::RemoteStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<JwtFormatError> for IdpError {
    fn from(err: JwtFormatError) -> Self {
        IdpError::Signing(format!("Failed to encode assertion: {err}"))
    }
}

/// Rejects empty or whitespace-only arguments before any I/O takes place.
pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), IdpError> {
    if value.trim().is_empty() {
        return Err(IdpError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}
