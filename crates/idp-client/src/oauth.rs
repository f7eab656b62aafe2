//! Wire types shared by the OAuth 2.0 token responses this crate consumes.

use crate::errors::IdpError;
use serde::Deserialize;

/// `expires_in` of a token response.
///
/// Arrives as a JSON number from RFC 6749 compliant endpoints and as a string
/// from Azure AD v1-compatible authorities and some identity servers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum ExpiresIn {
    Seconds(u64),
    Text(String),
}

impl ExpiresIn {
    /// Lifetime in seconds.
    ///
    /// # Errors
    ///
    /// `IdpError::InvalidResponse` when the string form is not an unsigned
    /// integer.
    pub(crate) fn seconds(&self) -> Result<u64, IdpError> {
        match self {
            ExpiresIn::Seconds(secs) => Ok(*secs),
            ExpiresIn::Text(text) => text.trim().parse().map_err(|e| {
                IdpError::InvalidResponse(format!("Invalid expires_in {text:?}: {e}"))
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Body {
        expires_in: ExpiresIn,
    }

    fn seconds(json: &str) -> Result<u64, IdpError> {
        serde_json::from_str::<Body>(json).unwrap().expires_in.seconds()
    }

    #[test]
    fn test_number_and_string_forms() {
        assert_eq!(seconds(r#"{"expires_in":3600}"#).unwrap(), 3600);
        assert_eq!(seconds(r#"{"expires_in":"3600"}"#).unwrap(), 3600);
        assert_eq!(seconds(r#"{"expires_in":" 60 "}"#).unwrap(), 60);
    }

    #[test]
    fn test_non_numeric_string_rejected() {
        assert!(matches!(
            seconds(r#"{"expires_in":"soon"}"#),
            Err(IdpError::InvalidResponse(msg)) if msg.contains("soon")
        ));
        assert!(matches!(
            seconds(r#"{"expires_in":"-5"}"#),
            Err(IdpError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_negative_number_fails_to_deserialize() {
        assert!(serde_json::from_str::<Body>(r#"{"expires_in":-1}"#).is_err());
    }
}
