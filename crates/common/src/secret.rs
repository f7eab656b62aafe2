//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for every sensitive value handled by
//! the IdP client: Key Vault client secrets, secret values read from a trust
//! store, and issued access tokens.
//!
//! `SecretString` implements `Debug` with redaction, so a struct deriving
//! `Debug` stays safe to log. The inner value is zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct VaultCredential {
//!     client_id: String,
//!     client_secret: SecretString,
//! }
//!
//! let credential = VaultCredential {
//!     client_id: "vault-reader".to_string(),
//!     client_secret: SecretString::from("s3cr3t"),
//! };
//!
//! assert!(!format!("{credential:?}").contains("s3cr3t"));
//! assert_eq!(credential.client_secret.expose_secret(), "s3cr3t");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
