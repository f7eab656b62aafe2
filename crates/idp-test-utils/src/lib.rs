//! # IdP Test Utilities
//!
//! Shared test utilities for the IdP client.
//!
//! This crate provides:
//! - Deterministic RSA key fixtures (fixed PKCS#8 and PKCS#1 keys)
//! - A counting trust-store backend (CountingSecretBackend)
//! - A mock authorization server (TestTokenServer)
//! - Settings and component builders with test defaults
//! - Custom assertions (AssertionChecks trait)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use idp_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let server = TestTokenServer::start().await;
//!     server.mount_token("abc123", 3600).await;
//!
//!     let vault = cached_vault(certificate_backend(), test_cache());
//!     let client = TokenExchangeClient::with_vault(test_client_settings(&server.uri()), vault)?;
//!     client.exchange_client_assertion().await?;
//!
//!     server.posted_assertions().await[0]
//!         .assert_client(TEST_CLIENT_ID)
//!         .assert_signed_by(&test_certificate(), SigningAlgorithm::Rs512);
//! }
//! ```

pub mod assertions;
pub mod crypto_fixtures;
pub mod mock_backend;
pub mod settings_builders;
pub mod token_server;

// Re-export commonly used items
pub use assertions::*;
pub use crypto_fixtures::*;
pub use mock_backend::*;
pub use settings_builders::*;
pub use token_server::*;
