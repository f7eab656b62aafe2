//! IdP client library
//!
//! OAuth 2.0 client-credentials token acquisition using an RFC 7523
//! JWT-bearer client assertion signed with a certificate held in a trust
//! store.
//!
//! # Modules
//!
//! - `assertion` - Client assertion construction, signing and self-verification
//! - `bootstrap` - Composition root wiring registries from configuration
//! - `cache` - Single-flight keyed store and the named cache capability
//! - `config` - Client, key vault and cache settings
//! - `crypto` - RSA certificates and PKCS#1 v1.5 signatures
//! - `errors` - Error types
//! - `oauth` - Token response wire types
//! - `observability` - Log correlation helpers and metrics
//! - `registry` - Name to instance maps for caches and key vaults
//! - `token_client` - Token endpoint exchange
//! - `vault` - Trust-store access with cache-aside reads

pub mod assertion;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod crypto;
pub mod errors;
mod oauth;
pub mod observability;
pub mod registry;
pub mod token_client;
pub mod vault;
