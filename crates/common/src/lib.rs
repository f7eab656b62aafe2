//! Common utilities and types shared across IdP client components.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for compact JWT serialization (header, claims, segments)
pub mod jwt;
