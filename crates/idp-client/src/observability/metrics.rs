//! Metrics definitions for the IdP client
//!
//! All metrics follow Prometheus naming conventions:
//! - `idp_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `cache`: configured cache names
//! - `outcome`: 2 values (hit, miss)
//! - `operation`: fixed by code (get_secret, set_secret, list_secrets, access_token)
//! - `status`: 2 values (success, error)
//! - `error_category`: 4 values (see [`ErrorCategory`](super::ErrorCategory))

use metrics::{counter, histogram};
use std::time::Duration;

// ============================================================================
// Cache Metrics
// ============================================================================

/// Record a cache lookup
///
/// Metric: `idp_cache_lookups_total`
/// Labels: `cache`, `outcome`
pub fn record_cache_lookup(cache: &str, outcome: &'static str) {
    counter!("idp_cache_lookups_total", "cache" => cache.to_string(), "outcome" => outcome)
        .increment(1);
}

// ============================================================================
// Trust Store Metrics
// ============================================================================

/// Record a trust-store request
///
/// Metric: `idp_vault_requests_total`, `idp_vault_request_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_vault_request(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!("idp_vault_request_duration_seconds", "operation" => operation)
        .record(duration.as_secs_f64());

    counter!("idp_vault_requests_total", "operation" => operation, "status" => status)
        .increment(1);
}

// ============================================================================
// Assertion Metrics
// ============================================================================

/// Record a client assertion signing attempt
///
/// Metric: `idp_assertions_signed_total`
/// Labels: `status`
pub fn record_assertion_signed(status: &'static str) {
    counter!("idp_assertions_signed_total", "status" => status).increment(1);
}

// ============================================================================
// Token Exchange Metrics
// ============================================================================

/// Record a token exchange with the authorization server
///
/// Metric: `idp_token_exchange_total`, `idp_token_exchange_duration_seconds`
/// Labels: `status`, `error_category`
pub fn record_token_exchange(
    status: &'static str,
    error_category: Option<&'static str>,
    duration: Duration,
) {
    histogram!("idp_token_exchange_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());

    counter!(
        "idp_token_exchange_total",
        "status" => status,
        "error_category" => error_category.unwrap_or("none")
    )
    .increment(1);
}
