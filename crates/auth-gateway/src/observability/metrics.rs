//! Metrics definitions for the authentication gateway.
//!
//! All metrics follow Prometheus naming conventions:
//! - `auth_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: validator selection (introspection, jwks) or HTTP method
//! - `endpoint`: known routes, everything else is `/other`
//! - `status`: success, error, timeout
//! - `error_type`: `AuthError::kind()` values
//! - `reason`: `AuthzError::kind()` values or `none`
//! - `result`: hit, miss
//!
//! Subjects, key IDs and token contents are never used as labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("auth_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Local JWKS validation is sub-millisecond; introspection is a network round trip
        .set_buckets_for_metric(
            Matcher::Prefix("auth_token_validation".to_string()),
            &[
                0.0005, 0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set token validation buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("auth_jwks_refresh".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set JWKS refresh buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `auth_http_requests_total`, `auth_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("auth_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("auth_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path onto the fixed route table.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/v1/me" => "/v1/me",
        _ => "/other",
    }
}

// ============================================================================
// Token Validation Metrics
// ============================================================================

/// Record one token validation.
///
/// Metric: `auth_token_validations_total`, `auth_token_validation_duration_seconds`
/// Labels: `method`, `status`, `error_type`
pub fn record_token_validation(method: &str, error_type: Option<&str>, duration: Duration) {
    let status = if error_type.is_some() { "error" } else { "success" };

    histogram!("auth_token_validation_duration_seconds",
        "method" => method.to_string(),
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("auth_token_validations_total",
        "method" => method.to_string(),
        "status" => status,
        "error_type" => error_type.unwrap_or("none").to_string()
    )
    .increment(1);
}

// ============================================================================
// JWKS Cache Metrics
// ============================================================================

/// Record a JWKS refresh attempt.
///
/// Metric: `auth_jwks_refresh_total`, `auth_jwks_refresh_duration_seconds`
/// Labels: `status`
pub fn record_jwks_refresh(status: &'static str, duration: Duration) {
    histogram!("auth_jwks_refresh_duration_seconds").record(duration.as_secs_f64());

    counter!("auth_jwks_refresh_total", "status" => status).increment(1);
}

/// Metric: `auth_jwks_keys_loaded`
#[allow(clippy::cast_precision_loss)]
pub fn set_jwks_keys_loaded(count: usize) {
    gauge!("auth_jwks_keys_loaded").set(count as f64);
}

/// Metric: `auth_jwks_cache_lookups_total`
/// Labels: `result` (hit, miss)
pub fn record_jwks_lookup(result: &'static str) {
    counter!("auth_jwks_cache_lookups_total", "result" => result).increment(1);
}

// ============================================================================
// Authorization Metrics
// ============================================================================

/// Record an authorization decision.
///
/// Metric: `auth_authorization_decisions_total`
/// Labels: `decision` (allowed, denied), `reason`
pub fn record_authorization_decision(decision: &'static str, reason: &'static str) {
    counter!("auth_authorization_decisions_total",
        "decision" => decision,
        "reason" => reason
    )
    .increment(1);
}
