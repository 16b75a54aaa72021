//! Metrics collection and Prometheus exporter for warden.
//!
//! Counters cover rule loading, connection redials, retries, TLS trust
//! fallbacks and fetch errors. Recording is a no-op until a recorder is
//! installed, so library users that never call [`init_prometheus`] pay
//! only for the macro dispatch.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize Prometheus metrics exporter.
///
/// Starts an HTTP server on the given address to expose metrics.
/// Returns an error message if binding fails.
pub fn init_prometheus(listen: &str) -> Result<(), String> {
    let addr: SocketAddr = listen
        .parse()
        .map_err(|e| format!("invalid metrics listen address: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install prometheus exporter: {}", e))?;

    Ok(())
}

// ============================================================================
// Metric Names
// ============================================================================

/// Number of rules currently loaded, by tier.
pub const RULES_LOADED: &str = "warden_rules_loaded";
/// Total number of rules rejected at load time (bad regex).
pub const RULES_REJECTED_TOTAL: &str = "warden_rules_rejected_total";
/// Total number of connection redials, by kind and outcome.
pub const REDIALS_TOTAL: &str = "warden_redials_total";
/// Total number of retried fetch attempts.
pub const RETRIES_TOTAL: &str = "warden_retries_total";
/// Total number of chains verified only by the extra root pool.
pub const TLS_EXTRA_ROOT_VERIFIED_TOTAL: &str = "warden_tls_extra_root_verified_total";
/// Total number of chains rejected by every root pool.
pub const TLS_VERIFY_FAILURES_TOTAL: &str = "warden_tls_verify_failures_total";
/// Total number of fetch errors by type.
pub const FETCH_ERRORS_TOTAL: &str = "warden_fetch_errors_total";

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Set the loaded rule gauge for a tier ("host", "path", "query", "url", "fragment").
#[inline]
pub fn set_rules_loaded(tier: &'static str, count: usize) {
    gauge!(RULES_LOADED, "tier" => tier).set(count as f64);
}

/// Record a rule dropped because its pattern failed to compile.
#[inline]
pub fn record_rule_rejected(tier: &'static str) {
    counter!(RULES_REJECTED_TOTAL, "tier" => tier).increment(1);
}

/// Record a redial (kind: "proactive" or "reactive").
#[inline]
pub fn record_redial(kind: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "failed" };
    counter!(REDIALS_TOTAL, "kind" => kind, "outcome" => outcome).increment(1);
}

/// Record a retried fetch attempt.
#[inline]
pub fn record_retry() {
    counter!(RETRIES_TOTAL).increment(1);
}

/// Record a certificate chain accepted by the extra root pool.
#[inline]
pub fn record_tls_extra_root_verified() {
    counter!(TLS_EXTRA_ROOT_VERIFIED_TOTAL).increment(1);
}

/// Record a certificate chain rejected by all configured roots.
#[inline]
pub fn record_tls_verify_failure() {
    counter!(TLS_VERIFY_FAILURES_TOTAL).increment(1);
}

/// Record a fetch error by type.
#[inline]
pub fn record_fetch_error(error_type: &'static str) {
    counter!(FETCH_ERRORS_TOTAL, "type" => error_type).increment(1);
}

// ============================================================================
// Error Type Constants (re-exported from warden-core)
// ============================================================================

pub use warden_core::{
    ERROR_CANCELED, ERROR_CONFIG, ERROR_CONNECT, ERROR_FTP, ERROR_HTTP, ERROR_IO, ERROR_REQUEST,
    ERROR_RULE, ERROR_TIMEOUT, ERROR_TLS,
};
