//! Error type constants for metrics and logging.
//!
//! These constants provide consistent error classification across all crates.

/// I/O error.
pub const ERROR_IO: &str = "io";
/// TLS handshake or certificate verification error.
pub const ERROR_TLS: &str = "tls";
/// Request canceled by the caller.
pub const ERROR_CANCELED: &str = "canceled";
/// Connection establishment error.
pub const ERROR_CONNECT: &str = "connect";
/// HTTP protocol error.
pub const ERROR_HTTP: &str = "http";
/// FTP transfer error.
pub const ERROR_FTP: &str = "ftp";
/// Timeout error.
pub const ERROR_TIMEOUT: &str = "timeout";
/// Invalid request (unsupported URI, consumed body).
pub const ERROR_REQUEST: &str = "request";
/// Configuration error.
pub const ERROR_CONFIG: &str = "config";
/// Rule parsing or compilation error.
pub const ERROR_RULE: &str = "rule";
