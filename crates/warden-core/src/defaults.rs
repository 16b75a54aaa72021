//! Default configuration values.
//!
//! Centralized default constants for use across all crates.

// ============================================================================
// Timeout Defaults
// ============================================================================

/// Default TCP connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
/// Default TLS handshake timeout in seconds.
pub const DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// TCP Socket Defaults
// ============================================================================

/// Default TCP_NODELAY.
pub const DEFAULT_TCP_NO_DELAY: bool = true;
/// Default TCP Keep-Alive interval in seconds (0 = disabled).
pub const DEFAULT_TCP_KEEPALIVE_SECS: u64 = 30;

// ============================================================================
// Retry Defaults
// ============================================================================

/// Default total number of attempts for a replayable request.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
/// Upper bound accepted for the retry attempt setting.
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

// ============================================================================
// FTP Defaults
// ============================================================================

/// Default FTP control port.
pub const DEFAULT_FTP_PORT: u16 = 21;
/// Default FTP login user.
pub const DEFAULT_FTP_USER: &str = "anonymous";
/// Default FTP login password.
pub const DEFAULT_FTP_PASSWORD: &str = "anonymous@";
/// Chunks buffered between an FTP download and its reader.
pub const DEFAULT_FTP_PIPE_CAPACITY: usize = 16;
/// Read buffer size for FTP data connections (32 KiB).
pub const DEFAULT_FTP_READ_BUFFER: usize = 32768;

// ============================================================================
// Audit Defaults
// ============================================================================

/// Maximum bytes of a page title kept in an access record.
pub const DEFAULT_AUDIT_TITLE_MAX: usize = 500;

// ============================================================================
// Logging Defaults
// ============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Default log format.
pub const DEFAULT_LOG_FORMAT: &str = "pretty";
/// Default log output.
pub const DEFAULT_LOG_OUTPUT: &str = "stderr";
