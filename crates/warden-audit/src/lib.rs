//! Audit logging for warden.
//!
//! Requests and TLS connections are recorded as ordered string fields, one
//! JSON array per line, through [`AuditSink`] implementations. An
//! [`AuditRegistry`] created at startup owns the standard logs and any
//! custom logs opened by path.
//!
//! # Example
//!
//! ```no_run
//! use warden_audit::{AccessRecord, AuditRegistry};
//!
//! let registry = AuditRegistry::open("/var/log/warden/access.log", "/var/log/warden/tls.log");
//! registry.log_access(&AccessRecord {
//!     url: "http://example.com/".into(),
//!     method: "GET".into(),
//!     status: Some(200),
//!     ..Default::default()
//! });
//! ```

pub mod record;
pub mod registry;
pub mod sink;

pub use record::{AccessRecord, ScanVerdict, TlsRecord, timestamp};
pub use registry::AuditRegistry;
pub use sink::{AuditSink, JsonLinesLog};
