//! # warden
//!
//! Decision-and-fetch core of a filtering web proxy: decide which policy
//! rules match a request URL, then fetch the resource over HTTP, TLS or FTP
//! despite transient connection failures.
//!
//! ## Crates
//!
//! - [`warden_core`] - Default constants and error labels
//! - [`warden_config`] - Configuration loading and validation
//! - [`warden_rules`] - URL rule matching engine
//! - [`warden_transport`] - Resilient fetching
//! - [`warden_audit`] - Access and TLS audit records
//! - [`warden_metrics`] - Prometheus-compatible metrics

pub mod cli;
pub mod router;
pub mod rules;

pub use warden_audit as audit;
pub use warden_config as config;
pub use warden_core as core;
pub use warden_metrics as metrics;
pub use warden_rules as url_rules;
pub use warden_transport as transport;

pub use router::Dispatcher;
pub use rules::build_matcher;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use warden_audit::{AccessRecord, AuditRegistry, AuditSink};
    pub use warden_config::{Config, load_config, validate_config};
    pub use warden_rules::{Rule, Tally, UrlMatcher, UrlMatcherBuilder};
    pub use warden_transport::{Fetch, FetchError, FetchRequest, FetchResponse};

    pub use crate::{Dispatcher, build_matcher};
}
