//! Configuration structures.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Rule sources fed to the URL matcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Rule-list files, one rule per line.
    #[serde(default)]
    pub lists: Vec<RuleListConfig>,
    /// Rules written directly in the config file.
    #[serde(default)]
    pub inline: Vec<InlineRuleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleListConfig {
    /// List name; becomes the id of every rule loaded from it.
    pub name: String,
    pub path: String,
    /// allow, block, ignore or any named action. Default: block.
    #[serde(default = "default_action")]
    pub action: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineRuleConfig {
    /// Rule in text form: `example.com/path`, `/regex/`, `/regex/h`, ...
    pub rule: String,
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_action")]
    pub action: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub conditions: Vec<String>,
}

fn default_action() -> String {
    "block".to_string()
}

/// Outbound fetching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_tls_handshake_timeout_secs")]
    pub tls_handshake_timeout_secs: u64,
    #[serde(default = "default_tcp_no_delay")]
    pub tcp_no_delay: bool,
    /// TCP keepalive interval in seconds (0 = disabled).
    #[serde(default = "default_tcp_keepalive_secs")]
    pub tcp_keepalive_secs: u64,
    /// Total attempts for a replayable request, first try included.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// PEM bundle of roots tried when the system roots reject a chain.
    #[serde(default)]
    pub extra_root_certs: Option<String>,
    #[serde(default)]
    pub ftp: FtpConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            tls_handshake_timeout_secs: default_tls_handshake_timeout_secs(),
            tcp_no_delay: default_tcp_no_delay(),
            tcp_keepalive_secs: default_tcp_keepalive_secs(),
            retry_attempts: default_retry_attempts(),
            extra_root_certs: None,
            ftp: FtpConfig::default(),
        }
    }
}

/// Credentials used when an `ftp://` URL carries none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpConfig {
    #[serde(default = "default_ftp_user")]
    pub user: String,
    #[serde(default = "default_ftp_password")]
    pub password: String,
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            user: default_ftp_user(),
            password: default_ftp_password(),
        }
    }
}

/// Audit log destinations. Empty paths write to stdout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub access_log: String,
    #[serde(default)]
    pub tls_log: String,
    #[serde(default)]
    pub log_user_agent: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Prometheus exporter listen address, e.g. 127.0.0.1:9100.
    #[serde(default)]
    pub listen: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: Option<String>,
    /// Log format: json, pretty, or compact. Default: pretty.
    pub format: Option<String>,
    /// Output target: stdout or stderr. Default: stderr.
    pub output: Option<String>,
    /// Per-module log level filters (e.g., {"warden_transport": "debug", "rustls": "warn"}).
    #[serde(default)]
    pub filters: HashMap<String, String>,
}
