//! CLI override definitions and application logic.

use clap::Parser;

use crate::Config;

#[derive(Debug, Clone, Parser, Default)]
pub struct CliOverrides {
    /// Add a rule list as NAME=PATH (repeatable), blocking by default
    #[arg(long = "rule-list", value_name = "NAME=PATH")]
    pub rule_lists: Vec<String>,
    /// Add an inline rule, e.g. example.com/login or /^ads\./h (repeatable)
    #[arg(long = "rule", value_name = "RULE")]
    pub rules: Vec<String>,
    /// Override TCP connect timeout (seconds)
    #[arg(long)]
    pub connect_timeout_secs: Option<u64>,
    /// Override TLS handshake timeout (seconds)
    #[arg(long)]
    pub tls_handshake_timeout_secs: Option<u64>,
    /// TCP Keep-Alive interval in seconds (0 = disabled)
    #[arg(long)]
    pub tcp_keepalive_secs: Option<u64>,
    /// Override total attempts for replayable requests
    #[arg(long)]
    pub retry_attempts: Option<u32>,
    /// PEM bundle of extra trust roots
    #[arg(long)]
    pub extra_root_certs: Option<String>,
    /// Override access log path (empty = stdout)
    #[arg(long)]
    pub access_log: Option<String>,
    /// Override TLS log path (empty = stdout)
    #[arg(long)]
    pub tls_log: Option<String>,
    /// Override metrics listen address
    #[arg(long)]
    pub metrics_listen: Option<String>,
    /// Override log level (trace/debug/info/warn/error)
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) {
    for spec in &overrides.rule_lists {
        let (name, path) = spec.split_once('=').unwrap_or((spec.as_str(), spec.as_str()));
        config.rules.lists.push(crate::RuleListConfig {
            name: name.to_string(),
            path: path.to_string(),
            action: "block".into(),
            description: String::new(),
        });
    }
    for rule in &overrides.rules {
        config.rules.inline.push(crate::InlineRuleConfig {
            rule: rule.clone(),
            id: "cli".into(),
            action: "block".into(),
            description: String::new(),
            conditions: Vec::new(),
        });
    }
    if let Some(v) = overrides.connect_timeout_secs {
        config.transport.connect_timeout_secs = v;
    }
    if let Some(v) = overrides.tls_handshake_timeout_secs {
        config.transport.tls_handshake_timeout_secs = v;
    }
    if let Some(v) = overrides.tcp_keepalive_secs {
        config.transport.tcp_keepalive_secs = v;
    }
    if let Some(v) = overrides.retry_attempts {
        config.transport.retry_attempts = v;
    }
    if let Some(v) = &overrides.extra_root_certs {
        config.transport.extra_root_certs = Some(v.clone());
    }
    if let Some(v) = &overrides.access_log {
        config.audit.access_log = v.clone();
    }
    if let Some(v) = &overrides.tls_log {
        config.audit.tls_log = v.clone();
    }
    if let Some(v) = &overrides.metrics_listen {
        config.metrics.listen = Some(v.clone());
    }
    if let Some(v) = &overrides.log_level {
        config.logging.level = Some(v.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_patch_config() {
        let overrides = CliOverrides::parse_from([
            "warden",
            "--rule-list",
            "ads=/etc/warden/ads.list",
            "--rule",
            "/^tracker\\./h",
            "--retry-attempts",
            "5",
            "--extra-root-certs",
            "/etc/warden/roots.pem",
            "--access-log",
            "",
            "--log-level",
            "debug",
        ]);
        let mut cfg = Config::default();
        cfg.audit.access_log = "/var/log/access.log".into();
        apply_overrides(&mut cfg, &overrides);

        assert_eq!(cfg.rules.lists[0].name, "ads");
        assert_eq!(cfg.rules.lists[0].path, "/etc/warden/ads.list");
        assert_eq!(cfg.rules.inline[0].rule, "/^tracker\\./h");
        assert_eq!(cfg.rules.inline[0].id, "cli");
        assert_eq!(cfg.transport.retry_attempts, 5);
        assert_eq!(
            cfg.transport.extra_root_certs.as_deref(),
            Some("/etc/warden/roots.pem")
        );
        assert!(cfg.audit.access_log.is_empty());
        assert_eq!(cfg.logging.level.as_deref(), Some("debug"));
    }

    #[test]
    fn bare_list_path_names_itself() {
        let overrides = CliOverrides::parse_from(["warden", "--rule-list", "ads.list"]);
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, &overrides);
        assert_eq!(cfg.rules.lists[0].name, "ads.list");
        assert_eq!(cfg.rules.lists[0].path, "ads.list");
    }

    #[test]
    fn no_overrides_leave_config_untouched() {
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, &CliOverrides::default());
        assert!(cfg.rules.lists.is_empty());
        assert_eq!(cfg.transport.retry_attempts, 3);
    }
}
