//! Configuration validation logic.

use std::collections::HashSet;

use crate::Config;
use crate::defaults::max_retry_attempts;
use crate::loader::ConfigError;

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for list in &config.rules.lists {
        if list.name.trim().is_empty() {
            return Err(ConfigError::Validation("rules.lists: name is empty".into()));
        }
        if !names.insert(list.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "rules.lists: duplicate name '{}'",
                list.name
            )));
        }
        if list.path.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "rules.lists[{}].path is empty",
                list.name
            )));
        }
    }
    for (i, rule) in config.rules.inline.iter().enumerate() {
        if rule.rule.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "rules.inline[{i}].rule is empty"
            )));
        }
    }

    let transport = &config.transport;
    if transport.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "transport.connect_timeout_secs must be > 0".into(),
        ));
    }
    if transport.tls_handshake_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "transport.tls_handshake_timeout_secs must be > 0".into(),
        ));
    }
    if transport.retry_attempts == 0 || transport.retry_attempts > max_retry_attempts() {
        return Err(ConfigError::Validation(format!(
            "transport.retry_attempts must be 1..={}",
            max_retry_attempts()
        )));
    }
    if let Some(path) = &transport.extra_root_certs
        && path.trim().is_empty()
    {
        return Err(ConfigError::Validation(
            "transport.extra_root_certs is empty".into(),
        ));
    }

    if let Some(format) = &config.logging.format {
        let valid_formats = ["json", "pretty", "compact"];
        if !valid_formats.contains(&format.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.format must be one of: {:?}",
                valid_formats
            )));
        }
    }
    if let Some(output) = &config.logging.output {
        let valid_outputs = ["stdout", "stderr"];
        if !valid_outputs.contains(&output.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.output must be one of: {:?}",
                valid_outputs
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InlineRuleConfig, RuleListConfig};

    fn list(name: &str, path: &str) -> RuleListConfig {
        RuleListConfig {
            name: name.into(),
            path: path.into(),
            action: "block".into(),
            description: String::new(),
        }
    }

    fn validation_message(config: &Config) -> String {
        match validate_config(config) {
            Err(ConfigError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn default_config_is_valid() {
        validate_config(&Config::default()).unwrap();
    }

    #[test]
    fn list_names_must_be_unique_and_non_empty() {
        let mut cfg = Config::default();
        cfg.rules.lists = vec![list("ads", "a.list"), list("ads", "b.list")];
        assert!(validation_message(&cfg).contains("duplicate name 'ads'"));

        cfg.rules.lists = vec![list(" ", "a.list")];
        assert!(validation_message(&cfg).contains("name is empty"));

        cfg.rules.lists = vec![list("ads", "")];
        assert!(validation_message(&cfg).contains("path is empty"));
    }

    #[test]
    fn inline_rule_text_required() {
        let mut cfg = Config::default();
        cfg.rules.inline.push(InlineRuleConfig {
            rule: String::new(),
            id: String::new(),
            action: "block".into(),
            description: String::new(),
            conditions: Vec::new(),
        });
        assert!(validation_message(&cfg).contains("rules.inline[0]"));
    }

    #[test]
    fn retry_attempts_bounds() {
        let mut cfg = Config::default();
        cfg.transport.retry_attempts = 0;
        assert!(validation_message(&cfg).contains("retry_attempts"));
        cfg.transport.retry_attempts = 11;
        assert!(validation_message(&cfg).contains("1..=10"));
        cfg.transport.retry_attempts = 10;
        validate_config(&cfg).unwrap();
    }

    #[test]
    fn zero_timeouts_rejected() {
        let mut cfg = Config::default();
        cfg.transport.connect_timeout_secs = 0;
        assert!(validation_message(&cfg).contains("connect_timeout_secs"));

        let mut cfg = Config::default();
        cfg.transport.tls_handshake_timeout_secs = 0;
        assert!(validation_message(&cfg).contains("tls_handshake_timeout_secs"));
    }

    #[test]
    fn logging_format_and_output() {
        let mut cfg = Config::default();
        cfg.logging.format = Some("xml".into());
        assert!(validation_message(&cfg).contains("logging.format"));

        let mut cfg = Config::default();
        cfg.logging.output = Some("file".into());
        assert!(validation_message(&cfg).contains("logging.output"));

        cfg.logging.output = Some("stdout".into());
        cfg.logging.format = Some("json".into());
        validate_config(&cfg).unwrap();
    }
}
