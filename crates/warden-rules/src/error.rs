//! Error types for the rule engine.

use thiserror::Error;

/// Errors that can occur while loading or compiling rules.
#[derive(Error, Debug)]
pub enum RulesError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid rule kind: {0}")]
    InvalidRuleKind(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("automaton build error: {0}")]
    Automaton(#[from] aho_corasick::BuildError),
}

impl RulesError {
    /// Error type label for metrics and logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            RulesError::Io(_) => warden_metrics::ERROR_IO,
            _ => warden_metrics::ERROR_RULE,
        }
    }
}
