//! Rule and action type definitions.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::RulesError;
use crate::parser;

/// Which part of a URL a rule is tested against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleKind {
    /// Literal host or host+path fragment, matched by exact lookup.
    UrlFragment,
    /// Regex over the canonical whole URL.
    UrlRegex,
    /// Regex over the host.
    HostRegex,
    /// Regex over the path.
    PathRegex,
    /// Regex over the decoded query.
    QueryRegex,
}

impl RuleKind {
    /// Tier label used in logs and metrics.
    pub fn tier(self) -> &'static str {
        match self {
            RuleKind::UrlFragment => "fragment",
            RuleKind::UrlRegex => "url",
            RuleKind::HostRegex => "host",
            RuleKind::PathRegex => "path",
            RuleKind::QueryRegex => "query",
        }
    }
}

/// Action attached to a rule. The core never acts on it; it is carried
/// through the tally to the policy consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    #[default]
    Block,
    Ignore,
    /// Any other policy-defined action.
    #[serde(untagged)]
    Named(String),
}

impl Action {
    /// Check if this is the allow action.
    pub fn is_allow(&self) -> bool {
        matches!(self, Action::Allow)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Action::Allow => "allow",
            Action::Block => "block",
            Action::Ignore => "ignore",
            Action::Named(name) => name,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Action {
    /// Case-insensitive for the built-in actions; anything else is kept as a
    /// named action.
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Action::Allow,
            "block" => Action::Block,
            "ignore" => Action::Ignore,
            _ => Action::Named(s.to_string()),
        }
    }
}

/// Attributes shared by every rule loaded from one list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSource {
    pub id: String,
    pub action: Action,
    pub description: String,
}

impl RuleSource {
    pub fn new(id: impl Into<String>, action: Action) -> Self {
        Self {
            id: id.into(),
            action,
            description: String::new(),
        }
    }
}

/// An immutable policy rule.
///
/// Cloning is a reference-count bump. Equality and hashing cover every
/// field, so two rules with the same text but different lists are distinct
/// tally keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rule {
    inner: Arc<RuleInner>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RuleInner {
    id: String,
    kind: RuleKind,
    pattern: String,
    action: Action,
    description: String,
    conditions: Vec<String>,
}

impl Rule {
    /// Create a rule with default attributes (no id, block action).
    pub fn new(kind: RuleKind, pattern: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RuleInner {
                id: String::new(),
                kind,
                pattern: pattern.into(),
                action: Action::default(),
                description: String::new(),
                conditions: Vec::new(),
            }),
        }
    }

    /// Parse a rule from its text form (`example.com`, `/re/`, `/re/h`, ...).
    pub fn parse(text: &str) -> Result<Self, RulesError> {
        let (kind, pattern) = parser::parse_rule(text)?;
        Ok(Self::new(kind, pattern))
    }

    /// Create a rule carrying a list's shared attributes.
    pub fn from_source(kind: RuleKind, pattern: impl Into<String>, source: &RuleSource) -> Self {
        Self::new(kind, pattern)
            .with_id(source.id.clone())
            .with_action(source.action.clone())
            .with_description(source.description.clone())
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).id = id.into();
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        Arc::make_mut(&mut self.inner).action = action;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).description = description.into();
        self
    }

    pub fn with_conditions(mut self, conditions: Vec<String>) -> Self {
        Arc::make_mut(&mut self.inner).conditions = conditions;
        self
    }

    /// Identity of the rule's origin (list name or inline id).
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> RuleKind {
        self.inner.kind
    }

    pub fn pattern(&self) -> &str {
        &self.inner.pattern
    }

    pub fn action(&self) -> &Action {
        &self.inner.action
    }

    pub fn description(&self) -> &str {
        &self.inner.description
    }

    /// Opaque condition expressions evaluated by the policy consumer.
    pub fn conditions(&self) -> &[String] {
        &self.inner.conditions
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pattern = &self.inner.pattern;
        match self.inner.kind {
            RuleKind::UrlFragment => f.write_str(pattern),
            RuleKind::UrlRegex => write!(f, "/{pattern}/"),
            RuleKind::HostRegex => write!(f, "/{pattern}/h"),
            RuleKind::PathRegex => write!(f, "/{pattern}/p"),
            RuleKind::QueryRegex => write!(f, "/{pattern}/q"),
        }
    }
}
