//! File-based rule-list provider.

use std::path::Path;

use crate::error::RulesError;
use crate::parser;
use crate::rule::{Rule, RuleSource};

/// Provider that loads rule lists from local files.
pub struct FileProvider;

impl FileProvider {
    /// Load and parse a rule list from a local file.
    pub fn load(path: &Path, source: &RuleSource) -> Result<Vec<Rule>, RulesError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, source)
    }

    /// Parse rule-list content from a string.
    pub fn parse(content: &str, source: &RuleSource) -> Result<Vec<Rule>, RulesError> {
        parser::parse_rule_list(content, source)
    }
}
