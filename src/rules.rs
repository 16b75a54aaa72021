//! Building the URL matcher from configured rule sources.

use std::path::Path;

use tracing::{info, warn};
use warden_config::RulesConfig;
use warden_rules::{
    Action, FileProvider, Rule, RuleSource, RulesError, UrlMatcher, UrlMatcherBuilder,
};

/// Load every configured rule list and inline rule, then finalize.
///
/// A list that cannot be read or parsed fails the whole build. Regexes that
/// do not compile are dropped and logged by the tiers.
pub fn build_matcher(config: &RulesConfig) -> Result<UrlMatcher, RulesError> {
    let mut builder = UrlMatcherBuilder::new();

    for list in &config.lists {
        let mut source = RuleSource::new(list.name.as_str(), Action::from(list.action.as_str()));
        source.description = list.description.clone();

        let rules = FileProvider::load(Path::new(&list.path), &source)?;
        let total = rules.len();
        let kept = builder.add_rules(rules);
        info!(
            list = %list.name,
            path = %list.path,
            kept,
            rejected = total - kept,
            "rule list loaded"
        );
    }

    for inline in &config.inline {
        let rule = Rule::parse(&inline.rule)?
            .with_id(inline.id.as_str())
            .with_action(Action::from(inline.action.as_str()))
            .with_description(inline.description.as_str())
            .with_conditions(inline.conditions.clone());
        if !builder.add_rule(rule) {
            warn!(rule = %inline.rule, "inline rule rejected");
        }
    }

    builder.finalize()
}
