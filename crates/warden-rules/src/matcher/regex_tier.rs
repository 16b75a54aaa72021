//! Regex rules bucketed by the literals they require.

use std::sync::Arc;

use regex::Regex;
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::error::RulesError;
use crate::literal;
use crate::matcher::phrase::{PhraseId, PhraseIndex, PhraseIndexBuilder};
use crate::rule::Rule;
use crate::tally::Tally;

/// A rule paired with its compiled pattern.
#[derive(Debug)]
pub struct CompiledRegexRule {
    rule: Rule,
    regex: Regex,
}

impl CompiledRegexRule {
    /// Compile the rule's pattern.
    pub fn compile(rule: Rule) -> Result<Self, regex::Error> {
        let regex = Regex::new(rule.pattern())?;
        Ok(Self { rule, regex })
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Collects regex rules for one tier.
#[derive(Debug, Default)]
pub struct RegexTierBuilder {
    phrases: PhraseIndexBuilder,
    by_phrase: Vec<Vec<Arc<CompiledRegexRule>>>,
    unpruned: Vec<Arc<CompiledRegexRule>>,
    rejected: usize,
}

impl RegexTierBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and register a rule.
    ///
    /// A pattern that fails to compile is logged and dropped; the return
    /// value reports whether the rule was kept.
    pub fn add_rule(&mut self, rule: Rule) -> bool {
        let tier = rule.kind().tier();
        let compiled = match CompiledRegexRule::compile(rule) {
            Ok(compiled) => Arc::new(compiled),
            Err(e) => {
                warn!(tier, error = %e, "dropping rule with invalid regex");
                warden_metrics::record_rule_rejected(tier);
                self.rejected += 1;
                return false;
            }
        };

        let Some(literals) = literal::required_literals(compiled.rule.pattern()) else {
            debug!(rule = %compiled.rule, "no required literal, always evaluated");
            self.unpruned.push(compiled);
            return true;
        };

        for lit in literals {
            let PhraseId(id) = self.phrases.add_phrase(&lit);
            if id == self.by_phrase.len() {
                self.by_phrase.push(Vec::new());
            }
            self.by_phrase[id].push(Arc::clone(&compiled));
        }
        true
    }

    /// Number of rules dropped for invalid patterns.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Build the phrase automaton and freeze the tier.
    pub fn finalize(self) -> Result<RegexTier, RulesError> {
        let mut seen = FxHashSet::default();
        let rules = self
            .by_phrase
            .iter()
            .flatten()
            .chain(self.unpruned.iter())
            .filter(|r| seen.insert(Arc::as_ptr(*r)))
            .count();

        Ok(RegexTier {
            phrases: self.phrases.finalize()?,
            by_phrase: self.by_phrase,
            unpruned: self.unpruned,
            rules,
        })
    }
}

/// A finalized regex tier.
#[derive(Debug)]
pub struct RegexTier {
    phrases: PhraseIndex,
    by_phrase: Vec<Vec<Arc<CompiledRegexRule>>>,
    unpruned: Vec<Arc<CompiledRegexRule>>,
    rules: usize,
}

impl RegexTier {
    /// Record every rule whose regex matches `text`.
    ///
    /// Equivalent to testing each registered regex against `text`; regexes
    /// whose required literals are absent are skipped.
    pub fn find_matches(&self, text: &str, tally: &mut Tally) {
        let mut tried = FxHashSet::default();
        let mut evaluated = FxHashSet::default();
        self.phrases.scan(text.as_bytes(), |id| {
            if !tried.insert(id) {
                return;
            }
            for r in &self.by_phrase[id.0] {
                // a rule filed under several literals runs once per call
                if evaluated.insert(Arc::as_ptr(r)) && r.is_match(text) {
                    tally.record(&r.rule);
                }
            }
        });

        for r in &self.unpruned {
            if r.is_match(text) {
                tally.record(&r.rule);
            }
        }
    }

    /// Number of distinct rules in the tier.
    pub fn len(&self) -> usize {
        self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules == 0
    }

    /// Number of rules evaluated on every call.
    pub fn unpruned_len(&self) -> usize {
        self.unpruned.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleKind;

    fn rule(pattern: &str) -> Rule {
        Rule::new(RuleKind::UrlRegex, pattern)
    }

    fn matches(tier: &RegexTier, text: &str) -> Vec<String> {
        let mut tally = Tally::new();
        tier.find_matches(text, &mut tally);
        tally.to_sorted_counts().into_keys().collect()
    }

    #[test]
    fn invalid_regex_is_dropped() {
        let mut b = RegexTierBuilder::new();
        assert!(!b.add_rule(rule("(unclosed")));
        assert!(b.add_rule(rule("casino")));
        assert_eq!(b.rejected(), 1);
        let tier = b.finalize().unwrap();
        assert_eq!(tier.len(), 1);
        assert_eq!(matches(&tier, "online-casino.example"), vec!["/casino/"]);
    }

    #[test]
    fn literal_free_rules_always_tried() {
        let mut b = RegexTierBuilder::new();
        b.add_rule(rule(r"^\d+$"));
        b.add_rule(rule("tracker"));
        let tier = b.finalize().unwrap();
        assert_eq!(tier.unpruned_len(), 1);
        assert_eq!(matches(&tier, "12345"), vec![r"/^\d+$/"]);
        assert!(matches(&tier, "abc").is_empty());
    }

    #[test]
    fn rule_with_several_literals_recorded_once() {
        let mut b = RegexTierBuilder::new();
        b.add_rule(rule("poker|casino"));
        let tier = b.finalize().unwrap();
        assert_eq!(tier.len(), 1);

        let mut tally = Tally::new();
        tier.find_matches("poker and casino", &mut tally);
        assert_eq!(tally.len(), 1);
        assert_eq!(tally.iter().map(|(_, n)| n).sum::<u32>(), 1);
    }

    #[test]
    fn literal_present_but_regex_fails() {
        let mut b = RegexTierBuilder::new();
        b.add_rule(rule(r"^ads\."));
        let tier = b.finalize().unwrap();
        assert!(matches(&tier, "x.ads.example").is_empty());
        assert_eq!(matches(&tier, "ads.example"), vec![r"/^ads\./"]);
    }
}
