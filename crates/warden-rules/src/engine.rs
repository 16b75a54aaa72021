//! URL matcher: routes rules into tiers and matches request URLs.

use tracing::info;
use url::Url;

use crate::error::RulesError;
use crate::matcher::{FragmentMap, RegexTier, RegexTierBuilder};
use crate::normalize::{UrlParts, normalize_host, normalize_query};
use crate::rule::{Rule, RuleKind};
use crate::tally::Tally;

/// Builder for constructing a `UrlMatcher`.
///
/// Not safe for concurrent mutation; load every rule, then call
/// [`finalize`](Self::finalize) once.
#[derive(Debug, Default)]
pub struct UrlMatcherBuilder {
    fragments: FragmentMap,
    url: RegexTierBuilder,
    host: RegexTierBuilder,
    path: RegexTierBuilder,
    query: RegexTierBuilder,
}

impl UrlMatcherBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule to the tier selected by its kind.
    ///
    /// Returns false if the rule was dropped because its regex does not
    /// compile.
    pub fn add_rule(&mut self, rule: Rule) -> bool {
        match rule.kind() {
            RuleKind::UrlFragment => {
                self.fragments.insert(rule);
                true
            }
            RuleKind::UrlRegex => self.url.add_rule(rule),
            RuleKind::HostRegex => self.host.add_rule(rule),
            RuleKind::PathRegex => self.path.add_rule(rule),
            RuleKind::QueryRegex => self.query.add_rule(rule),
        }
    }

    /// Add several rules, returning how many were kept.
    pub fn add_rules(&mut self, rules: impl IntoIterator<Item = Rule>) -> usize {
        let mut kept = 0;
        for rule in rules {
            if self.add_rule(rule) {
                kept += 1;
            }
        }
        kept
    }

    /// Build the phrase automata of all four tiers.
    pub fn finalize(self) -> Result<UrlMatcher, RulesError> {
        let matcher = UrlMatcher {
            fragments: self.fragments,
            url: self.url.finalize()?,
            host: self.host.finalize()?,
            path: self.path.finalize()?,
            query: self.query.finalize()?,
        };

        warden_metrics::set_rules_loaded("fragment", matcher.fragments.len());
        warden_metrics::set_rules_loaded("url", matcher.url.len());
        warden_metrics::set_rules_loaded("host", matcher.host.len());
        warden_metrics::set_rules_loaded("path", matcher.path.len());
        warden_metrics::set_rules_loaded("query", matcher.query.len());
        info!(
            fragments = matcher.fragments.len(),
            url = matcher.url.len(),
            host = matcher.host.len(),
            path = matcher.path.len(),
            query = matcher.query.len(),
            "url matcher finalized"
        );
        Ok(matcher)
    }
}

/// Finalized URL matcher.
///
/// Send + Sync and read-only, designed to be shared via `Arc<UrlMatcher>`.
#[derive(Debug)]
pub struct UrlMatcher {
    fragments: FragmentMap,
    url: RegexTier,
    host: RegexTier,
    path: RegexTier,
    query: RegexTier,
}

impl UrlMatcher {
    /// Rules matching a parsed URL.
    pub fn matching_rules(&self, url: &Url) -> Tally {
        self.matching_parts(&UrlParts::from(url))
    }

    /// Rules matching the given URL components.
    pub fn matching_parts(&self, parts: &UrlParts) -> Tally {
        let mut tally = Tally::new();
        let host = normalize_host(&parts.host);

        let mut url_string = String::new();
        if !parts.scheme.is_empty() {
            url_string.push_str(&parts.scheme.to_lowercase());
            url_string.push(':');
        }
        if !host.is_empty() {
            url_string.push_str("//");
            url_string.push_str(&host);
            self.host.find_matches(&host, &mut tally);
        }

        let path = parts.path.to_lowercase();
        self.path.find_matches(&path, &mut tally);
        url_string.push_str(&path);

        let query = normalize_query(&parts.query);
        if !query.is_empty() {
            self.query.find_matches(&query, &mut tally);
            url_string.push('?');
            url_string.push_str(&query);
        }

        self.url.find_matches(&url_string, &mut tally);
        self.match_fragments(&host, &path, &mut tally);
        tally
    }

    /// Look up the host and each parent domain, alone and combined with
    /// every `/`-delimited prefix of the path.
    fn match_fragments(&self, host: &str, path: &str, tally: &mut Tally) {
        if self.fragments.is_empty() {
            return;
        }

        let mut s = host;
        loop {
            let mut s2 = format!("{s}{path}");
            while s2.len() > 1 {
                self.probe(&s2, tally);
                let last = s2.char_indices().next_back().map_or(0, |(i, _)| i);
                match s2[..last].rfind('/') {
                    Some(slash) => s2.truncate(slash + 1),
                    None => break,
                }
            }

            self.probe(s, tally);
            match s.find('.') {
                Some(dot) => s = &s[dot + 1..],
                None => break,
            }
        }
    }

    fn probe(&self, key: &str, tally: &mut Tally) {
        if key.is_empty() {
            return;
        }
        if let Some(rule) = self.fragments.get(key) {
            tally.record(rule);
        }
        // "example.com/sub" also covers "example.com/sub/..."
        if let Some(trimmed) = key.strip_suffix('/')
            && !trimmed.is_empty()
            && let Some(rule) = self.fragments.get(trimmed)
        {
            tally.record(rule);
        }
    }

    /// Total number of rules across all tiers.
    pub fn rule_count(&self) -> usize {
        self.fragments.len() + self.url.len() + self.host.len() + self.path.len() + self.query.len()
    }
}
