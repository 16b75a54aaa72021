//! Literal URL fragment lookup.

use rustc_hash::FxHashMap;

use crate::rule::Rule;

/// Exact-match map from lower-cased host or host+path strings to rules.
#[derive(Debug, Default)]
pub struct FragmentMap {
    map: FxHashMap<String, Rule>,
}

impl FragmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule under its pattern. A later rule for the same key
    /// replaces the earlier one.
    pub fn insert(&mut self, rule: Rule) -> Option<Rule> {
        self.map.insert(rule.pattern().to_lowercase(), rule)
    }

    pub fn get(&self, key: &str) -> Option<&Rule> {
        self.map.get(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
