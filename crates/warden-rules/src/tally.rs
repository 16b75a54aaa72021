//! Per-request set of matched rules.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::rule::Rule;

/// Rules matched by one request, each mapped to a non-zero count.
///
/// URL matching only ever records a flag of 1; content scorers that share
/// the type may accumulate larger counts through [`Tally::add`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    hits: FxHashMap<Rule, u32>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `rule` as matched. Recording a rule twice keeps a single entry.
    pub fn record(&mut self, rule: &Rule) {
        self.hits.entry(rule.clone()).or_insert(1);
    }

    /// Add `count` occurrences of `rule`. A zero count is ignored.
    pub fn add(&mut self, rule: &Rule, count: u32) {
        if count == 0 {
            return;
        }
        *self.hits.entry(rule.clone()).or_insert(0) += count;
    }

    pub fn contains(&self, rule: &Rule) -> bool {
        self.hits.contains_key(rule)
    }

    pub fn get(&self, rule: &Rule) -> Option<u32> {
        self.hits.get(rule).copied()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rule, u32)> {
        self.hits.iter().map(|(rule, count)| (rule, *count))
    }

    /// Rules in their text form, sorted, with their counts.
    pub fn to_sorted_counts(&self) -> BTreeMap<String, u32> {
        self.hits
            .iter()
            .map(|(rule, count)| (rule.to_string(), *count))
            .collect()
    }
}

impl<'a> IntoIterator for &'a Tally {
    type Item = (&'a Rule, u32);
    type IntoIter = Box<dyn Iterator<Item = (&'a Rule, u32)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
