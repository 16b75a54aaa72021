//! Multi-pattern literal scanner.
//!
//! `PhraseIndexBuilder` collects literals; `finalize()` builds an
//! Aho-Corasick automaton (failure transitions included) and yields a
//! read-only `PhraseIndex`. Scanning is O(text length) regardless of how many
//! phrases are registered.

use aho_corasick::{AhoCorasick, MatchKind};
use rustc_hash::FxHashMap;

use crate::error::RulesError;

/// Identifier of a registered phrase, dense from zero in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhraseId(pub usize);

/// Mutable phase: collects phrases before the automaton is built.
#[derive(Debug, Default)]
pub struct PhraseIndexBuilder {
    phrases: Vec<Vec<u8>>,
    ids: FxHashMap<Vec<u8>, PhraseId>,
}

impl PhraseIndexBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a phrase, returning its id. Re-adding returns the same id.
    pub fn add_phrase(&mut self, phrase: &[u8]) -> PhraseId {
        if let Some(id) = self.ids.get(phrase) {
            return *id;
        }
        let id = PhraseId(self.phrases.len());
        self.phrases.push(phrase.to_vec());
        self.ids.insert(phrase.to_vec(), id);
        id
    }

    /// Number of distinct phrases.
    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    /// Returns true if no phrase was added.
    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Build the automaton.
    pub fn finalize(self) -> Result<PhraseIndex, RulesError> {
        let automaton = if self.phrases.is_empty() {
            None
        } else {
            // Standard semantics are required for overlapping iteration.
            let ac = AhoCorasick::builder()
                .match_kind(MatchKind::Standard)
                .build(&self.phrases)?;
            Some(ac)
        };
        Ok(PhraseIndex {
            automaton,
            phrases: self.phrases,
        })
    }
}

/// Immutable phase: a finalized automaton, safe for concurrent scans.
pub struct PhraseIndex {
    automaton: Option<AhoCorasick>,
    phrases: Vec<Vec<u8>>,
}

impl PhraseIndex {
    /// Report every registered phrase ending at each position of `text`.
    ///
    /// Overlapping occurrences are all reported, so a phrase occurring
    /// anywhere in the text is reported at least once. The same phrase may
    /// be reported more than once.
    pub fn scan(&self, text: &[u8], mut on_match: impl FnMut(PhraseId)) {
        let Some(ac) = &self.automaton else {
            return;
        };
        for m in ac.find_overlapping_iter(text) {
            on_match(PhraseId(m.pattern().as_usize()));
        }
    }

    /// The phrase registered under `id`.
    pub fn phrase(&self, id: PhraseId) -> Option<&[u8]> {
        self.phrases.get(id.0).map(Vec::as_slice)
    }

    /// Number of registered phrases.
    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    /// Returns true if there are no phrases.
    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

impl std::fmt::Debug for PhraseIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhraseIndex")
            .field("phrases", &self.phrases.len())
            .finish()
    }
}
