//! Matchers used by the URL matching tiers.

pub mod fragment;
pub mod phrase;
pub mod regex_tier;

pub use fragment::FragmentMap;
pub use phrase::{PhraseId, PhraseIndex, PhraseIndexBuilder};
pub use regex_tier::{CompiledRegexRule, RegexTier, RegexTierBuilder};
