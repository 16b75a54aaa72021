//! URL rule matching engine for warden.
//!
//! Decides which policy rules match a request URL. Rules come in five
//! kinds: literal URL fragments (`example.com/login`) and regular
//! expressions applied to the whole URL, the host, the path or the query.
//!
//! # Architecture
//!
//! - **Matchers**: `PhraseIndex` (Aho-Corasick over required literals),
//!   `RegexTier` (regexes bucketed by the literals they require),
//!   `FragmentMap` (exact host / host+path lookup)
//! - **Literal extraction**: `literal` derives required substrings from a
//!   regex's HIR so most regexes are only tried when their literal occurs
//! - **Parsers/Providers**: line-oriented rule lists loaded from files
//! - **Engine**: `UrlMatcherBuilder` collects rules and `finalize()`s into an
//!   immutable, shareable `UrlMatcher`
//!
//! # Example
//!
//! ```
//! use warden_rules::{Rule, RuleKind, UrlMatcherBuilder};
//!
//! let mut builder = UrlMatcherBuilder::new();
//! builder.add_rule(Rule::new(RuleKind::HostRegex, r"^ads\."));
//! builder.add_rule(Rule::new(RuleKind::UrlFragment, "example.com/login"));
//! let matcher = builder.finalize().unwrap();
//!
//! let url = url::Url::parse("http://ads.example.com/login").unwrap();
//! let tally = matcher.matching_rules(&url);
//! assert_eq!(tally.len(), 2);
//! ```

pub mod engine;
pub mod error;
pub mod literal;
pub mod matcher;
pub mod normalize;
pub mod parser;
pub mod provider;
pub mod rule;
pub mod tally;

pub use engine::{UrlMatcher, UrlMatcherBuilder};
pub use error::RulesError;
pub use normalize::UrlParts;
pub use provider::FileProvider;
pub use rule::{Action, Rule, RuleKind, RuleSource};
pub use tally::Tally;
