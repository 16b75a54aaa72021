//! Rule text and rule-list parsers.

pub mod list;

pub use list::{parse_rule, parse_rule_list};
