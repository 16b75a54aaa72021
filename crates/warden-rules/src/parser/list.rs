//! Rule-list parser.
//!
//! One rule per line:
//!
//! ```text
//! # comment
//! example.com              # fragment (host, or host+path)
//! /casino|poker/           # regex over the whole URL
//! /^ads?\./h # ad hosts    # host regex, trailing description
//! /\.exe$/p                # path regex
//! /affiliate=/q            # query regex
//! ```

use crate::error::RulesError;
use crate::rule::{Rule, RuleKind, RuleSource};

/// Parse a single rule from its text form.
///
/// Text wrapped in slashes is a regex; an optional suffix after the closing
/// slash selects the host (`h`), path (`p`) or query (`q`) tier. Anything
/// else is a URL fragment, lower-cased with any `http://` or `https://`
/// prefix removed.
pub fn parse_rule(text: &str) -> Result<(RuleKind, String), RulesError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(RulesError::Parse("empty rule".into()));
    }

    let Some(body) = text.strip_prefix('/') else {
        let lower = text.to_lowercase();
        let fragment = lower
            .strip_prefix("http://")
            .or_else(|| lower.strip_prefix("https://"))
            .unwrap_or(&lower);
        if fragment.is_empty() {
            return Err(RulesError::Parse(format!("empty URL fragment: {text}")));
        }
        return Ok((RuleKind::UrlFragment, fragment.to_string()));
    };

    let close = body
        .rfind('/')
        .ok_or_else(|| RulesError::Parse(format!("unterminated regex: {text}")))?;
    let (pattern, suffix) = (&body[..close], &body[close + 1..]);
    if pattern.is_empty() {
        return Err(RulesError::Parse(format!("empty regex: {text}")));
    }

    let kind = match suffix {
        "" => RuleKind::UrlRegex,
        "h" => RuleKind::HostRegex,
        "p" => RuleKind::PathRegex,
        "q" => RuleKind::QueryRegex,
        other => return Err(RulesError::InvalidRuleKind(format!("/{other} in {text}"))),
    };
    Ok((kind, pattern.to_string()))
}

/// Parse a rule list, attaching the source's attributes to every rule.
///
/// Lines starting with `#` are comments and empty lines are skipped. A
/// ` #` preceded by whitespace starts a per-line description that overrides
/// the source description.
pub fn parse_rule_list(content: &str, source: &RuleSource) -> Result<Vec<Rule>, RulesError> {
    let mut rules = Vec::new();

    for (n, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (text, description) = split_description(line);
        let (kind, pattern) = parse_rule(text)
            .map_err(|e| RulesError::Parse(format!("line {}: {e}", n + 1)))?;

        let mut rule = Rule::from_source(kind, pattern, source);
        if let Some(description) = description {
            rule = rule.with_description(description);
        }
        rules.push(rule);
    }

    Ok(rules)
}

fn split_description(line: &str) -> (&str, Option<&str>) {
    let bytes = line.as_bytes();
    for (i, _) in line.match_indices('#') {
        if i > 0 && bytes[i - 1].is_ascii_whitespace() {
            let description = line[i + 1..].trim();
            let description = (!description.is_empty()).then_some(description);
            return (line[..i].trim_end(), description);
        }
    }
    (line, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Action;

    #[test]
    fn parse_kinds() {
        assert_eq!(
            parse_rule("Example.COM/Login").unwrap(),
            (RuleKind::UrlFragment, "example.com/login".into())
        );
        assert_eq!(
            parse_rule("https://example.com").unwrap(),
            (RuleKind::UrlFragment, "example.com".into())
        );
        assert_eq!(parse_rule("/a+/").unwrap(), (RuleKind::UrlRegex, "a+".into()));
        assert_eq!(parse_rule("/^ads/h").unwrap(), (RuleKind::HostRegex, "^ads".into()));
        assert_eq!(parse_rule("/x/y/p").unwrap(), (RuleKind::PathRegex, "x/y".into()));
        assert_eq!(parse_rule("/id=/q").unwrap(), (RuleKind::QueryRegex, "id=".into()));
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(parse_rule("  "), Err(RulesError::Parse(_))));
        assert!(matches!(parse_rule("/abc"), Err(RulesError::Parse(_))));
        assert!(matches!(parse_rule("//h"), Err(RulesError::Parse(_))));
        assert!(matches!(parse_rule("/abc/z"), Err(RulesError::InvalidRuleKind(_))));
    }

    #[test]
    fn list_with_comments_and_descriptions() {
        let content = "\
# advertising
ads.example.com
/^banners?\\./h # banner hosts

/tracking#frag/
";
        let source = RuleSource::new("ads", Action::Block);
        let rules = parse_rule_list(content, &source).unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].pattern(), "ads.example.com");
        assert_eq!(rules[0].id(), "ads");
        assert_eq!(rules[1].kind(), RuleKind::HostRegex);
        assert_eq!(rules[1].description(), "banner hosts");
        // '#' without leading whitespace belongs to the rule
        assert_eq!(rules[2].pattern(), "tracking#frag");
    }

    #[test]
    fn list_error_reports_line() {
        let err = parse_rule_list("ok.com\n/broken/x\n", &RuleSource::default()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
