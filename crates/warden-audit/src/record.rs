//! Audit record layouts.
//!
//! Each record renders to an ordered list of string fields; the sink adds
//! the timestamp in front.

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;
use warden_core::defaults::DEFAULT_AUDIT_TITLE_MAX;
use warden_rules::{Rule, Tally};

/// Current local time (UTC when the local offset is unknown), with
/// microseconds.
pub fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format_timestamp(now)
}

pub fn format_timestamp(t: OffsetDateTime) -> String {
    t.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6]"
    ))
    .unwrap_or_default()
}

/// Malware scanner verdict. Only ever formatted, never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanVerdict {
    pub status: String,
    #[serde(default)]
    pub signature: String,
}

impl fmt::Display for ScanVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.signature.is_empty() {
            f.write_str(&self.status)
        } else {
            write!(f, "{} {}", self.status, self.signature)
        }
    }
}

/// One proxied request.
#[derive(Debug, Clone, Default)]
pub struct AccessRecord {
    pub user: String,
    /// Empty means `allow`.
    pub action: String,
    pub url: String,
    pub method: String,
    /// `None` when no response was received.
    pub status: Option<u16>,
    /// Raw `Content-Type` header.
    pub content_type: String,
    /// `None` when unknown.
    pub content_length: Option<u64>,
    pub pruned: bool,
    /// Matched rules in text form with their hit counts.
    pub tally: BTreeMap<String, u32>,
    pub scores: BTreeMap<String, i64>,
    pub conditions: String,
    pub title: String,
    pub ignored: Vec<String>,
    pub user_agent: String,
    pub proto: String,
    pub referer: String,
    /// Raw `Content-Disposition` header of the response.
    pub content_disposition: String,
    pub scan: Option<ScanVerdict>,
    pub description: String,
    /// Client address, with or without a port.
    pub client_addr: String,
    pub extra: Option<serde_json::Value>,
}

impl AccessRecord {
    pub fn with_tally(mut self, tally: &Tally) -> Self {
        self.tally = tally.to_sorted_counts();
        self
    }

    /// Take action, description and conditions from the deciding rule.
    pub fn with_rule(mut self, rule: &Rule) -> Self {
        self.action = rule.action().as_str().to_string();
        self.description = rule.description().to_string();
        self.conditions = rule.conditions().join(" ");
        self
    }

    /// Fields in log order. The user agent column stays empty unless
    /// `log_user_agent` is set.
    pub fn fields(&self, log_user_agent: bool) -> Vec<String> {
        let action = if self.action.is_empty() {
            "allow"
        } else {
            &self.action
        };
        vec![
            self.user.clone(),
            action.to_string(),
            self.url.clone(),
            self.method.clone(),
            self.status.unwrap_or(0).to_string(),
            media_type(&self.content_type),
            self.content_length
                .map_or_else(|| "-1".to_string(), |n| n.to_string()),
            if self.pruned { "pruned" } else { "" }.to_string(),
            list_counts(&self.tally),
            list_counts(&self.scores),
            self.conditions.clone(),
            truncate(&self.title, DEFAULT_AUDIT_TITLE_MAX).to_string(),
            self.ignored.join(","),
            if log_user_agent {
                self.user_agent.clone()
            } else {
                String::new()
            },
            self.proto.clone(),
            self.referer.clone(),
            downloaded_filename(&self.content_disposition).unwrap_or_default(),
            self.scan.as_ref().map(ToString::to_string).unwrap_or_default(),
            self.description.clone(),
            client_ip(&self.client_addr),
            self.extra
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        ]
    }
}

/// One TLS connection attempt.
#[derive(Debug, Clone, Default)]
pub struct TlsRecord {
    pub user: String,
    pub server_name: String,
    pub server_addr: String,
    pub error: Option<String>,
    pub cached_certificate: bool,
    pub fingerprint: String,
}

impl TlsRecord {
    pub fn fields(&self) -> Vec<String> {
        vec![
            self.user.clone(),
            self.server_name.clone(),
            self.server_addr.clone(),
            self.error.clone().unwrap_or_default(),
            if self.cached_certificate {
                "cached certificate"
            } else {
                ""
            }
            .to_string(),
            self.fingerprint.clone(),
        ]
    }
}

/// `"a 1, b 2"`, in key order.
fn list_counts<V: fmt::Display>(counts: &BTreeMap<String, V>) -> String {
    counts
        .iter()
        .map(|(key, n)| format!("{key} {n}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Media type without parameters, lower-cased.
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// `filename` parameter of a `Content-Disposition` value. An RFC 5987
/// `filename*` takes precedence.
fn downloaded_filename(disposition: &str) -> Option<String> {
    let mut plain = None;
    for param in disposition.split(';').skip(1) {
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match name.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let encoded = value.splitn(3, '\'').nth(2)?;
                return Some(percent_decode_str(encoded).decode_utf8_lossy().into_owned());
            }
            "filename" => {
                let value = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value);
                plain = Some(value.to_string());
            }
            _ => {}
        }
    }
    plain
}

/// Client address without its port.
fn client_ip(addr: &str) -> String {
    addr.parse::<SocketAddr>()
        .map(|sa| sa.ip().to_string())
        .unwrap_or_else(|_| addr.to_string())
}
