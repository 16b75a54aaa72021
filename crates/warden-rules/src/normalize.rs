//! URL decomposition and normalization for matching.

use percent_encoding::percent_decode_str;
use url::Url;

/// The URL components the matcher looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParts {
    pub scheme: String,
    /// Host as it appeared in the request, with an explicit port if any.
    pub host: String,
    /// Percent-decoded path.
    pub path: String,
    /// Raw (still escaped) query without the leading `?`.
    pub query: String,
}

impl UrlParts {
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        path: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            path: path.into(),
            query: query.into(),
        }
    }
}

impl From<&Url> for UrlParts {
    fn from(url: &Url) -> Self {
        let mut host = url.host_str().unwrap_or_default().to_string();
        if let Some(port) = url.port() {
            host.push(':');
            host.push_str(&port.to_string());
        }
        Self {
            scheme: url.scheme().to_string(),
            host,
            path: percent_decode_str(url.path()).decode_utf8_lossy().into_owned(),
            query: url.query().unwrap_or_default().to_string(),
        }
    }
}

/// Lower-case the host, drop any port and decode punycode labels.
pub fn normalize_host(host: &str) -> String {
    let host = strip_port(&host.to_lowercase()).to_string();
    if !host.contains("xn--") {
        return host;
    }
    host.split('.')
        .map(decode_label)
        .collect::<Vec<_>>()
        .join(".")
        .to_lowercase()
}

/// Strip a trailing `:port`. A colon inside a bracketed IPv6 literal is
/// part of the address and never treated as a port separator.
pub fn strip_port(host: &str) -> &str {
    match host.rfind(':') {
        Some(colon) if !host[colon..].contains(']') => &host[..colon],
        _ => host,
    }
}

fn decode_label(label: &str) -> String {
    label
        .strip_prefix("xn--")
        .and_then(idna::punycode::decode_to_string)
        .unwrap_or_else(|| label.to_string())
}

/// Lower-case and percent-decode a raw query.
///
/// Spaces produced by decoding are written back as `+`, matching form
/// encoding. A malformed escape or a decoded value that is not UTF-8 leaves
/// the (lower-cased) raw text in place.
pub fn normalize_query(query: &str) -> String {
    let lower = query.to_lowercase();
    if !escapes_are_valid(&lower) {
        return lower;
    }
    match percent_decode_str(&lower).decode_utf8() {
        Ok(decoded) => decoded.replace(' ', "+"),
        Err(_) => lower,
    }
}

fn escapes_are_valid(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}
