//! Parsing for the `Authorization: Digest ...` header (RFC 2617).

use std::collections::HashMap;

/// Parsed `key="value"` (or unquoted `key=value`) pairs from a
/// `Authorization: Digest ...` header.
#[derive(Debug, Clone, Default)]
pub struct DigestParams {
    params: HashMap<String, String>,
}

impl DigestParams {
    /// Parses the portion of the header after the `Digest` scheme token.
    /// Tolerates unquoted values and arbitrary whitespace around commas,
    /// matching the authenticator's contract in spec.md §4.1.
    pub fn parse(header_value: &str) -> Self {
        let rest = header_value
            .trim()
            .strip_prefix("Digest")
            .unwrap_or(header_value)
            .trim_start();

        let mut params = HashMap::new();
        for part in split_params(rest) {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            params.insert(key, value.to_string());
        }
        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn username(&self) -> Option<&str> {
        self.get("username")
    }
    pub fn realm(&self) -> Option<&str> {
        self.get("realm")
    }
    pub fn nonce(&self) -> Option<&str> {
        self.get("nonce")
    }
    pub fn uri(&self) -> Option<&str> {
        self.get("uri")
    }
    pub fn response(&self) -> Option<&str> {
        self.get("response")
    }
    pub fn algorithm(&self) -> Option<&str> {
        self.get("algorithm")
    }
    pub fn cnonce(&self) -> Option<&str> {
        self.get("cnonce")
    }
    pub fn nc(&self) -> Option<&str> {
        self.get("nc")
    }
    pub fn qop(&self) -> Option<&str> {
        self.get("qop")
    }

    /// True when `username`, `nonce`, `uri` and `response` are all
    /// present and non-empty, the minimum the authenticator requires.
    pub fn has_required_fields(&self) -> bool {
        [self.username(), self.nonce(), self.uri(), self.response()]
            .into_iter()
            .all(|v| v.is_some_and(|s| !s.is_empty()))
    }
}

/// Splits on commas that are not inside a quoted string.
fn split_params(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, ch) in s.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail = s[start..].trim();
    if !tail.is_empty() {
        parts.push(tail);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_and_unquoted_values() {
        let header = r#"Digest username="alice", realm="gosip", nonce="abc123", uri="sip:gosip", response="deadbeef", algorithm=MD5"#;
        let params = DigestParams::parse(header);
        assert_eq!(params.username(), Some("alice"));
        assert_eq!(params.realm(), Some("gosip"));
        assert_eq!(params.nonce(), Some("abc123"));
        assert_eq!(params.uri(), Some("sip:gosip"));
        assert_eq!(params.response(), Some("deadbeef"));
        assert_eq!(params.algorithm(), Some("MD5"));
        assert!(params.has_required_fields());
    }

    #[test]
    fn missing_required_field_is_detected() {
        let params = DigestParams::parse(r#"Digest username="alice", realm="gosip""#);
        assert!(!params.has_required_fields());
    }
}
