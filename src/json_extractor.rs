//! JSON Extractor — parse a raw text blob that should contain a JSON object,
//! falling back to locating the outermost balanced `{...}` substring
//! (spec.md §4.5.1).
//!
//! Grounded in `selvage/src/utils/json_extractor.py` and
//! `JSONParsingError.from_parsing_exception`'s truncated-excerpt behavior
//! ([`crate::error::truncate_excerpt`]). Balanced-brace scanning is done with
//! a hand-written scanner rather than `regex`, since a single regular
//! expression cannot correctly match nested balanced braces.

use serde::de::DeserializeOwned;

use crate::error::{truncate_excerpt, GatewayError};

/// Attempts `serde_json::from_str` directly; on failure, scans for the
/// outermost balanced `{...}` substring and retries. Returns
/// `GatewayError::JsonParsing` carrying a ≤500-char excerpt on total failure.
pub fn extract<T: DeserializeOwned>(raw: &str) -> Result<T, GatewayError> {
    if let Ok(value) = serde_json::from_str::<T>(raw) {
        return Ok(value);
    }

    match find_outermost_object(raw) {
        Some(candidate) => serde_json::from_str::<T>(candidate).map_err(|e| GatewayError::JsonParsing {
            message: e.to_string(),
            excerpt: truncate_excerpt(raw),
        }),
        None => Err(GatewayError::JsonParsing {
            message: "no balanced JSON object found in response".to_string(),
            excerpt: truncate_excerpt(raw),
        }),
    }
}

/// Scans `text` for the first `{` and returns the substring up to its
/// matching `}`, respecting string literals and escape sequences so that
/// braces inside quoted strings do not affect the balance count.
fn find_outermost_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;

    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[start..=i]);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        summary: String,
        score: Option<f64>,
    }

    #[test]
    fn parses_clean_json_directly() {
        let raw = r#"{"summary": "fine", "score": 9.0}"#;
        let parsed: Payload = extract(raw).unwrap();
        assert_eq!(parsed.summary, "fine");
    }

    #[test]
    fn recovers_json_embedded_in_prose() {
        let raw = format!(
            "Sure, here is the review:\n{}\nHope that helps!",
            r#"{"summary": "looks good", "score": null}"#
        );
        let parsed: Payload = extract(&raw).unwrap();
        assert_eq!(parsed.summary, "looks good");
        assert_eq!(parsed.score, None);
    }

    #[test]
    fn handles_braces_inside_string_values() {
        let raw = r#"noise {"summary": "uses { and } in prose", "score": 1.0} trailing"#;
        let parsed: Payload = extract(raw).unwrap();
        assert_eq!(parsed.summary, "uses { and } in prose");
    }

    #[test]
    fn total_failure_carries_truncated_excerpt() {
        let raw = "not json at all, no braces here".to_string();
        let err = extract::<Payload>(&raw).unwrap_err();
        match err {
            GatewayError::JsonParsing { excerpt, .. } => assert_eq!(excerpt, raw),
            other => panic!("expected JsonParsing, got {other:?}"),
        }
    }
}
