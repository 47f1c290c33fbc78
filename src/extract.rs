//! Best-effort JSON extraction from model output.
//!
//! Two-phase: strict parse first, then heuristic extraction (code fences,
//! balanced-brace scan anywhere in the text). Callers always get an Option
//! back, never an error; a degraded structure beats an aborted request.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static JSON_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*\n?([\s\S]*?)\n?```").unwrap());

/// Extract the first JSON object found in model output.
pub fn first_json_object(content: &str) -> Option<Value> {
    let content = content.trim();

    // Strict parse of the whole payload
    if let Ok(value) = serde_json::from_str::<Value>(content) {
        if value.is_object() {
            return Some(value);
        }
    }

    // Fenced code block
    if let Some(captures) = JSON_BLOCK.captures(content) {
        if let Some(json_match) = captures.get(1) {
            if let Ok(value) = serde_json::from_str::<Value>(json_match.as_str().trim()) {
                if value.is_object() {
                    return Some(value);
                }
            }
        }
    }

    // Balanced object anywhere in the text
    let start = content.find('{')?;
    let extracted = balanced_json(content, start)?;
    serde_json::from_str::<Value>(&extracted)
        .ok()
        .filter(|v| v.is_object())
}

/// Extract a balanced `{...}` starting at `start`, respecting strings and
/// escapes.
pub fn balanced_json(content: &str, start: usize) -> Option<String> {
    let bytes = content.as_bytes();
    if bytes.get(start) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(content[start..=i].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_parse() {
        let value = first_json_object(r#"{"type": "simple"}"#).unwrap();
        assert_eq!(value["type"], "simple");
    }

    #[test]
    fn test_code_fence() {
        let content = "Here you go:\n```json\n{\"steps\": []}\n```";
        let value = first_json_object(content).unwrap();
        assert!(value["steps"].is_array());
    }

    #[test]
    fn test_embedded_object_with_prose() {
        let content = "Sure! The plan is {\"step\": 1, \"note\": \"has {braces} in a string\"} as requested.";
        let value = first_json_object(content).unwrap();
        assert_eq!(value["step"], 1);
    }

    #[test]
    fn test_no_json_returns_none() {
        assert!(first_json_object("just prose, no structure").is_none());
        assert!(first_json_object("[1, 2, 3]").is_none());
    }

    #[test]
    fn test_unbalanced_returns_none() {
        assert!(first_json_object("{\"never\": \"closed\"").is_none());
    }
}
