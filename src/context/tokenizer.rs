//! Content-aware token estimation for context budgeting
//!
//! Rough estimation only: character count divided by a content-dependent
//! factor, plus per-message framing overhead. The budget it feeds is a soft
//! ceiling with headroom, not a hard protocol limit.

use crate::types::MessageRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenEstimator {
    /// Simple heuristic: chars / 3.5
    Heuristic,
    /// Content-aware estimation based on text type
    ContentAware,
}

impl Default for TokenEstimator {
    fn default() -> Self {
        TokenEstimator::ContentAware
    }
}

impl TokenEstimator {
    /// Estimate tokens for a message with role context
    pub fn estimate_message(&self, content: &str, role: MessageRole) -> u32 {
        match self {
            TokenEstimator::Heuristic => heuristic_estimate(content),
            TokenEstimator::ContentAware => content_aware_estimate(content, role),
        }
    }

    /// Estimate tokens for raw text (no role context)
    pub fn estimate_text(&self, text: &str) -> u32 {
        match self {
            TokenEstimator::Heuristic => heuristic_estimate(text),
            TokenEstimator::ContentAware => content_aware_text_estimate(text),
        }
    }
}

/// ~3.5 characters per token for English text
fn heuristic_estimate(text: &str) -> u32 {
    let chars = text.chars().count();
    ((chars as f64) / 3.5).ceil() as u32
}

fn content_aware_text_estimate(text: &str) -> u32 {
    let chars = text.chars().count();
    if chars == 0 {
        return 0;
    }

    let divisor = if is_json_content(text) {
        2.5 // JSON has more tokens per char (punctuation, short keys)
    } else if is_code_content(text) {
        3.0 // code has symbols, keywords, indentation
    } else {
        3.5 // standard prose
    };

    ((chars as f64) / divisor).ceil() as u32
}

fn content_aware_estimate(text: &str, role: MessageRole) -> u32 {
    let base = content_aware_text_estimate(text);

    // Message framing tokens
    let overhead = match role {
        MessageRole::Tool => 8,
        MessageRole::System => 6,
        MessageRole::User | MessageRole::Assistant => 4,
    };

    base + overhead
}

fn is_json_content(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }

    let starts_json = trimmed.starts_with('{') || trimmed.starts_with('[');
    let ends_json = trimmed.ends_with('}') || trimmed.ends_with(']');
    if starts_json && ends_json {
        return true;
    }

    let json_chars = text
        .chars()
        .filter(|c| matches!(c, '{' | '}' | '[' | ']' | ':' | '"'))
        .count();
    let total_chars = text.chars().count();

    if total_chars > 20 {
        (json_chars as f64 / total_chars as f64) > 0.10
    } else {
        false
    }
}

fn is_code_content(text: &str) -> bool {
    if text.contains("```") {
        return true;
    }

    let code_indicators = [
        "fn ", "def ", "function ", "class ", "impl ", "pub ", "const ",
        "let ", "var ", "import ", "from ", "require(", "async ", "await ",
        "return ", "if (", "for (", "while (", "match ", "struct ", "enum ",
    ];
    for indicator in code_indicators {
        if text.contains(indicator) {
            return true;
        }
    }

    let code_chars = text
        .chars()
        .filter(|c| matches!(c, '{' | '}' | '(' | ')' | ';' | '=' | '<' | '>'))
        .count();
    let total_chars = text.chars().count();

    if total_chars > 50 {
        (code_chars as f64 / total_chars as f64) > 0.05
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_estimate() {
        assert_eq!(heuristic_estimate("hello"), 2); // 5 chars / 3.5 -> 2
        assert_eq!(heuristic_estimate(""), 0);
    }

    #[test]
    fn test_json_detection() {
        assert!(is_json_content(r#"{"key": "value"}"#));
        assert!(is_json_content(r#"[1, 2, 3]"#));
        assert!(!is_json_content("Hello, world!"));
        assert!(!is_json_content(""));
    }

    #[test]
    fn test_code_detection() {
        assert!(is_code_content("fn main() { println!(\"hello\"); }"));
        assert!(is_code_content("```rust\nlet x = 5;\n```"));
        assert!(!is_code_content("Hello, this is a normal sentence."));
    }

    #[test]
    fn test_json_denser_than_prose() {
        let json = r#"{"key": "value", "nested": {"a": 1, "b": 2}}"#;
        let prose = "The quick brown fox jumps over the lazy dog.";

        let json_ratio = json.len() as f64 / content_aware_text_estimate(json) as f64;
        let prose_ratio = prose.len() as f64 / content_aware_text_estimate(prose) as f64;
        assert!(json_ratio < prose_ratio, "JSON should have higher token density");
    }

    #[test]
    fn test_role_overhead() {
        let base = content_aware_text_estimate("Hello");
        assert_eq!(content_aware_estimate("Hello", MessageRole::User), base + 4);
        assert_eq!(content_aware_estimate("Hello", MessageRole::Tool), base + 8);
    }
}
