//! Advisory validation of a model/tool selection against parsed directives.
//!
//! A violation never hard-fails the request: the orchestrator retries once
//! with strengthened constraints, then proceeds regardless, logging the
//! outcome.

use super::ParsedInstructions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub violations: Vec<String>,
}

impl ValidationReport {
    pub fn ok() -> Self {
        ValidationReport {
            valid: true,
            violations: vec![],
        }
    }
}

/// Check the actual selection against what the user explicitly asked for.
///
/// Two violation classes: a named model category the selection doesn't match,
/// and a mandatory tool that was never invoked.
pub fn validate_against_instructions(
    parsed: &ParsedInstructions,
    selected_model: &str,
    selected_tools: &[String],
) -> ValidationReport {
    let mut violations = Vec::new();

    let prefs = &parsed.model_preferences;
    if !prefs.is_empty() {
        let matches_preference = prefs.all().any(|m| m == selected_model);
        // Tool-mediated capabilities count: a requested search provider is
        // honored when the search tool ran, even if the top-level model
        // differs.
        let search_honored = !prefs.search.is_empty()
            && selected_tools.iter().any(|t| t == "web_search");
        let image_honored = !prefs.image.is_empty()
            && selected_tools.iter().any(|t| t == "generate_image");

        if !matches_preference && !search_honored && !image_honored {
            let wanted: Vec<&str> = prefs.all().map(String::as_str).collect();
            violations.push(format!(
                "User requested {} but '{}' was selected",
                wanted.join(" or "),
                selected_model
            ));
        }
    }

    for tool in &parsed.tool_requirements.must_use_tools {
        if !selected_tools.contains(tool) {
            violations.push(format!("Required tool '{}' was never invoked", tool));
        }
    }

    ValidationReport {
        valid: violations.is_empty(),
        violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::parse_instructions;

    #[test]
    fn test_missing_must_use_tool_is_one_violation() {
        // Scenario: selection omits a mandatory tool
        let mut parsed = ParsedInstructions::default();
        parsed
            .tool_requirements
            .must_use_tools
            .push("web_search".to_string());

        let report = validate_against_instructions(&parsed, "gpt-4o", &[]);
        assert!(!report.valid);
        assert_eq!(report.violations.len(), 1);
        assert!(report.violations[0].contains("web_search"));
    }

    #[test]
    fn test_must_use_tool_satisfied() {
        let mut parsed = ParsedInstructions::default();
        parsed
            .tool_requirements
            .must_use_tools
            .push("web_search".to_string());

        let report =
            validate_against_instructions(&parsed, "gpt-4o", &["web_search".to_string()]);
        assert!(report.valid);
    }

    #[test]
    fn test_named_model_mismatch() {
        let parsed = parse_instructions("use claude for this analysis");
        let report = validate_against_instructions(&parsed, "gpt-4o-mini", &[]);
        assert!(!report.valid);
        assert!(report.violations[0].contains("claude-sonnet-4"));
    }

    #[test]
    fn test_named_model_match() {
        let parsed = parse_instructions("use claude for this analysis");
        let report = validate_against_instructions(&parsed, "claude-sonnet-4", &[]);
        assert!(report.valid);
    }

    #[test]
    fn test_search_preference_honored_through_tool() {
        let parsed = parse_instructions("search with sonar for updates");
        let report = validate_against_instructions(
            &parsed,
            "gpt-4o-mini",
            &["web_search".to_string()],
        );
        assert!(report.valid, "violations: {:?}", report.violations);
    }

    #[test]
    fn test_no_directives_always_valid() {
        let parsed = ParsedInstructions::default();
        let report = validate_against_instructions(&parsed, "anything", &[]);
        assert!(report.valid);
    }
}
