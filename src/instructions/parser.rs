//! Pattern rules extracting explicit directives from the user message.

use super::{ModelPreferences, ParsedInstructions, References, ToolRequirements, Workflow};
use crate::entities::EntityKind;
use once_cell::sync::Lazy;
use regex::Regex;

/// (pattern, category, model id); first match per category wins
static MODEL_RULES: Lazy<Vec<(Regex, ModelCategory, &'static str)>> = Lazy::new(|| {
    let rule = |p: &str, c: ModelCategory, m: &'static str| (Regex::new(p).unwrap(), c, m);
    vec![
        rule(r"(?i)\bsonar\s+deep\s+research\b|\bdeep\s+research\b", ModelCategory::Search, "sonar-deep-research"),
        rule(r"(?i)\bsonar\b|\bperplexity\b", ModelCategory::Search, "sonar-pro"),
        rule(r"(?i)\bgemini\b|\bimagen\b", ModelCategory::Image, "gemini-2.5-flash-image"),
        rule(r"(?i)\bclaude\b|\bsonnet\b|\banthropic\b", ModelCategory::Reasoning, "claude-sonnet-4"),
        rule(r"(?i)\bgpt-?4o\b|\bopenai\b|\bchatgpt\b", ModelCategory::Reasoning, "gpt-4o"),
    ]
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelCategory {
    Search,
    Image,
    Reasoning,
}

static MUST_SEARCH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bsearch\s+(the\s+web|online|using|with|for)\b|\buse\s+(the\s+)?(web\s+)?search\b|\blook\s+(it\s+)?up\b")
        .unwrap()
});

static PREFER_SEARCH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\blatest\b|\bcurrent\b|\brecent\b|\btoday\b|\bnews\b").unwrap()
});

static MUST_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(generate|create|make|draw)\s+(an?\s+)?(image|picture|photo|illustration)\b")
        .unwrap()
});

/// (indicator pattern, entity kind). Bare "it" only counts when glued to an
/// action verb; a pure mention is not a reference.
static REFERENCE_RULES: Lazy<Vec<(Regex, Option<EntityKind>)>> = Lazy::new(|| {
    let rule = |p: &str, k: Option<EntityKind>| (Regex::new(p).unwrap(), k);
    vec![
        rule(r"(?i)\b(that|this|the|my)\s+prompt\b", Some(EntityKind::Prompt)),
        rule(r"(?i)\b(that|this|the|my)\s+(image|picture|photo)\b", Some(EntityKind::Image)),
        rule(r"(?i)\b(that|this|the|my)\s+(code|function|script)\b", Some(EntityKind::Code)),
        rule(r"(?i)\b(those|these|the)\s+(search\s+)?results\b", Some(EntityKind::SearchResult)),
        rule(r"(?i)\b(that|this|the)\s+analysis\b", Some(EntityKind::Analysis)),
        rule(r"(?i)\b(that|this|the)\s+explanation\b", Some(EntityKind::Explanation)),
        rule(r"(?i)\b(use|using|with|from|apply(?:ing)?)\s+it\b", None),
    ]
});

static MULTI_STEP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\band\s+then\b|\bafter\s+that\b|\bfirst\b.*\bthen\b|\bstep\s+by\s+step\b|^\s*\d+[.)]")
        .unwrap()
});

static STEP_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i),?\s*\b(?:and\s+)?then\b|\bafter\s+that,?").unwrap());

/// Parse the raw user message into explicit directives.
pub fn parse_instructions(message: &str) -> ParsedInstructions {
    let mut preferences = ModelPreferences::default();
    for (pattern, category, model) in MODEL_RULES.iter() {
        if pattern.is_match(message) {
            let bucket = match category {
                ModelCategory::Search => &mut preferences.search,
                ModelCategory::Image => &mut preferences.image,
                ModelCategory::Reasoning => &mut preferences.reasoning,
            };
            if !bucket.contains(&model.to_string()) {
                bucket.push(model.to_string());
            }
        }
    }

    let mut tools = ToolRequirements::default();
    if MUST_SEARCH.is_match(message) || !preferences.search.is_empty() {
        tools.preferred_tools.push("web_search".to_string());
    }
    if MUST_SEARCH.is_match(message) {
        tools.must_use_tools.push("web_search".to_string());
    } else if PREFER_SEARCH.is_match(message)
        && !tools.preferred_tools.contains(&"web_search".to_string())
    {
        tools.preferred_tools.push("web_search".to_string());
    }
    if MUST_IMAGE.is_match(message) {
        tools.preferred_tools.push("generate_image".to_string());
    }

    let mut indicators = Vec::new();
    let mut reference_type = None;
    for (pattern, kind) in REFERENCE_RULES.iter() {
        if let Some(found) = pattern.find(message) {
            indicators.push(found.as_str().to_string());
            if reference_type.is_none() {
                reference_type = *kind;
            }
        }
    }
    let references = References {
        has_references: !indicators.is_empty(),
        reference_type,
        reference_indicators: indicators,
    };

    let is_multi_step = MULTI_STEP.is_match(message);
    let steps = if is_multi_step {
        STEP_SPLIT
            .split(message)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    } else {
        vec![]
    };

    ParsedInstructions {
        model_preferences: preferences,
        tool_requirements: tools,
        references,
        workflow: Workflow {
            is_multi_step,
            steps,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_research_directive() {
        // Scenario: explicit deep-research search request
        let parsed =
            parse_instructions("search using sonar deep research for the latest GPU benchmarks");

        assert!(parsed
            .model_preferences
            .search
            .contains(&"sonar-deep-research".to_string()));
        assert!(parsed
            .tool_requirements
            .preferred_tools
            .contains(&"web_search".to_string()));
        assert!(parsed
            .tool_requirements
            .must_use_tools
            .contains(&"web_search".to_string()));
    }

    #[test]
    fn test_named_reasoning_model() {
        let parsed = parse_instructions("use claude to explain this proof");
        assert!(parsed
            .model_preferences
            .reasoning
            .contains(&"claude-sonnet-4".to_string()));
    }

    #[test]
    fn test_reference_indicators() {
        let parsed = parse_instructions("generate an image using that prompt");
        assert!(parsed.references.has_references);
        assert_eq!(parsed.references.reference_type, Some(EntityKind::Prompt));
        assert!(parsed
            .references
            .reference_indicators
            .iter()
            .any(|i| i.to_lowercase() == "that prompt"));
    }

    #[test]
    fn test_bare_it_needs_action_verb() {
        let with_verb = parse_instructions("apply it to the new design");
        assert!(with_verb.references.has_references);

        let pure_mention = parse_instructions("I really like how the colors came out");
        assert!(!pure_mention.references.has_references);
        assert!(pure_mention.references.reference_indicators.is_empty());
    }

    #[test]
    fn test_multi_step_phrasing() {
        let parsed =
            parse_instructions("research solar panel efficiency and then write a summary");
        assert!(parsed.workflow.is_multi_step);
        assert!(parsed.workflow.steps.len() >= 2);

        let simple = parse_instructions("what is the capital of France");
        assert!(!simple.workflow.is_multi_step);
    }

    #[test]
    fn test_no_directives_yields_defaults() {
        let parsed = parse_instructions("hello there");
        assert!(parsed.model_preferences.is_empty());
        assert!(parsed.tool_requirements.must_use_tools.is_empty());
        assert!(!parsed.references.has_references);
        assert!(!parsed.workflow.is_multi_step);
    }
}
