//! Model-based intent classification with a heuristic quick route.

use super::{Complexity, QueryIntent, QueryType};
use crate::extract::first_json_object;
use crate::providers::{ModelRequest, ProviderRegistry};
use crate::types::{Message, RequestContext};
use serde_json::Value;
use std::sync::Arc;

const CLASSIFIER_SYSTEM_PROMPT: &str = "\
You classify chat requests for a multi-model router. Respond with ONLY a JSON \
object, no prose:
{
  \"type\": \"simple|research|reasoning|creative|coding|image-generation|multi-step\",
  \"needsWebSearch\": bool,
  \"needsReasoning\": bool,
  \"needsMultimodal\": bool,
  \"needsToolUse\": bool,
  \"needsImageGeneration\": bool,
  \"needsChaining\": bool,
  \"complexity\": \"low|medium|high\",
  \"confidence\": 0.0-1.0,
  \"suggestedModel\": \"model id\",
  \"fallbackModel\": \"model id or null\"
}
Known models: claude-sonnet-4 (reasoning, code), gpt-4o (general), \
gpt-4o-mini (fast/simple), sonar-pro (web search), sonar-deep-research \
(deep research), gemini-2.5-flash-image (image generation). \
Set needsChaining=true when the request needs multiple coordinated model \
calls; image generation always needs chaining.";

pub struct IntentClassifier {
    registry: Arc<ProviderRegistry>,
    utility_model: String,
}

impl IntentClassifier {
    pub fn new(registry: Arc<ProviderRegistry>, utility_model: impl Into<String>) -> Self {
        IntentClassifier {
            registry,
            utility_model: utility_model.into(),
        }
    }

    /// Classify a message. Never fails: any provider or parse error produces
    /// the conservative default intent.
    pub async fn classify(&self, message: &str, context: &RequestContext) -> QueryIntent {
        let mut prompt = String::new();
        if let Some(title) = &context.module_title {
            prompt.push_str(&format!("Current module: {}\n", title));
        }
        if let Some(highlighted) = &context.highlighted_text {
            prompt.push_str(&format!("Highlighted text: {}\n", highlighted));
        }
        if let Some(last) = context.conversation_history.last() {
            prompt.push_str(&format!("Previous turn ({}): {}\n", last.role, last.content));
        }
        prompt.push_str(&format!("Request: {}", message));

        let request = ModelRequest::new(&self.utility_model, vec![Message::user(prompt)])
            .with_system(CLASSIFIER_SYSTEM_PROMPT)
            .with_max_tokens(512)
            .with_temperature(0.0);

        match self.registry.invoke(request).await {
            Ok(response) => match parse_intent(&response.content, &self.utility_model) {
                Some(intent) => intent,
                None => {
                    log::warn!("[INTENT] Unparseable classifier output, using default intent");
                    QueryIntent::safe_default(&self.utility_model)
                }
            },
            Err(e) => {
                log::warn!("[INTENT] Classification failed ({}), using default intent", e);
                QueryIntent::safe_default(&self.utility_model)
            }
        }
    }
}

fn parse_intent(content: &str, default_model: &str) -> Option<QueryIntent> {
    let json = first_json_object(content)?;

    let query_type = match json.get("type").and_then(Value::as_str)? {
        "simple" => QueryType::Simple,
        "research" => QueryType::Research,
        "reasoning" => QueryType::Reasoning,
        "creative" => QueryType::Creative,
        "coding" => QueryType::Coding,
        "image-generation" | "image_generation" => QueryType::ImageGeneration,
        "multi-step" | "multi_step" => QueryType::MultiStep,
        _ => return None,
    };

    let flag = |key: &str| json.get(key).and_then(Value::as_bool).unwrap_or(false);
    let complexity = match json.get("complexity").and_then(Value::as_str) {
        Some("low") => Complexity::Low,
        Some("high") => Complexity::High,
        _ => Complexity::Medium,
    };
    let confidence = json
        .get("confidence")
        .and_then(Value::as_f64)
        .map(|c| (c as f32).clamp(0.0, 1.0))
        .unwrap_or(0.5);
    let suggested_model = json
        .get("suggestedModel")
        .and_then(Value::as_str)
        .unwrap_or(default_model)
        .to_string();
    let fallback_model = json
        .get("fallbackModel")
        .and_then(Value::as_str)
        .map(String::from);

    let needs_image_generation =
        flag("needsImageGeneration") || query_type == QueryType::ImageGeneration;

    Some(QueryIntent {
        query_type,
        needs_web_search: flag("needsWebSearch"),
        needs_reasoning: flag("needsReasoning"),
        needs_multimodal: flag("needsMultimodal"),
        needs_tool_use: flag("needsToolUse"),
        needs_image_generation,
        needs_chaining: flag("needsChaining") || needs_image_generation,
        complexity,
        confidence,
        suggested_model,
        fallback_model,
        chain_steps: None,
    })
}

/// Heuristic fast path for obviously routable queries.
///
/// Advisory only: the orchestrator still runs model-based classification and
/// treats this as a hint. Scoring is simple: message length,
/// conjunction count, and capability-keyword hits.
pub fn quick_route(message: &str) -> Option<QueryIntent> {
    let lower = message.to_lowercase();
    let words = message.split_whitespace().count();

    let image_keywords = ["generate an image", "draw", "create an image", "make an image", "picture of"];
    if image_keywords.iter().any(|k| lower.contains(k)) {
        let mut intent = QueryIntent::safe_default("gemini-2.5-flash-image");
        intent.query_type = QueryType::ImageGeneration;
        intent.needs_image_generation = true;
        intent.needs_chaining = true;
        intent.confidence = 0.7;
        return Some(intent);
    }

    let search_keywords = ["latest", "news", "current", "today", "recent", "search for", "look up"];
    if search_keywords.iter().any(|k| lower.contains(k)) {
        let mut intent = QueryIntent::safe_default("sonar-pro");
        intent.query_type = QueryType::Research;
        intent.needs_web_search = true;
        intent.confidence = 0.65;
        return Some(intent);
    }

    let code_keywords = ["write a function", "debug", "refactor", "implement", "code that"];
    if code_keywords.iter().any(|k| lower.contains(k)) {
        let mut intent = QueryIntent::safe_default("claude-sonnet-4");
        intent.query_type = QueryType::Coding;
        intent.confidence = 0.65;
        return Some(intent);
    }

    // Short factual questions with no multi-part structure
    let conjunctions = ["and then", "after that", "also", "; "];
    let multi_part = conjunctions.iter().any(|c| lower.contains(c));
    if words <= 12 && !multi_part {
        let mut intent = QueryIntent::safe_default("gpt-4o-mini");
        intent.complexity = Complexity::Low;
        intent.confidence = 0.6;
        return Some(intent);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_intent_full_object() {
        let content = r#"{
            "type": "research",
            "needsWebSearch": true,
            "needsChaining": false,
            "complexity": "high",
            "confidence": 0.9,
            "suggestedModel": "sonar-pro"
        }"#;
        let intent = parse_intent(content, "gpt-4o-mini").unwrap();
        assert_eq!(intent.query_type, QueryType::Research);
        assert!(intent.needs_web_search);
        assert_eq!(intent.complexity, Complexity::High);
        assert_eq!(intent.suggested_model, "sonar-pro");
    }

    #[test]
    fn test_parse_intent_clamps_confidence() {
        let content = r#"{"type": "simple", "confidence": 3.2}"#;
        let intent = parse_intent(content, "gpt-4o-mini").unwrap();
        assert_eq!(intent.confidence, 1.0);
    }

    #[test]
    fn test_parse_intent_image_forces_chain() {
        let content = r#"{"type": "image-generation", "needsChaining": false}"#;
        let intent = parse_intent(content, "gpt-4o-mini").unwrap();
        assert!(intent.needs_image_generation);
        assert!(intent.needs_chaining);
    }

    #[test]
    fn test_parse_intent_garbage_is_none() {
        assert!(parse_intent("no json here", "gpt-4o-mini").is_none());
        assert!(parse_intent(r#"{"type": "unknown-kind"}"#, "gpt-4o-mini").is_none());
    }

    #[test]
    fn test_quick_route_image() {
        let intent = quick_route("generate an image of a cat in a garden").unwrap();
        assert_eq!(intent.query_type, QueryType::ImageGeneration);
        assert!(intent.needs_chaining);
    }

    #[test]
    fn test_quick_route_search() {
        let intent = quick_route("what are the latest GPU benchmarks?").unwrap();
        assert!(intent.needs_web_search);
    }

    #[test]
    fn test_quick_route_declines_complex_queries() {
        let msg = "Explain the tradeoffs between Paxos and Raft consensus, and then \
                   produce a detailed comparison of their failure models for a \
                   graduate-level distributed systems seminar";
        assert!(quick_route(msg).is_none());
    }
}
