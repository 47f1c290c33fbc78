//! Query intent classification
//!
//! Turns free text plus ambient context into a structured [`QueryIntent`]
//! that drives routing: which path (fast tool calling vs planned workflow),
//! which model, and whether a chain is required.

pub mod classifier;

pub use classifier::{quick_route, IntentClassifier};

use crate::planner::PlannedStep;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum QueryType {
    Simple,
    Research,
    Reasoning,
    Creative,
    Coding,
    ImageGeneration,
    MultiStep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryIntent {
    #[serde(rename = "type")]
    pub query_type: QueryType,
    pub needs_web_search: bool,
    pub needs_reasoning: bool,
    pub needs_multimodal: bool,
    pub needs_tool_use: bool,
    pub needs_image_generation: bool,
    pub needs_chaining: bool,
    pub complexity: Complexity,
    /// Classifier confidence in [0, 1]
    pub confidence: f32,
    pub suggested_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_model: Option<String>,
    /// Concrete steps, filled in by the planner before execution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_steps: Option<Vec<PlannedStep>>,
}

impl QueryIntent {
    /// Conservative default used whenever classification fails: a simple
    /// single-model answer with low confidence, never an error.
    pub fn safe_default(suggested_model: impl Into<String>) -> Self {
        QueryIntent {
            query_type: QueryType::Simple,
            needs_web_search: false,
            needs_reasoning: false,
            needs_multimodal: false,
            needs_tool_use: false,
            needs_image_generation: false,
            needs_chaining: false,
            complexity: Complexity::Medium,
            confidence: 0.4,
            suggested_model: suggested_model.into(),
            fallback_model: None,
            chain_steps: None,
        }
    }

    /// Chains run whenever classification asks for one, and always for image
    /// generation (the raw prompt must pass through enhancement first).
    pub fn requires_chain(&self) -> bool {
        self.needs_chaining || self.needs_image_generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_default_is_conservative() {
        let intent = QueryIntent::safe_default("gpt-4o-mini");
        assert_eq!(intent.query_type, QueryType::Simple);
        assert!((0.3..=0.5).contains(&intent.confidence));
        assert!(!intent.requires_chain());
    }

    #[test]
    fn test_image_generation_forces_chain() {
        let mut intent = QueryIntent::safe_default("gpt-4o");
        intent.needs_image_generation = true;
        assert!(intent.requires_chain());
    }

    #[test]
    fn test_query_type_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&QueryType::ImageGeneration).unwrap(),
            "\"image-generation\""
        );
    }
}
