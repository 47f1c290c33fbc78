//! Fallback plan construction from intent flags.
//!
//! Used whenever the dynamic planner fails. Plans built here are always valid
//! by construction, and any step assigned to a provider family with no live
//! client gets substituted with a known-good model from an available family.

use super::{ExecutionPlan, PlannedStep, StepPurpose};
use crate::intent::{Complexity, QueryIntent, QueryType};
use crate::providers::catalog::ModelCapability;
use crate::providers::ProviderRegistry;

pub fn heuristic_plan(
    intent: &QueryIntent,
    message: &str,
    registry: &ProviderRegistry,
) -> ExecutionPlan {
    let mut steps = Vec::new();
    let mut next = 1usize;

    if intent.needs_image_generation {
        let search_step = if intent.needs_web_search {
            steps.push(PlannedStep {
                step: next,
                purpose: StepPurpose::WebSearch,
                recommended_model: "sonar-pro".to_string(),
                instructions: format!("Gather current reference material for: {}", message),
                expected_output_schema: None,
                input_from: None,
            });
            next += 1;
            Some(next - 1)
        } else {
            None
        };

        steps.push(PlannedStep {
            step: next,
            purpose: StepPurpose::PromptEnhancement,
            recommended_model: "gpt-4o-mini".to_string(),
            instructions: format!(
                "Rewrite the request as a rich, concrete image prompt. Request: {}",
                message
            ),
            expected_output_schema: None,
            input_from: search_step,
        });
        next += 1;

        steps.push(PlannedStep {
            step: next,
            purpose: StepPurpose::ImageGeneration,
            recommended_model: "gemini-2.5-flash-image".to_string(),
            instructions: "Generate the image from the enhanced prompt.".to_string(),
            expected_output_schema: None,
            input_from: Some(next - 1),
        });
        next += 1;

        // A search-backed image chain still needs a textual wrap-up
        if search_step.is_some() {
            steps.push(PlannedStep {
                step: next,
                purpose: StepPurpose::Composition,
                recommended_model: intent.suggested_model.clone(),
                instructions: "Present the generated image with a short explanation grounded in the research.".to_string(),
                expected_output_schema: None,
                input_from: Some(next - 1),
            });
        }
    } else if intent.needs_web_search && intent.needs_chaining {
        steps.push(PlannedStep {
            step: 1,
            purpose: StepPurpose::WebSearch,
            recommended_model: if intent.complexity == Complexity::High {
                "sonar-deep-research".to_string()
            } else {
                "sonar-pro".to_string()
            },
            instructions: format!("Research: {}", message),
            expected_output_schema: None,
            input_from: None,
        });
        steps.push(PlannedStep {
            step: 2,
            purpose: StepPurpose::Composition,
            recommended_model: intent.suggested_model.clone(),
            instructions: "Compose the final answer from the research findings.".to_string(),
            expected_output_schema: None,
            input_from: Some(1),
        });
    } else {
        let purpose = if intent.query_type == QueryType::Coding {
            StepPurpose::CodeGeneration
        } else if intent.needs_reasoning || intent.complexity == Complexity::High {
            StepPurpose::Reasoning
        } else {
            StepPurpose::Generation
        };
        steps.push(PlannedStep {
            step: 1,
            purpose,
            recommended_model: intent.suggested_model.clone(),
            instructions: format!("Answer the request directly: {}", message),
            expected_output_schema: None,
            input_from: None,
        });
    }

    let mut plan = ExecutionPlan {
        reasoning: format!("Heuristic plan from intent flags ({})", intent.query_type),
        estimated_time_secs: 10 * steps.len() as u64,
        steps,
    };
    substitute_unavailable(&mut plan, registry);
    plan
}

/// Re-point any step whose model lives on an unavailable provider family at a
/// known-good model from a family that is registered. Steps on live families
/// are never touched.
fn substitute_unavailable(plan: &mut ExecutionPlan, registry: &ProviderRegistry) {
    let catalog = registry.catalog();
    for step in &mut plan.steps {
        let family = catalog.family_of(&step.recommended_model);
        let available = family
            .map(|f| registry.is_family_available(f))
            .unwrap_or(false);
        if available {
            continue;
        }

        let needed = match step.purpose {
            StepPurpose::ImageGeneration => Some(ModelCapability::ImageGeneration),
            StepPurpose::WebSearch => Some(ModelCapability::WebSearch),
            StepPurpose::CodeGeneration => Some(ModelCapability::CodeGeneration),
            _ => None,
        };

        let replacement = catalog
            .all()
            .filter(|spec| registry.is_family_available(spec.family))
            .find(|spec| needed.map(|c| spec.has_capability(c)).unwrap_or(true))
            .map(|spec| spec.id.to_string())
            .or_else(|| {
                registry
                    .available_families()
                    .first()
                    .map(|f| catalog.default_for_family(*f).to_string())
            });

        match replacement {
            Some(model) => {
                log::warn!(
                    "[PLANNER] Provider for '{}' unavailable, substituting '{}' for step {}",
                    step.recommended_model,
                    model,
                    step.step
                );
                step.recommended_model = model;
            }
            None => log::warn!(
                "[PLANNER] No substitute for '{}' (step {}), leaving plan unchanged",
                step.recommended_model,
                step.step
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{
        ModelProvider, ModelRequest, ModelResponse, ProviderError, ProviderFamily,
    };
    use async_trait::async_trait;
    use std::sync::Arc;

    struct StubProvider(ProviderFamily);

    #[async_trait]
    impl ModelProvider for StubProvider {
        fn family(&self) -> ProviderFamily {
            self.0
        }

        async fn invoke(&self, _request: ModelRequest) -> Result<ModelResponse, ProviderError> {
            Ok(ModelResponse::text("ok"))
        }
    }

    fn registry_with(families: &[ProviderFamily]) -> ProviderRegistry {
        let registry = ProviderRegistry::new();
        for family in families {
            registry.register(Arc::new(StubProvider(*family)));
        }
        registry
    }

    fn image_intent() -> QueryIntent {
        let mut intent = QueryIntent::safe_default("gpt-4o");
        intent.query_type = QueryType::ImageGeneration;
        intent.needs_image_generation = true;
        intent.needs_chaining = true;
        intent
    }

    #[test]
    fn test_image_request_yields_two_step_plan() {
        // "generate an image of a cat in a garden", no research implied
        let registry = registry_with(&[ProviderFamily::OpenAi, ProviderFamily::Gemini]);
        let plan = heuristic_plan(
            &image_intent(),
            "generate an image of a cat in a garden",
            &registry,
        );

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.steps[0].purpose, StepPurpose::PromptEnhancement);
        assert_eq!(plan.steps[1].purpose, StepPurpose::ImageGeneration);
        assert_eq!(plan.steps[1].input_from, Some(1));
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_search_backed_image_chain_ends_with_composition() {
        let registry = registry_with(&[
            ProviderFamily::OpenAi,
            ProviderFamily::Gemini,
            ProviderFamily::Perplexity,
        ]);
        let mut intent = image_intent();
        intent.needs_web_search = true;

        let plan = heuristic_plan(&intent, "draw the current Mars rover location", &registry);
        let purposes: Vec<StepPurpose> = plan.steps.iter().map(|s| s.purpose).collect();
        assert_eq!(
            purposes,
            vec![
                StepPurpose::WebSearch,
                StepPurpose::PromptEnhancement,
                StepPurpose::ImageGeneration,
                StepPurpose::Composition,
            ]
        );
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_research_chain() {
        let registry = registry_with(&[ProviderFamily::OpenAi, ProviderFamily::Perplexity]);
        let mut intent = QueryIntent::safe_default("gpt-4o");
        intent.query_type = QueryType::Research;
        intent.needs_web_search = true;
        intent.needs_chaining = true;

        let plan = heuristic_plan(&intent, "compare recent GPU benchmarks", &registry);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.steps[0].purpose, StepPurpose::WebSearch);
        assert_eq!(plan.steps[1].purpose, StepPurpose::Composition);
    }

    #[test]
    fn test_single_reasoning_step() {
        let registry = registry_with(&[ProviderFamily::Anthropic]);
        let mut intent = QueryIntent::safe_default("claude-sonnet-4");
        intent.needs_reasoning = true;

        let plan = heuristic_plan(&intent, "why does TCP need a three-way handshake", &registry);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.steps[0].purpose, StepPurpose::Reasoning);
        assert_eq!(plan.steps[0].recommended_model, "claude-sonnet-4");
    }

    #[test]
    fn test_unavailable_family_gets_substituted() {
        // Anthropic is down; the reasoning step must move to a live family.
        let registry = registry_with(&[ProviderFamily::OpenAi]);
        let mut intent = QueryIntent::safe_default("claude-sonnet-4");
        intent.needs_reasoning = true;

        let plan = heuristic_plan(&intent, "explain quorum intersection", &registry);
        let family = registry
            .catalog()
            .family_of(&plan.steps[0].recommended_model)
            .unwrap();
        assert_eq!(family, ProviderFamily::OpenAi);
    }

    #[test]
    fn test_available_family_left_untouched() {
        let registry = registry_with(&[ProviderFamily::Anthropic, ProviderFamily::OpenAi]);
        let mut intent = QueryIntent::safe_default("claude-sonnet-4");
        intent.needs_reasoning = true;

        let plan = heuristic_plan(&intent, "explain quorum intersection", &registry);
        assert_eq!(plan.steps[0].recommended_model, "claude-sonnet-4");
    }
}
