//! Model-driven plan generation.

use super::{ExecutionPlan, StepPurpose};
use crate::extract::first_json_object;
use crate::intent::QueryIntent;
use crate::providers::{ModelRequest, ProviderError, ProviderRegistry};
use crate::types::Message;
use std::sync::Arc;

const PLANNER_SYSTEM_PROMPT: &str = "\
You design execution plans for a multi-model workflow engine. Respond with \
ONLY a JSON object, no prose:
{
  \"reasoning\": \"one or two sentences\",
  \"estimatedTimeSecs\": number,
  \"steps\": [
    {
      \"step\": 1,
      \"purpose\": \"web-search|prompt-enhancement|image-generation|code-generation|reasoning|generation|composition\",
      \"recommendedModel\": \"model id\",
      \"instructions\": \"what this step must do\",
      \"expectedOutputSchema\": \"optional JSON schema hint or null\",
      \"inputFrom\": null
    }
  ]
}
Rules:
- Steps are numbered 1..N. inputFrom, when set, must name an EARLIER step.
- Multi-step plans always end with a composition step.
- image-generation must be immediately preceded by a prompt-enhancement step.
- Add a web-search step only when the request implies fresh information.
- Never add steps the request does not need. One step is a valid plan.
Known models: claude-sonnet-4 (reasoning, code), gpt-4o (general), \
gpt-4o-mini (fast), sonar-pro (web search), sonar-deep-research (deep \
research), gemini-2.5-flash-image (image generation).";

pub struct DynamicPlanner {
    registry: Arc<ProviderRegistry>,
    planning_model: String,
}

impl DynamicPlanner {
    pub fn new(registry: Arc<ProviderRegistry>, planning_model: impl Into<String>) -> Self {
        DynamicPlanner {
            registry,
            planning_model: planning_model.into(),
        }
    }

    /// Request a plan from the planning model. Errors and unparseable or
    /// invalid plans are returned to the caller, which falls back to the
    /// heuristic planner.
    pub async fn plan(
        &self,
        message: &str,
        intent: &QueryIntent,
        recent_context: &[Message],
    ) -> Result<ExecutionPlan, ProviderError> {
        let mut prompt = String::new();
        prompt.push_str(&format!(
            "Intent: type={}, complexity={:?}, needsWebSearch={}, needsImageGeneration={}\n",
            intent.query_type,
            intent.complexity,
            intent.needs_web_search,
            intent.needs_image_generation,
        ));
        if let Some(last) = recent_context.last() {
            prompt.push_str(&format!("Previous turn ({}): {}\n", last.role, last.content));
        }
        prompt.push_str(&format!("Request: {}", message));

        let request = ModelRequest::new(&self.planning_model, vec![Message::user(prompt)])
            .with_system(PLANNER_SYSTEM_PROMPT)
            .with_max_tokens(1024)
            .with_temperature(0.2);

        let response = self.registry.invoke(request).await?;
        let plan = parse_plan(&response.content)
            .ok_or_else(|| ProviderError::new("planner returned no parseable plan"))?;
        plan.validate().map_err(|e| {
            ProviderError::new(format!("planner produced an invalid plan: {}", e))
        })?;
        if !image_steps_are_enhanced(&plan) {
            return Err(ProviderError::new(
                "planner placed an image step without a preceding prompt-enhancement step",
            ));
        }

        log::info!(
            "[PLANNER] Dynamic plan with {} step(s): {}",
            plan.len(),
            plan.steps
                .iter()
                .map(|s| s.purpose.to_string())
                .collect::<Vec<_>>()
                .join(" -> ")
        );
        Ok(plan)
    }
}

fn parse_plan(content: &str) -> Option<ExecutionPlan> {
    let json = first_json_object(content)?;
    serde_json::from_value(json).ok()
}

/// Image generation without an enhancement step directly before it degrades
/// output quality. Checked after parsing so a sloppy model plan still gets
/// rejected in favor of the heuristic.
pub fn image_steps_are_enhanced(plan: &ExecutionPlan) -> bool {
    plan.steps.iter().enumerate().all(|(idx, step)| {
        step.purpose != StepPurpose::ImageGeneration
            || (idx > 0 && plan.steps[idx - 1].purpose == StepPurpose::PromptEnhancement)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_from_fenced_output() {
        let content = "Here is the plan:\n```json\n{\n  \"reasoning\": \"search then compose\",\n  \"estimatedTimeSecs\": 20,\n  \"steps\": [\n    {\"step\": 1, \"purpose\": \"web-search\", \"recommendedModel\": \"sonar-pro\", \"instructions\": \"find benchmarks\"},\n    {\"step\": 2, \"purpose\": \"composition\", \"recommendedModel\": \"gpt-4o\", \"instructions\": \"summarize\", \"inputFrom\": 1}\n  ]\n}\n```";
        let plan = parse_plan(content).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.steps[1].input_from, Some(1));
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_parse_plan_rejects_prose() {
        assert!(parse_plan("I think we should search first.").is_none());
    }

    #[test]
    fn test_image_without_enhancement_detected() {
        let content = r#"{"steps": [
            {"step": 1, "purpose": "image-generation", "recommendedModel": "gemini-2.5-flash-image", "instructions": "draw"}
        ]}"#;
        let plan = parse_plan(content).unwrap();
        assert!(!image_steps_are_enhanced(&plan));
    }

    #[test]
    fn test_enhanced_image_chain_accepted() {
        let content = r#"{"steps": [
            {"step": 1, "purpose": "prompt-enhancement", "recommendedModel": "gpt-4o-mini", "instructions": "enhance"},
            {"step": 2, "purpose": "image-generation", "recommendedModel": "gemini-2.5-flash-image", "instructions": "draw", "inputFrom": 1}
        ]}"#;
        let plan = parse_plan(content).unwrap();
        assert!(image_steps_are_enhanced(&plan));
    }
}
