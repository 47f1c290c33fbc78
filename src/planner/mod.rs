//! Workflow planning
//!
//! A plan is an ordered linear chain of typed steps. The dynamic planner asks
//! a capable model for the plan; when that fails the heuristic planner builds
//! one directly from the intent flags. Either way the plan is validated before
//! execution: steps are numbered 1..N and `input_from` only ever points
//! backwards.

pub mod dynamic;
pub mod heuristic;

pub use dynamic::DynamicPlanner;
pub use heuristic::heuristic_plan;

use crate::context::ContextLevel;
use crate::types::StepOutputKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum StepPurpose {
    WebSearch,
    PromptEnhancement,
    ImageGeneration,
    CodeGeneration,
    Reasoning,
    Generation,
    Composition,
}

impl StepPurpose {
    /// How much conversation history a step of this purpose should see.
    /// Enhancement and image steps work from the coordinated input alone.
    pub fn context_level(&self) -> ContextLevel {
        match self {
            StepPurpose::PromptEnhancement | StepPurpose::ImageGeneration => ContextLevel::Minimal,
            StepPurpose::WebSearch | StepPurpose::Generation => ContextLevel::Standard,
            StepPurpose::CodeGeneration
            | StepPurpose::Reasoning
            | StepPurpose::Composition => ContextLevel::Full,
        }
    }

    pub fn output_kind(&self) -> StepOutputKind {
        match self {
            StepPurpose::ImageGeneration => StepOutputKind::Image,
            StepPurpose::CodeGeneration => StepOutputKind::Code,
            _ => StepOutputKind::Text,
        }
    }
}

/// One step of an execution plan. `step` is 1-based; `input_from`, when set,
/// names an earlier step whose coordinated output feeds this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedStep {
    pub step: usize,
    pub purpose: StepPurpose,
    pub recommended_model: String,
    pub instructions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output_schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_from: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub estimated_time_secs: u64,
    pub steps: Vec<PlannedStep>,
}

impl ExecutionPlan {
    /// Reject empty plans, out-of-order numbering, and forward or self
    /// `input_from` references.
    pub fn validate(&self) -> Result<(), String> {
        if self.steps.is_empty() {
            return Err("plan has no steps".to_string());
        }
        for (idx, step) in self.steps.iter().enumerate() {
            let expected = idx + 1;
            if step.step != expected {
                return Err(format!(
                    "step numbering broken: position {} carries step number {}",
                    expected, step.step
                ));
            }
            if let Some(source) = step.input_from {
                if source >= step.step {
                    return Err(format!(
                        "step {} references step {} as input, which is not an earlier step",
                        step.step, source
                    ));
                }
                if source == 0 {
                    return Err(format!("step {} references step 0 as input", step.step));
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(n: usize, purpose: StepPurpose, input_from: Option<usize>) -> PlannedStep {
        PlannedStep {
            step: n,
            purpose,
            recommended_model: "gpt-4o".to_string(),
            instructions: "do the thing".to_string(),
            expected_output_schema: None,
            input_from,
        }
    }

    #[test]
    fn test_valid_linear_chain_passes() {
        let plan = ExecutionPlan {
            reasoning: String::new(),
            estimated_time_secs: 10,
            steps: vec![
                step(1, StepPurpose::WebSearch, None),
                step(2, StepPurpose::PromptEnhancement, Some(1)),
                step(3, StepPurpose::ImageGeneration, Some(2)),
            ],
        };
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_forward_reference_rejected() {
        let plan = ExecutionPlan {
            reasoning: String::new(),
            estimated_time_secs: 0,
            steps: vec![
                step(1, StepPurpose::WebSearch, Some(2)),
                step(2, StepPurpose::Composition, Some(1)),
            ],
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_self_reference_rejected() {
        let plan = ExecutionPlan {
            reasoning: String::new(),
            estimated_time_secs: 0,
            steps: vec![step(1, StepPurpose::Reasoning, Some(1))],
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_empty_plan_rejected() {
        let plan = ExecutionPlan {
            reasoning: String::new(),
            estimated_time_secs: 0,
            steps: vec![],
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_step_numbering_must_start_at_one() {
        let plan = ExecutionPlan {
            reasoning: String::new(),
            estimated_time_secs: 0,
            steps: vec![step(2, StepPurpose::Reasoning, None)],
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_purpose_context_levels() {
        assert_eq!(
            StepPurpose::PromptEnhancement.context_level(),
            ContextLevel::Minimal
        );
        assert_eq!(StepPurpose::WebSearch.context_level(), ContextLevel::Standard);
        assert_eq!(StepPurpose::Composition.context_level(), ContextLevel::Full);
    }

    #[test]
    fn test_planned_step_json_shape() {
        let json = r#"{
            "step": 2,
            "purpose": "image-generation",
            "recommendedModel": "gemini-2.5-flash-image",
            "instructions": "render the enhanced prompt",
            "inputFrom": 1
        }"#;
        let parsed: PlannedStep = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.purpose, StepPurpose::ImageGeneration);
        assert_eq!(parsed.input_from, Some(1));
    }
}
