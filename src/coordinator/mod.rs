//! Step coordination
//!
//! Between two chain steps the coordinator turns step N's free-text output
//! into step N+1's input. Steps that were asked for schema-shaped output get
//! their JSON lifted out directly; everything else goes through a fast model
//! with a purpose-specific extraction prompt. Coordination never aborts a
//! chain: on failure the raw output passes through unchanged.

use crate::extract::first_json_object;
use crate::planner::{PlannedStep, StepPurpose};
use crate::providers::{ModelRequest, ProviderRegistry};
use crate::types::{ChainStepResult, Message};
use serde_json::Value;
use std::sync::Arc;

/// How the input for the next step was obtained.
#[derive(Debug, Clone)]
pub enum CoordinatedInput {
    /// The previous step emitted the structured output its prompt asked for
    Structured { content: String, data: Value },
    /// A fast model distilled the previous step's free text
    HeuristicExtracted { content: String, notes: String },
    /// Coordination failed or was unnecessary; raw output flows through
    RawPassthrough { content: String },
}

impl CoordinatedInput {
    pub fn content(&self) -> &str {
        match self {
            CoordinatedInput::Structured { content, .. } => content,
            CoordinatedInput::HeuristicExtracted { content, .. } => content,
            CoordinatedInput::RawPassthrough { content } => content,
        }
    }

    pub fn notes(&self) -> Option<&str> {
        match self {
            CoordinatedInput::Structured { .. } => Some("structured output reused"),
            CoordinatedInput::HeuristicExtracted { notes, .. } => Some(notes),
            CoordinatedInput::RawPassthrough { .. } => None,
        }
    }
}

pub struct StepCoordinator {
    registry: Arc<ProviderRegistry>,
    utility_model: String,
}

impl StepCoordinator {
    pub fn new(registry: Arc<ProviderRegistry>, utility_model: impl Into<String>) -> Self {
        StepCoordinator {
            registry,
            utility_model: utility_model.into(),
        }
    }

    /// Produce the input for `next` from the result of the step it follows.
    pub async fn coordinate(
        &self,
        previous: &ChainStepResult,
        previous_plan: &PlannedStep,
        next: &PlannedStep,
        user_message: &str,
    ) -> CoordinatedInput {
        if previous_plan.expected_output_schema.is_some() {
            if let Some(data) = first_json_object(&previous.content) {
                let content = data
                    .get("content")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .unwrap_or_else(|| data.to_string());
                log::debug!(
                    "[COORD] Step {} produced structured output, reusing for step {}",
                    previous.step,
                    next.step
                );
                return CoordinatedInput::Structured { content, data };
            }
            log::debug!(
                "[COORD] Step {} was asked for structured output but emitted none",
                previous.step
            );
        }

        let system = extraction_prompt(previous.purpose, next.purpose);
        let prompt = format!(
            "User's original request: {}\n\nOutput of the previous step:\n{}",
            user_message, previous.content
        );
        let request = ModelRequest::new(&self.utility_model, vec![Message::user(prompt)])
            .with_system(system)
            .with_max_tokens(512)
            .with_temperature(0.0);

        match self.registry.invoke(request).await {
            Ok(response) if !response.content.trim().is_empty() => {
                CoordinatedInput::HeuristicExtracted {
                    content: response.content.trim().to_string(),
                    notes: format!(
                        "distilled {} output for {}",
                        previous.purpose, next.purpose
                    ),
                }
            }
            Ok(_) => {
                log::warn!("[COORD] Empty extraction for step {}, passing raw output", next.step);
                CoordinatedInput::RawPassthrough {
                    content: previous.content.clone(),
                }
            }
            Err(e) => {
                log::warn!(
                    "[COORD] Extraction failed for step {} ({}), passing raw output",
                    next.step,
                    e
                );
                CoordinatedInput::RawPassthrough {
                    content: previous.content.clone(),
                }
            }
        }
    }
}

fn extraction_prompt(from: StepPurpose, to: StepPurpose) -> &'static str {
    match (from, to) {
        (_, StepPurpose::ImageGeneration) => {
            "The text below contains an image prompt wrapped in explanation. \
             Return ONLY the clean prompt text, nothing else. No preamble, no \
             quotes, no markdown."
        }
        (StepPurpose::WebSearch, _) => {
            "Extract 3-5 key insights from the research below as a bullet \
             list, then restate the user's core request in one sentence. \
             Return only the bullets and the restatement."
        }
        (_, StepPurpose::Composition) => {
            "Condense the output below to the facts and artifacts the final \
             answer must include. Keep citations and URLs verbatim."
        }
        (_, StepPurpose::CodeGeneration) => {
            "Extract the concrete requirements and constraints the code must \
             satisfy from the text below. Return them as a terse list."
        }
        _ => {
            "Summarize the output below into the essential input the next \
             processing step needs. Be concise and keep concrete details."
        }
    }
}
