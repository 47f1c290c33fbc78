//! Explicit user directives
//!
//! Parses the raw message for instructions the router must honor: named
//! models ("use sonar deep research"), required tools, anaphoric references,
//! and multi-step phrasing. Recomputed per request, never stored.

pub mod parser;
pub mod validator;

pub use parser::parse_instructions;
pub use validator::{validate_against_instructions, ValidationReport};

use crate::entities::EntityKind;
use serde::{Deserialize, Serialize};

/// Model ids the user explicitly asked for, per capability category
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelPreferences {
    pub search: Vec<String>,
    pub image: Vec<String>,
    pub reasoning: Vec<String>,
    pub code: Vec<String>,
}

impl ModelPreferences {
    pub fn is_empty(&self) -> bool {
        self.search.is_empty()
            && self.image.is_empty()
            && self.reasoning.is_empty()
            && self.code.is_empty()
    }

    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.search
            .iter()
            .chain(&self.image)
            .chain(&self.reasoning)
            .chain(&self.code)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolRequirements {
    /// Tools the user made mandatory
    pub must_use_tools: Vec<String>,
    /// Tools the phrasing suggests but doesn't require
    pub preferred_tools: Vec<String>,
}

/// Anaphoric references to earlier artifacts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct References {
    pub has_references: bool,
    pub reference_type: Option<EntityKind>,
    /// The literal phrases found in the message ("that prompt", "it")
    pub reference_indicators: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workflow {
    pub is_multi_step: bool,
    /// Rough step phrases split out of the message
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedInstructions {
    pub model_preferences: ModelPreferences,
    pub tool_requirements: ToolRequirements,
    pub references: References,
    pub workflow: Workflow,
}
