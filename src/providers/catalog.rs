//! Model catalog
//!
//! Static registry of known model ids: context window, output cap, declared
//! capabilities, and usable temperature range. Deprecated ids transparently
//! resolve to their replacement.

use super::ProviderFamily;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelCapability {
    TextGeneration,
    Reasoning,
    WebSearch,
    DeepResearch,
    ImageGeneration,
    CodeGeneration,
    ToolUse,
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub id: &'static str,
    pub family: ProviderFamily,
    pub context_window: u32,
    pub max_output_tokens: u32,
    pub capabilities: &'static [ModelCapability],
    pub temperature_range: (f32, f32),
}

impl ModelSpec {
    pub fn has_capability(&self, cap: ModelCapability) -> bool {
        self.capabilities.contains(&cap)
    }
}

use ModelCapability::*;

static SPECS: Lazy<HashMap<&'static str, ModelSpec>> = Lazy::new(|| {
    let specs = [
        ModelSpec {
            id: "claude-sonnet-4",
            family: ProviderFamily::Anthropic,
            context_window: 200_000,
            max_output_tokens: 8_192,
            capabilities: &[TextGeneration, Reasoning, CodeGeneration, ToolUse],
            temperature_range: (0.0, 1.0),
        },
        ModelSpec {
            id: "gpt-4o",
            family: ProviderFamily::OpenAi,
            context_window: 128_000,
            max_output_tokens: 16_384,
            capabilities: &[TextGeneration, Reasoning, CodeGeneration, ToolUse],
            temperature_range: (0.0, 2.0),
        },
        ModelSpec {
            id: "gpt-4o-mini",
            family: ProviderFamily::OpenAi,
            context_window: 128_000,
            max_output_tokens: 16_384,
            capabilities: &[TextGeneration, CodeGeneration, ToolUse],
            temperature_range: (0.0, 2.0),
        },
        ModelSpec {
            id: "sonar-pro",
            family: ProviderFamily::Perplexity,
            context_window: 127_000,
            max_output_tokens: 8_192,
            capabilities: &[TextGeneration, WebSearch],
            temperature_range: (0.0, 2.0),
        },
        ModelSpec {
            id: "sonar-deep-research",
            family: ProviderFamily::Perplexity,
            context_window: 127_000,
            max_output_tokens: 8_192,
            capabilities: &[TextGeneration, WebSearch, DeepResearch],
            temperature_range: (0.0, 2.0),
        },
        ModelSpec {
            id: "gemini-2.5-flash-image",
            family: ProviderFamily::Gemini,
            context_window: 32_000,
            max_output_tokens: 8_192,
            capabilities: &[ImageGeneration],
            temperature_range: (0.0, 2.0),
        },
        ModelSpec {
            id: "gemini-2.5-flash",
            family: ProviderFamily::Gemini,
            context_window: 1_000_000,
            max_output_tokens: 8_192,
            capabilities: &[TextGeneration, CodeGeneration, ToolUse],
            temperature_range: (0.0, 2.0),
        },
    ];
    specs.into_iter().map(|s| (s.id, s)).collect()
});

/// Deprecated model ids and their replacements
static DEPRECATED: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("claude-3-5-sonnet", "claude-sonnet-4"),
        ("claude-3-opus", "claude-sonnet-4"),
        ("gpt-4-turbo", "gpt-4o"),
        ("gpt-3.5-turbo", "gpt-4o-mini"),
        ("sonar-medium-online", "sonar-pro"),
        ("llama-3.1-sonar-large-128k-online", "sonar-pro"),
        ("gemini-2.0-flash-exp-image", "gemini-2.5-flash-image"),
    ])
});

/// Read-only view over the static model tables.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog;

impl ModelCatalog {
    pub fn new() -> Self {
        ModelCatalog
    }

    /// Resolve a model id to its spec, following deprecated aliases.
    pub fn resolve(&self, model_id: &str) -> Option<&'static ModelSpec> {
        if let Some(spec) = SPECS.get(model_id) {
            return Some(spec);
        }
        if let Some(replacement) = DEPRECATED.get(model_id) {
            log::debug!("[CATALOG] Alias '{}' -> '{}'", model_id, replacement);
            return SPECS.get(replacement);
        }
        None
    }

    /// Family a model id belongs to, if known
    pub fn family_of(&self, model_id: &str) -> Option<ProviderFamily> {
        self.resolve(model_id).map(|s| s.family)
    }

    /// Known-good default model for a family, used for provider substitution
    pub fn default_for_family(&self, family: ProviderFamily) -> &'static str {
        match family {
            ProviderFamily::Anthropic => "claude-sonnet-4",
            ProviderFamily::OpenAi => "gpt-4o",
            ProviderFamily::Perplexity => "sonar-pro",
            ProviderFamily::Gemini => "gemini-2.5-flash-image",
        }
    }

    /// First model carrying a capability (catalog order is not significant;
    /// callers that care should match on specific ids)
    pub fn first_with_capability(&self, cap: ModelCapability) -> Option<&'static ModelSpec> {
        SPECS.values().find(|s| s.has_capability(cap))
    }

    pub fn all(&self) -> impl Iterator<Item = &'static ModelSpec> {
        SPECS.values()
    }
}
