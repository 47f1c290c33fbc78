//! Model providers
//!
//! Every external model family is wrapped in one [`ModelProvider`]
//! implementation exposing a uniform `invoke(request) -> response` surface.
//! Provider-specific formatting quirks (system-turn handling, tool-call
//! encodings, image payloads) live inside the implementation, never in the
//! orchestrator. Selection goes through the [`ProviderRegistry`], keyed by
//! model id via the catalog.

pub mod anthropic;
pub mod catalog;
pub mod gemini;
pub mod openai;
pub mod perplexity;

pub use anthropic::AnthropicProvider;
pub use catalog::{ModelCapability, ModelCatalog, ModelSpec};
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use perplexity::PerplexityProvider;

use crate::tools::ToolDefinition;
use crate::types::Message;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Provider API error with status code information
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub message: String,
    /// HTTP status code if available
    pub status_code: Option<u16>,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        ProviderError {
            message: message.into(),
            status_code: None,
        }
    }

    pub fn with_status(message: impl Into<String>, status_code: u16) -> Self {
        ProviderError {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Check if this is a client error (4xx status code)
    pub fn is_client_error(&self) -> bool {
        self.status_code.map(|c| (400..500).contains(&c)).unwrap_or(false)
    }

    /// Check if this is a server error (5xx status code)
    pub fn is_server_error(&self) -> bool {
        self.status_code.map(|c| c >= 500).unwrap_or(false)
    }

    /// Check if this error indicates the context/input is too large
    pub fn is_context_too_large(&self) -> bool {
        let msg = self.message.to_lowercase();
        msg.contains("too large")
            || msg.contains("exceeds maximum")
            || msg.contains("input tokens")
            || msg.contains("context length")
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.status_code {
            write!(f, "[HTTP {}] {}", code, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<String> for ProviderError {
    fn from(s: String) -> Self {
        ProviderError::new(s)
    }
}

impl From<&str> for ProviderError {
    fn from(s: &str) -> Self {
        ProviderError::new(s)
    }
}

/// Provider families the engine can route to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderFamily {
    Anthropic,
    OpenAi,
    Perplexity,
    Gemini,
}

/// A tool invocation requested by a model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Name of the tool to call
    pub name: String,
    /// Arguments to pass to the tool as JSON
    pub arguments: Value,
}

/// Uniform request shape handed to any provider
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub system: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Tool definitions for function calling; empty disables tool calling
    pub tools: Vec<ToolDefinition>,
}

impl ModelRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        ModelRequest {
            model: model.into(),
            messages,
            system: None,
            max_tokens: 4096,
            temperature: None,
            tools: vec![],
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// Uniform response shape returned by any provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Text content (may be empty if the model only requested tools)
    pub content: String,
    /// Tool calls requested by the model
    pub tool_calls: Vec<ToolCall>,
    /// Search citations, when the provider returns them
    pub citations: Vec<String>,
    /// Generated artifact URLs (images etc.)
    pub artifacts: Vec<String>,
    pub stop_reason: Option<String>,
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        ModelResponse {
            content: content.into(),
            stop_reason: Some("end_turn".to_string()),
            ..Default::default()
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Uniform interface over one provider family's API
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn family(&self) -> ProviderFamily;

    /// Invoke the model named in the request and normalize the result.
    async fn invoke(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError>;
}

/// Registry mapping model ids to provider implementations.
///
/// Lookup resolves the model id through the catalog (including deprecated
/// aliases), then picks the registered provider for that family. Interior
/// mutability so providers can be registered at runtime.
pub struct ProviderRegistry {
    providers: RwLock<HashMap<ProviderFamily, Arc<dyn ModelProvider>>>,
    catalog: ModelCatalog,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        ProviderRegistry {
            providers: RwLock::new(HashMap::new()),
            catalog: ModelCatalog::new(),
        }
    }

    pub fn register(&self, provider: Arc<dyn ModelProvider>) {
        self.providers.write().insert(provider.family(), provider);
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Look up the provider serving a model id (alias-resolved).
    pub fn for_model(&self, model_id: &str) -> Option<Arc<dyn ModelProvider>> {
        let spec = self.catalog.resolve(model_id)?;
        self.providers.read().get(&spec.family).cloned()
    }

    pub fn is_family_available(&self, family: ProviderFamily) -> bool {
        self.providers.read().contains_key(&family)
    }

    pub fn available_families(&self) -> Vec<ProviderFamily> {
        self.providers.read().keys().copied().collect()
    }

    /// Invoke a model by id: resolves aliases, clamps temperature and output
    /// tokens to the catalog spec, then dispatches to the family's provider.
    pub async fn invoke(&self, mut request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        let spec = self
            .catalog
            .resolve(&request.model)
            .ok_or_else(|| ProviderError::new(format!("Unknown model: {}", request.model)))?;

        if spec.id != request.model {
            log::info!(
                "[PROVIDERS] Model '{}' is deprecated, resolved to '{}'",
                request.model,
                spec.id
            );
            request.model = spec.id.to_string();
        }

        if let Some(temp) = request.temperature {
            let (lo, hi) = spec.temperature_range;
            request.temperature = Some(temp.clamp(lo, hi));
        }
        request.max_tokens = request.max_tokens.min(spec.max_output_tokens);

        let provider = self
            .providers
            .read()
            .get(&spec.family)
            .cloned()
            .ok_or_else(|| {
                ProviderError::new(format!(
                    "No provider registered for family '{}' (model '{}')",
                    spec.family, spec.id
                ))
            })?;

        provider.invoke(request).await
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
