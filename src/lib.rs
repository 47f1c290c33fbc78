//! chorus-engine: multi-model workflow orchestration.
//!
//! Routes each chat request across a pool of model providers: classify the
//! intent, plan a workflow when the request needs coordinated steps, budget
//! the conversation context per step, execute tools concurrently, and track
//! the artifacts a conversation produces so later turns can refer back to
//! them.
//!
//! The public surface is [`orchestrator::Orchestrator`] plus the types it
//! consumes and produces; the submodules are usable on their own.

pub mod config;
pub mod context;
pub mod coordinator;
pub mod entities;
pub mod extract;
pub mod instructions;
pub mod intent;
pub mod orchestrator;
pub mod planner;
pub mod providers;
pub mod tools;
pub mod types;

pub use config::Config;
pub use orchestrator::{NoopProgress, Orchestrator, ProgressSink};
pub use providers::{ModelProvider, ProviderError, ProviderRegistry};
pub use types::{ChatRequest, ChatResponse};

use std::sync::Arc;

/// Wire up a provider registry from configured API keys and an orchestrator
/// with every builtin tool. Families without a key are simply not registered;
/// the planner substitutes around them.
pub fn build_orchestrator(config: Config) -> Orchestrator {
    let registry = Arc::new(ProviderRegistry::new());

    if let Some(key) = &config.anthropic_api_key {
        match providers::AnthropicProvider::new(key, None) {
            Ok(provider) => registry.register(Arc::new(provider)),
            Err(e) => log::warn!("[INIT] Anthropic provider disabled: {}", e),
        }
    }
    if let Some(key) = &config.openai_api_key {
        match providers::OpenAiProvider::new(key, None) {
            Ok(provider) => registry.register(Arc::new(provider)),
            Err(e) => log::warn!("[INIT] OpenAI provider disabled: {}", e),
        }
    }
    if let Some(key) = &config.perplexity_api_key {
        match providers::PerplexityProvider::new(key, None) {
            Ok(provider) => registry.register(Arc::new(provider)),
            Err(e) => log::warn!("[INIT] Perplexity provider disabled: {}", e),
        }
    }
    if let Some(key) = &config.gemini_api_key {
        match providers::GeminiProvider::new(key, None) {
            Ok(provider) => registry.register(Arc::new(provider)),
            Err(e) => log::warn!("[INIT] Gemini provider disabled: {}", e),
        }
    }

    let tools = Arc::new(tools::create_default_registry(Arc::clone(&registry)));
    Orchestrator::new(config, registry, tools)
}
