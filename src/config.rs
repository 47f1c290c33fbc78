use std::env;

/// Engine configuration, read once from the environment.
///
/// API keys are optional at construction time: a missing key disables that
/// provider family, and the planner's fallback substitutes an available one.
#[derive(Clone)]
pub struct Config {
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub perplexity_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    /// Fast low-latency model used for classification, coordination, summaries
    pub utility_model: String,
    /// Always-available model answering when everything else failed
    pub fallback_model: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            perplexity_api_key: env::var("PERPLEXITY_API_KEY").ok(),
            gemini_api_key: env::var("GEMINI_API_KEY").ok(),
            utility_model: env::var("CHORUS_UTILITY_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            fallback_model: env::var("CHORUS_FALLBACK_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        }
    }
}
