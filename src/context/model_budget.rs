//! Per-model context budgeting
//!
//! Derives a budget from the target model's context window minus reserved
//! output tokens, classifies messages by importance, and for small-context
//! models filters low-importance history before chunked summarization.

use super::tokenizer::TokenEstimator;
use crate::providers::{ModelRequest, ProviderRegistry};
use crate::types::{Message, MessageRole};
use std::sync::Arc;

/// Context windows below this are treated as small-context models
const SMALL_CONTEXT_THRESHOLD: u32 = 64_000;
/// Messages below this importance are dropped when a small-context model
/// overflows
const MIN_IMPORTANCE: f32 = 0.3;
/// Chunk size for summarizing filtered-out history
const SUMMARY_CHUNK: usize = 8;
/// Newest messages always kept verbatim
const KEEP_RECENT: usize = 6;

/// History fitted to one model's window
#[derive(Debug, Clone)]
pub struct ModelWindow {
    pub messages: Vec<Message>,
    pub token_count: u32,
    pub budget: u32,
}

pub struct ModelBudgetManager {
    registry: Arc<ProviderRegistry>,
    utility_model: String,
    estimator: TokenEstimator,
}

impl ModelBudgetManager {
    pub fn new(registry: Arc<ProviderRegistry>, utility_model: impl Into<String>) -> Self {
        ModelBudgetManager {
            registry,
            utility_model: utility_model.into(),
            estimator: TokenEstimator::default(),
        }
    }

    /// Input budget for a model: context window minus its output reserve.
    pub fn budget_for(&self, model_id: &str) -> Option<u32> {
        let spec = self.registry.catalog().resolve(model_id)?;
        Some(spec.context_window.saturating_sub(spec.max_output_tokens))
    }

    /// Fit history into the model's window. Unknown models get a conservative
    /// default budget rather than an error.
    pub async fn fit(&self, history: &[Message], model_id: &str) -> ModelWindow {
        let budget = self.budget_for(model_id).unwrap_or(8_000);
        let spec_window = self
            .registry
            .catalog()
            .resolve(model_id)
            .map(|s| s.context_window)
            .unwrap_or(16_000);

        let total: u32 = history
            .iter()
            .map(|m| self.estimator.estimate_message(&m.content, m.role))
            .sum();
        if total <= budget {
            return ModelWindow {
                messages: history.to_vec(),
                token_count: total,
                budget,
            };
        }

        if spec_window < SMALL_CONTEXT_THRESHOLD {
            self.fit_small_context(history, budget).await
        } else {
            self.drop_oldest(history, budget)
        }
    }

    /// Large windows: keep the newest slice that fits. A lone message that
    /// still overflows is trimmed by characters, never under-reported.
    fn drop_oldest(&self, history: &[Message], budget: u32) -> ModelWindow {
        let mut start = 0;
        loop {
            let window = &history[start..];
            let tokens: u32 = window
                .iter()
                .map(|m| self.estimator.estimate_message(&m.content, m.role))
                .sum();
            if tokens <= budget {
                return ModelWindow {
                    messages: window.to_vec(),
                    token_count: tokens,
                    budget,
                };
            }
            if window.len() == 1 {
                let mut msg = window[0].clone();
                msg.content = self.trim_to_budget(&msg.content, msg.role, budget);
                let tokens = self.estimator.estimate_message(&msg.content, msg.role);
                return ModelWindow {
                    messages: vec![msg],
                    token_count: tokens,
                    budget,
                };
            }
            start += 1;
        }
    }

    /// Character-level trim with re-estimation; the estimator's divisor
    /// depends on content type so a fixed ratio cannot be trusted.
    fn trim_to_budget(&self, content: &str, role: MessageRole, budget: u32) -> String {
        let mut keep = (budget.saturating_sub(10) as usize).saturating_mul(3);
        let mut trimmed: String = content.chars().take(keep).collect();
        while keep > 0 && self.estimator.estimate_message(&trimmed, role) > budget {
            keep = keep.saturating_sub(keep / 4 + 1);
            trimmed = trimmed.chars().take(keep).collect();
        }
        trimmed
    }

    /// Small windows: filter by importance, then chunk-summarize whatever
    /// still doesn't fit ahead of the verbatim recent tail.
    async fn fit_small_context(&self, history: &[Message], budget: u32) -> ModelWindow {
        let split = history.len().saturating_sub(KEEP_RECENT);
        let (older, recent) = history.split_at(split);

        let important: Vec<Message> = older
            .iter()
            .enumerate()
            .filter(|(i, m)| importance(m, *i, older.len()) >= MIN_IMPORTANCE)
            .map(|(_, m)| m.clone())
            .collect();
        log::debug!(
            "[CONTEXT] Importance filter kept {}/{} older messages",
            important.len(),
            older.len()
        );

        let recent_tokens: u32 = recent
            .iter()
            .map(|m| self.estimator.estimate_message(&m.content, m.role))
            .sum();
        let important_tokens: u32 = important
            .iter()
            .map(|m| self.estimator.estimate_message(&m.content, m.role))
            .sum();

        if recent_tokens + important_tokens <= budget {
            let mut messages = important;
            messages.extend_from_slice(recent);
            return ModelWindow {
                messages,
                token_count: recent_tokens + important_tokens,
                budget,
            };
        }

        // Still over: summarize the important messages chunk by chunk
        let mut summaries: Vec<Message> = Vec::new();
        for chunk in important.chunks(SUMMARY_CHUNK) {
            summaries.push(self.summarize_chunk(chunk).await);
        }

        let mut messages = summaries;
        messages.extend_from_slice(recent);
        self.drop_oldest(&messages, budget)
    }

    async fn summarize_chunk(&self, chunk: &[Message]) -> Message {
        let transcript: String = chunk
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let request = ModelRequest::new(&self.utility_model, vec![Message::user(transcript)])
            .with_system("Summarize this conversation excerpt in at most 60 words. Keep decisions and artifacts.")
            .with_max_tokens(256)
            .with_temperature(0.2);

        match self.registry.invoke(request).await {
            Ok(response) if !response.content.trim().is_empty() => Message::system(format!(
                "[Conversation summary] {}",
                response.content.trim()
            )),
            _ => {
                // Degrade to a truncated raw excerpt
                let excerpt: String = chunk
                    .iter()
                    .map(|m| m.content.chars().take(80).collect::<String>())
                    .collect::<Vec<_>>()
                    .join(" / ");
                Message::system(format!("[Conversation summary] {}", excerpt))
            }
        }
    }
}

/// Importance of one message: recency, role, and attached artifacts.
fn importance(message: &Message, index: usize, total: usize) -> f32 {
    let recency = if total <= 1 {
        0.5
    } else {
        0.5 * (index as f32 / (total - 1) as f32)
    };

    let role = match message.role {
        MessageRole::System => 0.3,
        MessageRole::Tool => 0.25,
        MessageRole::User => 0.15,
        MessageRole::Assistant => 0.05,
    };

    let artifacts = if message.content.contains("data:")
        || message.content.contains("http")
        || message.content.contains("```")
    {
        0.2
    } else {
        0.0
    };

    (recency + role + artifacts).min(1.0)
}
