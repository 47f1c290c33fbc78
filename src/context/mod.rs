//! Conversation context management
//!
//! Reduces arbitrarily long history into a token-bounded window. The recent
//! window is always kept verbatim; older content is either summarized through
//! the fast utility model or filtered by relevance to the current query.
//! Chronological order is preserved among everything selected.

pub mod model_budget;
pub mod tokenizer;

pub use model_budget::ModelBudgetManager;
pub use tokenizer::TokenEstimator;

use crate::providers::{ModelRequest, ProviderRegistry};
use crate::types::{Message, MessageRole};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Tokens held back for the synthetic summary message
const SUMMARY_RESERVE: u32 = 150;
/// Minimum leftover budget before summarization is worth a model call
const MIN_REMAINING_FOR_SUMMARY: u32 = 300;
/// Minimum number of older messages before summarization beats filtering
const MIN_OLDER_FOR_SUMMARY: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextLevel {
    Minimal,
    Standard,
    Full,
    Extended,
}

#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub level: ContextLevel,
    pub max_tokens: u32,
    /// Count of recent messages always kept verbatim
    pub include_recent: usize,
    /// Older messages scoring below this are filtered out
    pub relevance_threshold: f32,
}

impl ContextConfig {
    pub fn for_level(level: ContextLevel) -> Self {
        match level {
            ContextLevel::Minimal => ContextConfig {
                level,
                max_tokens: 500,
                include_recent: 2,
                relevance_threshold: 0.5,
            },
            ContextLevel::Standard => ContextConfig {
                level,
                max_tokens: 2000,
                include_recent: 4,
                relevance_threshold: 0.3,
            },
            ContextLevel::Full => ContextConfig {
                level,
                max_tokens: 6000,
                include_recent: 8,
                relevance_threshold: 0.2,
            },
            ContextLevel::Extended => ContextConfig {
                level,
                max_tokens: 12000,
                include_recent: 12,
                relevance_threshold: 0.1,
            },
        }
    }
}

/// The budgeted window handed to a model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedContext {
    pub messages: Vec<Message>,
    pub token_count: u32,
    pub context_level: ContextLevel,
    /// Older messages dropped by relevance filtering
    pub filtered_count: usize,
    /// Total messages in the raw history
    pub total_available: usize,
    pub has_summary: bool,
    /// Older messages folded into the summary
    pub summarized_count: usize,
}

pub struct ConversationContextManager {
    registry: Arc<ProviderRegistry>,
    utility_model: String,
    estimator: TokenEstimator,
}

impl ConversationContextManager {
    pub fn new(registry: Arc<ProviderRegistry>, utility_model: impl Into<String>) -> Self {
        ConversationContextManager {
            registry,
            utility_model: utility_model.into(),
            estimator: TokenEstimator::default(),
        }
    }

    /// Build a budgeted window from raw history.
    pub async fn build(
        &self,
        history: &[Message],
        query: &str,
        config: &ContextConfig,
    ) -> ManagedContext {
        let total_available = history.len();
        let split = history.len().saturating_sub(config.include_recent);
        let (older, recent) = history.split_at(split);

        let recent_tokens: u32 = recent
            .iter()
            .map(|m| self.estimator.estimate_message(&m.content, m.role))
            .sum();

        // Recent alone overflows: truncate from the oldest end and stop.
        if recent_tokens > config.max_tokens {
            let (messages, token_count) = self.truncate_to_budget(recent, config.max_tokens);
            let kept = messages.len();
            return ManagedContext {
                messages,
                token_count,
                context_level: config.level,
                filtered_count: total_available - kept,
                total_available,
                has_summary: false,
                summarized_count: 0,
            };
        }

        if older.is_empty() {
            return ManagedContext {
                messages: recent.to_vec(),
                token_count: recent_tokens,
                context_level: config.level,
                filtered_count: 0,
                total_available,
                has_summary: false,
                summarized_count: 0,
            };
        }

        let remaining = config
            .max_tokens
            .saturating_sub(recent_tokens)
            .saturating_sub(SUMMARY_RESERVE);

        if remaining >= MIN_REMAINING_FOR_SUMMARY && older.len() >= MIN_OLDER_FOR_SUMMARY {
            if let Some(summary) = self.summarize(older, query).await {
                let budget = config.max_tokens - recent_tokens;
                let summary_msg = self.fit_summary(summary, budget);
                let summary_tokens = self
                    .estimator
                    .estimate_message(&summary_msg.content, summary_msg.role);

                let mut messages = Vec::with_capacity(recent.len() + 1);
                messages.push(summary_msg);
                messages.extend_from_slice(recent);

                return ManagedContext {
                    messages,
                    token_count: recent_tokens + summary_tokens,
                    context_level: config.level,
                    filtered_count: 0,
                    total_available,
                    has_summary: true,
                    summarized_count: older.len(),
                };
            }
            log::warn!("[CONTEXT] Summarization failed, falling back to relevance filtering");
        }

        // Relevance selection over the full leftover budget (no reserve)
        let selection_budget = config.max_tokens - recent_tokens;
        let (selected, selected_tokens) = select_by_relevance(
            older,
            query,
            selection_budget,
            config.relevance_threshold,
            self.estimator,
        );
        let filtered_count = older.len() - selected.len();

        let mut messages = selected;
        messages.extend_from_slice(recent);

        ManagedContext {
            messages,
            token_count: recent_tokens + selected_tokens,
            context_level: config.level,
            filtered_count,
            total_available,
            has_summary: false,
            summarized_count: 0,
        }
    }

    /// Drop from the oldest end until the window fits; a single oversized
    /// message is trimmed by characters rather than dropped entirely.
    fn truncate_to_budget(&self, recent: &[Message], max_tokens: u32) -> (Vec<Message>, u32) {
        let mut start = 0;
        loop {
            let window = &recent[start..];
            let tokens: u32 = window
                .iter()
                .map(|m| self.estimator.estimate_message(&m.content, m.role))
                .sum();
            if tokens <= max_tokens {
                return (window.to_vec(), tokens);
            }
            if window.len() == 1 {
                let mut msg = window[0].clone();
                msg.content = self.trim_content(&msg.content, msg.role, max_tokens);
                let tokens = self.estimator.estimate_message(&msg.content, msg.role);
                return (vec![msg], tokens);
            }
            start += 1;
        }
    }

    /// Shrink content by characters, re-estimating until the message fits.
    /// The estimator's divisor depends on content type, so a fixed ratio is
    /// not safe; the loop converges because the keep length strictly drops.
    fn trim_content(&self, content: &str, role: MessageRole, max_tokens: u32) -> String {
        let mut keep = (max_tokens.saturating_sub(10) as usize).saturating_mul(3);
        let mut trimmed: String = content.chars().take(keep).collect();
        while keep > 0 && self.estimator.estimate_message(&trimmed, role) > max_tokens {
            keep = keep.saturating_sub(keep / 4 + 1);
            trimmed = trimmed.chars().take(keep).collect();
        }
        trimmed
    }

    async fn summarize(&self, older: &[Message], query: &str) -> Option<String> {
        let transcript: String = older
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let system = format!(
            "Summarize this conversation history in at most 100 words. \
             Prioritize anything relevant to the user's current question: \
             \"{}\". Keep names, decisions, and produced artifacts.",
            query
        );
        let request = ModelRequest::new(&self.utility_model, vec![Message::user(transcript)])
            .with_system(system)
            .with_max_tokens(SUMMARY_RESERVE * 2)
            .with_temperature(0.2);

        match self.registry.invoke(request).await {
            Ok(response) if !response.content.trim().is_empty() => Some(response.content),
            Ok(_) => None,
            Err(e) => {
                log::warn!("[CONTEXT] Summary model call failed: {}", e);
                None
            }
        }
    }

    /// Wrap a summary as one synthetic system message, trimmed to budget.
    fn fit_summary(&self, summary: String, budget: u32) -> Message {
        let mut content = format!("[Conversation summary] {}", summary.trim());
        if self.estimator.estimate_message(&content, MessageRole::System) > budget {
            content = self.trim_content(&content, MessageRole::System, budget);
        }
        Message::system(content)
    }
}

/// Greedily include the highest-scoring older messages, re-emitted in
/// original chronological order. Returns (selected, token total).
fn select_by_relevance(
    older: &[Message],
    query: &str,
    budget: u32,
    threshold: f32,
    estimator: TokenEstimator,
) -> (Vec<Message>, u32) {
    let query_terms = expand_terms(query);

    let mut scored: Vec<(usize, f32, u32)> = older
        .iter()
        .enumerate()
        .map(|(i, m)| {
            (
                i,
                relevance_score(m, &query_terms),
                estimator.estimate_message(&m.content, m.role),
            )
        })
        .filter(|(_, score, _)| *score >= threshold)
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut spent = 0u32;
    let mut chosen: Vec<usize> = Vec::new();
    for (i, _, tokens) in scored {
        if spent + tokens > budget {
            continue;
        }
        spent += tokens;
        chosen.push(i);
    }
    chosen.sort_unstable();

    (
        chosen.iter().map(|&i| older[i].clone()).collect(),
        spent,
    )
}

static SYNONYMS: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    HashMap::from([
        ("image", &["picture", "photo", "drawing"][..]),
        ("code", &["function", "script", "program"][..]),
        ("error", &["bug", "issue", "exception", "failure"][..]),
        ("create", &["make", "generate", "build", "produce"][..]),
        ("explain", &["describe", "clarify", "summarize"][..]),
        ("search", &["find", "lookup", "research"][..]),
    ])
});

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "the", "a", "an", "is", "are", "was", "were", "of", "to", "in", "on",
        "for", "and", "or", "it", "that", "this", "with", "as", "at", "by",
        "be", "do", "can", "you", "i", "me", "my", "what", "how", "why",
    ])
});

/// Query terms plus their synonym expansion, lowercased, stopwords removed.
fn expand_terms(query: &str) -> HashSet<String> {
    let mut terms = HashSet::new();
    for word in query.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
        if word.len() < 2 || STOPWORDS.contains(word) {
            continue;
        }
        terms.insert(word.to_string());
        if let Some(syns) = SYNONYMS.get(word) {
            for s in *syns {
                terms.insert(s.to_string());
            }
        }
    }
    terms
}

/// Score one older message against the expanded query terms.
///
/// Term overlap dominates; rare terms (long words, identifiers with digits)
/// weigh double. Small boosts for user role, technical markers, and a useful
/// length band.
fn relevance_score(message: &Message, query_terms: &HashSet<String>) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }

    let content_lower = message.content.to_lowercase();
    let content_terms: HashSet<&str> = content_lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 2)
        .collect();

    let mut weighted_hits = 0.0f32;
    let mut total_weight = 0.0f32;
    for term in query_terms {
        let rare = term.len() > 8 || term.chars().any(|c| c.is_ascii_digit());
        let weight = if rare { 2.0 } else { 1.0 };
        total_weight += weight;
        if content_terms.contains(term.as_str()) {
            weighted_hits += weight;
        }
    }
    let mut score = weighted_hits / total_weight;

    if message.role == MessageRole::User {
        score += 0.05;
    }
    if message.content.contains("```")
        || message.content.contains("http")
        || message.content.contains("data:")
    {
        score += 0.1;
    }
    let len = message.content.chars().count();
    if (20..600).contains(&len) {
        score += 0.05;
    }

    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{
        ModelProvider, ModelResponse, ProviderError, ProviderFamily,
    };
    use async_trait::async_trait;

    struct StubSummarizer;

    #[async_trait]
    impl ModelProvider for StubSummarizer {
        fn family(&self) -> ProviderFamily {
            ProviderFamily::OpenAi
        }

        async fn invoke(&self, _request: ModelRequest) -> Result<ModelResponse, ProviderError> {
            Ok(ModelResponse::text("User discussed Rust testing and a cat image."))
        }
    }

    fn manager_with_stub() -> ConversationContextManager {
        let registry = Arc::new(ProviderRegistry::new());
        registry.register(Arc::new(StubSummarizer));
        ConversationContextManager::new(registry, "gpt-4o-mini")
    }

    fn history(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("question number {} about various topics", i))
                } else {
                    Message::assistant(format!("answer number {} with some detail", i))
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_standard_level_summarizes_older_history() {
        // Scenario: 20 messages, standard preset -> last 4 verbatim plus one
        // synthetic summary message.
        let manager = manager_with_stub();
        let config = ContextConfig::for_level(ContextLevel::Standard);
        let msgs = history(20);

        let ctx = manager.build(&msgs, "tell me more", &config).await;

        assert!(ctx.has_summary);
        assert_eq!(ctx.summarized_count, 16);
        assert_eq!(ctx.messages.len(), 5);
        assert!(ctx.messages[0].content.starts_with("[Conversation summary]"));
        // Last 4 verbatim, in order
        for (i, msg) in ctx.messages[1..].iter().enumerate() {
            assert_eq!(msg.content, msgs[16 + i].content);
        }
        assert!(ctx.token_count <= config.max_tokens);
    }

    #[tokio::test]
    async fn test_budget_never_exceeded() {
        let manager = manager_with_stub();
        for level in [
            ContextLevel::Minimal,
            ContextLevel::Standard,
            ContextLevel::Full,
            ContextLevel::Extended,
        ] {
            let config = ContextConfig::for_level(level);
            for n in [0, 1, 5, 30, 100] {
                let ctx = manager.build(&history(n), "query about rust", &config).await;
                assert!(
                    ctx.token_count <= config.max_tokens,
                    "budget exceeded at level {:?} with {} messages",
                    level,
                    n
                );
            }
        }
    }

    #[tokio::test]
    async fn test_oversized_json_message_trimmed_under_budget() {
        // JSON-dense content estimates at a tighter chars-per-token ratio
        // than prose; the trim loop must re-estimate until it fits.
        let manager = manager_with_stub();
        let config = ContextConfig {
            level: ContextLevel::Minimal,
            max_tokens: 200,
            include_recent: 2,
            relevance_threshold: 0.3,
        };
        let msgs = vec![Message::user(r#"{"k":"v","a":1},"#.repeat(200))];

        let ctx = manager.build(&msgs, "what is in the payload", &config).await;
        assert!(
            ctx.token_count <= config.max_tokens,
            "token_count={} > max_tokens={}",
            ctx.token_count,
            config.max_tokens
        );
    }

    #[tokio::test]
    async fn test_short_history_returned_verbatim() {
        let manager = manager_with_stub();
        let config = ContextConfig::for_level(ContextLevel::Standard);
        let msgs = history(3);

        let ctx = manager.build(&msgs, "anything", &config).await;
        assert_eq!(ctx.messages.len(), 3);
        assert!(!ctx.has_summary);
        assert_eq!(ctx.filtered_count, 0);
    }

    #[tokio::test]
    async fn test_oversized_recent_truncates_from_oldest() {
        let manager = manager_with_stub();
        let config = ContextConfig {
            level: ContextLevel::Minimal,
            max_tokens: 60,
            include_recent: 4,
            relevance_threshold: 0.5,
        };
        let msgs: Vec<Message> = (0..4)
            .map(|i| Message::user(format!("{} {}", i, "word ".repeat(40))))
            .collect();

        let ctx = manager.build(&msgs, "anything", &config).await;
        assert!(ctx.token_count <= 60);
        assert!(!ctx.has_summary);
        // Whatever survived must be the newest messages
        if let Some(last) = ctx.messages.last() {
            assert!(last.content.starts_with('3'));
        }
    }

    #[test]
    fn test_relevance_prefers_matching_messages() {
        let terms = expand_terms("rust borrow checker error");
        let on_topic = Message::user("I hit a borrow checker error in my rust code");
        let off_topic = Message::user("what should I cook for dinner tonight");

        assert!(relevance_score(&on_topic, &terms) > relevance_score(&off_topic, &terms));
    }

    #[test]
    fn test_synonym_expansion_matches() {
        let terms = expand_terms("create an image");
        // "generate" and "picture" arrive via synonym expansion
        assert!(terms.contains("generate"));
        assert!(terms.contains("picture"));
    }

    #[test]
    fn test_selection_keeps_chronological_order() {
        let estimator = TokenEstimator::default();
        let older = vec![
            Message::user("rust question one about lifetimes"),
            Message::user("unrelated gardening chat"),
            Message::user("rust question two about lifetimes"),
        ];
        let (selected, _) =
            select_by_relevance(&older, "rust lifetimes", 10_000, 0.2, estimator);
        assert_eq!(selected.len(), 2);
        assert!(selected[0].content.contains("one"));
        assert!(selected[1].content.contains("two"));
    }
}
