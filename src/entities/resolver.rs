//! Reference resolution
//!
//! Rewrites anaphoric phrases ("that prompt", "using it") into the literal
//! content of the most recent matching entity. Only phrases adjacent to an
//! action verb are rewritten; pure mentions ("I like that prompt") pass
//! through. Missing entities make resolution a no-op, never an error.

use super::{ConversationEntityTracker, EntityKind};
use crate::instructions::References;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static ACTION_VERBS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "generate", "create", "make", "use", "using", "with", "apply",
        "applying", "from", "edit", "modify", "run", "execute", "take",
        "convert", "enhance", "regenerate", "improve", "translate",
    ])
});

/// Matches "use it" style indicators where only the pronoun is replaced
static VERB_IT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(use|using|with|from|apply(?:ing)?)\s+(it)$").unwrap());

pub struct ReferenceResolver;

impl ReferenceResolver {
    /// Replace every resolvable reference phrase in the message. Returns the
    /// message unchanged when there is nothing to resolve.
    pub fn resolve_all(
        message: &str,
        references: &References,
        tracker: &ConversationEntityTracker,
    ) -> String {
        if !references.has_references || tracker.is_empty() {
            return message.to_string();
        }

        let mut resolved = message.to_string();
        for indicator in &references.reference_indicators {
            resolved = Self::resolve_one(&resolved, indicator, references.reference_type, tracker);
        }
        resolved
    }

    fn resolve_one(
        message: &str,
        indicator: &str,
        hinted_kind: Option<EntityKind>,
        tracker: &ConversationEntityTracker,
    ) -> String {
        let kind = hinted_kind.or_else(|| infer_kind(indicator));
        let entity = match tracker.most_recent(kind) {
            Some(e) => e,
            None => {
                log::debug!(
                    "[ENTITIES] No entity for reference '{}', passing through",
                    indicator
                );
                return message.to_string();
            }
        };

        // "using it" carries its own verb: keep the verb, swap the pronoun
        if let Some(captures) = VERB_IT.captures(indicator) {
            let verb = captures.get(1).map(|m| m.as_str()).unwrap_or("using");
            let Ok(pattern) = Regex::new(&format!(r"(?i)\b{}\s+it\b", regex::escape(verb))) else {
                return message.to_string();
            };
            let replacement = format!("{} {}", verb, entity.content);
            return pattern
                .replace(message, regex::NoExpand(&replacement))
                .into_owned();
        }

        let Ok(pattern) = Regex::new(&format!(r"(?i){}", regex::escape(indicator))) else {
            return message.to_string();
        };
        let found = match pattern.find(message) {
            Some(f) => f,
            None => return message.to_string(),
        };

        if !preceded_by_action_verb(message, found.start()) {
            log::debug!(
                "[ENTITIES] Reference '{}' not action-adjacent, leaving untouched",
                indicator
            );
            return message.to_string();
        }

        pattern
            .replace(message, regex::NoExpand(&entity.content))
            .into_owned()
    }
}

/// True when one of the three words before `pos` is an action verb.
fn preceded_by_action_verb(message: &str, pos: usize) -> bool {
    message[..pos]
        .split_whitespace()
        .rev()
        .take(3)
        .any(|w| {
            let w: String = w
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            ACTION_VERBS.contains(w.as_str())
        })
}

fn infer_kind(indicator: &str) -> Option<EntityKind> {
    let lower = indicator.to_lowercase();
    if lower.contains("prompt") {
        Some(EntityKind::Prompt)
    } else if lower.contains("image") || lower.contains("picture") || lower.contains("photo") {
        Some(EntityKind::Image)
    } else if lower.contains("code") || lower.contains("function") || lower.contains("script") {
        Some(EntityKind::Code)
    } else if lower.contains("result") || lower.contains("search") {
        Some(EntityKind::SearchResult)
    } else if lower.contains("analysis") {
        Some(EntityKind::Analysis)
    } else if lower.contains("explanation") {
        Some(EntityKind::Explanation)
    } else {
        None
    }
}
