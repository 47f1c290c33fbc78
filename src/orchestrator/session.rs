//! Conversation-scoped state
//!
//! Each conversation owns one entity tracker. A request mutates only its own
//! conversation's state, so the per-entry dashmap lock is uncontended in the
//! cooperative single-request-per-conversation model.

use crate::entities::ConversationEntityTracker;
use dashmap::DashMap;

#[derive(Default)]
pub struct ConversationState {
    pub tracker: ConversationEntityTracker,
}

/// All live conversation states, keyed by session id.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, ConversationState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the conversation's state, creating it on first use.
    pub fn with_state<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut ConversationState) -> R,
    ) -> R {
        let mut entry = self.sessions.entry(session_id.to_string()).or_default();
        f(entry.value_mut())
    }

    /// Serialized tracker snapshot, for persistence across process restarts.
    pub fn snapshot(&self, session_id: &str) -> Option<String> {
        self.sessions
            .get(session_id)
            .map(|state| state.tracker.serialize())
    }

    /// Restore a conversation from a snapshot produced by [`snapshot`].
    ///
    /// [`snapshot`]: SessionStore::snapshot
    pub fn restore(&self, session_id: &str, snapshot: &str) -> Result<(), String> {
        let tracker = ConversationEntityTracker::deserialize(snapshot)?;
        self.sessions
            .insert(session_id.to_string(), ConversationState { tracker });
        Ok(())
    }

    pub fn remove(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EntityKind;
    use serde_json::Value;

    #[test]
    fn test_states_are_isolated_per_session() {
        let store = SessionStore::new();
        store.with_state("a", |state| {
            state.tracker.begin_turn();
            state.tracker.track(EntityKind::Prompt, "alpha", Value::Null);
        });
        store.with_state("b", |state| {
            assert!(state.tracker.is_empty());
        });
        store.with_state("a", |state| {
            assert_eq!(state.tracker.len(), 1);
        });
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let store = SessionStore::new();
        store.with_state("a", |state| {
            state.tracker.begin_turn();
            state.tracker.track(EntityKind::Image, "url", Value::Null);
        });

        let snapshot = store.snapshot("a").unwrap();
        let restored = SessionStore::new();
        restored.restore("a", &snapshot).unwrap();
        restored.with_state("a", |state| {
            assert_eq!(state.tracker.len(), 1);
            assert_eq!(state.tracker.turn_index(), 1);
        });
    }
}
