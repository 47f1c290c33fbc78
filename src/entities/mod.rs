//! Conversation entity tracking
//!
//! Records reusable artifacts (prompts, images, code, search results)
//! produced by steps and tool calls, so later turns can say "that prompt"
//! and get the literal content back. Append-only: entities are never mutated
//! after creation. One tracker per conversation, owned by the session state.

pub mod resolver;

pub use resolver::ReferenceResolver;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EntityKind {
    Prompt,
    Image,
    Code,
    SearchResult,
    Analysis,
    Explanation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedEntity {
    pub id: String,
    pub kind: EntityKind,
    pub content: String,
    #[serde(default)]
    pub metadata: Value,
    /// Which user turn produced this entity
    pub turn_index: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationEntityTracker {
    entities: Vec<TrackedEntity>,
    turn_index: u32,
}

impl ConversationEntityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the turn counter. Called once per user message, not per tool
    /// call.
    pub fn begin_turn(&mut self) {
        self.turn_index += 1;
    }

    pub fn turn_index(&self) -> u32 {
        self.turn_index
    }

    /// Append an entity and return its generated id.
    pub fn track(&mut self, kind: EntityKind, content: impl Into<String>, metadata: Value) -> String {
        let id = Uuid::new_v4().to_string();
        self.entities.push(TrackedEntity {
            id: id.clone(),
            kind,
            content: content.into(),
            metadata,
            turn_index: self.turn_index,
            created_at: Utc::now(),
        });
        log::debug!("[ENTITIES] Tracked {} entity {}", kind, id);
        id
    }

    /// Latest entity of a kind, or latest overall when no kind is given.
    pub fn most_recent(&self, kind: Option<EntityKind>) -> Option<&TrackedEntity> {
        match kind {
            Some(kind) => self.entities.iter().rev().find(|e| e.kind == kind),
            None => self.entities.last(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&TrackedEntity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn all(&self) -> &[TrackedEntity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn serialize(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn deserialize(data: &str) -> Result<Self, String> {
        serde_json::from_str(data).map_err(|e| format!("Invalid tracker snapshot: {}", e))
    }
}
