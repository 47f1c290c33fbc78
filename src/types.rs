//! External request/response contracts.
//!
//! The caller (chat transport, UI backend, etc.) sends a [`ChatRequest`] and
//! receives either a single [`ChatResponse::Single`] or an ordered chain of
//! [`ChainStepResult`]s. Everything here is plain data, with no UI state or
//! persistence handles attached.

use crate::intent::QueryIntent;
use crate::planner::StepPurpose;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    /// Synthetic tool-result messages appended before the final model turn
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Message {
            role: MessageRole::Tool,
            content: content.into(),
        }
    }
}

/// Ambient context the caller attaches to a request (current learning module,
/// highlighted text, etc.). All fields optional except the history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub module_title: Option<String>,
    #[serde(default)]
    pub current_slide: Option<String>,
    #[serde(default)]
    pub highlighted_text: Option<String>,
    #[serde(default)]
    pub conversation_history: Vec<Message>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Explicit model override that bypasses the classifier's model selection
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub context: RequestContext,
}

/// What kind of payload a chain step produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutputKind {
    Text,
    Image,
    Video,
    Code,
}

impl Default for StepOutputKind {
    fn default() -> Self {
        StepOutputKind::Text
    }
}

/// Per-step metadata carried on a [`ChainStepResult`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepMetadata {
    /// Search citations, when the step's provider returned them
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub citations: Vec<String>,
    /// URLs or ids of artifacts produced by the step (images, files)
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub artifacts: Vec<String>,
    /// Human-readable note from the step coordinator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinator_notes: Option<String>,
    /// The coordinated input handed to the following step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_for_next_step: Option<String>,
}

/// Append-only log entry for one executed chain step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainStepResult {
    /// 1-based step number
    pub step: usize,
    pub model: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: StepOutputKind,
    pub purpose: StepPurpose,
    pub execution_time_ms: u64,
    #[serde(default)]
    pub metadata: StepMetadata,
}

/// The orchestrator's answer: one response, or the full step log of a chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatResponse {
    Chained {
        #[serde(rename = "isChained")]
        is_chained: bool,
        steps: Vec<ChainStepResult>,
        total_execution_time_ms: u64,
        intent: QueryIntent,
    },
    Single {
        content: String,
        model: String,
        intent: QueryIntent,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<Value>,
    },
}

impl ChatResponse {
    pub fn single(content: impl Into<String>, model: impl Into<String>, intent: QueryIntent) -> Self {
        ChatResponse::Single {
            content: content.into(),
            model: model.into(),
            intent,
            metadata: None,
        }
    }

    pub fn chained(steps: Vec<ChainStepResult>, total_execution_time_ms: u64, intent: QueryIntent) -> Self {
        ChatResponse::Chained {
            is_chained: true,
            steps,
            total_execution_time_ms,
            intent,
        }
    }

    /// Final user-facing text (last chain step's content for chains)
    pub fn content(&self) -> &str {
        match self {
            ChatResponse::Single { content, .. } => content,
            ChatResponse::Chained { steps, .. } => {
                steps.last().map(|s| s.content.as_str()).unwrap_or("")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let msg = Message::user("hello");
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content, "hello");
        assert_eq!(MessageRole::Tool.as_str(), "tool");
    }

    #[test]
    fn test_chat_request_deserializes_with_defaults() {
        let req: ChatRequest = serde_json::from_str(r#"{"message": "hi"}"#).unwrap();
        assert_eq!(req.message, "hi");
        assert!(req.model.is_none());
        assert!(req.context.conversation_history.is_empty());
    }

    #[test]
    fn test_step_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&StepOutputKind::Image).unwrap(),
            "\"image\""
        );
    }
}
