//! Tool schema and result types
//!
//! A tool is declared as `{name, description, parameters}` in the shape the
//! model function-calling APIs expect, and returns a normalized result whose
//! `metadata.type` tag tells the orchestrator how to shape the response.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// JSON-schema-like property description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl PropertySchema {
    pub fn string(description: impl Into<String>) -> Self {
        PropertySchema {
            schema_type: "string".to_string(),
            description: description.into(),
            default: None,
            items: None,
            enum_values: None,
        }
    }

    pub fn string_enum(description: impl Into<String>, values: &[&str]) -> Self {
        PropertySchema {
            enum_values: Some(values.iter().map(|s| s.to_string()).collect()),
            ..Self::string(description)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: HashMap<String, PropertySchema>,
    pub required: Vec<String>,
}

impl Default for ToolInputSchema {
    fn default() -> Self {
        ToolInputSchema {
            schema_type: "object".to_string(),
            properties: HashMap::new(),
            required: vec![],
        }
    }
}

/// Tool declaration consumed by the model's function-calling interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
}

/// Per-request context handed to tool implementations
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    /// The raw user message that triggered the tool batch
    pub user_message: String,
}

/// Raw outcome of one tool implementation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        ToolResult {
            success: true,
            content: content.into(),
            error: None,
            metadata: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        let error = error.into();
        ToolResult {
            success: false,
            content: error.clone(),
            error: Some(error),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The `type` tag in metadata, used downstream to decide response shape
    pub fn metadata_type(&self) -> Option<&str> {
        self.metadata.as_ref()?.get("type")?.as_str()
    }
}

/// Normalized result of executing one tool call, keyed back to the call id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    pub tool_call_id: String,
    pub name: String,
    pub content: String,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_result_constructors() {
        let ok = ToolResult::success("done");
        assert!(ok.success);
        assert!(ok.error.is_none());

        let err = ToolResult::error("boom");
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("boom"));
        assert_eq!(err.content, "boom");
    }

    #[test]
    fn test_metadata_type_tag() {
        let result = ToolResult::success("https://img.example/cat.png")
            .with_metadata(serde_json::json!({"type": "image"}));
        assert_eq!(result.metadata_type(), Some("image"));

        assert_eq!(ToolResult::success("plain").metadata_type(), None);
    }

    #[test]
    fn test_schema_serializes_like_json_schema() {
        let schema = PropertySchema::string_enum("search depth", &["quick", "deep"]);
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["type"], "string");
        assert_eq!(json["enum"][0], "quick");
    }
}
