//! Concept explanation tool.

use crate::providers::{ModelRequest, ProviderRegistry};
use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolResult,
};
use crate::types::Message;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub struct ExplainConceptTool {
    providers: Arc<ProviderRegistry>,
    definition: ToolDefinition,
}

impl ExplainConceptTool {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "concept".to_string(),
            PropertySchema::string("The concept to explain."),
        );
        properties.insert(
            "level".to_string(),
            PropertySchema::string_enum(
                "Target audience level.",
                &["beginner", "intermediate", "advanced"],
            ),
        );

        ExplainConceptTool {
            providers,
            definition: ToolDefinition {
                name: "explain_concept".to_string(),
                description: "Explain a concept clearly, with an example.".to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec!["concept".to_string()],
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExplainConceptParams {
    concept: String,
    #[serde(default)]
    level: Option<String>,
}

#[async_trait]
impl Tool for ExplainConceptTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> ToolResult {
        let params: ExplainConceptParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };

        let level = params.level.as_deref().unwrap_or("intermediate");
        let system = format!(
            "You explain concepts to a {} audience. Lead with a one-sentence \
             definition, then the mechanism, then one concrete example.",
            level
        );
        let request = ModelRequest::new("gpt-4o-mini", vec![Message::user(params.concept)])
            .with_system(system)
            .with_max_tokens(1024)
            .with_temperature(0.3);

        match self.providers.invoke(request).await {
            Ok(response) => ToolResult::success(response.content)
                .with_metadata(serde_json::json!({"type": "explanation", "level": level})),
            Err(e) => ToolResult::error(format!("Explanation failed: {}", e)),
        }
    }
}
