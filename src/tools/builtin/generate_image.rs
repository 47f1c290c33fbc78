//! Image generation tool.
//!
//! The result content is the image URL (or data URI) itself, and the `image`
//! metadata tag tells the orchestrator to treat it as the primary payload.

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

pub struct GenerateImageTool {
    providers: Arc<ProviderRegistry>,
    definition: ToolDefinition,
}

impl GenerateImageTool {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "prompt".to_string(),
            PropertySchema::string(
                "The image prompt. Describe subject, style, lighting, and composition concretely.",
            ),
        );

        GenerateImageTool {
            providers,
            definition: ToolDefinition {
                name: "generate_image".to_string(),
                description: "Generate an image from a text prompt. Returns the image URL.".to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec!["prompt".to_string()],
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateImageParams {
    prompt: String,
}

#[async_trait]
impl Tool for GenerateImageTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> ToolResult {
        let params: GenerateImageParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };

        let request = ModelRequest::new(
            "gemini-2.5-flash-image",
            vec![Message::user(params.prompt.clone())],
        );

        match self.providers.invoke(request).await {
            Ok(response) => match response.artifacts.first() {
                Some(url) => ToolResult::success(url.clone()).with_metadata(serde_json::json!({
                    "type": "image",
                    "url": url,
                    "prompt": params.prompt,
                })),
                None => ToolResult::error("Image model returned no image artifact"),
            },
            Err(e) => ToolResult::error(format!("Image generation failed: {}", e)),
        }
    }
}
