//! Code generation tool.

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

const CODEGEN_SYSTEM_PROMPT: &str = "\
You write production-quality code. Return the code in a fenced block with the \
language tag, followed by a short usage note. No filler prose.";

pub struct GenerateCodeTool {
    providers: Arc<ProviderRegistry>,
    definition: ToolDefinition,
}

impl GenerateCodeTool {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "specification".to_string(),
            PropertySchema::string("What the code must do, including inputs and outputs."),
        );
        properties.insert(
            "language".to_string(),
            PropertySchema::string("Target language. Defaults to whatever fits the request."),
        );

        GenerateCodeTool {
            providers,
            definition: ToolDefinition {
                name: "generate_code".to_string(),
                description: "Generate code from a specification.".to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec!["specification".to_string()],
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateCodeParams {
    specification: String,
    #[serde(default)]
    language: Option<String>,
}

#[async_trait]
impl Tool for GenerateCodeTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> ToolResult {
        let params: GenerateCodeParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };

        let mut prompt = params.specification;
        if let Some(language) = &params.language {
            prompt = format!("Language: {}\n{}", language, prompt);
        }
        let request = ModelRequest::new("claude-sonnet-4", vec![Message::user(prompt)])
            .with_system(CODEGEN_SYSTEM_PROMPT)
            .with_max_tokens(4096)
            .with_temperature(0.2);

        match self.providers.invoke(request).await {
            Ok(response) => ToolResult::success(response.content).with_metadata(
                serde_json::json!({
                    "type": "code",
                    "language": params.language,
                }),
            ),
            Err(e) => ToolResult::error(format!("Code generation failed: {}", e)),
        }
    }
}
