//! Web search tool backed by the Perplexity Sonar models.

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

pub struct WebSearchTool {
    providers: Arc<ProviderRegistry>,
    definition: ToolDefinition,
}

impl WebSearchTool {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "query".to_string(),
            PropertySchema::string("The search query. Be specific and include key terms."),
        );
        properties.insert(
            "depth".to_string(),
            PropertySchema::string_enum(
                "Search depth. 'deep' runs a slower multi-source research pass.",
                &["quick", "deep"],
            ),
        );

        WebSearchTool {
            providers,
            definition: ToolDefinition {
                name: "web_search".to_string(),
                description: "Search the web for current information. Returns findings with source citations.".to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec!["query".to_string()],
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct WebSearchParams {
    query: String,
    #[serde(default)]
    depth: Option<String>,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> ToolResult {
        let params: WebSearchParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };

        let model = match params.depth.as_deref() {
            Some("deep") => "sonar-deep-research",
            _ => "sonar-pro",
        };
        let request = ModelRequest::new(model, vec![Message::user(params.query)])
            .with_max_tokens(1024);

        match self.providers.invoke(request).await {
            Ok(response) => {
                let citations = response.citations.clone();
                ToolResult::success(response.content).with_metadata(serde_json::json!({
                    "type": "search",
                    "citations": citations,
                    "model": model,
                }))
            }
            Err(e) => ToolResult::error(format!("Web search failed: {}", e)),
        }
    }
}
