//! Data analysis tool.

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

const ANALYSIS_SYSTEM_PROMPT: &str = "\
You analyze data precisely. State the key findings first, then the supporting \
numbers. Call out anomalies and limitations of the data explicitly.";

pub struct AnalyzeDataTool {
    providers: Arc<ProviderRegistry>,
    definition: ToolDefinition,
}

impl AnalyzeDataTool {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "data".to_string(),
            PropertySchema::string("The data to analyze (CSV, JSON, or prose description)."),
        );
        properties.insert(
            "question".to_string(),
            PropertySchema::string("The question the analysis should answer."),
        );

        AnalyzeDataTool {
            providers,
            definition: ToolDefinition {
                name: "analyze_data".to_string(),
                description: "Analyze structured or unstructured data and report findings.".to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec!["data".to_string()],
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzeDataParams {
    data: String,
    #[serde(default)]
    question: Option<String>,
}

#[async_trait]
impl Tool for AnalyzeDataTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> ToolResult {
        let params: AnalyzeDataParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };

        let prompt = match &params.question {
            Some(question) => format!("Question: {}\n\nData:\n{}", question, params.data),
            None => format!("Analyze this data:\n{}", params.data),
        };
        let request = ModelRequest::new("gpt-4o", vec![Message::user(prompt)])
            .with_system(ANALYSIS_SYSTEM_PROMPT)
            .with_max_tokens(2048)
            .with_temperature(0.1);

        match self.providers.invoke(request).await {
            Ok(response) => ToolResult::success(response.content)
                .with_metadata(serde_json::json!({"type": "analysis"})),
            Err(e) => ToolResult::error(format!("Data analysis failed: {}", e)),
        }
    }
}
