//! Anthropic messages-API provider

use super::{ModelProvider, ModelRequest, ModelResponse, ProviderError, ProviderFamily, ToolCall};
use crate::types::{Message, MessageRole};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const MAX_RETRIES: u32 = 3;

pub struct AnthropicProvider {
    client: Client,
    auth_headers: header::HeaderMap,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiTool>>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiContent>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl AnthropicProvider {
    pub fn new(api_key: &str, endpoint: Option<&str>) -> Result<Self, String> {
        let mut auth_headers = header::HeaderMap::new();
        auth_headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        let auth_value = header::HeaderValue::from_str(api_key)
            .map_err(|e| format!("Invalid API key format: {}", e))?;
        auth_headers.insert("x-api-key", auth_value);
        auth_headers.insert(
            "anthropic-version",
            header::HeaderValue::from_static("2023-06-01"),
        );

        Ok(Self {
            client: Client::new(),
            auth_headers,
            endpoint: endpoint
                .unwrap_or("https://api.anthropic.com/v1/messages")
                .to_string(),
        })
    }

    /// The messages API takes the system prompt as a top-level field and
    /// requires strict user/assistant alternation; system-role history is
    /// folded into the system prompt and tool-role messages become user turns.
    fn build_messages(request: &ModelRequest) -> (Option<String>, Vec<ApiMessage>) {
        let mut system_parts: Vec<String> = request.system.iter().cloned().collect();
        let mut messages = Vec::new();

        for msg in &request.messages {
            match msg.role {
                MessageRole::System => system_parts.push(msg.content.clone()),
                MessageRole::Tool => messages.push(ApiMessage {
                    role: "user".to_string(),
                    content: format!("[Tool result]\n{}", msg.content),
                }),
                MessageRole::User | MessageRole::Assistant => messages.push(ApiMessage {
                    role: msg.role.as_str().to_string(),
                    content: msg.content.clone(),
                }),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };
        (system, messages)
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Anthropic
    }

    async fn invoke(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        let (system, messages) = Self::build_messages(&request);
        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|t| ApiTool {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        input_schema: serde_json::to_value(&t.input_schema)
                            .unwrap_or_else(|_| serde_json::json!({"type": "object"})),
                    })
                    .collect(),
            )
        };

        let body = ApiRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            system,
            temperature: request.temperature,
            tools,
        };

        let mut last_error = ProviderError::new("Anthropic request failed");
        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let wait = Duration::from_secs(2u64.pow(attempt));
                log::warn!(
                    "[ANTHROPIC] Retrying after error (attempt {}/{}): {}",
                    attempt + 1,
                    MAX_RETRIES,
                    last_error
                );
                tokio::time::sleep(wait).await;
            }

            let response = match self
                .client
                .post(&self.endpoint)
                .headers(self.auth_headers.clone())
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    last_error = ProviderError::new(format!("Request failed: {}", e));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                let parsed: ApiResponse = response
                    .json()
                    .await
                    .map_err(|e| ProviderError::new(format!("Invalid response body: {}", e)))?;
                return Ok(normalize_response(parsed));
            }

            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            last_error = ProviderError::with_status(message, status.as_u16());

            // Client errors other than rate limiting won't get better on retry
            if last_error.is_client_error() && status.as_u16() != 429 {
                return Err(last_error);
            }
        }

        Err(last_error)
    }
}

fn normalize_response(api: ApiResponse) -> ModelResponse {
    let mut content = String::new();
    let mut tool_calls = Vec::new();

    for block in api.content {
        match block.content_type.as_str() {
            "text" => {
                if let Some(text) = block.text {
                    if !content.is_empty() {
                        content.push('\n');
                    }
                    content.push_str(&text);
                }
            }
            "tool_use" => {
                if let (Some(id), Some(name)) = (block.id, block.name) {
                    tool_calls.push(ToolCall {
                        id,
                        name,
                        arguments: block.input.unwrap_or(Value::Null),
                    });
                }
            }
            _ => {}
        }
    }

    ModelResponse {
        content,
        tool_calls,
        citations: vec![],
        artifacts: vec![],
        stop_reason: api.stop_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_history_folds_into_system_prompt() {
        let request = ModelRequest::new(
            "claude-sonnet-4",
            vec![
                Message::system("be concise"),
                Message::user("hi"),
                Message::tool("search result"),
            ],
        )
        .with_system("base prompt");

        let (system, messages) = AnthropicProvider::build_messages(&request);
        let system = system.unwrap();
        assert!(system.contains("base prompt"));
        assert!(system.contains("be concise"));
        // Tool message becomes a user turn
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, "user");
        assert!(messages[1].content.contains("search result"));
    }

    #[test]
    fn test_normalize_tool_use_blocks() {
        let api = ApiResponse {
            content: vec![
                ApiContent {
                    content_type: "text".to_string(),
                    text: Some("Looking that up".to_string()),
                    id: None,
                    name: None,
                    input: None,
                },
                ApiContent {
                    content_type: "tool_use".to_string(),
                    text: None,
                    id: Some("tu_1".to_string()),
                    name: Some("web_search".to_string()),
                    input: Some(serde_json::json!({"query": "rust"})),
                },
            ],
            stop_reason: Some("tool_use".to_string()),
        };

        let normalized = normalize_response(api);
        assert_eq!(normalized.content, "Looking that up");
        assert_eq!(normalized.tool_calls.len(), 1);
        assert_eq!(normalized.tool_calls[0].name, "web_search");
    }
}
