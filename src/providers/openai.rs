//! OpenAI-compatible chat-completions provider
//!
//! Also serves the fast utility model used by the classifier, coordinator,
//! and summarizer.

use super::{ModelProvider, ModelRequest, ModelResponse, ProviderError, ProviderFamily, ToolCall};
use crate::types::MessageRole;
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const MAX_RETRIES: u32 = 3;

pub struct OpenAiProvider {
    client: Client,
    auth_headers: header::HeaderMap,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct ApiToolDecl {
    #[serde(rename = "type")]
    tool_type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiToolDecl>>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    id: String,
    function: ApiToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct ApiToolCallFunction {
    name: String,
    /// JSON-encoded string per the chat-completions wire format
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl OpenAiProvider {
    pub fn new(api_key: &str, endpoint: Option<&str>) -> Result<Self, String> {
        let mut auth_headers = header::HeaderMap::new();
        auth_headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| format!("Invalid API key format: {}", e))?;
        auth_headers.insert(header::AUTHORIZATION, auth_value);

        Ok(Self {
            client: Client::new(),
            auth_headers,
            endpoint: endpoint
                .unwrap_or("https://api.openai.com/v1/chat/completions")
                .to_string(),
        })
    }

    fn build_messages(request: &ModelRequest) -> Vec<ApiMessage> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(ApiMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        for msg in &request.messages {
            // Synthetic tool results are sent as user turns: we don't carry
            // provider-native tool_call_id plumbing across step boundaries.
            let role = match msg.role {
                MessageRole::Tool => "user",
                other => other.as_str(),
            };
            let content = if msg.role == MessageRole::Tool {
                format!("[Tool result]\n{}", msg.content)
            } else {
                msg.content.clone()
            };
            messages.push(ApiMessage {
                role: role.to_string(),
                content,
            });
        }
        messages
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::OpenAi
    }

    async fn invoke(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|t| ApiToolDecl {
                        tool_type: "function".to_string(),
                        function: ApiFunction {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: serde_json::to_value(&t.input_schema)
                                .unwrap_or_else(|_| serde_json::json!({"type": "object"})),
                        },
                    })
                    .collect(),
            )
        };

        let body = ApiRequest {
            model: request.model.clone(),
            messages: Self::build_messages(&request),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools,
        };

        let mut last_error = ProviderError::new("OpenAI request failed");
        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                log::warn!(
                    "[OPENAI] Retrying after error (attempt {}/{}): {}",
                    attempt + 1,
                    MAX_RETRIES,
                    last_error
                );
                tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
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
                return normalize_response(parsed);
            }

            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            last_error = ProviderError::with_status(message, status.as_u16());

            if last_error.is_client_error() && status.as_u16() != 429 {
                return Err(last_error);
            }
        }

        Err(last_error)
    }
}

fn normalize_response(api: ApiResponse) -> Result<ModelResponse, ProviderError> {
    let choice = api
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::new("Response contained no choices"))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            let arguments = serde_json::from_str(&tc.function.arguments)
                .unwrap_or(Value::String(tc.function.arguments));
            ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments,
            }
        })
        .collect();

    Ok(ModelResponse {
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
        citations: vec![],
        artifacts: vec![],
        stop_reason: choice.finish_reason,
    })
}
