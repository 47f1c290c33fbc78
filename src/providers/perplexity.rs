//! Perplexity Sonar provider (web search with citations)
//!
//! Wire format is chat-completions shaped, with one quirk: Sonar rejects
//! system turns mid-conversation, so all instructions are embedded in the
//! first user turn.

use super::{ModelProvider, ModelRequest, ModelResponse, ProviderError, ProviderFamily};
use crate::types::MessageRole;
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAX_RETRIES: u32 = 3;

pub struct PerplexityProvider {
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
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    citations: Vec<String>,
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
}

impl PerplexityProvider {
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
                .unwrap_or("https://api.perplexity.ai/chat/completions")
                .to_string(),
        })
    }

    /// Sonar requires user/assistant alternation ending on a user turn, and
    /// instructions must ride inside the first user message.
    fn build_messages(request: &ModelRequest) -> Vec<ApiMessage> {
        let mut instructions: Vec<String> = request.system.iter().cloned().collect();
        let mut turns: Vec<ApiMessage> = Vec::new();

        for msg in &request.messages {
            match msg.role {
                MessageRole::System => instructions.push(msg.content.clone()),
                MessageRole::Assistant => turns.push(ApiMessage {
                    role: "assistant".to_string(),
                    content: msg.content.clone(),
                }),
                MessageRole::User | MessageRole::Tool => {
                    let content = if msg.role == MessageRole::Tool {
                        format!("[Tool result]\n{}", msg.content)
                    } else {
                        msg.content.clone()
                    };
                    // Merge consecutive user turns to keep alternation valid
                    if let Some(last) = turns.last_mut() {
                        if last.role == "user" {
                            last.content.push_str("\n\n");
                            last.content.push_str(&content);
                            continue;
                        }
                    }
                    turns.push(ApiMessage {
                        role: "user".to_string(),
                        content,
                    });
                }
            }
        }

        if !instructions.is_empty() {
            let prefix = format!("{}\n\n", instructions.join("\n\n"));
            if let Some(first_user) = turns.iter_mut().find(|m| m.role == "user") {
                first_user.content = format!("{}{}", prefix, first_user.content);
            } else {
                turns.insert(
                    0,
                    ApiMessage {
                        role: "user".to_string(),
                        content: prefix.trim_end().to_string(),
                    },
                );
            }
        }

        turns
    }
}

#[async_trait]
impl ModelProvider for PerplexityProvider {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Perplexity
    }

    async fn invoke(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        let body = ApiRequest {
            model: request.model.clone(),
            messages: Self::build_messages(&request),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let mut last_error = ProviderError::new("Perplexity request failed");
        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                log::warn!(
                    "[SONAR] Retrying after error (attempt {}/{}): {}",
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

                let content = parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .ok_or_else(|| ProviderError::new("Response contained no choices"))?;

                return Ok(ModelResponse {
                    content,
                    tool_calls: vec![],
                    citations: parsed.citations,
                    artifacts: vec![],
                    stop_reason: Some("end_turn".to_string()),
                });
            }

            let text = response.text().await.unwrap_or_default();
            last_error = ProviderError::with_status(text, status.as_u16());
            if last_error.is_client_error() && status.as_u16() != 429 {
                return Err(last_error);
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    #[test]
    fn test_instructions_embedded_in_first_user_turn() {
        let request = ModelRequest::new(
            "sonar-pro",
            vec![Message::user("latest GPU benchmarks")],
        )
        .with_system("cite your sources");

        let messages = PerplexityProvider::build_messages(&request);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
        assert!(messages[0].content.starts_with("cite your sources"));
        assert!(messages[0].content.contains("latest GPU benchmarks"));
    }

    #[test]
    fn test_consecutive_user_turns_merged() {
        let request = ModelRequest::new(
            "sonar-pro",
            vec![
                Message::user("first"),
                Message::tool("tool output"),
                Message::user("second"),
            ],
        );
        let messages = PerplexityProvider::build_messages(&request);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.contains("first"));
        assert!(messages[0].content.contains("tool output"));
        assert!(messages[0].content.contains("second"));
    }
}
