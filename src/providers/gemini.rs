//! Gemini provider (image generation)
//!
//! Calls the generateContent API. Image parts come back base64-inline and are
//! surfaced as data-URI artifacts; the orchestrator treats the first artifact
//! as the primary payload for image steps.

use super::{ModelProvider, ModelRequest, ModelResponse, ProviderError, ProviderFamily};
use crate::types::MessageRole;
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAX_RETRIES: u32 = 3;

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ApiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct ApiContent {
    role: String,
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    content: ApiCandidateContent,
}

#[derive(Debug, Deserialize)]
struct ApiCandidateContent {
    #[serde(default)]
    parts: Vec<ApiResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<ApiInlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInlineData {
    mime_type: String,
    data: String,
}

impl GeminiProvider {
    pub fn new(api_key: &str, base_url: Option<&str>) -> Result<Self, String> {
        if api_key.is_empty() {
            return Err("Gemini API key must not be empty".to_string());
        }
        Ok(Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url
                .unwrap_or("https://generativelanguage.googleapis.com/v1beta/models")
                .to_string(),
        })
    }

    /// The API has no separate system channel for these models; instructions
    /// and history are flattened into alternating user/model contents.
    fn build_contents(request: &ModelRequest) -> Vec<ApiContent> {
        let mut contents = Vec::new();

        if let Some(system) = &request.system {
            contents.push(ApiContent {
                role: "user".to_string(),
                parts: vec![ApiPart {
                    text: system.clone(),
                }],
            });
        }

        for msg in &request.messages {
            let role = match msg.role {
                MessageRole::Assistant => "model",
                _ => "user",
            };
            contents.push(ApiContent {
                role: role.to_string(),
                parts: vec![ApiPart {
                    text: msg.content.clone(),
                }],
            });
        }

        contents
    }
}

#[async_trait]
impl ModelProvider for GeminiProvider {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Gemini
    }

    async fn invoke(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url, request.model, self.api_key
        );
        let body = ApiRequest {
            contents: Self::build_contents(&request),
            generation_config: ApiGenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        };

        let mut last_error = ProviderError::new("Gemini request failed");
        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                log::warn!(
                    "[GEMINI] Retrying after error (attempt {}/{}): {}",
                    attempt + 1,
                    MAX_RETRIES,
                    last_error
                );
                tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
            }

            let response = match self
                .client
                .post(&url)
                .header(header::CONTENT_TYPE, "application/json")
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
            last_error = ProviderError::with_status(text, status.as_u16());
            if last_error.is_client_error() && status.as_u16() != 429 {
                return Err(last_error);
            }
        }

        Err(last_error)
    }
}

fn normalize_response(api: ApiResponse) -> ModelResponse {
    let mut content = String::new();
    let mut artifacts = Vec::new();

    for candidate in api.candidates {
        for part in candidate.content.parts {
            if let Some(text) = part.text {
                if !content.is_empty() {
                    content.push('\n');
                }
                content.push_str(&text);
            }
            if let Some(inline) = part.inline_data {
                artifacts.push(format!("data:{};base64,{}", inline.mime_type, inline.data));
            }
        }
    }

    ModelResponse {
        content,
        tool_calls: vec![],
        citations: vec![],
        artifacts,
        stop_reason: Some("end_turn".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    #[test]
    fn test_assistant_turns_map_to_model_role() {
        let request = ModelRequest::new(
            "gemini-2.5-flash-image",
            vec![Message::user("a cat"), Message::assistant("here it is")],
        );
        let contents = GeminiProvider::build_contents(&request);
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[1].role, "model");
    }

    #[test]
    fn test_inline_data_becomes_data_uri_artifact() {
        let api = ApiResponse {
            candidates: vec![ApiCandidate {
                content: ApiCandidateContent {
                    parts: vec![ApiResponsePart {
                        text: None,
                        inline_data: Some(ApiInlineData {
                            mime_type: "image/png".to_string(),
                            data: "AAAA".to_string(),
                        }),
                    }],
                },
            }],
        };
        let normalized = normalize_response(api);
        assert_eq!(normalized.artifacts.len(), 1);
        assert!(normalized.artifacts[0].starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(GeminiProvider::new("", None).is_err());
    }
}
