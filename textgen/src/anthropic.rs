//! Anthropic Messages API provider.

use crate::{
    GenerationError, GenerationRequest, GenerationResponse, GenerationService, TokenUsage,
    DEFAULT_CALL_TIMEOUT,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default API base URL.
const API_BASE: &str = "https://api.anthropic.com/v1";

/// API version header value.
const API_VERSION: &str = "2023-06-01";

/// Anthropic Messages API service.
pub struct AnthropicService {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl AnthropicService {
    /// Create a new service with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: API_BASE.to_string(),
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Create from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env() -> Result<Self, GenerationError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| GenerationError::Configuration("ANTHROPIC_API_KEY not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    /// Override the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_headers(&self) -> Result<HeaderMap, GenerationError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| GenerationError::Configuration(format!("Invalid API key: {}", e)))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    fn map_send_error(&self, error: reqwest::Error) -> GenerationError {
        if error.is_timeout() {
            GenerationError::Timeout {
                duration: self.timeout,
            }
        } else {
            GenerationError::Network(error.to_string())
        }
    }
}

#[async_trait]
impl GenerationService for AnthropicService {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let headers = self.build_headers()?;
        let api_request = ApiRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            system: request.system.clone(),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .headers(headers)
            .timeout(self.timeout)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;

        let text = api_response
            .content
            .iter()
            .filter_map(|block| match block {
                ApiContent::Text { text } => Some(text.as_str()),
                ApiContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(GenerationResponse {
            text,
            citations: Vec::new(),
            model: api_response.model,
            usage: TokenUsage {
                input_tokens: api_response.usage.input_tokens,
                output_tokens: api_response.usage.output_tokens,
            },
        })
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    fn is_ready(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// API request/response types

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    content: Vec<ApiContent>,
    #[serde(default)]
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContent {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: usize,
    #[serde(default)]
    output_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_creation() {
        let service = AnthropicService::new("test-key");
        assert_eq!(service.name(), "anthropic");
        assert!(service.is_ready());
    }

    #[test]
    fn test_empty_key_not_ready() {
        let service = AnthropicService::new("");
        assert!(!service.is_ready());
    }

    #[test]
    fn test_response_text_concatenation() {
        let raw = r#"{
            "model": "claude-sonnet-4-20250514",
            "content": [
                {"type": "text", "text": "first"},
                {"type": "text", "text": "second"}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.content.len(), 2);
        assert_eq!(parsed.usage.input_tokens, 10);
    }
}
