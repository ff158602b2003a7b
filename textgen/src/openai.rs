//! OpenAI-compatible chat completions provider.
//!
//! Covers the OpenAI API itself plus Perplexity-style search endpoints that
//! speak the same wire format and attach source citations to the response.

use crate::{
    Citation, GenerationError, GenerationRequest, GenerationResponse, GenerationService,
    TokenUsage, DEFAULT_CALL_TIMEOUT,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI API base URL.
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Perplexity API base URL.
const PERPLEXITY_API_BASE: &str = "https://api.perplexity.ai";

/// Maximum citations surfaced per response.
const MAX_CITATIONS: usize = 5;

/// Chat-completions service for OpenAI-compatible endpoints.
pub struct OpenAiCompatService {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    provider_name: String,
    timeout: Duration,
}

impl OpenAiCompatService {
    /// Create a new service pointed at the OpenAI API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: OPENAI_API_BASE.to_string(),
            provider_name: "openai".to_string(),
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Create a new service pointed at the Perplexity API.
    pub fn perplexity(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: PERPLEXITY_API_BASE.to_string(),
            provider_name: "perplexity".to_string(),
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Create from the OPENAI_API_KEY environment variable.
    pub fn from_env() -> Result<Self, GenerationError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| GenerationError::Configuration("OPENAI_API_KEY not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    /// Override the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the provider name reported by [`GenerationService::name`].
    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = name.into();
        self
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
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
impl GenerationService for OpenAiCompatService {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(ApiMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(ApiMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        let api_request = ApiRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
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
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or_else(|| GenerationError::Parse("response carried no choices".to_string()))?;

        let citations = collect_citations(&api_response.citations, &text);

        Ok(GenerationResponse {
            text,
            citations,
            model: api_response.model.unwrap_or(request.model),
            usage: TokenUsage {
                input_tokens: api_response.usage.prompt_tokens,
                output_tokens: api_response.usage.completion_tokens,
            },
        })
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn is_ready(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Merge structured citations with inline `[n](url)` links from the content,
/// de-duplicated by URL and capped at [`MAX_CITATIONS`].
fn collect_citations(structured: &[String], content: &str) -> Vec<Citation> {
    let mut citations = Vec::new();
    let mut seen = Vec::new();

    for url in structured {
        let url = url.trim();
        if !url.is_empty() && !seen.contains(&url.to_string()) {
            seen.push(url.to_string());
            citations.push(Citation::from_url(url));
        }
    }

    for url in inline_link_urls(content) {
        if !seen.contains(&url) {
            seen.push(url.clone());
            citations.push(Citation::from_url(url));
        }
    }

    citations.truncate(MAX_CITATIONS);
    citations
}

/// Scan content for the `[1](https://…)` numbered-link style search models
/// emit, returning the URLs in order of appearance.
fn inline_link_urls(content: &str) -> Vec<String> {
    let mut urls = Vec::new();
    let mut rest = content;

    while let Some(pos) = rest.find("](") {
        let (left, right) = rest.split_at(pos);
        let right = &right[2..];

        let numbered = left
            .rfind('[')
            .map(|open| {
                let label = &left[open + 1..];
                !label.is_empty() && label.chars().all(|c| c.is_ascii_digit())
            })
            .unwrap_or(false);

        if numbered && right.starts_with("http") {
            if let Some(end) = right.find(')') {
                let url = &right[..end];
                if !url.chars().any(char::is_whitespace) {
                    urls.push(url.to_string());
                }
            }
        }

        rest = right;
    }

    urls
}

// API request/response types

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: usize,
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
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    citations: Vec<String>,
    #[serde(default)]
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_names() {
        assert_eq!(OpenAiCompatService::new("k").name(), "openai");
        assert_eq!(OpenAiCompatService::perplexity("k").name(), "perplexity");
    }

    #[test]
    fn test_inline_link_urls() {
        let content = "Rates rose sharply [1](https://example.com/a) while \
                       equities held [2](https://news.test/b). See [ref](https://skip.me).";
        let urls = inline_link_urls(content);
        assert_eq!(
            urls,
            vec![
                "https://example.com/a".to_string(),
                "https://news.test/b".to_string()
            ]
        );
    }

    #[test]
    fn test_collect_citations_dedupes_and_caps() {
        let structured: Vec<String> = (0..7)
            .map(|i| format!("https://source{}.com/item", i))
            .collect();
        let content = "Inline dupe [1](https://source0.com/item)";
        let citations = collect_citations(&structured, content);
        assert_eq!(citations.len(), MAX_CITATIONS);
        assert_eq!(citations[0].name, "source0.com");
    }

    #[test]
    fn test_citations_from_content_only() {
        let citations = collect_citations(&[], "Data here [1](https://fred.stlouisfed.org/series)");
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].name, "fred.stlouisfed.org");
    }
}
