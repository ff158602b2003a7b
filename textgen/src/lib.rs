//! # textgen
//!
//! A minimal multi-provider text generation client.
//!
//! The crate exposes one seam, [`GenerationService`], behind which concrete
//! vendors live. Callers build a [`GenerationRequest`], await a
//! [`GenerationResponse`], and treat every failure mode as a value: transport
//! problems, upstream API rejections, and malformed payloads are distinct
//! [`GenerationError`] variants rather than panics, because at this boundary
//! failure is the expected common case.
//!
//! ## Example
//!
//! ```rust,ignore
//! use textgen::{AnthropicService, GenerationRequest, GenerationService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = AnthropicService::from_env()?;
//!     let request = GenerationRequest::new("claude-sonnet-4-20250514", "Say hello")
//!         .with_max_tokens(100);
//!     let response = service.generate(request).await?;
//!     println!("{}", response.text);
//!     Ok(())
//! }
//! ```

pub mod anthropic;
pub mod openai;
pub mod router;

pub use anthropic::AnthropicService;
pub use openai::OpenAiCompatService;
pub use router::RoutingService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-call timeout applied by the bundled providers.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Core trait for text generation services.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Send a generation request and await the full response.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError>;

    /// Get the provider name.
    fn name(&self) -> &str;

    /// Check if the provider is configured and ready.
    fn is_ready(&self) -> bool;
}

/// A single-turn generation request.
///
/// The request is deliberately flat: one optional system instruction and one
/// user prompt. Serialization order is stable, which callers rely on when
/// deriving cache keys from the canonical JSON form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model identifier, interpreted by the provider.
    pub model: String,
    /// Optional system instruction.
    pub system: Option<String>,
    /// The user prompt.
    pub prompt: String,
    /// Maximum tokens to generate.
    pub max_tokens: usize,
    /// Sampling temperature (0.0 - 1.0).
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    /// Create a new request for the given model and prompt.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            prompt: prompt.into(),
            max_tokens: 4096,
            temperature: None,
        }
    }

    /// Set the system instruction.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the maximum number of tokens to generate.
    pub fn with_max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = max;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp.clamp(0.0, 1.0));
        self
    }

    /// A canonical form with trimmed text, for request de-duplication.
    pub fn canonical(&self) -> Self {
        Self {
            model: self.model.trim().to_string(),
            system: self.system.as_ref().map(|s| s.trim().to_string()),
            prompt: self.prompt.trim().to_string(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// Response from a generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// The generated text.
    pub text: String,
    /// Source citations, when the provider surfaces them (search models do).
    #[serde(default)]
    pub citations: Vec<Citation>,
    /// Model that produced the response.
    pub model: String,
    /// Token usage statistics.
    #[serde(default)]
    pub usage: TokenUsage,
}

/// A cited source attached to a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Human-readable source name.
    pub name: String,
    /// Source URL.
    pub url: String,
}

impl Citation {
    /// Build a citation from a bare URL, deriving the name from the host.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let host = url
            .split("//")
            .last()
            .unwrap_or(&url)
            .split('/')
            .next()
            .unwrap_or(&url)
            .trim_start_matches("www.")
            .to_string();
        Self { name: host, url }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens.
    pub input_tokens: usize,
    /// Output tokens.
    pub output_tokens: usize,
}

impl TokenUsage {
    /// Total tokens used.
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}

/// Errors from generation services.
///
/// `Parse` marks a payload that arrived but could not be understood;
/// everything else is a transport-level failure. Callers that need the
/// tagged `payload | parse | transport` trichotomy match on these variants.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Upstream API rejected the request.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error body from the provider.
        message: String,
    },

    /// Network/connection error.
    #[error("Network error: {0}")]
    Network(String),

    /// Response arrived but could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Provider misconfiguration (missing key, bad header value).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The call exceeded its per-call timeout.
    #[error("Request timed out after {duration:?}")]
    Timeout {
        /// The timeout that elapsed.
        duration: Duration,
    },
}

impl GenerationError {
    /// Whether this error is a transport-level failure (vs. a parse failure).
    pub fn is_transport(&self) -> bool {
        !matches!(self, GenerationError::Parse(_))
    }
}
