//! Model-name routing across multiple services.
//!
//! A pipeline that uses a search model for research, a drafting model for
//! long-form output, and a cheap model for classification ends up holding
//! several providers at once. [`RoutingService`] keeps that wiring in one
//! place: it inspects the requested model name and forwards to the first
//! matching service, so callers still program against one
//! [`GenerationService`].

use crate::{GenerationError, GenerationRequest, GenerationResponse, GenerationService};
use async_trait::async_trait;
use std::sync::Arc;

enum MatchRule {
    Prefix(String),
    Contains(String),
}

impl MatchRule {
    fn matches(&self, model: &str) -> bool {
        let model = model.to_lowercase();
        match self {
            MatchRule::Prefix(prefix) => model.starts_with(prefix.as_str()),
            MatchRule::Contains(needle) => model.contains(needle.as_str()),
        }
    }
}

/// Routes requests to the first service whose rule matches the model name.
pub struct RoutingService {
    routes: Vec<(MatchRule, Arc<dyn GenerationService>)>,
    fallback: Arc<dyn GenerationService>,
}

impl RoutingService {
    /// Create a router with a fallback service for unmatched models.
    pub fn new(fallback: Arc<dyn GenerationService>) -> Self {
        Self {
            routes: Vec::new(),
            fallback,
        }
    }

    /// Route models starting with `prefix` (case-insensitive) to `service`.
    pub fn route_prefix(
        mut self,
        prefix: impl Into<String>,
        service: Arc<dyn GenerationService>,
    ) -> Self {
        self.routes
            .push((MatchRule::Prefix(prefix.into().to_lowercase()), service));
        self
    }

    /// Route models containing `needle` (case-insensitive) to `service`.
    pub fn route_contains(
        mut self,
        needle: impl Into<String>,
        service: Arc<dyn GenerationService>,
    ) -> Self {
        self.routes
            .push((MatchRule::Contains(needle.into().to_lowercase()), service));
        self
    }

    fn resolve(&self, model: &str) -> &Arc<dyn GenerationService> {
        self.routes
            .iter()
            .find(|(rule, _)| rule.matches(model))
            .map(|(_, service)| service)
            .unwrap_or(&self.fallback)
    }
}

#[async_trait]
impl GenerationService for RoutingService {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        self.resolve(&request.model).generate(request).await
    }

    fn name(&self) -> &str {
        "router"
    }

    fn is_ready(&self) -> bool {
        self.fallback.is_ready() && self.routes.iter().all(|(_, service)| service.is_ready())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedStub(&'static str);

    #[async_trait]
    impl GenerationService for NamedStub {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationResponse, GenerationError> {
            Ok(GenerationResponse {
                text: self.0.to_string(),
                citations: Vec::new(),
                model: request.model,
                usage: Default::default(),
            })
        }

        fn name(&self) -> &str {
            self.0
        }

        fn is_ready(&self) -> bool {
            true
        }
    }

    fn router() -> RoutingService {
        RoutingService::new(Arc::new(NamedStub("default")))
            .route_prefix("sonar", Arc::new(NamedStub("search")))
            .route_contains("claude", Arc::new(NamedStub("drafting")))
    }

    #[tokio::test]
    async fn test_prefix_route() {
        let response = router()
            .generate(GenerationRequest::new("sonar-pro", "q"))
            .await
            .unwrap();
        assert_eq!(response.text, "search");
    }

    #[tokio::test]
    async fn test_contains_route_case_insensitive() {
        let response = router()
            .generate(GenerationRequest::new("Claude-Sonnet-4", "q"))
            .await
            .unwrap();
        assert_eq!(response.text, "drafting");
    }

    #[tokio::test]
    async fn test_fallback_route() {
        let response = router()
            .generate(GenerationRequest::new("gpt-4o-mini", "q"))
            .await
            .unwrap();
        assert_eq!(response.text, "default");
    }
}
