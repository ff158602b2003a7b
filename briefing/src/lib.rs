//! Signal-to-narrative pipeline for investment education content.
//!
//! This crate turns raw market/news signals into validated, de-duplicated,
//! multi-page educational narratives, and separately gates free user text
//! before it reaches any generation service.
//!
//! - [`pipeline`]: the run orchestrator (collect → extract → select →
//!   research fan-out → assemble → persist)
//! - [`diversity`]: pure selection of maximally-diverse topic candidates
//! - [`narrative`] / [`validator`]: the page contract, structural
//!   validation, and advisory quality scoring
//! - [`guardrail`]: the fail-closed input safety classifier
//! - [`cache`]: the bounded TTL response cache shared by both entry points
//!
//! # Quick Start
//!
//! ```ignore
//! use briefing::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::from_env();
//!     let service: Arc<dyn textgen::GenerationService> =
//!         Arc::new(textgen::AnthropicService::from_env()?);
//!     let cache = Arc::new(ResponseCache::new(config.cache_ttl, config.cache_capacity));
//!     let feed = Arc::new(HttpHeadlineFeed::new(config.signal_feeds.clone()));
//!     let sink = Arc::new(MemorySink::new());
//!
//!     let orchestrator = PipelineOrchestrator::new(service, feed, sink, cache, config);
//!     let summary = orchestrator.run_pipeline(None).await?;
//!     println!("{} narratives, {} errors", summary.success_count(), summary.errors.len());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod diversity;
pub mod engine;
pub mod error;
pub mod extract;
pub mod glossary;
pub mod guardrail;
pub mod narrative;
pub mod persist;
pub mod pipeline;
pub mod signals;
pub mod testing;
pub mod topics;
pub mod validator;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::cache::ResponseCache;
    pub use crate::config::{ModelConfig, PipelineConfig};
    pub use crate::diversity::select_diverse;
    pub use crate::error::{FeedError, PipelineError, SinkError};
    pub use crate::glossary::GlossaryEntry;
    pub use crate::guardrail::{ClassificationDecision, InputCategory, InputGuardrail};
    pub use crate::narrative::{NarrativeDocument, NarrativeSection, PAGE_KEYS, QUIZ_PAGE};
    pub use crate::persist::{MemorySink, NarrativeMetadata, NarrativeSink};
    pub use crate::pipeline::{PipelineOrchestrator, RunStage, RunSummary, TopicReport};
    pub use crate::signals::{HttpHeadlineFeed, SignalFeed, StaticFeed};
    pub use crate::topics::TopicCandidate;
    pub use crate::validator::{score, validate, QualityMetrics, ValidationReport};
}
