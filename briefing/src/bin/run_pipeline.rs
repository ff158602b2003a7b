//! One-shot pipeline run from the command line.
//!
//! Reads provider keys and `BRIEFING_*` settings from the environment
//! (a `.env` file is honored), runs a single pipeline pass, and prints
//! the run summary.

use std::sync::Arc;

use briefing::prelude::*;
use textgen::{AnthropicService, GenerationService, OpenAiCompatService, RoutingService};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = PipelineConfig::from_env();
    let service = build_service(&config)?;
    let cache = Arc::new(ResponseCache::new(config.cache_ttl, config.cache_capacity));
    let feed = Arc::new(HttpHeadlineFeed::new(config.signal_feeds.clone()));
    let sink = Arc::new(MemorySink::new());

    let orchestrator =
        PipelineOrchestrator::new(service, feed, sink.clone(), cache, config);
    let summary = orchestrator.run_pipeline(None).await?;

    println!(
        "run {}: {} narratives persisted, {} glossary terms, {} errors, {:.1}s",
        summary.date,
        summary.success_count(),
        summary.glossary.len(),
        summary.errors.len(),
        summary.elapsed.as_secs_f64()
    );
    for report in &summary.topics {
        println!("  [{}] {} ({})", report.document_id, report.title, report.keyword);
    }
    for error in &summary.errors {
        eprintln!("  error: {}", error);
    }

    Ok(())
}

/// Build the provider stack: search models go to Perplexity, drafting
/// models to Anthropic, everything else to OpenAI.
fn build_service(
    config: &PipelineConfig,
) -> Result<Arc<dyn GenerationService>, Box<dyn std::error::Error>> {
    let openai = Arc::new(
        OpenAiCompatService::from_env()?.with_timeout(config.call_timeout),
    );
    let mut router = RoutingService::new(openai);

    if let Ok(key) = std::env::var("PERPLEXITY_API_KEY") {
        router = router.route_prefix(
            "sonar",
            Arc::new(OpenAiCompatService::perplexity(key).with_timeout(config.call_timeout)),
        );
    }
    if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
        router = router.route_contains(
            "claude",
            Arc::new(AnthropicService::new(key).with_timeout(config.call_timeout)),
        );
    }

    Ok(Arc::new(router))
}
