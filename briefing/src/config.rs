//! Pipeline configuration.
//!
//! Every tunable of the run lives here and is injected, never read from
//! ambient globals: per-stage model names, topic quotas, cache bounds,
//! timeouts, and feed URLs. `from_env` layers environment overrides on top
//! of the defaults so the binary and tests share one construction path.

use std::time::Duration;

/// Model names per pipeline stage.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Topic extraction from raw signal text.
    pub extraction: String,
    /// The two research passes (typically a search model).
    pub research: String,
    /// Narrative drafting.
    pub draft: String,
    /// Glossary definition batch.
    pub glossary: String,
    /// Input safety classification.
    pub classifier: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            extraction: "gpt-4o-mini".to_string(),
            research: "sonar".to_string(),
            draft: "claude-sonnet-4-20250514".to_string(),
            glossary: "gpt-4o-mini".to_string(),
            classifier: "gpt-4o-mini".to_string(),
        }
    }
}

/// Configuration for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Per-stage model names.
    pub models: ModelConfig,
    /// Number of narratives a run aims to produce.
    pub target_topic_count: usize,
    /// Candidates requested from the first extraction call.
    pub candidate_count: usize,
    /// Candidates requested from the avoid-list retry.
    pub retry_candidate_count: usize,
    /// RSS/Atom feed URLs for signal collection.
    pub signal_feeds: Vec<String>,
    /// Response cache time-to-live. Zero disables the cache.
    pub cache_ttl: Duration,
    /// Response cache capacity. Zero disables the cache.
    pub cache_capacity: usize,
    /// Wall-clock ceiling for the whole run.
    pub run_ceiling: Duration,
    /// Per-call timeout handed to the generation client.
    pub call_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            models: ModelConfig::default(),
            target_topic_count: 3,
            candidate_count: 8,
            retry_candidate_count: 10,
            signal_feeds: Vec::new(),
            cache_ttl: Duration::from_secs(900),
            cache_capacity: 512,
            run_ceiling: Duration::from_secs(600),
            call_timeout: Duration::from_secs(120),
        }
    }
}

impl PipelineConfig {
    /// Build a config from `BRIEFING_*` environment variables, falling back
    /// to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let models = ModelConfig {
            extraction: env_string("BRIEFING_EXTRACTION_MODEL", defaults.models.extraction),
            research: env_string("BRIEFING_RESEARCH_MODEL", defaults.models.research),
            draft: env_string("BRIEFING_DRAFT_MODEL", defaults.models.draft),
            glossary: env_string("BRIEFING_GLOSSARY_MODEL", defaults.models.glossary),
            classifier: env_string("BRIEFING_CLASSIFIER_MODEL", defaults.models.classifier),
        };

        Self {
            models,
            target_topic_count: env_parse("BRIEFING_TARGET_TOPICS", defaults.target_topic_count),
            candidate_count: env_parse("BRIEFING_CANDIDATE_COUNT", defaults.candidate_count),
            retry_candidate_count: env_parse(
                "BRIEFING_RETRY_CANDIDATE_COUNT",
                defaults.retry_candidate_count,
            ),
            signal_feeds: env_list("BRIEFING_FEEDS"),
            cache_ttl: Duration::from_secs(env_parse(
                "BRIEFING_CACHE_TTL_SECONDS",
                defaults.cache_ttl.as_secs(),
            )),
            cache_capacity: env_parse("BRIEFING_CACHE_MAX_ENTRIES", defaults.cache_capacity),
            run_ceiling: Duration::from_secs(env_parse(
                "BRIEFING_RUN_CEILING_SECONDS",
                defaults.run_ceiling.as_secs(),
            )),
            call_timeout: Duration::from_secs(env_parse(
                "BRIEFING_CALL_TIMEOUT_SECONDS",
                defaults.call_timeout.as_secs(),
            )),
        }
    }

    /// Set the target topic count.
    pub fn with_target_topic_count(mut self, count: usize) -> Self {
        self.target_topic_count = count;
        self
    }

    /// Set the signal feed URLs.
    pub fn with_signal_feeds(mut self, feeds: Vec<String>) -> Self {
        self.signal_feeds = feeds;
        self
    }

    /// Set the run wall-clock ceiling.
    pub fn with_run_ceiling(mut self, ceiling: Duration) -> Self {
        self.run_ceiling = ceiling;
        self
    }

    /// Set cache TTL and capacity.
    pub fn with_cache_bounds(mut self, ttl: Duration, capacity: usize) -> Self {
        self.cache_ttl = ttl;
        self.cache_capacity = capacity;
        self
    }
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .ok()
        .map(|v| {
            v.split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.target_topic_count, 3);
        assert_eq!(config.cache_ttl, Duration::from_secs(900));
        assert_eq!(config.cache_capacity, 512);
        assert!(config.run_ceiling > config.call_timeout);
    }

    #[test]
    fn test_builder_overrides() {
        let config = PipelineConfig::default()
            .with_target_topic_count(5)
            .with_cache_bounds(Duration::from_secs(60), 16);
        assert_eq!(config.target_topic_count, 5);
        assert_eq!(config.cache_capacity, 16);
    }
}
