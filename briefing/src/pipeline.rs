//! The pipeline orchestrator.
//!
//! A run walks COLLECTING → EXTRACTING → SELECTING → RESEARCHING →
//! ASSEMBLING → DONE. A stage whose precondition fails (no signals, no
//! candidates, nothing selected) ends the run early with a non-fatal entry
//! in the summary's error list. In RESEARCHING every selected topic becomes
//! one independent task (two concurrent research calls, one draft call,
//! local assembly) joined with an all-complete barrier; one topic's
//! failure never touches its siblings. The whole run sits under a single
//! wall-clock ceiling: exceeding it is fatal and nothing partial persists.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use textgen::{Citation, GenerationResponse, GenerationService};

use crate::cache::ResponseCache;
use crate::config::PipelineConfig;
use crate::diversity::select_diverse;
use crate::engine::{NarrativeEngine, ResearchBundle};
use crate::error::PipelineError;
use crate::glossary::{self, GlossaryEntry};
use crate::narrative::NarrativeDocument;
use crate::persist::{NarrativeMetadata, NarrativeSink};
use crate::signals::SignalFeed;
use crate::topics::{AvoidLists, TopicCandidate};
use crate::validator::{self, QualityMetrics};

/// Maximum sources attached to one narrative.
const MAX_SOURCES: usize = 5;

/// Stages of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    /// Gathering raw signals.
    Collecting,
    /// Extracting topic candidates.
    Extracting,
    /// Diversity selection.
    Selecting,
    /// Per-topic research and drafting fan-out.
    Researching,
    /// Glossary, validation, persistence.
    Assembling,
    /// Run finished.
    Done,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::Collecting => "collecting",
            RunStage::Extracting => "extracting",
            RunStage::Selecting => "selecting",
            RunStage::Researching => "researching",
            RunStage::Assembling => "assembling",
            RunStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcome for one persisted narrative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicReport {
    /// Topic keyword.
    pub keyword: String,
    /// Display title.
    pub title: String,
    /// Identifier assigned by the sink.
    pub document_id: String,
    /// Advisory quality metrics.
    pub metrics: QualityMetrics,
    /// Research sources.
    pub sources: Vec<Citation>,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run date.
    pub date: NaiveDate,
    /// Per-topic outcomes for persisted narratives.
    pub topics: Vec<TopicReport>,
    /// Merged glossary across all narratives.
    pub glossary: Vec<GlossaryEntry>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
    /// Every non-fatal error the run absorbed.
    pub errors: Vec<String>,
}

impl RunSummary {
    /// Number of successfully persisted narratives.
    pub fn success_count(&self) -> usize {
        self.topics.len()
    }
}

struct AssembledTopic {
    topic: TopicCandidate,
    document: NarrativeDocument,
    sources: Vec<Citation>,
}

/// Coordinates one run end to end.
pub struct PipelineOrchestrator {
    engine: NarrativeEngine,
    feed: Arc<dyn SignalFeed>,
    sink: Arc<dyn NarrativeSink>,
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    /// Wire an orchestrator from its collaborators. The cache is injected
    /// here and shared with nothing else in the process.
    pub fn new(
        service: Arc<dyn GenerationService>,
        feed: Arc<dyn SignalFeed>,
        sink: Arc<dyn NarrativeSink>,
        cache: Arc<ResponseCache<GenerationResponse>>,
        config: PipelineConfig,
    ) -> Self {
        let engine = NarrativeEngine::new(service, cache, config.models.clone());
        Self {
            engine,
            feed,
            sink,
            config,
        }
    }

    /// Run the pipeline for `target_date` (today when `None`).
    ///
    /// Whether an already-persisted date may run again is the caller's
    /// policy; nothing here enforces it.
    pub async fn run_pipeline(
        &self,
        target_date: Option<NaiveDate>,
    ) -> Result<RunSummary, PipelineError> {
        let ceiling = self.config.run_ceiling;
        match tokio::time::timeout(ceiling, self.run_inner(target_date)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(?ceiling, "run exceeded its wall-clock ceiling");
                Err(PipelineError::DeadlineExceeded { ceiling })
            }
        }
    }

    async fn run_inner(
        &self,
        target_date: Option<NaiveDate>,
    ) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        let date = target_date.unwrap_or_else(|| Utc::now().date_naive());
        let mut errors: Vec<String> = Vec::new();

        info!(stage = %RunStage::Collecting, %date, "pipeline run started");
        let signals = match self.feed.fetch_signals().await {
            Ok(text) => text,
            Err(error) => {
                errors.push(format!("signal collection failed: {}", error));
                return Ok(finish(date, started, Vec::new(), Vec::new(), errors));
            }
        };
        if signals.trim().is_empty() {
            errors.push("no signals collected".to_string());
            return Ok(finish(date, started, Vec::new(), Vec::new(), errors));
        }

        info!(stage = %RunStage::Extracting, chars = signals.len(), "extracting topic candidates");
        let candidates = match self
            .engine
            .extract_topics(&signals, self.config.candidate_count, &AvoidLists::default())
            .await
        {
            Ok(candidates) => candidates,
            Err(error) => {
                errors.push(format!("topic extraction failed: {}", error));
                return Ok(finish(date, started, Vec::new(), Vec::new(), errors));
            }
        };
        if candidates.is_empty() {
            errors.push("no topic candidates extracted".to_string());
            return Ok(finish(date, started, Vec::new(), Vec::new(), errors));
        }

        info!(stage = %RunStage::Selecting, candidates = candidates.len(), "applying diversity gate");
        let target = self.config.target_topic_count;
        let mut selected = select_diverse(candidates.clone(), target);
        if selected.len() < target {
            info!(
                selected = selected.len(),
                target, "quota unmet, re-extracting with avoid-lists"
            );
            let avoid = AvoidLists::from_candidates(&candidates);
            match self
                .engine
                .extract_topics(&signals, self.config.retry_candidate_count, &avoid)
                .await
            {
                Ok(retry) => {
                    let mut pool = candidates;
                    pool.extend(retry);
                    selected = select_diverse(pool, target);
                }
                Err(error) => {
                    errors.push(format!("re-extraction failed: {}", error));
                }
            }
        }
        if selected.is_empty() {
            errors.push("no topics passed the diversity gate".to_string());
            return Ok(finish(date, started, Vec::new(), Vec::new(), errors));
        }

        let total = selected.len();
        info!(stage = %RunStage::Researching, topics = total, "fanning out topic tasks");
        let outcomes = join_all(
            selected
                .into_iter()
                .enumerate()
                .map(|(idx, topic)| self.build_topic(topic, idx + 1, total)),
        )
        .await;

        let mut assembled = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(topic) => assembled.push(topic),
                Err(message) => {
                    warn!(error = %message, "topic task failed");
                    errors.push(message);
                }
            }
        }
        if assembled.is_empty() {
            return Err(PipelineError::AllTopicsFailed { count: total });
        }

        info!(stage = %RunStage::Assembling, assembled = assembled.len(), "building glossary and persisting");
        let documents: Vec<NarrativeDocument> =
            assembled.iter().map(|topic| topic.document.clone()).collect();
        let terms = glossary::extract_terms(&documents);

        let definitions = match self.engine.define_terms(&terms).await {
            Ok(definitions) => definitions,
            Err(error) => {
                errors.push(format!("glossary definitions failed: {}", error));
                HashMap::new()
            }
        };
        let glossary_entries = merge_glossary(&terms, &definitions);
        let allowed: HashSet<String> = glossary_entries
            .iter()
            .map(|entry| entry.term.clone())
            .collect();

        let mut topics = Vec::new();
        for (sort_order, mut item) in assembled.into_iter().enumerate() {
            glossary::sanitize_document(&mut item.document, &allowed);

            let report = validator::validate(&item.document);
            if !report.is_valid {
                errors.push(format!(
                    "narrative for '{}' rejected: {}",
                    item.topic.keyword,
                    report.issues.join("; ")
                ));
                continue;
            }

            let metrics = validator::score(&item.document);
            let metadata = NarrativeMetadata {
                date,
                keyword: item.topic.keyword.clone(),
                title: item.topic.title.clone(),
                sources: item.sources.clone(),
                sort_order,
            };

            match self.sink.store(&item.document, &metadata).await {
                Ok(document_id) => topics.push(TopicReport {
                    keyword: item.topic.keyword,
                    title: item.topic.title,
                    document_id,
                    metrics,
                    sources: item.sources,
                }),
                Err(error) => {
                    errors.push(format!(
                        "persisting '{}' failed: {}",
                        item.topic.keyword, error
                    ));
                }
            }
        }

        let summary = finish(date, started, topics, glossary_entries, errors);
        info!(
            stage = %RunStage::Done,
            successes = summary.success_count(),
            errors = summary.errors.len(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "pipeline run finished"
        );
        Ok(summary)
    }

    /// One topic task: two concurrent research calls, one draft, local
    /// assembly. Errors come back as strings for the run's error list and
    /// never cross into sibling tasks.
    async fn build_topic(
        &self,
        topic: TopicCandidate,
        idx: usize,
        total: usize,
    ) -> Result<AssembledTopic, String> {
        let task_started = Instant::now();
        info!(topic = %topic.keyword, idx, total, "topic task started");

        let (context, simulation) = tokio::join!(
            self.engine
                .research_context(&topic.keyword, &topic.mirroring_hint),
            self.engine
                .research_simulation(&topic.keyword, &topic.mirroring_hint),
        );
        let context = context
            .map_err(|e| format!("topic '{}': context research failed: {}", topic.keyword, e))?;
        let simulation = simulation.map_err(|e| {
            format!(
                "topic '{}': simulation research failed: {}",
                topic.keyword, e
            )
        })?;
        let research = ResearchBundle {
            context,
            simulation,
        };

        let document = self
            .engine
            .draft_narrative(&topic, &research)
            .await
            .map_err(|e| format!("topic '{}': draft failed: {}", topic.keyword, e))?;

        let sources = merge_sources(&research.context.citations, &research.simulation.citations);

        info!(
            topic = %topic.keyword,
            idx,
            total,
            elapsed_ms = task_started.elapsed().as_millis() as u64,
            "topic task finished"
        );
        Ok(AssembledTopic {
            topic,
            document,
            sources,
        })
    }
}

fn finish(
    date: NaiveDate,
    started: Instant,
    topics: Vec<TopicReport>,
    glossary: Vec<GlossaryEntry>,
    errors: Vec<String>,
) -> RunSummary {
    RunSummary {
        date,
        topics,
        glossary,
        elapsed: started.elapsed(),
        errors,
    }
}

/// Merge citations from both research passes, de-duplicated by URL and
/// capped, with a placeholder when nothing was cited.
fn merge_sources(context: &[Citation], simulation: &[Citation]) -> Vec<Citation> {
    let mut sources = Vec::new();
    let mut seen = HashSet::new();

    for citation in context.iter().chain(simulation) {
        if citation.url.is_empty() || !seen.insert(citation.url.clone()) {
            continue;
        }
        sources.push(citation.clone());
        if sources.len() >= MAX_SOURCES {
            break;
        }
    }

    if sources.is_empty() {
        sources.push(Citation {
            name: "Signal Feed".to_string(),
            url: "#".to_string(),
        });
    }
    sources
}

/// Pair extracted terms with their definitions, in first-seen term order.
///
/// When the definition map is empty (degraded generation), every term is
/// kept definition-less so inline marks survive sanitization.
fn merge_glossary(
    terms: &[String],
    definitions: &HashMap<String, String>,
) -> Vec<GlossaryEntry> {
    if definitions.is_empty() {
        return terms
            .iter()
            .map(|term| GlossaryEntry {
                term: term.clone(),
                definition: String::new(),
            })
            .collect();
    }

    terms
        .iter()
        .filter(|term| definitions.contains_key(*term))
        .map(|term| GlossaryEntry {
            term: term.clone(),
            definition: definitions[term].clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation(url: &str) -> Citation {
        Citation::from_url(url)
    }

    #[test]
    fn test_merge_sources_dedupes_and_caps() {
        let context = vec![
            citation("https://a.com/1"),
            citation("https://b.com/2"),
            citation("https://a.com/1"),
        ];
        let simulation = vec![
            citation("https://c.com/3"),
            citation("https://d.com/4"),
            citation("https://e.com/5"),
            citation("https://f.com/6"),
        ];
        let sources = merge_sources(&context, &simulation);
        assert_eq!(sources.len(), MAX_SOURCES);
        assert_eq!(sources[0].url, "https://a.com/1");
    }

    #[test]
    fn test_merge_sources_placeholder_when_empty() {
        let sources = merge_sources(&[], &[]);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "Signal Feed");
    }

    #[test]
    fn test_merge_glossary_keeps_term_order() {
        let terms = vec!["beta".to_string(), "duration".to_string()];
        let definitions: HashMap<String, String> = [
            ("duration".to_string(), "Rate sensitivity.".to_string()),
            ("beta".to_string(), "Market sensitivity.".to_string()),
        ]
        .into_iter()
        .collect();

        let entries = merge_glossary(&terms, &definitions);
        assert_eq!(entries[0].term, "beta");
        assert_eq!(entries[1].term, "duration");
    }

    #[test]
    fn test_merge_glossary_degrades_to_definition_less() {
        let terms = vec!["beta".to_string()];
        let entries = merge_glossary(&terms, &HashMap::new());
        assert_eq!(entries.len(), 1);
        assert!(entries[0].definition.is_empty());
    }

    #[test]
    fn test_merge_glossary_drops_undefined_terms_when_map_nonempty() {
        let terms = vec!["beta".to_string(), "convexity".to_string()];
        let definitions: HashMap<String, String> =
            [("beta".to_string(), "Market sensitivity.".to_string())]
                .into_iter()
                .collect();
        let entries = merge_glossary(&terms, &definitions);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].term, "beta");
    }

    #[test]
    fn test_run_stage_display() {
        assert_eq!(RunStage::Researching.to_string(), "researching");
        assert_eq!(RunStage::Done.to_string(), "done");
    }
}
