//! Generation calls behind the pipeline.
//!
//! The engine owns every prompt the pipeline sends: topic extraction, the
//! two research passes, narrative drafting, and glossary definitions. Each
//! call goes through the injected response cache first, so logically
//! identical requests inside the TTL collapse to one upstream call.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use textgen::{
    Citation, GenerationError, GenerationRequest, GenerationResponse, GenerationService,
};

use crate::cache::{request_key, ResponseCache};
use crate::config::ModelConfig;
use crate::extract;
use crate::topics::{parse_candidates, AvoidLists, TopicCandidate};

/// Signal text cap handed to the extraction prompt.
const MAX_SIGNAL_CHARS: usize = 8_000;

/// Context-research cap inside the draft prompt.
const MAX_CONTEXT_RESEARCH_CHARS: usize = 5_000;

/// Simulation-research cap inside the draft prompt.
const MAX_SIMULATION_RESEARCH_CHARS: usize = 3_000;

/// Extraction candidate count bounds.
const MIN_CANDIDATES: usize = 6;
const MAX_CANDIDATES: usize = 12;

const EXTRACTION_SYSTEM: &str = "\
You surface investment-education topics from raw market news. Respond with \
ONLY a JSON array; each element must carry: category, domain, keyword, \
title, context, mirroringHint (a comparable historical market episode). \
Keep every candidate distinct in theme and domain.";

const RESEARCH_CONTEXT_SYSTEM: &str = "\
You are a market researcher. Cover the current background of the topic, the \
closest historical case, the key differences from that case, and credible \
contrarian readings. Cite your sources.";

const RESEARCH_SIMULATION_SYSTEM: &str = "\
You are a market researcher. Reconstruct how the historical case played out \
in prices: the before/after path, a hypothetical invested amount, and the \
spread of optimistic/neutral/pessimistic outcomes. Cite your sources.";

const DRAFT_SYSTEM: &str = "\
You write multi-page investment-education narratives for beginners. Respond \
with ONLY a JSON object keyed by the pages background, mirroring, \
simulation, result, difference, devils_advocate, action. Each page needs: \
content (a friendly paragraph of at least 150 characters), bullets (two \
short takeaways; three counter-scenarios on devils_advocate), glossary (a \
list of jargon terms used), and chart (plotly-style data/layout). Wrap \
jargon inline as <mark class='term'>term</mark>. The simulation page also \
needs a quiz: context, question, options (three of: id up/down/sideways, \
label, explanation), correct_answer, actual_result, lesson.";

const GLOSSARY_SYSTEM: &str = "\
You define financial jargon for beginners. Respond with ONLY a JSON object \
mapping each given term to a one-or-two sentence plain-language definition.";

/// One research pass: text plus its citations.
#[derive(Debug, Clone, Default)]
pub struct ResearchFinding {
    /// The research text.
    pub text: String,
    /// Sources backing it.
    pub citations: Vec<Citation>,
}

/// The per-topic pair of research passes; owned by the topic task and
/// dropped once the draft is built.
#[derive(Debug, Clone, Default)]
pub struct ResearchBundle {
    /// Background, historical case, differences, contrarian views.
    pub context: ResearchFinding,
    /// Price path and simulated outcomes.
    pub simulation: ResearchFinding,
}

/// Issues the pipeline's generation calls.
pub struct NarrativeEngine {
    service: Arc<dyn GenerationService>,
    cache: Arc<ResponseCache<GenerationResponse>>,
    models: ModelConfig,
}

impl NarrativeEngine {
    /// Create an engine over the given service, cache, and model set.
    pub fn new(
        service: Arc<dyn GenerationService>,
        cache: Arc<ResponseCache<GenerationResponse>>,
        models: ModelConfig,
    ) -> Self {
        Self {
            service,
            cache,
            models,
        }
    }

    /// Cache-aside wrapper around the generation service.
    async fn generate_cached(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let key = request_key(&request);
        if let Some(cached) = self.cache.get(&key) {
            debug!(model = %request.model, "generation cache hit");
            return Ok(cached);
        }
        let response = self.service.generate(request).await?;
        self.cache.set(key, response.clone());
        Ok(response)
    }

    /// Extract topic candidates from signal text.
    pub async fn extract_topics(
        &self,
        signal_text: &str,
        candidate_count: usize,
        avoid: &AvoidLists,
    ) -> Result<Vec<TopicCandidate>, GenerationError> {
        let count = candidate_count.clamp(MIN_CANDIDATES, MAX_CANDIDATES);
        let truncated: String = signal_text.chars().take(MAX_SIGNAL_CHARS).collect();
        let avoid_section = avoid.prompt_section();

        let prompt = format!(
            "Extract the {count} most educational topic candidates from today's signals.\n\
             {avoid_section}\n\n[Signals]\n{truncated}"
        );

        let request = GenerationRequest::new(&self.models.extraction, prompt)
            .with_system(EXTRACTION_SYSTEM)
            .with_temperature(0.4);

        let response = self.generate_cached(request).await?;
        Ok(parse_candidates(&response.text))
    }

    /// Research pass 1: background and historical context.
    pub async fn research_context(
        &self,
        keyword: &str,
        mirroring_hint: &str,
    ) -> Result<ResearchFinding, GenerationError> {
        let hint = non_empty_or(mirroring_hint, "a comparable past market episode");
        let prompt = format!(
            "Topic: {keyword}\nHistorical mirror: {hint}\n\
             Summarize the current backdrop, the mirror case, what differs \
             now, and the strongest contrarian view."
        );
        let request = GenerationRequest::new(&self.models.research, prompt)
            .with_system(RESEARCH_CONTEXT_SYSTEM)
            .with_temperature(0.2);

        let response = self.generate_cached(request).await?;
        Ok(ResearchFinding {
            text: response.text,
            citations: response.citations,
        })
    }

    /// Research pass 2: price path and simulated outcomes.
    pub async fn research_simulation(
        &self,
        keyword: &str,
        mirroring_hint: &str,
    ) -> Result<ResearchFinding, GenerationError> {
        let hint = non_empty_or(mirroring_hint, "a comparable past market episode");
        let prompt = format!(
            "Topic: {keyword}\nHistorical mirror: {hint}\n\
             Reconstruct the price path of the mirror case and the outcome \
             range for a hypothetical investment held through it."
        );
        let request = GenerationRequest::new(&self.models.research, prompt)
            .with_system(RESEARCH_SIMULATION_SYSTEM)
            .with_temperature(0.2);

        let response = self.generate_cached(request).await?;
        Ok(ResearchFinding {
            text: response.text,
            citations: response.citations,
        })
    }

    /// Draft a narrative document from the research bundle.
    ///
    /// The returned value has been through shape repair but not
    /// validation; the caller decides whether it may persist.
    pub async fn draft_narrative(
        &self,
        topic: &TopicCandidate,
        research: &ResearchBundle,
    ) -> Result<crate::narrative::NarrativeDocument, GenerationError> {
        let context: String = research
            .context
            .text
            .chars()
            .take(MAX_CONTEXT_RESEARCH_CHARS)
            .collect();
        let simulation: String = research
            .simulation
            .text
            .chars()
            .take(MAX_SIMULATION_RESEARCH_CHARS)
            .collect();
        let hint = non_empty_or(&topic.mirroring_hint, "a comparable past market episode");

        let prompt = format!(
            "Theme: {}\nHistorical mirror: {}\n\n[Context research]\n{}\n\n\
             [Simulation research]\n{}",
            topic.keyword, hint, context, simulation
        );
        let request = GenerationRequest::new(&self.models.draft, prompt)
            .with_system(DRAFT_SYSTEM)
            .with_temperature(0.7);

        let response = self.generate_cached(request).await?;
        let draft = extract::object_payload(&response.text).ok_or_else(|| {
            GenerationError::Parse(format!(
                "draft for '{}' carried no JSON object",
                topic.keyword
            ))
        })?;

        Ok(crate::narrative::NarrativeDocument::from_draft(
            &draft,
            &topic.keyword,
        ))
    }

    /// Generate plain-language definitions for glossary terms.
    ///
    /// Terms the model skips stay undefined; a fully unparseable payload
    /// yields an empty map. Only transport failures surface as errors.
    pub async fn define_terms(
        &self,
        terms: &[String],
    ) -> Result<HashMap<String, String>, GenerationError> {
        if terms.is_empty() {
            return Ok(HashMap::new());
        }

        let prompt = format!("Terms: {}", terms.join(", "));
        let request = GenerationRequest::new(&self.models.glossary, prompt)
            .with_system(GLOSSARY_SYSTEM)
            .with_temperature(0.3);

        let response = self.generate_cached(request).await?;
        let definitions = extract::object_payload(&response.text)
            .and_then(|payload| match payload {
                Value::Object(map) => Some(
                    map.into_iter()
                        .filter_map(|(term, definition)| {
                            definition
                                .as_str()
                                .map(|text| (term, text.trim().to_string()))
                        })
                        .collect::<HashMap<_, _>>(),
                ),
                _ => None,
            })
            .unwrap_or_default();

        Ok(definitions)
    }
}

fn non_empty_or<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}
