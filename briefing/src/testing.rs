//! Testing utilities for the briefing pipeline.
//!
//! Provides a [`ScriptedService`] for deterministic tests without network
//! access, plus canned payload builders for extraction and drafting
//! responses. Scripted replies can be routed by prompt substring so a
//! fanned-out run stays deterministic regardless of completion order.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use textgen::{
    Citation, GenerationError, GenerationRequest, GenerationResponse, GenerationService,
    TokenUsage,
};

type ScriptedReply = Result<GenerationResponse, GenerationError>;

struct Route {
    pattern: String,
    replies: VecDeque<ScriptedReply>,
}

/// A generation service that returns scripted replies.
///
/// Replies queued with [`push_text`](Self::push_text) (and friends) are
/// served in order; replies registered with [`route`](Self::route) are
/// matched first, against any request whose prompt or system text contains
/// the route's pattern. When everything is exhausted a placeholder response
/// is returned, mirroring how a real service never goes silent.
#[derive(Default)]
pub struct ScriptedService {
    routes: Mutex<Vec<Route>>,
    queue: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedService {
    /// Create an empty scripted service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain text reply.
    pub fn push_text(&self, text: impl Into<String>) {
        self.queue
            .lock()
            .expect("scripted queue lock")
            .push_back(Ok(response(text.into(), Vec::new())));
    }

    /// Queue a text reply carrying citations.
    pub fn push_cited(&self, text: impl Into<String>, citations: Vec<Citation>) {
        self.queue
            .lock()
            .expect("scripted queue lock")
            .push_back(Ok(response(text.into(), citations)));
    }

    /// Queue an error reply.
    pub fn push_error(&self, error: GenerationError) {
        self.queue
            .lock()
            .expect("scripted queue lock")
            .push_back(Err(error));
    }

    /// Register a routed text reply for requests containing `pattern`.
    pub fn route(&self, pattern: impl Into<String>, text: impl Into<String>) {
        self.route_reply(pattern, Ok(response(text.into(), Vec::new())));
    }

    /// Register a routed error reply for requests containing `pattern`.
    pub fn route_error(&self, pattern: impl Into<String>, error: GenerationError) {
        self.route_reply(pattern, Err(error));
    }

    fn route_reply(&self, pattern: impl Into<String>, reply: ScriptedReply) {
        let pattern = pattern.into();
        let mut routes = self.routes.lock().expect("scripted routes lock");
        if let Some(route) = routes.iter_mut().find(|route| route.pattern == pattern) {
            route.replies.push_back(reply);
        } else {
            routes.push(Route {
                pattern,
                replies: VecDeque::from([reply]),
            });
        }
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("scripted requests lock").len()
    }

    /// Copies of every request received so far.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .expect("scripted requests lock")
            .clone()
    }
}

fn response(text: String, citations: Vec<Citation>) -> GenerationResponse {
    GenerationResponse {
        text,
        citations,
        model: "scripted".to_string(),
        usage: TokenUsage::default(),
    }
}

#[async_trait]
impl GenerationService for ScriptedService {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let haystack = format!(
            "{} {}",
            request.system.as_deref().unwrap_or(""),
            request.prompt
        );
        self.requests
            .lock()
            .expect("scripted requests lock")
            .push(request);

        {
            let mut routes = self.routes.lock().expect("scripted routes lock");
            if let Some(route) = routes
                .iter_mut()
                .find(|route| haystack.contains(&route.pattern) && !route.replies.is_empty())
            {
                if let Some(reply) = route.replies.pop_front() {
                    return reply;
                }
            }
        }

        if let Some(reply) = self
            .queue
            .lock()
            .expect("scripted queue lock")
            .pop_front()
        {
            return reply;
        }

        Ok(response(
            "no scripted reply remaining".to_string(),
            Vec::new(),
        ))
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn is_ready(&self) -> bool {
        true
    }
}

/// A canned extraction payload with `count` well-separated candidates.
///
/// Texts are deliberately disjoint in wording so the candidates clear the
/// diversity selector's overlap ceilings.
pub fn candidate_payload(count: usize) -> String {
    let themes = [
        (
            "Macro Economy",
            "fixed_income",
            "treasury yields",
            "Treasury yields test the ceiling",
            "Ten-year yields pushed to cycle highs as auction demand softened and dealers absorbed record supply",
            "1994 bond rout",
        ),
        (
            "Energy & Environment",
            "energy",
            "crude oil",
            "Crude extends its supply-cut rally",
            "Brent climbed for a fifth session after the cartel extended voluntary production curbs deep into next quarter",
            "1970s oil shock",
        ),
        (
            "Policy & Strategy",
            "policy",
            "central bank policy",
            "The easing cycle hits a pause",
            "Policymakers signalled a longer hold while services inflation refuses to cool toward target",
            "2018 tightening",
        ),
        (
            "Technology",
            "technology",
            "ai infrastructure",
            "Datacenter capex keeps accelerating",
            "Hyperscalers raised spending guidance with accelerator orders booked out through next year",
            "dot-com buildout",
        ),
        (
            "Currencies",
            "fx",
            "yen carry trade",
            "The carry trade wobbles again",
            "Funding currencies whipsawed as rate differentials narrowed and leveraged positions unwound",
            "1998 unwind",
        ),
        (
            "Commodities",
            "metals",
            "gold demand",
            "Official buyers keep stacking gold",
            "Reserve managers purchased bullion at a record pace while retail flows chased fresh highs",
            "1979 gold spike",
        ),
    ];
    let items: Vec<serde_json::Value> = themes
        .iter()
        .cycle()
        .take(count)
        .enumerate()
        .map(|(i, (category, domain, keyword, title, context, hint))| {
            let keyword = if i < themes.len() {
                keyword.to_string()
            } else {
                format!("{} {}", keyword, i)
            };
            json!({
                "category": category,
                "domain": domain,
                "keyword": keyword,
                "title": title,
                "context": context,
                "mirroringHint": hint,
            })
        })
        .collect();
    serde_json::to_string(&items).expect("candidate payload")
}

/// A canned, well-formed draft payload for `theme`: every page present,
/// content above the validation minimum, a quiz on the designated page.
pub fn draft_payload(theme: &str) -> String {
    let content = format!(
        "{theme} has dominated trading desks this week, and the pattern looks \
         familiar to anyone who watched the last cycle turn. Positioning got \
         stretched, a catalyst landed, and every related asset repriced at \
         once. Here is what is driving the move, what history suggests comes \
         next, and the <mark class='term'>volatility</mark> worth watching."
    );
    let mut draft = serde_json::Map::new();
    for key in crate::narrative::PAGE_KEYS {
        let mut section = json!({
            "content": content,
            "bullets": [
                format!("{theme}: first takeaway"),
                format!("{theme}: second takeaway"),
                format!("{theme}: third takeaway"),
            ],
            "glossary": ["volatility"],
            "chart": {
                "data": [{"x": ["q1", "q2", "q3"], "y": [1.0, 2.0, 3.0], "type": "scatter"}],
                "layout": {"title": format!("{theme} trend")}
            },
        });
        if key == crate::narrative::QUIZ_PAGE {
            section["quiz"] = json!({
                "context": format!("A prior {theme} episode looked just like this."),
                "question": "What did the market do next?",
                "options": [
                    {"id": "up", "label": "It rallied", "explanation": "Stimulus kicked in."},
                    {"id": "down", "label": "It fell", "explanation": "The shock deepened."},
                    {"id": "sideways", "label": "It went sideways", "explanation": "Forces balanced out."}
                ],
                "correct_answer": "up",
                "actual_result": "The market recovered within a year.",
                "lesson": "Catalysts fade; fundamentals reassert."
            });
        }
        draft.insert(key.to_string(), section);
    }
    serde_json::to_string(&draft).expect("draft payload")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let service = ScriptedService::new();
        service.push_text("first");
        service.push_text("second");

        let a = service
            .generate(GenerationRequest::new("m", "p"))
            .await
            .unwrap();
        let b = service
            .generate(GenerationRequest::new("m", "p"))
            .await
            .unwrap();
        assert_eq!(a.text, "first");
        assert_eq!(b.text, "second");
        assert_eq!(service.request_count(), 2);
    }

    #[tokio::test]
    async fn test_routing_beats_queue() {
        let service = ScriptedService::new();
        service.push_text("queued");
        service.route("research", "routed");

        let routed = service
            .generate(GenerationRequest::new("m", "run the research pass"))
            .await
            .unwrap();
        assert_eq!(routed.text, "routed");

        let queued = service
            .generate(GenerationRequest::new("m", "anything else"))
            .await
            .unwrap();
        assert_eq!(queued.text, "queued");
    }

    #[tokio::test]
    async fn test_exhausted_service_returns_placeholder() {
        let service = ScriptedService::new();
        let reply = service
            .generate(GenerationRequest::new("m", "p"))
            .await
            .unwrap();
        assert!(reply.text.contains("no scripted reply"));
    }

    #[test]
    fn test_candidate_payload_parses() {
        let candidates = crate::topics::parse_candidates(&candidate_payload(4));
        assert_eq!(candidates.len(), 4);
    }

    #[test]
    fn test_draft_payload_validates() {
        let draft: serde_json::Value = serde_json::from_str(&draft_payload("oil")).unwrap();
        let document = crate::narrative::NarrativeDocument::from_draft(&draft, "oil");
        let report = crate::validator::validate(&document);
        assert!(report.is_valid, "issues: {:?}", report.issues);
    }
}
