//! Topic candidates surfaced from raw signal text.

use serde::{Deserialize, Serialize};

use crate::extract;

/// Minimum title length before the keyword-derived fallback kicks in.
const MIN_TITLE_LENGTH: usize = 8;

/// A proposed theme extracted from signals, not yet vetted for uniqueness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCandidate {
    /// Broad editorial category, e.g. "Macro Economy".
    pub category: String,
    /// Machine-friendly domain tag, e.g. "fixed_income".
    pub domain: String,
    /// The core keyword or phrase.
    pub keyword: String,
    /// Display title for the finished narrative.
    pub title: String,
    /// Supporting context pulled from the signals.
    pub context: String,
    /// Historical episode this topic should be mirrored against.
    pub mirroring_hint: String,
}

/// Constraints for a re-extraction pass, seeded from a prior batch.
#[derive(Debug, Clone, Default)]
pub struct AvoidLists {
    /// Keywords the next batch must not repeat.
    pub keywords: Vec<String>,
    /// Categories the next batch must not repeat.
    pub categories: Vec<String>,
    /// Mirroring hints the next batch must not repeat.
    pub hints: Vec<String>,
}

impl AvoidLists {
    /// Seed avoid-lists from an already-extracted batch.
    pub fn from_candidates(candidates: &[TopicCandidate]) -> Self {
        Self {
            keywords: candidates.iter().map(|c| c.keyword.clone()).collect(),
            categories: candidates.iter().map(|c| c.category.clone()).collect(),
            hints: candidates
                .iter()
                .map(|c| c.mirroring_hint.clone())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    /// Whether every list is empty.
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty() && self.categories.is_empty() && self.hints.is_empty()
    }

    /// Render the lists as prompt constraints, or an empty string.
    pub fn prompt_section(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let mut lines = vec!["[Constraints for this batch - do not reuse]".to_string()];
        if !self.keywords.is_empty() {
            lines.push(format!("- Forbidden keywords: {}", self.keywords.join(", ")));
        }
        if !self.categories.is_empty() {
            lines.push(format!(
                "- Forbidden categories: {}",
                self.categories.join(", ")
            ));
        }
        if !self.hints.is_empty() {
            lines.push(format!(
                "- Forbidden mirroring hints: {}",
                self.hints.join(", ")
            ));
        }
        lines.join("\n")
    }
}

/// Raw candidate item as the extraction model emits it.
#[derive(Debug, Deserialize)]
struct RawCandidate {
    #[serde(default)]
    category: String,
    #[serde(default)]
    domain: String,
    #[serde(default)]
    keyword: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    context: String,
    #[serde(default, alias = "mirroringHint")]
    mirroring_hint: String,
}

/// Parse an extraction response into candidates.
///
/// Tolerates fenced payloads, leading chatter, and partially-filled items.
/// Items without a keyword and context are dropped; weak titles are replaced
/// with a keyword-derived fallback.
pub fn parse_candidates(response_text: &str) -> Vec<TopicCandidate> {
    let payload = match extract::array_payload(response_text) {
        Some(value) => value,
        None => return Vec::new(),
    };

    let items: Vec<RawCandidate> = serde_json::from_value(payload).unwrap_or_default();

    items
        .into_iter()
        .filter_map(|raw| {
            let keyword = raw.keyword.trim().to_string();
            let context = raw.context.trim().to_string();
            if keyword.is_empty() || context.is_empty() {
                return None;
            }

            let category = non_empty_or(raw.category.trim(), "Market trend");
            let domain = {
                let tag = raw.domain.trim().to_lowercase().replace(' ', "_");
                non_empty_or(&tag, "macro")
            };

            let mut title = strip_leading_tag(raw.title.trim()).to_string();
            if title.chars().count() < MIN_TITLE_LENGTH || title.eq_ignore_ascii_case("ai") {
                title = format!("{}: what the market is watching", keyword);
            }

            Some(TopicCandidate {
                category,
                domain,
                keyword,
                title,
                context,
                mirroring_hint: raw.mirroring_hint.trim().to_string(),
            })
        })
        .collect()
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

/// Strip one leading `[…]` tag, as extraction models like to prefix titles
/// with their own category markers.
fn strip_leading_tag(title: &str) -> &str {
    let trimmed = title.trim_start();
    if let Some(rest) = trimmed.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            return rest[end + 1..].trim_start();
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_candidates_happy_path() {
        let text = r#"[
            {"category": "Macro Economy", "domain": "Fixed Income", "keyword": "treasury yields",
             "title": "Treasury yields test the ceiling", "context": "Ten-year yields rose again",
             "mirroringHint": "1994 bond rout"}
        ]"#;
        let candidates = parse_candidates(text);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].domain, "fixed_income");
        assert_eq!(candidates[0].mirroring_hint, "1994 bond rout");
    }

    #[test]
    fn test_parse_candidates_drops_incomplete_items() {
        let text = r#"[
            {"keyword": "", "context": "orphan context"},
            {"keyword": "oil prices", "context": ""},
            {"keyword": "oil prices", "context": "Crude climbed on supply fears"}
        ]"#;
        let candidates = parse_candidates(text);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].keyword, "oil prices");
        assert_eq!(candidates[0].category, "Market trend");
    }

    #[test]
    fn test_parse_candidates_fenced_payload() {
        let text = "Here you go:\n```json\n[{\"keyword\": \"chip exports\", \"context\": \"New controls announced\"}]\n```";
        assert_eq!(parse_candidates(text).len(), 1);
    }

    #[test]
    fn test_parse_candidates_garbage_is_empty() {
        assert!(parse_candidates("I could not find any topics today.").is_empty());
    }

    #[test]
    fn test_weak_title_replaced() {
        let text = r#"[{"keyword": "yen carry", "title": "[FX] x", "context": "Unwinding continues"}]"#;
        let candidates = parse_candidates(text);
        assert!(candidates[0].title.starts_with("yen carry"));
    }

    #[test]
    fn test_leading_tag_stripped_from_valid_title() {
        let text = r#"[{"keyword": "yen carry", "title": "[FX] The carry trade unwinds again", "context": "c"}]"#;
        let candidates = parse_candidates(text);
        assert_eq!(candidates[0].title, "The carry trade unwinds again");
    }

    #[test]
    fn test_avoid_lists_prompt_section() {
        let candidates = vec![TopicCandidate {
            category: "Macro Economy".to_string(),
            domain: "macro".to_string(),
            keyword: "rates".to_string(),
            title: "Rates in focus today".to_string(),
            context: "c".to_string(),
            mirroring_hint: "2018 tightening".to_string(),
        }];
        let avoid = AvoidLists::from_candidates(&candidates);
        let section = avoid.prompt_section();
        assert!(section.contains("Forbidden keywords: rates"));
        assert!(section.contains("2018 tightening"));
        assert!(AvoidLists::default().prompt_section().is_empty());
    }
}
