//! Structural validation and quality scoring for narrative documents.
//!
//! Validation is the gate in front of persistence: missing pages, thin
//! content, malformed quizzes all block a document. Chart *degeneracy*
//! checks are advisory only (a flat placeholder chart is a quality smell,
//! not a structural defect), so they are logged and never fail a document.
//! Scoring is unconditional and descriptive; it must never panic, even on
//! documents that just failed validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use crate::narrative::{
    NarrativeDocument, NarrativeSection, MIN_BULLETS, MIN_CONTENT_LENGTH, MIN_QUIZ_OPTIONS,
    PAGE_KEYS, QUIZ_PAGE,
};

/// Outcome of validating a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether the document may persist.
    pub is_valid: bool,
    /// Itemized blocking issues (empty when valid).
    pub issues: Vec<String>,
}

/// Descriptive quality metrics for a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Required pages present.
    pub sections_count: usize,
    /// Pages carrying a chart with at least one trace.
    pub sections_with_chart: usize,
    /// Histogram of trace kinds across all charts.
    pub chart_kinds: BTreeMap<String, usize>,
    /// Mean content length over present pages, in characters.
    pub avg_content_length: usize,
    /// Total bullets across pages.
    pub total_bullets: usize,
    /// Total glossary terms flagged across pages.
    pub total_glossary_terms: usize,
    /// Inline `<mark` emphasis markers across contents.
    pub mark_count: usize,
}

/// Validate a document against the page contract.
///
/// Short-circuits on missing pages: when any required key is absent the
/// report carries one issue per missing key and nothing else is checked.
pub fn validate(document: &NarrativeDocument) -> ValidationReport {
    let mut issues: Vec<String> = PAGE_KEYS
        .iter()
        .filter(|key| !document.contains(key))
        .map(|key| format!("missing page: {}", key))
        .collect();

    if !issues.is_empty() {
        return ValidationReport {
            is_valid: false,
            issues,
        };
    }

    for key in PAGE_KEYS {
        let section = match document.get(key) {
            Some(section) => section,
            None => continue,
        };
        check_section(key, section, &mut issues);
    }

    check_quiz_placement(document, &mut issues);

    ValidationReport {
        is_valid: issues.is_empty(),
        issues,
    }
}

fn check_section(key: &str, section: &NarrativeSection, issues: &mut Vec<String>) {
    let content_len = section.content.trim().chars().count();
    if content_len < MIN_CONTENT_LENGTH {
        issues.push(format!(
            "{}: content too short ({} chars, minimum {})",
            key, content_len, MIN_CONTENT_LENGTH
        ));
    }

    if section.bullets.len() < MIN_BULLETS {
        issues.push(format!(
            "{}: {} bullets, minimum {}",
            key,
            section.bullets.len(),
            MIN_BULLETS
        ));
    }

    if let Some(chart) = &section.chart {
        if chart.data.is_empty() {
            issues.push(format!("{}: chart has no traces", key));
        } else if !chart.data[0].is_object() {
            issues.push(format!("{}: first chart trace is not an object", key));
        } else {
            // Degenerate-series problems are advisory only.
            for warning in advisory_chart_issues(&chart.data) {
                warn!(page = key, issue = %warning, "chart advisory");
            }
        }
    }
}

fn check_quiz_placement(document: &NarrativeDocument, issues: &mut Vec<String>) {
    for (key, section) in document.iter() {
        match &section.quiz {
            Some(quiz) if key == QUIZ_PAGE => {
                if quiz.options.len() < MIN_QUIZ_OPTIONS {
                    issues.push(format!(
                        "{}: quiz has {} options, minimum {}",
                        key,
                        quiz.options.len(),
                        MIN_QUIZ_OPTIONS
                    ));
                }
                for (idx, option) in quiz.options.iter().enumerate() {
                    if option.id.trim().is_empty() || option.label.trim().is_empty() {
                        issues.push(format!(
                            "{}: quiz option {} is missing an id or label",
                            key, idx
                        ));
                    }
                }
            }
            Some(_) => {
                issues.push(format!("{}: quiz present outside the designated page", key));
            }
            None if key == QUIZ_PAGE => {
                issues.push(format!("{}: quiz missing on the designated page", key));
            }
            None => {}
        }
    }
}

/// Advisory checks over chart traces. Never blocks a document.
fn advisory_chart_issues(traces: &[Value]) -> Vec<String> {
    let mut warnings = Vec::new();

    for (idx, trace) in traces.iter().enumerate() {
        let trace = match trace.as_object() {
            Some(trace) => trace,
            None => {
                warnings.push(format!("trace {}: not an object", idx));
                continue;
            }
        };
        let kind = trace
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("scatter");

        match kind {
            "pie" | "waterfall" => {
                let labels = trace
                    .get("labels")
                    .or_else(|| trace.get("x"))
                    .and_then(Value::as_array);
                let values = trace
                    .get("values")
                    .or_else(|| trace.get("y"))
                    .and_then(Value::as_array);
                match (labels, values) {
                    (Some(labels), Some(values))
                        if !labels.is_empty() && labels.len() == values.len() => {}
                    _ => warnings.push(format!(
                        "trace {}: {} trace needs matching non-empty label/value pairs",
                        idx, kind
                    )),
                }
            }
            _ => {
                let x = trace.get("x").and_then(Value::as_array);
                let y = trace.get("y").and_then(Value::as_array);
                match (x, y) {
                    (Some(x), Some(y)) => {
                        if x.is_empty() || x.len() != y.len() {
                            warnings.push(format!(
                                "trace {}: x ({}) and y ({}) lengths diverge",
                                idx,
                                x.len(),
                                y.len()
                            ));
                        } else if y
                            .iter()
                            .all(|v| v.as_f64().map(|n| n == 0.0).unwrap_or(false))
                        {
                            warnings.push(format!("trace {}: y values are all zero", idx));
                        }
                    }
                    _ => warnings.push(format!("trace {}: missing x or y series", idx)),
                }
            }
        }
    }

    warnings
}

/// Compute descriptive metrics for a document.
///
/// Deliberately tolerant: absent or odd-typed fields contribute zero
/// rather than failing.
pub fn score(document: &NarrativeDocument) -> QualityMetrics {
    let mut metrics = QualityMetrics::default();
    let mut total_content_len = 0usize;

    for key in PAGE_KEYS {
        let section = match document.get(key) {
            Some(section) => section,
            None => continue,
        };
        metrics.sections_count += 1;

        total_content_len += section.content.chars().count();
        metrics.mark_count += section.content.matches("<mark").count();
        metrics.total_bullets += section.bullets.len();
        metrics.total_glossary_terms += section.glossary.len();

        if let Some(chart) = &section.chart {
            if !chart.data.is_empty() {
                metrics.sections_with_chart += 1;
                let kind = chart.data[0]
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                *metrics.chart_kinds.entry(kind).or_insert(0) += 1;
            }
        }
    }

    if metrics.sections_count > 0 {
        metrics.avg_content_length = total_content_len / metrics.sections_count;
    }

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::NarrativeDocument;
    use serde_json::json;

    fn long_content() -> String {
        "Treasury yields pushed to new cycle highs this week as supply pressure met \
         a cautious buyer base, and the move rippled through every risk asset that \
         had been priced off cheaper money assumptions."
            .to_string()
    }

    fn complete_draft() -> Value {
        let mut draft = serde_json::Map::new();
        for key in PAGE_KEYS {
            draft.insert(
                key.to_string(),
                json!({
                    "content": long_content(),
                    "bullets": ["first point", "second point", "third point"],
                    "glossary": ["duration"],
                }),
            );
        }
        Value::Object(draft)
    }

    fn valid_document() -> NarrativeDocument {
        NarrativeDocument::from_draft(&complete_draft(), "treasury yields")
    }

    #[test]
    fn test_valid_document_passes() {
        let report = validate(&valid_document());
        assert!(report.is_valid, "issues: {:?}", report.issues);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_missing_page_short_circuits() {
        let mut document = valid_document();
        // Rebuild without two pages.
        let mut partial = NarrativeDocument::new();
        for (key, section) in document.iter() {
            if key != "action" && key != "result" {
                partial.insert(key, section.clone());
            }
        }
        document = partial;

        let report = validate(&document);
        assert!(!report.is_valid);
        assert_eq!(report.issues.len(), 2);
        assert!(report.issues.iter().all(|issue| issue.contains("missing page")));
    }

    #[test]
    fn test_thin_content_blocks() {
        let mut document = valid_document();
        document.get_mut("background").unwrap().content = "too short".to_string();
        let report = validate(&document);
        assert!(!report.is_valid);
        assert!(report
            .issues
            .iter()
            .any(|issue| issue.contains("background") && issue.contains("content too short")));
    }

    #[test]
    fn test_missing_quiz_mentions_quiz() {
        let mut document = valid_document();
        document.get_mut(QUIZ_PAGE).unwrap().quiz = None;
        let report = validate(&document);
        assert!(!report.is_valid);
        assert!(report.issues.iter().any(|issue| issue.contains("quiz")));
    }

    #[test]
    fn test_quiz_outside_designated_page_blocks() {
        let mut document = valid_document();
        let quiz = document.get(QUIZ_PAGE).unwrap().quiz.clone();
        document.get_mut("background").unwrap().quiz = quiz;
        let report = validate(&document);
        assert!(!report.is_valid);
        assert!(report
            .issues
            .iter()
            .any(|issue| issue.contains("outside the designated page")));
    }

    #[test]
    fn test_degenerate_chart_is_advisory_only() {
        let mut document = valid_document();
        document.get_mut("background").unwrap().chart = Some(crate::narrative::ChartSpec {
            data: vec![json!({"x": [1, 2, 3], "y": [0.0, 0.0, 0.0], "type": "scatter"})],
            layout: json!({}),
        });
        let report = validate(&document);
        assert!(report.is_valid, "issues: {:?}", report.issues);
    }

    #[test]
    fn test_empty_chart_blocks() {
        let mut document = valid_document();
        document.get_mut("background").unwrap().chart = Some(crate::narrative::ChartSpec {
            data: vec![],
            layout: json!({}),
        });
        let report = validate(&document);
        assert!(!report.is_valid);
    }

    #[test]
    fn test_advisory_pie_checks() {
        let warnings = advisory_chart_issues(&[json!({
            "type": "pie", "labels": ["a", "b"], "values": [1.0]
        })]);
        assert_eq!(warnings.len(), 1);

        let clean = advisory_chart_issues(&[json!({
            "type": "pie", "labels": ["a", "b"], "values": [1.0, 2.0]
        })]);
        assert!(clean.is_empty());
    }

    #[test]
    fn test_score_counts() {
        let metrics = score(&valid_document());
        assert_eq!(metrics.sections_count, PAGE_KEYS.len());
        assert_eq!(metrics.sections_with_chart, PAGE_KEYS.len());
        assert_eq!(metrics.total_glossary_terms, PAGE_KEYS.len());
        assert!(metrics.avg_content_length >= MIN_CONTENT_LENGTH);
        assert!(metrics.chart_kinds.contains_key("scatter"));
    }

    #[test]
    fn test_score_tolerates_empty_document() {
        let metrics = score(&NarrativeDocument::new());
        assert_eq!(metrics.sections_count, 0);
        assert_eq!(metrics.avg_content_length, 0);
    }

    #[test]
    fn test_score_bounded_by_required_pages() {
        let mut document = valid_document();
        let extra = document.get("background").unwrap().clone();
        document.insert("extra_page", extra);
        let metrics = score(&document);
        assert!(metrics.sections_count <= PAGE_KEYS.len());
    }
}
