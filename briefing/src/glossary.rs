//! Glossary term extraction from inline emphasis markers.
//!
//! Drafts flag jargon inline as `<mark class='term'>duration</mark>`.
//! After assembly the pipeline scans every section for those markers,
//! collects the terms in first-seen order, and unwraps any marker whose
//! term did not make the final glossary so the UI never highlights a word
//! it cannot define.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::narrative::NarrativeDocument;

const MARK_OPEN_PREFIX: &str = "<mark class=";
const MARK_CLOSE: &str = "</mark>";

/// One glossary entry in the run result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    /// The flagged term.
    pub term: String,
    /// Its plain-language definition; empty when definition generation
    /// degraded.
    #[serde(default)]
    pub definition: String,
}

/// A `<mark class='term'>…</mark>` occurrence within a string.
struct Mark {
    /// Byte offset of `<mark`.
    start: usize,
    /// Byte range of the inner term.
    term_start: usize,
    term_end: usize,
    /// Byte offset just past `</mark>`.
    end: usize,
}

/// Find the first well-formed mark at or after `from`.
fn next_mark(text: &str, from: usize) -> Option<Mark> {
    let mut cursor = from;

    while let Some(found) = text[cursor..].find(MARK_OPEN_PREFIX) {
        let start = cursor + found;
        let after_attr = start + MARK_OPEN_PREFIX.len();
        cursor = after_attr;

        let rest = &text[after_attr..];
        let Some(quote) = rest.chars().next().filter(|c| *c == '\'' || *c == '"') else {
            continue;
        };
        let expected = format!("{quote}term{quote}>");
        let Some(rest) = rest.strip_prefix(&expected) else {
            continue;
        };

        let term_start = after_attr + expected.len();
        let Some(close) = rest.find(MARK_CLOSE) else {
            continue;
        };
        return Some(Mark {
            start,
            term_start,
            term_end: term_start + close,
            end: term_start + close + MARK_CLOSE.len(),
        });
    }

    None
}

/// Collect marked terms from one string, in order of appearance.
fn collect_terms(text: &str, terms: &mut Vec<String>, seen: &mut HashSet<String>) {
    let mut cursor = 0;
    while let Some(mark) = next_mark(text, cursor) {
        let term = text[mark.term_start..mark.term_end].trim().to_string();
        if !term.is_empty() && seen.insert(term.clone()) {
            terms.push(term);
        }
        cursor = mark.end;
    }
}

/// Scan documents for marked terms, deduplicated in first-seen order.
pub fn extract_terms(documents: &[NarrativeDocument]) -> Vec<String> {
    let mut terms = Vec::new();
    let mut seen = HashSet::new();

    for document in documents {
        for (_, section) in document.iter() {
            collect_terms(&section.content, &mut terms, &mut seen);
            for bullet in &section.bullets {
                collect_terms(bullet, &mut terms, &mut seen);
            }
        }
    }

    terms
}

/// Unwrap every mark whose term is not in `allowed`, leaving the bare term.
pub fn sanitize_marks(text: &str, allowed: &HashSet<String>) -> String {
    let mut output = String::with_capacity(text.len());
    let mut cursor = 0;

    while let Some(mark) = next_mark(text, cursor) {
        output.push_str(&text[cursor..mark.start]);
        let term = &text[mark.term_start..mark.term_end];
        if allowed.contains(term.trim()) {
            output.push_str(&text[mark.start..mark.end]);
        } else {
            output.push_str(term);
        }
        cursor = mark.end;
    }

    output.push_str(&text[cursor..]);
    output
}

/// Sanitize every content and bullet string in a document.
pub fn sanitize_document(document: &mut NarrativeDocument, allowed: &HashSet<String>) {
    for (_, section) in document.iter_mut() {
        section.content = sanitize_marks(&section.content, allowed);
        for bullet in section.bullets.iter_mut() {
            *bullet = sanitize_marks(bullet, allowed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::{NarrativeDocument, NarrativeSection};

    fn section(content: &str) -> NarrativeSection {
        NarrativeSection {
            content: content.to_string(),
            bullets: Vec::new(),
            glossary: Vec::new(),
            chart: None,
            quiz: None,
        }
    }

    #[test]
    fn test_terms_first_seen_order() {
        let mut document = NarrativeDocument::new();
        document.insert(
            "background",
            section(
                "Watch <mark class='term'>duration</mark> and \
                 <mark class=\"term\">beta</mark> closely.",
            ),
        );
        document.insert(
            "mirroring",
            section("Again <mark class='term'>duration</mark> matters."),
        );

        let terms = extract_terms(&[document]);
        assert_eq!(terms, vec!["duration".to_string(), "beta".to_string()]);
    }

    #[test]
    fn test_terms_collected_from_bullets() {
        let mut document = NarrativeDocument::new();
        let mut s = section("no marks here");
        s.bullets = vec!["check <mark class='term'>liquidity</mark> daily".to_string()];
        document.insert("background", s);

        assert_eq!(extract_terms(&[document]), vec!["liquidity".to_string()]);
    }

    #[test]
    fn test_malformed_marks_skipped() {
        let text = "<mark class=term>unquoted</mark> but <mark class='term'>kept</mark>";
        let mut terms = Vec::new();
        let mut seen = HashSet::new();
        collect_terms(text, &mut terms, &mut seen);
        assert_eq!(terms, vec!["kept".to_string()]);
    }

    #[test]
    fn test_sanitize_unwraps_unknown_terms() {
        let allowed: HashSet<String> = ["duration".to_string()].into_iter().collect();
        let text = "Mind <mark class='term'>duration</mark> and \
                    <mark class='term'>convexity</mark> here.";
        assert_eq!(
            sanitize_marks(text, &allowed),
            "Mind <mark class='term'>duration</mark> and convexity here."
        );
    }

    #[test]
    fn test_sanitize_document_covers_bullets() {
        let allowed = HashSet::new();
        let mut document = NarrativeDocument::new();
        let mut s = section("plain");
        s.bullets = vec!["watch <mark class='term'>beta</mark>".to_string()];
        document.insert("background", s);

        sanitize_document(&mut document, &allowed);
        assert_eq!(
            document.get("background").unwrap().bullets[0],
            "watch beta"
        );
    }
}
