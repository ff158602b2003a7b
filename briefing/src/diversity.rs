//! Diversity selection over topic candidates.
//!
//! Extraction routinely surfaces several phrasings of the same macro event,
//! so candidates are deduplicated by a pairwise overlap score before any
//! expensive downstream work. Selection is deterministic and pure: no I/O,
//! no randomness.
//!
//! The score combines token-set and character-trigram Jaccard similarity
//! (whichever is higher) with a containment bonus when one normalized
//! keyword contains the other. Selection runs two passes over the
//! candidates, longest context first: a strict pass that also forbids
//! reusing a domain, category, or mirroring hint, and a relaxed pass that
//! fills any remaining quota with a higher overlap ceiling. A purely strict
//! filter starves the quota whenever one event dominates the news cycle;
//! the relaxed pass trades diversity for meeting the content quota.

use std::collections::HashSet;

use crate::topics::TopicCandidate;

/// Overlap ceiling for the strict first pass.
const STRICT_OVERLAP_CEILING: f64 = 0.45;

/// Overlap ceiling for the relaxed second pass.
const RELAXED_OVERLAP_CEILING: f64 = 0.55;

/// Bonus applied when one normalized keyword contains the other.
const CONTAINMENT_BONUS: f64 = 0.15;

/// Minimum token length considered by the token-set similarity.
const MIN_TOKEN_LENGTH: usize = 2;

/// Character window width for the trigram similarity.
const NGRAM_WIDTH: usize = 3;

/// Normalize text for comparison: case-fold, strip one leading `[…]` tag,
/// drop quote characters, map remaining punctuation to spaces, collapse
/// whitespace.
pub fn normalize_text(value: &str) -> String {
    let lower = value.trim().to_lowercase();

    let text = match lower.strip_prefix('[').and_then(|rest| {
        rest.find(']').map(|end| rest[end + 1..].trim_start())
    }) {
        Some(stripped) => stripped,
        None => lower.as_str(),
    };

    let no_quotes: String = text
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '`'))
        .collect();

    let spaced: String = no_quotes
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn token_set(value: &str) -> HashSet<String> {
    normalize_text(value)
        .split(' ')
        .filter(|token| token.chars().count() >= MIN_TOKEN_LENGTH)
        .map(|token| token.to_string())
        .collect()
}

fn trigram_set(value: &str) -> HashSet<String> {
    let compact: Vec<char> = normalize_text(value)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if compact.len() < NGRAM_WIDTH {
        return HashSet::new();
    }
    compact
        .windows(NGRAM_WIDTH)
        .map(|window| window.iter().collect())
        .collect()
}

fn jaccard(left: &HashSet<String>, right: &HashSet<String>) -> f64 {
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let intersection = left.intersection(right).count();
    intersection as f64 / (left.len() + right.len() - intersection) as f64
}

/// Pairwise overlap score between two candidates.
pub fn overlap_score(a: &TopicCandidate, b: &TopicCandidate) -> f64 {
    let text_a = combined_text(a);
    let text_b = combined_text(b);

    let token_score = jaccard(&token_set(&text_a), &token_set(&text_b));
    let char_score = jaccard(&trigram_set(&text_a), &trigram_set(&text_b));

    let keyword_a = normalize_text(&a.keyword);
    let keyword_b = normalize_text(&b.keyword);
    let containment = if !keyword_a.is_empty()
        && !keyword_b.is_empty()
        && (keyword_a.contains(&keyword_b) || keyword_b.contains(&keyword_a))
    {
        CONTAINMENT_BONUS
    } else {
        0.0
    };

    token_score.max(char_score) + containment
}

fn combined_text(candidate: &TopicCandidate) -> String {
    format!(
        "{} {} {} {}",
        candidate.keyword, candidate.title, candidate.context, candidate.mirroring_hint
    )
}

/// Select up to `target_count` mutually-diverse candidates.
///
/// Candidates with an empty keyword or context are discarded before
/// scoring. When fewer valid candidates exist than requested, only those
/// are returned; the selector never fabricates entries.
pub fn select_diverse(
    candidates: Vec<TopicCandidate>,
    target_count: usize,
) -> Vec<TopicCandidate> {
    let mut sorted: Vec<TopicCandidate> = candidates
        .into_iter()
        .filter(|c| !c.keyword.trim().is_empty() && !c.context.trim().is_empty())
        .collect();
    // Longer context first: more informative candidates win ties.
    sorted.sort_by(|a, b| b.context.chars().count().cmp(&a.context.chars().count()));

    let mut selected: Vec<TopicCandidate> = Vec::new();
    let mut used_keywords: HashSet<String> = HashSet::new();
    let mut used_domains: HashSet<String> = HashSet::new();
    let mut used_categories: HashSet<String> = HashSet::new();
    let mut used_hints: HashSet<String> = HashSet::new();

    // Pass 1: strict diversity.
    for candidate in &sorted {
        if selected.len() >= target_count {
            break;
        }

        let keyword = normalize_text(&candidate.keyword);
        let domain = normalize_text(&candidate.domain);
        let category = normalize_text(&candidate.category);
        let hint = normalize_text(&candidate.mirroring_hint);

        if keyword.is_empty() || used_keywords.contains(&keyword) {
            continue;
        }
        if !domain.is_empty() && used_domains.contains(&domain) {
            continue;
        }
        if !category.is_empty() && used_categories.contains(&category) {
            continue;
        }
        if !hint.is_empty() && used_hints.contains(&hint) {
            continue;
        }
        if selected
            .iter()
            .any(|existing| overlap_score(existing, candidate) >= STRICT_OVERLAP_CEILING)
        {
            continue;
        }

        selected.push(candidate.clone());
        used_keywords.insert(keyword);
        if !domain.is_empty() {
            used_domains.insert(domain);
        }
        if !category.is_empty() {
            used_categories.insert(category);
        }
        if !hint.is_empty() {
            used_hints.insert(hint);
        }
    }

    // Pass 2: relaxed diversity, only while the quota is unmet.
    if selected.len() < target_count {
        for candidate in &sorted {
            if selected.len() >= target_count {
                break;
            }
            let keyword = normalize_text(&candidate.keyword);
            if keyword.is_empty() || used_keywords.contains(&keyword) {
                continue;
            }
            if selected
                .iter()
                .any(|existing| overlap_score(existing, candidate) >= RELAXED_OVERLAP_CEILING)
            {
                continue;
            }

            selected.push(candidate.clone());
            used_keywords.insert(keyword);
        }
    }

    selected.truncate(target_count);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(
        category: &str,
        domain: &str,
        keyword: &str,
        context: &str,
        hint: &str,
    ) -> TopicCandidate {
        TopicCandidate {
            category: category.to_string(),
            domain: domain.to_string(),
            keyword: keyword.to_string(),
            title: format!("{} in focus", keyword),
            context: context.to_string(),
            mirroring_hint: hint.to_string(),
        }
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(
            normalize_text("[Macro]  \"Treasury\" Yields, rising!"),
            "treasury yields rising"
        );
        assert_eq!(normalize_text("fixed_income"), "fixed_income");
    }

    #[test]
    fn test_identical_candidates_overlap_fully() {
        let a = candidate("Macro", "macro", "oil prices", "Crude supply shock deepens", "1973");
        let score = overlap_score(&a, &a.clone());
        assert!(score >= 1.0);
    }

    #[test]
    fn test_disjoint_candidates_low_overlap() {
        let a = candidate("Macro", "macro", "oil prices", "Crude supply shock deepens", "");
        let b = candidate(
            "Technology",
            "technology",
            "chip exports",
            "New semiconductor controls announced",
            "",
        );
        assert!(overlap_score(&a, &b) < STRICT_OVERLAP_CEILING);
    }

    #[test]
    fn test_containment_bonus_applies() {
        let a = candidate("Macro", "macro", "rates", "Context one entirely different", "");
        let b = candidate("Policy", "policy", "policy rates", "Another unrelated context", "");
        let base_a = candidate("Macro", "macro", "rates", "Context one entirely different", "");
        let mut no_containment = base_a.clone();
        no_containment.keyword = "tariffs".to_string();
        assert!(overlap_score(&a, &b) > overlap_score(&no_containment, &b));
    }

    #[test]
    fn test_select_respects_target_count() {
        let candidates: Vec<TopicCandidate> = (0..6)
            .map(|i| {
                candidate(
                    &format!("Category {}", i),
                    &format!("domain_{}", i),
                    &format!("unique keyword number {}", i),
                    &format!("Completely distinct context body {}", i),
                    &format!("episode {}", i),
                )
            })
            .collect();
        let selected = select_diverse(candidates, 4);
        assert_eq!(selected.len(), 4);
    }

    #[test]
    fn test_selected_pairs_stay_below_relaxed_ceiling() {
        let candidates = vec![
            candidate("Macro", "macro", "treasury yields", "Ten-year yields climb to cycle highs as auctions soften", "1994"),
            candidate("Rates", "fixed_income", "treasury yields surge", "Ten-year yields climb to cycle highs on heavy supply", "1994 rout"),
            candidate("Energy", "energy", "crude oil", "OPEC supply cut extends the rally in crude markets", "1973"),
        ];
        let selected = select_diverse(candidates, 3);
        for i in 0..selected.len() {
            for j in (i + 1)..selected.len() {
                assert!(overlap_score(&selected[i], &selected[j]) < RELAXED_OVERLAP_CEILING);
            }
        }
    }

    #[test]
    fn test_case_whitespace_duplicate_keyword_collapses() {
        // Two of five share a keyword differing only by case/whitespace.
        let candidates = vec![
            candidate("A", "d1", "Treasury Yields", "Context body alpha with detail", "e1"),
            candidate("B", "d2", "treasury  yields", "Context body beta with detail", "e2"),
            candidate("C", "d3", "crude oil", "Context body gamma with detail", "e3"),
            candidate("D", "d4", "yen carry", "Context body delta with detail", "e4"),
            candidate("E", "d5", "gold demand", "Context body epsilon with detail", "e5"),
        ];
        let selected = select_diverse(candidates, 5);
        assert!(selected.len() <= 4);
    }

    #[test]
    fn test_never_fabricates() {
        let candidates = vec![
            candidate("A", "d1", "only topic", "The single context available", ""),
            candidate("B", "d2", "", "Empty keyword is discarded", ""),
            candidate("C", "d3", "blank context", "", ""),
        ];
        let selected = select_diverse(candidates, 5);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn test_relaxed_pass_fills_quota() {
        // Same category everywhere: the strict pass admits one, the relaxed
        // pass tops the quota up with sufficiently-different keywords.
        let candidates = vec![
            candidate("Macro", "macro", "treasury yields", "Long context about the bond market selloff", "1994"),
            candidate("Macro", "macro", "crude oil", "Long context about the energy market rally", "1973"),
            candidate("Macro", "macro", "yen carry", "Long context about currency unwind pressure", "1998"),
        ];
        let strict_only = select_diverse(candidates.clone(), 1);
        assert_eq!(strict_only.len(), 1);

        let selected = select_diverse(candidates, 3);
        assert_eq!(selected.len(), 3);
    }
}
