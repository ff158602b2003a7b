//! Extraction helpers for loosely-typed generation output.
//!
//! Generation services wrap payloads in markdown fences, preamble text, and
//! trailing commentary more often than not. These helpers peel those layers
//! off without ever failing; callers decide what a still-unparseable string
//! means for them.

use serde_json::Value;

/// Strip an optional markdown code fence from a response.
///
/// Handles ```` ```json … ``` ```` and plain ```` ``` … ``` ```` blocks;
/// anything else is returned trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    text
}

/// Slice out the widest fragment between `open` and `close`.
///
/// Returns the input unchanged when no such fragment exists, so a follow-up
/// parse failure carries the original text in its error.
pub fn json_fragment(raw: &str, open: char, close: char) -> &str {
    match (raw.find(open), raw.rfind(close)) {
        (Some(start), Some(end)) if start <= end => &raw[start..=end],
        _ => raw,
    }
}

/// Pull a JSON object out of a fenced, prefixed, or suffixed response.
pub fn object_payload(text: &str) -> Option<Value> {
    let fragment = json_fragment(strip_code_fence(text), '{', '}');
    serde_json::from_str(fragment).ok().filter(Value::is_object)
}

/// Pull a JSON array out of a fenced, prefixed, or suffixed response.
pub fn array_payload(text: &str) -> Option<Value> {
    let fragment = json_fragment(strip_code_fence(text), '[', ']');
    serde_json::from_str(fragment).ok().filter(Value::is_array)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fence_plain() {
        let text = r#"{"decision": "SAFE"}"#;
        assert_eq!(strip_code_fence(text), text);
    }

    #[test]
    fn test_strip_fence_json_block() {
        let text = "```json\n{\"decision\": \"SAFE\"}\n```";
        assert_eq!(strip_code_fence(text), r#"{"decision": "SAFE"}"#);
    }

    #[test]
    fn test_strip_fence_no_specifier() {
        let text = "```\n[1, 2]\n```";
        assert_eq!(strip_code_fence(text), "[1, 2]");
    }

    #[test]
    fn test_json_fragment_with_preamble() {
        let raw = "Here are the candidates:\n[{\"keyword\": \"rates\"}]\nLet me know!";
        assert_eq!(json_fragment(raw, '[', ']'), r#"[{"keyword": "rates"}]"#);
    }

    #[test]
    fn test_json_fragment_absent_returns_input() {
        assert_eq!(json_fragment("no json here", '{', '}'), "no json here");
    }

    #[test]
    fn test_object_payload_rejects_array() {
        assert!(object_payload("[1, 2]").is_none());
        assert!(object_payload("{\"a\": 1}").is_some());
    }

    #[test]
    fn test_array_payload_fenced_with_chatter() {
        let text = "Sure!\n```json\n[{\"keyword\": \"oil\"}]\n```\nHope that helps.";
        let payload = array_payload(text).unwrap();
        assert_eq!(payload[0]["keyword"], "oil");
    }
}
