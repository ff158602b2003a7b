//! The narrative document contract.
//!
//! A narrative is an ordered set of pages keyed by [`PAGE_KEYS`], the one
//! hard contract shared with downstream consumers, versioned through
//! [`PAGE_SCHEMA_VERSION`] and updated in lockstep with them. Drafts arrive
//! loosely typed from the generation service; [`NarrativeDocument::from_draft`]
//! repairs their shape (fallback content, bullet normalization, chart and
//! quiz fallbacks) before validation decides whether the result may persist.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};
use std::fmt;

/// Version of the page-key contract below.
pub const PAGE_SCHEMA_VERSION: u32 = 2;

/// Required page keys, in display order.
pub const PAGE_KEYS: [&str; 7] = [
    "background",
    "mirroring",
    "simulation",
    "result",
    "difference",
    "devils_advocate",
    "action",
];

/// The single page that must carry a quiz.
pub const QUIZ_PAGE: &str = "simulation";

/// Minimum trimmed content length per section, in characters.
pub const MIN_CONTENT_LENGTH: usize = 150;

/// Minimum bullet count per section.
pub const MIN_BULLETS: usize = 2;

/// Bullet count for the counter-scenario page.
pub const DEVILS_ADVOCATE_BULLETS: usize = 3;

/// Minimum quiz option count.
pub const MIN_QUIZ_OPTIONS: usize = 3;

/// Display title for a page key, used for chart fallbacks.
pub fn page_title(key: &str) -> &'static str {
    match key {
        "background" => "Current market backdrop",
        "mirroring" => "Historical parallel",
        "simulation" => "Investment simulation",
        "result" => "Simulation outcome",
        "difference" => "Then vs now",
        "devils_advocate" => "Counter-scenario analysis",
        "action" => "Action plan",
        _ => "Market insight",
    }
}

/// One answer option in a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOption {
    /// Stable identifier ("up", "down", "sideways").
    pub id: String,
    /// Display label.
    pub label: String,
    /// Why this outcome was plausible.
    #[serde(default)]
    pub explanation: String,
}

/// The what-happened-next quiz carried by the simulation page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    /// Scene-setting for the historical episode.
    pub context: String,
    /// The question posed to the learner.
    pub question: String,
    /// Answer options.
    pub options: Vec<QuizOption>,
    /// Id of the correct option.
    pub correct_answer: String,
    /// What actually happened.
    #[serde(default)]
    pub actual_result: String,
    /// The takeaway.
    #[serde(default)]
    pub lesson: String,
}

impl Quiz {
    /// Fallback quiz used when a draft omits one on the designated page.
    pub fn fallback(theme: &str) -> Self {
        Self {
            context: format!("Markets have faced a setup much like {} before.", theme),
            question: "How did the market move in the months that followed?".to_string(),
            options: default_options(),
            correct_answer: "up".to_string(),
            actual_result: "After early volatility the market gradually found its footing."
                .to_string(),
            lesson: "History rarely repeats exactly; weigh what is different this time before acting."
                .to_string(),
        }
    }
}

fn default_options() -> Vec<QuizOption> {
    vec![
        QuizOption {
            id: "up".to_string(),
            label: "It rallied".to_string(),
            explanation: "Positive forces won out and the market climbed.".to_string(),
        },
        QuizOption {
            id: "down".to_string(),
            label: "It fell".to_string(),
            explanation: "Uncertainty spread and the market sold off.".to_string(),
        },
        QuizOption {
            id: "sideways".to_string(),
            label: "It went sideways".to_string(),
            explanation: "Bulls and bears fought to a standstill.".to_string(),
        },
    ]
}

/// A plot specification: traces stay loosely typed because they come
/// straight from the generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    /// Trace objects (x/y series, pie labels/values, waterfall measures).
    pub data: Vec<Value>,
    /// Layout object (title, axes).
    #[serde(default = "empty_object")]
    pub layout: Value,
}

fn empty_object() -> Value {
    json!({})
}

/// One page of a narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeSection {
    /// Main prose.
    pub content: String,
    /// Ordered supporting bullets.
    pub bullets: Vec<String>,
    /// Terms the drafter flagged for the glossary.
    #[serde(default)]
    pub glossary: Vec<String>,
    /// Optional chart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartSpec>,
    /// Quiz, present only on the designated page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz: Option<Quiz>,
}

/// An ordered, page-keyed narrative document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NarrativeDocument {
    sections: Vec<(String, NarrativeSection)>,
}

impl NarrativeDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append or replace a section, preserving first-insertion order.
    pub fn insert(&mut self, key: impl Into<String>, section: NarrativeSection) {
        let key = key.into();
        if let Some(existing) = self.sections.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = section;
        } else {
            self.sections.push((key, section));
        }
    }

    /// Look up a section by key.
    pub fn get(&self, key: &str) -> Option<&NarrativeSection> {
        self.sections
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, section)| section)
    }

    /// Mutable section lookup.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut NarrativeSection> {
        self.sections
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, section)| section)
    }

    /// Whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterate sections in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NarrativeSection)> {
        self.sections.iter().map(|(k, s)| (k.as_str(), s))
    }

    /// Iterate sections mutably, in order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut NarrativeSection)> {
        self.sections.iter_mut().map(|(k, s)| (k.as_str(), s))
    }

    /// Number of sections.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Whether the document has no sections.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Build a document from an untrusted draft payload, repairing shape as
    /// it goes: every required page exists afterwards, bullets are
    /// normalized per page, charts get a synthesized fallback, and the
    /// designated page always carries a quiz.
    ///
    /// Repair fixes *shape*, not quality: a draft with thin content still
    /// fails validation afterwards.
    pub fn from_draft(draft: &Value, theme: &str) -> Self {
        let mut document = Self::new();

        for (idx, key) in PAGE_KEYS.iter().enumerate() {
            let raw = draft.get(*key).and_then(Value::as_object);

            let content = raw
                .and_then(|section| section.get("content"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}: the key points, explained simply.", theme));

            let mut bullets: Vec<String> = raw
                .and_then(|section| section.get("bullets"))
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            let desired = if *key == "devils_advocate" {
                DEVILS_ADVOCATE_BULLETS
            } else {
                MIN_BULLETS
            };
            bullets.truncate(desired);
            while bullets.len() < desired {
                bullets.push(fallback_bullet(*key, theme, bullets.len()));
            }

            let glossary: Vec<String> = raw
                .and_then(|section| section.get("glossary"))
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            let chart = Some(ensure_chart(
                raw.and_then(|section| section.get("chart")),
                key,
                idx,
            ));

            let quiz = if *key == QUIZ_PAGE {
                Some(ensure_quiz(
                    raw.and_then(|section| section.get("quiz")),
                    theme,
                ))
            } else {
                None
            };

            document.insert(
                *key,
                NarrativeSection {
                    content,
                    bullets,
                    glossary,
                    chart,
                    quiz,
                },
            );
        }

        document
    }
}

fn fallback_bullet(key: &str, theme: &str, position: usize) -> String {
    if key == "devils_advocate" {
        format!("Counter-scenario {} to weigh for {}", position + 1, theme)
    } else if position == 0 {
        format!("{}: key drivers", theme)
    } else {
        format!("{}: points to monitor", theme)
    }
}

/// Keep a drafted chart when its first trace carries matching non-empty
/// x/y series; otherwise synthesize a placeholder trend line.
fn ensure_chart(raw: Option<&Value>, key: &str, seed: usize) -> ChartSpec {
    let data = raw
        .and_then(|chart| chart.get("data"))
        .and_then(Value::as_array);
    let mut layout = raw
        .and_then(|chart| chart.get("layout"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let valid = data
        .and_then(|traces| traces.first())
        .and_then(Value::as_object)
        .map(|trace| {
            let x = trace.get("x").and_then(Value::as_array);
            let y = trace.get("y").and_then(Value::as_array);
            matches!((x, y), (Some(x), Some(y)) if !x.is_empty() && x.len() == y.len())
        })
        .unwrap_or(false);

    let data = if valid {
        data.map(|traces| traces.to_vec()).unwrap_or_default()
    } else {
        let base = seed as f64;
        vec![json!({
            "x": ["2021", "2022", "2023", "2024", "2025"],
            "y": [base + 8.0, base + 10.0, base + 9.0, base + 12.0, base + 13.0],
            "type": "scatter",
            "name": page_title(key),
        })]
    };

    if !layout.contains_key("title") {
        layout.insert("title".to_string(), json!(page_title(key)));
    }

    ChartSpec {
        data,
        layout: Value::Object(layout),
    }
}

/// Normalize a drafted quiz, falling back field by field.
fn ensure_quiz(raw: Option<&Value>, theme: &str) -> Quiz {
    let raw = match raw.and_then(Value::as_object) {
        Some(object) => object,
        None => return Quiz::fallback(theme),
    };
    let fallback = Quiz::fallback(theme);

    let field = |name: &str, default: &str| -> String {
        raw.get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default.to_string())
    };

    let mut correct_answer = field("correct_answer", "up");
    if !matches!(correct_answer.as_str(), "up" | "down" | "sideways") {
        correct_answer = "up".to_string();
    }

    let defaults = default_options();
    let options = match raw.get("options").and_then(Value::as_array) {
        Some(items) if items.len() >= MIN_QUIZ_OPTIONS => items
            .iter()
            .take(MIN_QUIZ_OPTIONS)
            .enumerate()
            .map(|(i, item)| {
                let default = &defaults[i];
                match item.as_object() {
                    Some(option) => {
                        let pick = |name: &str, fallback: &str| -> String {
                            option
                                .get(name)
                                .and_then(Value::as_str)
                                .map(str::trim)
                                .filter(|s| !s.is_empty())
                                .map(str::to_string)
                                .unwrap_or_else(|| fallback.to_string())
                        };
                        QuizOption {
                            id: pick("id", &default.id),
                            label: pick("label", &default.label),
                            explanation: pick("explanation", &default.explanation),
                        }
                    }
                    None => default.clone(),
                }
            })
            .collect(),
        _ => defaults,
    };

    Quiz {
        context: field("context", &fallback.context),
        question: field("question", &fallback.question),
        options,
        correct_answer,
        actual_result: field("actual_result", &fallback.actual_result),
        lesson: field("lesson", &fallback.lesson),
    }
}

// The document serializes as a JSON object whose key order is the page
// order; downstream consumers rely on it.

impl Serialize for NarrativeDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for (key, section) in &self.sections {
            map.serialize_entry(key, section)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for NarrativeDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DocumentVisitor;

        impl<'de> Visitor<'de> for DocumentVisitor {
            type Value = NarrativeDocument;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of page keys to narrative sections")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut document = NarrativeDocument::new();
                while let Some((key, section)) =
                    access.next_entry::<String, NarrativeSection>()?
                {
                    document.insert(key, section);
                }
                Ok(document)
            }
        }

        deserializer.deserialize_map(DocumentVisitor)
    }
}
