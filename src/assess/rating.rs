//! Provider rating wire format and its forgiving parser.
//!
//! Providers are told to answer with a single JSON object, but CLIs wrap
//! output in prose, code fences, or banners. Parsing tries progressively
//! messier extractions and never fails; an output with no usable rating
//! simply yields `None`.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Which rubric the rating was requested against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingSchema {
    /// Standing value of the chunk on its own.
    Generic,
    /// Value of the chunk for answering a specific question.
    QuestionAware,
}

impl RatingSchema {
    /// The wire key whose presence identifies an object of this schema.
    #[must_use]
    pub const fn marker_key(self) -> &'static str {
        match self {
            Self::Generic => "relevance",
            Self::QuestionAware => "questionRelevance",
        }
    }

    /// All score keys the schema requires.
    #[must_use]
    pub const fn required_keys(self) -> [&'static str; 4] {
        match self {
            Self::Generic => ["relevance", "signalDensity", "reusability", "overallScore"],
            Self::QuestionAware => [
                "questionRelevance",
                "signalDensity",
                "contextValue",
                "overallScore",
            ],
        }
    }
}

/// Per-axis scores of a rating, mirroring the wire schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RatingAxes {
    /// Generic rubric axes.
    Generic {
        /// How relevant the chunk is to ongoing project work.
        relevance: u8,
        /// Information density of the content.
        signal_density: u8,
        /// How reusable the knowledge is across sessions.
        reusability: u8,
    },
    /// Question-aware rubric axes.
    QuestionAware {
        /// How directly the chunk addresses the question.
        question_relevance: u8,
        /// Information density of the content.
        signal_density: u8,
        /// Background value even if not a direct answer.
        context_value: u8,
    },
}

/// A parsed provider rating with scores clamped to `[1, 10]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rating {
    /// Overall score on the `[1, 10]` scale.
    pub overall_score: u8,
    /// Provider's stated reasoning (may be empty).
    pub rationale: String,
    /// Axis breakdown.
    pub axes: RatingAxes,
}

/// Parses a provider's stdout into a rating, trying in order: the whole
/// trimmed output as JSON, the first fenced code block, and finally the
/// first balanced `{...}` containing the schema's marker key.
#[must_use]
pub fn parse_rating(output: &str, schema: RatingSchema) -> Option<Rating> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(rating) = try_candidate(trimmed, schema) {
        return Some(rating);
    }

    if let Some(block) = extract_fenced_block(trimmed)
        && let Some(rating) = try_candidate(block.trim(), schema)
    {
        return Some(rating);
    }

    embedded_objects(trimmed)
        .into_iter()
        .find_map(|candidate| try_candidate(&candidate, schema))
}

fn try_candidate(candidate: &str, schema: RatingSchema) -> Option<Rating> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    validate(&value, schema)
}

fn validate(value: &Value, schema: RatingSchema) -> Option<Rating> {
    let object = value.as_object()?;
    let mut scores = [0u8; 4];
    for (slot, key) in scores.iter_mut().zip(schema.required_keys()) {
        *slot = clamp_score(object.get(key)?)?;
    }
    let rationale = object
        .get("rationale")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let axes = match schema {
        RatingSchema::Generic => RatingAxes::Generic {
            relevance: scores[0],
            signal_density: scores[1],
            reusability: scores[2],
        },
        RatingSchema::QuestionAware => RatingAxes::QuestionAware {
            question_relevance: scores[0],
            signal_density: scores[1],
            context_value: scores[2],
        },
    };

    Some(Rating {
        overall_score: scores[3],
        rationale,
        axes,
    })
}

/// Integer-clamps a numeric score to `[1, 10]`; non-numbers are rejected.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_score(value: &Value) -> Option<u8> {
    let n = value.as_f64()?;
    if !n.is_finite() {
        return None;
    }
    Some(n.round().clamp(1.0, 10.0) as u8)
}

fn extract_fenced_block(text: &str) -> Option<&str> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").ok())
        .as_ref()?
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Returns every balanced top-level `{...}` substring, left to right.
fn embedded_objects(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut objects = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            let mut depth = 0usize;
            let mut in_string = false;
            let mut escaped = false;
            for (j, &b) in bytes.iter().enumerate().skip(i) {
                if in_string {
                    if escaped {
                        escaped = false;
                    } else if b == b'\\' {
                        escaped = true;
                    } else if b == b'"' {
                        in_string = false;
                    }
                    continue;
                }
                match b {
                    b'"' => in_string = true,
                    b'{' => depth += 1,
                    b'}' => {
                        depth -= 1;
                        if depth == 0 {
                            if let Some(candidate) = text.get(i..=j) {
                                objects.push(candidate.to_string());
                            }
                            i = j;
                            break;
                        }
                    }
                    _ => {}
                }
            }
        }
        i += 1;
    }
    objects
}
