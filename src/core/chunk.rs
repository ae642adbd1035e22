//! Chunk representation: the atomic unit of assessment and selection.
//!
//! Chunks are bounded, ordered groups of scored events produced by the
//! chunker. A chunk is never mutated after creation; storage rows are
//! upserted by id on re-runs.

use serde::{Deserialize, Serialize};

use crate::core::event::ParsedEvent;

/// Estimates token count as `⌈bytes / 4⌉`.
///
/// The coarse four-bytes-per-token approximation is used consistently
/// across chunking, distillation budgets, and synthetic memory chunks.
#[must_use]
pub const fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// A bounded group of events with derived scoring metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Globally unique chunk id.
    pub id: String,

    /// Session the events were drawn from.
    pub session_id: String,

    /// Member events, in source order.
    pub events: Vec<ParsedEvent>,

    /// Original index of the first member event in the scored stream.
    pub start_index: usize,

    /// Original index of the last member event in the scored stream.
    pub end_index: usize,

    /// Mean importance score of member events (0-100).
    pub importance_avg: f64,

    /// Sum of per-event token estimates.
    pub token_estimate: usize,

    /// Provenance marker for synthetic chunks (e.g. `claudemem`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Chunk {
    /// Builds a chunk over the given events, deriving `importance_avg`
    /// from the supplied per-event scores and `token_estimate` from the
    /// event contents.
    ///
    /// `scores` must parallel `events`; extra scores are ignored.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_events(
        session_id: impl Into<String>,
        events: Vec<ParsedEvent>,
        scores: &[u8],
        start_index: usize,
        end_index: usize,
    ) -> Self {
        let token_estimate = events.iter().map(|e| estimate_tokens(&e.content)).sum();
        let importance_avg = if events.is_empty() {
            0.0
        } else {
            let total: u32 = scores
                .iter()
                .take(events.len())
                .map(|&s| u32::from(s))
                .sum();
            f64::from(total) / events.len() as f64
        };

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            events,
            start_index,
            end_index,
            importance_avg,
            token_estimate,
            source: None,
        }
    }

    /// Concatenation of member event contents, newline-separated.
    #[must_use]
    pub fn combined_content(&self) -> String {
        let mut out = String::new();
        for (i, event) in self.events.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&event.content);
        }
        out
    }

    /// Textual content of the first event, used as the dedup key source.
    #[must_use]
    pub fn primary_content(&self) -> &str {
        self.events.first().map_or("", |e| e.content.as_str())
    }

    /// Earliest platform timestamp among member events, if any carry one.
    #[must_use]
    pub fn first_timestamp(&self) -> Option<&str> {
        self.events.iter().find_map(|e| e.timestamp.as_deref())
    }

    /// Latest platform timestamp among member events, if any carry one.
    #[must_use]
    pub fn last_timestamp(&self) -> Option<&str> {
        self.events.iter().rev().find_map(|e| e.timestamp.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens_ceiling() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(&"x".repeat(4000)), 1000);
    }

    #[test]
    fn test_from_events_derivations() {
        let events = vec![
            ParsedEvent::new("user", "x".repeat(10)),
            ParsedEvent::new("assistant", "y".repeat(5)),
        ];
        let chunk = Chunk::from_events("sess-1", events, &[40, 60], 3, 4);

        assert_eq!(chunk.session_id, "sess-1");
        assert_eq!(chunk.start_index, 3);
        assert_eq!(chunk.end_index, 4);
        // ⌈10/4⌉ + ⌈5/4⌉ = 3 + 2
        assert_eq!(chunk.token_estimate, 5);
        assert!((chunk.importance_avg - 50.0).abs() < f64::EPSILON);
        assert!(!chunk.id.is_empty());
    }

    #[test]
    fn test_unique_ids() {
        let a = Chunk::from_events("s", vec![ParsedEvent::new("user", "a")], &[50], 0, 0);
        let b = Chunk::from_events("s", vec![ParsedEvent::new("user", "a")], &[50], 0, 0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_combined_and_primary_content() {
        let chunk = Chunk::from_events(
            "s",
            vec![
                ParsedEvent::new("user", "first"),
                ParsedEvent::new("assistant", "second"),
            ],
            &[50, 50],
            0,
            1,
        );
        assert_eq!(chunk.primary_content(), "first");
        assert_eq!(chunk.combined_content(), "first\nsecond");
    }

    #[test]
    fn test_timestamps() {
        let mut first = ParsedEvent::new("user", "a");
        first.timestamp = Some("2026-01-01T00:00:00Z".to_string());
        let mut last = ParsedEvent::new("assistant", "b");
        last.timestamp = Some("2026-01-01T00:05:00Z".to_string());

        let chunk = Chunk::from_events("s", vec![first, last], &[50, 50], 0, 1);
        assert_eq!(chunk.first_timestamp(), Some("2026-01-01T00:00:00Z"));
        assert_eq!(chunk.last_timestamp(), Some("2026-01-01T00:05:00Z"));
    }
}
