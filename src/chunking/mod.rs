//! Event chunker: groups scored events into bounded assessment units.
//!
//! The chunker drops low-importance events, then walks the survivors with
//! a sliding window bounded by both an event count and a token budget,
//! seeding each new window with the tail of the previous chunk so context
//! carries across chunk boundaries.

use crate::core::{Chunk, ParsedEvent, estimate_tokens};

/// Default minimum importance an event needs to survive filtering.
pub const DEFAULT_MIN_IMPORTANCE: u8 = 30;
/// Default maximum events per chunk.
pub const DEFAULT_MAX_EVENTS: usize = 20;
/// Default token budget per chunk.
pub const DEFAULT_MAX_TOKENS: usize = 4000;
/// Default overlap carried between consecutive chunks.
pub const DEFAULT_OVERLAP_EVENTS: usize = 2;

/// Chunker configuration.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    /// Events scoring below this are dropped before windowing.
    pub min_importance_threshold: u8,
    /// Maximum events per chunk (window capacity, overlap included).
    pub max_events_per_chunk: usize,
    /// Token budget per chunk.
    pub max_tokens_per_chunk: usize,
    /// Events re-seeded from the tail of the previous chunk.
    pub overlap_events: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_importance_threshold: DEFAULT_MIN_IMPORTANCE,
            max_events_per_chunk: DEFAULT_MAX_EVENTS,
            max_tokens_per_chunk: DEFAULT_MAX_TOKENS,
            overlap_events: DEFAULT_OVERLAP_EVENTS,
        }
    }
}

/// An event paired with the importance score it was persisted with.
#[derive(Debug, Clone)]
pub struct ScoredEvent {
    /// The event payload.
    pub event: ParsedEvent,
    /// Importance score in `[0, 100]`.
    pub importance: u8,
}

impl ScoredEvent {
    /// Pairs an event with its score.
    #[must_use]
    pub const fn new(event: ParsedEvent, importance: u8) -> Self {
        Self { event, importance }
    }
}

/// Chunker over scored event sequences.
#[derive(Debug, Clone, Default)]
pub struct EventChunker {
    config: ChunkerConfig,
}

impl EventChunker {
    /// Creates a chunker with the given configuration.
    #[must_use]
    pub const fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunks a scored event sequence for one session.
    ///
    /// A window closes when it holds `max_events_per_chunk` events or when
    /// the next event's tokens would push it past `max_tokens_per_chunk`;
    /// the next window is seeded with the closed chunk's tail. Seed events
    /// are evicted oldest-first when they would block the incoming event
    /// (capacity or budget), so a single event larger than the whole
    /// budget always sits alone in its chunk.
    #[must_use]
    pub fn chunk_events(&self, session_id: &str, events: &[ScoredEvent]) -> Vec<Chunk> {
        let max_events = self.config.max_events_per_chunk.max(1);
        let max_tokens = self.config.max_tokens_per_chunk.max(1);
        // Overlap must leave room for at least one new event per window.
        let overlap = self.config.overlap_events.min(max_events - 1);

        let survivors: Vec<(usize, &ScoredEvent)> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.importance >= self.config.min_importance_threshold)
            .collect();

        let mut chunks = Vec::new();
        // Window entries: (original index, event, score, token estimate)
        let mut window: Vec<(usize, ParsedEvent, u8, usize)> = Vec::new();
        let mut running_tokens = 0usize;

        for (original_index, scored) in survivors {
            let tokens = estimate_tokens(&scored.event.content);

            if !window.is_empty()
                && (window.len() >= max_events || running_tokens + tokens > max_tokens)
            {
                Self::emit(session_id, &window, &mut chunks);

                let seed_from = window.len().saturating_sub(overlap);
                window.drain(..seed_from);
                running_tokens = window.iter().map(|(_, _, _, t)| *t).sum();

                // Evict seed until the incoming event fits.
                while !window.is_empty()
                    && (window.len() >= max_events || running_tokens + tokens > max_tokens)
                {
                    let (_, _, _, removed) = window.remove(0);
                    running_tokens -= removed;
                }
            }

            window.push((
                original_index,
                scored.event.clone(),
                scored.importance,
                tokens,
            ));
            running_tokens += tokens;
        }

        if !window.is_empty() {
            Self::emit(session_id, &window, &mut chunks);
        }

        chunks
    }

    fn emit(session_id: &str, window: &[(usize, ParsedEvent, u8, usize)], out: &mut Vec<Chunk>) {
        let start_index = window.first().map_or(0, |(i, ..)| *i);
        let end_index = window.last().map_or(0, |(i, ..)| *i);
        let events: Vec<ParsedEvent> = window.iter().map(|(_, e, ..)| e.clone()).collect();
        let scores: Vec<u8> = window.iter().map(|(_, _, s, _)| *s).collect();

        out.push(Chunk::from_events(
            session_id,
            events,
            &scores,
            start_index,
            end_index,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scored(content: &str, importance: u8) -> ScoredEvent {
        ScoredEvent::new(ParsedEvent::new("user", content), importance)
    }

    fn contents(chunk: &Chunk) -> Vec<String> {
        chunk.events.iter().map(|e| e.content.clone()).collect()
    }

    #[test]
    fn test_low_importance_events_dropped() {
        let chunker = EventChunker::default();
        let events = vec![
            scored("keep-a", 50),
            scored("drop", 10),
            scored("keep-b", 30),
        ];
        let chunks = chunker.chunk_events("s", &events);
        assert_eq!(chunks.len(), 1);
        assert_eq!(contents(&chunks[0]), vec!["keep-a", "keep-b"]);
        // Original indices survive filtering
        assert_eq!(chunks[0].start_index, 0);
        assert_eq!(chunks[0].end_index, 2);
    }

    #[test]
    fn test_sliding_window_with_overlap() {
        let chunker = EventChunker::new(ChunkerConfig {
            max_events_per_chunk: 3,
            overlap_events: 2,
            ..ChunkerConfig::default()
        });
        let events: Vec<ScoredEvent> = (0..10).map(|i| scored(&format!("e{i}"), 50)).collect();
        let chunks = chunker.chunk_events("s", &events);

        // Window capacity 3 with a 2-event seed advances one event per
        // chunk: 8 full windows cover the 10-event stream.
        assert_eq!(chunks.len(), 8);
        for chunk in &chunks {
            assert_eq!(chunk.events.len(), 3);
        }
        for pair in chunks.windows(2) {
            let prev = contents(&pair[0]);
            let next = contents(&pair[1]);
            // Consecutive chunks share exactly the two tail events.
            assert_eq!(&prev[1..], &next[..2]);
        }
        assert_eq!(contents(&chunks[0]), vec!["e0", "e1", "e2"]);
        assert_eq!(contents(&chunks[7]), vec!["e7", "e8", "e9"]);
    }

    #[test]
    fn test_token_budget_closes_window() {
        let chunker = EventChunker::new(ChunkerConfig {
            max_tokens_per_chunk: 10,
            overlap_events: 0,
            ..ChunkerConfig::default()
        });
        // 6 tokens each: two fit (12 > 10 fails, so actually one per chunk)
        let events = vec![
            scored(&"a".repeat(24), 50),
            scored(&"b".repeat(24), 50),
            scored(&"c".repeat(8), 50),
        ];
        let chunks = chunker.chunk_events("s", &events);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].events.len(), 1);
        // 6 + 2 = 8 ≤ 10 so the second window holds two events
        assert_eq!(chunks[1].events.len(), 2);
        assert!(chunks[1].token_estimate <= 10);
    }

    #[test]
    fn test_oversized_event_sits_alone() {
        let chunker = EventChunker::new(ChunkerConfig {
            max_tokens_per_chunk: 10,
            overlap_events: 2,
            ..ChunkerConfig::default()
        });
        let events = vec![
            scored("small", 50),
            scored(&"x".repeat(400), 50), // 100 tokens, alone over budget
            scored("after", 50),
        ];
        let chunks = chunker.chunk_events("s", &events);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].events.len(), 1);
        assert!(chunks[1].token_estimate > 10);
        assert_eq!(contents(&chunks[2]), vec!["after"]);
    }

    #[test]
    fn test_empty_and_all_filtered() {
        let chunker = EventChunker::default();
        assert!(chunker.chunk_events("s", &[]).is_empty());
        assert!(
            chunker
                .chunk_events("s", &[scored("noise", 5), scored("noise", 0)])
                .is_empty()
        );
    }

    #[test]
    fn test_chunk_derivations() {
        let chunker = EventChunker::default();
        let events = vec![scored(&"a".repeat(8), 40), scored(&"b".repeat(9), 60)];
        let chunks = chunker.chunk_events("sess", &events);
        assert_eq!(chunks.len(), 1);
        let chunk = &chunks[0];
        // ⌈8/4⌉ + ⌈9/4⌉
        assert_eq!(chunk.token_estimate, 5);
        assert!((chunk.importance_avg - 50.0).abs() < f64::EPSILON);
        assert_eq!(chunk.session_id, "sess");
    }

    proptest! {
        #[test]
        fn prop_chunk_invariants(
            lens in proptest::collection::vec(1usize..200, 0..60),
            max_events in 1usize..8,
            overlap in 0usize..4,
        ) {
            let config = ChunkerConfig {
                min_importance_threshold: 0,
                max_events_per_chunk: max_events,
                max_tokens_per_chunk: 50,
                overlap_events: overlap,
            };
            let chunker = EventChunker::new(config);
            let events: Vec<ScoredEvent> = lens
                .iter()
                .enumerate()
                .map(|(i, len)| scored(&format!("{i:03}{}", "x".repeat(*len)), 50))
                .collect();

            let chunks = chunker.chunk_events("s", &events);

            for chunk in &chunks {
                prop_assert!(!chunk.events.is_empty());
                prop_assert!(chunk.events.len() <= max_events);
                prop_assert!(chunk.start_index <= chunk.end_index);
                let expected: usize = chunk
                    .events
                    .iter()
                    .map(|e| estimate_tokens(&e.content))
                    .sum();
                prop_assert_eq!(chunk.token_estimate, expected);
                // Budget respected unless a single event alone exceeds it
                if chunk.events.len() > 1 {
                    prop_assert!(chunk.token_estimate <= 50);
                }
            }

            // Concatenating chunks modulo overlap reproduces the stream.
            // Contents are unique (index-prefixed), so overlap dedup is a
            // plain membership check.
            let mut reconstructed: Vec<String> = Vec::new();
            for chunk in &chunks {
                for event in &chunk.events {
                    if !reconstructed.contains(&event.content) {
                        reconstructed.push(event.content.clone());
                    }
                }
            }
            let originals: Vec<String> = events.iter().map(|e| e.event.content.clone()).collect();
            prop_assert_eq!(reconstructed, originals);
        }
    }
}
