//! Session-level domain types: scan results and distilled outputs.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::chunk::Chunk;
use crate::core::event::Platform;

/// A session file discovered on disk, keyed uniquely by `file_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedSession {
    /// Platform that owns the file.
    pub platform: Platform,
    /// Absolute path to the session file.
    pub file_path: PathBuf,
    /// Size in bytes at scan time.
    pub file_size: u64,
    /// Last modification time.
    pub modified_at: DateTime<Utc>,
    /// Session id derived from the file name, when derivable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Chunks dropped during distillation, by cause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedChunks {
    /// Filtered out for consensus below the configured minimum.
    pub by_consensus: usize,
    /// Ranked in but rejected by the token budget.
    pub by_budget: usize,
}

impl DroppedChunks {
    /// Total dropped count.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.by_consensus + self.by_budget
    }
}

/// A selected, chronologically ordered chunk set within a token budget.
///
/// Chunks are stored in narrative order (ascending `start_index`) even
/// though they were selected by score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistilledSession {
    /// Sessions the selected chunks were drawn from.
    pub source_session_ids: BTreeSet<String>,
    /// Platforms the selected chunks were drawn from.
    pub source_platforms: BTreeSet<Platform>,
    /// Selected chunks in narrative order.
    pub chunks: Vec<Chunk>,
    /// Sum of selected chunk token estimates; never exceeds the budget.
    pub total_tokens: usize,
    /// Counts of chunks rejected along the way.
    pub dropped_chunks: DroppedChunks,
    /// Build time.
    pub distilled_at: DateTime<Utc>,
}

impl DistilledSession {
    /// Builds a distilled session over pre-ordered chunks, collecting
    /// source ids and platforms from the chunks themselves.
    #[must_use]
    pub fn new(chunks: Vec<Chunk>, dropped_chunks: DroppedChunks) -> Self {
        let source_session_ids = chunks.iter().map(|c| c.session_id.clone()).collect();
        let source_platforms = chunks
            .iter()
            .filter_map(|c| {
                c.events.iter().find_map(|e| {
                    e.metadata
                        .get("sourcePlatform")
                        .and_then(|v| v.as_str())
                        .and_then(|s| s.parse().ok())
                })
            })
            .collect();
        let total_tokens = chunks.iter().map(|c| c.token_estimate).sum();

        Self {
            source_session_ids,
            source_platforms,
            chunks,
            total_tokens,
            dropped_chunks,
            distilled_at: Utc::now(),
        }
    }
}

/// Statistics for the question-driven search path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStats {
    /// Candidates returned by the full-text index.
    pub fts_matches: usize,
    /// Candidates returned by the semantic-memory store.
    pub memory_matches: usize,
    /// Distinct candidates after merge and dedup.
    pub total_candidates: usize,
    /// Candidates that received a question-aware rating.
    pub after_re_rank: usize,
}

/// Result of a question-driven distillation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDistillResult {
    /// The distilled selection.
    #[serde(flatten)]
    pub session: DistilledSession,
    /// The user question that drove the search.
    pub question: String,
    /// Search-path statistics.
    pub search_stats: SearchStats,
}
