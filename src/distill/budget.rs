//! Token-budget distiller with hybrid ranking.
//!
//! Filters low-consensus chunks, ranks the survivors, greedily fills the
//! token budget, and emits the selection in narrative order.

use std::str::FromStr;

use crate::core::{DistilledSession, DroppedChunks};
use crate::distill::ChunkEntry;

/// Default distillation token budget.
pub const DEFAULT_MAX_TOKENS: usize = 80_000;
/// Default minimum consensus for a chunk to be considered.
pub const DEFAULT_MIN_CONSENSUS: f64 = 5.0;
/// Default hybrid weight on consensus.
pub const DEFAULT_CONSENSUS_WEIGHT: f64 = 0.7;
/// Default hybrid weight on recency.
pub const DEFAULT_RECENCY_WEIGHT: f64 = 0.3;

/// Ranking strategy for chunk selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    /// Raw consensus, best first.
    Consensus,
    /// Most recent (highest `start_index`) first.
    Chronological,
    /// Weighted blend of normalized consensus and recency.
    #[default]
    Hybrid,
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "consensus" => Ok(Self::Consensus),
            "chronological" => Ok(Self::Chronological),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown sort mode: {other}")),
        }
    }
}

/// Distiller configuration.
#[derive(Debug, Clone)]
pub struct DistillerConfig {
    /// Token budget for the whole selection.
    pub max_tokens: usize,
    /// Chunks below this consensus are dropped up front.
    pub min_consensus_score: f64,
    /// Ranking strategy.
    pub sort_by: SortMode,
    /// Hybrid weight on normalized consensus.
    pub hybrid_consensus_weight: f64,
    /// Hybrid weight on normalized recency.
    pub hybrid_recency_weight: f64,
}

impl Default for DistillerConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            min_consensus_score: DEFAULT_MIN_CONSENSUS,
            sort_by: SortMode::default(),
            hybrid_consensus_weight: DEFAULT_CONSENSUS_WEIGHT,
            hybrid_recency_weight: DEFAULT_RECENCY_WEIGHT,
        }
    }
}

/// Distills assessed chunks into a budget-bounded, narrative-ordered
/// session.
///
/// Entries failing the consensus floor count as dropped-by-consensus;
/// ranked entries that no longer fit the budget count as
/// dropped-by-budget. The selection is re-sorted by `start_index`
/// ascending before emission, whatever the ranking said.
#[must_use]
pub fn distill(entries: Vec<ChunkEntry>, cfg: &DistillerConfig) -> DistilledSession {
    let mut dropped = DroppedChunks::default();

    let survivors: Vec<ChunkEntry> = entries
        .into_iter()
        .filter(|entry| {
            if entry.consensus < cfg.min_consensus_score {
                dropped.by_consensus += 1;
                false
            } else {
                true
            }
        })
        .collect();

    let ranked = rank(survivors, cfg);

    let mut selected: Vec<ChunkEntry> = Vec::new();
    let mut running = 0usize;
    for entry in ranked {
        if running + entry.chunk.token_estimate <= cfg.max_tokens {
            running += entry.chunk.token_estimate;
            selected.push(entry);
        } else {
            dropped.by_budget += 1;
        }
    }

    selected.sort_by_key(|entry| entry.chunk.start_index);

    DistilledSession::new(
        selected.into_iter().map(|entry| entry.chunk).collect(),
        dropped,
    )
}

fn rank(entries: Vec<ChunkEntry>, cfg: &DistillerConfig) -> Vec<ChunkEntry> {
    let mut indexed: Vec<(usize, ChunkEntry)> = entries.into_iter().enumerate().collect();

    match cfg.sort_by {
        SortMode::Consensus => {
            indexed.sort_by(|(ia, a), (ib, b)| {
                b.consensus
                    .partial_cmp(&a.consensus)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| ia.cmp(ib))
            });
        }
        SortMode::Chronological => {
            indexed.sort_by(|(ia, a), (ib, b)| {
                b.chunk
                    .start_index
                    .cmp(&a.chunk.start_index)
                    .then_with(|| ia.cmp(ib))
            });
        }
        SortMode::Hybrid => {
            let scores = hybrid_scores(&indexed, cfg);
            indexed.sort_by(|(ia, _), (ib, _)| {
                scores[*ia]
                    .partial_cmp(&scores[*ib])
                    .map(std::cmp::Ordering::reverse)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| ia.cmp(ib))
            });
        }
    }

    indexed.into_iter().map(|(_, entry)| entry).collect()
}

/// Min-max normalizes consensus and chronological index over the current
/// population; a degenerate population (min = max) normalizes to 0.
#[allow(clippy::cast_precision_loss)]
fn hybrid_scores(indexed: &[(usize, ChunkEntry)], cfg: &DistillerConfig) -> Vec<f64> {
    let consensuses: Vec<f64> = indexed.iter().map(|(_, e)| e.consensus).collect();
    let positions: Vec<f64> = indexed
        .iter()
        .map(|(_, e)| e.chunk.start_index as f64)
        .collect();

    let norm = |values: &[f64]| -> Vec<f64> {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if (max - min).abs() < f64::EPSILON {
            return vec![0.0; values.len()];
        }
        values.iter().map(|v| (v - min) / (max - min)).collect()
    };

    let norm_consensus = norm(&consensuses);
    let norm_recency = norm(&positions);

    let mut scores = vec![0.0; indexed.len()];
    for (slot, (original, _)) in indexed.iter().enumerate() {
        scores[*original] = cfg.hybrid_consensus_weight * norm_consensus[slot]
            + cfg.hybrid_recency_weight * norm_recency[slot];
    }
    scores
}
