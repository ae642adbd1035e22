//! Question-driven distillation over FTS and the semantic-memory store.
//!
//! The question fans out to both search surfaces in parallel, candidates
//! merge by content hash, an optional question-aware provider re-rank
//! scores them, and the weighted blend feeds the usual budget selection.

use std::collections::HashMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::assess::assessor::{AssessConfig, Assessor};
use crate::assess::rating::RatingSchema;
use crate::assess::build_question_prompt;
use crate::core::{Chunk, DistilledSession, DroppedChunks, QueryDistillResult, SearchStats};
use crate::memory::DefensiveMemory;
use crate::storage::DistillStore;

/// Default question weight in the final blend.
pub const DEFAULT_QUESTION_WEIGHT: f64 = 0.6;
/// Default consensus weight in the final blend.
pub const DEFAULT_STATIC_WEIGHT: f64 = 0.4;
/// Default cap on memory-store candidates.
pub const DEFAULT_MEMORY_MAX: usize = 20;
/// Default cap on FTS candidates.
pub const DEFAULT_FTS_LIMIT: usize = 20;
/// Candidates re-ranked per batch.
const RERANK_BATCH: usize = 3;

/// Question-path configuration.
#[derive(Debug, Clone)]
pub struct QuestionConfig {
    /// Token budget for the selection.
    pub max_tokens: usize,
    /// Weight on the question-aware provider score.
    pub question_weight: f64,
    /// Weight on the stored consensus score.
    pub static_weight: f64,
    /// Run the question-aware provider re-rank.
    pub rerank: bool,
    /// Maximum memory-store candidates.
    pub memory_max: usize,
    /// Maximum FTS candidates.
    pub fts_limit: usize,
    /// Provider fan-out settings for the re-rank.
    pub assess: AssessConfig,
}

impl Default for QuestionConfig {
    fn default() -> Self {
        Self {
            max_tokens: super::budget::DEFAULT_MAX_TOKENS,
            question_weight: DEFAULT_QUESTION_WEIGHT,
            static_weight: DEFAULT_STATIC_WEIGHT,
            rerank: true,
            memory_max: DEFAULT_MEMORY_MAX,
            fts_limit: DEFAULT_FTS_LIMIT,
            assess: AssessConfig::default(),
        }
    }
}

/// A merged search candidate.
#[derive(Debug, Clone)]
struct Candidate {
    chunk: Chunk,
    existing_consensus: f64,
    question_score: f64,
}

/// Distiller for the question path.
pub struct QuestionDistiller {
    store: Arc<DistillStore>,
    memory: Arc<DefensiveMemory>,
    assessor: Assessor,
}

impl QuestionDistiller {
    /// Builds the distiller over its three collaborators.
    #[must_use]
    pub fn new(store: Arc<DistillStore>, memory: Arc<DefensiveMemory>, assessor: Assessor) -> Self {
        Self {
            store,
            memory,
            assessor,
        }
    }

    /// Runs the full question pipeline.
    ///
    /// Either search surface failing (or returning nothing) degrades that
    /// side to empty without blocking the other; re-rank failures leave
    /// candidates at a zero question score but still eligible through
    /// their stored consensus.
    pub async fn distill(&self, question: &str, cfg: &QuestionConfig) -> QueryDistillResult {
        let fts_query = fts_or_query(question);

        let (fts_hits, memory_hits) = tokio::join!(
            async {
                self.store
                    .search_chunks(&fts_query, cfg.fts_limit)
                    .unwrap_or_default()
            },
            self.memory.search_as_chunks(question, cfg.memory_max),
        );

        let mut stats = SearchStats {
            fts_matches: fts_hits.len(),
            memory_matches: memory_hits.len(),
            ..SearchStats::default()
        };

        let mut candidates = merge_candidates(fts_hits, memory_hits);
        stats.total_candidates = candidates.len();

        if cfg.rerank {
            stats.after_re_rank = self.rerank(question, &mut candidates, cfg).await;
        }

        let session = select(candidates, cfg);

        QueryDistillResult {
            session,
            question: question.to_string(),
            search_stats: stats,
        }
    }

    /// Question-aware re-rank in batches of three candidates; all
    /// providers fan out in parallel per candidate. Returns how many
    /// candidates received at least one provider score.
    #[allow(clippy::cast_precision_loss)]
    async fn rerank(
        &self,
        question: &str,
        candidates: &mut [Candidate],
        cfg: &QuestionConfig,
    ) -> usize {
        let mut scored = 0usize;

        for batch in candidates.chunks_mut(RERANK_BATCH) {
            let tasks = batch.iter().map(|candidate| {
                let prompt = build_question_prompt(&candidate.chunk, question);
                let chunk_id = candidate.chunk.id.clone();
                let assessor = self.assessor.clone();
                let assess_cfg = cfg.assess.clone();
                async move {
                    assessor
                        .assess_with_prompt(
                            &chunk_id,
                            &prompt,
                            RatingSchema::QuestionAware,
                            &assess_cfg,
                        )
                        .await
                }
            });

            let results = futures_util::future::join_all(tasks).await;
            for (candidate, assessments) in batch.iter_mut().zip(results) {
                if assessments.is_empty() {
                    continue;
                }
                let total: u32 = assessments.iter().map(|a| u32::from(a.score)).sum();
                candidate.question_score = f64::from(total) / assessments.len() as f64;
                scored += 1;
            }
        }
        scored
    }
}

/// Tokenizes a question into an OR-joined FTS expression: punctuation
/// stripped, terms of length ≤ 2 dropped, each term quoted.
#[must_use]
pub fn fts_or_query(question: &str) -> String {
    let terms: Vec<String> = question
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| term.len() > 2)
        .map(|term| format!("\"{}\"", term.to_lowercase()))
        .collect();
    terms.join(" OR ")
}

/// SHA-256 over the first 500 characters of the primary content block.
fn content_hash(chunk: &Chunk) -> [u8; 32] {
    let content = chunk.primary_content();
    let prefix_end = content
        .char_indices()
        .nth(500)
        .map_or(content.len(), |(i, _)| i);
    let mut hasher = Sha256::new();
    hasher.update(&content.as_bytes()[..prefix_end]);
    hasher.finalize().into()
}

/// Merges both hit lists, deduping by content hash; a collision keeps the
/// candidate with the higher stored consensus.
fn merge_candidates(
    fts_hits: Vec<crate::storage::StoredChunk>,
    memory_hits: Vec<Chunk>,
) -> Vec<Candidate> {
    let mut by_hash: HashMap<[u8; 32], Candidate> = HashMap::new();
    let mut order: Vec<[u8; 32]> = Vec::new();

    let mut insert = |candidate: Candidate| {
        let hash = content_hash(&candidate.chunk);
        match by_hash.get_mut(&hash) {
            Some(existing) => {
                if candidate.existing_consensus > existing.existing_consensus {
                    *existing = candidate;
                }
            }
            None => {
                order.push(hash);
                by_hash.insert(hash, candidate);
            }
        }
    };

    for hit in fts_hits {
        insert(Candidate {
            existing_consensus: hit.consensus.unwrap_or(0.0),
            chunk: hit.chunk,
            question_score: 0.0,
        });
    }
    // Memory chunks carry no consensus; their rank-derived importance
    // stands in on the same [0, 10] scale.
    for chunk in memory_hits {
        insert(Candidate {
            existing_consensus: chunk.importance_avg / 10.0,
            chunk,
            question_score: 0.0,
        });
    }

    order
        .into_iter()
        .filter_map(|hash| by_hash.remove(&hash))
        .collect()
}

/// Weighted blend, greedy budget selection, chronological re-sort.
fn select(candidates: Vec<Candidate>, cfg: &QuestionConfig) -> DistilledSession {
    let mut ranked: Vec<(f64, Candidate)> = candidates
        .into_iter()
        .map(|candidate| {
            let norm_question = if candidate.question_score > 0.0 {
                (candidate.question_score - 1.0) / 9.0
            } else {
                0.0
            };
            let norm_consensus = candidate.existing_consensus / 10.0;
            let final_score =
                cfg.question_weight * norm_question + cfg.static_weight * norm_consensus;
            (final_score, candidate)
        })
        .collect();

    ranked.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let mut dropped = DroppedChunks::default();
    let mut selected: Vec<Chunk> = Vec::new();
    let mut running = 0usize;
    for (_, candidate) in ranked {
        if running + candidate.chunk.token_estimate <= cfg.max_tokens {
            running += candidate.chunk.token_estimate;
            selected.push(candidate.chunk);
        } else {
            dropped.by_budget += 1;
        }
    }

    selected.sort_by_key(|chunk| chunk.start_index);
    DistilledSession::new(selected, dropped)
}
