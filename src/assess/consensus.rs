//! Consensus aggregation over provider assessments.
//!
//! A chunk's consensus is the weighted mean of its provider scores after
//! an optional two-sigma outlier trim, gated by a minimum quorum.

use std::collections::HashMap;

use crate::assess::{Assessment, ProviderKind};

/// Default quorum: fewer assessments than this yield a zero consensus.
pub const DEFAULT_MIN_ASSESSMENTS: usize = 2;

/// Consensus configuration.
#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    /// Minimum assessments required for a non-zero consensus.
    pub min_assessments: usize,
    /// Trim scores farther than two standard deviations from the mean.
    pub discard_outliers: bool,
    /// Per-provider weights; absent providers weigh 1.0.
    pub weights: HashMap<ProviderKind, f64>,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            min_assessments: DEFAULT_MIN_ASSESSMENTS,
            discard_outliers: true,
            weights: HashMap::new(),
        }
    }
}

impl ConsensusConfig {
    fn weight(&self, provider: ProviderKind) -> f64 {
        self.weights.get(&provider).copied().unwrap_or(1.0)
    }
}

/// Computes the consensus score in `[0, 10]` for a chunk's assessments.
///
/// Returns 0.0 below quorum or when total weight is zero. With outlier
/// trimming enabled and at least three assessments, scores farther than
/// `2σ` (population deviation) from the mean are dropped unless doing so
/// would break the quorum. The result is rounded to two decimals and is
/// commutative over assessment order.
#[must_use]
pub fn compute_consensus(assessments: &[Assessment], cfg: &ConsensusConfig) -> f64 {
    if assessments.len() < cfg.min_assessments {
        return 0.0;
    }

    let scores: Vec<f64> = assessments.iter().map(|a| f64::from(a.score)).collect();

    let surviving: Vec<&Assessment> = if cfg.discard_outliers && assessments.len() >= 3 {
        let mean = mean(&scores);
        let sigma = population_std_dev(&scores, mean);
        let trimmed: Vec<&Assessment> = assessments
            .iter()
            .filter(|a| (f64::from(a.score) - mean).abs() <= 2.0 * sigma)
            .collect();
        if trimmed.len() < cfg.min_assessments {
            assessments.iter().collect()
        } else {
            trimmed
        }
    } else {
        assessments.iter().collect()
    };

    let total_weight: f64 = surviving.iter().map(|a| cfg.weight(a.provider)).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }

    let weighted_sum: f64 = surviving
        .iter()
        .map(|a| f64::from(a.score) * cfg.weight(a.provider))
        .sum();

    round2(weighted_sum / total_weight)
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[allow(clippy::cast_precision_loss)]
fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assessment(provider: ProviderKind, score: u8) -> Assessment {
        Assessment {
            id: uuid::Uuid::new_v4().to_string(),
            chunk_id: "c".to_string(),
            provider,
            score,
            rationale: String::new(),
            model: None,
            tokens_used: None,
            latency_ms: 0,
            created_at: chrono::Utc::now(),
        }
    }

    fn set(scores: &[(ProviderKind, u8)]) -> Vec<Assessment> {
        scores.iter().map(|&(p, s)| assessment(p, s)).collect()
    }

    #[test]
    fn test_below_quorum_is_zero() {
        let cfg = ConsensusConfig::default();
        assert_eq!(compute_consensus(&[], &cfg), 0.0);
        assert_eq!(
            compute_consensus(&set(&[(ProviderKind::Claude, 9)]), &cfg),
            0.0
        );
    }

    #[test]
    fn test_equal_weight_mean() {
        let cfg = ConsensusConfig::default();
        let assessments = set(&[
            (ProviderKind::Codex, 5),
            (ProviderKind::Claude, 7),
            (ProviderKind::Gemini, 9),
        ]);
        // σ ≈ 1.63 so 2σ ≈ 3.27: nothing trims, plain mean
        assert!((compute_consensus(&assessments, &cfg) - 7.00).abs() < f64::EPSILON);
    }

    #[test]
    fn test_low_outlier_survives_two_sigma_at_n3() {
        let cfg = ConsensusConfig::default();
        let assessments = set(&[
            (ProviderKind::Codex, 5),
            (ProviderKind::Claude, 7),
            (ProviderKind::Gemini, 2),
        ]);
        // mean 4.67, σ ≈ 2.05: max distance 2.33 ≤ 2σ, no trim
        assert!((compute_consensus(&assessments, &cfg) - 4.67).abs() < f64::EPSILON);
    }

    #[test]
    fn test_extreme_outlier_trimmed() {
        let cfg = ConsensusConfig::default();
        let assessments = set(&[
            (ProviderKind::Codex, 7),
            (ProviderKind::Claude, 7),
            (ProviderKind::Gemini, 7),
            (ProviderKind::Claude, 7),
            (ProviderKind::Codex, 7),
            (ProviderKind::Gemini, 1),
        ]);
        // With five 7s and one 1, the 1 sits beyond 2σ and is dropped.
        assert!((compute_consensus(&assessments, &cfg) - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_trim_skipped_when_quorum_would_break() {
        let cfg = ConsensusConfig {
            min_assessments: 6,
            ..ConsensusConfig::default()
        };
        // The 1 sits beyond 2σ, but trimming it would leave five
        // assessments against a quorum of six, so everything stays.
        let assessments = set(&[
            (ProviderKind::Codex, 7),
            (ProviderKind::Claude, 7),
            (ProviderKind::Gemini, 7),
            (ProviderKind::Claude, 7),
            (ProviderKind::Codex, 7),
            (ProviderKind::Gemini, 1),
        ]);
        let result = compute_consensus(&assessments, &cfg);
        assert!((result - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_provider_weights() {
        let mut weights = HashMap::new();
        weights.insert(ProviderKind::Claude, 2.0);
        weights.insert(ProviderKind::Codex, 1.0);
        let cfg = ConsensusConfig {
            discard_outliers: false,
            weights,
            ..ConsensusConfig::default()
        };
        let assessments = set(&[(ProviderKind::Claude, 9), (ProviderKind::Codex, 3)]);
        // (9·2 + 3·1) / 3 = 7
        assert!((compute_consensus(&assessments, &cfg) - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_total_weight() {
        let mut weights = HashMap::new();
        weights.insert(ProviderKind::Claude, 0.0);
        weights.insert(ProviderKind::Codex, 0.0);
        let cfg = ConsensusConfig {
            weights,
            ..ConsensusConfig::default()
        };
        let assessments = set(&[(ProviderKind::Claude, 9), (ProviderKind::Codex, 3)]);
        assert_eq!(compute_consensus(&assessments, &cfg), 0.0);
    }

    #[test]
    fn test_commutative_over_order() {
        let cfg = ConsensusConfig::default();
        let mut assessments = set(&[
            (ProviderKind::Codex, 5),
            (ProviderKind::Claude, 7),
            (ProviderKind::Gemini, 9),
        ]);
        let forward = compute_consensus(&assessments, &cfg);
        assessments.reverse();
        assert!((compute_consensus(&assessments, &cfg) - forward).abs() < f64::EPSILON);
    }

    #[test]
    fn test_adding_mean_valued_assessment_keeps_mean() {
        let cfg = ConsensusConfig {
            discard_outliers: false,
            ..ConsensusConfig::default()
        };
        let mut assessments = set(&[(ProviderKind::Codex, 5), (ProviderKind::Claude, 9)]);
        let before = compute_consensus(&assessments, &cfg);
        assessments.push(assessment(ProviderKind::Gemini, 7));
        assert!((compute_consensus(&assessments, &cfg) - before).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rounded_to_two_decimals() {
        let cfg = ConsensusConfig {
            discard_outliers: false,
            ..ConsensusConfig::default()
        };
        let assessments = set(&[
            (ProviderKind::Codex, 4),
            (ProviderKind::Claude, 5),
            (ProviderKind::Gemini, 5),
        ]);
        // 14/3 = 4.666... → 4.67
        assert!((compute_consensus(&assessments, &cfg) - 4.67).abs() < f64::EPSILON);
    }
}
