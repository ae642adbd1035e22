//! Pipeline configuration with builder pattern and environment support.
//!
//! Configuration resolves in order: explicit values → `UNIFIED_AGENT_*`
//! environment variables → defaults.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::assess::assessor::{AssessConfig, DEFAULT_MAX_CONCURRENT, DEFAULT_TIMEOUT_MS};
use crate::assess::consensus::ConsensusConfig;
use crate::assess::ProviderKind;
use crate::distill::budget::{
    DEFAULT_MAX_TOKENS, DEFAULT_MIN_CONSENSUS, DistillerConfig, SortMode,
};
use crate::distill::question::{
    DEFAULT_MEMORY_MAX, DEFAULT_QUESTION_WEIGHT, DEFAULT_STATIC_WEIGHT, QuestionConfig,
};
use crate::error::{Error, Result};

/// Default background sync interval for the memory queue.
const DEFAULT_SYNC_INTERVAL_MS: u64 = 60_000;

/// Resolved pipeline configuration.
#[derive(Debug, Clone)]
pub struct DistillConfig {
    /// Data directory (default `~/.unified-agent`).
    pub data_dir: PathBuf,
    /// Master switch for the distillation subsystem.
    pub enabled: bool,
    /// Start the session watcher alongside long-running commands.
    pub watch: bool,
    /// Providers used for assessment.
    pub providers: Vec<ProviderKind>,
    /// Token budget for distilled output.
    pub token_budget: usize,
    /// Minimum consensus for a chunk to be selected.
    pub min_consensus: f64,
    /// Per-provider assessment timeout.
    pub assessment_timeout_ms: u64,
    /// Chunks assessed concurrently.
    pub max_concurrent: usize,
    /// Background memory-sync interval.
    pub sync_interval_ms: u64,
    /// Distiller ranking mode.
    pub sort_mode: SortMode,
    /// Question weight in the question-path blend.
    pub query_weight: f64,
    /// Consensus weight in the question-path blend.
    pub static_weight: f64,
    /// Maximum memory-store candidates per question.
    pub claudemem_max: usize,
    /// Run the question-aware re-rank.
    pub rerank: bool,
}

impl Default for DistillConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            data_dir: home.join(".unified-agent"),
            enabled: true,
            watch: false,
            providers: ProviderKind::ALL.to_vec(),
            token_budget: DEFAULT_MAX_TOKENS,
            min_consensus: DEFAULT_MIN_CONSENSUS,
            assessment_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            sync_interval_ms: DEFAULT_SYNC_INTERVAL_MS,
            sort_mode: SortMode::default(),
            query_weight: DEFAULT_QUESTION_WEIGHT,
            static_weight: DEFAULT_STATIC_WEIGHT,
            claudemem_max: DEFAULT_MEMORY_MAX,
            rerank: true,
        }
    }
}

impl DistillConfig {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> DistillConfigBuilder {
        DistillConfigBuilder::default()
    }

    /// Resolves configuration from environment variables over defaults.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unparseable variable values.
    pub fn from_env() -> Result<Self> {
        Self::builder().from_env()?.build()
    }

    /// Database path under the data directory.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("distill.db")
    }

    /// Session journal directory.
    #[must_use]
    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }

    /// Distilled artifact directory.
    #[must_use]
    pub fn distilled_dir(&self) -> PathBuf {
        self.data_dir.join("distilled")
    }

    /// Assessment fan-out settings derived from this configuration.
    #[must_use]
    pub fn assess_config(&self) -> AssessConfig {
        AssessConfig {
            providers: self.providers.clone(),
            timeout_ms: self.assessment_timeout_ms,
            retry_on_failure: true,
            max_concurrent: self.max_concurrent,
        }
    }

    /// Consensus settings derived from this configuration.
    #[must_use]
    pub fn consensus_config(&self) -> ConsensusConfig {
        ConsensusConfig {
            weights: HashMap::new(),
            ..ConsensusConfig::default()
        }
    }

    /// Batch distiller settings derived from this configuration.
    #[must_use]
    pub fn distiller_config(&self) -> DistillerConfig {
        DistillerConfig {
            max_tokens: self.token_budget,
            min_consensus_score: self.min_consensus,
            sort_by: self.sort_mode,
            ..DistillerConfig::default()
        }
    }

    /// Question-path settings derived from this configuration.
    #[must_use]
    pub fn question_config(&self) -> QuestionConfig {
        QuestionConfig {
            max_tokens: self.token_budget,
            question_weight: self.query_weight,
            static_weight: self.static_weight,
            rerank: self.rerank,
            memory_max: self.claudemem_max,
            assess: self.assess_config(),
            ..QuestionConfig::default()
        }
    }
}

/// Builder for [`DistillConfig`].
#[derive(Debug, Clone, Default)]
pub struct DistillConfigBuilder {
    data_dir: Option<PathBuf>,
    enabled: Option<bool>,
    watch: Option<bool>,
    providers: Option<Vec<ProviderKind>>,
    token_budget: Option<usize>,
    min_consensus: Option<f64>,
    assessment_timeout_ms: Option<u64>,
    max_concurrent: Option<usize>,
    sync_interval_ms: Option<u64>,
    sort_mode: Option<SortMode>,
    query_weight: Option<f64>,
    static_weight: Option<f64>,
    claudemem_max: Option<usize>,
    rerank: Option<bool>,
}

impl DistillConfigBuilder {
    /// Populates unset fields from `UNIFIED_AGENT_*` environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for values that fail to parse.
    pub fn from_env(mut self) -> Result<Self> {
        fn parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
            match std::env::var(name) {
                Ok(raw) => raw.parse().map(Some).map_err(|_| Error::Config {
                    message: format!("invalid value for {name}: {raw}"),
                }),
                Err(_) => Ok(None),
            }
        }

        fn flag(name: &str) -> Option<bool> {
            std::env::var(name)
                .ok()
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "on" | "yes"))
        }

        if self.data_dir.is_none() {
            self.data_dir = std::env::var("UNIFIED_AGENT_DATA_DIR").ok().map(PathBuf::from);
        }
        if self.enabled.is_none() {
            self.enabled = flag("UNIFIED_AGENT_DISTILL_ENABLED");
        }
        if self.watch.is_none() {
            self.watch = flag("UNIFIED_AGENT_DISTILL_WATCH");
        }
        if self.providers.is_none()
            && let Ok(raw) = std::env::var("UNIFIED_AGENT_DISTILL_PROVIDERS")
        {
            let providers = raw
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(str::parse)
                .collect::<std::result::Result<Vec<ProviderKind>, _>>()
                .map_err(|e| Error::Config { message: e })?;
            self.providers = Some(providers);
        }
        if self.token_budget.is_none() {
            self.token_budget = parsed("UNIFIED_AGENT_DISTILL_TOKEN_BUDGET")?;
        }
        if self.min_consensus.is_none() {
            self.min_consensus = parsed("UNIFIED_AGENT_DISTILL_MIN_CONSENSUS")?;
        }
        if self.assessment_timeout_ms.is_none() {
            self.assessment_timeout_ms = parsed("UNIFIED_AGENT_DISTILL_ASSESSMENT_TIMEOUT_MS")?;
        }
        if self.max_concurrent.is_none() {
            self.max_concurrent = parsed("UNIFIED_AGENT_DISTILL_MAX_CONCURRENT")?;
        }
        if self.sync_interval_ms.is_none() {
            self.sync_interval_ms = parsed("UNIFIED_AGENT_DISTILL_SYNC_INTERVAL_MS")?;
        }
        if self.sort_mode.is_none()
            && let Ok(raw) = std::env::var("UNIFIED_AGENT_DISTILL_SORT_MODE")
        {
            self.sort_mode =
                Some(raw.parse().map_err(|e| Error::Config { message: e })?);
        }
        if self.query_weight.is_none() {
            self.query_weight = parsed("UNIFIED_AGENT_DISTILL_QUERY_WEIGHT")?;
        }
        if self.static_weight.is_none() {
            self.static_weight = parsed("UNIFIED_AGENT_DISTILL_STATIC_WEIGHT")?;
        }
        if self.claudemem_max.is_none() {
            self.claudemem_max = parsed("UNIFIED_AGENT_DISTILL_CLAUDEMEM_MAX")?;
        }
        if self.rerank.is_none() {
            self.rerank = flag("UNIFIED_AGENT_DISTILL_RERANK");
        }

        Ok(self)
    }

    /// Sets the data directory.
    #[must_use]
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Sets the provider list.
    #[must_use]
    pub fn providers(mut self, providers: Vec<ProviderKind>) -> Self {
        self.providers = Some(providers);
        self
    }

    /// Sets the token budget.
    #[must_use]
    pub const fn token_budget(mut self, budget: usize) -> Self {
        self.token_budget = Some(budget);
        self
    }

    /// Sets the minimum consensus.
    #[must_use]
    pub const fn min_consensus(mut self, min: f64) -> Self {
        self.min_consensus = Some(min);
        self
    }

    /// Sets the sort mode.
    #[must_use]
    pub const fn sort_mode(mut self, mode: SortMode) -> Self {
        self.sort_mode = Some(mode);
        self
    }

    /// Sets the re-rank toggle.
    #[must_use]
    pub const fn rerank(mut self, rerank: bool) -> Self {
        self.rerank = Some(rerank);
        self
    }

    /// Finalizes the configuration, filling defaults.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when weights are negative.
    pub fn build(self) -> Result<DistillConfig> {
        let defaults = DistillConfig::default();
        let config = DistillConfig {
            data_dir: self.data_dir.unwrap_or(defaults.data_dir),
            enabled: self.enabled.unwrap_or(defaults.enabled),
            watch: self.watch.unwrap_or(defaults.watch),
            providers: self.providers.unwrap_or(defaults.providers),
            token_budget: self.token_budget.unwrap_or(defaults.token_budget),
            min_consensus: self.min_consensus.unwrap_or(defaults.min_consensus),
            assessment_timeout_ms: self
                .assessment_timeout_ms
                .unwrap_or(defaults.assessment_timeout_ms),
            max_concurrent: self.max_concurrent.unwrap_or(defaults.max_concurrent),
            sync_interval_ms: self.sync_interval_ms.unwrap_or(defaults.sync_interval_ms),
            sort_mode: self.sort_mode.unwrap_or(defaults.sort_mode),
            query_weight: self.query_weight.unwrap_or(defaults.query_weight),
            static_weight: self.static_weight.unwrap_or(defaults.static_weight),
            claudemem_max: self.claudemem_max.unwrap_or(defaults.claudemem_max),
            rerank: self.rerank.unwrap_or(defaults.rerank),
        };

        if config.query_weight < 0.0 || config.static_weight < 0.0 {
            return Err(Error::Config {
                message: "scoring weights must be non-negative".to_string(),
            });
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DistillConfig::default();
        assert!(config.enabled);
        assert_eq!(config.token_budget, 80_000);
        assert!((config.min_consensus - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.providers.len(), 3);
        assert_eq!(config.sort_mode, SortMode::Hybrid);
        assert!(config.data_dir.ends_with(".unified-agent"));
    }

    #[test]
    fn test_builder_overrides() {
        let config = DistillConfig::builder()
            .data_dir("/tmp/ua")
            .token_budget(1000)
            .min_consensus(7.5)
            .sort_mode(SortMode::Consensus)
            .providers(vec![ProviderKind::Codex])
            .rerank(false)
            .build()
            .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/ua"));
        assert_eq!(config.token_budget, 1000);
        assert_eq!(config.providers, vec![ProviderKind::Codex]);
        assert!(!config.rerank);

        assert_eq!(config.db_path(), PathBuf::from("/tmp/ua/distill.db"));
        assert_eq!(config.distilled_dir(), PathBuf::from("/tmp/ua/distilled"));
    }

    #[test]
    fn test_negative_weights_rejected() {
        let mut builder = DistillConfig::builder();
        builder.query_weight = Some(-0.5);
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_derived_configs() {
        let config = DistillConfig::builder()
            .token_budget(500)
            .providers(vec![ProviderKind::Gemini])
            .build()
            .unwrap();

        let assess = config.assess_config();
        assert_eq!(assess.providers, vec![ProviderKind::Gemini]);
        assert!(assess.retry_on_failure);

        let distiller = config.distiller_config();
        assert_eq!(distiller.max_tokens, 500);

        let question = config.question_config();
        assert_eq!(question.max_tokens, 500);
        assert!((question.question_weight - 0.6).abs() < f64::EPSILON);
    }
}
