//! Provider fan-out: rates chunks by spawning provider CLIs in parallel.
//!
//! Each provider gets the assessment prompt as its final positional
//! argument and must print a rating JSON object. Providers run
//! concurrently per chunk; batches gate the number of chunks in flight,
//! not the number of providers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::sync::Semaphore;

use crate::assess::rating::{Rating, RatingSchema, parse_rating};
use crate::assess::runner::ProcessRunner;
use crate::assess::{Assessment, ProviderKind, build_generic_prompt};
use crate::core::Chunk;
use crate::error::AssessError;

/// Default per-provider timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Default number of chunks assessed concurrently.
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

/// Assessment fan-out configuration.
#[derive(Debug, Clone)]
pub struct AssessConfig {
    /// Providers to fan out to, in spawn order.
    pub providers: Vec<ProviderKind>,
    /// Per-provider deadline in milliseconds.
    pub timeout_ms: u64,
    /// Grant one retry per provider per chunk on failure.
    pub retry_on_failure: bool,
    /// Chunks in flight at once during batch assessment.
    pub max_concurrent: usize,
}

impl Default for AssessConfig {
    fn default() -> Self {
        Self {
            providers: ProviderKind::ALL.to_vec(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_on_failure: true,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

/// Callback invoked after each chunk completes: `(completed, total)`.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Multi-provider chunk assessor over an injected subprocess driver.
#[derive(Clone)]
pub struct Assessor {
    runner: Arc<dyn ProcessRunner>,
}

impl Assessor {
    /// Creates an assessor over the given subprocess driver.
    #[must_use]
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    /// Rates one chunk with every configured provider in parallel.
    ///
    /// Provider failures (spawn, timeout, non-zero exit, unparseable
    /// output) are dropped after the optional single retry; the result
    /// carries only successes and its order is not meaningful.
    pub async fn assess_chunk(&self, chunk: &Chunk, cfg: &AssessConfig) -> Vec<Assessment> {
        let prompt = build_generic_prompt(chunk);
        self.assess_with_prompt(&chunk.id, &prompt, RatingSchema::Generic, cfg)
            .await
    }

    /// Rates a chunk against an explicit prompt and schema.
    ///
    /// The question-driven distiller uses this entry point with the
    /// question-aware prompt variant.
    pub async fn assess_with_prompt(
        &self,
        chunk_id: &str,
        prompt: &str,
        schema: RatingSchema,
        cfg: &AssessConfig,
    ) -> Vec<Assessment> {
        let tasks = cfg
            .providers
            .iter()
            .map(|&provider| self.rate_provider(chunk_id, prompt, schema, provider, cfg));
        join_all(tasks).await.into_iter().flatten().collect()
    }

    /// Rates a batch of chunks with at most `max_concurrent` chunks in
    /// flight; providers within each chunk still fan out fully.
    ///
    /// `on_progress` fires exactly once per chunk completion, in
    /// completion order.
    pub async fn assess_chunks(
        &self,
        chunks: &[Chunk],
        cfg: &AssessConfig,
        on_progress: Option<ProgressCallback>,
    ) -> HashMap<String, Vec<Assessment>> {
        let total = chunks.len();
        let semaphore = Arc::new(Semaphore::new(cfg.max_concurrent.max(1)));
        let completed = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(total);
        for chunk in chunks.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let completed = Arc::clone(&completed);
            let assessor = self.clone();
            let cfg = cfg.clone();
            let on_progress = on_progress.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return None;
                };
                let assessments = assessor.assess_chunk(&chunk, &cfg).await;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(callback) = on_progress {
                    callback(done, total);
                }
                Some((chunk.id, assessments))
            }));
        }

        let mut results = HashMap::with_capacity(total);
        for handle in handles {
            match handle.await {
                Ok(Some((chunk_id, assessments))) => {
                    results.insert(chunk_id, assessments);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "assessment task join failed"),
            }
        }
        results
    }

    /// Per-(chunk, provider) state machine:
    /// `Pending → Running → (Succeeded | Failed)`, with one
    /// `Failed → Retrying` transition when retries are enabled.
    async fn rate_provider(
        &self,
        chunk_id: &str,
        prompt: &str,
        schema: RatingSchema,
        provider: ProviderKind,
        cfg: &AssessConfig,
    ) -> Option<Assessment> {
        let attempts = if cfg.retry_on_failure { 2 } else { 1 };
        let timeout = Duration::from_millis(cfg.timeout_ms);

        for attempt in 1..=attempts {
            let start = Instant::now();
            match self.attempt(provider, prompt, schema, timeout).await {
                Ok(rating) => {
                    let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                    return Some(Self::build_assessment(
                        chunk_id, provider, &rating, latency_ms,
                    ));
                }
                Err(error) => {
                    tracing::debug!(
                        provider = %provider,
                        chunk_id,
                        attempt,
                        %error,
                        "provider rating attempt failed"
                    );
                }
            }
        }
        None
    }

    async fn attempt(
        &self,
        provider: ProviderKind,
        prompt: &str,
        schema: RatingSchema,
        timeout: Duration,
    ) -> Result<Rating, AssessError> {
        let args = provider.argv(prompt);
        let output = self.runner.run(provider.program(), &args, timeout).await?;

        if !output.success() {
            return Err(AssessError::NonZeroExit {
                provider: provider.as_str().to_string(),
                status: output.status,
            });
        }

        parse_rating(&output.stdout, schema).ok_or_else(|| AssessError::UnparseableRating {
            provider: provider.as_str().to_string(),
        })
    }

    fn build_assessment(
        chunk_id: &str,
        provider: ProviderKind,
        rating: &Rating,
        latency_ms: u64,
    ) -> Assessment {
        Assessment {
            id: uuid::Uuid::new_v4().to_string(),
            chunk_id: chunk_id.to_string(),
            provider,
            score: rating.overall_score,
            rationale: rating.rationale.clone(),
            model: None,
            tokens_used: None,
            latency_ms,
            created_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fake subprocess driver shared by assessment tests.

    use super::*;
    use crate::assess::runner::ProcessOutput;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted runner: per-program queues of canned outcomes. Programs
    /// with no script answer with a valid generic rating of 7.
    #[derive(Default)]
    pub struct FakeRunner {
        scripts: Mutex<HashMap<String, VecDeque<Result<ProcessOutput, AssessError>>>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeRunner {
        pub fn ok(stdout: &str) -> Result<ProcessOutput, AssessError> {
            Ok(ProcessOutput {
                status: 0,
                stdout: stdout.to_string(),
                stderr: String::new(),
            })
        }

        pub fn rating(score: u8) -> Result<ProcessOutput, AssessError> {
            Self::ok(&format!(
                r#"{{"relevance":{score},"signalDensity":{score},"reusability":{score},"overallScore":{score},"rationale":"scripted"}}"#
            ))
        }

        pub fn push(&self, program: &str, outcome: Result<ProcessOutput, AssessError>) {
            self.scripts
                .lock()
                .unwrap()
                .entry(program.to_string())
                .or_default()
                .push_back(outcome);
        }

        pub fn call_count(&self, program: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.as_str() == program)
                .count()
        }
    }

    #[async_trait]
    impl ProcessRunner for FakeRunner {
        async fn run(
            &self,
            program: &str,
            _args: &[String],
            _timeout: Duration,
        ) -> Result<ProcessOutput, AssessError> {
            self.calls.lock().unwrap().push(program.to_string());
            let scripted = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(program)
                .and_then(VecDeque::pop_front);
            scripted.unwrap_or_else(|| Self::rating(7))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::FakeRunner;
    use super::*;
    use crate::core::ParsedEvent;

    fn chunk(id_hint: &str) -> Chunk {
        let mut chunk = Chunk::from_events(
            "sess",
            vec![ParsedEvent::new("user", format!("content {id_hint}"))],
            &[50],
            0,
            0,
        );
        chunk.id = format!("chunk-{id_hint}");
        chunk
    }

    fn assessor(runner: Arc<FakeRunner>) -> Assessor {
        Assessor::new(runner)
    }

    #[tokio::test]
    async fn test_all_providers_succeed() {
        let runner = Arc::new(FakeRunner::default());
        let cfg = AssessConfig::default();

        let assessments = assessor(Arc::clone(&runner))
            .assess_chunk(&chunk("a"), &cfg)
            .await;

        assert_eq!(assessments.len(), 3);
        for assessment in &assessments {
            assert_eq!(assessment.score, 7);
            assert_eq!(assessment.chunk_id, "chunk-a");
        }
        assert_eq!(runner.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failure_retried_exactly_once() {
        let runner = Arc::new(FakeRunner::default());
        runner.push(
            "codex",
            Err(AssessError::Timeout {
                provider: "codex".to_string(),
                timeout_ms: 30_000,
            }),
        );
        runner.push("codex", FakeRunner::rating(9));

        let cfg = AssessConfig::default();
        let assessments = assessor(Arc::clone(&runner))
            .assess_chunk(&chunk("a"), &cfg)
            .await;

        assert_eq!(assessments.len(), 3);
        let codex = assessments
            .iter()
            .find(|a| a.provider == ProviderKind::Codex)
            .unwrap();
        assert_eq!(codex.score, 9);
        assert_eq!(runner.call_count("codex"), 2);
    }

    #[tokio::test]
    async fn test_two_failures_drop_provider_silently() {
        let runner = Arc::new(FakeRunner::default());
        runner.push("gemini", FakeRunner::ok("garbage, no json"));
        runner.push("gemini", FakeRunner::ok("still nothing"));

        let cfg = AssessConfig::default();
        let assessments = assessor(Arc::clone(&runner))
            .assess_chunk(&chunk("a"), &cfg)
            .await;

        // Failed provider is absent, batch unaffected
        assert_eq!(assessments.len(), 2);
        assert!(
            assessments
                .iter()
                .all(|a| a.provider != ProviderKind::Gemini)
        );
        // Exactly two attempts: Failed is absorbing after the retry
        assert_eq!(runner.call_count("gemini"), 2);
    }

    #[tokio::test]
    async fn test_no_retry_when_disabled() {
        let runner = Arc::new(FakeRunner::default());
        runner.push("claude", FakeRunner::ok("not a rating"));

        let cfg = AssessConfig {
            retry_on_failure: false,
            ..AssessConfig::default()
        };
        let assessments = assessor(Arc::clone(&runner))
            .assess_chunk(&chunk("a"), &cfg)
            .await;

        assert_eq!(assessments.len(), 2);
        assert_eq!(runner.call_count("claude"), 1);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure_even_with_valid_stdout() {
        let runner = Arc::new(FakeRunner::default());
        runner.push(
            "claude",
            Ok(crate::assess::runner::ProcessOutput {
                status: 1,
                stdout: r#"{"relevance":9,"signalDensity":9,"reusability":9,"overallScore":9,"rationale":"x"}"#.to_string(),
                stderr: String::new(),
            }),
        );

        let cfg = AssessConfig {
            retry_on_failure: false,
            providers: vec![ProviderKind::Claude],
            ..AssessConfig::default()
        };
        let assessments = assessor(runner).assess_chunk(&chunk("a"), &cfg).await;
        assert!(assessments.is_empty());
    }

    #[tokio::test]
    async fn test_assess_chunks_progress_fires_once_per_chunk() {
        let runner = Arc::new(FakeRunner::default());
        let chunks: Vec<Chunk> = ["a", "b", "c", "d", "e"].iter().map(|h| chunk(h)).collect();

        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
        let calls_cb = Arc::clone(&calls);
        let on_progress: ProgressCallback = Arc::new(move |done, total| {
            calls_cb.lock().unwrap().push((done, total));
        });

        let cfg = AssessConfig::default();
        let results = assessor(runner)
            .assess_chunks(&chunks, &cfg, Some(on_progress))
            .await;

        assert_eq!(results.len(), 5);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 5);
        // Completion counts are 1..=5 in completion order
        let mut counts: Vec<usize> = calls.iter().map(|(done, _)| *done).collect();
        counts.sort_unstable();
        assert_eq!(counts, vec![1, 2, 3, 4, 5]);
        assert!(calls.iter().all(|(_, total)| *total == 5));
    }

    #[tokio::test]
    async fn test_assess_chunks_results_keyed_by_chunk() {
        let runner = Arc::new(FakeRunner::default());
        let chunks = vec![chunk("x"), chunk("y")];
        let cfg = AssessConfig {
            providers: vec![ProviderKind::Claude],
            ..AssessConfig::default()
        };

        let results = assessor(runner).assess_chunks(&chunks, &cfg, None).await;
        assert!(results.contains_key("chunk-x"));
        assert!(results.contains_key("chunk-y"));
        assert_eq!(results["chunk-x"].len(), 1);
    }
}
