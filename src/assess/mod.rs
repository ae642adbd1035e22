//! Multi-agent assessment engine.
//!
//! Chunks are rated by external provider CLIs run as subprocesses; ratings
//! are parsed defensively, aggregated into a consensus score, and the whole
//! fan-out is throttled by a bounded queue.

pub mod assessor;
pub mod consensus;
pub mod prompt;
pub mod queue;
pub mod rating;
pub mod runner;

pub use assessor::{AssessConfig, Assessor, ProgressCallback};
pub use consensus::{ConsensusConfig, compute_consensus};
pub use prompt::{build_generic_prompt, build_question_prompt};
pub use queue::AssessmentQueue;
pub use rating::{Rating, RatingAxes, RatingSchema, parse_rating};
pub use runner::{ProcessOutput, ProcessRunner, TokioProcessRunner};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A provider CLI the assessor can fan out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// The `claude` CLI.
    Claude,
    /// The `codex` CLI.
    Codex,
    /// The `gemini` CLI.
    Gemini,
}

impl ProviderKind {
    /// All known providers, in default fan-out order.
    pub const ALL: [Self; 3] = [Self::Claude, Self::Codex, Self::Gemini];

    /// Lowercase provider label used in persistence and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::Gemini => "gemini",
        }
    }

    /// Executable name on `$PATH`.
    #[must_use]
    pub const fn program(self) -> &'static str {
        self.as_str()
    }

    /// Full argv for a single non-interactive rating call.
    ///
    /// Flags are the minimum set that suppresses sandboxing and approval
    /// prompts and forces a single response; the prompt is always the
    /// final positional argument.
    #[must_use]
    pub fn argv(self, prompt: &str) -> Vec<String> {
        let mut args: Vec<String> = match self {
            Self::Claude => vec![
                "--print".to_string(),
                "--dangerously-skip-permissions".to_string(),
            ],
            Self::Codex => vec![
                "exec".to_string(),
                "--full-auto".to_string(),
                "--skip-git-repo-check".to_string(),
            ],
            Self::Gemini => vec!["--yolo".to_string()],
        };
        args.push(prompt.to_string());
        args
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claude" => Ok(Self::Claude),
            "codex" => Ok(Self::Codex),
            "gemini" => Ok(Self::Gemini),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// One provider's rating of one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    /// Unique assessment id.
    pub id: String,
    /// Chunk this assessment rates.
    pub chunk_id: String,
    /// Provider that produced it.
    pub provider: ProviderKind,
    /// Overall score on the `[1, 10]` scale.
    pub score: u8,
    /// Provider's stated reasoning.
    pub rationale: String,
    /// Model name when the provider reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Token usage when the provider reported it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    /// Wall time from spawn to parsed rating.
    pub latency_ms: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}
