//! Output generators: replayable native session files per target assistant.

pub mod claude;
pub mod codex;
pub mod gemini;
pub mod loader;

pub use claude::{ClaudeConversationGenerator, ClaudeSummaryGenerator};
pub use codex::CodexGenerator;
pub use gemini::GeminiGenerator;
pub use loader::{DistillationLoader, LoadedBuild};

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::core::DistilledSession;
use crate::error::{IoError, Result};

/// Options shared by all generators.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Model name stamped on assistant records.
    pub model: String,
    /// Working directory stamped on records and used by the loader.
    pub cwd: String,
    /// Assistant version string.
    pub version: String,
    /// Git branch recorded on the session.
    pub git_branch: String,
    /// Run topic synthesis before emission; per-chunk Q&A otherwise.
    pub synthesize: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5".to_string(),
            cwd: std::env::current_dir()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "/".to_string()),
            version: "2.0.0".to_string(),
            git_branch: "main".to_string(),
            synthesize: true,
        }
    }
}

/// A generator emits one distilled session as a native session file.
///
/// Generators never mutate their input; I/O failures are surfaced.
pub trait OutputGenerator {
    /// File extension of the emitted artifact (without dot).
    fn extension(&self) -> &'static str;

    /// Writes the distilled session to `path`, returning the path.
    fn generate(
        &self,
        distilled: &DistilledSession,
        path: &Path,
        options: &GeneratorOptions,
    ) -> Result<PathBuf>;
}

/// Builds a timestamped artifact path `YYYY-MM-DDTHH-MM-SS-<slug>.<ext>`
/// under `dir`.
#[must_use]
pub fn artifact_path(dir: &Path, slug: &str, extension: &str) -> PathBuf {
    let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S");
    dir.join(format!("{stamp}-{slug}.{extension}"))
}

/// Writes `content` to `path`, creating parent directories.
pub(crate) fn write_artifact(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| IoError::DirectoryFailed {
            path: parent.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;
    }
    std::fs::write(path, content).map_err(|e| IoError::WriteFailed {
        path: path.to_string_lossy().to_string(),
        reason: e.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures for generator tests.

    use crate::core::{Chunk, DistilledSession, DroppedChunks, ParsedEvent, Role};

    pub fn sample_session() -> DistilledSession {
        let mut user = ParsedEvent::new("user", "how do we deploy this project?");
        user.role = Some(Role::User);
        user.timestamp = Some("2026-03-01T10:00:00Z".to_string());
        let mut assistant =
            ParsedEvent::new("assistant", "the deploy pipeline builds a docker image");
        assistant.role = Some(Role::Assistant);
        assistant.timestamp = Some("2026-03-01T10:00:30Z".to_string());

        let mut decision = ParsedEvent::new("assistant", "we chose sqlite, a tradeoff for simplicity");
        decision.role = Some(Role::Assistant);

        let mut chunk_a = Chunk::from_events("sess-a", vec![user, assistant], &[60, 55], 0, 1);
        chunk_a.id = "chunk-a".to_string();
        let mut chunk_b = Chunk::from_events("sess-b", vec![decision], &[70], 4, 4);
        chunk_b.id = "chunk-b".to_string();

        DistilledSession::new(vec![chunk_a, chunk_b], DroppedChunks::default())
    }
}
