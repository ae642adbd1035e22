//! Codex-native generator: NDJSON metadata line plus context records.

use std::path::{Path, PathBuf};

use serde_json::json;

use crate::core::DistilledSession;
use crate::error::Result;
use crate::output::{GeneratorOptions, OutputGenerator, write_artifact};

/// Emits a Codex context file: one metadata line, then one assistant
/// context line per chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodexGenerator;

impl OutputGenerator for CodexGenerator {
    fn extension(&self) -> &'static str {
        "jsonl"
    }

    fn generate(
        &self,
        distilled: &DistilledSession,
        path: &Path,
        _options: &GeneratorOptions,
    ) -> Result<PathBuf> {
        let mut lines = Vec::with_capacity(distilled.chunks.len() + 1);

        let metadata = json!({
            "type": "metadata",
            "version": 1,
            "sourceSessionIds": distilled.source_session_ids,
            "sourcePlatforms": distilled.source_platforms,
            "chunkCount": distilled.chunks.len(),
            "totalTokens": distilled.total_tokens,
            "distilledAt": distilled.distilled_at.to_rfc3339(),
        });
        lines.push(serde_json::to_string(&metadata)?);

        for chunk in &distilled.chunks {
            let record = json!({
                "type": "context",
                "role": "assistant",
                "content": chunk.combined_content(),
                "metadata": {
                    "chunkId": chunk.id,
                    "sessionId": chunk.session_id,
                    "importanceAvg": chunk.importance_avg,
                    "tokenEstimate": chunk.token_estimate,
                    "startIndex": chunk.start_index,
                    "endIndex": chunk.end_index,
                },
            });
            lines.push(serde_json::to_string(&record)?);
        }

        write_artifact(path, &(lines.join("\n") + "\n"))?;
        Ok(path.to_path_buf())
    }
}
