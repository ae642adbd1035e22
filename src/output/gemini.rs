//! Gemini-native generator: a single JSON document of merged contents.

use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use crate::core::{DistilledSession, Role};
use crate::error::Result;
use crate::output::{GeneratorOptions, OutputGenerator, write_artifact};

/// Emits a Gemini session document:
/// `{metadata, contents:[{role, parts:[{text}]}]}`.
///
/// Consecutive same-role events inside a chunk merge into a single
/// contents entry; the assistant role maps to `model`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiGenerator;

impl OutputGenerator for GeminiGenerator {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn generate(
        &self,
        distilled: &DistilledSession,
        path: &Path,
        _options: &GeneratorOptions,
    ) -> Result<PathBuf> {
        let mut contents: Vec<Value> = Vec::new();

        for chunk in &distilled.chunks {
            let mut current_role: Option<&str> = None;
            let mut current_texts: Vec<&str> = Vec::new();

            for event in &chunk.events {
                let role = match event.role {
                    Some(Role::Assistant) => "model",
                    _ => "user",
                };
                if event.content.is_empty() {
                    continue;
                }
                if current_role == Some(role) {
                    current_texts.push(&event.content);
                } else {
                    flush(&mut contents, current_role, &current_texts);
                    current_role = Some(role);
                    current_texts = vec![&event.content];
                }
            }
            flush(&mut contents, current_role, &current_texts);
        }

        let document = json!({
            "metadata": {
                "sourceSessionIds": distilled.source_session_ids,
                "sourcePlatforms": distilled.source_platforms,
                "chunkCount": distilled.chunks.len(),
                "totalTokens": distilled.total_tokens,
                "distilledAt": distilled.distilled_at.to_rfc3339(),
            },
            "contents": contents,
        });

        write_artifact(path, &serde_json::to_string_pretty(&document)?)?;
        Ok(path.to_path_buf())
    }
}

fn flush(contents: &mut Vec<Value>, role: Option<&str>, texts: &[&str]) {
    if let Some(role) = role
        && !texts.is_empty()
    {
        contents.push(json!({
            "role": role,
            "parts": [{"text": texts.join("\n")}],
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Chunk, DroppedChunks, ParsedEvent};
    use crate::output::test_support::sample_session;

    #[test]
    fn test_gemini_document_shape() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("build.json");
        let session = sample_session();

        GeminiGenerator
            .generate(&session, &path, &GeneratorOptions::default())
            .unwrap();

        let document: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(document["metadata"]["chunkCount"], session.chunks.len());

        let contents = document["contents"].as_array().unwrap();
        assert!(!contents.is_empty());
        for entry in contents {
            let role = entry["role"].as_str().unwrap();
            assert!(role == "user" || role == "model");
            assert!(entry["parts"][0]["text"].is_string());
        }
    }

    #[test]
    fn test_consecutive_same_role_events_merge() {
        let mut first = ParsedEvent::new("assistant", "part one");
        first.role = Some(Role::Assistant);
        let mut second = ParsedEvent::new("assistant", "part two");
        second.role = Some(Role::Assistant);
        let mut third = ParsedEvent::new("user", "a question");
        third.role = Some(Role::User);

        let chunk = Chunk::from_events("s", vec![first, second, third], &[50, 50, 50], 0, 2);
        let session = DistilledSession::new(vec![chunk], DroppedChunks::default());

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("merge.json");
        GeminiGenerator
            .generate(&session, &path, &GeneratorOptions::default())
            .unwrap();

        let document: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let contents = document["contents"].as_array().unwrap();

        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0]["role"], "model");
        assert_eq!(contents[0]["parts"][0]["text"], "part one\npart two");
        assert_eq!(contents[1]["role"], "user");
    }

    #[test]
    fn test_output_parses_as_single_json_value() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("whole.json");
        GeminiGenerator
            .generate(&sample_session(), &path, &GeneratorOptions::default())
            .unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(serde_json::from_str::<Value>(&raw).is_ok());
    }
}
