//! Distillation loader: find the latest build and inject its context.
//!
//! Claude can resume the build file natively; every other assistant gets
//! a text block of the assistant turns to prepend to its next prompt.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::core::Role;
use crate::error::{DistillError, Result};

/// Marker opening an injected context block.
pub const CONTEXT_HEADER: &str = "=== DISTILLED PROJECT CONTEXT ===";
/// Marker closing an injected context block.
pub const CONTEXT_FOOTER: &str = "=== END CONTEXT ===";

/// One parsed turn of a build file.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTurn {
    /// Turn role.
    pub role: Role,
    /// Turn text.
    pub content: String,
}

/// A parsed distilled build.
#[derive(Debug, Clone)]
pub struct LoadedBuild {
    /// Path of the build file (Claude resumes this directly).
    pub file_path: PathBuf,
    /// Ordered conversation turns.
    pub turns: Vec<LoadedTurn>,
    /// Number of topic Q&A pairs (user/assistant couples after the
    /// preamble).
    pub qa_pairs: usize,
    /// Working directory recorded on the build.
    pub cwd: Option<String>,
}

impl LoadedBuild {
    /// Text block of assistant turns for non-Claude injection.
    #[must_use]
    pub fn context_block(&self) -> String {
        let mut block = String::from(CONTEXT_HEADER);
        block.push('\n');
        for turn in &self.turns {
            if turn.role == Role::Assistant {
                block.push_str(&turn.content);
                block.push_str("\n\n");
            }
        }
        block.push_str(CONTEXT_FOOTER);
        block
    }
}

/// Finds and parses distilled builds under one artifact directory.
pub struct DistillationLoader {
    distilled_dir: PathBuf,
}

impl DistillationLoader {
    /// Builds a loader over the given `distilled/` directory.
    #[must_use]
    pub fn new(distilled_dir: impl Into<PathBuf>) -> Self {
        Self {
            distilled_dir: distilled_dir.into(),
        }
    }

    /// Selects the most recent `*-build.jsonl` whose first record's `cwd`
    /// matches the project path, falling back to the latest build overall.
    ///
    /// # Errors
    ///
    /// Returns [`DistillError::BuildNotFound`] when the directory holds no
    /// build artifacts at all.
    pub fn find_latest_build(&self, project: Option<&Path>) -> Result<PathBuf> {
        let mut builds: Vec<PathBuf> = std::fs::read_dir(&self.distilled_dir)
            .map(|entries| {
                entries
                    .flatten()
                    .map(|e| e.path())
                    .filter(|p| {
                        p.file_name()
                            .and_then(|n| n.to_str())
                            .is_some_and(|n| n.ends_with("-build.jsonl"))
                    })
                    .collect()
            })
            .unwrap_or_default();

        if builds.is_empty() {
            return Err(DistillError::BuildNotFound {
                path: self.distilled_dir.to_string_lossy().to_string(),
            }
            .into());
        }

        // Timestamped names sort chronologically; newest last.
        builds.sort();

        if let Some(project) = project {
            let wanted = normalize_path(&project.to_string_lossy());
            if let Some(found) = builds.iter().rev().find(|path| {
                first_record_cwd(path).is_some_and(|cwd| normalize_path(&cwd) == wanted)
            }) {
                return Ok(found.clone());
            }
        }

        builds
            .last()
            .cloned()
            .ok_or_else(|| {
                DistillError::BuildNotFound {
                    path: self.distilled_dir.to_string_lossy().to_string(),
                }
                .into()
            })
    }

    /// Parses a build file into ordered turns.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read; unparseable lines
    /// inside it are skipped.
    pub fn load(&self, path: &Path) -> Result<LoadedBuild> {
        let content =
            std::fs::read_to_string(path).map_err(|_| DistillError::BuildNotFound {
                path: path.to_string_lossy().to_string(),
            })?;

        let mut turns = Vec::new();
        let mut cwd = None;
        for line in content.lines() {
            let Ok(record) = serde_json::from_str::<Value>(line) else {
                continue;
            };
            if cwd.is_none() {
                cwd = record
                    .get("cwd")
                    .and_then(Value::as_str)
                    .map(ToString::to_string);
            }
            if let Some(turn) = record_to_turn(&record) {
                turns.push(turn);
            }
        }

        // Preamble is the first user/assistant couple; everything after
        // pairs off as topic Q&A.
        let qa_pairs = turns.len().saturating_sub(2) / 2;

        Ok(LoadedBuild {
            file_path: path.to_path_buf(),
            turns,
            qa_pairs,
            cwd,
        })
    }
}

fn record_to_turn(record: &Value) -> Option<LoadedTurn> {
    let record_type = record.get("type").and_then(Value::as_str)?;
    let role = match record_type {
        "user" => Role::User,
        "assistant" => Role::Assistant,
        _ => return None,
    };

    let message = record.get("message")?;
    let content = match message.get("content") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return None,
    };

    Some(LoadedTurn { role, content })
}

/// Normalizes a path for cwd comparison: trailing slashes dropped and the
/// Claude project-directory dashed form unified with the plain form.
fn normalize_path(path: &str) -> String {
    path.trim_end_matches('/').replace(['/', '\\'], "-")
}

fn first_record_cwd(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let first = content.lines().find(|l| !l.trim().is_empty())?;
    serde_json::from_str::<Value>(first)
        .ok()?
        .get("cwd")
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::test_support::sample_session;
    use crate::output::{ClaudeConversationGenerator, GeneratorOptions, OutputGenerator};

    fn write_build(dir: &Path, name: &str, cwd: &str) -> PathBuf {
        let path = dir.join(name);
        let options = GeneratorOptions {
            cwd: cwd.to_string(),
            ..GeneratorOptions::default()
        };
        ClaudeConversationGenerator
            .generate(&sample_session(), &path, &options)
            .unwrap();
        path
    }

    #[test]
    fn test_find_latest_build_by_cwd() {
        let tmp = tempfile::tempdir().unwrap();
        write_build(tmp.path(), "2026-01-01T00-00-00-build.jsonl", "/work/alpha");
        let beta = write_build(tmp.path(), "2026-02-01T00-00-00-build.jsonl", "/work/beta");
        write_build(tmp.path(), "2026-03-01T00-00-00-build.jsonl", "/work/alpha");

        let loader = DistillationLoader::new(tmp.path());
        let found = loader
            .find_latest_build(Some(Path::new("/work/beta")))
            .unwrap();
        assert_eq!(found, beta);
    }

    #[test]
    fn test_find_latest_build_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        write_build(tmp.path(), "2026-01-01T00-00-00-build.jsonl", "/work/alpha");
        let latest = write_build(tmp.path(), "2026-03-01T00-00-00-build.jsonl", "/work/alpha");

        let loader = DistillationLoader::new(tmp.path());
        // No cwd match: newest build wins
        let found = loader
            .find_latest_build(Some(Path::new("/work/unknown")))
            .unwrap();
        assert_eq!(found, latest);

        let found = loader.find_latest_build(None).unwrap();
        assert_eq!(found, latest);
    }

    #[test]
    fn test_find_latest_build_empty_dir_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = DistillationLoader::new(tmp.path());
        let err = loader.find_latest_build(None).unwrap_err();
        assert!(err.to_string().contains("no distilled build found"));
    }

    #[test]
    fn test_load_counts_qa_pairs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_build(tmp.path(), "2026-01-01T00-00-00-build.jsonl", "/work/alpha");

        let loader = DistillationLoader::new(tmp.path());
        let build = loader.load(&path).unwrap();

        assert!(!build.turns.is_empty());
        assert_eq!(build.turns.len() % 2, 0);
        assert_eq!(build.qa_pairs, (build.turns.len() - 2) / 2);
        assert_eq!(build.cwd.as_deref(), Some("/work/alpha"));
    }

    #[test]
    fn test_context_block_has_only_assistant_turns() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_build(tmp.path(), "2026-01-01T00-00-00-build.jsonl", "/w");

        let loader = DistillationLoader::new(tmp.path());
        let build = loader.load(&path).unwrap();
        let block = build.context_block();

        assert!(block.starts_with(CONTEXT_HEADER));
        assert!(block.ends_with(CONTEXT_FOOTER));
        // User questions stay out of the injected block
        for turn in &build.turns {
            if turn.role == Role::User {
                assert!(!block.contains(&turn.content));
            }
        }
    }

    #[test]
    fn test_load_missing_file_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = DistillationLoader::new(tmp.path());
        assert!(loader.load(&tmp.path().join("nope.jsonl")).is_err());
    }

    #[test]
    fn test_normalize_path_forms() {
        assert_eq!(normalize_path("/work/beta/"), normalize_path("/work/beta"));
        assert_eq!(normalize_path("/work/beta"), "-work-beta");
    }
}
